//! Entity registry steps: spawning and census assertions.

use anyhow::{Result, ensure};
use async_trait::async_trait;
use serde_json::json;

use super::{StepArgs, StepContext, StepDef, require_capability};
use crate::browser::probe::{self, ActionOutcome, CountQuery, decode};

async fn query_count(ctx: &StepContext, kind: &str) -> Result<i64> {
    let raw = ctx
        .session
        .run(probe::COUNT_QUERY, vec![kind.into()])
        .await?;
    let query: CountQuery = decode(raw)?;
    ensure!(
        query.success,
        "count query for {kind} failed in-page: {}",
        query.error.unwrap_or_default()
    );
    Ok(query.count)
}

/// `the entity registry is reset` — a Given precondition owns the cleanup of
/// in-page state earlier scenarios may have left behind.
pub struct ResetRegistryStep;

#[async_trait]
impl StepDef for ResetRegistryStep {
    fn pattern(&self) -> &'static str {
        "the entity registry is reset"
    }

    async fn execute(&self, ctx: &mut StepContext, _args: &StepArgs) -> Result<()> {
        require_capability(ctx, "entityManager", "reset").await?;
        let raw = ctx.session.run(probe::RESET_REGISTRY, vec![]).await?;
        let outcome: ActionOutcome = decode(raw)?;
        ensure!(
            outcome.success,
            "entity registry reset failed: {}",
            outcome.error.unwrap_or_default()
        );
        Ok(())
    }
}

/// `I spawn {count} ants with job {job}` — dispatched as a spawn action; the
/// spawn itself is expected to succeed.
pub struct SpawnAntsStep;

#[async_trait]
impl StepDef for SpawnAntsStep {
    fn pattern(&self) -> &'static str {
        "I spawn {count} ants with job {job}"
    }

    async fn execute(&self, ctx: &mut StepContext, args: &StepArgs) -> Result<()> {
        let count: i64 = args.parsed("count")?;
        let job = args.get("job")?;
        ensure!(count > 0, "spawn count must be positive, got {count}");

        require_capability(ctx, "actionDispatcher", "executeAction").await?;
        let config = json!({ "type": "spawn", "count": count, "job": job });
        let raw = ctx.session.run(probe::EXECUTE_ACTION, vec![config]).await?;
        let outcome: ActionOutcome = decode(raw)?;
        ensure!(
            outcome.success,
            "spawning {count} {job} ants failed: {}",
            outcome.error.unwrap_or_default()
        );
        ctx.set_slot("last_spawn", json!({ "count": count, "job": job }));
        Ok(())
    }
}

/// `at least {min} ants should be registered`
pub struct AtLeastAntsStep;

#[async_trait]
impl StepDef for AtLeastAntsStep {
    fn pattern(&self) -> &'static str {
        "at least {min} ants should be registered"
    }

    async fn execute(&self, ctx: &mut StepContext, args: &StepArgs) -> Result<()> {
        let min: i64 = args.parsed("min")?;
        let count = query_count(ctx, "ant").await?;
        ensure!(
            count >= min,
            "expected at least {min} ants registered, got {count}"
        );
        Ok(())
    }
}

/// `exactly {count} entities of type {kind} should exist`
pub struct ExactCountStep;

#[async_trait]
impl StepDef for ExactCountStep {
    fn pattern(&self) -> &'static str {
        "exactly {count} entities of type {kind} should exist"
    }

    async fn execute(&self, ctx: &mut StepContext, args: &StepArgs) -> Result<()> {
        let expected: i64 = args.parsed("count")?;
        let kind = args.get("kind")?;
        let actual = query_count(ctx, kind).await?;
        ensure!(
            actual == expected,
            "expected exactly {expected} entities of type {kind}, got {actual}"
        );
        Ok(())
    }
}
