//! Action dispatch steps.
//!
//! `ExecuteActionStep` records the tagged outcome as data instead of failing
//! on `{success:false}`: some scenarios intentionally probe invalid input
//! and then assert that the application rejected it gracefully.

use anyhow::{Context, Result, bail, ensure};
use async_trait::async_trait;
use serde_json::json;

use super::{StepArgs, StepContext, StepDef, require_capability};
use crate::browser::probe::{self, ActionOutcome, decode};

/// `I execute the {action} action`
pub struct ExecuteActionStep;

#[async_trait]
impl StepDef for ExecuteActionStep {
    fn pattern(&self) -> &'static str {
        "I execute the {action} action"
    }

    async fn execute(&self, ctx: &mut StepContext, args: &StepArgs) -> Result<()> {
        let action = args.get("action")?;
        require_capability(ctx, "actionDispatcher", "executeAction").await?;

        let config = json!({ "type": action });
        let raw = ctx.session.run(probe::EXECUTE_ACTION, vec![config]).await?;
        let outcome: ActionOutcome = decode(raw)?;
        ctx.set_slot(
            "last_action",
            json!({
                "type": action,
                "success": outcome.success,
                "error": outcome.error,
                "detail": outcome.detail,
            }),
        );
        Ok(())
    }
}

/// `the last action should {verdict}` where verdict is succeed|fail.
pub struct LastActionStep;

#[async_trait]
impl StepDef for LastActionStep {
    fn pattern(&self) -> &'static str {
        "the last action should {verdict}"
    }

    async fn execute(&self, ctx: &mut StepContext, args: &StepArgs) -> Result<()> {
        let expect_success = match args.get("verdict")? {
            "succeed" => true,
            "fail" => false,
            other => bail!("verdict must be 'succeed' or 'fail', got '{other}'"),
        };

        let last = ctx
            .slot("last_action")
            .context("no action was executed earlier in this scenario")?;
        let succeeded = last["success"].as_bool().unwrap_or(false);
        let kind = last["type"].as_str().unwrap_or("?");
        ensure!(
            succeeded == expect_success,
            "expected action '{kind}' to {}, but it {} ({})",
            if expect_success { "succeed" } else { "fail" },
            if succeeded { "succeeded" } else { "failed" },
            last["error"].as_str().unwrap_or("no error reported")
        );
        Ok(())
    }
}
