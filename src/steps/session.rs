//! Navigation and pacing steps.

use std::time::Duration;

use anyhow::{Result, ensure};
use async_trait::async_trait;
use log::debug;

use super::{StepArgs, StepContext, StepDef};
use crate::browser::RequiredField;

// Explicit fixed waits are bounded so a typo cannot stall a scenario.
const MAX_SETTLE_MS: u64 = 30_000;

/// `the simulation page is loaded` — navigates to the base URL and gates on
/// the readiness poller. A timeout is a step failure carrying the last
/// observed readiness fields and captured console errors.
pub struct PageLoadedStep;

#[async_trait]
impl StepDef for PageLoadedStep {
    fn pattern(&self) -> &'static str {
        "the simulation page is loaded"
    }

    async fn execute(&self, ctx: &mut StepContext, _args: &StepArgs) -> Result<()> {
        let url = ctx.base_url.clone();
        ctx.session.goto(&url).await?;

        let report = ctx
            .readiness
            .wait_until_ready(ctx.session.as_ref(), &RequiredField::ALL)
            .await?;
        ctx.note_detail("readiness", report.to_json());

        if ctx.verbose {
            debug!(
                "readiness after {} attempt(s): {:?}",
                report.attempts, report.fields
            );
        }

        ensure!(
            report.is_ready(),
            "application never became ready after {} attempt(s) ({}ms); fields: {:?}; console errors: {:?}",
            report.attempts,
            report.elapsed_ms,
            report.fields,
            report.console_errors
        );
        Ok(())
    }
}

/// `I wait {millis} ms for the simulation to settle` — a bounded fixed wait
/// for in-page animations and async effects.
pub struct SettleStep;

#[async_trait]
impl StepDef for SettleStep {
    fn pattern(&self) -> &'static str {
        "I wait {millis} ms for the simulation to settle"
    }

    async fn execute(&self, _ctx: &mut StepContext, args: &StepArgs) -> Result<()> {
        let millis: u64 = args.parsed("millis")?;
        ensure!(
            millis <= MAX_SETTLE_MS,
            "settle wait of {millis}ms exceeds the {MAX_SETTLE_MS}ms bound"
        );
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::probe::stub::StubSession;
    use crate::steps::testutil::stub_context;

    fn settle_args(millis: &str) -> StepArgs {
        let registry = crate::steps::StepRegistry::builtin();
        let text = format!("When I wait {millis} ms for the simulation to settle");
        registry.resolve(&text).expect("resolve").1
    }

    #[test]
    fn page_loaded_navigates_and_gates_on_readiness() {
        let mut ctx = stub_context(StubSession::new());
        tokio_test::block_on(PageLoadedStep.execute(&mut ctx, &StepArgs::default()))
            .expect("page loads");
        let details = ctx.take_details();
        assert_eq!(details["readiness"]["status"], "Ready");
    }

    #[test]
    fn page_loaded_fails_with_diagnostics_on_timeout() {
        let stub = StubSession::new();
        stub.state.lock().unwrap().ready_after_polls = u32::MAX;
        let mut ctx = stub_context(stub);
        let err = tokio_test::block_on(PageLoadedStep.execute(&mut ctx, &StepArgs::default()))
            .expect_err("timeout");
        let message = format!("{err:#}");
        assert!(message.contains("never became ready"));
        assert!(message.contains("appInitialized"));
    }

    #[test]
    fn settle_wait_is_bounded() {
        let mut ctx = stub_context(StubSession::new());
        let err = tokio_test::block_on(SettleStep.execute(&mut ctx, &settle_args("99999")))
            .expect_err("over bound");
        assert!(err.to_string().contains("exceeds"));

        tokio_test::block_on(SettleStep.execute(&mut ctx, &settle_args("1")))
            .expect("short wait");
    }
}
