//! Scenario and feature execution.
//!
//! Scenarios run sequentially in declaration order, each with a fresh step
//! context. An assertion failure or readiness timeout aborts the remaining
//! steps of its scenario only; the runner keeps going and the aggregate
//! counts stay consistent after every scenario. Environment errors (a dead
//! session, failed navigation) are different: no scenario can meaningfully
//! run after one, so the runner records the failure and aborts the rest of
//! the run with a run-level message.

use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use colored::Colorize;
use log::warn;

use crate::browser::{HarnessError, TestSession};
use crate::common::report::{ScenarioRecord, TestRunReport};
use crate::common::{artifacts_dir, capture_artifacts};
use crate::features::{Feature, Scenario};
use crate::steps::{StepContext, StepRegistry};

pub struct Runner {
    registry: StepRegistry,
    pub skip_tags: Vec<String>,
    pub artifacts_base: String,
    pub browser_label: String,
    pub verbose: bool,
}

impl Runner {
    pub fn new(registry: StepRegistry) -> Self {
        Self {
            registry,
            skip_tags: vec!["@skip".to_string()],
            artifacts_base: "target/test-artifacts".to_string(),
            browser_label: "chrome".to_string(),
            verbose: false,
        }
    }

    /// Runs every scenario in declaration order. Returns `true` when an
    /// environment error aborted the run early; the scenarios that never
    /// executed are not recorded, only the run-level message is.
    pub async fn run_features<F>(
        &self,
        features: &[Feature],
        session: &Arc<dyn TestSession>,
        report: &mut TestRunReport,
        make_ctx: F,
    ) -> bool
    where
        F: Fn() -> StepContext,
    {
        for feature in features {
            println!("{}", feature.name.bright_blue().bold());
            report.start_feature(&feature.name);
            for scenario in &feature.scenarios {
                let (record, environment_error) = self
                    .run_scenario(feature, scenario, session, &make_ctx)
                    .await;
                self.announce(&record);
                report.record_scenario(record);
                debug_assert!(report.counts_consistent());

                if let Some(message) = environment_error {
                    eprintln!("  🛑 {}", message.red());
                    report.add_message(format!(
                        "environment error aborted the run ({message}); remaining scenarios were not executed"
                    ));
                    return true;
                }
            }
        }
        false
    }

    async fn run_scenario<F>(
        &self,
        feature: &Feature,
        scenario: &Scenario,
        session: &Arc<dyn TestSession>,
        make_ctx: &F,
    ) -> (ScenarioRecord, Option<String>)
    where
        F: Fn() -> StepContext,
    {
        if self.skip_tags.iter().any(|t| scenario.has_tag(t)) {
            return (ScenarioRecord::skipped(&scenario.name), None);
        }

        let mut ctx = make_ctx();
        ctx.verbose = self.verbose;
        let started = Instant::now();

        for step_text in &scenario.steps {
            let outcome = match self.registry.resolve(step_text) {
                Some((step, args)) => step.execute(&mut ctx, &args).await,
                None => Err(anyhow!("no step definition matched '{step_text}'")),
            };

            if let Err(err) = outcome {
                let chained = err.context(format!("step '{step_text}' failed"));
                // A dead session or failed navigation dooms every later
                // scenario too; surface it so the run stops here.
                let environment_error = chained
                    .downcast_ref::<HarnessError>()
                    .map(ToString::to_string);
                let dir = artifacts_dir(
                    &self.artifacts_base,
                    &self.browser_label,
                    &feature.name,
                    &scenario.name,
                );
                if let Err(capture_err) =
                    capture_artifacts(session.as_ref(), &dir, &chained).await
                {
                    warn!("could not capture failure artifacts: {capture_err:#}");
                }
                let record = ScenarioRecord::failed(
                    &scenario.name,
                    format!("{chained:#}"),
                    started.elapsed(),
                )
                .with_details(ctx.take_details());
                return (record, environment_error);
            }
        }

        let record = ScenarioRecord::passed(&scenario.name, started.elapsed())
            .with_details(ctx.take_details());
        (record, None)
    }

    fn announce(&self, record: &ScenarioRecord) {
        use crate::common::report::ScenarioStatus;
        match record.status {
            ScenarioStatus::Passed => {
                println!("  ✅ {} ({}ms)", record.name.green(), record.duration_ms);
            }
            ScenarioStatus::Failed => {
                eprintln!(
                    "  ❌ {} ({}ms): {}",
                    record.name.red(),
                    record.duration_ms,
                    record.error.as_deref().unwrap_or("unknown error")
                );
            }
            ScenarioStatus::Skipped => {
                println!("  ⏭️  {}", record.name.yellow());
            }
        }
    }
}
