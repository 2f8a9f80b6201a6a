//! Run report data model and output.
//!
//! Counts are bumped as each scenario record lands, so the sum-consistency
//! invariant (`passed + failed + skipped == scenarios`, and scenarios equals
//! the sum over features) holds at every point of the run, not just at the
//! end.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioRecord {
    pub name: String,
    pub status: ScenarioStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub duration_ms: u64,
}

impl ScenarioRecord {
    pub fn passed(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            status: ScenarioStatus::Passed,
            error: None,
            details: None,
            duration_ms: millis(duration),
        }
    }

    pub fn failed(name: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            status: ScenarioStatus::Failed,
            error: Some(error.into()),
            details: None,
            duration_ms: millis(duration),
        }
    }

    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ScenarioStatus::Skipped,
            error: None,
            details: None,
            duration_ms: 0,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        if !details.is_null() {
            self.details = Some(details);
        }
        self
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub name: String,
    pub scenarios: Vec<ScenarioRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub features: usize,
    pub scenarios: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRunReport {
    pub timestamp: String,
    pub counts: RunCounts,
    pub features: Vec<FeatureRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub messages: Vec<String>,
}

impl Default for TestRunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRunReport {
    pub fn new() -> Self {
        Self {
            timestamp: Utc::now().format("%Y%m%dT%H%M%SZ").to_string(),
            counts: RunCounts::default(),
            features: Vec::new(),
            messages: Vec::new(),
        }
    }

    pub fn start_feature(&mut self, name: impl Into<String>) {
        self.features.push(FeatureRecord {
            name: name.into(),
            scenarios: Vec::new(),
        });
        self.counts.features = self.features.len();
    }

    /// Appends a scenario record to the most recently started feature and
    /// bumps the aggregate counts in the same move.
    pub fn record_scenario(&mut self, record: ScenarioRecord) {
        let feature = self
            .features
            .last_mut()
            .expect("record_scenario called before start_feature");
        match record.status {
            ScenarioStatus::Passed => self.counts.passed += 1,
            ScenarioStatus::Failed => self.counts.failed += 1,
            ScenarioStatus::Skipped => self.counts.skipped += 1,
        }
        self.counts.scenarios += 1;
        feature.scenarios.push(record);
    }

    /// Run-level note for the report consumer, e.g. why zero scenarios ran.
    pub fn add_message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn counts_consistent(&self) -> bool {
        let per_status = self.counts.passed + self.counts.failed + self.counts.skipped;
        let per_feature: usize = self.features.iter().map(|f| f.scenarios.len()).sum();
        per_status == self.counts.scenarios
            && per_feature == self.counts.scenarios
            && self.counts.features == self.features.len()
    }

    pub fn all_passed(&self) -> bool {
        self.counts.failed == 0
    }

    pub fn write_json(&self, results_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(results_dir)
            .with_context(|| format!("creating {}", results_dir.display()))?;
        let path = results_dir.join(format!("run-{}.json", self.timestamp));
        let payload = serde_json::to_vec_pretty(self).context("serializing run report")?;
        fs::write(&path, payload).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}

pub fn print_summary(report: &TestRunReport, total_duration: Duration) {
    println!();
    println!("{}", "📊 Test Run Summary".bright_cyan().bold());
    println!("{}", "===================".cyan());
    println!("Features:  {}", report.counts.features);
    println!("Scenarios: {}", report.counts.scenarios);
    println!("Passed:    {}", report.counts.passed.to_string().green());
    println!("Failed:    {}", report.counts.failed.to_string().red());
    println!("Skipped:   {}", report.counts.skipped.to_string().yellow());
    println!("Total time: {total_duration:?}");
    println!();

    for feature in &report.features {
        println!("{}", feature.name.bold());
        for scenario in &feature.scenarios {
            let status = match scenario.status {
                ScenarioStatus::Passed => "✅ PASS".green(),
                ScenarioStatus::Failed => "❌ FAIL".red(),
                ScenarioStatus::Skipped => "⏭️  SKIP".yellow(),
            };
            println!("  {} {} ({}ms)", status, scenario.name, scenario.duration_ms);
            if let Some(error) = &scenario.error {
                println!("     • {}", error.red());
            }
        }
        println!();
    }

    for message in &report.messages {
        println!("{}", message.yellow());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> TestRunReport {
        let mut report = TestRunReport::new();
        report.start_feature("Ant population");
        report.record_scenario(ScenarioRecord::passed("spawn", Duration::from_millis(12)));
        report.record_scenario(ScenarioRecord::failed(
            "census",
            "expected at least 3, got 2",
            Duration::from_millis(7),
        ));
        report.start_feature("Render layers");
        report.record_scenario(ScenarioRecord::skipped("debug overlay"));
        report
    }

    #[test]
    fn counts_track_each_scenario_as_it_lands() {
        let mut report = TestRunReport::new();
        report.start_feature("f");
        assert!(report.counts_consistent());
        report.record_scenario(ScenarioRecord::passed("a", Duration::ZERO));
        assert!(report.counts_consistent());
        assert_eq!(report.counts.passed, 1);
        report.record_scenario(ScenarioRecord::skipped("b"));
        assert!(report.counts_consistent());
        assert_eq!(report.counts.scenarios, 2);
    }

    #[test]
    fn sum_consistency_holds_across_features() {
        let report = sample_report();
        assert!(report.counts_consistent());
        assert_eq!(report.counts.features, 2);
        assert_eq!(report.counts.scenarios, 3);
        assert_eq!(
            report.counts.passed + report.counts.failed + report.counts.skipped,
            report.counts.scenarios
        );
    }

    #[test]
    fn all_passed_ignores_skips() {
        let mut report = TestRunReport::new();
        report.start_feature("f");
        report.record_scenario(ScenarioRecord::passed("a", Duration::ZERO));
        report.record_scenario(ScenarioRecord::skipped("b"));
        assert!(report.all_passed());
        report.record_scenario(ScenarioRecord::failed("c", "boom", Duration::ZERO));
        assert!(!report.all_passed());
    }

    #[test]
    fn write_json_round_trips() {
        let report = sample_report();
        let dir = std::env::temp_dir().join(format!(
            "colony-report-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        let path = report.write_json(&dir).expect("write");
        let raw = fs::read_to_string(&path).expect("read");
        let parsed: TestRunReport = serde_json::from_str(&raw).expect("parse");
        assert!(parsed.counts_consistent());
        assert_eq!(parsed.counts, report.counts);
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("run-"));
    }

    #[test]
    fn failed_record_carries_expected_and_actual_text() {
        let record = ScenarioRecord::failed("census", "expected at least 3, got 2", Duration::ZERO);
        let error = record.error.expect("error");
        assert!(error.contains('3'));
        assert!(error.contains('2'));
    }

    #[test]
    fn details_are_attached_only_when_present() {
        let record = ScenarioRecord::passed("a", Duration::ZERO)
            .with_details(serde_json::json!({ "baseline": "created" }));
        assert!(record.details.is_some());
        let record = ScenarioRecord::passed("b", Duration::ZERO).with_details(Value::Null);
        assert!(record.details.is_none());
    }
}
