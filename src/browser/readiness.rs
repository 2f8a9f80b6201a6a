//! Page readiness gating.
//!
//! The poller re-evaluates the in-page readiness predicate until every
//! required field is true or the timeout elapses. A timeout is a reported
//! outcome, never an error: the report keeps the last observed fields and
//! any captured console errors so a failed gate is diagnosable offline.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;

use super::probe::{self, HarnessError, ReadinessFields, TestSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReadinessStatus {
    Ready,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredField {
    CoreLibraryLoaded,
    AppInitialized,
    DomReady,
}

impl RequiredField {
    pub const ALL: [Self; 3] = [
        Self::CoreLibraryLoaded,
        Self::AppInitialized,
        Self::DomReady,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::CoreLibraryLoaded => "coreLibraryLoaded",
            Self::AppInitialized => "appInitialized",
            Self::DomReady => "domReady",
        }
    }

    const fn observed(self, fields: &ReadinessFields) -> bool {
        match self {
            Self::CoreLibraryLoaded => fields.core_library_loaded,
            Self::AppInitialized => fields.app_initialized,
            Self::DomReady => fields.dom_ready,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadinessReport {
    pub status: ReadinessStatus,
    pub fields: BTreeMap<String, bool>,
    pub console_errors: Vec<String>,
    pub attempts: u32,
    pub elapsed_ms: u64,
}

impl ReadinessReport {
    pub fn is_ready(&self) -> bool {
        self.status == ReadinessStatus::Ready
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReadinessPoller {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ReadinessPoller {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            poll_interval: Duration::from_millis(250),
        }
    }
}

impl ReadinessPoller {
    pub const fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// Polls until all `required` fields are observed true. Checks before
    /// sleeping, so an already-ready page returns on the first attempt
    /// without spending a poll interval.
    pub async fn wait_until_ready(
        &self,
        session: &dyn TestSession,
        required: &[RequiredField],
    ) -> Result<ReadinessReport, HarnessError> {
        let start = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let raw = session.run(probe::READINESS_PROBE, vec![]).await?;
            let fields: ReadinessFields = probe::decode(raw)
                .unwrap_or_else(|_| ReadinessFields {
                    success: false,
                    error: Some("malformed readiness payload".to_string()),
                    core_library_loaded: false,
                    app_initialized: false,
                    dom_ready: false,
                    console_errors: Vec::new(),
                });

            let ready = fields.success && required.iter().all(|f| f.observed(&fields));
            if ready {
                return Ok(Self::report(ReadinessStatus::Ready, &fields, attempts, start));
            }
            if start.elapsed() >= self.timeout {
                return Ok(Self::report(
                    ReadinessStatus::TimedOut,
                    &fields,
                    attempts,
                    start,
                ));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn report(
        status: ReadinessStatus,
        fields: &ReadinessFields,
        attempts: u32,
        start: Instant,
    ) -> ReadinessReport {
        let mut observed = BTreeMap::new();
        for field in RequiredField::ALL {
            observed.insert(field.name().to_string(), field.observed(fields));
        }
        ReadinessReport {
            status,
            fields: observed,
            console_errors: fields.console_errors.clone(),
            attempts,
            elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}
