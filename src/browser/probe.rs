//! In-page probe execution.
//!
//! Every script dispatched into the simulation wraps its own body in
//! try/catch and returns a tagged `{success, ...}` value. The executor only
//! marshals: a failure reported by the page comes back as ordinary data,
//! while a dead or unresponsive session surfaces as `SessionUnavailable`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thirtyfour::WebDriver;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("navigation to {target} failed: {message}")]
    NavigationFailed { target: String, message: String },
    #[error("browser session unavailable: {0}")]
    SessionUnavailable(String),
}

/// Black-box handle onto the running application: script execution plus the
/// few session-level operations step definitions need (navigation, canvas
/// capture, page source for failure artifacts).
#[async_trait]
pub trait TestSession: Send + Sync {
    async fn run(&self, script: &str, args: Vec<Value>) -> Result<Value, HarnessError>;
    async fn goto(&self, url: &str) -> Result<(), HarnessError>;
    async fn screenshot_png(&self) -> Result<Vec<u8>, HarnessError>;
    async fn page_source(&self) -> Result<String, HarnessError>;
}

#[derive(Debug, Clone)]
pub struct WebDriverSession {
    driver: WebDriver,
}

impl WebDriverSession {
    pub const fn new(driver: WebDriver) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl TestSession for WebDriverSession {
    async fn run(&self, script: &str, args: Vec<Value>) -> Result<Value, HarnessError> {
        let ret = self
            .driver
            .execute(script, args)
            .await
            .map_err(|e| HarnessError::SessionUnavailable(e.to_string()))?;
        Ok(ret.json().clone())
    }

    async fn goto(&self, url: &str) -> Result<(), HarnessError> {
        super::session::navigate(&self.driver, url).await
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>, HarnessError> {
        self.driver
            .screenshot_as_png()
            .await
            .map_err(|e| HarnessError::SessionUnavailable(e.to_string()))
    }

    async fn page_source(&self) -> Result<String, HarnessError> {
        self.driver
            .source()
            .await
            .map_err(|e| HarnessError::SessionUnavailable(e.to_string()))
    }
}

/// Readiness predicate. Installs a console-error hook on the first poll so
/// later polls can report anything the page logged through `console.error`.
pub const READINESS_PROBE: &str = r"
try {
    if (!window.__harnessConsoleErrors) {
        window.__harnessConsoleErrors = [];
        const orig = console.error;
        console.error = function () {
            try {
                window.__harnessConsoleErrors.push(Array.prototype.slice.call(arguments).join(' '));
            } catch (ignored) {}
            return orig.apply(console, arguments);
        };
    }
    return {
        success: true,
        coreLibraryLoaded: typeof window.p5 !== 'undefined',
        appInitialized: window.colonyReady === true,
        domReady: document.readyState === 'complete',
        consoleErrors: window.__harnessConsoleErrors.slice(0, 20)
    };
} catch (e) {
    return { success: false, error: String(e) };
}";

/// Shared capability check: walks `arguments[0]` as a dotted path from
/// `window` and reports whether `arguments[1]` names a callable member.
pub const CAPABILITY_PROBE: &str = r"
try {
    const path = arguments[0];
    const member = arguments[1];
    let obj = window;
    for (const part of path.split('.')) {
        obj = obj ? obj[part] : undefined;
    }
    const present = !!obj && (!member || typeof obj[member] === 'function');
    return { success: true, present: present };
} catch (e) {
    return { success: false, error: String(e) };
}";

pub const COUNT_QUERY: &str = r"
try {
    if (!window.entityManager || typeof window.entityManager.getCount !== 'function') {
        return { success: false, error: 'entityManager.getCount is not available' };
    }
    return { success: true, count: window.entityManager.getCount(arguments[0]) };
} catch (e) {
    return { success: false, error: String(e) };
}";

pub const RESET_REGISTRY: &str = r"
try {
    if (!window.entityManager || typeof window.entityManager.reset !== 'function') {
        return { success: false, error: 'entityManager.reset is not available' };
    }
    window.entityManager.reset();
    return { success: true };
} catch (e) {
    return { success: false, error: String(e) };
}";

pub const EXECUTE_ACTION: &str = r"
try {
    if (!window.actionDispatcher || typeof window.actionDispatcher.executeAction !== 'function') {
        return { success: false, error: 'actionDispatcher.executeAction is not available' };
    }
    const outcome = window.actionDispatcher.executeAction(arguments[0]);
    if (outcome && outcome.success === false) {
        return { success: false, error: String(outcome.error || 'action rejected') };
    }
    return { success: true, detail: outcome === undefined ? null : outcome };
} catch (e) {
    return { success: false, error: String(e) };
}";

pub const TOGGLE_LAYER: &str = r"
try {
    if (!window.layerManager || typeof window.layerManager.toggleLayer !== 'function') {
        return { success: false, error: 'layerManager.toggleLayer is not available' };
    }
    window.layerManager.toggleLayer(arguments[0]);
    return { success: true, enabled: window.layerManager.isLayerEnabled(arguments[0]) === true };
} catch (e) {
    return { success: false, error: String(e) };
}";

pub const IS_LAYER_ENABLED: &str = r"
try {
    if (!window.layerManager || typeof window.layerManager.isLayerEnabled !== 'function') {
        return { success: false, error: 'layerManager.isLayerEnabled is not available' };
    }
    return { success: true, enabled: window.layerManager.isLayerEnabled(arguments[0]) === true };
} catch (e) {
    return { success: false, error: String(e) };
}";

/// Best-effort state snapshot for failure artifacts.
pub const STATE_SNAPSHOT: &str = r"
try {
    const counts = {};
    if (window.entityManager && typeof window.entityManager.getCount === 'function') {
        for (const kind of ['ant', 'food', 'nest']) {
            counts[kind] = window.entityManager.getCount(kind);
        }
    }
    return { success: true, ready: window.colonyReady === true, counts: counts };
} catch (e) {
    return { success: false, error: String(e) };
}";

#[derive(Debug, Clone, Deserialize)]
pub struct ReadinessFields {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, rename = "coreLibraryLoaded")]
    pub core_library_loaded: bool,
    #[serde(default, rename = "appInitialized")]
    pub app_initialized: bool,
    #[serde(default, rename = "domReady")]
    pub dom_ready: bool,
    #[serde(default, rename = "consoleErrors")]
    pub console_errors: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CapabilityCheck {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub present: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountQuery {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub detail: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LayerState {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub enabled: bool,
}

/// Validates a raw probe return value into one of the typed payloads.
pub fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).context("probe returned an unexpected shape")
}

pub async fn has_capability(
    session: &dyn TestSession,
    object_path: &str,
    member: &str,
) -> Result<bool> {
    let raw = session
        .run(CAPABILITY_PROBE, vec![object_path.into(), member.into()])
        .await?;
    let check: CapabilityCheck = decode(raw)?;
    anyhow::ensure!(
        check.success,
        "capability probe for {object_path}.{member} failed: {}",
        check.error.unwrap_or_default()
    );
    Ok(check.present)
}
