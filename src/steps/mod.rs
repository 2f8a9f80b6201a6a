//! Step definition library.
//!
//! Each step translates one natural-language clause into probe calls plus an
//! assertion. Patterns use `{name}` placeholders compiled to anchored
//! regexes; the leading Given/When/Then keyword is stripped before matching.

pub mod actions;
pub mod entities;
pub mod layers;
pub mod session;
pub mod visual;

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};

use crate::browser::{ReadinessPoller, TestSession};
use crate::visual::VisualHelper;

/// Scenario-scoped mutable bag. A fresh context is built for every scenario;
/// nothing carries over except the shared browser process itself.
pub struct StepContext {
    pub session: Arc<dyn TestSession>,
    pub base_url: String,
    pub readiness: ReadinessPoller,
    pub visual: VisualHelper,
    pub noise_threshold: u32,
    pub verbose: bool,
    slots: BTreeMap<String, Value>,
    details: Map<String, Value>,
}

impl StepContext {
    pub fn new(
        session: Arc<dyn TestSession>,
        base_url: impl Into<String>,
        readiness: ReadinessPoller,
        visual: VisualHelper,
    ) -> Self {
        Self {
            session,
            base_url: base_url.into(),
            readiness,
            visual,
            noise_threshold: 30,
            verbose: false,
            slots: BTreeMap::new(),
            details: Map::new(),
        }
    }

    /// Stores a value produced by this step for later steps in the same
    /// scenario.
    pub fn set_slot(&mut self, name: impl Into<String>, value: Value) {
        self.slots.insert(name.into(), value);
    }

    pub fn slot(&self, name: &str) -> Option<&Value> {
        self.slots.get(name)
    }

    /// Attaches a diagnostic detail that ends up on the scenario record.
    pub fn note_detail(&mut self, name: impl Into<String>, value: Value) {
        self.details.insert(name.into(), value);
    }

    pub fn take_details(&mut self) -> Value {
        if self.details.is_empty() {
            Value::Null
        } else {
            Value::Object(std::mem::take(&mut self.details))
        }
    }
}

/// Arguments captured from a step's placeholder pattern.
#[derive(Debug, Clone, Default)]
pub struct StepArgs {
    values: BTreeMap<String, String>,
}

impl StepArgs {
    pub fn get(&self, name: &str) -> Result<&str> {
        self.values
            .get(name)
            .map(String::as_str)
            .with_context(|| format!("step pattern captured no argument named {name}"))
    }

    pub fn parsed<T>(&self, name: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        let raw = self.get(name)?;
        raw.parse()
            .with_context(|| format!("argument {name}={raw} did not parse"))
    }
}

#[async_trait]
pub trait StepDef: Send + Sync {
    /// Clause text with `{name}` placeholders, keyword excluded.
    fn pattern(&self) -> &'static str;

    async fn execute(&self, ctx: &mut StepContext, args: &StepArgs) -> Result<()>;
}

pub struct StepRegistry {
    entries: Vec<(Regex, Arc<dyn StepDef>)>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// All step definitions the built-in feature catalog uses.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(session::PageLoadedStep));
        registry.register(Arc::new(session::SettleStep));
        registry.register(Arc::new(entities::ResetRegistryStep));
        registry.register(Arc::new(entities::SpawnAntsStep));
        registry.register(Arc::new(entities::AtLeastAntsStep));
        registry.register(Arc::new(entities::ExactCountStep));
        registry.register(Arc::new(layers::ToggleLayerStep));
        registry.register(Arc::new(layers::LayerStateStep));
        registry.register(Arc::new(actions::ExecuteActionStep));
        registry.register(Arc::new(actions::LastActionStep));
        registry.register(Arc::new(visual::CanvasBaselineStep));
        registry
    }

    pub fn register(&mut self, step: Arc<dyn StepDef>) {
        let regex = compile_pattern(step.pattern());
        self.entries.push((regex, step));
    }

    /// Resolves step text (keyword included) to a definition and its
    /// captured arguments. First registered match wins.
    pub fn resolve(&self, text: &str) -> Option<(Arc<dyn StepDef>, StepArgs)> {
        let clause = strip_keyword(text);
        for (regex, step) in &self.entries {
            if let Some(caps) = regex.captures(clause) {
                let mut values = BTreeMap::new();
                for name in regex.capture_names().flatten() {
                    if let Some(m) = caps.name(name) {
                        values.insert(name.to_string(), m.as_str().to_string());
                    }
                }
                return Some((Arc::clone(step), StepArgs { values }));
            }
        }
        None
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Drops the leading Gherkin keyword, if any, before pattern matching.
pub fn strip_keyword(text: &str) -> &str {
    let trimmed = text.trim();
    for keyword in ["given ", "when ", "then ", "and ", "but "] {
        // get() rather than slicing: the cut may land mid-character in
        // non-ASCII step text.
        if let Some(head) = trimmed.get(..keyword.len())
            && head.eq_ignore_ascii_case(keyword)
        {
            return trimmed[keyword.len()..].trim_start();
        }
    }
    trimmed
}

fn compile_pattern(pattern: &str) -> Regex {
    let placeholder = Regex::new(r"\{([a-z_]+)\}").expect("placeholder regex");
    let mut source = String::from("^");
    let mut last = 0;
    for caps in placeholder.captures_iter(pattern) {
        let whole = caps.get(0).expect("match");
        source.push_str(&regex::escape(&pattern[last..whole.start()]));
        source.push_str(&format!("(?P<{}>.+?)", &caps[1]));
        last = whole.end();
    }
    source.push_str(&regex::escape(&pattern[last..]));
    source.push('$');
    Regex::new(&source).expect("step pattern compiles")
}

/// Shared assertion helper: a missing subject API is always a failure, never
/// a fabricated pass.
pub async fn require_capability(
    ctx: &StepContext,
    object_path: &str,
    member: &str,
) -> Result<()> {
    let present =
        crate::browser::probe::has_capability(ctx.session.as_ref(), object_path, member).await?;
    if !present {
        bail!("the application does not expose {object_path}.{member}; refusing to fake a result");
    }
    Ok(())
}
