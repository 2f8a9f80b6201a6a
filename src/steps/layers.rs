//! Render layer steps.

use anyhow::{Result, bail, ensure};
use async_trait::async_trait;

use super::{StepArgs, StepContext, StepDef, require_capability};
use crate::browser::probe::{self, LayerState, decode};

/// `I toggle the {layer} layer`
pub struct ToggleLayerStep;

#[async_trait]
impl StepDef for ToggleLayerStep {
    fn pattern(&self) -> &'static str {
        "I toggle the {layer} layer"
    }

    async fn execute(&self, ctx: &mut StepContext, args: &StepArgs) -> Result<()> {
        let layer = args.get("layer")?;
        require_capability(ctx, "layerManager", "toggleLayer").await?;
        let raw = ctx.session.run(probe::TOGGLE_LAYER, vec![layer.into()]).await?;
        let state: LayerState = decode(raw)?;
        ensure!(
            state.success,
            "toggling layer {layer} failed: {}",
            state.error.unwrap_or_default()
        );
        ctx.set_slot(
            format!("layer:{layer}"),
            serde_json::json!({ "enabled": state.enabled }),
        );
        Ok(())
    }
}

/// `the {layer} layer should be {state}` where state is enabled|disabled.
pub struct LayerStateStep;

#[async_trait]
impl StepDef for LayerStateStep {
    fn pattern(&self) -> &'static str {
        "the {layer} layer should be {state}"
    }

    async fn execute(&self, ctx: &mut StepContext, args: &StepArgs) -> Result<()> {
        let layer = args.get("layer")?;
        let expected = match args.get("state")? {
            "enabled" => true,
            "disabled" => false,
            other => bail!("layer state must be 'enabled' or 'disabled', got '{other}'"),
        };

        let raw = ctx
            .session
            .run(probe::IS_LAYER_ENABLED, vec![layer.into()])
            .await?;
        let state: LayerState = decode(raw)?;
        ensure!(
            state.success,
            "querying layer {layer} failed: {}",
            state.error.unwrap_or_default()
        );
        ensure!(
            state.enabled == expected,
            "expected layer {layer} to be {}, but it is {}",
            if expected { "enabled" } else { "disabled" },
            if state.enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }
}
