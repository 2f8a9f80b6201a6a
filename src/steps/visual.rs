//! Visual regression step.

use anyhow::{Result, ensure};
use async_trait::async_trait;
use log::info;
use serde_json::json;

use super::{StepArgs, StepContext, StepDef};
use crate::visual::DiffOutcome;

/// `the canvas should match the {key} baseline within {percent}%`
///
/// The helper measures; this step owns the pass/fail policy. A missing
/// baseline bootstraps and is noted on the scenario record so it can never
/// read as a comparison pass.
pub struct CanvasBaselineStep;

#[async_trait]
impl StepDef for CanvasBaselineStep {
    fn pattern(&self) -> &'static str {
        "the canvas should match the {key} baseline within {percent}%"
    }

    async fn execute(&self, ctx: &mut StepContext, args: &StepArgs) -> Result<()> {
        let key = args.get("key")?.to_string();
        let max_percent: f64 = args.parsed("percent")?;
        ensure!(
            (0.0..=100.0).contains(&max_percent),
            "difference budget must be between 0 and 100 percent, got {max_percent}"
        );

        let png = ctx.session.screenshot_png().await?;
        ensure!(!png.is_empty(), "capture produced an empty screenshot");

        let outcome = ctx.visual.compare(&key, &png, ctx.noise_threshold)?;
        match outcome {
            DiffOutcome::BaselineCreated { baseline_path } => {
                info!("no baseline for '{key}'; bootstrapped {}", baseline_path.display());
                ctx.note_detail(
                    "visual",
                    json!({ "key": key, "outcome": "baseline-created" }),
                );
                Ok(())
            }
            DiffOutcome::Compared(report) => {
                let percent = report.diff_pixel_fraction * 100.0;
                ctx.note_detail(
                    "visual",
                    json!({
                        "key": key,
                        "outcome": "compared",
                        "diffPixelFraction": report.diff_pixel_fraction,
                        "diffPixels": report.diff_pixels,
                        "totalPixels": report.total_pixels,
                    }),
                );
                ensure!(
                    percent <= max_percent,
                    "canvas diverged from the '{key}' baseline: {percent:.2}% of pixels differ, budget is {max_percent}%"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::probe::stub::StubSession;
    use crate::steps::{StepRegistry, testutil::stub_context};
    use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(rgba: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(4, 4, Rgba(rgba));
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
            .expect("encode");
        buf
    }

    fn resolve(text: &str) -> StepArgs {
        StepRegistry::builtin().resolve(text).expect("resolve").1
    }

    #[test]
    fn first_capture_bootstraps_and_is_noted_distinctly() {
        let stub = StubSession::new();
        stub.state.lock().unwrap().screenshot = png_bytes([9, 9, 9, 255]);
        let mut ctx = stub_context(stub);
        let args = resolve("Then the canvas should match the settled baseline within 5%");
        tokio_test::block_on(CanvasBaselineStep.execute(&mut ctx, &args)).expect("bootstrap");
        let details = ctx.take_details();
        assert_eq!(details["visual"]["outcome"], "baseline-created");
    }

    #[test]
    fn identical_recapture_passes_as_a_comparison() {
        let stub = StubSession::new();
        stub.state.lock().unwrap().screenshot = png_bytes([9, 9, 9, 255]);
        let mut ctx = stub_context(stub);
        let args = resolve("Then the canvas should match the settled baseline within 5%");
        tokio_test::block_on(CanvasBaselineStep.execute(&mut ctx, &args)).expect("bootstrap");
        tokio_test::block_on(CanvasBaselineStep.execute(&mut ctx, &args)).expect("compare");
        let details = ctx.take_details();
        assert_eq!(details["visual"]["outcome"], "compared");
        assert_eq!(details["visual"]["diffPixels"], 0);
    }

    #[test]
    fn divergent_recapture_fails_with_percentages() {
        let stub = StubSession::new();
        stub.state.lock().unwrap().screenshot = png_bytes([0, 0, 0, 255]);
        let mut ctx = stub_context(stub);
        let args = resolve("Then the canvas should match the settled baseline within 5%");
        tokio_test::block_on(CanvasBaselineStep.execute(&mut ctx, &args)).expect("bootstrap");

        ctx.session = std::sync::Arc::new({
            let stub = StubSession::new();
            stub.state.lock().unwrap().screenshot = png_bytes([255, 255, 255, 255]);
            stub
        });
        let err = tokio_test::block_on(CanvasBaselineStep.execute(&mut ctx, &args))
            .expect_err("diverged");
        let message = err.to_string();
        assert!(message.contains("100.00%"));
        assert!(message.contains("budget is 5%"));
    }

    #[test]
    fn budget_must_be_a_percentage() {
        let mut ctx = stub_context(StubSession::new());
        let args = resolve("Then the canvas should match the settled baseline within 250%");
        let err = tokio_test::block_on(CanvasBaselineStep.execute(&mut ctx, &args))
            .expect_err("over 100");
        assert!(err.to_string().contains("between 0 and 100"));
    }
}
