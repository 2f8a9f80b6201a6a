//! Screenshot capture and pixel diffing.
//!
//! The diff is a deterministic per-pixel metric: a pixel counts as changed
//! when the sum of per-channel absolute differences exceeds the noise
//! threshold. Pass/fail policy lives in the step definitions; this module
//! only measures.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};

#[derive(Debug, Clone)]
pub struct DiffReport {
    pub diff_pixel_fraction: f64,
    pub diff_pixels: u64,
    pub total_pixels: u64,
    pub diff_image: Option<RgbaImage>,
}

#[derive(Debug)]
pub enum DiffOutcome {
    /// No baseline existed for the key; the current capture became the
    /// baseline. Distinct from a comparison so "no baseline" can never be
    /// mistaken for "matched baseline".
    BaselineCreated { baseline_path: PathBuf },
    Compared(DiffReport),
}

/// Pure pixel diff. Images of unequal dimensions are reported as fully
/// different with no per-pixel diff image.
pub fn diff_images(baseline: &RgbaImage, current: &RgbaImage, noise_threshold: u32) -> DiffReport {
    if baseline.dimensions() != current.dimensions() {
        let total = u64::from(baseline.width()) * u64::from(baseline.height());
        return DiffReport {
            diff_pixel_fraction: 1.0,
            diff_pixels: total,
            total_pixels: total,
            diff_image: None,
        };
    }

    let (width, height) = baseline.dimensions();
    let total = u64::from(width) * u64::from(height);
    let mut diff_pixels = 0u64;
    let mut diff_image = RgbaImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let a = baseline.get_pixel(x, y);
            let b = current.get_pixel(x, y);
            let delta: u32 = a
                .0
                .iter()
                .zip(b.0.iter())
                .map(|(ca, cb)| u32::from(ca.abs_diff(*cb)))
                .sum();
            if delta > noise_threshold {
                diff_pixels += 1;
                diff_image.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            } else {
                let faded = a.0.map(|c| c / 4);
                diff_image.put_pixel(x, y, Rgba([faded[0], faded[1], faded[2], 255]));
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let fraction = if total == 0 {
        0.0
    } else {
        diff_pixels as f64 / total as f64
    };

    DiffReport {
        diff_pixel_fraction: fraction,
        diff_pixels,
        total_pixels: total,
        diff_image: Some(diff_image),
    }
}

#[derive(Debug, Clone)]
pub struct VisualHelper {
    screenshots_dir: PathBuf,
}

impl VisualHelper {
    pub fn new(screenshots_dir: impl Into<PathBuf>) -> Self {
        Self {
            screenshots_dir: screenshots_dir.into(),
        }
    }

    pub fn baseline_path(&self, key: &str) -> PathBuf {
        self.screenshots_dir.join("baseline").join(format!("{key}.png"))
    }

    pub fn current_path(&self, key: &str) -> PathBuf {
        self.screenshots_dir.join("current").join(format!("{key}.png"))
    }

    fn diff_path(&self, key: &str) -> PathBuf {
        self.screenshots_dir
            .join("current")
            .join(format!("{key}-diff.png"))
    }

    /// Persists the current capture, then either bootstraps the baseline or
    /// compares against it, writing a diff artifact for inspection.
    pub fn compare(&self, key: &str, current_png: &[u8], noise_threshold: u32) -> Result<DiffOutcome> {
        let current_path = self.current_path(key);
        write_bytes(&current_path, current_png)?;

        let baseline_path = self.baseline_path(key);
        if !baseline_path.exists() {
            write_bytes(&baseline_path, current_png)?;
            return Ok(DiffOutcome::BaselineCreated { baseline_path });
        }

        let baseline_bytes = fs::read(&baseline_path)
            .with_context(|| format!("reading baseline {}", baseline_path.display()))?;
        let baseline = decode_png(&baseline_bytes)?;
        let current = decode_png(current_png)?;

        let report = diff_images(&baseline, &current, noise_threshold);
        if let Some(img) = &report.diff_image {
            let diff_path = self.diff_path(key);
            if let Some(parent) = diff_path.parent() {
                fs::create_dir_all(parent).context("creating diff dir")?;
            }
            img.save(&diff_path)
                .with_context(|| format!("writing diff image {}", diff_path.display()))?;
        }
        Ok(DiffOutcome::Compared(report))
    }
}

fn decode_png(bytes: &[u8]) -> Result<RgbaImage> {
    Ok(image::load_from_memory(bytes)
        .context("decoding PNG capture")?
        .to_rgba8())
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageOutputFormat};
    use std::io::Cursor;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(rgba))
    }

    fn png_bytes(img: &RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img.clone())
            .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
            .expect("encode png");
        buf
    }

    fn temp_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "colony-visual-{label}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ))
    }

    #[test]
    fn identical_images_have_zero_fraction() {
        let a = solid(8, 8, [10, 20, 30, 255]);
        let report = diff_images(&a, &a.clone(), 0);
        assert_eq!(report.diff_pixel_fraction, 0.0);
        assert_eq!(report.diff_pixels, 0);
        assert_eq!(report.total_pixels, 64);
    }

    #[test]
    fn diff_is_idempotent_over_the_same_inputs() {
        let a = solid(16, 16, [0, 0, 0, 255]);
        let mut b = a.clone();
        b.put_pixel(3, 3, Rgba([255, 255, 255, 255]));
        let first = diff_images(&a, &b, 10);
        let second = diff_images(&a, &b, 10);
        assert_eq!(first.diff_pixel_fraction, second.diff_pixel_fraction);
        assert_eq!(first.diff_pixels, 1);
    }

    #[test]
    fn noise_threshold_absorbs_small_channel_drift() {
        let a = solid(4, 4, [100, 100, 100, 255]);
        let b = solid(4, 4, [102, 101, 100, 255]);
        // Per-pixel channel delta sums to 3.
        assert_eq!(diff_images(&a, &b, 10).diff_pixels, 0);
        assert_eq!(diff_images(&a, &b, 2).diff_pixels, 16);
    }

    #[test]
    fn mismatched_dimensions_count_as_fully_different() {
        let a = solid(4, 4, [0, 0, 0, 255]);
        let b = solid(8, 8, [0, 0, 0, 255]);
        let report = diff_images(&a, &b, 0);
        assert_eq!(report.diff_pixel_fraction, 1.0);
        assert!(report.diff_image.is_none());
    }

    #[test]
    fn first_run_bootstraps_the_baseline() {
        let helper = VisualHelper::new(temp_dir("bootstrap"));
        let png = png_bytes(&solid(4, 4, [1, 2, 3, 255]));
        let outcome = helper.compare("canvas", &png, 0).expect("compare");
        match outcome {
            DiffOutcome::BaselineCreated { baseline_path } => {
                assert!(baseline_path.exists());
            }
            DiffOutcome::Compared(_) => panic!("first run must bootstrap, not compare"),
        }
        assert!(helper.current_path("canvas").exists());
    }

    #[test]
    fn second_run_compares_against_the_baseline() {
        let helper = VisualHelper::new(temp_dir("compare"));
        let png = png_bytes(&solid(4, 4, [1, 2, 3, 255]));
        helper.compare("canvas", &png, 0).expect("bootstrap");

        let changed = png_bytes(&solid(4, 4, [200, 2, 3, 255]));
        let outcome = helper.compare("canvas", &changed, 0).expect("compare");
        match outcome {
            DiffOutcome::Compared(report) => {
                assert_eq!(report.diff_pixel_fraction, 1.0);
                assert!(helper.diff_path("canvas").exists());
            }
            DiffOutcome::BaselineCreated { .. } => panic!("baseline already existed"),
        }
    }
}
