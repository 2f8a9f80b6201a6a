pub mod report;

use anyhow::{Context, Result};
use chrono::Utc;
use std::{fs, path::Path};

use crate::browser::TestSession;
use crate::browser::probe;

pub fn artifacts_dir(base: &str, browser: &str, feature: &str, scenario: &str) -> String {
    let ts = Utc::now().format("%Y%m%dT%H%M%S");
    let feature = slug(feature);
    let scenario = slug(scenario);
    format!("{base}/{browser}/{feature}/{scenario}/{ts}")
}

fn slug(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

/// Captures whatever diagnostics the session can still produce after a
/// scenario failure: screenshot, DOM source, an application state snapshot,
/// and the error chain.
pub async fn capture_artifacts(
    session: &dyn TestSession,
    dir: &str,
    err: &anyhow::Error,
) -> Result<()> {
    let screenshot = session.screenshot_png().await.ok();
    let source = session.page_source().await.ok();
    let state = session.run(probe::STATE_SNAPSHOT, vec![]).await.ok();
    let chain = format!("{err:#}");

    write_artifact_files(
        Path::new(dir),
        screenshot.as_deref(),
        source.as_deref(),
        state.as_ref(),
        &chain,
    )
}

fn write_artifact_files(
    dir: &Path,
    screenshot: Option<&[u8]>,
    source: Option<&str>,
    state: Option<&serde_json::Value>,
    error_chain: &str,
) -> Result<()> {
    fs::create_dir_all(dir).context("creating artifacts dir")?;

    if let Some(png) = screenshot {
        let _ = fs::write(dir.join("screenshot.png"), png);
    }

    if let Some(src) = source {
        let _ = fs::write(dir.join("dom.html"), src);
    }

    if let Some(state_json) = state {
        let payload = serde_json::to_vec_pretty(state_json).unwrap_or_default();
        let _ = fs::write(dir.join("state.json"), payload);
    }

    let _ = fs::write(dir.join("error.txt"), error_chain);

    Ok(())
}

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::probe::stub::StubSession;
    use serde_json::json;

    #[test]
    fn split_csv_trims_and_filters() {
        let parts = split_csv(" alpha, ,beta,  gamma ");
        assert_eq!(parts, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn artifacts_dir_includes_key_segments() {
        let dir = artifacts_dir("target/out", "chrome", "Ant population", "spawn workers");
        assert!(dir.contains("target/out/chrome/ant-population/spawn-workers/"));
    }

    #[test]
    fn write_artifact_files_writes_expected_payloads() {
        let base = std::env::temp_dir().join(format!(
            "colony-artifacts-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        let state = json!({ "ready": true, "counts": { "ant": 3 } });
        write_artifact_files(
            &base,
            Some(&[1, 2, 3]),
            Some("<html />"),
            Some(&state),
            "boom",
        )
        .expect("write artifacts");

        assert!(base.join("screenshot.png").exists());
        assert!(base.join("dom.html").exists());
        assert!(base.join("state.json").exists());
        assert!(base.join("error.txt").exists());
    }

    #[test]
    fn capture_artifacts_survives_a_stub_session() {
        let base = std::env::temp_dir().join(format!(
            "colony-capture-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        let session = StubSession::new();
        let err = anyhow::anyhow!("scenario failed");
        tokio_test::block_on(capture_artifacts(
            &session,
            base.to_str().expect("utf8 path"),
            &err,
        ))
        .expect("capture");
        assert!(base.join("error.txt").exists());
        assert!(base.join("state.json").exists());
    }
}
