use std::time::Duration;
use thirtyfour::ChromiumLikeCapabilities;
use thirtyfour::prelude::*;

use super::probe::HarnessError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BrowserKind {
    Chrome,
    Edge,
    Firefox,
    Safari,
}

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub headless: bool,
    pub window_size: (u32, u32),
    pub disable_gpu: bool,
    pub page_load_timeout_secs: u64,
    pub implicit_wait_secs: u64,
    pub script_timeout_secs: u64,
    pub remote_hub: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_size: (1280, 800),
            disable_gpu: true,
            page_load_timeout_secs: 30,
            implicit_wait_secs: 3,
            script_timeout_secs: 15,
            remote_hub: None,
        }
    }
}

pub async fn new_session(kind: BrowserKind, cfg: &BrowserConfig) -> WebDriverResult<WebDriver> {
    let (w, h) = cfg.window_size;
    let driver = match kind {
        BrowserKind::Chrome => {
            let mut caps = DesiredCapabilities::chrome();
            if cfg.headless {
                caps.set_headless()?;
            }
            if cfg.disable_gpu {
                caps.add_arg("--disable-gpu")?;
            }
            caps.add_arg(&format!("--window-size={w},{h}"))?;

            let url = cfg.remote_hub.as_deref().unwrap_or("http://localhost:9515");
            WebDriver::new(url, caps).await?
        }
        BrowserKind::Edge => {
            let mut caps = DesiredCapabilities::edge();
            if cfg.headless {
                caps.set_headless()?;
            }
            if cfg.disable_gpu {
                caps.add_arg("--disable-gpu")?;
            }
            caps.add_arg(&format!("--window-size={w},{h}"))?;

            let url = cfg
                .remote_hub
                .as_deref()
                .unwrap_or("http://localhost:17556");
            WebDriver::new(url, caps).await?
        }
        BrowserKind::Firefox => {
            let mut caps = DesiredCapabilities::firefox();
            if cfg.headless {
                caps.set_headless()?;
            }

            let url = cfg.remote_hub.as_deref().unwrap_or("http://localhost:4444");
            WebDriver::new(url, caps).await?
        }
        BrowserKind::Safari => {
            let caps = DesiredCapabilities::safari();
            let url = cfg.remote_hub.as_deref().unwrap_or("http://localhost:4445");
            WebDriver::new(url, caps).await?
        }
    };

    driver
        .set_page_load_timeout(Duration::from_secs(cfg.page_load_timeout_secs))
        .await?;
    driver
        .set_implicit_wait_timeout(Duration::from_secs(cfg.implicit_wait_secs))
        .await?;
    driver
        .set_script_timeout(Duration::from_secs(cfg.script_timeout_secs))
        .await?;
    Ok(driver)
}

/// Navigates to an http(s) or file:// target. Failures carry the attempted
/// target so the diagnostic names what could not be reached.
pub async fn navigate(driver: &WebDriver, target: &str) -> Result<(), HarnessError> {
    driver
        .goto(target)
        .await
        .map_err(|e| HarnessError::NavigationFailed {
            target: target.to_string(),
            message: e.to_string(),
        })
}
