mod browser;
mod common;
mod features;
mod runner;
mod steps;
mod visual;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use log::info;

use browser::{
    BrowserConfig, BrowserKind, ReadinessPoller, StaticServer, TestSession, WebDriverSession,
    new_session,
};
use common::report::{TestRunReport, print_summary};
use common::split_csv;
use features::select_features;
use runner::Runner;
use steps::{StepContext, StepRegistry};
use visual::VisualHelper;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum HeadlessMode {
    /// Run browsers in headless mode
    Headless,
    /// Run browsers with visible windows
    Windowed,
}

impl HeadlessMode {
    const fn is_headless(self) -> bool {
        matches!(self, Self::Headless)
    }
}

#[derive(Debug, Parser)]
#[command(name = "colony-tester", version = "0.4.0")]
#[command(about = "Automated browser QA harness for the Colony canvas simulation")]
struct Args {
    /// Base URL of the running simulation (http(s) or file://)
    #[arg(long, env = "TEST_URL", default_value = "http://localhost:8000")]
    base_url: String,

    /// Features to run (comma-separated keys, or "all")
    #[arg(long, default_value = "all")]
    features: String,

    /// List all available features and exit
    #[arg(long)]
    list_features: bool,

    /// Scenario tags to skip (comma-separated)
    #[arg(long, default_value = "@skip")]
    skip_tags: String,

    /// Browsers to run (chrome,edge,firefox,safari)
    #[arg(long, default_value = "chrome")]
    browsers: String,

    /// Run headless where supported
    #[arg(long, value_enum, default_value_t = HeadlessMode::Headless)]
    headless: HeadlessMode,

    /// Browser window size as WxH
    #[arg(long, default_value = "1280x800")]
    window_size: String,

    /// Connect to a Selenium Grid hub instead of local drivers
    #[arg(long)]
    hub: Option<String>,

    /// Directory the JSON run reports are written to
    #[arg(long, default_value = "target/test-results")]
    results_dir: PathBuf,

    /// Directory for baseline/current screenshot pairs
    #[arg(long, default_value = "target/screenshots")]
    screenshots_dir: PathBuf,

    /// Artifacts directory for failure screenshots and logs
    #[arg(long, default_value = "target/test-artifacts")]
    artifacts_dir: String,

    /// Docroot for the static-server fallback
    #[arg(long, default_value = ".")]
    serve_dir: PathBuf,

    /// Seconds to wait for the application to become ready
    #[arg(long, default_value_t = 20)]
    ready_timeout_secs: u64,

    /// Milliseconds between readiness polls
    #[arg(long, default_value_t = 250)]
    poll_interval_ms: u64,

    /// Page load timeout in seconds
    #[arg(long, default_value_t = 30)]
    page_load_timeout_secs: u64,

    /// In-page script timeout in seconds
    #[arg(long, default_value_t = 15)]
    script_timeout_secs: u64,

    /// Per-channel-sum noise threshold for the pixel diff
    #[arg(long, default_value_t = 30)]
    noise_threshold: u32,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.list_features {
        println!("Available features:");
        for (key, name, scenarios) in features::list_features() {
            println!("  {key:15} - {name} ({scenarios} scenarios)");
        }
        return Ok(());
    }

    println!("{}", "🐜 Colony Automated Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());

    let (selected, unknown) = select_features(&args.features);
    for key in &unknown {
        eprintln!("⚠️  Unknown feature: {}", key.yellow());
    }
    let start_time = Instant::now();
    let mut report = TestRunReport::new();

    if selected.is_empty() {
        report.add_message("no features matched the request; zero scenarios executed".to_string());
        finish(&args, &report, start_time)?;
        std::process::exit(1);
    }

    // Convenience fallback for local checkouts; harmless when a dev server
    // or a file:// target is in use.
    let _server = match StaticServer::ensure(&args.base_url, &args.serve_dir) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("❌ Static server fallback failed: {e:#}");
            report.add_message(format!(
                "environment error before any scenario ran: {e:#}"
            ));
            finish(&args, &report, start_time)?;
            std::process::exit(1);
        }
    };

    let browsers = split_csv(&args.browsers);
    if browsers.is_empty() {
        report.add_message("no browsers requested; zero scenarios executed".to_string());
        finish(&args, &report, start_time)?;
        std::process::exit(1);
    }

    let mut environment_failed = false;
    for browser_name in browsers {
        let Some(kind) = parse_browser_kind(&browser_name) else {
            eprintln!("❌ Unknown browser: {}", browser_name.yellow());
            report.add_message(format!("unknown browser '{browser_name}'; nothing executed for it"));
            environment_failed = true;
            continue;
        };

        let cfg = build_browser_config(&args);
        let driver = match new_session(kind, &cfg).await {
            Ok(d) => d,
            Err(e) => {
                eprintln!("❌ Could not start {kind:?}: {e}");
                report.add_message(format!(
                    "browser {kind:?} unavailable ({e}); its scenarios were not executed"
                ));
                environment_failed = true;
                continue;
            }
        };
        info!("started {kind:?} session against {}", args.base_url);

        let session: Arc<dyn TestSession> = Arc::new(WebDriverSession::new(driver.clone()));
        let mut runner = Runner::new(StepRegistry::builtin());
        runner.skip_tags = split_csv(&args.skip_tags);
        runner.artifacts_base = args.artifacts_dir.clone();
        runner.browser_label = browser_label(kind);
        runner.verbose = args.verbose;

        let poller = ReadinessPoller::new(
            Duration::from_secs(args.ready_timeout_secs),
            Duration::from_millis(args.poll_interval_ms),
        );
        let base_url = args.base_url.clone();
        let screenshots_dir = args.screenshots_dir.clone();
        let noise_threshold = args.noise_threshold;
        let session_for_ctx = Arc::clone(&session);
        let aborted = runner
            .run_features(&selected, &session, &mut report, move || {
                let mut ctx = StepContext::new(
                    Arc::clone(&session_for_ctx),
                    base_url.clone(),
                    poller,
                    VisualHelper::new(screenshots_dir.clone()),
                );
                ctx.noise_threshold = noise_threshold;
                ctx
            })
            .await;

        let _ = driver.quit().await;

        if aborted {
            environment_failed = true;
            break;
        }
    }

    finish(&args, &report, start_time)?;

    if environment_failed || !report.all_passed() {
        std::process::exit(1);
    }
    Ok(())
}

fn finish(args: &Args, report: &TestRunReport, start_time: Instant) -> Result<()> {
    debug_assert!(report.counts_consistent());
    let path = report.write_json(&args.results_dir)?;
    print_summary(report, start_time.elapsed());
    println!("📄 Report written to {}", path.display());
    Ok(())
}

fn parse_browser_kind(name: &str) -> Option<BrowserKind> {
    match name {
        "chrome" => Some(BrowserKind::Chrome),
        "edge" => Some(BrowserKind::Edge),
        "firefox" => Some(BrowserKind::Firefox),
        "safari" => Some(BrowserKind::Safari),
        _ => None,
    }
}

fn browser_label(kind: BrowserKind) -> String {
    format!("{kind:?}").to_lowercase()
}

fn build_browser_config(args: &Args) -> BrowserConfig {
    BrowserConfig {
        headless: args.headless.is_headless(),
        window_size: parse_window_size(&args.window_size).unwrap_or((1280, 800)),
        page_load_timeout_secs: args.page_load_timeout_secs,
        script_timeout_secs: args.script_timeout_secs,
        remote_hub: args.hub.clone(),
        ..BrowserConfig::default()
    }
}

fn parse_window_size(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.split_once(['x', 'X'])?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            base_url: "http://localhost:8000".to_string(),
            features: "all".to_string(),
            list_features: false,
            skip_tags: "@skip".to_string(),
            browsers: "chrome".to_string(),
            headless: HeadlessMode::Headless,
            window_size: "1280x800".to_string(),
            hub: None,
            results_dir: PathBuf::from("target/test-results"),
            screenshots_dir: PathBuf::from("target/screenshots"),
            artifacts_dir: "target/test-artifacts".to_string(),
            serve_dir: PathBuf::from("."),
            ready_timeout_secs: 20,
            poll_interval_ms: 250,
            page_load_timeout_secs: 30,
            script_timeout_secs: 15,
            noise_threshold: 30,
            verbose: false,
        }
    }

    #[test]
    fn parse_browser_kind_handles_known_and_unknown() {
        assert!(matches!(parse_browser_kind("chrome"), Some(BrowserKind::Chrome)));
        assert!(matches!(parse_browser_kind("firefox"), Some(BrowserKind::Firefox)));
        assert!(parse_browser_kind("netscape").is_none());
    }

    #[test]
    fn window_size_parses_and_rejects() {
        assert_eq!(parse_window_size("1280x800"), Some((1280, 800)));
        assert_eq!(parse_window_size("1920X1080"), Some((1920, 1080)));
        assert_eq!(parse_window_size("square"), None);
        assert_eq!(parse_window_size("12x"), None);
    }

    #[test]
    fn build_browser_config_respects_flags() {
        let mut args = base_args();
        args.headless = HeadlessMode::Windowed;
        args.hub = Some("http://remote.example".to_string());
        args.window_size = "800x600".to_string();
        let cfg = build_browser_config(&args);
        assert!(!cfg.headless);
        assert_eq!(cfg.window_size, (800, 600));
        assert_eq!(cfg.remote_hub.as_deref(), Some("http://remote.example"));
    }

    #[test]
    fn bad_window_size_falls_back_to_default() {
        let mut args = base_args();
        args.window_size = "huge".to_string();
        let cfg = build_browser_config(&args);
        assert_eq!(cfg.window_size, (1280, 800));
    }

    #[test]
    fn browser_label_is_lowercase() {
        assert_eq!(browser_label(BrowserKind::Chrome), "chrome");
        assert_eq!(browser_label(BrowserKind::Edge), "edge");
    }
}
