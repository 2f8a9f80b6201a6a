//! Static-file server fallback.
//!
//! When the base URL points at localhost and nothing is listening there,
//! the harness spawns `python3 -m http.server` over a configured docroot so
//! a checkout can be tested without starting a dev server by hand. The
//! child process is killed when the handle drops. Not used for file://
//! navigation.

use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use log::{info, warn};

const CANDIDATE_PORTS: [u16; 3] = [8000, 8080, 5173];
const PROBE_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Debug)]
pub struct StaticServer {
    child: Child,
    pub port: u16,
}

impl StaticServer {
    /// Ensures something serves the base URL. Returns `None` when no server
    /// is needed (non-localhost or file:// target) or one is already
    /// listening on the URL's port or a known candidate port.
    pub fn ensure(base_url: &str, docroot: &Path) -> Result<Option<Self>> {
        let Some(port) = localhost_port(base_url) else {
            return Ok(None);
        };

        let mut candidates = vec![port];
        candidates.extend(CANDIDATE_PORTS.iter().filter(|p| **p != port));
        if candidates.iter().any(|p| port_listening(*p)) {
            return Ok(None);
        }

        if !docroot.is_dir() {
            bail!(
                "nothing is listening on port {port} and serve dir {} does not exist",
                docroot.display()
            );
        }

        info!("spawning static server on port {port} for {}", docroot.display());
        let child = Command::new("python3")
            .arg("-m")
            .arg("http.server")
            .arg(port.to_string())
            .arg("--directory")
            .arg(docroot)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("spawning python3 -m http.server")?;

        let server = Self { child, port };
        for _ in 0..25 {
            if port_listening(port) {
                return Ok(Some(server));
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        bail!("static server on port {port} never became reachable");
    }
}

impl Drop for StaticServer {
    fn drop(&mut self) {
        if self.child.kill().is_err() {
            warn!("static server on port {} already exited", self.port);
        }
        let _ = self.child.wait();
    }
}

/// Extracts the port when the URL targets localhost over http(s).
fn localhost_port(base_url: &str) -> Option<u16> {
    let rest = base_url
        .strip_prefix("http://")
        .or_else(|| base_url.strip_prefix("https://"))?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let (host, port) = match authority.rsplit_once(':') {
        Some((h, p)) => (h, p.parse::<u16>().ok()?),
        None => (authority, 80),
    };
    matches!(host, "localhost" | "127.0.0.1").then_some(port)
}

fn port_listening(port: u16) -> bool {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    TcpStream::connect_timeout(&addr, PROBE_TIMEOUT).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localhost_port_parses_common_shapes() {
        assert_eq!(localhost_port("http://localhost:8000"), Some(8000));
        assert_eq!(localhost_port("http://127.0.0.1:9090/index.html"), Some(9090));
        assert_eq!(localhost_port("http://localhost:8000/?test=1"), Some(8000));
        assert_eq!(localhost_port("http://localhost"), Some(80));
    }

    #[test]
    fn non_localhost_targets_need_no_server() {
        assert_eq!(localhost_port("http://colony.example:8000"), None);
        assert_eq!(localhost_port("file:///srv/colony/index.html"), None);
        assert_eq!(localhost_port("not a url"), None);
    }

    #[test]
    fn ensure_skips_when_a_listener_exists() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let url = format!("http://127.0.0.1:{port}");
        let server = StaticServer::ensure(&url, Path::new("/nonexistent")).expect("ensure");
        assert!(server.is_none());
    }

    #[test]
    fn ensure_skips_file_urls() {
        let server =
            StaticServer::ensure("file:///srv/colony/index.html", Path::new(".")).expect("ensure");
        assert!(server.is_none());
    }
}
