pub mod probe;
pub mod readiness;
pub mod server;
pub mod session;

pub use probe::{HarnessError, TestSession, WebDriverSession};
pub use readiness::{ReadinessPoller, ReadinessReport, ReadinessStatus, RequiredField};
pub use server::StaticServer;
pub use session::{BrowserConfig, BrowserKind, navigate, new_session};
