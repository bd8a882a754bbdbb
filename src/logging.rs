//! Console logging.
//!
//! All diagnostics go through [`tracing`]. [`init`] installs a colored
//! `tracing-subscriber` formatter filtered by `RUST_LOG` (default `info`), and
//! [`log_request`] emits the one-line access record written for every
//! completed request.

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::http::{Method, StatusCode};

/// Target used for access records, so they can be filtered on their own
/// (e.g. `RUST_LOG=chc::request=off`).
pub const REQUEST_TARGET: &str = "chc::request";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Installs the global subscriber. Calling it again is a no-op.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(true)
        .with_target(false)
        .try_init();
}

/// Logs one completed request.
pub fn log_request(method: Option<Method>, url: &str, protocol: &str, status: StatusCode) {
    let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
    info!(
        target: REQUEST_TARGET,
        status = status.as_u16(),
        method = method.map(|m| m.as_str()).unwrap_or(""),
        url,
        protocol,
        timestamp = %timestamp,
        "request"
    );
}

/// In-memory log capture for tests.
#[cfg(test)]
pub(crate) mod capture {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing::subscriber::DefaultGuard;

    #[derive(Clone, Default)]
    pub(crate) struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        /// Routes this thread's events into the capture until the guard drops.
        pub(crate) fn set_default(&self) -> DefaultGuard {
            let writer = self.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_ansi(false)
                .with_writer(move || writer.clone())
                .finish();
            tracing::subscriber::set_default(subscriber)
        }

        /// Captured lines emitted under `target`.
        pub(crate) fn lines_for(&self, target: &str) -> Vec<String> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .filter(|line| line.contains(target))
                .map(str::to_owned)
                .collect()
        }
    }

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
