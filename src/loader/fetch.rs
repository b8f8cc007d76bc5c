//! Document fetching
//!
//! The loader asks a [`DocumentFetcher`] for any referenced document that was
//! neither preloaded nor already seen in the session. Network access is not
//! provided here; callers plug in their own fetcher for `http(s)` URIs.

use serde_json::Value;
use std::fs;
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::FetchError;

/// Retrieves a JSON document by URI
pub trait DocumentFetcher: Send + Sync {
    fn fetch(&self, uri: &Url) -> Result<Value, FetchError>;
}

impl<F> DocumentFetcher for F
where
    F: Fn(&Url) -> Result<Value, FetchError> + Send + Sync,
{
    fn fetch(&self, uri: &Url) -> Result<Value, FetchError> {
        self(uri)
    }
}

/// Refuses every fetch; only preloaded documents resolve
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFetcher;

impl DocumentFetcher for NoFetcher {
    fn fetch(&self, uri: &Url) -> Result<Value, FetchError> {
        Err(FetchError::UnsupportedScheme(uri.scheme().to_string()))
    }
}

/// Reads `file://` URIs from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

impl DocumentFetcher for FileFetcher {
    fn fetch(&self, uri: &Url) -> Result<Value, FetchError> {
        if uri.scheme() != "file" {
            return Err(FetchError::UnsupportedScheme(uri.scheme().to_string()));
        }
        let path = uri
            .to_file_path()
            .map_err(|_| FetchError::UnsupportedScheme(uri.to_string()))?;
        debug!(path = %path.display(), "Reading schema document");
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FetchError::NotFound,
            _ => FetchError::Io(e),
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Bounded retries with a per-attempt timeout around another fetcher.
///
/// Each attempt runs on a worker thread. When an attempt times out its result
/// is abandoned; the worker finishes on its own and its answer is dropped.
pub struct RetryingFetcher {
    inner: Arc<dyn DocumentFetcher>,
    retries: u32,
    timeout: Duration,
}

impl RetryingFetcher {
    pub fn new(inner: Arc<dyn DocumentFetcher>, retries: u32, timeout: Duration) -> Self {
        Self { inner, retries, timeout }
    }

    fn attempt(&self, uri: &Url) -> Result<Value, FetchError> {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let target = uri.clone();
        thread::Builder::new()
            .name("schema-fetch".to_string())
            .spawn(move || {
                // The receiver is gone if the attempt already timed out.
                let _ = tx.send(inner.fetch(&target));
            })?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(FetchError::Timeout(self.timeout.as_millis() as u64)),
            Err(RecvTimeoutError::Disconnected) => Err(FetchError::Io(io::Error::new(
                io::ErrorKind::Other,
                "fetch worker exited without a result",
            ))),
        }
    }
}

fn is_transient(error: &FetchError) -> bool {
    matches!(error, FetchError::Io(_) | FetchError::Timeout(_))
}

impl DocumentFetcher for RetryingFetcher {
    fn fetch(&self, uri: &Url) -> Result<Value, FetchError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.attempt(uri) {
                Ok(document) => return Ok(document),
                Err(e) if is_transient(&e) && attempts <= self.retries => {
                    warn!(%uri, attempt = attempts, error = %e, "Fetch failed, retrying");
                }
                Err(e) if attempts > 1 => {
                    return Err(FetchError::Exhausted { attempts, last: Box::new(e) });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_file_fetcher_reads_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        fs::write(&path, r#"{"type": "string"}"#).unwrap();

        let uri = Url::from_file_path(&path).unwrap();
        assert_eq!(FileFetcher.fetch(&uri).unwrap(), json!({"type": "string"}));

        let missing = Url::from_file_path(dir.path().join("missing.json")).unwrap();
        assert!(matches!(FileFetcher.fetch(&missing), Err(FetchError::NotFound)));

        let http = Url::parse("http://example.com/s.json").unwrap();
        assert!(matches!(FileFetcher.fetch(&http), Err(FetchError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_retrying_fetcher_retries_transient_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let flaky = move |_: &Url| -> Result<Value, FetchError> {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(FetchError::Io(io::Error::new(io::ErrorKind::Other, "flaky")))
            } else {
                Ok(json!({}))
            }
        };
        let fetcher = RetryingFetcher::new(Arc::new(flaky), 2, Duration::from_secs(5));
        let uri = Url::parse("urn:test").unwrap();
        assert_eq!(fetcher.fetch(&uri).unwrap(), json!({}));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_retrying_fetcher_gives_up() {
        let failing = |_: &Url| -> Result<Value, FetchError> {
            Err(FetchError::Io(io::Error::new(io::ErrorKind::Other, "down")))
        };
        let fetcher = RetryingFetcher::new(Arc::new(failing), 1, Duration::from_secs(5));
        let err = fetcher.fetch(&Url::parse("urn:test").unwrap()).unwrap_err();
        assert!(matches!(err, FetchError::Exhausted { attempts: 2, .. }));
    }

    #[test]
    fn test_retrying_fetcher_times_out() {
        let slow = |_: &Url| -> Result<Value, FetchError> {
            thread::sleep(Duration::from_millis(500));
            Ok(json!({}))
        };
        let fetcher = RetryingFetcher::new(Arc::new(slow), 0, Duration::from_millis(20));
        let err = fetcher.fetch(&Url::parse("urn:test").unwrap()).unwrap_err();
        assert!(matches!(err, FetchError::Timeout(20)));
    }

    #[test]
    fn test_not_found_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let missing = move |_: &Url| -> Result<Value, FetchError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::NotFound)
        };
        let fetcher = RetryingFetcher::new(Arc::new(missing), 3, Duration::from_secs(1));
        assert!(matches!(fetcher.fetch(&Url::parse("urn:x").unwrap()), Err(FetchError::NotFound)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
