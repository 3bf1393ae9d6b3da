use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::Value;

use crate::config::Config;
use crate::errors::{FetchError, FetchResult};
use crate::http_request::{HttpMethod, HttpRequest};
use crate::http_request_executor::Fetcher;
use crate::logger::{self, Logger};
use crate::request_parser::{parse_headers, parse_query_parameters, QueryParameters};
use crate::response_store::{FsResponseStore, ResponseStore};
use crate::response_validator::ResponseValidator;

/// Everything a front end needs to show after a successful fetch.
#[derive(Debug)]
pub struct FetchOutcome {
    pub parameters: QueryParameters,
    /// Url the request was sent to, after rewriting.
    pub target_url: String,
    pub status: u16,
    pub payload: Value,
    pub saved_to: PathBuf,
}

/// Runs parse → fetch → validate → save for one user action at a time.
/// `Send`, so a front end can drive it from a worker thread.
pub struct RequestPipeline {
    fetcher: Fetcher,
    validator: ResponseValidator,
    store: Box<dyn ResponseStore + Send>,
    logger: Arc<dyn Logger>,
    timeout: Duration,
    default_headers: Vec<(String, String)>,
    on_saved: Vec<Box<dyn FnMut() + Send>>,
}

impl RequestPipeline {
    pub fn new(fetcher: Fetcher, store: Box<dyn ResponseStore + Send>) -> RequestPipeline {
        return RequestPipeline {
            fetcher,
            validator: ResponseValidator::default(),
            store,
            logger: logger::noop(),
            timeout: Duration::from_secs(30),
            default_headers: Vec::new(),
            on_saved: Vec::new(),
        };
    }

    /// Wires fetcher, filesystem store and defaults from `config`, all
    /// reporting to `logger`.
    pub fn from_config(config: &Config, logger: Arc<dyn Logger>) -> anyhow::Result<RequestPipeline> {
        let fetcher = Fetcher::new()?
            .with_rewrites(config.rewrite_rules()?)
            .with_logger(logger.clone());
        let root = config.store_root();
        let store = FsResponseStore::open(&root)
            .with_context(|| format!("open response store {}", root.display()))?
            .with_logger(logger.clone());

        Ok(RequestPipeline::new(fetcher, Box::new(store))
            .with_logger(logger)
            .with_timeout(Duration::from_secs(config.request.timeout_secs))
            .with_default_headers(&config.request.default_headers))
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> RequestPipeline {
        self.validator = ResponseValidator::new(logger.clone());
        self.logger = logger;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> RequestPipeline {
        self.timeout = timeout;
        self
    }

    /// Header block sent with every request; per-request headers win.
    pub fn with_default_headers(mut self, raw_headers: &str) -> RequestPipeline {
        self.default_headers = parse_headers(raw_headers);
        self
    }

    /// Registers a callback run after every successful save.
    pub fn on_saved<F: FnMut() + Send + 'static>(&mut self, callback: F) {
        self.on_saved.push(Box::new(callback));
    }

    pub fn store(&self) -> &dyn ResponseStore {
        self.store.as_ref()
    }

    pub fn run(&mut self, url: &str, method: HttpMethod, raw_headers: &str) -> FetchResult<FetchOutcome> {
        let url = url.trim();
        if url.is_empty() {
            self.logger.error("No URL provided");
            return Err(FetchError::InvalidRequest("Please enter a URL".to_string()));
        }

        self.logger.info(&format!("Processing URL: {}", url));
        match self.process(url, method, raw_headers) {
            Ok(outcome) => {
                self.logger.info(&format!(
                    "Request successful. Data saved to {}",
                    outcome.saved_to.display()
                ));
                for callback in self.on_saved.iter_mut() {
                    callback();
                }
                Ok(outcome)
            }
            Err(e) => {
                self.logger.error(&format!("Error: {}", e));
                Err(e)
            }
        }
    }

    fn process(&self, url: &str, method: HttpMethod, raw_headers: &str) -> FetchResult<FetchOutcome> {
        let parameters = parse_query_parameters(url);
        let request = HttpRequest::new(url, method)
            .with_headers(self.default_headers.iter().cloned())
            .with_headers(parse_headers(raw_headers));

        let response = self.fetcher.fetch(&request, self.timeout)?;
        let payload = self.validator.validate(&response)?;
        let saved_to = self.store.save(url, &payload)?;

        Ok(FetchOutcome {
            parameters,
            target_url: response.url,
            status: response.status,
            payload,
            saved_to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::testing::RecordingLogger;
    use crate::response_store::SnapshotListing;
    use std::cell::RefCell;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MemoryStore {
        saved: RefCell<Vec<(String, Value)>>,
    }

    impl ResponseStore for MemoryStore {
        fn save(&self, url: &str, payload: &Value) -> FetchResult<PathBuf> {
            self.saved
                .borrow_mut()
                .push((url.to_string(), payload.clone()));
            Ok(PathBuf::from(format!("mem/{}", self.saved.borrow().len())))
        }

        fn load(&self, path: &Path) -> FetchResult<Value> {
            Err(FetchError::NotFound(path.to_path_buf()))
        }

        fn list_all(&self) -> FetchResult<SnapshotListing> {
            Ok(SnapshotListing::default())
        }
    }

    fn pipeline(recorder: Arc<RecordingLogger>) -> RequestPipeline {
        RequestPipeline::new(Fetcher::new().unwrap(), Box::new(MemoryStore::default()))
            .with_logger(recorder)
            .with_timeout(Duration::from_secs(1))
    }

    #[test]
    fn empty_url_is_rejected_without_fetching() {
        let recorder = Arc::new(RecordingLogger::default());
        let mut pipeline = pipeline(recorder.clone());

        let err = pipeline.run("   ", HttpMethod::Get, "").unwrap_err();

        assert!(matches!(err, FetchError::InvalidRequest(_)));
        assert_eq!(recorder.messages("error"), vec!["No URL provided"]);
    }

    #[test]
    fn failures_are_logged_and_do_not_notify() {
        let recorder = Arc::new(RecordingLogger::default());
        let mut pipeline = pipeline(recorder.clone());
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = notified.clone();
        pipeline.on_saved(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let err = pipeline
            .run("http://[::1", HttpMethod::Get, "Accept: */*")
            .unwrap_err();

        assert!(matches!(err, FetchError::InvalidRequest(_)), "{err}");
        assert_eq!(notified.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.messages("info"), vec!["Processing URL: http://[::1"]);
        let errors = recorder.messages("error");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Error: Invalid request"), "{:?}", errors);
    }

    #[test]
    fn store_is_reachable_for_listing() {
        let pipeline = pipeline(Arc::new(RecordingLogger::default()));
        assert!(pipeline.store().list_all().unwrap().entries.is_empty());
    }
}
