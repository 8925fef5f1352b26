use reqwest_middleware::Middleware;
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use std::{fmt, sync::Arc, time::Duration};

use crate::settings::ApiSettings;

#[derive(Clone)]
pub struct Config {
    pub url: url::Url,
    /// Requests taking longer than this fail with
    /// [`FetchError::Timeout`](super::FetchError::Timeout).
    pub http_timeout: Duration,
    pub probe_url: bool,
    pub middlewares: Vec<Arc<dyn Middleware>>,
}

// `middlewares` do not implement `Debug`
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("url", &self.url)
            .field("http_timeout", &self.http_timeout)
            .field("probe_url", &self.probe_url)
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}

impl Config {
    pub fn new(url: url::Url) -> Self {
        Self {
            url,
            http_timeout: Duration::from_secs(30),
            probe_url: false,
            middlewares: vec![],
        }
    }

    pub fn with_retry_middleware(self, max_retries: u32) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
        let middleware = RetryTransientMiddleware::new_with_policy(retry_policy);
        self.with_middleware(middleware)
    }

    pub fn with_middleware<M: Middleware>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn probe_url(mut self, value: bool) -> Self {
        self.probe_url = value;
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }
}

impl From<&ApiSettings> for Config {
    fn from(settings: &ApiSettings) -> Self {
        let config = Config::new(settings.url.clone())
            .http_timeout(settings.http_timeout)
            .probe_url(settings.probe_url);
        if settings.max_retries > 0 {
            config.with_retry_middleware(settings.max_retries)
        } else {
            config
        }
    }
}
