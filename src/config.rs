use std::time::Duration;

/// Parameters shared by every controller started by [`run`](crate::run).
#[derive(Debug, Clone)]
pub struct Config {
    /// Restricts all watches to one namespace. `None` watches every namespace.
    pub namespace: Option<String>,
    /// Number of concurrent workers per controller.
    pub workers: usize,
    /// Name reported as the source of emitted events.
    pub reporter: String,
    pub rate_limiter: RateLimiterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: None,
            workers: 5,
            reporter: "dbcluster-controller".to_string(),
            rate_limiter: RateLimiterConfig::default(),
        }
    }
}

impl Config {
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn reporter(mut self, reporter: impl Into<String>) -> Self {
        self.reporter = reporter.into();
        self
    }

    pub fn rate_limiter(mut self, rate_limiter: RateLimiterConfig) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }
}

/// Retry pacing for failed syncs.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterConfig {
    /// Delay before the first retry of an item; doubles on each failure.
    pub base_delay: Duration,
    /// Upper bound of the per-item delay.
    pub max_delay: Duration,
    /// Sustained retries per second across all items.
    pub qps: f64,
    pub burst: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_secs(1000),
            qps: 10.0,
            burst: 100,
        }
    }
}
