//! Runtime configuration shared across handlers.

use std::time::Duration;

pub const DEFAULT_PUBLIC_URL: &str = "http://localhost:8080";
pub const DEFAULT_COUNTER_ATTEMPTS: u32 = 3;
pub const DEFAULT_COUNTER_BACKOFF: Duration = Duration::from_secs(1);

/// Application configuration, built once at startup and injected into the
/// router.
#[derive(Clone, Debug)]
pub struct AppConfig {
    public_url: String,
    counter_attempts: u32,
    counter_backoff: Duration,
}

impl AppConfig {
    #[must_use]
    pub fn new(public_url: impl Into<String>) -> Self {
        Self {
            public_url: public_url.into(),
            counter_attempts: DEFAULT_COUNTER_ATTEMPTS,
            counter_backoff: DEFAULT_COUNTER_BACKOFF,
        }
    }

    /// Set how many times counter operations are attempted before giving up.
    #[must_use]
    pub fn with_counter_attempts(mut self, attempts: u32) -> Self {
        self.counter_attempts = attempts.max(1);
        self
    }

    /// Set the base delay between counter attempts. The delay grows linearly
    /// with the attempt number.
    #[must_use]
    pub const fn with_counter_backoff(mut self, backoff: Duration) -> Self {
        self.counter_backoff = backoff;
        self
    }

    /// Session cookies are marked `Secure` when the site is served over
    /// https.
    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.public_url.starts_with("https://")
    }

    #[must_use]
    pub const fn counter_attempts(&self) -> u32 {
        self.counter_attempts
    }

    #[must_use]
    pub const fn counter_backoff(&self) -> Duration {
        self.counter_backoff
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PUBLIC_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_secure_follows_public_url_scheme() {
        assert!(!AppConfig::new("http://localhost:8080").cookie_secure());
        assert!(AppConfig::new("https://app.example.com").cookie_secure());
    }

    #[test]
    fn builders_override_defaults() {
        let config = AppConfig::default()
            .with_counter_attempts(5)
            .with_counter_backoff(Duration::from_millis(10));

        assert_eq!(config.counter_attempts(), 5);
        assert_eq!(config.counter_backoff(), Duration::from_millis(10));
    }

    #[test]
    fn at_least_one_attempt() {
        assert_eq!(AppConfig::default().with_counter_attempts(0).counter_attempts(), 1);
    }
}
