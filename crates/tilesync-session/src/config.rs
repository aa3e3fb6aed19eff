//! Endpoint list and retry policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// EndpointClass
// ---------------------------------------------------------------------------

/// How patient to be with an endpoint.
///
/// Hosted endpoints that sleep when idle can take tens of seconds to answer
/// the first handshake after waking up. Those are `ColdStart` and get more
/// attempts, longer backoff and a longer handshake timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointClass {
    ColdStart,
    Standard,
}

impl EndpointClass {
    /// Guesses the class from the endpoint URL. Hosts under `onrender.com`
    /// are cold-start prone; everything else is standard.
    pub fn classify(url: &str) -> Self {
        let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
        let authority = rest.split(['/', '?', '#']).next().unwrap_or("");
        let host = authority.rsplit('@').next().unwrap_or(authority);
        let host = host.split(':').next().unwrap_or(host);
        if host.eq_ignore_ascii_case("onrender.com")
            || host.to_ascii_lowercase().ends_with(".onrender.com")
        {
            Self::ColdStart
        } else {
            Self::Standard
        }
    }
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// One candidate server, tried in list order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub url: String,

    /// Explicit class. `None` means classify from the URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<EndpointClass>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            class: None,
        }
    }

    pub fn with_class(mut self, class: EndpointClass) -> Self {
        self.class = Some(class);
        self
    }

    pub fn class(&self) -> EndpointClass {
        self.class
            .unwrap_or_else(|| EndpointClass::classify(&self.url))
    }
}

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// How many times to dial one endpoint and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts per endpoint, including the first one.
    pub max_attempts: u32,

    /// `delays[k]` is the wait before retry `k + 1`. When the list is
    /// shorter than the retries, the last entry repeats.
    pub delays: Vec<Duration>,

    /// An attempt with no handshake by this deadline counts as a
    /// transient failure.
    pub handshake_timeout: Duration,
}

impl RetryPolicy {
    /// Patient policy for endpoints that may be waking up.
    pub fn cold_start() -> Self {
        Self {
            max_attempts: 5,
            delays: [2, 5, 8, 12, 15]
                .into_iter()
                .map(Duration::from_secs)
                .collect(),
            handshake_timeout: Duration::from_secs(20),
        }
    }

    /// Linear backoff of one second per retry, capped at five.
    pub fn standard() -> Self {
        Self {
            max_attempts: 2,
            delays: (1..=5).map(Duration::from_secs).collect(),
            handshake_timeout: Duration::from_secs(10),
        }
    }

    /// Wait before the given zero-based attempt. The first attempt never
    /// waits.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let index = (attempt - 1) as usize;
        self.delays
            .get(index)
            .or(self.delays.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Returns a copy with out-of-range values replaced, falling back to
    /// `defaults` where a field is unusable.
    fn validated_against(&self, defaults: &RetryPolicy) -> Self {
        let mut policy = self.clone();

        if policy.max_attempts == 0 {
            tracing::warn!("max_attempts of 0 is invalid, clamping to 1");
            policy.max_attempts = 1;
        }

        if policy.delays.is_empty() {
            tracing::warn!("empty retry delay schedule, using class default");
            policy.delays = defaults.delays.clone();
        }

        if policy.handshake_timeout.is_zero() {
            tracing::warn!(
                default = ?defaults.handshake_timeout,
                "zero handshake timeout, using class default"
            );
            policy.handshake_timeout = defaults.handshake_timeout;
        }

        policy
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Everything the connection session needs to know before dialing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Candidate servers in priority order.
    pub endpoints: Vec<Endpoint>,

    /// Policy for [`EndpointClass::ColdStart`] endpoints.
    pub cold_start: RetryPolicy,

    /// Policy for [`EndpointClass::Standard`] endpoints.
    pub standard: RetryPolicy,

    /// How often to send a latency probe while linked.
    pub probe_interval: Duration,

    /// Whether to walk the endpoint list again after a live link drops.
    pub auto_reconnect: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            cold_start: RetryPolicy::cold_start(),
            standard: RetryPolicy::standard(),
            probe_interval: Duration::from_secs(2),
            auto_reconnect: true,
        }
    }
}

impl SessionConfig {
    /// Default config with the given endpoint URLs, classified by host.
    pub fn with_endpoints<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoints: urls.into_iter().map(Endpoint::new).collect(),
            ..Self::default()
        }
    }

    pub fn policy_for(&self, class: EndpointClass) -> &RetryPolicy {
        match class {
            EndpointClass::ColdStart => &self.cold_start,
            EndpointClass::Standard => &self.standard,
        }
    }

    /// Returns a copy with unusable values clamped.
    pub fn validated(&self) -> Self {
        let mut config = self.clone();
        config.cold_start = self
            .cold_start
            .validated_against(&RetryPolicy::cold_start());
        config.standard =
            self.standard.validated_against(&RetryPolicy::standard());

        if config.probe_interval.is_zero() {
            tracing::warn!("probe_interval of 0 is invalid, using 2s");
            config.probe_interval = Duration::from_secs(2);
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_render_host_is_cold_start() {
        assert_eq!(
            EndpointClass::classify("wss://game-abc.onrender.com/socket"),
            EndpointClass::ColdStart
        );
        assert_eq!(
            EndpointClass::classify("https://onrender.com"),
            EndpointClass::ColdStart
        );
    }

    #[test]
    fn test_classify_other_hosts_are_standard() {
        assert_eq!(
            EndpointClass::classify("ws://localhost:3001"),
            EndpointClass::Standard
        );
        // Only the host counts, not the path.
        assert_eq!(
            EndpointClass::classify("ws://example.com/onrender.com"),
            EndpointClass::Standard
        );
        assert_eq!(
            EndpointClass::classify("ws://notonrender.com"),
            EndpointClass::Standard
        );
    }

    #[test]
    fn test_endpoint_explicit_class_wins() {
        let endpoint = Endpoint::new("ws://localhost:3001")
            .with_class(EndpointClass::ColdStart);
        assert_eq!(endpoint.class(), EndpointClass::ColdStart);
    }

    #[test]
    fn test_cold_start_delay_schedule() {
        let policy = RetryPolicy::cold_start();
        assert_eq!(policy.delay_before(0), Duration::ZERO);
        assert_eq!(policy.delay_before(1), Duration::from_secs(2));
        assert_eq!(policy.delay_before(2), Duration::from_secs(5));
        assert_eq!(policy.delay_before(4), Duration::from_secs(12));
        assert_eq!(policy.handshake_timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_standard_delay_is_linear_and_capped() {
        let policy = RetryPolicy::standard();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.delay_before(1), Duration::from_secs(1));
        assert_eq!(policy.delay_before(3), Duration::from_secs(3));
        assert_eq!(policy.delay_before(9), Duration::from_secs(5));
    }

    #[test]
    fn test_validated_clamps_zero_attempts_and_empty_delays() {
        let mut config = SessionConfig::default();
        config.standard.max_attempts = 0;
        config.cold_start.delays.clear();
        config.probe_interval = Duration::ZERO;

        let config = config.validated();

        assert_eq!(config.standard.max_attempts, 1);
        assert_eq!(config.cold_start.delays, RetryPolicy::cold_start().delays);
        assert_eq!(config.probe_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_session_config_partial_json_uses_defaults() {
        let config: SessionConfig = serde_json::from_str(
            r#"{"endpoints":[{"url":"ws://localhost:3001"}],"auto_reconnect":false}"#,
        )
        .unwrap();
        assert_eq!(config.endpoints.len(), 1);
        assert!(!config.auto_reconnect);
        assert_eq!(config.cold_start, RetryPolicy::cold_start());
        assert_eq!(config.probe_interval, Duration::from_secs(2));
    }
}
