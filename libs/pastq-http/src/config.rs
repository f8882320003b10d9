use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default User-Agent string for HTTP requests
pub const DEFAULT_USER_AGENT: &str = concat!("pastq/", env!("CARGO_PKG_VERSION"));

/// Which URL schemes the transport accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportSecurity {
    /// Only `https://` URLs are accepted.
    #[default]
    TlsOnly,
    /// Both `http://` and `https://` URLs are accepted.
    ///
    /// Meant for local development backends and mock servers.
    AllowInsecureHttp,
}

/// Transport configuration.
///
/// Durations are (de)serialized in humantime form (`"30s"`, `"1m 30s"`); a
/// bare integer is read as seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpClientConfig {
    /// Upper bound for one request/response exchange, body included (default: 30s)
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// User-Agent header value (default: `pastq/<version>`)
    pub user_agent: String,

    /// Maximum buffered response body size in bytes (default: 20 MiB)
    pub max_body_size: usize,

    /// How long an idle pooled connection is kept (default: 90s)
    #[serde(with = "humantime_serde::option")]
    pub pool_idle_timeout: Option<Duration>,

    /// Idle connections kept per host (default: 8)
    pub pool_max_idle_per_host: usize,

    /// Accepted URL schemes (default: TLS only)
    pub transport: TransportSecurity,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            max_body_size: 20 * 1024 * 1024,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 8,
            transport: TransportSecurity::TlsOnly,
        }
    }
}

impl HttpClientConfig {
    /// Configuration for tests against local mock servers: plain HTTP is
    /// allowed and timeouts are short.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            pool_idle_timeout: None,
            transport: TransportSecurity::AllowInsecureHttp,
            ..Self::default()
        }
    }
}

/// Serde support for `Duration` values in humantime notation.
pub mod humantime_serde {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;
    use std::time::Duration;

    struct DurationVisitor;

    impl Visitor<'_> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a duration such as \"30s\" or a number of seconds")
        }

        fn visit_u64<E: de::Error>(self, secs: u64) -> Result<Duration, E> {
            Ok(Duration::from_secs(secs))
        }

        fn visit_i64<E: de::Error>(self, secs: i64) -> Result<Duration, E> {
            u64::try_from(secs)
                .map(Duration::from_secs)
                .map_err(|_| E::custom("duration must not be negative"))
        }

        fn visit_str<E: de::Error>(self, raw: &str) -> Result<Duration, E> {
            humantime::parse_duration(raw.trim()).map_err(E::custom)
        }
    }

    /// Serialize a `Duration` as a humantime string.
    ///
    /// # Errors
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&humantime::format_duration(*value))
    }

    /// Deserialize a `Duration` from a humantime string or integer seconds.
    ///
    /// # Errors
    /// Fails when the value is neither.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        d.deserialize_any(DurationVisitor)
    }

    /// Same as the parent module for `Option<Duration>`.
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        #[derive(Deserialize)]
        struct Wrapped(#[serde(deserialize_with = "super::deserialize")] Duration);

        /// # Errors
        /// Propagates serializer errors.
        #[allow(clippy::ref_option)]
        pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(d) => s.collect_str(&humantime::format_duration(*d)),
                None => s.serialize_none(),
            }
        }

        /// # Errors
        /// Fails when a present value is not a valid duration.
        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
            Ok(Option::<Wrapped>::deserialize(d)?.map(|Wrapped(d)| d))
        }
    }
}
