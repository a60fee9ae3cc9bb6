//! Client configuration.

use std::time::Duration;

use url::Url;

use crate::error::Error;

/// Default schema the reservation tables live in.
pub const DEFAULT_SCHEMA: &str = rental_proto::DEFAULT_SCHEMA;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default realtime heartbeat interval.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Default time to wait for a channel join to be acknowledged.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default realtime channel name.
pub const DEFAULT_CHANNEL: &str = "reservation_updates";

/// Realtime protocol version requested on connect.
pub const REALTIME_PROTOCOL_VERSION: &str = "1.0.0";

/// Backing store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base URL of the project (e.g., "https://abc.example.co").
    pub url: String,

    /// Public API key sent with every request.
    pub api_key: String,

    /// Access token of the logged-in user. Without it requests run
    /// anonymously and no current user is reported.
    pub access_token: Option<String>,

    /// Database schema to read from and write to.
    pub schema: String,

    /// Request timeout.
    pub timeout: Duration,
}

impl StoreConfig {
    /// Create a configuration for the project at `url`.
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            access_token: None,
            schema: DEFAULT_SCHEMA.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the user access token.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Set the schema.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// URL of a REST resource (table name or `rpc/<procedure>`).
    pub fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.url.trim_end_matches('/'), path)
    }

    /// URL of an auth endpoint.
    pub fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.url.trim_end_matches('/'), path)
    }

    /// Token sent as bearer credentials: the user token, else the API key.
    pub fn bearer(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.api_key)
    }
}

/// Realtime websocket configuration.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Websocket URL including API key and protocol version.
    pub url: String,

    /// User access token forwarded on channel join.
    pub access_token: Option<String>,

    /// Channel name; joined as `realtime:<channel>`.
    pub channel: String,

    /// Heartbeat interval.
    pub heartbeat_interval: Duration,

    /// Time to wait for a join reply.
    pub join_timeout: Duration,
}

impl RealtimeConfig {
    /// Derive the realtime endpoint from a store configuration.
    pub fn from_store(store: &StoreConfig) -> Result<Self, Error> {
        let mut url = Url::parse(&store.url).map_err(|e| Error::Config(e.to_string()))?;

        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => return Err(Error::Config(format!("unsupported url scheme: {other}"))),
        };
        url.set_scheme(scheme)
            .map_err(|_| Error::Config(format!("cannot switch {} to {scheme}", store.url)))?;

        url.set_path("/realtime/v1/websocket");
        url.query_pairs_mut()
            .clear()
            .append_pair("apikey", &store.api_key)
            .append_pair("vsn", REALTIME_PROTOCOL_VERSION);

        Ok(Self {
            url: url.to_string(),
            access_token: store.access_token.clone(),
            channel: DEFAULT_CHANNEL.to_string(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        })
    }

    /// Set the channel name.
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Set the heartbeat interval.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the join timeout.
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }
}

/// Mail delivery configuration.
#[derive(Debug, Clone)]
pub struct MailerConfig {
    /// HTTP endpoint accepting rendered messages.
    pub endpoint: String,

    /// Bearer key for the endpoint.
    pub api_key: Option<String>,

    /// Sender address.
    pub sender: String,

    /// Request timeout.
    pub timeout: Duration,
}

impl MailerConfig {
    /// Create a configuration posting to `endpoint` as `sender`.
    pub fn new(endpoint: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            sender: sender.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the endpoint key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_builder() {
        let config = StoreConfig::new("https://abc.example.co/", "anon-key")
            .with_access_token("user-jwt")
            .with_schema("rental")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.schema, "rental");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.bearer(), "user-jwt");
        assert_eq!(
            config.rest_url("reservations"),
            "https://abc.example.co/rest/v1/reservations"
        );
        assert_eq!(config.auth_url("user"), "https://abc.example.co/auth/v1/user");
    }

    #[test]
    fn test_bearer_falls_back_to_api_key() {
        let config = StoreConfig::new("http://localhost:54321", "anon-key");
        assert_eq!(config.bearer(), "anon-key");
        assert_eq!(config.schema, DEFAULT_SCHEMA);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_realtime_url_from_store() {
        let store = StoreConfig::new("https://abc.example.co", "anon-key");
        let realtime = RealtimeConfig::from_store(&store).unwrap();
        assert_eq!(
            realtime.url,
            "wss://abc.example.co/realtime/v1/websocket?apikey=anon-key&vsn=1.0.0"
        );
        assert_eq!(realtime.heartbeat_interval, DEFAULT_HEARTBEAT_INTERVAL);
        assert_eq!(realtime.channel, DEFAULT_CHANNEL);

        let local = StoreConfig::new("http://127.0.0.1:54321", "k");
        let realtime = RealtimeConfig::from_store(&local).unwrap();
        assert!(realtime.url.starts_with("ws://127.0.0.1:54321/realtime/v1/websocket?"));
    }

    #[test]
    fn test_realtime_rejects_unknown_scheme() {
        let store = StoreConfig::new("ftp://abc.example.co", "k");
        assert!(RealtimeConfig::from_store(&store).is_err());
    }

    #[test]
    fn test_mailer_config_builder() {
        let config = MailerConfig::new("https://mail.example.co/send", "biuro@example.co")
            .with_api_key("mail-key");
        assert_eq!(config.api_key.as_deref(), Some("mail-key"));
        assert_eq!(config.sender, "biuro@example.co");
    }
}
