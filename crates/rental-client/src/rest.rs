//! REST client for the reservation tables.
//!
//! Reads go through PostgREST-style table endpoints built from
//! [`TableQuery`]; the status change goes through the procedure endpoint.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use rental_core::{ReservationStore, StoreError};
use rental_proto::{
    Profile, ReservationDetails, ReservationId, StatusChange, StatusHistoryEntry, TableQuery,
    UserId, UPDATE_STATUS_PROCEDURE,
};

use crate::config::StoreConfig;
use crate::error::Error;

/// Media type asking for one object instead of an array.
pub const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Error code returned when a single-object read matched zero or many rows.
pub const NO_SINGLE_ROW: &str = "PGRST116";

/// Error body returned by the REST endpoint.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

/// HTTP client for tables, procedures and the auth endpoint.
///
/// # Example
///
/// ```ignore
/// use rental_client::{RestClient, StoreConfig};
///
/// let client = RestClient::new(StoreConfig::new(url, api_key).with_access_token(token))?;
/// let history = client.status_history(&reservation_id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    config: StoreConfig,
}

impl RestClient {
    /// Build a client from configuration.
    pub fn new(config: StoreConfig) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(&config.api_key)
            .map_err(|e| Error::Config(format!("invalid api key: {e}")))?;
        headers.insert("apikey", api_key);

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { http, config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Run a query returning every matching row.
    pub async fn select<T: DeserializeOwned>(&self, query: &TableQuery) -> Result<Vec<T>, Error> {
        let response = self.get(query).send().await.map_err(map_http)?;
        let response = check(response).await?;
        decode(response).await
    }

    /// Run a query expecting at most one row.
    pub async fn select_one<T: DeserializeOwned>(
        &self,
        query: &TableQuery,
    ) -> Result<Option<T>, Error> {
        let response = self
            .get(query)
            .header(ACCEPT, SINGLE_OBJECT)
            .send()
            .await
            .map_err(map_http)?;

        match check(response).await {
            Ok(response) => decode(response).await.map(Some),
            Err(Error::Status {
                status: 406,
                code: Some(code),
                message,
            }) if code == NO_SINGLE_ROW && message.contains("contains 0 rows") => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Invoke a stored procedure. Returns `Value::Null` when it returns nothing.
    pub async fn rpc<A: Serialize + ?Sized>(&self, procedure: &str, args: &A) -> Result<Value, Error> {
        let url = self.config.rest_url(&format!("rpc/{procedure}"));
        tracing::debug!(procedure, "invoking procedure");

        let response = self
            .authorize(self.http.post(url))
            .header("Content-Profile", &self.config.schema)
            .json(args)
            .send()
            .await
            .map_err(map_http)?;
        let response = check(response).await?;

        let body = response.text().await.map_err(map_http)?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    fn get(&self, query: &TableQuery) -> RequestBuilder {
        tracing::trace!(table = %query.table, single = query.single, "table read");
        self.authorize(self.http.get(self.config.rest_url(&query.table)))
            .header("Accept-Profile", &self.config.schema)
            .query(&query.to_query_pairs())
    }

    pub(crate) fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.config.bearer())
    }
}

#[async_trait]
impl ReservationStore for RestClient {
    async fn profile(&self, user_id: &UserId) -> Result<Option<Profile>, StoreError> {
        Ok(self.select_one(&TableQuery::admin_flag(user_id)).await?)
    }

    async fn update_status(&self, change: &StatusChange) -> Result<(), StoreError> {
        self.rpc(UPDATE_STATUS_PROCEDURE, change).await?;
        Ok(())
    }

    async fn reservation_details(
        &self,
        id: &ReservationId,
    ) -> Result<Option<ReservationDetails>, StoreError> {
        Ok(self.select_one(&TableQuery::reservation_details(id)).await?)
    }

    async fn status_history(
        &self,
        id: &ReservationId,
    ) -> Result<Vec<StatusHistoryEntry>, StoreError> {
        Ok(self.select(&TableQuery::status_history(id)).await?)
    }
}

/// Pass a successful response through, turn anything else into
/// [`Error::Status`] carrying the server's code and message.
pub(crate) async fn check(response: Response) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let message = match (body.message, body.details) {
        (Some(message), Some(details)) => format!("{message} ({details})"),
        (Some(message), None) => message,
        (None, Some(details)) => details,
        (None, None) if !text.is_empty() => text,
        (None, None) => status_reason(status),
    };

    if let Some(hint) = body.hint.as_deref() {
        tracing::debug!(status = status.as_u16(), hint, "request rejected");
    }

    Err(Error::Status {
        status: status.as_u16(),
        code: body.code,
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, Error> {
    let bytes = response.bytes().await.map_err(map_http)?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub(crate) fn map_http(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout
    } else {
        Error::Http(err)
    }
}

fn status_reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("unknown status")
        .to_string()
}
