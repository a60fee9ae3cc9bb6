//! Current-user lookup against the auth endpoint.

use async_trait::async_trait;
use reqwest::StatusCode;

use rental_core::{Authenticator, StoreError};
use rental_proto::UserIdentity;

use crate::error::Error;
use crate::rest::{check, map_http, RestClient};

impl RestClient {
    /// Resolve the user behind the configured access token.
    ///
    /// Returns `None` without a request when no token is configured, and
    /// `None` when the auth service rejects the token.
    pub async fn user(&self) -> Result<Option<UserIdentity>, Error> {
        if self.config().access_token.is_none() {
            return Ok(None);
        }

        let response = self
            .authorize(self.http().get(self.config().auth_url("user")))
            .send()
            .await
            .map_err(map_http)?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            tracing::debug!(status = response.status().as_u16(), "access token rejected");
            return Ok(None);
        }

        let response = check(response).await?;
        let user: UserIdentity = response.json().await.map_err(map_http)?;
        Ok(Some(user))
    }
}

#[async_trait]
impl Authenticator for RestClient {
    async fn current_user(&self) -> Result<Option<UserIdentity>, StoreError> {
        Ok(self.user().await?)
    }
}
