//! Identity service client (user accounts)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::models::UserSnapshot;

use super::{transport_error, ClientError, IdentityClient};

#[derive(Clone)]
pub struct HttpIdentityClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpIdentityClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    #[tracing::instrument(skip(self))]
    async fn get_user(&self, user_id: i64) -> Result<UserSnapshot, ClientError> {
        let url = format!("{}/users/{}", self.base_url, user_id);
        let response = self.client.get(&url).send().await.map_err(transport_error)?;

        match response.status() {
            StatusCode::OK => response
                .json::<UserSnapshot>()
                .await
                .map_err(|e| ClientError::BadResponse(e.to_string())),
            StatusCode::NOT_FOUND => {
                Err(ClientError::NotFound(format!("User {} not found", user_id)))
            }
            status if status.is_server_error() => {
                Err(ClientError::Unavailable(format!("identity returned {}", status)))
            }
            status => Err(ClientError::BadResponse(format!(
                "identity returned {}",
                status
            ))),
        }
    }
}
