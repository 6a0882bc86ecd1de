//! Inventory service client (item catalog)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::models::{ItemSnapshot, ItemStatus};

use super::{transport_error, ClientError, InventoryClient};

#[derive(Clone)]
pub struct HttpInventoryClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpInventoryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl InventoryClient for HttpInventoryClient {
    #[tracing::instrument(skip(self))]
    async fn get_item(&self, item_id: i64) -> Result<ItemSnapshot, ClientError> {
        let url = format!("{}/books/{}", self.base_url, item_id);
        let response = self.client.get(&url).send().await.map_err(transport_error)?;

        match response.status() {
            StatusCode::OK => response
                .json::<ItemSnapshot>()
                .await
                .map_err(|e| ClientError::BadResponse(e.to_string())),
            StatusCode::NOT_FOUND => {
                Err(ClientError::NotFound(format!("Item {} not found", item_id)))
            }
            status if status.is_server_error() => {
                Err(ClientError::Unavailable(format!("inventory returned {}", status)))
            }
            status => Err(ClientError::BadResponse(format!(
                "inventory returned {}",
                status
            ))),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn set_item_status(
        &self,
        item_id: i64,
        status: ItemStatus,
    ) -> Result<(), ClientError> {
        let url = format!("{}/books/{}/status", self.base_url, item_id);
        let response = self
            .client
            .put(&url)
            .query(&[("status", status.to_string())])
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                Err(ClientError::NotFound(format!("Item {} not found", item_id)))
            }
            s if s.is_server_error() => {
                Err(ClientError::Unavailable(format!("inventory returned {}", s)))
            }
            s => Err(ClientError::BadResponse(format!("inventory returned {}", s))),
        }
    }
}
