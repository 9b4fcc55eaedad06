//! JSON HTTP access to venue services

use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::warn;
use crate::errors::{SwapError, SwapErrorType, SwapResult};

/// Raw venue reply; some venues report failures inside a 200 body.
#[derive(Debug, Clone)]
pub struct VenueResponse {
    pub status: u16,
    pub body: String,
}

impl VenueResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self, venue: &str) -> SwapResult<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            warn!("⚠️ {} returned an unexpected payload: {}", venue, e);
            SwapError::new(SwapErrorType::ResponseError, format!("{} returned an unexpected payload", venue))
                .with_details(serde_json::json!({ "body": self.body }))
                .with_cause(e)
        })
    }
}

#[derive(Debug, Clone)]
pub struct VenueClient {
    venue: &'static str,
    client: reqwest::Client,
}

impl VenueClient {
    pub fn new(venue: &'static str, timeout: Duration) -> SwapResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                warn!("⚠️ Failed to initialize HTTP client for {}: {}", venue, e);
                SwapError::new(SwapErrorType::ResponseError, "failed to build HTTP client").with_cause(e)
            })?;
        Ok(Self { venue, client })
    }

    pub fn venue(&self) -> &'static str {
        self.venue
    }

    pub async fn get_raw(&self, url: &str, query: &[(&str, String)]) -> SwapResult<VenueResponse> {
        let request = self.client.get(url).query(query);
        self.send(request, url).await
    }

    pub async fn post_raw<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> SwapResult<VenueResponse> {
        let request = self.client.post(url).json(body);
        self.send(request, url).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> SwapResult<T> {
        self.get_raw(url, query).await?.checked(self.venue)?.json(self.venue)
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(&self, url: &str, body: &B) -> SwapResult<T> {
        self.post_raw(url, body).await?.checked(self.venue)?.json(self.venue)
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> SwapResult<VenueResponse> {
        let response = request.send().await.map_err(|e| {
            warn!("⚠️ {} request to {} failed: {}", self.venue, url, e);
            SwapError::new(SwapErrorType::ResponseError, format!("{} request failed", self.venue))
                .with_details(serde_json::json!({ "url": url }))
                .with_cause(e)
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            SwapError::new(SwapErrorType::ResponseError, format!("{} response body unreadable", self.venue))
                .with_cause(e)
        })?;
        Ok(VenueResponse { status, body })
    }
}

impl VenueResponse {
    /// Turns a non-2xx reply into a `ResponseError` carrying status and body.
    pub fn checked(self, venue: &str) -> SwapResult<Self> {
        if self.is_success() {
            return Ok(self);
        }
        warn!("⚠️ {} API returned error status {}: {}", venue, self.status, self.body);
        Err(SwapError::new(
            SwapErrorType::ResponseError,
            format!("{} API error: {}", venue, self.status),
        )
        .with_details(serde_json::json!({ "status": self.status, "body": self.body })))
    }
}
