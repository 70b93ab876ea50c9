use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub mod models;

use models::{NewPrescription, Prescription, PrescriptionPatch};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid {field}: {value:?} is not a number")]
    Validation {
        field: &'static str,
        value: String,
    },
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend answered with status {0}")]
    Rejected(StatusCode),
}

/// The backend surface the synchronizer runs against. The live client talks
/// HTTP; tests substitute an in-memory implementation.
#[async_trait]
pub trait PrescriptionApi: Send + Sync {
    async fn list_names(&self) -> Result<Vec<String>, ApiError>;
    async fn fetch(&self, name: &str) -> Result<Prescription, ApiError>;
    async fn create(&self, name: &str, body: &NewPrescription) -> Result<Prescription, ApiError>;
    async fn update(&self, name: &str, body: &PrescriptionPatch) -> Result<Prescription, ApiError>;
    async fn delete(&self, name: &str) -> Result<(), ApiError>;
}

/// HTTP client for the prescription backend. Holds the base origin resolved
/// once at startup; every request target is derived from it.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        ApiClient {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Maps a relative resource path to a fully qualified request target by
    /// plain concatenation. The configured origin must end with a slash.
    fn resolve(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends a request and turns any non-success status into
    /// `ApiError::Rejected`. Attempt-once, no retries.
    async fn checked(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Rejected(status));
        }
        Ok(response)
    }
}

/// The one typed decode boundary for response bodies. Reading the body is a
/// transport concern; anything wrong with its shape surfaces as `Decode`.
fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    Ok(serde_json::from_str(body)?)
}

#[async_trait]
impl PrescriptionApi for ApiClient {
    async fn list_names(&self) -> Result<Vec<String>, ApiError> {
        let response = self.checked(self.http.get(self.resolve("rx"))).await?;
        decode(&response.text().await?)
    }

    async fn fetch(&self, name: &str) -> Result<Prescription, ApiError> {
        let url = self.resolve(&format!("rx/{}", name));
        let response = self.checked(self.http.get(url)).await?;
        decode(&response.text().await?)
    }

    async fn create(&self, name: &str, body: &NewPrescription) -> Result<Prescription, ApiError> {
        let url = self.resolve(&format!("rx/{}", name));
        let response = self.checked(self.http.post(url).json(body)).await?;
        decode(&response.text().await?)
    }

    async fn update(&self, name: &str, body: &PrescriptionPatch) -> Result<Prescription, ApiError> {
        let url = self.resolve(&format!("rx/{}", name));
        let response = self.checked(self.http.patch(url).json(body)).await?;
        decode(&response.text().await?)
    }

    async fn delete(&self, name: &str) -> Result<(), ApiError> {
        let url = self.resolve(&format!("rx/{}", name));
        self.checked(self.http.delete(url)).await?;
        Ok(())
    }
}
