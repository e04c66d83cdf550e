//! Azure Resource Manager REST client.
//!
//! Thin layer over reqwest: bearer authentication, JSON bodies, error mapping and
//! polling of long-running operations through the `Azure-AsyncOperation` header.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use edgeml_core::PlatformError;
use edgeml_core::platform::PlatformResult;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::credential::TokenCredential;

/// Public Resource Manager endpoint.
pub const MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";
/// API version for `Microsoft.MachineLearningServices`.
pub const ML_API_VERSION: &str = "2024-04-01";
/// API version for `Microsoft.Authorization`.
pub const AUTHORIZATION_API_VERSION: &str = "2022-04-01";

const ASYNC_OPERATION_HEADER: &str = "Azure-AsyncOperation";

/// Resource Manager client settings.
#[derive(Debug, Clone)]
pub struct ArmOptions {
    /// Base URL, without a trailing slash
    pub endpoint: String,
    /// Delay between polls of a long-running operation
    pub poll_interval: Duration,
    /// Polls before giving up
    pub max_polls: u32,
}

impl Default for ArmOptions {
    fn default() -> Self {
        Self {
            endpoint: MANAGEMENT_ENDPOINT.to_string(),
            poll_interval: Duration::from_secs(5),
            max_polls: 360,
        }
    }
}

impl ArmOptions {
    /// Use a different endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Change the polling cadence.
    #[must_use]
    pub const fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }
}

/// The resource a request addresses, for error reporting.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    /// Resource kind, e.g. "Compute"
    pub kind: &'static str,
    /// Resource name
    pub name: &'a str,
}

impl<'a> Target<'a> {
    /// Create a target.
    #[must_use]
    pub const fn new(kind: &'static str, name: &'a str) -> Self {
        Self { kind, name }
    }
}

impl fmt::Display for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl ErrorBody {
    fn describe(&self) -> String {
        match (self.code.is_empty(), self.message.is_empty()) {
            (true, true) => "no error details".to_string(),
            (false, true) => self.code.clone(),
            (true, false) => self.message.clone(),
            (false, false) => format!("{}: {}", self.code, self.message),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    status: String,
    #[serde(default)]
    error: Option<ErrorBody>,
}

/// Authenticated Resource Manager client.
#[derive(Clone)]
pub struct ArmClient {
    http: Client,
    credential: Arc<dyn TokenCredential>,
    options: ArmOptions,
}

impl fmt::Debug for ArmClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArmClient")
            .field("endpoint", &self.options.endpoint)
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

impl ArmClient {
    /// Create a client.
    pub fn new(credential: Arc<dyn TokenCredential>, options: ArmOptions) -> PlatformResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("edgeml/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlatformError::request("create HTTP client", e.to_string()))?;
        Ok(Self {
            http,
            credential,
            options,
        })
    }

    /// Absolute URL of a resource path at an API version.
    #[must_use]
    pub fn url(&self, path: &str, api_version: &str) -> String {
        format!(
            "{}{}?api-version={}",
            self.options.endpoint, path, api_version
        )
    }

    /// GET a resource.
    pub async fn get<T: DeserializeOwned>(
        &self,
        target: Target<'_>,
        path: &str,
        api_version: &str,
    ) -> PlatformResult<T> {
        self.get_url(target, &self.url(path, api_version)).await
    }

    /// GET an absolute URL, such as a `nextLink`.
    pub async fn get_url<T: DeserializeOwned>(
        &self,
        target: Target<'_>,
        url: &str,
    ) -> PlatformResult<T> {
        let response = self.send(target, self.request(Method::GET, url)).await?;
        decode(target, response).await
    }

    /// PUT a resource and decode the immediate response.
    pub async fn put<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        target: Target<'_>,
        path: &str,
        api_version: &str,
        body: &B,
    ) -> PlatformResult<T> {
        let response = self.put_raw(target, path, api_version, body).await?;
        decode(target, response).await
    }

    /// PUT a resource, wait for the operation to finish, then read the resource back.
    pub async fn put_and_wait<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        target: Target<'_>,
        path: &str,
        api_version: &str,
        body: &B,
    ) -> PlatformResult<T> {
        let response = self.put_raw(target, path, api_version, body).await?;
        let operation = response
            .headers()
            .get(ASYNC_OPERATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);

        if let Some(operation_url) = operation {
            tracing::debug!(%target, url = %operation_url, "Waiting for long-running operation");
            self.wait(target, &operation_url).await?;
        }

        self.get(target, path, api_version).await
    }

    async fn put_raw<B: Serialize + Sync>(
        &self,
        target: Target<'_>,
        path: &str,
        api_version: &str,
        body: &B,
    ) -> PlatformResult<Response> {
        let url = self.url(path, api_version);
        self.send(target, self.request(Method::PUT, &url).json(body))
            .await
    }

    async fn wait(&self, target: Target<'_>, operation_url: &str) -> PlatformResult<()> {
        for attempt in 1..=self.options.max_polls {
            let status: OperationStatus = self.get_url(target, operation_url).await?;
            tracing::trace!(%target, attempt, status = %status.status, "Polled operation");

            match status.status.as_str() {
                "Succeeded" => return Ok(()),
                "Failed" | "Canceled" => {
                    let detail = status
                        .error
                        .map_or_else(|| status.status.clone(), |e| e.describe());
                    return Err(PlatformError::request(
                        format!("provision {target}"),
                        detail,
                    ));
                }
                _ => tokio::time::sleep(self.options.poll_interval).await,
            }
        }

        Err(PlatformError::Timeout {
            operation: format!("provision {target}"),
        })
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http.request(method, url)
    }

    async fn send(&self, target: Target<'_>, request: RequestBuilder) -> PlatformResult<Response> {
        let token = self.credential.token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| PlatformError::request(format!("request {target}"), e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorEnvelope>(&body)
            .ok()
            .and_then(|envelope| envelope.error)
            .map_or_else(|| format!("HTTP {status}"), |e| e.describe());
        tracing::debug!(%target, %status, %detail, "Resource Manager request failed");
        Err(status_error(target, status, detail))
    }
}

async fn decode<T: DeserializeOwned>(target: Target<'_>, response: Response) -> PlatformResult<T> {
    let body = response
        .bytes()
        .await
        .map_err(|e| PlatformError::request(format!("read {target}"), e.to_string()))?;
    serde_json::from_slice(&body).map_err(|e| PlatformError::serialization(target.to_string(), e))
}

/// Map a failed status to a platform error.
fn status_error(target: Target<'_>, status: StatusCode, detail: String) -> PlatformError {
    match status {
        StatusCode::NOT_FOUND => PlatformError::NotFound {
            resource: target.kind,
            name: target.name.to_string(),
        },
        StatusCode::CONFLICT => PlatformError::AlreadyExists {
            resource: target.kind,
            name: target.name.to_string(),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PlatformError::Authentication(detail),
        _ => PlatformError::request(target.to_string(), format!("HTTP {status}: {detail}")),
    }
}
