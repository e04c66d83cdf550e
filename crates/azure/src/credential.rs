//! Access tokens for Azure Resource Manager.
//!
//! [`DefaultCredential`] takes `AZURE_ACCESS_TOKEN` when it is set. Otherwise it
//! walks a chain: the Azure identity default chain (service principal from
//! `AZURE_CLIENT_ID`/`AZURE_CLIENT_SECRET`/`AZURE_TENANT_ID`, managed identity,
//! Azure CLI), then the configured `az` program. The first token obtained is cached.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use azure_core::credentials::TokenCredential as AzureTokenCredential;
use azure_identity::DefaultAzureCredential;
use edgeml_core::PlatformError;
use edgeml_core::platform::PlatformResult;
use parking_lot::Mutex;
use serde::Deserialize;

use crate::cli::AzCli;

/// Environment variable holding a pre-issued bearer token.
pub const ACCESS_TOKEN_ENV: &str = "AZURE_ACCESS_TOKEN";

/// Audience of Resource Manager tokens.
pub const MANAGEMENT_RESOURCE: &str = "https://management.azure.com/";

/// OAuth scope for Resource Manager tokens.
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// Source of bearer tokens.
#[async_trait]
pub trait TokenCredential: Send + Sync + fmt::Debug {
    /// Return a bearer token for Resource Manager.
    async fn token(&self) -> PlatformResult<String>;
}

/// A fixed token.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// Wrap a token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken([REDACTED])")
    }
}

#[async_trait]
impl TokenCredential for StaticToken {
    async fn token(&self) -> PlatformResult<String> {
        Ok(self.0.clone())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
}

/// Token issued by `az account get-access-token` for the logged-in account.
#[derive(Debug, Clone, Default)]
pub struct AzureCliCredential {
    cli: AzCli,
}

impl AzureCliCredential {
    /// Use the given CLI runner.
    #[must_use]
    pub const fn new(cli: AzCli) -> Self {
        Self { cli }
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    async fn token(&self) -> PlatformResult<String> {
        tracing::debug!("Requesting access token from the Azure CLI");
        let token: CliToken = self
            .cli
            .run_json(
                "az account get-access-token",
                &[
                    "account",
                    "get-access-token",
                    "--resource",
                    MANAGEMENT_RESOURCE,
                ],
            )
            .await
            .map_err(|e| match e {
                PlatformError::Cli { stderr, .. } => PlatformError::Authentication(stderr),
                other => other,
            })?;

        if token.access_token.is_empty() {
            return Err(PlatformError::Authentication(
                "the Azure CLI returned an empty access token".into(),
            ));
        }
        Ok(token.access_token)
    }
}

/// Token from the Azure identity default chain.
pub struct IdentityCredential {
    inner: Arc<DefaultAzureCredential>,
}

impl IdentityCredential {
    /// Build the default identity chain.
    pub fn new() -> PlatformResult<Self> {
        let inner = DefaultAzureCredential::new()
            .map_err(|e| PlatformError::Authentication(e.to_string()))?;
        Ok(Self { inner })
    }
}

impl fmt::Debug for IdentityCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IdentityCredential")
    }
}

#[async_trait]
impl TokenCredential for IdentityCredential {
    async fn token(&self) -> PlatformResult<String> {
        tracing::debug!("Requesting access token from the Azure identity chain");
        let token = self
            .inner
            .get_token(&[MANAGEMENT_SCOPE])
            .await
            .map_err(|e| PlatformError::Authentication(e.to_string()))?;
        Ok(token.token.secret().to_string())
    }
}

/// Tries each source in order and returns the first token obtained.
#[derive(Debug, Default)]
pub struct ChainedCredential {
    sources: Vec<Arc<dyn TokenCredential>>,
}

impl ChainedCredential {
    /// Chain the given sources.
    #[must_use]
    pub fn new(sources: Vec<Arc<dyn TokenCredential>>) -> Self {
        Self { sources }
    }

    /// Sources in the order they are tried.
    #[must_use]
    pub fn sources(&self) -> &[Arc<dyn TokenCredential>] {
        &self.sources
    }
}

#[async_trait]
impl TokenCredential for ChainedCredential {
    async fn token(&self) -> PlatformResult<String> {
        let mut failures = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            match source.token().await {
                Ok(token) => return Ok(token),
                Err(e) => {
                    tracing::debug!(source = ?source, error = %e, "Credential source failed");
                    failures.push(format!("{source:?}: {e}"));
                }
            }
        }
        if failures.is_empty() {
            return Err(PlatformError::Authentication(
                "no credential sources configured".into(),
            ));
        }
        Err(PlatformError::Authentication(failures.join("; ")))
    }
}

/// Picks a credential source once and caches the token it yields.
pub struct DefaultCredential {
    source: Arc<dyn TokenCredential>,
    cached: Mutex<Option<String>>,
}

impl DefaultCredential {
    /// Wrap an explicit source.
    #[must_use]
    pub fn new(source: Arc<dyn TokenCredential>) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
        }
    }

    /// `AZURE_ACCESS_TOKEN` if set and non-blank, otherwise the identity chain
    /// followed by `cli`.
    #[must_use]
    pub fn from_env(cli: AzCli) -> Self {
        match std::env::var(ACCESS_TOKEN_ENV) {
            Ok(token) if !token.trim().is_empty() => {
                tracing::debug!("Using access token from {}", ACCESS_TOKEN_ENV);
                Self::new(Arc::new(StaticToken::new(token.trim())))
            }
            _ => Self::new(Arc::new(Self::chain(cli))),
        }
    }

    fn chain(cli: AzCli) -> ChainedCredential {
        let mut sources: Vec<Arc<dyn TokenCredential>> = Vec::with_capacity(2);
        match IdentityCredential::new() {
            Ok(identity) => sources.push(Arc::new(identity)),
            Err(e) => tracing::warn!(error = %e, "Azure identity chain unavailable"),
        }
        sources.push(Arc::new(AzureCliCredential::new(cli)));
        ChainedCredential::new(sources)
    }

    /// Forget the cached token.
    pub fn clear(&self) {
        *self.cached.lock() = None;
    }
}

impl fmt::Debug for DefaultCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultCredential")
            .field("source", &self.source)
            .field("cached", &self.cached.lock().is_some())
            .finish()
    }
}

#[async_trait]
impl TokenCredential for DefaultCredential {
    async fn token(&self) -> PlatformResult<String> {
        if let Some(token) = self.cached.lock().clone() {
            return Ok(token);
        }
        let token = self.source.token().await?;
        *self.cached.lock() = Some(token.clone());
        Ok(token)
    }
}
