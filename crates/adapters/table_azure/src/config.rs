//! Connection settings for the Table service.

use std::fmt;
use std::time::Duration;

use reqwest::Url;
use tally_domain::counter::VISITORS_TABLE;

use crate::counter_table::AzureCounterTable;
use crate::error::AzureTableError;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared access signature query string (`sv=...&sig=...`).
///
/// Never printed: `Debug` shows a placeholder.
#[derive(Clone, PartialEq, Eq)]
pub struct SasToken(String);

impl SasToken {
    /// Wrap a token, dropping a leading `?` if it was copied with one.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        match token.strip_prefix('?') {
            Some(stripped) => Self(stripped.to_string()),
            None => Self(token),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SasToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SasToken(<redacted>)")
    }
}

/// Configuration for the Azure Table adapter.
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage account name.
    pub account: String,
    /// Access credential.
    pub sas_token: SasToken,
    /// Service endpoint override (Azurite, sovereign clouds, tests).
    /// Defaults to `https://{account}.table.core.windows.net`.
    pub endpoint: Option<String>,
    /// Table holding the counter records.
    pub table: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Config {
    /// Settings for the visitor table of `account`.
    #[must_use]
    pub fn new(account: impl Into<String>, sas_token: SasToken) -> Self {
        Self {
            account: account.into(),
            sas_token,
            endpoint: None,
            table: VISITORS_TABLE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Resolve the service endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns [`AzureTableError::InvalidEndpoint`] when the URL does not
    /// parse or is not an `http(s)` base URL.
    pub fn endpoint_url(&self) -> Result<Url, AzureTableError> {
        let raw = match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None if self.account.is_empty() => {
                return Err(AzureTableError::InvalidEndpoint(
                    "no endpoint and no account name".to_string(),
                ));
            }
            None => format!("https://{}.table.core.windows.net", self.account),
        };
        let url = Url::parse(&raw).map_err(|_| AzureTableError::InvalidEndpoint(raw.clone()))?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(AzureTableError::InvalidEndpoint(raw));
        }
        Ok(url)
    }

    /// Build the adapter and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`AzureTableError`] if the endpoint is invalid or the HTTP
    /// client cannot be constructed.
    pub fn build(self) -> Result<AzureCounterTable, AzureTableError> {
        let endpoint = self.endpoint_url()?;
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .build()
            .map_err(AzureTableError::Client)?;

        tracing::debug!(%endpoint, table = %self.table, "azure table client ready");
        Ok(AzureCounterTable::new(
            client,
            endpoint,
            self.table,
            self.sas_token,
        ))
    }
}
