//! Resource shapes returned by the ledger-indexing service and the client error type.
//!
//! The service speaks a HAL-like dialect: collections are nested under `_embedded` and
//! navigation links under `_links`. A collection response that omits `_embedded` is an
//! empty collection, never an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Block height used for transactions that have not been included in a block yet.
pub const BLOCK_HEIGHT_UNBOUND: u64 = u64::MAX;

/// A navigation link inside `_links`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Link {
    pub href: String,
}

/// An account registered with the indexing service.
///
/// `token` is only present on the create and login responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub account_id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(rename = "_links", default)]
    pub links: HashMap<String, Link>,
}

/// An API client registered under an account. Each carries its own bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRecord {
    pub account_id: String,
    pub client_id: String,
    pub name: String,
    pub token: String,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(rename = "_links", default)]
    pub links: HashMap<String, Link>,
}

/// A blockchain tracked by the indexer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blockchain {
    pub id: String,
    pub name: String,
    pub network: String,
    pub is_mainnet: bool,
    #[serde(default)]
    pub native_currency_id: Option<String>,
    /// Current chain height; absent while the indexer is catching up.
    #[serde(default)]
    pub block_height: Option<u64>,
    #[serde(default)]
    pub verified_height: Option<u64>,
    #[serde(default)]
    pub confirmations_until_final: Option<u32>,
}

/// Inclusion status of a transaction as reported by the indexer.
///
/// Values the client has no variant for are kept verbatim in `Unknown`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum TransactionStatus {
    Confirmed,
    Submitted,
    Failed,
    Reverted,
    Unknown(String),
}

impl TransactionStatus {
    /// The wire value.
    pub fn as_str(&self) -> &str {
        match self {
            TransactionStatus::Confirmed => "confirmed",
            TransactionStatus::Submitted => "submitted",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Reverted => "reverted",
            TransactionStatus::Unknown(other) => other,
        }
    }
}

impl From<String> for TransactionStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "confirmed" => TransactionStatus::Confirmed,
            "submitted" => TransactionStatus::Submitted,
            "failed" => TransactionStatus::Failed,
            "reverted" => TransactionStatus::Reverted,
            _ => TransactionStatus::Unknown(value),
        }
    }
}

impl From<TransactionStatus> for String {
    fn from(status: TransactionStatus) -> Self {
        match status {
            TransactionStatus::Unknown(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transaction resource from `GET /transactions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResource {
    pub transaction_id: String,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
    pub blockchain_id: String,
    pub status: TransactionStatus,
    pub timestamp: DateTime<Utc>,
    /// `None` while the transaction is pending.
    #[serde(default)]
    pub block_height: Option<u64>,
    /// Base64 of the serialized transaction; only present with `include_raw=true`.
    #[serde(default)]
    pub raw: Option<String>,
}

/// HAL collection envelope. `T` is the map of collection name to items found under
/// `_embedded`, e.g. `ClientsEmbedded`.
#[derive(Debug, Clone, Deserialize)]
pub struct Embedded<T> {
    #[serde(rename = "_embedded", default)]
    pub embedded: Option<T>,
    #[serde(rename = "_links", default)]
    pub links: HashMap<String, Link>,
}

impl<T> Embedded<T> {
    /// The `next` page link, if the service reported one.
    pub fn next_href(&self) -> Option<&str> {
        self.links.get("next").map(|link| link.href.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientsEmbedded {
    #[serde(default)]
    pub clients: Vec<ClientRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockchainsEmbedded {
    #[serde(default)]
    pub blockchains: Vec<Blockchain>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionsEmbedded {
    #[serde(default)]
    pub transactions: Vec<TransactionResource>,
}

/// One page of transactions with the link to the following page, if any.
#[derive(Debug, Clone, Default)]
pub struct TransactionPage {
    pub transactions: Vec<TransactionResource>,
    pub next: Option<String>,
}

impl From<Embedded<TransactionsEmbedded>> for TransactionPage {
    fn from(envelope: Embedded<TransactionsEmbedded>) -> Self {
        let next = envelope.next_href().map(str::to_string);
        Self {
            transactions: envelope
                .embedded
                .map(|embedded| embedded.transactions)
                .unwrap_or_default(),
            next,
        }
    }
}

/// Query for `GET /transactions`. Only fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionQuery {
    pub blockchain_id: String,
    pub addresses: Vec<String>,
    pub start_height: Option<u64>,
    pub end_height: Option<u64>,
    pub start_ts: Option<i64>,
    pub end_ts: Option<i64>,
    pub max_page_size: Option<u32>,
    pub include_raw: Option<bool>,
    pub include_proof: Option<bool>,
}

impl TransactionQuery {
    pub fn new(blockchain_id: impl Into<String>) -> Self {
        Self {
            blockchain_id: blockchain_id.into(),
            ..Default::default()
        }
    }

    pub fn addresses(mut self, addresses: Vec<String>) -> Self {
        self.addresses = addresses;
        self
    }

    pub fn heights(mut self, start_height: u64, end_height: u64) -> Self {
        self.start_height = Some(start_height);
        self.end_height = Some(end_height);
        self
    }

    pub fn include_raw(mut self, include_raw: bool) -> Self {
        self.include_raw = Some(include_raw);
        self
    }

    /// Query-string pairs in wire order. Addresses are repeated as `address[]`.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("blockchain_id", self.blockchain_id.clone())];
        params.extend(self.addresses.iter().map(|a| ("address[]", a.clone())));

        let optional = [
            ("start_height", self.start_height.map(|v| v.to_string())),
            ("end_height", self.end_height.map(|v| v.to_string())),
            ("start_ts", self.start_ts.map(|v| v.to_string())),
            ("end_ts", self.end_ts.map(|v| v.to_string())),
            ("max_page_size", self.max_page_size.map(|v| v.to_string())),
            ("include_raw", self.include_raw.map(|v| v.to_string())),
            ("include_proof", self.include_proof.map(|v| v.to_string())),
        ];
        params.extend(
            optional
                .into_iter()
                .filter_map(|(key, value)| value.map(|value| (key, value))),
        );
        params
    }
}

/// Error types for indexer requests
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    #[error("No token configured for indexer client")]
    Auth,

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("No data returned")]
    NoData,
}

impl IndexerError {
    /// Network failures and error responses may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            IndexerError::Api { .. } => true,
            IndexerError::Http(e) => !e.is_builder(),
            _ => false,
        }
    }

    /// HTTP status of an error response.
    pub fn status(&self) -> Option<u16> {
        match self {
            IndexerError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
