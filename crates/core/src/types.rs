use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned to a minted token.
pub type TokenId = u64;

/// Issued record asserting ownership of a domain.
///
/// Fields are private so a committed token cannot be edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    token_id: TokenId,
    domain: String,
    owner: String,
    minted_at: DateTime<Utc>,
    transaction_ref: String,
    metadata: Metadata,
}

impl Token {
    pub fn new(
        token_id: TokenId,
        domain: impl Into<String>,
        owner: impl Into<String>,
        minted_at: DateTime<Utc>,
        transaction_ref: impl Into<String>,
        metadata: Metadata,
    ) -> Self {
        Self {
            token_id,
            domain: domain.into(),
            owner: owner.into(),
            minted_at,
            transaction_ref: transaction_ref.into(),
            metadata,
        }
    }

    pub fn token_id(&self) -> TokenId {
        self.token_id
    }

    /// Domain as submitted, original casing preserved.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn minted_at(&self) -> DateTime<Utc> {
        self.minted_at
    }

    pub fn transaction_ref(&self) -> &str {
        &self.transaction_ref
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// NFT metadata document. The serialized shape is consumed by exporters and
/// must stay `{name, description, domain, wrapped_at, attributes}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub description: String,
    pub domain: String,
    pub wrapped_at: String,
    pub attributes: Vec<Attribute>,
}

impl Metadata {
    /// Looks up an attribute value by its trait name.
    pub fn attribute(&self, trait_type: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|attr| attr.trait_type == trait_type)
            .map(|attr| &attr.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub trait_type: String,
    pub value: AttributeValue,
}

/// Attribute values are either numbers or text in the metadata document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Number(u64),
    Text(String),
}

impl AttributeValue {
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(value) => Some(value),
        }
    }
}

/// Why a submission was refused before minting started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    InvalidFormat,
    DuplicateDomain,
    ConcurrentMintRejected,
    WalletNotConnected,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidFormat => "invalid_format",
            Self::DuplicateDomain => "duplicate_domain",
            Self::ConcurrentMintRejected => "concurrent_mint_rejected",
            Self::WalletNotConnected => "wallet_not_connected",
        }
    }
}

/// Why an in-flight mint ended without a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Cancelled,
    TimedOut,
    ChainRejected,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed_out",
            Self::ChainRejected => "chain_rejected",
        }
    }
}

/// What happens to the identifier reserved for a mint that later fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailedMintIdPolicy {
    /// Hand the identifier back so the next mint reuses it.
    #[default]
    Release,
    /// Keep the identifier consumed, leaving a gap in the sequence.
    Retain,
}

impl FailedMintIdPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Release => "release",
            Self::Retain => "retain",
        }
    }
}

impl FromStr for FailedMintIdPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "release" | "rollback" => Ok(Self::Release),
            "retain" | "skip" => Ok(Self::Retain),
            other => Err(other.to_string()),
        }
    }
}

/// Observable state of the mint workflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MintState {
    Idle,
    Validating {
        input: String,
    },
    Minting {
        attempt_id: u64,
        domain: String,
        token_id: TokenId,
        started_at: DateTime<Utc>,
    },
    Rejected {
        reason: RejectReason,
    },
    Succeeded {
        token: Token,
    },
    Failed {
        reason: FailureReason,
        domain: String,
    },
}

impl MintState {
    /// Returns the canonical state name used for events and metrics labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating { .. } => "validating",
            Self::Minting { .. } => "minting",
            Self::Rejected { .. } => "rejected",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }

    /// Returns `true` while a mint is in flight and submissions are disabled.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Minting { .. })
    }
}

/// Renders a wallet address as `0x742d...8b2A`.
pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
