use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::allocator::{TokenIdAllocator, DEFAULT_START_ID};
use crate::metadata::MetadataBuilder;
use crate::registry::{RegistryError, TokenRegistry};
use crate::types::{FailedMintIdPolicy, FailureReason, MintState, RejectReason, Token, TokenId};
use crate::validator::is_valid_domain;

/// Tunables for a [`MintSession`].
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub start_id: TokenId,
    pub failed_mint_ids: FailedMintIdPolicy,
    pub success_display: Duration,
    pub metadata: MetadataBuilder,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            start_id: DEFAULT_START_ID,
            failed_mint_ids: FailedMintIdPolicy::default(),
            success_display: Duration::seconds(3),
            metadata: MetadataBuilder::default(),
        }
    }
}

/// Synchronous mint state machine owning the registry and id allocator.
///
/// At most one attempt is in flight: [`MintSession::begin`] refuses new
/// submissions until the current ticket is completed or failed. Callers
/// that suspend between `begin` and `complete` must serialize access to the
/// session themselves (the app wraps it in a mutex).
#[derive(Debug)]
pub struct MintSession {
    registry: TokenRegistry,
    allocator: TokenIdAllocator,
    metadata: MetadataBuilder,
    failed_mint_ids: FailedMintIdPolicy,
    success_display: Duration,
    phase: Phase,
    attempts: u64,
}

#[derive(Debug)]
enum Phase {
    Idle,
    Minting(MintTicket),
    Succeeded { token: Token, until: DateTime<Utc> },
}

/// Reservation handed out when an attempt enters the minting state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintTicket {
    attempt_id: u64,
    domain: String,
    owner: String,
    token_id: TokenId,
    started_at: DateTime<Utc>,
}

impl MintTicket {
    pub fn attempt_id(&self) -> u64 {
        self.attempt_id
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Identifier reserved for the token this attempt will mint.
    pub fn token_id(&self) -> TokenId {
        self.token_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

impl MintSession {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            registry: TokenRegistry::new(),
            allocator: TokenIdAllocator::new(settings.start_id),
            metadata: settings.metadata,
            failed_mint_ids: settings.failed_mint_ids,
            success_display: settings.success_display,
            phase: Phase::Idle,
            attempts: 0,
        }
    }

    /// Runs the entry checks for `raw` and, when they pass, moves the session
    /// into the minting state with a reserved token id.
    ///
    /// Any displayed success is dismissed once the session is not busy, so a
    /// rejected submission reads as idle. Rejections leave the registry and
    /// allocator untouched.
    pub fn begin(
        &mut self,
        raw: &str,
        owner: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<MintTicket, MintError> {
        if self.is_busy() {
            return Err(MintError::ConcurrentMintRejected);
        }
        self.phase = Phase::Idle;
        let owner = owner.ok_or(MintError::WalletNotConnected)?;

        let domain = raw.trim();
        if !is_valid_domain(domain) {
            return Err(MintError::InvalidFormat(domain.to_string()));
        }
        if self.registry.contains(domain) {
            return Err(MintError::DuplicateDomain(domain.to_string()));
        }

        self.attempts += 1;
        let ticket = MintTicket {
            attempt_id: self.attempts,
            domain: domain.to_string(),
            owner: owner.to_string(),
            token_id: self.allocator.next_id(),
            started_at: now,
        };
        self.phase = Phase::Minting(ticket.clone());
        Ok(ticket)
    }

    /// Commits the token for an in-flight ticket.
    pub fn complete(
        &mut self,
        ticket: &MintTicket,
        transaction_ref: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Token, MintError> {
        self.take_in_flight(ticket)?;

        let metadata = self.metadata.build(&ticket.domain, now);
        let token = Token::new(
            ticket.token_id,
            ticket.domain.clone(),
            ticket.owner.clone(),
            now,
            transaction_ref,
            metadata,
        );

        if let Err(err) = self.registry.insert(token.clone()) {
            self.settle_failed_id(ticket.token_id);
            return Err(err.into());
        }

        self.phase = Phase::Succeeded {
            token: token.clone(),
            until: now + self.success_display,
        };
        Ok(token)
    }

    /// Ends an in-flight ticket without a token.
    ///
    /// Returns `true` when the reserved id was handed back to the allocator.
    pub fn fail(&mut self, ticket: &MintTicket) -> Result<bool, MintError> {
        self.take_in_flight(ticket)?;
        Ok(self.settle_failed_id(ticket.token_id))
    }

    /// Reports the observable state at `now`.
    ///
    /// A success stays visible for the display window, then reads as idle.
    pub fn status(&self, now: DateTime<Utc>) -> MintState {
        match &self.phase {
            Phase::Idle => MintState::Idle,
            Phase::Minting(ticket) => MintState::Minting {
                attempt_id: ticket.attempt_id,
                domain: ticket.domain.clone(),
                token_id: ticket.token_id,
                started_at: ticket.started_at,
            },
            Phase::Succeeded { token, until } if now < *until => MintState::Succeeded {
                token: token.clone(),
            },
            Phase::Succeeded { .. } => MintState::Idle,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.phase, Phase::Minting(_))
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    pub fn list_tokens(&self) -> Vec<Token> {
        self.registry.list_all()
    }

    pub fn get(&self, token_id: TokenId) -> Option<&Token> {
        self.registry.get(token_id)
    }

    /// Identifier the next successful reservation will receive.
    pub fn next_token_id(&self) -> TokenId {
        self.allocator.peek()
    }

    fn take_in_flight(&mut self, ticket: &MintTicket) -> Result<(), MintError> {
        let in_flight = matches!(
            &self.phase,
            Phase::Minting(current) if current.attempt_id == ticket.attempt_id
        );
        if !in_flight {
            return Err(MintError::NoMintInFlight);
        }
        self.phase = Phase::Idle;
        Ok(())
    }

    fn settle_failed_id(&mut self, token_id: TokenId) -> bool {
        match self.failed_mint_ids {
            FailedMintIdPolicy::Release => self.allocator.release(token_id),
            FailedMintIdPolicy::Retain => false,
        }
    }
}

impl Default for MintSession {
    fn default() -> Self {
        Self::new(SessionSettings::default())
    }
}

/// Errors surfaced by the mint workflow. None of them are fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MintError {
    #[error("invalid domain format: {0:?}")]
    InvalidFormat(String),
    #[error("domain already wrapped as an NFT: {0}")]
    DuplicateDomain(String),
    #[error("another mint is already in progress")]
    ConcurrentMintRejected,
    #[error("no wallet connected")]
    WalletNotConnected,
    #[error("no mint in progress")]
    NoMintInFlight,
    #[error("mint failed: {}", .0.as_str())]
    Failed(FailureReason),
    #[error("registry invariant violated: {0}")]
    Registry(#[from] RegistryError),
}

impl MintError {
    /// Maps entry-point refusals to their reported reason.
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::InvalidFormat(_) => Some(RejectReason::InvalidFormat),
            Self::DuplicateDomain(_) => Some(RejectReason::DuplicateDomain),
            Self::ConcurrentMintRejected => Some(RejectReason::ConcurrentMintRejected),
            Self::WalletNotConnected => Some(RejectReason::WalletNotConnected),
            _ => None,
        }
    }

    /// Label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoMintInFlight => "no_mint_in_flight",
            Self::Failed(reason) => reason.as_str(),
            Self::Registry(_) => "registry_invariant",
            other => other
                .reject_reason()
                .map(RejectReason::as_str)
                .unwrap_or("unknown"),
        }
    }
}
