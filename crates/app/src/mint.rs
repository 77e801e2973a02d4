use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use domain_wrap_core::{
    FailureReason, IdentityProvider, MetadataBuilder, MintError, MintSession, MintState,
    MintTicket, SessionSettings, Token, TokenId,
};
use domain_wrap_util::MintConfig;
use metrics::{counter, gauge, histogram};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::events::{MintEvent, MintEventHub};

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Stand-in for the ledger round trip: waits, then accepts or rejects.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedChain {
    delay: Duration,
    failure_rate: f64,
}

impl SimulatedChain {
    pub fn new(delay: Duration, failure_rate: f64) -> Self {
        Self {
            delay,
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub async fn confirm(&self) -> Result<(), ChainError> {
        tokio::time::sleep(self.delay).await;
        if self.failure_rate > 0.0 && rand::random::<f64>() < self.failure_rate {
            return Err(ChainError::Rejected);
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("transaction rejected by simulated chain")]
    Rejected,
}

/// Generates a transaction hash shaped like `0x` followed by 64 hex digits.
pub fn transaction_ref(ticket: &MintTicket) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ticket.token_id().to_be_bytes());
    hasher.update(ticket.domain().as_bytes());
    hasher.update(ticket.owner().as_bytes());
    hasher.update(Uuid::new_v4().as_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

/// Drives a [`MintSession`] through the simulated chain confirmation.
///
/// Cloning is cheap; all clones share the same session.
#[derive(Clone)]
pub struct MintWorkflow {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<WorkflowState>,
    identity: Arc<dyn IdentityProvider>,
    chain: SimulatedChain,
    events: MintEventHub,
    timeout: Duration,
    clock: Clock,
}

struct WorkflowState {
    session: MintSession,
    cancel: Option<(u64, oneshot::Sender<()>)>,
}

impl MintWorkflow {
    pub fn new(
        session: MintSession,
        identity: Arc<dyn IdentityProvider>,
        chain: SimulatedChain,
        events: MintEventHub,
        timeout: Duration,
        clock: Clock,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(WorkflowState {
                    session,
                    cancel: None,
                }),
                identity,
                chain,
                events,
                timeout,
                clock,
            }),
        }
    }

    pub fn from_config(
        config: &MintConfig,
        identity: Arc<dyn IdentityProvider>,
        events: MintEventHub,
    ) -> Self {
        let session = MintSession::new(SessionSettings {
            start_id: config.token_id_start,
            failed_mint_ids: config.failed_mint_ids,
            success_display: chrono::Duration::milliseconds(
                config.success_display.as_millis() as i64,
            ),
            metadata: MetadataBuilder::new(config.display_timezone),
        });
        let chain = SimulatedChain::new(config.mint_delay, config.chain_failure_rate);
        Self::new(
            session,
            identity,
            chain,
            events,
            config.mint_timeout,
            Arc::new(Utc::now),
        )
    }

    fn now(&self) -> DateTime<Utc> {
        (self.inner.clock)()
    }

    fn lock(&self) -> MutexGuard<'_, WorkflowState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, attempt_id: Option<u64>, state: MintState) {
        self.inner
            .events
            .publish(MintEvent::new(self.now(), attempt_id, state));
    }

    pub fn events(&self) -> &MintEventHub {
        &self.inner.events
    }

    /// Validates `raw` and reserves the single in-flight slot.
    ///
    /// Rejections are reported immediately. On success the returned
    /// [`PendingMint`] must be driven to completion; dropping it abandons
    /// the attempt as cancelled.
    pub fn begin(&self, raw: &str) -> Result<PendingMint, MintError> {
        let now = self.now();
        let owner = self.inner.identity.actor_identity();
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let mut state = self.lock();
        if state.session.is_busy() {
            drop(state);
            counter!("mint_attempts_total", "outcome" => "concurrent_mint_rejected").increment(1);
            warn!(stage = "mint", input = %raw, "submission refused while a mint is in flight");
            return Err(MintError::ConcurrentMintRejected);
        }

        self.publish(
            None,
            MintState::Validating {
                input: raw.trim().to_string(),
            },
        );
        let result = state.session.begin(raw, owner.as_deref(), now);
        if let Ok(ticket) = &result {
            state.cancel = Some((ticket.attempt_id(), cancel_tx));
        }
        drop(state);

        match result {
            Ok(ticket) => {
                info!(
                    stage = "mint",
                    attempt_id = ticket.attempt_id(),
                    domain = %ticket.domain(),
                    token_id = ticket.token_id(),
                    delay_ms = self.inner.chain.delay().as_millis() as u64,
                    "mint started"
                );
                self.publish(
                    Some(ticket.attempt_id()),
                    MintState::Minting {
                        attempt_id: ticket.attempt_id(),
                        domain: ticket.domain().to_string(),
                        token_id: ticket.token_id(),
                        started_at: ticket.started_at(),
                    },
                );
                Ok(PendingMint {
                    workflow: self.clone(),
                    ticket,
                    cancel: cancel_rx,
                    started: Instant::now(),
                    settled: false,
                })
            }
            Err(err) => {
                counter!("mint_attempts_total", "outcome" => err.kind()).increment(1);
                info!(stage = "mint", input = %raw, reason = err.kind(), "submission rejected");
                if let Some(reason) = err.reject_reason() {
                    self.publish(None, MintState::Rejected { reason });
                }
                self.publish(None, MintState::Idle);
                Err(err)
            }
        }
    }

    /// Runs a full attempt: validation, confirmation, commit.
    #[cfg(test)]
    pub async fn submit(&self, raw: &str) -> Result<Token, MintError> {
        self.begin(raw)?.complete().await
    }

    /// Cancels the in-flight mint, returning its attempt id.
    pub fn cancel(&self) -> Result<u64, MintError> {
        let (attempt_id, sender) = self
            .lock()
            .cancel
            .take()
            .ok_or(MintError::NoMintInFlight)?;
        // The receiver is gone only if the attempt already settled.
        let _ = sender.send(());
        info!(stage = "mint", attempt_id, "mint cancellation requested");
        Ok(attempt_id)
    }

    pub fn status(&self) -> MintState {
        let now = self.now();
        self.lock().session.status(now)
    }

    pub fn list_tokens(&self) -> Vec<Token> {
        self.lock().session.list_tokens()
    }

    pub fn get_token(&self, token_id: TokenId) -> Option<Token> {
        self.lock().session.get(token_id).cloned()
    }

    /// Case-insensitive check against the registry.
    pub fn is_minted(&self, domain: &str) -> bool {
        self.lock().session.registry().contains(domain.trim())
    }

    /// Identifier the next reservation will receive.
    pub fn next_token_id(&self) -> TokenId {
        self.lock().session.next_token_id()
    }

    fn settle(
        &self,
        ticket: &MintTicket,
        outcome: Result<(), FailureReason>,
        started: Instant,
    ) -> Result<Token, MintError> {
        let now = self.now();
        let mut state = self.lock();
        let live = matches!(&state.cancel, Some((id, _)) if *id == ticket.attempt_id());
        state.cancel = None;
        // A cancel that raced the confirmation still wins.
        let outcome = if live {
            outcome
        } else {
            Err(FailureReason::Cancelled)
        };

        match outcome {
            Ok(()) => {
                let result = state
                    .session
                    .complete(ticket, transaction_ref(ticket), now);
                let registered = state.session.registry().len();
                drop(state);
                self.record_success(ticket, result, registered, started)
            }
            Err(reason) => {
                let released = state.session.fail(ticket);
                drop(state);
                counter!("mint_attempts_total", "outcome" => reason.as_str()).increment(1);
                match released {
                    Ok(released) => warn!(
                        stage = "mint",
                        attempt_id = ticket.attempt_id(),
                        domain = %ticket.domain(),
                        token_id = ticket.token_id(),
                        reason = reason.as_str(),
                        id_released = released,
                        "mint failed"
                    ),
                    Err(err) => error!(
                        stage = "mint",
                        attempt_id = ticket.attempt_id(),
                        error = %err,
                        "failed to settle mint attempt"
                    ),
                }
                self.publish(
                    Some(ticket.attempt_id()),
                    MintState::Failed {
                        reason,
                        domain: ticket.domain().to_string(),
                    },
                );
                self.publish(Some(ticket.attempt_id()), MintState::Idle);
                Err(MintError::Failed(reason))
            }
        }
    }

    fn record_success(
        &self,
        ticket: &MintTicket,
        result: Result<Token, MintError>,
        registered: usize,
        started: Instant,
    ) -> Result<Token, MintError> {
        match result {
            Ok(token) => {
                counter!("mint_attempts_total", "outcome" => "succeeded").increment(1);
                histogram!("mint_duration_seconds").record(started.elapsed().as_secs_f64());
                gauge!("registry_tokens").set(registered as f64);
                info!(
                    stage = "mint",
                    attempt_id = ticket.attempt_id(),
                    domain = %token.domain(),
                    token_id = token.token_id(),
                    tx = %token.transaction_ref(),
                    "mint succeeded"
                );
                self.publish(
                    Some(ticket.attempt_id()),
                    MintState::Succeeded {
                        token: token.clone(),
                    },
                );
                Ok(token)
            }
            Err(err) => {
                counter!("mint_attempts_total", "outcome" => err.kind()).increment(1);
                error!(
                    stage = "mint",
                    attempt_id = ticket.attempt_id(),
                    domain = %ticket.domain(),
                    error = %err,
                    "mint could not be committed"
                );
                self.publish(Some(ticket.attempt_id()), MintState::Idle);
                Err(err)
            }
        }
    }
}

/// An attempt that has entered the minting state.
pub struct PendingMint {
    workflow: MintWorkflow,
    ticket: MintTicket,
    cancel: oneshot::Receiver<()>,
    started: Instant,
    settled: bool,
}

impl PendingMint {
    pub fn ticket(&self) -> &MintTicket {
        &self.ticket
    }

    /// Waits for the simulated confirmation and commits the token.
    ///
    /// Ends in [`MintError::Failed`] when cancelled, timed out or rejected.
    pub async fn complete(mut self) -> Result<Token, MintError> {
        let chain = &self.workflow.inner.chain;
        let timeout = self.workflow.inner.timeout;
        let outcome = tokio::select! {
            _ = &mut self.cancel => Err(FailureReason::Cancelled),
            confirmed = tokio::time::timeout(timeout, chain.confirm()) => match confirmed {
                Ok(Ok(())) => Ok(()),
                Ok(Err(_)) => Err(FailureReason::ChainRejected),
                Err(_) => Err(FailureReason::TimedOut),
            },
        };

        self.settled = true;
        self.workflow.settle(&self.ticket, outcome, self.started)
    }
}

impl Drop for PendingMint {
    fn drop(&mut self) {
        if !self.settled {
            let _ = self
                .workflow
                .settle(&self.ticket, Err(FailureReason::Cancelled), self.started);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_wrap_core::{identity::StaticIdentity, FailedMintIdPolicy, RejectReason};
    use tokio::sync::broadcast;

    const OWNER: &str = "0x742d35Cc6634C0532925a3b8D4C7fA2C6f1e8b2A";
    const DELAY: Duration = Duration::from_millis(2500);

    struct Harness {
        workflow: MintWorkflow,
        clock: Arc<Mutex<DateTime<Utc>>>,
    }

    impl Harness {
        fn advance_clock(&self, by: chrono::Duration) {
            let mut now = self.clock.lock().unwrap();
            *now += by;
        }
    }

    fn harness_with(
        settings: SessionSettings,
        chain: SimulatedChain,
        timeout: Duration,
        owner: Option<&str>,
    ) -> Harness {
        let clock = Arc::new(Mutex::new(
            DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        ));
        let clock_fn: Clock = {
            let clock = clock.clone();
            Arc::new(move || *clock.lock().unwrap())
        };
        let workflow = MintWorkflow::new(
            MintSession::new(settings),
            Arc::new(StaticIdentity(owner.map(str::to_string))),
            chain,
            MintEventHub::new(),
            timeout,
            clock_fn,
        );
        Harness { workflow, clock }
    }

    fn harness() -> Harness {
        harness_with(
            SessionSettings::default(),
            SimulatedChain::new(DELAY, 0.0),
            Duration::from_secs(30),
            Some(OWNER),
        )
    }

    fn drain(receiver: &mut broadcast::Receiver<MintEvent>) -> Vec<&'static str> {
        let mut names = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            names.push(event.event_name());
        }
        names
    }

    #[tokio::test(start_paused = true)]
    async fn submit_waits_for_confirmation_then_commits() {
        let h = harness();
        let started = tokio::time::Instant::now();

        let token = h.workflow.submit("example.com").await.expect("mint");

        assert!(started.elapsed() >= DELAY);
        assert_eq!(token.token_id(), 1001);
        assert_eq!(token.owner(), OWNER);
        assert!(token.transaction_ref().starts_with("0x"));
        assert_eq!(token.transaction_ref().len(), 66);
        assert_eq!(h.workflow.list_tokens(), vec![token]);
    }

    #[tokio::test(start_paused = true)]
    async fn ids_increase_and_listing_is_most_recent_first() {
        let h = harness();
        let mut ids = Vec::new();
        for domain in ["a.com", "b.com", "c.com"] {
            ids.push(h.workflow.submit(domain).await.expect("mint").token_id());
        }
        assert_eq!(ids, vec![1001, 1002, 1003]);

        let domains: Vec<_> = h
            .workflow
            .list_tokens()
            .iter()
            .map(|t| t.domain().to_string())
            .collect();
        assert_eq!(domains, vec!["c.com", "b.com", "a.com"]);
        assert_eq!(
            h.workflow.get_token(1002).map(|t| t.domain().to_string()),
            Some("b.com".into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_domain_in_other_case_is_rejected() {
        let h = harness();
        h.workflow.submit("example.com").await.expect("mint");

        let err = h
            .workflow
            .submit("EXAMPLE.com")
            .await
            .expect_err("duplicate");
        assert_eq!(err.reject_reason(), Some(RejectReason::DuplicateDomain));
        assert_eq!(h.workflow.list_tokens().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_input_is_rejected_every_time() {
        let h = harness();
        let mut events = h.workflow.events().subscribe();

        for _ in 0..2 {
            let err = h.workflow.submit("bad.c0m").await.expect_err("invalid");
            assert_eq!(err.reject_reason(), Some(RejectReason::InvalidFormat));
        }

        assert!(h.workflow.list_tokens().is_empty());
        assert_eq!(h.workflow.next_token_id(), 1001);
        assert_eq!(h.workflow.status(), MintState::Idle);
        assert_eq!(
            drain(&mut events),
            vec!["validating", "rejected", "idle", "validating", "rejected", "idle"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn second_submit_during_minting_is_refused() {
        let h = harness();
        let pending = h.workflow.begin("a.com").expect("begin");
        assert!(h.workflow.status().is_busy());

        let err = h.workflow.submit("b.com").await.expect_err("in flight");
        assert_eq!(err, MintError::ConcurrentMintRejected);

        let token = pending.complete().await.expect("complete");
        assert_eq!(token.token_id(), 1001);
        assert_eq!(h.workflow.list_tokens().len(), 1);

        let next = h.workflow.submit("b.com").await.expect("after completion");
        assert_eq!(next.token_id(), 1002);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_submissions_produce_one_token() {
        let h = harness();
        let first = {
            let workflow = h.workflow.clone();
            tokio::spawn(async move { workflow.submit("a.com").await })
        };
        tokio::task::yield_now().await;
        let second = h.workflow.submit("b.com").await;

        assert_eq!(second, Err(MintError::ConcurrentMintRejected));
        let token = first.await.expect("join").expect("first mint");
        assert_eq!(token.token_id(), 1001);
        assert_eq!(h.workflow.list_tokens().len(), 1);
        assert_eq!(h.workflow.next_token_id(), 1002);
    }

    #[tokio::test(start_paused = true)]
    async fn success_events_follow_the_state_machine() {
        let h = harness();
        let mut events = h.workflow.events().subscribe();

        h.workflow.submit("site.io").await.expect("mint");

        assert_eq!(drain(&mut events), vec!["validating", "minting", "succeeded"]);
    }

    #[tokio::test(start_paused = true)]
    async fn success_status_expires_after_display_window() {
        let h = harness();
        let token = h.workflow.submit("site.io").await.expect("mint");

        assert_eq!(h.workflow.status(), MintState::Succeeded { token });
        h.advance_clock(chrono::Duration::seconds(3));
        assert_eq!(h.workflow.status(), MintState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_inside_display_window_reads_idle_everywhere() {
        let h = harness();
        h.workflow.submit("a.com").await.expect("mint");
        let mut events = h.workflow.events().subscribe();

        let err = h.workflow.submit("bad..com").await.expect_err("invalid");
        assert_eq!(err.reject_reason(), Some(RejectReason::InvalidFormat));

        assert_eq!(drain(&mut events), vec!["validating", "rejected", "idle"]);
        assert_eq!(h.workflow.status(), MintState::Idle);
        assert_eq!(h.workflow.list_tokens().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_fails_the_attempt_and_releases_the_id() {
        let h = harness();
        let pending = h.workflow.begin("a.com").expect("begin");
        let task = tokio::spawn(pending.complete());
        tokio::task::yield_now().await;

        assert_eq!(h.workflow.cancel(), Ok(1));
        let result = task.await.expect("join");

        assert_eq!(result, Err(MintError::Failed(FailureReason::Cancelled)));
        assert!(h.workflow.list_tokens().is_empty());
        assert_eq!(h.workflow.status(), MintState::Idle);
        assert_eq!(h.workflow.next_token_id(), 1001);
        assert_eq!(h.workflow.cancel(), Err(MintError::NoMintInFlight));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_chain_times_out() {
        let h = harness_with(
            SessionSettings::default(),
            SimulatedChain::new(Duration::from_secs(60), 0.0),
            Duration::from_secs(5),
            Some(OWNER),
        );

        let err = h.workflow.submit("a.com").await.expect_err("timeout");
        assert_eq!(err, MintError::Failed(FailureReason::TimedOut));
        assert!(!h.workflow.status().is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn chain_rejection_retains_id_when_configured() {
        let h = harness_with(
            SessionSettings {
                failed_mint_ids: FailedMintIdPolicy::Retain,
                ..SessionSettings::default()
            },
            SimulatedChain::new(DELAY, 1.0),
            Duration::from_secs(30),
            Some(OWNER),
        );
        let mut events = h.workflow.events().subscribe();

        let err = h.workflow.submit("a.com").await.expect_err("rejected");
        assert_eq!(err, MintError::Failed(FailureReason::ChainRejected));
        assert_eq!(h.workflow.next_token_id(), 1002);
        assert!(h.workflow.list_tokens().is_empty());
        assert_eq!(
            drain(&mut events),
            vec!["validating", "minting", "failed", "idle"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_a_pending_mint_frees_the_session() {
        let h = harness();
        let pending = h.workflow.begin("a.com").expect("begin");
        drop(pending);

        assert_eq!(h.workflow.status(), MintState::Idle);
        let token = h.workflow.submit("a.com").await.expect("retry");
        assert_eq!(token.token_id(), 1001);
    }

    #[tokio::test(start_paused = true)]
    async fn minting_requires_connected_wallet() {
        let h = harness_with(
            SessionSettings::default(),
            SimulatedChain::new(DELAY, 0.0),
            Duration::from_secs(30),
            None,
        );

        let err = h.workflow.submit("a.com").await.expect_err("no wallet");
        assert_eq!(err, MintError::WalletNotConnected);
    }

    #[test]
    fn transaction_refs_are_unique_hashes() {
        let mut session = MintSession::default();
        let ticket = session
            .begin("a.com", Some(OWNER), Utc::now())
            .expect("begin");

        let first = transaction_ref(&ticket);
        let second = transaction_ref(&ticket);
        assert_eq!(first.len(), 66);
        assert!(first[2..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, second);
    }
}
