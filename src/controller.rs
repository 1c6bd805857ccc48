use crate::{
    config::Variant,
    contract::{
        BallotContract,
        DappContract,
        PreparedWrite,
        TokenContract,
    },
    error::DappError,
    history::{
        History,
        HistoryEntry,
    },
    orchestrator::{
        PendingTransaction,
        TxOrchestrator,
        TxState,
        await_finality,
    },
    session::{
        NetworkPolicy,
        Session,
        SessionManager,
    },
    sync::{
        ContractSnapshot,
        EventWatches,
        Synchronizer,
    },
    transport::{
        TxReceipt,
        WalletChange,
        WalletTransport,
    },
    validation::{
        parse_address,
        short_address,
    },
};
use alloy::primitives::{
    Address,
    TxHash,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tracing::{
    debug,
    error,
    info,
    warn,
};

const MAX_ERRORS: usize = 50;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

#[derive(Clone, Debug)]
pub struct ControllerConfig {
    pub variant: Variant,
    pub contract: Address,
    pub expected_chain_id: u64,
    pub network_policy: NetworkPolicy,
    pub from_block: u64,
    pub spender: Option<Address>,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
}

/// Everything the renderer needs, with nothing from a stale session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewModel {
    pub variant: Variant,
    pub contract: Address,
    pub expected_chain_id: u64,
    pub session: Option<Session>,
    pub snapshot: Option<ContractSnapshot>,
    pub history: Vec<HistoryEntry>,
    pub pending: Option<PendingTransaction>,
    pub tx_state: TxState,
    pub selected_option: Option<usize>,
    pub spender: Option<Address>,
    pub status: Option<StatusMessage>,
    pub errors: Vec<String>,
}

pub struct DappController<T> {
    sessions: SessionManager<T>,
    variant: Variant,
    contract_address: Address,
    contract: Option<DappContract<T>>,
    synchronizer: Synchronizer,
    snapshot: Option<ContractSnapshot>,
    history: History,
    orchestrator: TxOrchestrator,
    watches: EventWatches,
    selected_option: Option<usize>,
    spender: Option<Address>,
    status: Option<StatusMessage>,
    errors: Vec<String>,
}

impl<T: WalletTransport> DappController<T> {
    pub fn new(transport: Option<Arc<T>>, config: ControllerConfig) -> Self {
        Self {
            sessions: SessionManager::new(
                transport,
                config.expected_chain_id,
                config.network_policy,
            ),
            variant: config.variant,
            contract_address: config.contract,
            contract: None,
            synchronizer: Synchronizer::new(config.from_block),
            snapshot: None,
            history: History::new(config.variant.history_window()),
            orchestrator: TxOrchestrator::new(
                config.confirmation_timeout,
                config.poll_interval,
            ),
            watches: EventWatches::default(),
            selected_option: None,
            spender: config.spender,
            status: None,
            errors: Vec::new(),
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.sessions.session()
    }

    pub fn snapshot(&self) -> Option<&ContractSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn tx_state(&self) -> &TxState {
        self.orchestrator.state()
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }

    pub fn selected_option(&self) -> Option<usize> {
        self.selected_option
    }

    pub async fn connect(&mut self) -> Result<(), DappError> {
        self.invalidate();
        let outcome = match self.sessions.connect().await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.sessions.disconnect();
                return Err(self.report(err));
            }
        };
        let Some(transport) = self.sessions.transport().cloned() else {
            self.sessions.disconnect();
            return Err(self.report(DappError::NoWallet));
        };
        let account = outcome.session.account;

        let contract = match self.variant {
            Variant::Ballot => {
                DappContract::Ballot(BallotContract::new(transport.clone(), self.contract_address))
            }
            Variant::Token => {
                DappContract::Token(TokenContract::new(transport.clone(), self.contract_address))
            }
        };
        // a session without its contract and watches is never left behind
        let head = match transport.block_number().await {
            Ok(head) => head,
            Err(err) => {
                self.sessions.disconnect();
                return Err(self.report(DappError::read("block number")(err)));
            }
        };
        self.watches
            .register(contract.watch_key(), contract.watch_filter(account), head + 1);
        self.contract = Some(contract);

        match outcome.warning {
            Some(warning) => {
                self.report(warning);
            }
            None => self.set_status(
                StatusKind::Info,
                format!("Connected {}", short_address(&account)),
            ),
        }
        self.refresh().await
    }

    pub fn disconnect(&mut self) {
        self.sessions.disconnect();
        self.invalidate();
        self.set_status(StatusKind::Info, "Disconnected");
    }

    /// Drops every piece of state derived from the current session.
    pub fn invalidate(&mut self) {
        self.contract = None;
        self.snapshot = None;
        self.history.clear();
        if let Some(hash) = self.orchestrator.reset() {
            self.forget(hash);
        }
        self.watches.clear();
        self.selected_option = None;
    }

    pub async fn handle_wallet_change(&mut self, change: WalletChange) -> Result<(), DappError> {
        if !self.sessions.on_external_change(&change) {
            return Ok(());
        }
        self.invalidate();
        self.set_status(StatusKind::Warning, "Wallet changed, resynchronizing");
        self.connect().await
    }

    /// Periodic work: wallet notifications first, then contract event watches.
    pub async fn tick(&mut self) -> Result<(), DappError> {
        let Some(transport) = self.sessions.transport().cloned() else {
            return Ok(());
        };
        if let Err(err) = transport.poll_changes().await {
            warn!(error = %err, "failed to poll wallet state");
        }
        // a reconnect reads the latest wallet state, older notifications are moot
        if let Some(change) = self.sessions.drain_changes().pop() {
            return self.handle_wallet_change(change).await;
        }
        if self.sessions.session().is_none() {
            return Ok(());
        }
        if let Some(hash) = self.orchestrator.overdue() {
            match transport.receipt(hash).await {
                Ok(Some(receipt)) => {
                    info!(%hash, "late receipt observed");
                    // the outcome is already on the status line
                    let _ = self.finish_transaction(hash, Ok(receipt)).await;
                }
                Ok(None) => {}
                Err(err) => warn!(%hash, error = %err, "late receipt check failed"),
            }
        }
        match self.watches.poll(&*transport).await {
            Ok(0) => Ok(()),
            Ok(seen) => {
                debug!(seen, "contract events observed");
                self.refresh().await
            }
            Err(err) => {
                warn!(error = %err, "event watch poll failed");
                Ok(())
            }
        }
    }

    /// Total refresh. On failure the previous snapshot stays visible.
    pub async fn refresh(&mut self) -> Result<(), DappError> {
        let (Some(session), Some(contract)) = (self.sessions.session(), self.contract.as_ref())
        else {
            return Err(self.report(DappError::NotConnected));
        };
        match self.synchronizer.sync(contract, session, self.spender).await {
            Ok(outcome) => {
                if !self.sessions.is_current(outcome.snapshot.session) {
                    debug!(session = %outcome.snapshot.session, "dropping snapshot for stale session");
                    return Ok(());
                }
                self.snapshot = Some(outcome.snapshot);
                self.history.reconcile(outcome.history);
                self.clamp_selection();
                Ok(())
            }
            Err(err) => Err(self.report(err)),
        }
    }

    fn option_count(&self) -> usize {
        self.snapshot
            .as_ref()
            .and_then(|s| s.ballot())
            .map(|b| b.options.len())
            .unwrap_or(0)
    }

    fn clamp_selection(&mut self) {
        let count = self.option_count();
        if self.selected_option.is_some_and(|i| i >= count) {
            self.selected_option = None;
        }
    }

    pub fn select_option(&mut self, index: usize) {
        self.selected_option = Some(index);
    }

    pub fn select_next_option(&mut self) {
        let count = self.option_count();
        if count == 0 {
            return;
        }
        self.selected_option = Some(match self.selected_option {
            Some(i) => (i + 1) % count,
            None => 0,
        });
    }

    pub fn select_prev_option(&mut self) {
        let count = self.option_count();
        if count == 0 {
            return;
        }
        self.selected_option = Some(match self.selected_option {
            Some(i) => (i + count - 1) % count,
            None => count - 1,
        });
    }

    pub async fn set_spender(&mut self, input: &str) -> Result<(), DappError> {
        let spender = match parse_address(input) {
            Ok(spender) => spender,
            Err(err) => return Err(self.report(err)),
        };
        self.spender = Some(spender);
        self.set_status(
            StatusKind::Info,
            format!("Watching allowance for {}", short_address(&spender)),
        );
        if self.sessions.session().is_some() {
            self.refresh().await?;
        }
        Ok(())
    }

    fn require_account(&mut self) -> Result<Address, DappError> {
        match self.sessions.account() {
            Some(account) if self.contract.is_some() => Ok(account),
            _ => Err(self.report(DappError::NotConnected)),
        }
    }

    fn begin_write(&mut self) -> Result<Address, DappError> {
        let account = self.require_account()?;
        if let Err(err) = self.orchestrator.begin() {
            return Err(self.report(err));
        }
        Ok(account)
    }

    pub async fn submit_vote(&mut self) -> Result<TxHash, DappError> {
        let account = self.begin_write()?;
        let prepared = match &self.contract {
            Some(DappContract::Ballot(ballot)) => {
                let options = self
                    .snapshot
                    .as_ref()
                    .and_then(|s| s.ballot())
                    .map(|b| b.options.clone())
                    .unwrap_or_default();
                ballot.prepare_vote(self.selected_option, &options)
            }
            _ => Err(DappError::Unsupported { action: "vote" }),
        };
        self.dispatch(account, prepared).await
    }

    pub async fn submit_set_voting_active(&mut self, active: bool) -> Result<TxHash, DappError> {
        let account = self.begin_write()?;
        let prepared = match &self.contract {
            Some(DappContract::Ballot(ballot)) => Ok(ballot.prepare_set_voting_active(active)),
            _ => Err(DappError::Unsupported {
                action: "voting control",
            }),
        };
        self.dispatch(account, prepared).await
    }

    pub async fn submit_transfer(&mut self, to: &str, amount: &str) -> Result<TxHash, DappError> {
        let account = self.begin_write()?;
        let prepared = match self.token_units(to).await {
            Ok((token, decimals, symbol)) => token.prepare_transfer(to, amount, decimals, &symbol),
            Err(err) => Err(err),
        };
        self.dispatch(account, prepared).await
    }

    pub async fn submit_approve(&mut self, spender: &str, amount: &str) -> Result<TxHash, DappError> {
        let account = self.begin_write()?;
        let prepared = match self.token_units(spender).await {
            Ok((token, decimals, symbol)) => {
                token.prepare_approve(spender, amount, decimals, &symbol)
            }
            Err(err) => Err(err),
        };
        let counterparty = prepared.as_ref().ok().and_then(|write| write.counterparty);
        let hash = self.dispatch(account, prepared).await?;
        if self.spender.is_none() {
            self.spender = counterparty;
        }
        Ok(hash)
    }

    /// Token, decimals and symbol for a token write. Decimals come from the
    /// snapshot; without one the address is validated before asking the chain.
    async fn token_units(
        &self,
        address_input: &str,
    ) -> Result<(&TokenContract<T>, u8, String), DappError> {
        let Some(DappContract::Token(token)) = &self.contract else {
            return Err(DappError::Unsupported { action: "token transfer" });
        };
        if let Some(snapshot) = self.snapshot.as_ref().and_then(|s| s.token()) {
            return Ok((token, snapshot.decimals, snapshot.symbol.clone()));
        }
        parse_address(address_input)?;
        let decimals = token.decimals().await?;
        Ok((token, decimals, String::new()))
    }

    async fn dispatch(
        &mut self,
        account: Address,
        prepared: Result<PreparedWrite, DappError>,
    ) -> Result<TxHash, DappError> {
        let prepared = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                self.orchestrator.abort();
                return Err(self.report(err));
            }
        };
        let Some(contract) = self.contract.as_ref() else {
            self.orchestrator.abort();
            return Err(self.report(DappError::NotConnected));
        };
        match contract.submit(account, prepared).await {
            Ok(handle) => {
                let hash = handle.hash;
                if let Some(superseded) = self.orchestrator.overdue() {
                    self.forget(superseded);
                }
                self.set_status(
                    StatusKind::Info,
                    format!("{} submitted, waiting for confirmation", handle.description),
                );
                self.orchestrator.submitted(handle, &mut self.history);
                Ok(hash)
            }
            Err(err) => {
                self.orchestrator.abort();
                Err(self.report(err))
            }
        }
    }

    fn forget(&self, hash: TxHash) {
        if let Some(transport) = self.sessions.transport() {
            debug!(%hash, "giving up on overdue transaction");
            transport.forget(hash);
        }
    }

    /// The user declined to sign before anything was sent.
    pub fn reject_signature(&mut self) {
        self.orchestrator.abort();
        self.report(DappError::TransactionRejected);
    }

    pub async fn finish_transaction(
        &mut self,
        hash: TxHash,
        outcome: Result<TxReceipt, DappError>,
    ) -> Result<(), DappError> {
        let description = self
            .orchestrator
            .pending()
            .map(|p| p.description.clone())
            .unwrap_or_default();
        match self.orchestrator.resolve(hash, outcome, &mut self.history) {
            None => Ok(()),
            Some(Ok(receipt)) => {
                self.set_status(
                    StatusKind::Success,
                    format!("{description} confirmed in block {}", receipt.block_number),
                );
                self.refresh().await
            }
            Some(Err(err)) => Err(self.report(err)),
        }
    }

    /// Waits for the in-flight write, if any, and applies its outcome.
    pub async fn await_transaction(&mut self) -> Result<(), DappError> {
        let TxState::Submitted { hash, .. } = self.orchestrator.state().clone() else {
            return Ok(());
        };
        let Some(transport) = self.sessions.transport().cloned() else {
            return Err(self.report(DappError::NoWallet));
        };
        let outcome = await_finality(
            &*transport,
            hash,
            self.orchestrator.timeout(),
            self.orchestrator.poll_interval(),
        )
        .await;
        self.finish_transaction(hash, outcome).await
    }

    pub fn view(&self) -> ViewModel {
        let session = self.sessions.session().cloned();
        let snapshot = self
            .snapshot
            .as_ref()
            .filter(|s| self.sessions.is_current(s.session))
            .cloned();
        let history = if session.is_some() {
            self.history.entries().to_vec()
        } else {
            Vec::new()
        };
        ViewModel {
            variant: self.variant,
            contract: self.contract_address,
            expected_chain_id: self.sessions.expected_chain_id(),
            session,
            snapshot,
            history,
            pending: self.orchestrator.pending().cloned(),
            tx_state: self.orchestrator.state().clone(),
            selected_option: self.selected_option,
            spender: self.spender,
            status: self.status.clone(),
            errors: self.errors.clone(),
        }
    }

    fn set_status(&mut self, kind: StatusKind, text: impl Into<String>) {
        let text = text.into();
        info!(?kind, %text, "status");
        self.status = Some(StatusMessage { kind, text });
    }

    /// Surfaces an error on the status line and hands it back to the caller.
    fn report(&mut self, err: DappError) -> DappError {
        let kind = if err.is_warning() {
            StatusKind::Warning
        } else {
            StatusKind::Error
        };
        if err.is_validation() {
            debug!(error = %err, "input rejected");
        } else {
            error!(error = %err, "dapp operation failed");
        }
        self.status = Some(StatusMessage {
            kind,
            text: err.status_message(),
        });
        self.errors.push(err.to_string());
        if self.errors.len() > MAX_ERRORS {
            let drain = self.errors.len() - MAX_ERRORS;
            self.errors.drain(0..drain);
        }
        err
    }
}

impl<T: WalletTransport + 'static> DappController<T> {
    /// A detached wait on the in-flight write, for run loops that poll it
    /// alongside input. Feed the result to `finish_transaction`.
    pub fn confirmation(
        &self,
    ) -> Option<impl Future<Output = (TxHash, Result<TxReceipt, DappError>)> + use<T> + 'static> {
        let TxState::Submitted { hash, .. } = self.orchestrator.state() else {
            return None;
        };
        let hash = *hash;
        let transport = self.sessions.transport()?.clone();
        let timeout = self.orchestrator.timeout();
        let poll_interval = self.orchestrator.poll_interval();
        Some(async move {
            let outcome = await_finality(&*transport, hash, timeout, poll_interval).await;
            (hash, outcome)
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        history::{
            Category,
            EntryStatus,
        },
        test_helpers::{
            ALICE,
            BALLOT_ADDRESS,
            BOB,
            FakeChain,
            TOKEN_ADDRESS,
        },
    };

    fn config(variant: Variant, contract: Address, chain: &FakeChain) -> ControllerConfig {
        ControllerConfig {
            variant,
            contract,
            expected_chain_id: chain.current_chain_id(),
            network_policy: NetworkPolicy::Warn,
            from_block: 0,
            spender: None,
            confirmation_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(5),
        }
    }

    async fn ballot_controller(chain: &Arc<FakeChain>) -> DappController<FakeChain> {
        let mut controller = DappController::new(
            Some(chain.clone()),
            config(Variant::Ballot, BALLOT_ADDRESS, chain),
        );
        controller.connect().await.unwrap();
        controller
    }

    async fn token_controller(chain: &Arc<FakeChain>) -> DappController<FakeChain> {
        let mut controller = DappController::new(
            Some(chain.clone()),
            config(Variant::Token, TOKEN_ADDRESS, chain),
        );
        controller.connect().await.unwrap();
        controller
    }

    #[tokio::test]
    async fn connect__loads_snapshot_for_session() {
        // given
        let chain = Arc::new(FakeChain::default());

        // when
        let controller = ballot_controller(&chain).await;

        // then
        let view = controller.view();
        assert_eq!(view.session.unwrap().account, ALICE);
        assert!(view.snapshot.unwrap().ballot().is_some());
        assert_eq!(controller.watch_count(), 1);
    }

    #[tokio::test]
    async fn connect__without_wallet_reports_status() {
        // given
        let chain = FakeChain::default();
        let mut controller =
            DappController::<FakeChain>::new(None, config(Variant::Ballot, BALLOT_ADDRESS, &chain));

        // when
        let result = controller.connect().await;

        // then
        assert_eq!(result, Err(DappError::NoWallet));
        assert_eq!(controller.status().unwrap().kind, StatusKind::Error);
    }

    #[tokio::test]
    async fn connect__wrong_network_is_a_warning() {
        // given
        let chain = Arc::new(FakeChain::default());
        let mut config = config(Variant::Ballot, BALLOT_ADDRESS, &chain);
        config.expected_chain_id = 1;
        let mut controller = DappController::new(Some(chain.clone()), config);

        // when
        controller.connect().await.unwrap();

        // then
        assert_eq!(controller.status().unwrap().kind, StatusKind::Warning);
        assert!(controller.session().unwrap().network_mismatch);
    }

    #[tokio::test]
    async fn submit_vote__without_selection_never_sends() {
        // given
        let chain = Arc::new(FakeChain::default());
        let mut controller = ballot_controller(&chain).await;

        // when
        let result = controller.submit_vote().await;

        // then
        assert_eq!(result, Err(DappError::NoSelection));
        assert_eq!(chain.send_count(), 0);
        assert_eq!(controller.tx_state(), &TxState::Idle);
    }

    #[tokio::test]
    async fn submit_vote__records_pending_then_confirmed() {
        // given
        let chain = Arc::new(FakeChain::default());
        let mut controller = ballot_controller(&chain).await;
        controller.select_option(2);

        // when
        let hash = controller.submit_vote().await.unwrap();
        let pending = controller.history().get(&hash).cloned().unwrap();
        controller.await_transaction().await.unwrap();

        // then
        assert_eq!(pending.status, EntryStatus::Pending);
        let entry = controller.history().get(&hash).unwrap();
        assert_eq!(entry.status, EntryStatus::Confirmed);
        assert!(matches!(entry.category, Category::Vote { option_index: 2, .. }));
        assert!(controller.snapshot().unwrap().ballot().unwrap().has_voted);
        assert_eq!(controller.status().unwrap().kind, StatusKind::Success);
    }

    #[tokio::test]
    async fn submit_transfer__on_ballot_is_unsupported() {
        // given
        let chain = Arc::new(FakeChain::default());
        let mut controller = ballot_controller(&chain).await;

        // when
        let result = controller.submit_transfer(&BOB.to_checksum(None), "1").await;

        // then
        assert!(matches!(result, Err(DappError::Unsupported { .. })));
        assert_eq!(controller.tx_state(), &TxState::Idle);
    }

    #[tokio::test]
    async fn submit_approve__starts_watching_the_spender() {
        // given
        let chain = Arc::new(FakeChain::default());
        let mut controller = token_controller(&chain).await;

        // when
        controller.submit_approve(&BOB.to_checksum(None), "3").await.unwrap();
        controller.await_transaction().await.unwrap();

        // then
        let view = controller.view();
        assert_eq!(view.spender, Some(BOB));
        let (spender, value) = view.snapshot.unwrap().token().unwrap().allowance.unwrap();
        assert_eq!(spender, BOB);
        assert_eq!(value, alloy::primitives::U256::from(3_000_000_000_000_000_000u128));
    }

    #[tokio::test]
    async fn submit_approve__rejected_signature_keeps_watched_spender() {
        // given
        let chain = Arc::new(FakeChain::default());
        let mut controller = token_controller(&chain).await;
        chain.reject_next_signature();

        // when
        let result = controller.submit_approve(&BOB.to_checksum(None), "3").await;

        // then
        assert_eq!(result, Err(DappError::TransactionRejected));
        assert_eq!(controller.view().spender, None);
    }

    #[tokio::test]
    async fn connect__head_read_failure_leaves_no_session() {
        // given
        let chain = Arc::new(FakeChain::default());
        chain.fail_block_number(true);
        let mut controller = DappController::new(
            Some(chain.clone()),
            config(Variant::Token, TOKEN_ADDRESS, &chain),
        );

        // when
        let result = controller.connect().await;

        // then
        assert!(matches!(result, Err(DappError::ReadFailure { .. })));
        let view = controller.view();
        assert!(view.session.is_none());
        assert!(view.snapshot.is_none());
        assert_eq!(controller.watch_count(), 0);
        assert_eq!(controller.status().unwrap().kind, StatusKind::Error);
    }

    #[tokio::test]
    async fn connect__failed_reconnect_drops_previous_session() {
        // given
        let chain = Arc::new(FakeChain::default());
        let mut controller = token_controller(&chain).await;
        chain.fail_block_number(true);

        // when
        let result = controller.connect().await;

        // then
        assert!(result.is_err());
        assert!(controller.session().is_none());
        assert_eq!(
            controller.refresh().await,
            Err(DappError::NotConnected)
        );
    }

    #[tokio::test]
    async fn disconnect__forgets_overdue_transaction() {
        // given
        let chain = Arc::new(FakeChain::default());
        chain.set_auto_mine(false);
        let mut controller = token_controller(&chain).await;
        let hash = controller
            .submit_transfer(&BOB.to_checksum(None), "1")
            .await
            .unwrap();
        let _ = controller.await_transaction().await;

        // when
        controller.disconnect();

        // then
        assert_eq!(chain.forgotten(), vec![hash]);
        assert_eq!(controller.tx_state(), &TxState::Idle);
    }

    #[tokio::test]
    async fn refresh__failure_keeps_previous_snapshot() {
        // given
        let chain = Arc::new(FakeChain::default());
        let mut controller = token_controller(&chain).await;
        let before = controller.snapshot().cloned();
        chain.fail_reads(true);

        // when
        let result = controller.refresh().await;

        // then
        assert!(matches!(result, Err(DappError::ReadFailure { .. })));
        assert_eq!(controller.snapshot().cloned(), before);
        assert_eq!(controller.status().unwrap().kind, StatusKind::Error);
    }

    #[tokio::test]
    async fn tick__resyncs_on_foreign_vote() {
        // given
        let chain = Arc::new(FakeChain::default());
        let mut controller = ballot_controller(&chain).await;

        // when
        chain.external_vote(BOB, 0);
        controller.tick().await.unwrap();

        // then
        let ballot = controller.view().snapshot.unwrap();
        assert_eq!(ballot.ballot().unwrap().tallies[0], alloy::primitives::U256::from(1));
        assert_eq!(controller.history().len(), 1);
    }

    #[tokio::test]
    async fn reject_signature__returns_to_idle() {
        // given
        let chain = Arc::new(FakeChain::default());
        let mut controller = ballot_controller(&chain).await;

        // when
        controller.reject_signature();

        // then
        assert_eq!(controller.tx_state(), &TxState::Idle);
        assert_eq!(
            controller.status().unwrap().text,
            DappError::TransactionRejected.status_message()
        );
    }

    #[tokio::test]
    async fn select_next_option__wraps_around() {
        // given
        let chain = Arc::new(FakeChain::default());
        let mut controller = ballot_controller(&chain).await;
        let count = controller.snapshot().unwrap().ballot().unwrap().options.len();

        // when
        for _ in 0..count {
            controller.select_next_option();
        }
        controller.select_next_option();

        // then
        assert_eq!(controller.selected_option(), Some(0));
    }

    #[tokio::test]
    async fn disconnect__hides_snapshot_and_history() {
        // given
        let chain = Arc::new(FakeChain::default());
        let mut controller = ballot_controller(&chain).await;
        controller.select_option(0);
        controller.submit_vote().await.unwrap();
        controller.await_transaction().await.unwrap();

        // when
        controller.disconnect();

        // then
        let view = controller.view();
        assert!(view.session.is_none());
        assert!(view.snapshot.is_none());
        assert!(view.history.is_empty());
        assert_eq!(controller.watch_count(), 0);
    }
}
