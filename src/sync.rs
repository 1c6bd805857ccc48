use crate::{
    contract::{
        BallotContract,
        DappContract,
        TokenContract,
    },
    error::DappError,
    history::{
        BALLOT_HISTORY_WINDOW,
        HistoryEntry,
        TOKEN_HISTORY_WINDOW,
        ballot_history,
        token_history,
    },
    session::{
        Session,
        SessionId,
    },
    transport::{
        LogFilter,
        WalletTransport,
    },
};
use alloy::primitives::{
    Address,
    B256,
    U256,
};
use std::collections::HashMap;
use tracing::debug;

pub const DEFAULT_BALLOT_TITLE: &str = "On-chain Vote";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BallotSnapshot {
    pub title: String,
    pub options: Vec<String>,
    pub tallies: Vec<U256>,
    pub has_voted: bool,
    pub voting_active: bool,
    pub owner: Address,
}

impl BallotSnapshot {
    pub fn total_votes(&self) -> U256 {
        self.tallies.iter().copied().fold(U256::ZERO, |acc, t| acc.saturating_add(t))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenSnapshot {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: U256,
    pub balance: U256,
    /// Allowance granted by the account to the watched spender.
    pub allowance: Option<(Address, U256)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SnapshotState {
    Ballot(BallotSnapshot),
    Token(TokenSnapshot),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractSnapshot {
    pub session: SessionId,
    pub state: SnapshotState,
}

impl ContractSnapshot {
    pub fn ballot(&self) -> Option<&BallotSnapshot> {
        match &self.state {
            SnapshotState::Ballot(ballot) => Some(ballot),
            SnapshotState::Token(_) => None,
        }
    }

    pub fn token(&self) -> Option<&TokenSnapshot> {
        match &self.state {
            SnapshotState::Token(token) => Some(token),
            SnapshotState::Ballot(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncOutcome {
    pub snapshot: ContractSnapshot,
    pub history: Vec<HistoryEntry>,
}

/// Rebuilds the whole local view from contract reads and event queries.
/// Either every read succeeds or nothing is returned.
#[derive(Clone, Debug, Default)]
pub struct Synchronizer {
    from_block: u64,
}

impl Synchronizer {
    pub fn new(from_block: u64) -> Self {
        Self { from_block }
    }

    pub async fn sync<T: WalletTransport>(
        &self,
        contract: &DappContract<T>,
        session: &Session,
        spender: Option<Address>,
    ) -> Result<SyncOutcome, DappError> {
        let outcome = match contract {
            DappContract::Ballot(ballot) => self.sync_ballot(ballot, session).await?,
            DappContract::Token(token) => self.sync_token(token, session, spender).await?,
        };
        debug!(
            session = %session.id,
            history = outcome.history.len(),
            "synchronized contract state"
        );
        Ok(outcome)
    }

    async fn sync_ballot<T: WalletTransport>(
        &self,
        ballot: &BallotContract<T>,
        session: &Session,
    ) -> Result<SyncOutcome, DappError> {
        let (title, options, mut tallies, has_voted, voting_active, owner, votes) = futures::try_join!(
            ballot.title(),
            ballot.options(),
            ballot.results(),
            ballot.has_voted(session.account),
            ballot.voting_active(),
            ballot.owner(),
            ballot.voted_events(self.from_block),
        )?;
        tallies.resize(options.len(), U256::ZERO);
        let title = if title.trim().is_empty() {
            DEFAULT_BALLOT_TITLE.to_string()
        } else {
            title
        };
        let history = ballot_history(&votes, &options, BALLOT_HISTORY_WINDOW);
        Ok(SyncOutcome {
            snapshot: ContractSnapshot {
                session: session.id,
                state: SnapshotState::Ballot(BallotSnapshot {
                    title,
                    options,
                    tallies,
                    has_voted,
                    voting_active,
                    owner,
                }),
            },
            history,
        })
    }

    async fn sync_token<T: WalletTransport>(
        &self,
        token: &TokenContract<T>,
        session: &Session,
        spender: Option<Address>,
    ) -> Result<SyncOutcome, DappError> {
        let account = session.account;
        let allowance = async {
            match spender {
                Some(spender) => token
                    .allowance(account, spender)
                    .await
                    .map(|value| Some((spender, value))),
                None => Ok(None),
            }
        };
        let (name, symbol, decimals, total_supply, balance, allowance, transfers, approvals) = futures::try_join!(
            token.name(),
            token.symbol(),
            token.decimals(),
            token.total_supply(),
            token.balance_of(account),
            allowance,
            token.transfer_events(account, self.from_block),
            token.approval_events(account, self.from_block),
        )?;
        let events = transfers.into_iter().chain(approvals).collect::<Vec<_>>();
        let history = token_history(&events, account, TOKEN_HISTORY_WINDOW);
        Ok(SyncOutcome {
            snapshot: ContractSnapshot {
                session: session.id,
                state: SnapshotState::Token(TokenSnapshot {
                    name,
                    symbol,
                    decimals,
                    total_supply,
                    balance,
                    allowance,
                }),
            },
            history,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct EventWatch {
    filter: LogFilter,
    next_block: u64,
}

/// Contract event subscriptions, at most one per (contract, event signature).
#[derive(Clone, Debug, Default)]
pub struct EventWatches {
    watches: HashMap<(Address, B256), EventWatch>,
}

impl EventWatches {
    /// Registers a watch starting at `start_block`, replacing any watch for
    /// the same contract and event.
    pub fn register(&mut self, key: (Address, B256), filter: LogFilter, start_block: u64) {
        let replaced = self
            .watches
            .insert(
                key,
                EventWatch {
                    filter,
                    next_block: start_block,
                },
            )
            .is_some();
        debug!(contract = %key.0, event = %key.1, start_block, replaced, "event watch registered");
    }

    pub fn clear(&mut self) {
        self.watches.clear();
    }

    pub fn len(&self) -> usize {
        self.watches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }

    /// Returns the number of matching logs seen since the previous poll.
    pub async fn poll<T: WalletTransport>(&mut self, transport: &T) -> Result<usize, DappError> {
        if self.watches.is_empty() {
            return Ok(0);
        }
        let head = transport
            .block_number()
            .await
            .map_err(DappError::read("block number"))?;
        let mut seen = 0;
        for watch in self.watches.values_mut() {
            if watch.next_block > head {
                continue;
            }
            let filter = watch.filter.clone().from_block(watch.next_block).to_block(head);
            let logs = transport
                .logs(&filter)
                .await
                .map_err(DappError::read("watched events"))?;
            seen += logs.len();
            watch.next_block = head + 1;
        }
        Ok(seen)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        session::{
            NetworkPolicy,
            SessionManager,
        },
        test_helpers::{
            ALICE,
            BALLOT_ADDRESS,
            BOB,
            CAROL,
            FakeChain,
            TOKEN_ADDRESS,
        },
    };
    use std::sync::Arc;

    async fn connected(chain: &Arc<FakeChain>) -> Session {
        let mut sessions = SessionManager::new(
            Some(chain.clone()),
            chain.current_chain_id(),
            NetworkPolicy::Warn,
        );
        sessions.connect().await.unwrap().session
    }

    #[tokio::test]
    async fn sync__ballot_snapshot_reflects_votes() {
        // given
        let chain = Arc::new(FakeChain::default());
        chain.external_vote(BOB, 1);
        chain.external_vote(CAROL, 1);
        let session = connected(&chain).await;
        let contract = DappContract::Ballot(BallotContract::new(chain.clone(), BALLOT_ADDRESS));

        // when
        let outcome = Synchronizer::default().sync(&contract, &session, None).await.unwrap();

        // then
        let ballot = outcome.snapshot.ballot().unwrap();
        assert_eq!(ballot.tallies[1], U256::from(2));
        assert_eq!(ballot.total_votes(), U256::from(2));
        assert!(!ballot.has_voted);
        assert_eq!(outcome.history.len(), 2);
        assert_eq!(outcome.snapshot.session, session.id);
    }

    #[tokio::test]
    async fn sync__empty_title_falls_back_to_default() {
        // given
        let chain = Arc::new(FakeChain::default());
        chain.set_ballot_title("");
        let session = connected(&chain).await;
        let contract = DappContract::Ballot(BallotContract::new(chain.clone(), BALLOT_ADDRESS));

        // when
        let outcome = Synchronizer::default().sync(&contract, &session, None).await.unwrap();

        // then
        assert_eq!(outcome.snapshot.ballot().unwrap().title, DEFAULT_BALLOT_TITLE);
    }

    #[tokio::test]
    async fn sync__token_snapshot_includes_spender_allowance() {
        // given
        let chain = Arc::new(FakeChain::default());
        let session = connected(&chain).await;
        let token = TokenContract::new(chain.clone(), TOKEN_ADDRESS);
        let approve = token
            .prepare_approve(&BOB.to_checksum(None), "2", 18, "TKN")
            .unwrap();
        token.submit(ALICE, approve).await.unwrap();
        let contract = DappContract::Token(token);

        // when
        let outcome = Synchronizer::default()
            .sync(&contract, &session, Some(BOB))
            .await
            .unwrap();

        // then
        let snapshot = outcome.snapshot.token().unwrap();
        assert_eq!(
            snapshot.allowance,
            Some((BOB, U256::from(2_000_000_000_000_000_000u128)))
        );
        assert_eq!(outcome.history.len(), 1);
    }

    #[tokio::test]
    async fn sync__is_all_or_nothing() {
        // given
        let chain = Arc::new(FakeChain::default());
        let session = connected(&chain).await;
        let contract = DappContract::Token(TokenContract::new(chain.clone(), TOKEN_ADDRESS));
        chain.fail_reads(true);

        // when
        let result = Synchronizer::default().sync(&contract, &session, None).await;

        // then
        assert!(matches!(result, Err(DappError::ReadFailure { .. })));
    }

    #[tokio::test]
    async fn sync__twice_without_chain_change_is_identical() {
        // given
        let chain = Arc::new(FakeChain::default());
        chain.external_vote(BOB, 0);
        let session = connected(&chain).await;
        let contract = DappContract::Ballot(BallotContract::new(chain.clone(), BALLOT_ADDRESS));
        let synchronizer = Synchronizer::default();

        // when
        let first = synchronizer.sync(&contract, &session, None).await.unwrap();
        let second = synchronizer.sync(&contract, &session, None).await.unwrap();

        // then
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn register__replaces_existing_watch() {
        // given
        let chain = Arc::new(FakeChain::default());
        let ballot = BallotContract::new(chain.clone(), BALLOT_ADDRESS);
        let contract = DappContract::Ballot(ballot);
        let mut watches = EventWatches::default();

        // when
        watches.register(contract.watch_key(), contract.watch_filter(ALICE), 1);
        watches.register(contract.watch_key(), contract.watch_filter(ALICE), 1);

        // then
        assert_eq!(watches.len(), 1);
    }

    #[tokio::test]
    async fn poll__reports_new_logs_once() {
        // given
        let chain = Arc::new(FakeChain::default());
        let contract = DappContract::Ballot(BallotContract::new(chain.clone(), BALLOT_ADDRESS));
        let mut watches = EventWatches::default();
        let head = chain.block_number().await.unwrap();
        watches.register(contract.watch_key(), contract.watch_filter(ALICE), head + 1);
        chain.external_vote(BOB, 0);

        // when
        let first = watches.poll(&*chain).await.unwrap();
        let second = watches.poll(&*chain).await.unwrap();

        // then
        assert_eq!(first, 1);
        assert_eq!(second, 0);
    }
}
