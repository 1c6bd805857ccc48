use crate::{
    error::DappError,
    transport::{
        WalletChange,
        WalletTransport,
    },
};
use alloy::primitives::Address;
use std::{
    fmt,
    sync::Arc,
};
use tokio::sync::broadcast::{
    self,
    error::TryRecvError,
};
use tracing::{
    info,
    warn,
};

/// Monotonic generation counter; snapshots are tagged with the id they were
/// read for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub account: Address,
    pub chain_id: u64,
    pub connected: bool,
    pub network_mismatch: bool,
}

/// What to do when the wallet is on a different chain than expected.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum NetworkPolicy {
    /// Connect anyway, flag the session and surface a warning.
    #[default]
    Warn,
    Block,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectOutcome {
    pub session: Session,
    pub warning: Option<DappError>,
}

pub struct SessionManager<T> {
    transport: Option<Arc<T>>,
    expected_chain_id: u64,
    policy: NetworkPolicy,
    session: Option<Session>,
    changes: Option<broadcast::Receiver<WalletChange>>,
    next_id: u64,
}

impl<T: WalletTransport> SessionManager<T> {
    pub fn new(
        transport: Option<Arc<T>>,
        expected_chain_id: u64,
        policy: NetworkPolicy,
    ) -> Self {
        Self {
            transport,
            expected_chain_id,
            policy,
            session: None,
            changes: None,
            next_id: 0,
        }
    }

    pub fn transport(&self) -> Option<&Arc<T>> {
        self.transport.as_ref()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn account(&self) -> Option<Address> {
        self.session.as_ref().map(|s| s.account)
    }

    pub fn expected_chain_id(&self) -> u64 {
        self.expected_chain_id
    }

    pub fn is_current(&self, id: SessionId) -> bool {
        self.session.as_ref().is_some_and(|s| s.id == id)
    }

    pub async fn connect(&mut self) -> Result<ConnectOutcome, DappError> {
        let transport = self.transport.clone().ok_or(DappError::NoWallet)?;
        let accounts = transport.request_accounts().await?;
        let account = accounts.first().copied().ok_or(DappError::NoWallet)?;
        let chain_id = transport.chain_id().await?;

        let mismatch = chain_id != self.expected_chain_id;
        let wrong_network = DappError::WrongNetwork {
            expected: self.expected_chain_id,
            actual: chain_id,
        };
        if mismatch && self.policy == NetworkPolicy::Block {
            self.session = None;
            return Err(wrong_network);
        }

        self.next_id += 1;
        let session = Session {
            id: SessionId(self.next_id),
            account,
            chain_id,
            connected: true,
            network_mismatch: mismatch,
        };
        // replacing the receiver drops the previous subscription
        self.changes = Some(transport.subscribe());
        self.session = Some(session.clone());
        info!(session = %session.id, %account, chain_id, mismatch, "wallet connected");

        Ok(ConnectOutcome {
            session,
            warning: mismatch.then_some(wrong_network),
        })
    }

    pub fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            info!(session = %session.id, "wallet disconnected");
        }
        self.changes = None;
    }

    /// Invalidates the active session. Returns whether there was one.
    pub fn on_external_change(&mut self, change: &WalletChange) -> bool {
        match self.session.take() {
            Some(session) => {
                info!(session = %session.id, ?change, "session invalidated by wallet");
                true
            }
            None => false,
        }
    }

    pub fn drain_changes(&mut self) -> Vec<WalletChange> {
        let mut drained = Vec::new();
        let Some(receiver) = self.changes.as_mut() else {
            return drained;
        };
        loop {
            match receiver.try_recv() {
                Ok(change) => drained.push(change),
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(missed, "wallet notifications dropped");
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Closed) => {
                    self.changes = None;
                    break;
                }
            }
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        config::SEPOLIA_CHAIN_ID,
        test_helpers::{
            ALICE,
            BOB,
            FakeChain,
        },
    };

    fn manager(chain: &Arc<FakeChain>, policy: NetworkPolicy) -> SessionManager<FakeChain> {
        SessionManager::new(Some(chain.clone()), SEPOLIA_CHAIN_ID, policy)
    }

    #[tokio::test]
    async fn connect__fails_without_transport() {
        // given
        let mut sessions = SessionManager::<FakeChain>::new(None, SEPOLIA_CHAIN_ID, NetworkPolicy::Warn);

        // when
        let result = sessions.connect().await;

        // then
        assert_eq!(result, Err(DappError::NoWallet));
        assert!(sessions.session().is_none());
    }

    #[tokio::test]
    async fn connect__fails_without_accounts() {
        // given
        let chain = Arc::new(FakeChain::default());
        chain.set_accounts(vec![]);
        let mut sessions = manager(&chain, NetworkPolicy::Warn);

        // when
        let result = sessions.connect().await;

        // then
        assert_eq!(result, Err(DappError::NoWallet));
    }

    #[tokio::test]
    async fn connect__new_generation_each_time() {
        // given
        let chain = Arc::new(FakeChain::default());
        let mut sessions = manager(&chain, NetworkPolicy::Warn);

        // when
        let first = sessions.connect().await.unwrap().session;
        let second = sessions.connect().await.unwrap().session;

        // then
        assert_eq!(first.account, ALICE);
        assert!(second.id > first.id);
        assert!(!sessions.is_current(first.id));
        assert!(sessions.is_current(second.id));
        assert_eq!(chain.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn connect__wrong_network_warns_by_default() {
        // given
        let chain = Arc::new(FakeChain::default());
        chain.switch_chain(1);
        let mut sessions = manager(&chain, NetworkPolicy::Warn);

        // when
        let outcome = sessions.connect().await.unwrap();

        // then
        assert!(outcome.session.network_mismatch);
        assert_eq!(
            outcome.warning,
            Some(DappError::WrongNetwork {
                expected: SEPOLIA_CHAIN_ID,
                actual: 1
            })
        );
    }

    #[tokio::test]
    async fn connect__wrong_network_blocks_when_strict() {
        // given
        let chain = Arc::new(FakeChain::default());
        chain.switch_chain(1);
        let mut sessions = manager(&chain, NetworkPolicy::Block);

        // when
        let result = sessions.connect().await;

        // then
        assert!(matches!(result, Err(DappError::WrongNetwork { .. })));
        assert!(sessions.session().is_none());
    }

    #[tokio::test]
    async fn drain_changes__reports_account_switch() {
        // given
        let chain = Arc::new(FakeChain::default());
        let mut sessions = manager(&chain, NetworkPolicy::Warn);
        sessions.connect().await.unwrap();

        // when
        chain.switch_account(BOB);
        let changes = sessions.drain_changes();

        // then
        assert_eq!(changes, vec![WalletChange::AccountsChanged(vec![BOB])]);
        assert!(sessions.on_external_change(&changes[0]));
        assert!(sessions.session().is_none());
    }

    #[tokio::test]
    async fn disconnect__drops_subscription() {
        // given
        let chain = Arc::new(FakeChain::default());
        let mut sessions = manager(&chain, NetworkPolicy::Warn);
        sessions.connect().await.unwrap();

        // when
        sessions.disconnect();

        // then
        assert!(sessions.session().is_none());
        assert_eq!(chain.subscriber_count(), 0);
        assert!(sessions.drain_changes().is_empty());
    }
}
