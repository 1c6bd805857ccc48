use crate::error::TransportError;
use alloy::primitives::{
    Address,
    B256,
    Bytes,
    TxHash,
};
use tokio::sync::broadcast;

pub type TransportResult<T> = Result<T, TransportError>;

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// A contract call, either evaluated read-only or broadcast as a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawCall {
    pub from: Option<Address>,
    pub to: Address,
    pub input: Bytes,
}

impl RawCall {
    pub fn new(to: Address, input: impl Into<Bytes>) -> Self {
        Self {
            from: None,
            to,
            input: input.into(),
        }
    }

    pub fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub log_index: u64,
}

/// Log query for a single event signature on a single contract, optionally
/// narrowed by the first two indexed topics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogFilter {
    pub address: Address,
    pub event: B256,
    pub topic1: Option<B256>,
    pub topic2: Option<B256>,
    pub from_block: u64,
    pub to_block: Option<u64>,
}

impl LogFilter {
    pub fn new(address: Address, event: B256) -> Self {
        Self {
            address,
            event,
            topic1: None,
            topic2: None,
            from_block: 0,
            to_block: None,
        }
    }

    pub fn topic1(mut self, topic: B256) -> Self {
        self.topic1 = Some(topic);
        self
    }

    pub fn topic2(mut self, topic: B256) -> Self {
        self.topic2 = Some(topic);
        self
    }

    pub fn from_block(mut self, block: u64) -> Self {
        self.from_block = block;
        self
    }

    pub fn to_block(mut self, block: u64) -> Self {
        self.to_block = Some(block);
        self
    }

    pub fn matches(&self, log: &RawLog) -> bool {
        let topic_matches = |index: usize, expected: &Option<B256>| match expected {
            Some(topic) => log.topics.get(index) == Some(topic),
            None => true,
        };
        log.address == self.address
            && log.topics.first() == Some(&self.event)
            && topic_matches(1, &self.topic1)
            && topic_matches(2, &self.topic2)
            && log.block_number >= self.from_block
            && self.to_block.is_none_or(|to| log.block_number <= to)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub success: bool,
    pub revert_reason: Option<String>,
}

/// Notification pushed by the wallet when the user switches account or network.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletChange {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
}

/// Fan-out of wallet change notifications to whoever subscribed.
#[derive(Clone, Debug)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<WalletChange>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { sender }
    }
}

impl ChangeNotifier {
    pub fn subscribe(&self) -> broadcast::Receiver<WalletChange> {
        self.sender.subscribe()
    }

    pub fn notify(&self, change: WalletChange) {
        // no subscribers is fine, nobody is connected yet
        let _ = self.sender.send(change);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

pub trait WalletTransport {
    fn request_accounts(&self) -> impl Future<Output = TransportResult<Vec<Address>>>;

    fn chain_id(&self) -> impl Future<Output = TransportResult<u64>>;

    fn block_number(&self) -> impl Future<Output = TransportResult<u64>>;

    fn call(&self, call: &RawCall) -> impl Future<Output = TransportResult<Bytes>>;

    fn sign_and_send(&self, call: &RawCall) -> impl Future<Output = TransportResult<TxHash>>;

    fn receipt(
        &self,
        hash: TxHash,
    ) -> impl Future<Output = TransportResult<Option<TxReceipt>>>;

    fn logs(&self, filter: &LogFilter) -> impl Future<Output = TransportResult<Vec<RawLog>>>;

    fn subscribe(&self) -> broadcast::Receiver<WalletChange>;

    /// Drops bookkeeping for a sent transaction nobody waits on any more.
    fn forget(&self, _hash: TxHash) {}

    /// Lets transports without push notifications detect changes by polling.
    fn poll_changes(&self) -> impl Future<Output = TransportResult<()>> {
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn log_at(address: Address, topics: Vec<B256>, block_number: u64) -> RawLog {
        RawLog {
            address,
            topics,
            data: Bytes::new(),
            tx_hash: TxHash::ZERO,
            block_number,
            log_index: 0,
        }
    }

    #[test]
    fn matches__requires_address_and_signature() {
        // given
        let contract = Address::repeat_byte(1);
        let event = B256::repeat_byte(2);
        let filter = LogFilter::new(contract, event);

        // then
        assert!(filter.matches(&log_at(contract, vec![event], 1)));
        assert!(!filter.matches(&log_at(Address::repeat_byte(9), vec![event], 1)));
        assert!(!filter.matches(&log_at(contract, vec![B256::ZERO], 1)));
    }

    #[test]
    fn matches__honours_topics_and_block_range() {
        // given
        let contract = Address::repeat_byte(1);
        let event = B256::repeat_byte(2);
        let account = B256::repeat_byte(3);
        let filter = LogFilter::new(contract, event)
            .topic2(account)
            .from_block(5)
            .to_block(10);

        // then
        assert!(filter.matches(&log_at(contract, vec![event, B256::ZERO, account], 7)));
        assert!(!filter.matches(&log_at(contract, vec![event, account], 7)));
        assert!(!filter.matches(&log_at(contract, vec![event, B256::ZERO, account], 4)));
        assert!(!filter.matches(&log_at(contract, vec![event, B256::ZERO, account], 11)));
    }

    #[tokio::test]
    async fn notify__reaches_every_subscriber() {
        // given
        let notifier = ChangeNotifier::default();
        let mut first = notifier.subscribe();
        let mut second = notifier.subscribe();

        // when
        notifier.notify(WalletChange::ChainChanged(5));

        // then
        assert_eq!(first.recv().await.unwrap(), WalletChange::ChainChanged(5));
        assert_eq!(second.recv().await.unwrap(), WalletChange::ChainChanged(5));
    }
}
