use alloy::primitives::{
    Address,
    TxHash,
    U256,
};
use itertools::Itertools;
use std::cmp::Reverse;

pub const BALLOT_HISTORY_WINDOW: usize = 8;
pub const TOKEN_HISTORY_WINDOW: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Category {
    Vote { option_index: u64, label: String },
    VotingStatus { active: bool },
    TransferOut,
    TransferIn,
    Approval,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EntryStatus {
    Pending,
    Confirmed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    pub tx_hash: TxHash,
    pub category: Category,
    pub counterparty: Option<Address>,
    pub amount: Option<U256>,
    pub status: EntryStatus,
    pub block_number: Option<u64>,
    pub log_index: Option<u64>,
}

impl HistoryEntry {
    pub fn pending(
        tx_hash: TxHash,
        category: Category,
        counterparty: Option<Address>,
        amount: Option<U256>,
    ) -> Self {
        Self {
            tx_hash,
            category,
            counterparty,
            amount,
            status: EntryStatus::Pending,
            block_number: None,
            log_index: None,
        }
    }

    /// Entries not yet placed in a block sort as the most recent.
    pub fn recency(&self) -> (u64, u64) {
        (
            self.block_number.unwrap_or(u64::MAX),
            self.log_index.unwrap_or(u64::MAX),
        )
    }

    pub fn is_pending(&self) -> bool {
        self.status == EntryStatus::Pending
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteEvent {
    pub voter: Address,
    pub option_index: u64,
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub log_index: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenEventKind {
    Transfer { from: Address, to: Address },
    Approval { owner: Address, spender: Address },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenEvent {
    pub kind: TokenEventKind,
    pub value: U256,
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub log_index: u64,
}

pub fn option_label(labels: &[String], index: u64) -> String {
    usize::try_from(index)
        .ok()
        .and_then(|i| labels.get(i))
        .cloned()
        .unwrap_or_else(|| format!("Option {index}"))
}

/// Newest-first vote history: the last `window` votes in chain order, reversed.
pub fn ballot_history(
    events: &[VoteEvent],
    labels: &[String],
    window: usize,
) -> Vec<HistoryEntry> {
    let ordered = events
        .iter()
        .sorted_by_key(|e| (e.block_number, e.log_index))
        .collect::<Vec<_>>();
    let skip = ordered.len().saturating_sub(window);
    ordered
        .into_iter()
        .skip(skip)
        .rev()
        .map(|e| HistoryEntry {
            tx_hash: e.tx_hash,
            category: Category::Vote {
                option_index: e.option_index,
                label: option_label(labels, e.option_index),
            },
            counterparty: Some(e.voter),
            amount: None,
            status: EntryStatus::Confirmed,
            block_number: Some(e.block_number),
            log_index: Some(e.log_index),
        })
        .collect()
}

/// Newest-first token history for `account`, one entry per transaction.
pub fn token_history(
    events: &[TokenEvent],
    account: Address,
    window: usize,
) -> Vec<HistoryEntry> {
    events
        .iter()
        .filter_map(|e| {
            let (category, counterparty) = match e.kind {
                TokenEventKind::Transfer { from, to } if from == account => {
                    (Category::TransferOut, to)
                }
                TokenEventKind::Transfer { from, to } if to == account => {
                    (Category::TransferIn, from)
                }
                TokenEventKind::Approval { owner, spender } if owner == account => {
                    (Category::Approval, spender)
                }
                _ => return None,
            };
            Some(HistoryEntry {
                tx_hash: e.tx_hash,
                category,
                counterparty: Some(counterparty),
                amount: Some(e.value),
                status: EntryStatus::Confirmed,
                block_number: Some(e.block_number),
                log_index: Some(e.log_index),
            })
        })
        .sorted_by_key(|entry| Reverse(entry.recency()))
        .unique_by(|entry| entry.tx_hash)
        .take(window)
        .collect()
}

/// Bounded, newest-first history keyed by transaction hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct History {
    entries: Vec<HistoryEntry>,
    window: usize,
}

impl History {
    pub fn new(window: usize) -> Self {
        Self {
            entries: Vec::new(),
            window,
        }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn get(&self, hash: &TxHash) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| &e.tx_hash == hash)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Inserts at the front, replacing any entry with the same hash.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.entries.retain(|e| e.tx_hash != entry.tx_hash);
        self.entries.insert(0, entry);
        self.entries.truncate(self.window);
    }

    pub fn confirm(&mut self, hash: &TxHash, block_number: u64) -> bool {
        match self.entries.iter_mut().find(|e| &e.tx_hash == hash) {
            Some(entry) => {
                entry.status = EntryStatus::Confirmed;
                entry.block_number = Some(block_number);
                true
            }
            None => false,
        }
    }

    /// A failed transaction keeps its pending entry; only the block is noted.
    pub fn mark_failed(&mut self, hash: &TxHash, block_number: u64) -> bool {
        match self.entries.iter_mut().find(|e| &e.tx_hash == hash) {
            Some(entry) => {
                entry.block_number = Some(block_number);
                true
            }
            None => false,
        }
    }

    /// Merges event-derived entries with local ones. Derived entries win on
    /// hash collisions; local entries survive while pending or newer than
    /// anything the event query covered.
    pub fn reconcile(&mut self, derived: Vec<HistoryEntry>) {
        let newest_indexed = derived.iter().filter_map(|e| e.block_number).max();
        let local = std::mem::take(&mut self.entries)
            .into_iter()
            .filter(|local| !derived.iter().any(|d| d.tx_hash == local.tx_hash))
            .filter(|local| {
                local.is_pending()
                    || match (local.block_number, newest_indexed) {
                        (Some(block), Some(newest)) => block > newest,
                        _ => true,
                    }
            })
            .collect::<Vec<_>>();

        self.entries = local
            .into_iter()
            .chain(derived)
            .sorted_by_key(|entry| Reverse(entry.recency()))
            .unique_by(|entry| entry.tx_hash)
            .take(self.window)
            .collect();
    }
}
