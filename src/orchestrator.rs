use crate::{
    contract::TxHandle,
    error::DappError,
    history::History,
    transport::{
        TxReceipt,
        WalletTransport,
    },
};
use alloy::primitives::TxHash;
use chrono::{
    DateTime,
    Utc,
};
use std::time::Duration;
use tracing::{
    info,
    warn,
};

pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxState {
    Idle,
    Validating,
    Submitted { hash: TxHash, description: String },
    Confirmed { hash: TxHash, block_number: u64 },
    Reverted { hash: TxHash, reason: String },
    TimedOut { hash: TxHash },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingTransaction {
    pub hash: TxHash,
    pub description: String,
    pub submitted_at: DateTime<Utc>,
}

/// Tracks the single write allowed in flight at a time.
#[derive(Clone, Debug)]
pub struct TxOrchestrator {
    state: TxState,
    pending: Option<PendingTransaction>,
    timeout: Duration,
    poll_interval: Duration,
}

impl Default for TxOrchestrator {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIRMATION_TIMEOUT, DEFAULT_POLL_INTERVAL)
    }
}

impl TxOrchestrator {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            state: TxState::Idle,
            pending: None,
            timeout,
            poll_interval,
        }
    }

    pub fn state(&self) -> &TxState {
        &self.state
    }

    pub fn pending(&self) -> Option<&PendingTransaction> {
        self.pending.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, TxState::Validating | TxState::Submitted { .. })
    }

    pub fn begin(&mut self) -> Result<(), DappError> {
        if self.is_busy() {
            return Err(DappError::TransactionInFlight);
        }
        self.state = TxState::Validating;
        Ok(())
    }

    /// Validation failed or the wallet declined; nothing was broadcast.
    pub fn abort(&mut self) {
        if self.state == TxState::Validating {
            self.state = TxState::Idle;
        }
    }

    pub fn submitted(&mut self, handle: TxHandle, history: &mut History) {
        history.record(handle.entry);
        self.pending = Some(PendingTransaction {
            hash: handle.hash,
            description: handle.description.clone(),
            submitted_at: Utc::now(),
        });
        self.state = TxState::Submitted {
            hash: handle.hash,
            description: handle.description,
        };
    }

    /// Applies the outcome of a confirmation wait. Outcomes for a hash that
    /// is no longer tracked are ignored and return `None`.
    pub fn resolve(
        &mut self,
        hash: TxHash,
        outcome: Result<TxReceipt, DappError>,
        history: &mut History,
    ) -> Option<Result<TxReceipt, DappError>> {
        if self.pending.as_ref().is_none_or(|p| p.hash != hash) {
            warn!(%hash, "ignoring outcome for untracked transaction");
            return None;
        }
        let description = self.pending.as_ref()?.description.clone();
        let resolved = match outcome {
            Ok(receipt) if receipt.success => {
                self.pending = None;
                history.confirm(&hash, receipt.block_number);
                info!(%hash, block = receipt.block_number, action = %description, "transaction confirmed");
                self.state = TxState::Confirmed {
                    hash,
                    block_number: receipt.block_number,
                };
                Ok(receipt)
            }
            Ok(receipt) => {
                self.pending = None;
                history.mark_failed(&hash, receipt.block_number);
                let reason = receipt
                    .revert_reason
                    .clone()
                    .unwrap_or_else(|| "execution reverted".to_string());
                warn!(%hash, %reason, action = %description, "transaction reverted");
                self.state = TxState::Reverted {
                    hash,
                    reason: reason.clone(),
                };
                Err(DappError::TransactionReverted {
                    hash: Some(hash),
                    reason,
                })
            }
            // still tracked, a late receipt can resolve it
            Err(err) => {
                warn!(%hash, error = %err, "confirmation not observed");
                self.state = TxState::TimedOut { hash };
                Err(err)
            }
        };
        Some(resolved)
    }

    /// A write whose confirmation wait gave up but which may still be mined.
    pub fn overdue(&self) -> Option<TxHash> {
        match self.state {
            TxState::TimedOut { hash } => Some(hash),
            _ => None,
        }
    }

    /// Returns to `Idle`, handing back the overdue hash that stops being
    /// tracked, if any.
    pub fn reset(&mut self) -> Option<TxHash> {
        let overdue = self.overdue();
        self.state = TxState::Idle;
        self.pending = None;
        overdue
    }
}

/// Polls for a receipt until one is mined or `timeout` elapses. Transient
/// RPC failures are logged and retried.
pub async fn await_finality<T: WalletTransport>(
    transport: &T,
    hash: TxHash,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<TxReceipt, DappError> {
    let wait = async {
        loop {
            match transport.receipt(hash).await {
                Ok(Some(receipt)) => return receipt,
                Ok(None) => {}
                Err(err) => warn!(%hash, error = %err, "receipt lookup failed"),
            }
            tokio::time::sleep(poll_interval).await;
        }
    };
    tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| DappError::ConfirmationTimeout {
            hash,
            waited: timeout,
        })
}
