use alloy::primitives::TxHash;
use std::time::Duration;
use thiserror::Error;

/// Messages longer than this are cut down before they reach the status line.
const MAX_STATUS_LEN: usize = 160;

const GENERIC_REVERT_REASON: &str = "execution reverted";

/// Failure reported by a wallet transport, already classified from the
/// provider's error text.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("user rejected the request")]
    Rejected,
    #[error("execution reverted: {0}")]
    Reverted(String),
    #[error("{0}")]
    Rpc(String),
}

impl TransportError {
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();
        if lowered.contains("user rejected")
            || lowered.contains("user denied")
            || lowered.contains("rejected by user")
            || lowered.contains("code: 4001")
        {
            return TransportError::Rejected;
        }
        if let Some(reason) = revert_reason(&message) {
            return TransportError::Reverted(reason);
        }
        TransportError::Rpc(message)
    }
}

/// Extracts the contract-provided reason from an `execution reverted` message.
pub fn revert_reason(message: &str) -> Option<String> {
    let lowered = message.to_lowercase();
    let start = lowered.find(GENERIC_REVERT_REASON)?;
    let rest = &message[start + GENERIC_REVERT_REASON.len()..];
    let rest = rest.trim_start_matches([':', ' ']);
    let reason = rest
        .split(", data:")
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches('"');
    if reason.is_empty() {
        Some(GENERIC_REVERT_REASON.to_string())
    } else {
        Some(reason.to_string())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DappError {
    #[error("no wallet available; configure --keystore or --wallet-rpc")]
    NoWallet,
    #[error("wrong network: expected chain {expected}, wallet is on chain {actual}")]
    WrongNetwork { expected: u64, actual: u64 },
    #[error("invalid address {input:?}")]
    InvalidAddress { input: String },
    #[error("invalid amount {input:?}: {reason}")]
    InvalidAmount { input: String, reason: &'static str },
    #[error("select an option to vote")]
    NoSelection,
    #[error("connect a wallet first")]
    NotConnected,
    #[error("{action} is not available for this contract")]
    Unsupported { action: &'static str },
    #[error("another transaction is still in flight")]
    TransactionInFlight,
    #[error("transaction rejected in wallet")]
    TransactionRejected,
    #[error("transaction reverted: {reason}")]
    TransactionReverted {
        hash: Option<TxHash>,
        reason: String,
    },
    #[error("failed to read {what}: {source}")]
    ReadFailure {
        what: &'static str,
        #[source]
        source: TransportError,
    },
    #[error("transaction {hash} not confirmed after {waited:?}")]
    ConfirmationTimeout { hash: TxHash, waited: Duration },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl DappError {
    pub fn read(what: &'static str) -> impl FnOnce(TransportError) -> DappError {
        move |source| DappError::ReadFailure { what, source }
    }

    /// Maps a failure returned while broadcasting a write.
    pub fn from_submission(err: TransportError) -> Self {
        match err {
            TransportError::Rejected => DappError::TransactionRejected,
            TransportError::Reverted(reason) => {
                DappError::TransactionReverted { hash: None, reason }
            }
            other => DappError::Transport(other),
        }
    }

    /// Local validation failures never reach the network.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DappError::InvalidAddress { .. }
                | DappError::InvalidAmount { .. }
                | DappError::NoSelection
        )
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, DappError::WrongNetwork { .. })
    }

    /// Short human-readable text for the status line, preferring the
    /// contract's own reason over the generic message.
    pub fn status_message(&self) -> String {
        let message = match self {
            DappError::TransactionReverted { reason, .. } => reason.clone(),
            DappError::Transport(TransportError::Reverted(reason)) => reason.clone(),
            DappError::ReadFailure {
                source: TransportError::Reverted(reason),
                ..
            } => reason.clone(),
            DappError::NoWallet => "No wallet found. Configure a keystore or wallet RPC.".to_string(),
            DappError::WrongNetwork { expected, .. } => {
                format!("Please switch to chain {expected}.")
            }
            other => other.to_string(),
        };
        shorten(message)
    }
}

fn shorten(message: String) -> String {
    let first_line = message.lines().next().unwrap_or_default();
    if first_line.chars().count() <= MAX_STATUS_LEN {
        return first_line.to_string();
    }
    let mut short: String = first_line.chars().take(MAX_STATUS_LEN).collect();
    short.push_str("...");
    short
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn classify__detects_user_rejection() {
        // given
        let message = "server returned an error response: error code 4001: User denied transaction signature";

        // when
        let err = TransportError::classify(message);

        // then
        assert_eq!(err, TransportError::Rejected);
    }

    #[test]
    fn classify__extracts_revert_reason_without_payload() {
        // given
        let message = "server returned an error response: error code 3: execution reverted: Already voted, data: \"0x08c379a0\"";

        // when
        let err = TransportError::classify(message);

        // then
        assert_eq!(err, TransportError::Reverted("Already voted".to_string()));
    }

    #[test]
    fn classify__bare_revert_gets_generic_reason() {
        let err = TransportError::classify("execution reverted");
        assert_eq!(err, TransportError::Reverted("execution reverted".to_string()));
    }

    #[test]
    fn classify__other_messages_stay_rpc_errors() {
        let err = TransportError::classify("connection refused");
        assert_eq!(err, TransportError::Rpc("connection refused".to_string()));
    }

    #[test]
    fn status_message__prefers_contract_reason() {
        // given
        let err = DappError::TransactionReverted {
            hash: None,
            reason: "Voting is closed".to_string(),
        };

        // when
        let message = err.status_message();

        // then
        assert_eq!(message, "Voting is closed");
    }

    #[test]
    fn status_message__truncates_long_provider_errors() {
        // given
        let err = DappError::Transport(TransportError::Rpc("x".repeat(500)));

        // when
        let message = err.status_message();

        // then
        assert_eq!(message.chars().count(), MAX_STATUS_LEN + 3);
        assert!(message.ends_with("..."));
    }

    #[test]
    fn from_submission__maps_rejection_and_revert() {
        assert_eq!(
            DappError::from_submission(TransportError::Rejected),
            DappError::TransactionRejected
        );
        assert_eq!(
            DappError::from_submission(TransportError::Reverted("nope".into())),
            DappError::TransactionReverted {
                hash: None,
                reason: "nope".into()
            }
        );
    }
}
