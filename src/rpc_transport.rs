use crate::{
    error::TransportError,
    transport::{
        ChangeNotifier,
        LogFilter,
        RawCall,
        RawLog,
        TransportResult,
        TxReceipt,
        WalletChange,
        WalletTransport,
    },
};
use alloy::{
    eips::BlockId,
    network::{
        EthereumWallet,
        ReceiptResponse,
        TransactionBuilder,
    },
    primitives::{
        Address,
        Bytes,
        TxHash,
    },
    providers::{
        DynProvider,
        Provider,
        ProviderBuilder,
    },
    rpc::types::{
        Filter,
        TransactionRequest,
    },
    signers::local::PrivateKeySigner,
    transports::http::reqwest::Url,
};
use std::{
    collections::HashMap,
    sync::{
        Mutex,
        MutexGuard,
        PoisonError,
    },
};
use tokio::sync::broadcast;
use tracing::{
    debug,
    info,
    warn,
};

fn rpc_error(err: impl std::fmt::Display) -> TransportError {
    TransportError::classify(err.to_string())
}

fn parse_url(url: &str) -> Result<Url, TransportError> {
    url.parse()
        .map_err(|e| TransportError::Rpc(format!("invalid RPC URL {url}: {e}")))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// JSON-RPC transport. Signs locally with a keystore key, or leaves signing
/// to the node behind the URL (`eth_sendTransaction`).
pub struct RpcTransport {
    provider: DynProvider,
    local_account: Option<Address>,
    notifier: ChangeNotifier,
    last_chain: Mutex<Option<u64>>,
    last_accounts: Mutex<Option<Vec<Address>>>,
    sent: Mutex<HashMap<TxHash, RawCall>>,
}

impl RpcTransport {
    pub fn with_signer(url: &str, signer: PrivateKeySigner) -> Result<Self, TransportError> {
        let account = signer.address();
        let url = parse_url(url)?;
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();
        info!(%account, "using local keystore signer");
        Ok(Self::new(provider, Some(account)))
    }

    pub fn external(url: &str) -> Result<Self, TransportError> {
        let parsed = parse_url(url)?;
        let provider = ProviderBuilder::new().connect_http(parsed).erased();
        info!(url, "using external wallet endpoint");
        Ok(Self::new(provider, None))
    }

    fn new(provider: DynProvider, local_account: Option<Address>) -> Self {
        Self {
            provider,
            local_account,
            notifier: ChangeNotifier::default(),
            last_chain: Mutex::new(None),
            last_accounts: Mutex::new(None),
            sent: Mutex::new(HashMap::new()),
        }
    }

    fn request(call: &RawCall) -> TransactionRequest {
        let request = TransactionRequest::default()
            .with_to(call.to)
            .with_input(call.input.clone());
        match call.from {
            Some(from) => request.with_from(from),
            None => request,
        }
    }

    /// Replays a failed transaction at its block to recover the revert reason.
    async fn replay_revert_reason(&self, hash: TxHash, block_number: u64) -> Option<String> {
        let call = lock(&self.sent).get(&hash).cloned()?;
        match self
            .provider
            .call(Self::request(&call))
            .block(BlockId::number(block_number))
            .await
        {
            Ok(_) => None,
            Err(err) => match rpc_error(err) {
                TransportError::Reverted(reason) => Some(reason),
                other => {
                    debug!(%hash, error = %other, "revert replay gave no reason");
                    None
                }
            },
        }
    }
}

impl WalletTransport for RpcTransport {
    async fn request_accounts(&self) -> TransportResult<Vec<Address>> {
        match self.local_account {
            Some(account) => Ok(vec![account]),
            None => self.provider.get_accounts().await.map_err(rpc_error),
        }
    }

    async fn chain_id(&self) -> TransportResult<u64> {
        self.provider.get_chain_id().await.map_err(rpc_error)
    }

    async fn block_number(&self) -> TransportResult<u64> {
        self.provider.get_block_number().await.map_err(rpc_error)
    }

    async fn call(&self, call: &RawCall) -> TransportResult<Bytes> {
        self.provider
            .call(Self::request(call))
            .await
            .map_err(rpc_error)
    }

    async fn sign_and_send(&self, call: &RawCall) -> TransportResult<TxHash> {
        let pending = self
            .provider
            .send_transaction(Self::request(call))
            .await
            .map_err(rpc_error)?;
        let hash = *pending.tx_hash();
        lock(&self.sent).insert(hash, call.clone());
        Ok(hash)
    }

    async fn receipt(&self, hash: TxHash) -> TransportResult<Option<TxReceipt>> {
        let Some(receipt) = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(rpc_error)?
        else {
            return Ok(None);
        };
        let Some(block_number) = receipt.block_number() else {
            return Ok(None);
        };
        let success = receipt.status();
        let revert_reason = if success {
            None
        } else {
            self.replay_revert_reason(hash, block_number).await
        };
        lock(&self.sent).remove(&hash);
        Ok(Some(TxReceipt {
            tx_hash: hash,
            block_number,
            success,
            revert_reason,
        }))
    }

    async fn logs(&self, filter: &LogFilter) -> TransportResult<Vec<RawLog>> {
        let mut query = Filter::new()
            .address(filter.address)
            .event_signature(filter.event)
            .from_block(filter.from_block);
        if let Some(topic) = filter.topic1 {
            query = query.topic1(topic);
        }
        if let Some(topic) = filter.topic2 {
            query = query.topic2(topic);
        }
        if let Some(to_block) = filter.to_block {
            query = query.to_block(to_block);
        }
        let logs = self.provider.get_logs(&query).await.map_err(rpc_error)?;
        Ok(logs
            .into_iter()
            .filter_map(|log| {
                Some(RawLog {
                    address: log.address(),
                    topics: log.topics().to_vec(),
                    data: log.data().data.clone(),
                    tx_hash: log.transaction_hash?,
                    block_number: log.block_number?,
                    log_index: log.log_index?,
                })
            })
            .collect())
    }

    fn forget(&self, hash: TxHash) {
        if lock(&self.sent).remove(&hash).is_some() {
            debug!(%hash, "stopped tracking sent transaction");
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletChange> {
        self.notifier.subscribe()
    }

    async fn poll_changes(&self) -> TransportResult<()> {
        let chain_id = self.chain_id().await?;
        let previous_chain = lock(&self.last_chain).replace(chain_id);
        if previous_chain.is_some_and(|previous| previous != chain_id) {
            warn!(chain_id, "wallet network changed");
            self.notifier.notify(WalletChange::ChainChanged(chain_id));
        }

        if self.local_account.is_none() {
            let accounts = self.request_accounts().await?;
            let previous = lock(&self.last_accounts).replace(accounts.clone());
            if previous.is_some_and(|previous| previous != accounts) {
                warn!(?accounts, "wallet accounts changed");
                self.notifier.notify(WalletChange::AccountsChanged(accounts));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn external__rejects_malformed_url() {
        // when
        let result = RpcTransport::external("not a url");

        // then
        assert!(matches!(result, Err(TransportError::Rpc(_))));
    }

    #[tokio::test]
    async fn request_accounts__local_signer_needs_no_rpc() {
        // given
        let signer = PrivateKeySigner::random();
        let expected = signer.address();
        let transport = RpcTransport::with_signer("http://localhost:1", signer).unwrap();

        // when
        let accounts = transport.request_accounts().await.unwrap();

        // then
        assert_eq!(accounts, vec![expected]);
    }

    #[test]
    fn request__carries_sender_when_known() {
        // given
        let call = RawCall::new(Address::repeat_byte(1), vec![1u8, 2, 3]).from(Address::repeat_byte(2));

        // when
        let request = RpcTransport::request(&call);

        // then
        assert_eq!(request.from, Some(Address::repeat_byte(2)));
        assert_eq!(request.input.input().cloned(), Some(Bytes::from(vec![1u8, 2, 3])));
    }
}
