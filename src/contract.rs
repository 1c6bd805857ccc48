use crate::{
    ballot_types::IBallot,
    error::{
        DappError,
        TransportError,
    },
    history::{
        Category,
        HistoryEntry,
        TokenEvent,
        TokenEventKind,
        VoteEvent,
        option_label,
    },
    token_types::IERC20,
    transport::{
        LogFilter,
        RawCall,
        RawLog,
        WalletTransport,
    },
    validation::{
        format_amount,
        option_index,
        parse_address,
        parse_amount,
        short_address,
    },
};
use alloy::{
    primitives::{
        Address,
        B256,
        LogData,
        TxHash,
        U256,
    },
    sol_types::{
        SolCall,
        SolEvent,
    },
};
use std::sync::Arc;
use tracing::{
    debug,
    info,
};

/// A validated write, ready to be signed. Building one never touches the
/// network.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedWrite {
    pub call: RawCall,
    pub description: String,
    pub category: Category,
    pub counterparty: Option<Address>,
    pub amount: Option<U256>,
}

/// Returned as soon as the wallet has broadcast a write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxHandle {
    pub hash: TxHash,
    pub description: String,
    pub entry: HistoryEntry,
}

async fn read<T, C>(
    transport: &T,
    contract: Address,
    from: Option<Address>,
    call: C,
    what: &'static str,
) -> Result<C::Return, DappError>
where
    T: WalletTransport,
    C: SolCall,
{
    let mut raw = RawCall::new(contract, call.abi_encode());
    raw.from = from;
    let output = transport.call(&raw).await.map_err(DappError::read(what))?;
    C::abi_decode_returns(&output).map_err(|e| DappError::ReadFailure {
        what,
        source: TransportError::Rpc(format!("undecodable return data: {e}")),
    })
}

async fn fetch_events<T, E>(
    transport: &T,
    filter: &LogFilter,
    what: &'static str,
) -> Result<Vec<(E, RawLog)>, DappError>
where
    T: WalletTransport,
    E: SolEvent,
{
    let logs = transport.logs(filter).await.map_err(DappError::read(what))?;
    debug!(what, count = logs.len(), from_block = filter.from_block, "fetched logs");
    logs.into_iter()
        .map(|log| {
            let data = LogData::new_unchecked(log.topics.clone(), log.data.clone());
            let event = E::decode_log_data(&data).map_err(|e| DappError::ReadFailure {
                what,
                source: TransportError::Rpc(format!("undecodable log: {e}")),
            })?;
            Ok::<_, DappError>((event, log))
        })
        .collect()
}

async fn submit<T: WalletTransport>(
    transport: &T,
    account: Address,
    prepared: PreparedWrite,
) -> Result<TxHandle, DappError> {
    let call = prepared.call.from(account);
    let hash = transport
        .sign_and_send(&call)
        .await
        .map_err(DappError::from_submission)?;
    info!(%hash, action = %prepared.description, "transaction broadcast");
    Ok(TxHandle {
        hash,
        description: prepared.description,
        entry: HistoryEntry::pending(
            hash,
            prepared.category,
            prepared.counterparty,
            prepared.amount,
        ),
    })
}

pub struct BallotContract<T> {
    transport: Arc<T>,
    address: Address,
}

impl<T: WalletTransport> BallotContract<T> {
    pub fn new(transport: Arc<T>, address: Address) -> Self {
        Self { transport, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn title(&self) -> Result<String, DappError> {
        read(&*self.transport, self.address, None, IBallot::titleCall {}, "title").await
    }

    pub async fn options(&self) -> Result<Vec<String>, DappError> {
        read(
            &*self.transport,
            self.address,
            None,
            IBallot::getOptionsCall {},
            "options",
        )
        .await
    }

    pub async fn results(&self) -> Result<Vec<U256>, DappError> {
        read(
            &*self.transport,
            self.address,
            None,
            IBallot::getResultsCall {},
            "results",
        )
        .await
    }

    /// `hasVoted` answers for `msg.sender`, so the call is made from `account`.
    pub async fn has_voted(&self, account: Address) -> Result<bool, DappError> {
        read(
            &*self.transport,
            self.address,
            Some(account),
            IBallot::hasVotedCall {},
            "vote status",
        )
        .await
    }

    pub async fn voting_active(&self) -> Result<bool, DappError> {
        read(
            &*self.transport,
            self.address,
            None,
            IBallot::votingActiveCall {},
            "voting status",
        )
        .await
    }

    pub async fn owner(&self) -> Result<Address, DappError> {
        read(&*self.transport, self.address, None, IBallot::ownerCall {}, "owner").await
    }

    pub fn voted_filter(&self) -> LogFilter {
        LogFilter::new(self.address, IBallot::Voted::SIGNATURE_HASH)
    }

    pub async fn voted_events(&self, from_block: u64) -> Result<Vec<VoteEvent>, DappError> {
        let filter = self.voted_filter().from_block(from_block);
        let events =
            fetch_events::<_, IBallot::Voted>(&*self.transport, &filter, "vote events").await?;
        Ok(events
            .into_iter()
            .map(|(event, log)| VoteEvent {
                voter: event.voter,
                option_index: event.optionIndex.saturating_to(),
                tx_hash: log.tx_hash,
                block_number: log.block_number,
                log_index: log.log_index,
            })
            .collect())
    }

    pub fn prepare_vote(
        &self,
        selection: Option<usize>,
        options: &[String],
    ) -> Result<PreparedWrite, DappError> {
        let index = option_index(selection, options.len())? as u64;
        let label = option_label(options, index);
        let call = IBallot::voteCall {
            optionIndex: U256::from(index),
        };
        Ok(PreparedWrite {
            call: RawCall::new(self.address, call.abi_encode()),
            description: format!("Vote for {label}"),
            category: Category::Vote {
                option_index: index,
                label,
            },
            counterparty: None,
            amount: None,
        })
    }

    pub fn prepare_set_voting_active(&self, active: bool) -> PreparedWrite {
        let call = IBallot::setVotingActiveCall { active };
        let description = if active { "Open voting" } else { "Close voting" };
        PreparedWrite {
            call: RawCall::new(self.address, call.abi_encode()),
            description: description.to_string(),
            category: Category::VotingStatus { active },
            counterparty: None,
            amount: None,
        }
    }

    pub async fn submit(
        &self,
        account: Address,
        prepared: PreparedWrite,
    ) -> Result<TxHandle, DappError> {
        submit(&*self.transport, account, prepared).await
    }
}

pub struct TokenContract<T> {
    transport: Arc<T>,
    address: Address,
}

impl<T: WalletTransport> TokenContract<T> {
    pub fn new(transport: Arc<T>, address: Address) -> Self {
        Self { transport, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn name(&self) -> Result<String, DappError> {
        read(&*self.transport, self.address, None, IERC20::nameCall {}, "name").await
    }

    pub async fn symbol(&self) -> Result<String, DappError> {
        read(&*self.transport, self.address, None, IERC20::symbolCall {}, "symbol").await
    }

    pub async fn decimals(&self) -> Result<u8, DappError> {
        read(
            &*self.transport,
            self.address,
            None,
            IERC20::decimalsCall {},
            "decimals",
        )
        .await
    }

    pub async fn total_supply(&self) -> Result<U256, DappError> {
        read(
            &*self.transport,
            self.address,
            None,
            IERC20::totalSupplyCall {},
            "total supply",
        )
        .await
    }

    pub async fn balance_of(&self, account: Address) -> Result<U256, DappError> {
        read(
            &*self.transport,
            self.address,
            None,
            IERC20::balanceOfCall { account },
            "balance",
        )
        .await
    }

    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, DappError> {
        read(
            &*self.transport,
            self.address,
            None,
            IERC20::allowanceCall { owner, spender },
            "allowance",
        )
        .await
    }

    /// Transfers into `account`, used to watch for incoming funds.
    pub fn incoming_filter(&self, account: Address) -> LogFilter {
        LogFilter::new(self.address, IERC20::Transfer::SIGNATURE_HASH)
            .topic2(account.into_word())
    }

    /// Transfers sent by or received by `account`.
    pub async fn transfer_events(
        &self,
        account: Address,
        from_block: u64,
    ) -> Result<Vec<TokenEvent>, DappError> {
        let sent = LogFilter::new(self.address, IERC20::Transfer::SIGNATURE_HASH)
            .topic1(account.into_word())
            .from_block(from_block);
        let received = self.incoming_filter(account).from_block(from_block);
        let (sent, received) = futures::try_join!(
            fetch_events::<_, IERC20::Transfer>(&*self.transport, &sent, "outgoing transfers"),
            fetch_events::<_, IERC20::Transfer>(&*self.transport, &received, "incoming transfers"),
        )?;
        Ok(sent
            .into_iter()
            .chain(received)
            .map(|(event, log)| TokenEvent {
                kind: TokenEventKind::Transfer {
                    from: event.from,
                    to: event.to,
                },
                value: event.value,
                tx_hash: log.tx_hash,
                block_number: log.block_number,
                log_index: log.log_index,
            })
            .collect())
    }

    pub async fn approval_events(
        &self,
        account: Address,
        from_block: u64,
    ) -> Result<Vec<TokenEvent>, DappError> {
        let filter = LogFilter::new(self.address, IERC20::Approval::SIGNATURE_HASH)
            .topic1(account.into_word())
            .from_block(from_block);
        let events =
            fetch_events::<_, IERC20::Approval>(&*self.transport, &filter, "approvals").await?;
        Ok(events
            .into_iter()
            .map(|(event, log)| TokenEvent {
                kind: TokenEventKind::Approval {
                    owner: event.owner,
                    spender: event.spender,
                },
                value: event.value,
                tx_hash: log.tx_hash,
                block_number: log.block_number,
                log_index: log.log_index,
            })
            .collect())
    }

    pub fn prepare_transfer(
        &self,
        to: &str,
        amount: &str,
        decimals: u8,
        symbol: &str,
    ) -> Result<PreparedWrite, DappError> {
        let to = parse_address(to)?;
        let value = parse_amount(amount, decimals)?;
        let call = IERC20::transferCall { to, value };
        Ok(PreparedWrite {
            call: RawCall::new(self.address, call.abi_encode()),
            description: format!(
                "Transfer {} {symbol} to {}",
                format_amount(value, decimals),
                short_address(&to)
            ),
            category: Category::TransferOut,
            counterparty: Some(to),
            amount: Some(value),
        })
    }

    pub fn prepare_approve(
        &self,
        spender: &str,
        amount: &str,
        decimals: u8,
        symbol: &str,
    ) -> Result<PreparedWrite, DappError> {
        let spender = parse_address(spender)?;
        let value = parse_amount(amount, decimals)?;
        let call = IERC20::approveCall { spender, value };
        Ok(PreparedWrite {
            call: RawCall::new(self.address, call.abi_encode()),
            description: format!(
                "Approve {} {symbol} for {}",
                format_amount(value, decimals),
                short_address(&spender)
            ),
            category: Category::Approval,
            counterparty: Some(spender),
            amount: Some(value),
        })
    }

    pub async fn submit(
        &self,
        account: Address,
        prepared: PreparedWrite,
    ) -> Result<TxHandle, DappError> {
        submit(&*self.transport, account, prepared).await
    }
}

pub enum DappContract<T> {
    Ballot(BallotContract<T>),
    Token(TokenContract<T>),
}

impl<T: WalletTransport> DappContract<T> {
    pub fn address(&self) -> Address {
        match self {
            DappContract::Ballot(ballot) => ballot.address(),
            DappContract::Token(token) => token.address(),
        }
    }

    /// The event whose arrival should trigger a resync for `account`.
    pub fn watch_filter(&self, account: Address) -> LogFilter {
        match self {
            DappContract::Ballot(ballot) => ballot.voted_filter(),
            DappContract::Token(token) => token.incoming_filter(account),
        }
    }

    pub fn watch_key(&self) -> (Address, B256) {
        match self {
            DappContract::Ballot(ballot) => (ballot.address(), IBallot::Voted::SIGNATURE_HASH),
            DappContract::Token(token) => (token.address(), IERC20::Transfer::SIGNATURE_HASH),
        }
    }

    pub async fn submit(
        &self,
        account: Address,
        prepared: PreparedWrite,
    ) -> Result<TxHandle, DappError> {
        match self {
            DappContract::Ballot(ballot) => ballot.submit(account, prepared).await,
            DappContract::Token(token) => token.submit(account, prepared).await,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::test_helpers::{
        ALICE,
        BALLOT_ADDRESS,
        BOB,
        FakeChain,
        TOKEN_ADDRESS,
    };

    fn ballot(chain: &Arc<FakeChain>) -> BallotContract<FakeChain> {
        BallotContract::new(chain.clone(), BALLOT_ADDRESS)
    }

    fn token(chain: &Arc<FakeChain>) -> TokenContract<FakeChain> {
        TokenContract::new(chain.clone(), TOKEN_ADDRESS)
    }

    #[tokio::test]
    async fn ballot_reads__return_contract_state() {
        // given
        let chain = Arc::new(FakeChain::default());
        let ballot = ballot(&chain);

        // when
        let title = ballot.title().await.unwrap();
        let options = ballot.options().await.unwrap();
        let results = ballot.results().await.unwrap();
        let active = ballot.voting_active().await.unwrap();

        // then
        assert_eq!(title, "Favourite language");
        assert_eq!(options.len(), results.len());
        assert!(active);
    }

    #[tokio::test]
    async fn has_voted__is_evaluated_for_the_caller() {
        // given
        let chain = Arc::new(FakeChain::default());
        let ballot = ballot(&chain);
        let options = ballot.options().await.unwrap();
        let prepared = ballot.prepare_vote(Some(0), &options).unwrap();

        // when
        ballot.submit(ALICE, prepared).await.unwrap();

        // then
        assert!(ballot.has_voted(ALICE).await.unwrap());
        assert!(!ballot.has_voted(BOB).await.unwrap());
    }

    #[tokio::test]
    async fn voted_events__decode_voter_and_option() {
        // given
        let chain = Arc::new(FakeChain::default());
        let ballot = ballot(&chain);
        let options = ballot.options().await.unwrap();
        let prepared = ballot.prepare_vote(Some(1), &options).unwrap();
        let handle = ballot.submit(ALICE, prepared).await.unwrap();

        // when
        let events = ballot.voted_events(0).await.unwrap();

        // then
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].voter, ALICE);
        assert_eq!(events[0].option_index, 1);
        assert_eq!(events[0].tx_hash, handle.hash);
    }

    #[tokio::test]
    async fn token_reads__return_metadata_and_balances() {
        // given
        let chain = Arc::new(FakeChain::default());
        let token = token(&chain);

        // when
        let name = token.name().await.unwrap();
        let symbol = token.symbol().await.unwrap();
        let decimals = token.decimals().await.unwrap();
        let balance = token.balance_of(ALICE).await.unwrap();

        // then
        assert_eq!(name, "Test Token");
        assert_eq!(symbol, "TKN");
        assert_eq!(decimals, 18);
        assert_eq!(balance, chain.initial_balance());
    }

    #[test]
    fn prepare_vote__requires_valid_selection() {
        // given
        let chain = Arc::new(FakeChain::default());
        let ballot = ballot(&chain);
        let options = vec!["A".to_string(), "B".to_string()];

        // then
        assert_eq!(ballot.prepare_vote(None, &options), Err(DappError::NoSelection));
        assert_eq!(ballot.prepare_vote(Some(2), &options), Err(DappError::NoSelection));
        assert_eq!(chain.send_count(), 0);
    }

    #[test]
    fn prepare_transfer__rejects_bad_address_without_network() {
        // given
        let chain = Arc::new(FakeChain::default());
        let token = token(&chain);

        // when
        let result = token.prepare_transfer("0x123", "5", 18, "TKN");

        // then
        assert!(matches!(result, Err(DappError::InvalidAddress { .. })));
        assert_eq!(chain.call_count(), 0);
        assert_eq!(chain.send_count(), 0);
    }

    #[tokio::test]
    async fn transfer_events__include_both_directions() {
        // given
        let chain = Arc::new(FakeChain::default());
        let token = token(&chain);
        let to_bob = token
            .prepare_transfer(&BOB.to_checksum(None), "5", 18, "TKN")
            .unwrap();
        let to_alice = token
            .prepare_transfer(&ALICE.to_checksum(None), "1", 18, "TKN")
            .unwrap();
        token.submit(ALICE, to_bob).await.unwrap();
        token.submit(BOB, to_alice).await.unwrap();

        // when
        let events = token.transfer_events(ALICE, 0).await.unwrap();

        // then
        let four_tokens = U256::from(4_000_000_000_000_000_000u128);
        assert_eq!(events.len(), 2);
        assert_eq!(
            token.balance_of(BOB).await.unwrap(),
            chain.initial_balance() + four_tokens
        );
    }

    #[tokio::test]
    async fn submit__maps_wallet_rejection() {
        // given
        let chain = Arc::new(FakeChain::default());
        let token = token(&chain);
        let prepared = token
            .prepare_approve(&BOB.to_checksum(None), "1", 18, "TKN")
            .unwrap();
        chain.reject_next_signature();

        // when
        let result = token.submit(ALICE, prepared).await;

        // then
        assert_eq!(result, Err(DappError::TransactionRejected));
    }

    #[tokio::test]
    async fn reads__surface_transport_failures() {
        // given
        let chain = Arc::new(FakeChain::default());
        let token = token(&chain);
        chain.fail_reads(true);

        // when
        let result = token.symbol().await;

        // then
        assert!(matches!(result, Err(DappError::ReadFailure { what: "symbol", .. })));
    }
}
