use crate::{
    ballot_types::IBallot,
    config::SEPOLIA_CHAIN_ID,
    error::TransportError,
    token_types::IERC20,
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
    primitives::{
        Address,
        Bytes,
        LogData,
        TxHash,
        U256,
        address,
        keccak256,
    },
    sol_types::{
        SolCall,
        SolEvent,
        SolInterface,
        SolValue,
    },
};
use std::{
    collections::{
        HashMap,
        HashSet,
    },
    sync::Mutex,
};
use tokio::sync::broadcast;

pub const BALLOT_ADDRESS: Address = address!("0xba11070000000000000000000000000000000001");
pub const TOKEN_ADDRESS: Address = address!("0x70ce000000000000000000000000000000000002");
pub const ALICE: Address = address!("0xa11ce00000000000000000000000000000000003");
pub const BOB: Address = address!("0xb0b0000000000000000000000000000000000004");
pub const CAROL: Address = address!("0xca20100000000000000000000000000000000005");

pub const BALLOT_TITLE: &str = "Favourite language";
pub const BALLOT_OPTIONS: [&str; 3] = ["Rust", "Go", "Zig"];

const WHOLE_TOKENS: u64 = 1_000;
const TOKEN_DECIMALS: u8 = 18;

#[derive(Clone, Debug)]
struct BallotState {
    title: String,
    options: Vec<String>,
    tallies: Vec<U256>,
    voters: HashSet<Address>,
    active: bool,
    owner: Address,
}

#[derive(Clone, Debug)]
struct TokenState {
    name: String,
    symbol: String,
    decimals: u8,
    total_supply: U256,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
}

struct ChainState {
    chain_id: u64,
    accounts: Vec<Address>,
    block_number: u64,
    ballot: BallotState,
    token: TokenState,
    logs: Vec<RawLog>,
    receipts: HashMap<TxHash, TxReceipt>,
    queued: Vec<(TxHash, Address, RawCall)>,
    auto_mine: bool,
    tx_count: u64,
    reject_next: bool,
    fail_reads: bool,
    fail_head: bool,
    forgotten: Vec<TxHash>,
    send_count: usize,
    call_count: usize,
    log_query_count: usize,
}

type Emitted = Vec<(Address, LogData)>;

impl ChainState {
    fn sender(&self, call: &RawCall) -> Address {
        call.from
            .or_else(|| self.accounts.first().copied())
            .unwrap_or(Address::ZERO)
    }

    fn read(&self, from: Address, call: &RawCall) -> Result<Bytes, String> {
        if call.to == BALLOT_ADDRESS {
            let decoded = IBallot::IBallotCalls::abi_decode(&call.input)
                .map_err(|e| format!("unknown ballot call: {e}"))?;
            let ballot = &self.ballot;
            let output = match decoded {
                IBallot::IBallotCalls::title(_) => ballot.title.abi_encode(),
                IBallot::IBallotCalls::getOptions(_) => ballot.options.abi_encode(),
                IBallot::IBallotCalls::getResults(_) => ballot.tallies.abi_encode(),
                IBallot::IBallotCalls::hasVoted(_) => ballot.voters.contains(&from).abi_encode(),
                IBallot::IBallotCalls::votingActive(_) => ballot.active.abi_encode(),
                IBallot::IBallotCalls::owner(_) => ballot.owner.abi_encode(),
                _ => {
                    let mut scratch = self.ballot.clone();
                    execute_ballot(&mut scratch, from, decoded)?;
                    Vec::new()
                }
            };
            return Ok(output.into());
        }
        if call.to == TOKEN_ADDRESS {
            let decoded = IERC20::IERC20Calls::abi_decode(&call.input)
                .map_err(|e| format!("unknown token call: {e}"))?;
            let token = &self.token;
            let output = match decoded {
                IERC20::IERC20Calls::name(_) => token.name.abi_encode(),
                IERC20::IERC20Calls::symbol(_) => token.symbol.abi_encode(),
                IERC20::IERC20Calls::decimals(_) => U256::from(token.decimals).abi_encode(),
                IERC20::IERC20Calls::totalSupply(_) => token.total_supply.abi_encode(),
                IERC20::IERC20Calls::balanceOf(c) => token.balance(c.account).abi_encode(),
                IERC20::IERC20Calls::allowance(c) => token
                    .allowances
                    .get(&(c.owner, c.spender))
                    .copied()
                    .unwrap_or_default()
                    .abi_encode(),
                _ => {
                    let mut scratch = self.token.clone();
                    execute_token(&mut scratch, from, decoded)?;
                    true.abi_encode()
                }
            };
            return Ok(output.into());
        }
        Err(format!("no contract at {}", call.to))
    }

    fn execute(&mut self, from: Address, call: &RawCall) -> Result<Emitted, String> {
        if call.to == BALLOT_ADDRESS {
            let decoded = IBallot::IBallotCalls::abi_decode(&call.input)
                .map_err(|e| format!("unknown ballot call: {e}"))?;
            let mut next = self.ballot.clone();
            let emitted = execute_ballot(&mut next, from, decoded)?;
            self.ballot = next;
            return Ok(emitted.into_iter().map(|log| (BALLOT_ADDRESS, log)).collect());
        }
        if call.to == TOKEN_ADDRESS {
            let decoded = IERC20::IERC20Calls::abi_decode(&call.input)
                .map_err(|e| format!("unknown token call: {e}"))?;
            let mut next = self.token.clone();
            let emitted = execute_token(&mut next, from, decoded)?;
            self.token = next;
            return Ok(emitted.into_iter().map(|log| (TOKEN_ADDRESS, log)).collect());
        }
        Err(format!("no contract at {}", call.to))
    }

    fn next_hash(&mut self) -> TxHash {
        self.tx_count += 1;
        keccak256(self.tx_count.to_be_bytes())
    }

    /// Includes a transaction in a fresh block.
    fn mine_tx(&mut self, hash: TxHash, from: Address, call: &RawCall) {
        self.block_number += 1;
        let block_number = self.block_number;
        let receipt = match self.execute(from, call) {
            Ok(emitted) => {
                for (log_index, (address, data)) in emitted.into_iter().enumerate() {
                    self.logs.push(RawLog {
                        address,
                        topics: data.topics().to_vec(),
                        data: data.data,
                        tx_hash: hash,
                        block_number,
                        log_index: log_index as u64,
                    });
                }
                TxReceipt {
                    tx_hash: hash,
                    block_number,
                    success: true,
                    revert_reason: None,
                }
            }
            Err(reason) => TxReceipt {
                tx_hash: hash,
                block_number,
                success: false,
                revert_reason: Some(reason),
            },
        };
        self.receipts.insert(hash, receipt);
    }
}

impl TokenState {
    fn balance(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or_default()
    }
}

fn execute_ballot(
    ballot: &mut BallotState,
    from: Address,
    call: IBallot::IBallotCalls,
) -> Result<Vec<LogData>, String> {
    match call {
        IBallot::IBallotCalls::vote(c) => {
            if !ballot.active {
                return Err("Voting is not active".to_string());
            }
            if ballot.voters.contains(&from) {
                return Err("Already voted".to_string());
            }
            if c.optionIndex >= U256::from(ballot.options.len()) {
                return Err("Invalid option".to_string());
            }
            let index = c.optionIndex.to::<usize>();
            ballot.tallies[index] += U256::from(1);
            ballot.voters.insert(from);
            Ok(vec![
                IBallot::Voted {
                    voter: from,
                    optionIndex: c.optionIndex,
                }
                .encode_log_data(),
            ])
        }
        IBallot::IBallotCalls::setVotingActive(c) => {
            if from != ballot.owner {
                return Err("Not owner".to_string());
            }
            ballot.active = c.active;
            Ok(vec![IBallot::VotingStatusChanged { active: c.active }.encode_log_data()])
        }
        _ => Err("not a state-changing call".to_string()),
    }
}

fn execute_token(
    token: &mut TokenState,
    from: Address,
    call: IERC20::IERC20Calls,
) -> Result<Vec<LogData>, String> {
    match call {
        IERC20::IERC20Calls::transfer(c) => {
            let balance = token.balance(from);
            if balance < c.value {
                return Err("ERC20: transfer amount exceeds balance".to_string());
            }
            token.balances.insert(from, balance - c.value);
            let received = token.balance(c.to) + c.value;
            token.balances.insert(c.to, received);
            Ok(vec![
                IERC20::Transfer {
                    from,
                    to: c.to,
                    value: c.value,
                }
                .encode_log_data(),
            ])
        }
        IERC20::IERC20Calls::approve(c) => {
            token.allowances.insert((from, c.spender), c.value);
            Ok(vec![
                IERC20::Approval {
                    owner: from,
                    spender: c.spender,
                    value: c.value,
                }
                .encode_log_data(),
            ])
        }
        _ => Err("not a state-changing call".to_string()),
    }
}

/// In-memory chain hosting one ballot and one ERC-20 token, with a wallet
/// whose account and network can be switched from tests.
pub struct FakeChain {
    state: Mutex<ChainState>,
    notifier: ChangeNotifier,
}

impl Default for FakeChain {
    fn default() -> Self {
        let options = BALLOT_OPTIONS.iter().map(|o| o.to_string()).collect::<Vec<_>>();
        let tallies = vec![U256::ZERO; options.len()];
        let initial = Self::initial_balance_units();
        let state = ChainState {
            chain_id: SEPOLIA_CHAIN_ID,
            accounts: vec![ALICE],
            block_number: 1,
            ballot: BallotState {
                title: BALLOT_TITLE.to_string(),
                options,
                tallies,
                voters: HashSet::new(),
                active: true,
                owner: ALICE,
            },
            token: TokenState {
                name: "Test Token".to_string(),
                symbol: "TKN".to_string(),
                decimals: TOKEN_DECIMALS,
                total_supply: initial * U256::from(2),
                balances: HashMap::from([(ALICE, initial), (BOB, initial)]),
                allowances: HashMap::new(),
            },
            logs: Vec::new(),
            receipts: HashMap::new(),
            queued: Vec::new(),
            auto_mine: true,
            tx_count: 0,
            reject_next: false,
            fail_reads: false,
            fail_head: false,
            forgotten: Vec::new(),
            send_count: 0,
            call_count: 0,
            log_query_count: 0,
        };
        Self {
            state: Mutex::new(state),
            notifier: ChangeNotifier::default(),
        }
    }
}

impl FakeChain {
    fn initial_balance_units() -> U256 {
        U256::from(WHOLE_TOKENS) * U256::from(10u64).pow(U256::from(TOKEN_DECIMALS))
    }

    /// Starting token balance of both ALICE and BOB.
    pub fn initial_balance(&self) -> U256 {
        Self::initial_balance_units()
    }

    pub fn token_balance(&self, account: Address) -> U256 {
        self.state.lock().unwrap().token.balance(account)
    }

    pub fn current_chain_id(&self) -> u64 {
        self.state.lock().unwrap().chain_id
    }

    pub fn set_auto_mine(&self, auto_mine: bool) {
        self.state.lock().unwrap().auto_mine = auto_mine;
    }

    /// Mines every queued transaction, one block each.
    pub fn mine(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        let queued = std::mem::take(&mut state.queued);
        let count = queued.len();
        for (hash, from, call) in queued {
            state.mine_tx(hash, from, &call);
        }
        count
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        self.state.lock().unwrap().accounts = accounts;
    }

    pub fn switch_account(&self, account: Address) {
        self.state.lock().unwrap().accounts = vec![account];
        self.notifier
            .notify(WalletChange::AccountsChanged(vec![account]));
    }

    pub fn switch_chain(&self, chain_id: u64) {
        self.state.lock().unwrap().chain_id = chain_id;
        self.notifier.notify(WalletChange::ChainChanged(chain_id));
    }

    pub fn set_ballot_title(&self, title: &str) {
        self.state.lock().unwrap().ballot.title = title.to_string();
    }

    pub fn reject_next_signature(&self) {
        self.state.lock().unwrap().reject_next = true;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    pub fn fail_block_number(&self, fail: bool) {
        self.state.lock().unwrap().fail_head = fail;
    }

    /// Hashes the client said it no longer waits on.
    pub fn forgotten(&self) -> Vec<TxHash> {
        self.state.lock().unwrap().forgotten.clone()
    }

    /// A vote cast by someone else, mined immediately.
    pub fn external_vote(&self, voter: Address, option_index: u64) -> TxHash {
        let mut state = self.state.lock().unwrap();
        let call = RawCall::new(
            BALLOT_ADDRESS,
            IBallot::voteCall {
                optionIndex: U256::from(option_index),
            }
            .abi_encode(),
        );
        let hash = state.next_hash();
        state.mine_tx(hash, voter, &call);
        hash
    }

    pub fn send_count(&self) -> usize {
        self.state.lock().unwrap().send_count
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().call_count
    }

    pub fn log_query_count(&self) -> usize {
        self.state.lock().unwrap().log_query_count
    }

    pub fn subscriber_count(&self) -> usize {
        self.notifier.subscriber_count()
    }
}

impl WalletTransport for FakeChain {
    async fn request_accounts(&self) -> TransportResult<Vec<Address>> {
        Ok(self.state.lock().unwrap().accounts.clone())
    }

    async fn chain_id(&self) -> TransportResult<u64> {
        Ok(self.state.lock().unwrap().chain_id)
    }

    async fn block_number(&self) -> TransportResult<u64> {
        let state = self.state.lock().unwrap();
        if state.fail_head {
            return Err(TransportError::Rpc("connection reset by peer".to_string()));
        }
        Ok(state.block_number)
    }

    async fn call(&self, call: &RawCall) -> TransportResult<Bytes> {
        let mut state = self.state.lock().unwrap();
        state.call_count += 1;
        if state.fail_reads {
            return Err(TransportError::Rpc("connection reset by peer".to_string()));
        }
        let from = call.from.unwrap_or(Address::ZERO);
        state.read(from, call).map_err(TransportError::Reverted)
    }

    async fn sign_and_send(&self, call: &RawCall) -> TransportResult<TxHash> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.reject_next) {
            return Err(TransportError::Rejected);
        }
        state.send_count += 1;
        let from = state.sender(call);
        let hash = state.next_hash();
        if state.auto_mine {
            state.mine_tx(hash, from, call);
        } else {
            state.queued.push((hash, from, call.clone()));
        }
        Ok(hash)
    }

    async fn receipt(&self, hash: TxHash) -> TransportResult<Option<TxReceipt>> {
        Ok(self.state.lock().unwrap().receipts.get(&hash).cloned())
    }

    async fn logs(&self, filter: &LogFilter) -> TransportResult<Vec<RawLog>> {
        let mut state = self.state.lock().unwrap();
        state.log_query_count += 1;
        if state.fail_reads {
            return Err(TransportError::Rpc("connection reset by peer".to_string()));
        }
        Ok(state
            .logs
            .iter()
            .filter(|log| filter.matches(log))
            .cloned()
            .collect())
    }

    fn forget(&self, hash: TxHash) {
        self.state.lock().unwrap().forgotten.push(hash);
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletChange> {
        self.notifier.subscribe()
    }
}
