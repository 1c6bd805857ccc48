use crate::{
    controller::ControllerConfig,
    deployment::{
        DeploymentEnv,
        DeploymentStore,
    },
    history::{
        BALLOT_HISTORY_WINDOW,
        TOKEN_HISTORY_WINDOW,
    },
    session::NetworkPolicy,
};
use alloy::primitives::{
    Address,
    address,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    path::PathBuf,
    time::Duration,
};

pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;
pub const LOCAL_CHAIN_ID: u64 = 31_337;

pub const DEFAULT_SEPOLIA_RPC_URL: &str = "https://ethereum-sepolia-rpc.publicnode.com";
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://localhost:8545";

/// Ballot deployed on Sepolia, used when nothing else is configured.
pub const DEFAULT_BALLOT_ADDRESS: Address = address!("0xCFA18575d8126950DCA5960B65eCfEBdCc7041E3");

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Ballot,
    Token,
}

impl Variant {
    pub fn history_window(self) -> usize {
        match self {
            Variant::Ballot => BALLOT_HISTORY_WINDOW,
            Variant::Token => TOKEN_HISTORY_WINDOW,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Variant::Ballot => "ballot",
            Variant::Token => "token",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkTarget {
    Sepolia { url: String },
    Local { url: String },
}

impl NetworkTarget {
    pub fn chain_id(&self) -> u64 {
        match self {
            NetworkTarget::Sepolia { .. } => SEPOLIA_CHAIN_ID,
            NetworkTarget::Local { .. } => LOCAL_CHAIN_ID,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            NetworkTarget::Sepolia { url } | NetworkTarget::Local { url } => url,
        }
    }

    pub fn deployment_env(&self) -> DeploymentEnv {
        match self {
            NetworkTarget::Sepolia { .. } => DeploymentEnv::Sepolia,
            NetworkTarget::Local { .. } => DeploymentEnv::Local,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletConfig {
    /// Local keystore unlocked with a password prompt.
    Keystore { name: String, dir: PathBuf },
    /// Node or wallet endpoint that signs with `eth_sendTransaction`.
    External { url: String },
    None,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub variant: Variant,
    pub network: NetworkTarget,
    pub wallet: WalletConfig,
    pub contract: Option<Address>,
    pub spender: Option<Address>,
    pub from_block: Option<u64>,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
    pub strict_network: bool,
}

impl AppConfig {
    /// Contract address and first event block: the explicit flag wins, then
    /// the newest registry record, then the built-in Sepolia ballot.
    pub fn resolve_contract(&self, store: &DeploymentStore) -> Result<(Address, u64)> {
        if let Some(contract) = self.contract {
            return Ok((contract, self.from_block.unwrap_or(0)));
        }
        if let Some(record) = store.latest_for(self.variant)? {
            if record.chain_id != self.network.chain_id() {
                tracing::warn!(
                    recorded = record.chain_id,
                    expected = self.network.chain_id(),
                    "deployment record chain id does not match the selected network"
                );
            }
            let from_block = self.from_block.or(record.deployment_block).unwrap_or(0);
            return Ok((record.address()?, from_block));
        }
        match (self.variant, &self.network) {
            (Variant::Ballot, NetworkTarget::Sepolia { .. }) => {
                Ok((DEFAULT_BALLOT_ADDRESS, self.from_block.unwrap_or(0)))
            }
            (variant, network) => Err(eyre!(
                "No {variant} contract known for {}; pass --contract or add a deployment record",
                network.deployment_env()
            )),
        }
    }

    pub fn controller_config(&self, contract: Address, from_block: u64) -> ControllerConfig {
        ControllerConfig {
            variant: self.variant,
            contract,
            expected_chain_id: self.network.chain_id(),
            network_policy: if self.strict_network {
                NetworkPolicy::Block
            } else {
                NetworkPolicy::Warn
            },
            from_block,
            spender: self.spender,
            confirmation_timeout: self.confirmation_timeout,
            poll_interval: self.poll_interval,
        }
    }
}
