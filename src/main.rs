use alloy::primitives::Address;
use clap::{
    ArgGroup,
    Args,
    Parser,
    Subcommand,
};
use color_eyre::eyre::Result;
use dapp_console::{
    AppConfig,
    NetworkTarget,
    Variant,
    WalletConfig,
    config::{
        DEFAULT_LOCAL_RPC_URL,
        DEFAULT_SEPOLIA_RPC_URL,
    },
    deployment::{
        self,
        DeploymentStore,
        record_deployment,
    },
    validation::parse_address,
    wallets::resolve_keystore_dir,
};
use std::time::Duration;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

mod client;
mod ui;

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "dapp.log";

#[derive(Parser, Debug)]
#[command(
    name = "dapp",
    about = "Terminal front end for the ballot and ERC-20 contracts",
    version,
    subcommand_negates_reqs = true,
    args_conflicts_with_subcommands = true,
    group(
        ArgGroup::new("network")
            .args(["sepolia", "local"])
            .required(true)
    ),
    group(ArgGroup::new("variant").args(["ballot", "token"]))
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the interactive console (the default)
    #[command(
        group(
            ArgGroup::new("network")
                .args(["sepolia", "local"])
                .required(true)
        ),
        group(ArgGroup::new("variant").args(["ballot", "token"]))
    )]
    Run {
        #[command(flatten)]
        args: RunArgs,
    },
    /// Inspect or extend the deployment registry
    Deployments {
        #[command(subcommand)]
        action: DeploymentsAction,
    },
}

#[derive(Subcommand, Debug)]
enum DeploymentsAction {
    /// Print every recorded deployment for a network
    #[command(group(
        ArgGroup::new("network")
            .args(["sepolia", "local"])
            .required(true)
    ))]
    List {
        #[command(flatten)]
        network: NetworkArgs,
    },
    /// Record an already deployed contract
    #[command(
        group(
            ArgGroup::new("network")
                .args(["sepolia", "local"])
                .required(true)
        ),
        group(
            ArgGroup::new("variant")
                .args(["ballot", "token"])
                .required(true)
        )
    )]
    Add {
        #[command(flatten)]
        network: NetworkArgs,

        #[command(flatten)]
        variant: VariantArgs,

        /// Contract address (checksummed or all one case)
        #[arg(long, value_parser = address_arg)]
        address: Address,

        /// Chain id the contract lives on (defaults to the network's)
        #[arg(long)]
        chain_id: Option<u64>,

        /// Free-form note stored with the record
        #[arg(long)]
        label: Option<String>,

        /// Block the contract was deployed in; event scans start there
        #[arg(long)]
        block: Option<u64>,
    },
}

#[derive(Args, Debug, Clone)]
struct NetworkArgs {
    /// Use Sepolia (default RPC https://ethereum-sepolia-rpc.publicnode.com)
    #[arg(long)]
    sepolia: bool,

    /// Use a local node (default RPC http://localhost:8545)
    #[arg(long)]
    local: bool,

    /// Override the RPC URL for the selected network
    #[arg(long)]
    rpc_url: Option<String>,
}

impl NetworkArgs {
    fn target(&self) -> NetworkTarget {
        if self.local {
            NetworkTarget::Local {
                url: self
                    .rpc_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_LOCAL_RPC_URL.to_string()),
            }
        } else {
            NetworkTarget::Sepolia {
                url: self
                    .rpc_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SEPOLIA_RPC_URL.to_string()),
            }
        }
    }
}

#[derive(Args, Debug, Clone)]
struct VariantArgs {
    /// Drive the ballot contract (default)
    #[arg(long)]
    ballot: bool,

    /// Drive the ERC-20 token contract
    #[arg(long)]
    token: bool,
}

impl VariantArgs {
    fn variant(&self) -> Variant {
        if self.token {
            Variant::Token
        } else {
            Variant::Ballot
        }
    }
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    #[command(flatten)]
    network: NetworkArgs,

    #[command(flatten)]
    variant: VariantArgs,

    /// Contract address; defaults to the newest deployment record
    #[arg(long, value_parser = address_arg)]
    contract: Option<Address>,

    /// Spender whose allowance is shown for the token
    #[arg(long, value_parser = address_arg)]
    spender: Option<Address>,

    /// Keystore name used for signing
    #[arg(long, conflicts_with = "wallet_rpc")]
    keystore: Option<String>,

    /// Override keystore directory (defaults to ~/.foundry/keystores)
    #[arg(long)]
    keystore_dir: Option<String>,

    /// Wallet endpoint that signs with eth_sendTransaction
    #[arg(long)]
    wallet_rpc: Option<String>,

    /// First block scanned for contract events
    #[arg(long)]
    from_block: Option<u64>,

    /// Seconds to wait for a receipt before giving up
    #[arg(long, default_value_t = 120)]
    confirmation_timeout: u64,

    /// Seconds between receipt, event and wallet polls
    #[arg(long, default_value_t = 2)]
    poll_interval: u64,

    /// Refuse to connect when the wallet is on another network
    #[arg(long)]
    strict_network: bool,
}

impl RunArgs {
    fn app_config(self) -> Result<AppConfig> {
        let wallet = match (self.keystore, self.wallet_rpc) {
            (Some(name), _) => WalletConfig::Keystore {
                name,
                dir: resolve_keystore_dir(self.keystore_dir.as_deref())?,
            },
            (None, Some(url)) => WalletConfig::External { url },
            (None, None) => WalletConfig::None,
        };
        Ok(AppConfig {
            variant: self.variant.variant(),
            network: self.network.target(),
            wallet,
            contract: self.contract,
            spender: self.spender,
            from_block: self.from_block,
            confirmation_timeout: Duration::from_secs(self.confirmation_timeout),
            poll_interval: Duration::from_secs(self.poll_interval.max(1)),
            strict_network: self.strict_network,
        })
    }
}

fn address_arg(input: &str) -> Result<Address, String> {
    parse_address(input).map_err(|e| e.to_string())
}

/// Stdout belongs to the terminal UI, so logs go to a daily rolling file.
fn init_tracing() -> WorkerGuard {
    let appender = rolling::daily(LOG_DIR, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    guard
}

fn list_deployments(network: NetworkArgs) -> Result<()> {
    let store = DeploymentStore::new(network.target().deployment_env())?;
    let records = store.load()?;
    if records.is_empty() {
        println!("No deployments recorded in {}", store.path().display());
        return Ok(());
    }
    for record in records {
        println!(
            "{:<7} {} chain {} block {} {} {}",
            record.variant.to_string(),
            record.contract_address,
            record.chain_id,
            record
                .deployment_block
                .map(|b| b.to_string())
                .unwrap_or_else(|| "-".to_string()),
            record.deployed_at,
            record.label.unwrap_or_default(),
        );
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let _guard = init_tracing();
    tracing::info!("starting dapp console");
    deployment::ensure_structure()?;

    match cli.command {
        None => client::run_app(cli.run.app_config()?).await,
        Some(Command::Run { args }) => client::run_app(args.app_config()?).await,
        Some(Command::Deployments { action }) => match action {
            DeploymentsAction::List { network } => list_deployments(network),
            DeploymentsAction::Add {
                network,
                variant,
                address,
                chain_id,
                label,
                block,
            } => {
                let target = network.target();
                let store = DeploymentStore::new(target.deployment_env())?;
                let record = record_deployment(
                    &store,
                    variant.variant(),
                    address,
                    chain_id.unwrap_or_else(|| target.chain_id()),
                    label,
                    block,
                )?;
                println!(
                    "Recorded {} at {} in {}",
                    record.variant,
                    record.contract_address,
                    store.path().display()
                );
                Ok(())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn cli__run_flags_build_app_config() {
        // given
        let cli = Cli::try_parse_from([
            "dapp",
            "--local",
            "--token",
            "--wallet-rpc",
            "http://localhost:8545",
            "--poll-interval",
            "5",
        ])
        .unwrap();

        // when
        let config = cli.run.app_config().unwrap();

        // then
        assert_eq!(config.variant, Variant::Token);
        assert_eq!(config.network.chain_id(), 31_337);
        assert_eq!(
            config.wallet,
            WalletConfig::External {
                url: "http://localhost:8545".to_string()
            }
        );
        assert_eq!(config.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn cli__network_is_required() {
        assert!(Cli::try_parse_from(["dapp", "--ballot"]).is_err());
    }

    #[test]
    fn cli__rejects_bad_contract_address() {
        let result = Cli::try_parse_from(["dapp", "--sepolia", "--contract", "0x123"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli__deployments_subcommand_skips_run_requirements() {
        // when
        let cli = Cli::try_parse_from(["dapp", "deployments", "list", "--sepolia"]).unwrap();

        // then
        assert!(matches!(
            cli.command,
            Some(Command::Deployments {
                action: DeploymentsAction::List { .. }
            })
        ));
    }
}
