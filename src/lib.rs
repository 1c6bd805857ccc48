pub mod config;
pub mod contract;
pub mod controller;
pub mod deployment;
pub mod error;
pub mod history;
pub mod orchestrator;
pub mod rpc_transport;
pub mod session;
pub mod sync;
pub mod transport;
pub mod validation;
pub mod wallets;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub mod ballot_types {
    use alloy::sol;

    sol! {
        #[derive(Debug, PartialEq, Eq)]
        interface IBallot {
            event Voted(address indexed voter, uint256 indexed optionIndex);
            event VotingStatusChanged(bool active);

            function title() external view returns (string memory);
            function getOptions() external view returns (string[] memory);
            function getResults() external view returns (uint256[] memory);
            function hasVoted() external view returns (bool);
            function votingActive() external view returns (bool);
            function owner() external view returns (address);
            function vote(uint256 optionIndex) external;
            function setVotingActive(bool active) external;
        }
    }
}

pub mod token_types {
    use alloy::sol;

    sol! {
        #[derive(Debug, PartialEq, Eq)]
        interface IERC20 {
            event Transfer(address indexed from, address indexed to, uint256 value);
            event Approval(address indexed owner, address indexed spender, uint256 value);

            function name() external view returns (string memory);
            function symbol() external view returns (string memory);
            function decimals() external view returns (uint8);
            function totalSupply() external view returns (uint256);
            function balanceOf(address account) external view returns (uint256);
            function allowance(address owner, address spender) external view returns (uint256);
            function transfer(address to, uint256 value) external returns (bool);
            function approve(address spender, uint256 value) external returns (bool);
        }
    }
}

pub use config::{
    AppConfig,
    NetworkTarget,
    Variant,
    WalletConfig,
};
pub use controller::{
    ControllerConfig,
    DappController,
    StatusKind,
    StatusMessage,
    ViewModel,
};
pub use error::{
    DappError,
    TransportError,
};
pub use transport::WalletTransport;
