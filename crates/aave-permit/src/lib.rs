//! EIP-2612 permits and Aave V3 pool operations.
//!
//! The core is [`PermitSigner`]: it reads a token's EIP-712 domain and the
//! owner's current permit nonce, signs an ERC-20 `Permit` off-chain, and hands
//! back a [`SignedPermit`] that a single `repayWithPermit` / `supplyWithPermit`
//! call consumes.
//!
//! # Collaborators
//!
//! - **Transport**: any alloy [`Provider`](alloy::providers::Provider); token
//!   reads go through the [`TokenReader`] trait so they can be swapped in tests.
//! - **Keys**: a [`Keyring`] of alloy signers, one per owner address.
//! - **Prices**: Chainlink aggregators via [`price_feed`].
//!
//! # Quick example
//!
//! ```no_run
//! use alloy::primitives::{address, U256};
//! use alloy::providers::ProviderBuilder;
//! use alloy::signers::local::PrivateKeySigner;
//! use aave_permit::{Keyring, NetworkConfig, PermitSigner, ProviderTokenReader};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let network = NetworkConfig::sepolia();
//! let provider = ProviderBuilder::new().connect_http(network.rpc_url.parse().unwrap());
//! let signer: PrivateKeySigner = "0xYOUR_KEY".parse().unwrap();
//! let owner = signer.address();
//!
//! let mut keyring = Keyring::new();
//! keyring.insert(signer);
//! let permits = PermitSigner::new(ProviderTokenReader::new(provider, &network), keyring);
//!
//! let permit = permits
//!     .create_permit(network.dai_token, owner, network.pool, U256::from(1_000u64), 30)
//!     .await
//!     .unwrap();
//! println!("deadline: {}", permit.deadline());
//! # }
//! ```

pub mod constants;
pub mod eip712;
pub mod error;
pub mod keyring;
pub mod permit;
pub mod pool;
pub mod price_feed;
pub mod token;
mod tx;
pub mod weth;

use alloy::sol;

// EIP-2612 permit payload. The sol! macro derives SolStruct, which provides
// the EIP-712 type string and eip712_signing_hash().
sol! {
    #[derive(Debug, serde::Serialize, serde::Deserialize)]
    struct Permit {
        address owner;
        address spender;
        uint256 value;
        uint256 nonce;
        uint256 deadline;
    }
}

// ERC-20 with the EIP-2612 and EIP-5267 read surface used to build permits.
sol! {
    #[sol(rpc)]
    interface IERC20Permit {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function version() external view returns (string);
        function nonces(address owner) external view returns (uint256);
        function DOMAIN_SEPARATOR() external view returns (bytes32);
        function eip712Domain() external view returns (
            bytes1 fields,
            string name,
            string version,
            uint256 chainId,
            address verifyingContract,
            bytes32 salt,
            uint256[] extensions
        );
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 value) external returns (bool);
    }
}

// Aave V3 pool entry points and the events the scripts report on.
sol! {
    #[sol(rpc)]
    interface IPool {
        event Supply(
            address indexed reserve,
            address user,
            address indexed onBehalfOf,
            uint256 amount,
            uint16 indexed referralCode
        );
        event Borrow(
            address indexed reserve,
            address user,
            address indexed onBehalfOf,
            uint256 amount,
            uint8 interestRateMode,
            uint256 borrowRate,
            uint16 indexed referralCode
        );
        event Repay(
            address indexed reserve,
            address indexed user,
            address indexed repayer,
            uint256 amount,
            bool useATokens
        );

        function supply(address asset, uint256 amount, address onBehalfOf, uint16 referralCode) external;
        function supplyWithPermit(
            address asset,
            uint256 amount,
            address onBehalfOf,
            uint16 referralCode,
            uint256 deadline,
            uint8 permitV,
            bytes32 permitR,
            bytes32 permitS
        ) external;
        function borrow(
            address asset,
            uint256 amount,
            uint256 interestRateMode,
            uint16 referralCode,
            address onBehalfOf
        ) external;
        function repay(
            address asset,
            uint256 amount,
            uint256 interestRateMode,
            address onBehalfOf
        ) external returns (uint256);
        function repayWithPermit(
            address asset,
            uint256 amount,
            uint256 interestRateMode,
            address onBehalfOf,
            uint256 deadline,
            uint8 permitV,
            bytes32 permitR,
            bytes32 permitS
        ) external returns (uint256);
        function getUserAccountData(address user) external view returns (
            uint256 totalCollateralBase,
            uint256 totalDebtBase,
            uint256 availableBorrowsBase,
            uint256 currentLiquidationThreshold,
            uint256 ltv,
            uint256 healthFactor
        );
    }
}

// Chainlink price feed.
sol! {
    #[sol(rpc)]
    interface AggregatorV3Interface {
        function decimals() external view returns (uint8);
        function latestRoundData() external view returns (
            uint80 roundId,
            int256 answer,
            uint256 startedAt,
            uint256 updatedAt,
            uint80 answeredInRound
        );
    }
}

// Wrapped ether.
sol! {
    #[sol(rpc)]
    interface IWETH {
        event Deposit(address indexed dst, uint256 wad);
        event Withdrawal(address indexed src, uint256 wad);

        function deposit() external payable;
        function withdraw(uint256 wad) external;
    }
}

// Re-exports
pub use constants::*;
pub use eip712::{PermitSignature, TokenDomain};
pub use error::PermitError;
pub use keyring::Keyring;
pub use permit::{PermitSigner, PermitStatus, SignedPermit, TokenPermitMessage};
pub use pool::{InterestRateMode, UserAccountData};
pub use price_feed::AssetPrice;
pub use token::{ProviderTokenReader, TokenReader};
