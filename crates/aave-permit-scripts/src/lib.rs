//! Scripts driving an Aave V3 market end to end.
//!
//! - `aave-borrow`: supply WETH, borrow DAI against it, repay the DAI
//!   (`USE_PERMIT=1` repays through an EIP-2612 permit)
//! - `eth-swap`: wrap or unwrap ETH
//!
//! Configuration comes from the environment; see [`settings::Settings`].

pub mod flow;
pub mod settings;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the fmt subscriber, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
