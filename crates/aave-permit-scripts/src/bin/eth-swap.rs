use alloy::network::EthereumWallet;
use alloy::primitives::utils::{format_ether, parse_ether};
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;

use aave_permit::weth;
use aave_scripts::settings::Settings;

const USAGE: &str = "usage: eth-swap <deposit|withdraw> <amount in ETH>";

#[tokio::main]
async fn main() {
    aave_scripts::init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (action, raw_amount) = match args.as_slice() {
        [action, amount] if action == "deposit" || action == "withdraw" => {
            (action.as_str(), amount.as_str())
        }
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };

    let amount = match parse_ether(raw_amount) {
        Ok(amount) => amount,
        Err(e) => {
            eprintln!("ERROR: invalid amount '{raw_amount}': {e}");
            std::process::exit(2);
        }
    };

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("ERROR: {e}");
            std::process::exit(1);
        }
    };

    let signer = match settings.private_key.parse::<PrivateKeySigner>() {
        Ok(signer) => signer,
        Err(e) => {
            eprintln!("ERROR: invalid PRIVATE_KEY: {e}");
            std::process::exit(1);
        }
    };

    let provider = match ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .connect(&settings.network.rpc_url)
        .await
    {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!("ERROR: cannot connect to {}: {e}", settings.network.rpc_url);
            std::process::exit(1);
        }
    };

    let weth_token = settings.network.weth_token;
    let result = if action == "deposit" {
        weth::deposit(&provider, weth_token, amount).await
    } else {
        weth::withdraw(&provider, weth_token, amount).await
    };

    match result {
        Ok(receipt) => {
            let wad = receipt.wad.unwrap_or(amount);
            if action == "deposit" {
                println!("Received {} WETH", format_ether(wad));
            } else {
                println!("Withdrew {} ETH", format_ether(wad));
            }
            println!("  tx: {}", receipt.transaction);
        }
        Err(e) => {
            tracing::error!(error = %e, action, "WETH transaction failed");
            std::process::exit(1);
        }
    }
}
