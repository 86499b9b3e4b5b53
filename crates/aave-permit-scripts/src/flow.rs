//! Supply collateral, borrow DAI, repay it.

use alloy::network::EthereumWallet;
use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;

use aave_permit::pool::{self, UserAccountData};
use aave_permit::price_feed::{borrow_amount, latest_price};
use aave_permit::{
    token, weth, InterestRateMode, Keyring, NetworkConfig, PermitError, PermitSigner,
    ProviderTokenReader,
};

use crate::settings::Settings;

/// Print and return the account's Aave position.
pub async fn account_data<P: Provider>(
    provider: &P,
    network: &NetworkConfig,
    account: Address,
) -> Result<UserAccountData, PermitError> {
    let data = pool::user_account_data(provider, network.pool, account).await?;
    println!("User account data --- Collateral: {} USD", data.collateral_usd());
    println!("User account data --- Debt: {} USD", data.debt_usd());
    println!("User account data --- Borrowable: {} USD", data.borrowable_usd());
    Ok(data)
}

/// Supply `amount` of `asset` as collateral, or the whole balance when `None`.
pub async fn supply_collateral<P: Provider>(
    provider: &P,
    network: &NetworkConfig,
    account: Address,
    asset: Address,
    amount: Option<U256>,
) -> Result<U256, PermitError> {
    let amount = match amount {
        Some(amount) => amount,
        None => token::balance_of(provider, asset, account).await?,
    };
    if amount.is_zero() {
        return Err(PermitError::ConfigError(format!(
            "{account} holds no {asset} to supply"
        )));
    }

    let symbol = token::symbol(provider, asset).await?;
    println!("Supplying the Pool with {amount} {symbol} ... ");
    let receipt = pool::supply(provider, network.pool, asset, amount, account, account).await?;
    let supplied = receipt.amount.unwrap_or(amount);
    println!("Successfully supplied {supplied} {symbol} on behalf of '{account}'");
    Ok(supplied)
}

/// Borrow DAI worth `fraction_bps` of the account's borrowable USD.
pub async fn borrow_dai<P: Provider>(
    provider: &P,
    network: &NetworkConfig,
    account: Address,
    fraction_bps: u32,
    mode: InterestRateMode,
) -> Result<U256, PermitError> {
    let data = account_data(provider, network, account).await?;

    let price = latest_price(provider, network.dai_usd_price_feed).await?;
    println!("The DAI/USD price is at: {price}");

    let decimals = token::decimals(provider, network.dai_token).await?;
    let amount = borrow_amount(data.available_borrows_base, fraction_bps, &price, decimals)?;
    if amount.is_zero() {
        return Err(PermitError::ConfigError(
            "nothing to borrow: no borrowing power".to_string(),
        ));
    }

    println!("Borrowing {amount} DAI ... ");
    let receipt = pool::borrow(provider, network.pool, network.dai_token, amount, mode, account).await?;
    let borrowed = receipt.amount.unwrap_or(amount);

    let after = pool::user_account_data(provider, network.pool, account).await?;
    println!(
        "Successfully borrowed {borrowed} DAI! The total debt is now at {} USD",
        after.debt_usd()
    );
    Ok(borrowed)
}

/// Repay `amount` DAI, either through `repayWithPermit` or approve + repay.
pub async fn repay_dai<P: Provider>(
    provider: &P,
    network: &NetworkConfig,
    signer: &PrivateKeySigner,
    amount: U256,
    settings: &Settings,
) -> Result<U256, PermitError> {
    let account = signer.address();
    let mode = settings.interest_rate_mode;

    let receipt = if settings.use_permit {
        let reader = ProviderTokenReader::new(provider, network);
        let permits = PermitSigner::new(reader, Keyring::from_iter([signer.clone()]));

        let permit = permits
            .create_permit(
                network.dai_token,
                account,
                network.pool,
                amount,
                settings.permit_validity_secs,
            )
            .await?;
        tracing::debug!(permit = %permit.to_json()?, "permit ready");

        pool::repay_with_permit(provider, permits.reader(), network.pool, permit, mode, account).await?
    } else {
        pool::repay(provider, network.pool, network.dai_token, amount, mode, account, account).await?
    };

    let repaid = receipt.amount.unwrap_or(amount);
    println!("Successfully repaid {repaid} DAI!");
    account_data(provider, network, account).await?;
    Ok(repaid)
}

/// Wrap `amount` wei of ETH on forked networks so there is collateral to supply.
pub async fn top_up_weth<P: Provider>(
    provider: &P,
    network: &NetworkConfig,
    amount: U256,
) -> Result<(), PermitError> {
    let receipt = weth::deposit(provider, network.weth_token, amount).await?;
    println!("Received {} WETH!", format_ether(receipt.wad.unwrap_or(amount)));
    Ok(())
}

/// The full supply -> borrow -> repay script.
pub async fn run(settings: &Settings) -> Result<(), PermitError> {
    let network = &settings.network;
    println!("Permit mode: {}", settings.use_permit);

    let signer = settings
        .private_key
        .parse::<PrivateKeySigner>()
        .map_err(|e| PermitError::ConfigError(format!("invalid PRIVATE_KEY: {e}")))?;
    let account = signer.address();

    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer.clone()))
        .connect(&network.rpc_url)
        .await
        .map_err(|e| PermitError::ConfigError(format!("cannot connect to {}: {e}", network.rpc_url)))?;

    tracing::info!(network = %network.name, %account, pool = %network.pool, "starting");
    let data = pool::user_account_data(&provider, network.pool, account).await?;
    println!("The user's Pool data: {data:?}");

    if network.forked {
        top_up_weth(&provider, network, settings.weth_topup).await?;
    }

    supply_collateral(&provider, network, account, network.weth_token, None).await?;
    let borrowed = borrow_dai(
        &provider,
        network,
        account,
        settings.borrow_fraction_bps,
        settings.interest_rate_mode,
    )
    .await?;
    repay_dai(&provider, network, &signer, borrowed, settings).await?;

    println!("Finished!");
    Ok(())
}
