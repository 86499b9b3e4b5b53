//! Aave V3 pool operations.
//!
//! Classic flows approve first and then call the pool. Permit flows take a
//! [`SignedPermit`] by value, check it against the latest block and the
//! owner's current nonce, and submit it in the same transaction as the pool
//! call. The transaction must be sent by the permit's owner: the pool uses
//! `msg.sender` as the permit owner.

use alloy::eips::BlockNumberOrTag;
use alloy::primitives::utils::format_units;
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionReceipt;
use serde::{Deserialize, Serialize};

use crate::permit::SignedPermit;
use crate::token::{self, TokenReader};
use crate::tx::{confirm, decode_event, mine};
use crate::{IPool, PermitError, REFERRAL_CODE, USD_DECIMALS};

/// Aave debt interest-rate mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterestRateMode {
    /// Only offered on a few mainnet markets.
    Stable,
    Variable,
}

impl InterestRateMode {
    pub fn as_u256(self) -> U256 {
        match self {
            InterestRateMode::Stable => U256::from(1u64),
            InterestRateMode::Variable => U256::from(2u64),
        }
    }
}

impl TryFrom<u8> for InterestRateMode {
    type Error = PermitError;

    fn try_from(mode: u8) -> Result<Self, Self::Error> {
        match mode {
            1 => Ok(InterestRateMode::Stable),
            2 => Ok(InterestRateMode::Variable),
            other => Err(PermitError::ConfigError(format!(
                "interest rate mode must be 1 (stable) or 2 (variable), got {other}"
            ))),
        }
    }
}

/// `getUserAccountData` result. Base amounts are USD with 8 decimals,
/// LTV and liquidation threshold are basis points, health factor is WAD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccountData {
    pub total_collateral_base: U256,
    pub total_debt_base: U256,
    pub available_borrows_base: U256,
    pub current_liquidation_threshold: U256,
    pub ltv: U256,
    pub health_factor: U256,
}

impl UserAccountData {
    pub fn collateral_usd(&self) -> String {
        usd(self.total_collateral_base)
    }

    pub fn debt_usd(&self) -> String {
        usd(self.total_debt_base)
    }

    pub fn borrowable_usd(&self) -> String {
        usd(self.available_borrows_base)
    }
}

fn usd(base: U256) -> String {
    format_units(base, USD_DECIMALS).unwrap_or_else(|_| base.to_string())
}

/// Outcome of a confirmed pool transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolReceipt {
    pub transaction: TxHash,
    /// Amount reported by the pool event (`Supply`, `Borrow` or `Repay`).
    pub amount: Option<U256>,
}

pub async fn user_account_data<P: Provider>(
    provider: &P,
    pool: Address,
    user: Address,
) -> Result<UserAccountData, PermitError> {
    let contract = IPool::new(pool, provider);
    let data = contract
        .getUserAccountData(user)
        .call()
        .await
        .map_err(|e| PermitError::ChainError(format!("getUserAccountData failed: {e}")))?;

    Ok(UserAccountData {
        total_collateral_base: data.totalCollateralBase,
        total_debt_base: data.totalDebtBase,
        available_borrows_base: data.availableBorrowsBase,
        current_liquidation_threshold: data.currentLiquidationThreshold,
        ltv: data.ltv,
        health_factor: data.healthFactor,
    })
}

/// Supply `amount` of `asset` on behalf of `on_behalf_of`, approving the
/// pool first when `owner`'s allowance falls short.
pub async fn supply<P: Provider>(
    provider: &P,
    pool: Address,
    asset: Address,
    amount: U256,
    owner: Address,
    on_behalf_of: Address,
) -> Result<PoolReceipt, PermitError> {
    token::ensure_allowance(provider, asset, owner, pool, amount).await?;

    let contract = IPool::new(pool, provider);
    let call = contract.supply(asset, amount, on_behalf_of, REFERRAL_CODE);
    let receipt = confirm("supply", call.send()).await?;
    let amount = decode_event::<IPool::Supply>(&receipt).map(|e| e.amount);

    tracing::info!(%asset, ?amount, %on_behalf_of, tx = %receipt.transaction_hash, "supplied");
    Ok(PoolReceipt {
        transaction: receipt.transaction_hash,
        amount,
    })
}

pub async fn borrow<P: Provider>(
    provider: &P,
    pool: Address,
    asset: Address,
    amount: U256,
    mode: InterestRateMode,
    on_behalf_of: Address,
) -> Result<PoolReceipt, PermitError> {
    let contract = IPool::new(pool, provider);
    let call = contract.borrow(asset, amount, mode.as_u256(), REFERRAL_CODE, on_behalf_of);
    let receipt = confirm("borrow", call.send()).await?;
    let amount = decode_event::<IPool::Borrow>(&receipt).map(|e| e.amount);

    tracing::info!(%asset, ?amount, ?mode, tx = %receipt.transaction_hash, "borrowed");
    Ok(PoolReceipt {
        transaction: receipt.transaction_hash,
        amount,
    })
}

/// Repay from `owner`'s balance, approving the pool first when needed.
/// `U256::MAX` repays the whole debt; approve at least the outstanding
/// amount in that case.
pub async fn repay<P: Provider>(
    provider: &P,
    pool: Address,
    asset: Address,
    amount: U256,
    mode: InterestRateMode,
    owner: Address,
    on_behalf_of: Address,
) -> Result<PoolReceipt, PermitError> {
    token::ensure_allowance(provider, asset, owner, pool, amount).await?;

    let contract = IPool::new(pool, provider);
    let call = contract.repay(asset, amount, mode.as_u256(), on_behalf_of);
    let receipt = confirm("repay", call.send()).await?;
    let amount = decode_event::<IPool::Repay>(&receipt).map(|e| e.amount);

    tracing::info!(%asset, ?amount, tx = %receipt.transaction_hash, "repaid");
    Ok(PoolReceipt {
        transaction: receipt.transaction_hash,
        amount,
    })
}

/// Repay `permit.message.value` of the permit's token using the permit
/// instead of a prior approval.
pub async fn repay_with_permit<P, R>(
    provider: &P,
    reader: &R,
    pool: Address,
    permit: SignedPermit,
    mode: InterestRateMode,
    on_behalf_of: Address,
) -> Result<PoolReceipt, PermitError>
where
    P: Provider,
    R: TokenReader,
{
    preflight(provider, reader, pool, &permit).await?;

    let asset = permit.token;
    let amount = permit.message.value;
    let sig = permit.signature();
    let deadline = permit.deadline();

    let contract = IPool::new(pool, provider);
    let call = contract.repayWithPermit(
        asset,
        amount,
        mode.as_u256(),
        on_behalf_of,
        U256::from(deadline),
        sig.v,
        sig.r,
        sig.s,
    );
    let receipt = mine("repayWithPermit", call.send()).await?;
    if !receipt.status() {
        return Err(permit_revert(provider, reader, &permit, &receipt, "repayWithPermit").await);
    }
    let amount = decode_event::<IPool::Repay>(&receipt).map(|e| e.amount);

    tracing::info!(%asset, ?amount, deadline, tx = %receipt.transaction_hash, "repaid with permit");
    Ok(PoolReceipt {
        transaction: receipt.transaction_hash,
        amount,
    })
}

/// Supply `permit.message.value` of the permit's token without a prior approval.
pub async fn supply_with_permit<P, R>(
    provider: &P,
    reader: &R,
    pool: Address,
    permit: SignedPermit,
    on_behalf_of: Address,
) -> Result<PoolReceipt, PermitError>
where
    P: Provider,
    R: TokenReader,
{
    preflight(provider, reader, pool, &permit).await?;

    let asset = permit.token;
    let amount = permit.message.value;
    let sig = permit.signature();
    let deadline = permit.deadline();

    let contract = IPool::new(pool, provider);
    let call = contract.supplyWithPermit(
        asset,
        amount,
        on_behalf_of,
        REFERRAL_CODE,
        U256::from(deadline),
        sig.v,
        sig.r,
        sig.s,
    );
    let receipt = mine("supplyWithPermit", call.send()).await?;
    if !receipt.status() {
        return Err(permit_revert(provider, reader, &permit, &receipt, "supplyWithPermit").await);
    }
    let amount = decode_event::<IPool::Supply>(&receipt).map(|e| e.amount);

    tracing::info!(%asset, ?amount, deadline, tx = %receipt.transaction_hash, "supplied with permit");
    Ok(PoolReceipt {
        transaction: receipt.transaction_hash,
        amount,
    })
}

/// Timestamp of the latest block.
pub async fn latest_block_timestamp<P: Provider>(provider: &P) -> Result<u64, PermitError> {
    block_timestamp(provider, BlockNumberOrTag::Latest).await
}

async fn block_timestamp<P: Provider>(
    provider: &P,
    block: BlockNumberOrTag,
) -> Result<u64, PermitError> {
    let block = provider
        .get_block_by_number(block)
        .await
        .map_err(|e| PermitError::ChainError(format!("block {block} failed: {e}")))?
        .ok_or_else(|| PermitError::ChainError(format!("block {block} not found")))?;
    Ok(block.header.timestamp)
}

async fn preflight<P, R>(
    provider: &P,
    reader: &R,
    pool: Address,
    permit: &SignedPermit,
) -> Result<(), PermitError>
where
    P: Provider,
    R: TokenReader,
{
    let chain_time = latest_block_timestamp(provider).await?;
    check_submission(reader, pool, permit, chain_time).await
}

/// Reject permits that cannot succeed: wrong spender, expired at
/// `chain_time`, or signed over a nonce the owner has already used.
async fn check_submission<R: TokenReader>(
    reader: &R,
    pool: Address,
    permit: &SignedPermit,
    chain_time: u64,
) -> Result<(), PermitError> {
    if permit.message.spender != pool {
        return Err(PermitError::ConfigError(format!(
            "permit spender {} is not the pool {pool}",
            permit.message.spender
        )));
    }

    let current_nonce = reader.nonce(permit.token, permit.message.owner).await?;

    if let Err(e) = permit.ensure_submittable(chain_time, current_nonce) {
        tracing::warn!(
            owner = %permit.message.owner,
            token = %permit.token,
            error = %e,
            "permit rejected before submission"
        );
        return Err(e);
    }
    Ok(())
}

/// Explain a reverted permit transaction. A permit that expired by the time
/// its block was mined, or whose nonce was spent meanwhile, maps to
/// `PermitExpired` / `PermitInvalidated`; anything else stays a chain error.
async fn permit_revert<P, R>(
    provider: &P,
    reader: &R,
    permit: &SignedPermit,
    receipt: &TransactionReceipt,
    label: &str,
) -> PermitError
where
    P: Provider,
    R: TokenReader,
{
    let mined_at = match receipt.block_number {
        Some(number) => block_timestamp(provider, BlockNumberOrTag::Number(number)).await,
        None => latest_block_timestamp(provider).await,
    };
    let current_nonce = reader.nonce(permit.token, permit.message.owner).await;
    classify_revert(permit, mined_at, current_nonce, label)
}

fn classify_revert(
    permit: &SignedPermit,
    mined_at: Result<u64, PermitError>,
    current_nonce: Result<U256, PermitError>,
    label: &str,
) -> PermitError {
    if let Ok(chain_time) = mined_at {
        if chain_time >= permit.deadline() {
            return PermitError::PermitExpired {
                deadline: permit.deadline(),
                chain_time,
            };
        }
    }
    if let Ok(current) = current_nonce {
        if current != permit.message.nonce {
            return PermitError::PermitInvalidated {
                signed: permit.message.nonce,
                current,
            };
        }
    }
    tracing::warn!(owner = %permit.message.owner, token = %permit.token, "{label} reverted with a usable permit");
    PermitError::ChainError(format!("{label} reverted"))
}
