//! Client-side planning of open and close calls.
//!
//! Routes are quoted for the vault address itself, because the vault is the
//! account that holds the input and receives the output during execution.

use super::{RouteError, RouteRequest, RouteSource};
use crate::domain::{Address, Amount, PermitDomain, SwapInstruction, Timestamp};
use crate::protocol::{OpenPosition, OpenPositionWithPermit, PositionView};
use crate::token::Signer;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What the user wants to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPlan {
    pub owner: Address,
    pub collateral_asset: Address,
    pub debt_asset: Address,
    pub deposit: Amount,
    pub borrow: Amount,
    pub slippage_bps: u32,
}

/// A partial close ready to submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosePartialPlan {
    pub repay_amount: Amount,
    pub withdraw_amount: Amount,
    pub swap: SwapInstruction,
}

fn target_for(plan: &OpenPlan) -> Result<Amount, RouteError> {
    plan.borrow
        .less_bps(plan.slippage_bps)
        .ok_or_else(|| RouteError::InvalidPlan("slippage above 100%".to_string()))
}

/// Quote the borrowed amount into collateral for `vault`, the factory's next
/// address, and build the open request.
pub async fn plan_open<S: RouteSource + ?Sized>(
    source: &S,
    vault: Address,
    plan: &OpenPlan,
) -> Result<OpenPosition, RouteError> {
    if plan.deposit.is_zero() || plan.borrow.is_zero() {
        return Err(RouteError::InvalidPlan(
            "deposit and borrow must be positive".to_string(),
        ));
    }
    let route = source
        .route(&RouteRequest {
            from_asset: plan.debt_asset,
            to_asset: plan.collateral_asset,
            amount: plan.borrow,
            from_address: vault,
            slippage_bps: plan.slippage_bps,
        })
        .await?;
    let target_collateral = target_for(plan)?;
    debug!(%vault, quoted = %route.quoted_out, %target_collateral, "open planned");

    Ok(OpenPosition {
        owner: plan.owner,
        collateral_asset: plan.collateral_asset,
        debt_asset: plan.debt_asset,
        deposit_amount: plan.deposit,
        target_collateral,
        borrow_amount: plan.borrow,
        swap: route.instruction,
        expected_vault: Some(vault),
    })
}

/// Same as [`plan_open`], funded by a permit `signer` grants to `vault`.
pub async fn plan_open_with_permit<S: RouteSource + ?Sized>(
    source: &S,
    signer: &Signer,
    domain: &PermitDomain,
    permit_nonce: u64,
    deadline: Timestamp,
    vault: Address,
    plan: &OpenPlan,
) -> Result<OpenPositionWithPermit, RouteError> {
    if domain.verifying_token != plan.collateral_asset {
        return Err(RouteError::InvalidPlan(
            "permit domain is not the collateral token".to_string(),
        ));
    }
    let open = plan_open(source, vault, plan).await?;
    let permit = signer.sign_permit(domain, vault, plan.deposit, permit_nonce, deadline);
    Ok(OpenPositionWithPermit {
        collateral_asset: open.collateral_asset,
        debt_asset: open.debt_asset,
        target_collateral: open.target_collateral,
        borrow_amount: open.borrow_amount,
        swap: open.swap,
        permit,
    })
}

/// Swap `swap_collateral` of the position's collateral into the debt asset
/// and repay what the route guarantees.
pub async fn plan_close_partial<S: RouteSource + ?Sized>(
    source: &S,
    position: &PositionView,
    swap_collateral: Amount,
    slippage_bps: u32,
) -> Result<ClosePartialPlan, RouteError> {
    if swap_collateral > position.collateral_balance {
        return Err(RouteError::InvalidPlan(format!(
            "cannot swap {} of {} collateral",
            swap_collateral, position.collateral_balance
        )));
    }
    let route = source
        .route(&RouteRequest {
            from_asset: position.collateral_asset,
            to_asset: position.debt_asset,
            amount: swap_collateral,
            from_address: position.vault,
            slippage_bps,
        })
        .await?;
    let repay_amount = route.instruction.min_amount_out.min(position.debt_balance);
    Ok(ClosePartialPlan {
        repay_amount,
        withdraw_amount: Amount::ZERO,
        swap: route.instruction,
    })
}

/// Size a collateral-to-debt swap that covers the position's current debt
/// plus a slippage buffer.
///
/// A first quote for the debt amount gives the rate; the real route is then
/// quoted for `debt / rate` grown by `slippage_bps`, capped at the available
/// collateral. The instruction demands at least the full debt.
pub async fn plan_close_full<S: RouteSource + ?Sized>(
    source: &S,
    position: &PositionView,
    slippage_bps: u32,
) -> Result<SwapInstruction, RouteError> {
    let debt = position.debt_balance;
    if debt.is_zero() {
        return Ok(SwapInstruction::new(Vec::new(), Amount::ZERO, Amount::ZERO));
    }

    let request = RouteRequest {
        from_asset: position.collateral_asset,
        to_asset: position.debt_asset,
        amount: debt,
        from_address: position.vault,
        slippage_bps,
    };
    let sample = source.route(&request).await?;
    if sample.quoted_out.is_zero() {
        return Err(RouteError::NoRoute {
            from: request.from_asset,
            to: request.to_asset,
        });
    }
    let rate = sample
        .quoted_out
        .inner()
        .checked_div(debt.inner())
        .ok_or_else(|| RouteError::InvalidPlan("quote rate overflow".to_string()))?;
    let needed = debt
        .checked_div(rate)
        .and_then(|n| n.plus_bps(slippage_bps))
        .ok_or_else(|| RouteError::InvalidPlan("amount overflow".to_string()))?
        .min(position.collateral_balance);

    let route = source
        .route(&RouteRequest {
            amount: needed,
            ..request
        })
        .await?;
    if route.quoted_out < debt {
        return Err(RouteError::InsufficientQuote {
            quoted: route.quoted_out,
            required: debt,
        });
    }
    debug!(vault = %position.vault, %debt, swap_in = %needed, "close planned");
    Ok(route.instruction.with_min_amount_out(debt))
}
