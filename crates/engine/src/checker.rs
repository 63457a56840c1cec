// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effect checker
//!
//! Decides whether a persisted effect has come true. Checking only reads
//! through the context, so it is idempotent and safe to repeat after a
//! restart.

use crate::context::ExecutionContext;
use crate::error::EffectCheckError;
use aq_adapters::TxStatus;
use aq_core::{Condition, Effect, EffectStatus};

/// Check `effect` against the world as seen through `ctx`
///
/// A condition that is still pending, or that could not be read, becomes
/// `Failed` once the effect's deadline has passed.
pub async fn check<C>(ctx: &C, effect: &Effect) -> EffectStatus
where
    C: ExecutionContext + ?Sized,
{
    let status = match check_condition(ctx, &effect.condition).await {
        Ok(status) => status,
        Err(e) => {
            tracing::debug!(condition = effect.condition.name(), error = %e, "check read failed");
            EffectStatus::Pending
        }
    };

    match status {
        EffectStatus::Pending if effect.is_expired(ctx.now_ms()) => {
            EffectStatus::failed(format!("{} timed out", effect.condition.name()))
        }
        status => status,
    }
}

async fn check_condition<C>(
    ctx: &C,
    condition: &Condition,
) -> Result<EffectStatus, EffectCheckError>
where
    C: ExecutionContext + ?Sized,
{
    let mut atoms = Vec::new();
    flatten(condition, &mut atoms);

    let mut all_satisfied = true;
    let mut first_error = None;
    for atom in atoms {
        match check_atom(ctx, atom).await {
            Ok(EffectStatus::Satisfied) => {}
            Ok(EffectStatus::Pending) => all_satisfied = false,
            Ok(failed @ EffectStatus::Failed { .. }) => return Ok(failed),
            Err(e) => {
                all_satisfied = false;
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None if all_satisfied => Ok(EffectStatus::Satisfied),
        None => Ok(EffectStatus::Pending),
    }
}

/// Nested `all` conditions are equivalent to one flat conjunction
fn flatten<'a>(condition: &'a Condition, out: &mut Vec<&'a Condition>) {
    match condition {
        Condition::All { conditions } => {
            for condition in conditions {
                flatten(condition, out);
            }
        }
        atom => out.push(atom),
    }
}

async fn check_atom<C>(ctx: &C, condition: &Condition) -> Result<EffectStatus, EffectCheckError>
where
    C: ExecutionContext + ?Sized,
{
    let satisfied = match condition {
        Condition::TxConfirmation {
            wallet_id,
            tx_id,
            confirmations,
        } => match ctx.tx_status(wallet_id, tx_id).await? {
            TxStatus::Unknown => false,
            TxStatus::Confirming { confirmations: depth } => depth >= *confirmations,
            TxStatus::Rejected { reason } => {
                return Ok(EffectStatus::failed(format!("tx {} rejected: {}", tx_id, reason)));
            }
        },
        Condition::AddressBalance {
            wallet_id,
            token_id,
            above,
            below,
        } => {
            let balance = ctx.balance(wallet_id, token_id.as_deref()).await?;
            within_bounds(balance, *above, *below)
        }
        Condition::PriceLevel { pair, above, below } => {
            let rate = ctx.exchange_rate(pair).await?;
            within_bounds(rate, *above, *below)
        }
        Condition::UnixTime { timestamp_ms } => ctx.now_ms() >= *timestamp_ms,
        Condition::All { .. } => false,
    };

    Ok(if satisfied {
        EffectStatus::Satisfied
    } else {
        EffectStatus::Pending
    })
}

/// True when `value` is strictly above `above` and strictly below `below`,
/// ignoring whichever bound is absent
pub(crate) fn within_bounds<T: PartialOrd>(value: T, above: Option<T>, below: Option<T>) -> bool {
    above.is_none_or(|bound| value > bound) && below.is_none_or(|bound| value < bound)
}

#[cfg(test)]
#[path = "checker_tests.rs"]
mod tests;
