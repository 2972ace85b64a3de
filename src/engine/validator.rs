use crate::Amount;

use super::error::Rejection;

/// Balances a transfer would leave behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Approved {
    pub source: Amount,
    pub destination: Amount,
}

/// Decide whether `amount` may move between two wallets holding `source` and
/// `destination`.
///
/// Approved only when both resulting balances are strictly positive. Zero and
/// negative amounts are accepted as long as that holds, and so are
/// self-transfers: both sides are computed from the same starting balance.
/// Arithmetic overflow counts as a rejection.
pub fn validate(
    source: Amount,
    destination: Amount,
    amount: Amount,
) -> Result<Approved, Rejection> {
    let new_source = source
        .checked_sub(amount)
        .ok_or(Rejection::InsufficientOrInvalid)?;
    let new_destination = destination
        .checked_add(amount)
        .ok_or(Rejection::InsufficientOrInvalid)?;

    if !new_source.is_positive() || !new_destination.is_positive() {
        return Err(Rejection::InsufficientOrInvalid);
    }

    Ok(Approved {
        source: new_source,
        destination: new_destination,
    })
}
