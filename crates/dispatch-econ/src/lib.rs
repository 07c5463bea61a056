#![deny(warnings)]

//! Billing and scoring helpers for bulk dispatch.
//!
//! This crate provides pure, total functions for:
//! - Two-tier demurrage charged per turn a ship overstays its grace period
//! - Early-completion bonus and late-completion penalty for demands

use dispatch_core::{DemurrageTariff, Rules};
use rust_decimal::Decimal;

/// Demurrage for one turn at the default tariff.
///
/// Zero while `berthing_turn <= free_time`; the early fee for an overage of
/// one to three turns; the late fee beyond that. A step function, not
/// proportional to the overage.
///
/// Example:
/// assert_eq!(charge(5, 5), Decimal::ZERO);
/// assert_eq!(charge(7, 5), DemurrageTariff::default().early_fee);
/// assert_eq!(charge(10, 5), DemurrageTariff::default().late_fee);
pub fn charge(berthing_turn: u32, free_time: u32) -> Decimal {
    charge_with(&DemurrageTariff::default(), berthing_turn, free_time)
}

/// Demurrage for one turn under an explicit tariff.
pub fn charge_with(tariff: &DemurrageTariff, berthing_turn: u32, free_time: u32) -> Decimal {
    if berthing_turn <= free_time {
        return Decimal::ZERO;
    }
    let overage = berthing_turn - free_time;
    if overage <= tariff.early_window {
        tariff.early_fee
    } else {
        tariff.late_fee
    }
}

/// Bonus and penalty awarded when a demand completes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Score {
    pub early_bonus: Decimal,
    pub penalty: Decimal,
}

/// Score a demand completed at `turn`.
///
/// The early bonus is `early_bonus_frac * reward` when at least
/// `early_bonus_min_turns` remain before the deadline. The penalty is
/// `(turn - deadline) * late_penalty_per_turn` when completed past the
/// deadline. At most one of the two is non-zero.
///
/// Example:
/// let s = score(&Rules::default(), Decimal::new(1000, 0), 10, 6);
/// assert_eq!(s.early_bonus, Decimal::new(200, 0));
pub fn score(rules: &Rules, reward: Decimal, deadline: u32, turn: u32) -> Score {
    let turns_remaining = i64::from(deadline) - i64::from(turn);
    let early_bonus = if turns_remaining >= i64::from(rules.early_bonus_min_turns) {
        reward * rules.early_bonus_frac
    } else {
        Decimal::ZERO
    };
    let penalty = if turn > deadline {
        Decimal::from(turn - deadline) * rules.late_penalty_per_turn
    } else {
        Decimal::ZERO
    };
    Score {
        early_bonus,
        penalty,
    }
}
