use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Two-tier demurrage fee schedule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemurrageTariff {
    /// Flat fee per turn while the overage is within `early_window`.
    pub early_fee: Decimal,
    /// Flat fee per turn once the overage exceeds `early_window`.
    pub late_fee: Decimal,
    /// Turns past the grace period that are billed at the early fee.
    pub early_window: u32,
}

impl Default for DemurrageTariff {
    fn default() -> Self {
        Self {
            early_fee: Decimal::new(100, 0),
            late_fee: Decimal::new(250, 0),
            early_window: 3,
        }
    }
}

/// Tunable game rules. Every field has a default so scenario files may
/// override only what they need.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    /// Maximum number of simultaneously visible demands.
    pub visible_demand_cap: usize,
    /// Share of the reward paid as early bonus (0.20 = 20%).
    pub early_bonus_frac: Decimal,
    /// Minimum `deadline - turn` at completion that earns the early bonus.
    pub early_bonus_min_turns: u32,
    /// Penalty per turn a demand is completed past its deadline.
    pub late_penalty_per_turn: Decimal,
    pub demurrage: DemurrageTariff,
    /// Faces on the movement die.
    pub dice_sides: u32,
    /// Countdown assigned to new deliveries.
    pub transit_turns: u32,
    /// Delivery cost charged per dispatched cargo unit.
    pub delivery_cost_per_unit: Decimal,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            visible_demand_cap: 2,
            early_bonus_frac: Decimal::new(20, 2),
            early_bonus_min_turns: 2,
            late_penalty_per_turn: Decimal::new(50, 0),
            demurrage: DemurrageTariff::default(),
            dice_sides: 6,
            transit_turns: 3,
            delivery_cost_per_unit: Decimal::ONE,
        }
    }
}
