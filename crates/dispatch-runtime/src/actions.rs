//! Player actions applied between `turn_start` and `turn_end`.

use dispatch_core::{Delivery, DeliveryId, DemandId, TurnState};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum ActionError {
    #[error("no ship is at the berth")]
    BerthEmpty,
    #[error("demand {0} is not on the board")]
    DemandNotVisible(DemandId),
    #[error("demand {0} is already fulfilled")]
    DemandFulfilled(DemandId),
    #[error("dispatch amount must be positive")]
    ZeroAmount,
    #[error("transit must take at least one turn")]
    ZeroTransit,
    #[error("yard holds {available} units, {requested} requested")]
    InsufficientStock { available: u32, requested: u32 },
    #[error("delivery cost must not be negative")]
    NegativeCost,
}

/// Unload up to `amount` from the berthed ship into the yard.
///
/// The amount is clamped to the cargo left aboard and to what the berth can
/// still handle this turn (`throughput - unloading_used`). Returns the
/// amount moved, which may be zero.
pub fn unload(state: &mut TurnState, amount: u32, throughput: u32) -> Result<u32, ActionError> {
    let spare = throughput.saturating_sub(state.unloading_used);
    let ship = state.current_ship.as_mut().ok_or(ActionError::BerthEmpty)?;
    let moved = amount.min(ship.remaining_cargo).min(spare);
    ship.remaining_cargo -= moved;
    state.unloading_used += moved;
    state.yard_stock += moved;
    debug!(
        turn = state.turn,
        ship = %ship.id,
        moved,
        aboard = ship.remaining_cargo,
        "unloaded"
    );
    Ok(moved)
}

/// Commit yard stock to a visible demand as a new delivery.
pub fn dispatch(
    state: &mut TurnState,
    demand: &DemandId,
    amount: u32,
    transit_turns: u32,
    cost: Decimal,
) -> Result<DeliveryId, ActionError> {
    if amount == 0 {
        return Err(ActionError::ZeroAmount);
    }
    if transit_turns == 0 {
        return Err(ActionError::ZeroTransit);
    }
    if cost < Decimal::ZERO {
        return Err(ActionError::NegativeCost);
    }
    let target = state
        .visible_demand(demand)
        .ok_or_else(|| ActionError::DemandNotVisible(demand.clone()))?;
    if target.is_fulfilled {
        return Err(ActionError::DemandFulfilled(demand.clone()));
    }
    if state.yard_stock < amount {
        return Err(ActionError::InsufficientStock {
            available: state.yard_stock,
            requested: amount,
        });
    }

    state.yard_stock -= amount;
    state.totals.delivery_cost += cost;
    let id = state.allocate_delivery_id();
    state.active_deliveries.push(Delivery {
        id,
        demand: demand.clone(),
        amount,
        remaining_turns: transit_turns,
    });
    debug!(
        turn = state.turn,
        delivery = %id,
        demand = %demand,
        amount,
        transit_turns,
        "dispatched"
    );
    Ok(id)
}

/// Cargo already travelling toward `demand`.
pub fn in_transit(state: &TurnState, demand: &DemandId) -> u32 {
    state
        .active_deliveries
        .iter()
        .filter(|d| &d.demand == demand)
        .map(|d| d.amount)
        .sum()
}
