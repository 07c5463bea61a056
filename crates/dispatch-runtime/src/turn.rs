//! The two per-turn transitions over [`TurnState`].
//!
//! `turn_start` advances the berth queue, reveals demands, lands deliveries
//! and scores completed demands. `turn_end` bills demurrage, releases an
//! emptied ship and reports whether the game is over. Both are total: they
//! never fail. Dangling references and zero countdowns in caller-built
//! state degrade to no-ops; only breaches of the state invariants the
//! transitions themselves maintain are caught, by debug assertions.

use dispatch_core::{
    AppearCondition, CompletedDemand, Delivery, DeliveryId, DemandId, Rules, ShipId, Totals,
    TurnState,
};
use dispatch_econ::{charge_with, score};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// What happened during `turn_start`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnStartReport {
    pub turn: u32,
    pub arrived: Option<ShipId>,
    pub revealed: Vec<DemandId>,
    pub landed: Vec<DeliveryId>,
    pub completed: Vec<DemandId>,
}

/// What happened during `turn_end`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnEndReport {
    pub turn: u32,
    pub demurrage: Decimal,
    pub departed: Option<ShipId>,
    pub game_ended: bool,
}

/// Start a turn, consuming and returning the state.
pub fn turn_start(mut state: TurnState, rules: &Rules) -> (TurnState, TurnStartReport) {
    let report = turn_start_in_place(&mut state, rules);
    (state, report)
}

/// End a turn, consuming and returning the state.
pub fn turn_end(mut state: TurnState, rules: &Rules) -> (TurnState, TurnEndReport) {
    let report = turn_end_in_place(&mut state, rules);
    (state, report)
}

pub fn turn_start_in_place(state: &mut TurnState, rules: &Rules) -> TurnStartReport {
    let before = state.totals.clone();
    state.turn += 1;
    state.arrived_this_turn = None;
    let mut report = TurnStartReport {
        turn: state.turn,
        ..TurnStartReport::default()
    };

    if state.current_ship.is_none() {
        if let Some(mut ship) = state.pending_ships.pop_front() {
            ship.berthing_turn = 0;
            info!(turn = state.turn, ship = %ship.id, cargo = ship.remaining_cargo, "ship berthed");
            state.arrived_this_turn = Some(ship.id.clone());
            report.arrived = Some(ship.id.clone());
            state.current_ship = Some(ship);
        }
    }
    if let Some(ship) = state.current_ship.as_mut() {
        ship.berthing_turn += 1;
    }

    reveal_demands(state, rules, &mut report);
    let landed = count_down_deliveries(state);
    for delivery in &landed {
        apply_delivery(state, delivery);
        report.landed.push(delivery.id);
    }
    sweep_completed(state, rules, &mut report);
    state.unloading_used = 0;

    check_invariants(state, rules, &before);
    report
}

pub fn turn_end_in_place(state: &mut TurnState, rules: &Rules) -> TurnEndReport {
    let before = state.totals.clone();
    let mut report = TurnEndReport {
        turn: state.turn,
        ..TurnEndReport::default()
    };

    match state.current_ship.take() {
        Some(ship) if ship.remaining_cargo > 0 => {
            let fee = charge_with(&rules.demurrage, ship.berthing_turn, ship.free_time);
            if !fee.is_zero() {
                debug!(
                    turn = state.turn,
                    ship = %ship.id,
                    berthing = ship.berthing_turn,
                    %fee,
                    "demurrage"
                );
            }
            state.totals.demurrage += fee;
            report.demurrage = fee;
            state.current_ship = Some(ship);
        }
        Some(ship) => {
            info!(
                turn = state.turn,
                ship = %ship.id,
                berthing = ship.berthing_turn,
                "ship departed"
            );
            report.departed = Some(ship.id.clone());
            state.completed_ships.push(ship);
        }
        None => {}
    }

    report.game_ended = state.is_finished();
    if report.game_ended {
        info!(
            turn = state.turn,
            net = %state.totals.net(),
            "all ships, demands and deliveries settled"
        );
    }
    check_invariants(state, rules, &before);
    report
}

fn is_eligible(state: &TurnState, condition: &AppearCondition) -> bool {
    match condition {
        AppearCondition::Start => state.turn >= 1,
        AppearCondition::FromTurn { turn } => state.turn >= *turn,
        AppearCondition::ShipArrival { ship } => state.ship_has_arrived(ship),
    }
}

fn reveal_demands(state: &mut TurnState, rules: &Rules, report: &mut TurnStartReport) {
    let pending = std::mem::take(&mut state.pending_demands);
    for demand in pending {
        let has_room = state.visible_demands.len() < rules.visible_demand_cap;
        if has_room && is_eligible(state, &demand.condition) {
            debug!(turn = state.turn, demand = %demand.id, "demand revealed");
            report.revealed.push(demand.id.clone());
            state.visible_demands.push(demand);
        } else {
            state.pending_demands.push(demand);
        }
    }
}

/// Tick every active delivery and return those that arrived, moving them to
/// the completed ledger.
fn count_down_deliveries(state: &mut TurnState) -> Vec<Delivery> {
    let (landed, ongoing): (Vec<Delivery>, Vec<Delivery>) =
        std::mem::take(&mut state.active_deliveries)
            .into_iter()
            .map(|mut d| {
                d.remaining_turns = d.remaining_turns.saturating_sub(1);
                d
            })
            .partition(|d| d.remaining_turns == 0);
    state.active_deliveries = ongoing;
    state.completed_deliveries.extend(landed.iter().cloned());
    landed
}

fn apply_delivery(state: &mut TurnState, delivery: &Delivery) {
    let turn = state.turn;
    let Some(demand) = state
        .visible_demands
        .iter_mut()
        .find(|d| d.id == delivery.demand)
    else {
        debug!(turn, delivery = %delivery.id, demand = %delivery.demand, "delivery target gone");
        return;
    };
    let credited = demand.apply(delivery.amount);
    debug!(
        turn,
        delivery = %delivery.id,
        demand = %demand.id,
        credited,
        fulfilled = demand.fulfilled,
        amount = demand.amount,
        "delivery landed"
    );
}

fn sweep_completed(state: &mut TurnState, rules: &Rules, report: &mut TurnStartReport) {
    let (done, open): (Vec<_>, Vec<_>) = std::mem::take(&mut state.visible_demands)
        .into_iter()
        .partition(|d| d.is_fulfilled);
    state.visible_demands = open;

    for demand in done {
        let s = score(rules, demand.reward, demand.deadline, state.turn);
        state.totals.reward += demand.reward;
        state.totals.bonus += s.early_bonus;
        state.totals.penalty += s.penalty;
        info!(
            turn = state.turn,
            demand = %demand.id,
            deadline = demand.deadline,
            reward = %demand.reward,
            bonus = %s.early_bonus,
            penalty = %s.penalty,
            "demand completed"
        );
        report.completed.push(demand.id.clone());
        state.completed_demands.push(CompletedDemand {
            demand,
            completed_at: state.turn,
            early_bonus: s.early_bonus,
            penalty: s.penalty,
        });
    }
}

fn check_invariants(state: &TurnState, rules: &Rules, before: &Totals) {
    if !cfg!(debug_assertions) {
        return;
    }
    let demands = state
        .visible_demands
        .iter()
        .chain(&state.pending_demands)
        .chain(state.completed_demands.iter().map(|c| &c.demand));
    let overfilled = demands
        .filter(|d| d.fulfilled > d.amount)
        .map(|d| d.id.clone())
        .collect::<Vec<_>>();
    debug_assert!(
        overfilled.is_empty(),
        "turn {} overfilled demands {overfilled:?}",
        state.turn
    );
    debug_assert!(
        state.visible_demands.len() <= rules.visible_demand_cap,
        "turn {} shows {} demands over a cap of {}",
        state.turn,
        state.visible_demands.len(),
        rules.visible_demand_cap
    );
    debug_assert!(
        state.totals.dominates(before),
        "turn {} decreased a running total",
        state.turn
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::{CargoKind, Demand, Ship};
    use proptest::prelude::*;

    fn ship(id: &str, cargo: u32, free_time: u32) -> Ship {
        Ship::new(ShipId::new(id), CargoKind::IronOre, cargo, free_time)
    }

    fn demand(id: &str, amount: u32, deadline: u32, condition: AppearCondition) -> Demand {
        Demand::new(
            DemandId::new(id),
            amount,
            deadline,
            Decimal::new(1000, 0),
            condition,
        )
    }

    fn deliver(state: &mut TurnState, demand: &str, amount: u32, turns: u32) -> DeliveryId {
        let id = state.allocate_delivery_id();
        state.active_deliveries.push(Delivery {
            id,
            demand: DemandId::new(demand),
            amount,
            remaining_turns: turns,
        });
        id
    }

    #[test]
    fn first_turn_berths_head_of_queue() {
        let rules = Rules::default();
        let state = TurnState::new(vec![ship("a", 10, 5), ship("b", 10, 5)], vec![]);
        let (state, report) = turn_start(state, &rules);
        assert_eq!(state.turn, 1);
        assert_eq!(report.arrived, Some(ShipId::new("a")));
        let cur = state.current_ship.as_ref().unwrap();
        assert_eq!(cur.id, ShipId::new("a"));
        assert_eq!(cur.berthing_turn, 1);
        assert_eq!(state.pending_ships.len(), 1);
    }

    #[test]
    fn occupied_berth_blocks_promotion() {
        let rules = Rules::default();
        let mut state = TurnState::new(vec![ship("a", 10, 5), ship("b", 10, 5)], vec![]);
        for _ in 0..3 {
            turn_start_in_place(&mut state, &rules);
            turn_end_in_place(&mut state, &rules);
        }
        assert_eq!(state.current_ship.as_ref().unwrap().id, ShipId::new("a"));
        assert_eq!(state.current_ship.as_ref().unwrap().berthing_turn, 3);
        assert_eq!(state.pending_ships.len(), 1);
        assert_eq!(state.arrived_this_turn, None);
    }

    #[test]
    fn emptied_ship_departs_and_next_arrives() {
        let rules = Rules::default();
        let mut state = TurnState::new(vec![ship("a", 10, 5), ship("b", 10, 5)], vec![]);
        turn_start_in_place(&mut state, &rules);
        state.current_ship.as_mut().unwrap().remaining_cargo = 0;
        let end = turn_end_in_place(&mut state, &rules);
        assert_eq!(end.departed, Some(ShipId::new("a")));
        assert!(state.current_ship.is_none());
        assert!(!end.game_ended);

        let start = turn_start_in_place(&mut state, &rules);
        assert_eq!(start.arrived, Some(ShipId::new("b")));
        assert_eq!(state.current_ship.as_ref().unwrap().berthing_turn, 1);
    }

    #[test]
    fn reveal_respects_capacity_and_order() {
        let rules = Rules::default();
        let mut state = TurnState::new(
            vec![],
            vec![
                demand("d1", 10, 20, AppearCondition::Start),
                demand("d2", 10, 20, AppearCondition::FromTurn { turn: 3 }),
                demand("d3", 10, 20, AppearCondition::Start),
                demand("d4", 10, 20, AppearCondition::Start),
            ],
        );
        let r = turn_start_in_place(&mut state, &rules);
        assert_eq!(r.revealed, vec![DemandId::new("d1"), DemandId::new("d3")]);
        let pending: Vec<_> = state.pending_demands.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(pending, vec!["d2", "d4"]);

        // free one slot; d2 is not yet eligible, so d4 takes it
        state.visible_demands.remove(0);
        turn_end_in_place(&mut state, &rules);
        let r = turn_start_in_place(&mut state, &rules);
        assert_eq!(r.revealed, vec![DemandId::new("d4")]);
        assert_eq!(state.pending_demands.len(), 1);
    }

    #[test]
    fn ship_arrival_reveals_on_arrival_turn() {
        let rules = Rules::default();
        let mut state = TurnState::new(
            vec![ship("a", 10, 5), ship("b", 10, 5)],
            vec![demand(
                "after-b",
                10,
                20,
                AppearCondition::ShipArrival {
                    ship: ShipId::new("b"),
                },
            )],
        );
        turn_start_in_place(&mut state, &rules);
        assert!(state.visible_demands.is_empty());
        state.current_ship.as_mut().unwrap().remaining_cargo = 0;
        turn_end_in_place(&mut state, &rules);
        let r = turn_start_in_place(&mut state, &rules);
        assert_eq!(r.arrived, Some(ShipId::new("b")));
        assert_eq!(r.revealed, vec![DemandId::new("after-b")]);
    }

    #[test]
    fn ship_arrival_condition_holds_after_departure() {
        let rules = Rules::default();
        let mut state = TurnState::new(vec![], vec![]);
        state.completed_ships.push(ship("gone", 0, 5));
        state.pending_demands.push(demand(
            "late",
            10,
            20,
            AppearCondition::ShipArrival {
                ship: ShipId::new("gone"),
            },
        ));
        let r = turn_start_in_place(&mut state, &rules);
        assert_eq!(r.revealed, vec![DemandId::new("late")]);
    }

    #[test]
    fn overshooting_deliveries_clamp_and_score_early() {
        let rules = Rules::default();
        let mut state = TurnState::new(vec![], vec![demand("d", 100, 10, AppearCondition::Start)]);
        for _ in 0..3 {
            turn_start_in_place(&mut state, &rules);
            turn_end_in_place(&mut state, &rules);
        }
        assert_eq!(state.turn, 3);
        deliver(&mut state, "d", 60, 3);
        deliver(&mut state, "d", 60, 3);

        turn_start_in_place(&mut state, &rules);
        turn_end_in_place(&mut state, &rules);
        turn_start_in_place(&mut state, &rules);
        assert_eq!(state.visible_demands[0].fulfilled, 0);
        turn_end_in_place(&mut state, &rules);

        let r = turn_start_in_place(&mut state, &rules);
        assert_eq!(state.turn, 6);
        assert_eq!(r.landed.len(), 2);
        assert_eq!(r.completed, vec![DemandId::new("d")]);
        assert!(state.visible_demands.is_empty());
        let done = &state.completed_demands[0];
        assert_eq!(done.demand.fulfilled, 100);
        assert!(done.demand.is_fulfilled);
        assert_eq!(done.completed_at, 6);
        assert_eq!(done.early_bonus, Decimal::new(200, 0));
        assert_eq!(done.penalty, Decimal::ZERO);
        assert_eq!(state.totals.reward, Decimal::new(1000, 0));
        assert_eq!(state.totals.bonus, Decimal::new(200, 0));
        assert_eq!(state.completed_deliveries.len(), 2);

        let end = turn_end_in_place(&mut state, &rules);
        assert!(end.game_ended);
    }

    #[test]
    fn late_completion_is_penalised() {
        let rules = Rules::default();
        let mut state = TurnState::new(vec![], vec![demand("d", 10, 2, AppearCondition::Start)]);
        turn_start_in_place(&mut state, &rules);
        deliver(&mut state, "d", 10, 3);
        turn_end_in_place(&mut state, &rules);
        for _ in 0..3 {
            turn_start_in_place(&mut state, &rules);
            turn_end_in_place(&mut state, &rules);
        }
        assert_eq!(state.turn, 4);
        let done = &state.completed_demands[0];
        assert_eq!(done.completed_at, 4);
        assert_eq!(done.early_bonus, Decimal::ZERO);
        assert_eq!(done.penalty, rules.late_penalty_per_turn * Decimal::from(2));
    }

    #[test]
    fn delivery_to_missing_demand_is_a_no_op() {
        let rules = Rules::default();
        let mut state = TurnState::new(vec![], vec![]);
        state.completed_demands.push(CompletedDemand {
            demand: demand("old", 5, 3, AppearCondition::Start),
            completed_at: 1,
            early_bonus: Decimal::ZERO,
            penalty: Decimal::ZERO,
        });
        deliver(&mut state, "old", 5, 1);
        let r = turn_start_in_place(&mut state, &rules);
        assert_eq!(r.landed.len(), 1);
        assert!(r.completed.is_empty());
        assert_eq!(state.totals, Totals::default());
    }

    #[test]
    fn delivery_to_unknown_demand_lands_without_effect() {
        let rules = Rules::default();
        let mut state = TurnState::new(vec![], vec![demand("d", 10, 9, AppearCondition::Start)]);
        deliver(&mut state, "ghost", 5, 1);
        let r = turn_start_in_place(&mut state, &rules);
        assert_eq!(r.landed.len(), 1);
        assert!(r.completed.is_empty());
        assert_eq!(state.visible_demands[0].fulfilled, 0);
        assert!(state.active_deliveries.is_empty());
        assert_eq!(state.completed_deliveries.len(), 1);
        assert_eq!(state.totals, Totals::default());
        assert!(!turn_end_in_place(&mut state, &rules).game_ended);
    }

    #[test]
    fn zero_countdown_delivery_lands_on_next_start() {
        let rules = Rules::default();
        let mut state = TurnState::new(vec![], vec![demand("d", 10, 9, AppearCondition::Start)]);
        deliver(&mut state, "d", 10, 0);
        let r = turn_start_in_place(&mut state, &rules);
        assert_eq!(r.landed.len(), 1);
        assert_eq!(r.completed, vec![DemandId::new("d")]);
        assert_eq!(state.completed_deliveries[0].remaining_turns, 0);
        assert_eq!(state.completed_demands[0].demand.fulfilled, 10);
    }

    #[test]
    fn demand_gated_on_unknown_ship_stays_pending() {
        let rules = Rules::default();
        let mut state = TurnState::new(
            vec![],
            vec![demand(
                "never",
                10,
                9,
                AppearCondition::ShipArrival {
                    ship: ShipId::new("nobody"),
                },
            )],
        );
        for _ in 0..3 {
            let r = turn_start_in_place(&mut state, &rules);
            assert!(r.revealed.is_empty());
            assert!(!turn_end_in_place(&mut state, &rules).game_ended);
        }
        assert_eq!(state.pending_demands.len(), 1);
    }

    #[test]
    fn duplicate_ids_do_not_stop_the_turn() {
        let rules = Rules::default();
        let mut state = TurnState::new(
            vec![ship("twin", 10, 5), ship("twin", 10, 5)],
            vec![
                demand("same", 10, 9, AppearCondition::Start),
                demand("same", 10, 9, AppearCondition::Start),
            ],
        );
        let r = turn_start_in_place(&mut state, &rules);
        assert_eq!(r.arrived, Some(ShipId::new("twin")));
        assert_eq!(r.revealed.len(), 2);
        turn_end_in_place(&mut state, &rules);
        assert_eq!(state.pending_ships.len(), 1);
    }

    #[test]
    fn demurrage_accrues_every_turn_over_grace() {
        let rules = Rules::default();
        let mut state = TurnState::new(vec![ship("slow", 1_000, 5)], vec![]);
        let mut charged = Vec::new();
        for _ in 1..=12 {
            turn_start_in_place(&mut state, &rules);
            let end = turn_end_in_place(&mut state, &rules);
            assert!(!end.game_ended);
            charged.push(end.demurrage);
        }
        assert_eq!(state.current_ship.as_ref().unwrap().berthing_turn, 12);
        let t = &rules.demurrage;
        assert!(charged[..5].iter().all(|c| c.is_zero()));
        assert!(charged[5..8].iter().all(|c| *c == t.early_fee));
        assert!(charged[8..].iter().all(|c| *c == t.late_fee));
        assert_eq!(
            state.totals.demurrage,
            t.early_fee * Decimal::from(3) + t.late_fee * Decimal::from(4)
        );
    }

    #[test]
    fn game_ends_only_when_everything_is_empty() {
        let rules = Rules::default();
        let (s, _) = turn_start(TurnState::default(), &rules);
        let (_, end) = turn_end(s, &rules);
        assert!(end.game_ended);

        let later = demand("later", 5, 9, AppearCondition::FromTurn { turn: 50 });
        let state = TurnState::new(vec![], vec![later]);
        let (s, _) = turn_start(state, &rules);
        let (_, end) = turn_end(s, &rules);
        assert!(!end.game_ended);
    }

    #[test]
    fn unloading_counter_resets_each_turn() {
        let rules = Rules::default();
        let mut state = TurnState::default();
        state.unloading_used = 40;
        turn_start_in_place(&mut state, &rules);
        assert_eq!(state.unloading_used, 0);
    }

    #[test]
    fn identical_inputs_give_identical_outputs() {
        let rules = Rules::default();
        let mut state = TurnState::new(
            vec![ship("a", 30, 1)],
            vec![demand("d", 20, 4, AppearCondition::Start)],
        );
        turn_start_in_place(&mut state, &rules);
        deliver(&mut state, "d", 15, 2);
        let a = turn_end(turn_start(state.clone(), &rules).0, &rules);
        let b = turn_end(turn_start(state, &rules).0, &rules);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a.0).unwrap(),
            serde_json::to_string(&b.0).unwrap()
        );
    }

    proptest! {
        #[test]
        fn fulfilled_is_monotone_and_capped(
            amount in 1u32..500,
            batches in proptest::collection::vec((1u32..300, 1u32..4), 1..6),
        ) {
            let rules = Rules { visible_demand_cap: 2, ..Rules::default() };
            let mut state =
                TurnState::new(vec![], vec![demand("d", amount, 30, AppearCondition::Start)]);
            turn_start_in_place(&mut state, &rules);
            for (qty, turns) in batches {
                deliver(&mut state, "d", qty, turns);
            }
            let mut last = 0;
            let mut totals = state.totals.clone();
            for _ in 0..6 {
                turn_end_in_place(&mut state, &rules);
                turn_start_in_place(&mut state, &rules);
                let fulfilled = state
                    .visible_demands
                    .first()
                    .map(|d| d.fulfilled)
                    .or_else(|| state.completed_demands.first().map(|c| c.demand.fulfilled))
                    .unwrap_or(0);
                prop_assert!(fulfilled >= last);
                prop_assert!(fulfilled <= amount);
                prop_assert!(state.totals.dominates(&totals));
                last = fulfilled;
                totals = state.totals.clone();
            }
            prop_assert!(state.active_deliveries.is_empty());
            prop_assert!(state.completed_demands.len() <= 1);
        }

        #[test]
        fn ended_iff_all_sets_empty(
            ships in 0usize..3,
            demands in 0usize..3,
            turns in 1u32..8,
        ) {
            let rules = Rules::default();
            let mut state = TurnState::new(
                (0..ships).map(|i| ship(&format!("s{i}"), 0, 2)).collect(),
                (0..demands)
                    .map(|i| demand(&format!("d{i}"), 5, 10, AppearCondition::FromTurn { turn: 4 }))
                    .collect(),
            );
            for _ in 0..turns {
                turn_start_in_place(&mut state, &rules);
                let end = turn_end_in_place(&mut state, &rules);
                let empty = state.current_ship.is_none()
                    && state.pending_ships.is_empty()
                    && state.pending_demands.is_empty()
                    && state.visible_demands.is_empty()
                    && state.active_deliveries.is_empty();
                prop_assert_eq!(end.game_ended, empty);
            }
        }
    }
}
