#![deny(warnings)]

//! Headless CLI: plays a dispatch scenario with the autopilot and prints KPIs.

use anyhow::{Context, Result};
use dispatch_runtime::autoplay;
use dispatch_scenario::Scenario;
use tracing::info;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    scenario: Option<String>,
    turns: Option<u32>,
    seed: Option<u64>,
    save: Option<String>,
    load: Option<String>,
    json: bool,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--scenario" => args.scenario = it.next(),
            "--turns" => args.turns = it.next().and_then(|s| s.parse().ok()),
            "--seed" => args.seed = it.next().and_then(|s| s.parse().ok()),
            "--save" => args.save = it.next(),
            "--load" => args.load = it.next(),
            "--json" => args.json = true,
            _ => {}
        }
    }
    args
}

/// `RUST_LOG` if set, otherwise `info`.
fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn subscriber(filter: EnvFilter) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt().with_env_filter(filter).finish()
}

fn main() -> Result<()> {
    subscriber(log_filter()).init();

    let args = parse_args();
    info!(?args, "starting CLI");

    let mut scenario = match &args.scenario {
        Some(path) => Scenario::load(path).with_context(|| format!("loading scenario {path}"))?,
        None => Scenario::pilbara()?,
    };
    if let Some(seed) = args.seed {
        scenario.seed = seed;
    }

    let save_dir = persistence::default_save_dir();
    let mut session = match &args.load {
        Some(slot) => persistence::load(save_dir, slot, &scenario)
            .with_context(|| format!("loading save slot {slot}"))?,
        None => scenario.session()?,
    };

    let summary = autoplay(&mut session, args.turns.unwrap_or(100))?;

    if let Some(slot) = &args.save {
        let path = persistence::save(save_dir, slot, &scenario, &session)?;
        println!("Saved to {}", path.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let snap = &summary.snapshot;
    println!(
        "Scenario OK | {} | ports: {} | routes: {} | ships: {} | demands: {}",
        scenario.name,
        scenario.ports.len(),
        scenario.routes.len(),
        scenario.ships.len(),
        scenario.demands.len()
    );
    println!(
        "KPI | turns: {} | ended: {} | completed: {} | reward: {} | bonus: {} | penalty: {} \
         | demurrage: {} | delivery: {} | net: {}",
        summary.turns_played,
        summary.ended,
        snap.completed_demands,
        snap.totals.reward,
        snap.totals.bonus,
        snap.totals.penalty,
        snap.totals.demurrage,
        snap.totals.delivery_cost,
        snap.net
    );

    Ok(())
}
