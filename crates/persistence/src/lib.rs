#![deny(warnings)]

//! Persistence layer: JSON save games with reference checks on load.
//!
//! A save holds the full [`SessionParts`] plus the name of the scenario it
//! was played on. Loading re-resolves every identifier against the current
//! scenario data; there is no migration between scenario revisions.

use dispatch_core::{validate_state, DemandId, ShipId};
use dispatch_runtime::{Session, SessionError, SessionParts};
use dispatch_scenario::{Scenario, ScenarioError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error: {0}")]
    Io(String),
    #[error("malformed save: {0}")]
    Json(String),
    #[error("save belongs to scenario {found:?}, not {expected:?}")]
    ScenarioMismatch { expected: String, found: String },
    #[error("save references ship {0} which the scenario does not define")]
    UnknownShip(ShipId),
    #[error("save references demand {0} which the scenario does not define")]
    UnknownDemand(DemandId),
    #[error("saved state is inconsistent: {0}")]
    Invalid(#[from] dispatch_core::ValidationError),
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl From<std::io::Error> for PersistError {
    fn from(e: std::io::Error) -> Self {
        PersistError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(e: serde_json::Error) -> Self {
        PersistError::Json(e.to_string())
    }
}

/// Serialized form of a game in progress.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaveGame {
    pub scenario: String,
    pub slot: String,
    pub parts: SessionParts,
}

/// Returns the default directory used for local saves.
pub fn default_save_dir() -> &'static str {
    "./saves"
}

fn slot_path(dir: &Path, slot: &str) -> PathBuf {
    dir.join(format!("{slot}.json"))
}

pub fn encode(save: &SaveGame) -> Result<String, PersistError> {
    Ok(serde_json::to_string_pretty(save)?)
}

pub fn decode(text: &str) -> Result<SaveGame, PersistError> {
    Ok(serde_json::from_str(text)?)
}

/// Write the session to `<dir>/<slot>.json`, creating `dir` if needed.
pub fn save<P: AsRef<Path>>(
    dir: P,
    slot: &str,
    scenario: &Scenario,
    session: &Session,
) -> Result<PathBuf, PersistError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let path = slot_path(dir, slot);
    let record = SaveGame {
        scenario: scenario.name.clone(),
        slot: slot.to_string(),
        parts: session.parts().clone(),
    };
    fs::write(&path, encode(&record)?)?;
    info!(path = %path.display(), turn = record.parts.state.turn, "game saved");
    Ok(path)
}

/// Read `<dir>/<slot>.json` and resume it against `scenario`.
pub fn load<P: AsRef<Path>>(
    dir: P,
    slot: &str,
    scenario: &Scenario,
) -> Result<Session, PersistError> {
    let path = slot_path(dir.as_ref(), slot);
    let record = decode(&fs::read_to_string(&path)?)?;
    let session = resume(record, scenario)?;
    info!(path = %path.display(), turn = session.state().turn, "game loaded");
    Ok(session)
}

/// Validate a decoded save against the scenario and rebuild the session.
pub fn resume(record: SaveGame, scenario: &Scenario) -> Result<Session, PersistError> {
    if record.scenario != scenario.name {
        return Err(PersistError::ScenarioMismatch {
            expected: scenario.name.clone(),
            found: record.scenario,
        });
    }
    check_references(&record.parts, scenario)?;
    let graph = Arc::new(scenario.build_graph()?);
    Ok(Session::restore(graph, scenario.rules.clone(), record.parts)?)
}

fn check_references(parts: &SessionParts, scenario: &Scenario) -> Result<(), PersistError> {
    let state = &parts.state;
    validate_state(state, &scenario.rules)?;

    let ships: BTreeSet<&ShipId> = scenario.ships.iter().map(|s| &s.id).collect();
    if let Some(ship) = state.all_ships().find(|s| !ships.contains(&s.id)) {
        return Err(PersistError::UnknownShip(ship.id.clone()));
    }

    let demands: BTreeSet<&DemandId> = scenario.demands.iter().map(|d| &d.id).collect();
    let saved = state
        .visible_demands
        .iter()
        .chain(&state.pending_demands)
        .chain(state.completed_demands.iter().map(|c| &c.demand));
    for d in saved {
        if !demands.contains(&d.id) {
            return Err(PersistError::UnknownDemand(d.id.clone()));
        }
    }
    Ok(())
}

/// Save slots found in `dir`, sorted by name.
pub fn list_slots<P: AsRef<Path>>(dir: P) -> Result<Vec<String>, PersistError> {
    let mut slots = Vec::new();
    let entries = match fs::read_dir(dir.as_ref()) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(slots),
        Err(e) => return Err(e.into()),
    };
    for ent in entries {
        let path = ent?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            slots.push(stem.to_string());
        }
    }
    slots.sort();
    Ok(slots)
}
