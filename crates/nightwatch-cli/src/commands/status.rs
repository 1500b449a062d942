use std::sync::Arc;

use nightwatch_core::{KvStore, PhaseController, SqliteStore, UserStates};

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let store: Arc<dyn KvStore> = Arc::new(SqliteStore::open()?);
    let phase = PhaseController::new(store.clone()).current()?;
    let states = UserStates::new(store).all_raw()?;

    let view = serde_json::json!({
        "phase": phase.as_str(),
        "states": states,
    });
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
