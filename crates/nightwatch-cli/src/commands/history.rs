use std::collections::BTreeMap;
use std::sync::Arc;

use nightwatch_core::{Config, KvStore, SleepHistory, SqliteStore};

pub fn run(participant: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let store: Arc<dyn KvStore> = Arc::new(SqliteStore::open()?);
    let history = SleepHistory::new(store);

    let mut view = BTreeMap::new();
    for p in config.roster().iter() {
        if participant.as_deref().is_some_and(|id| id != p.id) {
            continue;
        }
        view.insert(p.id.clone(), history.sessions(&p.id)?);
    }
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
