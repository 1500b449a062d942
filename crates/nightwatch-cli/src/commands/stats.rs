use std::collections::BTreeMap;
use std::sync::Arc;

use nightwatch_core::{Config, KvStore, SqliteStore, StatsEngine};

pub fn run(participant: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let store: Arc<dyn KvStore> = Arc::new(SqliteStore::open()?);
    let engine = StatsEngine::new(store, config.stats);

    let mut view = BTreeMap::new();
    for p in config.roster().iter() {
        if participant.as_deref().is_some_and(|id| id != p.id) {
            continue;
        }
        let stats = engine.load(&p.id)?;
        view.insert(
            p.id.clone(),
            serde_json::json!({
                "name": p.name,
                "sleepDebt": stats.sleep_debt_hours,
                "goodSleepStreak": stats.good_sleep_streak,
                "bestStreak": stats.best_streak,
                "totalNights": stats.total_nights,
                "goodNights": stats.good_nights,
                "goodNightPercentage": stats.good_night_percentage(),
            }),
        );
    }
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
