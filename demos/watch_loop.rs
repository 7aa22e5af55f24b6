//! Extract-then-wait loop with checkpoints, the shape a daemon would use.
//!
//! Usage: cargo run --example watch_loop -- <setting.toml> [profile]

use roomtail::{
    CheckpointStore, DrainOptions, EventSink, LogEvent, LogScanner, SinkError, WaitResult, drain,
    load_profile, wait_for_changes,
};
use std::time::Duration;

struct StdoutSink;

impl EventSink for StdoutSink {
    fn record(&mut self, event: &LogEvent) -> Result<(), SinkError> {
        let json = serde_json::to_string(event).map_err(|err| SinkError::Other(err.into()))?;
        println!("{json}");
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .ok_or("usage: watch_loop <setting.toml> [profile]")?;
    let profile_name = args.next().unwrap_or_else(|| "default".to_string());

    let profile = load_profile(&config_path, &profile_name)?;
    let store = CheckpointStore::open("checkpoints")?;
    let scanner = LogScanner::new(&profile.log_dir, &profile.user_display_name);
    let mut statuses = store.load(&profile_name)?;
    let mut sink = StdoutSink;
    let options = DrainOptions::default();

    loop {
        scanner.discover(&mut statuses)?;
        let events = scanner.scan(&mut statuses)?;
        let report = drain(events, &mut sink, &options, |current| {
            store.save(&profile_name, current)
        })?;
        store.save(&profile_name, &statuses)?;
        if report.moved_world {
            eprintln!("world movement recorded, downstream views are stale");
        }

        let wait = wait_for_changes(
            &profile.log_dir,
            &statuses,
            Duration::from_secs(profile.check_interval_secs),
        )?;
        if wait == WaitResult::Timeout {
            eprintln!("no activity for {}s, rechecking", profile.check_interval_secs);
        }
    }
}
