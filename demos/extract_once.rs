//! One-shot extraction: scan a log directory once and print every event
//! as a JSON line.
//!
//! Usage: cargo run --example extract_once -- <log_dir> <user_display_name>

use roomtail::{LogScanner, ParsingStatus};
use std::collections::HashMap;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let log_dir = args.next().unwrap_or_else(|| ".".to_string());
    let user = args.next().unwrap_or_else(|| "Anonymous".to_string());

    let scanner = LogScanner::new(&log_dir, &user);
    let mut statuses: HashMap<String, ParsingStatus> = HashMap::new();
    scanner.discover(&mut statuses)?;

    let mut count = 0usize;
    for event in scanner.scan(&mut statuses)? {
        println!("{}", serde_json::to_string(&event?)?);
        count += 1;
    }
    eprintln!("extracted {count} event(s) from {} file(s)", statuses.len());
    Ok(())
}
