#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const TARGET: &str = "Alice";

/// Format one record the way the client writes it: timestamp, fixed-width
/// severity column, dash separator, `[Behaviour]` category tag.
pub fn rec(ts: &str, body: &str) -> String {
    format!("{ts} Log        -  [Behaviour] {body}\n")
}

pub fn ts(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, "%Y.%m.%d %H:%M:%S").unwrap()
}

pub fn date(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2021, 5, 1)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

/// A complete single-world session owned by [`TARGET`]: identity first,
/// then a visit with one guest.
pub fn standard_session() -> String {
    [
        rec(
            "2021.05.01 09:59:50",
            r#"Initialized PlayerAPI "Alice" is local"#,
        ),
        rec("2021.05.01 10:00:00", "Entering Room: MyWorld"),
        rec("2021.05.01 10:00:05", "Joining wrld_abc:12345~private(usr_x)"),
        rec("2021.05.01 10:00:10", "OnPlayerJoined Bob"),
        rec("2021.05.01 10:00:20", "OnPlayerLeft Bob"),
        rec("2021.05.01 10:00:30", "OnLeftRoom"),
    ]
    .concat()
}

pub fn write_log(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

pub fn append_log(path: &Path, content: &str) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
}
