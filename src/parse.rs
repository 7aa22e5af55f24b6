use chrono::NaiveDateTime;
use log::debug;
use regex::Regex;
use std::sync::LazyLock;

/// What a single record's text says, before any context enrichment.
///
/// Only fields literally present on the line appear here; the status machine
/// fills in world/instance context and decides what gets emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParsedRecord {
    EnterWorld {
        timestamp: NaiveDateTime,
        world_name: String,
    },
    JoinInstance {
        timestamp: NaiveDateTime,
        world_id: String,
        instance_id: String,
    },
    LeftWorld {
        timestamp: NaiveDateTime,
    },
    EnterPlayer {
        timestamp: NaiveDateTime,
        user_display_name: String,
    },
    LeftPlayer {
        timestamp: NaiveDateTime,
        user_display_name: String,
    },
    InitializedApi {
        timestamp: NaiveDateTime,
        user_display_name: String,
        mode: String,
    },
}

const CATEGORY_TAG: &str = "[Behaviour]";
const TIMESTAMP_FORMAT: &str = "%Y.%m.%d %H:%M:%S";

/// Shared record prefix: timestamp, severity column, dash, category tag.
const PREFIX: &str = r"^(?P<ts>\d{4}\.\d{2}\.\d{2} \d{2}:\d{2}:\d{2})[^-]+- +\[Behaviour\] ";

fn rule(body: &str) -> Regex {
    Regex::new(&format!("{PREFIX}{body}")).unwrap()
}

static ENTER_WORLD: LazyLock<Regex> = LazyLock::new(|| rule(r"Entering Room: (?P<world>[^\n]+)"));
static JOIN_INSTANCE: LazyLock<Regex> =
    LazyLock::new(|| rule(r"Joining (?P<world_id>wrld_[^:]+):(?P<instance>[^\n]+)"));
static LEFT_WORLD: LazyLock<Regex> = LazyLock::new(|| rule(r"OnLeftRoom"));
static PLAYER_JOINED: LazyLock<Regex> = LazyLock::new(|| rule(r"OnPlayerJoined (?P<user>[^\n]+)"));
static PLAYER_LEFT: LazyLock<Regex> = LazyLock::new(|| rule(r"OnPlayerLeft (?P<user>[^\n]+)"));
static INITIALIZED_API: LazyLock<Regex> =
    LazyLock::new(|| rule(r#"Initialized PlayerAPI "(?P<user>.*)" is (?P<mode>[^\n]+)"#));

/// Cheap structural filter: the record's category column must carry the
/// `[Behaviour]` tag. The client pads the severity column to a fixed width,
/// putting the tag at byte 34; compact separators are accepted by looking
/// directly after the first dash instead.
fn has_category_tag(record: &str) -> bool {
    if record.get(34..45) == Some(CATEGORY_TAG) {
        return true;
    }
    match record.split_once('-') {
        Some((_, rest)) => rest.trim_start().starts_with(CATEGORY_TAG),
        None => false,
    }
}

fn timestamp(raw: &str) -> Option<NaiveDateTime> {
    match NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT) {
        Ok(ts) => Some(ts),
        Err(err) => {
            debug!("discarding record with invalid timestamp {raw:?}: {err}");
            None
        }
    }
}

/// Parse one normalized record. Returns `None` for anything that is not one
/// of the recognized presence records; that is the common case and not an
/// error. First matching rule wins.
pub(crate) fn parse_record(text: &str) -> Option<ParsedRecord> {
    if text.is_empty() || !has_category_tag(text) {
        return None;
    }

    if let Some(caps) = ENTER_WORLD.captures(text) {
        return Some(ParsedRecord::EnterWorld {
            timestamp: timestamp(&caps["ts"])?,
            world_name: caps["world"].to_string(),
        });
    }
    if let Some(caps) = JOIN_INSTANCE.captures(text) {
        return Some(ParsedRecord::JoinInstance {
            timestamp: timestamp(&caps["ts"])?,
            world_id: caps["world_id"].to_string(),
            instance_id: caps["instance"].to_string(),
        });
    }
    if let Some(caps) = LEFT_WORLD.captures(text) {
        return Some(ParsedRecord::LeftWorld {
            timestamp: timestamp(&caps["ts"])?,
        });
    }
    if let Some(caps) = PLAYER_JOINED.captures(text) {
        return Some(ParsedRecord::EnterPlayer {
            timestamp: timestamp(&caps["ts"])?,
            user_display_name: caps["user"].to_string(),
        });
    }
    if let Some(caps) = PLAYER_LEFT.captures(text) {
        return Some(ParsedRecord::LeftPlayer {
            timestamp: timestamp(&caps["ts"])?,
            user_display_name: caps["user"].to_string(),
        });
    }
    if let Some(caps) = INITIALIZED_API.captures(text) {
        return Some(ParsedRecord::InitializedApi {
            timestamp: timestamp(&caps["ts"])?,
            user_display_name: caps["user"].to_string(),
            mode: caps["mode"].to_string(),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 5, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn rec(body: &str) -> String {
        format!("2021.05.01 10:00:00 Log        -  [Behaviour] {body}")
    }

    #[test]
    fn entering_room() {
        assert_eq!(
            parse_record(&rec("Entering Room: The Black Cat")),
            Some(ParsedRecord::EnterWorld {
                timestamp: ts(10, 0, 0),
                world_name: "The Black Cat".to_string(),
            })
        );
    }

    #[test]
    fn joining_instance() {
        assert_eq!(
            parse_record(&rec("Joining wrld_abc:12345~private(usr_x)")),
            Some(ParsedRecord::JoinInstance {
                timestamp: ts(10, 0, 0),
                world_id: "wrld_abc".to_string(),
                instance_id: "12345~private(usr_x)".to_string(),
            })
        );
    }

    #[test]
    fn left_room_and_player_movement() {
        assert_eq!(
            parse_record(&rec("OnLeftRoom")),
            Some(ParsedRecord::LeftWorld {
                timestamp: ts(10, 0, 0)
            })
        );
        assert_eq!(
            parse_record(&rec("OnPlayerJoined Alice")),
            Some(ParsedRecord::EnterPlayer {
                timestamp: ts(10, 0, 0),
                user_display_name: "Alice".to_string(),
            })
        );
        assert_eq!(
            parse_record(&rec("OnPlayerLeft Bob")),
            Some(ParsedRecord::LeftPlayer {
                timestamp: ts(10, 0, 0),
                user_display_name: "Bob".to_string(),
            })
        );
    }

    #[test]
    fn initialized_api() {
        assert_eq!(
            parse_record(&rec(r#"Initialized PlayerAPI "Alice" is local"#)),
            Some(ParsedRecord::InitializedApi {
                timestamp: ts(10, 0, 0),
                user_display_name: "Alice".to_string(),
                mode: "local".to_string(),
            })
        );
    }

    #[test]
    fn initialized_api_name_with_embedded_quotes() {
        // The name is captured greedily up to the trailing `" is <mode>`,
        // not up to the first quote.
        assert_eq!(
            parse_record(&rec(r#"Initialized PlayerAPI "say "hi"" is remote"#)),
            Some(ParsedRecord::InitializedApi {
                timestamp: ts(10, 0, 0),
                user_display_name: r#"say "hi""#.to_string(),
                mode: "remote".to_string(),
            })
        );
    }

    #[test]
    fn records_without_category_tag_are_discarded() {
        assert_eq!(
            parse_record("2021.05.01 10:00:00 Log        -  [Network] OnPlayerJoined Alice"),
            None
        );
        assert_eq!(parse_record(""), None);
        assert_eq!(parse_record("free-form diagnostic output"), None);
    }

    #[test]
    fn compact_separator_is_accepted() {
        assert_eq!(
            parse_record("2021.05.01 10:00:00 Log - [Behaviour] Entering Room: MyWorld"),
            Some(ParsedRecord::EnterWorld {
                timestamp: ts(10, 0, 0),
                world_name: "MyWorld".to_string(),
            })
        );
    }

    #[test]
    fn unknown_behaviour_record_is_discarded() {
        assert_eq!(parse_record(&rec("Saving avatar parameters")), None);
    }

    #[test]
    fn impossible_calendar_date_is_discarded() {
        assert_eq!(
            parse_record("2021.13.40 10:00:00 Log        -  [Behaviour] OnLeftRoom"),
            None
        );
    }
}
