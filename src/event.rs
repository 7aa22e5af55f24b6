use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A structured presence event extracted from a session log.
///
/// Every variant carries the record's `timestamp`, parsed as local time from
/// the log's `yyyy.MM.dd HH:mm:ss` prefix. Events are serialized with a
/// `"type"` tag so downstream sinks can dispatch without knowing the Rust
/// type.
///
/// `EnterWorld` is special: the client writes the world name and the
/// instance id in two separate records, so an entering-room record only
/// updates parsing context and is never yielded by the readers. The paired
/// [`LogEvent::JoinInstance`] that follows it carries the full context.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use roomtail::LogEvent;
///
/// let ts = NaiveDate::from_ymd_opt(2021, 5, 1)
///     .unwrap()
///     .and_hms_opt(10, 0, 5)
///     .unwrap();
/// let event = LogEvent::EnterPlayer {
///     timestamp: ts,
///     instance_id: "12345~private(usr_x)".to_string(),
///     world_id: "wrld_abc".to_string(),
///     world_name: "MyWorld".to_string(),
///     user_display_name: "Alice".to_string(),
/// };
/// assert_eq!(event.timestamp(), ts);
///
/// let json = serde_json::to_string(&event).unwrap();
/// let back: LogEvent = serde_json::from_str(&json).unwrap();
/// assert_eq!(back, event);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    /// The client started loading a world. Context-only; suppressed from
    /// the emitted sequence because the instance id is still unknown.
    EnterWorld {
        timestamp: NaiveDateTime,
        world_name: String,
    },

    /// The client joined a concrete instance of a world.
    ///
    /// `world_name` comes from the preceding entering-room record and is
    /// absent when the log opens mid-session.
    JoinInstance {
        timestamp: NaiveDateTime,
        instance_id: String,
        world_id: String,
        world_name: Option<String>,
    },

    /// The client left the current instance.
    LeftWorld {
        timestamp: NaiveDateTime,
        instance_id: String,
        world_id: String,
        world_name: String,
    },

    /// Another player became visible in the current instance.
    EnterPlayer {
        timestamp: NaiveDateTime,
        instance_id: String,
        world_id: String,
        world_name: String,
        user_display_name: String,
    },

    /// A player left the current instance.
    LeftPlayer {
        timestamp: NaiveDateTime,
        instance_id: String,
        world_id: String,
        world_name: String,
        user_display_name: String,
    },

    /// The client initialized a player API handle.
    ///
    /// `mode == "local"` identifies the account that owns the log file;
    /// other modes are informational and pass through unchecked.
    InitializedApi {
        timestamp: NaiveDateTime,
        instance_id: Option<String>,
        world_id: Option<String>,
        world_name: Option<String>,
        user_display_name: String,
        mode: String,
    },
}

impl LogEvent {
    /// The record timestamp, local time.
    pub fn timestamp(&self) -> NaiveDateTime {
        match self {
            LogEvent::EnterWorld { timestamp, .. }
            | LogEvent::JoinInstance { timestamp, .. }
            | LogEvent::LeftWorld { timestamp, .. }
            | LogEvent::EnterPlayer { timestamp, .. }
            | LogEvent::LeftPlayer { timestamp, .. }
            | LogEvent::InitializedApi { timestamp, .. } => *timestamp,
        }
    }
}
