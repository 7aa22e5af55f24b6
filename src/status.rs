use crate::event::LogEvent;
use crate::parse::{self, ParsedRecord};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Durable per-file parsing cursor.
///
/// One of these exists for every tracked log file. It is owned by the caller
/// and persisted between invocations (see
/// [`CheckpointStore`](crate::CheckpointStore)); readers work on a private
/// copy and commit snapshots back as events are yielded, so a checkpoint
/// taken at any moment resumes cleanly.
///
/// After a joining-instance transition the three `current_*` fields are all
/// present; an entering-room record sets `current_world_name` and clears the
/// other two until the paired joining-instance record arrives.
///
/// Serialized field names follow the on-disk checkpoint contract
/// (`Pos`, `VisitedWorldCount`, `AuthUserDisplayName`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParsingStatus {
    /// Next unread byte position in the file.
    pub pos: u64,
    /// Number of joining-instance transitions seen.
    pub visited_world_count: u64,
    /// The log's owning user, once confirmed.
    pub auth_user_display_name: Option<String>,
    pub current_world_id: Option<String>,
    pub current_world_name: Option<String>,
    pub current_instance_id: Option<String>,
}

impl ParsingStatus {
    /// Whether this log has been confirmed as belonging to `target_user`.
    pub fn is_confirmed_for(&self, target_user: &str) -> bool {
        self.auth_user_display_name.as_deref() == Some(target_user)
    }

    /// The full world context, or `None` unless all three parts are known.
    fn world_context(&self) -> Option<(String, String, String)> {
        Some((
            self.current_instance_id.clone()?,
            self.current_world_id.clone()?,
            self.current_world_name.clone()?,
        ))
    }
}

/// A record the status machine refused to apply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum TransitionError {
    /// The record is inconsistent with the tracked context; the file is
    /// corrupt or shaped in a way the engine does not support.
    #[error("{0}")]
    InvalidStatus(String),
    /// The record names a local account other than the target user; the
    /// whole file belongs to someone else.
    #[error("log belongs to '{found}'")]
    IdentityMismatch { found: String },
}

/// Validate a parsed record against `status`, perform its transition, and
/// return the event to emit (`None` for status-only records).
pub(crate) fn apply(
    record: ParsedRecord,
    status: &mut ParsingStatus,
    target_user: &str,
) -> Result<Option<LogEvent>, TransitionError> {
    match record {
        ParsedRecord::EnterWorld {
            timestamp: _,
            world_name,
        } => {
            // Instance id and world id are unknown until the paired
            // joining-instance record; suppress emission until then.
            status.current_instance_id = None;
            status.current_world_id = None;
            status.current_world_name = Some(world_name);
            Ok(None)
        }

        ParsedRecord::JoinInstance {
            timestamp,
            world_id,
            instance_id,
        } => {
            let event = LogEvent::JoinInstance {
                timestamp,
                instance_id: instance_id.clone(),
                world_id: world_id.clone(),
                world_name: status.current_world_name.clone(),
            };
            status.current_instance_id = Some(instance_id);
            status.current_world_id = Some(world_id);
            status.visited_world_count += 1;
            Ok(Some(event))
        }

        ParsedRecord::LeftWorld { timestamp } => {
            let (instance_id, world_id, world_name) = status.world_context().ok_or_else(|| {
                TransitionError::InvalidStatus(
                    "left-world record before any instance join".to_string(),
                )
            })?;
            Ok(Some(LogEvent::LeftWorld {
                timestamp,
                instance_id,
                world_id,
                world_name,
            }))
        }

        ParsedRecord::EnterPlayer {
            timestamp,
            user_display_name,
        } => {
            let (instance_id, world_id, world_name) = status.world_context().ok_or_else(|| {
                TransitionError::InvalidStatus(
                    "player-joined record before any instance join".to_string(),
                )
            })?;
            Ok(Some(LogEvent::EnterPlayer {
                timestamp,
                instance_id,
                world_id,
                world_name,
                user_display_name,
            }))
        }

        ParsedRecord::LeftPlayer {
            timestamp,
            user_display_name,
        } => {
            let (instance_id, world_id, world_name) = status.world_context().ok_or_else(|| {
                TransitionError::InvalidStatus(
                    "player-left record before any instance join".to_string(),
                )
            })?;
            Ok(Some(LogEvent::LeftPlayer {
                timestamp,
                instance_id,
                world_id,
                world_name,
                user_display_name,
            }))
        }

        ParsedRecord::InitializedApi {
            timestamp,
            user_display_name,
            mode,
        } => {
            if mode == "local" {
                if status.auth_user_display_name.is_none() && status.visited_world_count <= 1 {
                    if user_display_name != target_user {
                        return Err(TransitionError::IdentityMismatch {
                            found: user_display_name,
                        });
                    }
                    status.auth_user_display_name = Some(user_display_name.clone());
                } else {
                    match &status.auth_user_display_name {
                        Some(confirmed) if *confirmed == user_display_name => {}
                        _ => {
                            return Err(TransitionError::InvalidStatus(
                                "unexpected local player API re-initialization".to_string(),
                            ));
                        }
                    }
                }
            }
            Ok(Some(LogEvent::InitializedApi {
                timestamp,
                instance_id: status.current_instance_id.clone(),
                world_id: status.current_world_id.clone(),
                world_name: status.current_world_name.clone(),
                user_display_name,
                mode,
            }))
        }
    }
}

/// Run one raw record through normalization, parsing, and the status
/// machine, advancing `pos` past the record on success or discard. A failed
/// transition leaves `pos` at the offending record so the failure is
/// re-observable on retry.
pub(crate) fn consume_record(
    raw: &str,
    status: &mut ParsingStatus,
    target_user: &str,
) -> Result<Option<LogEvent>, TransitionError> {
    let cleaned = raw.replace('\r', "");
    let event = match parse::parse_record(cleaned.trim()) {
        Some(record) => apply(record, status, target_user)?,
        None => None,
    };
    status.pos += raw.len() as u64;
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    const TARGET: &str = "Alice";

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 5, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn joined_status() -> ParsingStatus {
        ParsingStatus {
            pos: 0,
            visited_world_count: 1,
            auth_user_display_name: Some(TARGET.to_string()),
            current_world_id: Some("wrld_abc".to_string()),
            current_world_name: Some("MyWorld".to_string()),
            current_instance_id: Some("12345".to_string()),
        }
    }

    #[test]
    fn entering_room_is_status_only() {
        let mut status = ParsingStatus::default();
        let out = apply(
            ParsedRecord::EnterWorld {
                timestamp: ts(),
                world_name: "MyWorld".to_string(),
            },
            &mut status,
            TARGET,
        )
        .unwrap();
        assert_eq!(out, None);
        assert_eq!(status.current_world_name.as_deref(), Some("MyWorld"));
        assert_eq!(status.current_world_id, None);
        assert_eq!(status.current_instance_id, None);
    }

    #[test]
    fn joining_instance_takes_pending_world_name() {
        let mut status = ParsingStatus::default();
        status.current_world_name = Some("MyWorld".to_string());
        let out = apply(
            ParsedRecord::JoinInstance {
                timestamp: ts(),
                world_id: "wrld_abc".to_string(),
                instance_id: "12345".to_string(),
            },
            &mut status,
            TARGET,
        )
        .unwrap();
        assert_eq!(
            out,
            Some(LogEvent::JoinInstance {
                timestamp: ts(),
                instance_id: "12345".to_string(),
                world_id: "wrld_abc".to_string(),
                world_name: Some("MyWorld".to_string()),
            })
        );
        assert_eq!(status.visited_world_count, 1);
        assert_eq!(status.current_instance_id.as_deref(), Some("12345"));
    }

    #[test]
    fn player_records_need_full_context() {
        for record in [
            ParsedRecord::LeftWorld { timestamp: ts() },
            ParsedRecord::EnterPlayer {
                timestamp: ts(),
                user_display_name: "Bob".to_string(),
            },
            ParsedRecord::LeftPlayer {
                timestamp: ts(),
                user_display_name: "Bob".to_string(),
            },
        ] {
            let mut status = ParsingStatus::default();
            assert!(matches!(
                apply(record, &mut status, TARGET),
                Err(TransitionError::InvalidStatus(_))
            ));
        }
    }

    #[test]
    fn entering_room_alone_is_not_enough_context() {
        let mut status = ParsingStatus::default();
        status.current_world_name = Some("MyWorld".to_string());
        assert!(matches!(
            apply(ParsedRecord::LeftWorld { timestamp: ts() }, &mut status, TARGET),
            Err(TransitionError::InvalidStatus(_))
        ));
    }

    #[test]
    fn local_api_init_confirms_matching_identity() {
        let mut status = joined_status();
        status.auth_user_display_name = None;
        let out = apply(
            ParsedRecord::InitializedApi {
                timestamp: ts(),
                user_display_name: TARGET.to_string(),
                mode: "local".to_string(),
            },
            &mut status,
            TARGET,
        )
        .unwrap();
        assert!(status.is_confirmed_for(TARGET));
        assert!(matches!(out, Some(LogEvent::InitializedApi { .. })));
    }

    #[test]
    fn local_api_init_rejects_foreign_identity() {
        let mut status = ParsingStatus::default();
        let err = apply(
            ParsedRecord::InitializedApi {
                timestamp: ts(),
                user_display_name: "Mallory".to_string(),
                mode: "local".to_string(),
            },
            &mut status,
            TARGET,
        )
        .unwrap_err();
        assert_eq!(
            err,
            TransitionError::IdentityMismatch {
                found: "Mallory".to_string()
            }
        );
        assert_eq!(status.auth_user_display_name, None);
    }

    #[test]
    fn late_first_local_init_is_invalid() {
        // Two instance joins before any identity confirmation.
        let mut status = joined_status();
        status.auth_user_display_name = None;
        status.visited_world_count = 2;
        assert!(matches!(
            apply(
                ParsedRecord::InitializedApi {
                    timestamp: ts(),
                    user_display_name: TARGET.to_string(),
                    mode: "local".to_string(),
                },
                &mut status,
                TARGET,
            ),
            Err(TransitionError::InvalidStatus(_))
        ));
    }

    #[test]
    fn conflicting_second_local_init_is_invalid() {
        let mut status = joined_status();
        assert!(matches!(
            apply(
                ParsedRecord::InitializedApi {
                    timestamp: ts(),
                    user_display_name: "Mallory".to_string(),
                    mode: "local".to_string(),
                },
                &mut status,
                TARGET,
            ),
            Err(TransitionError::InvalidStatus(_))
        ));
    }

    #[test]
    fn repeated_identical_local_init_is_fine() {
        let mut status = joined_status();
        let out = apply(
            ParsedRecord::InitializedApi {
                timestamp: ts(),
                user_display_name: TARGET.to_string(),
                mode: "local".to_string(),
            },
            &mut status,
            TARGET,
        )
        .unwrap();
        assert!(out.is_some());
    }

    #[test]
    fn remote_api_init_passes_through_unchecked() {
        let mut status = joined_status();
        let out = apply(
            ParsedRecord::InitializedApi {
                timestamp: ts(),
                user_display_name: "Mallory".to_string(),
                mode: "remote".to_string(),
            },
            &mut status,
            TARGET,
        )
        .unwrap();
        assert!(matches!(
            out,
            Some(LogEvent::InitializedApi { ref mode, .. }) if mode == "remote"
        ));
        assert!(status.is_confirmed_for(TARGET));
    }

    #[test]
    fn consume_advances_pos_by_raw_utf8_length() {
        let raw = "2021.05.01 10:00:00 Log        -  [Behaviour] Entering Room: 散歩\r\n";
        let mut status = ParsingStatus::default();
        let out = consume_record(raw, &mut status, TARGET).unwrap();
        assert_eq!(out, None);
        assert_eq!(status.pos, raw.len() as u64);
        assert_eq!(status.current_world_name.as_deref(), Some("散歩"));
    }

    #[test]
    fn failed_transition_leaves_pos_untouched() {
        let raw = "2021.05.01 10:00:00 Log        -  [Behaviour] OnPlayerJoined Bob\n";
        let mut status = ParsingStatus::default();
        assert!(consume_record(raw, &mut status, TARGET).is_err());
        assert_eq!(status.pos, 0);
    }

    #[test]
    fn unrecognized_records_still_consume_bytes() {
        let raw = "2021.05.01 10:00:00 Log        -  [Behaviour] Saving avatar parameters\n";
        let mut status = ParsingStatus::default();
        assert_eq!(consume_record(raw, &mut status, TARGET).unwrap(), None);
        assert_eq!(status.pos, raw.len() as u64);
    }

    #[test]
    fn checkpoint_field_names() {
        let status = joined_status();
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["Pos"], 0);
        assert_eq!(json["VisitedWorldCount"], 1);
        assert_eq!(json["AuthUserDisplayName"], "Alice");
        assert_eq!(json["CurrentWorldId"], "wrld_abc");
        assert_eq!(json["CurrentWorldName"], "MyWorld");
        assert_eq!(json["CurrentInstanceId"], "12345");
    }
}
