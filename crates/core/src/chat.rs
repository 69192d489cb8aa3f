//! Chat Router: DM-vs-broadcast parsing and command interception rules.
//! The server only enforces `/tts` against `ttsDisabled` and DM-rejection
//! against `dmEnabled` — every other command listed in spec.md §4.7 is
//! intercepted client-side or on the server's TTS path, outside this crate.

use crate::error::{CoreError, CoreResult};
use crate::identity::UserId;
use crate::model::Room;

pub const MAX_MESSAGE_CODE_POINTS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatIntent {
    Broadcast { body: String },
    Direct { target_handle: String, body: String },
}

pub const COMMANDS: &[&str] = &[
    "/tts", "/help", "/clear", "/me", "/raise", "/lower", "/mute", "/unmute", "/camera", "/leave",
];

pub fn is_command(body: &str) -> bool {
    let Some(word) = body.split_whitespace().next() else { return false };
    COMMANDS.contains(&word)
}

/// Parses a raw chat message into a broadcast or a directed intent. A
/// leading `@handle` followed by whitespace and a body is a DM; anything
/// else is a room broadcast.
pub fn parse_intent(raw: &str) -> CoreResult<ChatIntent> {
    if raw.chars().count() > MAX_MESSAGE_CODE_POINTS {
        return Err(CoreError::InvalidInput("message exceeds 1000 code points".into()));
    }
    if let Some(rest) = raw.strip_prefix('@') {
        if let Some((handle, body)) = rest.split_once(char::is_whitespace) {
            if !handle.is_empty() {
                return Ok(ChatIntent::Direct { target_handle: handle.to_string(), body: body.trim_start().to_string() });
            }
        }
    }
    Ok(ChatIntent::Broadcast { body: raw.to_string() })
}

/// Resolves a DM target handle to exactly one `userId`. Self-addressing is
/// rejected; zero matches is `not_found`; multiple matches is `ambiguous`.
pub fn resolve_dm_target(room: &Room, sender_user_id: &UserId, target_handle: &str) -> CoreResult<UserId> {
    let matches = room.resolve_chat_target(target_handle);

    if matches.contains(sender_user_id) && matches.len() == 1 {
        return Err(CoreError::InvalidInput("cannot address a direct message to yourself".into()));
    }

    let mut others: Vec<UserId> = matches.into_iter().filter(|u| u != sender_user_id).collect();
    match others.len() {
        0 => Err(CoreError::NotFound(format!("no participant matches @{target_handle}"))),
        1 => Ok(others.remove(0)),
        _ => {
            others.sort();
            Err(CoreError::Conflict(format!("@{target_handle} matches more than one participant: {others:?}")))
        }
    }
}

/// Enforces the two server-side chat policy gates: `/tts` rejected when
/// `ttsDisabled`, DMs rejected when `!dmEnabled`.
pub fn enforce_policy(room: &Room, intent: &ChatIntent) -> CoreResult<()> {
    match intent {
        ChatIntent::Broadcast { body } if body.trim_start().starts_with("/tts") => {
            if room.policies.tts_disabled {
                return Err(CoreError::Forbidden("text-to-speech is disabled in this room".into()));
            }
            Ok(())
        }
        ChatIntent::Direct { .. } => {
            if !room.policies.dm_enabled {
                return Err(CoreError::Forbidden("direct messages are disabled in this room".into()));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dm_vs_broadcast() {
        assert_eq!(parse_intent("hello room").unwrap(), ChatIntent::Broadcast { body: "hello room".into() });
        assert_eq!(
            parse_intent("@alice hey there").unwrap(),
            ChatIntent::Direct { target_handle: "alice".into(), body: "hey there".into() }
        );
    }

    #[test]
    fn rejects_oversized_message() {
        let huge = "x".repeat(1001);
        assert!(parse_intent(&huge).is_err());
    }

    #[test]
    fn command_detection() {
        assert!(is_command("/mute"));
        assert!(!is_command("not a command"));
    }
}
