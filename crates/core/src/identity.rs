use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// Stable identity string used for access control (allow/block/admin sets).
pub type UserKey = String;

/// Session-scoped identity string, `"{userKey}#{sessionId}"`.
pub type UserId = String;

/// Tenant-qualified room key, `"{clientId}:{roomId}"`, process-unique.
pub type ChannelId = String;

const GUEST_PREFIX: &str = "guest:";

pub fn is_guest_key(user_key: &str) -> bool {
    user_key.starts_with(GUEST_PREFIX)
}

pub fn compose_user_id(user_key: &str, session_id: &str) -> UserId {
    format!("{user_key}#{session_id}")
}

/// Strips the `#{sessionId}` suffix from a `userId`, returning the bare
/// `userKey`. Used by chat-target resolution and back-lookup cleanup.
pub fn strip_session(user_id: &str) -> &str {
    match user_id.rfind('#') {
        Some(idx) => &user_id[..idx],
        None => user_id,
    }
}

pub fn channel_id(client_id: &str, room_id: &str) -> ChannelId {
    format!("{client_id}:{room_id}")
}

/// Splits a `channelId` back into `(clientId, roomId)`. The room id itself
/// may not contain `:`; the split point is the first colon, matching how
/// `channel_id` composes the pair.
pub fn split_channel_id(channel: &str) -> Option<(&str, &str)> {
    channel.split_once(':')
}

#[derive(Debug, Clone, Deserialize)]
struct JwtClaims {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    sub: Option<String>,
}

/// Decodes a participant's bearer token and derives the stable `userKey`
/// from it: the `email` claim if present, else `sub`. Tokens are HS256,
/// signed with the shared secret configured for this instance.
pub fn derive_key(token: &str, hmac_secret: &[u8]) -> CoreResult<UserKey> {
    use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let key = DecodingKey::from_secret(hmac_secret);

    let data = decode::<JwtClaims>(token, &key, &validation).map_err(|_| CoreError::Unauthorized)?;
    data.claims
        .email
        .or(data.claims.sub)
        .ok_or(CoreError::Unauthorized)
}

/// Strips control characters, collapses internal whitespace runs to a
/// single space, trims the ends, and rejects empty or over-long (>64 code
/// point) results.
pub fn normalize_display_name(raw: &str) -> CoreResult<String> {
    let stripped: String = raw.chars().filter(|c| !c.is_control()).collect();

    let mut out = String::new();
    let mut last_was_space = false;
    for c in stripped.chars() {
        if c.is_whitespace() {
            if !last_was_space && !out.is_empty() {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    let trimmed = out.trim_end().to_string();

    if trimmed.is_empty() {
        return Err(CoreError::InvalidInput("display name is empty".into()));
    }
    if trimmed.chars().count() > 64 {
        return Err(CoreError::InvalidInput(
            "display name exceeds 64 code points".into(),
        ));
    }
    Ok(trimmed)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_key: UserKey,
    pub session_id: String,
}

impl Identity {
    pub fn user_id(&self) -> UserId {
        compose_user_id(&self.user_key, &self.session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guest_prefix_detected() {
        assert!(is_guest_key("guest:abc123"));
        assert!(!is_guest_key("alice@example.com"));
    }

    #[test]
    fn compose_and_strip_round_trip() {
        let id = compose_user_id("alice@x.y", "s1");
        assert_eq!(id, "alice@x.y#s1");
        assert_eq!(strip_session(&id), "alice@x.y");
        assert_eq!(strip_session("alice@x.y"), "alice@x.y");
    }

    #[test]
    fn display_name_normalization() {
        assert_eq!(normalize_display_name("  Alice   B  ").unwrap(), "Alice B");
        assert!(normalize_display_name("   ").is_err());
        assert!(normalize_display_name(&"x".repeat(65)).is_err());
        assert_eq!(normalize_display_name(&"x".repeat(64)).unwrap().len(), 64);
    }

    #[test]
    fn channel_id_split_round_trip() {
        let c = channel_id("t1", "rX");
        assert_eq!(c, "t1:rX");
        assert_eq!(split_channel_id(&c), Some(("t1", "rX")));
    }
}
