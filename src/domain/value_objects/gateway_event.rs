//! Gateway event names and the scope each one requires.
//!
//! Event names are `category.action`. The mapping is data so new events can
//! be exposed without touching the gateway's control flow.

/// Events an application may subscribe to, with the scope required to receive them.
pub static EVENT_SCOPES: &[(&str, &str)] = &[
    ("profile.updated", "read:profile"),
    ("post.created", "read:posts"),
    ("post.updated", "read:posts"),
    ("post.deleted", "read:posts"),
    ("post.liked", "read:posts"),
    ("comment.created", "read:comments"),
    ("comment.deleted", "read:comments"),
    ("user.followed", "read:followers"),
    ("user.unfollowed", "read:followers"),
    ("notification.created", "read:notifications"),
    ("message.received", "read:messages"),
    ("media.uploaded", "read:media"),
];

/// Scope required to receive `event`, or `None` for unknown events.
pub fn required_scope(event: &str) -> Option<&'static str> {
    EVENT_SCOPES
        .iter()
        .find(|(name, _)| *name == event)
        .map(|(_, scope)| *scope)
}

/// All events receivable with the given granted scopes.
pub fn events_for_scopes(scopes: &[String]) -> Vec<&'static str> {
    EVENT_SCOPES
        .iter()
        .filter(|(_, scope)| scopes.iter().any(|s| s == scope))
        .map(|(name, _)| *name)
        .collect()
}

/// `category.action`: lowercase ascii, digits or `_`, exactly one dot,
/// both halves non-empty.
pub fn is_well_formed(event: &str) -> bool {
    let Some((category, action)) = event.split_once('.') else {
        return false;
    };
    let valid_part = |part: &str| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    };
    valid_part(category) && valid_part(action)
}
