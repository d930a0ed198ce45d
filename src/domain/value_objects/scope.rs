//! OAuth scope definitions.
//!
//! The catalog is compiled in: every scope a token can ever carry is listed
//! in [`SCOPES`]. Ids follow `category:group`.

use serde::Serialize;
use std::fmt;

/// Broad kind of access a scope grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeCategory {
    Read,
    Write,
    Admin,
}

impl ScopeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for ScopeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry of the scope catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: ScopeCategory,
    pub group: &'static str,
    pub requires_approval: bool,
    pub is_default: bool,
}

const fn scope(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    category: ScopeCategory,
    group: &'static str,
    requires_approval: bool,
    is_default: bool,
) -> ScopeDefinition {
    ScopeDefinition {
        id,
        name,
        description,
        category,
        group,
        requires_approval,
        is_default,
    }
}

use ScopeCategory::{Admin, Read, Write};

/// The full scope catalog.
pub static SCOPES: &[ScopeDefinition] = &[
    // Profile
    scope("read:profile", "Read profile", "View the user's public and private profile fields", Read, "profile", false, true),
    scope("write:profile", "Edit profile", "Update the user's display name, bio and avatar", Write, "profile", false, false),
    // Posts
    scope("read:posts", "Read posts", "View posts authored by or visible to the user", Read, "posts", false, true),
    scope("write:posts", "Publish posts", "Create, edit and delete posts on the user's behalf", Write, "posts", false, false),
    // Comments
    scope("read:comments", "Read comments", "View comments on posts visible to the user", Read, "comments", false, false),
    scope("write:comments", "Write comments", "Create and delete comments on the user's behalf", Write, "comments", false, false),
    // Social graph
    scope("read:followers", "Read followers", "View who the user follows and who follows them", Read, "social", false, true),
    scope("write:follows", "Manage follows", "Follow and unfollow accounts on the user's behalf", Write, "social", false, false),
    // Notifications
    scope("read:notifications", "Read notifications", "View the user's notification feed", Read, "notifications", false, false),
    scope("write:notifications", "Manage notifications", "Mark notifications as read and change preferences", Write, "notifications", false, false),
    // Direct messages
    scope("read:messages", "Read messages", "Read the user's direct messages", Read, "messages", true, false),
    scope("write:messages", "Send messages", "Send direct messages on the user's behalf", Write, "messages", true, false),
    // Media
    scope("read:media", "Read media", "View media uploaded by the user", Read, "media", false, false),
    scope("write:media", "Upload media", "Upload and delete media on the user's behalf", Write, "media", false, false),
    // Analytics
    scope("read:analytics", "Read analytics", "View engagement statistics for the user's content", Read, "analytics", true, false),
    // Administration
    scope("admin:users", "Administer users", "Moderate and manage user accounts", Admin, "admin", true, false),
    scope("admin:content", "Administer content", "Moderate posts, comments and media platform-wide", Admin, "admin", true, false),
];
