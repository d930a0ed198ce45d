//! Scope catalog domain service.
//!
//! Pure lookups over [`SCOPES`]. Nothing here fails: callers decide what to
//! do with unknown ids.

use std::collections::HashSet;

use crate::domain::value_objects::{ScopeCategory, ScopeDefinition, SCOPES};

/// Outcome of validating a list of scope ids against the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeValidation {
    pub valid: Vec<String>,
    pub invalid: Vec<String>,
}

impl ScopeValidation {
    pub fn is_valid(&self) -> bool {
        self.invalid.is_empty()
    }
}

/// Domain service over the static scope catalog.
pub struct ScopeCatalog;

impl ScopeCatalog {
    pub fn all_scopes() -> &'static [ScopeDefinition] {
        SCOPES
    }

    pub fn find(id: &str) -> Option<&'static ScopeDefinition> {
        SCOPES.iter().find(|s| s.id == id)
    }

    pub fn by_group(group: &str) -> Vec<&'static ScopeDefinition> {
        SCOPES.iter().filter(|s| s.group == group).collect()
    }

    pub fn by_category(category: ScopeCategory) -> Vec<&'static ScopeDefinition> {
        SCOPES.iter().filter(|s| s.category == category).collect()
    }

    /// Ids assigned to an application registered without explicit scopes.
    pub fn default_scopes() -> Vec<String> {
        SCOPES
            .iter()
            .filter(|s| s.is_default)
            .map(|s| s.id.to_string())
            .collect()
    }

    pub fn scopes_requiring_approval() -> Vec<&'static ScopeDefinition> {
        SCOPES.iter().filter(|s| s.requires_approval).collect()
    }

    /// Split `ids` into catalog members and unknown ids, dropping duplicates
    /// while keeping first-seen order.
    pub fn validate<S: AsRef<str>>(ids: &[S]) -> ScopeValidation {
        let mut seen = HashSet::new();
        let mut result = ScopeValidation::default();
        for id in ids.iter().map(AsRef::as_ref) {
            if !seen.insert(id) {
                continue;
            }
            if Self::find(id).is_some() {
                result.valid.push(id.to_string());
            } else {
                result.invalid.push(id.to_string());
            }
        }
        result
    }

    /// True iff the two sets intersect. Empty on either side is false.
    pub fn has_any<T: AsRef<str>, R: AsRef<str>>(token_scopes: &[T], required: &[R]) -> bool {
        required
            .iter()
            .any(|r| token_scopes.iter().any(|t| t.as_ref() == r.as_ref()))
    }

    /// True iff every required scope is held. Vacuously true for no requirements.
    pub fn has_all<T: AsRef<str>, R: AsRef<str>>(token_scopes: &[T], required: &[R]) -> bool {
        required
            .iter()
            .all(|r| token_scopes.iter().any(|t| t.as_ref() == r.as_ref()))
    }

    /// Parse a space-delimited `scope` parameter (RFC 6749 §3.3).
    pub fn parse(scope: Option<&str>) -> Vec<String> {
        let mut seen = HashSet::new();
        scope
            .unwrap_or_default()
            .split_whitespace()
            .filter(|s| seen.insert(*s))
            .map(str::to_string)
            .collect()
    }

    /// Render scopes as a space-delimited `scope` value.
    pub fn format(scopes: &[String]) -> String {
        scopes.join(" ")
    }

    /// Members of `requested` that are also in `allowed`, in request order.
    pub fn intersect(requested: &[String], allowed: &[String]) -> Vec<String> {
        requested
            .iter()
            .filter(|s| allowed.contains(s))
            .cloned()
            .collect()
    }
}
