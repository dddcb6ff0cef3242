//! API key identity
//!
//! This module defines `ApiKeyInfo`, the parsed form of one credential
//! entry (`key[:alias[:project_id]]`).

use crate::utils::truncate_str;
use serde::Serialize;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Number of leading key characters shown in masked previews
pub const KEY_PREVIEW_CHARS: usize = 8;

// ============================================================================
// API Key Info
// ============================================================================

/// One API credential with a display alias and an optional project ID
///
/// Equality and hashing only look at the raw key: two entries with the same
/// secret are the same credential, whatever their alias or project.
#[derive(Clone, Serialize)]
pub struct ApiKeyInfo {
    /// The secret key value
    #[serde(skip_serializing)]
    key: String,
    /// Human-readable name used in logs and status output
    alias: String,
    /// Cloud project ID (Vertex AI), if any
    project_id: Option<String>,
}

impl ApiKeyInfo {
    /// Create a new key info
    pub fn new(key: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            alias: alias.into(),
            project_id: None,
        }
    }

    /// Set the project ID
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Parse an entry in `key:alias:project_id`, `key:alias` or `key` form
    ///
    /// # Arguments
    /// * `entry` - The credential entry
    /// * `default_index` - Used for the synthesized alias `key-<index>` when no alias is given
    /// * `default_project_id` - Used when the entry carries no (or an empty) project ID
    ///
    /// # Example
    /// ```
    /// use tale_key_pool::services::key_pool::ApiKeyInfo;
    ///
    /// let info = ApiKeyInfo::parse("abc123:prod:my-project", 0, None);
    /// assert_eq!(info.key(), "abc123");
    /// assert_eq!(info.alias(), "prod");
    /// assert_eq!(info.project_id(), Some("my-project"));
    ///
    /// let info = ApiKeyInfo::parse("abc123", 2, Some("fallback"));
    /// assert_eq!(info.alias(), "key-2");
    /// assert_eq!(info.project_id(), Some("fallback"));
    /// ```
    pub fn parse(entry: &str, default_index: usize, default_project_id: Option<&str>) -> Self {
        let default_project = default_project_id.map(str::to_string);
        let parts: Vec<&str> = entry.split(':').collect();

        match parts.as_slice() {
            [key, alias, rest @ ..] if !rest.is_empty() => {
                // Project IDs may themselves contain colons
                let project_id = rest.join(":").trim().to_string();
                Self {
                    key: key.trim().to_string(),
                    alias: alias.trim().to_string(),
                    project_id: if project_id.is_empty() {
                        default_project
                    } else {
                        Some(project_id)
                    },
                }
            }
            [key, alias] => Self {
                key: key.trim().to_string(),
                alias: alias.trim().to_string(),
                project_id: default_project,
            },
            _ => Self {
                key: entry.trim().to_string(),
                alias: format!("key-{}", default_index),
                project_id: default_project,
            },
        }
    }

    /// Parse a comma-separated list of entries, skipping blank ones
    ///
    /// Each entry's position in the list is its default index.
    pub fn parse_list(list: &str, default_project_id: Option<&str>) -> Vec<Self> {
        list.split(',')
            .enumerate()
            .filter_map(|(idx, entry)| {
                let entry = entry.trim();
                (!entry.is_empty()).then(|| Self::parse(entry, idx, default_project_id))
            })
            .collect()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    /// Masked preview of the key, safe for display
    pub fn masked(&self) -> String {
        format!("{}...", truncate_str(&self.key, KEY_PREVIEW_CHARS))
    }
}

impl PartialEq for ApiKeyInfo {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ApiKeyInfo {}

impl Hash for ApiKeyInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

// Never print the secret, even in debug output
impl fmt::Debug for ApiKeyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyInfo")
            .field("key", &self.masked())
            .field("alias", &self.alias)
            .field("project_id", &self.project_id)
            .finish()
    }
}

impl fmt::Display for ApiKeyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.alias, self.masked())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parse_with_alias() {
        let info = ApiKeyInfo::parse("abc123:prod-main", 0, None);
        assert_eq!(info.key(), "abc123");
        assert_eq!(info.alias(), "prod-main");
        assert_eq!(info.project_id(), None);
    }

    #[test]
    fn test_parse_without_alias() {
        let info = ApiKeyInfo::parse("abc123", 2, None);
        assert_eq!(info.key(), "abc123");
        assert_eq!(info.alias(), "key-2");
        assert_eq!(info.project_id(), None);
    }

    #[test]
    fn test_parse_strips_whitespace() {
        let info = ApiKeyInfo::parse("  abc123  :  prod-main  ", 0, None);
        assert_eq!(info.key(), "abc123");
        assert_eq!(info.alias(), "prod-main");
    }

    #[test]
    fn test_parse_with_project_id() {
        let info = ApiKeyInfo::parse("abc123:prod:my-gcp-project", 0, None);
        assert_eq!(info.key(), "abc123");
        assert_eq!(info.alias(), "prod");
        assert_eq!(info.project_id(), Some("my-gcp-project"));
    }

    #[test]
    fn test_parse_project_id_with_colons() {
        let info = ApiKeyInfo::parse("k:alias:proj-a:with:colons", 0, None);
        assert_eq!(info.key(), "k");
        assert_eq!(info.alias(), "alias");
        assert_eq!(info.project_id(), Some("proj-a:with:colons"));
    }

    #[test]
    fn test_parse_default_project_id() {
        let info = ApiKeyInfo::parse("abc123:prod", 0, Some("default-project"));
        assert_eq!(info.project_id(), Some("default-project"));

        let info = ApiKeyInfo::parse("abc123", 0, Some("default-project"));
        assert_eq!(info.alias(), "key-0");
        assert_eq!(info.project_id(), Some("default-project"));
    }

    #[test]
    fn test_parse_explicit_project_overrides_default() {
        let info = ApiKeyInfo::parse("abc123:prod:explicit", 0, Some("default-project"));
        assert_eq!(info.project_id(), Some("explicit"));
    }

    #[test]
    fn test_parse_empty_project_falls_back_to_default() {
        let info = ApiKeyInfo::parse("abc123:prod:  ", 0, Some("default-project"));
        assert_eq!(info.project_id(), Some("default-project"));

        let info = ApiKeyInfo::parse("abc123:prod:", 0, None);
        assert_eq!(info.project_id(), None);
    }

    #[test]
    fn test_parse_list() {
        let infos = ApiKeyInfo::parse_list(" a1:prod:p1 , ,b2:backup, c3 ", Some("shared"));
        assert_eq!(infos.len(), 3);
        assert_eq!(infos[0].alias(), "prod");
        assert_eq!(infos[0].project_id(), Some("p1"));
        assert_eq!(infos[1].alias(), "backup");
        assert_eq!(infos[1].project_id(), Some("shared"));
        // Blank entries still consume an index
        assert_eq!(infos[2].key(), "c3");
        assert_eq!(infos[2].alias(), "key-3");
    }

    #[test]
    fn test_equality_uses_key_only() {
        let a = ApiKeyInfo::new("same", "first");
        let b = ApiKeyInfo::new("same", "second").with_project_id("p");
        assert_eq!(a, b);

        let set: HashSet<ApiKeyInfo> = [a, b, ApiKeyInfo::new("other", "x")].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_masked_never_shows_full_key() {
        let info = ApiKeyInfo::new("AIzaSyVerySecretValue", "prod");
        assert_eq!(info.masked(), "AIzaSyVe...");
        assert!(!format!("{:?}", info).contains("SecretValue"));
        assert_eq!(info.to_string(), "prod (AIzaSyVe...)");

        let short = ApiKeyInfo::new("abc", "short");
        assert_eq!(short.masked(), "abc...");
    }

    #[test]
    fn test_serialize_omits_secret() {
        let info = ApiKeyInfo::new("AIzaSyVerySecretValue", "prod").with_project_id("proj");
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json, serde_json::json!({ "alias": "prod", "project_id": "proj" }));
    }
}
