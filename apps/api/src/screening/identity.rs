//! Identity Resolution — canonical dedup key for a candidate.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::score::CandidateRef;

/// Canonical candidate key. Equal keys denote the same candidate no matter
/// which source produced the record.
///
/// The key is prefixed with the attribute it was derived from so that an id
/// never collides with, say, a filename that happens to spell the same text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateIdentity(String);

impl CandidateIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority: internal id > email > filename > display name. Blank values are
/// skipped. A record with none of them resolves to the shared `anonymous`
/// key.
pub fn resolve(candidate: &CandidateRef) -> CandidateIdentity {
    let sources = [
        ("id", candidate.internal_id.as_deref()),
        ("email", candidate.email.as_deref()),
        ("file", candidate.filename.as_deref()),
        ("name", candidate.display_name.as_deref()),
    ];

    for (kind, value) in sources {
        if let Some(normalized) = value.and_then(normalize) {
            return CandidateIdentity(format!("{kind}:{normalized}"));
        }
    }
    CandidateIdentity("anonymous".to_string())
}

fn normalize(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(
        id: Option<&str>,
        email: Option<&str>,
        filename: Option<&str>,
        name: Option<&str>,
    ) -> CandidateRef {
        CandidateRef {
            internal_id: id.map(str::to_string),
            display_name: name.map(str::to_string),
            email: email.map(str::to_string),
            filename: filename.map(str::to_string),
        }
    }

    #[test]
    fn test_internal_id_wins() {
        let key = resolve(&candidate(
            Some("ABC123"),
            Some("jane@example.com"),
            Some("jane.pdf"),
            Some("Jane"),
        ));
        assert_eq!(key.as_str(), "id:abc123");
    }

    #[test]
    fn test_email_is_normalized() {
        let a = resolve(&candidate(None, Some("  Jane@Example.COM "), None, None));
        let b = resolve(&candidate(None, Some("jane@example.com"), Some("x.pdf"), None));
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "email:jane@example.com");
    }

    #[test]
    fn test_blank_values_fall_through() {
        let key = resolve(&candidate(Some("   "), Some(""), Some("Resume.PDF"), Some("Jane")));
        assert_eq!(key.as_str(), "file:resume.pdf");

        let key = resolve(&candidate(None, None, None, Some(" Jane Doe ")));
        assert_eq!(key.as_str(), "name:jane doe");
    }

    #[test]
    fn test_attribute_kinds_do_not_collide() {
        let by_id = resolve(&candidate(Some("jane"), None, None, None));
        let by_name = resolve(&candidate(None, None, None, Some("jane")));
        assert_ne!(by_id, by_name);
    }

    #[test]
    fn test_nothing_usable_is_anonymous() {
        let key = resolve(&CandidateRef::default());
        assert_eq!(key.as_str(), "anonymous");
    }
}
