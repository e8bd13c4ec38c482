use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a completion-trackable unit (a lesson, section, chapter).
///
/// Unit ids are opaque strings assigned by the content service; the engine
/// never parses or interprets them.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    /// Creates a new `UnitId`
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the underlying string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of a content entity that owns a completion map (a book,
/// a course, a video).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(String);

impl ScopeId {
    /// Creates a new `ScopeId`
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the underlying string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnitId({})", self.0)
    }
}

impl fmt::Debug for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeId({})", self.0)
    }
}

// ─── Display / Conversions ─────────────────────────────────────────────────────

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UnitId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for UnitId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ScopeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ScopeId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

// ─── Scope Type ────────────────────────────────────────────────────────────────

/// Content-type discriminant for a tracked scope.
///
/// The original data carried this implicitly in the shape of its tree nodes;
/// here it is an explicit tag chosen at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeType {
    Course,
    Book,
    Video,
}

impl ScopeType {
    /// Stable lowercase name, used in cache keys and remote paths.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeType::Course => "course",
            ScopeType::Book => "book",
            ScopeType::Video => "video",
        }
    }
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for parsing a scope type from a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseScopeTypeError {
    value: String,
}

impl fmt::Display for ParseScopeTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown scope type: {}", self.value)
    }
}

impl std::error::Error for ParseScopeTypeError {}

impl FromStr for ScopeType {
    type Err = ParseScopeTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "course" => Ok(ScopeType::Course),
            "book" => Ok(ScopeType::Book),
            "video" => Ok(ScopeType::Video),
            other => Err(ParseScopeTypeError {
                value: other.to_string(),
            }),
        }
    }
}

// ─── Scope Key ─────────────────────────────────────────────────────────────────

/// The (content-type, content-id) pair that owns one completion map and one
/// stats value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeKey {
    pub scope_type: ScopeType,
    pub scope_id: ScopeId,
}

impl ScopeKey {
    #[must_use]
    pub fn new(scope_type: ScopeType, scope_id: impl Into<ScopeId>) -> Self {
        Self {
            scope_type,
            scope_id: scope_id.into(),
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope_type, self.scope_id)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_id_display() {
        let id = UnitId::new("ch-1");
        assert_eq!(id.to_string(), "ch-1");
    }

    #[test]
    fn test_scope_type_round_trip() {
        for ty in [ScopeType::Course, ScopeType::Book, ScopeType::Video] {
            let parsed: ScopeType = ty.as_str().parse().unwrap();
            assert_eq!(parsed, ty);
        }
    }

    #[test]
    fn test_scope_type_from_str_invalid() {
        let result = "podcast".parse::<ScopeType>();
        assert!(result.is_err());
    }

    #[test]
    fn test_scope_key_display() {
        let key = ScopeKey::new(ScopeType::Book, "b42");
        assert_eq!(key.to_string(), "book:b42");
    }
}
