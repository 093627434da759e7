//! Strong type definitions for Continuum.
//!
//! Identifiers are newtypes over validated strings so that a vault ID can never
//! be passed where a citation ID is expected, and an event type is never
//! confused with an arbitrary payload string.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use crate::error::ValidationError;

/// Pattern every citation ID must match.
pub const CITATION_ID_PATTERN: &str = r"^mc_[a-z0-9_]{16,}$";

/// Pattern every vault ID must match.
pub const VAULT_ID_PATTERN: &str = r"^vault_[a-z0-9_]+$";

/// Semantic version pattern (major.minor.patch with optional pre-release/build).
pub const VERSION_PATTERN: &str =
    r"^(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)(-[0-9A-Za-z.-]+)?(\+[0-9A-Za-z.-]+)?$";

/// Match `value` against a lazily compiled pattern. A pattern that fails to
/// compile matches nothing, so every value it guards is rejected.
fn pattern_matches(cell: &'static OnceLock<Option<Regex>>, pattern: &str, value: &str) -> bool {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(value))
}

fn is_citation_id(value: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    pattern_matches(&RE, CITATION_ID_PATTERN, value)
}

fn is_vault_id(value: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    pattern_matches(&RE, VAULT_ID_PATTERN, value)
}

fn is_version(value: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    pattern_matches(&RE, VERSION_PATTERN, value)
}

/// Shared plumbing for string newtypes: accessors, formatting, and
/// validating serde conversions.
macro_rules! string_newtype {
    ($name:ident, $field:literal) => {
        impl $name {
            /// Borrow the underlying string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume into the underlying string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ValidationError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::parse(value.to_string())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl $name {
            #[allow(dead_code)]
            const FIELD: &'static str = $field;
        }
    };
}

/// Identifier of a Master Citation, e.g. `mc_alice_primary_0000000001`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CitationId(String);

impl CitationId {
    /// Validate and wrap a citation ID.
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if !is_citation_id(&value) {
            return Err(ValidationError::PatternMismatch {
                field: Self::FIELD.into(),
                pattern: CITATION_ID_PATTERN,
                value,
            });
        }
        Ok(Self(value))
    }

    /// Derive a citation ID from an identity name and a creation instant.
    ///
    /// Produces `mc_<name>_<YYYYmmdd_HHMMSS>`.
    pub fn derive(name: &str, at: DateTime<Utc>) -> Result<Self, ValidationError> {
        Self::parse(format!("mc_{}_{}", name, at.format("%Y%m%d_%H%M%S")))
    }
}

string_newtype!(CitationId, "id");

impl fmt::Debug for CitationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CitationId({})", self.0)
    }
}

/// Identifier of the storage location an identity is bound to.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VaultId(String);

impl VaultId {
    /// Validate and wrap a vault ID.
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if !is_vault_id(&value) {
            return Err(ValidationError::PatternMismatch {
                field: Self::FIELD.into(),
                pattern: VAULT_ID_PATTERN,
                value,
            });
        }
        Ok(Self(value))
    }
}

string_newtype!(VaultId, "vault_id");

impl fmt::Debug for VaultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VaultId({})", self.0)
    }
}

/// Semantic version string.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version(String);

impl Version {
    /// Validate and wrap a semantic version.
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if !is_version(&value) {
            return Err(ValidationError::PatternMismatch {
                field: Self::FIELD.into(),
                pattern: VERSION_PATTERN,
                value,
            });
        }
        Ok(Self(value))
    }
}

string_newtype!(Version, "version");

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({})", self.0)
    }
}

impl Default for Version {
    fn default() -> Self {
        Self("1.0.0".to_string())
    }
}

/// Identifier of a timeline event.
///
/// Events created by a timeline follow `evt_<timestamp>_<seq>`, but loaded
/// events may carry any non-empty ID.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventId(String);

impl EventId {
    /// Wrap a non-empty event ID.
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        non_empty(value.into(), Self::FIELD).map(Self)
    }

    /// Build the ID for the `seq`-th event stamped at `at`.
    ///
    /// Both parts are fixed width, so byte-wise ordering of IDs follows
    /// timestamp order first and sequence order second.
    pub fn generate(at: &Timestamp, seq: u64) -> Self {
        Self(format!("evt_{}_{:08}", at.compact(), seq))
    }
}

string_newtype!(EventId, "id");

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

/// Open-vocabulary event type (`session_start`, `memory_created`, ...).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventType(String);

impl EventType {
    /// Wrap a non-empty event type.
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        non_empty(value.into(), Self::FIELD).map(Self)
    }
}

string_newtype!(EventType, "event_type");

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventType({})", self.0)
    }
}

/// Identifier of a state snapshot.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SnapshotId(String);

impl SnapshotId {
    /// Wrap a non-empty snapshot ID.
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        non_empty(value.into(), Self::FIELD).map(Self)
    }
}

string_newtype!(SnapshotId, "snapshot_id");

impl fmt::Debug for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnapshotId({})", self.0)
    }
}

fn non_empty(value: String, field: &str) -> Result<String, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField {
            field: field.to_string(),
        });
    }
    Ok(value)
}

/// An ISO-8601 UTC timestamp.
///
/// The original text is kept verbatim so that documents hash identically after
/// a load/save cycle; comparisons use the parsed instant.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp {
    text: String,
    instant: DateTime<Utc>,
}

impl Timestamp {
    /// Parse an RFC 3339 timestamp, or an offset-less ISO-8601 one (taken as UTC).
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let text = value.into();
        match parse_instant(&text) {
            Some(instant) => Ok(Self { text, instant }),
            None => Err(ValidationError::InvalidTimestamp {
                field: "timestamp".into(),
                value: text,
            }),
        }
    }

    /// The current time, microsecond precision, `Z` suffix.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Render an instant in the canonical fixed-width form. Anything finer
    /// than a microsecond is dropped so the instant matches its text.
    pub fn from_datetime(instant: DateTime<Utc>) -> Self {
        let instant = instant.trunc_subsecs(6);
        Self {
            text: instant.to_rfc3339_opts(SecondsFormat::Micros, true),
            instant,
        }
    }

    /// The verbatim timestamp text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The parsed instant.
    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }

    /// Digits-only form used in event IDs (`YYYYmmddHHMMSSffffff`).
    pub fn compact(&self) -> String {
        self.instant.format("%Y%m%d%H%M%S%6f").to_string()
    }
}

fn parse_instant(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.instant
            .cmp(&other.instant)
            .then_with(|| self.text.cmp(&other.text))
    }
}

impl Hash for Timestamp {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.instant.hash(state);
        self.text.hash(state);
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.text)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl TryFrom<String> for Timestamp {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Timestamp> for String {
    fn from(value: Timestamp) -> Self {
        value.text
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(instant: DateTime<Utc>) -> Self {
        Self::from_datetime(instant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_citation_id_pattern() {
        assert!(CitationId::parse("mc_alice_primary_0000000001").is_ok());
        assert!(CitationId::parse("mc_short").is_err());
        assert!(CitationId::parse("mc_Alice_Primary_0000000001").is_err());
        assert!(CitationId::parse("xx_alice_primary_0000000001").is_err());
    }

    #[test]
    fn test_citation_id_derive() {
        let at = Utc.with_ymd_and_hms(2025, 11, 14, 10, 0, 0).unwrap();
        let id = CitationId::derive("alice", at).unwrap();
        assert_eq!(id.as_str(), "mc_alice_20251114_100000");
    }

    #[test]
    fn test_vault_id_pattern() {
        assert!(VaultId::parse("vault_alice_main_00000001").is_ok());
        assert!(VaultId::parse("vault_").is_err());
        assert!(VaultId::parse("alice_vault").is_err());
    }

    #[test]
    fn test_version_pattern() {
        assert!(Version::parse("1.0.0").is_ok());
        assert!(Version::parse("2.1.3-beta.1+build.5").is_ok());
        assert!(Version::parse("1.0").is_err());
        assert!(Version::parse("01.0.0").is_err());
    }

    #[test]
    fn test_event_type_rejects_empty() {
        assert!(EventType::parse("session_start").is_ok());
        assert!(matches!(
            EventType::parse("  "),
            Err(ValidationError::EmptyField { .. })
        ));
    }

    #[test]
    fn test_timestamp_forms() {
        let z = Timestamp::parse("2025-11-14T10:00:00Z").unwrap();
        let offset = Timestamp::parse("2025-11-14T10:00:00+00:00").unwrap();
        let naive = Timestamp::parse("2025-11-14T10:00:00.000001").unwrap();

        assert_eq!(z.instant(), offset.instant());
        assert!(naive > z);
        assert_eq!(z.as_str(), "2025-11-14T10:00:00Z");
        assert!(Timestamp::parse("yesterday").is_err());
    }

    #[test]
    fn test_timestamp_now_is_fixed_width() {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let ts = Timestamp::from_datetime(at);
        assert_eq!(ts.as_str(), "2025-01-02T03:04:05.000000Z");
        assert_eq!(ts.compact(), "20250102030405000000");
    }

    #[test]
    fn test_timestamp_drops_sub_microsecond_digits() {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
            + chrono::Duration::nanoseconds(123_456_789);
        let ts = Timestamp::from_datetime(at);
        assert_eq!(ts.as_str(), "2025-01-02T03:04:05.123456Z");
        assert_eq!(ts, Timestamp::parse(ts.as_str()).unwrap());

        let now = Timestamp::now();
        assert_eq!(now, Timestamp::parse(now.as_str()).unwrap());
    }

    #[test]
    fn test_id_patterns_compile() {
        for pattern in [CITATION_ID_PATTERN, VAULT_ID_PATTERN, VERSION_PATTERN] {
            assert!(Regex::new(pattern).is_ok(), "{}", pattern);
        }
        assert!(is_citation_id("mc_alice_primary_0000000001"));
        assert!(is_vault_id("vault_alice_main"));
        assert!(is_version("1.0.0-rc.1+build.5"));
        assert!(!is_version("1.0"));
    }

    #[test]
    fn test_event_id_ordering() {
        let ts = Timestamp::parse("2025-11-14T10:00:00Z").unwrap();
        let a = EventId::generate(&ts, 9);
        let b = EventId::generate(&ts, 10);
        assert!(a < b);
        assert_eq!(a.as_str(), "evt_20251114100000000000_00000009");
    }

    #[test]
    fn test_serde_validates() {
        let ok: CitationId = serde_json::from_str("\"mc_alice_primary_0000000001\"").unwrap();
        assert_eq!(ok, "mc_alice_primary_0000000001");
        let bad: Result<CitationId, _> = serde_json::from_str("\"nope\"");
        assert!(bad.is_err());
    }
}
