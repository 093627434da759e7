//! Test fixtures and helpers.
//!
//! Common setup code for integration tests. Everything here is stamped with
//! fixed times so checksums are reproducible.

use chrono::{DateTime, Duration, TimeZone, Utc};
use continuum::{
    Citation, CitationBuilder, EventBuilder, Keypair, SnapshotBuilder, StateSnapshot, Timeline,
};
use continuum_core::{CitationId, SnapshotId, Timestamp, VaultId};
use serde_json::{json, Value};

/// Citation ID used throughout the fixtures.
pub const ALICE_ID: &str = "mc_alice_primary_0000000001";
/// Vault ID used throughout the fixtures.
pub const ALICE_VAULT: &str = "vault_alice_main_00000001";
/// Creation time of the fixture citation.
pub const CREATED_AT: &str = "2025-11-14T10:00:00Z";

/// A deterministic identity with a keypair for attestations.
pub struct TestFixture {
    pub keypair: Keypair,
    pub citation_id: CitationId,
    pub vault_id: VaultId,
}

impl TestFixture {
    /// The standard Alice identity.
    pub fn new() -> Self {
        Self::with_seed([0x42; 32])
    }

    /// Alice with a keypair from `seed`.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self {
            keypair: Keypair::from_seed(&seed),
            citation_id: CitationId::parse(ALICE_ID).expect("fixture id is valid"),
            vault_id: VaultId::parse(ALICE_VAULT).expect("fixture vault is valid"),
        }
    }

    /// Fixed start time for timelines and snapshots.
    pub fn epoch(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 14, 10, 0, 0)
            .single()
            .expect("fixed date is valid")
    }

    /// The sealed citation, created at [`CREATED_AT`].
    pub fn citation(&self) -> Citation {
        CitationBuilder::new(self.citation_id.clone(), self.vault_id.clone())
            .created_at(Timestamp::parse(CREATED_AT).expect("fixture timestamp is valid"))
            .build()
    }

    /// A timeline with `session_start`, `memory_created`, `session_end`, one
    /// second apart, all by this identity.
    pub fn session_timeline(&self) -> Timeline {
        let mut timeline = Timeline::new(self.citation_id.as_str());
        let steps: [(&str, Option<Value>); 3] = [
            ("session_start", None),
            ("memory_created", Some(json!({"content": "prefers tea", "confidence": 0.95}))),
            ("session_end", None),
        ];
        for (i, (event_type, payload)) in steps.into_iter().enumerate() {
            let mut builder = EventBuilder::new(event_type, self.citation_id.as_str())
                .at(self.epoch() + Duration::seconds(i as i64));
            if let Some(payload) = payload {
                builder = builder.payload(payload);
            }
            timeline.append(builder).expect("fixture event is valid");
        }
        timeline
    }

    /// A snapshot of this identity embedding `timeline`'s summary.
    pub fn snapshot(&self, snapshot_id: &str, timeline: &Timeline) -> StateSnapshot {
        SnapshotBuilder::new(
            SnapshotId::parse(snapshot_id).expect("fixture snapshot id is valid"),
            json!({"citation_id": self.citation_id, "name": "alice"}),
        )
        .timestamp(Timestamp::from_datetime(self.epoch() + Duration::minutes(5)))
        .continuity_state(json!({"sessions": 1}))
        .vault_state(json!({"vault_id": self.vault_id}))
        .timeline_summary(&timeline.get_summary())
        .and_then(SnapshotBuilder::capture)
        .expect("fixture snapshot captures")
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A raw timeline document with three events where the middle one has no `actor`.
pub fn timeline_missing_actor() -> Value {
    json!({
        "timeline_id": ALICE_ID,
        "event_count": 3,
        "events": [
            {
                "id": "evt_20251114100000000000_00000000",
                "timestamp": "2025-11-14T10:00:00.000000Z",
                "event_type": "session_start",
                "actor": ALICE_ID
            },
            {
                "id": "evt_20251114100001000000_00000001",
                "timestamp": "2025-11-14T10:00:01.000000Z",
                "event_type": "memory_created"
            },
            {
                "id": "evt_20251114100002000000_00000002",
                "timestamp": "2025-11-14T10:00:02.000000Z",
                "event_type": "session_end",
                "actor": ALICE_ID
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_citation_is_stable() {
        let a = TestFixture::new().citation();
        let b = TestFixture::new().citation();
        assert_eq!(a.checksum, b.checksum);
        assert!(a.verify());
    }

    #[test]
    fn test_session_timeline() {
        let fixture = TestFixture::new();
        let timeline = fixture.session_timeline();
        assert_eq!(timeline.len(), 3);
        assert_eq!(
            timeline.events()[0].timestamp.as_str(),
            "2025-11-14T10:00:00.000000Z"
        );
    }

    #[test]
    fn test_snapshot_is_stable() {
        let fixture = TestFixture::new();
        let timeline = fixture.session_timeline();
        let a = fixture.snapshot("snap_001", &timeline);
        let b = fixture.snapshot("snap_001", &timeline);
        assert_eq!(a.checksum, b.checksum);
        a.verify().unwrap();
    }
}
