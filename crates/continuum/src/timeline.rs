//! Append-only event timeline for one identity.
//!
//! Events are only ever appended. IDs are `evt_<time>_<seq>` with a clock that
//! never runs backwards within a timeline, so sorting by ID, by timestamp and
//! by insertion order all agree for events this timeline created.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use continuum_core::validation::{
    as_mapping, require_event_id, require_event_type, require_non_empty, require_timestamp,
};
use continuum_core::{checksum, strip_field, EventId, EventType, Timestamp, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::document::{read_document_as, write_document, Format};
use crate::error::{DocumentKind, Error, Result};

/// One entry in a timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub event_type: EventType,
    /// Who performed the action, usually a citation ID.
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_vault_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Optional seal over the event minus this field. Loaded events may carry
    /// arbitrary text here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl TimelineEvent {
    pub fn to_value(&self) -> Value {
        // Plain derived struct of strings and values; cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Checksum of the event without its `checksum` field.
    pub fn compute_checksum(&self) -> continuum_core::Checksum {
        checksum(&strip_field(&self.to_value(), "checksum"))
    }

    /// Whether the stored seal matches. `None` when the event is unsealed.
    pub fn verify_checksum(&self) -> Option<bool> {
        self.checksum
            .as_deref()
            .map(|expected| self.compute_checksum().matches_hex(expected))
    }
}

/// Builder for events with optional fields. Pass to [`Timeline::append`].
#[derive(Debug, Clone)]
pub struct EventBuilder {
    event_type: String,
    actor: String,
    payload: Option<Value>,
    related_vault_id: Option<String>,
    related_agent_id: Option<String>,
    related_session_id: Option<String>,
    tags: Vec<String>,
    at: Option<DateTime<Utc>>,
    seal: bool,
}

impl EventBuilder {
    pub fn new(event_type: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            actor: actor.into(),
            payload: None,
            related_vault_id: None,
            related_agent_id: None,
            related_session_id: None,
            tags: Vec::new(),
            at: None,
            seal: false,
        }
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn related_vault(mut self, vault_id: impl Into<String>) -> Self {
        self.related_vault_id = Some(vault_id.into());
        self
    }

    pub fn related_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.related_agent_id = Some(agent_id.into());
        self
    }

    pub fn related_session(mut self, session_id: impl Into<String>) -> Self {
        self.related_session_id = Some(session_id.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Stamp the event at `at` instead of the current time. The timeline
    /// still clamps it to be no earlier than its previous event.
    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = Some(at);
        self
    }

    /// Store a checksum of the event in its `checksum` field.
    pub fn sealed(mut self) -> Self {
        self.seal = true;
        self
    }
}

/// Predicates for [`Timeline::get_events`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub event_type: Option<String>,
    pub actor: Option<String>,
    pub limit: Option<usize>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Return at most `limit` events, the earliest first.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, event: &TimelineEvent) -> bool {
        self.event_type
            .as_deref()
            .map_or(true, |t| event.event_type == t)
            && self.actor.as_deref().map_or(true, |a| event.actor == a)
    }
}

/// Iterator over the events matching a filter. Clone it to iterate again.
#[derive(Debug, Clone)]
pub struct Events<'a> {
    inner: std::slice::Iter<'a, TimelineEvent>,
    filter: EventFilter,
    remaining: Option<usize>,
}

impl<'a> Iterator for Events<'a> {
    type Item = &'a TimelineEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            return None;
        }
        let event = self.inner.by_ref().find(|e| self.filter.matches(e))?;
        if let Some(n) = self.remaining.as_mut() {
            *n -= 1;
        }
        Some(event)
    }
}

/// First and last timestamps of a timeline, in sequence order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timespan {
    pub first: Option<Timestamp>,
    pub last: Option<Timestamp>,
}

/// Aggregate statistics over a timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineSummary {
    pub timeline_id: String,
    pub total_events: usize,
    pub event_types: BTreeMap<String, usize>,
    pub unique_actors: usize,
    pub timespan: Timespan,
}

/// Why a stored event was rejected on load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventProblem {
    #[error("{0}")]
    Invalid(ValidationError),

    #[error("invalid event: {0}")]
    Decode(String),

    #[error("duplicate event id {0}")]
    DuplicateId(String),
}

/// A rejected event and its position in the stored sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("events[{index}]: {problem}")]
pub struct EventError {
    pub index: usize,
    pub problem: EventProblem,
}

/// Non-fatal inconsistencies found on load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// `event_count` differs from the number of stored events.
    CountMismatch { declared: u64, actual: usize },
    /// A kept event is stamped earlier than the one before it.
    OutOfOrder { index: usize, id: String },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::CountMismatch { declared, actual } => {
                write!(f, "event_count is {} but {} events are stored", declared, actual)
            }
            LoadWarning::OutOfOrder { index, id } => {
                write!(f, "events[{}] ({}) is earlier than the event before it", index, id)
            }
        }
    }
}

/// Everything a load found wrong without failing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub errors: Vec<EventError>,
    pub warnings: Vec<LoadWarning>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    /// Indices of rejected events.
    pub fn rejected_indices(&self) -> Vec<usize> {
        self.errors.iter().map(|e| e.index).collect()
    }
}

/// A loaded timeline with the problems found while loading it.
#[derive(Debug, Clone)]
pub struct TimelineLoad {
    pub timeline: Timeline,
    pub report: LoadReport,
}

/// An append-only ordered log of events.
#[derive(Debug, Clone)]
pub struct Timeline {
    timeline_id: String,
    events: Vec<TimelineEvent>,
    ids: HashSet<EventId>,
    clock: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct TimelineDocument<'a> {
    timeline_id: &'a str,
    event_count: usize,
    events: &'a [TimelineEvent],
}

impl Timeline {
    pub fn new(timeline_id: impl Into<String>) -> Self {
        Self {
            timeline_id: timeline_id.into(),
            events: Vec::new(),
            ids: HashSet::new(),
            clock: None,
        }
    }

    pub fn timeline_id(&self) -> &str {
        &self.timeline_id
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Append an event stamped with the current time.
    pub fn append_event(
        &mut self,
        event_type: &str,
        actor: &str,
        payload: Option<Value>,
    ) -> Result<TimelineEvent> {
        let mut builder = EventBuilder::new(event_type, actor);
        builder.payload = payload;
        self.append(builder)
    }

    /// Append an event described by a builder.
    pub fn append(&mut self, builder: EventBuilder) -> Result<TimelineEvent> {
        let document = format!("event for timeline {}", self.timeline_id);
        let event_type = EventType::parse(builder.event_type)
            .map_err(|e| Error::invalid(&document, e))?;
        if builder.actor.trim().is_empty() {
            return Err(Error::invalid(
                &document,
                ValidationError::EmptyField {
                    field: "actor".into(),
                },
            ));
        }

        let requested = builder.at.unwrap_or_else(Utc::now);
        let instant = match self.clock {
            Some(last) if requested < last => last,
            _ => requested,
        };
        let timestamp = Timestamp::from_datetime(instant);
        let id = self.next_id(&timestamp);

        let mut event = TimelineEvent {
            id,
            timestamp,
            event_type,
            actor: builder.actor,
            payload: builder.payload,
            related_vault_id: builder.related_vault_id,
            related_agent_id: builder.related_agent_id,
            related_session_id: builder.related_session_id,
            tags: builder.tags,
            checksum: None,
        };
        if builder.seal {
            event.checksum = Some(event.compute_checksum().to_hex());
        }

        tracing::debug!(
            timeline = %self.timeline_id,
            id = %event.id,
            event_type = %event.event_type,
            "appended event"
        );
        self.clock = Some(event.timestamp.instant());
        self.ids.insert(event.id.clone());
        self.events.push(event.clone());
        Ok(event)
    }

    fn next_id(&self, timestamp: &Timestamp) -> EventId {
        let mut seq = self.events.len() as u64;
        loop {
            let id = EventId::generate(timestamp, seq);
            if !self.ids.contains(&id) {
                return id;
            }
            seq += 1;
        }
    }

    /// Events matching `filter`, in insertion order.
    pub fn get_events(&self, filter: &EventFilter) -> Events<'_> {
        Events {
            inner: self.events.iter(),
            filter: filter.clone(),
            remaining: filter.limit,
        }
    }

    pub fn get_event(&self, id: &str) -> Option<&TimelineEvent> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn get_summary(&self) -> TimelineSummary {
        let mut event_types = BTreeMap::new();
        let mut actors = BTreeSet::new();
        for event in &self.events {
            *event_types
                .entry(event.event_type.to_string())
                .or_insert(0) += 1;
            actors.insert(event.actor.as_str());
        }
        TimelineSummary {
            timeline_id: self.timeline_id.clone(),
            total_events: self.events.len(),
            event_types,
            unique_actors: actors.len(),
            timespan: Timespan {
                first: self.events.first().map(|e| e.timestamp.clone()),
                last: self.events.last().map(|e| e.timestamp.clone()),
            },
        }
    }

    /// All events as plain structured values.
    pub fn export_events(&self) -> Vec<Value> {
        self.events.iter().map(TimelineEvent::to_value).collect()
    }

    /// The persisted form: `timeline_id`, `event_count` and `events`.
    pub fn to_document(&self) -> Result<Value> {
        let document = TimelineDocument {
            timeline_id: &self.timeline_id,
            event_count: self.events.len(),
            events: &self.events,
        };
        serde_json::to_value(&document)
            .map_err(|e| Error::malformed(format!("timeline {}", self.timeline_id), e))
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.write_to(path.as_ref(), true)
    }

    pub(crate) fn write_to(&self, path: &Path, pretty: bool) -> Result<()> {
        write_document(path, &self.to_document()?, Format::Json, pretty)?;
        tracing::info!(
            timeline = %self.timeline_id,
            events = self.events.len(),
            path = %path.display(),
            "saved timeline"
        );
        Ok(())
    }

    /// Load a timeline file, keeping every event that validates.
    ///
    /// A missing or unparseable file, or one without `timeline_id` and
    /// `events`, is an error. Invalid individual events are dropped and
    /// reported in [`TimelineLoad::report`].
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<TimelineLoad> {
        let path = path.as_ref();
        let value = read_document_as(path, DocumentKind::Timeline, Format::Json)?;
        let loaded = Self::from_document(&value, &path.display().to_string())?;
        tracing::info!(
            timeline = %loaded.timeline.timeline_id,
            events = loaded.timeline.len(),
            rejected = loaded.report.errors.len(),
            path = %path.display(),
            "loaded timeline"
        );
        Ok(loaded)
    }

    /// Build a timeline from its parsed document.
    pub fn from_document(value: &Value, document: &str) -> Result<TimelineLoad> {
        let map = as_mapping(value).map_err(|e| Error::invalid(document, e))?;
        let timeline_id = require_non_empty(map, "timeline_id")
            .map_err(|e| Error::invalid(document, e))?
            .to_string();
        let raw_events = match map.get("events") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(Error::invalid(
                    document,
                    ValidationError::WrongType {
                        field: "events".into(),
                        expected: "a list",
                    },
                ))
            }
            None => {
                return Err(Error::invalid(
                    document,
                    ValidationError::MissingField("events".into()),
                ))
            }
        };

        let (events, mut report) = collect_events(raw_events);
        if let Some(declared) = map.get("event_count") {
            match declared.as_u64() {
                Some(n) if n as usize == raw_events.len() => {}
                Some(n) => report.warnings.push(LoadWarning::CountMismatch {
                    declared: n,
                    actual: raw_events.len(),
                }),
                None => {
                    return Err(Error::invalid(
                        document,
                        ValidationError::WrongType {
                            field: "event_count".into(),
                            expected: "a non-negative integer",
                        },
                    ))
                }
            }
        }

        for error in &report.errors {
            tracing::warn!(document, %error, "rejected timeline event");
        }
        for warning in &report.warnings {
            tracing::warn!(document, %warning, "timeline inconsistency");
        }

        let clock = events.iter().map(|e| e.timestamp.instant()).max();
        let ids = events.iter().map(|e| e.id.clone()).collect();
        Ok(TimelineLoad {
            timeline: Timeline {
                timeline_id,
                events,
                ids,
                clock,
            },
            report,
        })
    }
}

/// Check stored events without building a timeline.
pub fn validate_events(raw_events: &[Value]) -> LoadReport {
    collect_events(raw_events).1
}

fn collect_events(raw_events: &[Value]) -> (Vec<TimelineEvent>, LoadReport) {
    let mut events: Vec<TimelineEvent> = Vec::with_capacity(raw_events.len());
    let mut seen = HashSet::new();
    let mut report = LoadReport::default();

    for (index, raw) in raw_events.iter().enumerate() {
        let event = match parse_event(raw) {
            Ok(event) => event,
            Err(problem) => {
                report.errors.push(EventError { index, problem });
                continue;
            }
        };
        if !seen.insert(event.id.clone()) {
            report.errors.push(EventError {
                index,
                problem: EventProblem::DuplicateId(event.id.to_string()),
            });
            continue;
        }
        if let Some(previous) = events.last() {
            if event.timestamp < previous.timestamp {
                report.warnings.push(LoadWarning::OutOfOrder {
                    index,
                    id: event.id.to_string(),
                });
            }
        }
        events.push(event);
    }
    (events, report)
}

fn parse_event(raw: &Value) -> std::result::Result<TimelineEvent, EventProblem> {
    let map: &Map<String, Value> = as_mapping(raw).map_err(EventProblem::Invalid)?;
    require_event_id(map, "id").map_err(EventProblem::Invalid)?;
    require_timestamp(map, "timestamp").map_err(EventProblem::Invalid)?;
    require_event_type(map, "event_type").map_err(EventProblem::Invalid)?;
    require_non_empty(map, "actor").map_err(EventProblem::Invalid)?;
    serde_json::from_value(raw.clone()).map_err(|e| EventProblem::Decode(e.to_string()))
}
