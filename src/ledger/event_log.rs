//! Ledger activity log.
//!
//! - Append-only: an entry is never rewritten once stored
//! - Entry id = sha256(kind, subjects, timestamp), so re-delivery of the same
//!   action maps onto the same entry
//! - Ordered by timestamp, ties broken by id

use crate::store::{Entity, EntityKind, EntityStore, EntityStoreExt, StoreResult};
use crate::types::{Address, Bytes32};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Kind of recorded action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    NewDao,
    NewProposal,
    ProposalStageChange,
    Vote,
    Stake,
    NewReputationHolder,
}

impl EventType {
    fn tag(&self) -> &'static str {
        match self {
            EventType::NewDao => "NewDAO",
            EventType::NewProposal => "NewProposal",
            EventType::ProposalStageChange => "ProposalStageChange",
            EventType::Vote => "Vote",
            EventType::Stake => "Stake",
            EventType::NewReputationHolder => "NewReputationHolder",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub id: String,
    pub event_type: EventType,
    /// JSON payload describing the action.
    pub payload: String,
    pub dao: Option<Address>,
    pub proposal: Option<Bytes32>,
    pub account: Option<Address>,
    pub timestamp: u64,
}

impl Entity for LedgerEvent {
    const KIND: EntityKind = EntityKind::LedgerEvent;

    fn entity_id(&self) -> String {
        self.id.clone()
    }
}

/// Deterministic entry id.
pub fn event_id(event_type: EventType, subjects: &[&[u8]], timestamp: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(event_type.tag().as_bytes());
    for subject in subjects {
        hasher.update(subject);
    }
    hasher.update(timestamp.to_be_bytes());
    hex::encode(hasher.finalize())
}

impl LedgerEvent {
    /// Build an entry whose id covers `event_type`, the proposal and account
    /// references, any `extra` discriminators and the timestamp.
    pub fn new(
        event_type: EventType,
        payload: serde_json::Value,
        dao: Option<Address>,
        proposal: Option<Bytes32>,
        account: Option<Address>,
        extra: &[&[u8]],
        timestamp: u64,
    ) -> Self {
        let mut subjects: Vec<&[u8]> = Vec::with_capacity(2 + extra.len());
        if let Some(p) = &proposal {
            subjects.push(p.as_bytes());
        }
        if let Some(a) = &account {
            subjects.push(a.as_bytes());
        }
        if proposal.is_none() && account.is_none() {
            if let Some(d) = &dao {
                subjects.push(d.as_bytes());
            }
        }
        subjects.extend_from_slice(extra);

        Self {
            id: event_id(event_type, &subjects, timestamp),
            event_type,
            payload: payload.to_string(),
            dao,
            proposal,
            account,
            timestamp,
        }
    }
}

/// Store `entry` unless an entry with the same id exists. Returns true if
/// stored.
pub fn append(store: &mut dyn EntityStore, entry: &LedgerEvent) -> StoreResult<bool> {
    if store.exists::<LedgerEvent>(&entry.id)? {
        return Ok(false);
    }
    store.save(entry)?;
    tracing::debug!(id = %entry.id, kind = %entry.event_type, "logged");
    Ok(true)
}

/// Query options for the log.
#[derive(Debug, Clone)]
pub struct EventQuery {
    pub event_type: Option<EventType>,
    pub dao: Option<Address>,
    pub proposal: Option<Bytes32>,
    pub account: Option<Address>,
    /// Only entries strictly after this timestamp.
    pub after_timestamp: Option<u64>,
    /// Most recent entries kept.
    pub limit: Option<usize>,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            event_type: None,
            dao: None,
            proposal: None,
            account: None,
            after_timestamp: None,
            limit: Some(50),
        }
    }
}

/// Filter entries. Most recent first.
pub fn query_events(entries: &[LedgerEvent], query: &EventQuery) -> Vec<LedgerEvent> {
    let mut filtered: Vec<LedgerEvent> = entries
        .iter()
        .filter(|entry| {
            if query.event_type.is_some_and(|t| t != entry.event_type) {
                return false;
            }
            if query.dao.is_some() && query.dao != entry.dao {
                return false;
            }
            if query.proposal.is_some() && query.proposal != entry.proposal {
                return false;
            }
            if query.account.is_some() && query.account != entry.account {
                return false;
            }
            if query.after_timestamp.is_some_and(|ts| entry.timestamp <= ts) {
                return false;
            }
            true
        })
        .cloned()
        .collect();

    filtered.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));

    if let Some(limit) = query.limit {
        filtered.truncate(limit);
    }
    filtered
}

/// Load every entry from `store` and filter.
pub fn query_store(store: &dyn EntityStore, query: &EventQuery) -> StoreResult<Vec<LedgerEvent>> {
    Ok(query_events(&store.load_all::<LedgerEvent>()?, query))
}

pub fn format_events(entries: &[LedgerEvent]) -> String {
    if entries.is_empty() {
        return "No ledger events found.".to_string();
    }
    let mut output = String::new();
    for entry in entries {
        output.push_str(&format!(
            "{} {} {}\n  {}\n",
            entry.timestamp,
            entry.event_type,
            &entry.id[..entry.id.len().min(12)],
            entry.payload
        ));
    }
    output.trim_end().to_string()
}
