//! `show`: print entities from a snapshot as JSON.

use super::config::LedgerConfig;
use govledger::ledger::contribution::ContributionTerms;
use govledger::ledger::dao::{
    ControllerScheme, Dao, HolderIndex, Reputation, ReputationHolder, Token,
};
use govledger::ledger::event_log::{format_events, query_store, EventQuery, LedgerEvent};
use govledger::ledger::proposal::{Proposal, VotingParamsRecord};
use govledger::ledger::reward::{CandidateList, GpReward, PreGpReward};
use govledger::ledger::tally::{StakeRecord, TallyReceipt, VoteRecord};
use govledger::store::{Entity, EntityKind, EntityStore, EntityStoreExt, MemoryStore};
use std::path::PathBuf;

pub struct ShowArgs {
    pub kind: String,
    pub id: Option<String>,
    pub limit: Option<usize>,
    pub snapshot: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

pub fn execute(args: ShowArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = LedgerConfig::load_or_default(args.config.as_deref())?;
    super::init_logging(&config.logging)?;

    let snapshot_path = args.snapshot.unwrap_or_else(|| config.snapshot.path.clone());
    let store = MemoryStore::load_snapshot(&snapshot_path)?;
    println!("{}", render(&store, &args.kind, args.id.as_deref(), args.limit)?);
    Ok(())
}

/// Render one entity, or every entity of `kind` when `id` is absent.
/// The activity log without an id is listed most recent first.
pub fn render(
    store: &dyn EntityStore,
    kind: &str,
    id: Option<&str>,
    limit: Option<usize>,
) -> Result<String, Box<dyn std::error::Error>> {
    let kind = EntityKind::from_name(kind).ok_or_else(|| {
        let known: Vec<&str> = EntityKind::ALL.iter().map(|k| k.name()).collect();
        format!("Unknown kind '{}'. Known kinds: {}", kind, known.join(", "))
    })?;

    if kind == EntityKind::LedgerEvent && id.is_none() {
        let query = EventQuery {
            limit: limit.or(EventQuery::default().limit),
            ..Default::default()
        };
        return Ok(format_events(&query_store(store, &query)?));
    }

    let ids = match id {
        Some(id) => vec![id.to_string()],
        None => store.ids(kind)?,
    };
    let mut values = Vec::with_capacity(ids.len());
    for id in &ids {
        match entity_json(store, kind, id)? {
            Some(value) => values.push(value),
            None => return Err(format!("No {} with id '{}'", kind, id).into()),
        }
    }
    if let Some(limit) = limit {
        values.truncate(limit);
    }

    let output = match (id, values.len()) {
        (Some(_), _) => serde_json::to_string_pretty(&values[0])?,
        (None, 0) => format!("No {} entities found.", kind),
        (None, _) => serde_json::to_string_pretty(&values)?,
    };
    Ok(output)
}

fn entity_json(
    store: &dyn EntityStore,
    kind: EntityKind,
    id: &str,
) -> Result<Option<serde_json::Value>, Box<dyn std::error::Error>> {
    fn load<E: Entity>(
        store: &dyn EntityStore,
        id: &str,
    ) -> Result<Option<serde_json::Value>, Box<dyn std::error::Error>> {
        match store.load::<E>(id)? {
            Some(entity) => Ok(Some(serde_json::to_value(entity)?)),
            None => Ok(None),
        }
    }

    match kind {
        EntityKind::Proposal => load::<Proposal>(store, id),
        EntityKind::VotingParams => load::<VotingParamsRecord>(store, id),
        EntityKind::VoteRecord => load::<VoteRecord>(store, id),
        EntityKind::StakeRecord => load::<StakeRecord>(store, id),
        EntityKind::TallyReceipt => load::<TallyReceipt>(store, id),
        EntityKind::GpReward => load::<GpReward>(store, id),
        EntityKind::PreGpReward => load::<PreGpReward>(store, id),
        EntityKind::CandidateList => load::<CandidateList>(store, id),
        EntityKind::ContributionTerms => load::<ContributionTerms>(store, id),
        EntityKind::Dao => load::<Dao>(store, id),
        EntityKind::ControllerScheme => load::<ControllerScheme>(store, id),
        EntityKind::Token => load::<Token>(store, id),
        EntityKind::Reputation => load::<Reputation>(store, id),
        EntityKind::ReputationHolder => load::<ReputationHolder>(store, id),
        EntityKind::HolderIndex => load::<HolderIndex>(store, id),
        EntityKind::LedgerEvent => load::<LedgerEvent>(store, id),
    }
}
