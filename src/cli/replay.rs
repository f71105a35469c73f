//! `replay`: apply a JSON-lines event file to a snapshot.

use super::config::LedgerConfig;
use govledger::chain::{DirMetadata, MetadataFetcher, NoMetadata, RecordedChain};
use govledger::events::ChainEvent;
use govledger::ledger::{Ledger, ReplayStats};
use govledger::serialization::from_json_lines;
use govledger::store::{EntityKind, MemoryStore};
use std::fs;
use std::path::{Path, PathBuf};

pub struct ReplayArgs {
    pub events: PathBuf,
    pub chain: PathBuf,
    pub metadata: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub snapshot: Option<PathBuf>,
}

pub fn execute(args: ReplayArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = LedgerConfig::load_or_default(args.config.as_deref())?;
    super::init_logging(&config.logging)?;

    let snapshot_path = args.snapshot.unwrap_or_else(|| config.snapshot.path.clone());
    let (stats, store) = run(
        &args.events,
        &args.chain,
        args.metadata.as_deref(),
        &config,
        &snapshot_path,
    )?;

    println!("Applied {} events", stats.events);
    for (kind, count) in &stats.by_kind {
        println!("  {:<24} {}", kind, count);
    }
    println!("Snapshot: {}", snapshot_path.display());
    for kind in EntityKind::ALL {
        let count = store.count(kind);
        if count > 0 {
            println!("  {:<24} {}", kind, count);
        }
    }
    Ok(())
}

/// Replay `events` on top of the snapshot at `snapshot_path` and write it
/// back. Returns the stats and the resulting store.
pub fn run(
    events: &Path,
    chain: &Path,
    metadata: Option<&Path>,
    config: &LedgerConfig,
    snapshot_path: &Path,
) -> Result<(ReplayStats, MemoryStore), Box<dyn std::error::Error>> {
    let text = fs::read_to_string(events)
        .map_err(|e| format!("Failed to read events '{}': {}", events.display(), e))?;
    let events: Vec<ChainEvent> = from_json_lines(&text)?;
    let chain = RecordedChain::load(chain)?;
    let store = MemoryStore::load_snapshot(snapshot_path)?;
    let versions = config.contracts.registry();

    tracing::info!(
        events = events.len(),
        snapshot = %snapshot_path.display(),
        "replaying"
    );

    let (stats, store) = match metadata {
        Some(dir) => apply(
            Ledger::with_versions(store, chain, DirMetadata::new(dir), versions),
            &events,
        )?,
        None => apply(
            Ledger::with_versions(store, chain, NoMetadata, versions),
            &events,
        )?,
    };
    store.save_snapshot(snapshot_path)?;
    Ok((stats, store))
}

fn apply<M: MetadataFetcher>(
    mut ledger: Ledger<MemoryStore, RecordedChain, M>,
    events: &[ChainEvent],
) -> Result<(ReplayStats, MemoryStore), Box<dyn std::error::Error>> {
    let stats = ledger.replay(events)?;
    Ok((stats, ledger.into_store()))
}
