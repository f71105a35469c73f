//! Proposal lifecycle.
//!
//! A proposal is created on the voting machine's `NewProposal` and then moves
//! through stages driven by `StateChange` codes:
//!
//! | code | stage | extra |
//! |------|-------|-------|
//! | 1 | ExpiredInQueue | terminal |
//! | 2 | Executed | terminal |
//! | 3 | Queued | |
//! | 4 | PreBoosted | `pre_boosted_at = times[2]`, refresh confidence threshold |
//! | 5 | Boosted | `boosted_at = times[1]` |
//! | 6 | QuietEndingPeriod | `quiet_ending_period_began_at = times[1]` |
//!
//! Only valid proposals (non-zero params hash) are ever mutated. Everything
//! else is a silent no-op.

use super::dao;
use super::tally::{parse_outcome, Outcome};
use crate::chain::{ChainReader, MetadataFetcher, ProposalMetadata, VotingParams};
use crate::store::{Entity, EntityKind, EntityStore, EntityStoreExt, StoreResult};
use crate::types::{Address, Amount, Bytes32};
use serde::{Deserialize, Serialize};

pub const STAGE_EXPIRED_IN_QUEUE: u32 = 1;
pub const STAGE_EXECUTED: u32 = 2;
pub const STAGE_QUEUED: u32 = 3;
pub const STAGE_PRE_BOOSTED: u32 = 4;
pub const STAGE_BOOSTED: u32 = 5;
pub const STAGE_QUIET_ENDING_PERIOD: u32 = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    #[default]
    Queued,
    PreBoosted,
    Boosted,
    QuietEndingPeriod,
    Executed,
    ExpiredInQueue,
}

impl Stage {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            STAGE_EXPIRED_IN_QUEUE => Some(Stage::ExpiredInQueue),
            STAGE_EXECUTED => Some(Stage::Executed),
            STAGE_QUEUED => Some(Stage::Queued),
            STAGE_PRE_BOOSTED => Some(Stage::PreBoosted),
            STAGE_BOOSTED => Some(Stage::Boosted),
            STAGE_QUIET_ENDING_PERIOD => Some(Stage::QuietEndingPeriod),
            _ => None,
        }
    }

    /// No later stage change applies once a proposal is here.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Executed | Stage::ExpiredInQueue)
    }

    /// Stage codes whose crossing materializes staged rewards.
    pub fn triggers_materialize(code: u32) -> bool {
        code == STAGE_PRE_BOOSTED || code == STAGE_BOOSTED
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionState {
    #[default]
    None,
    QueueBarCrossed,
    QueueTimeOut,
    PreBoostedBarCrossed,
    BoostedTimeOut,
    BoostedBarCrossed,
}

impl ExecutionState {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(ExecutionState::QueueBarCrossed),
            2 => Some(ExecutionState::QueueTimeOut),
            3 => Some(ExecutionState::PreBoostedBarCrossed),
            4 => Some(ExecutionState::BoostedTimeOut),
            5 => Some(ExecutionState::BoostedBarCrossed),
            _ => None,
        }
    }
}

/// A governance proposal tracked by the voting machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: Bytes32,
    /// Owning organization (avatar address).
    pub dao: Address,
    pub organization_id: Bytes32,
    pub proposer: Address,
    /// Scheme that submitted the proposal.
    pub scheme: Address,
    pub voting_machine: Address,
    pub params_hash: Bytes32,
    #[serde(default)]
    pub num_of_choices: u32,

    pub stage: Stage,
    pub execution_state: ExecutionState,

    pub votes_for: Amount,
    pub votes_against: Amount,
    pub stakes_for: Amount,
    pub stakes_against: Amount,
    #[serde(default)]
    pub votes_count: u64,
    #[serde(default)]
    pub stakes_count: u64,
    pub confidence_threshold: Amount,

    pub submitted_at: u64,
    pub pre_boosted_at: u64,
    pub boosted_at: u64,
    pub quiet_ending_period_began_at: u64,
    pub executed_at: u64,

    #[serde(default)]
    pub winning_outcome: Option<Outcome>,
    #[serde(default)]
    pub total_reputation_at_execution: Option<Amount>,

    #[serde(default)]
    pub description_hash: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,

    /// Beneficiaries with at least one outstanding reward, insertion ordered.
    #[serde(default)]
    pub accounts_with_unclaimed_rewards: Vec<Address>,
}

impl Entity for Proposal {
    const KIND: EntityKind = EntityKind::Proposal;

    fn entity_id(&self) -> String {
        self.id.to_string()
    }
}

impl Proposal {
    /// Fresh proposal: Queued, no execution state, zero tallies.
    pub fn new(id: Bytes32) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.params_hash.is_zero()
    }

    pub fn has_unclaimed(&self, account: &Address) -> bool {
        self.accounts_with_unclaimed_rewards.contains(account)
    }

    /// Returns true if the account was added.
    pub fn add_unclaimed(&mut self, account: Address) -> bool {
        if self.has_unclaimed(&account) {
            return false;
        }
        self.accounts_with_unclaimed_rewards.push(account);
        true
    }

    /// Returns true if the account was removed.
    pub fn remove_unclaimed(&mut self, account: &Address) -> bool {
        let before = self.accounts_with_unclaimed_rewards.len();
        self.accounts_with_unclaimed_rewards.retain(|a| a != account);
        before != self.accounts_with_unclaimed_rewards.len()
    }
}

/// Voting-rule parameters snapshot, keyed by params hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingParamsRecord {
    pub params_hash: Bytes32,
    pub voting_machine: Address,
    pub params: VotingParams,
}

impl Entity for VotingParamsRecord {
    const KIND: EntityKind = EntityKind::VotingParams;

    fn entity_id(&self) -> String {
        self.params_hash.to_string()
    }
}

pub fn get_or_create(store: &dyn EntityStore, id: &Bytes32) -> StoreResult<Proposal> {
    Ok(store
        .load::<Proposal>(&id.to_string())?
        .unwrap_or_else(|| Proposal::new(*id)))
}

/// Load a proposal only if it exists and is valid.
pub fn load_valid(store: &dyn EntityStore, id: &Bytes32) -> StoreResult<Option<Proposal>> {
    match store.load::<Proposal>(&id.to_string())? {
        Some(proposal) if proposal.is_valid() => Ok(Some(proposal)),
        Some(_) => {
            tracing::debug!(proposal = %id, "ignoring event for invalid proposal");
            Ok(None)
        }
        None => {
            tracing::debug!(proposal = %id, "ignoring event for unknown proposal");
            Ok(None)
        }
    }
}

pub fn is_valid(store: &dyn EntityStore, id: &Bytes32) -> StoreResult<bool> {
    Ok(store
        .load::<Proposal>(&id.to_string())?
        .is_some_and(|p| p.is_valid()))
}

/// Fields carried by `NewProposal`.
#[derive(Debug, Clone)]
pub struct NewProposal<'a> {
    pub id: Bytes32,
    pub voting_machine: Address,
    pub organization: Address,
    pub organization_id: Bytes32,
    pub proposer: Address,
    pub scheme: Address,
    pub params_hash: Bytes32,
    pub num_of_choices: u32,
    pub description_hash: Option<&'a str>,
    pub timestamp: u64,
}

/// Record a submitted proposal.
///
/// A zero params hash marks a proposal from a scheme type this ledger does not
/// model; nothing is stored for it. An existing invalid proposal is left
/// untouched. Returns the stored proposal.
pub fn apply_new_proposal(
    store: &mut dyn EntityStore,
    chain: &dyn ChainReader,
    metadata: &dyn MetadataFetcher,
    new: &NewProposal<'_>,
) -> StoreResult<Option<Proposal>> {
    if new.params_hash.is_zero() {
        tracing::debug!(proposal = %new.id, "skipping proposal with zero params hash");
        return Ok(None);
    }

    let mut proposal = match store.load::<Proposal>(&new.id.to_string())? {
        Some(existing) if !existing.is_valid() => return Ok(None),
        Some(existing) => existing,
        None => Proposal::new(new.id),
    };

    proposal.dao = new.organization;
    proposal.organization_id = new.organization_id;
    proposal.proposer = new.proposer;
    proposal.scheme = new.scheme;
    proposal.voting_machine = new.voting_machine;
    proposal.params_hash = new.params_hash;
    proposal.num_of_choices = new.num_of_choices;
    proposal.submitted_at = new.timestamp;

    match chain.voting_params(new.voting_machine, new.params_hash) {
        Ok(params) => {
            store.save(&VotingParamsRecord {
                params_hash: new.params_hash,
                voting_machine: new.voting_machine,
                params,
            })?;
        }
        Err(e) => {
            tracing::warn!(
                proposal = %new.id,
                params_hash = %new.params_hash,
                error = %e,
                "voting params unavailable"
            );
            dao::record_read_failure(
                store,
                &new.organization,
                format!("voting_params({}): {}", new.params_hash, e),
            )?;
        }
    }

    if let Some(hash) = new.description_hash {
        proposal.description_hash = Some(hash.to_string());
        if let Some(meta) = ProposalMetadata::resolve(metadata, hash) {
            proposal.title = meta.title;
            proposal.description = meta.description;
            proposal.url = meta.url;
            proposal.tags = meta.tags;
        }
    }

    store.save(&proposal)?;
    tracing::info!(proposal = %proposal.id, dao = %proposal.dao, "new proposal");
    Ok(Some(proposal))
}

/// Apply a `StateChange` code. Returns the updated proposal, or `None` when
/// the event was ignored (invalid proposal, unknown code, terminal stage).
pub fn apply_stage_change(
    store: &mut dyn EntityStore,
    chain: &dyn ChainReader,
    id: &Bytes32,
    code: u32,
    timestamp: u64,
) -> StoreResult<Option<Proposal>> {
    let Some(mut proposal) = load_valid(store, id)? else {
        return Ok(None);
    };
    let Some(stage) = Stage::from_code(code) else {
        tracing::warn!(proposal = %id, code, "unknown stage code");
        return Ok(None);
    };
    if proposal.stage.is_terminal() && proposal.stage != stage {
        tracing::debug!(
            proposal = %id,
            current = ?proposal.stage,
            requested = ?stage,
            "proposal already terminal"
        );
        return Ok(None);
    }

    let times = match chain.proposal_times(proposal.voting_machine, *id) {
        Ok(times) => times.0,
        Err(e) => {
            tracing::warn!(proposal = %id, error = %e, "proposal times unavailable, using block time");
            [timestamp; 3]
        }
    };

    proposal.stage = stage;
    match stage {
        Stage::PreBoosted => {
            proposal.pre_boosted_at = times[2];
            match chain.proposal_snapshot(proposal.voting_machine, *id) {
                Ok(snapshot) => proposal.confidence_threshold = snapshot.confidence_threshold,
                Err(e) => {
                    tracing::warn!(proposal = %id, error = %e, "confidence threshold unavailable")
                }
            }
        }
        Stage::Boosted => proposal.boosted_at = times[1],
        Stage::QuietEndingPeriod => proposal.quiet_ending_period_began_at = times[1],
        Stage::Queued | Stage::Executed | Stage::ExpiredInQueue => {}
    }

    store.save(&proposal)?;
    tracing::info!(proposal = %id, stage = ?stage, "stage change");
    Ok(Some(proposal))
}

/// Apply `ExecuteProposal`: execution time, outcome and, when reported, the
/// total reputation at execution.
pub fn apply_execution(
    store: &mut dyn EntityStore,
    id: &Bytes32,
    decision: u32,
    total_reputation: Option<&Amount>,
    timestamp: u64,
) -> StoreResult<Option<Proposal>> {
    let Some(mut proposal) = load_valid(store, id)? else {
        return Ok(None);
    };
    proposal.executed_at = timestamp;
    proposal.winning_outcome = Some(parse_outcome(decision));
    if let Some(total) = total_reputation {
        proposal.total_reputation_at_execution = Some(total.clone());
    }
    store.save(&proposal)?;
    Ok(Some(proposal))
}

pub fn apply_execution_state(
    store: &mut dyn EntityStore,
    id: &Bytes32,
    code: u32,
) -> StoreResult<Option<Proposal>> {
    let Some(mut proposal) = load_valid(store, id)? else {
        return Ok(None);
    };
    let Some(state) = ExecutionState::from_code(code) else {
        tracing::warn!(proposal = %id, code, "unknown execution state code");
        return Ok(None);
    };
    proposal.execution_state = state;
    store.save(&proposal)?;
    Ok(Some(proposal))
}
