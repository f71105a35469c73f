//! Vote and stake accumulation.
//!
//! Per-account records keep the first option ever seen while the proposal
//! tallies follow the option of each individual call. The two can diverge
//! when an account votes or stakes on both sides; that asymmetry is kept as
//! observed on chain.
//!
//! Every accumulation is guarded by a `TallyReceipt` keyed by the log entry,
//! so re-delivering the same event adds nothing.

use super::proposal::Proposal;
use crate::events::EventKey;
use crate::store::{Entity, EntityKind, EntityStore, EntityStoreExt, StoreResult};
use crate::types::{compound_id, Address, Amount, Bytes32};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Option code the voting machine uses for "yes".
pub const OPTION_YES: u32 = 1;

/// Final decision of an executed proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Pass,
    Fail,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pass => write!(f, "Pass"),
            Outcome::Fail => write!(f, "Fail"),
        }
    }
}

/// 1 passes, anything else fails.
pub fn parse_outcome(decision: u32) -> Outcome {
    if decision == OPTION_YES {
        Outcome::Pass
    } else {
        Outcome::Fail
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub proposal: Bytes32,
    pub voter: Address,
    pub dao: Address,
    /// First option seen for this voter.
    pub option: u32,
    pub weight: Amount,
    pub created_at: u64,
}

impl Entity for VoteRecord {
    const KIND: EntityKind = EntityKind::VoteRecord;

    fn entity_id(&self) -> String {
        compound_id(&[&self.proposal, &self.voter])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeRecord {
    pub proposal: Bytes32,
    pub staker: Address,
    pub dao: Address,
    /// First option seen for this staker.
    pub option: u32,
    pub amount: Amount,
    pub created_at: u64,
}

impl Entity for StakeRecord {
    const KIND: EntityKind = EntityKind::StakeRecord;

    fn entity_id(&self) -> String {
        compound_id(&[&self.proposal, &self.staker])
    }
}

/// Marks a log entry as already accumulated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyReceipt {
    pub key: EventKey,
    pub proposal: Bytes32,
    pub account: Address,
}

impl Entity for TallyReceipt {
    const KIND: EntityKind = EntityKind::TallyReceipt;

    fn entity_id(&self) -> String {
        self.key.to_string()
    }
}

fn take_receipt(
    store: &mut dyn EntityStore,
    key: EventKey,
    proposal: Bytes32,
    account: Address,
) -> StoreResult<bool> {
    if store.exists::<TallyReceipt>(&key.to_string())? {
        tracing::debug!(key = %key, "already accumulated");
        return Ok(false);
    }
    store.save(&TallyReceipt {
        key,
        proposal,
        account,
    })?;
    Ok(true)
}

/// Accumulate a vote. The caller persists `proposal` afterwards.
///
/// Returns false when this log entry was already applied.
pub fn record_vote(
    store: &mut dyn EntityStore,
    proposal: &mut Proposal,
    key: EventKey,
    voter: Address,
    option: u32,
    weight: &Amount,
    timestamp: u64,
) -> StoreResult<bool> {
    if !take_receipt(store, key, proposal.id, voter)? {
        return Ok(false);
    }

    let id = compound_id(&[&proposal.id, &voter]);
    let record = match store.load::<VoteRecord>(&id)? {
        Some(mut existing) => {
            existing.weight += weight;
            existing
        }
        None => {
            proposal.votes_count += 1;
            VoteRecord {
                proposal: proposal.id,
                voter,
                dao: proposal.dao,
                option,
                weight: weight.clone(),
                created_at: timestamp,
            }
        }
    };
    store.save(&record)?;

    if option == OPTION_YES {
        proposal.votes_for += weight;
    } else {
        proposal.votes_against += weight;
    }
    Ok(true)
}

/// Accumulate a stake. Same rules as [`record_vote`].
pub fn record_stake(
    store: &mut dyn EntityStore,
    proposal: &mut Proposal,
    key: EventKey,
    staker: Address,
    option: u32,
    amount: &Amount,
    timestamp: u64,
) -> StoreResult<bool> {
    if !take_receipt(store, key, proposal.id, staker)? {
        return Ok(false);
    }

    let id = compound_id(&[&proposal.id, &staker]);
    let record = match store.load::<StakeRecord>(&id)? {
        Some(mut existing) => {
            existing.amount += amount;
            existing
        }
        None => {
            proposal.stakes_count += 1;
            StakeRecord {
                proposal: proposal.id,
                staker,
                dao: proposal.dao,
                option,
                amount: amount.clone(),
                created_at: timestamp,
            }
        }
    };
    store.save(&record)?;

    if option == OPTION_YES {
        proposal.stakes_for += amount;
    } else {
        proposal.stakes_against += amount;
    }
    Ok(true)
}
