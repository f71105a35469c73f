//! Staged, materialized and redeemed rewards.
//!
//! Every vote or stake registers its account as a candidate of the proposal.
//! Candidates sit in a per-proposal staging list until the proposal crosses
//! into PreBoosted or Boosted; at that point the voting machine is asked what
//! each candidate can redeem and the answers are written into `GpReward`
//! rows. The staging list is deleted after each flush.
//!
//! Redemption events stamp per-kind timestamps. An account leaves the
//! proposal's unclaimed set once every reward it holds is redeemed and, for a
//! contribution proposal, every periodic reward has been paid out in full.

use super::contribution::ContributionTerms;
use super::dao;
use super::proposal::{load_valid, STAGE_BOOSTED};
use crate::chain::ChainReader;
use crate::store::{Entity, EntityKind, EntityStore, EntityStoreExt, StoreResult};
use crate::types::{compound_id, Address, Amount, Bytes32};
use serde::{Deserialize, Serialize};

/// Concrete reward amounts for one beneficiary of one proposal.
///
/// `None` means the kind never applied; a recorded amount is always
/// non-zero. A redeemed-at of zero means unredeemed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpReward {
    pub proposal: Bytes32,
    pub beneficiary: Address,
    pub dao: Address,
    pub tokens_for_staker: Option<Amount>,
    pub reputation_for_voter: Option<Amount>,
    pub reputation_for_proposer: Option<Amount>,
    pub dao_bounty_for_staker: Option<Amount>,
    pub tokens_for_staker_redeemed_at: u64,
    pub reputation_for_voter_redeemed_at: u64,
    pub reputation_for_proposer_redeemed_at: u64,
    pub dao_bounty_for_staker_redeemed_at: u64,
    /// Token the DAO bounty is paid in.
    pub staking_token: Option<Address>,
    pub created_at: u64,
}

impl Entity for GpReward {
    const KIND: EntityKind = EntityKind::GpReward;

    fn entity_id(&self) -> String {
        compound_id(&[&self.proposal, &self.beneficiary])
    }
}

impl GpReward {
    pub fn new(proposal: Bytes32, beneficiary: Address, dao: Address, created_at: u64) -> Self {
        Self {
            proposal,
            beneficiary,
            dao,
            tokens_for_staker: None,
            reputation_for_voter: None,
            reputation_for_proposer: None,
            dao_bounty_for_staker: None,
            tokens_for_staker_redeemed_at: 0,
            reputation_for_voter_redeemed_at: 0,
            reputation_for_proposer_redeemed_at: 0,
            dao_bounty_for_staker_redeemed_at: 0,
            staking_token: None,
            created_at,
        }
    }

    /// `(amount, redeemed_at)` for every kind.
    fn fields(&self) -> [(&Option<Amount>, u64); 4] {
        [
            (&self.tokens_for_staker, self.tokens_for_staker_redeemed_at),
            (&self.reputation_for_voter, self.reputation_for_voter_redeemed_at),
            (
                &self.reputation_for_proposer,
                self.reputation_for_proposer_redeemed_at,
            ),
            (&self.dao_bounty_for_staker, self.dao_bounty_for_staker_redeemed_at),
        ]
    }

    /// Every recorded kind carries a redemption stamp.
    pub fn fully_redeemed(&self) -> bool {
        self.fields()
            .iter()
            .all(|(amount, redeemed_at)| amount.is_none() || *redeemed_at != 0)
    }
}

/// Placeholder for a staged candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreGpReward {
    pub proposal: Bytes32,
    pub beneficiary: Address,
    pub created_at: u64,
}

impl Entity for PreGpReward {
    const KIND: EntityKind = EntityKind::PreGpReward;

    fn entity_id(&self) -> String {
        compound_id(&[&self.proposal, &self.beneficiary])
    }
}

/// Candidates staged since the last flush, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateList {
    pub proposal: Bytes32,
    pub beneficiaries: Vec<Address>,
}

impl Entity for CandidateList {
    const KIND: EntityKind = EntityKind::CandidateList;

    fn entity_id(&self) -> String {
        self.proposal.to_string()
    }
}

/// Which redemption event arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeemKind {
    /// Staker token payout.
    Tokens,
    /// Voter and proposer reputation.
    Reputation,
    DaoBounty,
}

/// Counts from one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeSummary {
    pub upserted: usize,
    pub discarded: usize,
}

/// Stage `beneficiary` for the next flush. Returns false if already staged.
pub fn register_candidate(
    store: &mut dyn EntityStore,
    proposal: &Bytes32,
    beneficiary: Address,
    timestamp: u64,
) -> StoreResult<bool> {
    let mut list = store
        .load::<CandidateList>(&proposal.to_string())?
        .unwrap_or_else(|| CandidateList {
            proposal: *proposal,
            beneficiaries: Vec::new(),
        });
    if list.beneficiaries.contains(&beneficiary) {
        return Ok(false);
    }
    list.beneficiaries.push(beneficiary);
    store.save(&list)?;
    store.save(&PreGpReward {
        proposal: *proposal,
        beneficiary,
        created_at: timestamp,
    })?;
    Ok(true)
}

/// Raise `field` to `fresh` unless that would lower it. Zero never lands.
fn raise(field: &mut Option<Amount>, fresh: Amount) -> bool {
    if fresh.is_zero() {
        return false;
    }
    match field {
        Some(current) if *current >= fresh => false,
        _ => {
            *field = Some(fresh);
            true
        }
    }
}

/// Whether `reward`'s owner has nothing left to claim on this proposal.
pub fn should_remove_from_unclaimed(
    reward: &GpReward,
    terms: Option<&ContributionTerms>,
) -> bool {
    reward.fully_redeemed() && terms.map_or(true, |t| t.periods_complete())
}

/// Flush the staging list of `proposal_id` into `GpReward` rows.
///
/// A proposal with nothing staged is left untouched.
pub fn materialize(
    store: &mut dyn EntityStore,
    chain: &dyn ChainReader,
    proposal_id: &Bytes32,
    timestamp: u64,
    voting_machine: Address,
    stage_code: u32,
) -> StoreResult<MaterializeSummary> {
    let mut summary = MaterializeSummary::default();
    let Some(mut proposal) = load_valid(store, proposal_id)? else {
        return Ok(summary);
    };
    let Some(list) = store.load::<CandidateList>(&proposal_id.to_string())? else {
        tracing::debug!(proposal = %proposal_id, "no staged candidates");
        return Ok(summary);
    };

    let scheme_registered = dao::is_scheme_registered(store, &proposal.dao, &proposal.scheme)?;
    let terms = store.load::<ContributionTerms>(&proposal_id.to_string())?;

    for beneficiary in &list.beneficiaries {
        let preview = if scheme_registered {
            chain
                .redemption_preview(voting_machine, *proposal_id, *beneficiary)
                .unwrap_or_else(|e| {
                    tracing::warn!(
                        proposal = %proposal_id,
                        beneficiary = %beneficiary,
                        error = %e,
                        "redemption preview failed, treating as zero"
                    );
                    Default::default()
                })
        } else {
            Default::default()
        };

        let bounty = if stage_code == STAGE_BOOSTED {
            match chain.dao_bounty_preview(voting_machine, *proposal_id, *beneficiary) {
                Ok(preview) => preview.potential,
                Err(e) => {
                    tracing::warn!(
                        proposal = %proposal_id,
                        beneficiary = %beneficiary,
                        error = %e,
                        "dao bounty preview failed, treating as zero"
                    );
                    Amount::zero()
                }
            }
        } else {
            Amount::zero()
        };

        let placeholder = compound_id(&[proposal_id, beneficiary]);
        if preview.tokens_for_staker.is_zero()
            && preview.reputation_for_voter.is_zero()
            && preview.reputation_for_proposer.is_zero()
            && bounty.is_zero()
        {
            tracing::debug!(proposal = %proposal_id, beneficiary = %beneficiary, "discarding zero reward");
            store.remove::<PreGpReward>(&placeholder)?;
            summary.discarded += 1;
            continue;
        }

        let mut reward = store
            .load::<GpReward>(&placeholder)?
            .unwrap_or_else(|| GpReward::new(*proposal_id, *beneficiary, proposal.dao, timestamp));
        let had_bounty = reward.dao_bounty_for_staker.is_some();
        raise(&mut reward.tokens_for_staker, preview.tokens_for_staker);
        raise(&mut reward.reputation_for_voter, preview.reputation_for_voter);
        raise(&mut reward.reputation_for_proposer, preview.reputation_for_proposer);
        raise(&mut reward.dao_bounty_for_staker, bounty);

        if !had_bounty && reward.dao_bounty_for_staker.is_some() {
            match chain.staking_token(voting_machine) {
                Ok(token) => reward.staking_token = Some(token),
                Err(e) => {
                    tracing::warn!(voting_machine = %voting_machine, error = %e, "staking token unavailable")
                }
            }
        }
        store.save(&reward)?;
        store.remove::<PreGpReward>(&placeholder)?;

        if should_remove_from_unclaimed(&reward, terms.as_ref()) {
            proposal.remove_unclaimed(beneficiary);
        } else {
            proposal.add_unclaimed(*beneficiary);
        }
        summary.upserted += 1;
    }

    store.remove::<CandidateList>(&proposal_id.to_string())?;
    store.save(&proposal)?;
    tracing::info!(
        proposal = %proposal_id,
        stage_code,
        upserted = summary.upserted,
        discarded = summary.discarded,
        "materialized rewards"
    );
    Ok(summary)
}

/// Stamp a redemption. Absent rows are a silent no-op.
///
/// Returns true if any timestamp was stamped.
pub fn redeem(
    store: &mut dyn EntityStore,
    kind: RedeemKind,
    proposal_id: &Bytes32,
    beneficiary: &Address,
    timestamp: u64,
) -> StoreResult<bool> {
    let Some(mut proposal) = load_valid(store, proposal_id)? else {
        return Ok(false);
    };
    let id = compound_id(&[proposal_id, beneficiary]);
    let Some(mut reward) = store.load::<GpReward>(&id)? else {
        tracing::debug!(proposal = %proposal_id, beneficiary = %beneficiary, "no reward to redeem");
        return Ok(false);
    };

    let mut stamped = false;
    let mut stamp = |amount: &Option<Amount>, redeemed_at: &mut u64| {
        if amount.is_some() && *redeemed_at == 0 {
            *redeemed_at = timestamp;
            stamped = true;
        }
    };
    match kind {
        RedeemKind::Tokens => stamp(
            &reward.tokens_for_staker,
            &mut reward.tokens_for_staker_redeemed_at,
        ),
        RedeemKind::Reputation => {
            stamp(
                &reward.reputation_for_voter,
                &mut reward.reputation_for_voter_redeemed_at,
            );
            stamp(
                &reward.reputation_for_proposer,
                &mut reward.reputation_for_proposer_redeemed_at,
            );
        }
        RedeemKind::DaoBounty => stamp(
            &reward.dao_bounty_for_staker,
            &mut reward.dao_bounty_for_staker_redeemed_at,
        ),
    }
    if !stamped {
        return Ok(false);
    }
    store.save(&reward)?;

    let terms = store.load::<ContributionTerms>(&proposal_id.to_string())?;
    if should_remove_from_unclaimed(&reward, terms.as_ref()) && proposal.remove_unclaimed(beneficiary)
    {
        store.save(&proposal)?;
    }
    tracing::debug!(proposal = %proposal_id, beneficiary = %beneficiary, ?kind, "redeemed");
    Ok(true)
}

/// Re-evaluate every account in the unclaimed set, e.g. after a periodic
/// payout advanced. Returns the accounts removed.
pub fn refresh_unclaimed(
    store: &mut dyn EntityStore,
    proposal_id: &Bytes32,
) -> StoreResult<Vec<Address>> {
    let Some(mut proposal) = load_valid(store, proposal_id)? else {
        return Ok(Vec::new());
    };
    let terms = store.load::<ContributionTerms>(&proposal_id.to_string())?;

    let mut removed = Vec::new();
    for owner in proposal.accounts_with_unclaimed_rewards.clone() {
        let Some(reward) = store.load::<GpReward>(&compound_id(&[proposal_id, &owner]))? else {
            continue;
        };
        if should_remove_from_unclaimed(&reward, terms.as_ref()) {
            proposal.remove_unclaimed(&owner);
            removed.push(owner);
        }
    }
    if !removed.is_empty() {
        store.save(&proposal)?;
    }
    Ok(removed)
}
