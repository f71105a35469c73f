//! Contribution-reward proposals.
//!
//! A contribution scheme pays a beneficiary up to four reward kinds, either
//! all at once or one period at a time. While any periodic reward still has
//! periods left, nobody is dropped from the proposal's unclaimed set.

use super::proposal::load_valid;
use super::reward;
use crate::chain::{ChainReader, ContributionKind};
use crate::events::RedemptionMode;
use crate::store::{Entity, EntityKind, EntityStore, EntityStoreExt, StoreResult};
use crate::types::{Address, Amount, Bytes32};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionTerms {
    pub proposal: Bytes32,
    pub dao: Address,
    /// Scheme contract that emitted the proposal.
    pub scheme: Address,
    pub beneficiary: Address,
    pub reputation_reward: Amount,
    pub native_token_reward: Amount,
    pub ether_reward: Amount,
    pub external_token_reward: Amount,
    pub external_token: Option<Address>,
    pub period_length: u64,
    pub periods: u64,
    pub mode: RedemptionMode,
    /// Periods paid out so far, per kind.
    #[serde(default)]
    pub redeemed_periods: BTreeMap<ContributionKind, u64>,
    /// First redemption time, per kind.
    #[serde(default)]
    pub redeemed_at: BTreeMap<ContributionKind, u64>,
    pub created_at: u64,
}

impl Entity for ContributionTerms {
    const KIND: EntityKind = EntityKind::ContributionTerms;

    fn entity_id(&self) -> String {
        self.proposal.to_string()
    }
}

impl ContributionTerms {
    pub fn reward(&self, kind: ContributionKind) -> &Amount {
        match kind {
            ContributionKind::Reputation => &self.reputation_reward,
            ContributionKind::NativeToken => &self.native_token_reward,
            ContributionKind::Ether => &self.ether_reward,
            ContributionKind::ExternalToken => &self.external_token_reward,
        }
    }

    pub fn periods_redeemed(&self, kind: ContributionKind) -> u64 {
        self.redeemed_periods.get(&kind).copied().unwrap_or(0)
    }

    /// Every kind with a non-zero reward has been paid for all periods.
    /// Always true for atomic payouts.
    pub fn periods_complete(&self) -> bool {
        if self.mode == RedemptionMode::Atomic {
            return true;
        }
        ContributionKind::ALL
            .iter()
            .filter(|kind| !self.reward(**kind).is_zero())
            .all(|kind| self.periods_redeemed(*kind) >= self.periods)
    }
}

/// Record the terms of a contribution proposal. Existing terms are kept so
/// re-delivery does not reset redemption progress.
pub fn record_terms(
    store: &mut dyn EntityStore,
    terms: ContributionTerms,
) -> StoreResult<bool> {
    if load_valid(store, &terms.proposal)?.is_none() {
        return Ok(false);
    }
    if store.exists::<ContributionTerms>(&terms.proposal.to_string())? {
        return Ok(false);
    }
    tracing::debug!(
        proposal = %terms.proposal,
        beneficiary = %terms.beneficiary,
        periods = terms.periods,
        mode = ?terms.mode,
        "contribution terms"
    );
    store.save(&terms)?;
    Ok(true)
}

/// Apply a `RedeemContribution`: advance the period counter of `kind`, then
/// re-check the unclaimed set of the proposal.
pub fn apply_redemption(
    store: &mut dyn EntityStore,
    chain: &dyn ChainReader,
    proposal_id: &Bytes32,
    kind: ContributionKind,
    timestamp: u64,
) -> StoreResult<bool> {
    if load_valid(store, proposal_id)?.is_none() {
        return Ok(false);
    }
    let Some(mut terms) = store.load::<ContributionTerms>(&proposal_id.to_string())? else {
        tracing::debug!(proposal = %proposal_id, "no contribution terms");
        return Ok(false);
    };

    let before = terms.clone();
    match terms.mode {
        RedemptionMode::Atomic => {
            let periods = terms.periods.max(1);
            terms.redeemed_periods.insert(kind, periods);
        }
        RedemptionMode::Periodic => {
            match chain.redeemed_periods(terms.scheme, *proposal_id, kind) {
                Ok(periods) if periods > terms.periods_redeemed(kind) => {
                    terms.redeemed_periods.insert(kind, periods);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(
                    proposal = %proposal_id,
                    ?kind,
                    error = %e,
                    "redeemed periods unavailable"
                ),
            }
        }
    }
    terms.redeemed_at.entry(kind).or_insert(timestamp);

    if terms != before {
        store.save(&terms)?;
    }
    reward::refresh_unclaimed(store, proposal_id)?;
    Ok(terms != before)
}
