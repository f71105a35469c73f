//! Trait abstractions for read-only chain access and metadata retrieval.
//!
//! Both are synchronous: a handler blocks on the call and, if it fails,
//! degrades to a zeroed or partial update. Nothing here is ever fatal to the
//! enclosing event.

use super::version::ContractVersion;
use crate::types::{Address, Amount, Bytes32};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Read-call failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// The call reverted on chain.
    #[error("call reverted: {0}")]
    Reverted(String),

    /// No response recorded for this call.
    #[error("no data for {0}")]
    NotFound(String),

    /// The node could not be reached.
    #[error("chain unavailable: {0}")]
    Unavailable(String),
}

pub type ChainResult<T> = Result<T, ChainError>;

/// Voting-rule parameter set registered under a params hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingParams {
    pub queued_vote_required_percentage: Amount,
    pub queued_voting_period_limit: Amount,
    pub boosted_voting_period_limit: Amount,
    pub pre_boosted_voting_period_limit: Amount,
    pub threshold_const: Amount,
    pub limit_exponent_value: Amount,
    pub quiet_ending_period: Amount,
    pub proposing_rep_reward: Amount,
    pub votes_reputation_loss_ratio: Amount,
    pub minimum_dao_bounty: Amount,
    pub dao_bounty_const: Amount,
    pub activation_time: Amount,
}

/// Fresh per-proposal snapshot from the voting machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalSnapshot {
    pub confidence_threshold: Amount,
}

/// Phase times reported by the voting machine:
/// `[submitted, boosted phase, pre-boosted phase]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalTimes(pub [u64; 3]);

/// Redeemable amounts for one beneficiary of one proposal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionPreview {
    pub tokens_for_staker: Amount,
    pub reputation_for_voter: Amount,
    pub reputation_for_proposer: Amount,
}

/// DAO bounty preview: what was already redeemed and what is still claimable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaoBountyPreview {
    pub redeemed: Amount,
    pub potential: Amount,
}

/// Organization metadata read from an avatar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationInfo {
    pub name: String,
    pub native_token: Address,
    pub native_reputation: Address,
}

/// ERC20-style token metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    pub total_supply: Amount,
}

/// Reward category of a contribution proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionKind {
    Reputation,
    NativeToken,
    Ether,
    ExternalToken,
}

impl ContributionKind {
    pub const ALL: [ContributionKind; 4] = [
        ContributionKind::Reputation,
        ContributionKind::NativeToken,
        ContributionKind::Ether,
        ContributionKind::ExternalToken,
    ];
}

/// Read-only contract queries.
///
/// Enables recorded and mock implementations for replay and tests.
pub trait ChainReader {
    /// Voting-rule parameters for `params_hash` on `voting_machine`.
    fn voting_params(&self, voting_machine: Address, params_hash: Bytes32)
        -> ChainResult<VotingParams>;

    fn proposal_snapshot(
        &self,
        voting_machine: Address,
        proposal: Bytes32,
    ) -> ChainResult<ProposalSnapshot>;

    fn proposal_times(&self, voting_machine: Address, proposal: Bytes32)
        -> ChainResult<ProposalTimes>;

    fn redemption_preview(
        &self,
        voting_machine: Address,
        proposal: Bytes32,
        beneficiary: Address,
    ) -> ChainResult<RedemptionPreview>;

    fn dao_bounty_preview(
        &self,
        voting_machine: Address,
        proposal: Bytes32,
        beneficiary: Address,
    ) -> ChainResult<DaoBountyPreview>;

    fn staking_token(&self, voting_machine: Address) -> ChainResult<Address>;

    /// Organization metadata, read with the ABI of `version`.
    fn organization(
        &self,
        version: &ContractVersion,
        avatar: Address,
    ) -> ChainResult<OrganizationInfo>;

    fn token_info(&self, version: &ContractVersion, token: Address) -> ChainResult<TokenInfo>;

    fn total_supply(&self, token: Address) -> ChainResult<Amount>;

    fn balance_of(&self, token: Address, holder: Address) -> ChainResult<Amount>;

    /// Periods of `kind` already redeemed on a contribution proposal.
    fn redeemed_periods(
        &self,
        scheme: Address,
        proposal: Bytes32,
        kind: ContributionKind,
    ) -> ChainResult<u64>;
}

/// Content-addressed blob retrieval. `None` means not found.
pub trait MetadataFetcher {
    fn fetch(&self, content_hash: &str) -> Option<Vec<u8>>;
}

/// Human-readable proposal metadata stored off chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ProposalMetadata {
    /// Fetch and parse metadata; any failure yields `None`.
    pub fn resolve(fetcher: &dyn MetadataFetcher, content_hash: &str) -> Option<Self> {
        let Some(bytes) = fetcher.fetch(content_hash) else {
            tracing::warn!(hash = content_hash, "proposal metadata not found");
            return None;
        };
        match serde_json::from_slice(&bytes) {
            Ok(meta) => Some(meta),
            Err(e) => {
                tracing::warn!(hash = content_hash, error = %e, "proposal metadata is not valid JSON");
                None
            }
        }
    }
}
