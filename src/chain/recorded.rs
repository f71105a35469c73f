//! Recorded chain reader.
//!
//! Answers read calls from a table of previously captured responses. Used by
//! the replay CLI (loaded from a JSON fixture) and by tests (filled through the
//! `put_*` setters). A call with no recorded answer fails with
//! `ChainError::NotFound`, which the ledger treats like a revert.

use super::traits::*;
use super::version::ContractVersion;
use crate::types::{compound_id, Address, Amount, Bytes32};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared handle to recorded responses. Clones see the same table.
#[derive(Clone, Default)]
pub struct RecordedChain {
    state: Arc<Mutex<RecordedResponses>>,
}

/// Recorded responses, keyed by the compound call arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedResponses {
    #[serde(default)]
    pub voting_params: BTreeMap<String, VotingParams>,
    #[serde(default)]
    pub proposal_snapshots: BTreeMap<String, ProposalSnapshot>,
    #[serde(default)]
    pub proposal_times: BTreeMap<String, ProposalTimes>,
    #[serde(default)]
    pub redemption_previews: BTreeMap<String, RedemptionPreview>,
    #[serde(default)]
    pub dao_bounty_previews: BTreeMap<String, DaoBountyPreview>,
    #[serde(default)]
    pub staking_tokens: BTreeMap<String, Address>,
    /// Keyed by avatar, or by `<version tag>-<avatar>` for a version-specific answer.
    #[serde(default)]
    pub organizations: BTreeMap<String, OrganizationInfo>,
    #[serde(default)]
    pub token_infos: BTreeMap<String, TokenInfo>,
    #[serde(default)]
    pub total_supplies: BTreeMap<String, Amount>,
    #[serde(default)]
    pub balances: BTreeMap<String, Amount>,
    #[serde(default)]
    pub redeemed_periods: BTreeMap<String, u64>,
    /// Contracts whose every call reverts.
    #[serde(default)]
    pub reverting: BTreeSet<Address>,
}

fn kind_key(kind: ContributionKind) -> &'static str {
    match kind {
        ContributionKind::Reputation => "reputation",
        ContributionKind::NativeToken => "native_token",
        ContributionKind::Ether => "ether",
        ContributionKind::ExternalToken => "external_token",
    }
}

impl RecordedChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_responses(responses: RecordedResponses) -> Self {
        Self {
            state: Arc::new(Mutex::new(responses)),
        }
    }

    /// Load a JSON fixture of recorded responses.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read chain fixture '{}': {}", path.display(), e))?;
        let responses: RecordedResponses = serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse chain fixture '{}': {}", path.display(), e))?;
        Ok(Self::from_responses(responses))
    }

    pub fn snapshot(&self) -> RecordedResponses {
        match self.state.lock() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn with_state(&self, f: impl FnOnce(&mut RecordedResponses)) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut state);
    }

    fn read(&self) -> ChainResult<MutexGuard<'_, RecordedResponses>> {
        self.state
            .lock()
            .map_err(|_| ChainError::Unavailable("recorded chain lock poisoned".to_string()))
    }

    fn guard(&self, contract: &Address) -> ChainResult<MutexGuard<'_, RecordedResponses>> {
        let state = self.read()?;
        if state.reverting.contains(contract) {
            return Err(ChainError::Reverted(format!("{} reverts", contract)));
        }
        Ok(state)
    }

    pub fn put_voting_params(&self, vm: Address, params_hash: Bytes32, params: VotingParams) {
        self.with_state(|s| {
            s.voting_params
                .insert(compound_id(&[&vm, &params_hash]), params);
        });
    }

    pub fn put_confidence_threshold(&self, vm: Address, proposal: Bytes32, threshold: Amount) {
        self.with_state(|s| {
            s.proposal_snapshots.insert(
                compound_id(&[&vm, &proposal]),
                ProposalSnapshot {
                    confidence_threshold: threshold,
                },
            );
        });
    }

    pub fn put_proposal_times(&self, vm: Address, proposal: Bytes32, times: [u64; 3]) {
        self.with_state(|s| {
            s.proposal_times
                .insert(compound_id(&[&vm, &proposal]), ProposalTimes(times));
        });
    }

    pub fn put_redemption_preview(
        &self,
        vm: Address,
        proposal: Bytes32,
        beneficiary: Address,
        preview: RedemptionPreview,
    ) {
        self.with_state(|s| {
            s.redemption_previews
                .insert(compound_id(&[&vm, &proposal, &beneficiary]), preview);
        });
    }

    pub fn put_dao_bounty_preview(
        &self,
        vm: Address,
        proposal: Bytes32,
        beneficiary: Address,
        preview: DaoBountyPreview,
    ) {
        self.with_state(|s| {
            s.dao_bounty_previews
                .insert(compound_id(&[&vm, &proposal, &beneficiary]), preview);
        });
    }

    pub fn put_staking_token(&self, vm: Address, token: Address) {
        self.with_state(|s| {
            s.staking_tokens.insert(vm.to_string(), token);
        });
    }

    pub fn put_organization(&self, avatar: Address, info: OrganizationInfo) {
        self.with_state(|s| {
            s.organizations.insert(avatar.to_string(), info);
        });
    }

    pub fn put_versioned_organization(
        &self,
        version: &ContractVersion,
        avatar: Address,
        info: OrganizationInfo,
    ) {
        self.with_state(|s| {
            s.organizations
                .insert(compound_id(&[version, &avatar]), info);
        });
    }

    pub fn put_token_info(&self, token: Address, info: TokenInfo) {
        self.with_state(|s| {
            s.token_infos.insert(token.to_string(), info);
        });
    }

    pub fn put_total_supply(&self, token: Address, supply: Amount) {
        self.with_state(|s| {
            s.total_supplies.insert(token.to_string(), supply);
        });
    }

    pub fn put_balance(&self, token: Address, holder: Address, balance: Amount) {
        self.with_state(|s| {
            s.balances.insert(compound_id(&[&token, &holder]), balance);
        });
    }

    pub fn put_redeemed_periods(
        &self,
        scheme: Address,
        proposal: Bytes32,
        kind: ContributionKind,
        periods: u64,
    ) {
        self.with_state(|s| {
            s.redeemed_periods
                .insert(compound_id(&[&scheme, &proposal, &kind_key(kind)]), periods);
        });
    }

    /// Make every call against `contract` revert.
    pub fn set_reverting(&self, contract: Address) {
        self.with_state(|s| {
            s.reverting.insert(contract);
        });
    }

    pub fn clear_reverting(&self, contract: Address) {
        self.with_state(|s| {
            s.reverting.remove(&contract);
        });
    }
}

fn lookup<T: Clone>(map: &BTreeMap<String, T>, key: String) -> ChainResult<T> {
    map.get(&key).cloned().ok_or(ChainError::NotFound(key))
}

impl ChainReader for RecordedChain {
    fn voting_params(
        &self,
        voting_machine: Address,
        params_hash: Bytes32,
    ) -> ChainResult<VotingParams> {
        let state = self.guard(&voting_machine)?;
        lookup(
            &state.voting_params,
            compound_id(&[&voting_machine, &params_hash]),
        )
    }

    fn proposal_snapshot(
        &self,
        voting_machine: Address,
        proposal: Bytes32,
    ) -> ChainResult<ProposalSnapshot> {
        let state = self.guard(&voting_machine)?;
        lookup(
            &state.proposal_snapshots,
            compound_id(&[&voting_machine, &proposal]),
        )
    }

    fn proposal_times(
        &self,
        voting_machine: Address,
        proposal: Bytes32,
    ) -> ChainResult<ProposalTimes> {
        let state = self.guard(&voting_machine)?;
        lookup(
            &state.proposal_times,
            compound_id(&[&voting_machine, &proposal]),
        )
    }

    fn redemption_preview(
        &self,
        voting_machine: Address,
        proposal: Bytes32,
        beneficiary: Address,
    ) -> ChainResult<RedemptionPreview> {
        let state = self.guard(&voting_machine)?;
        lookup(
            &state.redemption_previews,
            compound_id(&[&voting_machine, &proposal, &beneficiary]),
        )
    }

    fn dao_bounty_preview(
        &self,
        voting_machine: Address,
        proposal: Bytes32,
        beneficiary: Address,
    ) -> ChainResult<DaoBountyPreview> {
        let state = self.guard(&voting_machine)?;
        lookup(
            &state.dao_bounty_previews,
            compound_id(&[&voting_machine, &proposal, &beneficiary]),
        )
    }

    fn staking_token(&self, voting_machine: Address) -> ChainResult<Address> {
        let state = self.guard(&voting_machine)?;
        lookup(&state.staking_tokens, voting_machine.to_string())
    }

    fn organization(
        &self,
        version: &ContractVersion,
        avatar: Address,
    ) -> ChainResult<OrganizationInfo> {
        let state = self.guard(&avatar)?;
        if let Some(info) = state.organizations.get(&compound_id(&[version, &avatar])) {
            return Ok(info.clone());
        }
        lookup(&state.organizations, avatar.to_string())
    }

    fn token_info(&self, _version: &ContractVersion, token: Address) -> ChainResult<TokenInfo> {
        let state = self.guard(&token)?;
        lookup(&state.token_infos, token.to_string())
    }

    fn total_supply(&self, token: Address) -> ChainResult<Amount> {
        let state = self.guard(&token)?;
        lookup(&state.total_supplies, token.to_string())
    }

    fn balance_of(&self, token: Address, holder: Address) -> ChainResult<Amount> {
        let state = self.guard(&token)?;
        lookup(&state.balances, compound_id(&[&token, &holder]))
    }

    fn redeemed_periods(
        &self,
        scheme: Address,
        proposal: Bytes32,
        kind: ContributionKind,
    ) -> ChainResult<u64> {
        let state = self.guard(&scheme)?;
        lookup(
            &state.redeemed_periods,
            compound_id(&[&scheme, &proposal, &kind_key(kind)]),
        )
    }
}
