//! Governance ledger.
//!
//! `Ledger::handle` routes one decoded event to exactly one handler. Handlers
//! update proposals, tallies, rewards and DAO state, then append at most one
//! activity log entry. Chain read failures degrade to partial updates; only a
//! store failure is surfaced to the caller.

pub mod contribution;
pub mod dao;
pub mod event_log;
pub mod proposal;
pub mod reward;
pub mod tally;

#[cfg(test)]
mod proptests;

use crate::chain::{ChainReader, MetadataFetcher, VersionRegistry};
use crate::events::{ChainEvent, EventKind};
use crate::store::{EntityStore, EntityStoreExt, StoreError};
use crate::types::{Address, Amount, Bytes32};
use contribution::ContributionTerms;
use reward::RedeemKind;
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

pub use dao::{ControllerScheme, Dao, ReputationHolder};
pub use event_log::{EventQuery, EventType, LedgerEvent};
pub use proposal::{ExecutionState, Proposal, Stage};
pub use reward::GpReward;
pub use tally::{Outcome, StakeRecord, VoteRecord};

/// Errors that abort an event.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Counts from a replay run, by event name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub events: usize,
    pub by_kind: BTreeMap<&'static str, usize>,
}

/// Derives governance state from an ordered event stream.
pub struct Ledger<S: EntityStore, C: ChainReader, M: MetadataFetcher> {
    store: S,
    chain: C,
    metadata: M,
    versions: VersionRegistry,
}

impl<S: EntityStore, C: ChainReader, M: MetadataFetcher> Ledger<S, C, M> {
    pub fn new(store: S, chain: C, metadata: M) -> Self {
        Self::with_versions(store, chain, metadata, VersionRegistry::default())
    }

    pub fn with_versions(store: S, chain: C, metadata: M, versions: VersionRegistry) -> Self {
        Self {
            store,
            chain,
            metadata,
            versions,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    pub fn versions(&self) -> &VersionRegistry {
        &self.versions
    }

    /// Apply every event in order.
    pub fn replay<'a>(
        &mut self,
        events: impl IntoIterator<Item = &'a ChainEvent>,
    ) -> LedgerResult<ReplayStats> {
        let mut stats = ReplayStats::default();
        for event in events {
            self.handle(event)?;
            stats.events += 1;
            *stats.by_kind.entry(event.kind.name()).or_default() += 1;
        }
        Ok(stats)
    }

    /// Apply one event.
    pub fn handle(&mut self, event: &ChainEvent) -> LedgerResult<()> {
        let _span = tracing::debug_span!(
            "event",
            kind = event.kind.name(),
            block = event.block_number,
            log = event.log_index
        )
        .entered();

        let ts = event.timestamp;
        match &event.kind {
            EventKind::NewProposal {
                proposal_id,
                organization,
                proposer,
                params_hash,
                organization_id,
                scheme,
                num_of_choices,
                description_hash,
            } => {
                let new = proposal::NewProposal {
                    id: *proposal_id,
                    voting_machine: event.address,
                    organization: *organization,
                    organization_id: *organization_id,
                    proposer: *proposer,
                    scheme: *scheme,
                    params_hash: *params_hash,
                    num_of_choices: *num_of_choices,
                    description_hash: description_hash.as_deref(),
                    timestamp: ts,
                };
                if let Some(p) =
                    proposal::apply_new_proposal(&mut self.store, &self.chain, &self.metadata, &new)?
                {
                    reward::register_candidate(&mut self.store, &p.id, p.proposer, ts)?;
                    self.log(LedgerEvent::new(
                        EventType::NewProposal,
                        json!({ "proposal": p.id, "proposer": p.proposer, "title": p.title }),
                        Some(p.dao),
                        Some(p.id),
                        Some(p.proposer),
                        &[],
                        ts,
                    ))?;
                }
            }

            EventKind::VoteProposal {
                proposal_id,
                voter,
                vote,
                reputation,
                ..
            } => self.on_vote(event, proposal_id, *voter, *vote, reputation, false)?,

            EventKind::Stake {
                proposal_id,
                staker,
                vote,
                amount,
                ..
            } => self.on_vote(event, proposal_id, *staker, *vote, amount, true)?,

            EventKind::StateChange { proposal_id, state } => {
                if let Some(p) =
                    proposal::apply_stage_change(&mut self.store, &self.chain, proposal_id, *state, ts)?
                {
                    // Keyed by the event so repeated crossings in one block each get a record.
                    let key = event.key();
                    self.log(LedgerEvent::new(
                        EventType::ProposalStageChange,
                        json!({ "proposal": p.id, "stage": p.stage }),
                        Some(p.dao),
                        Some(p.id),
                        None,
                        &[
                            &state.to_be_bytes()[..],
                            key.tx_hash.as_bytes(),
                            &key.log_index.to_be_bytes()[..],
                        ],
                        ts,
                    ))?;
                    if Stage::triggers_materialize(*state) {
                        reward::materialize(
                            &mut self.store,
                            &self.chain,
                            proposal_id,
                            ts,
                            event.address,
                            *state,
                        )?;
                    }
                }
            }

            EventKind::ExecuteProposal {
                proposal_id,
                decision,
                total_reputation,
                ..
            } => {
                proposal::apply_execution(
                    &mut self.store,
                    proposal_id,
                    *decision,
                    total_reputation.as_ref(),
                    ts,
                )?;
            }

            EventKind::GpExecuteProposal {
                proposal_id,
                execution_state,
            } => {
                proposal::apply_execution_state(&mut self.store, proposal_id, *execution_state)?;
            }

            EventKind::Redeem {
                proposal_id,
                beneficiary,
                ..
            } => self.on_redeem(RedeemKind::Tokens, proposal_id, beneficiary, ts)?,

            EventKind::RedeemReputation {
                proposal_id,
                beneficiary,
                ..
            } => self.on_redeem(RedeemKind::Reputation, proposal_id, beneficiary, ts)?,

            EventKind::RedeemDaoBounty {
                proposal_id,
                beneficiary,
                ..
            } => self.on_redeem(RedeemKind::DaoBounty, proposal_id, beneficiary, ts)?,

            EventKind::RegisterScheme {
                avatar,
                scheme,
                params_hash,
            } => {
                let registration = dao::SchemeRegistration {
                    controller: event.address,
                    avatar: *avatar,
                    scheme: *scheme,
                    params_hash: *params_hash,
                    timestamp: ts,
                };
                if let Some(created) =
                    dao::register_scheme(&mut self.store, &self.chain, &self.versions, &registration)?
                {
                    self.log(LedgerEvent::new(
                        EventType::NewDao,
                        json!({ "dao": created.id, "name": created.name }),
                        Some(created.id),
                        None,
                        None,
                        &[],
                        ts,
                    ))?;
                }
            }

            EventKind::UnregisterScheme { avatar, scheme } => {
                dao::unregister_scheme(&mut self.store, avatar, scheme, ts)?;
            }

            EventKind::ReputationMint { to: account, .. }
            | EventKind::ReputationBurn { from: account, .. } => {
                let change = dao::apply_reputation_change(
                    &mut self.store,
                    &self.chain,
                    &event.address,
                    account,
                    ts,
                )?;
                if let Some(dao::HolderChange::Joined { dao }) = change {
                    self.log(LedgerEvent::new(
                        EventType::NewReputationHolder,
                        json!({ "reputation": event.address, "holder": account }),
                        dao,
                        None,
                        Some(*account),
                        &[event.address.as_bytes()],
                        ts,
                    ))?;
                }
            }

            EventKind::TokenTransfer { from, to, .. } => {
                dao::apply_token_transfer(&mut self.store, &self.chain, &event.address, from, to)?;
            }

            EventKind::NewContributionProposal {
                proposal_id,
                avatar,
                beneficiary,
                reputation_reward,
                native_token_reward,
                ether_reward,
                external_token_reward,
                external_token,
                period_length,
                periods,
                mode,
            } => {
                let terms = ContributionTerms {
                    proposal: *proposal_id,
                    dao: *avatar,
                    scheme: event.address,
                    beneficiary: *beneficiary,
                    reputation_reward: reputation_reward.clone(),
                    native_token_reward: native_token_reward.clone(),
                    ether_reward: ether_reward.clone(),
                    external_token_reward: external_token_reward.clone(),
                    external_token: *external_token,
                    period_length: *period_length,
                    periods: *periods,
                    mode: *mode,
                    redeemed_periods: BTreeMap::new(),
                    redeemed_at: BTreeMap::new(),
                    created_at: ts,
                };
                contribution::record_terms(&mut self.store, terms)?;
            }

            EventKind::RedeemContribution {
                proposal_id, kind, ..
            } => {
                contribution::apply_redemption(&mut self.store, &self.chain, proposal_id, *kind, ts)?;
            }
        }
        Ok(())
    }

    fn on_vote(
        &mut self,
        event: &ChainEvent,
        proposal_id: &Bytes32,
        account: Address,
        option: u32,
        weight: &Amount,
        is_stake: bool,
    ) -> LedgerResult<()> {
        let Some(mut p) = proposal::load_valid(&self.store, proposal_id)? else {
            return Ok(());
        };
        let ts = event.timestamp;
        let applied = if is_stake {
            tally::record_stake(&mut self.store, &mut p, event.key(), account, option, weight, ts)?
        } else {
            tally::record_vote(&mut self.store, &mut p, event.key(), account, option, weight, ts)?
        };
        if !applied {
            return Ok(());
        }
        self.store.save(&p)?;
        reward::register_candidate(&mut self.store, proposal_id, account, ts)?;

        let event_type = if is_stake {
            EventType::Stake
        } else {
            EventType::Vote
        };
        let key = event.key();
        self.log(LedgerEvent::new(
            event_type,
            json!({ "proposal": p.id, "account": account, "option": option, "amount": weight }),
            Some(p.dao),
            Some(p.id),
            Some(account),
            &[key.tx_hash.as_bytes(), &key.log_index.to_be_bytes()[..]],
            ts,
        ))
    }

    fn on_redeem(
        &mut self,
        kind: RedeemKind,
        proposal_id: &Bytes32,
        beneficiary: &Address,
        ts: u64,
    ) -> LedgerResult<()> {
        reward::redeem(&mut self.store, kind, proposal_id, beneficiary, ts)?;
        Ok(())
    }

    fn log(&mut self, entry: LedgerEvent) -> LedgerResult<()> {
        event_log::append(&mut self.store, &entry)?;
        Ok(())
    }
}
