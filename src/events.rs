//! Decoded contract events.
//!
//! A `ChainEvent` is one log entry, already decoded by the host, plus its
//! position on chain. Events must be fed to the ledger in canonical order
//! (block number, transaction index, log index).

use crate::chain::ContributionKind;
use crate::types::{Address, Amount, Bytes32};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One decoded log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEvent {
    /// Emitting contract.
    pub address: Address,
    pub block_number: u64,
    /// Block timestamp (unix seconds).
    pub timestamp: u64,
    pub tx_hash: Bytes32,
    #[serde(default)]
    pub log_index: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl ChainEvent {
    /// Identity of this log entry, stable across re-delivery.
    pub fn key(&self) -> EventKey {
        EventKey {
            tx_hash: self.tx_hash,
            log_index: self.log_index,
        }
    }
}

/// `(transaction hash, log index)`: unique per log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventKey {
    pub tx_hash: Bytes32,
    pub log_index: u64,
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.tx_hash, self.log_index)
    }
}

/// How a contribution proposal pays out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionMode {
    /// Rewards unlock one period at a time.
    #[default]
    Periodic,
    /// Everything is redeemed in a single call.
    Atomic,
}

/// Every event kind the ledger handles. Each variant routes to exactly one
/// handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    /// Emitted by the voting machine when a scheme submits a proposal.
    NewProposal {
        proposal_id: Bytes32,
        organization: Address,
        proposer: Address,
        params_hash: Bytes32,
        organization_id: Bytes32,
        scheme: Address,
        #[serde(default)]
        num_of_choices: u32,
        #[serde(default)]
        description_hash: Option<String>,
    },
    VoteProposal {
        proposal_id: Bytes32,
        organization: Address,
        voter: Address,
        vote: u32,
        reputation: Amount,
    },
    Stake {
        proposal_id: Bytes32,
        organization: Address,
        staker: Address,
        vote: u32,
        amount: Amount,
    },
    StateChange {
        proposal_id: Bytes32,
        state: u32,
    },
    ExecuteProposal {
        proposal_id: Bytes32,
        organization: Address,
        decision: u32,
        #[serde(default)]
        total_reputation: Option<Amount>,
    },
    GpExecuteProposal {
        proposal_id: Bytes32,
        execution_state: u32,
    },
    /// Staker token redemption.
    Redeem {
        proposal_id: Bytes32,
        organization: Address,
        beneficiary: Address,
        amount: Amount,
    },
    RedeemReputation {
        proposal_id: Bytes32,
        organization: Address,
        beneficiary: Address,
        amount: Amount,
    },
    RedeemDaoBounty {
        proposal_id: Bytes32,
        organization: Address,
        beneficiary: Address,
        amount: Amount,
    },
    /// Emitted by a controller.
    RegisterScheme {
        avatar: Address,
        scheme: Address,
        #[serde(default)]
        params_hash: Bytes32,
    },
    UnregisterScheme {
        avatar: Address,
        scheme: Address,
    },
    /// Emitted by a reputation contract.
    ReputationMint {
        to: Address,
        amount: Amount,
    },
    ReputationBurn {
        from: Address,
        amount: Amount,
    },
    /// Emitted by a native token contract.
    TokenTransfer {
        from: Address,
        to: Address,
        value: Amount,
    },
    /// Emitted by a contribution-reward scheme.
    NewContributionProposal {
        proposal_id: Bytes32,
        avatar: Address,
        beneficiary: Address,
        #[serde(default)]
        reputation_reward: Amount,
        #[serde(default)]
        native_token_reward: Amount,
        #[serde(default)]
        ether_reward: Amount,
        #[serde(default)]
        external_token_reward: Amount,
        #[serde(default)]
        external_token: Option<Address>,
        #[serde(default)]
        period_length: u64,
        #[serde(default)]
        periods: u64,
        #[serde(default)]
        mode: RedemptionMode,
    },
    RedeemContribution {
        proposal_id: Bytes32,
        avatar: Address,
        beneficiary: Address,
        kind: ContributionKind,
        amount: Amount,
    },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::NewProposal { .. } => "NewProposal",
            EventKind::VoteProposal { .. } => "VoteProposal",
            EventKind::Stake { .. } => "Stake",
            EventKind::StateChange { .. } => "StateChange",
            EventKind::ExecuteProposal { .. } => "ExecuteProposal",
            EventKind::GpExecuteProposal { .. } => "GPExecuteProposal",
            EventKind::Redeem { .. } => "Redeem",
            EventKind::RedeemReputation { .. } => "RedeemReputation",
            EventKind::RedeemDaoBounty { .. } => "RedeemDaoBounty",
            EventKind::RegisterScheme { .. } => "RegisterScheme",
            EventKind::UnregisterScheme { .. } => "UnregisterScheme",
            EventKind::ReputationMint { .. } => "Mint",
            EventKind::ReputationBurn { .. } => "Burn",
            EventKind::TokenTransfer { .. } => "Transfer",
            EventKind::NewContributionProposal { .. } => "NewContributionProposal",
            EventKind::RedeemContribution { .. } => "RedeemContribution",
        }
    }
}
