// Shared fixtures for the ledger integration tests.
//
// `Stream` hands out events with increasing block numbers, timestamps and
// transaction hashes so each one has a distinct event key.

#![allow(dead_code)]

use govledger::chain::{ContributionKind, MemoryMetadata, RecordedChain};
use govledger::events::{ChainEvent, EventKind, RedemptionMode};
use govledger::ledger::{Ledger, Proposal};
use govledger::store::{EntityStoreExt, MemoryStore};
use govledger::types::{Address, Amount, Bytes32};

pub const VM: Address = Address::repeat(0x11);
pub const DAO: Address = Address::repeat(0x22);
pub const SCHEME: Address = Address::repeat(0x33);
pub const CONTROLLER: Address = Address::repeat(0x44);
pub const TOKEN: Address = Address::repeat(0x55);
pub const REPUTATION: Address = Address::repeat(0x66);
pub const PROPOSER: Address = Address::repeat(0xbb);
pub const VOTER_A: Address = Address::repeat(0xa1);
pub const VOTER_B: Address = Address::repeat(0xa2);
pub const PARAMS: Bytes32 = Bytes32::repeat(0x09);

pub fn p1() -> Bytes32 {
    Bytes32::repeat(0x77)
}

pub type TestLedger = Ledger<MemoryStore, RecordedChain, MemoryMetadata>;

pub fn ledger(chain: RecordedChain) -> TestLedger {
    Ledger::new(MemoryStore::new(), chain, MemoryMetadata::new())
}

pub fn proposal(ledger: &TestLedger, id: Bytes32) -> Proposal {
    ledger
        .store()
        .load(&id.to_string())
        .unwrap()
        .expect("proposal should exist")
}

#[derive(Default)]
pub struct Stream {
    seq: u64,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamp the next event will carry.
    pub fn next_timestamp(&self) -> u64 {
        1_000 + (self.seq + 1) * 10
    }

    pub fn at(&mut self, address: Address, kind: EventKind) -> ChainEvent {
        self.seq += 1;
        let mut hash = [0u8; 32];
        hash[24..].copy_from_slice(&self.seq.to_be_bytes());
        ChainEvent {
            address,
            block_number: self.seq,
            timestamp: 1_000 + self.seq * 10,
            tx_hash: Bytes32::new(hash),
            log_index: 0,
            kind,
        }
    }

    pub fn register_scheme(&mut self) -> ChainEvent {
        self.at(
            CONTROLLER,
            EventKind::RegisterScheme {
                avatar: DAO,
                scheme: SCHEME,
                params_hash: PARAMS,
            },
        )
    }

    pub fn unregister_scheme(&mut self) -> ChainEvent {
        self.at(
            CONTROLLER,
            EventKind::UnregisterScheme {
                avatar: DAO,
                scheme: SCHEME,
            },
        )
    }

    pub fn new_proposal(
        &mut self,
        id: Bytes32,
        params_hash: Bytes32,
        description_hash: Option<&str>,
    ) -> ChainEvent {
        self.at(
            VM,
            EventKind::NewProposal {
                proposal_id: id,
                organization: DAO,
                proposer: PROPOSER,
                params_hash,
                organization_id: Bytes32::repeat(0x03),
                scheme: SCHEME,
                num_of_choices: 2,
                description_hash: description_hash.map(str::to_string),
            },
        )
    }

    pub fn vote(&mut self, id: Bytes32, voter: Address, option: u32, weight: u64) -> ChainEvent {
        self.at(
            VM,
            EventKind::VoteProposal {
                proposal_id: id,
                organization: DAO,
                voter,
                vote: option,
                reputation: Amount::from(weight),
            },
        )
    }

    pub fn stake(&mut self, id: Bytes32, staker: Address, option: u32, amount: u64) -> ChainEvent {
        self.at(
            VM,
            EventKind::Stake {
                proposal_id: id,
                organization: DAO,
                staker,
                vote: option,
                amount: Amount::from(amount),
            },
        )
    }

    pub fn stage(&mut self, id: Bytes32, code: u32) -> ChainEvent {
        self.at(
            VM,
            EventKind::StateChange {
                proposal_id: id,
                state: code,
            },
        )
    }

    pub fn execute(&mut self, id: Bytes32, decision: u32, total: Option<u64>) -> ChainEvent {
        self.at(
            VM,
            EventKind::ExecuteProposal {
                proposal_id: id,
                organization: DAO,
                decision,
                total_reputation: total.map(Amount::from),
            },
        )
    }

    pub fn execution_state(&mut self, id: Bytes32, code: u32) -> ChainEvent {
        self.at(
            VM,
            EventKind::GpExecuteProposal {
                proposal_id: id,
                execution_state: code,
            },
        )
    }

    pub fn redeem_tokens(&mut self, id: Bytes32, beneficiary: Address) -> ChainEvent {
        self.at(
            VM,
            EventKind::Redeem {
                proposal_id: id,
                organization: DAO,
                beneficiary,
                amount: Amount::from(1),
            },
        )
    }

    pub fn redeem_reputation(&mut self, id: Bytes32, beneficiary: Address) -> ChainEvent {
        self.at(
            VM,
            EventKind::RedeemReputation {
                proposal_id: id,
                organization: DAO,
                beneficiary,
                amount: Amount::from(1),
            },
        )
    }

    pub fn redeem_dao_bounty(&mut self, id: Bytes32, beneficiary: Address) -> ChainEvent {
        self.at(
            VM,
            EventKind::RedeemDaoBounty {
                proposal_id: id,
                organization: DAO,
                beneficiary,
                amount: Amount::from(1),
            },
        )
    }

    pub fn mint(&mut self, to: Address, amount: u64) -> ChainEvent {
        self.at(
            REPUTATION,
            EventKind::ReputationMint {
                to,
                amount: Amount::from(amount),
            },
        )
    }

    pub fn burn(&mut self, from: Address, amount: u64) -> ChainEvent {
        self.at(
            REPUTATION,
            EventKind::ReputationBurn {
                from,
                amount: Amount::from(amount),
            },
        )
    }

    pub fn transfer(&mut self, from: Address, to: Address, value: u64) -> ChainEvent {
        self.at(
            TOKEN,
            EventKind::TokenTransfer {
                from,
                to,
                value: Amount::from(value),
            },
        )
    }

    pub fn contribution(
        &mut self,
        id: Bytes32,
        beneficiary: Address,
        reputation_reward: u64,
        periods: u64,
        mode: RedemptionMode,
    ) -> ChainEvent {
        self.at(
            SCHEME,
            EventKind::NewContributionProposal {
                proposal_id: id,
                avatar: DAO,
                beneficiary,
                reputation_reward: Amount::from(reputation_reward),
                native_token_reward: Amount::zero(),
                ether_reward: Amount::zero(),
                external_token_reward: Amount::zero(),
                external_token: None,
                period_length: 100,
                periods,
                mode,
            },
        )
    }

    pub fn redeem_contribution(
        &mut self,
        id: Bytes32,
        beneficiary: Address,
        kind: ContributionKind,
    ) -> ChainEvent {
        self.at(
            SCHEME,
            EventKind::RedeemContribution {
                proposal_id: id,
                avatar: DAO,
                beneficiary,
                kind,
                amount: Amount::from(1),
            },
        )
    }
}
