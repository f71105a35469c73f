//! Property-based tests for the ledger
//!
//! Tests for:
//! - Idempotence: re-delivering the last event changes nothing, including
//!   submissions and execution-state updates
//! - Tallies: vote and stake totals never decrease
//! - Rewards: materialization never lowers a recorded amount
//! - Unclaimed set: membership matches outstanding rewards
//! - Validity: zero params hash freezes the proposal

use super::*;
use crate::chain::{DaoBountyPreview, MemoryMetadata, RecordedChain, RedemptionPreview};
use crate::store::{EntityKind, MemoryStore};
use crate::types::compound_id;
use proptest::prelude::*;

const VM: Address = Address::repeat(0x11);
const DAO: Address = Address::repeat(0x22);
const SCHEME: Address = Address::repeat(0x33);
const CONTROLLER: Address = Address::repeat(0x44);

fn pid() -> Bytes32 {
    Bytes32::repeat(0x77)
}

fn account(i: u8) -> Address {
    Address::repeat(0xa0 + i)
}

/// Abstract action against the single test proposal.
#[derive(Debug, Clone)]
enum Action {
    Vote { who: u8, option: u32, weight: u64 },
    Stake { who: u8, option: u32, amount: u64 },
    Stage(u32),
    Redeem { who: u8, kind: u8 },
    Execute(u32),
    ExecutionState(u32),
    Propose,
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        (0u8..4, 1u32..3, 1u64..1_000)
            .prop_map(|(who, option, weight)| Action::Vote { who, option, weight }),
        (0u8..4, 1u32..3, 1u64..1_000)
            .prop_map(|(who, option, amount)| Action::Stake { who, option, amount }),
        (1u32..7).prop_map(Action::Stage),
        (0u8..4, 0u8..3).prop_map(|(who, kind)| Action::Redeem { who, kind }),
        (1u32..3).prop_map(Action::Execute),
        (1u32..6).prop_map(Action::ExecutionState),
        Just(Action::Propose),
    ]
}

fn to_event(action: &Action, seq: u64) -> ChainEvent {
    let kind = match action {
        Action::Vote { who, option, weight } => EventKind::VoteProposal {
            proposal_id: pid(),
            organization: DAO,
            voter: account(*who),
            vote: *option,
            reputation: Amount::from(*weight),
        },
        Action::Stake { who, option, amount } => EventKind::Stake {
            proposal_id: pid(),
            organization: DAO,
            staker: account(*who),
            vote: *option,
            amount: Amount::from(*amount),
        },
        Action::Stage(code) => EventKind::StateChange {
            proposal_id: pid(),
            state: *code,
        },
        Action::Redeem { who, kind } => {
            let (proposal_id, organization, beneficiary, amount) =
                (pid(), DAO, account(*who), Amount::from(1));
            match kind {
                0 => EventKind::Redeem {
                    proposal_id,
                    organization,
                    beneficiary,
                    amount,
                },
                1 => EventKind::RedeemReputation {
                    proposal_id,
                    organization,
                    beneficiary,
                    amount,
                },
                _ => EventKind::RedeemDaoBounty {
                    proposal_id,
                    organization,
                    beneficiary,
                    amount,
                },
            }
        }
        Action::Execute(decision) => EventKind::ExecuteProposal {
            proposal_id: pid(),
            organization: DAO,
            decision: *decision,
            total_reputation: None,
        },
        Action::ExecutionState(code) => EventKind::GpExecuteProposal {
            proposal_id: pid(),
            execution_state: *code,
        },
        Action::Propose => EventKind::NewProposal {
            proposal_id: pid(),
            organization: DAO,
            proposer: account(0),
            params_hash: Bytes32::repeat(1),
            organization_id: Bytes32::repeat(3),
            scheme: SCHEME,
            num_of_choices: 2,
            description_hash: None,
        },
    };
    ChainEvent {
        address: VM,
        block_number: 10 + seq,
        timestamp: 1_000 + seq,
        tx_hash: Bytes32::new({
            let mut b = [0u8; 32];
            b[..8].copy_from_slice(&seq.to_be_bytes());
            b
        }),
        log_index: 0,
        kind,
    }
}

fn setup_events(params_hash: Bytes32) -> Vec<ChainEvent> {
    vec![
        ChainEvent {
            address: CONTROLLER,
            block_number: 1,
            timestamp: 100,
            tx_hash: Bytes32::repeat(0xf0),
            log_index: 0,
            kind: EventKind::RegisterScheme {
                avatar: DAO,
                scheme: SCHEME,
                params_hash: Bytes32::repeat(9),
            },
        },
        ChainEvent {
            address: VM,
            block_number: 2,
            timestamp: 200,
            tx_hash: Bytes32::repeat(0xf1),
            log_index: 0,
            kind: EventKind::NewProposal {
                proposal_id: pid(),
                organization: DAO,
                proposer: account(0),
                params_hash,
                organization_id: Bytes32::repeat(3),
                scheme: SCHEME,
                num_of_choices: 2,
                description_hash: None,
            },
        },
    ]
}

/// Chain whose previews are driven by `amounts[i]` for account `i`.
fn chain_with(amounts: &[(u64, u64, u64, u64)]) -> RecordedChain {
    let chain = RecordedChain::new();
    for (i, (tokens, voter, proposer, bounty)) in amounts.iter().enumerate() {
        chain.put_redemption_preview(
            VM,
            pid(),
            account(i as u8),
            RedemptionPreview {
                tokens_for_staker: Amount::from(*tokens),
                reputation_for_voter: Amount::from(*voter),
                reputation_for_proposer: Amount::from(*proposer),
            },
        );
        chain.put_dao_bounty_preview(
            VM,
            pid(),
            account(i as u8),
            DaoBountyPreview {
                redeemed: Amount::zero(),
                potential: Amount::from(*bounty),
            },
        );
    }
    chain.put_staking_token(VM, Address::repeat(0x99));
    chain
}

fn run(
    chain: RecordedChain,
    params_hash: Bytes32,
    actions: &[Action],
) -> Ledger<MemoryStore, RecordedChain, MemoryMetadata> {
    let mut ledger = Ledger::new(MemoryStore::new(), chain, MemoryMetadata::new());
    ledger.replay(&setup_events(params_hash)).unwrap();
    for (seq, a) in actions.iter().enumerate() {
        ledger.handle(&to_event(a, seq as u64)).unwrap();
    }
    ledger
}

fn amounts() -> impl Strategy<Value = Vec<(u64, u64, u64, u64)>> {
    prop::collection::vec((0u64..3, 0u64..3, 0u64..3, 0u64..3), 4)
}

fn load_proposal(store: &MemoryStore) -> Proposal {
    store.load(&pid().to_string()).unwrap().unwrap()
}

proptest! {
    /// Property: Re-delivery is idempotent
    /// Applying the last event a second time leaves the store unchanged
    #[test]
    fn redelivery_is_idempotent(
        amounts in amounts(),
        actions in prop::collection::vec(action(), 1..25),
    ) {
        let mut ledger = run(chain_with(&amounts), Bytes32::repeat(1), &actions);
        let before = ledger.store().clone();

        let last = to_event(&actions[actions.len() - 1], (actions.len() - 1) as u64);
        ledger.handle(&last).unwrap();

        prop_assert_eq!(ledger.store(), &before);
    }

    /// Property: Tallies are monotonic
    /// votes_for + votes_against and stakes_for + stakes_against never decrease
    #[test]
    fn tallies_never_decrease(actions in prop::collection::vec(action(), 1..40)) {
        let mut ledger = run(RecordedChain::new(), Bytes32::repeat(1), &[]);
        let mut last_votes = Amount::zero();
        let mut last_stakes = Amount::zero();

        for (seq, a) in actions.iter().enumerate() {
            ledger.handle(&to_event(a, seq as u64)).unwrap();
            let p = load_proposal(ledger.store());
            let votes = &p.votes_for + &p.votes_against;
            let stakes = &p.stakes_for + &p.stakes_against;
            prop_assert!(votes >= last_votes);
            prop_assert!(stakes >= last_stakes);
            last_votes = votes;
            last_stakes = stakes;
        }
    }

    /// Property: Reward amounts never regress
    /// A recorded amount is never replaced by zero or a smaller amount
    #[test]
    fn rewards_never_regress(
        first in amounts(),
        second in amounts(),
        actions in prop::collection::vec(action(), 1..30),
    ) {
        let chain = chain_with(&first);
        let mut ledger = run(chain.clone(), Bytes32::repeat(1), &actions[..actions.len() / 2]);
        let snapshot: Vec<GpReward> = ledger.store().load_all().unwrap();

        // Previews change mid-stream.
        for (i, (tokens, voter, proposer, _)) in second.iter().enumerate() {
            chain.put_redemption_preview(VM, pid(), account(i as u8), RedemptionPreview {
                tokens_for_staker: Amount::from(*tokens),
                reputation_for_voter: Amount::from(*voter),
                reputation_for_proposer: Amount::from(*proposer),
            });
        }
        let offset = actions.len() / 2;
        for (seq, a) in actions[offset..].iter().enumerate() {
            ledger.handle(&to_event(a, (offset + seq) as u64)).unwrap();
        }

        for old in snapshot {
            let new: GpReward = ledger
                .store()
                .load(&compound_id(&[&old.proposal, &old.beneficiary]))
                .unwrap()
                .unwrap();
            for (before, after) in [
                (&old.tokens_for_staker, &new.tokens_for_staker),
                (&old.reputation_for_voter, &new.reputation_for_voter),
                (&old.reputation_for_proposer, &new.reputation_for_proposer),
                (&old.dao_bounty_for_staker, &new.dao_bounty_for_staker),
            ] {
                if let Some(b) = before {
                    prop_assert!(after.as_ref().is_some_and(|a| a >= b));
                }
            }
        }
    }

    /// Property: Unclaimed set matches outstanding rewards
    /// B is unclaimed on P iff GpReward(P, B) exists with an unredeemed kind
    #[test]
    fn unclaimed_set_matches_rewards(
        amounts in amounts(),
        actions in prop::collection::vec(action(), 1..40),
    ) {
        let ledger = run(chain_with(&amounts), Bytes32::repeat(1), &actions);
        let p = load_proposal(ledger.store());

        let mut seen = std::collections::HashSet::new();
        for owner in &p.accounts_with_unclaimed_rewards {
            prop_assert!(seen.insert(*owner), "duplicate owner in unclaimed set");
        }

        let rewards: Vec<GpReward> = ledger.store().load_all().unwrap();
        for r in &rewards {
            prop_assert_eq!(p.has_unclaimed(&r.beneficiary), !r.fully_redeemed());
        }
        for owner in &p.accounts_with_unclaimed_rewards {
            prop_assert!(rewards.iter().any(|r| r.beneficiary == *owner));
        }
    }

    /// Property: Invalid proposals are frozen
    /// With a zero params hash no proposal or reward is ever written
    #[test]
    fn invalid_proposals_are_never_mutated(
        amounts in amounts(),
        actions in prop::collection::vec(action(), 1..30),
    ) {
        // A fresh submission with a real params hash would legitimately create it.
        let actions: Vec<Action> = actions
            .into_iter()
            .filter(|a| !matches!(a, Action::Propose))
            .collect();
        let ledger = run(chain_with(&amounts), Bytes32::ZERO, &actions);
        prop_assert_eq!(ledger.store().count(EntityKind::Proposal), 0);
        prop_assert_eq!(ledger.store().count(EntityKind::GpReward), 0);
        prop_assert_eq!(ledger.store().count(EntityKind::VoteRecord), 0);
        prop_assert_eq!(ledger.store().count(EntityKind::StakeRecord), 0);
    }
}
