// Integration tests for snapshots and event files
//
// These tests verify:
// - Resuming from a snapshot gives the same state as one uninterrupted replay
// - Snapshot files survive a save/load cycle
// - Event files in JSON-lines form decode to the same events

mod common;

use common::*;
use govledger::chain::{DaoBountyPreview, MemoryMetadata, RecordedChain, RedemptionPreview};
use govledger::events::ChainEvent;
use govledger::ledger::Ledger;
use govledger::serialization::from_json_lines;
use govledger::store::{EntityKind, MemoryStore};
use govledger::types::Amount;
use tempfile::TempDir;

fn chain() -> RecordedChain {
    let chain = RecordedChain::new();
    for (account, tokens) in [(VOTER_A, 3u64), (VOTER_B, 4u64)] {
        chain.put_redemption_preview(
            VM,
            p1(),
            account,
            RedemptionPreview {
                tokens_for_staker: Amount::from(tokens),
                reputation_for_voter: Amount::from(1),
                reputation_for_proposer: Amount::zero(),
            },
        );
        chain.put_dao_bounty_preview(
            VM,
            p1(),
            account,
            DaoBountyPreview {
                redeemed: Amount::zero(),
                potential: Amount::from(2),
            },
        );
    }
    chain.put_staking_token(VM, TOKEN);
    chain
}

fn events() -> Vec<ChainEvent> {
    let mut s = Stream::new();
    vec![
        s.register_scheme(),
        s.new_proposal(p1(), PARAMS, None),
        s.vote(p1(), VOTER_A, 1, 100),
        s.stake(p1(), VOTER_B, 1, 30),
        s.stage(p1(), 4),
        s.vote(p1(), VOTER_B, 2, 20),
        s.stake(p1(), VOTER_A, 1, 10),
        s.stage(p1(), 5),
        s.redeem_tokens(p1(), VOTER_B),
        s.redeem_reputation(p1(), VOTER_A),
        s.redeem_dao_bounty(p1(), VOTER_A),
        s.execute(p1(), 1, Some(500)),
        s.stage(p1(), 2),
    ]
}

#[test]
fn test_resume_from_snapshot_matches_full_replay() {
    let events = events();

    let mut full = ledger(chain());
    full.replay(&events).unwrap();

    for split in [1, 4, 8, events.len() - 1] {
        let mut first = ledger(chain());
        first.replay(&events[..split]).unwrap();
        let bytes = first.into_store().to_bytes().unwrap();

        let restored = MemoryStore::from_bytes(&bytes).unwrap();
        let mut second = Ledger::new(restored, chain(), MemoryMetadata::new());
        second.replay(&events[split..]).unwrap();

        assert_eq!(second.store(), full.store(), "split at {}", split);
    }
}

#[test]
fn test_snapshot_file_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("ledger.snapshot");

    let mut ledger = ledger(chain());
    ledger.replay(&events()).unwrap();
    ledger.store().save_snapshot(&path).unwrap();

    let restored = MemoryStore::load_snapshot(&path).unwrap();
    assert_eq!(&restored, ledger.store());
    assert_eq!(restored.count(EntityKind::GpReward), 2);
    assert_eq!(restored.count(EntityKind::Dao), 1);
}

#[test]
fn test_full_stream_state() {
    let mut ledger = ledger(chain());
    ledger.replay(&events()).unwrap();

    let p = proposal(&ledger, p1());
    assert_eq!(p.votes_for, Amount::from(100));
    assert_eq!(p.votes_against, Amount::from(20));
    assert_eq!(p.stakes_for, Amount::from(40));
    assert_eq!(p.votes_count, 2);
    assert_eq!(p.stakes_count, 2);

    // A still holds unredeemed tokens; B still holds reputation and bounty.
    assert!(p.has_unclaimed(&VOTER_A));
    assert!(p.has_unclaimed(&VOTER_B));
}

#[test]
fn test_event_file_decodes() {
    let events = events();
    let mut text = String::from("# recorded stream\n\n");
    for event in &events {
        text.push_str(&serde_json::to_string(event).unwrap());
        text.push('\n');
    }

    let decoded: Vec<ChainEvent> = from_json_lines(&text).unwrap();
    assert_eq!(decoded, events);
}

#[test]
fn test_event_file_reports_bad_line() {
    let text = "{\"event\":\"vote_proposal\"}\n";
    let err = from_json_lines::<ChainEvent>(text).unwrap_err();
    assert!(err.to_string().starts_with("line 1:"));
}
