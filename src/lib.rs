//! govledger - governance ledger for DAO contract events
//!
//! Consumes decoded events from DAO contracts (voting machine, controller,
//! reputation, native token, contribution-reward scheme) in chain order and
//! maintains a queryable view of proposals, tallies, rewards and membership.
//!
//! Key properties:
//! - Replaying the same event twice leaves state unchanged
//! - Tallies and recorded reward amounts never decrease
//! - Chain read failures degrade to partial records, never abort an event
//! - Proposals from unmodelled schemes (zero params hash) are never mutated

pub mod chain;
pub mod events;
pub mod ledger;
pub mod serialization;
pub mod store;
pub mod types;
