//! Keyed entity persistence.
//!
//! The host owns the real store; the ledger only needs get/upsert/delete keyed
//! by `(EntityKind, id)` with read-your-writes inside one event. Entities are
//! stored as CBOR bytes so the trait stays object safe and any backend (sled,
//! sqlite, a subgraph host) can sit behind it.

pub mod memory;

pub use memory::MemoryStore;

use crate::serialization::{from_cbor, to_cbor, SerializationError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Entity kinds the ledger persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Proposal,
    VotingParams,
    VoteRecord,
    StakeRecord,
    TallyReceipt,
    GpReward,
    PreGpReward,
    CandidateList,
    ContributionTerms,
    Dao,
    ControllerScheme,
    Token,
    Reputation,
    ReputationHolder,
    HolderIndex,
    LedgerEvent,
}

impl EntityKind {
    pub const ALL: [EntityKind; 16] = [
        EntityKind::Proposal,
        EntityKind::VotingParams,
        EntityKind::VoteRecord,
        EntityKind::StakeRecord,
        EntityKind::TallyReceipt,
        EntityKind::GpReward,
        EntityKind::PreGpReward,
        EntityKind::CandidateList,
        EntityKind::ContributionTerms,
        EntityKind::Dao,
        EntityKind::ControllerScheme,
        EntityKind::Token,
        EntityKind::Reputation,
        EntityKind::ReputationHolder,
        EntityKind::HolderIndex,
        EntityKind::LedgerEvent,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Proposal => "proposal",
            EntityKind::VotingParams => "voting-params",
            EntityKind::VoteRecord => "vote",
            EntityKind::StakeRecord => "stake",
            EntityKind::TallyReceipt => "tally-receipt",
            EntityKind::GpReward => "gp-reward",
            EntityKind::PreGpReward => "pre-gp-reward",
            EntityKind::CandidateList => "candidate-list",
            EntityKind::ContributionTerms => "contribution-terms",
            EntityKind::Dao => "dao",
            EntityKind::ControllerScheme => "controller-scheme",
            EntityKind::Token => "token",
            EntityKind::Reputation => "reputation",
            EntityKind::ReputationHolder => "reputation-holder",
            EntityKind::HolderIndex => "holder-index",
            EntityKind::LedgerEvent => "event",
        }
    }

    /// Parse a kind from its CLI name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Store errors. These are the only failures that escape a ledger handler.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {id}: {source}")]
    Codec {
        kind: EntityKind,
        id: String,
        #[source]
        source: SerializationError,
    },

    #[error("store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A persisted entity: one kind, one string id.
pub trait Entity: Serialize + DeserializeOwned {
    const KIND: EntityKind;

    fn entity_id(&self) -> String;
}

/// Raw keyed store implemented by the host.
pub trait EntityStore {
    fn get_raw(&self, kind: EntityKind, id: &str) -> StoreResult<Option<Vec<u8>>>;

    fn put_raw(&mut self, kind: EntityKind, id: &str, bytes: Vec<u8>) -> StoreResult<()>;

    fn delete_raw(&mut self, kind: EntityKind, id: &str) -> StoreResult<()>;

    /// Ids of every stored entity of `kind`, sorted.
    fn ids(&self, kind: EntityKind) -> StoreResult<Vec<String>>;
}

/// Typed access on top of [`EntityStore`].
pub trait EntityStoreExt: EntityStore {
    fn load<E: Entity>(&self, id: &str) -> StoreResult<Option<E>> {
        match self.get_raw(E::KIND, id)? {
            Some(bytes) => from_cbor(&bytes).map(Some).map_err(|source| StoreError::Codec {
                kind: E::KIND,
                id: id.to_string(),
                source,
            }),
            None => Ok(None),
        }
    }

    fn exists<E: Entity>(&self, id: &str) -> StoreResult<bool> {
        Ok(self.get_raw(E::KIND, id)?.is_some())
    }

    fn save<E: Entity>(&mut self, entity: &E) -> StoreResult<()> {
        let id = entity.entity_id();
        let bytes = to_cbor(entity).map_err(|source| StoreError::Codec {
            kind: E::KIND,
            id: id.clone(),
            source,
        })?;
        self.put_raw(E::KIND, &id, bytes)
    }

    fn remove<E: Entity>(&mut self, id: &str) -> StoreResult<()> {
        self.delete_raw(E::KIND, id)
    }

    fn load_all<E: Entity>(&self) -> StoreResult<Vec<E>> {
        let mut out = Vec::new();
        for id in self.ids(E::KIND)? {
            if let Some(entity) = self.load::<E>(&id)? {
                out.push(entity);
            }
        }
        Ok(out)
    }
}

impl<T: EntityStore + ?Sized> EntityStoreExt for T {}
