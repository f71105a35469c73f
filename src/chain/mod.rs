//! External collaborators of the ledger: read-only contract queries, proposal
//! metadata retrieval and the contract version registry.
//!
//! - Synchronous trait seams so handlers never suspend mid-event
//! - Recorded implementations for replay and tests

pub mod metadata;
pub mod recorded;
pub mod traits;
pub mod version;

pub use metadata::{DirMetadata, MemoryMetadata, NoMetadata};
pub use recorded::{RecordedChain, RecordedResponses};
pub use traits::{
    ChainError, ChainReader, ChainResult, ContributionKind, DaoBountyPreview, MetadataFetcher,
    OrganizationInfo, ProposalMetadata, ProposalSnapshot, ProposalTimes, RedemptionPreview,
    TokenInfo, VotingParams,
};
pub use version::{ContractVersion, VersionEntry, VersionRegistry, DEFAULT_VERSION_TAG};
