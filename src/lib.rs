//! Delegated Proof-of-Stake consensus engine library: round-robin validator
//! scheduling, snapshot replay, header verification, and sealing.
//!
//! The crate is split along the six components the design is organized
//! around: seal codec (`seal`), snapshot value object (`snapshot`),
//! snapshot store/cache (`store`), replay engine (`replay`), verifier
//! (`verifier`), and proposer/sealer (`proposer`), wired together behind the
//! `engine` facade.

pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod external;
pub mod extra;
pub mod header;
pub mod proposer;
pub mod replay;
pub mod rpc;
pub mod seal;
pub mod snapshot;
pub mod store;
pub mod verifier;

pub use config::{DposConfig, SealSignerType};
pub use engine::{ConsensusEngine, DposEngine, FakerEngine};
pub use error::{DposError, DposResult};
pub use header::Header;
pub use proposer::Proposer;
pub use replay::ReplayEngine;
pub use rpc::{ConsensusApi, ConsensusRpcHandler};
pub use seal::SealCodec;
pub use snapshot::Snapshot;
pub use store::{SignerCache, SnapshotStore};
pub use verifier::{CancellationFlag, Verifier};
