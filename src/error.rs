//! Error taxonomy for the DPoS consensus engine (spec §7).
//!
//! Every kind below is distinguished deliberately: callers branch on it (e.g.
//! `FutureBlock` is retryable, everything else permanent). The teacher crate
//! collapses these into `reth::consensus::ConsensusError::Other(String)`
//! because it defers to Reth's workspace-wide error type; this crate is not
//! embedded in Reth, so we give the taxonomy real variants the way
//! `transaction_splitter.rs`'s `TransactionSplitterError` already does for
//! its narrower slice of errors.

use alloy_primitives::{Address, B256};
use thiserror::Error;

/// Errors raised while validating, replaying, or sealing headers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DposError {
    /// Header has no resolvable number, or sealing was attempted at height 0.
    #[error("unknown block")]
    UnknownBlock,

    /// The parent header could not be resolved while walking back for a snapshot.
    #[error("unknown ancestor for block {number} (parent {parent_hash})")]
    UnknownAncestor { number: u64, parent_hash: B256 },

    /// `header.time > now + grace`.
    #[error("future block: time {time} exceeds now+grace {allowed}")]
    FutureBlock { time: u64, allowed: u64 },

    /// `extra` is shorter than the 32-byte vanity prefix.
    #[error("extra-data missing 32-byte vanity prefix")]
    MissingVanity,

    /// `extra` is shorter than `vanity + seal_len` on a non-genesis header.
    #[error("extra-data missing seal suffix")]
    MissingSignature,

    /// Validator bytes on an epoch block are empty or misaligned.
    #[error("invalid checkpoint validator bytes at block {number}")]
    InvalidCheckpointValidators { number: u64 },

    /// Validator bytes are present on a non-epoch block.
    #[error("unexpected validator bytes on non-epoch block {number}")]
    ExtraValidators { number: u64 },

    /// `uncle_hash` is not the canonical empty-uncles marker.
    #[error("invalid uncle hash")]
    InvalidUncleHash,

    /// `mix_digest` is not zero.
    #[error("invalid mix digest")]
    InvalidMixDigest,

    /// Declared difficulty is outside `{1, 2}` on a non-genesis block.
    #[error("invalid difficulty {0}")]
    InvalidDifficulty(u64),

    /// `gas_limit` exceeds the protocol maximum.
    #[error("gas limit {0} exceeds protocol maximum")]
    InvalidGasLimit(u64),

    /// Declared difficulty does not match the in-turn predicate.
    #[error("wrong difficulty: expected {expected}, got {actual}")]
    WrongDifficulty { expected: u64, actual: u64 },

    /// `time < parent.time + period_ms`.
    #[error("invalid timestamp: {time} < parent {parent_time} + period {period_ms}")]
    InvalidTimestamp { time: u64, parent_time: u64, period_ms: u64 },

    /// Seal bytes failed to verify, or signer recovery failed.
    #[error("invalid signature")]
    InvalidSignature,

    /// Recovered signer does not equal the header's declared coinbase.
    #[error("invalid coinbase: signer {signer} != coinbase {coinbase}")]
    InvalidCoinbase { signer: Address, coinbase: Address },

    /// Signer is not a member of the active validator set.
    #[error("unauthorized validator {0}")]
    UnauthorizedValidator(Address),

    /// Signer is still inside the recency window.
    #[error("validator {0} signed too recently")]
    RecentlySigned(Address),

    /// A header batch handed to the bulk verifier is not contiguous.
    #[error("non-contiguous header chain at block {0}")]
    InvalidChain(u64),

    /// The backing key-value store returned an error while reading or writing
    /// a snapshot checkpoint. Fatal for the call that triggered it.
    #[error("snapshot store error: {0}")]
    Store(String),

    /// The configured signer scheme rejected seal bytes of the wrong length.
    #[error("wrong seal length for signer scheme: expected {expected}, got {actual}")]
    WrongSealLength { expected: usize, actual: usize },

    /// The local validator attempted to seal while absent from the snapshot,
    /// or while still inside the recency window.
    #[error("local validator not eligible to seal")]
    NotEligibleToSeal,

    /// The external signing service refused or failed to produce a signature.
    #[error("signer service error: {0}")]
    SignerService(String),

    /// `finalize_and_assemble` was asked to embed an empty validator set.
    #[error("refusing to assemble epoch block with empty validator set")]
    EmptyValidatorSet,
}

pub type DposResult<T> = Result<T, DposError>;
