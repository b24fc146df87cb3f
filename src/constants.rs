//! Numeric constants for header `extraData` layout and consensus timing.
//! Values mirror the DPoS wire format (spec §6) the way
//! `consensus/parlia/constants.rs` mirrors the Go reference for Parlia.

/// Fixed 32-byte vanity prefix present in every header's `extra` field.
pub const EXTRA_VANITY: usize = 32;
/// Seal length for the secp256k1 signer scheme: 64-byte (r, s) + 1-byte recovery id.
pub const EXTRA_SEAL_SECP256K1: usize = 65;
/// Seal length for the ed25519 signer scheme: 32-byte public key + 64-byte signature.
pub const EXTRA_SEAL_ED25519: usize = 96;
/// Address length in bytes.
pub const ADDRESS_LEN: usize = 20;

/// Difficulty assigned to the in-turn proposer.
pub const DIFF_INTURN: u64 = 2;
/// Difficulty assigned to any other (out-of-turn) proposer.
pub const DIFF_NOTURN: u64 = 1;

/// Floor of the randomized out-of-turn wiggle delay.
pub const WIGGLE_FLOOR_MS: u64 = 100;
/// Ceiling of the randomized out-of-turn wiggle delay.
pub const WIGGLE_CEILING_MS: u64 = 1000;

/// Key-value store namespace prefix for persisted snapshots (spec §4.3, §6).
pub const SNAPSHOT_KEY_PREFIX: &str = "dpos-";

/// Protocol-maximum gas limit a header may declare (spec §4.5). Kept as the
/// single flat bound the spec asks for; the teacher's parent-relative
/// divisor/delta adjustment bound is BSC-fork-specific and not carried here.
pub const MAX_GAS_LIMIT: u64 = 140_000_000;

/// Recommended in-memory snapshot LRU capacity (spec §4.3).
pub const DEFAULT_SNAPSHOT_CACHE_CAPACITY: u32 = 128;
/// Recommended in-memory signer-recovery LRU capacity.
pub const DEFAULT_SIGNER_CACHE_CAPACITY: u32 = 4096;
