//! External collaborators the engine depends on at its boundary (spec §6).
//! Out of scope to implement here (block execution, p2p, tx pool, RPC
//! formatting); this module only names the contracts the engine requires of
//! them, the way `consensus/parlia/provider.rs::SnapshotProvider` names the
//! contract it requires of its caller.

use alloy_primitives::{Address, B256};

use crate::error::DposResult;
use crate::header::Header;

/// Chain header reader: the engine's view of the canonical chain (spec §6).
/// Must be monotonically consistent with insertion.
pub trait ChainHeaderReader: Send + Sync {
    fn header_by_number(&self, number: u64) -> Option<Header>;
    fn header_by_hash(&self, hash: B256, number: u64) -> Option<Header>;
    fn current_header(&self) -> Header;
}

/// World-state reader: yields the active validator registry at epoch
/// assembly time (spec §6). Contract: ascending-by-address, length in
/// `[1, max_validators]`, each address backed by at least the minimum
/// self-stake (enforced by the world state, not by this engine).
pub trait WorldStateReader: Send + Sync {
    fn active_validators(&self, state_root: B256) -> DposResult<Vec<Address>>;
}

/// Key-value store used for epoch-checkpoint persistence (spec §4.3, §6).
/// When absent, epoch snapshots are recomputed from history on every
/// restart; the engine must not require disk presence to function.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> DposResult<Option<Vec<u8>>>;
    fn put(&self, key: &[u8], value: &[u8]) -> DposResult<()>;
}

/// A `KvStore` that is always empty and discards writes — the "absent
/// backing store" case spec §4.3 requires the engine to tolerate.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullKvStore;

impl KvStore for NullKvStore {
    fn get(&self, _key: &[u8]) -> DposResult<Option<Vec<u8>>> {
        Ok(None)
    }

    fn put(&self, _key: &[u8], _value: &[u8]) -> DposResult<()> {
        Ok(())
    }
}

/// External signing service (spec §6). The MIME-type-like domain tag passed
/// to `sign` must be rejected by the service for any purpose other than
/// DPoS consensus seals — that guarantee lives in the signing service, not
/// here; this trait only names the call shape.
pub trait SigningService: Send + Sync {
    fn sign(&self, account: Address, mime: &str, digest: B256) -> DposResult<Vec<u8>>;
}

/// The MIME-type-like domain tag this engine uses for all seal signatures
/// (spec §4.6 step 4).
pub const CONSENSUS_SEAL_MIME: &str = "application/x-dpos-seal";
