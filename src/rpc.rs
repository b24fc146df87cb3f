//! Read-only RPC surface (spec §6: "Two read-only queries keyed by block
//! number (or `latest`)"; §9 open question 2).
//!
//! The teacher carries two divergent copies of this query surface in
//! `rpc/engine_api/` — one returning a richer `ValidatorInfo`, one returning
//! raw addresses — without stating which is authoritative (spec §9). We
//! resolve that ambiguity by keeping exactly one shape: the full `Snapshot`
//! plus its derived validator list, nothing richer (SPEC_FULL.md §12.2).

use std::sync::Arc;

use alloy_primitives::Address;

use crate::error::{DposError, DposResult};
use crate::external::{ChainHeaderReader, KvStore};
use crate::header::Header;
use crate::replay::ReplayEngine;
use crate::snapshot::Snapshot;

/// Describes one read-only namespace this engine exposes over RPC, in lieu
/// of depending on a concrete JSON-RPC transport crate at this layer (spec
/// §1: RPC wire formatting is out of scope; only the query surface is not).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsensusApi {
    pub namespace: &'static str,
    pub method: &'static str,
}

/// A block reference the way a JSON-RPC caller would name one (spec §6):
/// either an exact height, or the chain's current tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Number(u64),
    Latest,
}

/// Backs the two read-only queries a node's RPC layer needs from this
/// engine: "what is the snapshot at this block" and "who are the active
/// validators at this block", keyed by block number or `latest` (spec §6).
/// Both go through the replay engine's full resolution strategy rather than
/// a bare cache peek, so an evicted-from-LRU-but-still-derivable snapshot
/// (spec §3: "eviction from the in-memory cache is silent and recoverable
/// by replay from disk or from a further-back snapshot") still answers
/// correctly instead of silently returning nothing.
pub struct ConsensusRpcHandler<K: KvStore> {
    replay: Arc<ReplayEngine<K>>,
}

impl<K: KvStore> ConsensusRpcHandler<K> {
    pub fn new(replay: Arc<ReplayEngine<K>>) -> Self {
        Self { replay }
    }

    /// The snapshot valid at `tag`, resolving through cache, disk, or replay
    /// as needed (spec §4.4's resolution strategy).
    pub fn get_snapshot<R: ChainHeaderReader + ?Sized>(
        &self,
        reader: &R,
        genesis: &Header,
        tag: BlockTag,
    ) -> DposResult<Snapshot> {
        let header = self.resolve_header(reader, genesis, tag)?;
        self.replay.resolve(reader, header.number, header.hash(), genesis)
    }

    /// The active validator set at `tag`, derived from the resolved snapshot
    /// (spec §9 open question 2: raw addresses, not `ValidatorInfo`).
    pub fn get_validators<R: ChainHeaderReader + ?Sized>(
        &self,
        reader: &R,
        genesis: &Header,
        tag: BlockTag,
    ) -> DposResult<Vec<Address>> {
        self.get_snapshot(reader, genesis, tag).map(|s| s.validators)
    }

    fn resolve_header<R: ChainHeaderReader + ?Sized>(
        &self,
        reader: &R,
        genesis: &Header,
        tag: BlockTag,
    ) -> DposResult<Header> {
        match tag {
            BlockTag::Latest => Ok(reader.current_header()),
            BlockTag::Number(0) => Ok(genesis.clone()),
            BlockTag::Number(number) => reader
                .header_by_number(number)
                .ok_or(DposError::UnknownAncestor { number, parent_hash: Default::default() }),
        }
    }

    pub fn apis(&self) -> Vec<ConsensusApi> {
        vec![
            ConsensusApi { namespace: "dpos", method: "getSnapshot" },
            ConsensusApi { namespace: "dpos", method: "getValidators" },
        ]
    }
}
