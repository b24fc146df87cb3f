//! Top-level engine facade (spec §9, "Dynamic-dispatch engine interface"):
//! the small capability set external callers actually consume, modeled as a
//! trait so a node can hold `Box<dyn ConsensusEngine>` / `Arc<dyn
//! ConsensusEngine>` without knowing the concrete signer scheme or storage
//! backend.
//!
//! Grounded in `consensus/parlia/engine.rs`'s `Consensus` trait surface
//! (`validate_header`, `prepare`, `finalize`, `seal`, ...), trimmed to the
//! eleven methods spec §9 enumerates and stripped of the BSC-specific vote
//! attestation / system-transaction hooks.

use std::sync::Arc;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::config::DposConfig;
use crate::error::DposResult;
use crate::external::{ChainHeaderReader, KvStore, SigningService, WorldStateReader};
use crate::header::Header;
use crate::proposer::Proposer;
use crate::replay::ReplayEngine;
use crate::rpc::{ConsensusApi, ConsensusRpcHandler};
use crate::seal::SealCodec;
use crate::snapshot::Snapshot;
use crate::verifier::{CancellationFlag, Verifier};

/// The capability set external callers consume (spec §9). `K` is the
/// snapshot-store backing type and `S` the signing-service type; a node
/// wires these once at construction and then only ever touches the trait
/// object.
#[async_trait]
pub trait ConsensusEngine: Send + Sync {
    fn verify_header(&self, header: &Header, parent: Option<&Header>, now_ms: u64) -> DposResult<()>;

    fn verify_headers(
        &self,
        reader: &(dyn ChainHeaderReader),
        headers: &[Header],
        now_ms: u64,
        cancel: &CancellationFlag,
    ) -> DposResult<()>;

    fn prepare(&self, parent: &Header, parent_snapshot: &Snapshot, now_ms: u64) -> Header;

    fn finalize(&self, header: &mut Header, reward_state_root: B256);

    fn finalize_and_assemble(
        &self,
        header: &mut Header,
        world_state: &(dyn WorldStateReader),
        reward_state_root: B256,
    ) -> DposResult<()>;

    async fn seal(
        &self,
        header: Header,
        snapshot: &Snapshot,
        now_ms: u64,
        cancel: CancellationToken,
    ) -> DposResult<oneshot::Receiver<Header>>;

    /// The validator who produced `header` (its recovered signer).
    fn author(&self, header: &Header) -> DposResult<Address>;

    /// The pre-seal digest a caller would need to sign `header` out of band.
    fn seal_hash(&self, header: &Header) -> B256;

    /// The difficulty `validator` must declare for block `number` under `snapshot`.
    fn calc_difficulty(&self, snapshot: &Snapshot, validator: Address, number: u64) -> u64;

    /// The read-only RPC namespaces this engine exposes (spec §6, §9).
    fn apis(&self) -> Vec<ConsensusApi>;

    /// Release any resources held by the engine. A no-op here: the engine
    /// holds no background tasks of its own: sealing tasks are spawned and
    /// owned per-call (see `Proposer::seal`).
    fn close(&self) -> DposResult<()> {
        Ok(())
    }
}

/// Concrete engine wiring the replay engine, verifier, and proposer for one
/// chain and one local validator identity.
pub struct DposEngine<K: KvStore, S: SigningService> {
    config: DposConfig,
    codec: SealCodec,
    verifier: Verifier<K>,
    proposer: Proposer<S>,
    rpc: ConsensusRpcHandler<K>,
}

impl<K: KvStore, S: SigningService> DposEngine<K, S> {
    pub fn new(config: DposConfig, replay: ReplayEngine<K>, local_validator: Address, signer: S) -> Self {
        let codec = SealCodec::new(config.seal_signer_type);
        let proposer = Proposer::new(config.clone(), local_validator, signer);
        // Shared between the verifier (parent-snapshot lookups) and the RPC
        // handler (full resolve() on read queries), so both see the same
        // cache and disk checkpoints.
        let replay = Arc::new(replay);
        let rpc = ConsensusRpcHandler::new(replay.clone());
        let verifier = Verifier::new(config.clone(), replay);
        Self { config, codec, verifier, proposer, rpc }
    }

    pub fn config(&self) -> &DposConfig {
        &self.config
    }

    pub fn replay(&self) -> &ReplayEngine<K> {
        self.verifier.replay()
    }
}

#[async_trait]
impl<K, S> ConsensusEngine for DposEngine<K, S>
where
    K: KvStore + 'static,
    S: SigningService + 'static,
{
    fn verify_header(&self, header: &Header, parent: Option<&Header>, now_ms: u64) -> DposResult<()> {
        self.verifier.verify_header(header, parent, now_ms)
    }

    fn verify_headers(
        &self,
        reader: &(dyn ChainHeaderReader),
        headers: &[Header],
        now_ms: u64,
        cancel: &CancellationFlag,
    ) -> DposResult<()> {
        self.verifier.verify_headers(reader, headers, now_ms, cancel)
    }

    fn prepare(&self, parent: &Header, parent_snapshot: &Snapshot, now_ms: u64) -> Header {
        self.proposer.prepare(parent, parent_snapshot, now_ms)
    }

    fn finalize(&self, header: &mut Header, reward_state_root: B256) {
        self.proposer.finalize(header, reward_state_root)
    }

    fn finalize_and_assemble(
        &self,
        header: &mut Header,
        world_state: &(dyn WorldStateReader),
        reward_state_root: B256,
    ) -> DposResult<()> {
        self.proposer.finalize_and_assemble(header, world_state, reward_state_root)
    }

    async fn seal(
        &self,
        header: Header,
        snapshot: &Snapshot,
        now_ms: u64,
        cancel: CancellationToken,
    ) -> DposResult<oneshot::Receiver<Header>> {
        self.proposer.seal(header, snapshot, now_ms, cancel).await
    }

    fn author(&self, header: &Header) -> DposResult<Address> {
        self.codec.recover(header)
    }

    fn seal_hash(&self, header: &Header) -> B256 {
        self.codec.digest(header)
    }

    fn calc_difficulty(&self, snapshot: &Snapshot, validator: Address, number: u64) -> u64 {
        snapshot.expected_difficulty(validator, number)
    }

    fn apis(&self) -> Vec<ConsensusApi> {
        self.rpc.apis()
    }
}

/// Test faker: short-circuits difficulty and seal verification and is
/// constructed with a null storage backend (spec §9: "a test faker variant
/// short-circuits difficulty and seal checks and is constructed with a null
/// storage backend").
pub struct FakerEngine {
    local_validator: Address,
}

impl FakerEngine {
    pub fn new(local_validator: Address) -> Self {
        Self { local_validator }
    }
}

#[async_trait]
impl ConsensusEngine for FakerEngine {
    fn verify_header(&self, _header: &Header, _parent: Option<&Header>, _now_ms: u64) -> DposResult<()> {
        Ok(())
    }

    fn verify_headers(
        &self,
        _reader: &(dyn ChainHeaderReader),
        _headers: &[Header],
        _now_ms: u64,
        _cancel: &CancellationFlag,
    ) -> DposResult<()> {
        Ok(())
    }

    fn prepare(&self, parent: &Header, _parent_snapshot: &Snapshot, now_ms: u64) -> Header {
        Header {
            parent_hash: parent.hash(),
            number: parent.number + 1,
            coinbase: self.local_validator,
            timestamp_ms: now_ms,
            ..Default::default()
        }
    }

    fn finalize(&self, header: &mut Header, reward_state_root: B256) {
        header.state_root = reward_state_root;
    }

    fn finalize_and_assemble(
        &self,
        header: &mut Header,
        _world_state: &(dyn WorldStateReader),
        reward_state_root: B256,
    ) -> DposResult<()> {
        header.state_root = reward_state_root;
        Ok(())
    }

    async fn seal(
        &self,
        header: Header,
        _snapshot: &Snapshot,
        _now_ms: u64,
        _cancel: CancellationToken,
    ) -> DposResult<oneshot::Receiver<Header>> {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(header);
        Ok(rx)
    }

    fn author(&self, header: &Header) -> DposResult<Address> {
        Ok(header.coinbase)
    }

    fn seal_hash(&self, header: &Header) -> B256 {
        header.hash()
    }

    fn calc_difficulty(&self, _snapshot: &Snapshot, _validator: Address, _number: u64) -> u64 {
        crate::constants::DIFF_INTURN
    }

    fn apis(&self) -> Vec<ConsensusApi> {
        Vec::new()
    }
}
