//! End-to-end scenarios over the public crate surface: round-robin
//! scheduling, epoch rotation, safety rejections, recency, and future-block
//! grace, matching the scenario list in spec §8.

use alloy_primitives::{Address, Bytes, U256};
use dpos_consensus::config::SealSignerType;
use dpos_consensus::error::DposError;
use dpos_consensus::external::{ChainHeaderReader, NullKvStore};
use dpos_consensus::header::{empty_uncle_hash, Header};
use dpos_consensus::replay::ReplayEngine;
use dpos_consensus::seal::SealCodec;
use dpos_consensus::snapshot::Snapshot;
use dpos_consensus::store::SnapshotStore;
use dpos_consensus::verifier::Verifier;
use dpos_consensus::{extra, DposConfig};
use ed25519_dalek::{Signer, SigningKey};
use std::collections::HashMap;

fn key_for(b: u8) -> SigningKey {
    SigningKey::from_bytes(&[b; 32])
}

fn addr_of(key: &SigningKey) -> Address {
    Address::from_slice(&alloy_primitives::keccak256(key.verifying_key().to_bytes())[12..])
}

fn sign(key: &SigningKey, header: &mut Header) {
    let codec = SealCodec::new(SealSignerType::Ed25519);
    let digest = codec.digest(header);
    let sig = key.sign(digest.as_slice());
    let mut seal = [0u8; 96];
    seal[..32].copy_from_slice(&key.verifying_key().to_bytes());
    seal[32..].copy_from_slice(&sig.to_bytes());
    header.extra = codec.write_seal(&header.extra, &seal).unwrap();
}

fn new_verifier(epoch: u64, period_ms: u64) -> Verifier<NullKvStore> {
    let config = DposConfig::new(epoch, period_ms, 10, SealSignerType::Ed25519);
    let replay = ReplayEngine::new(config.clone(), SnapshotStore::new(NullKvStore, epoch));
    Verifier::new(config, replay)
}

fn genesis_header() -> Header {
    Header { number: 0, gas_limit: 30_000_000, uncle_hash: empty_uncle_hash(), ..Default::default() }
}

fn normal_header(number: u64, parent: &Header, coinbase: Address, difficulty: u64, timestamp_ms: u64) -> Header {
    let mut header = Header {
        number,
        parent_hash: parent.hash(),
        uncle_hash: empty_uncle_hash(),
        coinbase,
        difficulty: U256::from(difficulty),
        gas_limit: 30_000_000,
        timestamp_ms,
        ..Default::default()
    };
    header.extra = extra::build_normal_extra(&[0u8; 32], 96);
    header
}

struct InMemoryChain {
    by_hash: HashMap<alloy_primitives::B256, Header>,
}

impl InMemoryChain {
    fn new() -> Self {
        Self { by_hash: HashMap::new() }
    }
}

impl ChainHeaderReader for InMemoryChain {
    fn header_by_number(&self, _number: u64) -> Option<Header> {
        None
    }

    fn header_by_hash(&self, hash: alloy_primitives::B256, _number: u64) -> Option<Header> {
        self.by_hash.get(&hash).cloned()
    }

    fn current_header(&self) -> Header {
        unimplemented!("not exercised in these scenarios")
    }
}

/// Scenario 1: single-validator chain, five blocks signed in sequence.
#[test]
fn single_validator_chain_accepts_consecutive_blocks() {
    let verifier = new_verifier(1000, 500);
    let key = key_for(1);
    let signer = addr_of(&key);
    let genesis = genesis_header();
    let genesis_snapshot = Snapshot::genesis(vec![signer], 0, genesis.hash());
    verifier.replay().store().insert(genesis_snapshot.clone()).unwrap();

    let mut parent = genesis;
    let mut snapshot = genesis_snapshot;
    for n in 1..=5u64 {
        let mut header = normal_header(n, &parent, signer, 2, n * 500);
        sign(&key, &mut header);

        verifier.verify_header(&header, Some(&parent), n * 500).unwrap();
        snapshot = verifier.replay().apply_header(&snapshot, &header).unwrap();
        verifier.replay().store().insert(snapshot.clone()).unwrap();
        parent = header;
    }
    assert_eq!(snapshot.number, 5);
}

/// Scenario 2 (abbreviated): three validators round-robin, the in-turn
/// signer for block `n` is `validators[n % 3]` with difficulty 2.
#[test]
fn three_validator_round_robin_matches_formula() {
    let verifier = new_verifier(1000, 500);
    let k_a = key_for(1);
    let k_b = key_for(2);
    let k_c = key_for(3);
    let mut validators = vec![addr_of(&k_a), addr_of(&k_b), addr_of(&k_c)];
    validators.sort();
    let keys = [&k_a, &k_b, &k_c];
    let key_of = |a: Address| keys.iter().find(|k| addr_of(k) == a).copied().unwrap();

    let genesis = genesis_header();
    let mut snapshot = Snapshot::genesis(validators.clone(), 0, genesis.hash());
    verifier.replay().store().insert(snapshot.clone()).unwrap();

    let mut parent = genesis;
    for n in 1..=16u64 {
        let expected_signer = validators[(n as usize) % validators.len()];
        let mut header = normal_header(n, &parent, expected_signer, 2, n * 500);
        sign(key_of(expected_signer), &mut header);

        verifier.verify_header(&header, Some(&parent), n * 500).unwrap();
        snapshot = verifier.replay().apply_header(&snapshot, &header).unwrap();
        verifier.replay().store().insert(snapshot.clone()).unwrap();
        parent = header;
    }
}

/// Scenario 3: epoch rotation at `epoch = 2` swaps the active validator set,
/// and block 3 must be signed by the new set under the new in-turn rule.
#[test]
fn epoch_rotation_swaps_validator_set_at_boundary() {
    let verifier = new_verifier(2, 500);
    let k_a = key_for(10);
    let k_b = key_for(11);
    let mut validators = vec![addr_of(&k_a), addr_of(&k_b)];
    validators.sort();
    let key_of = |a: Address| if a == addr_of(&k_a) { &k_a } else { &k_b };

    let genesis = genesis_header();
    let mut snapshot = Snapshot::genesis(validators.clone(), 0, genesis.hash());
    verifier.replay().store().insert(snapshot.clone()).unwrap();

    // Block 1: normal block signed by the old set's in-turn validator.
    let signer1 = validators[1 % validators.len()];
    let mut h1 = normal_header(1, &genesis, signer1, 2, 500);
    sign(key_of(signer1), &mut h1);
    verifier.verify_header(&h1, Some(&genesis), 500).unwrap();
    snapshot = verifier.replay().apply_header(&snapshot, &h1).unwrap();
    verifier.replay().store().insert(snapshot.clone()).unwrap();

    // Block 2: epoch boundary, old set signs, embeds the new set.
    let k_c = key_for(12);
    let new_validators = {
        let mut v = vec![addr_of(&k_c)];
        v.sort();
        v
    };
    let signer2 = validators[2 % validators.len()];
    let mut h2 = Header {
        number: 2,
        parent_hash: h1.hash(),
        uncle_hash: empty_uncle_hash(),
        coinbase: signer2,
        difficulty: U256::from(2u64),
        gas_limit: 30_000_000,
        timestamp_ms: 1000,
        ..Default::default()
    };
    h2.extra = extra::build_epoch_extra(&[0u8; 32], &new_validators, 96);
    sign(key_of(signer2), &mut h2);
    verifier.verify_header(&h2, Some(&h1), 1000).unwrap();
    snapshot = verifier.replay().apply_header(&snapshot, &h2).unwrap();
    verifier.replay().store().insert(snapshot.clone()).unwrap();
    assert_eq!(snapshot.validators, new_validators);

    // Block 3: must be signed by new_set[3 % 1] = new_set[0], in-turn.
    let mut h3 = normal_header(3, &h2, addr_of(&k_c), 2, 1500);
    sign(&k_c, &mut h3);
    verifier.verify_header(&h3, Some(&h2), 1500).unwrap();
}

/// Scenario 4: safety rejections — wrong difficulty, coinbase mismatch, and
/// an unauthorized signer are each rejected with the specific error.
#[test]
fn safety_rejections_are_distinguished() {
    let verifier = new_verifier(1000, 500);
    let key_a = key_for(1);
    let signer_a = addr_of(&key_a);
    let genesis = genesis_header();
    let snapshot = Snapshot::genesis(vec![signer_a], 0, genesis.hash());
    verifier.replay().store().insert(snapshot).unwrap();

    // (a) difficulty mutated to 1 while A is in-turn for block 1.
    let mut h_wrong_difficulty = normal_header(1, &genesis, signer_a, 1, 500);
    sign(&key_a, &mut h_wrong_difficulty);
    let err = verifier.verify_header(&h_wrong_difficulty, Some(&genesis), 500).unwrap_err();
    assert!(matches!(err, DposError::WrongDifficulty { .. }));

    // (b) coinbase set to an address other than the actual signer.
    let key_b = key_for(2);
    let mut h_bad_coinbase = normal_header(1, &genesis, addr_of(&key_b), 2, 500);
    sign(&key_a, &mut h_bad_coinbase);
    let err = verifier.verify_header(&h_bad_coinbase, Some(&genesis), 500).unwrap_err();
    assert!(matches!(err, DposError::InvalidCoinbase { .. }));

    // (c) signed by an outsider key not in the validator set.
    let key_outsider = key_for(99);
    let mut h_outsider = normal_header(1, &genesis, addr_of(&key_outsider), 2, 500);
    sign(&key_outsider, &mut h_outsider);
    let err = verifier.verify_header(&h_outsider, Some(&genesis), 500).unwrap_err();
    assert!(matches!(err, DposError::UnauthorizedValidator(_)));
}

/// Scenario 5: recency — with three validators (`W = 2`), a signer who also
/// signed the immediately preceding block is rejected; the same signer is
/// admissible again once its last signature slides outside the window.
#[test]
fn recency_window_rejects_and_later_admits_same_signer() {
    let k_a = key_for(1);
    let k_b = key_for(2);
    let k_c = key_for(3);
    let mut validators = vec![addr_of(&k_a), addr_of(&k_b), addr_of(&k_c)];
    validators.sort();

    let mut snapshot = Snapshot::genesis(validators.clone(), 1, Default::default());
    snapshot.recents.insert(1, validators[0]); // W = floor(3/2)+1 = 2

    assert!(snapshot.signed_recently(validators[0]));

    let mut later = snapshot.clone();
    later.number = 2;
    later.slide_recency_window(3); // evicts key 3-2=1
    assert!(!later.signed_recently(validators[0]));
}

/// Scenario 6: future-block grace at `period_ms = 360` is exactly `1080 ms`;
/// one millisecond past that is rejected.
#[test]
fn future_block_grace_boundary() {
    let verifier = new_verifier(1000, 360);
    let mut genesis = genesis_header();
    genesis.extra = {
        let mut e = vec![0u8; 32];
        e.extend_from_slice(Address::ZERO.as_slice());
        Bytes::from(e)
    };

    let mut at_grace = genesis.clone();
    at_grace.timestamp_ms = 1_080;
    verifier.verify_header(&at_grace, None, 0).unwrap();

    let mut past_grace = genesis;
    past_grace.timestamp_ms = 1_081;
    let err = verifier.verify_header(&past_grace, None, 0).unwrap_err();
    assert!(matches!(err, DposError::FutureBlock { .. }));
}

#[test]
fn replay_rejects_unknown_ancestor_during_resolution() {
    let config = DposConfig::new(1000, 500, 10, SealSignerType::Ed25519);
    let replay = ReplayEngine::new(config, SnapshotStore::new(NullKvStore, 1000));
    let chain = InMemoryChain::new();
    let genesis = genesis_header();
    let err = replay
        .resolve(&chain, 5, alloy_primitives::B256::repeat_byte(0x77), &genesis)
        .unwrap_err();
    assert!(matches!(err, DposError::UnknownAncestor { .. }));
}
