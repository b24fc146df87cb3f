//! C2 — Snapshot value object and ordering policy (spec §3, §4.2).
//!
//! Grounded in `consensus/parlia/snapshot.rs::Snapshot`, trimmed to the
//! single-`validators`-list model spec §3 describes (no BLS vote addresses,
//! no turn-length, no vote-attestation bookkeeping — those belong to the
//! BFT-voting subsystem this spec excludes) and generalized so the recency
//! window survives validator-set resizing the way spec §4.2/§4.4 require.

use std::collections::{BTreeMap, HashSet};

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

/// Immutable-per-step view of `{validator set, recent-signer map, terminal
/// block}` at a given height (spec §3).
///
/// A `Snapshot` handed out by the cache or store is logically immutable: the
/// replay engine always deep-copies (`Clone`) before mutating, per spec §3
/// invariant 6 and the design note in spec §9 ("model snapshots as immutable
/// values ... this removes the error class where a replay accidentally
/// corrupts a cached snapshot").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Terminal block number this snapshot summarizes.
    pub number: u64,
    /// Terminal block hash this snapshot summarizes.
    pub hash: B256,
    /// Active validator set, strictly ascending by byte order.
    pub validators: Vec<Address>,
    /// Block number -> signer, for every block still inside the recency window.
    pub recents: BTreeMap<u64, Address>,
}

impl Snapshot {
    /// Build a genesis snapshot from an already-sorted, deduplicated
    /// validator list. Callers (the genesis-extra parser) are responsible
    /// for sorting; this constructor only asserts the invariant holds.
    pub fn genesis(validators: Vec<Address>, number: u64, hash: B256) -> Self {
        debug_assert!(is_sorted_and_deduped(&validators));
        Self { number, hash, validators, recents: BTreeMap::new() }
    }

    /// The recency window `W = floor(len(validators)/2) + 1` (spec §4.2, Glossary).
    #[inline]
    pub fn recency_window(&self) -> u64 {
        (self.validators.len() / 2 + 1) as u64
    }

    /// The in-turn validator for block `n`: `validators[n mod len(validators)]`.
    ///
    /// Panics if `validators` is empty; invariant 1 (spec §3) guarantees it
    /// never is for a snapshot that has passed construction.
    pub fn in_turn_validator(&self, number: u64) -> Address {
        self.validators[(number as usize) % self.validators.len()]
    }

    /// `true` iff `validator` is the canonical in-turn proposer for `number`.
    pub fn is_in_turn(&self, validator: Address, number: u64) -> bool {
        self.in_turn_validator(number) == validator
    }

    /// The difficulty a header signed by `validator` at `number` must declare
    /// (spec §4.2): 2 when in-turn, 1 otherwise.
    pub fn expected_difficulty(&self, validator: Address, number: u64) -> u64 {
        if self.is_in_turn(validator, number) {
            crate::constants::DIFF_INTURN
        } else {
            crate::constants::DIFF_NOTURN
        }
    }

    /// `true` iff `self.validators` contains `validator`.
    #[inline]
    pub fn is_validator(&self, validator: Address) -> bool {
        // `validators` is the source of truth (spec §3); a small sorted Vec
        // scan is cheap enough that we don't need a separate `validators_map`
        // field to go stale relative to it (see DESIGN.md).
        self.validators.binary_search(&validator).is_ok()
    }

    /// `true` iff `validator` signed some block still inside the recency
    /// window ending at `self.number` (spec §4.2).
    ///
    /// Block numbers below `W` never reject on recency (spec §4.2: "Block
    /// `n < W` never rejects on recency"), which falls out naturally here
    /// because `recents` never holds entries below `max(0, number - W + 1)`.
    pub fn signed_recently(&self, validator: Address) -> bool {
        self.recents.values().any(|v| *v == validator)
    }

    /// Evict the recency entry that just slid out of the window for the
    /// upcoming block `next_number` (spec §4.4 step 1): drop the entry at key
    /// `next_number - W` if it exists and `next_number >= W`.
    pub fn slide_recency_window(&mut self, next_number: u64) {
        let w = self.recency_window();
        if next_number >= w {
            self.recents.remove(&(next_number - w));
        }
    }

    /// Trim any `recents` entry whose key now falls outside the window
    /// implied by `self.number` and the *current* `validators` length. Used
    /// after an epoch rotation changes `len(validators)` and therefore `W`
    /// (spec §4.4 step 6).
    pub fn trim_recents_to_window(&mut self) {
        let w = self.recency_window();
        let floor = self.number.saturating_sub(w.saturating_sub(1));
        self.recents.retain(|&k, _| k >= floor && k <= self.number);
    }

    /// Replace the validator set (epoch rotation, spec §4.2/§4.4 step 6).
    /// `new_validators` must already be sorted ascending; the caller (the
    /// epoch-extra parser) enforces this, but we still assert it here since
    /// spec §4.4 step 6 explicitly calls out that "an implementation must
    /// still enforce this".
    pub fn rotate_validators(&mut self, new_validators: Vec<Address>) {
        debug_assert!(is_sorted_and_deduped(&new_validators));
        self.validators = new_validators;
        self.trim_recents_to_window();
    }

    /// Check every invariant in spec §3/§8 holds. Used by tests and as a
    /// debug assertion at cache-insertion boundaries.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.validators.is_empty() {
            return Err("validators must be non-empty".into());
        }
        if !is_sorted_and_deduped(&self.validators) {
            return Err("validators must be sorted ascending without duplicates".into());
        }
        let set: HashSet<Address> = self.validators.iter().copied().collect();
        let mut seen = HashSet::new();
        for (&k, v) in &self.recents {
            if !set.contains(v) {
                return Err(format!("recents[{k}] = {v} is not an active validator"));
            }
            if !seen.insert(*v) {
                return Err(format!("validator {v} appears more than once in recents"));
            }
        }
        let w = self.recency_window();
        let floor = self.number.saturating_sub(w.saturating_sub(1));
        for &k in self.recents.keys() {
            if k < floor || k > self.number {
                return Err(format!("recents key {k} outside window [{floor}, {}]", self.number));
            }
        }
        Ok(())
    }
}

fn is_sorted_and_deduped(addrs: &[Address]) -> bool {
    addrs.windows(2).all(|w| w[0] < w[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    #[test]
    fn recency_window_matches_formula() {
        let snap = Snapshot::genesis(vec![addr(1), addr(2), addr(3)], 0, B256::ZERO);
        assert_eq!(snap.recency_window(), 2); // floor(3/2)+1 = 2
        let snap4 = Snapshot::genesis(vec![addr(1), addr(2), addr(3), addr(4)], 0, B256::ZERO);
        assert_eq!(snap4.recency_window(), 3); // floor(4/2)+1 = 3
    }

    #[test]
    fn in_turn_rotates_round_robin() {
        let snap = Snapshot::genesis(vec![addr(1), addr(2), addr(3)], 0, B256::ZERO);
        assert_eq!(snap.in_turn_validator(0), addr(1));
        assert_eq!(snap.in_turn_validator(1), addr(2));
        assert_eq!(snap.in_turn_validator(3), addr(1));
    }

    #[test]
    fn invariants_reject_out_of_set_recents() {
        let mut snap = Snapshot::genesis(vec![addr(1), addr(2), addr(3)], 5, B256::ZERO);
        snap.recents.insert(5, addr(9));
        assert!(snap.check_invariants().is_err());
    }

    #[test]
    fn slide_recency_window_evicts_expired_entry() {
        let mut snap = Snapshot::genesis(vec![addr(1), addr(2), addr(3)], 4, B256::ZERO);
        snap.recents.insert(3, addr(1));
        snap.slide_recency_window(5); // W=2, evict key 5-2=3
        assert!(!snap.recents.contains_key(&3));
    }
}
