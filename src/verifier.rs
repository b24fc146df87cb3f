//! C5 — Verifier: validates a single header's structural, temporal, and
//! signature invariants against its parent's snapshot (spec §4.5).
//!
//! Grounded in `consensus/parlia/validation.rs::validate_header` (per-field
//! structural checks) and `parlia.rs::validate_header_extra` /
//! `verify_seal` (signer/difficulty checks against a snapshot), collapsed
//! into a single ordered check list the way spec §4.5 enumerates it, with
//! the BSC-specific hardfork branches removed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::DposConfig;
use crate::constants::MAX_GAS_LIMIT;
use crate::error::{DposError, DposResult};
use crate::extra;
use crate::external::{ChainHeaderReader, KvStore};
use crate::header::{empty_uncle_hash, Header};
use crate::replay::ReplayEngine;
use crate::seal::SealCodec;

/// A cancellation flag a caller can flip from another thread/task to abort a
/// bulk `verify_headers` run (spec §4.5: "allows external cancellation via a
/// signaling channel/flag").
#[derive(Debug, Default)]
pub struct CancellationFlag(AtomicBool);

impl CancellationFlag {
    pub fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Verifier<K: KvStore> {
    config: DposConfig,
    codec: SealCodec,
    replay: Arc<ReplayEngine<K>>,
}

impl<K: KvStore> Verifier<K> {
    /// `replay` is shared (not owned) since the RPC handler needs the same
    /// replay engine to resolve snapshots for read queries (spec §6).
    pub fn new(config: DposConfig, replay: Arc<ReplayEngine<K>>) -> Self {
        let codec = SealCodec::new(config.seal_signer_type);
        Self { config, codec, replay }
    }

    pub fn replay(&self) -> &ReplayEngine<K> {
        &self.replay
    }

    /// Check everything in spec §4.5 that holds regardless of ancestry:
    /// future-clock grace, uncle hash, mix digest, difficulty domain, extra
    /// layout, and gas limit.
    fn verify_standalone(&self, header: &Header, now_ms: u64) -> DposResult<()> {
        let allowed = now_ms + self.config.future_grace_ms();
        if header.timestamp_ms > allowed {
            return Err(DposError::FutureBlock { time: header.timestamp_ms, allowed });
        }
        if header.uncle_hash != empty_uncle_hash() {
            return Err(DposError::InvalidUncleHash);
        }
        if header.mix_digest != Default::default() {
            return Err(DposError::InvalidMixDigest);
        }
        if header.number > 0 {
            let d = header.difficulty.to::<u64>();
            if d != crate::constants::DIFF_INTURN && d != crate::constants::DIFF_NOTURN {
                return Err(DposError::InvalidDifficulty(d));
            }
        }
        if header.gas_limit > MAX_GAS_LIMIT {
            return Err(DposError::InvalidGasLimit(header.gas_limit));
        }

        let seal_len = self.config.seal_len();
        if self.config.is_epoch_block(header.number) {
            extra::parse_epoch_validators(&header.extra, seal_len, header.number)?;
        } else if header.number > 0 {
            extra::check_no_validators_on_normal_block(&header.extra, seal_len, header.number)?;
        } else {
            extra::parse_genesis_validators(&header.extra)?;
        }
        Ok(())
    }

    /// Full validation of `header` given its resolved `parent` and the
    /// snapshot at the parent (spec §4.5). `number == 0` (genesis) only runs
    /// the standalone checks; there is no parent or signer to check.
    pub fn verify_header(&self, header: &Header, parent: Option<&Header>, now_ms: u64) -> DposResult<()> {
        self.verify_standalone(header, now_ms)?;

        let Some(parent) = parent else {
            if header.number != 0 {
                return Err(DposError::UnknownAncestor {
                    number: header.number,
                    parent_hash: header.parent_hash,
                });
            }
            return Ok(());
        };

        if parent.number + 1 != header.number || parent.hash() != header.parent_hash {
            return Err(DposError::InvalidChain(header.number));
        }
        if header.timestamp_ms < parent.timestamp_ms + self.config.period_ms {
            return Err(DposError::InvalidTimestamp {
                time: header.timestamp_ms,
                parent_time: parent.timestamp_ms,
                period_ms: self.config.period_ms,
            });
        }

        let parent_snapshot = self
            .replay
            .store()
            .get_cached(parent.hash())
            .ok_or(DposError::UnknownAncestor { number: parent.number, parent_hash: parent.hash() })?;

        let signer = self.codec.recover(header)?;
        if signer != header.coinbase {
            return Err(DposError::InvalidCoinbase { signer, coinbase: header.coinbase });
        }
        if !parent_snapshot.is_validator(signer) {
            return Err(DposError::UnauthorizedValidator(signer));
        }
        if parent_snapshot.signed_recently(signer) {
            return Err(DposError::RecentlySigned(signer));
        }
        let expected = parent_snapshot.expected_difficulty(signer, header.number);
        let actual = header.difficulty.to::<u64>();
        if actual != expected {
            return Err(DposError::WrongDifficulty { expected, actual });
        }

        Ok(())
    }

    /// Validate a contiguous, ascending slice of headers in order, stopping
    /// early (and reporting the offending header's error) on the first
    /// failure, or on a cancellation request (spec §4.5: "the verifier may be
    /// called in bulk over a contiguous header slice").
    ///
    /// After each header passes, its resulting snapshot is applied and
    /// cached before the next header is checked, the way the teacher's
    /// `ParliaHeaderValidator::validate_header` advances its snapshot
    /// provider after each check — otherwise a batch of headers that were
    /// never previously imported would have no cached parent snapshot past
    /// the first header and every later one would be wrongly rejected as
    /// `UnknownAncestor`.
    pub fn verify_headers<R: ChainHeaderReader + ?Sized>(
        &self,
        reader: &R,
        headers: &[Header],
        now_ms: u64,
        cancel: &CancellationFlag,
    ) -> DposResult<()> {
        let mut prev: Option<Header> = None;
        for header in headers {
            if cancel.is_cancelled() {
                return Ok(());
            }
            let parent = match &prev {
                Some(p) => Some(p.clone()),
                None => reader.header_by_hash(header.parent_hash, header.number.saturating_sub(1)),
            };
            self.verify_header(header, parent.as_ref(), now_ms)?;

            if header.number > 0 {
                if let Some(parent_header) = &parent {
                    if let Some(parent_snapshot) = self.replay.store().get_cached(parent_header.hash()) {
                        let snap = self.replay.apply_header(&parent_snapshot, header)?;
                        self.replay.store().insert(snap)?;
                    }
                }
            }

            prev = Some(header.clone());
        }
        Ok(())
    }
}
