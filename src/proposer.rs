//! C6 — Proposer/sealer: prepares, finalizes, and seals a header for a local
//! validator (spec §4.6).
//!
//! Grounded in `consensus/parlia/seal.rs`'s prepare/finalize/seal split and
//! its out-of-turn wiggle delay, generalized from BSC's turn-length-aware
//! delay to the single uniform `[floor, ceiling)` window spec §4.6 step 3
//! specifies. The teacher races a raw `std::thread::spawn` against a
//! `std::sync::mpsc` abort channel; here the engine already runs on tokio
//! (spec §9 ambient stack), so sealing is modeled as an async task raced
//! against a `tokio_util::sync::CancellationToken` instead.

use std::time::Duration;

use alloy_primitives::{Address, U256};
use rand::Rng;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::config::DposConfig;
use crate::constants::{DIFF_INTURN, DIFF_NOTURN, WIGGLE_CEILING_MS, WIGGLE_FLOOR_MS};
use crate::error::{DposError, DposResult};
use crate::external::{SigningService, WorldStateReader, CONSENSUS_SEAL_MIME};
use crate::extra;
use crate::header::{empty_uncle_hash, Header};
use crate::seal::SealCodec;
use crate::snapshot::Snapshot;

/// Proposer/sealer for a single local validator identity.
pub struct Proposer<S: SigningService> {
    config: DposConfig,
    codec: SealCodec,
    local_validator: Address,
    signer: S,
}

impl<S: SigningService> Proposer<S> {
    pub fn new(config: DposConfig, local_validator: Address, signer: S) -> Self {
        let codec = SealCodec::new(config.seal_signer_type);
        Self { config, codec, local_validator, signer }
    }

    /// Prepare a header's consensus-owned fields ahead of execution (spec
    /// §4.6, Prepare). `parent_snapshot` is the snapshot at `parent`.
    pub fn prepare(&self, parent: &Header, parent_snapshot: &Snapshot, now_ms: u64) -> Header {
        let number = parent.number + 1;
        let difficulty = if parent_snapshot.is_in_turn(self.local_validator, number) {
            DIFF_INTURN
        } else {
            DIFF_NOTURN
        };
        let time = std::cmp::max(parent.timestamp_ms + self.config.period_ms, now_ms);
        let vanity = [0u8; 32];
        let extra = extra::build_normal_extra(&vanity, self.codec.seal_len());

        Header {
            parent_hash: parent.hash(),
            uncle_hash: empty_uncle_hash(),
            coinbase: self.local_validator,
            state_root: Default::default(),
            transactions_root: Default::default(),
            receipts_root: Default::default(),
            logs_bloom: Default::default(),
            difficulty: U256::from(difficulty),
            number,
            gas_limit: parent.gas_limit,
            gas_used: 0,
            timestamp_ms: time,
            extra,
            mix_digest: Default::default(),
            nonce: Default::default(),
        }
    }

    /// Credit the block reward and update the state root (spec §4.6,
    /// Finalize). No error return: by the time an honest proposer reaches
    /// this path every prior check has already passed.
    pub fn finalize(&self, header: &mut Header, reward_state_root: alloy_primitives::B256) {
        header.coinbase = self.local_validator;
        header.state_root = reward_state_root;
    }

    /// Embed the next epoch's validator set (if `header.number` is an epoch
    /// boundary) and then finalize (spec §4.6, FinalizeAndAssemble).
    pub fn finalize_and_assemble<W: WorldStateReader>(
        &self,
        header: &mut Header,
        world_state: &W,
        reward_state_root: alloy_primitives::B256,
    ) -> DposResult<()> {
        if self.config.is_epoch_block(header.number) {
            let mut validators = world_state.active_validators(header.state_root)?;
            validators.sort();
            validators.dedup();
            validators.truncate(self.config.max_validators);
            if validators.is_empty() {
                return Err(DposError::EmptyValidatorSet);
            }
            let vanity = [0u8; 32];
            header.extra = extra::build_epoch_extra(&vanity, &validators, self.codec.seal_len());
        }
        self.finalize(header, reward_state_root);
        Ok(())
    }

    /// Seal `header`, honoring out-of-turn wiggle delay, and deliver it on
    /// the returned channel after `delay` elapses or the `cancel` token
    /// fires (spec §4.6, Seal). `header` must already be finalized.
    pub async fn seal(
        &self,
        mut header: Header,
        snapshot: &Snapshot,
        now_ms: u64,
        cancel: CancellationToken,
    ) -> DposResult<oneshot::Receiver<Header>> {
        // Step 1: eligibility.
        if !snapshot.is_validator(self.local_validator) {
            return Err(DposError::NotEligibleToSeal);
        }
        if snapshot.signed_recently(self.local_validator) {
            return Err(DposError::NotEligibleToSeal);
        }

        // Step 2-3: base delay plus out-of-turn wiggle.
        let base_delay_ms = header.timestamp_ms.saturating_sub(now_ms);
        let actual_difficulty = header.difficulty.to::<u64>();
        let wiggle_ms = if actual_difficulty == DIFF_NOTURN {
            let ceiling = std::cmp::min(2 * self.config.period_ms, WIGGLE_CEILING_MS);
            let floor = std::cmp::min(WIGGLE_FLOOR_MS, ceiling.saturating_sub(1));
            rand::thread_rng().gen_range(floor..ceiling.max(floor + 1))
        } else {
            0
        };
        let delay = Duration::from_millis(base_delay_ms + wiggle_ms);

        // Step 4: sign.
        let digest = self.codec.digest(&header);
        let seal_bytes = self
            .signer
            .sign(self.local_validator, CONSENSUS_SEAL_MIME, digest)
            .map_err(|_| DposError::SignerService("signing service refused seal".into()))?;

        // Step 5: write the seal and release after the computed delay, or
        // bail out on cancellation.
        header.extra = self.codec.write_seal(&header.extra, &seal_bytes)?;

        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(header);
                }
                _ = cancel.cancelled() => {}
            }
        });
        Ok(rx)
    }
}
