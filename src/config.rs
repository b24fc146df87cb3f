//! Chain-wide, immutable DPoS configuration (spec §3).

use crate::constants::{EXTRA_SEAL_ED25519, EXTRA_SEAL_SECP256K1};

/// Which signature scheme seals headers on this chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SealSignerType {
    Secp256k1,
    Ed25519,
}

impl SealSignerType {
    /// Byte length of the seal suffix for this scheme (spec §4.1, §6).
    pub const fn seal_len(self) -> usize {
        match self {
            Self::Secp256k1 => EXTRA_SEAL_SECP256K1,
            Self::Ed25519 => EXTRA_SEAL_ED25519,
        }
    }
}

/// Immutable per-chain DPoS parameters (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DposConfig {
    /// Every block whose number is a positive multiple of `epoch` rotates the
    /// validator set.
    pub epoch: u64,
    /// Target block interval, in milliseconds.
    pub period_ms: u64,
    /// Upper bound on the active validator-set size.
    pub max_validators: usize,
    /// Seal signer scheme used on this chain.
    pub seal_signer_type: SealSignerType,
}

impl DposConfig {
    /// Construct a config, enforcing the non-zero/positive invariants of spec §3.
    pub fn new(
        epoch: u64,
        period_ms: u64,
        max_validators: usize,
        seal_signer_type: SealSignerType,
    ) -> Self {
        assert!(epoch > 0, "epoch must be positive");
        assert!(period_ms > 0, "period_ms must be positive");
        assert!(max_validators > 0, "max_validators must be positive");
        Self { epoch, period_ms, max_validators, seal_signer_type }
    }

    /// `true` iff `number` is a positive multiple of `epoch`.
    #[inline]
    pub const fn is_epoch_block(&self, number: u64) -> bool {
        number > 0 && number % self.epoch == 0
    }

    /// The future-block clock grace for this chain's period (spec §6): `3 * period_ms`.
    #[inline]
    pub const fn future_grace_ms(&self) -> u64 {
        self.period_ms * 3
    }

    /// Seal byte length for this chain's signer scheme.
    #[inline]
    pub const fn seal_len(&self) -> usize {
        self.seal_signer_type.seal_len()
    }
}
