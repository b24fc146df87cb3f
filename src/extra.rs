//! Genesis and epoch `extra`-field layouts (spec §4.2, §6).
//!
//! Grounded in `consensus/parlia/consensus.rs::{get_validator_bytes_from_header,
//! parse_validators_before_luban}`, trimmed to the single (pre-Luban-shaped)
//! `vanity || addr*` validator encoding spec §6 specifies — this spec has no
//! BLS vote-address suffix per validator.

use alloy_primitives::{Address, Bytes};

use crate::constants::ADDRESS_LEN;
use crate::error::{DposError, DposResult};

/// Parse `extra = vanity(32) || addr_0 || .. || addr_k` (no seal) from a
/// genesis header (spec §4.2).
pub fn parse_genesis_validators(extra: &[u8]) -> DposResult<Vec<Address>> {
    if extra.len() < crate::constants::EXTRA_VANITY {
        return Err(DposError::MissingVanity);
    }
    let rest = &extra[crate::constants::EXTRA_VANITY..];
    if rest.len() % ADDRESS_LEN != 0 || rest.is_empty() {
        return Err(DposError::InvalidCheckpointValidators { number: 0 });
    }
    Ok(decode_addresses(rest))
}

/// Parse the validator list embedded in an epoch block's `extra` (spec §4.2):
/// `vanity(32) || addr_0 || .. || addr_k || seal(seal_len)`.
///
/// `number` is only used for error messages.
pub fn parse_epoch_validators(
    extra: &[u8],
    seal_len: usize,
    number: u64,
) -> DposResult<Vec<Address>> {
    let vanity = crate::constants::EXTRA_VANITY;
    if extra.len() < vanity + seal_len {
        return Err(DposError::MissingSignature);
    }
    let validator_bytes = &extra[vanity..extra.len() - seal_len];
    if validator_bytes.is_empty() || validator_bytes.len() % ADDRESS_LEN != 0 {
        return Err(DposError::InvalidCheckpointValidators { number });
    }
    Ok(decode_addresses(validator_bytes))
}

/// Validate that a non-epoch, non-genesis header carries no validator bytes:
/// `extra = vanity || seal(seal_len)` exactly (spec §4.2).
pub fn check_no_validators_on_normal_block(
    extra: &[u8],
    seal_len: usize,
    number: u64,
) -> DposResult<()> {
    let vanity = crate::constants::EXTRA_VANITY;
    if extra.len() < vanity + seal_len {
        return Err(DposError::MissingSignature);
    }
    if extra.len() != vanity + seal_len {
        return Err(DposError::ExtraValidators { number });
    }
    Ok(())
}

/// Build the `extra` bytes for a fresh epoch-boundary header: `vanity ||
/// addrs || zeroes(seal_len)` (spec §4.6, FinalizeAndAssemble).
pub fn build_epoch_extra(vanity: &[u8; 32], validators: &[Address], seal_len: usize) -> Bytes {
    let mut out = Vec::with_capacity(32 + validators.len() * ADDRESS_LEN + seal_len);
    out.extend_from_slice(vanity);
    for addr in validators {
        out.extend_from_slice(addr.as_slice());
    }
    out.extend(std::iter::repeat(0u8).take(seal_len));
    Bytes::from(out)
}

/// Build the `extra` bytes for a normal (non-epoch) header: `vanity ||
/// zeroes(seal_len)` (spec §4.6, Prepare).
pub fn build_normal_extra(vanity: &[u8; 32], seal_len: usize) -> Bytes {
    let mut out = Vec::with_capacity(32 + seal_len);
    out.extend_from_slice(vanity);
    out.extend(std::iter::repeat(0u8).take(seal_len));
    Bytes::from(out)
}

fn decode_addresses(bytes: &[u8]) -> Vec<Address> {
    bytes.chunks_exact(ADDRESS_LEN).map(Address::from_slice).collect()
}
