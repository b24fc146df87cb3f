//! C1 — Seal codec: pre-seal digest plus per-scheme seal encode/verify
//! (spec §4.1). Dispatch is a tagged variant on `SealSignerType`, grounded in
//! `consensus/parlia/consensus.rs::recover_proposer` (secp256k1 recovery) and
//! generalized to the ed25519 variant the spec additionally requires.

use alloy_primitives::{keccak256, Address, Bytes, B256};
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    Message, SECP256K1,
};

use crate::config::SealSignerType;
use crate::error::{DposError, DposResult};
use crate::header::Header;

/// Stateless codec for one signer scheme. Carries no data of its own; it only
/// dispatches on `SealSignerType` so the seal length stays a compile-time
/// property of the scheme (per spec §9's design note) rather than something
/// hidden inside a dynamically-sized container.
#[derive(Debug, Clone, Copy)]
pub struct SealCodec {
    scheme: SealSignerType,
}

impl SealCodec {
    pub const fn new(scheme: SealSignerType) -> Self {
        Self { scheme }
    }

    pub const fn scheme(&self) -> SealSignerType {
        self.scheme
    }

    pub const fn seal_len(&self) -> usize {
        self.scheme.seal_len()
    }

    /// The pre-seal digest of `header` under this scheme (spec §4.1).
    pub fn digest(&self, header: &Header) -> B256 {
        header.seal_digest(self.seal_len())
    }

    /// Recover the signer address from `header`'s seal bytes. This is the
    /// single recovery entry point for both schemes (spec §9, open question
    /// 3: no separate legacy secp256k1-only helper).
    pub fn recover(&self, header: &Header) -> DposResult<Address> {
        let seal_len = self.seal_len();
        if header.extra.len() < crate::constants::EXTRA_VANITY + seal_len {
            return Err(DposError::MissingSignature);
        }
        let seal = &header.extra[header.extra.len() - seal_len..];
        let digest = self.digest(header);

        match self.scheme {
            SealSignerType::Secp256k1 => recover_secp256k1(digest, seal),
            SealSignerType::Ed25519 => recover_ed25519(digest, seal),
        }
    }

    /// Encode a raw signature (scheme-specific) into the tail of `extra`,
    /// replacing whatever seal placeholder is currently there.
    pub fn write_seal(&self, extra: &Bytes, seal_bytes: &[u8]) -> DposResult<Bytes> {
        let seal_len = self.seal_len();
        if seal_bytes.len() != seal_len {
            return Err(DposError::WrongSealLength { expected: seal_len, actual: seal_bytes.len() });
        }
        if extra.len() < seal_len {
            return Err(DposError::MissingSignature);
        }
        let mut out = extra.to_vec();
        let start = out.len() - seal_len;
        out[start..].copy_from_slice(seal_bytes);
        Ok(Bytes::from(out))
    }
}

fn recover_secp256k1(digest: B256, seal: &[u8]) -> DposResult<Address> {
    debug_assert_eq!(seal.len(), 65);
    let recovery_id =
        RecoveryId::from_i32(seal[64] as i32).map_err(|_| DposError::InvalidSignature)?;
    let sig = RecoverableSignature::from_compact(&seal[..64], recovery_id)
        .map_err(|_| DposError::InvalidSignature)?;
    let message = Message::from_digest(digest.0);
    let pubkey =
        SECP256K1.recover_ecdsa(&message, &sig).map_err(|_| DposError::InvalidSignature)?;
    let uncompressed = pubkey.serialize_uncompressed();
    // Signer address is the low-order 20 bytes of keccak256(pubkey without the 0x04 prefix).
    let hash = keccak256(&uncompressed[1..]);
    Ok(Address::from_slice(&hash[12..]))
}

fn recover_ed25519(digest: B256, seal: &[u8]) -> DposResult<Address> {
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};
    debug_assert_eq!(seal.len(), 96);
    let pubkey_bytes: [u8; 32] = seal[..32].try_into().map_err(|_| DposError::InvalidSignature)?;
    let sig_bytes: [u8; 64] = seal[32..].try_into().map_err(|_| DposError::InvalidSignature)?;

    let verifying_key =
        VerifyingKey::from_bytes(&pubkey_bytes).map_err(|_| DposError::InvalidSignature)?;
    let signature = Signature::from_bytes(&sig_bytes);
    verifying_key
        .verify(digest.as_slice(), &signature)
        .map_err(|_| DposError::InvalidSignature)?;

    // Signer address is the low-order 20 bytes of keccak256(public key).
    let hash = keccak256(pubkey_bytes);
    Ok(Address::from_slice(&hash[12..]))
}
