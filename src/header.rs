//! Header shape consumed from outside the consensus engine (spec §3) and its
//! canonical pre-seal encoding (spec §4.1).
//!
//! Field order and presence mirror `alloy_consensus::Header`/the teacher's
//! `consensus/parlia/util.rs::encode_header_with_chain_id`, with one
//! deliberate deviation: `timestamp` is milliseconds since epoch (spec §3),
//! not Ethereum's whole seconds, since the DPoS period here is sub-second.

use alloy_primitives::{keccak256, Address, Bloom, Bytes, B256, B64, U256};
use alloy_rlp::Encodable;

/// The canonical "no ommers" hash: `keccak256(rlp([]))`.
pub fn empty_uncle_hash() -> B256 {
    keccak256([0xc0u8])
}

/// Block header as handed to the engine by the chain layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Header {
    pub parent_hash: B256,
    pub uncle_hash: B256,
    pub coinbase: Address,
    pub state_root: B256,
    pub transactions_root: B256,
    pub receipts_root: B256,
    pub logs_bloom: Bloom,
    pub difficulty: U256,
    pub number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    /// Milliseconds since the Unix epoch (spec §3), not Ethereum's seconds.
    pub timestamp_ms: u64,
    pub extra: Bytes,
    pub mix_digest: B256,
    pub nonce: B64,
}

impl Header {
    /// Hash of the full header, including the seal bytes in `extra`. This is
    /// the header's canonical identity (spec §3's `hash`), distinct from the
    /// pre-seal digest used for signing (§4.1).
    pub fn hash(&self) -> B256 {
        let mut out = Vec::new();
        encode_header(self, &mut out, None);
        keccak256(&out)
    }

    /// The pre-seal digest: the canonical encoding of the header with the
    /// trailing `seal_len` seal bytes stripped from `extra`, and mix-digest /
    /// nonce forced to zero (spec §4.1).
    pub fn seal_digest(&self, seal_len: usize) -> B256 {
        let mut out = Vec::new();
        encode_header(self, &mut out, Some(seal_len));
        keccak256(&out)
    }
}

/// Canonical recursive encoding used both for the header hash (`strip =
/// None`) and the pre-seal digest (`strip = Some(seal_len)`). Field order is
/// fixed (spec §4.1): parent hash, uncle hash, coinbase, state root, tx root,
/// receipt root, bloom, difficulty, number, gas limit, gas used, time,
/// extra (without seal when stripping), mix-digest, nonce.
fn encode_header(header: &Header, out: &mut Vec<u8>, strip: Option<usize>) {
    let extra: &[u8] = match strip {
        Some(seal_len) => {
            let cut = header.extra.len().saturating_sub(seal_len);
            &header.extra[..cut]
        }
        None => &header.extra[..],
    };
    let (mix_digest, nonce) = (B256::ZERO, B64::ZERO);

    let mut payload_length = 0usize;
    payload_length += header.parent_hash.length();
    payload_length += header.uncle_hash.length();
    payload_length += header.coinbase.length();
    payload_length += header.state_root.length();
    payload_length += header.transactions_root.length();
    payload_length += header.receipts_root.length();
    payload_length += header.logs_bloom.length();
    payload_length += header.difficulty.length();
    payload_length += U256::from(header.number).length();
    payload_length += U256::from(header.gas_limit).length();
    payload_length += U256::from(header.gas_used).length();
    payload_length += U256::from(header.timestamp_ms).length();
    payload_length += extra.length();
    payload_length += mix_digest.length();
    payload_length += nonce.length();

    let rlp_head = alloy_rlp::Header { list: true, payload_length };
    rlp_head.encode(out);
    header.parent_hash.encode(out);
    header.uncle_hash.encode(out);
    header.coinbase.encode(out);
    header.state_root.encode(out);
    header.transactions_root.encode(out);
    header.receipts_root.encode(out);
    header.logs_bloom.encode(out);
    header.difficulty.encode(out);
    U256::from(header.number).encode(out);
    U256::from(header.gas_limit).encode(out);
    U256::from(header.gas_used).encode(out);
    U256::from(header.timestamp_ms).encode(out);
    extra.encode(out);
    mix_digest.encode(out);
    nonce.encode(out);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_digest_is_pure_and_ignores_seal_bytes() {
        let mut h = Header { number: 1, gas_limit: 30_000_000, ..Default::default() };
        h.extra = Bytes::from(vec![0u8; 32 + 65]);
        let d1 = h.seal_digest(65);
        // Changing only the seal bytes must not change the digest.
        h.extra = {
            let mut v = h.extra.to_vec();
            v[40] = 0xff;
            Bytes::from(v)
        };
        let d2 = h.seal_digest(65);
        assert_eq!(d1, d2);
    }

    #[test]
    fn seal_digest_changes_with_vanity() {
        let mut h = Header { number: 1, gas_limit: 30_000_000, ..Default::default() };
        h.extra = Bytes::from(vec![0u8; 32 + 65]);
        let d1 = h.seal_digest(65);
        let mut extra = h.extra.to_vec();
        extra[0] = 0x01;
        h.extra = Bytes::from(extra);
        let d2 = h.seal_digest(65);
        assert_ne!(d1, d2);
    }
}
