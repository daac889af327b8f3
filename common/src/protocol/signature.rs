// common/src/protocol/signature.rs
//! EIP-191 `personal_sign` recovery.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};

use crate::error::AuthError;
use crate::protocol::address::Address;

/// Keccak-256 of the EIP-191 envelope
/// `"\x19Ethereum Signed Message:\n" + len(message) + message`.
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()).as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

/// Recover the address that produced `signature_hex` over `message`.
///
/// Accepts the 65-byte `r || s || v` form with or without `0x`, with `v` in
/// `{0, 1, 27, 28}`. High-S signatures are normalized before recovery.
pub fn recover_personal_sign(message: &[u8], signature_hex: &str) -> Result<Address, AuthError> {
    let raw = signature_hex.trim();
    let raw = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = hex::decode(raw).map_err(|_| AuthError::SignatureInvalid)?;
    if bytes.len() != 65 {
        return Err(AuthError::SignatureInvalid);
    }

    let (rs, v) = bytes.split_at(64);
    let mut y_odd = match v[0] {
        0 | 27 => false,
        1 | 28 => true,
        _ => return Err(AuthError::SignatureInvalid),
    };

    let mut signature = Signature::from_slice(rs).map_err(|_| AuthError::SignatureInvalid)?;
    if let Some(normalized) = signature.normalize_s() {
        signature = normalized;
        y_odd = !y_odd;
    }

    let digest = personal_message_hash(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &signature, RecoveryId::new(y_odd, false))
        .map_err(|_| AuthError::SignatureInvalid)?;

    let point = key.to_encoded_point(false);
    Address::from_public_key(&point.as_bytes()[1..]).ok_or(AuthError::SignatureInvalid)
}

/// Check that `signature_hex` over `message` was produced by `claimed`.
/// Returns the recovered address on success.
pub fn verify_personal_sign(
    message: &str,
    signature_hex: &str,
    claimed: &Address,
) -> Result<Address, AuthError> {
    let recovered = recover_personal_sign(message.as_bytes(), signature_hex)?;
    // Both sides are raw bytes, so this is the case-insensitive comparison.
    if &recovered != claimed {
        tracing::warn!(
            "Signature signer mismatch: claimed {}, recovered {}",
            claimed,
            recovered
        );
        return Err(AuthError::SignatureInvalid);
    }
    Ok(recovered)
}


#[cfg(test)]
mod tests {
    use super::test_support::TestSigner;
    use super::*;

    #[test]
    fn test_recovers_signer() {
        let signer = TestSigner::from_seed(7);
        let sig = signer.personal_sign("hello radar");
        let recovered = recover_personal_sign(b"hello radar", &sig).unwrap();
        assert_eq!(recovered, signer.address());
        assert!(verify_personal_sign("hello radar", &sig, &signer.address()).is_ok());
    }

    #[test]
    fn test_accepts_raw_v_and_no_prefix() {
        let signer = TestSigner::from_seed(9);
        let sig = signer.personal_sign("msg");
        let mut bytes = hex::decode(sig.trim_start_matches("0x")).unwrap();
        bytes[64] -= 27;
        let recovered = recover_personal_sign(b"msg", &hex::encode(bytes)).unwrap();
        assert_eq!(recovered, signer.address());
    }

    #[test]
    fn test_other_message_does_not_verify() {
        let signer = TestSigner::from_seed(7);
        let sig = signer.personal_sign("hello radar");
        assert_eq!(
            verify_personal_sign("hello radar!", &sig, &signer.address()),
            Err(AuthError::SignatureInvalid)
        );
    }

    #[test]
    fn test_wrong_claimed_address() {
        let signer = TestSigner::from_seed(7);
        let other = TestSigner::from_seed(8);
        let sig = signer.personal_sign("hello");
        assert_eq!(
            verify_personal_sign("hello", &sig, &other.address()),
            Err(AuthError::SignatureInvalid)
        );
    }

    #[test]
    fn test_malformed_signatures() {
        for sig in ["", "0x1234", "zz", &format!("0x{}", "00".repeat(65))] {
            assert_eq!(
                recover_personal_sign(b"hello", sig),
                Err(AuthError::SignatureInvalid),
                "{sig}"
            );
        }
        let signer = TestSigner::from_seed(3);
        let mut bytes = hex::decode(signer.personal_sign("x").trim_start_matches("0x")).unwrap();
        bytes[64] = 5;
        assert_eq!(
            recover_personal_sign(b"x", &hex::encode(bytes)),
            Err(AuthError::SignatureInvalid)
        );
    }
}
