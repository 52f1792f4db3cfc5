use ethereum_types::{Address, Signature, U256};
use keccak_hash::keccak;
use secp256k1::{Message, SECP256K1, SecretKey};

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("Failed to parse private key")]
    InvalidPrivateKey,
    #[error("Recovery id does not fit in one byte")]
    InvalidRecoveryId,
}

/// Local signing key for the L1 relay account.
#[derive(Clone, Debug)]
pub struct Signer {
    private_key: SecretKey,
    address: Address,
}

impl Signer {
    pub fn new(private_key: SecretKey) -> Self {
        let address = Address::from(keccak(
            &private_key.public_key(SECP256K1).serialize_uncompressed()[1..],
        ));
        Self {
            private_key,
            address,
        }
    }

    /// Parses a 32-byte hex private key, with or without a `0x` prefix.
    pub fn from_hex(hex_key: &str) -> Result<Self, SignerError> {
        let bytes = hex::decode(hex_key.trim_start_matches("0x"))
            .map_err(|_| SignerError::InvalidPrivateKey)?;
        let private_key =
            SecretKey::from_slice(&bytes).map_err(|_| SignerError::InvalidPrivateKey)?;
        Ok(Self::new(private_key))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// 65-byte `r ‖ s ‖ recovery_id` signature over `keccak(payload)`.
    pub fn sign(&self, payload: &[u8]) -> Result<Signature, SignerError> {
        let hash = keccak(payload);
        let msg = Message::from_digest(hash.0);
        let (recovery_id, signature) = SECP256K1
            .sign_ecdsa_recoverable(&msg, &self.private_key)
            .serialize_compact();

        let recovery_byte =
            u8::try_from(recovery_id.to_i32()).map_err(|_| SignerError::InvalidRecoveryId)?;
        Ok(Signature::from_slice(
            &[signature.as_slice(), &[recovery_byte]].concat(),
        ))
    }
}

/// Splits a 65-byte signature into the `(r, s, y_parity)` transaction
/// fields.
pub fn parse_signature(signature: &Signature) -> (U256, U256, bool) {
    let bytes = signature.as_fixed_bytes();
    let (rs, parity) = bytes.split_at(64);
    let (r, s) = rs.split_at(32);
    (
        U256::from_big_endian(r),
        U256::from_big_endian(s),
        parity.first().copied().unwrap_or_default() != 0,
    )
}
