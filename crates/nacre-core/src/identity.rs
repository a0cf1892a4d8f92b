// crates/nacre-core/src/identity.rs
//
// Account addresses and validator registration proofs.
//
// An address is 20 bytes, derived from an ed25519 public key by truncating
// its SHA-256 hash. Addresses serialize as 0x-prefixed hex strings so they
// can key JSON maps in the state snapshot.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::crypto::{hash_bytes, verify_signature};
use crate::error::NacreError;

/// A 20-byte account address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Derive an address from an ed25519 public key: the first 20 bytes
    /// of the key's SHA-256 hash.
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        let hash = hash_bytes(public_key);
        let mut out = [0u8; 20];
        out.copy_from_slice(&hash[..20]);
        Address(out)
    }

    /// The all-zero address. Used as the burn/none sentinel.
    pub fn zero() -> Self {
        Address([0u8; 20])
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = NacreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix("0x").unwrap_or(s);
        if hex.len() != 40 {
            return Err(NacreError::Validation(format!(
                "address must be 40 hex characters, got {}",
                hex.len()
            )));
        }
        let mut out = [0u8; 20];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[2 * i..2 * i + 2], 16)
                .map_err(|e| NacreError::Validation(format!("invalid hex in address: {}", e)))?;
        }
        Ok(Address(out))
    }
}

// Hex-string serde so Address can be a JSON map key.
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_str(&s).map_err(de::Error::custom)
    }
}

/// Proof of key possession submitted with `register_validator`.
///
/// The node key and the oracle key each sign the validator's treasury
/// address, binding both operational keys to the funding account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationProof {
    /// Node public key (ed25519). The validator address derives from this.
    pub node_key: [u8; 32],
    /// Oracle public key (ed25519).
    pub oracle_key: [u8; 32],
    /// Node key's signature over the treasury address bytes.
    pub node_signature: Vec<u8>,
    /// Oracle key's signature over the treasury address bytes.
    pub oracle_signature: Vec<u8>,
}

impl RegistrationProof {
    /// Verify both signatures against the treasury address.
    ///
    /// # Errors
    /// Returns `NacreError::Crypto` if either key or signature is
    /// malformed or does not verify.
    pub fn verify(&self, treasury: &Address) -> Result<(), NacreError> {
        let message = treasury.as_bytes();
        if !verify_signature(&self.node_key, message, &self.node_signature)? {
            return Err(NacreError::Crypto(
                "node key signature does not cover the treasury address".to_string(),
            ));
        }
        if !verify_signature(&self.oracle_key, message, &self.oracle_signature)? {
            return Err(NacreError::Crypto(
                "oracle key signature does not cover the treasury address".to_string(),
            ));
        }
        Ok(())
    }
}
