// meridian/core/types/src/crypto.rs

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Sha3_256};
use std::fmt;

/// SHA3-256 of `data`.
pub fn sha3(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Self-contained ed25519 signature: the signer's public key travels with it.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub pubkey: [u8; 32],
    pub sig: [u8; 64],
}

impl Signature {
    /// Verify this signature over `message`.
    pub fn verify(&self, message: &[u8]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.pubkey) else {
            return false;
        };
        let sig = DalekSignature::from_bytes(&self.sig);
        key.verify(message, &sig).is_ok()
    }

    /// Canonical bytes, public key first.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(96);
        out.extend_from_slice(&self.pubkey);
        out.extend_from_slice(&self.sig);
        out
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("pubkey", &hex::encode(self.pubkey))
            .finish_non_exhaustive()
    }
}

#[derive(Serialize, Deserialize)]
struct SignatureRepr {
    pubkey: Vec<u8>,
    sig: Vec<u8>,
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        SignatureRepr {
            pubkey: self.pubkey.to_vec(),
            sig: self.sig.to_vec(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let repr = SignatureRepr::deserialize(deserializer)?;
        let pubkey: [u8; 32] = repr
            .pubkey
            .try_into()
            .map_err(|_| serde::de::Error::custom("Invalid public key length"))?;
        let sig: [u8; 64] = repr
            .sig
            .try_into()
            .map_err(|_| serde::de::Error::custom("Invalid signature length"))?;
        Ok(Signature { pubkey, sig })
    }
}

/// Signing key of an account.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a fresh random key pair.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&rand::random()),
        }
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        let sig: DalekSignature = self.signing_key.sign(message);
        Signature {
            pubkey: self.public_key(),
            sig: sig.to_bytes(),
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyPair({})", hex::encode(self.public_key()))
    }
}
