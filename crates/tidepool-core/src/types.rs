//! Identifier types shared across the pool
//!
//! Identities, assets and positions are all 256-bit values. Derived
//! addresses (vault, incinerator, position) are BLAKE3 hashes over the
//! parent identifiers followed by a fixed seed, so they can be recomputed
//! by any party without a lookup.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Seed for the pool vault address
pub const VAULT_SEED: &[u8] = b"vault";

/// Seed for the burn sink address
pub const INCINERATOR_SEED: &[u8] = b"incinerator";

/// Seed for stake position identifiers
pub const STAKE_ENTRY_SEED: &[u8] = b"stake_entry";

fn hash_parts(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

macro_rules! hash_id {
    ($(#[$meta:meta])* $name:ident, $debug_prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name([u8; 32]);

        impl $name {
            /// Zero identifier
            pub const ZERO: Self = Self([0u8; 32]);

            /// Create from raw bytes
            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Derive from a human-readable name using BLAKE3
            pub fn from_name(name: &str) -> Self {
                Self(hash_parts(&[name.as_bytes()]))
            }

            /// Get the raw bytes
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Convert to hex string
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from a 64-character hex string
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let mut bytes = [0u8; 32];
                hex::decode_to_slice(s, &mut bytes)?;
                Ok(Self(bytes))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($debug_prefix, "({})"), &self.to_hex()[..16])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", &self.to_hex()[..16])
            }
        }

        impl FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

hash_id!(
    /// Identity of a participant, authority or custody account
    Identity,
    "Identity"
);

hash_id!(
    /// Identifier of the staked fungible asset (one pool per asset)
    AssetId,
    "AssetId"
);

hash_id!(
    /// Identifier of a stake position, derived from owner and asset
    PositionId,
    "PositionId"
);

impl PositionId {
    /// Derive the position id for `owner` in the pool of `asset`
    pub fn derive(owner: &Identity, asset: &AssetId) -> Self {
        Self(hash_parts(&[owner.as_bytes(), asset.as_bytes(), STAKE_ENTRY_SEED]))
    }
}

/// Custody account holding every staked, rewarded and donated unit of `asset`
pub fn vault_address(asset: &AssetId) -> Identity {
    Identity(hash_parts(&[asset.as_bytes(), VAULT_SEED]))
}

/// Sink account that burned units of `asset` are moved to
pub fn incinerator_address(asset: &AssetId) -> Identity {
    Identity(hash_parts(&[asset.as_bytes(), INCINERATOR_SEED]))
}
