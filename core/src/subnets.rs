// Subnetwork identifiers
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::error::CoreError;

pub const SUBNETWORK_ID_SIZE: usize = 20;

/// A 20-byte subnetwork identifier. The all-zero value denotes the native
/// subnetwork carrying ordinary value transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SubnetworkId([u8; SUBNETWORK_ID_SIZE]);

/// The default subnetwork for ordinary transactions.
pub const SUBNETWORK_ID_NATIVE: SubnetworkId = SubnetworkId::from_byte(0);
/// The subnetwork of coinbase transactions.
pub const SUBNETWORK_ID_COINBASE: SubnetworkId = SubnetworkId::from_byte(1);
/// The subnetwork used for registering new subnetworks.
pub const SUBNETWORK_ID_REGISTRY: SubnetworkId = SubnetworkId::from_byte(2);

impl SubnetworkId {
    pub const fn from_bytes(bytes: [u8; SUBNETWORK_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Builds the id whose first byte is `b` and the rest zero.
    pub const fn from_byte(b: u8) -> Self {
        let mut bytes = [0u8; SUBNETWORK_ID_SIZE];
        bytes[0] = b;
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() != SUBNETWORK_ID_SIZE {
            return Err(CoreError::InvalidSubnetworkIdLength(bytes.len()));
        }
        let mut out = [0u8; SUBNETWORK_ID_SIZE];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8; SUBNETWORK_ID_SIZE] {
        &self.0
    }

    pub fn is_native(&self) -> bool {
        *self == SUBNETWORK_ID_NATIVE
    }

    /// Whether the subnetwork participates in the built-in sentinel set
    /// (native, coinbase or registry).
    pub fn is_builtin_or_native(&self) -> bool {
        *self == SUBNETWORK_ID_COINBASE || *self == SUBNETWORK_ID_REGISTRY || self.is_native()
    }
}

impl Display for SubnetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for SubnetworkId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        assert!(SUBNETWORK_ID_NATIVE.is_native());
        assert!(!SUBNETWORK_ID_COINBASE.is_native());
        assert_eq!(SUBNETWORK_ID_COINBASE.as_bytes()[0], 1);
        assert_eq!(SUBNETWORK_ID_REGISTRY.as_bytes()[0], 2);
    }

    #[test]
    fn test_hex_round_trip() {
        let id = SubnetworkId::from_byte(7);
        assert_eq!(id.to_string().parse::<SubnetworkId>().unwrap(), id);
        assert!(matches!(
            "0102".parse::<SubnetworkId>(),
            Err(CoreError::InvalidSubnetworkIdLength(2))
        ));
    }
}
