// Network identifiers
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkType {
    Mainnet,
    Testnet,
    Simnet,
    Devnet,
}

impl NetworkType {
    pub fn name(&self) -> &'static str {
        match self {
            NetworkType::Mainnet => "mainnet",
            NetworkType::Testnet => "testnet",
            NetworkType::Simnet => "simnet",
            NetworkType::Devnet => "devnet",
        }
    }
}

impl Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NetworkType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(NetworkType::Mainnet),
            "testnet" => Ok(NetworkType::Testnet),
            "simnet" => Ok(NetworkType::Simnet),
            "devnet" => Ok(NetworkType::Devnet),
            _ => Err(CoreError::InvalidNetworkType(s.to_string())),
        }
    }
}

/// A network type plus an optional numeric suffix distinguishing concurrent
/// test networks, e.g. `testnet-10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkId {
    pub network_type: NetworkType,
    pub suffix: Option<u32>,
}

impl NetworkId {
    pub const fn new(network_type: NetworkType) -> Self {
        Self { network_type, suffix: None }
    }

    pub const fn with_suffix(network_type: NetworkType, suffix: u32) -> Self {
        Self { network_type, suffix: Some(suffix) }
    }

    pub fn network_type(&self) -> NetworkType {
        self.network_type
    }
}

impl From<NetworkType> for NetworkId {
    fn from(network_type: NetworkType) -> Self {
        Self::new(network_type)
    }
}

impl Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.suffix {
            Some(suffix) => write!(f, "{}-{}", self.network_type, suffix),
            None => write!(f, "{}", self.network_type),
        }
    }
}

impl FromStr for NetworkId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('-');
        let network_type = parts
            .next()
            .ok_or_else(|| CoreError::InvalidNetworkId(s.to_string()))?
            .parse::<NetworkType>()
            .map_err(|_| CoreError::InvalidNetworkId(s.to_string()))?;
        let suffix = match parts.next() {
            Some(suffix) => Some(suffix.parse::<u32>().map_err(|_| CoreError::InvalidNetworkId(s.to_string()))?),
            None => None,
        };
        if parts.next().is_some() {
            return Err(CoreError::InvalidNetworkId(s.to_string()));
        }
        Ok(Self { network_type, suffix })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_round_trip() {
        let id = NetworkId::with_suffix(NetworkType::Testnet, 10);
        assert_eq!(id.to_string(), "testnet-10");
        assert_eq!("testnet-10".parse::<NetworkId>().unwrap(), id);
        assert_eq!("mainnet".parse::<NetworkId>().unwrap(), NetworkId::new(NetworkType::Mainnet));
        assert!("mainnet-1-2".parse::<NetworkId>().is_err());
        assert!("fakenet".parse::<NetworkId>().is_err());
    }
}
