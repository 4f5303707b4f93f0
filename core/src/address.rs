// Address codec: prefix, version byte and payload encoded with the
// 5-bit charset and 40-bit checksum used across the network.
use std::fmt::{self, Display};
use std::str::FromStr;

use thiserror::Error;

use crate::network::NetworkType;

const CHARSET: &[u8] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid address prefix: {0}")]
    InvalidPrefix(String),

    #[error("Address is missing the prefix separator")]
    MissingPrefix,

    #[error("Invalid address character: {0}")]
    InvalidCharacter(char),

    #[error("Address checksum mismatch")]
    BadChecksum,

    #[error("Invalid address version: {0}")]
    InvalidVersion(u8),

    #[error("Invalid payload length {1} for address version {0}")]
    InvalidPayloadLength(u8, usize),
}

/// Human-readable address prefix; one per network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prefix {
    Mainnet,
    Testnet,
    Simnet,
    Devnet,
}

impl Prefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            Prefix::Mainnet => "kaspa",
            Prefix::Testnet => "kaspatest",
            Prefix::Simnet => "kaspasim",
            Prefix::Devnet => "kaspadev",
        }
    }
}

impl From<NetworkType> for Prefix {
    fn from(network_type: NetworkType) -> Self {
        match network_type {
            NetworkType::Mainnet => Prefix::Mainnet,
            NetworkType::Testnet => Prefix::Testnet,
            NetworkType::Simnet => Prefix::Simnet,
            NetworkType::Devnet => Prefix::Devnet,
        }
    }
}

impl FromStr for Prefix {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kaspa" => Ok(Prefix::Mainnet),
            "kaspatest" => Ok(Prefix::Testnet),
            "kaspasim" => Ok(Prefix::Simnet),
            "kaspadev" => Ok(Prefix::Devnet),
            _ => Err(AddressError::InvalidPrefix(s.to_string())),
        }
    }
}

/// Address version byte, determining the payload interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Version {
    /// 32-byte x-only Schnorr public key.
    PubKey = 0,
    /// 33-byte compressed ECDSA public key.
    PubKeyEcdsa = 1,
    /// 32-byte BLAKE2b script hash.
    ScriptHash = 8,
}

impl Version {
    pub fn from_u8(value: u8) -> Result<Self, AddressError> {
        match value {
            0 => Ok(Version::PubKey),
            1 => Ok(Version::PubKeyEcdsa),
            8 => Ok(Version::ScriptHash),
            other => Err(AddressError::InvalidVersion(other)),
        }
    }

    pub fn payload_length(&self) -> usize {
        match self {
            Version::PubKey => 32,
            Version::PubKeyEcdsa => 33,
            Version::ScriptHash => 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub prefix: Prefix,
    pub version: Version,
    pub payload: Vec<u8>,
}

impl Address {
    pub fn new(prefix: Prefix, version: Version, payload: &[u8]) -> Result<Self, AddressError> {
        if payload.len() != version.payload_length() {
            return Err(AddressError::InvalidPayloadLength(version as u8, payload.len()));
        }
        Ok(Self { prefix, version, payload: payload.to_vec() })
    }

    fn encode_payload(&self) -> String {
        let mut eight_bit = Vec::with_capacity(1 + self.payload.len());
        eight_bit.push(self.version as u8);
        eight_bit.extend_from_slice(&self.payload);
        let mut five_bit = conv8to5(&eight_bit);

        let checksum = checksum(&five_bit, self.prefix.as_str());
        five_bit.extend(conv8to5(&checksum.to_be_bytes()[3..]));

        five_bit.iter().map(|c| CHARSET[*c as usize] as char).collect()
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.prefix.as_str(), self.encode_payload())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, encoded) = s.split_once(':').ok_or(AddressError::MissingPrefix)?;
        let prefix_enum: Prefix = prefix.parse()?;

        let mut five_bit = Vec::with_capacity(encoded.len());
        for c in encoded.chars() {
            let value = CHARSET
                .iter()
                .position(|v| *v as char == c)
                .ok_or(AddressError::InvalidCharacter(c))?;
            five_bit.push(value as u8);
        }
        if five_bit.len() < 9 {
            return Err(AddressError::BadChecksum);
        }
        if polymod(
            prefix
                .bytes()
                .map(|c| c & 0x1f)
                .chain(std::iter::once(0))
                .chain(five_bit.iter().copied())
                .collect::<Vec<_>>()
                .as_slice(),
        ) != 0
        {
            return Err(AddressError::BadChecksum);
        }

        let eight_bit = conv5to8(&five_bit[..five_bit.len() - 8]);
        let (version_byte, payload) = eight_bit.split_first().ok_or(AddressError::BadChecksum)?;
        let version = Version::from_u8(*version_byte)?;
        Address::new(prefix_enum, version, payload)
    }
}

fn polymod(values: &[u8]) -> u64 {
    let mut c = 1u64;
    for d in values {
        let c0 = (c >> 35) as u8;
        c = ((c & 0x0007_ffff_ffff) << 5) ^ (*d as u64);
        if c0 & 0x01 != 0 {
            c ^= 0x98f2bc8e61;
        }
        if c0 & 0x02 != 0 {
            c ^= 0x79b76d99e2;
        }
        if c0 & 0x04 != 0 {
            c ^= 0xf33e5fb3c4;
        }
        if c0 & 0x08 != 0 {
            c ^= 0xae2eabe2a8;
        }
        if c0 & 0x10 != 0 {
            c ^= 0x1e4f43e470;
        }
    }
    c ^ 1
}

fn checksum(payload: &[u8], prefix: &str) -> u64 {
    polymod(
        prefix
            .bytes()
            .map(|c| c & 0x1f)
            .chain(std::iter::once(0))
            .chain(payload.iter().copied())
            .chain([0u8; 8])
            .collect::<Vec<_>>()
            .as_slice(),
    )
}

fn conv8to5(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 8 / 5 + 1);
    let mut buff = 0u16;
    let mut bits = 0u32;
    for b in data {
        buff = (buff << 8) | *b as u16;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(((buff >> bits) & 0x1f) as u8);
        }
    }
    if bits > 0 {
        out.push(((buff << (5 - bits)) & 0x1f) as u8);
    }
    out
}

fn conv5to8(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 5 / 8);
    let mut buff = 0u16;
    let mut bits = 0u32;
    for b in data {
        buff = (buff << 5) | *b as u16;
        bits += 5;
        while bits >= 8 {
            bits -= 8;
            out.push(((buff >> bits) & 0xff) as u8);
        }
    }
    out
}
