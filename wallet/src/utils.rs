// Unit helpers: KAS <-> sompi conversion and bit-width utilities.
use num_bigint::BigUint;
use num_traits::One;

use crate::error::{WalletError, WalletResult};

/// Sompi per KAS.
pub const SOMPI_PER_KASPA: u64 = 100_000_000;

/// Parses a decimal KAS amount with up to eight fractional digits into
/// sompi.
pub fn kaspa_to_sompi(amount: &str) -> WalletResult<u64> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(WalletError::InvalidAmount("empty amount".to_string()));
    }
    let (integer_part, fraction_part) = match amount.split_once('.') {
        Some((integer, fraction)) => (integer, fraction),
        None => (amount, ""),
    };
    if fraction_part.len() > 8 {
        return Err(WalletError::InvalidAmount(format!("more than 8 decimal places: {amount}")));
    }
    if integer_part.is_empty() && fraction_part.is_empty() {
        return Err(WalletError::InvalidAmount(amount.to_string()));
    }
    let integer: u64 = match integer_part.is_empty() {
        true => 0,
        false => integer_part.parse().map_err(|_| WalletError::InvalidAmount(amount.to_string()))?,
    };
    let mut fraction: u64 = 0;
    if !fraction_part.is_empty() {
        let padded = format!("{fraction_part:0<8}");
        fraction = padded.parse().map_err(|_| WalletError::InvalidAmount(amount.to_string()))?;
    }
    integer
        .checked_mul(SOMPI_PER_KASPA)
        .and_then(|v| v.checked_add(fraction))
        .ok_or_else(|| WalletError::InvalidAmount(format!("amount overflows: {amount}")))
}

/// The KAS value of a sompi amount.
pub fn sompi_to_kaspa(sompi: u64) -> f64 {
    sompi as f64 / SOMPI_PER_KASPA as f64
}

/// A formatted KAS string with full sompi precision.
pub fn sompi_to_kaspa_string(sompi: u64) -> String {
    let integer = sompi / SOMPI_PER_KASPA;
    let fraction = sompi % SOMPI_PER_KASPA;
    let fraction = format!("{fraction:08}");
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        integer.to_string()
    } else {
        format!("{integer}.{fraction}")
    }
}

/// The maximum value of an unsigned integer of the given bit width.
pub fn max_value_of_u(bits: u32) -> BigUint {
    (BigUint::one() << bits) - BigUint::one()
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::ToPrimitive;

    #[test]
    fn test_kaspa_to_sompi() {
        assert_eq!(kaspa_to_sompi("1").unwrap(), 100_000_000);
        assert_eq!(kaspa_to_sompi("0.1").unwrap(), 10_000_000);
        assert_eq!(kaspa_to_sompi("123.45678901").unwrap(), 12_345_678_901);
        assert_eq!(kaspa_to_sompi(".5").unwrap(), 50_000_000);
        assert!(kaspa_to_sompi("0.123456789").is_err());
        assert!(kaspa_to_sompi("").is_err());
        assert!(kaspa_to_sompi("abc").is_err());
    }

    #[test]
    fn test_round_trip() {
        for amount in ["0.1", "1", "12.34567891", "0.00000001", "21000000"] {
            let sompi = kaspa_to_sompi(amount).unwrap();
            let expected: f64 = amount.parse().unwrap();
            assert_eq!(sompi_to_kaspa(sompi), expected, "amount {amount}");
        }
    }

    #[test]
    fn test_sompi_to_kaspa_string() {
        assert_eq!(sompi_to_kaspa_string(150_000_000), "1.5");
        assert_eq!(sompi_to_kaspa_string(100_000_000), "1");
        assert_eq!(sompi_to_kaspa_string(1), "0.00000001");
    }

    #[test]
    fn test_max_value_of_u() {
        assert_eq!(max_value_of_u(8).to_u64().unwrap(), u8::MAX as u64);
        assert_eq!(max_value_of_u(16).to_u64().unwrap(), u16::MAX as u64);
        assert_eq!(max_value_of_u(32).to_u64().unwrap(), u32::MAX as u64);
        assert_eq!(max_value_of_u(64).to_u64().unwrap(), u64::MAX);
        assert_eq!(max_value_of_u(128).to_string(), u128::MAX.to_string());
        assert_eq!(max_value_of_u(256), (BigUint::one() << 256u32) - BigUint::one());
    }
}
