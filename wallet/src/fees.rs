// Priority fee policy. The mass-derived relay minimum is always paid; the
// variants here describe what the caller adds on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fees {
    /// No priority fee.
    #[default]
    None,
    /// An absolute priority fee in sompi, paid by the sender on top of the
    /// transferred amount.
    SenderPays(u64),
    /// A rate in sompi per kilogram of contextual mass.
    Rate(u64),
}

impl Fees {
    /// The priority fee for a transaction of the given mass.
    pub fn additional(&self, mass: u64) -> u64 {
        match self {
            Fees::None => 0,
            Fees::SenderPays(fee) => *fee,
            Fees::Rate(sompi_per_kilo_mass) => mass * sompi_per_kilo_mass / 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_modes() {
        assert_eq!(Fees::None.additional(50_000), 0);
        assert_eq!(Fees::SenderPays(12345).additional(50_000), 12345);
        assert_eq!(Fees::Rate(2000).additional(50_000), 100_000);
    }
}
