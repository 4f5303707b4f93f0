// Per-network consensus parameters consumed by the mass calculator and the
// transaction generator.
use sompi_core::{NetworkId, Prefix};

/// Mass coefficients, limits and fee/dust constants of one network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Params {
    pub mass_per_tx_byte: u64,
    pub mass_per_script_pub_key_byte: u64,
    pub mass_per_sig_op: u64,
    /// Ceiling on the contextual (max of compute and storage) mass of a
    /// standard transaction.
    pub max_transaction_mass: u64,
    /// The C coefficient of the storage-mass formula.
    pub storage_mass_parameter: u64,
    /// Minimum relay fee in sompi per kilogram of mass.
    pub minimum_relay_transaction_fee: u64,
    /// Address prefix of the network.
    pub prefix: Prefix,
}

pub const STORAGE_MASS_PARAMETER: u64 = 10u64.pow(12);
pub const MAXIMUM_STANDARD_TRANSACTION_MASS: u64 = 100_000;
pub const DEFAULT_MINIMUM_RELAY_TRANSACTION_FEE: u64 = 1000;

impl Params {
    /// All networks currently share the same coefficients; the per-network
    /// seam exists because testnets have diverged before and will again.
    pub fn from_network(network_id: NetworkId) -> Self {
        Self {
            mass_per_tx_byte: 1,
            mass_per_script_pub_key_byte: 10,
            mass_per_sig_op: 1000,
            max_transaction_mass: MAXIMUM_STANDARD_TRANSACTION_MASS,
            storage_mass_parameter: STORAGE_MASS_PARAMETER,
            minimum_relay_transaction_fee: DEFAULT_MINIMUM_RELAY_TRANSACTION_FEE,
            prefix: Prefix::from(network_id.network_type()),
        }
    }
}

impl From<NetworkId> for Params {
    fn from(network_id: NetworkId) -> Self {
        Self::from_network(network_id)
    }
}
