// Sompi wallet - mass accounting, fee policy, the streaming transaction
// generator and the partially-signed transaction envelope.

pub mod error;
pub mod fees;
pub mod generator;
pub mod mass;
pub mod params;
pub mod pskt;
pub mod utils;
pub mod utxo;

pub use error::{WalletError, WalletResult};
pub use fees::Fees;
pub use generator::{
    DataKind, Generator, GeneratorSettings, GeneratorSummary, PaymentOutput, PendingTransaction,
};
pub use mass::MassCalculator;
pub use params::Params;
pub use pskt::Pskt;
pub use utils::{kaspa_to_sompi, max_value_of_u, sompi_to_kaspa, sompi_to_kaspa_string, SOMPI_PER_KASPA};
pub use utxo::UtxoEntryReference;
