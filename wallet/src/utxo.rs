// UTXO references: a resolved entry together with its outpoint and the
// address it pays to.
use sompi_core::{Address, TransactionId, TransactionInput, TransactionOutpoint, UtxoEntry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoEntryReference {
    pub address: Option<Address>,
    pub outpoint: TransactionOutpoint,
    pub entry: UtxoEntry,
}

impl UtxoEntryReference {
    pub fn new(address: Option<Address>, outpoint: TransactionOutpoint, entry: UtxoEntry) -> Self {
        Self { address, outpoint, entry }
    }

    pub fn id(&self) -> (TransactionId, u32) {
        (self.outpoint.transaction_id, self.outpoint.index)
    }

    pub fn amount(&self) -> u64 {
        self.entry.amount
    }

    pub fn is_coinbase(&self) -> bool {
        self.entry.is_coinbase
    }

    /// An unsigned transaction input consuming this UTXO.
    pub fn to_input(&self, sig_op_count: u8) -> TransactionInput {
        TransactionInput::new(self.outpoint, vec![], 0, sig_op_count)
    }
}

/// Orders by amount ascending, then outpoint for stability.
impl PartialOrd for UtxoEntryReference {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UtxoEntryReference {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.entry
            .amount
            .cmp(&other.entry.amount)
            .then_with(|| self.outpoint.transaction_id.cmp(&other.outpoint.transaction_id))
            .then_with(|| self.outpoint.index.cmp(&other.outpoint.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sompi_core::{Hash, ScriptPublicKey};

    #[test]
    fn test_ordering_by_amount() {
        let entry = |amount: u64, index: u32| {
            UtxoEntryReference::new(
                None,
                TransactionOutpoint::new(Hash::from_bytes([1; 32]), index),
                UtxoEntry::new(amount, ScriptPublicKey::new(0, vec![]), 0, false),
            )
        };
        let mut utxos = vec![entry(300, 0), entry(100, 1), entry(200, 2)];
        utxos.sort();
        assert_eq!(utxos.iter().map(|u| u.amount()).collect::<Vec<_>>(), vec![100, 200, 300]);
    }
}
