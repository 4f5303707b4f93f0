// JSON wire shapes consumed and produced by the node RPC collaborator.
// Byte runs travel as hex strings; field names are camelCase.
use serde::{Deserialize, Serialize};

use sompi_core::{
    CoreError, ScriptPublicKey, SubnetworkId, Transaction, TransactionInput, TransactionOutpoint,
    TransactionOutput, UtxoEntry,
};

use crate::error::RpcError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcOutpoint {
    pub transaction_id: String,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcScriptPublicKey {
    pub version: u16,
    pub script: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransactionInput {
    pub previous_outpoint: RpcOutpoint,
    pub signature_script: String,
    pub sequence: u64,
    pub sig_op_count: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransactionOutput {
    pub value: u64,
    pub script_public_key: RpcScriptPublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    pub version: u16,
    pub inputs: Vec<RpcTransactionInput>,
    pub outputs: Vec<RpcTransactionOutput>,
    pub lock_time: u64,
    pub subnetwork_id: String,
    pub gas: u64,
    pub payload: String,
    pub mass: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTransactionRequest {
    pub transaction: RpcTransaction,
    pub allow_orphan: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTransactionResponse {
    pub transaction_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcUtxoEntry {
    pub amount: u64,
    pub script_public_key: RpcScriptPublicKey,
    pub block_daa_score: u64,
    pub is_coinbase: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcUtxosByAddressesEntry {
    pub address: String,
    pub outpoint: RpcOutpoint,
    pub utxo_entry: RpcUtxoEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUtxosByAddressesRequest {
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUtxosByAddressesResponse {
    pub entries: Vec<RpcUtxosByAddressesEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcFeerateBucket {
    pub feerate: f64,
    pub estimated_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcFeeEstimate {
    pub priority_bucket: RpcFeerateBucket,
    pub normal_buckets: Vec<RpcFeerateBucket>,
    pub low_buckets: Vec<RpcFeerateBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFeeEstimateResponse {
    pub estimate: RpcFeeEstimate,
}

impl From<&TransactionOutpoint> for RpcOutpoint {
    fn from(outpoint: &TransactionOutpoint) -> Self {
        Self { transaction_id: outpoint.transaction_id.to_hex(), index: outpoint.index }
    }
}

impl TryFrom<&RpcOutpoint> for TransactionOutpoint {
    type Error = RpcError;

    fn try_from(outpoint: &RpcOutpoint) -> Result<Self, Self::Error> {
        let transaction_id = outpoint.transaction_id.parse().map_err(RpcError::Core)?;
        Ok(Self::new(transaction_id, outpoint.index))
    }
}

impl From<&ScriptPublicKey> for RpcScriptPublicKey {
    fn from(script_public_key: &ScriptPublicKey) -> Self {
        Self { version: script_public_key.version(), script: hex::encode(script_public_key.script()) }
    }
}

impl TryFrom<&RpcScriptPublicKey> for ScriptPublicKey {
    type Error = RpcError;

    fn try_from(spk: &RpcScriptPublicKey) -> Result<Self, Self::Error> {
        let script = hex::decode(&spk.script).map_err(|e| RpcError::InvalidHex("script", e.to_string()))?;
        Ok(ScriptPublicKey::new(spk.version, script))
    }
}

impl From<&Transaction> for RpcTransaction {
    fn from(tx: &Transaction) -> Self {
        Self {
            version: tx.version,
            inputs: tx
                .inputs
                .iter()
                .map(|input| RpcTransactionInput {
                    previous_outpoint: (&input.previous_outpoint).into(),
                    signature_script: hex::encode(&input.signature_script),
                    sequence: input.sequence,
                    sig_op_count: input.sig_op_count,
                })
                .collect(),
            outputs: tx
                .outputs
                .iter()
                .map(|output| RpcTransactionOutput {
                    value: output.value,
                    script_public_key: (&output.script_public_key).into(),
                })
                .collect(),
            lock_time: tx.lock_time,
            subnetwork_id: tx.subnetwork_id.to_string(),
            gas: tx.gas,
            payload: hex::encode(&tx.payload),
            mass: tx.mass(),
        }
    }
}

impl TryFrom<&RpcTransaction> for Transaction {
    type Error = RpcError;

    fn try_from(rpc: &RpcTransaction) -> Result<Self, Self::Error> {
        let inputs = rpc
            .inputs
            .iter()
            .map(|input| {
                Ok(TransactionInput::new(
                    (&input.previous_outpoint).try_into()?,
                    hex::decode(&input.signature_script)
                        .map_err(|e| RpcError::InvalidHex("signatureScript", e.to_string()))?,
                    input.sequence,
                    input.sig_op_count,
                ))
            })
            .collect::<Result<Vec<_>, RpcError>>()?;
        let outputs = rpc
            .outputs
            .iter()
            .map(|output| Ok(TransactionOutput::new(output.value, (&output.script_public_key).try_into()?)))
            .collect::<Result<Vec<_>, RpcError>>()?;
        let subnetwork_id: SubnetworkId =
            rpc.subnetwork_id.parse().map_err(|e: CoreError| RpcError::Core(e))?;
        let payload = hex::decode(&rpc.payload).map_err(|e| RpcError::InvalidHex("payload", e.to_string()))?;
        let tx = Transaction::new(rpc.version, inputs, outputs, rpc.lock_time, subnetwork_id, rpc.gas, payload)
            .with_mass(rpc.mass);
        Ok(tx)
    }
}

impl TryFrom<&RpcUtxoEntry> for UtxoEntry {
    type Error = RpcError;

    fn try_from(entry: &RpcUtxoEntry) -> Result<Self, Self::Error> {
        Ok(UtxoEntry::new(
            entry.amount,
            (&entry.script_public_key).try_into()?,
            entry.block_daa_score,
            entry.is_coinbase,
        ))
    }
}
