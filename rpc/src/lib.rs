// Sompi rpc - wire shapes for the JSON-RPC node collaborator. The client
// itself (transports, retries, subscriptions) lives outside this workspace;
// these types pin down the JSON the node expects and returns.

pub mod error;
pub mod types;

pub use error::RpcError;
pub use types::{
    GetFeeEstimateResponse, GetUtxosByAddressesRequest, GetUtxosByAddressesResponse, RpcFeeEstimate,
    RpcFeerateBucket, RpcOutpoint, RpcScriptPublicKey, RpcTransaction, RpcTransactionInput, RpcTransactionOutput,
    RpcUtxoEntry, RpcUtxosByAddressesEntry, SubmitTransactionRequest, SubmitTransactionResponse,
};
