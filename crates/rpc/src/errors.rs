use crate::signer::SignerError;
use crate::utils::RpcRequest;

#[derive(Debug, thiserror::Error)]
pub enum EthClientError {
    #[error("Error sending request {0:?}")]
    RequestError(RpcRequest),
    #[error("reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("Failed to serialize request body: {0}")]
    FailedToSerializeRequestBody(String),
    #[error("Parse Url Error: {0}")]
    ParseUrlError(String),
    #[error("Failed to sign payload: {0}")]
    FailedToSignPayload(#[from] SignerError),
    #[error("eth_chainId request error: {0}")]
    GetChainIdError(#[from] GetChainIdError),
    #[error("eth_blockNumber request error: {0}")]
    GetBlockNumberError(#[from] GetBlockNumberError),
    #[error("eth_getLogs request error: {0}")]
    GetLogsError(#[from] GetLogsError),
    #[error("eth_getTransactionByHash request error: {0}")]
    GetTransactionByHashError(#[from] GetTransactionByHashError),
    #[error("eth_getTransactionReceipt request error: {0}")]
    GetTransactionReceiptError(#[from] GetTransactionReceiptError),
    #[error("eth_call request error: {0}")]
    CallError(#[from] CallError),
    #[error("eth_getTransactionCount request error: {0}")]
    GetNonceError(#[from] GetNonceError),
    #[error("eth_gasPrice request error: {0}")]
    GetGasPriceError(#[from] GetGasPriceError),
    #[error("eth_maxPriorityFeePerGas request error: {0}")]
    GetMaxPriorityFeeError(#[from] GetMaxPriorityFeeError),
    #[error("eth_estimateGas request error: {0}")]
    EstimateGasError(#[from] EstimateGasError),
    #[error("eth_sendRawTransaction request error: {0}")]
    SendRawTransactionError(#[from] SendRawTransactionError),
    #[error("eth_getProof request error: {0}")]
    GetProofError(#[from] GetProofError),
    #[error("Max number of retries reached waiting for receipt")]
    TimeoutError,
    #[error("Internal Error. This is most likely a bug: {0}")]
    InternalError(String),
    #[error("Error: {0}")]
    Custom(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GetChainIdError {
    #[error("{0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("{0}")]
    RPCError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GetBlockNumberError {
    #[error("{0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("{0}")]
    RPCError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GetLogsError {
    #[error("{0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("{0}")]
    RPCError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GetTransactionByHashError {
    #[error("{0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("{0}")]
    RPCError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GetTransactionReceiptError {
    #[error("{0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("{0}")]
    RPCError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("{0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("{0}")]
    RPCError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GetNonceError {
    #[error("{0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),
    #[error("{0}")]
    RPCError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GetGasPriceError {
    #[error("{0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("{0}")]
    RPCError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GetMaxPriorityFeeError {
    #[error("{0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("{0}")]
    RPCError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum EstimateGasError {
    #[error("{0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),
    #[error("{0}")]
    RPCError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SendRawTransactionError {
    #[error("{0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("{0}")]
    RPCError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GetProofError {
    #[error("{0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("{0}")]
    RPCError(String),
}
