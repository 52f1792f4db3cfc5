use ethereum_types::{H256, U256};
use relayex_common::calldata::CalldataEncodeError;
use relayex_common::merkle_tree::MerkleError;
use relayex_rpc::errors::EthClientError;

#[derive(Debug, thiserror::Error)]
pub enum RelayerError {
    #[error("Failed to start MessageRelayer: {0}")]
    MessageRelayerError(#[from] MessageRelayerError),
}

#[derive(Debug, thiserror::Error)]
pub enum BatchIndexError {
    #[error("BatchIndex error: {0}")]
    EthClientError(#[from] EthClientError),
    #[error("Failed to encode calldata: {0}")]
    CalldataEncodeError(#[from] CalldataEncodeError),
    #[error("Append transaction {0:#x} is missing on L1")]
    MissingAppendTransaction(H256),
    #[error("Append transaction {0:#x} carries malformed calldata")]
    MalformedAppendCalldata(H256),
    #[error("Batch {batch_index} claims {expected} state roots but its append carried {got}")]
    BatchSizeMismatch {
        batch_index: U256,
        expected: U256,
        got: usize,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum MessageScannerError {
    #[error("MessageScanner error: {0}")]
    EthClientError(#[from] EthClientError),
    #[error("Height range overflows the block numbering")]
    HeightOverflow,
}

#[derive(Debug, thiserror::Error)]
pub enum ProofBuilderError {
    #[error("ProofBuilder error: {0}")]
    EthClientError(#[from] EthClientError),
    #[error("ProofBuilder failed to resolve the covering batch: {0}")]
    BatchIndexError(#[from] BatchIndexError),
    #[error("ProofBuilder failed to build the batch inclusion proof: {0}")]
    MerkleError(#[from] MerkleError),
    #[error("No appended batch covers height {0}")]
    MissingBatch(u64),
    #[error("L2 node returned no storage proof for message {0:#x}")]
    MissingStorageProof(H256),
    #[error("Reconstructed batch root {computed:#x} does not match committed root {committed:#x}")]
    BatchRootMismatch { committed: H256, computed: H256 },
    #[error("Block number overflows when applying the block offset")]
    HeightOverflow,
}

#[derive(Debug, thiserror::Error)]
pub enum MessageRelayerError {
    #[error("MessageRelayer failed because of an EthClient error: {0}")]
    EthClientError(#[from] EthClientError),
    #[error("MessageRelayer failed to consult the batch index: {0}")]
    BatchIndexError(#[from] BatchIndexError),
    #[error("MessageRelayer failed to scan messages: {0}")]
    MessageScannerError(#[from] MessageScannerError),
    #[error("MessageRelayer failed to build a proof: {0}")]
    ProofBuilderError(#[from] ProofBuilderError),
    #[error("Failed to encode calldata: {0}")]
    CalldataEncodeError(#[from] CalldataEncodeError),
    #[error("Batch {0} has zero size; refusing to advance the cursor")]
    EmptyBatch(U256),
    #[error("Cursor overflow while advancing past batch {0}")]
    CursorOverflow(U256),
}
