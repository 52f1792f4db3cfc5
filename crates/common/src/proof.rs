use bytes::Bytes;
use ethereum_types::H256;
use serde::{Deserialize, Serialize};

use crate::batch::StateBatchHeader;
use crate::calldata::Value;

/// Merkle inclusion proof of one state root within its batch: the root's
/// position and the sibling hashes from the leaf level up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRootProof {
    pub index: u64,
    pub siblings: Vec<H256>,
}

/// Everything the L1 messenger needs to verify one relayed message: the
/// covering state root with its batch inclusion proof, plus the RLP-packed
/// account and storage witnesses from the L2 execution state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageProof {
    pub state_root: H256,
    pub state_root_batch_header: StateBatchHeader,
    pub state_root_proof: StateRootProof,
    /// RLP list of account-trie nodes for the message passer account.
    pub state_trie_witness: Bytes,
    /// RLP list of storage-trie nodes for the message slot.
    pub storage_trie_witness: Bytes,
}

impl MessageProof {
    /// ABI tuple form of the messenger's proof struct:
    /// `(bytes32,(uint256,bytes32,uint256,uint256,bytes),(uint256,bytes32[]),bytes,bytes)`.
    pub fn to_calldata_value(&self) -> Value {
        Value::Tuple(vec![
            Value::FixedBytes(Bytes::copy_from_slice(self.state_root.as_bytes())),
            self.state_root_batch_header.to_calldata_value(),
            Value::Tuple(vec![
                Value::Uint(self.state_root_proof.index.into()),
                Value::Array(
                    self.state_root_proof
                        .siblings
                        .iter()
                        .map(|sibling| {
                            Value::FixedBytes(Bytes::copy_from_slice(sibling.as_bytes()))
                        })
                        .collect(),
                ),
            ]),
            Value::Bytes(self.state_trie_witness.clone()),
            Value::Bytes(self.storage_trie_witness.clone()),
        ])
    }
}
