use bytes::Bytes;
use ethereum_types::Address;
use rlp::RlpStream;

use relayex_common::merkle_tree::{batch_proof, batch_root};
use relayex_common::messages::{SentMessage, message_slot};
use relayex_common::proof::{MessageProof, StateRootProof};
use relayex_rpc::EthClient;
use relayex_rpc::types::BlockIdentifier;

use crate::batch_index::BatchIndex;
use crate::errors::ProofBuilderError;

/// Assembles the two-level inclusion proof for one finalized message: the
/// Merkle proof of the covering state root within its batch, and the
/// account/storage witnesses for the message passer from the L2 state.
#[derive(Clone, Debug)]
pub struct ProofBuilder {
    l2_client: EthClient,
    batch_index: BatchIndex,
    l2_messenger_address: Address,
    message_passer_address: Address,
    block_offset: u64,
}

impl ProofBuilder {
    pub fn new(
        l2_client: EthClient,
        batch_index: BatchIndex,
        l2_messenger_address: Address,
        message_passer_address: Address,
        block_offset: u64,
    ) -> Self {
        Self {
            l2_client,
            batch_index,
            l2_messenger_address,
            message_passer_address,
            block_offset,
        }
    }

    pub async fn get_message_proof(
        &self,
        message: &SentMessage,
    ) -> Result<MessageProof, ProofBuilderError> {
        // Account and storage witnesses against the L2 state at the
        // message's height.
        let slot = message_slot(&message.calldata, self.l2_messenger_address);
        let block_number = message
            .height
            .checked_add(self.block_offset)
            .ok_or(ProofBuilderError::HeightOverflow)?;
        let trie_proof = self
            .l2_client
            .get_proof(
                self.message_passer_address,
                &[slot],
                BlockIdentifier::Number(block_number),
            )
            .await?;
        let storage_proof = trie_proof
            .storage_proof
            .first()
            .ok_or(ProofBuilderError::MissingStorageProof(message.hash))?;

        // The state root committed for the message's height, proven against
        // the covering batch's root.
        let header = self
            .batch_index
            .get_state_batch_header(message.height)
            .await?
            .ok_or(ProofBuilderError::MissingBatch(message.height))?;
        let index = header
            .root_index(message.height)
            .ok_or(ProofBuilderError::MissingBatch(message.height))?;
        let state_root = header
            .state_root_at(message.height)
            .ok_or(ProofBuilderError::MissingBatch(message.height))?;

        let computed_root = batch_root(&header.state_roots)?;
        if computed_root != header.batch_root {
            return Err(ProofBuilderError::BatchRootMismatch {
                committed: header.batch_root,
                computed: computed_root,
            });
        }
        let siblings = batch_proof(&header.state_roots, index)?;

        let state_trie_witness = encode_witness(&trie_proof.account_proof);
        let storage_trie_witness = encode_witness(&storage_proof.proof);

        Ok(MessageProof {
            state_root,
            state_root_proof: StateRootProof {
                index: u64::try_from(index)
                    .map_err(|_| ProofBuilderError::MissingBatch(message.height))?,
                siblings,
            },
            state_root_batch_header: header,
            state_trie_witness,
            storage_trie_witness,
        })
    }
}

/// Packs trie proof nodes into a single RLP list of raw node bytes, the
/// witness shape the L1 verifier unpacks.
fn encode_witness(nodes: &[Bytes]) -> Bytes {
    let mut stream = RlpStream::new_list(nodes.len());
    for node in nodes {
        stream.append(&node.to_vec());
    }
    stream.out().freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rlp::Rlp;

    #[test]
    fn witness_is_an_rlp_list_of_raw_nodes() {
        let nodes = vec![
            Bytes::from(vec![0x01, 0x02, 0x03]),
            Bytes::from(vec![0xff; 40]),
        ];
        let witness = encode_witness(&nodes);

        let rlp = Rlp::new(&witness);
        assert_eq!(rlp.item_count().unwrap(), 2);
        assert_eq!(rlp.val_at::<Vec<u8>>(0).unwrap(), vec![0x01, 0x02, 0x03]);
        assert_eq!(rlp.val_at::<Vec<u8>>(1).unwrap(), vec![0xff; 40]);
    }

    #[test]
    fn empty_witness_is_an_empty_list() {
        let witness = encode_witness(&[]);
        assert_eq!(witness.as_ref(), &[0xc0]);
    }
}
