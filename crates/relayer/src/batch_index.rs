use ethereum_types::{Address, H256, U256};
use tracing::warn;

use relayex_common::batch::{
    StateBatchAppendedEvent, StateBatchHeader, decode_append_state_batch,
    state_batch_appended_topic,
};
use relayex_common::calldata::encode_calldata;
use relayex_rpc::EthClient;
use relayex_rpc::types::{BlockIdentifier, BlockTag, RpcLog};

use crate::errors::BatchIndexError;

pub const INSIDE_FRAUD_PROOF_WINDOW_SIGNATURE: &str =
    "insideFraudProofWindow((uint256,bytes32,uint256,uint256,bytes))";

/// Resolves L2 heights to the state batch committing them by replaying the
/// state commitment chain's `StateBatchAppended` events. Nothing is cached:
/// the event history is the index, so a restart needs no recovery.
#[derive(Clone, Debug)]
pub struct BatchIndex {
    l1_client: EthClient,
    state_commitment_chain_address: Address,
}

impl BatchIndex {
    pub fn new(l1_client: EthClient, state_commitment_chain_address: Address) -> Self {
        Self {
            l1_client,
            state_commitment_chain_address,
        }
    }

    /// Fully populated header of the batch covering `height`, with the state
    /// roots recovered from the append transaction's calldata. `None` when
    /// no appended batch commits that height yet.
    pub async fn get_state_batch_header(
        &self,
        height: u64,
    ) -> Result<Option<StateBatchHeader>, BatchIndexError> {
        let Some((event, tx_hash)) = self.find_covering_event(height).await? else {
            return Ok(None);
        };

        let append_tx = self
            .l1_client
            .get_transaction_by_hash(tx_hash)
            .await?
            .ok_or(BatchIndexError::MissingAppendTransaction(tx_hash))?;

        let (state_roots, _start_element) = decode_append_state_batch(&append_tx.input)
            .ok_or(BatchIndexError::MalformedAppendCalldata(tx_hash))?;

        if U256::from(state_roots.len()) != event.batch_size {
            return Err(BatchIndexError::BatchSizeMismatch {
                batch_index: event.batch_index,
                expected: event.batch_size,
                got: state_roots.len(),
            });
        }

        Ok(Some(event.into_header(state_roots)))
    }

    /// False while the covering batch is still inside the fraud-proof
    /// window, or when no batch covers `height` yet. A batch exactly at the
    /// window boundary counts as finalized.
    pub async fn is_transaction_finalized(&self, height: u64) -> Result<bool, BatchIndexError> {
        let Some(header) = self.get_state_batch_header(height).await? else {
            return Ok(false);
        };
        Ok(!self.inside_fraud_proof_window(&header).await?)
    }

    /// Asks the state commitment chain whether the batch can still be
    /// challenged.
    pub async fn inside_fraud_proof_window(
        &self,
        header: &StateBatchHeader,
    ) -> Result<bool, BatchIndexError> {
        let calldata = encode_calldata(
            INSIDE_FRAUD_PROOF_WINDOW_SIGNATURE,
            &[header.to_calldata_value()],
        )?;

        Ok(self
            .l1_client
            .call_bool(
                self.state_commitment_chain_address,
                calldata.into(),
                BlockIdentifier::Tag(BlockTag::Latest),
            )
            .await?)
    }

    /// True when at least one batch has ever been appended. Used by startup
    /// sanity checks.
    pub async fn any_batches_appended(&self) -> Result<bool, BatchIndexError> {
        Ok(!self.appended_events().await?.is_empty())
    }

    async fn find_covering_event(
        &self,
        height: u64,
    ) -> Result<Option<(StateBatchAppendedEvent, H256)>, BatchIndexError> {
        for log in self.appended_events().await? {
            let Some(event) = StateBatchAppendedEvent::from_log_parts(&log.topics, &log.data)
            else {
                warn!(
                    tx = %log.transaction_hash,
                    "Skipping undecodable StateBatchAppended event"
                );
                continue;
            };
            if event.covers(height) {
                return Ok(Some((event, log.transaction_hash)));
            }
        }
        Ok(None)
    }

    async fn appended_events(&self) -> Result<Vec<RpcLog>, BatchIndexError> {
        let latest_block = self.l1_client.get_block_number().await?;
        Ok(self
            .l1_client
            .get_logs(
                0,
                latest_block,
                self.state_commitment_chain_address,
                vec![state_batch_appended_topic()],
            )
            .await?)
    }
}
