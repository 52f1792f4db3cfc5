use bytes::Bytes;
use ethereum_types::{Address, H256};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use relayex_common::calldata::{Value, encode_calldata};
use relayex_common::messages::SentMessage;
use relayex_rpc::signer::Signer;
use relayex_rpc::types::{BlockIdentifier, BlockTag};
use relayex_rpc::{EthClient, Overrides};

use crate::batch_index::BatchIndex;
use crate::configs::RelayerConfig;
use crate::errors::{MessageRelayerError, RelayerError};
use crate::message_scanner::MessageScanner;
use crate::proof_builder::ProofBuilder;
use crate::utils::sleep_random;

pub const RELAY_MESSAGE_SIGNATURE: &str = "relayMessage(address,address,bytes,uint256,(bytes32,(uint256,bytes32,uint256,uint256,bytes),(uint256,bytes32[]),bytes,bytes))";
pub const SUCCESSFUL_MESSAGES_SIGNATURE: &str = "successfulMessages(bytes32)";

/// Fixed gas limit for relay submissions.
pub const RELAY_MESSAGE_GAS_LIMIT: u64 = 2_000_000;
const RECEIPT_MAX_RETRIES: u64 = 10;

const MIN_SANE_POLLING_INTERVAL_MS: u64 = 15_000;
const MAX_SANE_POLLING_INTERVAL_MS: u64 = 3_600_000;

pub async fn start_message_relayer(
    cfg: RelayerConfig,
    stop_receiver: watch::Receiver<bool>,
) -> Result<(), RelayerError> {
    let relayer = MessageRelayer::new(cfg).await?;
    relayer.run(stop_receiver).await;
    Ok(())
}

/// The relay loop: advances a finalization cursor over L2 heights, scans
/// each newly finalized range for sent messages, and proves and submits
/// every message that has not been relayed yet.
pub struct MessageRelayer {
    l1_client: EthClient,
    batch_index: BatchIndex,
    message_scanner: MessageScanner,
    proof_builder: ProofBuilder,
    relay_signer: Signer,
    l1_messenger_address: Address,
    polling_interval_ms: u64,
    last_finalized_tx_height: u64,
    next_unfinalized_tx_height: u64,
}

impl MessageRelayer {
    /// Wires the clients and components and runs the startup sanity checks.
    pub async fn new(cfg: RelayerConfig) -> Result<Self, MessageRelayerError> {
        let l1_client = EthClient::new(&cfg.l1_rpc_url)?;
        let l2_client = EthClient::new(&cfg.l2_rpc_url)?;

        // Both endpoints must identify their network before the loop starts.
        let l1_chain_id = l1_client.get_chain_id().await?;
        let l2_chain_id = l2_client.get_chain_id().await?;

        if cfg.polling_interval_ms < MIN_SANE_POLLING_INTERVAL_MS {
            warn!(
                polling_interval_ms = cfg.polling_interval_ms,
                "Polling interval is unusually short; this hammers both RPC endpoints"
            );
        }
        if cfg.polling_interval_ms > MAX_SANE_POLLING_INTERVAL_MS {
            warn!(
                polling_interval_ms = cfg.polling_interval_ms,
                "Polling interval is longer than an hour; relays will lag finalization"
            );
        }

        let batch_index = BatchIndex::new(l1_client.clone(), cfg.state_commitment_chain_address);
        if !batch_index.any_batches_appended().await? {
            warn!("No state batches have been appended yet; nothing can finalize until the first append");
        }

        let message_scanner = MessageScanner::new(
            l2_client.clone(),
            cfg.l2_cross_domain_messenger_address,
            cfg.block_offset,
        );
        let proof_builder = ProofBuilder::new(
            l2_client,
            batch_index.clone(),
            cfg.l2_cross_domain_messenger_address,
            cfg.l2_to_l1_message_passer_address,
            cfg.block_offset,
        );

        info!(
            %l1_chain_id,
            %l2_chain_id,
            relayer_address = %cfg.relay_signer.address(),
            state_commitment_chain = %cfg.state_commitment_chain_address,
            l1_messenger = %cfg.l1_cross_domain_messenger_address,
            starting_height = cfg.l2_chain_starting_height,
            "Message relayer initialized"
        );

        Ok(Self {
            l1_client,
            batch_index,
            message_scanner,
            proof_builder,
            relay_signer: cfg.relay_signer,
            l1_messenger_address: cfg.l1_cross_domain_messenger_address,
            polling_interval_ms: cfg.polling_interval_ms,
            last_finalized_tx_height: cfg.l2_chain_starting_height,
            next_unfinalized_tx_height: cfg.l2_chain_starting_height,
        })
    }

    /// `(last_finalized_tx_height, next_unfinalized_tx_height)`. The cursor
    /// never rewinds; re-processing a height is only possible as a no-op
    /// through the dedup check.
    pub fn cursor(&self) -> (u64, u64) {
        (
            self.last_finalized_tx_height,
            self.next_unfinalized_tx_height,
        )
    }

    pub async fn run(mut self, mut stop_receiver: watch::Receiver<bool>) {
        while !*stop_receiver.borrow_and_update() {
            tokio::select! {
                _ = sleep_random(self.polling_interval_ms) => {}
                _ = stop_receiver.changed() => break,
            }

            if let Err(err) = self.tick().await {
                error!("Message relayer tick failed: {err}");
            }
        }
        info!("Stop signal received, message relayer is shutting down");
    }

    /// One pass of the relay state machine: check finalization at the
    /// cursor, jump it over every finalized batch, scan the finalized range
    /// and relay what is new.
    pub async fn tick(&mut self) -> Result<(), MessageRelayerError> {
        if !self
            .batch_index
            .is_transaction_finalized(self.next_unfinalized_tx_height)
            .await?
        {
            debug!(
                height = self.next_unfinalized_tx_height,
                "Next transaction height is not finalized yet"
            );
            return Ok(());
        }

        let last_finalized = self.next_unfinalized_tx_height;
        let next_unfinalized = self.advance_from(last_finalized).await?;
        if next_unfinalized == last_finalized {
            // The covering batch disappeared between the two lookups.
            return Ok(());
        }

        // The cursor is committed only after the scan succeeds, so a failed
        // scan retries the same range next tick instead of dropping it.
        let messages = self
            .message_scanner
            .get_sent_messages(last_finalized, next_unfinalized.saturating_sub(1))
            .await?;
        self.last_finalized_tx_height = last_finalized;
        self.next_unfinalized_tx_height = next_unfinalized;

        if messages.is_empty() {
            debug!(
                from = last_finalized,
                to = next_unfinalized,
                "No messages in the newly finalized range"
            );
            return Ok(());
        }

        info!(
            count = messages.len(),
            from = last_finalized,
            to = next_unfinalized,
            "Relaying messages from newly finalized heights"
        );
        for message in &messages {
            if let Err(err) = self.relay_message(message).await {
                warn!(
                    message_hash = %message.hash,
                    "Failed to relay message, dedup will re-evaluate it when its range is next scanned: {err}"
                );
            }
        }

        Ok(())
    }

    /// Jumps a whole batch at a time while the batch at the cursor has left
    /// the fraud-proof window; every batch boundary is visited at most once
    /// per tick.
    async fn advance_from(&self, start: u64) -> Result<u64, MessageRelayerError> {
        let mut next = start;
        loop {
            let Some(header) = self.batch_index.get_state_batch_header(next).await? else {
                break;
            };
            if self.batch_index.inside_fraud_proof_window(&header).await? {
                break;
            }

            let batch_size: u64 = header
                .batch_size
                .try_into()
                .map_err(|_| MessageRelayerError::CursorOverflow(header.batch_index))?;
            if batch_size == 0 {
                return Err(MessageRelayerError::EmptyBatch(header.batch_index));
            }
            next = next
                .checked_add(batch_size)
                .ok_or(MessageRelayerError::CursorOverflow(header.batch_index))?;
        }
        Ok(next)
    }

    async fn relay_message(&self, message: &SentMessage) -> Result<(), MessageRelayerError> {
        if self.already_relayed(message.hash).await? {
            debug!(message_hash = %message.hash, "Message already relayed, skipping");
            return Ok(());
        }

        // A proof that cannot be built right now is not fatal; the message
        // stays unrelayed and is picked up again later.
        let proof = match self.proof_builder.get_message_proof(message).await {
            Ok(proof) => proof,
            Err(err) => {
                warn!(
                    message_hash = %message.hash,
                    "Could not build proof, skipping message for this tick: {err}"
                );
                return Ok(());
            }
        };

        let calldata = encode_calldata(
            RELAY_MESSAGE_SIGNATURE,
            &[
                Value::Address(message.target),
                Value::Address(message.sender),
                Value::Bytes(message.data.clone()),
                Value::Uint(message.nonce),
                proof.to_calldata_value(),
            ],
        )?;

        let relay_tx = self
            .l1_client
            .build_eip1559_transaction(
                self.l1_messenger_address,
                self.relay_signer.address(),
                calldata.into(),
                Overrides {
                    gas_limit: Some(RELAY_MESSAGE_GAS_LIMIT),
                    ..Default::default()
                },
            )
            .await?;
        let tx_hash = self
            .l1_client
            .send_eip1559_transaction(&relay_tx, &self.relay_signer)
            .await?;
        info!(
            message_hash = %message.hash,
            tx_hash = %tx_hash,
            nonce = %message.nonce,
            "Relay transaction submitted"
        );

        let receipt = self
            .l1_client
            .wait_for_transaction_receipt(tx_hash, RECEIPT_MAX_RETRIES)
            .await?;
        if receipt.status {
            info!(message_hash = %message.hash, tx_hash = %tx_hash, "Message relayed");
        } else {
            warn!(
                message_hash = %message.hash,
                tx_hash = %tx_hash,
                "Relay transaction reverted; the dedup check will re-evaluate the message next time its range is scanned"
            );
        }

        Ok(())
    }

    async fn already_relayed(&self, message_hash: H256) -> Result<bool, MessageRelayerError> {
        let calldata = encode_calldata(
            SUCCESSFUL_MESSAGES_SIGNATURE,
            &[Value::FixedBytes(Bytes::copy_from_slice(
                message_hash.as_bytes(),
            ))],
        )?;

        Ok(self
            .l1_client
            .call_bool(
                self.l1_messenger_address,
                calldata.into(),
                BlockIdentifier::Tag(BlockTag::Latest),
            )
            .await?)
    }
}
