use ethereum_types::Address;
use tracing::warn;

use relayex_common::messages::{SentMessage, decode_sent_message_event, sent_message_topic};
use relayex_rpc::EthClient;

use crate::errors::MessageScannerError;

/// Enumerates `SentMessage` events on the L2 cross-domain messenger.
#[derive(Clone, Debug)]
pub struct MessageScanner {
    l2_client: EthClient,
    l2_messenger_address: Address,
    block_offset: u64,
}

impl MessageScanner {
    pub fn new(l2_client: EthClient, l2_messenger_address: Address, block_offset: u64) -> Self {
        Self {
            l2_client,
            l2_messenger_address,
            block_offset,
        }
    }

    /// Sent messages with heights in the inclusive range
    /// `[start_height, end_height]`, ordered by `(block_number, log_index)`.
    /// Undecodable events are logged and skipped; they cannot be relayed
    /// either way.
    pub async fn get_sent_messages(
        &self,
        start_height: u64,
        end_height: u64,
    ) -> Result<Vec<SentMessage>, MessageScannerError> {
        let from_block = start_height
            .checked_add(self.block_offset)
            .ok_or(MessageScannerError::HeightOverflow)?;
        let to_block = end_height
            .checked_add(self.block_offset)
            .ok_or(MessageScannerError::HeightOverflow)?;

        let mut logs = self
            .l2_client
            .get_logs(
                from_block,
                to_block,
                self.l2_messenger_address,
                vec![sent_message_topic()],
            )
            .await?;
        logs.sort_by_key(|log| (log.block_number, log.log_index));

        let mut messages = Vec::new();
        for log in logs {
            let height = log.block_number.saturating_sub(self.block_offset);
            match decode_sent_message_event(&log.data, height) {
                Some(message) => messages.push(message),
                None => warn!(
                    block_number = log.block_number,
                    log_index = log.log_index,
                    "Skipping undecodable SentMessage event"
                ),
            }
        }

        Ok(messages)
    }
}
