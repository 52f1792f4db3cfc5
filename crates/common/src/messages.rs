use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use keccak_hash::keccak;
use serde::{Deserialize, Serialize};

use crate::calldata::usize_word;

/// Event emitted by the L2 cross-domain messenger for every outbound
/// message. The single payload is the encoded `relayMessage` calldata.
pub const SENT_MESSAGE_EVENT_SIGNATURE: &str = "SentMessage(bytes)";

pub fn sent_message_topic() -> H256 {
    keccak(SENT_MESSAGE_EVENT_SIGNATURE.as_bytes())
}

/// One cross-domain message on its way from L2 to L1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentMessage {
    pub target: Address,
    pub sender: Address,
    pub data: Bytes,
    pub nonce: U256,
    /// The full `relayMessage(target, sender, data, nonce)` calldata exactly
    /// as it appeared in the event payload.
    pub calldata: Bytes,
    /// keccak256 of `calldata`; the key of the L1 messenger's
    /// `successfulMessages` map.
    pub hash: H256,
    /// L2 height the message was sent at (event block number minus the
    /// configured block offset).
    pub height: u64,
}

impl SentMessage {
    /// Decodes the `relayMessage(address,address,bytes,uint256)` calldata
    /// carried in a `SentMessage` event. Returns `None` when the payload
    /// does not have that shape.
    pub fn decode(message: &[u8], height: u64) -> Option<Self> {
        let payload = message.get(4..)?;

        let target = Address::from_slice(payload.get(12..32)?);
        let sender = Address::from_slice(payload.get(44..64)?);
        let data_offset = usize_word(payload.get(64..96)?)?;
        let nonce = U256::from_big_endian(payload.get(96..128)?);

        let len_end = data_offset.checked_add(32)?;
        let data_len = usize_word(payload.get(data_offset..len_end)?)?;
        let data = Bytes::copy_from_slice(payload.get(len_end..len_end.checked_add(data_len)?)?);

        Some(Self {
            target,
            sender,
            data,
            nonce,
            calldata: Bytes::copy_from_slice(message),
            hash: keccak(message),
            height,
        })
    }
}

/// Unwraps the ABI-encoded `bytes message` parameter from a `SentMessage`
/// event's log data and decodes the message inside.
pub fn decode_sent_message_event(log_data: &[u8], height: u64) -> Option<SentMessage> {
    let payload_offset = usize_word(log_data.get(0..32)?)?;
    let len_end = payload_offset.checked_add(32)?;
    let payload_len = usize_word(log_data.get(payload_offset..len_end)?)?;
    let message = log_data.get(len_end..len_end.checked_add(payload_len)?)?;
    SentMessage::decode(message, height)
}

/// Storage slot in the L2→L1 message passer that records a sent message:
/// `keccak256(keccak256(calldata ‖ messenger) ‖ bytes32(0))`, i.e. the entry
/// for `keccak256(calldata ‖ messenger)` in the mapping at slot zero.
pub fn message_slot(calldata: &[u8], l2_messenger: Address) -> H256 {
    let message_hash = keccak([calldata, l2_messenger.as_bytes()].concat());
    keccak([message_hash.as_bytes(), [0u8; 32].as_slice()].concat())
}
