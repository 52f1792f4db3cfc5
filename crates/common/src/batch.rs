use bytes::Bytes;
use ethereum_types::{H256, U256};
use keccak_hash::keccak;
use serde::{Deserialize, Serialize};

use crate::calldata::{Value, usize_word};

/// Event emitted by the state commitment chain for every appended batch.
/// `batchIndex` is indexed; the remaining fields live in the log data.
pub const STATE_BATCH_APPENDED_EVENT_SIGNATURE: &str =
    "StateBatchAppended(uint256,bytes32,uint256,uint256,bytes)";

pub fn state_batch_appended_topic() -> H256 {
    keccak(STATE_BATCH_APPENDED_EVENT_SIGNATURE.as_bytes())
}

/// Header of one state batch appended to the L1 state commitment chain.
///
/// `state_roots` is recovered from the append transaction's calldata; the
/// on-chain struct only carries the first five fields. The batch commits one
/// state root per L2 height in `[prev_total_elements,
/// prev_total_elements + batch_size)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateBatchHeader {
    pub batch_index: U256,
    pub batch_root: H256,
    pub batch_size: U256,
    pub prev_total_elements: U256,
    pub extra_data: Bytes,
    pub state_roots: Vec<H256>,
}

impl StateBatchHeader {
    /// True when this batch commits the state root for the given L2 height.
    pub fn covers(&self, height: u64) -> bool {
        let height = U256::from(height);
        self.prev_total_elements <= height
            && height < self.prev_total_elements.saturating_add(self.batch_size)
    }

    /// Position of the given height's state root within the batch.
    pub fn root_index(&self, height: u64) -> Option<usize> {
        if !self.covers(height) {
            return None;
        }
        let index: u64 = (U256::from(height) - self.prev_total_elements)
            .try_into()
            .ok()?;
        usize::try_from(index).ok()
    }

    /// State root committed for the given L2 height.
    pub fn state_root_at(&self, height: u64) -> Option<H256> {
        self.state_roots.get(self.root_index(height)?).copied()
    }

    /// ABI tuple form of the on-chain header struct
    /// `(uint256,bytes32,uint256,uint256,bytes)`.
    pub fn to_calldata_value(&self) -> Value {
        Value::Tuple(vec![
            Value::Uint(self.batch_index),
            Value::FixedBytes(Bytes::copy_from_slice(self.batch_root.as_bytes())),
            Value::Uint(self.batch_size),
            Value::Uint(self.prev_total_elements),
            Value::Bytes(self.extra_data.clone()),
        ])
    }
}

/// A decoded `StateBatchAppended` event, before the root list has been
/// recovered from the append transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct StateBatchAppendedEvent {
    pub batch_index: U256,
    pub batch_root: H256,
    pub batch_size: U256,
    pub prev_total_elements: U256,
    pub extra_data: Bytes,
}

impl StateBatchAppendedEvent {
    pub fn from_log_parts(topics: &[H256], data: &[u8]) -> Option<Self> {
        let batch_index = U256::from_big_endian(topics.get(1)?.as_bytes());

        let batch_root = H256::from_slice(data.get(0..32)?);
        let batch_size = U256::from_big_endian(data.get(32..64)?);
        let prev_total_elements = U256::from_big_endian(data.get(64..96)?);

        let extra_offset = usize_word(data.get(96..128)?)?;
        let len_end = extra_offset.checked_add(32)?;
        let extra_len = usize_word(data.get(extra_offset..len_end)?)?;
        let extra_data =
            Bytes::copy_from_slice(data.get(len_end..len_end.checked_add(extra_len)?)?);

        Some(Self {
            batch_index,
            batch_root,
            batch_size,
            prev_total_elements,
            extra_data,
        })
    }

    pub fn covers(&self, height: u64) -> bool {
        let height = U256::from(height);
        self.prev_total_elements <= height
            && height < self.prev_total_elements.saturating_add(self.batch_size)
    }

    pub fn into_header(self, state_roots: Vec<H256>) -> StateBatchHeader {
        StateBatchHeader {
            batch_index: self.batch_index,
            batch_root: self.batch_root,
            batch_size: self.batch_size,
            prev_total_elements: self.prev_total_elements,
            extra_data: self.extra_data,
            state_roots,
        }
    }
}

/// Recovers `(state_roots, start_element)` from
/// `appendStateBatch(bytes32[],uint256)` calldata. The calldata is never
/// re-submitted; it is only read back to reconstruct the roots a batch
/// committed.
pub fn decode_append_state_batch(calldata: &[u8]) -> Option<(Vec<H256>, U256)> {
    let payload = calldata.get(4..)?;

    let roots_offset = usize_word(payload.get(0..32)?)?;
    let start_element = U256::from_big_endian(payload.get(32..64)?);

    let len_end = roots_offset.checked_add(32)?;
    let roots_len = usize_word(payload.get(roots_offset..len_end)?)?;

    let mut state_roots = Vec::with_capacity(roots_len);
    for i in 0..roots_len {
        let start = len_end.checked_add(i.checked_mul(32)?)?;
        state_roots.push(H256::from_slice(payload.get(start..start.checked_add(32)?)?));
    }

    Some((state_roots, start_element))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calldata::encode_calldata;

    fn header(prev_total: u64, size: u64) -> StateBatchHeader {
        StateBatchHeader {
            batch_index: U256::zero(),
            batch_root: H256::zero(),
            batch_size: U256::from(size),
            prev_total_elements: U256::from(prev_total),
            extra_data: Bytes::new(),
            state_roots: (0..size).map(|i| H256::from_low_u64_be(i)).collect(),
        }
    }

    #[test]
    fn covered_range_is_half_open() {
        let batch = header(5, 7);
        assert!(!batch.covers(4));
        assert!(batch.covers(5));
        assert!(batch.covers(11));
        assert!(!batch.covers(12));
    }

    #[test]
    fn root_index_is_relative_to_prev_total() {
        let batch = header(5, 7);
        assert_eq!(batch.root_index(5), Some(0));
        assert_eq!(batch.root_index(11), Some(6));
        assert_eq!(batch.root_index(12), None);
        assert_eq!(batch.state_root_at(8), Some(H256::from_low_u64_be(3)));
    }

    #[test]
    fn decodes_append_state_batch_calldata() {
        let roots: Vec<H256> = (1..=3).map(H256::from_low_u64_be).collect();
        let calldata = encode_calldata(
            "appendStateBatch(bytes32[],uint256)",
            &[
                Value::Array(
                    roots
                        .iter()
                        .map(|r| Value::FixedBytes(Bytes::copy_from_slice(r.as_bytes())))
                        .collect(),
                ),
                Value::Uint(U256::from(42)),
            ],
        )
        .unwrap();

        let (decoded_roots, start) = decode_append_state_batch(&calldata).unwrap();
        assert_eq!(decoded_roots, roots);
        assert_eq!(start, U256::from(42));

        assert!(decode_append_state_batch(&calldata[..calldata.len() - 1]).is_none());
    }

    #[test]
    fn decodes_state_batch_appended_log() {
        let batch_root = H256::repeat_byte(0xab);
        let extra = [0xde, 0xad, 0xbe, 0xef];

        let topics = vec![state_batch_appended_topic(), H256::from_low_u64_be(3)];
        let mut data = batch_root.as_bytes().to_vec();
        data.extend_from_slice(&U256::from(7).to_big_endian());
        data.extend_from_slice(&U256::from(21).to_big_endian());
        data.extend_from_slice(&U256::from(128).to_big_endian());
        data.extend_from_slice(&U256::from(extra.len()).to_big_endian());
        data.extend_from_slice(&extra);

        let event = StateBatchAppendedEvent::from_log_parts(&topics, &data).unwrap();
        assert_eq!(event.batch_index, U256::from(3));
        assert_eq!(event.batch_root, batch_root);
        assert_eq!(event.batch_size, U256::from(7));
        assert_eq!(event.prev_total_elements, U256::from(21));
        assert_eq!(event.extra_data.as_ref(), &extra);
        assert!(event.covers(21) && event.covers(27) && !event.covers(28));
    }
}
