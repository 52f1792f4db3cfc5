use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::serde_utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Earliest,
    Latest,
    Safe,
    Finalized,
    Pending,
}

impl BlockTag {
    fn as_str(&self) -> &'static str {
        match self {
            BlockTag::Earliest => "earliest",
            BlockTag::Latest => "latest",
            BlockTag::Safe => "safe",
            BlockTag::Finalized => "finalized",
            BlockTag::Pending => "pending",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockIdentifier {
    Number(u64),
    Tag(BlockTag),
}

impl From<BlockIdentifier> for Value {
    fn from(identifier: BlockIdentifier) -> Value {
        match identifier {
            BlockIdentifier::Number(number) => json!(format!("{number:#x}")),
            BlockIdentifier::Tag(tag) => json!(tag.as_str()),
        }
    }
}

/// One entry of an `eth_getLogs` response; only the fields the relayer
/// consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub address: Address,
    pub topics: Vec<H256>,
    #[serde(with = "serde_utils::bytes")]
    pub data: Bytes,
    #[serde(with = "serde_utils::u64::hex_str")]
    pub block_number: u64,
    pub transaction_hash: H256,
    #[serde(with = "serde_utils::u64::hex_str")]
    pub log_index: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcReceipt {
    pub transaction_hash: H256,
    #[serde(with = "serde_utils::u64::hex_str")]
    pub block_number: u64,
    #[serde(with = "serde_utils::bool")]
    pub status: bool,
    #[serde(with = "serde_utils::u64::hex_str")]
    pub gas_used: u64,
}

/// An `eth_getTransactionByHash` response; only the fields the relayer
/// consumes (the append transaction is read back for its calldata).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    pub hash: H256,
    #[serde(with = "serde_utils::bytes")]
    pub input: Bytes,
    #[serde(default)]
    pub to: Option<Address>,
}

/// An `eth_getProof` response: the account proof for the queried account
/// and one storage proof per requested key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcProof {
    pub address: Address,
    #[serde(with = "serde_utils::bytes::vec")]
    pub account_proof: Vec<Bytes>,
    pub balance: U256,
    pub code_hash: H256,
    #[serde(with = "serde_utils::u64::hex_str")]
    pub nonce: u64,
    pub storage_hash: H256,
    pub storage_proof: Vec<RpcStorageProof>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcStorageProof {
    pub key: U256,
    pub value: U256,
    #[serde(with = "serde_utils::bytes::vec")]
    pub proof: Vec<Bytes>,
}
