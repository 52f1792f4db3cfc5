//! End-to-end exercises of the relayer components against a canned JSON-RPC
//! server that plays both domains: a state commitment chain with two
//! appended batches, an L2 messenger with three sent messages (one of them
//! past the finalized range), and an L1 messenger tracking successful
//! relays.

use std::collections::{HashMap, HashSet, VecDeque};
use std::str::FromStr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::{Json, State};
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use keccak_hash::keccak;
use serde_json::{Value, json};
use tokio::sync::watch;

use relayex_common::batch::state_batch_appended_topic;
use relayex_common::calldata::{self, encode_calldata};
use relayex_common::merkle_tree::{batch_root, verify_batch_proof};
use relayex_common::messages::{SentMessage, sent_message_topic};
use relayex_relayer::batch_index::{BatchIndex, INSIDE_FRAUD_PROOF_WINDOW_SIGNATURE};
use relayex_relayer::message_scanner::MessageScanner;
use relayex_relayer::proof_builder::ProofBuilder;
use relayex_relayer::relayer::{
    MessageRelayer, RELAY_MESSAGE_GAS_LIMIT, RELAY_MESSAGE_SIGNATURE, SUCCESSFUL_MESSAGES_SIGNATURE,
};
use relayex_relayer::RelayerConfig;
use relayex_rpc::signer::Signer;
use relayex_rpc::EthClient;

const RELAY_MESSAGE_EVENT_SIGNATURE: &str = "relayMessage(address,address,bytes,uint256)";

fn scc_address() -> Address {
    Address::from_str("0x0000000000000000000000000000000000000010").unwrap()
}

fn l1_messenger_address() -> Address {
    Address::from_str("0x0000000000000000000000000000000000000020").unwrap()
}

fn l2_messenger_address() -> Address {
    Address::from_str("0x4200000000000000000000000000000000000007").unwrap()
}

fn message_passer_address() -> Address {
    Address::from_str("0x4200000000000000000000000000000000000000").unwrap()
}

fn batch_roots(seed: u8, size: u64) -> Vec<H256> {
    (0..size)
        .map(|i| keccak([seed, u8::try_from(i).unwrap()]))
        .collect()
}

/// The encoded `relayMessage` calldata that a `SentMessage` event carries.
fn message_payload(nonce: u64) -> Vec<u8> {
    encode_calldata(
        RELAY_MESSAGE_EVENT_SIGNATURE,
        &[
            calldata::Value::Address(
                Address::from_str("0x0000000000000000000000000000000000000004").unwrap(),
            ),
            calldata::Value::Address(
                Address::from_str("0x00000000000000000000000000000000000000aa").unwrap(),
            ),
            calldata::Value::Bytes(Bytes::from(vec![0x12, 0x34, 0x12, 0x34])),
            calldata::Value::Uint(U256::from(nonce)),
        ],
    )
    .unwrap()
}

fn selector_hex(signature: &str) -> String {
    format!("0x{}", hex::encode(&keccak(signature.as_bytes()).0[..4]))
}

fn bool_word(value: bool) -> Value {
    json!(format!(
        "0x{:064x}",
        if value { U256::one() } else { U256::zero() }
    ))
}

struct MockChain {
    logs: Vec<Value>,
    transactions: HashMap<String, Value>,
    account_proof: Value,
    inside_fraud_proof_window: AtomicBool,
    /// Message hashes the mock flips to successful, one per submission, in
    /// relay order.
    pending_success: Mutex<VecDeque<String>>,
    successful_messages: Mutex<HashSet<String>>,
    raw_transactions: Mutex<Vec<Vec<u8>>>,
    inside_window_selector: String,
    successful_selector: String,
}

impl MockChain {
    fn new() -> Self {
        let mut logs = Vec::new();
        let mut transactions = HashMap::new();

        // Two consecutive batches covering heights [0, 5) and [5, 12).
        for (batch_index, (seed, size, prev_total, l1_block)) in
            [(0x10u8, 5u64, 0u64, 10u64), (0x20, 7, 5, 11)].iter().enumerate()
        {
            let roots = batch_roots(*seed, *size);
            let root = batch_root(&roots).unwrap();
            let append_tx_hash = H256::repeat_byte(0xa1 + u8::try_from(batch_index).unwrap());

            let mut data = root.as_bytes().to_vec();
            data.extend_from_slice(&U256::from(*size).to_big_endian());
            data.extend_from_slice(&U256::from(*prev_total).to_big_endian());
            data.extend_from_slice(&U256::from(128).to_big_endian());
            data.extend_from_slice(&U256::zero().to_big_endian());

            logs.push(json!({
                "address": format!("{:#x}", scc_address()),
                "topics": [
                    format!("{:#x}", state_batch_appended_topic()),
                    format!("{:#x}", H256::from_low_u64_be(u64::try_from(batch_index).unwrap())),
                ],
                "data": format!("0x{}", hex::encode(&data)),
                "blockNumber": format!("{l1_block:#x}"),
                "transactionHash": format!("{append_tx_hash:#x}"),
                "logIndex": "0x0",
            }));

            let append_input = encode_calldata(
                "appendStateBatch(bytes32[],uint256)",
                &[
                    calldata::Value::Array(
                        roots
                            .iter()
                            .map(|r| calldata::Value::FixedBytes(Bytes::copy_from_slice(r.as_bytes())))
                            .collect(),
                    ),
                    calldata::Value::Uint(U256::from(*prev_total)),
                ],
            )
            .unwrap();
            transactions.insert(
                format!("{append_tx_hash:#x}"),
                json!({
                    "hash": format!("{append_tx_hash:#x}"),
                    "input": format!("0x{}", hex::encode(append_input)),
                    "to": format!("{:#x}", scc_address()),
                }),
            );
        }

        // Three sent messages; the one at height 12 is past both batches and
        // must never be relayed.
        for (nonce, l2_block) in [(0u64, 2u64), (1, 7), (2, 12)] {
            let payload = message_payload(nonce);
            let mut data = U256::from(32).to_big_endian().to_vec();
            data.extend_from_slice(&U256::from(payload.len()).to_big_endian());
            data.extend_from_slice(&payload);
            let padding = (32 - payload.len() % 32) % 32;
            data.extend(std::iter::repeat_n(0u8, padding));

            logs.push(json!({
                "address": format!("{:#x}", l2_messenger_address()),
                "topics": [format!("{:#x}", sent_message_topic())],
                "data": format!("0x{}", hex::encode(&data)),
                "blockNumber": format!("{l2_block:#x}"),
                "transactionHash": format!("{:#x}", H256::repeat_byte(0xb0 + u8::try_from(nonce).unwrap())),
                "logIndex": "0x0",
            }));
        }

        let account_proof = json!({
            "address": format!("{:#x}", message_passer_address()),
            "accountProof": ["0xf90211a0aa", "0xf871a0bb"],
            "balance": "0x0",
            "codeHash": format!("{:#x}", H256::repeat_byte(0xc0)),
            "nonce": "0x1",
            "storageHash": format!("{:#x}", H256::repeat_byte(0x57)),
            "storageProof": [
                { "key": "0x0", "value": "0x1", "proof": ["0xf8518080", "0x80"] }
            ],
        });

        Self {
            logs,
            transactions,
            account_proof,
            inside_fraud_proof_window: AtomicBool::new(false),
            pending_success: Mutex::new(VecDeque::new()),
            successful_messages: Mutex::new(HashSet::new()),
            raw_transactions: Mutex::new(Vec::new()),
            inside_window_selector: selector_hex(INSIDE_FRAUD_PROOF_WINDOW_SIGNATURE),
            successful_selector: selector_hex(SUCCESSFUL_MESSAGES_SIGNATURE),
        }
    }

    /// Message hashes in the order the relayer is expected to submit them.
    fn expect_relays(&self, hashes: &[H256]) {
        let mut pending = self.pending_success.lock().unwrap();
        for hash in hashes {
            pending.push_back(hex::encode(hash.as_bytes()));
        }
    }

    fn relay_count(&self) -> usize {
        self.raw_transactions.lock().unwrap().len()
    }

    fn handle(&self, method: &str, params: &Value) -> Value {
        match method {
            "eth_chainId" => json!("0x7a69"),
            "eth_blockNumber" => json!("0x64"),
            "eth_getLogs" => {
                let filter = &params[0];
                let from = parse_quantity(&filter["fromBlock"]);
                let to = parse_quantity(&filter["toBlock"]);
                let address = filter["address"].as_str().unwrap_or_default();
                let topic = filter["topics"][0].as_str().unwrap_or_default();

                let matching: Vec<Value> = self
                    .logs
                    .iter()
                    .filter(|log| {
                        log["address"] == address
                            && log["topics"][0] == topic
                            && (from..=to).contains(&parse_quantity(&log["blockNumber"]))
                    })
                    .cloned()
                    .collect();
                json!(matching)
            }
            "eth_getTransactionByHash" => {
                let hash = params[0].as_str().unwrap_or_default();
                self.transactions.get(hash).cloned().unwrap_or(Value::Null)
            }
            "eth_call" => {
                let input = params[0]["input"].as_str().unwrap_or_default();
                if input.starts_with(&self.inside_window_selector) {
                    bool_word(self.inside_fraud_proof_window.load(Ordering::SeqCst))
                } else if input.starts_with(&self.successful_selector) {
                    let argument = input.get(10..74).unwrap_or_default();
                    bool_word(self.successful_messages.lock().unwrap().contains(argument))
                } else {
                    json!("0x")
                }
            }
            "eth_getProof" => self.account_proof.clone(),
            "eth_getTransactionCount" => {
                json!(format!("{:#x}", self.relay_count()))
            }
            "eth_gasPrice" | "eth_maxPriorityFeePerGas" => json!("0x3b9aca00"),
            "eth_sendRawTransaction" => {
                let raw = params[0].as_str().unwrap_or_default();
                let raw = hex::decode(raw.trim_start_matches("0x")).unwrap();
                let tx_hash = keccak(&raw);
                self.raw_transactions.lock().unwrap().push(raw);
                if let Some(hash) = self.pending_success.lock().unwrap().pop_front() {
                    self.successful_messages.lock().unwrap().insert(hash);
                }
                json!(format!("{tx_hash:#x}"))
            }
            "eth_getTransactionReceipt" => json!({
                "transactionHash": params[0],
                "blockNumber": "0x65",
                "status": "0x1",
                "gasUsed": "0x5208",
            }),
            _ => Value::Null,
        }
    }
}

fn parse_quantity(value: &Value) -> u64 {
    u64::from_str_radix(
        value.as_str().unwrap_or_default().trim_start_matches("0x"),
        16,
    )
    .unwrap_or_default()
}

async fn rpc_handler(
    State(chain): State<Arc<MockChain>>,
    Json(request): Json<Value>,
) -> Json<Value> {
    let method = request["method"].as_str().unwrap_or_default();
    let result = chain.handle(method, &request["params"]);
    Json(json!({
        "id": request["id"],
        "jsonrpc": "2.0",
        "result": result,
    }))
}

async fn spawn_chain() -> (Arc<MockChain>, String) {
    let chain = Arc::new(MockChain::new());
    let app = Router::new()
        .route("/", post(rpc_handler))
        .with_state(chain.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (chain, url)
}

fn relayer_config(url: &str, starting_height: u64) -> RelayerConfig {
    RelayerConfig {
        l1_rpc_url: url.to_string(),
        l2_rpc_url: url.to_string(),
        state_commitment_chain_address: scc_address(),
        l1_cross_domain_messenger_address: l1_messenger_address(),
        l2_cross_domain_messenger_address: l2_messenger_address(),
        l2_to_l1_message_passer_address: message_passer_address(),
        relay_signer: Signer::from_hex(
            "0x0000000000000000000000000000000000000000000000000000000000000001",
        )
        .unwrap(),
        l2_chain_starting_height: starting_height,
        polling_interval_ms: 50,
        block_offset: 0,
    }
}

fn expected_messages() -> Vec<SentMessage> {
    [(0u64, 2u64), (1, 7)]
        .iter()
        .map(|(nonce, height)| SentMessage::decode(&message_payload(*nonce), *height).unwrap())
        .collect()
}

#[tokio::test]
async fn batch_index_resolves_covering_batches() {
    let (chain, url) = spawn_chain().await;
    let index = BatchIndex::new(EthClient::new(&url).unwrap(), scc_address());

    let header = index.get_state_batch_header(6).await.unwrap().unwrap();
    assert_eq!(header.batch_index, U256::from(1));
    assert_eq!(header.prev_total_elements, U256::from(5));
    assert_eq!(header.batch_size, U256::from(7));
    assert_eq!(header.state_roots, batch_roots(0x20, 7));
    assert_eq!(header.batch_root, batch_root(&header.state_roots).unwrap());

    // Heights past the last appended batch are not covered.
    assert!(index.get_state_batch_header(12).await.unwrap().is_none());
    assert!(!index.is_transaction_finalized(12).await.unwrap());

    // Finalization follows the fraud-proof window predicate.
    assert!(index.is_transaction_finalized(3).await.unwrap());
    chain
        .inside_fraud_proof_window
        .store(true, Ordering::SeqCst);
    assert!(!index.is_transaction_finalized(3).await.unwrap());
}

#[tokio::test]
async fn scanner_applies_the_block_offset() {
    let (_chain, url) = spawn_chain().await;

    let scanner = MessageScanner::new(EthClient::new(&url).unwrap(), l2_messenger_address(), 0);
    let messages = scanner.get_sent_messages(0, 11).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].height, 2);
    assert_eq!(messages[0].nonce, U256::zero());
    assert_eq!(messages[1].height, 7);
    assert_eq!(messages[1].nonce, U256::one());

    // With an offset, event block numbers map back to element heights.
    let offset_scanner =
        MessageScanner::new(EthClient::new(&url).unwrap(), l2_messenger_address(), 2);
    let messages = offset_scanner.get_sent_messages(0, 0).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].height, 0);
    assert_eq!(messages[0].nonce, U256::zero());
}

#[tokio::test]
async fn proof_builder_assembles_a_consistent_proof() {
    let (_chain, url) = spawn_chain().await;
    let l2_client = EthClient::new(&url).unwrap();
    let index = BatchIndex::new(EthClient::new(&url).unwrap(), scc_address());
    let builder = ProofBuilder::new(
        l2_client,
        index,
        l2_messenger_address(),
        message_passer_address(),
        0,
    );

    let messages = expected_messages();
    let proof = builder.get_message_proof(&messages[0]).await.unwrap();

    let roots = batch_roots(0x10, 5);
    assert_eq!(proof.state_root, roots[2]);
    assert_eq!(proof.state_root_proof.index, 2);
    assert!(verify_batch_proof(
        proof.state_root,
        2,
        &proof.state_root_proof.siblings,
        proof.state_root_batch_header.batch_root,
    ));

    // Witnesses are RLP lists of the node bytes the L2 node returned.
    let account_nodes = rlp::Rlp::new(&proof.state_trie_witness);
    assert_eq!(account_nodes.item_count().unwrap(), 2);
    assert_eq!(
        account_nodes.val_at::<Vec<u8>>(0).unwrap(),
        hex::decode("f90211a0aa").unwrap()
    );
    let storage_nodes = rlp::Rlp::new(&proof.storage_trie_witness);
    assert_eq!(storage_nodes.item_count().unwrap(), 2);
}

#[tokio::test]
async fn relayer_relays_finalized_messages_exactly_once() {
    let (chain, url) = spawn_chain().await;
    let messages = expected_messages();
    chain.expect_relays(&[messages[0].hash, messages[1].hash]);

    // While the batches are still inside the fraud-proof window, a tick is
    // a no-op.
    chain
        .inside_fraud_proof_window
        .store(true, Ordering::SeqCst);
    let mut relayer = MessageRelayer::new(relayer_config(&url, 0)).await.unwrap();
    relayer.tick().await.unwrap();
    assert_eq!(relayer.cursor(), (0, 0));
    assert_eq!(chain.relay_count(), 0);

    // Once finalized, one tick jumps the cursor over both batches and
    // relays both covered messages; the height-12 message stays untouched.
    chain
        .inside_fraud_proof_window
        .store(false, Ordering::SeqCst);
    relayer.tick().await.unwrap();
    assert_eq!(relayer.cursor(), (0, 12));
    assert_eq!(chain.relay_count(), 2);

    // Nothing new finalized: the next tick changes nothing.
    relayer.tick().await.unwrap();
    assert_eq!(relayer.cursor(), (0, 12));
    assert_eq!(chain.relay_count(), 2);

    // The submitted transaction is a typed EIP-1559 relayMessage call to
    // the L1 messenger with the fixed gas limit.
    let raw_transactions = chain.raw_transactions.lock().unwrap().clone();
    let first = &raw_transactions[0];
    assert_eq!(first[0], 0x02);
    let fields = rlp::Rlp::new(&first[1..]);
    assert_eq!(fields.val_at::<u64>(4).unwrap(), RELAY_MESSAGE_GAS_LIMIT);
    assert_eq!(fields.val_at::<Address>(5).unwrap(), l1_messenger_address());
    let calldata = fields.val_at::<Vec<u8>>(7).unwrap();
    assert!(
        hex::encode(&calldata).starts_with(selector_hex(RELAY_MESSAGE_SIGNATURE).trim_start_matches("0x"))
    );
}

#[tokio::test]
async fn restarted_relayer_skips_already_relayed_messages() {
    let (chain, url) = spawn_chain().await;
    let messages = expected_messages();
    chain.expect_relays(&[messages[0].hash, messages[1].hash]);

    let mut relayer = MessageRelayer::new(relayer_config(&url, 0)).await.unwrap();
    relayer.tick().await.unwrap();
    assert_eq!(chain.relay_count(), 2);

    // A restart replays from height zero; the dedup check absorbs the
    // rescan without emitting new transactions.
    let mut restarted = MessageRelayer::new(relayer_config(&url, 0)).await.unwrap();
    restarted.tick().await.unwrap();
    assert_eq!(restarted.cursor(), (0, 12));
    assert_eq!(chain.relay_count(), 2);
}

#[tokio::test]
async fn stop_signal_ends_the_run_loop() {
    let (_chain, url) = spawn_chain().await;
    let relayer = MessageRelayer::new(relayer_config(&url, 0)).await.unwrap();

    let (stop_sender, stop_receiver) = watch::channel(false);
    let handle = tokio::spawn(relayer.run(stop_receiver));

    stop_sender.send(true).unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("relayer did not observe the stop signal")
        .unwrap();
}
