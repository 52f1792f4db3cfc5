use ethereum_types::Address;
use relayex_rpc::signer::Signer;

/// Runtime configuration of the message relayer. Contract addresses are
/// supplied by the operator; nothing is discovered on-chain.
#[derive(Clone, Debug)]
pub struct RelayerConfig {
    pub l1_rpc_url: String,
    pub l2_rpc_url: String,
    pub state_commitment_chain_address: Address,
    pub l1_cross_domain_messenger_address: Address,
    pub l2_cross_domain_messenger_address: Address,
    pub l2_to_l1_message_passer_address: Address,
    pub relay_signer: Signer,
    /// First L2 height the finalization cursor starts from.
    pub l2_chain_starting_height: u64,
    /// Milliseconds between relay ticks.
    pub polling_interval_ms: u64,
    /// Offset between L2 event block numbers and state-commitment element
    /// indices (the L2 genesis offset).
    pub block_offset: u64,
}
