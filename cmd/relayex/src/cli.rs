use std::str::FromStr;

use clap::Parser;
use ethereum_types::Address;
use relayex_relayer::RelayerConfig;
use relayex_rpc::signer::Signer;

pub const VERSION_STRING: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(
    name = "relayex",
    version = VERSION_STRING,
    about = "Relays finalized L2-to-L1 cross-domain messages"
)]
pub struct Options {
    #[arg(
        long = "l1-rpc-url",
        value_name = "URL",
        env = "RELAYEX_L1_RPC_URL",
        help = "L1 JSON-RPC endpoint",
        help_heading = "RPC options"
    )]
    pub l1_rpc_url: String,
    #[arg(
        long = "l2-rpc-url",
        value_name = "URL",
        env = "RELAYEX_L2_RPC_URL",
        help = "L2 JSON-RPC endpoint; must serve eth_getProof",
        help_heading = "RPC options"
    )]
    pub l2_rpc_url: String,
    #[arg(
        long = "state-commitment-chain",
        value_name = "ADDRESS",
        env = "RELAYEX_STATE_COMMITMENT_CHAIN",
        value_parser = parse_address,
        help = "Address of the state commitment chain on L1",
        help_heading = "Contract options"
    )]
    pub state_commitment_chain_address: Address,
    #[arg(
        long = "l1-cross-domain-messenger",
        value_name = "ADDRESS",
        env = "RELAYEX_L1_CROSS_DOMAIN_MESSENGER",
        value_parser = parse_address,
        help = "Address of the cross-domain messenger on L1",
        help_heading = "Contract options"
    )]
    pub l1_cross_domain_messenger_address: Address,
    #[arg(
        long = "l2-cross-domain-messenger",
        value_name = "ADDRESS",
        env = "RELAYEX_L2_CROSS_DOMAIN_MESSENGER",
        value_parser = parse_address,
        help = "Address of the cross-domain messenger on L2",
        help_heading = "Contract options"
    )]
    pub l2_cross_domain_messenger_address: Address,
    #[arg(
        long = "l2-to-l1-message-passer",
        value_name = "ADDRESS",
        env = "RELAYEX_L2_TO_L1_MESSAGE_PASSER",
        value_parser = parse_address,
        help = "Address of the L2-to-L1 message passer whose storage is proven",
        help_heading = "Contract options"
    )]
    pub l2_to_l1_message_passer_address: Address,
    #[arg(
        long = "relay-private-key",
        value_name = "PRIVATE_KEY",
        env = "RELAYEX_RELAY_PRIVATE_KEY",
        value_parser = parse_signer,
        help = "Private key of the L1 account that signs relay transactions",
        help_heading = "Relayer options"
    )]
    pub relay_signer: Signer,
    #[arg(
        long = "starting-height",
        value_name = "HEIGHT",
        env = "RELAYEX_STARTING_HEIGHT",
        default_value_t = 0,
        help = "L2 height the finalization cursor starts from",
        help_heading = "Relayer options"
    )]
    pub l2_chain_starting_height: u64,
    #[arg(
        long = "polling-interval-ms",
        value_name = "MILLISECONDS",
        env = "RELAYEX_POLLING_INTERVAL_MS",
        default_value_t = 5000,
        help = "Milliseconds between relay ticks",
        help_heading = "Relayer options"
    )]
    pub polling_interval_ms: u64,
    #[arg(
        long = "block-offset",
        value_name = "BLOCKS",
        env = "RELAYEX_BLOCK_OFFSET",
        default_value_t = 0,
        help = "Offset between L2 block numbers and state-commitment element indices",
        help_heading = "Relayer options"
    )]
    pub block_offset: u64,
}

impl Options {
    pub fn into_config(self) -> RelayerConfig {
        RelayerConfig {
            l1_rpc_url: self.l1_rpc_url,
            l2_rpc_url: self.l2_rpc_url,
            state_commitment_chain_address: self.state_commitment_chain_address,
            l1_cross_domain_messenger_address: self.l1_cross_domain_messenger_address,
            l2_cross_domain_messenger_address: self.l2_cross_domain_messenger_address,
            l2_to_l1_message_passer_address: self.l2_to_l1_message_passer_address,
            relay_signer: self.relay_signer,
            l2_chain_starting_height: self.l2_chain_starting_height,
            polling_interval_ms: self.polling_interval_ms,
            block_offset: self.block_offset,
        }
    }
}

fn parse_address(input: &str) -> Result<Address, String> {
    Address::from_str(input).map_err(|_| format!("Invalid address: {input}"))
}

fn parse_signer(input: &str) -> Result<Signer, String> {
    Signer::from_hex(input).map_err(|err| err.to_string())
}
