pub mod batch_index;
pub mod configs;
pub mod errors;
pub mod message_scanner;
pub mod proof_builder;
pub mod relayer;
pub mod utils;

pub use configs::RelayerConfig;
pub use relayer::{MessageRelayer, start_message_relayer};
