mod client;
pub mod errors;
pub mod serde_utils;
pub mod signer;
pub mod transaction;
pub mod types;
pub mod utils;

pub use client::{EthClient, Overrides, RpcResponse};
