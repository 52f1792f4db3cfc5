use std::time::Duration;

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::{trace, warn};

use crate::errors::{
    CallError, EstimateGasError, EthClientError, GetBlockNumberError, GetChainIdError,
    GetGasPriceError, GetLogsError, GetMaxPriorityFeeError, GetNonceError, GetProofError,
    GetTransactionByHashError, GetTransactionReceiptError, SendRawTransactionError,
};
use crate::signer::{Signer, parse_signature};
use crate::transaction::Eip1559Transaction;
use crate::types::{BlockIdentifier, BlockTag, RpcLog, RpcProof, RpcReceipt, RpcTransaction};
use crate::utils::{RpcErrorResponse, RpcRequest, RpcSuccessResponse};

#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum RpcResponse {
    Success(RpcSuccessResponse),
    Error(RpcErrorResponse),
}

/// Thin typed client over one execution-layer JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct EthClient {
    client: Client,
    pub url: Url,
}

/// Optional transaction-field overrides for `build_eip1559_transaction`.
/// Anything left unset is filled from the network.
#[derive(Default, Clone, Debug)]
pub struct Overrides {
    pub value: Option<U256>,
    pub nonce: Option<u64>,
    pub chain_id: Option<u64>,
    pub gas_limit: Option<u64>,
    pub max_fee_per_gas: Option<u64>,
    pub max_priority_fee_per_gas: Option<u64>,
}

impl EthClient {
    pub fn new(url: &str) -> Result<EthClient, EthClientError> {
        let url = Url::parse(url).map_err(|_| EthClientError::ParseUrlError(url.to_string()))?;
        Ok(Self {
            client: Client::new(),
            url,
        })
    }

    pub async fn send_request(&self, request: RpcRequest) -> Result<RpcResponse, EthClientError> {
        trace!(endpoint = %self.url, method = %request.method, "Sending RPC request");

        self.client
            .post(self.url.as_str())
            .header("content-type", "application/json")
            .body(serde_json::to_string(&request).map_err(|error| {
                EthClientError::FailedToSerializeRequestBody(format!("{error}: {request:?}"))
            })?)
            .send()
            .await?
            .json::<RpcResponse>()
            .await
            .map_err(EthClientError::from)
    }

    pub async fn get_chain_id(&self) -> Result<U256, EthClientError> {
        let request = RpcRequest::new("eth_chainId", None);

        match self.send_request(request).await? {
            RpcResponse::Success(result) => serde_json::from_value(result.result)
                .map_err(GetChainIdError::SerdeJSONError)
                .map_err(EthClientError::from),
            RpcResponse::Error(error_response) => {
                Err(GetChainIdError::RPCError(error_response.error.message).into())
            }
        }
    }

    pub async fn get_block_number(&self) -> Result<u64, EthClientError> {
        let request = RpcRequest::new("eth_blockNumber", None);

        match self.send_request(request).await? {
            RpcResponse::Success(result) => {
                let number: U256 = serde_json::from_value(result.result)
                    .map_err(GetBlockNumberError::SerdeJSONError)?;
                number.try_into().map_err(|_| {
                    EthClientError::InternalError("Block number does not fit in u64".to_owned())
                })
            }
            RpcResponse::Error(error_response) => {
                Err(GetBlockNumberError::RPCError(error_response.error.message).into())
            }
        }
    }

    pub async fn get_logs(
        &self,
        from_block: u64,
        to_block: u64,
        address: Address,
        topics: Vec<H256>,
    ) -> Result<Vec<RpcLog>, EthClientError> {
        let params = Some(vec![json!({
            "fromBlock": format!("{from_block:#x}"),
            "toBlock": format!("{to_block:#x}"),
            "address": format!("{address:#x}"),
            "topics": topics.iter().map(|topic| format!("{topic:#x}")).collect::<Vec<_>>(),
        })]);
        let request = RpcRequest::new("eth_getLogs", params);

        match self.send_request(request).await? {
            RpcResponse::Success(result) => serde_json::from_value(result.result)
                .map_err(GetLogsError::SerdeJSONError)
                .map_err(EthClientError::from),
            RpcResponse::Error(error_response) => {
                Err(GetLogsError::RPCError(error_response.error.message).into())
            }
        }
    }

    pub async fn get_transaction_by_hash(
        &self,
        tx_hash: H256,
    ) -> Result<Option<RpcTransaction>, EthClientError> {
        let params = Some(vec![json!(format!("{tx_hash:#x}"))]);
        let request = RpcRequest::new("eth_getTransactionByHash", params);

        match self.send_request(request).await? {
            RpcResponse::Success(result) => serde_json::from_value(result.result)
                .map_err(GetTransactionByHashError::SerdeJSONError)
                .map_err(EthClientError::from),
            RpcResponse::Error(error_response) => {
                Err(GetTransactionByHashError::RPCError(error_response.error.message).into())
            }
        }
    }

    pub async fn get_transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> Result<Option<RpcReceipt>, EthClientError> {
        let params = Some(vec![json!(format!("{tx_hash:#x}"))]);
        let request = RpcRequest::new("eth_getTransactionReceipt", params);

        match self.send_request(request).await? {
            RpcResponse::Success(result) => serde_json::from_value(result.result)
                .map_err(GetTransactionReceiptError::SerdeJSONError)
                .map_err(EthClientError::from),
            RpcResponse::Error(error_response) => {
                Err(GetTransactionReceiptError::RPCError(error_response.error.message).into())
            }
        }
    }

    pub async fn wait_for_transaction_receipt(
        &self,
        tx_hash: H256,
        max_retries: u64,
    ) -> Result<RpcReceipt, EthClientError> {
        let mut receipt = self.get_transaction_receipt(tx_hash).await?;
        let mut retries = 0;
        while receipt.is_none() {
            retries += 1;
            if retries > max_retries {
                warn!("Transaction receipt for {tx_hash:#x} not found after {max_retries} retries");
                return Err(EthClientError::TimeoutError);
            }

            tokio::time::sleep(Duration::from_secs(2)).await;
            receipt = self.get_transaction_receipt(tx_hash).await?;
        }
        receipt.ok_or(EthClientError::InternalError(
            "Transaction receipt is None".to_owned(),
        ))
    }

    /// `eth_call` of already-encoded calldata; returns the raw hex-encoded
    /// return data.
    pub async fn call(
        &self,
        to: Address,
        calldata: Bytes,
        block: BlockIdentifier,
    ) -> Result<String, EthClientError> {
        let params = Some(vec![
            json!({
                "to": format!("{to:#x}"),
                "input": format!("0x{}", hex::encode(&calldata)),
            }),
            block.into(),
        ]);
        let request = RpcRequest::new("eth_call", params);

        match self.send_request(request).await? {
            RpcResponse::Success(result) => serde_json::from_value(result.result)
                .map_err(CallError::SerdeJSONError)
                .map_err(EthClientError::from),
            RpcResponse::Error(error_response) => {
                Err(CallError::RPCError(error_response.error.message).into())
            }
        }
    }

    /// `eth_call` of a view returning one boolean word.
    pub async fn call_bool(
        &self,
        to: Address,
        calldata: Bytes,
        block: BlockIdentifier,
    ) -> Result<bool, EthClientError> {
        let response = self.call(to, calldata, block).await?;
        let value = U256::from_str_radix(response.trim_start_matches("0x"), 16)
            .map_err(|_| EthClientError::Custom(format!("Non-numeric call response: {response}")))?;
        Ok(!value.is_zero())
    }

    pub async fn get_nonce(&self, address: Address) -> Result<u64, EthClientError> {
        let params = Some(vec![
            json!(format!("{address:#x}")),
            BlockIdentifier::Tag(BlockTag::Latest).into(),
        ]);
        let request = RpcRequest::new("eth_getTransactionCount", params);

        match self.send_request(request).await? {
            RpcResponse::Success(result) => {
                let hex_str: String = serde_json::from_value(result.result)
                    .map_err(GetNonceError::SerdeJSONError)?;
                u64::from_str_radix(hex_str.trim_start_matches("0x"), 16)
                    .map_err(GetNonceError::ParseIntError)
                    .map_err(EthClientError::from)
            }
            RpcResponse::Error(error_response) => {
                Err(GetNonceError::RPCError(error_response.error.message).into())
            }
        }
    }

    pub async fn get_gas_price(&self) -> Result<U256, EthClientError> {
        let request = RpcRequest::new("eth_gasPrice", None);

        match self.send_request(request).await? {
            RpcResponse::Success(result) => serde_json::from_value(result.result)
                .map_err(GetGasPriceError::SerdeJSONError)
                .map_err(EthClientError::from),
            RpcResponse::Error(error_response) => {
                Err(GetGasPriceError::RPCError(error_response.error.message).into())
            }
        }
    }

    pub async fn get_max_priority_fee(&self) -> Result<U256, EthClientError> {
        let request = RpcRequest::new("eth_maxPriorityFeePerGas", None);

        match self.send_request(request).await? {
            RpcResponse::Success(result) => serde_json::from_value(result.result)
                .map_err(GetMaxPriorityFeeError::SerdeJSONError)
                .map_err(EthClientError::from),
            RpcResponse::Error(error_response) => {
                Err(GetMaxPriorityFeeError::RPCError(error_response.error.message).into())
            }
        }
    }

    pub async fn estimate_gas(
        &self,
        to: Address,
        from: Address,
        calldata: Bytes,
    ) -> Result<u64, EthClientError> {
        let params = Some(vec![
            json!({
                "to": format!("{to:#x}"),
                "from": format!("{from:#x}"),
                "input": format!("0x{}", hex::encode(&calldata)),
            }),
            BlockIdentifier::Tag(BlockTag::Latest).into(),
        ]);
        let request = RpcRequest::new("eth_estimateGas", params);

        match self.send_request(request).await? {
            RpcResponse::Success(result) => {
                let hex_str: String = serde_json::from_value(result.result)
                    .map_err(EstimateGasError::SerdeJSONError)?;
                u64::from_str_radix(hex_str.trim_start_matches("0x"), 16)
                    .map_err(EstimateGasError::ParseIntError)
                    .map_err(EthClientError::from)
            }
            RpcResponse::Error(error_response) => {
                Err(EstimateGasError::RPCError(error_response.error.message).into())
            }
        }
    }

    pub async fn send_raw_transaction(&self, data: &[u8]) -> Result<H256, EthClientError> {
        let params = Some(vec![json!(format!("0x{}", hex::encode(data)))]);
        let request = RpcRequest::new("eth_sendRawTransaction", params);

        match self.send_request(request).await? {
            RpcResponse::Success(result) => serde_json::from_value(result.result)
                .map_err(SendRawTransactionError::SerdeJSONError)
                .map_err(EthClientError::from),
            RpcResponse::Error(error_response) => {
                Err(SendRawTransactionError::RPCError(error_response.error.message).into())
            }
        }
    }

    /// `eth_getProof`: Merkle-Patricia account proof for `address` plus a
    /// storage proof for every requested key, at the given block.
    pub async fn get_proof(
        &self,
        address: Address,
        storage_keys: &[H256],
        block: BlockIdentifier,
    ) -> Result<RpcProof, EthClientError> {
        let params = Some(vec![
            json!(format!("{address:#x}")),
            json!(
                storage_keys
                    .iter()
                    .map(|key| format!("{key:#x}"))
                    .collect::<Vec<_>>()
            ),
            block.into(),
        ]);
        let request = RpcRequest::new("eth_getProof", params);

        match self.send_request(request).await? {
            RpcResponse::Success(result) => serde_json::from_value(result.result)
                .map_err(GetProofError::SerdeJSONError)
                .map_err(EthClientError::from),
            RpcResponse::Error(error_response) => {
                Err(GetProofError::RPCError(error_response.error.message).into())
            }
        }
    }

    /// Builds an EIP-1559 transaction, filling chain id, nonce and fees from
    /// the network when not overridden and estimating gas when no limit is
    /// given.
    pub async fn build_eip1559_transaction(
        &self,
        to: Address,
        from: Address,
        calldata: Bytes,
        overrides: Overrides,
    ) -> Result<Eip1559Transaction, EthClientError> {
        let chain_id = match overrides.chain_id {
            Some(chain_id) => chain_id,
            None => self.get_chain_id().await?.try_into().map_err(|_| {
                EthClientError::InternalError("Chain id does not fit in u64".to_owned())
            })?,
        };
        let nonce = match overrides.nonce {
            Some(nonce) => nonce,
            None => self.get_nonce(from).await?,
        };
        let max_fee_per_gas = match overrides.max_fee_per_gas {
            Some(fee) => fee,
            None => self.get_gas_price().await?.try_into().map_err(|_| {
                EthClientError::InternalError("Gas price does not fit in u64".to_owned())
            })?,
        };
        let max_priority_fee_per_gas = match overrides.max_priority_fee_per_gas {
            Some(fee) => fee,
            None => self.get_max_priority_fee().await?.try_into().map_err(|_| {
                EthClientError::InternalError("Priority fee does not fit in u64".to_owned())
            })?,
        };
        let gas_limit = match overrides.gas_limit {
            Some(gas_limit) => gas_limit,
            None => self.estimate_gas(to, from, calldata.clone()).await?,
        };

        Ok(Eip1559Transaction {
            chain_id,
            nonce,
            max_priority_fee_per_gas,
            max_fee_per_gas,
            gas_limit,
            to,
            value: overrides.value.unwrap_or_default(),
            data: calldata,
            access_list: vec![],
            ..Default::default()
        })
    }

    /// Signs the transaction payload and submits the raw transaction.
    pub async fn send_eip1559_transaction(
        &self,
        tx: &Eip1559Transaction,
        signer: &Signer,
    ) -> Result<H256, EthClientError> {
        let mut tx = tx.clone();
        let signature = signer.sign(&tx.encode_payload())?;
        (tx.signature_r, tx.signature_s, tx.signature_y_parity) = parse_signature(&signature);

        self.send_raw_transaction(&tx.encode_signed()).await
    }
}
