use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use rlp::RlpStream;

pub const EIP1559_TX_TYPE: u8 = 0x02;

/// EIP-1559 dynamic-fee transaction, the only type this service submits.
#[derive(Clone, Debug, Default)]
pub struct Eip1559Transaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: u64,
    pub max_fee_per_gas: u64,
    pub gas_limit: u64,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub access_list: Vec<(Address, Vec<H256>)>,
    pub signature_y_parity: bool,
    pub signature_r: U256,
    pub signature_s: U256,
}

impl Eip1559Transaction {
    /// Type-prefixed RLP payload the signature is computed over.
    pub fn encode_payload(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(9);
        self.append_unsigned_fields(&mut stream);

        let mut payload = vec![EIP1559_TX_TYPE];
        payload.extend_from_slice(&stream.out());
        payload
    }

    /// Type-prefixed RLP encoding of the signed transaction, ready for
    /// `eth_sendRawTransaction`.
    pub fn encode_signed(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(12);
        self.append_unsigned_fields(&mut stream);
        stream.append(&u8::from(self.signature_y_parity));
        stream.append(&self.signature_r);
        stream.append(&self.signature_s);

        let mut encoded = vec![EIP1559_TX_TYPE];
        encoded.extend_from_slice(&stream.out());
        encoded
    }

    fn append_unsigned_fields(&self, stream: &mut RlpStream) {
        stream.append(&self.chain_id);
        stream.append(&self.nonce);
        stream.append(&self.max_priority_fee_per_gas);
        stream.append(&self.max_fee_per_gas);
        stream.append(&self.gas_limit);
        stream.append(&self.to);
        stream.append(&self.value);
        stream.append(&self.data.to_vec());
        stream.begin_list(self.access_list.len());
        for (address, storage_keys) in &self.access_list {
            stream.begin_list(2);
            stream.append(address);
            stream.append_list(storage_keys);
        }
    }
}
