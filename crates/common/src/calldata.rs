use bytes::Bytes;
use ethereum_types::{Address, U256};
use keccak_hash::keccak;

#[derive(Debug, thiserror::Error)]
pub enum CalldataEncodeError {
    #[error("Failed to parse function signature: {0}")]
    ParseError(String),
    #[error("Wrong number of arguments provided for calldata: expected {expected}, got {got}")]
    WrongArgumentLength { expected: usize, got: usize },
    #[error("Fixed bytes value does not fit in a single word")]
    FixedBytesTooLong,
    #[error("Internal calldata encoding error. This is most likely a bug")]
    InternalError,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Value {
    Address(Address),
    Uint(U256),
    Int(U256),
    Bool(bool),
    Bytes(Bytes),
    String(String),
    Array(Vec<Value>),
    Tuple(Vec<Value>),
    FixedArray(Vec<Value>),
    FixedBytes(Bytes),
}

/// Builds the 4-byte-selector-prefixed calldata for `signature` applied to
/// `values`. The signature must use canonical types, e.g.
/// `relayMessage(address,address,bytes,uint256)`; tuple types are written
/// with parentheses and count as a single parameter.
pub fn encode_calldata(signature: &str, values: &[Value]) -> Result<Vec<u8>, CalldataEncodeError> {
    let (name, params) = parse_signature(signature)?;

    if params.len() != values.len() {
        return Err(CalldataEncodeError::WrongArgumentLength {
            expected: params.len(),
            got: values.len(),
        });
    }

    let mut calldata = compute_function_selector(&name, &params).to_vec();
    calldata.extend_from_slice(&encode_tuple(values)?);

    Ok(calldata)
}

fn parse_signature(signature: &str) -> Result<(String, Vec<String>), CalldataEncodeError> {
    let sig = signature.trim().trim_start_matches("function ");
    let (name, params) = sig
        .split_once('(')
        .ok_or_else(|| CalldataEncodeError::ParseError(signature.to_string()))?;
    let params = params
        .strip_suffix(')')
        .ok_or_else(|| CalldataEncodeError::ParseError(signature.to_string()))?;
    Ok((name.to_string(), split_params(params)))
}

/// Splits a parameter list on commas at parenthesis depth zero, so that a
/// tuple type stays one parameter. Parameter names, if present, are dropped.
fn split_params(params: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in params.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => out.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out.into_iter()
        .map(|param| {
            let param = param.trim();
            param
                .split_once(' ')
                .map(|(ty, _name)| ty.to_string())
                .unwrap_or_else(|| param.to_string())
        })
        .collect()
}

fn compute_function_selector(name: &str, params: &[String]) -> [u8; 4] {
    let normalized_signature = format!("{name}({})", params.join(","));
    let [b0, b1, b2, b3, ..] = keccak(normalized_signature.as_bytes()).0;
    [b0, b1, b2, b3]
}

/// Head/tail encoding of a tuple: static values and offsets to dynamic
/// values first, dynamic payloads appended in argument order. Offsets are
/// relative to the start of this tuple's encoding.
fn encode_tuple(values: &[Value]) -> Result<Vec<u8>, CalldataEncodeError> {
    let mut current_offset = 0;
    let mut current_dynamic_offset = 0;
    for value in values {
        current_dynamic_offset += head_size(value);
    }

    let mut ret = vec![0; current_dynamic_offset];

    for value in values {
        match value {
            Value::Address(address) => {
                write_word(&mut ret, address_to_word(*address), current_offset)?;
            }
            Value::Uint(number) | Value::Int(number) => {
                write_word(&mut ret, number.to_big_endian(), current_offset)?;
            }
            Value::Bool(boolean) => {
                write_word(
                    &mut ret,
                    U256::from(u8::from(*boolean)).to_big_endian(),
                    current_offset,
                )?;
            }
            Value::Bytes(bytes) => {
                write_word(
                    &mut ret,
                    U256::from(current_dynamic_offset).to_big_endian(),
                    current_offset,
                )?;

                let bytes_encoding = encode_bytes(bytes);
                ret.extend_from_slice(&bytes_encoding);
                current_dynamic_offset += bytes_encoding.len();
            }
            Value::String(string_value) => {
                write_word(
                    &mut ret,
                    U256::from(current_dynamic_offset).to_big_endian(),
                    current_offset,
                )?;

                let bytes_encoding = encode_bytes(string_value.as_bytes());
                ret.extend_from_slice(&bytes_encoding);
                current_dynamic_offset += bytes_encoding.len();
            }
            Value::Array(array_values) => {
                write_word(
                    &mut ret,
                    U256::from(current_dynamic_offset).to_big_endian(),
                    current_offset,
                )?;

                let array_encoding = encode_array(array_values)?;
                ret.extend_from_slice(&array_encoding);
                current_dynamic_offset += array_encoding.len();
            }
            Value::Tuple(inner_values) | Value::FixedArray(inner_values) => {
                let inner_encoding = encode_tuple(inner_values)?;
                if is_dynamic(value) {
                    write_word(
                        &mut ret,
                        U256::from(current_dynamic_offset).to_big_endian(),
                        current_offset,
                    )?;
                    ret.extend_from_slice(&inner_encoding);
                    current_dynamic_offset += inner_encoding.len();
                } else {
                    copy_into(&mut ret, &inner_encoding, current_offset)?;
                }
            }
            Value::FixedBytes(bytes) => {
                if bytes.len() > 32 {
                    return Err(CalldataEncodeError::FixedBytesTooLong);
                }
                let mut word = [0u8; 32];
                word.get_mut(..bytes.len())
                    .ok_or(CalldataEncodeError::InternalError)?
                    .copy_from_slice(bytes);
                write_word(&mut ret, word, current_offset)?;
            }
        }

        current_offset += head_size(value);
    }

    Ok(ret)
}

/// Size a value occupies in the head of its enclosing tuple.
fn head_size(value: &Value) -> usize {
    match value {
        Value::Tuple(inner_values) | Value::FixedArray(inner_values) => {
            if is_dynamic(value) {
                32
            } else {
                inner_values.iter().map(head_size).sum()
            }
        }
        _ => 32,
    }
}

fn is_dynamic(value: &Value) -> bool {
    match value {
        Value::Bytes(_) | Value::String(_) | Value::Array(_) => true,
        Value::Tuple(inner_values) => inner_values.iter().any(is_dynamic),
        Value::FixedArray(inner_values) => inner_values.first().is_some_and(is_dynamic),
        _ => false,
    }
}

fn encode_array(values: &[Value]) -> Result<Vec<u8>, CalldataEncodeError> {
    let mut ret = U256::from(values.len()).to_big_endian().to_vec();
    ret.extend_from_slice(&encode_tuple(values)?);
    Ok(ret)
}

fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut ret = U256::from(bytes.len()).to_big_endian().to_vec();
    ret.extend_from_slice(bytes);
    // Right-pad the payload to a whole word.
    let remainder = bytes.len() % 32;
    if remainder != 0 {
        ret.extend(std::iter::repeat_n(0, 32 - remainder));
    }
    ret
}

fn write_word(
    buffer: &mut [u8],
    word: [u8; 32],
    offset: usize,
) -> Result<(), CalldataEncodeError> {
    copy_into(buffer, &word, offset)
}

fn copy_into(
    buffer: &mut [u8],
    to_copy: &[u8],
    offset: usize,
) -> Result<(), CalldataEncodeError> {
    let end = offset
        .checked_add(to_copy.len())
        .ok_or(CalldataEncodeError::InternalError)?;
    buffer
        .get_mut(offset..end)
        .ok_or(CalldataEncodeError::InternalError)?
        .copy_from_slice(to_copy);
    Ok(())
}

fn address_to_word(address: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    for (word_byte, address_byte) in word.iter_mut().skip(12).zip(address.as_bytes().iter()) {
        *word_byte = *address_byte;
    }
    word
}

/// Reads a 32-byte ABI word as a `usize`, used by the calldata decoders.
pub(crate) fn usize_word(word: &[u8]) -> Option<usize> {
    let value: u64 = U256::from_big_endian(word).try_into().ok()?;
    usize::try_from(value).ok()
}
