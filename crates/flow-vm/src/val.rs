//! VM values.

use crate::error::{ExeResult, ExecutionError};
use flow_types::{put_bytes, Codec, CodecError, CodecResult, Hash, Reader, I256, U256};
use std::fmt;

/// The tagged value union of the VM.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Val {
    Bool(bool),
    I256(I256),
    U256(U256),
    ByteVec(Vec<u8>),
    Address(Hash),
}

/// Static types of [`Val`], used by field schemas and the compiler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValType {
    Bool,
    I256,
    U256,
    ByteVec,
    Address,
}

impl Val {
    pub fn type_of(&self) -> ValType {
        match self {
            Val::Bool(_) => ValType::Bool,
            Val::I256(_) => ValType::I256,
            Val::U256(_) => ValType::U256,
            Val::ByteVec(_) => ValType::ByteVec,
            Val::Address(_) => ValType::Address,
        }
    }

    /// The zero value of a type, used to initialize locals.
    pub fn default_of(val_type: ValType) -> Val {
        match val_type {
            ValType::Bool => Val::Bool(false),
            ValType::I256 => Val::I256(I256::zero()),
            ValType::U256 => Val::U256(U256::zero()),
            ValType::ByteVec => Val::ByteVec(Vec::new()),
            ValType::Address => Val::Address(Hash::zero()),
        }
    }

    pub fn into_bool(self) -> ExeResult<bool> {
        match self {
            Val::Bool(b) => Ok(b),
            _ => Err(ExecutionError::InvalidType { expected: "Bool" }),
        }
    }

    pub fn into_i256(self) -> ExeResult<I256> {
        match self {
            Val::I256(v) => Ok(v),
            _ => Err(ExecutionError::InvalidType { expected: "I256" }),
        }
    }

    pub fn into_u256(self) -> ExeResult<U256> {
        match self {
            Val::U256(v) => Ok(v),
            _ => Err(ExecutionError::InvalidType { expected: "U256" }),
        }
    }

    pub fn into_bytes(self) -> ExeResult<Vec<u8>> {
        match self {
            Val::ByteVec(v) => Ok(v),
            _ => Err(ExecutionError::InvalidType { expected: "ByteVec" }),
        }
    }

    pub fn into_address(self) -> ExeResult<Hash> {
        match self {
            Val::Address(a) => Ok(a),
            _ => Err(ExecutionError::InvalidType { expected: "Address" }),
        }
    }
}

impl fmt::Display for ValType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValType::Bool => "Bool",
            ValType::I256 => "I256",
            ValType::U256 => "U256",
            ValType::ByteVec => "ByteVec",
            ValType::Address => "Address",
        };
        write!(f, "{name}")
    }
}

const TAG_BOOL: u8 = 0;
const TAG_I256: u8 = 1;
const TAG_U256: u8 = 2;
const TAG_BYTEVEC: u8 = 3;
const TAG_ADDRESS: u8 = 4;

impl Codec for Val {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        match self {
            Val::Bool(b) => {
                buf.push(TAG_BOOL);
                b.encode_to(buf);
            }
            Val::I256(v) => {
                buf.push(TAG_I256);
                v.encode_to(buf);
            }
            Val::U256(v) => {
                buf.push(TAG_U256);
                v.encode_to(buf);
            }
            Val::ByteVec(v) => {
                buf.push(TAG_BYTEVEC);
                put_bytes(buf, v);
            }
            Val::Address(a) => {
                buf.push(TAG_ADDRESS);
                a.encode_to(buf);
            }
        }
    }

    fn decode(reader: &mut Reader<'_>) -> CodecResult<Self> {
        match reader.take_u8()? {
            TAG_BOOL => Ok(Val::Bool(bool::decode(reader)?)),
            TAG_I256 => Ok(Val::I256(I256::decode(reader)?)),
            TAG_U256 => Ok(Val::U256(U256::decode(reader)?)),
            TAG_BYTEVEC => Ok(Val::ByteVec(reader.take_bytes()?)),
            TAG_ADDRESS => Ok(Val::Address(Hash::decode(reader)?)),
            other => Err(CodecError::InvalidTag(other)),
        }
    }
}

impl Codec for ValType {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        let tag = match self {
            ValType::Bool => TAG_BOOL,
            ValType::I256 => TAG_I256,
            ValType::U256 => TAG_U256,
            ValType::ByteVec => TAG_BYTEVEC,
            ValType::Address => TAG_ADDRESS,
        };
        buf.push(tag);
    }

    fn decode(reader: &mut Reader<'_>) -> CodecResult<Self> {
        match reader.take_u8()? {
            TAG_BOOL => Ok(ValType::Bool),
            TAG_I256 => Ok(ValType::I256),
            TAG_U256 => Ok(ValType::U256),
            TAG_BYTEVEC => Ok(ValType::ByteVec),
            TAG_ADDRESS => Ok(ValType::Address),
            other => Err(CodecError::InvalidTag(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mismatch() {
        assert!(Val::Bool(true).into_u256().is_err());
        assert!(Val::U256(U256::one()).into_bool().is_err());
    }

    #[test]
    fn test_roundtrip() {
        let values = vec![
            Val::Bool(true),
            Val::I256(I256::from_i64(-5)),
            Val::U256(U256::from_u64(42)),
            Val::ByteVec(vec![1, 2, 3]),
            Val::Address(Hash::hash_blake2b(b"addr")),
        ];
        for val in values {
            let encoded = val.encode();
            assert_eq!(Val::decode_all(&encoded).unwrap(), val);
        }
    }

    #[test]
    fn test_defaults_match_types() {
        for t in [
            ValType::Bool,
            ValType::I256,
            ValType::U256,
            ValType::ByteVec,
            ValType::Address,
        ] {
            assert_eq!(Val::default_of(t).type_of(), t);
        }
    }
}
