//! The instruction set.
//!
//! Each instruction has a stable opcode, a canonical encoding (bytecode is
//! content: contracts are stored and hashed by it), and a declared gas
//! cost. Branch offsets are relative to the instruction following the
//! branch and limited to ±0xff; the compiler rejects wider jumps.

use crate::gas::{GAS_BALANCE, GAS_BASE, GAS_CALL, GAS_HASH, GAS_LOAD_CONTRACT, GAS_VERIFY};
use flow_types::{put_bytes, Codec, CodecError, CodecResult, Hash, Reader, I256, U256};

/// Largest branch offset magnitude.
pub const MAX_BRANCH_OFFSET: i32 = 0xff;

/// One VM instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instr {
    // constants
    ConstTrue,
    ConstFalse,
    I256Const(I256),
    U256Const(U256),
    BytesConst(Vec<u8>),
    AddressConst(Hash),

    // locals, fields, plain stack
    LoadLocal(u16),
    StoreLocal(u16),
    LoadField(u16),
    StoreField(u16),
    Pop,
    Dup,

    // booleans
    BoolNot,
    BoolAnd,
    BoolOr,

    // signed arithmetic & comparisons
    I256Add,
    I256Sub,
    I256Mul,
    I256Div,
    I256Mod,
    I256Neg,
    I256Lt,
    I256Le,
    I256Gt,
    I256Ge,

    // unsigned arithmetic & comparisons
    U256Add,
    U256Sub,
    U256Mul,
    U256Div,
    U256Mod,
    U256Lt,
    U256Le,
    U256Gt,
    U256Ge,

    // generic equality
    Eq,
    Neq,

    // byte vectors
    ByteVecConcat,
    ByteVecSize,

    // control flow; offsets relative to the next instruction
    Jump(i32),
    IfTrue(i32),
    IfFalse(i32),

    // calls
    CallLocal(u16),
    CallExternal(u16),
    Return,

    // crypto & context
    Blake2b,
    Keccak256,
    VerifyTxSignature,
    TxId,

    // event hook; carries the field count, produces no state change
    Log(u8),

    // balances
    ApproveAlph,
    ApproveToken,
    TransferAlph,
    TransferToken,
    AlphRemaining,
    TokenRemaining,
}

impl Instr {
    /// Declared gas cost, charged before execution.
    pub fn gas(&self) -> u64 {
        match self {
            Instr::CallLocal(_) => GAS_CALL,
            Instr::CallExternal(_) => GAS_CALL + GAS_LOAD_CONTRACT,
            Instr::Blake2b | Instr::Keccak256 => GAS_HASH,
            Instr::VerifyTxSignature => GAS_VERIFY,
            Instr::ApproveAlph
            | Instr::ApproveToken
            | Instr::TransferAlph
            | Instr::TransferToken
            | Instr::AlphRemaining
            | Instr::TokenRemaining => GAS_BALANCE,
            _ => GAS_BASE,
        }
    }
}

const OP_CONST_TRUE: u8 = 0x00;
const OP_CONST_FALSE: u8 = 0x01;
const OP_I256_CONST: u8 = 0x02;
const OP_U256_CONST: u8 = 0x03;
const OP_BYTES_CONST: u8 = 0x04;
const OP_ADDRESS_CONST: u8 = 0x05;
const OP_LOAD_LOCAL: u8 = 0x10;
const OP_STORE_LOCAL: u8 = 0x11;
const OP_LOAD_FIELD: u8 = 0x12;
const OP_STORE_FIELD: u8 = 0x13;
const OP_POP: u8 = 0x14;
const OP_DUP: u8 = 0x15;
const OP_BOOL_NOT: u8 = 0x20;
const OP_BOOL_AND: u8 = 0x21;
const OP_BOOL_OR: u8 = 0x22;
const OP_I256_ADD: u8 = 0x30;
const OP_I256_SUB: u8 = 0x31;
const OP_I256_MUL: u8 = 0x32;
const OP_I256_DIV: u8 = 0x33;
const OP_I256_MOD: u8 = 0x34;
const OP_I256_NEG: u8 = 0x35;
const OP_I256_LT: u8 = 0x36;
const OP_I256_LE: u8 = 0x37;
const OP_I256_GT: u8 = 0x38;
const OP_I256_GE: u8 = 0x39;
const OP_U256_ADD: u8 = 0x40;
const OP_U256_SUB: u8 = 0x41;
const OP_U256_MUL: u8 = 0x42;
const OP_U256_DIV: u8 = 0x43;
const OP_U256_MOD: u8 = 0x44;
const OP_U256_LT: u8 = 0x45;
const OP_U256_LE: u8 = 0x46;
const OP_U256_GT: u8 = 0x47;
const OP_U256_GE: u8 = 0x48;
const OP_EQ: u8 = 0x4e;
const OP_NEQ: u8 = 0x4f;
const OP_BYTEVEC_CONCAT: u8 = 0x50;
const OP_BYTEVEC_SIZE: u8 = 0x51;
const OP_JUMP: u8 = 0x60;
const OP_IF_TRUE: u8 = 0x61;
const OP_IF_FALSE: u8 = 0x62;
const OP_CALL_LOCAL: u8 = 0x63;
const OP_CALL_EXTERNAL: u8 = 0x64;
const OP_RETURN: u8 = 0x65;
const OP_BLAKE2B: u8 = 0x70;
const OP_KECCAK256: u8 = 0x71;
const OP_VERIFY_TX_SIGNATURE: u8 = 0x72;
const OP_TX_ID: u8 = 0x73;
const OP_LOG: u8 = 0x74;
const OP_APPROVE_ALPH: u8 = 0x80;
const OP_APPROVE_TOKEN: u8 = 0x81;
const OP_TRANSFER_ALPH: u8 = 0x82;
const OP_TRANSFER_TOKEN: u8 = 0x83;
const OP_ALPH_REMAINING: u8 = 0x84;
const OP_TOKEN_REMAINING: u8 = 0x85;

fn put_offset(buf: &mut Vec<u8>, offset: i32) {
    buf.extend_from_slice(&(offset as i16).to_be_bytes());
}

fn take_offset(reader: &mut Reader<'_>) -> CodecResult<i32> {
    let bytes: [u8; 2] = reader.take(2)?.try_into().unwrap();
    let offset = i32::from(i16::from_be_bytes(bytes));
    if offset.abs() > MAX_BRANCH_OFFSET {
        return Err(CodecError::InvalidValue(format!(
            "branch offset {offset} out of range"
        )));
    }
    Ok(offset)
}

impl Codec for Instr {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        match self {
            Instr::ConstTrue => buf.push(OP_CONST_TRUE),
            Instr::ConstFalse => buf.push(OP_CONST_FALSE),
            Instr::I256Const(v) => {
                buf.push(OP_I256_CONST);
                v.encode_to(buf);
            }
            Instr::U256Const(v) => {
                buf.push(OP_U256_CONST);
                v.encode_to(buf);
            }
            Instr::BytesConst(v) => {
                buf.push(OP_BYTES_CONST);
                put_bytes(buf, v);
            }
            Instr::AddressConst(a) => {
                buf.push(OP_ADDRESS_CONST);
                a.encode_to(buf);
            }
            Instr::LoadLocal(i) => {
                buf.push(OP_LOAD_LOCAL);
                flow_types::put_u16(buf, *i);
            }
            Instr::StoreLocal(i) => {
                buf.push(OP_STORE_LOCAL);
                flow_types::put_u16(buf, *i);
            }
            Instr::LoadField(i) => {
                buf.push(OP_LOAD_FIELD);
                flow_types::put_u16(buf, *i);
            }
            Instr::StoreField(i) => {
                buf.push(OP_STORE_FIELD);
                flow_types::put_u16(buf, *i);
            }
            Instr::Pop => buf.push(OP_POP),
            Instr::Dup => buf.push(OP_DUP),
            Instr::BoolNot => buf.push(OP_BOOL_NOT),
            Instr::BoolAnd => buf.push(OP_BOOL_AND),
            Instr::BoolOr => buf.push(OP_BOOL_OR),
            Instr::I256Add => buf.push(OP_I256_ADD),
            Instr::I256Sub => buf.push(OP_I256_SUB),
            Instr::I256Mul => buf.push(OP_I256_MUL),
            Instr::I256Div => buf.push(OP_I256_DIV),
            Instr::I256Mod => buf.push(OP_I256_MOD),
            Instr::I256Neg => buf.push(OP_I256_NEG),
            Instr::I256Lt => buf.push(OP_I256_LT),
            Instr::I256Le => buf.push(OP_I256_LE),
            Instr::I256Gt => buf.push(OP_I256_GT),
            Instr::I256Ge => buf.push(OP_I256_GE),
            Instr::U256Add => buf.push(OP_U256_ADD),
            Instr::U256Sub => buf.push(OP_U256_SUB),
            Instr::U256Mul => buf.push(OP_U256_MUL),
            Instr::U256Div => buf.push(OP_U256_DIV),
            Instr::U256Mod => buf.push(OP_U256_MOD),
            Instr::U256Lt => buf.push(OP_U256_LT),
            Instr::U256Le => buf.push(OP_U256_LE),
            Instr::U256Gt => buf.push(OP_U256_GT),
            Instr::U256Ge => buf.push(OP_U256_GE),
            Instr::Eq => buf.push(OP_EQ),
            Instr::Neq => buf.push(OP_NEQ),
            Instr::ByteVecConcat => buf.push(OP_BYTEVEC_CONCAT),
            Instr::ByteVecSize => buf.push(OP_BYTEVEC_SIZE),
            Instr::Jump(offset) => {
                buf.push(OP_JUMP);
                put_offset(buf, *offset);
            }
            Instr::IfTrue(offset) => {
                buf.push(OP_IF_TRUE);
                put_offset(buf, *offset);
            }
            Instr::IfFalse(offset) => {
                buf.push(OP_IF_FALSE);
                put_offset(buf, *offset);
            }
            Instr::CallLocal(i) => {
                buf.push(OP_CALL_LOCAL);
                flow_types::put_u16(buf, *i);
            }
            Instr::CallExternal(i) => {
                buf.push(OP_CALL_EXTERNAL);
                flow_types::put_u16(buf, *i);
            }
            Instr::Return => buf.push(OP_RETURN),
            Instr::Blake2b => buf.push(OP_BLAKE2B),
            Instr::Keccak256 => buf.push(OP_KECCAK256),
            Instr::VerifyTxSignature => buf.push(OP_VERIFY_TX_SIGNATURE),
            Instr::TxId => buf.push(OP_TX_ID),
            Instr::Log(count) => {
                buf.push(OP_LOG);
                buf.push(*count);
            }
            Instr::ApproveAlph => buf.push(OP_APPROVE_ALPH),
            Instr::ApproveToken => buf.push(OP_APPROVE_TOKEN),
            Instr::TransferAlph => buf.push(OP_TRANSFER_ALPH),
            Instr::TransferToken => buf.push(OP_TRANSFER_TOKEN),
            Instr::AlphRemaining => buf.push(OP_ALPH_REMAINING),
            Instr::TokenRemaining => buf.push(OP_TOKEN_REMAINING),
        }
    }

    fn decode(reader: &mut Reader<'_>) -> CodecResult<Self> {
        Ok(match reader.take_u8()? {
            OP_CONST_TRUE => Instr::ConstTrue,
            OP_CONST_FALSE => Instr::ConstFalse,
            OP_I256_CONST => Instr::I256Const(I256::decode(reader)?),
            OP_U256_CONST => Instr::U256Const(U256::decode(reader)?),
            OP_BYTES_CONST => Instr::BytesConst(reader.take_bytes()?),
            OP_ADDRESS_CONST => Instr::AddressConst(Hash::decode(reader)?),
            OP_LOAD_LOCAL => Instr::LoadLocal(reader.take_u16()?),
            OP_STORE_LOCAL => Instr::StoreLocal(reader.take_u16()?),
            OP_LOAD_FIELD => Instr::LoadField(reader.take_u16()?),
            OP_STORE_FIELD => Instr::StoreField(reader.take_u16()?),
            OP_POP => Instr::Pop,
            OP_DUP => Instr::Dup,
            OP_BOOL_NOT => Instr::BoolNot,
            OP_BOOL_AND => Instr::BoolAnd,
            OP_BOOL_OR => Instr::BoolOr,
            OP_I256_ADD => Instr::I256Add,
            OP_I256_SUB => Instr::I256Sub,
            OP_I256_MUL => Instr::I256Mul,
            OP_I256_DIV => Instr::I256Div,
            OP_I256_MOD => Instr::I256Mod,
            OP_I256_NEG => Instr::I256Neg,
            OP_I256_LT => Instr::I256Lt,
            OP_I256_LE => Instr::I256Le,
            OP_I256_GT => Instr::I256Gt,
            OP_I256_GE => Instr::I256Ge,
            OP_U256_ADD => Instr::U256Add,
            OP_U256_SUB => Instr::U256Sub,
            OP_U256_MUL => Instr::U256Mul,
            OP_U256_DIV => Instr::U256Div,
            OP_U256_MOD => Instr::U256Mod,
            OP_U256_LT => Instr::U256Lt,
            OP_U256_LE => Instr::U256Le,
            OP_U256_GT => Instr::U256Gt,
            OP_U256_GE => Instr::U256Ge,
            OP_EQ => Instr::Eq,
            OP_NEQ => Instr::Neq,
            OP_BYTEVEC_CONCAT => Instr::ByteVecConcat,
            OP_BYTEVEC_SIZE => Instr::ByteVecSize,
            OP_JUMP => Instr::Jump(take_offset(reader)?),
            OP_IF_TRUE => Instr::IfTrue(take_offset(reader)?),
            OP_IF_FALSE => Instr::IfFalse(take_offset(reader)?),
            OP_CALL_LOCAL => Instr::CallLocal(reader.take_u16()?),
            OP_CALL_EXTERNAL => Instr::CallExternal(reader.take_u16()?),
            OP_RETURN => Instr::Return,
            OP_BLAKE2B => Instr::Blake2b,
            OP_KECCAK256 => Instr::Keccak256,
            OP_VERIFY_TX_SIGNATURE => Instr::VerifyTxSignature,
            OP_TX_ID => Instr::TxId,
            OP_LOG => Instr::Log(reader.take_u8()?),
            OP_APPROVE_ALPH => Instr::ApproveAlph,
            OP_APPROVE_TOKEN => Instr::ApproveToken,
            OP_TRANSFER_ALPH => Instr::TransferAlph,
            OP_TRANSFER_TOKEN => Instr::TransferToken,
            OP_ALPH_REMAINING => Instr::AlphRemaining,
            OP_TOKEN_REMAINING => Instr::TokenRemaining,
            other => return Err(CodecError::InvalidTag(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_every_shape() {
        let instrs = vec![
            Instr::ConstTrue,
            Instr::I256Const(I256::from_i64(-9)),
            Instr::U256Const(U256::from_u64(7)),
            Instr::BytesConst(vec![1, 2, 3]),
            Instr::AddressConst(Hash::hash_blake2b(b"a")),
            Instr::LoadLocal(3),
            Instr::StoreField(12),
            Instr::U256Add,
            Instr::Jump(-20),
            Instr::IfFalse(255),
            Instr::CallLocal(1),
            Instr::Return,
            Instr::Log(3),
            Instr::TransferAlph,
        ];
        let encoded = instrs.encode();
        assert_eq!(Vec::<Instr>::decode_all(&encoded).unwrap(), instrs);
    }

    #[test]
    fn test_offset_bound_enforced() {
        let mut buf = Vec::new();
        buf.push(OP_JUMP);
        buf.extend_from_slice(&(300i16).to_be_bytes());
        assert!(matches!(
            Instr::decode_all(&buf),
            Err(CodecError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_gas_table() {
        assert_eq!(Instr::Pop.gas(), GAS_BASE);
        assert_eq!(Instr::CallLocal(0).gas(), GAS_CALL);
        assert_eq!(Instr::Blake2b.gas(), GAS_HASH);
        assert_eq!(Instr::VerifyTxSignature.gas(), GAS_VERIFY);
        assert!(Instr::CallExternal(0).gas() > Instr::CallLocal(0).gas());
    }
}
