//! Methods, scripts, contracts, and the loaded-object representation.

use crate::error::{ExeResult, ExecutionError};
use crate::instr::Instr;
use crate::val::{Val, ValType};
use flow_types::{Codec, CodecResult, Hash, Reader};
use std::sync::Arc;

/// One method of a script or contract. All lengths count flattened slots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Method {
    pub is_public: bool,
    pub is_payable: bool,
    pub args_len: u16,
    pub locals_len: u16,
    pub return_len: u16,
    pub instrs: Vec<Instr>,
}

impl Codec for Method {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.is_public.encode_to(buf);
        self.is_payable.encode_to(buf);
        flow_types::put_u16(buf, self.args_len);
        flow_types::put_u16(buf, self.locals_len);
        flow_types::put_u16(buf, self.return_len);
        self.instrs.encode_to(buf);
    }

    fn decode(reader: &mut Reader<'_>) -> CodecResult<Self> {
        Ok(Self {
            is_public: bool::decode(reader)?,
            is_payable: bool::decode(reader)?,
            args_len: reader.take_u16()?,
            locals_len: reader.take_u16()?,
            return_len: reader.take_u16()?,
            instrs: Vec::decode(reader)?,
        })
    }
}

/// A stateless script: methods only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Script {
    pub methods: Vec<Method>,
}

impl Codec for Script {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.methods.encode_to(buf);
    }

    fn decode(reader: &mut Reader<'_>) -> CodecResult<Self> {
        Ok(Self {
            methods: Vec::decode(reader)?,
        })
    }
}

/// A stateful contract: persistent field schema plus methods.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contract {
    pub field_types: Vec<ValType>,
    pub methods: Vec<Method>,
}

impl Contract {
    /// Hash of the canonical bytecode; identifies the code independent of
    /// the fields.
    pub fn code_hash(&self) -> Hash {
        Hash::hash_blake2b(&self.encode())
    }
}

impl Codec for Contract {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.field_types.encode_to(buf);
        self.methods.encode_to(buf);
    }

    fn decode(reader: &mut Reader<'_>) -> CodecResult<Self> {
        Ok(Self {
            field_types: Vec::decode(reader)?,
            methods: Vec::decode(reader)?,
        })
    }
}

/// The world-state key a contract lives under.
pub fn contract_key(address: &Hash) -> Hash {
    *address
}

/// A loaded executable object: either a transaction script or a contract
/// instance with its current field image.
#[derive(Clone, Debug)]
pub enum ContractObj {
    Script {
        script: Arc<Script>,
    },
    Contract {
        address: Hash,
        contract: Arc<Contract>,
        fields: Vec<Val>,
    },
}

impl ContractObj {
    pub fn from_script(script: Script) -> Self {
        ContractObj::Script {
            script: Arc::new(script),
        }
    }

    pub fn from_contract(address: Hash, contract: Arc<Contract>, fields: Vec<Val>) -> Self {
        ContractObj::Contract {
            address,
            contract,
            fields,
        }
    }

    /// Look up a method by index.
    pub fn method(&self, index: usize) -> ExeResult<&Method> {
        let methods = match self {
            ContractObj::Script { script } => &script.methods,
            ContractObj::Contract { contract, .. } => &contract.methods,
        };
        methods
            .get(index)
            .ok_or(ExecutionError::InvalidMethodIndex(index))
    }

    /// Field read; scripts have none.
    pub fn field(&self, index: usize) -> ExeResult<&Val> {
        match self {
            ContractObj::Script { .. } => Err(ExecutionError::InvalidFieldIndex(index)),
            ContractObj::Contract { fields, .. } => fields
                .get(index)
                .ok_or(ExecutionError::InvalidFieldIndex(index)),
        }
    }

    /// Field write; the new value must keep the declared type.
    pub fn set_field(&mut self, index: usize, value: Val) -> ExeResult<()> {
        match self {
            ContractObj::Script { .. } => Err(ExecutionError::InvalidFieldIndex(index)),
            ContractObj::Contract {
                contract, fields, ..
            } => {
                let declared = contract
                    .field_types
                    .get(index)
                    .ok_or(ExecutionError::InvalidFieldIndex(index))?;
                if value.type_of() != *declared {
                    return Err(ExecutionError::InvalidFieldType);
                }
                fields[index] = value;
                Ok(())
            }
        }
    }

    /// The contract address, if this is a contract instance.
    pub fn address(&self) -> Option<Hash> {
        match self {
            ContractObj::Script { .. } => None,
            ContractObj::Contract { address, .. } => Some(*address),
        }
    }
}
