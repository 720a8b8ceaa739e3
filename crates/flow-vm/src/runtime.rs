//! The execution loop.
//!
//! A `Runtime` owns the frame stack, the shared operand stack, and the
//! table of loaded objects. Per frame the loop charges gas, dispatches the
//! instruction, and advances the pc; calls push a frame after advancing the
//! caller, `Return` (or falling off the end of a method) pops one. Any
//! error aborts the whole execution; the caller is responsible for
//! discarding staged world-state writes.

use crate::balance::BalanceState;
use crate::context::Context;
use crate::contract::ContractObj;
use crate::error::{ExeResult, ExecutionError};
use crate::frame::Frame;
use crate::gas::GasMeter;
use crate::instr::Instr;
use crate::val::Val;
use flow_types::{Hash, PublicKey, U256};
use std::collections::HashMap;

/// Result of a successful execution.
#[derive(Debug)]
pub struct Execution {
    /// Values returned by the entry method.
    pub returns: Vec<Val>,
    /// Gas consumed along the executed path.
    pub gas_used: u64,
    /// Unspent balances of the entry frame, to be settled by the caller.
    pub leftover: Option<BalanceState>,
}

/// The VM executor.
pub struct Runtime<'a, C: Context> {
    ctx: &'a mut C,
    gas: GasMeter,
    stack: Vec<Val>,
    frames: Vec<Frame>,
    objs: Vec<ContractObj>,
    dirty: Vec<bool>,
    loaded: HashMap<Hash, usize>,
    leftover: Option<BalanceState>,
}

impl<'a, C: Context> Runtime<'a, C> {
    /// Run `method_index` of `obj` with `args` under `gas_budget`.
    pub fn execute(
        ctx: &'a mut C,
        obj: ContractObj,
        method_index: usize,
        args: Vec<Val>,
        gas_budget: u64,
    ) -> ExeResult<Execution> {
        let mut runtime = Runtime {
            ctx,
            gas: GasMeter::new(gas_budget),
            stack: Vec::new(),
            frames: Vec::new(),
            objs: Vec::new(),
            dirty: Vec::new(),
            loaded: HashMap::new(),
            leftover: None,
        };

        if let Some(address) = obj.address() {
            runtime.loaded.insert(address, 0);
        }
        runtime.objs.push(obj);
        runtime.dirty.push(false);

        let method = runtime.objs[0].method(method_index)?;
        if !method.is_public {
            return Err(ExecutionError::ExternalPrivateMethodCall(method_index));
        }
        if args.len() != method.args_len as usize {
            return Err(ExecutionError::InvalidType {
                expected: "entry argument count",
            });
        }
        let (locals_len, return_len, is_payable) = (
            method.locals_len as usize,
            method.return_len as usize,
            method.is_payable,
        );

        let balance = if is_payable {
            Some(
                runtime
                    .ctx
                    .take_entry_balance()
                    .ok_or(ExecutionError::EmptyBalanceForPayableMethod)?,
            )
        } else {
            None
        };

        let locals = Self::build_locals(args, locals_len);
        runtime
            .frames
            .push(Frame::new(0, method_index, locals, 0, return_len, balance));

        while !runtime.frames.is_empty() {
            runtime.step()?;
        }

        // Persist mutated contract fields only after a fully clean run.
        for (index, is_dirty) in runtime.dirty.iter().enumerate() {
            if !is_dirty {
                continue;
            }
            if let ContractObj::Contract {
                address, fields, ..
            } = &runtime.objs[index]
            {
                runtime.ctx.save_contract_fields(address, fields)?;
            }
        }

        Ok(Execution {
            returns: std::mem::take(&mut runtime.stack),
            gas_used: runtime.gas.used(),
            leftover: runtime.leftover.take(),
        })
    }

    fn build_locals(args: Vec<Val>, locals_len: usize) -> Vec<Val> {
        let mut locals = args;
        while locals.len() < locals_len {
            locals.push(Val::Bool(false));
        }
        locals
    }

    fn step(&mut self) -> ExeResult<()> {
        let frame = self.frames.last().ok_or(ExecutionError::StackUnderflow)?;
        let (obj_index, method_index, pc) = (frame.obj_index, frame.method_index, frame.pc);

        let fetched = {
            let method = self.objs[obj_index].method(method_index)?;
            let pc_max = method.instrs.len();
            if pc > pc_max {
                return Err(ExecutionError::PcOverflow);
            }
            if pc == pc_max {
                None
            } else {
                Some((method.instrs[pc].clone(), pc_max))
            }
        };

        match fetched {
            // pc == pc_max: clean return
            None => self.do_return(),
            Some((instr, pc_max)) => {
                self.gas.charge(instr.gas())?;
                self.run_instr(instr, pc_max)
            }
        }
    }

    fn frame_mut(&mut self) -> ExeResult<&mut Frame> {
        self.frames.last_mut().ok_or(ExecutionError::StackUnderflow)
    }

    fn advance_pc(&mut self) -> ExeResult<()> {
        self.frame_mut()?.pc += 1;
        Ok(())
    }

    fn offset_pc(&mut self, offset: i32, pc_max: usize) -> ExeResult<()> {
        let frame = self.frame_mut()?;
        let target = frame.pc as i64 + 1 + i64::from(offset);
        if target < 0 || target >= pc_max as i64 {
            return Err(ExecutionError::InvalidInstrOffset);
        }
        frame.pc = target as usize;
        Ok(())
    }

    fn push(&mut self, value: Val) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> ExeResult<Val> {
        let base = self
            .frames
            .last()
            .map(|frame| frame.stack_base)
            .unwrap_or(0);
        if self.stack.len() <= base {
            return Err(ExecutionError::StackUnderflow);
        }
        self.stack.pop().ok_or(ExecutionError::StackUnderflow)
    }

    fn balance_mut(&mut self) -> ExeResult<&mut BalanceState> {
        self.frame_mut()?
            .balance
            .as_mut()
            .ok_or(ExecutionError::EmptyBalanceForPayableMethod)
    }

    fn do_return(&mut self) -> ExeResult<()> {
        let frame = self.frames.pop().ok_or(ExecutionError::StackUnderflow)?;
        let available = self.stack.len() - frame.stack_base;
        if available != frame.return_len {
            return Err(ExecutionError::InvalidReturnLength {
                expected: frame.return_len,
                actual: available,
            });
        }

        if let Some(balance) = frame.balance {
            match self.frames.last_mut() {
                Some(parent) => match parent.balance.as_mut() {
                    Some(parent_balance) => parent_balance.absorb(balance)?,
                    None => match self.leftover.as_mut() {
                        Some(leftover) => leftover.absorb(balance)?,
                        None => self.leftover = Some(balance),
                    },
                },
                None => match self.leftover.as_mut() {
                    Some(leftover) => leftover.absorb(balance)?,
                    None => self.leftover = Some(balance),
                },
            }
        }

        // The return values already sit on top of the caller's segment.
        Ok(())
    }

    fn call_local(&mut self, index: usize) -> ExeResult<()> {
        self.advance_pc()?;
        let obj_index = self.frame_mut()?.obj_index;
        let method = self.objs[obj_index].method(index)?;
        let (args_len, locals_len, return_len, is_payable) = (
            method.args_len as usize,
            method.locals_len as usize,
            method.return_len as usize,
            method.is_payable,
        );

        let balance = if is_payable {
            let caller = self.balance_mut()?;
            let callee = caller.consume_approved();
            if callee.remaining.is_empty() {
                return Err(ExecutionError::EmptyBalanceForPayableMethod);
            }
            Some(callee)
        } else {
            None
        };

        let mut args = Vec::with_capacity(args_len);
        for _ in 0..args_len {
            args.push(self.pop()?);
        }
        args.reverse();

        let locals = Self::build_locals(args, locals_len);
        let stack_base = self.stack.len();
        self.frames.push(Frame::new(
            obj_index, index, locals, stack_base, return_len, balance,
        ));
        Ok(())
    }

    fn call_external(&mut self, index: usize) -> ExeResult<()> {
        self.advance_pc()?;
        let address = self.pop()?.into_address()?;

        let obj_index = match self.loaded.get(&address) {
            Some(existing) => *existing,
            None => {
                let (contract, fields) = self.ctx.load_contract(&address)?;
                let obj_index = self.objs.len();
                self.objs
                    .push(ContractObj::from_contract(address, contract, fields));
                self.dirty.push(false);
                self.loaded.insert(address, obj_index);
                obj_index
            }
        };

        let method = self.objs[obj_index].method(index)?;
        if !method.is_public {
            return Err(ExecutionError::ExternalPrivateMethodCall(index));
        }
        let (args_len, locals_len, return_len, is_payable) = (
            method.args_len as usize,
            method.locals_len as usize,
            method.return_len as usize,
            method.is_payable,
        );

        let balance = if is_payable {
            let caller = self.balance_mut()?;
            let mut callee = caller.consume_approved();
            // Contract methods additionally pull the contract's own asset.
            if let Some(pulled) = self.ctx.pull_contract_asset(&address)? {
                callee.remaining.add_alph(&address, pulled)?;
            }
            if callee.remaining.is_empty() {
                return Err(ExecutionError::EmptyBalanceForPayableMethod);
            }
            Some(callee)
        } else {
            None
        };

        let mut args = Vec::with_capacity(args_len);
        for _ in 0..args_len {
            args.push(self.pop()?);
        }
        args.reverse();

        let locals = Self::build_locals(args, locals_len);
        let stack_base = self.stack.len();
        self.frames.push(Frame::new(
            obj_index, index, locals, stack_base, return_len, balance,
        ));
        Ok(())
    }

    fn run_instr(&mut self, instr: Instr, pc_max: usize) -> ExeResult<()> {
        match instr {
            Instr::CallLocal(index) => return self.call_local(index as usize),
            Instr::CallExternal(index) => return self.call_external(index as usize),
            Instr::Return => return self.do_return(),
            Instr::Jump(offset) => return self.offset_pc(offset, pc_max),
            Instr::IfTrue(offset) => {
                let condition = self.pop()?.into_bool()?;
                return if condition {
                    self.offset_pc(offset, pc_max)
                } else {
                    self.advance_pc()
                };
            }
            Instr::IfFalse(offset) => {
                let condition = self.pop()?.into_bool()?;
                return if condition {
                    self.advance_pc()
                } else {
                    self.offset_pc(offset, pc_max)
                };
            }
            _ => {}
        }

        match instr {
            Instr::ConstTrue => self.push(Val::Bool(true)),
            Instr::ConstFalse => self.push(Val::Bool(false)),
            Instr::I256Const(v) => self.push(Val::I256(v)),
            Instr::U256Const(v) => self.push(Val::U256(v)),
            Instr::BytesConst(v) => self.push(Val::ByteVec(v)),
            Instr::AddressConst(a) => self.push(Val::Address(a)),

            Instr::LoadLocal(index) => {
                let index = index as usize;
                let frame = self.frame_mut()?;
                let value = frame
                    .locals
                    .get(index)
                    .cloned()
                    .ok_or(ExecutionError::InvalidLocalIndex(index))?;
                self.push(value);
            }
            Instr::StoreLocal(index) => {
                let index = index as usize;
                let value = self.pop()?;
                let frame = self.frame_mut()?;
                let slot = frame
                    .locals
                    .get_mut(index)
                    .ok_or(ExecutionError::InvalidLocalIndex(index))?;
                *slot = value;
            }
            Instr::LoadField(index) => {
                let obj_index = self.frame_mut()?.obj_index;
                let value = self.objs[obj_index].field(index as usize)?.clone();
                self.push(value);
            }
            Instr::StoreField(index) => {
                let value = self.pop()?;
                let obj_index = self.frame_mut()?.obj_index;
                self.objs[obj_index].set_field(index as usize, value)?;
                self.dirty[obj_index] = true;
            }
            Instr::Pop => {
                self.pop()?;
            }
            Instr::Dup => {
                let top = self.pop()?;
                self.push(top.clone());
                self.push(top);
            }

            Instr::BoolNot => {
                let value = self.pop()?.into_bool()?;
                self.push(Val::Bool(!value));
            }
            Instr::BoolAnd => {
                let b = self.pop()?.into_bool()?;
                let a = self.pop()?.into_bool()?;
                self.push(Val::Bool(a && b));
            }
            Instr::BoolOr => {
                let b = self.pop()?.into_bool()?;
                let a = self.pop()?.into_bool()?;
                self.push(Val::Bool(a || b));
            }

            Instr::I256Add => self.i256_binop(|a, b| a.checked_add(b))?,
            Instr::I256Sub => self.i256_binop(|a, b| a.checked_sub(b))?,
            Instr::I256Mul => self.i256_binop(|a, b| a.checked_mul(b))?,
            Instr::I256Div => self.i256_binop(|a, b| a.checked_div(b))?,
            Instr::I256Mod => self.i256_binop(|a, b| a.checked_rem(b))?,
            Instr::I256Neg => {
                let value = self.pop()?.into_i256()?;
                let negated = value
                    .checked_neg()
                    .ok_or(ExecutionError::ArithmeticError)?;
                self.push(Val::I256(negated));
            }
            Instr::I256Lt => self.i256_cmp(|a, b| a < b)?,
            Instr::I256Le => self.i256_cmp(|a, b| a <= b)?,
            Instr::I256Gt => self.i256_cmp(|a, b| a > b)?,
            Instr::I256Ge => self.i256_cmp(|a, b| a >= b)?,

            Instr::U256Add => self.u256_binop(|a, b| a.checked_add(b))?,
            Instr::U256Sub => self.u256_binop(|a, b| a.checked_sub(b))?,
            Instr::U256Mul => self.u256_binop(|a, b| a.checked_mul(b))?,
            Instr::U256Div => self.u256_binop(|a, b| a.checked_div(b))?,
            Instr::U256Mod => self.u256_binop(|a, b| a.checked_rem(b))?,
            Instr::U256Lt => self.u256_cmp(|a, b| a < b)?,
            Instr::U256Le => self.u256_cmp(|a, b| a <= b)?,
            Instr::U256Gt => self.u256_cmp(|a, b| a > b)?,
            Instr::U256Ge => self.u256_cmp(|a, b| a >= b)?,

            Instr::Eq => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Val::Bool(a == b));
            }
            Instr::Neq => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Val::Bool(a != b));
            }

            Instr::ByteVecConcat => {
                let b = self.pop()?.into_bytes()?;
                let mut a = self.pop()?.into_bytes()?;
                a.extend_from_slice(&b);
                self.push(Val::ByteVec(a));
            }
            Instr::ByteVecSize => {
                let v = self.pop()?.into_bytes()?;
                self.push(Val::U256(U256::from_u64(v.len() as u64)));
            }

            Instr::Blake2b => {
                let data = self.pop()?.into_bytes()?;
                self.push(Val::ByteVec(
                    Hash::hash_blake2b(&data).as_bytes().to_vec(),
                ));
            }
            Instr::Keccak256 => {
                let data = self.pop()?.into_bytes()?;
                self.push(Val::ByteVec(
                    Hash::hash_keccak256(&data).as_bytes().to_vec(),
                ));
            }
            Instr::VerifyTxSignature => {
                let key_bytes = self.pop()?.into_bytes()?;
                let key_array: [u8; 32] = key_bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| ExecutionError::InvalidSignature)?;
                let key =
                    PublicKey::from_bytes(&key_array).ok_or(ExecutionError::InvalidSignature)?;
                let signature = self.ctx.pop_signature()?;
                let tx_hash = self.ctx.tx_hash();
                if !key.verify(&tx_hash, &signature) {
                    return Err(ExecutionError::InvalidSignature);
                }
            }
            Instr::TxId => {
                let tx_hash = self.ctx.tx_hash();
                self.push(Val::ByteVec(tx_hash.as_bytes().to_vec()));
            }

            Instr::Log(count) => {
                let mut values = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    values.push(self.pop()?);
                }
                values.reverse();
                self.ctx.log(values);
            }

            Instr::ApproveAlph => {
                let amount = self.pop()?.into_u256()?;
                let address = self.pop()?.into_address()?;
                self.balance_mut()?.approve_alph(&address, &amount)?;
            }
            Instr::ApproveToken => {
                let amount = self.pop()?.into_u256()?;
                let token = self.pop_token_id()?;
                let address = self.pop()?.into_address()?;
                self.balance_mut()?.approve_token(&address, &token, &amount)?;
            }
            Instr::TransferAlph => {
                let amount = self.pop()?.into_u256()?;
                let to = self.pop()?.into_address()?;
                let from = self.pop()?.into_address()?;
                let balance = self.balance_mut()?;
                balance.remaining.sub_alph(&from, &amount)?;
                balance.remaining.add_alph(&to, amount)?;
            }
            Instr::TransferToken => {
                let amount = self.pop()?.into_u256()?;
                let token = self.pop_token_id()?;
                let to = self.pop()?.into_address()?;
                let from = self.pop()?.into_address()?;
                let balance = self.balance_mut()?;
                balance.remaining.sub_token(&from, &token, &amount)?;
                balance.remaining.add_token(&to, &token, amount)?;
            }
            Instr::AlphRemaining => {
                let address = self.pop()?.into_address()?;
                let amount = self.balance_mut()?.remaining.alph(&address);
                self.push(Val::U256(amount));
            }
            Instr::TokenRemaining => {
                let token = self.pop_token_id()?;
                let address = self.pop()?.into_address()?;
                let amount = self.balance_mut()?.remaining.token(&address, &token);
                self.push(Val::U256(amount));
            }

            // handled in the first match
            Instr::CallLocal(_)
            | Instr::CallExternal(_)
            | Instr::Return
            | Instr::Jump(_)
            | Instr::IfTrue(_)
            | Instr::IfFalse(_) => unreachable!("dispatched above"),
        }

        self.advance_pc()
    }

    fn pop_token_id(&mut self) -> ExeResult<Hash> {
        let bytes = self.pop()?.into_bytes()?;
        Hash::from_slice(&bytes).ok_or(ExecutionError::InvalidType { expected: "token id" })
    }

    fn i256_binop(
        &mut self,
        op: impl Fn(&flow_types::I256, &flow_types::I256) -> Option<flow_types::I256>,
    ) -> ExeResult<()> {
        let b = self.pop()?.into_i256()?;
        let a = self.pop()?.into_i256()?;
        let result = op(&a, &b).ok_or(ExecutionError::ArithmeticError)?;
        self.push(Val::I256(result));
        Ok(())
    }

    fn i256_cmp(
        &mut self,
        op: impl Fn(&flow_types::I256, &flow_types::I256) -> bool,
    ) -> ExeResult<()> {
        let b = self.pop()?.into_i256()?;
        let a = self.pop()?.into_i256()?;
        self.push(Val::Bool(op(&a, &b)));
        Ok(())
    }

    fn u256_binop(&mut self, op: impl Fn(&U256, &U256) -> Option<U256>) -> ExeResult<()> {
        let b = self.pop()?.into_u256()?;
        let a = self.pop()?.into_u256()?;
        let result = op(&a, &b).ok_or(ExecutionError::ArithmeticError)?;
        self.push(Val::U256(result));
        Ok(())
    }

    fn u256_cmp(&mut self, op: impl Fn(&U256, &U256) -> bool) -> ExeResult<()> {
        let b = self.pop()?.into_u256()?;
        let a = self.pop()?.into_u256()?;
        self.push(Val::Bool(op(&a, &b)));
        Ok(())
    }
}
