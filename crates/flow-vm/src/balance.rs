//! Balance bookkeeping for payable methods.
//!
//! A frame executing a payable method carries a [`BalanceState`]: the
//! balances the caller *approved* for it to spend, and the *remaining*
//! balances it has actually received. Entering a payable method moves the
//! caller's approved balances into the callee's remaining; returning merges
//! whatever is left back into the caller. Absent explicit burns the total
//! across a call tree is conserved.

use crate::error::{ExeResult, ExecutionError};
use flow_types::{Hash, U256};

/// Per-address asset balances: the native asset plus tokens.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Balances {
    /// `(address, native amount, token balances)`, insertion-ordered.
    entries: Vec<(Hash, U256, Vec<(Hash, U256)>)>,
}

impl Balances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Native balance held for `address`.
    pub fn alph(&self, address: &Hash) -> U256 {
        self.entries
            .iter()
            .find(|(a, _, _)| a == address)
            .map(|(_, amount, _)| amount.clone())
            .unwrap_or_else(U256::zero)
    }

    /// Token balance held for `address`.
    pub fn token(&self, address: &Hash, token: &Hash) -> U256 {
        self.entries
            .iter()
            .find(|(a, _, _)| a == address)
            .and_then(|(_, _, tokens)| tokens.iter().find(|(id, _)| id == token))
            .map(|(_, amount)| amount.clone())
            .unwrap_or_else(U256::zero)
    }

    /// Credit native funds.
    pub fn add_alph(&mut self, address: &Hash, amount: U256) -> ExeResult<()> {
        let entry = self.entry_mut(address);
        entry.1 = entry
            .1
            .checked_add(&amount)
            .ok_or(ExecutionError::ArithmeticError)?;
        Ok(())
    }

    /// Debit native funds; fails on insufficient balance.
    pub fn sub_alph(&mut self, address: &Hash, amount: &U256) -> ExeResult<()> {
        let entry = self.entry_mut(address);
        entry.1 = entry
            .1
            .checked_sub(amount)
            .ok_or(ExecutionError::BalanceUnderflow)?;
        Ok(())
    }

    /// Credit token funds.
    pub fn add_token(&mut self, address: &Hash, token: &Hash, amount: U256) -> ExeResult<()> {
        let entry = self.entry_mut(address);
        match entry.2.iter_mut().find(|(id, _)| id == token) {
            Some((_, held)) => {
                *held = held
                    .checked_add(&amount)
                    .ok_or(ExecutionError::ArithmeticError)?;
            }
            None => entry.2.push((*token, amount)),
        }
        Ok(())
    }

    /// Debit token funds; fails on insufficient balance.
    pub fn sub_token(&mut self, address: &Hash, token: &Hash, amount: &U256) -> ExeResult<()> {
        let entry = self.entry_mut(address);
        let held = entry
            .2
            .iter_mut()
            .find(|(id, _)| id == token)
            .ok_or(ExecutionError::BalanceUnderflow)?;
        held.1 = held
            .1
            .checked_sub(amount)
            .ok_or(ExecutionError::BalanceUnderflow)?;
        Ok(())
    }

    /// Fold every balance of `other` into `self`.
    pub fn merge(&mut self, other: Balances) -> ExeResult<()> {
        for (address, alph, tokens) in other.entries {
            if !alph.is_zero() {
                self.add_alph(&address, alph)?;
            }
            for (token, amount) in tokens {
                if !amount.is_zero() {
                    self.add_token(&address, &token, amount)?;
                }
            }
        }
        Ok(())
    }

    /// Total native funds across all addresses; used by conservation checks.
    pub fn total_alph(&self) -> U256 {
        self.entries
            .iter()
            .fold(U256::zero(), |acc, (_, amount, _)| {
                acc.checked_add(amount).unwrap_or_else(U256::max_value)
            })
    }

    fn entry_mut(&mut self, address: &Hash) -> &mut (Hash, U256, Vec<(Hash, U256)>) {
        if let Some(position) = self.entries.iter().position(|(a, _, _)| a == address) {
            return &mut self.entries[position];
        }
        self.entries.push((*address, U256::zero(), Vec::new()));
        self.entries.last_mut().expect("just pushed")
    }
}

/// Approved plus remaining balances of one frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BalanceState {
    pub approved: Balances,
    pub remaining: Balances,
}

impl BalanceState {
    /// A state whose remaining balances hold `amount` for `address`.
    pub fn from_alph(address: Hash, amount: U256) -> Self {
        let mut remaining = Balances::new();
        remaining
            .add_alph(&address, amount)
            .expect("fresh balance cannot overflow");
        Self {
            approved: Balances::new(),
            remaining,
        }
    }

    /// Move funds of `address` from remaining into approved, staging them
    /// for the next payable call.
    pub fn approve_alph(&mut self, address: &Hash, amount: &U256) -> ExeResult<()> {
        self.remaining.sub_alph(address, amount)?;
        self.approved.add_alph(address, amount.clone())
    }

    /// Token variant of [`approve_alph`](Self::approve_alph).
    pub fn approve_token(&mut self, address: &Hash, token: &Hash, amount: &U256) -> ExeResult<()> {
        self.remaining.sub_token(address, token, amount)?;
        self.approved.add_token(address, token, amount.clone())
    }

    /// Consume the approved balances into a callee's state. The callee
    /// starts with nothing approved.
    pub fn consume_approved(&mut self) -> BalanceState {
        BalanceState {
            approved: Balances::new(),
            remaining: std::mem::take(&mut self.approved),
        }
    }

    /// Merge a returning callee's leftovers back.
    pub fn absorb(&mut self, callee: BalanceState) -> ExeResult<()> {
        self.remaining.merge(callee.approved)?;
        self.remaining.merge(callee.remaining)
    }

    /// Total funds in this state.
    pub fn total_alph(&self) -> U256 {
        self.approved
            .total_alph()
            .checked_add(&self.remaining.total_alph())
            .unwrap_or_else(U256::max_value)
    }
}
