//! # flow-lang
//!
//! Compiler for the typed contract language. Pipeline:
//! lex → parse → type-check → codegen. Three top-level forms exist:
//!
//! - `TxContract`: stateful contract with persistent fields
//! - `TxScript`: transaction script (first method public, rest private)
//! - `AssetScript`: stateless unlock script
//!
//! Fixed-size arrays are flattened to consecutive slots at compile time;
//! every compile error carries a source position, and compiling the same
//! source twice yields byte-identical bytecode.

mod ast;
mod compiler;
mod error;
mod lexer;
mod parser;

pub use ast::{ContractDef, ContractKind, Expr, FuncDef, Stmt, TypeAnn};
pub use compiler::{compile, CompiledDef, CompiledUnit};
pub use error::{CompileError, CompileResult};

use flow_vm::{Contract, Script};

/// Compile a source file expected to contain exactly one `TxContract`.
pub fn compile_contract(source: &str) -> CompileResult<Contract> {
    let defs = compile(source)?;
    for def in defs {
        if let CompiledUnit::Contract(contract) = def.unit {
            return Ok(contract);
        }
    }
    Err(CompileError::Type {
        message: "source contains no TxContract".into(),
        line: 1,
    })
}

/// Compile a source file expected to contain exactly one script
/// (`TxScript` or `AssetScript`).
pub fn compile_script(source: &str) -> CompileResult<Script> {
    let defs = compile(source)?;
    for def in defs {
        if let CompiledUnit::Script(script) = def.unit {
            return Ok(script);
        }
    }
    Err(CompileError::Type {
        message: "source contains no script".into(),
        line: 1,
    })
}
