//! Type checking and bytecode generation.
//!
//! Arrays are flattened at compile time: a variable of type `[[U256; 2]; 3]`
//! occupies six consecutive slots, and every access resolves through an
//! [`ArrayRef`], a `(start, shape)` record in a compile-time arena, to a
//! static slot index. Dynamic indexing is rejected. Method argument, local
//! and return lengths all count flattened slots.

use crate::ast::{
    AssignTarget, BinOp, ContractDef, ContractKind, EventDef, Expr, FuncDef, Stmt, TypeAnn, UnOp,
};
use crate::error::{CompileError, CompileResult};
use crate::parser::parse;
use flow_vm::{Contract, Instr, Method, Script, ValType};
use flow_types::{I256, U256};
use std::collections::HashMap;

/// A compiled top-level definition.
pub struct CompiledDef {
    pub name: String,
    pub unit: CompiledUnit,
}

/// Either a stateful contract or a script.
pub enum CompiledUnit {
    Contract(Contract),
    Script(Script),
}

/// Compile a source file into all of its top-level definitions.
pub fn compile(source: &str) -> CompileResult<Vec<CompiledDef>> {
    parse(source)?.iter().map(compile_def).collect()
}

/// Resolved types.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Type {
    Bool,
    I256,
    U256,
    ByteVec,
    Address,
    Contract(String),
    Array(Box<Type>, usize),
}

impl Type {
    fn from_ann(ann: &TypeAnn) -> Type {
        match ann {
            TypeAnn::Bool => Type::Bool,
            TypeAnn::I256 => Type::I256,
            TypeAnn::U256 => Type::U256,
            TypeAnn::ByteVec => Type::ByteVec,
            TypeAnn::Address => Type::Address,
            TypeAnn::Contract(name) => Type::Contract(name.clone()),
            TypeAnn::Array(element, size) => {
                Type::Array(Box::new(Type::from_ann(element)), *size)
            }
        }
    }

    /// Number of flattened slots this type occupies.
    fn flatten_len(&self) -> usize {
        match self {
            Type::Array(element, size) => element.flatten_len() * size,
            _ => 1,
        }
    }

    /// Append the flattened slot types.
    fn slot_types(&self, out: &mut Vec<ValType>) {
        match self {
            Type::Array(element, size) => {
                for _ in 0..*size {
                    element.slot_types(out);
                }
            }
            scalar => out.push(scalar.val_type()),
        }
    }

    /// The VM slot type of a scalar; contract handles are addresses.
    fn val_type(&self) -> ValType {
        match self {
            Type::Bool => ValType::Bool,
            Type::I256 => ValType::I256,
            Type::U256 => ValType::U256,
            Type::ByteVec => ValType::ByteVec,
            Type::Address | Type::Contract(_) => ValType::Address,
            Type::Array(..) => unreachable!("arrays have no single slot type"),
        }
    }

    fn is_array(&self) -> bool {
        matches!(self, Type::Array(..))
    }

    fn display(&self) -> String {
        match self {
            Type::Bool => "Bool".into(),
            Type::I256 => "I256".into(),
            Type::U256 => "U256".into(),
            Type::ByteVec => "ByteVec".into(),
            Type::Address => "Address".into(),
            Type::Contract(name) => format!("Contract<{name}>"),
            Type::Array(element, size) => format!("[{}; {size}]", element.display()),
        }
    }
}

/// A flattened array reference: where the slots start and the array shape.
#[derive(Clone, Debug)]
struct ArrayRef {
    start: u16,
    typ: Type,
    is_field: bool,
}

/// Compile-time arena of array references.
#[derive(Default)]
struct ArrayRefArena {
    refs: Vec<ArrayRef>,
}

impl ArrayRefArena {
    fn alloc(&mut self, array_ref: ArrayRef) -> usize {
        self.refs.push(array_ref);
        self.refs.len() - 1
    }

    fn get(&self, id: usize) -> &ArrayRef {
        &self.refs[id]
    }
}

/// Where a name's value lives.
#[derive(Clone, Debug)]
enum Slot {
    Scalar { index: u16, typ: Type, is_field: bool },
    Array(usize),
}

struct FuncSig {
    index: u16,
    params: Vec<Type>,
    returns: Vec<Type>,
}

struct UnitContext {
    kind: ContractKind,
    functions: HashMap<String, FuncSig>,
    events: HashMap<String, Vec<Type>>,
    fields: HashMap<String, Slot>,
    field_arena: ArrayRefArena,
}

fn compile_def(def: &ContractDef) -> CompileResult<CompiledDef> {
    // Script restriction: the entry method is public, every other private.
    if def.kind == ContractKind::TxScript {
        for (position, func) in def.funcs.iter().enumerate() {
            if position == 0 && !func.is_public {
                return Err(CompileError::Type {
                    message: "the first method of a TxScript must be pub".into(),
                    line: func.line,
                });
            }
            if position > 0 && func.is_public {
                return Err(CompileError::Type {
                    message: "only the first method of a TxScript may be pub".into(),
                    line: func.line,
                });
            }
        }
    }

    let mut events = HashMap::new();
    for EventDef { name, fields, line } in &def.events {
        let field_types: Vec<Type> = fields.iter().map(|(_, ann)| Type::from_ann(ann)).collect();
        if events.insert(name.clone(), field_types).is_some() {
            return Err(CompileError::Duplicate {
                what: "event",
                name: name.clone(),
                line: *line,
            });
        }
    }

    let mut functions = HashMap::new();
    for (index, func) in def.funcs.iter().enumerate() {
        let params = func
            .params
            .iter()
            .map(|(_, ann)| ann.as_ref().map(Type::from_ann).unwrap_or(Type::U256))
            .collect();
        let returns = func.returns.iter().map(Type::from_ann).collect();
        let sig = FuncSig {
            index: index as u16,
            params,
            returns,
        };
        if functions.insert(func.name.clone(), sig).is_some() {
            return Err(CompileError::Duplicate {
                what: "function",
                name: func.name.clone(),
                line: func.line,
            });
        }
    }

    // Flatten contract fields into persistent slots.
    let mut field_arena = ArrayRefArena::default();
    let mut fields = HashMap::new();
    let mut field_types = Vec::new();
    let mut next_field_slot: u16 = 0;
    for (name, ann) in &def.fields {
        let typ = Type::from_ann(ann);
        let slot = if typ.is_array() {
            Slot::Array(field_arena.alloc(ArrayRef {
                start: next_field_slot,
                typ: typ.clone(),
                is_field: true,
            }))
        } else {
            Slot::Scalar {
                index: next_field_slot,
                typ: typ.clone(),
                is_field: true,
            }
        };
        if fields.insert(name.clone(), slot).is_some() {
            return Err(CompileError::Duplicate {
                what: "field",
                name: name.clone(),
                line: def.line,
            });
        }
        typ.slot_types(&mut field_types);
        next_field_slot += typ.flatten_len() as u16;
    }

    let unit = UnitContext {
        kind: def.kind,
        functions,
        events,
        fields,
        field_arena,
    };

    let methods: Vec<Method> = def
        .funcs
        .iter()
        .map(|func| FuncCompiler::compile(&unit, func))
        .collect::<CompileResult<_>>()?;

    let compiled = match def.kind {
        ContractKind::TxContract => CompiledUnit::Contract(Contract {
            field_types,
            methods,
        }),
        ContractKind::TxScript | ContractKind::AssetScript => {
            CompiledUnit::Script(Script { methods })
        }
    };

    Ok(CompiledDef {
        name: def.name.clone(),
        unit: compiled,
    })
}

struct FuncCompiler<'a> {
    unit: &'a UnitContext,
    func: &'a FuncDef,
    vars: HashMap<String, Slot>,
    arena: ArrayRefArena,
    next_slot: u16,
    instrs: Vec<Instr>,
    returns: Vec<Type>,
}

impl<'a> FuncCompiler<'a> {
    fn compile(unit: &'a UnitContext, func: &'a FuncDef) -> CompileResult<Method> {
        let mut this = FuncCompiler {
            unit,
            func,
            vars: HashMap::new(),
            arena: ArrayRefArena::default(),
            next_slot: 0,
            instrs: Vec::new(),
            returns: func.returns.iter().map(Type::from_ann).collect(),
        };

        for (name, ann) in &func.params {
            let typ = ann.as_ref().map(Type::from_ann).unwrap_or(Type::U256);
            this.declare(name, typ, func.line)?;
        }
        let args_len = this.next_slot;

        for stmt in &func.body {
            this.stmt(stmt)?;
        }
        if this.instrs.last() != Some(&Instr::Return) {
            this.instrs.push(Instr::Return);
        }

        let return_len: usize = this.returns.iter().map(Type::flatten_len).sum();
        Ok(Method {
            is_public: func.is_public,
            is_payable: func.is_payable,
            args_len,
            locals_len: this.next_slot,
            return_len: return_len as u16,
            instrs: this.instrs,
        })
    }

    fn declare(&mut self, name: &str, typ: Type, line: usize) -> CompileResult<Slot> {
        if self.vars.contains_key(name) {
            return Err(CompileError::Duplicate {
                what: "variable",
                name: name.to_string(),
                line,
            });
        }
        let start = self.next_slot;
        self.next_slot += typ.flatten_len() as u16;
        let slot = if typ.is_array() {
            Slot::Array(self.arena.alloc(ArrayRef {
                start,
                typ,
                is_field: false,
            }))
        } else {
            Slot::Scalar {
                index: start,
                typ,
                is_field: false,
            }
        };
        self.vars.insert(name.to_string(), slot.clone());
        Ok(slot)
    }

    fn lookup(&self, name: &str, line: usize) -> CompileResult<(Slot, bool)> {
        if let Some(slot) = self.vars.get(name) {
            return Ok((slot.clone(), false));
        }
        if let Some(slot) = self.unit.fields.get(name) {
            return Ok((slot.clone(), true));
        }
        Err(CompileError::Type {
            message: format!("unknown variable `{name}`"),
            line,
        })
    }

    fn array_ref(&self, slot: &Slot, from_fields: bool) -> ArrayRef {
        match slot {
            Slot::Array(id) => {
                if from_fields {
                    self.unit.field_arena.get(*id).clone()
                } else {
                    self.arena.get(*id).clone()
                }
            }
            Slot::Scalar { index, typ, is_field } => ArrayRef {
                start: *index,
                typ: typ.clone(),
                is_field: *is_field,
            },
        }
    }

    fn load_slot(&mut self, index: u16, is_field: bool) {
        self.instrs.push(if is_field {
            Instr::LoadField(index)
        } else {
            Instr::LoadLocal(index)
        });
    }

    fn store_slot(&mut self, index: u16, is_field: bool) {
        self.instrs.push(if is_field {
            Instr::StoreField(index)
        } else {
            Instr::StoreLocal(index)
        });
    }

    // ---- statements ----

    fn stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match stmt {
            Stmt::Let {
                name,
                type_ann,
                value,
                line,
            } => {
                let declared = type_ann.as_ref().map(Type::from_ann);
                let value_type = self.type_of_expr(value, declared.as_ref())?;
                let typ = declared.unwrap_or(value_type.clone());
                if typ != value_type {
                    return Err(CompileError::Type {
                        message: format!(
                            "let `{name}` declared {} but value is {}",
                            typ.display(),
                            value_type.display()
                        ),
                        line: *line,
                    });
                }
                let slot = self.declare(name, typ.clone(), *line)?;
                match slot {
                    Slot::Scalar { index, .. } => {
                        self.gen_scalar(value, Some(&typ))?;
                        self.store_slot(index, false);
                    }
                    Slot::Array(id) => {
                        let target = self.arena.get(id).clone();
                        self.gen_array_into(value, &target)?;
                    }
                }
                Ok(())
            }
            Stmt::Assign {
                target,
                value,
                line,
            } => self.assign(target, value, *line),
            Stmt::If {
                cond,
                then_body,
                else_body,
                line,
            } => self.gen_if(cond, then_body, else_body.as_deref(), *line),
            Stmt::While { cond, body, line } => self.gen_while(cond, body, *line),
            Stmt::Return(values, line) => {
                let expected = self.returns.clone();
                if values.len() != expected.len() {
                    return Err(CompileError::Type {
                        message: format!(
                            "return expects {} values, got {}",
                            expected.len(),
                            values.len()
                        ),
                        line: *line,
                    });
                }
                for (value, typ) in values.iter().zip(expected.iter()) {
                    if typ.is_array() {
                        self.gen_array_values(value, typ)?;
                    } else {
                        self.gen_scalar(value, Some(typ))?;
                    }
                }
                self.instrs.push(Instr::Return);
                Ok(())
            }
            Stmt::Emit { event, args, line } => {
                // Events are typechecked but generate no instructions at
                // this layer.
                let field_types =
                    self.unit
                        .events
                        .get(event)
                        .cloned()
                        .ok_or_else(|| CompileError::Type {
                            message: format!("unknown event `{event}`"),
                            line: *line,
                        })?;
                if args.len() != field_types.len() {
                    return Err(CompileError::Type {
                        message: format!(
                            "event `{event}` expects {} fields, got {}",
                            field_types.len(),
                            args.len()
                        ),
                        line: *line,
                    });
                }
                for (arg, typ) in args.iter().zip(field_types.iter()) {
                    let actual = self.type_of_expr(arg, Some(typ))?;
                    if actual != *typ {
                        return Err(CompileError::Type {
                            message: format!(
                                "event `{event}` field expects {}, got {}",
                                typ.display(),
                                actual.display()
                            ),
                            line: *line,
                        });
                    }
                }
                Ok(())
            }
            Stmt::ExprStmt(expr) => {
                let produced = self.gen_for_effect(expr)?;
                for _ in 0..produced {
                    self.instrs.push(Instr::Pop);
                }
                Ok(())
            }
        }
    }

    fn assign(&mut self, target: &AssignTarget, value: &Expr, line: usize) -> CompileResult<()> {
        let (name, indices): (&str, &[Expr]) = match target {
            AssignTarget::Var(name) => (name, &[]),
            AssignTarget::Index(name, indices) => (name, indices),
        };
        let (slot, from_fields) = self.lookup(name, line)?;
        let base = self.array_ref(&slot, from_fields);
        let place = self.resolve_indices(&base, indices, line)?;

        if place.typ.is_array() {
            self.gen_array_into(value, &place)
        } else {
            self.gen_scalar(value, Some(&place.typ))?;
            self.store_slot(place.start, place.is_field);
            Ok(())
        }
    }

    /// Walk constant indices down an array reference.
    fn resolve_indices(
        &mut self,
        base: &ArrayRef,
        indices: &[Expr],
        line: usize,
    ) -> CompileResult<ArrayRef> {
        let mut current = base.clone();
        for index_expr in indices {
            let Type::Array(element, size) = current.typ.clone() else {
                return Err(CompileError::Type {
                    message: "indexing a non-array value".into(),
                    line,
                });
            };
            let index = self.const_index(index_expr)?;
            if index >= size {
                return Err(CompileError::OutOfRange {
                    message: format!("index {index} out of bounds for length {size}"),
                    line,
                });
            }
            current = ArrayRef {
                start: current.start + (index * element.flatten_len()) as u16,
                typ: (*element).clone(),
                is_field: current.is_field,
            };
        }
        Ok(current)
    }

    fn const_index(&self, expr: &Expr) -> CompileResult<usize> {
        match expr {
            Expr::NumLit(text, line) => {
                let digits = text.trim_end_matches(['i', 'u']);
                digits.parse().map_err(|_| CompileError::Parse {
                    message: format!("invalid index `{text}`"),
                    line: *line,
                })
            }
            other => Err(CompileError::UnsupportedArrayOp {
                message: "dynamic array indexing is not supported".into(),
                line: other.line(),
            }),
        }
    }

    // ---- control flow ----

    fn gen_if(
        &mut self,
        cond: &Expr,
        then_body: &[Stmt],
        else_body: Option<&[Stmt]>,
        line: usize,
    ) -> CompileResult<()> {
        // `if !x` branches on the inner condition with IfTrue.
        let (branch_on_true, cond_expr) = match cond {
            Expr::Unary(UnOp::Not, inner, _) => (true, inner.as_ref()),
            _ => (false, cond),
        };
        let cond_type = self.gen_scalar(cond_expr, Some(&Type::Bool))?;
        if cond_type != Type::Bool {
            return Err(CompileError::Type {
                message: format!("if condition must be Bool, got {}", cond_type.display()),
                line,
            });
        }

        let branch_at = self.instrs.len();
        self.instrs.push(Instr::Jump(0)); // placeholder

        for stmt in then_body {
            self.stmt(stmt)?;
        }
        let jump_at = self.instrs.len();
        self.instrs.push(Instr::Jump(0)); // placeholder over the else body

        if let Some(body) = else_body {
            for stmt in body {
                self.stmt(stmt)?;
            }
        }

        let then_len = jump_at - branch_at; // then body plus the jump
        let else_len = self.instrs.len() - jump_at - 1;
        let branch_offset = self.branch_offset(then_len, line)?;
        let jump_offset = self.branch_offset(else_len, line)?;

        self.instrs[branch_at] = if branch_on_true {
            Instr::IfTrue(branch_offset)
        } else {
            Instr::IfFalse(branch_offset)
        };
        self.instrs[jump_at] = Instr::Jump(jump_offset);
        Ok(())
    }

    fn gen_while(&mut self, cond: &Expr, body: &[Stmt], line: usize) -> CompileResult<()> {
        let cond_start = self.instrs.len();
        let cond_type = self.gen_scalar(cond, Some(&Type::Bool))?;
        if cond_type != Type::Bool {
            return Err(CompileError::Type {
                message: format!("while condition must be Bool, got {}", cond_type.display()),
                line,
            });
        }

        let branch_at = self.instrs.len();
        self.instrs.push(Instr::Jump(0)); // placeholder

        for stmt in body {
            self.stmt(stmt)?;
        }

        let jump_at = self.instrs.len();
        let back = -((jump_at + 1 - cond_start) as i64);
        let back_offset = self.branch_offset_signed(back, line)?;
        self.instrs.push(Instr::Jump(back_offset));

        let exit = self.branch_offset(jump_at - branch_at, line)?;
        self.instrs[branch_at] = Instr::IfFalse(exit);
        Ok(())
    }

    fn branch_offset(&self, distance: usize, line: usize) -> CompileResult<i32> {
        self.branch_offset_signed(distance as i64, line)
    }

    fn branch_offset_signed(&self, distance: i64, line: usize) -> CompileResult<i32> {
        if distance.abs() > 0xff {
            return Err(CompileError::OutOfRange {
                message: "Too many instrs for branches".into(),
                line,
            });
        }
        Ok(distance as i32)
    }

    // ---- expressions ----

    /// Generate a scalar expression, leaving exactly one value.
    fn gen_scalar(&mut self, expr: &Expr, expected: Option<&Type>) -> CompileResult<Type> {
        match expr {
            Expr::BoolLit(value, _) => {
                self.instrs.push(if *value {
                    Instr::ConstTrue
                } else {
                    Instr::ConstFalse
                });
                Ok(Type::Bool)
            }
            Expr::NumLit(text, line) => {
                let typ = self.literal_type(text, expected);
                match typ {
                    Type::I256 => {
                        let digits = text.trim_end_matches('i');
                        let value =
                            I256::from_decimal(digits).ok_or_else(|| CompileError::OutOfRange {
                                message: format!("literal `{text}` out of I256 range"),
                                line: *line,
                            })?;
                        self.instrs.push(Instr::I256Const(value));
                        Ok(Type::I256)
                    }
                    _ => {
                        let digits = text.trim_end_matches('u');
                        let value =
                            U256::from_decimal(digits).ok_or_else(|| CompileError::OutOfRange {
                                message: format!("literal `{text}` out of U256 range"),
                                line: *line,
                            })?;
                        self.instrs.push(Instr::U256Const(value));
                        Ok(Type::U256)
                    }
                }
            }
            Expr::Var(name, line) => {
                let (slot, from_fields) = self.lookup(name, *line)?;
                let place = self.array_ref(&slot, from_fields);
                if place.typ.is_array() {
                    return Err(CompileError::Type {
                        message: format!("array `{name}` used as a scalar"),
                        line: *line,
                    });
                }
                self.load_slot(place.start, place.is_field);
                Ok(place.typ)
            }
            Expr::Index(..) => {
                let (name, indices, line) = flatten_index_chain(expr)?;
                let (slot, from_fields) = self.lookup(name, line)?;
                let base = self.array_ref(&slot, from_fields);
                let place = self.resolve_indices(&base, &indices, line)?;
                if place.typ.is_array() {
                    return Err(CompileError::Type {
                        message: "array slice used as a scalar".into(),
                        line,
                    });
                }
                self.load_slot(place.start, place.is_field);
                Ok(place.typ)
            }
            Expr::Unary(UnOp::Not, inner, line) => {
                let typ = self.gen_scalar(inner, Some(&Type::Bool))?;
                if typ != Type::Bool {
                    return Err(CompileError::Type {
                        message: "`!` expects Bool".into(),
                        line: *line,
                    });
                }
                self.instrs.push(Instr::BoolNot);
                Ok(Type::Bool)
            }
            Expr::Unary(UnOp::Neg, inner, line) => {
                let typ = self.gen_scalar(inner, Some(&Type::I256))?;
                if typ != Type::I256 {
                    return Err(CompileError::Type {
                        message: "unary `-` expects I256".into(),
                        line: *line,
                    });
                }
                self.instrs.push(Instr::I256Neg);
                Ok(Type::I256)
            }
            Expr::Binary(op, left, right, line) => self.gen_binary(*op, left, right, *line),
            Expr::Call(name, args, line) => {
                let produced = self.gen_call(name, args, *line)?;
                match produced.len() {
                    1 => Ok(produced.into_iter().next().expect("one value")),
                    n => Err(CompileError::Type {
                        message: format!("call `{name}` produces {n} values in a scalar context"),
                        line: *line,
                    }),
                }
            }
            Expr::Builtin(name, args, line) => {
                let produced = self.gen_builtin(name, args, *line)?;
                match produced.len() {
                    1 => Ok(produced.into_iter().next().expect("one value")),
                    n => Err(CompileError::Type {
                        message: format!(
                            "builtin `{name}!` produces {n} values in a scalar context"
                        ),
                        line: *line,
                    }),
                }
            }
            Expr::ArrayLit(_, line) | Expr::ArrayRepeat(_, _, line) => Err(CompileError::Type {
                message: "array literal used as a scalar".into(),
                line: *line,
            }),
        }
    }

    fn literal_type(&self, text: &str, expected: Option<&Type>) -> Type {
        if text.ends_with('i') {
            Type::I256
        } else if text.ends_with('u') {
            Type::U256
        } else {
            match expected {
                Some(Type::I256) => Type::I256,
                _ => Type::U256,
            }
        }
    }

    fn gen_binary(
        &mut self,
        op: BinOp,
        left: &Expr,
        right: &Expr,
        line: usize,
    ) -> CompileResult<Type> {
        // Array equality is undefined by the language.
        let left_type_probe = self.type_of_expr(left, None)?;
        if left_type_probe.is_array() {
            return Err(CompileError::UnsupportedArrayOp {
                message: "arrays do not support operators".into(),
                line,
            });
        }

        match op {
            BinOp::And | BinOp::Or => {
                let lt = self.gen_scalar(left, Some(&Type::Bool))?;
                let rt = self.gen_scalar(right, Some(&Type::Bool))?;
                if lt != Type::Bool || rt != Type::Bool {
                    return Err(CompileError::Type {
                        message: "logical operators expect Bool".into(),
                        line,
                    });
                }
                self.instrs.push(match op {
                    BinOp::And => Instr::BoolAnd,
                    _ => Instr::BoolOr,
                });
                Ok(Type::Bool)
            }
            BinOp::Eq | BinOp::Neq => {
                let lt = self.gen_scalar(left, None)?;
                let rt = self.gen_scalar(right, Some(&lt))?;
                if lt != rt {
                    return Err(CompileError::Type {
                        message: format!(
                            "cannot compare {} with {}",
                            lt.display(),
                            rt.display()
                        ),
                        line,
                    });
                }
                self.instrs.push(match op {
                    BinOp::Eq => Instr::Eq,
                    _ => Instr::Neq,
                });
                Ok(Type::Bool)
            }
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                let lt = self.gen_scalar(left, Some(&left_type_probe))?;
                let rt = self.gen_scalar(right, Some(&lt))?;
                if lt != rt {
                    return Err(CompileError::Type {
                        message: format!("mixed arithmetic on {} and {}", lt.display(), rt.display()),
                        line,
                    });
                }
                let instr = match (&lt, op) {
                    (Type::U256, BinOp::Add) => Instr::U256Add,
                    (Type::U256, BinOp::Sub) => Instr::U256Sub,
                    (Type::U256, BinOp::Mul) => Instr::U256Mul,
                    (Type::U256, BinOp::Div) => Instr::U256Div,
                    (Type::U256, BinOp::Mod) => Instr::U256Mod,
                    (Type::I256, BinOp::Add) => Instr::I256Add,
                    (Type::I256, BinOp::Sub) => Instr::I256Sub,
                    (Type::I256, BinOp::Mul) => Instr::I256Mul,
                    (Type::I256, BinOp::Div) => Instr::I256Div,
                    (Type::I256, BinOp::Mod) => Instr::I256Mod,
                    (Type::ByteVec, BinOp::Add) => Instr::ByteVecConcat,
                    _ => {
                        return Err(CompileError::Type {
                            message: format!("arithmetic not defined on {}", lt.display()),
                            line,
                        });
                    }
                };
                self.instrs.push(instr);
                Ok(lt)
            }
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                let lt = self.gen_scalar(left, Some(&left_type_probe))?;
                let rt = self.gen_scalar(right, Some(&lt))?;
                if lt != rt || (lt != Type::U256 && lt != Type::I256) {
                    return Err(CompileError::Type {
                        message: "ordering expects matching numeric operands".into(),
                        line,
                    });
                }
                let instr = match (&lt, op) {
                    (Type::U256, BinOp::Lt) => Instr::U256Lt,
                    (Type::U256, BinOp::Le) => Instr::U256Le,
                    (Type::U256, BinOp::Gt) => Instr::U256Gt,
                    (Type::U256, BinOp::Ge) => Instr::U256Ge,
                    (Type::I256, BinOp::Lt) => Instr::I256Lt,
                    (Type::I256, BinOp::Le) => Instr::I256Le,
                    (Type::I256, BinOp::Gt) => Instr::I256Gt,
                    _ => Instr::I256Ge,
                };
                self.instrs.push(instr);
                Ok(Type::Bool)
            }
        }
    }

    /// Generate a local call; returns the produced value types.
    fn gen_call(&mut self, name: &str, args: &[Expr], line: usize) -> CompileResult<Vec<Type>> {
        let (index, params, returns) = {
            let sig = self
                .unit
                .functions
                .get(name)
                .ok_or_else(|| CompileError::Type {
                    message: format!("unknown function `{name}`"),
                    line,
                })?;
            (sig.index, sig.params.clone(), sig.returns.clone())
        };
        if args.len() != params.len() {
            return Err(CompileError::Type {
                message: format!(
                    "function `{name}` expects {} arguments, got {}",
                    params.len(),
                    args.len()
                ),
                line,
            });
        }
        for (arg, param_type) in args.iter().zip(params.iter()) {
            if param_type.is_array() {
                self.gen_array_values(arg, param_type)?;
            } else {
                let actual = self.gen_scalar(arg, Some(param_type))?;
                if actual != *param_type {
                    return Err(CompileError::Type {
                        message: format!(
                            "argument to `{name}` expects {}, got {}",
                            param_type.display(),
                            actual.display()
                        ),
                        line,
                    });
                }
            }
        }
        self.instrs.push(Instr::CallLocal(index));
        Ok(returns)
    }

    /// Generate a builtin call; returns the produced value types.
    fn gen_builtin(&mut self, name: &str, args: &[Expr], line: usize) -> CompileResult<Vec<Type>> {
        let stateless_violation = |this: &Self| -> CompileResult<()> {
            if this.unit.kind == ContractKind::AssetScript {
                return Err(CompileError::Type {
                    message: format!("`{name}!` is not available in an AssetScript"),
                    line,
                });
            }
            Ok(())
        };

        match name {
            "blake2b" | "keccak256" => {
                self.expect_args(name, args, &[Type::ByteVec], line)?;
                self.instrs.push(if name == "blake2b" {
                    Instr::Blake2b
                } else {
                    Instr::Keccak256
                });
                Ok(vec![Type::ByteVec])
            }
            "verifyTxSignature" => {
                self.expect_args(name, args, &[Type::ByteVec], line)?;
                self.instrs.push(Instr::VerifyTxSignature);
                Ok(Vec::new())
            }
            "txId" => {
                self.expect_args(name, args, &[], line)?;
                self.instrs.push(Instr::TxId);
                Ok(vec![Type::ByteVec])
            }
            "size" => {
                self.expect_args(name, args, &[Type::ByteVec], line)?;
                self.instrs.push(Instr::ByteVecSize);
                Ok(vec![Type::U256])
            }
            "approveAlph" => {
                stateless_violation(self)?;
                self.expect_args(name, args, &[Type::Address, Type::U256], line)?;
                self.instrs.push(Instr::ApproveAlph);
                Ok(Vec::new())
            }
            "approveToken" => {
                stateless_violation(self)?;
                self.expect_args(
                    name,
                    args,
                    &[Type::Address, Type::ByteVec, Type::U256],
                    line,
                )?;
                self.instrs.push(Instr::ApproveToken);
                Ok(Vec::new())
            }
            "transferAlph" => {
                stateless_violation(self)?;
                self.expect_args(
                    name,
                    args,
                    &[Type::Address, Type::Address, Type::U256],
                    line,
                )?;
                self.instrs.push(Instr::TransferAlph);
                Ok(Vec::new())
            }
            "transferToken" => {
                stateless_violation(self)?;
                self.expect_args(
                    name,
                    args,
                    &[Type::Address, Type::Address, Type::ByteVec, Type::U256],
                    line,
                )?;
                self.instrs.push(Instr::TransferToken);
                Ok(Vec::new())
            }
            "alphRemaining" => {
                stateless_violation(self)?;
                self.expect_args(name, args, &[Type::Address], line)?;
                self.instrs.push(Instr::AlphRemaining);
                Ok(vec![Type::U256])
            }
            "tokenRemaining" => {
                stateless_violation(self)?;
                self.expect_args(name, args, &[Type::Address, Type::ByteVec], line)?;
                self.instrs.push(Instr::TokenRemaining);
                Ok(vec![Type::U256])
            }
            other => Err(CompileError::Type {
                message: format!("unknown builtin `{other}!`"),
                line,
            }),
        }
    }

    fn expect_args(
        &mut self,
        name: &str,
        args: &[Expr],
        expected: &[Type],
        line: usize,
    ) -> CompileResult<()> {
        if args.len() != expected.len() {
            return Err(CompileError::Type {
                message: format!(
                    "builtin `{name}!` expects {} arguments, got {}",
                    expected.len(),
                    args.len()
                ),
                line,
            });
        }
        for (arg, typ) in args.iter().zip(expected.iter()) {
            let actual = self.gen_scalar(arg, Some(typ))?;
            if actual != *typ {
                return Err(CompileError::Type {
                    message: format!(
                        "builtin `{name}!` expects {}, got {}",
                        typ.display(),
                        actual.display()
                    ),
                    line,
                });
            }
        }
        Ok(())
    }

    /// Generate an expression for its effects; returns how many values it
    /// left on the stack.
    fn gen_for_effect(&mut self, expr: &Expr) -> CompileResult<usize> {
        match expr {
            Expr::Call(name, args, line) => {
                let produced = self.gen_call(name, args, *line)?;
                Ok(produced.iter().map(Type::flatten_len).sum())
            }
            Expr::Builtin(name, args, line) => {
                let produced = self.gen_builtin(name, args, *line)?;
                Ok(produced.len())
            }
            other => {
                self.gen_scalar(other, None)?;
                Ok(1)
            }
        }
    }

    // ---- arrays ----

    /// Push every flattened element of an array-typed expression.
    fn gen_array_values(&mut self, expr: &Expr, expected: &Type) -> CompileResult<()> {
        let Type::Array(element, size) = expected else {
            unreachable!("caller checked the array type");
        };
        match expr {
            Expr::ArrayLit(elements, line) => {
                if elements.len() != *size {
                    return Err(CompileError::Type {
                        message: format!(
                            "array literal has {} elements, expected {size}",
                            elements.len()
                        ),
                        line: *line,
                    });
                }
                for item in elements {
                    if element.is_array() {
                        self.gen_array_values(item, element)?;
                    } else {
                        let actual = self.gen_scalar(item, Some(element))?;
                        if actual != **element {
                            return Err(CompileError::Type {
                                message: format!(
                                    "array element expects {}, got {}",
                                    element.display(),
                                    actual.display()
                                ),
                                line: *line,
                            });
                        }
                    }
                }
                Ok(())
            }
            Expr::ArrayRepeat(item, count, line) => {
                if count != size {
                    return Err(CompileError::Type {
                        message: format!("repeat count {count} does not match length {size}"),
                        line: *line,
                    });
                }
                for _ in 0..*count {
                    if element.is_array() {
                        self.gen_array_values(item, element)?;
                    } else {
                        self.gen_scalar(item, Some(element))?;
                    }
                }
                Ok(())
            }
            Expr::Var(..) | Expr::Index(..) => {
                let actual = self.type_of_expr(expr, Some(expected))?;
                if actual != *expected {
                    return Err(CompileError::Type {
                        message: format!(
                            "expected {}, got {}",
                            expected.display(),
                            actual.display()
                        ),
                        line: expr.line(),
                    });
                }
                let place = self.place_of(expr)?;
                for offset in 0..expected.flatten_len() {
                    self.load_slot(place.start + offset as u16, place.is_field);
                }
                Ok(())
            }
            other => Err(CompileError::Type {
                message: "expression is not an array".into(),
                line: other.line(),
            }),
        }
    }

    /// Compile `target = <array expr>` as a slot-wise copy.
    fn gen_array_into(&mut self, expr: &Expr, target: &ArrayRef) -> CompileResult<()> {
        match expr {
            Expr::ArrayLit(..) | Expr::ArrayRepeat(..) => {
                self.gen_array_values(expr, &target.typ)?;
                // values sit in push order; store them back-to-front
                for offset in (0..target.typ.flatten_len()).rev() {
                    self.store_slot(target.start + offset as u16, target.is_field);
                }
                Ok(())
            }
            Expr::Var(..) | Expr::Index(..) => {
                let actual = self.type_of_expr(expr, Some(&target.typ))?;
                if actual != target.typ {
                    return Err(CompileError::Type {
                        message: format!(
                            "cannot assign {} to {}",
                            actual.display(),
                            target.typ.display()
                        ),
                        line: expr.line(),
                    });
                }
                let source = self.place_of(expr)?;
                // copy slot-wise, load then store per element
                for offset in 0..target.typ.flatten_len() {
                    self.load_slot(source.start + offset as u16, source.is_field);
                    self.store_slot(target.start + offset as u16, target.is_field);
                }
                Ok(())
            }
            other => Err(CompileError::Type {
                message: "expression is not an array".into(),
                line: other.line(),
            }),
        }
    }

    /// Resolve a Var/Index expression to its slot place.
    fn place_of(&mut self, expr: &Expr) -> CompileResult<ArrayRef> {
        match expr {
            Expr::Var(name, line) => {
                let (slot, from_fields) = self.lookup(name, *line)?;
                Ok(self.array_ref(&slot, from_fields))
            }
            Expr::Index(..) => {
                let (name, indices, line) = flatten_index_chain(expr)?;
                let (slot, from_fields) = self.lookup(name, line)?;
                let base = self.array_ref(&slot, from_fields);
                self.resolve_indices(&base, &indices, line)
            }
            other => Err(CompileError::Type {
                message: "expected a variable or index expression".into(),
                line: other.line(),
            }),
        }
    }

    // ---- pure typing (no codegen), used by emit and probes ----

    fn type_of_expr(&self, expr: &Expr, expected: Option<&Type>) -> CompileResult<Type> {
        match expr {
            Expr::BoolLit(..) => Ok(Type::Bool),
            Expr::NumLit(text, _) => Ok(self.literal_type(text, expected)),
            Expr::Var(name, line) => {
                let (slot, from_fields) = self.lookup(name, *line)?;
                Ok(self.array_ref(&slot, from_fields).typ)
            }
            Expr::Index(..) => {
                let (name, indices, line) = flatten_index_chain(expr)?;
                let (slot, from_fields) = self.lookup(name, line)?;
                let mut typ = self.array_ref(&slot, from_fields).typ;
                for _ in &indices {
                    match typ {
                        Type::Array(element, _) => typ = *element,
                        _ => {
                            return Err(CompileError::Type {
                                message: "indexing a non-array value".into(),
                                line,
                            });
                        }
                    }
                }
                Ok(typ)
            }
            Expr::Unary(UnOp::Not, ..) => Ok(Type::Bool),
            Expr::Unary(UnOp::Neg, ..) => Ok(Type::I256),
            Expr::Binary(op, left, _, _) => match op {
                BinOp::And | BinOp::Or | BinOp::Eq | BinOp::Neq | BinOp::Lt | BinOp::Le
                | BinOp::Gt | BinOp::Ge => Ok(Type::Bool),
                _ => self.type_of_expr(left, expected),
            },
            Expr::Call(name, _, line) => {
                let sig = self
                    .unit
                    .functions
                    .get(name)
                    .ok_or_else(|| CompileError::Type {
                        message: format!("unknown function `{name}`"),
                        line: *line,
                    })?;
                match sig.returns.len() {
                    1 => Ok(sig.returns[0].clone()),
                    n => Err(CompileError::Type {
                        message: format!("call `{name}` produces {n} values in value position"),
                        line: *line,
                    }),
                }
            }
            Expr::Builtin(name, _, line) => match name.as_str() {
                "blake2b" | "keccak256" | "txId" => Ok(Type::ByteVec),
                "size" | "alphRemaining" | "tokenRemaining" => Ok(Type::U256),
                _ => Err(CompileError::Type {
                    message: format!("builtin `{name}!` produces no value"),
                    line: *line,
                }),
            },
            Expr::ArrayLit(elements, line) => {
                let element_type = match (elements.first(), expected) {
                    (_, Some(Type::Array(element, _))) => (**element).clone(),
                    (Some(first), _) => self.type_of_expr(first, None)?,
                    (None, _) => {
                        return Err(CompileError::Type {
                            message: "cannot infer type of empty array".into(),
                            line: *line,
                        });
                    }
                };
                Ok(Type::Array(Box::new(element_type), elements.len()))
            }
            Expr::ArrayRepeat(item, count, _) => {
                let element_type = match expected {
                    Some(Type::Array(element, _)) => (**element).clone(),
                    _ => self.type_of_expr(item, None)?,
                };
                Ok(Type::Array(Box::new(element_type), *count))
            }
        }
    }
}

/// Collapse `name[i][j]…` into its base name and index list.
fn flatten_index_chain(expr: &Expr) -> CompileResult<(&str, Vec<Expr>, usize)> {
    let mut indices = Vec::new();
    let mut cursor = expr;
    loop {
        match cursor {
            Expr::Index(base, index, _) => {
                indices.push((**index).clone());
                cursor = base;
            }
            Expr::Var(name, line) => {
                indices.reverse();
                return Ok((name, indices, *line));
            }
            other => {
                return Err(CompileError::UnsupportedArrayOp {
                    message: "only named arrays can be indexed".into(),
                    line: other.line(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_codegen() {
        let source = r#"
            TxContract Foo(x: U256) {
                pub fn add(a: U256) -> U256 { return square(x) + square(a) }
                fn square(n) -> U256 { return n * n }
            }
        "#;
        let first = crate::compile_contract(source).unwrap();
        let second = crate::compile_contract(source).unwrap();
        assert_eq!(
            flow_types::Codec::encode(&first),
            flow_types::Codec::encode(&second)
        );
    }

    #[test]
    fn test_method_shape() {
        let source = r#"
            TxContract Foo(x: U256) {
                pub fn add(a: U256) -> U256 { return square(x) + square(a) }
                fn square(n) -> U256 { return n * n }
            }
        "#;
        let contract = crate::compile_contract(source).unwrap();
        assert_eq!(contract.methods.len(), 2);
        assert_eq!(contract.field_types, vec![ValType::U256]);

        let add = &contract.methods[0];
        assert!(add.is_public);
        assert_eq!((add.args_len, add.return_len), (1, 1));

        let square = &contract.methods[1];
        assert!(!square.is_public);
        assert_eq!((square.args_len, square.return_len), (1, 1));
    }

    #[test]
    fn test_array_flattening() {
        let source = r#"
            TxContract Grid(cells: [[U256; 2]; 2]) {
                pub fn corner() -> U256 { return cells[1][1] }
            }
        "#;
        let contract = crate::compile_contract(source).unwrap();
        assert_eq!(contract.field_types, vec![ValType::U256; 4]);
        // cells[1][1] resolves statically to slot 3
        assert!(contract.methods[0]
            .instrs
            .contains(&Instr::LoadField(3)));
    }

    #[test]
    fn test_array_copy_is_slotwise() {
        let source = r#"
            TxScript Main {
                pub fn main() -> U256 {
                    let a = [1, 2, 3]
                    let b = [0; 3]
                    b = a
                    return b[2]
                }
            }
        "#;
        let script = crate::compile_script(source).unwrap();
        let instrs = &script.methods[0].instrs;
        // the copy emits load/store pairs for each of the three slots
        let copies = instrs
            .windows(2)
            .filter(|w| {
                matches!(w[0], Instr::LoadLocal(_)) && matches!(w[1], Instr::StoreLocal(_))
            })
            .count();
        assert!(copies >= 3);
    }

    #[test]
    fn test_dynamic_index_rejected() {
        let source = r#"
            TxScript Main {
                pub fn main(i: U256) -> U256 {
                    let a = [1, 2, 3]
                    return a[i]
                }
            }
        "#;
        assert!(matches!(
            compile(source),
            Err(CompileError::UnsupportedArrayOp { .. })
        ));
    }

    #[test]
    fn test_array_equality_rejected() {
        let source = r#"
            TxScript Main {
                pub fn main() -> Bool {
                    let a = [1, 2]
                    let b = [1, 2]
                    return a == b
                }
            }
        "#;
        assert!(matches!(
            compile(source),
            Err(CompileError::UnsupportedArrayOp { .. })
        ));
    }

    #[test]
    fn test_duplicate_function_rejected() {
        let source = r#"
            TxScript Main {
                pub fn main() {}
                fn main() {}
            }
        "#;
        assert!(matches!(
            compile(source),
            Err(CompileError::Duplicate {
                what: "function",
                ..
            })
        ));
    }

    #[test]
    fn test_script_visibility_restriction() {
        let bad_first = "TxScript Main { fn main() {} }";
        assert!(matches!(compile(bad_first), Err(CompileError::Type { .. })));

        let bad_second = r#"
            TxScript Main {
                pub fn main() {}
                pub fn other() {}
            }
        "#;
        assert!(matches!(compile(bad_second), Err(CompileError::Type { .. })));

        // contracts have no such restriction
        let contract = r#"
            TxContract C(x: U256) {
                pub fn a() {}
                pub fn b() {}
            }
        "#;
        assert!(compile(contract).is_ok());
    }

    #[test]
    fn test_unknown_event_rejected() {
        let source = r#"
            TxContract C(x: U256) {
                pub fn go() { emit Missing(x) }
            }
        "#;
        assert!(matches!(compile(source), Err(CompileError::Type { .. })));
    }

    #[test]
    fn test_event_type_mismatch_rejected() {
        let source = r#"
            TxContract C(x: U256) {
                event Done(flag: Bool)
                pub fn go() { emit Done(x) }
            }
        "#;
        assert!(matches!(compile(source), Err(CompileError::Type { .. })));
    }

    #[test]
    fn test_emit_generates_no_instructions() {
        let with_emit = r#"
            TxContract C(x: U256) {
                event Done(value: U256)
                pub fn go() { emit Done(x) }
            }
        "#;
        let without_emit = r#"
            TxContract C(x: U256) {
                event Done(value: U256)
                pub fn go() { }
            }
        "#;
        let a = crate::compile_contract(with_emit).unwrap();
        let b = crate::compile_contract(without_emit).unwrap();
        assert_eq!(a.methods[0].instrs, b.methods[0].instrs);
    }

    #[test]
    fn test_if_codegen_shape() {
        let source = r#"
            TxScript Main {
                pub fn main(a: U256) -> U256 {
                    if a > 1 { return 1 } else { return 0 }
                }
            }
        "#;
        let script = crate::compile_script(source).unwrap();
        let instrs = &script.methods[0].instrs;
        // cond, IfFalse over then+jump, then-return, Jump over else, else-return
        assert!(instrs.iter().any(|i| matches!(i, Instr::IfFalse(_))));
        assert!(instrs.iter().any(|i| matches!(i, Instr::Jump(_))));
    }

    #[test]
    fn test_negated_condition_uses_if_true() {
        let source = r#"
            TxScript Main {
                pub fn main(flag: Bool) -> U256 {
                    if !flag { return 1 }
                    return 0
                }
            }
        "#;
        let script = crate::compile_script(source).unwrap();
        assert!(script.methods[0]
            .instrs
            .iter()
            .any(|i| matches!(i, Instr::IfTrue(_))));
    }

    #[test]
    fn test_branch_overflow_rejected() {
        // a then-branch of ~200 statements exceeds the one-byte offset
        let mut body = String::new();
        for _ in 0..260 {
            body.push_str("n = n + 1\n");
        }
        let source = format!(
            r#"
            TxScript Main {{
                pub fn main() -> U256 {{
                    let n = 0
                    if n < 1 {{ {body} }}
                    return n
                }}
            }}
        "#
        );
        assert!(matches!(
            compile(&source),
            Err(CompileError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_stateless_script_rejects_balance_builtins() {
        let source = r#"
            AssetScript Unlock {
                pub fn unlock(a: Address) { alphRemaining!(a) }
            }
        "#;
        assert!(matches!(compile(source), Err(CompileError::Type { .. })));
    }

    #[test]
    fn test_payable_flag_carried() {
        let source = r#"
            TxScript Pay {
                pub payable fn main(from: Address, to: Address, amount: U256) {
                    transferAlph!(from, to, amount)
                }
            }
        "#;
        let script = crate::compile_script(source).unwrap();
        assert!(script.methods[0].is_payable);
    }
}
