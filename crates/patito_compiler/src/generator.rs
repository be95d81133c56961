//! Semantic analysis and quadruple generation in a single tree walk.
//!
//! [`QuadGenerator`] implements [`Listener`]: expressions leave `(address, type)`
//! pairs on an operand stack, statements consume them and emit quadruples, and
//! forward jumps wait on a tagged backpatch stack until their target is known.

use crate::constants::{literal_value, ConstantPool};
use crate::cube::{check_assignment, check_binary_op};
use crate::error::SemanticError;
use crate::memory::VirtualMemory;
use crate::symbols::{FunctionDirectory, Scope, VarInfo};
use patito_syntax::ast::{BinOp, Block, Call, Expr, FuncDecl, Literal, ReturnType, Root, Stmt, Type, UnOp};
use patito_syntax::ir::{DebugSymbol, Opcode, Operand, Program, Quadruple, Value};
use patito_syntax::segment::{Address, MemoryLayout, ScopeClass, MAX_SEGMENT_SIZE};
use patito_syntax::span::Span;
use patito_syntax::walk::{CallSite, ConditionOf, Listener};
use std::fmt;

/// What a pending forward jump is waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JumpKind {
    /// The leading `GOTO` over the function bodies.
    Main,
    /// `GOTOF` of an `if` condition.
    IfFalse,
    /// `GOTO` at the end of a then-block that skips the else-block.
    IfEnd,
    /// `GOTOF` leaving a `while`.
    WhileExit,
}

impl JumpKind {
    pub fn name(self) -> &'static str {
        match self {
            JumpKind::Main => "main",
            JumpKind::IfFalse => "if-false",
            JumpKind::IfEnd => "if-end",
            JumpKind::WhileExit => "while-exit",
        }
    }
}

impl fmt::Display for JumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug)]
struct StackEntry {
    addr: Address,
    ty: Type,
}

pub struct QuadGenerator {
    name: String,
    memory: VirtualMemory,
    dir: FunctionDirectory,
    constants: ConstantPool,
    quads: Vec<Quadruple>,
    operands: Vec<StackEntry>,
    jumps: Vec<(JumpKind, usize)>,
    loop_starts: Vec<usize>,
    symbols: Vec<DebugSymbol>,
    temps: usize,
    span: Span,
}

impl QuadGenerator {
    pub fn new(layout: MemoryLayout) -> Self {
        Self {
            name: String::new(),
            memory: VirtualMemory::new(layout),
            dir: FunctionDirectory::new(),
            constants: ConstantPool::new(),
            quads: Vec::new(),
            operands: Vec::new(),
            jumps: Vec::new(),
            loop_starts: Vec::new(),
            symbols: Vec::new(),
            temps: 0,
            span: Span::default(),
        }
    }

    pub fn quadruples(&self) -> &[Quadruple] {
        &self.quads
    }

    /// Forward jumps still waiting for a target. Zero after a successful walk.
    pub fn pending_jumps(&self) -> usize {
        self.jumps.len()
    }

    /// Span of the construct being processed when the last error was raised.
    pub fn error_span(&self) -> Span {
        self.span
    }

    pub fn finish(self) -> Program {
        Program {
            name: self.name,
            segment_size: self.memory.layout().segment_size(),
            quadruples: self.quads,
            constants: self.constants.into_entries(),
            symbols: self.symbols,
        }
    }

    fn emit(&mut self, op: Opcode, arg1: Operand, arg2: Operand, result: Operand) -> usize {
        let index = self.quads.len();
        let quad = Quadruple::new(op, arg1, arg2, result);
        tracing::debug!(index, %quad, "emit");
        self.quads.push(quad);
        index
    }

    fn push_jump(&mut self, kind: JumpKind, index: usize) {
        self.jumps.push((kind, index));
    }

    fn pop_jump(&mut self, expected: JumpKind) -> Result<usize, SemanticError> {
        match self.jumps.pop() {
            Some((kind, index)) if kind == expected => Ok(index),
            Some((kind, _)) => Err(SemanticError::MismatchedJump {
                expected: expected.name(),
                found: kind.to_string(),
            }),
            None => Err(SemanticError::MismatchedJump {
                expected: expected.name(),
                found: "nothing".to_string(),
            }),
        }
    }

    /// Points the jump at `index` to `target`.
    fn backpatch(&mut self, index: usize, target: usize) {
        tracing::debug!(index, target, "backpatch");
        if let Some(quad) = self.quads.get_mut(index) {
            quad.result = Operand::Jump(Some(target));
        }
    }

    fn push_operand(&mut self, addr: Address, ty: Type) {
        self.operands.push(StackEntry { addr, ty });
    }

    fn pop_operand(&mut self) -> Result<StackEntry, SemanticError> {
        self.operands.pop().ok_or(SemanticError::OperandUnderflow)
    }

    /// The top `count` operands, bottom first.
    fn pop_operands(&mut self, count: usize) -> Result<Vec<StackEntry>, SemanticError> {
        let split = self
            .operands
            .len()
            .checked_sub(count)
            .ok_or(SemanticError::OperandUnderflow)?;
        Ok(self.operands.split_off(split))
    }

    fn new_temp(&mut self, ty: Type) -> Result<Address, SemanticError> {
        let addr = self.memory.allocate(ScopeClass::Temporary, ty)?;
        self.symbols.push(DebugSymbol {
            address: addr,
            name: format!("t{}", self.temps),
        });
        self.temps += 1;
        Ok(addr)
    }

    fn constant(&mut self, value: Value) -> Result<Address, SemanticError> {
        let before = self.constants.len();
        let repr = match &value {
            Value::Str(s) => format!("{:?}", s),
            other => other.to_string(),
        };
        let addr = self.constants.intern(&mut self.memory, value)?;
        if self.constants.len() > before {
            self.symbols.push(DebugSymbol {
                address: addr,
                name: repr,
            });
        }
        Ok(addr)
    }

    fn record_var(&mut self, owner: &str, info: &VarInfo) {
        self.symbols.push(DebugSymbol {
            address: info.address,
            name: format!("{}.{}", owner, info.name),
        });
    }

    /// Copies the top operand into the function's return slot and leaves it.
    fn emit_return(&mut self, scope: &Scope) -> Result<(), SemanticError> {
        let name = scope
            .function_name()
            .ok_or(SemanticError::ReturnOutsideFunction)?;
        let func = self.dir.lookup_function(name)?;
        let (ty, slot) = match (func.return_ty, func.return_slot) {
            (Some(ty), Some(slot)) => (ty, slot),
            _ => {
                return Err(SemanticError::VoidReturnsValue {
                    name: name.to_string(),
                })
            }
        };
        let value = self.pop_operand()?;
        check_assignment(name, ty, value.ty)?;
        self.emit(Opcode::Assign, Operand::Addr(value.addr), Operand::Empty, Operand::Addr(slot));
        self.emit(Opcode::Ret, Operand::Empty, Operand::Empty, Operand::Empty);
        self.dir.mark_returned(scope)
    }
}

impl Listener for QuadGenerator {
    type Scope = Scope;
    type Error = SemanticError;

    fn enter_program(&mut self, program: &Root) -> Result<Scope, SemanticError> {
        self.span = program.span;
        self.name = program.name.clone();
        let size = self.memory.layout().segment_size();
        if MemoryLayout::checked(size).is_none() {
            return Err(SemanticError::SegmentSizeTooLarge {
                size,
                max: MAX_SEGMENT_SIZE,
            });
        }
        let goto_main = self.emit(Opcode::Goto, Operand::Empty, Operand::Empty, Operand::Jump(None));
        self.push_jump(JumpKind::Main, goto_main);

        let global = Scope::Global;
        for decl in &program.globals {
            for (name, span) in &decl.names {
                self.span = *span;
                let info = self.dir.declare_variable(&mut self.memory, &global, name, decl.ty)?;
                self.record_var("global", &info);
            }
        }
        Ok(global)
    }

    fn enter_function(&mut self, _global: &Scope, func: &FuncDecl) -> Result<Scope, SemanticError> {
        self.span = func.span;
        let scope = self.dir.declare_function(&mut self.memory, &func.name, func.return_ty)?;
        if let Some(slot) = self.dir.lookup_function(&func.name)?.return_slot {
            self.symbols.push(DebugSymbol {
                address: slot,
                name: format!("{}.return", func.name),
            });
        }
        for param in &func.params {
            self.span = param.span;
            let info = self.dir.declare_param(&mut self.memory, &scope, &param.name, param.ty)?;
            self.record_var(&func.name, &info);
        }
        for decl in &func.locals {
            for (name, span) in &decl.names {
                self.span = *span;
                let info = self.dir.declare_variable(&mut self.memory, &scope, name, decl.ty)?;
                self.record_var(&func.name, &info);
            }
        }
        let entry = self.quads.len();
        self.dir.set_entry_index(&scope, entry)?;
        tracing::debug!(
            function = %func.name,
            returns = %ReturnType(func.return_ty),
            params = func.params.len(),
            entry,
            "function declared"
        );
        Ok(scope)
    }

    fn exit_function(&mut self, func: &FuncDecl, scope: Scope) -> Result<(), SemanticError> {
        self.span = func.span;
        let entry = self.dir.close_function(scope)?;
        if let (Some(ty), false) = (entry.return_ty, entry.has_returned) {
            return Err(SemanticError::MissingReturn {
                name: entry.name.clone(),
                ty,
            });
        }
        self.emit(Opcode::EndFunc, Operand::Empty, Operand::Empty, Operand::Empty);
        Ok(())
    }

    fn enter_main(&mut self, _global: &Scope, main: &Block) -> Result<(), SemanticError> {
        self.span = main.span;
        let goto_main = self.pop_jump(JumpKind::Main)?;
        let target = self.quads.len();
        self.backpatch(goto_main, target);
        Ok(())
    }

    fn exit_program(&mut self, program: &Root, _global: Scope) -> Result<(), SemanticError> {
        self.span = program.span;
        if let Some((kind, _)) = self.jumps.last() {
            return Err(SemanticError::MismatchedJump {
                expected: "no pending",
                found: kind.to_string(),
            });
        }
        tracing::info!(
            program = %self.name,
            quadruples = self.quads.len(),
            constants = self.constants.len(),
            globals = self.dir.globals().count(),
            functions = self.dir.functions().count(),
            "generation complete"
        );
        Ok(())
    }

    fn exit_assign(&mut self, scope: &Scope, target: &str, stmt: &Stmt) -> Result<(), SemanticError> {
        self.span = stmt.span();
        if scope.function_name() == Some(target) {
            return self.emit_return(scope);
        }
        let var = self.dir.lookup(scope, target)?.clone();
        let value = self.pop_operand()?;
        check_assignment(target, var.ty, value.ty)?;
        self.emit(
            Opcode::Assign,
            Operand::Addr(value.addr),
            Operand::Empty,
            Operand::Addr(var.address),
        );
        Ok(())
    }

    fn exit_condition(&mut self, _scope: &Scope, of: ConditionOf, cond: &Expr) -> Result<(), SemanticError> {
        self.span = cond.span();
        let value = self.pop_operand()?;
        let (construct, kind) = match of {
            ConditionOf::If => ("if", JumpKind::IfFalse),
            ConditionOf::While => ("while", JumpKind::WhileExit),
        };
        if value.ty != Type::Bool {
            return Err(SemanticError::NonBooleanCondition {
                construct,
                found: value.ty,
            });
        }
        let index = self.emit(
            Opcode::GotoF,
            Operand::Addr(value.addr),
            Operand::Empty,
            Operand::Jump(None),
        );
        self.push_jump(kind, index);
        Ok(())
    }

    fn exit_then(&mut self, _scope: &Scope, has_else: bool) -> Result<(), SemanticError> {
        let goto_false = self.pop_jump(JumpKind::IfFalse)?;
        if has_else {
            let goto_end = self.emit(Opcode::Goto, Operand::Empty, Operand::Empty, Operand::Jump(None));
            self.push_jump(JumpKind::IfEnd, goto_end);
        }
        let target = self.quads.len();
        self.backpatch(goto_false, target);
        Ok(())
    }

    fn exit_else(&mut self, _scope: &Scope) -> Result<(), SemanticError> {
        let goto_end = self.pop_jump(JumpKind::IfEnd)?;
        let target = self.quads.len();
        self.backpatch(goto_end, target);
        Ok(())
    }

    fn enter_while(&mut self, _scope: &Scope, stmt: &Stmt) -> Result<(), SemanticError> {
        self.span = stmt.span();
        self.loop_starts.push(self.quads.len());
        Ok(())
    }

    fn exit_while(&mut self, _scope: &Scope, stmt: &Stmt) -> Result<(), SemanticError> {
        self.span = stmt.span();
        let exit = self.pop_jump(JumpKind::WhileExit)?;
        let start = self
            .loop_starts
            .pop()
            .ok_or(SemanticError::MismatchedJump {
                expected: "loop start",
                found: "nothing".to_string(),
            })?;
        self.emit(Opcode::Goto, Operand::Empty, Operand::Empty, Operand::Jump(Some(start)));
        let target = self.quads.len();
        self.backpatch(exit, target);
        Ok(())
    }

    fn exit_print(&mut self, _scope: &Scope, argc: usize, stmt: &Stmt) -> Result<(), SemanticError> {
        self.span = stmt.span();
        if argc == 0 {
            self.emit(Opcode::Print, Operand::Empty, Operand::Empty, Operand::Empty);
            return Ok(());
        }
        for arg in self.pop_operands(argc)? {
            self.emit(Opcode::Print, Operand::Addr(arg.addr), Operand::Empty, Operand::Empty);
        }
        Ok(())
    }

    fn exit_return(&mut self, scope: &Scope, stmt: &Stmt) -> Result<(), SemanticError> {
        self.span = stmt.span();
        self.emit_return(scope)
    }

    fn exit_literal(&mut self, _scope: &Scope, value: &Literal, expr: &Expr) -> Result<(), SemanticError> {
        self.span = expr.span();
        let addr = self.constant(literal_value(value))?;
        self.push_operand(addr, value.ty());
        Ok(())
    }

    fn exit_ident(&mut self, scope: &Scope, name: &str, expr: &Expr) -> Result<(), SemanticError> {
        self.span = expr.span();
        let var = self.dir.lookup(scope, name)?;
        let (addr, ty) = (var.address, var.ty);
        self.push_operand(addr, ty);
        Ok(())
    }

    fn exit_binary(&mut self, _scope: &Scope, op: BinOp, expr: &Expr) -> Result<(), SemanticError> {
        self.span = expr.span();
        let right = self.pop_operand()?;
        let left = self.pop_operand()?;
        let ty = check_binary_op(op, left.ty, right.ty)?;
        let result = self.new_temp(ty)?;
        self.emit(
            binary_opcode(op),
            Operand::Addr(left.addr),
            Operand::Addr(right.addr),
            Operand::Addr(result),
        );
        self.push_operand(result, ty);
        Ok(())
    }

    fn exit_unary(&mut self, _scope: &Scope, op: UnOp, expr: &Expr) -> Result<(), SemanticError> {
        self.span = expr.span();
        let operand = self.pop_operand()?;
        match op {
            UnOp::Plus => {
                check_binary_op(BinOp::Add, operand.ty, operand.ty)?;
                self.push_operand(operand.addr, operand.ty);
            }
            UnOp::Neg => {
                // -x lowers to 0 - x with a zero of the operand's own type.
                let ty = check_binary_op(BinOp::Sub, operand.ty, operand.ty)?;
                let zero = self.constant(Value::default_for(operand.ty))?;
                let result = self.new_temp(ty)?;
                self.emit(
                    Opcode::Sub,
                    Operand::Addr(zero),
                    Operand::Addr(operand.addr),
                    Operand::Addr(result),
                );
                self.push_operand(result, ty);
            }
        }
        Ok(())
    }

    fn exit_call(&mut self, _scope: &Scope, call: &Call, site: CallSite) -> Result<(), SemanticError> {
        self.span = call.span;
        let func = self.dir.lookup_function(&call.callee)?;
        let (return_ty, return_slot, entry) = (func.return_ty, func.return_slot, func.entry_index);
        let params = func.params.clone();

        if site == CallSite::Expression && return_ty.is_none() {
            return Err(SemanticError::VoidInExpression {
                name: call.callee.clone(),
            });
        }
        if call.args.len() != params.len() {
            return Err(SemanticError::ArityMismatch {
                name: call.callee.clone(),
                expected: params.len(),
                found: call.args.len(),
            });
        }

        let args = self.pop_operands(call.args.len())?;
        self.emit(
            Opcode::Era,
            Operand::Empty,
            Operand::Empty,
            Operand::Func(call.callee.clone()),
        );
        for (arg, param) in args.iter().zip(&params) {
            check_assignment(&param.name, param.ty, arg.ty)?;
            self.emit(
                Opcode::Param,
                Operand::Addr(arg.addr),
                Operand::Empty,
                Operand::Addr(param.address),
            );
        }
        self.emit(
            Opcode::GoSub,
            Operand::Func(call.callee.clone()),
            Operand::Empty,
            Operand::Jump(entry),
        );

        if let (CallSite::Expression, Some(ty), Some(slot)) = (site, return_ty, return_slot) {
            let result = self.new_temp(ty)?;
            self.emit(Opcode::Assign, Operand::Addr(slot), Operand::Empty, Operand::Addr(result));
            self.push_operand(result, ty);
        }
        Ok(())
    }
}

fn binary_opcode(op: BinOp) -> Opcode {
    match op {
        BinOp::Add => Opcode::Add,
        BinOp::Sub => Opcode::Sub,
        BinOp::Mul => Opcode::Mul,
        BinOp::Div => Opcode::Div,
        BinOp::Rem => Opcode::Rem,
        BinOp::Gt => Opcode::Gt,
        BinOp::Lt => Opcode::Lt,
        BinOp::Ge => Opcode::Ge,
        BinOp::Le => Opcode::Le,
        BinOp::Eq => Opcode::Eq,
        BinOp::Ne => Opcode::Ne,
    }
}
