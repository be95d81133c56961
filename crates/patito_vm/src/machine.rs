//! Fetch-execute loop over a quadruple program.

use crate::error::RuntimeError;
use crate::memory::ExecutionMemory;
use patito_syntax::ir::{Opcode, Operand, Program, Quadruple, Value};
use patito_syntax::segment::{Address, MAX_SEGMENT_SIZE};
use std::io::Write;

pub const DEFAULT_MAX_CALL_DEPTH: usize = 1024;

/// Where execution continues after one instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Next,
    Jump(usize),
}

pub struct VirtualMachine<'p, W: Write> {
    program: &'p Program,
    memory: ExecutionMemory,
    return_ips: Vec<usize>,
    ip: usize,
    out: W,
    max_call_depth: usize,
}

impl<'p, W: Write> VirtualMachine<'p, W> {
    pub fn new(program: &'p Program, out: W) -> Result<Self, RuntimeError> {
        let layout = program.layout().ok_or(RuntimeError::InvalidSegmentSize {
            size: program.segment_size,
            max: MAX_SEGMENT_SIZE,
        })?;
        let memory = ExecutionMemory::new(layout, &program.constants)?;
        Ok(Self {
            program,
            memory,
            return_ips: Vec::new(),
            ip: 0,
            out,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        })
    }

    /// Caps the number of live activation records, `main` included.
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth.max(1);
        self
    }

    pub fn memory(&self) -> &ExecutionMemory {
        &self.memory
    }

    pub fn ip(&self) -> usize {
        self.ip
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Runs until the instruction pointer leaves the program.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        tracing::debug!(
            program = %self.program.name,
            quadruples = self.program.quadruples.len(),
            "vm start"
        );
        let len = self.program.quadruples.len();
        while self.ip < len {
            match self.step()? {
                Step::Next => self.ip += 1,
                Step::Jump(target) if target <= len => self.ip = target,
                Step::Jump(target) => {
                    return Err(RuntimeError::MalformedQuadruple {
                        index: self.ip,
                        reason: format!("jump target {} is past the end of the program", target),
                    })
                }
            }
        }
        self.out.flush()?;
        tracing::debug!("vm halt");
        Ok(())
    }

    /// Executes the quadruple at the instruction pointer.
    pub fn step(&mut self) -> Result<Step, RuntimeError> {
        let index = self.ip;
        let program = self.program;
        let quad = program
            .quadruples
            .get(index)
            .ok_or_else(|| RuntimeError::MalformedQuadruple {
                index,
                reason: "instruction pointer out of range".to_string(),
            })?;
        tracing::trace!(ip = index, %quad, "exec");

        match quad.op {
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Rem
            | Opcode::Gt
            | Opcode::Lt
            | Opcode::Ge
            | Opcode::Le
            | Opcode::Eq
            | Opcode::Ne => {
                let lhs = self.memory.read(addr(quad, &quad.arg1, index)?)?;
                let rhs = self.memory.read(addr(quad, &quad.arg2, index)?)?;
                let value = binary(quad.op, &lhs, &rhs)?;
                self.memory.write(addr(quad, &quad.result, index)?, value)?;
                Ok(Step::Next)
            }
            Opcode::Assign => {
                let value = self.memory.read(addr(quad, &quad.arg1, index)?)?;
                self.memory.write(addr(quad, &quad.result, index)?, value)?;
                Ok(Step::Next)
            }
            Opcode::Goto => Ok(Step::Jump(target(quad, index)?)),
            Opcode::GotoF => {
                let cond = self.memory.read(addr(quad, &quad.arg1, index)?)?;
                if cond.is_truthy() {
                    Ok(Step::Next)
                } else {
                    Ok(Step::Jump(target(quad, index)?))
                }
            }
            Opcode::Print => {
                match &quad.arg1 {
                    Operand::Empty => writeln!(self.out)?,
                    operand => {
                        let value = self.memory.read(addr(quad, operand, index)?)?;
                        writeln!(self.out, "{}", value)?;
                    }
                }
                Ok(Step::Next)
            }
            Opcode::Era => {
                let function = func(quad, &quad.result, index)?;
                self.memory.prepare(function);
                Ok(Step::Next)
            }
            Opcode::Param => {
                let value = self.memory.read(addr(quad, &quad.arg1, index)?)?;
                self.memory
                    .write_param(addr(quad, &quad.result, index)?, value)?;
                Ok(Step::Next)
            }
            Opcode::GoSub => {
                let function = func(quad, &quad.arg1, index)?;
                let entry = target(quad, index)?;
                if self.memory.depth() >= self.max_call_depth {
                    return Err(RuntimeError::CallDepthExceeded {
                        limit: self.max_call_depth,
                    });
                }
                self.memory.push_pending(function)?;
                self.return_ips.push(index + 1);
                tracing::debug!(function, entry, depth = self.memory.depth(), "call");
                Ok(Step::Jump(entry))
            }
            Opcode::Ret | Opcode::EndFunc => {
                let back = self.return_ips.pop().ok_or(RuntimeError::UnboundReturn)?;
                let record = self.memory.pop_activation()?;
                tracing::debug!(
                    function = %record.function,
                    caller = self.memory.current_function(),
                    back,
                    "return"
                );
                Ok(Step::Jump(back))
            }
        }
    }
}

fn addr(quad: &Quadruple, operand: &Operand, index: usize) -> Result<Address, RuntimeError> {
    operand.addr().ok_or_else(|| RuntimeError::MalformedQuadruple {
        index,
        reason: format!("'{}' expects an address, found '{}' in {}", quad.op, operand, quad),
    })
}

fn target(quad: &Quadruple, index: usize) -> Result<usize, RuntimeError> {
    quad.result.jump().ok_or_else(|| RuntimeError::MalformedQuadruple {
        index,
        reason: format!("'{}' has no jump target in {}", quad.op, quad),
    })
}

fn func<'q>(quad: &Quadruple, operand: &'q Operand, index: usize) -> Result<&'q str, RuntimeError> {
    match operand {
        Operand::Func(name) => Ok(name),
        _ => Err(RuntimeError::MalformedQuadruple {
            index,
            reason: format!("'{}' expects a function name in {}", quad.op, quad),
        }),
    }
}

fn unsupported(op: Opcode, lhs: &Value, rhs: &Value) -> RuntimeError {
    RuntimeError::UnsupportedOpcode {
        op,
        operands: format!("{} and {}", lhs.ty(), rhs.ty()),
    }
}

fn binary(op: Opcode, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    use Value::*;
    match (lhs, rhs) {
        (Int(a), Int(b)) => int_binary(op, *a, *b),
        (Int(_) | Float(_), Int(_) | Float(_)) => {
            let (a, b) = (as_float(lhs), as_float(rhs));
            float_binary(op, a, b).ok_or_else(|| unsupported(op, lhs, rhs))?
        }
        (Bool(a), Bool(b)) => match op {
            Opcode::Eq => Ok(Bool(a == b)),
            Opcode::Ne => Ok(Bool(a != b)),
            _ => Err(unsupported(op, lhs, rhs)),
        },
        _ => Err(unsupported(op, lhs, rhs)),
    }
}

fn as_float(value: &Value) -> f64 {
    match value {
        Value::Int(n) => *n as f64,
        Value::Float(x) => *x,
        _ => 0.0,
    }
}

fn int_binary(op: Opcode, a: i64, b: i64) -> Result<Value, RuntimeError> {
    let overflow = || RuntimeError::IntegerOverflow { op };
    let value = match op {
        Opcode::Add => Value::Int(a.checked_add(b).ok_or_else(overflow)?),
        Opcode::Sub => Value::Int(a.checked_sub(b).ok_or_else(overflow)?),
        Opcode::Mul => Value::Int(a.checked_mul(b).ok_or_else(overflow)?),
        Opcode::Rem => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            Value::Int(a.checked_rem(b).ok_or_else(overflow)?)
        }
        Opcode::Div => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            Value::Float(a as f64 / b as f64)
        }
        Opcode::Gt => Value::Bool(a > b),
        Opcode::Lt => Value::Bool(a < b),
        Opcode::Ge => Value::Bool(a >= b),
        Opcode::Le => Value::Bool(a <= b),
        Opcode::Eq => Value::Bool(a == b),
        Opcode::Ne => Value::Bool(a != b),
        _ => return Err(unsupported(op, &Value::Int(a), &Value::Int(b))),
    };
    Ok(value)
}

/// `None` when the opcode has no float form.
fn float_binary(op: Opcode, a: f64, b: f64) -> Option<Result<Value, RuntimeError>> {
    let value = match op {
        Opcode::Add => Value::Float(a + b),
        Opcode::Sub => Value::Float(a - b),
        Opcode::Mul => Value::Float(a * b),
        Opcode::Div => {
            if b == 0.0 {
                return Some(Err(RuntimeError::DivisionByZero));
            }
            Value::Float(a / b)
        }
        Opcode::Gt => Value::Bool(a > b),
        Opcode::Lt => Value::Bool(a < b),
        Opcode::Ge => Value::Bool(a >= b),
        Opcode::Le => Value::Bool(a <= b),
        Opcode::Eq => Value::Bool(a == b),
        Opcode::Ne => Value::Bool(a != b),
        _ => return None,
    };
    Some(Ok(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use patito_syntax::ir::ConstantEntry;

    fn q(op: Opcode, a: Operand, b: Operand, r: Operand) -> Quadruple {
        Quadruple::new(op, a, b, r)
    }

    fn a(addr: Address) -> Operand {
        Operand::Addr(addr)
    }

    fn program(quadruples: Vec<Quadruple>, constants: Vec<(Address, Value)>) -> Program {
        Program {
            name: "t".to_string(),
            segment_size: 1000,
            quadruples,
            constants: constants
                .into_iter()
                .map(|(address, value)| ConstantEntry { address, value })
                .collect(),
            symbols: Vec::new(),
        }
    }

    fn run(p: &Program) -> Result<String, RuntimeError> {
        let mut vm = VirtualMachine::new(p, Vec::new())?;
        vm.run()?;
        Ok(String::from_utf8_lossy(&vm.into_output()).into_owned())
    }

    use Operand::Empty as E;

    #[test]
    fn arithmetic_and_print() {
        let p = program(
            vec![
                q(Opcode::Add, a(7000), a(7001), a(10000)),
                q(Opcode::Div, a(7000), a(7001), a(11000)),
                q(Opcode::Mul, a(7000), a(8000), a(11001)),
                q(Opcode::Rem, a(7001), a(7000), a(10001)),
                q(Opcode::Print, a(10000), E, E),
                q(Opcode::Print, a(11000), E, E),
                q(Opcode::Print, a(11001), E, E),
                q(Opcode::Print, a(10001), E, E),
                q(Opcode::Print, E, E, E),
                q(Opcode::Print, a(9000), E, E),
            ],
            vec![
                (7000, Value::Int(2)),
                (7001, Value::Int(5)),
                (8000, Value::Float(1.5)),
                (9000, Value::Str("done".into())),
            ],
        );
        assert_eq!(run(&p).unwrap(), "7\n0.4\n3.0\n1\n\ndone\n");
    }

    #[test]
    fn gotof_jumps_on_false() {
        let p = program(
            vec![
                q(Opcode::GotoF, a(13000), E, Operand::Jump(Some(3))),
                q(Opcode::Print, a(7000), E, E),
                q(Opcode::Goto, E, E, Operand::Jump(Some(4))),
                q(Opcode::Print, a(7001), E, E),
            ],
            vec![
                (7000, Value::Int(1)),
                (7001, Value::Int(2)),
                (13000, Value::Bool(false)),
            ],
        );
        assert_eq!(run(&p).unwrap(), "2\n");
    }

    #[test]
    fn call_protocol_round_trip() {
        // f(n) returns n * 2 through global slot 1000.
        let p = program(
            vec![
                q(Opcode::Goto, E, E, Operand::Jump(Some(4))),
                q(Opcode::Mul, a(4000), a(7000), a(10000)),
                q(Opcode::Assign, a(10000), E, a(1000)),
                q(Opcode::Ret, E, E, E),
                q(Opcode::Era, E, E, Operand::Func("f".into())),
                q(Opcode::Param, a(7001), E, a(4000)),
                q(Opcode::GoSub, Operand::Func("f".into()), E, Operand::Jump(Some(1))),
                q(Opcode::Assign, a(1000), E, a(10000)),
                q(Opcode::Print, a(10000), E, E),
            ],
            vec![(7000, Value::Int(2)), (7001, Value::Int(21))],
        );
        assert_eq!(run(&p).unwrap(), "42\n");
    }

    #[test]
    fn runtime_faults() {
        let div = program(
            vec![q(Opcode::Div, a(7000), a(7001), a(11000))],
            vec![(7000, Value::Int(1)), (7001, Value::Int(0))],
        );
        assert!(matches!(run(&div), Err(RuntimeError::DivisionByZero)));

        let overflow = program(
            vec![q(Opcode::Add, a(7000), a(7000), a(10000))],
            vec![(7000, Value::Int(i64::MAX))],
        );
        assert!(matches!(run(&overflow), Err(RuntimeError::IntegerOverflow { .. })));

        let ret = program(vec![q(Opcode::Ret, E, E, E)], vec![]);
        assert!(matches!(run(&ret), Err(RuntimeError::UnboundReturn)));

        let gosub = program(
            vec![q(Opcode::GoSub, Operand::Func("f".into()), E, Operand::Jump(Some(0)))],
            vec![],
        );
        assert!(matches!(run(&gosub), Err(RuntimeError::UnpreparedActivation { .. })));

        let strings = program(
            vec![q(Opcode::Add, a(9000), a(9000), a(10000))],
            vec![(9000, Value::Str("a".into()))],
        );
        let err = run(&strings).unwrap_err();
        assert_eq!(err.to_string(), "'+' cannot operate on string and string");

        let missing = program(vec![q(Opcode::Goto, E, E, Operand::Jump(None))], vec![]);
        assert!(matches!(run(&missing), Err(RuntimeError::MalformedQuadruple { .. })));

        let range = program(vec![q(Opcode::Print, a(99), E, E)], vec![]);
        assert!(matches!(run(&range), Err(RuntimeError::AddressOutOfRange { address: 99 })));
    }

    #[test]
    fn unbounded_recursion_hits_depth_limit() {
        // f calls itself forever.
        let p = program(
            vec![
                q(Opcode::Goto, E, E, Operand::Jump(Some(3))),
                q(Opcode::Era, E, E, Operand::Func("f".into())),
                q(Opcode::GoSub, Operand::Func("f".into()), E, Operand::Jump(Some(1))),
                q(Opcode::Era, E, E, Operand::Func("f".into())),
                q(Opcode::GoSub, Operand::Func("f".into()), E, Operand::Jump(Some(1))),
            ],
            vec![],
        );
        let mut vm = VirtualMachine::new(&p, Vec::new()).unwrap().with_max_call_depth(16);
        assert!(matches!(
            vm.run(),
            Err(RuntimeError::CallDepthExceeded { limit: 16 })
        ));
        assert_eq!(vm.memory().depth(), 16);
    }

    #[test]
    fn object_with_unaddressable_segment_size_is_refused() {
        for size in [0, 400_000_000] {
            let mut p = program(vec![q(Opcode::Print, E, E, E)], vec![]);
            p.segment_size = size;
            assert!(matches!(
                VirtualMachine::new(&p, Vec::new()),
                Err(RuntimeError::InvalidSegmentSize { size: s, .. }) if s == size
            ));
        }
    }

    #[test]
    fn step_reports_control_flow() {
        let p = program(
            vec![
                q(Opcode::Goto, E, E, Operand::Jump(Some(2))),
                q(Opcode::Print, E, E, E),
            ],
            vec![],
        );
        let mut vm = VirtualMachine::new(&p, Vec::new()).unwrap();
        assert_eq!(vm.step().unwrap(), Step::Jump(2));
    }
}
