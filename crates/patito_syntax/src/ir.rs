//! Quadruple IR: produced by the compiler, executed by the VM.
//! A flat instruction list; a quadruple's index is its program counter value.

use crate::ast::Type;
use crate::segment::{Address, MemoryLayout};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "%")]
    Rem,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "=")]
    Assign,
    #[serde(rename = "GOTO")]
    Goto,
    #[serde(rename = "GOTOF")]
    GotoF,
    #[serde(rename = "PRINT")]
    Print,
    #[serde(rename = "ERA")]
    Era,
    #[serde(rename = "PARAM")]
    Param,
    #[serde(rename = "GOSUB")]
    GoSub,
    #[serde(rename = "RET")]
    Ret,
    #[serde(rename = "ENDFUNC")]
    EndFunc,
}

impl Opcode {
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Add => "+",
            Opcode::Sub => "-",
            Opcode::Mul => "*",
            Opcode::Div => "/",
            Opcode::Rem => "%",
            Opcode::Gt => ">",
            Opcode::Lt => "<",
            Opcode::Ge => ">=",
            Opcode::Le => "<=",
            Opcode::Eq => "==",
            Opcode::Ne => "!=",
            Opcode::Assign => "=",
            Opcode::Goto => "GOTO",
            Opcode::GotoF => "GOTOF",
            Opcode::Print => "PRINT",
            Opcode::Era => "ERA",
            Opcode::Param => "PARAM",
            Opcode::GoSub => "GOSUB",
            Opcode::Ret => "RET",
            Opcode::EndFunc => "ENDFUNC",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One quadruple field.
///
/// Serialized as a short tagged string (`-`, `addr:7000`, `jump:12`, `func:fib`) so
/// object files stay flat and readable.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Operand {
    #[default]
    Empty,
    Addr(Address),
    /// Quadruple index; `Jump(None)` is a forward jump still waiting to be backpatched.
    Jump(Option<usize>),
    Func(String),
}

impl Operand {
    pub fn addr(&self) -> Option<Address> {
        match self {
            Operand::Addr(a) => Some(*a),
            _ => None,
        }
    }

    pub fn jump(&self) -> Option<usize> {
        match self {
            Operand::Jump(target) => *target,
            _ => None,
        }
    }
}

impl From<Operand> for String {
    fn from(op: Operand) -> String {
        match op {
            Operand::Empty => "-".to_string(),
            Operand::Addr(a) => format!("addr:{}", a),
            Operand::Jump(Some(t)) => format!("jump:{}", t),
            Operand::Jump(None) => "jump:?".to_string(),
            Operand::Func(name) => format!("func:{}", name),
        }
    }
}

impl TryFrom<String> for Operand {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s == "-" {
            return Ok(Operand::Empty);
        }
        let (tag, rest) = s
            .split_once(':')
            .ok_or_else(|| format!("malformed operand '{}'", s))?;
        match tag {
            "addr" => rest
                .parse()
                .map(Operand::Addr)
                .map_err(|_| format!("malformed address '{}'", rest)),
            "jump" if rest == "?" => Ok(Operand::Jump(None)),
            "jump" => rest
                .parse()
                .map(|t| Operand::Jump(Some(t)))
                .map_err(|_| format!("malformed jump target '{}'", rest)),
            "func" => Ok(Operand::Func(rest.to_string())),
            _ => Err(format!("unknown operand tag '{}'", tag)),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Empty => f.write_str("-"),
            Operand::Addr(a) => write!(f, "{}", a),
            Operand::Jump(Some(t)) => write!(f, "{}", t),
            Operand::Jump(None) => f.write_str("?"),
            Operand::Func(name) => f.write_str(name),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quadruple {
    pub op: Opcode,
    pub arg1: Operand,
    pub arg2: Operand,
    pub result: Operand,
}

impl Quadruple {
    pub fn new(op: Opcode, arg1: Operand, arg2: Operand, result: Operand) -> Self {
        Self {
            op,
            arg1,
            arg2,
            result,
        }
    }
}

impl fmt::Display for Quadruple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.op, self.arg1, self.arg2, self.result
        )
    }
}

/// A runtime value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl Value {
    pub fn ty(&self) -> Type {
        match self {
            Value::Int(_) => Type::Int,
            Value::Float(_) => Type::Float,
            Value::Bool(_) => Type::Bool,
            Value::Str(_) => Type::String,
        }
    }

    /// Zero value of a type; what an uninitialized variable or temporary reads as.
    pub fn default_for(ty: Type) -> Value {
        match ty {
            Type::Int => Value::Int(0),
            Type::Float => Value::Float(0.0),
            Type::Bool => Value::Bool(false),
            Type::String => Value::Str(String::new()),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Bool(b) => *b,
            Value::Str(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => f.write_str(s),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstantEntry {
    pub address: Address,
    pub value: Value,
}

/// Human-readable name for an address (`global.x`, `fib.n`, `t3`, `"hi"`). Listing only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugSymbol {
    pub address: Address,
    pub name: String,
}

/// A compiled program: everything the VM needs to execute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub name: String,
    pub segment_size: u32,
    pub quadruples: Vec<Quadruple>,
    pub constants: Vec<ConstantEntry>,
    #[serde(default)]
    pub symbols: Vec<DebugSymbol>,
}

impl Program {
    /// `None` when the recorded segment size cannot address every segment.
    pub fn layout(&self) -> Option<MemoryLayout> {
        MemoryLayout::checked(self.segment_size)
    }

    /// Quadruple listing with addresses resolved through the debug symbols:
    /// `007  (+, global.i, 1, t2)`.
    pub fn listing(&self) -> String {
        let names: HashMap<Address, &str> = self
            .symbols
            .iter()
            .map(|s| (s.address, s.name.as_str()))
            .collect();
        let show = |op: &Operand| match op {
            Operand::Addr(a) => names
                .get(a)
                .map(|n| n.to_string())
                .unwrap_or_else(|| a.to_string()),
            other => other.to_string(),
        };
        let mut out = String::new();
        for (i, q) in self.quadruples.iter().enumerate() {
            out.push_str(&format!(
                "{:03}  ({}, {}, {}, {})\n",
                i,
                q.op,
                show(&q.arg1),
                show(&q.arg2),
                show(&q.result)
            ));
        }
        out
    }
}
