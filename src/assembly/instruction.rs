//! CIL instruction representation for method bodies under rewrite.
//!
//! Unlike a decoded instruction stream, the instructions here do not carry byte offsets.
//! Every instruction owns a body-unique [`InstrId`], and branch operands and exception
//! handler boundaries refer to instructions by id. Splicing code into a body therefore never
//! invalidates existing references; the weave processes decide explicitly which references
//! follow an insertion (see [`crate::metadata::method::MethodBody::insert_before`]).
//!
//! # Key Components
//!
//! - [`Instruction`] - One instruction: id, opcode, operand
//! - [`OpCode`] - The CIL opcodes the weaver emits or has to understand
//! - [`Operand`] - Type-safe operand representation
//! - [`FlowType`] - Control flow behavior classification

use std::fmt;

use strum::{Display, EnumIter, IntoStaticStr};

use crate::metadata::{method::MethodRef, module::FieldId, signatures::TypeSignature};

/// Identifier of an instruction, unique within its method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstrId(pub u32);

impl fmt::Display for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04x}", self.0)
    }
}

/// How an instruction affects control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Normal execution continues to next instruction
    Sequential,
    /// Conditional branch to another location
    ConditionalBranch,
    /// Always branches to another location (unconditional jump)
    UnconditionalBranch,
    /// Call to another method
    Call,
    /// Returns from current method
    Return,
    /// Multi-way branch (switch statement)
    Switch,
    /// Exception throwing
    Throw,
    /// End of finally block
    EndFinally,
    /// Leave protected region (try/catch/finally)
    Leave,
}

/// CIL opcodes, without the short-form encodings.
///
/// Short and long forms (`ldarg.0`, `ldarg.s`, `ldarg`) collapse into one variant whose operand
/// carries the index; choosing an encoding is the business of the external writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, EnumIter)]
pub enum OpCode {
    /// No operation
    #[strum(serialize = "nop")]
    Nop,
    /// Load argument
    #[strum(serialize = "ldarg")]
    Ldarg,
    /// Load argument address
    #[strum(serialize = "ldarga")]
    Ldarga,
    /// Store argument
    #[strum(serialize = "starg")]
    Starg,
    /// Load local
    #[strum(serialize = "ldloc")]
    Ldloc,
    /// Load local address
    #[strum(serialize = "ldloca")]
    Ldloca,
    /// Store local
    #[strum(serialize = "stloc")]
    Stloc,
    /// Push null reference
    #[strum(serialize = "ldnull")]
    Ldnull,
    /// Push 32-bit integer constant
    #[strum(serialize = "ldc.i4")]
    LdcI4,
    /// Push string literal
    #[strum(serialize = "ldstr")]
    Ldstr,
    /// Duplicate top of stack
    #[strum(serialize = "dup")]
    Dup,
    /// Discard top of stack
    #[strum(serialize = "pop")]
    Pop,
    /// Call method
    #[strum(serialize = "call")]
    Call,
    /// Call method through the object's vtable
    #[strum(serialize = "callvirt")]
    Callvirt,
    /// Allocate object and call constructor
    #[strum(serialize = "newobj")]
    Newobj,
    /// Push function pointer
    #[strum(serialize = "ldftn")]
    Ldftn,
    /// Return from method
    #[strum(serialize = "ret")]
    Ret,
    /// Unconditional branch
    #[strum(serialize = "br")]
    Br,
    /// Branch if true / non-null / non-zero
    #[strum(serialize = "brtrue")]
    Brtrue,
    /// Branch if false / null / zero
    #[strum(serialize = "brfalse")]
    Brfalse,
    /// Multi-way branch
    #[strum(serialize = "switch")]
    Switch,
    /// Exit a protected region
    #[strum(serialize = "leave")]
    Leave,
    /// End of finally or fault handler
    #[strum(serialize = "endfinally")]
    Endfinally,
    /// Throw exception object
    #[strum(serialize = "throw")]
    Throw,
    /// Allocate single dimension array
    #[strum(serialize = "newarr")]
    Newarr,
    /// Load object reference array element
    #[strum(serialize = "ldelem.ref")]
    LdelemRef,
    /// Store object reference array element
    #[strum(serialize = "stelem.ref")]
    StelemRef,
    /// Box value
    #[strum(serialize = "box")]
    Box,
    /// Unbox to value (or cast, for reference types)
    #[strum(serialize = "unbox.any")]
    UnboxAny,
    /// Cast object reference
    #[strum(serialize = "castclass")]
    Castclass,
    /// Load value through a managed reference
    #[strum(serialize = "ldobj")]
    Ldobj,
    /// Store value through a managed reference
    #[strum(serialize = "stobj")]
    Stobj,
    /// Load instance field
    #[strum(serialize = "ldfld")]
    Ldfld,
    /// Store instance field
    #[strum(serialize = "stfld")]
    Stfld,
    /// Add
    #[strum(serialize = "add")]
    Add,
    /// Subtract
    #[strum(serialize = "sub")]
    Sub,
    /// Multiply
    #[strum(serialize = "mul")]
    Mul,
    /// Compare equal
    #[strum(serialize = "ceq")]
    Ceq,
    /// Compare greater than
    #[strum(serialize = "cgt")]
    Cgt,
    /// Compare less than
    #[strum(serialize = "clt")]
    Clt,
}

impl OpCode {
    /// Returns the mnemonic of this opcode
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        self.into()
    }

    /// Returns the control flow behavior of this opcode
    #[must_use]
    pub fn flow_type(&self) -> FlowType {
        match self {
            OpCode::Call | OpCode::Callvirt | OpCode::Newobj => FlowType::Call,
            OpCode::Ret => FlowType::Return,
            OpCode::Br => FlowType::UnconditionalBranch,
            OpCode::Brtrue | OpCode::Brfalse => FlowType::ConditionalBranch,
            OpCode::Switch => FlowType::Switch,
            OpCode::Leave => FlowType::Leave,
            OpCode::Endfinally => FlowType::EndFinally,
            OpCode::Throw => FlowType::Throw,
            _ => FlowType::Sequential,
        }
    }
}

/// Operand of an instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand present
    None,
    /// 32-bit integer immediate
    Int32(i32),
    /// String literal
    String(String),
    /// Argument index (index 0 is `this` for instance methods)
    Argument(u16),
    /// Local variable index
    Local(u16),
    /// Branch target
    Target(InstrId),
    /// Switch jump table
    Switch(Vec<InstrId>),
    /// Method reference
    Method(MethodRef),
    /// Field reference
    Field(FieldId),
    /// Type reference
    Type(TypeSignature),
}

/// A single instruction of a method body.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Body-unique identifier, stable under insertion and relocation
    pub id: InstrId,
    /// The operation
    pub opcode: OpCode,
    /// The operand data for this instruction
    pub operand: Operand,
}

impl Instruction {
    /// Creates a new instruction.
    #[must_use]
    pub fn new(id: InstrId, opcode: OpCode, operand: Operand) -> Self {
        Instruction {
            id,
            opcode,
            operand,
        }
    }

    /// Returns the control flow behavior of this instruction
    #[must_use]
    pub fn flow_type(&self) -> FlowType {
        self.opcode.flow_type()
    }

    /// Returns true if this instruction is a `ret`
    #[must_use]
    pub fn is_return(&self) -> bool {
        self.opcode == OpCode::Ret
    }

    /// Returns the instructions this instruction may transfer control to.
    #[must_use]
    pub fn branch_targets(&self) -> Vec<InstrId> {
        match &self.operand {
            Operand::Target(target) => vec![*target],
            Operand::Switch(targets) => targets.clone(),
            _ => Vec::new(),
        }
    }

    /// Rewrites every branch operand that points at `from` to point at `to`.
    ///
    /// Returns true if the instruction was changed.
    pub fn retarget(&mut self, from: InstrId, to: InstrId) -> bool {
        match &mut self.operand {
            Operand::Target(target) if *target == from => {
                *target = to;
                true
            }
            Operand::Switch(targets) => {
                let mut changed = false;
                for target in targets.iter_mut().filter(|t| **t == from) {
                    *target = to;
                    changed = true;
                }
                changed
            }
            _ => false,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.opcode)?;
        match &self.operand {
            Operand::None => Ok(()),
            Operand::Int32(value) => write!(f, " {value}"),
            Operand::String(value) => write!(f, " \"{value}\""),
            Operand::Argument(index) => write!(f, " arg{index}"),
            Operand::Local(index) => write!(f, " loc{index}"),
            Operand::Target(target) => write!(f, " {target}"),
            Operand::Switch(targets) => {
                let labels: Vec<String> = targets.iter().map(ToString::to_string).collect();
                write!(f, " ({})", labels.join(", "))
            }
            Operand::Method(method) => write!(f, " {method}"),
            Operand::Field(field) => write!(f, " {field}"),
            Operand::Type(sig) => write!(f, " {sig}"),
        }
    }
}
