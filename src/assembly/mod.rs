//! CIL instruction model and emission.
//!
//! Method bodies under rewrite are kept as instruction lists rather than byte streams:
//! decoding from and encoding to the binary format is done by the external loader and writer.
//!
//! # Key Components
//!
//! - [`Instruction`], [`OpCode`], [`Operand`] - The instruction model
//! - [`InstrId`] - Body-unique instruction identity used by branches and exception regions
//! - [`InstructionAssembler`] - Fluent emitter with labels, used by builders and the weaver

mod assembler;
mod instruction;

pub use assembler::InstructionAssembler;
pub use instruction::{FlowType, InstrId, Instruction, OpCode, Operand};
