//! Mutable representation of a CIL method body.
//!
//! A [`MethodBody`] is the unit a weave process takes exclusive ownership of: it is taken out
//! of its [`crate::metadata::method::Method`], rewritten and put back (or moved into a
//! synthesized sibling). Instruction ids are allocated from a per-body counter, so ids stay
//! unique across every splice performed on the body.

use crate::{
    assembly::{InstrId, Instruction, OpCode, Operand},
    metadata::{
        method::{ExceptionHandler, LocalVariable},
        signatures::TypeSignature,
    },
    Result,
};

/// Describes one method that has been compiled to CIL bytecode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodBody {
    /// The instruction stream, in execution layout order
    pub instructions: Vec<Instruction>,
    /// Local variable slots
    pub locals: Vec<LocalVariable>,
    /// A list of exception handlers this method has
    pub exception_handlers: Vec<ExceptionHandler>,
    /// Flag, indicating to call default constructor on all local variables
    pub init_locals: bool,
    /// Next free instruction id
    next_id: u32,
}

impl MethodBody {
    /// Creates an empty body.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a body from an existing instruction list, continuing id allocation after the
    /// highest id in use.
    #[must_use]
    pub fn from_instructions(instructions: Vec<Instruction>) -> Self {
        let next_id = instructions.iter().map(|i| i.id.0 + 1).max().unwrap_or(0);
        MethodBody {
            instructions,
            next_id,
            ..Self::default()
        }
    }

    /// Allocates a fresh instruction id.
    pub fn next_id(&mut self) -> InstrId {
        let id = InstrId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Appends an instruction and returns its id.
    pub fn push(&mut self, opcode: OpCode, operand: Operand) -> InstrId {
        let id = self.next_id();
        self.instructions.push(Instruction::new(id, opcode, operand));
        id
    }

    /// Adds a local variable slot and returns its index.
    ///
    /// # Errors
    /// Returns an error if the body already has the maximum number of locals.
    pub fn add_local(&mut self, signature: TypeSignature, name: Option<&str>) -> Result<u16> {
        let index = u16::try_from(self.locals.len())
            .map_err(|_| malformed_error!("Too many local variables"))?;
        self.locals.push(LocalVariable {
            name: name.map(ToString::to_string),
            signature,
        });
        self.init_locals = true;
        Ok(index)
    }

    /// Returns the id of the first instruction.
    #[must_use]
    pub fn first(&self) -> Option<InstrId> {
        self.instructions.first().map(|i| i.id)
    }

    /// Returns the position of the instruction `id` in the instruction list.
    #[must_use]
    pub fn position(&self, id: InstrId) -> Option<usize> {
        self.instructions.iter().position(|i| i.id == id)
    }

    /// Returns the ids of all `ret` instructions, in layout order.
    #[must_use]
    pub fn return_points(&self) -> Vec<InstrId> {
        self.instructions
            .iter()
            .filter(|i| i.is_return())
            .map(|i| i.id)
            .collect()
    }

    /// Returns true if the body contains no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Splices `sequence` in front of the first instruction.
    ///
    /// Nothing is redirected: branches back to the old first instruction and protected regions
    /// starting there keep pointing at it, so the spliced code runs once per invocation and
    /// stays outside of any region.
    pub fn prepend(&mut self, sequence: Vec<Instruction>) {
        self.instructions.splice(0..0, sequence);
    }

    /// Splices `sequence` in front of the instruction `anchor`, redirecting every branch and
    /// every exclusive region end that pointed at `anchor` to the start of `sequence`.
    ///
    /// Control that used to reach `anchor` now runs `sequence` first.
    ///
    /// # Errors
    /// Returns an error if `anchor` is not part of this body.
    pub fn insert_before(&mut self, anchor: InstrId, sequence: Vec<Instruction>) -> Result<()> {
        let Some(head) = sequence.first().map(|i| i.id) else {
            return Ok(());
        };
        let position = self
            .position(anchor)
            .ok_or_else(|| malformed_error!("Instruction {} is not part of the body", anchor))?;

        for instruction in &mut self.instructions {
            instruction.retarget(anchor, head);
        }
        for handler in &mut self.exception_handlers {
            handler.retarget_ends(anchor, head);
        }

        self.instructions.splice(position..position, sequence);
        Ok(())
    }

    /// Checks that every branch target, region boundary and local index resolves.
    ///
    /// # Errors
    /// Returns an error naming the first dangling reference.
    pub fn validate(&self) -> Result<()> {
        let resolves = |id: InstrId| self.instructions.iter().any(|i| i.id == id);

        for instruction in &self.instructions {
            for target in instruction.branch_targets() {
                if !resolves(target) {
                    return Err(malformed_error!(
                        "{} branches to missing instruction {}",
                        instruction,
                        target
                    ));
                }
            }
            if let Operand::Local(index) = instruction.operand {
                if usize::from(index) >= self.locals.len() {
                    return Err(malformed_error!(
                        "{} uses undeclared local {}",
                        instruction,
                        index
                    ));
                }
            }
        }

        for handler in &self.exception_handlers {
            if let Some(missing) = handler.boundaries().into_iter().find(|id| !resolves(*id)) {
                return Err(malformed_error!(
                    "Exception handler refers to missing instruction {}",
                    missing
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::method::ExceptionHandlerFlags;

    fn two_returns() -> (MethodBody, InstrId, InstrId, InstrId) {
        let mut body = MethodBody::new();
        let check = body.push(OpCode::Ldarg, Operand::Argument(1));
        let ret_a = body.next_id();
        body.push(OpCode::Brtrue, Operand::Target(ret_a));
        let ret_b = body.push(OpCode::Ret, Operand::None);
        body.instructions
            .push(Instruction::new(ret_a, OpCode::Ret, Operand::None));
        (body, check, ret_a, ret_b)
    }

    #[test]
    fn from_instructions_continues_ids() {
        let mut body = MethodBody::from_instructions(vec![
            Instruction::new(InstrId(4), OpCode::Nop, Operand::None),
            Instruction::new(InstrId(1), OpCode::Ret, Operand::None),
        ]);
        assert_eq!(body.next_id(), InstrId(5));
    }

    #[test]
    fn prepend_keeps_references() {
        let (mut body, check, _, _) = two_returns();
        let id = body.next_id();
        body.prepend(vec![Instruction::new(id, OpCode::Nop, Operand::None)]);
        assert_eq!(body.first(), Some(id));
        assert_eq!(body.instructions[1].id, check);
        body.validate().unwrap();
    }

    #[test]
    fn insert_before_redirects_branches() {
        let (mut body, _, ret_a, _) = two_returns();
        let id = body.next_id();
        body.insert_before(ret_a, vec![Instruction::new(id, OpCode::Nop, Operand::None)])
            .unwrap();

        assert_eq!(body.instructions[1].branch_targets(), vec![id]);
        let position = body.position(id).unwrap();
        assert_eq!(body.instructions[position + 1].id, ret_a);
        body.validate().unwrap();
    }

    #[test]
    fn insert_before_redirects_region_ends() {
        let mut body = MethodBody::new();
        let try_start = body.push(OpCode::Nop, Operand::None);
        let exit = body.next_id();
        body.push(OpCode::Leave, Operand::Target(exit));
        let handler_start = body.push(OpCode::Endfinally, Operand::None);
        body.instructions
            .push(Instruction::new(exit, OpCode::Ret, Operand::None));
        body.exception_handlers.push(ExceptionHandler {
            flags: ExceptionHandlerFlags::FINALLY,
            try_start,
            try_end: handler_start,
            handler_start,
            handler_end: Some(exit),
            filter_start: None,
            catch_type: None,
        });

        let id = body.next_id();
        body.insert_before(exit, vec![Instruction::new(id, OpCode::Nop, Operand::None)])
            .unwrap();
        assert_eq!(body.exception_handlers[0].handler_end, Some(id));
        assert_eq!(body.exception_handlers[0].try_start, try_start);
    }

    #[test]
    fn insert_before_unknown_anchor_fails() {
        let (mut body, _, _, _) = two_returns();
        let id = body.next_id();
        let result = body.insert_before(
            InstrId(99),
            vec![Instruction::new(id, OpCode::Nop, Operand::None)],
        );
        assert!(result.is_err());
    }

    #[test]
    fn validate_reports_dangling_branch() {
        let mut body = MethodBody::new();
        body.push(OpCode::Br, Operand::Target(InstrId(42)));
        assert!(body.validate().is_err());
    }

    #[test]
    fn return_points_in_layout_order() {
        let (body, _, ret_a, ret_b) = two_returns();
        assert_eq!(body.return_points(), vec![ret_b, ret_a]);
    }
}
