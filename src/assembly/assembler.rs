//! Fluent instruction assembler for code spliced into method bodies.
//!
//! [`InstructionAssembler`] borrows the [`MethodBody`] the code is destined for. Instruction ids
//! and local slots are allocated from that body, so the assembled sequence can be spliced into
//! it (or installed as its whole instruction stream) without renumbering.
//!
//! Branches take string labels. A label names the next instruction emitted after it is
//! defined; forward references are resolved by [`InstructionAssembler::finish`].
//!
//! # Examples
//!
//! ```rust
//! use dotweave::assembly::InstructionAssembler;
//! use dotweave::metadata::method::MethodBody;
//!
//! let mut body = MethodBody::new();
//! let mut asm = InstructionAssembler::new(&mut body);
//! asm.ldarg(1)?
//!     .brfalse("zero")?
//!     .ldc_i4(1)?
//!     .ret()?
//!     .label("zero")?
//!     .ldc_i4(0)?
//!     .ret()?;
//! let instructions = asm.finish()?;
//! assert_eq!(instructions.len(), 6);
//! # Ok::<(), dotweave::Error>(())
//! ```

use rustc_hash::FxHashMap;

use crate::{
    assembly::{InstrId, Instruction, OpCode, Operand},
    metadata::{
        method::{ExceptionHandler, ExceptionHandlerFlags, MethodBody, MethodRef},
        module::FieldId,
        signatures::TypeSignature,
    },
    Result,
};

/// A protected region declared through labels, resolved on [`InstructionAssembler::finish`].
struct PendingHandler {
    flags: ExceptionHandlerFlags,
    try_start: String,
    handler_start: String,
    handler_end: String,
    catch_type: Option<TypeSignature>,
}

/// Emits [`Instruction`]s with ids allocated from a target [`MethodBody`].
pub struct InstructionAssembler<'a> {
    body: &'a mut MethodBody,
    instructions: Vec<Instruction>,
    labels: FxHashMap<String, InstrId>,
    pending_labels: Vec<String>,
    fixups: Vec<(usize, String)>,
    handlers: Vec<PendingHandler>,
}

impl<'a> InstructionAssembler<'a> {
    /// Creates an assembler allocating ids and locals from `body`.
    pub fn new(body: &'a mut MethodBody) -> Self {
        InstructionAssembler {
            body,
            instructions: Vec::new(),
            labels: FxHashMap::default(),
            pending_labels: Vec::new(),
            fixups: Vec::new(),
            handlers: Vec::new(),
        }
    }

    /// Declares a local variable in the target body and returns its index.
    ///
    /// # Errors
    /// Returns an error if the body has no free local slots.
    pub fn declare_local(&mut self, signature: TypeSignature, name: Option<&str>) -> Result<u16> {
        self.body.add_local(signature, name)
    }

    /// Returns the id of the most recently emitted instruction.
    #[must_use]
    pub fn last_id(&self) -> Option<InstrId> {
        self.instructions.last().map(|i| i.id)
    }

    /// Emits a raw instruction.
    ///
    /// # Errors
    /// Never fails today; the `Result` keeps the fluent chain uniform.
    pub fn emit(&mut self, opcode: OpCode, operand: Operand) -> Result<&mut Self> {
        let id = self.body.next_id();
        for label in self.pending_labels.drain(..) {
            self.labels.insert(label, id);
        }
        self.instructions.push(Instruction::new(id, opcode, operand));
        Ok(self)
    }

    /// Defines `name` as the label of the next emitted instruction.
    ///
    /// # Errors
    /// Returns an error if the label is already defined.
    pub fn label(&mut self, name: &str) -> Result<&mut Self> {
        if self.labels.contains_key(name) || self.pending_labels.iter().any(|l| l == name) {
            return Err(malformed_error!("Label '{}' is defined twice", name));
        }
        self.pending_labels.push(name.to_string());
        Ok(self)
    }

    /// Emits a branch-type instruction to `label`.
    ///
    /// # Errors
    /// Returns an error if `opcode` does not take a branch target.
    pub fn branch(&mut self, opcode: OpCode, label: &str) -> Result<&mut Self> {
        if !matches!(
            opcode,
            OpCode::Br | OpCode::Brtrue | OpCode::Brfalse | OpCode::Leave
        ) {
            return Err(malformed_error!("{} is not a branch instruction", opcode));
        }
        self.fixups.push((self.instructions.len(), label.to_string()));
        self.emit(opcode, Operand::Target(InstrId(u32::MAX)))
    }

    /// Emits a branch-type instruction to an instruction that already exists in the target body.
    ///
    /// # Errors
    /// Returns an error if `opcode` does not take a branch target.
    pub fn branch_to(&mut self, opcode: OpCode, target: InstrId) -> Result<&mut Self> {
        if !matches!(
            opcode,
            OpCode::Br | OpCode::Brtrue | OpCode::Brfalse | OpCode::Leave
        ) {
            return Err(malformed_error!("{} is not a branch instruction", opcode));
        }
        self.emit(opcode, Operand::Target(target))
    }

    /// Declares a protected region by its labels.
    ///
    /// The try block runs from `try_start` to `handler_start`; the handler runs up to (not
    /// including) `handler_end`. `catch_type` is only used by catch clauses.
    ///
    /// # Errors
    /// Never fails at declaration time; unknown labels are reported by [`Self::finish`].
    pub fn protect(
        &mut self,
        flags: ExceptionHandlerFlags,
        try_start: &str,
        handler_start: &str,
        handler_end: &str,
        catch_type: Option<TypeSignature>,
    ) -> Result<&mut Self> {
        self.handlers.push(PendingHandler {
            flags,
            try_start: try_start.to_string(),
            handler_start: handler_start.to_string(),
            handler_end: handler_end.to_string(),
            catch_type,
        });
        Ok(self)
    }

    /// Resolves labels, registers declared protected regions with the target body and returns
    /// the assembled sequence.
    ///
    /// # Errors
    /// Returns an error if a branch or region refers to an undefined label, or a label was
    /// defined after the last instruction.
    pub fn finish(self) -> Result<Vec<Instruction>> {
        let InstructionAssembler {
            body,
            mut instructions,
            labels,
            pending_labels,
            fixups,
            handlers,
        } = self;

        if let Some(dangling) = pending_labels.first() {
            return Err(malformed_error!(
                "Label '{}' does not precede an instruction",
                dangling
            ));
        }

        let resolve = |name: &str| {
            labels
                .get(name)
                .copied()
                .ok_or_else(|| malformed_error!("Undefined label '{}'", name))
        };

        for (index, label) in fixups {
            let target = resolve(&label)?;
            if let Some(instruction) = instructions.get_mut(index) {
                instruction.operand = Operand::Target(target);
            }
        }

        for handler in handlers {
            let handler_start = resolve(&handler.handler_start)?;
            body.exception_handlers.push(ExceptionHandler {
                flags: handler.flags,
                try_start: resolve(&handler.try_start)?,
                try_end: handler_start,
                handler_start,
                handler_end: Some(resolve(&handler.handler_end)?),
                filter_start: None,
                catch_type: handler.catch_type,
            });
        }

        Ok(instructions)
    }

    /// `nop`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn nop(&mut self) -> Result<&mut Self> {
        self.emit(OpCode::Nop, Operand::None)
    }

    /// `ldarg <index>`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn ldarg(&mut self, index: u16) -> Result<&mut Self> {
        self.emit(OpCode::Ldarg, Operand::Argument(index))
    }

    /// `ldarg.0`, which is `this` in instance methods
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn ldarg_0(&mut self) -> Result<&mut Self> {
        self.ldarg(0)
    }

    /// `ldarga <index>`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn ldarga(&mut self, index: u16) -> Result<&mut Self> {
        self.emit(OpCode::Ldarga, Operand::Argument(index))
    }

    /// `starg <index>`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn starg(&mut self, index: u16) -> Result<&mut Self> {
        self.emit(OpCode::Starg, Operand::Argument(index))
    }

    /// `ldloc <index>`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn ldloc(&mut self, index: u16) -> Result<&mut Self> {
        self.emit(OpCode::Ldloc, Operand::Local(index))
    }

    /// `ldloca <index>`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn ldloca(&mut self, index: u16) -> Result<&mut Self> {
        self.emit(OpCode::Ldloca, Operand::Local(index))
    }

    /// `stloc <index>`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn stloc(&mut self, index: u16) -> Result<&mut Self> {
        self.emit(OpCode::Stloc, Operand::Local(index))
    }

    /// `ldnull`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn ldnull(&mut self) -> Result<&mut Self> {
        self.emit(OpCode::Ldnull, Operand::None)
    }

    /// `ldc.i4 <value>`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn ldc_i4(&mut self, value: i32) -> Result<&mut Self> {
        self.emit(OpCode::LdcI4, Operand::Int32(value))
    }

    /// `ldc.i4` of a collection index
    ///
    /// # Errors
    /// Returns an error if `index` does not fit into an `int32`.
    pub fn ldc_index(&mut self, index: usize) -> Result<&mut Self> {
        let value =
            i32::try_from(index).map_err(|_| malformed_error!("Index {} is out of range", index))?;
        self.ldc_i4(value)
    }

    /// `ldstr <value>`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn ldstr(&mut self, value: &str) -> Result<&mut Self> {
        self.emit(OpCode::Ldstr, Operand::String(value.to_string()))
    }

    /// `dup`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn dup(&mut self) -> Result<&mut Self> {
        self.emit(OpCode::Dup, Operand::None)
    }

    /// `pop`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn pop(&mut self) -> Result<&mut Self> {
        self.emit(OpCode::Pop, Operand::None)
    }

    /// `call <method>`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn call(&mut self, method: MethodRef) -> Result<&mut Self> {
        self.emit(OpCode::Call, Operand::Method(method))
    }

    /// `callvirt <method>`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn callvirt(&mut self, method: MethodRef) -> Result<&mut Self> {
        self.emit(OpCode::Callvirt, Operand::Method(method))
    }

    /// `newobj <ctor>`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn newobj(&mut self, ctor: MethodRef) -> Result<&mut Self> {
        self.emit(OpCode::Newobj, Operand::Method(ctor))
    }

    /// `ldftn <method>`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn ldftn(&mut self, method: MethodRef) -> Result<&mut Self> {
        self.emit(OpCode::Ldftn, Operand::Method(method))
    }

    /// `ret`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn ret(&mut self) -> Result<&mut Self> {
        self.emit(OpCode::Ret, Operand::None)
    }

    /// `br <label>`
    ///
    /// # Errors
    /// See [`Self::branch`].
    pub fn br(&mut self, label: &str) -> Result<&mut Self> {
        self.branch(OpCode::Br, label)
    }

    /// `brtrue <label>`
    ///
    /// # Errors
    /// See [`Self::branch`].
    pub fn brtrue(&mut self, label: &str) -> Result<&mut Self> {
        self.branch(OpCode::Brtrue, label)
    }

    /// `brfalse <label>`
    ///
    /// # Errors
    /// See [`Self::branch`].
    pub fn brfalse(&mut self, label: &str) -> Result<&mut Self> {
        self.branch(OpCode::Brfalse, label)
    }

    /// `leave <label>`
    ///
    /// # Errors
    /// See [`Self::branch`].
    pub fn leave(&mut self, label: &str) -> Result<&mut Self> {
        self.branch(OpCode::Leave, label)
    }

    /// `endfinally`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn endfinally(&mut self) -> Result<&mut Self> {
        self.emit(OpCode::Endfinally, Operand::None)
    }

    /// `throw`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn throw(&mut self) -> Result<&mut Self> {
        self.emit(OpCode::Throw, Operand::None)
    }

    /// `newarr <element>`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn newarr(&mut self, element: TypeSignature) -> Result<&mut Self> {
        self.emit(OpCode::Newarr, Operand::Type(element))
    }

    /// `ldelem.ref`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn ldelem_ref(&mut self) -> Result<&mut Self> {
        self.emit(OpCode::LdelemRef, Operand::None)
    }

    /// `stelem.ref`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn stelem_ref(&mut self) -> Result<&mut Self> {
        self.emit(OpCode::StelemRef, Operand::None)
    }

    /// `box <ty>`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn box_value(&mut self, ty: TypeSignature) -> Result<&mut Self> {
        self.emit(OpCode::Box, Operand::Type(ty))
    }

    /// `unbox.any <ty>`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn unbox_any(&mut self, ty: TypeSignature) -> Result<&mut Self> {
        self.emit(OpCode::UnboxAny, Operand::Type(ty))
    }

    /// `castclass <ty>`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn castclass(&mut self, ty: TypeSignature) -> Result<&mut Self> {
        self.emit(OpCode::Castclass, Operand::Type(ty))
    }

    /// `ldobj <ty>`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn ldobj(&mut self, ty: TypeSignature) -> Result<&mut Self> {
        self.emit(OpCode::Ldobj, Operand::Type(ty))
    }

    /// `stobj <ty>`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn stobj(&mut self, ty: TypeSignature) -> Result<&mut Self> {
        self.emit(OpCode::Stobj, Operand::Type(ty))
    }

    /// `ldfld <field>`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn ldfld(&mut self, field: FieldId) -> Result<&mut Self> {
        self.emit(OpCode::Ldfld, Operand::Field(field))
    }

    /// `stfld <field>`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn stfld(&mut self, field: FieldId) -> Result<&mut Self> {
        self.emit(OpCode::Stfld, Operand::Field(field))
    }

    /// `add`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn add(&mut self) -> Result<&mut Self> {
        self.emit(OpCode::Add, Operand::None)
    }

    /// `sub`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn sub(&mut self) -> Result<&mut Self> {
        self.emit(OpCode::Sub, Operand::None)
    }

    /// `mul`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn mul(&mut self) -> Result<&mut Self> {
        self.emit(OpCode::Mul, Operand::None)
    }

    /// `ceq`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn ceq(&mut self) -> Result<&mut Self> {
        self.emit(OpCode::Ceq, Operand::None)
    }

    /// `cgt`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn cgt(&mut self) -> Result<&mut Self> {
        self.emit(OpCode::Cgt, Operand::None)
    }

    /// `clt`
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn clt(&mut self) -> Result<&mut Self> {
        self.emit(OpCode::Clt, Operand::None)
    }

    /// Converts the `object` on top of the stack to `ty`.
    ///
    /// Nothing is emitted for `object`; value types and generic parameters are unboxed with
    /// `unbox.any`, every other type is checked with `castclass`.
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn cast_from_object(&mut self, ty: &TypeSignature) -> Result<&mut Self> {
        if ty.is_object() {
            Ok(self)
        } else if ty.needs_boxing() {
            self.unbox_any(ty.clone())
        } else {
            self.castclass(ty.clone())
        }
    }

    /// Converts the value of type `ty` on top of the stack to `object`, boxing value types and
    /// generic parameters.
    ///
    /// # Errors
    /// See [`Self::emit`].
    pub fn box_if_needed(&mut self, ty: &TypeSignature) -> Result<&mut Self> {
        if ty.needs_boxing() {
            self.box_value(ty.clone())
        } else {
            Ok(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_continue_from_body() {
        let mut body = MethodBody::new();
        body.push(OpCode::Nop, Operand::None);
        body.push(OpCode::Ret, Operand::None);

        let mut asm = InstructionAssembler::new(&mut body);
        asm.ldarg_0().unwrap().pop().unwrap();
        let sequence = asm.finish().unwrap();

        assert_eq!(sequence[0].id, InstrId(2));
        assert_eq!(sequence[1].id, InstrId(3));
    }

    #[test]
    fn forward_and_backward_labels() {
        let mut body = MethodBody::new();
        let mut asm = InstructionAssembler::new(&mut body);
        asm.label("top")
            .unwrap()
            .ldarg(1)
            .unwrap()
            .brtrue("done")
            .unwrap()
            .br("top")
            .unwrap()
            .label("done")
            .unwrap()
            .ret()
            .unwrap();
        let sequence = asm.finish().unwrap();

        assert_eq!(sequence[1].branch_targets(), vec![sequence[3].id]);
        assert_eq!(sequence[2].branch_targets(), vec![sequence[0].id]);
    }

    #[test]
    fn undefined_label_fails() {
        let mut body = MethodBody::new();
        let mut asm = InstructionAssembler::new(&mut body);
        asm.br("nowhere").unwrap();
        assert!(asm.finish().is_err());
    }

    #[test]
    fn trailing_label_fails() {
        let mut body = MethodBody::new();
        let mut asm = InstructionAssembler::new(&mut body);
        asm.ret().unwrap().label("end").unwrap();
        assert!(asm.finish().is_err());
    }

    #[test]
    fn duplicate_label_fails() {
        let mut body = MethodBody::new();
        let mut asm = InstructionAssembler::new(&mut body);
        asm.label("a").unwrap().nop().unwrap();
        assert!(asm.label("a").is_err());
    }

    #[test]
    fn non_branch_opcode_rejected() {
        let mut body = MethodBody::new();
        let mut asm = InstructionAssembler::new(&mut body);
        assert!(asm.branch(OpCode::Add, "x").is_err());
    }

    #[test]
    fn casts_follow_type_category() {
        let mut body = MethodBody::new();
        let mut asm = InstructionAssembler::new(&mut body);
        asm.cast_from_object(&TypeSignature::Object)
            .unwrap()
            .cast_from_object(&TypeSignature::I4)
            .unwrap()
            .cast_from_object(&TypeSignature::GenericParamMethod(0))
            .unwrap()
            .cast_from_object(&TypeSignature::String)
            .unwrap()
            .box_if_needed(&TypeSignature::String)
            .unwrap()
            .box_if_needed(&TypeSignature::R8)
            .unwrap();
        let opcodes: Vec<OpCode> = asm.finish().unwrap().iter().map(|i| i.opcode).collect();

        assert_eq!(
            opcodes,
            vec![
                OpCode::UnboxAny,
                OpCode::UnboxAny,
                OpCode::Castclass,
                OpCode::Box
            ]
        );
    }

    #[test]
    fn protected_regions_resolve_labels() {
        let mut body = MethodBody::new();
        let mut asm = InstructionAssembler::new(&mut body);
        asm.label("try")
            .unwrap()
            .leave("exit")
            .unwrap()
            .label("handler")
            .unwrap()
            .pop()
            .unwrap()
            .leave("exit")
            .unwrap()
            .label("exit")
            .unwrap()
            .ret()
            .unwrap()
            .protect(
                ExceptionHandlerFlags::EXCEPTION,
                "try",
                "handler",
                "exit",
                Some(TypeSignature::Object),
            )
            .unwrap();
        let sequence = asm.finish().unwrap();
        body.instructions = sequence;

        let handler = &body.exception_handlers[0];
        assert_eq!(handler.try_start, body.instructions[0].id);
        assert_eq!(handler.handler_start, body.instructions[1].id);
        assert_eq!(handler.handler_end, Some(body.instructions[3].id));
        body.validate().unwrap();
    }
}
