//! Method builder for creating method definitions with CIL implementations.
//!
//! This module provides [`MethodBuilder`] for declaring a method's signature, flags and custom
//! attributes and for assembling its body through a closure over an
//! [`InstructionAssembler`].

use crate::{
    assembly::InstructionAssembler,
    metadata::{
        customattributes::CustomAttribute,
        method::{
            ExternalMethod, Method, MethodAccess, MethodBody, MethodModifiers, MethodRef,
            MethodSemantics, Param, CTOR_NAME,
        },
        module::{MethodId, Module, TypeId},
        signatures::TypeSignature,
    },
    Result,
};

/// Type alias for method body implementation closures
type ImplementationFn = Box<dyn FnOnce(&mut InstructionAssembler<'_>) -> Result<()>>;

/// Builder for a single method definition.
///
/// Methods start out private, non-static and `void`. Locals declared with
/// [`MethodBuilder::local`] get indices in declaration order before the implementation runs,
/// so the closure can refer to them by index.
///
/// # Examples
///
/// ```rust
/// use dotweave::builders::{ClassBuilder, MethodBuilder};
/// use dotweave::metadata::{signatures::TypeSignature, Module};
///
/// let mut module = Module::new("App.dll");
/// let ty = ClassBuilder::new("Calculator").namespace("App").public().build(&mut module)?;
///
/// let add = MethodBuilder::new("Add")
///     .public()
///     .returns(TypeSignature::I4)
///     .parameter("a", TypeSignature::I4)
///     .parameter("b", TypeSignature::I4)
///     .implementation(|asm| {
///         asm.ldarg(1)?.ldarg(2)?.add()?.ret()?;
///         Ok(())
///     })
///     .build(&mut module, ty)?;
///
/// assert_eq!(module.method_full_name(add), "App.Calculator::Add");
/// # Ok::<(), dotweave::Error>(())
/// ```
pub struct MethodBuilder {
    name: String,
    access: MethodAccess,
    modifiers: MethodModifiers,
    semantics: MethodSemantics,
    return_type: TypeSignature,
    params: Vec<Param>,
    generic_params: Vec<String>,
    attributes: Vec<CustomAttribute>,
    locals: Vec<(String, TypeSignature)>,
    implementation: Option<ImplementationFn>,
}

impl MethodBuilder {
    /// Creates a builder for a private instance method named `name`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        MethodBuilder {
            name: name.to_string(),
            access: MethodAccess::Private,
            modifiers: MethodModifiers::HIDE_BY_SIG,
            semantics: MethodSemantics::empty(),
            return_type: TypeSignature::Void,
            params: Vec::new(),
            generic_params: Vec::new(),
            attributes: Vec::new(),
            locals: Vec::new(),
            implementation: None,
        }
    }

    /// Creates a public parameterless instance constructor that only chains to
    /// `System.Object::.ctor`.
    #[must_use]
    pub fn default_constructor() -> Self {
        Self::new(CTOR_NAME)
            .public()
            .special_name()
            .runtime_special_name()
            .implementation(|asm| {
                asm.ldarg_0()?
                    .call(MethodRef::External(ExternalMethod::object_ctor()))?
                    .ret()?;
                Ok(())
            })
    }

    /// Sets the accessibility.
    #[must_use]
    pub fn access(mut self, access: MethodAccess) -> Self {
        self.access = access;
        self
    }

    /// Makes the method public.
    #[must_use]
    pub fn public(self) -> Self {
        self.access(MethodAccess::Public)
    }

    /// Makes the method private.
    #[must_use]
    pub fn private(self) -> Self {
        self.access(MethodAccess::Private)
    }

    /// Makes the method protected (`family`).
    #[must_use]
    pub fn protected(self) -> Self {
        self.access(MethodAccess::Family)
    }

    /// Makes the method internal (`assembly`).
    #[must_use]
    pub fn internal(self) -> Self {
        self.access(MethodAccess::Assem)
    }

    /// Makes the method static.
    #[must_use]
    pub fn static_method(mut self) -> Self {
        self.modifiers |= MethodModifiers::STATIC;
        self
    }

    /// Makes the method virtual.
    #[must_use]
    pub fn virtual_method(mut self) -> Self {
        self.modifiers |= MethodModifiers::VIRTUAL;
        self
    }

    /// Makes the method abstract (and virtual). Abstract methods can not have an
    /// implementation.
    #[must_use]
    pub fn abstract_method(mut self) -> Self {
        self.modifiers |= MethodModifiers::ABSTRACT | MethodModifiers::VIRTUAL;
        self
    }

    /// Marks the name as special (accessors, constructors).
    #[must_use]
    pub fn special_name(mut self) -> Self {
        self.modifiers |= MethodModifiers::SPECIAL_NAME;
        self
    }

    /// Marks the name as special to the runtime (constructors).
    #[must_use]
    pub fn runtime_special_name(mut self) -> Self {
        self.modifiers |= MethodModifiers::RTSPECIAL_NAME;
        self
    }

    pub(crate) fn semantics(mut self, semantics: MethodSemantics) -> Self {
        self.semantics |= semantics;
        self.special_name()
    }

    /// Sets the return type.
    #[must_use]
    pub fn returns(mut self, return_type: TypeSignature) -> Self {
        self.return_type = return_type;
        self
    }

    /// Appends a parameter.
    #[must_use]
    pub fn parameter(mut self, name: &str, signature: TypeSignature) -> Self {
        self.params.push(Param::new(name, signature));
        self
    }

    /// Appends a parameter carrying a custom attribute.
    #[must_use]
    pub fn parameter_with(
        mut self,
        name: &str,
        signature: TypeSignature,
        attribute: CustomAttribute,
    ) -> Self {
        let mut param = Param::new(name, signature);
        param.custom_attributes.push(attribute);
        self.params.push(param);
        self
    }

    /// Appends a generic method parameter.
    #[must_use]
    pub fn generic_param(mut self, name: &str) -> Self {
        self.generic_params.push(name.to_string());
        self
    }

    /// Applies a custom attribute to the method.
    #[must_use]
    pub fn attribute(mut self, attribute: CustomAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Declares a local variable.
    #[must_use]
    pub fn local(mut self, name: &str, signature: TypeSignature) -> Self {
        self.locals.push((name.to_string(), signature));
        self
    }

    /// Sets the closure that assembles the body.
    #[must_use]
    pub fn implementation<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut InstructionAssembler<'_>) -> Result<()> + 'static,
    {
        self.implementation = Some(Box::new(f));
        self
    }

    /// Returns the name of the method being built.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn has_implementation(&self) -> bool {
        self.implementation.is_some()
    }

    /// Adds the method to `owner`.
    ///
    /// # Errors
    /// Returns an error if an abstract method has an implementation, a concrete method has
    /// none, the implementation fails to assemble, or `owner` does not exist.
    pub fn build(self, module: &mut Module, owner: TypeId) -> Result<MethodId> {
        let is_abstract = self.modifiers.contains(MethodModifiers::ABSTRACT);
        let body = match (self.implementation, is_abstract) {
            (Some(_), true) => {
                return Err(malformed_error!(
                    "Abstract method '{}' can not have an implementation",
                    self.name
                ))
            }
            (None, true) => None,
            (None, false) => {
                return Err(malformed_error!(
                    "Method '{}' needs an implementation",
                    self.name
                ))
            }
            (Some(implementation), false) => {
                let mut body = MethodBody::new();
                for (name, signature) in self.locals {
                    body.add_local(signature, Some(&name))?;
                }
                let mut asm = InstructionAssembler::new(&mut body);
                implementation(&mut asm)?;
                let instructions = asm.finish()?;
                if instructions.is_empty() {
                    return Err(malformed_error!("Method '{}' has an empty body", self.name));
                }
                body.instructions = instructions;
                Some(body)
            }
        };

        let mut method = Method::new(self.name);
        method.access = self.access;
        method.modifiers = self.modifiers;
        method.semantics = self.semantics;
        method.return_type = self.return_type;
        method.params = self.params;
        method.generic_params = self.generic_params;
        method.custom_attributes = self.attributes;
        method.body = body;

        module.add_method(owner, method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assembly::OpCode, metadata::typedef::TypeAttributes};

    fn module() -> (Module, TypeId) {
        let mut module = Module::new("Test.dll");
        let ty = module
            .add_type("App", "Service", TypeAttributes::PUBLIC)
            .unwrap();
        (module, ty)
    }

    #[test]
    fn locals_precede_implementation() {
        let (mut module, ty) = module();
        let id = MethodBuilder::new("Run")
            .local("counter", TypeSignature::I4)
            .implementation(|asm| {
                asm.ldc_i4(1)?.stloc(0)?.ret()?;
                Ok(())
            })
            .build(&mut module, ty)
            .unwrap();

        let body = module.method(id).unwrap().body.as_ref().unwrap();
        assert_eq!(body.locals[0].name.as_deref(), Some("counter"));
        body.validate().unwrap();
    }

    #[test]
    fn default_constructor_chains_to_object() {
        let (mut module, ty) = module();
        let id = MethodBuilder::default_constructor()
            .build(&mut module, ty)
            .unwrap();

        let ctor = module.method(id).unwrap();
        assert!(ctor.is_constructor());
        assert_eq!(ctor.access, MethodAccess::Public);
        let opcodes: Vec<OpCode> = ctor
            .body
            .as_ref()
            .unwrap()
            .instructions
            .iter()
            .map(|i| i.opcode)
            .collect();
        assert_eq!(opcodes, vec![OpCode::Ldarg, OpCode::Call, OpCode::Ret]);
    }

    #[test]
    fn abstract_methods_have_no_body() {
        let (mut module, ty) = module();
        let id = MethodBuilder::new("Run")
            .public()
            .abstract_method()
            .build(&mut module, ty)
            .unwrap();
        assert!(module.method(id).unwrap().body.is_none());

        let result = MethodBuilder::new("Broken")
            .abstract_method()
            .implementation(|asm| {
                asm.ret()?;
                Ok(())
            })
            .build(&mut module, ty);
        assert!(result.is_err());
    }

    #[test]
    fn concrete_methods_need_a_body() {
        let (mut module, ty) = module();
        assert!(MethodBuilder::new("Run").build(&mut module, ty).is_err());
        assert!(MethodBuilder::new("Empty")
            .implementation(|_| Ok(()))
            .build(&mut module, ty)
            .is_err());
    }
}
