//! Method definitions, method references and method bodies.
//!
//! # Key Components
//!
//! - [`Method`] - A method definition owned by a [`crate::metadata::module::Module`]
//! - [`Param`] - A parameter with its signature and custom attributes
//! - [`MethodRef`] - Call/`ldftn`/`newobj` operand: a definition or an external member
//! - [`MethodBody`] - The mutable instruction stream of a method
//! - [`ExceptionHandler`] - Protected regions of a body

mod body;
mod exceptions;
mod types;

use std::fmt;

pub use body::MethodBody;
pub use exceptions::{ExceptionHandler, ExceptionHandlerFlags};
pub use types::{LocalVariable, MethodAccess, MethodModifiers, MethodSemantics, METHOD_ACCESS_MASK};

use crate::metadata::{
    customattributes::CustomAttribute,
    module::{MethodId, TypeId},
    signatures::{TypeSignature, FUNC_2},
    token::Token,
};

/// Name of instance constructors
pub const CTOR_NAME: &str = ".ctor";

/// A parameter of a method (excluding the implicit `this`).
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Parameter type
    pub signature: TypeSignature,
    /// Custom attributes applied to the parameter
    pub custom_attributes: Vec<CustomAttribute>,
}

impl Param {
    /// Creates a parameter without attributes.
    #[must_use]
    pub fn new(name: impl Into<String>, signature: TypeSignature) -> Self {
        Param {
            name: name.into(),
            signature,
            custom_attributes: Vec::new(),
        }
    }
}

/// A method definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    /// `MethodDef` token, assigned in declaration order
    pub token: Token,
    /// Simple name
    pub name: String,
    /// The type this method is declared on
    pub declaring_type: TypeId,
    /// Accessibility
    pub access: MethodAccess,
    /// Static/virtual/abstract/special-name flags
    pub modifiers: MethodModifiers,
    /// Accessor role, if this method implements a property or event
    pub semantics: MethodSemantics,
    /// Return type
    pub return_type: TypeSignature,
    /// Parameters, excluding `this`
    pub params: Vec<Param>,
    /// Names of the generic method parameters
    pub generic_params: Vec<String>,
    /// Custom attributes applied to the method
    pub custom_attributes: Vec<CustomAttribute>,
    /// The CIL body, `None` for abstract, runtime-provided or extern methods
    pub body: Option<MethodBody>,
}

impl Method {
    /// Creates a private instance method with an empty signature and no body.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Method {
            token: Token::new(0),
            name: name.into(),
            declaring_type: TypeId(0),
            access: MethodAccess::Private,
            modifiers: MethodModifiers::HIDE_BY_SIG,
            semantics: MethodSemantics::empty(),
            return_type: TypeSignature::Void,
            params: Vec::new(),
            generic_params: Vec::new(),
            custom_attributes: Vec::new(),
            body: None,
        }
    }

    /// Returns true if the method has no `this`
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.modifiers.contains(MethodModifiers::STATIC)
    }

    /// Returns true if the method has no implementation
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.modifiers.contains(MethodModifiers::ABSTRACT)
    }

    /// Returns true for instance constructors
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == CTOR_NAME && !self.is_static()
    }

    /// Returns true for property getters
    #[must_use]
    pub fn is_getter(&self) -> bool {
        self.semantics.contains(MethodSemantics::GETTER)
    }

    /// Returns true for property setters
    #[must_use]
    pub fn is_setter(&self) -> bool {
        self.semantics.contains(MethodSemantics::SETTER)
    }

    /// Returns true for event `add` accessors
    #[must_use]
    pub fn is_add_on(&self) -> bool {
        self.semantics.contains(MethodSemantics::ADD_ON)
    }

    /// Returns true for event `remove` accessors
    #[must_use]
    pub fn is_remove_on(&self) -> bool {
        self.semantics.contains(MethodSemantics::REMOVE_ON)
    }

    /// Returns true for property or event accessors
    #[must_use]
    pub fn is_accessor(&self) -> bool {
        self.is_getter() || self.is_setter() || self.is_add_on() || self.is_remove_on()
    }

    /// Returns the CIL argument index of parameter `param` (shifted by one for `this`).
    #[must_use]
    pub fn argument_index(&self, param: usize) -> u16 {
        let shift = usize::from(!self.is_static());
        u16::try_from(param + shift).unwrap_or(u16::MAX)
    }

    /// Returns a reference to this method instantiated over its own generic parameters.
    ///
    /// This is how a method calls a sibling that was duplicated from it: every generic method
    /// parameter is forwarded unchanged.
    #[must_use]
    pub fn self_generic_args(&self) -> Vec<TypeSignature> {
        (0..self.generic_params.len())
            .map(|i| TypeSignature::GenericParamMethod(u32::try_from(i).unwrap_or(u32::MAX)))
            .collect()
    }
}

/// A method that is not defined in the module being woven.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalMethod {
    /// The declaring type
    pub declaring_type: TypeSignature,
    /// Simple name
    pub name: String,
    /// Instance method (`HASTHIS`)
    pub has_this: bool,
    /// Parameter types
    pub params: Vec<TypeSignature>,
    /// Return type
    pub return_type: TypeSignature,
}

impl ExternalMethod {
    /// `System.Object::.ctor()`
    #[must_use]
    pub fn object_ctor() -> Self {
        ExternalMethod {
            declaring_type: TypeSignature::Object,
            name: CTOR_NAME.to_string(),
            has_this: true,
            params: Vec::new(),
            return_type: TypeSignature::Void,
        }
    }

    /// `System.Func<object[], object>::.ctor(object, native int)`
    #[must_use]
    pub fn boxed_invoker_ctor() -> Self {
        ExternalMethod {
            declaring_type: TypeSignature::boxed_invoker(),
            name: CTOR_NAME.to_string(),
            has_this: true,
            params: vec![TypeSignature::Object, TypeSignature::I],
            return_type: TypeSignature::Void,
        }
    }

    /// `System.Func<object[], object>::Invoke(object[])`
    #[must_use]
    pub fn boxed_invoker_invoke() -> Self {
        ExternalMethod {
            declaring_type: TypeSignature::boxed_invoker(),
            name: "Invoke".to_string(),
            has_this: true,
            params: vec![TypeSignature::object_array()],
            return_type: TypeSignature::Object,
        }
    }

    /// Returns true if this is a member of `System.Func`2`
    #[must_use]
    pub fn is_boxed_invoker_member(&self) -> bool {
        match &self.declaring_type {
            TypeSignature::GenericInst(base, _) => {
                matches!(base.as_ref(), TypeSignature::Class(name) if name == FUNC_2)
            }
            _ => false,
        }
    }
}

/// Operand of `call`, `callvirt`, `newobj` and `ldftn`.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodRef {
    /// A method defined in this module, with generic method arguments
    Def {
        /// The referenced method
        method: MethodId,
        /// Generic method arguments, empty for non-generic methods
        generic_args: Vec<TypeSignature>,
    },
    /// A method of another assembly
    External(ExternalMethod),
}

impl MethodRef {
    /// References a non-generic method definition.
    #[must_use]
    pub fn def(method: MethodId) -> Self {
        MethodRef::Def {
            method,
            generic_args: Vec::new(),
        }
    }

    /// References a method definition instantiated with `generic_args`.
    #[must_use]
    pub fn generic(method: MethodId, generic_args: Vec<TypeSignature>) -> Self {
        MethodRef::Def {
            method,
            generic_args,
        }
    }

    /// Returns the referenced definition, if this is not an external method.
    #[must_use]
    pub fn definition(&self) -> Option<MethodId> {
        match self {
            MethodRef::Def { method, .. } => Some(*method),
            MethodRef::External(_) => None,
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodRef::Def {
                method,
                generic_args,
            } => {
                write!(f, "{method}")?;
                if !generic_args.is_empty() {
                    let args: Vec<String> = generic_args.iter().map(ToString::to_string).collect();
                    write!(f, "<{}>", args.join(", "))?;
                }
                Ok(())
            }
            MethodRef::External(external) => {
                write!(f, "{}::{}", external.declaring_type, external.name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructor_requires_instance() {
        let mut ctor = Method::new(CTOR_NAME);
        assert!(ctor.is_constructor());
        ctor.modifiers |= MethodModifiers::STATIC;
        assert!(!ctor.is_constructor());
    }

    #[test]
    fn argument_index_skips_this() {
        let mut method = Method::new("Compute");
        assert_eq!(method.argument_index(0), 1);
        method.modifiers |= MethodModifiers::STATIC;
        assert_eq!(method.argument_index(0), 0);
    }

    #[test]
    fn self_generic_args_forward_method_parameters() {
        let mut method = Method::new("Map");
        method.generic_params = vec!["TIn".into(), "TOut".into()];
        assert_eq!(
            method.self_generic_args(),
            vec![
                TypeSignature::GenericParamMethod(0),
                TypeSignature::GenericParamMethod(1)
            ]
        );
    }

    #[test]
    fn invoker_members_are_recognized() {
        assert!(ExternalMethod::boxed_invoker_ctor().is_boxed_invoker_member());
        assert!(ExternalMethod::boxed_invoker_invoke().is_boxed_invoker_member());
        assert!(!ExternalMethod::object_ctor().is_boxed_invoker_member());
    }
}
