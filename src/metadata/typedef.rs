//! Type definitions and their non-method members.
//!
//! Properties and events do not own code; they link to their accessor methods, which carry
//! the matching [`crate::metadata::method::MethodSemantics`] bits.

use bitflags::bitflags;

use crate::metadata::{
    customattributes::CustomAttribute,
    module::{FieldId, MethodId},
    signatures::TypeSignature,
    token::Token,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Type attributes (the subset the weaver inspects or produces)
    pub struct TypeAttributes: u32 {
        /// Class is public scope
        const PUBLIC = 0x0000_0001;
        /// Type is an interface
        const INTERFACE = 0x0000_0020;
        /// Class is abstract
        const ABSTRACT = 0x0000_0080;
        /// Class is concrete and may not be extended
        const SEALED = 0x0000_0100;
        /// Class name is special
        const SPECIAL_NAME = 0x0000_0400;
        /// Initialize the class any time before first static field access
        const BEFORE_FIELD_INIT = 0x0010_0000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Field attributes (the subset the weaver inspects or produces)
    pub struct FieldAttributes: u32 {
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessibly by anyone who has visibility to this scope
        const PUBLIC = 0x0006;
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Field can only be initialized, not written to after init
        const INIT_ONLY = 0x0020;
        /// Field does not have to be serialized when type is remoted
        const NOT_SERIALIZED = 0x0080;
        /// Field is special
        const SPECIAL_NAME = 0x0200;
    }
}

/// A field definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// `Field` token
    pub token: Token,
    /// Simple name
    pub name: String,
    /// Field flags
    pub flags: FieldAttributes,
    /// Field type
    pub signature: TypeSignature,
}

/// A property and its accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Property name; the display name of both accessors
    pub name: String,
    /// Property type
    pub signature: TypeSignature,
    /// The `get` accessor
    pub getter: Option<MethodId>,
    /// The `set` accessor
    pub setter: Option<MethodId>,
    /// Custom attributes applied to the property
    pub custom_attributes: Vec<CustomAttribute>,
}

/// An event and its accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event name; the display name of both accessors
    pub name: String,
    /// Delegate type of the event
    pub signature: TypeSignature,
    /// The `add` accessor
    pub add_on: Option<MethodId>,
    /// The `remove` accessor
    pub remove_on: Option<MethodId>,
    /// Custom attributes applied to the event
    pub custom_attributes: Vec<CustomAttribute>,
}

/// A type definition.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    /// `TypeDef` token
    pub token: Token,
    /// Namespace, empty for the global namespace
    pub namespace: String,
    /// Simple name
    pub name: String,
    /// Type flags
    pub flags: TypeAttributes,
    /// Names of the generic type parameters
    pub generic_params: Vec<String>,
    /// Methods in declaration order
    pub methods: Vec<MethodId>,
    /// Fields in declaration order
    pub fields: Vec<FieldId>,
    /// Properties in declaration order
    pub properties: Vec<Property>,
    /// Events in declaration order
    pub events: Vec<Event>,
    /// Custom attributes applied to the type
    pub custom_attributes: Vec<CustomAttribute>,
}

impl TypeDef {
    /// Returns `Namespace.Name`, or `Name` in the global namespace
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Returns true for interfaces
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags.contains(TypeAttributes::INTERFACE)
    }

    /// Returns true for classes and value types
    #[must_use]
    pub fn is_class(&self) -> bool {
        !self.is_interface()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typedef(namespace: &str, name: &str) -> TypeDef {
        TypeDef {
            token: Token::new(0x02000001),
            namespace: namespace.to_string(),
            name: name.to_string(),
            flags: TypeAttributes::PUBLIC,
            generic_params: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            properties: Vec::new(),
            events: Vec::new(),
            custom_attributes: Vec::new(),
        }
    }

    #[test]
    fn full_name_omits_global_namespace() {
        assert_eq!(typedef("", "Program").full_name(), "Program");
        assert_eq!(typedef("App.Core", "Service").full_name(), "App.Core.Service");
    }

    #[test]
    fn interfaces_are_not_classes() {
        let mut ty = typedef("App", "IService");
        assert!(ty.is_class());
        ty.flags |= TypeAttributes::INTERFACE;
        assert!(!ty.is_class());
    }
}
