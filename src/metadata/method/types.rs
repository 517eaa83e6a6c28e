//! Method attribute flags and supporting types.
//!
//! # Key Types
//! - [`MethodAccess`]: the enumerated 3-bit access field of method attributes
//! - [`MethodModifiers`]: static/virtual/abstract/special-name flags
//! - [`MethodSemantics`]: accessor role of a method (property or event plumbing)
//! - [`LocalVariable`]: a local slot of a method body

use bitflags::bitflags;

use crate::metadata::signatures::TypeSignature;

/// Bitmask for `ACCESS` state extraction
pub const METHOD_ACCESS_MASK: u32 = 0x0007;

/// Accessibility of a method.
///
/// The access field of ECMA-335 method attributes is an enumeration rather than a set of
/// independent bits, so it is modelled as an enum instead of `bitflags`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MethodAccess {
    /// Member not referenceable
    CompilerControlled,
    /// Accessible only by the parent type
    #[default]
    Private,
    /// Accessible by sub-types only in this Assembly
    FamAndAssem,
    /// Accessibly by anyone in the Assembly
    Assem,
    /// Accessible only by type and sub-types
    Family,
    /// Accessibly by sub-types anywhere, plus anyone in assembly
    FamOrAssem,
    /// Accessibly by anyone who has visibility to this scope
    Public,
}

impl MethodAccess {
    /// Extract access from raw method attributes
    #[must_use]
    pub fn from_method_flags(flags: u32) -> Self {
        match flags & METHOD_ACCESS_MASK {
            0x0001 => MethodAccess::Private,
            0x0002 => MethodAccess::FamAndAssem,
            0x0003 => MethodAccess::Assem,
            0x0004 => MethodAccess::Family,
            0x0005 => MethodAccess::FamOrAssem,
            0x0006 => MethodAccess::Public,
            _ => MethodAccess::CompilerControlled,
        }
    }

    /// Returns the raw attribute bits of this access level
    #[must_use]
    pub fn to_method_flags(self) -> u32 {
        match self {
            MethodAccess::CompilerControlled => 0x0000,
            MethodAccess::Private => 0x0001,
            MethodAccess::FamAndAssem => 0x0002,
            MethodAccess::Assem => 0x0003,
            MethodAccess::Family => 0x0004,
            MethodAccess::FamOrAssem => 0x0005,
            MethodAccess::Public => 0x0006,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Method modifiers and properties
    pub struct MethodModifiers: u32 {
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method cannot be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name+sig, else just by name
        const HIDE_BY_SIG = 0x0080;
        /// Method always gets a new slot in the vtable
        const NEW_SLOT = 0x0100;
        /// Method does not provide an implementation
        const ABSTRACT = 0x0400;
        /// Method is special
        const SPECIAL_NAME = 0x0800;
        /// CLI provides 'special' behavior, dpending upon the name of the method
        const RTSPECIAL_NAME = 0x1000;
        /// Implementation is forwarded through PInvoke
        const PINVOKE_IMPL = 0x2000;
    }
}

impl MethodModifiers {
    /// Extract method modifiers from raw method attributes
    #[must_use]
    pub fn from_method_flags(flags: u32) -> Self {
        Self::from_bits_truncate(flags & !METHOD_ACCESS_MASK)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Role of a method in property or event plumbing (`MethodSemantics` table)
    pub struct MethodSemantics: u32 {
        /// Setter for property
        const SETTER = 0x0001;
        /// Getter for property
        const GETTER = 0x0002;
        /// Other method for property or event
        const OTHER = 0x0004;
        /// `AddOn` method for event
        const ADD_ON = 0x0008;
        /// `RemoveOn` method for event
        const REMOVE_ON = 0x0010;
        /// Fire method for event
        const FIRE = 0x0020;
    }
}

/// A local variable slot of a method body.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVariable {
    /// Debug name, if any
    pub name: Option<String>,
    /// The signature of this variable
    pub signature: TypeSignature,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_roundtrips_through_flags() {
        for access in [
            MethodAccess::CompilerControlled,
            MethodAccess::Private,
            MethodAccess::FamAndAssem,
            MethodAccess::Assem,
            MethodAccess::Family,
            MethodAccess::FamOrAssem,
            MethodAccess::Public,
        ] {
            assert_eq!(MethodAccess::from_method_flags(access.to_method_flags()), access);
        }
    }

    #[test]
    fn modifiers_ignore_access_bits() {
        let modifiers = MethodModifiers::from_method_flags(0x0006 | 0x0010 | 0x0800);
        assert_eq!(
            modifiers,
            MethodModifiers::STATIC | MethodModifiers::SPECIAL_NAME
        );
    }
}
