use std::fmt;

/// Full name of the two-argument generic delegate used to hand a target's original
/// behavior to around advices.
pub const FUNC_2: &str = "System.Func`2";

/// Represents a type as it appears in parameter, return, local and field signatures.
///
/// Named types carry their full name instead of a `TypeDefOrRef` token: the weaver resolves
/// definitions by name and never needs to encode a signature blob itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TypeSignature {
    /// void
    #[default]
    Void,
    /// bool
    Boolean,
    /// char
    Char,
    /// signed 8bit integer
    I1,
    /// unsigned 8bit integer
    U1,
    /// signed 16bit integer
    I2,
    /// unsigned 16bit integer
    U2,
    /// signed 32bit integer
    I4,
    /// unsigned 32bit integer
    U4,
    /// signed 64bit integer
    I8,
    /// unsigned 64bit integer
    U8,
    /// 32bit floating-point
    R4,
    /// 64bit floating-point
    R8,
    /// signed integer, sized to executing platform
    I,
    /// unsigned integer, sized to executing platform
    U,
    /// System.String
    String,
    /// System.Object
    Object,
    /// CIL value-type, by full name
    ValueType(String),
    /// CIL Class, by full name
    Class(String),
    /// Type by reference
    ByRef(Box<TypeSignature>),
    /// Single dimension array
    SzArray(Box<TypeSignature>),
    /// Generic type parameter, by position on the declaring type
    GenericParamType(u32),
    /// Generic method parameter, by position on the declaring method
    GenericParamMethod(u32),
    /// Generic type and its arguments
    GenericInst(Box<TypeSignature>, Vec<TypeSignature>),
}

impl TypeSignature {
    /// `object[]`, the uniform argument carrier of boxed-argument entry points
    #[must_use]
    pub fn object_array() -> Self {
        TypeSignature::SzArray(Box::new(TypeSignature::Object))
    }

    /// `ref bool`, the shape required for abort flags
    #[must_use]
    pub fn bool_by_ref() -> Self {
        TypeSignature::ByRef(Box::new(TypeSignature::Boolean))
    }

    /// `System.Func<object[], object>`, the callable handed to around advices
    #[must_use]
    pub fn boxed_invoker() -> Self {
        TypeSignature::GenericInst(
            Box::new(TypeSignature::Class(FUNC_2.to_string())),
            vec![TypeSignature::object_array(), TypeSignature::Object],
        )
    }

    /// Returns true for `void`
    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self, TypeSignature::Void)
    }

    /// Returns true for `System.Object`
    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self, TypeSignature::Object)
    }

    /// Returns true for managed references (`ref T`, `out T`)
    #[must_use]
    pub fn is_by_reference(&self) -> bool {
        matches!(self, TypeSignature::ByRef(_))
    }

    /// Returns true for generic type or method parameters
    #[must_use]
    pub fn is_generic_parameter(&self) -> bool {
        matches!(
            self,
            TypeSignature::GenericParamType(_) | TypeSignature::GenericParamMethod(_)
        )
    }

    /// Returns true if values of this type live on the stack and must be boxed to become an
    /// object reference.
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        match self {
            TypeSignature::Boolean
            | TypeSignature::Char
            | TypeSignature::I1
            | TypeSignature::U1
            | TypeSignature::I2
            | TypeSignature::U2
            | TypeSignature::I4
            | TypeSignature::U4
            | TypeSignature::I8
            | TypeSignature::U8
            | TypeSignature::R4
            | TypeSignature::R8
            | TypeSignature::I
            | TypeSignature::U
            | TypeSignature::ValueType(_) => true,
            TypeSignature::GenericInst(base, _) => base.is_value_type(),
            _ => false,
        }
    }

    /// Returns true if converting a value of this type to or from `object` goes through
    /// `box` / `unbox.any` rather than a reference cast.
    ///
    /// Generic parameters are included because their instantiation is unknown at weave time.
    #[must_use]
    pub fn needs_boxing(&self) -> bool {
        self.is_value_type() || self.is_generic_parameter()
    }

    /// Returns the referenced type for `ref T`, or the type itself otherwise
    #[must_use]
    pub fn element_type(&self) -> &TypeSignature {
        match self {
            TypeSignature::ByRef(inner) => inner,
            other => other,
        }
    }
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSignature::Void => write!(f, "void"),
            TypeSignature::Boolean => write!(f, "bool"),
            TypeSignature::Char => write!(f, "char"),
            TypeSignature::I1 => write!(f, "sbyte"),
            TypeSignature::U1 => write!(f, "byte"),
            TypeSignature::I2 => write!(f, "short"),
            TypeSignature::U2 => write!(f, "ushort"),
            TypeSignature::I4 => write!(f, "int"),
            TypeSignature::U4 => write!(f, "uint"),
            TypeSignature::I8 => write!(f, "long"),
            TypeSignature::U8 => write!(f, "ulong"),
            TypeSignature::R4 => write!(f, "float"),
            TypeSignature::R8 => write!(f, "double"),
            TypeSignature::I => write!(f, "nint"),
            TypeSignature::U => write!(f, "nuint"),
            TypeSignature::String => write!(f, "string"),
            TypeSignature::Object => write!(f, "object"),
            TypeSignature::ValueType(name) | TypeSignature::Class(name) => write!(f, "{name}"),
            TypeSignature::ByRef(inner) => write!(f, "ref {inner}"),
            TypeSignature::SzArray(inner) => write!(f, "{inner}[]"),
            TypeSignature::GenericParamType(index) => write!(f, "!{index}"),
            TypeSignature::GenericParamMethod(index) => write!(f, "!!{index}"),
            TypeSignature::GenericInst(base, args) => {
                write!(f, "{base}<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ">")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_types_need_boxing() {
        assert!(TypeSignature::I4.needs_boxing());
        assert!(TypeSignature::ValueType("System.Guid".into()).needs_boxing());
        assert!(TypeSignature::GenericParamMethod(0).needs_boxing());
        assert!(!TypeSignature::String.needs_boxing());
        assert!(!TypeSignature::object_array().needs_boxing());
    }

    #[test]
    fn element_type_strips_one_reference() {
        let by_ref = TypeSignature::ByRef(Box::new(TypeSignature::I4));
        assert!(by_ref.is_by_reference());
        assert_eq!(by_ref.element_type(), &TypeSignature::I4);
        assert_eq!(TypeSignature::String.element_type(), &TypeSignature::String);
    }

    #[test]
    fn display_reads_like_source() {
        assert_eq!(
            TypeSignature::boxed_invoker().to_string(),
            "System.Func`2<object[], object>"
        );
        assert_eq!(TypeSignature::bool_by_ref().to_string(), "ref bool");
    }
}
