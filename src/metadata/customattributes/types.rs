//! CustomAttribute-specific types and data structures.
//!
//! This module contains all the types used for representing decoded custom attribute data,
//! including argument values, named arguments, and the attribute instance itself. The values
//! are produced by the external loader; the weaver only reads them.

/// A custom attribute attached to a type, member or parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAttribute {
    /// Full name of the attribute type, e.g. `dotweave.Broker.AspectAttribute`
    pub attribute_type: String,
    /// Decoded constructor and named arguments
    pub value: CustomAttributeValue,
}

/// Represents a parsed custom attribute value with arguments and named arguments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomAttributeValue {
    /// Fixed arguments from the constructor signature
    pub fixed_args: Vec<CustomAttributeArgument>,
    /// Named arguments (fields and properties)
    pub named_args: Vec<CustomAttributeNamedArgument>,
}

/// Represents a single custom attribute argument value
#[derive(Debug, Clone, PartialEq)]
pub enum CustomAttributeArgument {
    /// Boolean value
    Bool(bool),
    /// Character value (16-bit Unicode)
    Char(char),
    /// Signed 8-bit integer
    I1(i8),
    /// Unsigned 8-bit integer
    U1(u8),
    /// Signed 16-bit integer
    I2(i16),
    /// Unsigned 16-bit integer
    U2(u16),
    /// Signed 32-bit integer
    I4(i32),
    /// Unsigned 32-bit integer
    U4(u32),
    /// Signed 64-bit integer
    I8(i64),
    /// Unsigned 64-bit integer
    U8(u64),
    /// UTF-8 string, `None` for a null string
    String(Option<String>),
    /// Type reference (as full type name)
    Type(String),
    /// Array of arguments
    Array(Vec<CustomAttributeArgument>),
    /// Enum value (enum type name + underlying value)
    Enum(String, Box<CustomAttributeArgument>),
}

impl CustomAttributeArgument {
    /// Returns the integral value of this argument, looking through enum wrappers.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            CustomAttributeArgument::I1(v) => Some(i64::from(*v)),
            CustomAttributeArgument::U1(v) => Some(i64::from(*v)),
            CustomAttributeArgument::I2(v) => Some(i64::from(*v)),
            CustomAttributeArgument::U2(v) => Some(i64::from(*v)),
            CustomAttributeArgument::I4(v) => Some(i64::from(*v)),
            CustomAttributeArgument::U4(v) => Some(i64::from(*v)),
            CustomAttributeArgument::I8(v) => Some(*v),
            CustomAttributeArgument::U8(v) => i64::try_from(*v).ok(),
            CustomAttributeArgument::Enum(_, inner) => inner.as_integer(),
            _ => None,
        }
    }

    /// Returns the string value of this argument; null strings yield `None`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CustomAttributeArgument::String(Some(value)) => Some(value),
            _ => None,
        }
    }

    /// Returns the type name carried by a `System.Type` argument.
    #[must_use]
    pub fn as_type_name(&self) -> Option<&str> {
        match self {
            CustomAttributeArgument::Type(name) => Some(name),
            _ => None,
        }
    }
}

/// Represents a named argument (field or property) in a custom attribute
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAttributeNamedArgument {
    /// Whether this is a field (true) or property (false)
    pub is_field: bool,
    /// Name of the field or property
    pub name: String,
    /// Type of the argument
    pub arg_type: String,
    /// Value of the argument
    pub value: CustomAttributeArgument,
}
