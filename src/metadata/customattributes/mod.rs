//! Custom attributes attached to metadata elements.
//!
//! Custom attributes are the declarative surface of the weaver: aspects are referenced,
//! advices are marked and advice parameters are bound through them. This module only models
//! the decoded attribute data and offers lookup helpers; turning attributes into typed
//! declarations is done once, up front, by [`crate::weaver::Declarations`].
//!
//! # Examples
//!
//! ```rust
//! use dotweave::metadata::customattributes::{
//!     CustomAttribute, CustomAttributeArgument, CustomAttributeValue,
//! };
//!
//! let attribute = CustomAttribute::new("Sample.TraceAttribute")
//!     .fixed(CustomAttributeArgument::I4(3))
//!     .property("NameFilter", CustomAttributeArgument::String(Some("^Get".into())));
//!
//! assert_eq!(attribute.fixed_arg(0).and_then(|a| a.as_integer()), Some(3));
//! assert_eq!(attribute.named_arg("NameFilter").and_then(|a| a.as_str()), Some("^Get"));
//! ```

mod types;

pub use types::{
    CustomAttribute, CustomAttributeArgument, CustomAttributeNamedArgument, CustomAttributeValue,
};

impl CustomAttribute {
    /// Creates an attribute of the given type without arguments.
    #[must_use]
    pub fn new(attribute_type: impl Into<String>) -> Self {
        CustomAttribute {
            attribute_type: attribute_type.into(),
            value: CustomAttributeValue::default(),
        }
    }

    /// Appends a constructor argument.
    #[must_use]
    pub fn fixed(mut self, argument: CustomAttributeArgument) -> Self {
        self.value.fixed_args.push(argument);
        self
    }

    /// Appends a named property argument.
    #[must_use]
    pub fn property(mut self, name: &str, value: CustomAttributeArgument) -> Self {
        self.value.named_args.push(CustomAttributeNamedArgument {
            is_field: false,
            name: name.to_string(),
            arg_type: String::new(),
            value,
        });
        self
    }

    /// Returns true if this attribute is an instance of `attribute_type`.
    #[must_use]
    pub fn is_of_type(&self, attribute_type: &str) -> bool {
        self.attribute_type == attribute_type
    }

    /// Returns the constructor argument at `index`.
    #[must_use]
    pub fn fixed_arg(&self, index: usize) -> Option<&CustomAttributeArgument> {
        self.value.fixed_args.get(index)
    }

    /// Returns the value of the named field or property argument `name`.
    #[must_use]
    pub fn named_arg(&self, name: &str) -> Option<&CustomAttributeArgument> {
        self.value
            .named_args
            .iter()
            .find(|arg| arg.name == name)
            .map(|arg| &arg.value)
    }
}

/// Iterates over all attributes of `attribute_type` in declaration order.
pub fn attributes_of_type<'a>(
    attributes: &'a [CustomAttribute],
    attribute_type: &'a str,
) -> impl Iterator<Item = &'a CustomAttribute> + 'a {
    attributes
        .iter()
        .filter(move |attribute| attribute.is_of_type(attribute_type))
}

/// Returns the first attribute of `attribute_type`, if any.
#[must_use]
pub fn attribute_of_type<'a>(
    attributes: &'a [CustomAttribute],
    attribute_type: &str,
) -> Option<&'a CustomAttribute> {
    attributes
        .iter()
        .find(|attribute| attribute.is_of_type(attribute_type))
}
