//! Property and event builders.
//!
//! Both builders own the [`MethodBuilder`]s of their accessors. When the declaring class is
//! built, the accessors are added as methods of the class with the matching
//! [`MethodSemantics`] role and the property or event is linked to them.

use crate::{
    builders::MethodBuilder,
    metadata::{
        customattributes::CustomAttribute,
        method::MethodSemantics,
        module::{Module, TypeId},
        signatures::TypeSignature,
        typedef::{Event, Property},
    },
    Result,
};

/// Builder for a property and its accessors.
///
/// # Examples
///
/// ```rust
/// use dotweave::builders::{ClassBuilder, MethodBuilder, PropertyBuilder};
/// use dotweave::metadata::{signatures::TypeSignature, Module};
///
/// let mut module = Module::new("App.dll");
/// let ty = ClassBuilder::new("Settings")
///     .namespace("App")
///     .property(
///         PropertyBuilder::new("Answer", TypeSignature::I4).getter(
///             MethodBuilder::new("get_Answer")
///                 .public()
///                 .returns(TypeSignature::I4)
///                 .implementation(|asm| {
///                     asm.ldc_i4(42)?.ret()?;
///                     Ok(())
///                 }),
///         ),
///     )
///     .build(&mut module)?;
///
/// let property = &module.ty(ty)?.properties[0];
/// assert!(property.getter.is_some() && property.setter.is_none());
/// # Ok::<(), dotweave::Error>(())
/// ```
pub struct PropertyBuilder {
    name: String,
    signature: TypeSignature,
    getter: Option<MethodBuilder>,
    setter: Option<MethodBuilder>,
    attributes: Vec<CustomAttribute>,
}

impl PropertyBuilder {
    /// Creates a property named `name` of type `signature`, without accessors.
    #[must_use]
    pub fn new(name: &str, signature: TypeSignature) -> Self {
        PropertyBuilder {
            name: name.to_string(),
            signature,
            getter: None,
            setter: None,
            attributes: Vec::new(),
        }
    }

    /// Sets the `get` accessor.
    #[must_use]
    pub fn getter(mut self, method: MethodBuilder) -> Self {
        self.getter = Some(method.semantics(MethodSemantics::GETTER));
        self
    }

    /// Sets the `set` accessor.
    #[must_use]
    pub fn setter(mut self, method: MethodBuilder) -> Self {
        self.setter = Some(method.semantics(MethodSemantics::SETTER));
        self
    }

    /// Applies a custom attribute to the property.
    #[must_use]
    pub fn attribute(mut self, attribute: CustomAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Adds the accessors and the property to `owner`.
    ///
    /// # Errors
    /// Returns an error if an accessor fails to build.
    pub fn build(self, module: &mut Module, owner: TypeId) -> Result<()> {
        let getter = self
            .getter
            .map(|method| method.build(module, owner))
            .transpose()?;
        let setter = self
            .setter
            .map(|method| method.build(module, owner))
            .transpose()?;

        module.add_property(
            owner,
            Property {
                name: self.name,
                signature: self.signature,
                getter,
                setter,
                custom_attributes: self.attributes,
            },
        )
    }
}

/// Builder for an event and its accessors.
pub struct EventBuilder {
    name: String,
    signature: TypeSignature,
    add_on: Option<MethodBuilder>,
    remove_on: Option<MethodBuilder>,
    attributes: Vec<CustomAttribute>,
}

impl EventBuilder {
    /// Creates an event named `name` of delegate type `signature`, without accessors.
    #[must_use]
    pub fn new(name: &str, signature: TypeSignature) -> Self {
        EventBuilder {
            name: name.to_string(),
            signature,
            add_on: None,
            remove_on: None,
            attributes: Vec::new(),
        }
    }

    /// Sets the `add` accessor.
    #[must_use]
    pub fn add_on(mut self, method: MethodBuilder) -> Self {
        self.add_on = Some(method.semantics(MethodSemantics::ADD_ON));
        self
    }

    /// Sets the `remove` accessor.
    #[must_use]
    pub fn remove_on(mut self, method: MethodBuilder) -> Self {
        self.remove_on = Some(method.semantics(MethodSemantics::REMOVE_ON));
        self
    }

    /// Applies a custom attribute to the event.
    #[must_use]
    pub fn attribute(mut self, attribute: CustomAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Adds the accessors and the event to `owner`.
    ///
    /// # Errors
    /// Returns an error if an accessor fails to build.
    pub fn build(self, module: &mut Module, owner: TypeId) -> Result<()> {
        let add_on = self
            .add_on
            .map(|method| method.build(module, owner))
            .transpose()?;
        let remove_on = self
            .remove_on
            .map(|method| method.build(module, owner))
            .transpose()?;

        module.add_event(
            owner,
            Event {
                name: self.name,
                signature: self.signature,
                add_on,
                remove_on,
                custom_attributes: self.attributes,
            },
        )
    }
}
