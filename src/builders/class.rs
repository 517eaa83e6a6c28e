//! High-level class builder.
//!
//! [`ClassBuilder`] creates a type definition together with its fields, methods, properties
//! and events in a single fluent call chain. Members are added in the order the builder
//! declares them: fields first, then methods, then auto-properties, properties and events.
//! Method tokens therefore follow the order of the [`ClassBuilder::method`] calls.

use crate::{
    builders::{EventBuilder, MethodBuilder, PropertyBuilder},
    metadata::{
        customattributes::CustomAttribute,
        module::{Module, TypeId},
        signatures::TypeSignature,
        typedef::{FieldAttributes, TypeAttributes},
    },
    Result,
};

/// Field definition for the class builder.
struct ClassFieldDefinition {
    name: String,
    signature: TypeSignature,
    flags: FieldAttributes,
}

/// Builder for a complete class (or interface) definition.
///
/// # Examples
///
/// ```rust
/// use dotweave::builders::{ClassBuilder, MethodBuilder};
/// use dotweave::metadata::{signatures::TypeSignature, Module};
///
/// let mut module = Module::new("App.dll");
/// let ty = ClassBuilder::new("Service")
///     .namespace("App")
///     .public()
///     .field("count", TypeSignature::I4)
///     .default_constructor()
///     .method(
///         MethodBuilder::new("Run")
///             .public()
///             .implementation(|asm| {
///                 asm.ret()?;
///                 Ok(())
///             }),
///     )
///     .auto_property("Name", TypeSignature::String)
///     .build(&mut module)?;
///
/// let service = module.ty(ty)?;
/// assert_eq!(service.full_name(), "App.Service");
/// assert_eq!(service.methods.len(), 4);
/// # Ok::<(), dotweave::Error>(())
/// ```
pub struct ClassBuilder {
    name: String,
    namespace: String,
    flags: TypeAttributes,
    generic_params: Vec<String>,
    attributes: Vec<CustomAttribute>,
    fields: Vec<ClassFieldDefinition>,
    methods: Vec<MethodBuilder>,
    auto_properties: Vec<(String, TypeSignature)>,
    properties: Vec<PropertyBuilder>,
    events: Vec<EventBuilder>,
}

impl ClassBuilder {
    /// Creates a builder for a non-public class in the global namespace.
    #[must_use]
    pub fn new(name: &str) -> Self {
        ClassBuilder {
            name: name.to_string(),
            namespace: String::new(),
            flags: TypeAttributes::BEFORE_FIELD_INIT,
            generic_params: Vec::new(),
            attributes: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            auto_properties: Vec::new(),
            properties: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Sets the namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    /// Makes the type public.
    #[must_use]
    pub fn public(mut self) -> Self {
        self.flags |= TypeAttributes::PUBLIC;
        self
    }

    /// Makes the type an interface.
    #[must_use]
    pub fn interface(mut self) -> Self {
        self.flags |= TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT;
        self.flags -= TypeAttributes::BEFORE_FIELD_INIT;
        self
    }

    /// Makes the type abstract.
    #[must_use]
    pub fn abstract_type(mut self) -> Self {
        self.flags |= TypeAttributes::ABSTRACT;
        self
    }

    /// Makes the type sealed.
    #[must_use]
    pub fn sealed(mut self) -> Self {
        self.flags |= TypeAttributes::SEALED;
        self
    }

    /// Appends a generic type parameter.
    #[must_use]
    pub fn generic_param(mut self, name: &str) -> Self {
        self.generic_params.push(name.to_string());
        self
    }

    /// Applies a custom attribute to the type.
    #[must_use]
    pub fn attribute(mut self, attribute: CustomAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Adds a private instance field.
    #[must_use]
    pub fn field(self, name: &str, signature: TypeSignature) -> Self {
        self.field_with(name, signature, FieldAttributes::PRIVATE)
    }

    /// Adds a field with explicit flags.
    #[must_use]
    pub fn field_with(
        mut self,
        name: &str,
        signature: TypeSignature,
        flags: FieldAttributes,
    ) -> Self {
        self.fields.push(ClassFieldDefinition {
            name: name.to_string(),
            signature,
            flags,
        });
        self
    }

    /// Adds a method.
    #[must_use]
    pub fn method(mut self, method: MethodBuilder) -> Self {
        self.methods.push(method);
        self
    }

    /// Adds a public parameterless constructor.
    #[must_use]
    pub fn default_constructor(self) -> Self {
        self.method(MethodBuilder::default_constructor())
    }

    /// Adds a public read/write property backed by a private field, the way compilers emit
    /// auto-implemented properties.
    #[must_use]
    pub fn auto_property(mut self, name: &str, signature: TypeSignature) -> Self {
        self.auto_properties.push((name.to_string(), signature));
        self
    }

    /// Adds a property.
    #[must_use]
    pub fn property(mut self, property: PropertyBuilder) -> Self {
        self.properties.push(property);
        self
    }

    /// Adds an event.
    #[must_use]
    pub fn event(mut self, event: EventBuilder) -> Self {
        self.events.push(event);
        self
    }

    /// Adds the type and all of its members to `module`.
    ///
    /// # Errors
    /// Returns an error if a member fails to build or an interface declares fields or
    /// concrete methods.
    pub fn build(self, module: &mut Module) -> Result<TypeId> {
        let is_interface = self.flags.contains(TypeAttributes::INTERFACE);
        if is_interface && (!self.fields.is_empty() || !self.auto_properties.is_empty()) {
            return Err(malformed_error!(
                "Interface '{}' can not declare fields",
                self.name
            ));
        }
        if let Some(method) = self
            .methods
            .iter()
            .find(|m| is_interface && m.has_implementation())
        {
            return Err(malformed_error!(
                "Interface method '{}' can not have a body",
                method.name()
            ));
        }

        let ty = module.add_type(&self.namespace, &self.name, self.flags)?;
        {
            let typedef = module.type_mut(ty)?;
            typedef.generic_params = self.generic_params;
            typedef.custom_attributes = self.attributes;
        }

        for field in self.fields {
            module.add_field(ty, &field.name, field.flags, field.signature)?;
        }

        for method in self.methods {
            method.build(module, ty)?;
        }

        for (name, signature) in self.auto_properties {
            let backing = module.add_field(
                ty,
                &format!("<{name}>k__BackingField"),
                FieldAttributes::PRIVATE,
                signature.clone(),
            )?;
            let getter = MethodBuilder::new(&format!("get_{name}"))
                .public()
                .returns(signature.clone())
                .implementation(move |asm| {
                    asm.ldarg_0()?.ldfld(backing)?.ret()?;
                    Ok(())
                });
            let setter = MethodBuilder::new(&format!("set_{name}"))
                .public()
                .parameter("value", signature.clone())
                .implementation(move |asm| {
                    asm.ldarg_0()?.ldarg(1)?.stfld(backing)?.ret()?;
                    Ok(())
                });
            PropertyBuilder::new(&name, signature)
                .getter(getter)
                .setter(setter)
                .build(module, ty)?;
        }

        for property in self.properties {
            property.build(module, ty)?;
        }

        for event in self.events {
            event.build(module, ty)?;
        }

        Ok(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::method::MethodSemantics;

    #[test]
    fn members_follow_declaration_order() {
        let mut module = Module::new("Test.dll");
        let ty = ClassBuilder::new("Service")
            .namespace("App")
            .method(MethodBuilder::new("A").implementation(|asm| {
                asm.ret()?;
                Ok(())
            }))
            .default_constructor()
            .auto_property("Name", TypeSignature::String)
            .build(&mut module)
            .unwrap();

        let names: Vec<&str> = module
            .ty(ty)
            .unwrap()
            .methods
            .iter()
            .map(|&id| module.method(id).unwrap().name.as_str())
            .collect();
        assert_eq!(names, vec!["A", ".ctor", "get_Name", "set_Name"]);
    }

    #[test]
    fn auto_property_links_accessors() {
        let mut module = Module::new("Test.dll");
        let ty = ClassBuilder::new("Settings")
            .auto_property("Level", TypeSignature::I4)
            .build(&mut module)
            .unwrap();

        let typedef = module.ty(ty).unwrap();
        let property = &typedef.properties[0];
        let getter = module.method(property.getter.unwrap()).unwrap();
        let setter = module.method(property.setter.unwrap()).unwrap();
        assert_eq!(getter.semantics, MethodSemantics::GETTER);
        assert_eq!(setter.semantics, MethodSemantics::SETTER);
        assert_eq!(getter.return_type, TypeSignature::I4);
        assert_eq!(typedef.fields.len(), 1);
    }

    #[test]
    fn interfaces_reject_fields_and_bodies() {
        let mut module = Module::new("Test.dll");
        let fields = ClassBuilder::new("IService")
            .interface()
            .field("x", TypeSignature::I4)
            .build(&mut module);
        assert!(fields.is_err());

        let bodies = ClassBuilder::new("IRunner")
            .interface()
            .method(MethodBuilder::new("Run").public().implementation(|asm| {
                asm.ret()?;
                Ok(())
            }))
            .build(&mut module);
        assert!(bodies.is_err());
    }
}
