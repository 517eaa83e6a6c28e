//! The in-memory metadata graph of one compiled module.
//!
//! [`Module`] is an arena: types, methods and fields live in flat vectors and refer to each
//! other through [`TypeId`], [`MethodId`] and [`FieldId`] indices. Identifiers are stable for
//! the lifetime of the module because elements are only ever appended, which is what lets
//! injection plans keep pointing at their targets while the weaver synthesizes new members.

use std::fmt;

use crate::{
    metadata::{
        method::{Method, MethodBody},
        signatures::TypeSignature,
        token::{Token, TABLE_FIELD, TABLE_METHODDEF, TABLE_TYPEDEF},
        typedef::{Event, Field, FieldAttributes, Property, TypeAttributes, TypeDef},
    },
    Error, Result,
};

/// Index of a type in its [`Module`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(pub usize);

/// Index of a method in its [`Module`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodId(pub usize);

/// Index of a field in its [`Module`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId(pub usize);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type#{}", self.0)
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method#{}", self.0)
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field#{}", self.0)
    }
}

fn row(len: usize) -> Result<u32> {
    u32::try_from(len + 1)
        .ok()
        .filter(|row| *row <= 0x00FF_FFFF)
        .ok_or_else(|| malformed_error!("Metadata table is full"))
}

/// A compiled module: the unit the weaver reads, rewrites and hands back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    /// Module name, e.g. `App.dll`
    pub name: String,
    types: Vec<TypeDef>,
    methods: Vec<Method>,
    fields: Vec<Field>,
}

impl Module {
    /// Creates an empty module.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a type definition without members.
    ///
    /// # Errors
    /// Returns an error if the `TypeDef` table is full.
    pub fn add_type(
        &mut self,
        namespace: &str,
        name: &str,
        flags: TypeAttributes,
    ) -> Result<TypeId> {
        let token = Token::from_parts(TABLE_TYPEDEF, row(self.types.len())?);
        self.types.push(TypeDef {
            token,
            namespace: namespace.to_string(),
            name: name.to_string(),
            flags,
            generic_params: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            properties: Vec::new(),
            events: Vec::new(),
            custom_attributes: Vec::new(),
        });
        Ok(TypeId(self.types.len() - 1))
    }

    /// Adds `method` to `owner`, assigning its token and declaring type.
    ///
    /// # Errors
    /// Returns an error if `owner` does not exist or the `MethodDef` table is full.
    pub fn add_method(&mut self, owner: TypeId, mut method: Method) -> Result<MethodId> {
        let token = Token::from_parts(TABLE_METHODDEF, row(self.methods.len())?);
        let id = MethodId(self.methods.len());
        method.token = token;
        method.declaring_type = owner;
        self.type_mut(owner)?.methods.push(id);
        self.methods.push(method);
        Ok(id)
    }

    /// Adds a field to `owner`.
    ///
    /// # Errors
    /// Returns an error if `owner` does not exist or the `Field` table is full.
    pub fn add_field(
        &mut self,
        owner: TypeId,
        name: &str,
        flags: FieldAttributes,
        signature: TypeSignature,
    ) -> Result<FieldId> {
        let token = Token::from_parts(TABLE_FIELD, row(self.fields.len())?);
        let id = FieldId(self.fields.len());
        self.type_mut(owner)?.fields.push(id);
        self.fields.push(Field {
            token,
            name: name.to_string(),
            flags,
            signature,
        });
        Ok(id)
    }

    /// Adds a property to `owner`. The accessors must already be methods of `owner`.
    ///
    /// # Errors
    /// Returns an error if `owner` does not exist.
    pub fn add_property(&mut self, owner: TypeId, property: Property) -> Result<()> {
        self.type_mut(owner)?.properties.push(property);
        Ok(())
    }

    /// Adds an event to `owner`. The accessors must already be methods of `owner`.
    ///
    /// # Errors
    /// Returns an error if `owner` does not exist.
    pub fn add_event(&mut self, owner: TypeId, event: Event) -> Result<()> {
        self.type_mut(owner)?.events.push(event);
        Ok(())
    }

    /// Returns the type `id`.
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] for unknown ids.
    pub fn ty(&self, id: TypeId) -> Result<&TypeDef> {
        self.types.get(id.0).ok_or(Error::TypeNotFound(id.0))
    }

    /// Returns the type `id` for modification.
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] for unknown ids.
    pub fn type_mut(&mut self, id: TypeId) -> Result<&mut TypeDef> {
        self.types.get_mut(id.0).ok_or(Error::TypeNotFound(id.0))
    }

    /// Returns the method `id`.
    ///
    /// # Errors
    /// Returns [`Error::MethodNotFound`] for unknown ids.
    pub fn method(&self, id: MethodId) -> Result<&Method> {
        self.methods.get(id.0).ok_or(Error::MethodNotFound(id.0))
    }

    /// Returns the method `id` for modification.
    ///
    /// # Errors
    /// Returns [`Error::MethodNotFound`] for unknown ids.
    pub fn method_mut(&mut self, id: MethodId) -> Result<&mut Method> {
        self.methods.get_mut(id.0).ok_or(Error::MethodNotFound(id.0))
    }

    /// Returns the field `id`, if it exists.
    #[must_use]
    pub fn field(&self, id: FieldId) -> Option<&Field> {
        self.fields.get(id.0)
    }

    /// Iterates over all types in declaration order.
    pub fn types(&self) -> impl Iterator<Item = (TypeId, &TypeDef)> {
        self.types.iter().enumerate().map(|(i, ty)| (TypeId(i), ty))
    }

    /// Returns all type definitions in declaration order.
    #[must_use]
    pub fn type_defs(&self) -> &[TypeDef] {
        &self.types
    }

    /// Returns the number of methods in the module.
    #[must_use]
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Looks up a type by its full name.
    #[must_use]
    pub fn find_type(&self, full_name: &str) -> Option<TypeId> {
        self.types()
            .find(|(_, ty)| ty.full_name() == full_name)
            .map(|(id, _)| id)
    }

    /// Looks up a method of `owner` by simple name.
    #[must_use]
    pub fn find_method(&self, owner: TypeId, name: &str) -> Option<MethodId> {
        let ty = self.types.get(owner.0)?;
        ty.methods
            .iter()
            .copied()
            .find(|id| self.methods.get(id.0).is_some_and(|m| m.name == name))
    }

    /// Looks up a field of `owner` by name.
    #[must_use]
    pub fn find_field(&self, owner: TypeId, name: &str) -> Option<FieldId> {
        let ty = self.types.get(owner.0)?;
        ty.fields
            .iter()
            .copied()
            .find(|id| self.fields.get(id.0).is_some_and(|f| f.name == name))
    }

    /// Returns `Namespace.Type::Method` for diagnostics.
    #[must_use]
    pub fn method_full_name(&self, id: MethodId) -> String {
        match self.methods.get(id.0) {
            Some(method) => match self.types.get(method.declaring_type.0) {
                Some(ty) => format!("{}::{}", ty.full_name(), method.name),
                None => method.name.clone(),
            },
            None => id.to_string(),
        }
    }

    /// Takes the body out of method `id`, leaving it body-less until it is restored.
    ///
    /// # Errors
    /// Returns an error if the method does not exist or has no body.
    pub fn take_body(&mut self, id: MethodId) -> Result<MethodBody> {
        let name = self.method_full_name(id);
        self.method_mut(id)?
            .body
            .take()
            .ok_or_else(|| malformed_error!("Method {} has no body", name))
    }

    /// Installs `body` on method `id`.
    ///
    /// # Errors
    /// Returns an error if the method does not exist.
    pub fn set_body(&mut self, id: MethodId, body: MethodBody) -> Result<()> {
        self.method_mut(id)?.body = Some(body);
        Ok(())
    }
}
