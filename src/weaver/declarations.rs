//! Typed declarations read from the annotation surface.
//!
//! All custom attributes relevant to weaving are decoded exactly once, before discovery
//! starts: aspect references on classes and members, advice markers on aspect methods and
//! source tags on advice parameters. Discovery then works on these typed values only.
//!
//! # Key Components
//!
//! - [`Declarations`] - Everything read from one module, keyed by annotated element
//! - [`AspectDeclaration`] - One aspect annotation with its compiled filters
//! - [`AspectInfo`] / [`AdviceDeclaration`] - An aspect type and its advice methods
//! - [`InjectionPoints`], [`InjectionTargets`], [`AccessModifiers`], [`AdviceArgumentSource`] -
//!   The annotation enums, with the values the annotation assembly defines

use bitflags::bitflags;
use log::debug;
use regex::Regex;
use rustc_hash::FxHashMap;
use strum::{Display, EnumIter};

use crate::{
    config::{WeaverConfig, ACCESS_FILTER_PROPERTY, NAME_FILTER_PROPERTY},
    metadata::{
        customattributes::{
            attribute_of_type, attributes_of_type, CustomAttribute, CustomAttributeArgument,
        },
        method::{Method, MethodAccess, CTOR_NAME},
        module::{MethodId, Module, TypeId},
        signatures::TypeSignature,
    },
    weaver::plan::{DeclarationLevel, InjectionPoint},
    Error, Result,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Where a before/after advice is injected
    pub struct InjectionPoints: u32 {
        /// Ahead of the first instruction
        const BEFORE = 1;
        /// Ahead of every return
        const AFTER = 2;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Kinds of members an advice applies to
    pub struct InjectionTargets: u32 {
        /// Instance constructors
        const CONSTRUCTOR = 1;
        /// Property getters
        const GETTER = 2;
        /// Property setters
        const SETTER = 4;
        /// Ordinary methods
        const METHOD = 8;
        /// Event `add` accessors
        const EVENT_ADD = 16;
        /// Event `remove` accessors
        const EVENT_REMOVE = 32;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Access levels an aspect declaration is restricted to
    pub struct AccessModifiers: u32 {
        /// `private`
        const PRIVATE = 1;
        /// `protected`
        const PROTECTED = 2;
        /// `internal`
        const INTERNAL = 4;
        /// `protected internal`
        const PROTECTED_INTERNAL = 8;
        /// `public`
        const PUBLIC = 16;
    }
}

impl AccessModifiers {
    /// Maps a method access level onto the filter bits.
    ///
    /// Compiler-controlled and `private protected` methods have no counterpart and map to the
    /// empty set.
    #[must_use]
    pub fn from_method_access(access: MethodAccess) -> Self {
        match access {
            MethodAccess::Private => AccessModifiers::PRIVATE,
            MethodAccess::Family => AccessModifiers::PROTECTED,
            MethodAccess::Assem => AccessModifiers::INTERNAL,
            MethodAccess::FamOrAssem => AccessModifiers::PROTECTED_INTERNAL,
            MethodAccess::Public => AccessModifiers::PUBLIC,
            MethodAccess::CompilerControlled | MethodAccess::FamAndAssem => {
                AccessModifiers::empty()
            }
        }
    }
}

/// What an advice parameter is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum AdviceArgumentSource {
    /// The target's `this`, as `object`
    Instance = 1,
    /// The target's arguments, boxed into an `object[]`
    TargetArguments = 2,
    /// The display name of the target, as `string`
    TargetName = 3,
    /// A `ref bool` that aborts the target when set (before advices only)
    AbortFlag = 4,
    /// The next link of the around chain, as `Func<object[], object>` (around advices only)
    Target = 5,
}

impl AdviceArgumentSource {
    /// Decodes the annotation value.
    #[must_use]
    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            1 => Some(AdviceArgumentSource::Instance),
            2 => Some(AdviceArgumentSource::TargetArguments),
            3 => Some(AdviceArgumentSource::TargetName),
            4 => Some(AdviceArgumentSource::AbortFlag),
            5 => Some(AdviceArgumentSource::Target),
            _ => None,
        }
    }

    /// Returns the parameter type a parameter bound to this source must have.
    #[must_use]
    pub fn expected_signature(self) -> TypeSignature {
        match self {
            AdviceArgumentSource::Instance => TypeSignature::Object,
            AdviceArgumentSource::TargetArguments => TypeSignature::object_array(),
            AdviceArgumentSource::TargetName => TypeSignature::String,
            AdviceArgumentSource::AbortFlag => TypeSignature::bool_by_ref(),
            AdviceArgumentSource::Target => TypeSignature::boxed_invoker(),
        }
    }
}

/// An annotated element that may carry aspect annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    /// A class
    Type(TypeId),
    /// A method
    Method(MethodId),
    /// The property at this index of the type
    Property(TypeId, usize),
    /// The event at this index of the type
    Event(TypeId, usize),
}

/// One aspect annotation.
#[derive(Debug, Clone)]
pub struct AspectDeclaration {
    /// The referenced aspect type
    pub aspect: TypeId,
    /// Target display names must match this expression, when present
    pub name_filter: Option<Regex>,
    /// Target access must intersect these bits, when not empty
    pub access_filter: AccessModifiers,
    /// Position among the aspect annotations of the annotated element
    pub ordinal: usize,
}

impl AspectDeclaration {
    /// Returns true if a target with display name `name` and access `access` passes both
    /// filters.
    #[must_use]
    pub fn matches(&self, name: &str, access: MethodAccess) -> bool {
        if let Some(filter) = &self.name_filter {
            if !filter.is_match(name) {
                return false;
            }
        }

        if self.access_filter.is_empty() {
            return true;
        }

        let access = AccessModifiers::from_method_access(access);
        access.is_empty() || self.access_filter.intersects(access)
    }
}

/// One advice marker on an aspect method.
#[derive(Debug, Clone, PartialEq)]
pub struct AdviceDeclaration {
    /// The advice method
    pub method: MethodId,
    /// Where the advice is injected
    pub point: InjectionPoint,
    /// Kinds of targets the advice applies to
    pub targets: InjectionTargets,
    /// Source tag of every parameter, `None` where the tag is missing
    pub parameters: Vec<Option<AdviceArgumentSource>>,
}

/// An aspect type referenced by at least one aspect annotation.
#[derive(Debug, Clone)]
pub struct AspectInfo {
    /// The aspect type
    pub ty: TypeId,
    /// Full name of the aspect type
    pub name: String,
    /// Parameterless instance constructor, if the type has one
    pub constructor: Option<MethodId>,
    /// Advices in declaration order
    pub advices: Vec<AdviceDeclaration>,
}

/// All weaving declarations of a module.
#[derive(Debug, Clone, Default)]
pub struct Declarations {
    by_owner: FxHashMap<Owner, Vec<AspectDeclaration>>,
    aspects: FxHashMap<TypeId, AspectInfo>,
}

impl Declarations {
    /// Reads every aspect annotation of `module` and every advice of the referenced aspects.
    ///
    /// # Errors
    /// Returns [`Error::AspectNotFound`], [`Error::InvalidNameFilter`],
    /// [`Error::InvalidDeclaration`] or [`Error::MissingAspectConstructor`] for the first
    /// offending annotation in declaration order.
    pub fn read(module: &Module, config: &WeaverConfig) -> Result<Self> {
        let mut declarations = Declarations::default();

        for (ty, typedef) in module.types() {
            if !typedef.is_class() {
                continue;
            }
            let type_name = typedef.full_name();

            declarations.insert(
                module,
                config,
                Owner::Type(ty),
                &typedef.custom_attributes,
                &type_name,
            )?;

            for &id in &typedef.methods {
                let method = module.method(id)?;
                if config.is_synthesized(&method.name) {
                    continue;
                }
                declarations.insert(
                    module,
                    config,
                    Owner::Method(id),
                    &method.custom_attributes,
                    &module.method_full_name(id),
                )?;
            }

            for (index, property) in typedef.properties.iter().enumerate() {
                declarations.insert(
                    module,
                    config,
                    Owner::Property(ty, index),
                    &property.custom_attributes,
                    &format!("{type_name}::{}", property.name),
                )?;
            }

            for (index, event) in typedef.events.iter().enumerate() {
                declarations.insert(
                    module,
                    config,
                    Owner::Event(ty, index),
                    &event.custom_attributes,
                    &format!("{type_name}::{}", event.name),
                )?;
            }
        }

        Ok(declarations)
    }

    /// Returns the aspect annotations of `owner`, in declaration order.
    #[must_use]
    pub fn aspects_of(&self, owner: Owner) -> &[AspectDeclaration] {
        self.by_owner.get(&owner).map_or(&[], Vec::as_slice)
    }

    /// Returns the referenced aspect type `ty`.
    #[must_use]
    pub fn aspect(&self, ty: TypeId) -> Option<&AspectInfo> {
        self.aspects.get(&ty)
    }

    /// Returns true if the module declares no aspects at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_owner.is_empty()
    }

    /// Merges class-level and member-level declarations.
    ///
    /// A member-level declaration replaces the class-level declaration of the same aspect type;
    /// other class-level declarations are kept. Class-level entries come first.
    #[must_use]
    pub fn merge<'d>(
        class: &'d [AspectDeclaration],
        member: &'d [AspectDeclaration],
    ) -> Vec<(DeclarationLevel, &'d AspectDeclaration)> {
        class
            .iter()
            .filter(|c| !member.iter().any(|m| m.aspect == c.aspect))
            .map(|c| (DeclarationLevel::Class, c))
            .chain(member.iter().map(|m| (DeclarationLevel::Member, m)))
            .collect()
    }

    fn insert(
        &mut self,
        module: &Module,
        config: &WeaverConfig,
        owner: Owner,
        attributes: &[CustomAttribute],
        owner_name: &str,
    ) -> Result<()> {
        let mut declared: Vec<AspectDeclaration> = Vec::new();

        for (ordinal, attribute) in
            attributes_of_type(attributes, &config.aspect_attribute).enumerate()
        {
            let declaration = read_aspect(module, attribute, ordinal, owner_name)?;
            if declared.iter().any(|d| d.aspect == declaration.aspect) {
                debug!(
                    "Ignoring repeated aspect annotation #{} on {}",
                    ordinal, owner_name
                );
                continue;
            }
            if !self.aspects.contains_key(&declaration.aspect) {
                let info = read_aspect_type(module, config, declaration.aspect)?;
                self.aspects.insert(declaration.aspect, info);
            }
            declared.push(declaration);
        }

        if !declared.is_empty() {
            self.by_owner.insert(owner, declared);
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>, owner: &str) -> Error {
    Error::InvalidDeclaration {
        message: message.into(),
        owner: owner.to_string(),
    }
}

fn read_aspect(
    module: &Module,
    attribute: &CustomAttribute,
    ordinal: usize,
    owner_name: &str,
) -> Result<AspectDeclaration> {
    let aspect_name = attribute
        .fixed_arg(0)
        .and_then(|arg| arg.as_type_name().or_else(|| arg.as_str()))
        .ok_or_else(|| invalid("Aspect annotation must reference a type", owner_name))?;

    let aspect = module
        .find_type(aspect_name)
        .ok_or_else(|| Error::AspectNotFound {
            name: aspect_name.to_string(),
            owner: owner_name.to_string(),
        })?;

    let name_filter = match attribute.named_arg(NAME_FILTER_PROPERTY) {
        None | Some(CustomAttributeArgument::String(None)) => None,
        Some(arg) => {
            let pattern = arg.as_str().ok_or_else(|| {
                invalid(format!("{NAME_FILTER_PROPERTY} must be a string"), owner_name)
            })?;
            let filter = Regex::new(pattern).map_err(|source| Error::InvalidNameFilter {
                pattern: pattern.to_string(),
                owner: owner_name.to_string(),
                source,
            })?;
            Some(filter)
        }
    };

    let access_filter = match attribute.named_arg(ACCESS_FILTER_PROPERTY) {
        None => AccessModifiers::empty(),
        Some(arg) => arg
            .as_integer()
            .and_then(|value| u32::try_from(value).ok())
            .and_then(AccessModifiers::from_bits)
            .ok_or_else(|| {
                invalid(
                    format!("{ACCESS_FILTER_PROPERTY} has an unknown value"),
                    owner_name,
                )
            })?,
    };

    Ok(AspectDeclaration {
        aspect,
        name_filter,
        access_filter,
        ordinal,
    })
}

fn read_aspect_type(module: &Module, config: &WeaverConfig, ty: TypeId) -> Result<AspectInfo> {
    let typedef = module.ty(ty)?;
    let mut advices = Vec::new();
    let mut constructor = None;

    for &id in &typedef.methods {
        let method = module.method(id)?;
        if method.name == CTOR_NAME && !method.is_static() && method.params.is_empty() {
            constructor = Some(id);
        }
        read_advices(module, config, id, method, &mut advices)?;
    }

    let needs_instance = advices
        .iter()
        .any(|advice| module.method(advice.method).is_ok_and(|m| !m.is_static()));
    if needs_instance && constructor.is_none() {
        return Err(Error::MissingAspectConstructor {
            aspect: typedef.full_name(),
        });
    }

    debug!(
        "Aspect {} declares {} advice(s)",
        typedef.full_name(),
        advices.len()
    );

    Ok(AspectInfo {
        ty,
        name: typedef.full_name(),
        constructor,
        advices,
    })
}

fn read_advices(
    module: &Module,
    config: &WeaverConfig,
    id: MethodId,
    method: &Method,
    advices: &mut Vec<AdviceDeclaration>,
) -> Result<()> {
    let owner = module.method_full_name(id);
    let mut parameters = None;

    for attribute in attributes_of_type(&method.custom_attributes, &config.advice_attribute) {
        let points = flags_arg(attribute, 0, &owner, "InjectionPoints")
            .and_then(|bits| InjectionPoints::from_bits(bits).ok_or_else(|| unknown(&owner)))?;
        let point = if points == InjectionPoints::BEFORE {
            InjectionPoint::Before
        } else if points == InjectionPoints::AFTER {
            InjectionPoint::After
        } else {
            return Err(invalid(
                "Advice must declare exactly one of the Before and After injection points",
                &owner,
            ));
        };
        let targets = flags_arg(attribute, 1, &owner, "InjectionTargets")
            .and_then(|bits| InjectionTargets::from_bits(bits).ok_or_else(|| unknown(&owner)))?;

        if parameters.is_none() {
            parameters = Some(read_parameters(config, method, &owner)?);
        }
        advices.push(AdviceDeclaration {
            method: id,
            point,
            targets,
            parameters: parameters.clone().unwrap_or_default(),
        });
    }

    for attribute in attributes_of_type(&method.custom_attributes, &config.around_advice_attribute)
    {
        let targets = flags_arg(attribute, 0, &owner, "InjectionTargets")
            .and_then(|bits| InjectionTargets::from_bits(bits).ok_or_else(|| unknown(&owner)))?;

        if parameters.is_none() {
            parameters = Some(read_parameters(config, method, &owner)?);
        }
        advices.push(AdviceDeclaration {
            method: id,
            point: InjectionPoint::Around,
            targets,
            parameters: parameters.clone().unwrap_or_default(),
        });
    }

    Ok(())
}

fn unknown(owner: &str) -> Error {
    invalid("Advice annotation carries unknown flags", owner)
}

fn flags_arg(attribute: &CustomAttribute, index: usize, owner: &str, what: &str) -> Result<u32> {
    attribute
        .fixed_arg(index)
        .and_then(|arg| arg.as_integer())
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| invalid(format!("Advice annotation is missing {what}"), owner))
}

fn read_parameters(
    config: &WeaverConfig,
    method: &Method,
    owner: &str,
) -> Result<Vec<Option<AdviceArgumentSource>>> {
    method
        .params
        .iter()
        .map(|param| {
            match attribute_of_type(&param.custom_attributes, &config.argument_attribute) {
                None => Ok(None),
                Some(attribute) => attribute
                    .fixed_arg(0)
                    .and_then(|arg| arg.as_integer())
                    .and_then(AdviceArgumentSource::from_value)
                    .map(Some)
                    .ok_or_else(|| {
                        invalid(
                            format!("Parameter '{}' has an unknown argument source", param.name),
                            owner,
                        )
                    }),
            }
        })
        .collect()
}
