//! Weaver configuration
//!
//! This module provides the knobs of a weaving run: the full names of the annotation types
//! that form the declarative surface, the prefix of synthesized members, and a few safety
//! switches.

use crate::{
    metadata::customattributes::{CustomAttribute, CustomAttributeArgument},
    weaver::{AdviceArgumentSource, InjectionPoints, InjectionTargets},
};

/// Default full name of the aspect annotation
pub const DEFAULT_ASPECT_ATTRIBUTE: &str = "dotweave.Broker.AspectAttribute";
/// Default full name of the before/after advice annotation
pub const DEFAULT_ADVICE_ATTRIBUTE: &str = "dotweave.Broker.AdviceAttribute";
/// Default full name of the around advice annotation
pub const DEFAULT_AROUND_ADVICE_ATTRIBUTE: &str = "dotweave.Broker.AroundAdviceAttribute";
/// Default full name of the advice argument annotation
pub const DEFAULT_ARGUMENT_ATTRIBUTE: &str = "dotweave.Broker.AdviceArgumentAttribute";
/// Default prefix of every member the weaver synthesizes
pub const DEFAULT_MEMBER_PREFIX: &str = "__a$_";

/// Named property of the aspect annotation holding the target name filter
pub const NAME_FILTER_PROPERTY: &str = "NameFilter";
/// Named property of the aspect annotation holding the access modifier filter
pub const ACCESS_FILTER_PROPERTY: &str = "AccessModifierFilter";

/// Configuration of a weaving run
///
/// The annotation names must match the attribute types the woven module was compiled against.
/// Members whose name starts with [`WeaverConfig::member_prefix`] are considered synthesized:
/// they are never woven and are reused by later runs over the same module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeaverConfig {
    /// Full name of the aspect annotation
    pub aspect_attribute: String,
    /// Full name of the before/after advice annotation
    pub advice_attribute: String,
    /// Full name of the around advice annotation
    pub around_advice_attribute: String,
    /// Full name of the advice argument annotation
    pub argument_attribute: String,
    /// Prefix of synthesized methods and fields
    pub member_prefix: String,
    /// Discover injections of different types in parallel
    pub parallel_planning: bool,
    /// Check every rewritten body for dangling branch targets and locals after weaving
    pub validate_bodies: bool,
}

impl Default for WeaverConfig {
    fn default() -> Self {
        Self {
            aspect_attribute: DEFAULT_ASPECT_ATTRIBUTE.to_string(),
            advice_attribute: DEFAULT_ADVICE_ATTRIBUTE.to_string(),
            around_advice_attribute: DEFAULT_AROUND_ADVICE_ATTRIBUTE.to_string(),
            argument_attribute: DEFAULT_ARGUMENT_ATTRIBUTE.to_string(),
            member_prefix: DEFAULT_MEMBER_PREFIX.to_string(),
            parallel_planning: true,
            validate_bodies: true,
        }
    }
}

impl WeaverConfig {
    /// Uses annotations from `namespace` with the default type names, e.g.
    /// `MyCompany.Aop` yields `MyCompany.Aop.AspectAttribute`.
    #[must_use]
    pub fn with_annotation_namespace(mut self, namespace: &str) -> Self {
        self.aspect_attribute = format!("{namespace}.AspectAttribute");
        self.advice_attribute = format!("{namespace}.AdviceAttribute");
        self.around_advice_attribute = format!("{namespace}.AroundAdviceAttribute");
        self.argument_attribute = format!("{namespace}.AdviceArgumentAttribute");
        self
    }

    /// Sets the prefix of synthesized members.
    #[must_use]
    pub fn with_member_prefix(mut self, prefix: &str) -> Self {
        self.member_prefix = prefix.to_string();
        self
    }

    /// Enables or disables parallel discovery.
    #[must_use]
    pub fn with_parallel_planning(mut self, enabled: bool) -> Self {
        self.parallel_planning = enabled;
        self
    }

    /// Enables or disables the post-weave body check.
    #[must_use]
    pub fn with_body_validation(mut self, enabled: bool) -> Self {
        self.validate_bodies = enabled;
        self
    }

    /// Returns true if `name` belongs to a member synthesized by the weaver.
    #[must_use]
    pub fn is_synthesized(&self, name: &str) -> bool {
        !self.member_prefix.is_empty() && name.starts_with(&self.member_prefix)
    }

    /// Creates an aspect annotation referencing `aspect_type`.
    #[must_use]
    pub fn aspect_annotation(&self, aspect_type: &str) -> CustomAttribute {
        CustomAttribute::new(self.aspect_attribute.as_str())
            .fixed(CustomAttributeArgument::Type(aspect_type.to_string()))
    }

    /// Creates an aspect annotation with a target name filter.
    #[must_use]
    pub fn filtered_aspect_annotation(
        &self,
        aspect_type: &str,
        name_filter: Option<&str>,
        access_filter: Option<crate::weaver::AccessModifiers>,
    ) -> CustomAttribute {
        let mut attribute = self.aspect_annotation(aspect_type);
        if let Some(pattern) = name_filter {
            attribute = attribute.property(
                NAME_FILTER_PROPERTY,
                CustomAttributeArgument::String(Some(pattern.to_string())),
            );
        }
        if let Some(access) = access_filter {
            attribute = attribute.property(
                ACCESS_FILTER_PROPERTY,
                CustomAttributeArgument::I4(i32::try_from(access.bits()).unwrap_or_default()),
            );
        }
        attribute
    }

    /// Creates a before/after advice annotation.
    #[must_use]
    pub fn advice_annotation(
        &self,
        points: InjectionPoints,
        targets: InjectionTargets,
    ) -> CustomAttribute {
        CustomAttribute::new(self.advice_attribute.as_str())
            .fixed(enum_argument("InjectionPoints", points.bits()))
            .fixed(enum_argument("InjectionTargets", targets.bits()))
    }

    /// Creates an around advice annotation.
    #[must_use]
    pub fn around_annotation(&self, targets: InjectionTargets) -> CustomAttribute {
        CustomAttribute::new(self.around_advice_attribute.as_str())
            .fixed(enum_argument("InjectionTargets", targets.bits()))
    }

    /// Creates an advice argument annotation.
    #[must_use]
    pub fn argument_annotation(&self, source: AdviceArgumentSource) -> CustomAttribute {
        CustomAttribute::new(self.argument_attribute.as_str())
            .fixed(enum_argument("AdviceArgumentSource", source as u32))
    }
}

fn enum_argument(enum_name: &str, value: u32) -> CustomAttributeArgument {
    CustomAttributeArgument::Enum(
        format!("dotweave.Broker.{enum_name}"),
        Box::new(CustomAttributeArgument::I4(i32::try_from(value).unwrap_or_default())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_override_renames_all_annotations() {
        let config = WeaverConfig::default().with_annotation_namespace("Acme.Aop");
        assert_eq!(config.aspect_attribute, "Acme.Aop.AspectAttribute");
        assert_eq!(config.advice_attribute, "Acme.Aop.AdviceAttribute");
        assert_eq!(config.around_advice_attribute, "Acme.Aop.AroundAdviceAttribute");
        assert_eq!(config.argument_attribute, "Acme.Aop.AdviceArgumentAttribute");
    }

    #[test]
    fn synthesized_names() {
        let config = WeaverConfig::default();
        assert!(config.is_synthesized("__a$_around_Compute_100663297_u"));
        assert!(!config.is_synthesized("Compute"));
        assert!(!WeaverConfig::default()
            .with_member_prefix("")
            .is_synthesized("Compute"));
    }

    #[test]
    fn annotations_carry_enum_values() {
        let config = WeaverConfig::default();
        let advice = config.advice_annotation(InjectionPoints::AFTER, InjectionTargets::SETTER);
        assert_eq!(advice.fixed_arg(0).and_then(|a| a.as_integer()), Some(2));
        assert_eq!(advice.fixed_arg(1).and_then(|a| a.as_integer()), Some(4));

        let argument = config.argument_annotation(AdviceArgumentSource::AbortFlag);
        assert_eq!(argument.fixed_arg(0).and_then(|a| a.as_integer()), Some(4));
    }
}
