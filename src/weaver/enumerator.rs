//! Discovery of (target, advice) pairings.
//!
//! The [`InjectionEnumerator`] walks every class of the module, merges class-level and
//! member-level aspect declarations, applies the declaration filters and pairs each
//! surviving target with the advices of the aspect. Every pairing is validated on the spot;
//! the first invalid pairing, in declaration order, aborts discovery.
//!
//! Discovery is read-only. Classes are processed independently, in parallel when
//! [`WeaverConfig::parallel_planning`] is set; results are gathered in declaration order so
//! the reported error does not depend on scheduling.

use log::{debug, trace};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::{
    config::WeaverConfig,
    metadata::{
        module::{MethodId, Module, TypeId},
        token::Token,
    },
    weaver::{
        binding,
        declarations::{AspectDeclaration, Declarations, Owner},
        plan::{self, InjectionPlan, TargetKind},
    },
    Error, Result,
};

/// Produces the ordered list of injection plans of a module.
pub struct InjectionEnumerator<'a> {
    module: &'a Module,
    config: &'a WeaverConfig,
    declarations: &'a Declarations,
}

impl<'a> InjectionEnumerator<'a> {
    /// Creates an enumerator over `module`.
    #[must_use]
    pub fn new(
        module: &'a Module,
        config: &'a WeaverConfig,
        declarations: &'a Declarations,
    ) -> Self {
        InjectionEnumerator {
            module,
            config,
            declarations,
        }
    }

    /// Discovers, validates and orders all injections.
    ///
    /// # Errors
    /// Returns the first declaration error in declaration order, or
    /// [`Error::AmbiguousAbort`] if a target has more than one abortable advice.
    pub fn enumerate(&self) -> Result<Vec<InjectionPlan>> {
        if self.declarations.is_empty() {
            return Ok(Vec::new());
        }

        let classes: Vec<TypeId> = self
            .module
            .types()
            .filter(|(_, ty)| ty.is_class())
            .map(|(id, _)| id)
            .collect();

        let per_class: Vec<Result<Vec<InjectionPlan>>> = if self.config.parallel_planning {
            classes.par_iter().map(|&ty| self.plans_for(ty)).collect()
        } else {
            classes.iter().map(|&ty| self.plans_for(ty)).collect()
        };

        let mut plans = Vec::new();
        for result in per_class {
            plans.extend(result?);
        }

        plan::order(&mut plans);
        self.check_aborts(&plans)?;

        debug!(
            "Discovered {} injection(s) in {} class(es)",
            plans.len(),
            classes.len()
        );
        Ok(plans)
    }

    fn plans_for(&self, ty: TypeId) -> Result<Vec<InjectionPlan>> {
        let typedef = self.module.ty(ty)?;
        let class = self.declarations.aspects_of(Owner::Type(ty));
        let mut plans = Vec::new();

        for &id in &typedef.methods {
            let method = self.module.method(id)?;
            if method.is_accessor() || self.config.is_synthesized(&method.name) {
                continue;
            }
            let member = self.declarations.aspects_of(Owner::Method(id));
            self.pair(id, &method.name, class, member, &mut plans)?;
        }

        for (index, property) in typedef.properties.iter().enumerate() {
            let member = self.declarations.aspects_of(Owner::Property(ty, index));
            for accessor in [property.getter, property.setter].into_iter().flatten() {
                self.pair(accessor, &property.name, class, member, &mut plans)?;
            }
        }

        for (index, event) in typedef.events.iter().enumerate() {
            let member = self.declarations.aspects_of(Owner::Event(ty, index));
            for accessor in [event.add_on, event.remove_on].into_iter().flatten() {
                self.pair(accessor, &event.name, class, member, &mut plans)?;
            }
        }

        Ok(plans)
    }

    fn pair(
        &self,
        target: MethodId,
        name: &str,
        class: &[AspectDeclaration],
        member: &[AspectDeclaration],
        plans: &mut Vec<InjectionPlan>,
    ) -> Result<()> {
        if class.is_empty() && member.is_empty() {
            return Ok(());
        }

        let method = self.module.method(target)?;
        let kind = TargetKind::classify(method);

        for (level, declaration) in Declarations::merge(class, member) {
            if !declaration.matches(name, method.access) {
                trace!("{} '{}' filtered out ({} level)", kind, name, level);
                continue;
            }

            let aspect = self.declarations.aspect(declaration.aspect).ok_or_else(|| {
                malformed_error!("Aspect {} was not read", declaration.aspect)
            })?;

            for advice in &aspect.advices {
                if !kind.accepted_by(advice.targets) {
                    trace!(
                        "{} of {} does not apply to {} '{}'",
                        advice.point,
                        aspect.name,
                        kind,
                        name
                    );
                    continue;
                }

                let arguments = binding::resolve(self.module, advice)?;
                let abortable = binding::validate(self.module, advice, &arguments, method)?;
                let advice_method = self.module.method(advice.method)?;

                plans.push(InjectionPlan {
                    target,
                    target_token: method.token,
                    target_name: name.to_string(),
                    kind,
                    aspect: declaration.aspect,
                    aspect_ordinal: declaration.ordinal,
                    aspect_constructor: aspect.constructor,
                    advice: advice.method,
                    advice_token: advice_method.token,
                    advice_is_static: advice_method.is_static(),
                    arguments,
                    point: advice.point,
                    level,
                    abortable,
                });
            }
        }

        Ok(())
    }

    fn check_aborts(&self, plans: &[InjectionPlan]) -> Result<()> {
        let mut abortable: FxHashMap<Token, usize> = FxHashMap::default();
        for plan in plans.iter().filter(|p| p.abortable) {
            let count = abortable.entry(plan.target_token).or_default();
            *count += 1;
            if *count > 1 {
                return Err(Error::AmbiguousAbort {
                    method: self.module.method_full_name(plan.target),
                    token: plan.target_token,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::fixtures;

    #[test]
    fn no_declarations_no_plans() {
        let module = fixtures::plain_module();
        let config = WeaverConfig::default();
        let declarations = Declarations::read(&module, &config).unwrap();
        let plans = InjectionEnumerator::new(&module, &config, &declarations)
            .enumerate()
            .unwrap();
        assert!(plans.is_empty());
    }

    #[test]
    fn sequential_and_parallel_discovery_agree() {
        let module = fixtures::service_module();
        let parallel = WeaverConfig::default();
        let sequential = WeaverConfig::default().with_parallel_planning(false);

        let declarations = Declarations::read(&module, &parallel).unwrap();
        let a = InjectionEnumerator::new(&module, &parallel, &declarations)
            .enumerate()
            .unwrap();
        let b = InjectionEnumerator::new(&module, &sequential, &declarations)
            .enumerate()
            .unwrap();

        assert!(!a.is_empty());
        assert_eq!(a, b);
    }

    #[test]
    fn plans_carry_the_aspect_constructor() {
        let config = WeaverConfig::default();

        let module = fixtures::before_module(false);
        let declarations = Declarations::read(&module, &config).unwrap();
        let plans = InjectionEnumerator::new(&module, &config, &declarations)
            .enumerate()
            .unwrap();
        let guard = module.find_type("App.Guard").unwrap();
        let constructor = module.find_method(guard, ".ctor");
        assert!(constructor.is_some());
        assert!(plans.iter().all(|p| p.aspect_constructor == constructor));

        let module = fixtures::service_module();
        let declarations = Declarations::read(&module, &config).unwrap();
        let plans = InjectionEnumerator::new(&module, &config, &declarations)
            .enumerate()
            .unwrap();
        assert!(plans.iter().all(|p| p.advice_is_static && p.aspect_constructor.is_none()));
    }
}
