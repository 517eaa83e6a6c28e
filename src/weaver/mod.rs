//! Aspect weaving: discovery, planning and body transformation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Weaving Pipeline                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  Declarations               Annotations decoded once             │
//! │    ├─ aspect references      (class, method, property, event)    │
//! │    └─ advices                (point, target kinds, sources)      │
//! │                                                                  │
//! │  InjectionEnumerator        Read-only discovery, per class       │
//! │    ├─ merge                  member replaces class per aspect    │
//! │    ├─ filter                 name regex, access modifiers        │
//! │    ├─ classify + pair        target kind vs. advice mask         │
//! │    ├─ validate               bindings, return types, aborts      │
//! │    └─ order                  total order over all plans          │
//! │                                                                  │
//! │  WeaveProcess trait         One plan at a time, in order         │
//! │    ├─ BeforeProcess          prepend, optional abort             │
//! │    ├─ AfterProcess           ahead of every ret                  │
//! │    └─ AroundProcess          o / u / w_k wrapper chain           │
//! │                                                                  │
//! │  Weaver                     Staged copy, all-or-nothing commit   │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust
//! use dotweave::{metadata::Module, Weaver};
//!
//! let mut module = Module::new("App.dll");
//! let summary = Weaver::default().weave(&mut module)?;
//! assert_eq!(summary.plans, 0);
//! # Ok::<(), dotweave::Error>(())
//! ```

mod binding;
mod declarations;
mod enumerator;
mod plan;
mod processes;

use std::fmt;

use log::{debug, info};
use rustc_hash::FxHashSet;

pub use binding::{emit_aspect_instance, emit_boxed_arguments, ArgumentSite};
pub use declarations::{
    AccessModifiers, AdviceArgumentSource, AdviceDeclaration, AspectDeclaration, AspectInfo,
    Declarations, InjectionPoints, InjectionTargets, Owner,
};
pub use enumerator::InjectionEnumerator;
pub use plan::{DeclarationLevel, InjectionPlan, InjectionPoint, TargetKind};
pub use processes::{AfterProcess, AroundProcess, BeforeProcess, WeaveContext, WeaveProcess};

use crate::{config::WeaverConfig, metadata::module::Module, Result};

/// Statistics of one weaving run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeaveSummary {
    /// Number of plans woven
    pub plans: usize,
    /// Number of distinct target methods
    pub targets: usize,
    /// Before advices injected
    pub before: usize,
    /// After advices injected
    pub after: usize,
    /// Around advices injected
    pub around: usize,
    /// Methods synthesized (moved originals, unwrappers, wrappers)
    pub synthesized_methods: usize,
    /// Fields synthesized (aspect instance caches)
    pub synthesized_fields: usize,
}

impl fmt::Display for WeaveSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} advice(s) woven into {} target(s) (before: {}, after: {}, around: {}), {} method(s) and {} field(s) synthesized",
            self.plans,
            self.targets,
            self.before,
            self.after,
            self.around,
            self.synthesized_methods,
            self.synthesized_fields
        )
    }
}

/// Weaves the aspects declared in a module into their targets.
pub struct Weaver {
    config: WeaverConfig,
    processes: Vec<Box<dyn WeaveProcess>>,
}

impl Default for Weaver {
    fn default() -> Self {
        Self::new(WeaverConfig::default())
    }
}

impl Weaver {
    /// Creates a weaver with the given configuration.
    #[must_use]
    pub fn new(config: WeaverConfig) -> Self {
        Weaver {
            config,
            processes: vec![
                Box::new(BeforeProcess),
                Box::new(AfterProcess),
                Box::new(AroundProcess),
            ],
        }
    }

    /// Returns the configuration of this weaver.
    #[must_use]
    pub fn config(&self) -> &WeaverConfig {
        &self.config
    }

    /// Discovers and validates all injections of `module` without changing it.
    ///
    /// # Errors
    /// Returns the first declaration error; see [`crate::Error`].
    pub fn plan(&self, module: &Module) -> Result<Vec<InjectionPlan>> {
        let declarations = Declarations::read(module, &self.config)?;
        InjectionEnumerator::new(module, &self.config, &declarations).enumerate()
    }

    /// Weaves every declared aspect into `module`.
    ///
    /// Either all plans are applied or, on error, `module` is left exactly as it was.
    ///
    /// # Errors
    /// Returns the first declaration error found during planning, or an error describing an
    /// inconsistency met while rewriting.
    pub fn weave(&self, module: &mut Module) -> Result<WeaveSummary> {
        let plans = self.plan(module)?;
        let mut summary = WeaveSummary {
            plans: plans.len(),
            targets: plans
                .iter()
                .map(|p| p.target)
                .collect::<FxHashSet<_>>()
                .len(),
            ..WeaveSummary::default()
        };

        if plans.is_empty() {
            info!("{}: nothing to weave", module.name);
            return Ok(summary);
        }

        let mut staged = module.clone();
        let touched = {
            let mut ctx = WeaveContext::new(&mut staged, &self.config, &mut summary);
            for plan in &plans {
                let process = self
                    .processes
                    .iter()
                    .find(|p| p.point() == plan.point)
                    .ok_or_else(|| malformed_error!("No process handles {} advices", plan.point))?;
                debug!("[{}] {}", process.name(), plan);
                process.apply(&mut ctx, plan)?;
            }
            ctx.touched
        };

        if self.config.validate_bodies {
            for id in touched {
                if let Some(body) = &staged.method(id)?.body {
                    body.validate()?;
                }
            }
        }

        *module = staged;
        info!("{}: {}", module.name, summary);
        Ok(summary)
    }
}
