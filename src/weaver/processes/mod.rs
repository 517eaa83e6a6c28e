//! Weave processes: one per injection point.
//!
//! Each process consumes a single [`InjectionPlan`] and rewrites the staged module. Plans are
//! handed over strictly in order, so a process may rely on the effects of every earlier plan
//! (the around process, for instance, extends the chain built by earlier around plans).
//!
//! # Key Components
//!
//! - [`WeaveProcess`] - The trait every process implements
//! - [`WeaveContext`] - Mutable state shared by all processes of a run
//! - [`BeforeProcess`], [`AfterProcess`], [`AroundProcess`] - The three processes

mod after;
mod around;
mod before;

pub use after::AfterProcess;
pub use around::AroundProcess;
pub use before::BeforeProcess;

use log::debug;
use rustc_hash::FxHashSet;

use crate::{
    assembly::{InstrId, InstructionAssembler},
    config::WeaverConfig,
    metadata::{
        method::MethodRef,
        module::{FieldId, MethodId, Module},
        signatures::TypeSignature,
        typedef::FieldAttributes,
    },
    weaver::{
        binding::{self, ArgumentSite},
        plan::{InjectionPlan, InjectionPoint},
        WeaveSummary,
    },
    Error, Result,
};

/// Mutable state of one weaving run.
pub struct WeaveContext<'a> {
    /// The staged module being rewritten
    pub module: &'a mut Module,
    /// Run configuration
    pub config: &'a WeaverConfig,
    /// Statistics of the run
    pub summary: &'a mut WeaveSummary,
    /// Methods whose bodies were written during the run
    pub touched: FxHashSet<MethodId>,
    /// Returns added by abortable advices; after advices leave them alone
    abort_exits: FxHashSet<(MethodId, InstrId)>,
}

impl<'a> WeaveContext<'a> {
    /// Creates a context over the staged `module`.
    pub fn new(
        module: &'a mut Module,
        config: &'a WeaverConfig,
        summary: &'a mut WeaveSummary,
    ) -> Self {
        WeaveContext {
            module,
            config,
            summary,
            touched: FxHashSet::default(),
            abort_exits: FxHashSet::default(),
        }
    }

    /// Returns the field caching the aspect instance for targets of the plan's declaring type,
    /// creating it on first use. Returns `None` for static advices.
    ///
    /// The field is named after the aspect's full name, so aspects sharing a simple name in
    /// different namespaces get separate fields.
    ///
    /// # Errors
    /// Returns [`Error::MissingAspectConstructor`] if the aspect can not be instantiated, and
    /// [`Error::Malformed`] if a field of that name exists with a different type.
    pub fn aspect_instance(&mut self, plan: &InjectionPlan) -> Result<Option<(FieldId, MethodId)>> {
        if plan.advice_is_static {
            return Ok(None);
        }

        let aspect_name = self.module.ty(plan.aspect)?.full_name();
        let constructor = plan
            .aspect_constructor
            .ok_or_else(|| Error::MissingAspectConstructor {
                aspect: aspect_name.clone(),
            })?;

        let owner = self.module.method(plan.target)?.declaring_type;
        let field_name = aspect_field_name(&self.config.member_prefix, &aspect_name);
        let signature = TypeSignature::Class(aspect_name);
        if let Some(field) = self.module.find_field(owner, &field_name) {
            let existing = self
                .module
                .field(field)
                .ok_or_else(|| malformed_error!("Field {} does not exist", field_name))?;
            if existing.signature != signature {
                return Err(malformed_error!(
                    "Field {} of {} holds {:?}, not {:?}",
                    field_name,
                    self.module.ty(owner)?.full_name(),
                    existing.signature,
                    signature
                ));
            }
            return Ok(Some((field, constructor)));
        }

        let field = self.module.add_field(
            owner,
            &field_name,
            FieldAttributes::PRIVATE | FieldAttributes::NOT_SERIALIZED,
            signature,
        )?;
        self.summary.synthesized_fields += 1;
        debug!(
            "Synthesized aspect field {} on {}",
            field_name,
            self.module.ty(owner)?.full_name()
        );
        Ok(Some((field, constructor)))
    }

    /// Records `ret` as the early exit an abortable advice added to `method`.
    pub fn add_abort_exit(&mut self, method: MethodId, ret: InstrId) {
        self.abort_exits.insert((method, ret));
    }

    /// Returns true if `ret` of `method` is the exit of an aborted call.
    #[must_use]
    pub fn is_abort_exit(&self, method: MethodId, ret: InstrId) -> bool {
        self.abort_exits.contains(&(method, ret))
    }

    /// Moves the recorded abort exits of `from` to `to`, after `from`'s body was moved there.
    pub fn move_abort_exits(&mut self, from: MethodId, to: MethodId) {
        let moved: Vec<InstrId> = self
            .abort_exits
            .iter()
            .filter(|(method, _)| *method == from)
            .map(|&(_, ret)| ret)
            .collect();
        for ret in moved {
            self.abort_exits.remove(&(from, ret));
            self.abort_exits.insert((to, ret));
        }
    }

    /// Records that the body of `method` was written.
    pub fn touch(&mut self, method: MethodId) {
        self.touched.insert(method);
    }
}

/// Name of the field caching instances of `aspect` (a full type name), e.g. `__a$_App_Logger`.
pub(crate) fn aspect_field_name(prefix: &str, aspect: &str) -> String {
    let mangled: String = aspect
        .chars()
        .map(|c| if matches!(c, '.' | '+' | '/') { '_' } else { c })
        .collect();
    format!("{prefix}{mangled}")
}

/// A transformation applying one kind of advice to its target.
pub trait WeaveProcess: Send + Sync {
    /// Returns a short name of the process, used in logs.
    fn name(&self) -> &'static str;

    /// Returns the injection point this process handles.
    fn point(&self) -> InjectionPoint;

    /// Applies `plan` to the staged module.
    ///
    /// # Errors
    /// Returns an error if the module is inconsistent with the plan.
    fn apply(&self, ctx: &mut WeaveContext<'_>, plan: &InjectionPlan) -> Result<()>;
}

/// Emits a complete advice call: the aspect instance (for instance advices), the bound
/// arguments and the `call` itself.
///
/// # Errors
/// Propagates binding and assembler errors.
pub(crate) fn emit_advice_call(
    asm: &mut InstructionAssembler<'_>,
    plan: &InjectionPlan,
    instance: Option<(FieldId, MethodId)>,
    site: &ArgumentSite<'_>,
) -> Result<()> {
    if let Some((field, constructor)) = instance {
        binding::emit_aspect_instance(asm, field, constructor)?;
    }
    binding::emit_arguments(asm, &plan.arguments, &plan.target_name, site)?;
    asm.call(MethodRef::def(plan.advice))?;
    Ok(())
}
