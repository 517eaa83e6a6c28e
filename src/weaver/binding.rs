//! Advice argument binding: validation of advice shapes and emission of argument loads.
//!
//! Validation happens per (target, advice) pair during discovery, so only advices that are
//! actually applied somewhere are checked. Emission produces the load sequence for every
//! bound source at a call site, which is either inside the target itself (before/after) or
//! inside the unwrapper of an around chain.

use crate::{
    assembly::InstructionAssembler,
    metadata::{
        method::{ExternalMethod, Method, MethodRef},
        module::{FieldId, MethodId, Module},
        signatures::TypeSignature,
    },
    weaver::{
        declarations::{AdviceArgumentSource, AdviceDeclaration},
        plan::InjectionPoint,
    },
    Error, Result,
};

fn unbound(module: &Module, advice: MethodId, message: String) -> Result<Error> {
    let method = module.method(advice)?;
    Ok(Error::UnboundArgument {
        message,
        method: module.method_full_name(advice),
        token: method.token,
    })
}

fn mismatch(module: &Module, advice: MethodId, message: impl Into<String>) -> Result<Error> {
    let method = module.method(advice)?;
    Ok(Error::SignatureMismatch {
        message: message.into(),
        method: module.method_full_name(advice),
        token: method.token,
    })
}

/// Resolves the source of every parameter of `advice`.
///
/// # Errors
/// Returns [`Error::UnboundArgument`] if a parameter has no source tag or its type does not
/// have the shape of its source, and [`Error::SignatureMismatch`] if the source is not
/// available at the advice's injection point.
pub fn resolve(module: &Module, advice: &AdviceDeclaration) -> Result<Vec<AdviceArgumentSource>> {
    let method = module.method(advice.method)?;
    let mut sources = Vec::with_capacity(method.params.len());

    for (param, source) in method.params.iter().zip(&advice.parameters) {
        let Some(source) = *source else {
            return Err(unbound(
                module,
                advice.method,
                format!("Unbound advice argument '{}'", param.name),
            )?);
        };

        let expected = source.expected_signature();
        if param.signature != expected {
            return Err(unbound(
                module,
                advice.method,
                format!(
                    "Argument '{}' bound to {} must be of type {}",
                    param.name, source, expected
                ),
            )?);
        }

        let available = match source {
            AdviceArgumentSource::AbortFlag => advice.point == InjectionPoint::Before,
            AdviceArgumentSource::Target => advice.point == InjectionPoint::Around,
            _ => true,
        };
        if !available {
            return Err(mismatch(
                module,
                advice.method,
                format!(
                    "{} can not be bound in {} advices (argument '{}')",
                    source, advice.point, param.name
                ),
            )?);
        }

        sources.push(source);
    }

    if sources.len() != method.params.len() {
        return Err(malformed_error!(
            "Advice {} has {} parameters but {} declared sources",
            module.method_full_name(advice.method),
            method.params.len(),
            advice.parameters.len()
        ));
    }

    Ok(sources)
}

/// Checks the return type of `advice` against its injection point and `target`.
///
/// Returns true if the advice can abort the target.
///
/// # Errors
/// Returns [`Error::SignatureMismatch`] when the return type breaks the rule of the
/// injection point.
pub fn validate(
    module: &Module,
    advice: &AdviceDeclaration,
    sources: &[AdviceArgumentSource],
    target: &Method,
) -> Result<bool> {
    let method = module.method(advice.method)?;
    let abortable = sources.contains(&AdviceArgumentSource::AbortFlag);

    match advice.point {
        InjectionPoint::Before if abortable => {
            if method.return_type != target.return_type {
                return Err(mismatch(
                    module,
                    advice.method,
                    "Advice with an AbortFlag argument must return the same type as its target",
                )?);
            }
        }
        InjectionPoint::Before | InjectionPoint::After => {
            if !method.return_type.is_void() {
                return Err(mismatch(
                    module,
                    advice.method,
                    "Advice without an AbortFlag argument must return void",
                )?);
            }
        }
        InjectionPoint::Around => {
            if !method.return_type.is_object() {
                return Err(mismatch(
                    module,
                    advice.method,
                    "Around advice must return object",
                )?);
            }
        }
    }

    Ok(abortable)
}

/// The call site an advice call is emitted into.
pub enum ArgumentSite<'a> {
    /// Inside the target's own body
    Target {
        /// The target method
        target: &'a Method,
        /// Local holding the abort flag, for abortable plans
        abort_flag: Option<u16>,
    },
    /// Inside the unwrapper `object u(object[] args)` of an around chain
    Unwrapper {
        /// The wrapper holding the next link of the chain
        wrapper: MethodRef,
    },
}

/// Emits the load sequence of every source in `sources`.
///
/// # Errors
/// Returns an error if a source is not available at `site`.
pub fn emit_arguments(
    asm: &mut InstructionAssembler<'_>,
    sources: &[AdviceArgumentSource],
    target_name: &str,
    site: &ArgumentSite<'_>,
) -> Result<()> {
    for source in sources {
        match (source, site) {
            (AdviceArgumentSource::Instance, _) => {
                asm.ldarg_0()?;
            }
            (AdviceArgumentSource::TargetName, _) => {
                asm.ldstr(target_name)?;
            }
            (AdviceArgumentSource::TargetArguments, ArgumentSite::Target { target, .. }) => {
                emit_boxed_arguments(asm, target)?;
            }
            (AdviceArgumentSource::TargetArguments, ArgumentSite::Unwrapper { .. }) => {
                asm.ldarg(1)?;
            }
            (
                AdviceArgumentSource::AbortFlag,
                ArgumentSite::Target {
                    abort_flag: Some(flag),
                    ..
                },
            ) => {
                asm.ldloca(*flag)?;
            }
            (AdviceArgumentSource::Target, ArgumentSite::Unwrapper { wrapper }) => {
                asm.ldarg_0()?
                    .ldftn(wrapper.clone())?
                    .newobj(MethodRef::External(ExternalMethod::boxed_invoker_ctor()))?;
            }
            (source, _) => {
                return Err(malformed_error!(
                    "{} is not available at this call site",
                    source
                ));
            }
        }
    }
    Ok(())
}

/// Emits a fresh `object[]` holding the current values of the target's parameters.
///
/// By-ref parameters are dereferenced; value types and generic parameters are boxed.
///
/// # Errors
/// Returns an error if the parameter count does not fit into an `int32`.
pub fn emit_boxed_arguments(asm: &mut InstructionAssembler<'_>, target: &Method) -> Result<()> {
    asm.ldc_index(target.params.len())?
        .newarr(TypeSignature::Object)?;

    for (index, param) in target.params.iter().enumerate() {
        asm.dup()?
            .ldc_index(index)?
            .ldarg(target.argument_index(index))?;
        let element = param.signature.element_type();
        if param.signature.is_by_reference() {
            asm.ldobj(element.clone())?;
        }
        asm.box_if_needed(element)?.stelem_ref()?;
    }
    Ok(())
}

/// Emits a load of the aspect instance cached in `field` of `this`, creating it through
/// `constructor` on first use.
///
/// # Errors
/// Propagates assembler errors.
pub fn emit_aspect_instance(
    asm: &mut InstructionAssembler<'_>,
    field: FieldId,
    constructor: MethodId,
) -> Result<()> {
    asm.ldarg_0()?
        .ldfld(field)?
        .dup()?
        .brtrue("aspect_ready")?
        .pop()?
        .ldarg_0()?
        .newobj(MethodRef::def(constructor))?
        .stfld(field)?
        .ldarg_0()?
        .ldfld(field)?
        .label("aspect_ready")?;
    Ok(())
}
