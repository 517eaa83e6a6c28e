use log::debug;

use crate::{
    assembly::InstructionAssembler,
    metadata::{
        method::{Method, MethodBody, MethodRef, Param},
        module::{MethodId, Module, TypeId},
        signatures::TypeSignature,
    },
    weaver::{
        binding::{self, ArgumentSite},
        plan::{InjectionPlan, InjectionPoint},
        processes::{emit_advice_call, WeaveContext, WeaveProcess},
    },
    Result,
};

/// Replaces the target's body with a call through a chain of around advices.
///
/// The first around plan of a target splits it into three members of the declaring type:
///
/// - `o`, the moved original, with the target's signature and its verbatim body
/// - `u`, the unwrapper `object u(object[] args)`, which calls `o` with unboxed arguments
/// - the target itself, reduced to boxing its arguments, calling `u` and unboxing the result
///
/// Every around plan, the first included, then moves the current body of `u` into the next
/// numbered wrapper `w_k` and makes `u` call the advice with a delegate over `w_k`. The target
/// keeps calling `u`, so the advice of the last plan is the outermost one.
///
/// All synthesized names start with `{prefix}around_{target}_{token}_`, which makes a later run
/// over the same module find and extend the existing chain.
pub struct AroundProcess;

impl AroundProcess {
    fn base_name(prefix: &str, target: &Method) -> String {
        format!("{prefix}around_{}_{}_", target.name, target.token.value())
    }

    fn synthesized(name: String, target: &Method) -> Method {
        let mut method = Method::new(name);
        method.generic_params = target.generic_params.clone();
        method
    }

    fn boxed_entry(name: String, target: &Method) -> Method {
        let mut method = Self::synthesized(name, target);
        method.params = vec![Param::new("args", TypeSignature::object_array())];
        method.return_type = TypeSignature::Object;
        method
    }

    /// Returns the unwrapper of the target's chain, splitting the target on first use.
    fn ensure_chain(
        ctx: &mut WeaveContext<'_>,
        plan: &InjectionPlan,
        target: &Method,
        base: &str,
    ) -> Result<MethodId> {
        let owner = target.declaring_type;
        if let Some(unwrapper) = ctx.module.find_method(owner, &format!("{base}u")) {
            return Ok(unwrapper);
        }

        let mut original = Self::synthesized(format!("{base}o"), target);
        original.return_type = target.return_type.clone();
        original.params = target
            .params
            .iter()
            .map(|p| Param::new(p.name.clone(), p.signature.clone()))
            .collect();
        original.body = Some(ctx.module.take_body(plan.target)?);
        let original = ctx.module.add_method(owner, original)?;
        ctx.move_abort_exits(plan.target, original);

        let mut unwrapper = Self::boxed_entry(format!("{base}u"), target);
        let mut body = MethodBody::new();
        build_unwrapper(&mut body, target, original)?;
        unwrapper.body = Some(body);
        let unwrapper = ctx.module.add_method(owner, unwrapper)?;

        let mut stub = MethodBody::new();
        build_entry_stub(&mut stub, target, unwrapper)?;
        ctx.module.set_body(plan.target, stub)?;

        ctx.summary.synthesized_methods += 2;
        ctx.touch(plan.target);
        ctx.touch(original);
        ctx.touch(unwrapper);
        debug!(
            "Split {} into {}o and {}u",
            ctx.module.method_full_name(plan.target),
            base,
            base
        );
        Ok(unwrapper)
    }
}

/// Returns one more than the highest numeric suffix among the methods of `owner` named
/// `{wrapper_prefix}{n}`, or 0 when there are none.
pub(crate) fn next_wrapper_index(
    module: &Module,
    owner: TypeId,
    wrapper_prefix: &str,
) -> Result<usize> {
    let mut next = 0;
    for &id in &module.ty(owner)?.methods {
        let method = module.method(id)?;
        if let Some(index) = method
            .name
            .strip_prefix(wrapper_prefix)
            .and_then(|suffix| suffix.parse::<usize>().ok())
        {
            next = next.max(index + 1);
        }
    }
    Ok(next)
}

/// Builds `object u(object[] args)`: unbox every argument, call `original`, copy by-ref
/// arguments back into the array and return the boxed result (`null` for void).
fn build_unwrapper(body: &mut MethodBody, target: &Method, original: MethodId) -> Result<()> {
    let mut temporaries = Vec::new();
    for (index, param) in target.params.iter().enumerate() {
        if param.signature.is_by_reference() {
            let local = body.add_local(param.signature.element_type().clone(), None)?;
            temporaries.push((index, local));
        }
    }
    let result = if target.return_type.is_void() {
        None
    } else {
        Some(body.add_local(target.return_type.clone(), None)?)
    };

    let mut asm = InstructionAssembler::new(body);
    asm.ldarg_0()?;
    for (index, param) in target.params.iter().enumerate() {
        asm.ldarg(1)?
            .ldc_index(index)?
            .ldelem_ref()?
            .cast_from_object(param.signature.element_type())?;
        if let Some(&(_, local)) = temporaries.iter().find(|(i, _)| *i == index) {
            asm.stloc(local)?.ldloca(local)?;
        }
    }
    asm.call(MethodRef::generic(original, target.self_generic_args()))?;

    if let Some(result) = result {
        asm.stloc(result)?;
    }
    for &(index, local) in &temporaries {
        asm.ldarg(1)?
            .ldc_index(index)?
            .ldloc(local)?
            .box_if_needed(target.params[index].signature.element_type())?
            .stelem_ref()?;
    }
    match result {
        Some(result) => {
            asm.ldloc(result)?.box_if_needed(&target.return_type)?;
        }
        None => {
            asm.ldnull()?;
        }
    }
    asm.ret()?;

    let instructions = asm.finish()?;
    body.instructions = instructions;
    Ok(())
}

/// Builds the new body of the target: box the arguments, call `unwrapper`, write by-ref
/// arguments back from the array and convert the result to the declared return type.
fn build_entry_stub(body: &mut MethodBody, target: &Method, unwrapper: MethodId) -> Result<()> {
    let args = body.add_local(TypeSignature::object_array(), Some("args"))?;

    let mut asm = InstructionAssembler::new(body);
    binding::emit_boxed_arguments(&mut asm, target)?;
    asm.stloc(args)?
        .ldarg_0()?
        .ldloc(args)?
        .call(MethodRef::generic(unwrapper, target.self_generic_args()))?;

    for (index, param) in target.params.iter().enumerate() {
        if !param.signature.is_by_reference() {
            continue;
        }
        let element = param.signature.element_type();
        asm.ldarg(target.argument_index(index))?
            .ldloc(args)?
            .ldc_index(index)?
            .ldelem_ref()?
            .cast_from_object(element)?
            .stobj(element.clone())?;
    }

    if target.return_type.is_void() {
        asm.pop()?;
    } else {
        asm.cast_from_object(&target.return_type)?;
    }
    asm.ret()?;

    let instructions = asm.finish()?;
    body.instructions = instructions;
    Ok(())
}

impl WeaveProcess for AroundProcess {
    fn name(&self) -> &'static str {
        "around"
    }

    fn point(&self) -> InjectionPoint {
        InjectionPoint::Around
    }

    fn apply(&self, ctx: &mut WeaveContext<'_>, plan: &InjectionPlan) -> Result<()> {
        let target = ctx.module.method(plan.target)?.clone();
        let owner = target.declaring_type;
        let base = Self::base_name(&ctx.config.member_prefix, &target);
        let unwrapper = Self::ensure_chain(ctx, plan, &target, &base)?;

        let index = next_wrapper_index(ctx.module, owner, &format!("{base}w_"))?;
        let mut wrapper = Self::boxed_entry(format!("{base}w_{index}"), &target);
        wrapper.body = Some(ctx.module.take_body(unwrapper)?);
        let wrapper = ctx.module.add_method(owner, wrapper)?;
        ctx.summary.synthesized_methods += 1;

        let instance = ctx.aspect_instance(plan)?;
        let mut body = MethodBody::new();
        let mut asm = InstructionAssembler::new(&mut body);
        let site = ArgumentSite::Unwrapper {
            wrapper: MethodRef::generic(wrapper, target.self_generic_args()),
        };
        emit_advice_call(&mut asm, plan, instance, &site)?;
        asm.ret()?;
        let instructions = asm.finish()?;
        body.instructions = instructions;

        ctx.module.set_body(unwrapper, body)?;
        ctx.touch(unwrapper);
        ctx.touch(wrapper);
        ctx.summary.around += 1;
        debug!(
            "Wrapped {} with {} (link {})",
            ctx.module.method_full_name(plan.target),
            ctx.module.method_full_name(plan.advice),
            index
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{
        assembly::{OpCode, Operand},
        config::WeaverConfig,
        test::{emulator::Emulator, emulator::Value, fixtures, init_logging},
        Weaver,
    };

    fn synthesized_names(module: &Module) -> Vec<String> {
        let ty = module.find_type("App.Calculator").unwrap();
        module
            .ty(ty)
            .unwrap()
            .methods
            .iter()
            .map(|&id| module.method(id).unwrap().name.clone())
            .filter(|name| name.starts_with("__a$_around_"))
            .collect()
    }

    fn compute(module: &Module, a: i32, b: i32) -> (Option<Value>, Value, Vec<String>) {
        let mut emulator = Emulator::new(module);
        let this = emulator.instantiate("App.Calculator").unwrap();
        let cell = Rc::new(RefCell::new(Value::I4(b)));
        let result = emulator
            .invoke(
                "App.Calculator",
                "Compute",
                this,
                vec![Value::I4(a), Value::Ref(cell.clone())],
            )
            .unwrap();
        let b = cell.borrow().clone();
        (result, b, emulator.trace().to_vec())
    }

    #[test]
    fn round_trip_preserves_result_and_by_ref_argument() {
        init_logging();
        let mut module = fixtures::around_module(&["Pass"]);
        let (expected, expected_b, _) = compute(&module, 3, 4);

        Weaver::default().weave(&mut module).unwrap();
        let (result, b, trace) = compute(&module, 3, 4);

        assert_eq!(expected, Some(Value::I4(17)));
        assert_eq!(expected_b, Value::I4(14));
        assert_eq!(result, expected);
        assert_eq!(b, expected_b);
        assert!(trace.iter().any(|name| name == "App.Tracer::Pass"));
    }

    #[test]
    fn advice_sees_and_edits_boxed_arguments() {
        init_logging();
        let mut module = fixtures::around_module(&["Override"]);
        Weaver::default().weave(&mut module).unwrap();

        let (result, b, _) = compute(&module, 3, 4);
        assert_eq!(result, Some(Value::I4(114)));
        assert_eq!(b, Value::I4(14));
    }

    #[test]
    fn last_planned_advice_is_outermost() {
        init_logging();
        let mut module = fixtures::around_module(&["Pass", "Second"]);
        Weaver::default().weave(&mut module).unwrap();

        let (result, _, trace) = compute(&module, 3, 4);
        assert_eq!(result, Some(Value::I4(17)));

        let position = |name: &str| trace.iter().position(|t| t == name).unwrap();
        assert!(position("App.Tracer::Second") < position("App.Tracer::Pass"));
        assert!(position("App.Tracer::Pass") < position("App.Calculator::__a$_around_Compute_100663297_o"));
    }

    #[test]
    fn synthesized_members_are_named_after_the_target() {
        let mut module = fixtures::around_module(&["Pass", "Second"]);
        Weaver::default().weave(&mut module).unwrap();

        let base = "__a$_around_Compute_100663297_";
        assert_eq!(
            synthesized_names(&module),
            vec![
                format!("{base}o"),
                format!("{base}u"),
                format!("{base}w_0"),
                format!("{base}w_1")
            ]
        );

        let ty = module.find_type("App.Calculator").unwrap();
        let unwrapper = module.find_method(ty, &format!("{base}u")).unwrap();
        let unwrapper = module.method(unwrapper).unwrap();
        assert!(!unwrapper.is_static());
        assert!(unwrapper.custom_attributes.is_empty());
        assert_eq!(unwrapper.return_type, TypeSignature::Object);
    }

    #[test]
    fn reweave_extends_existing_chain() {
        init_logging();
        let mut module = fixtures::around_module(&["Pass"]);
        let weaver = Weaver::new(WeaverConfig::default());
        weaver.weave(&mut module).unwrap();
        weaver.weave(&mut module).unwrap();

        let base = "__a$_around_Compute_100663297_";
        assert_eq!(
            synthesized_names(&module),
            vec![
                format!("{base}o"),
                format!("{base}u"),
                format!("{base}w_0"),
                format!("{base}w_1")
            ]
        );

        let (result, b, trace) = compute(&module, 3, 4);
        assert_eq!(result, Some(Value::I4(17)));
        assert_eq!(b, Value::I4(14));
        assert_eq!(
            trace.iter().filter(|t| t.as_str() == "App.Tracer::Pass").count(),
            2
        );
    }

    #[test]
    fn wrapper_index_ignores_foreign_suffixes() {
        let mut module = fixtures::around_module(&[]);
        let ty = module.find_type("App.Calculator").unwrap();
        for name in ["p_w_3", "p_w_x", "p_w_10", "other_w_20"] {
            module.add_method(ty, Method::new(name)).unwrap();
        }
        assert_eq!(next_wrapper_index(&module, ty, "p_w_").unwrap(), 11);
        assert_eq!(next_wrapper_index(&module, ty, "q_w_").unwrap(), 0);
    }

    fn conversions(module: &Module, method: MethodId) -> Vec<(OpCode, TypeSignature)> {
        module
            .method(method)
            .unwrap()
            .body
            .as_ref()
            .unwrap()
            .instructions
            .iter()
            .filter_map(|i| match (&i.opcode, &i.operand) {
                (OpCode::Box | OpCode::UnboxAny | OpCode::Castclass, Operand::Type(ty)) => {
                    Some((i.opcode, ty.clone()))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn generic_and_reference_parameters_are_cast_by_kind() {
        init_logging();
        let mut module = fixtures::generic_around_module();
        let mapper = module.find_type("App.Mapper`1").unwrap();
        let pick = module.find_method(mapper, "Pick").unwrap();
        let base = format!("__a$_around_Pick_{}_", module.method(pick).unwrap().token.value());
        Weaver::default().weave(&mut module).unwrap();

        let t = TypeSignature::GenericParamType(0);
        let u = TypeSignature::GenericParamMethod(0);

        // The first link holds the unwrapping body that was built into `u`.
        let link = module.find_method(mapper, &format!("{base}w_0")).unwrap();
        assert_eq!(
            conversions(&module, link),
            vec![
                (OpCode::UnboxAny, t.clone()),
                (OpCode::UnboxAny, u.clone()),
                (OpCode::Castclass, TypeSignature::String),
                (OpCode::Box, u.clone()),
            ]
        );
        let original = module.find_method(mapper, &format!("{base}o")).unwrap();
        let call = module
            .method(link)
            .unwrap()
            .body
            .as_ref()
            .unwrap()
            .instructions
            .iter()
            .find_map(|i| match &i.operand {
                Operand::Method(m) if m.definition() == Some(original) => Some(m.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(call, MethodRef::generic(original, vec![u.clone()]));

        assert_eq!(
            conversions(&module, pick),
            vec![
                (OpCode::Box, t),
                (OpCode::Box, u.clone()),
                (OpCode::UnboxAny, u),
            ]
        );

        let mut emulator = Emulator::new(&module);
        let this = emulator.instantiate("App.Mapper`1").unwrap();
        let result = emulator
            .invoke(
                "App.Mapper`1",
                "Pick",
                this,
                vec![
                    Value::I4(1),
                    Value::Str("second".to_string()),
                    Value::Str("label".to_string()),
                ],
            )
            .unwrap();
        assert_eq!(result, Some(Value::Str("second".to_string())));
    }
}
