use log::debug;

use crate::{
    assembly::{InstructionAssembler, OpCode},
    metadata::signatures::TypeSignature,
    weaver::{
        binding::ArgumentSite,
        plan::{InjectionPlan, InjectionPoint},
        processes::{emit_advice_call, WeaveContext, WeaveProcess},
    },
    Result,
};

/// Splices the advice call ahead of the target's first instruction.
///
/// Branches to the old first instruction are left alone, so the advice runs once per call
/// even when the body loops back to its start. Abortable advices get a zero-initialized flag
/// local; when the advice sets it, the target returns the advice's result (non-void targets)
/// without running any original instruction. That early `ret` is not a return of the original
/// body, so after advices never run on it.
pub struct BeforeProcess;

impl WeaveProcess for BeforeProcess {
    fn name(&self) -> &'static str {
        "before"
    }

    fn point(&self) -> InjectionPoint {
        InjectionPoint::Before
    }

    fn apply(&self, ctx: &mut WeaveContext<'_>, plan: &InjectionPlan) -> Result<()> {
        let instance = ctx.aspect_instance(plan)?;
        let target = ctx.module.method(plan.target)?.clone();
        let mut body = ctx.module.take_body(plan.target)?;

        let original_first = body.first().ok_or_else(|| {
            malformed_error!("Target {} has an empty body", ctx.module.method_full_name(plan.target))
        })?;

        let returns_value = !target.return_type.is_void();
        let (abort_flag, result) = if plan.abortable {
            let flag = body.add_local(TypeSignature::Boolean, None)?;
            let result = if returns_value {
                Some(body.add_local(target.return_type.clone(), None)?)
            } else {
                None
            };
            (Some(flag), result)
        } else {
            (None, None)
        };

        let mut asm = InstructionAssembler::new(&mut body);
        if let Some(flag) = abort_flag {
            asm.ldc_i4(0)?.stloc(flag)?;
        }

        let site = ArgumentSite::Target {
            target: &target,
            abort_flag,
        };
        emit_advice_call(&mut asm, plan, instance, &site)?;

        if let Some(flag) = abort_flag {
            if let Some(result) = result {
                asm.stloc(result)?;
            }
            asm.ldloc(flag)?.branch_to(OpCode::Brfalse, original_first)?;
            if let Some(result) = result {
                asm.ldloc(result)?;
            }
            asm.ret()?;
        }

        let sequence = asm.finish()?;
        let abort_exit = abort_flag
            .and_then(|_| sequence.last())
            .map(|ret| ret.id);
        body.prepend(sequence);
        if let Some(ret) = abort_exit {
            ctx.add_abort_exit(plan.target, ret);
        }

        ctx.module.set_body(plan.target, body)?;
        ctx.touch(plan.target);
        ctx.summary.before += 1;
        debug!(
            "Injected {} before {}",
            ctx.module.method_full_name(plan.advice),
            ctx.module.method_full_name(plan.target)
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        assembly::OpCode,
        test::{emulator::Emulator, emulator::Value, fixtures, init_logging},
        Weaver,
    };

    #[test]
    fn advice_runs_before_original() {
        init_logging();
        let mut module = fixtures::before_module(false);
        Weaver::default().weave(&mut module).unwrap();

        let mut emulator = Emulator::new(&module);
        let this = emulator.instantiate("App.Service").unwrap();
        let result = emulator.invoke("App.Service", "GetValue", this, vec![]).unwrap();

        assert_eq!(result, Some(Value::I4(7)));
        assert_eq!(
            emulator.trace(),
            &["App.Service::GetValue", "App.Guard::.ctor", "App.Guard::OnEnter"]
        );
    }

    #[test]
    fn abort_returns_advice_value_without_running_original() {
        init_logging();
        let mut module = fixtures::before_module(true);
        Weaver::default().weave(&mut module).unwrap();

        let mut emulator = Emulator::new(&module);
        let this = emulator.instantiate("App.Service").unwrap();
        let result = emulator
            .invoke("App.Service", "GetValue", this.clone(), vec![])
            .unwrap();

        assert_eq!(result, Some(Value::I4(42)));
        assert_eq!(emulator.field(&this, "touched").unwrap(), Value::Null);
    }

    #[test]
    fn declined_abort_runs_original_and_drops_advice_value() {
        init_logging();
        let mut module = fixtures::declining_guard_module();
        Weaver::default().weave(&mut module).unwrap();

        let mut emulator = Emulator::new(&module);
        let this = emulator.instantiate("App.Service").unwrap();
        let result = emulator
            .invoke("App.Service", "GetValue", this.clone(), vec![])
            .unwrap();

        assert_eq!(result, Some(Value::I4(7)));
        assert_eq!(emulator.field(&this, "touched").unwrap(), Value::I4(1));
        assert!(emulator.trace().iter().any(|name| name == "App.Guard::OnEnter"));
    }

    #[test]
    fn loops_back_to_start_do_not_rerun_advice() {
        init_logging();
        let mut module = fixtures::before_module(false);
        Weaver::default().weave(&mut module).unwrap();

        let mut emulator = Emulator::new(&module);
        let this = emulator.instantiate("App.Service").unwrap();
        let result = emulator
            .invoke("App.Service", "Countdown", this, vec![Value::I4(3)])
            .unwrap();

        assert_eq!(result, None);
        let advice_calls = emulator
            .trace()
            .iter()
            .filter(|name| name.as_str() == "App.Guard::OnEnter")
            .count();
        assert_eq!(advice_calls, 1);
    }

    #[test]
    fn woven_bodies_validate() {
        let mut module = fixtures::before_module(true);
        Weaver::default().weave(&mut module).unwrap();

        let ty = module.find_type("App.Service").unwrap();
        let id = module.find_method(ty, "GetValue").unwrap();
        let body = module.method(id).unwrap().body.as_ref().unwrap();
        body.validate().unwrap();
        assert_eq!(body.instructions.last().unwrap().opcode, OpCode::Ret);
    }
}
