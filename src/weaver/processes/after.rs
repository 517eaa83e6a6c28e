use log::debug;

use crate::{
    assembly::InstructionAssembler,
    weaver::{
        binding::ArgumentSite,
        plan::{InjectionPlan, InjectionPoint},
        processes::{emit_advice_call, WeaveContext, WeaveProcess},
    },
    Result,
};

/// Splices the advice call ahead of every `ret` of the target.
///
/// Branches and exclusive region ends that pointed at a `ret` are moved to the spliced
/// sequence, so each return path, including `leave`s out of protected regions, runs the
/// advice exactly once. A value being returned stays on the stack underneath the call. The
/// early exit of an aborting before advice is skipped, whichever of the two was woven first.
pub struct AfterProcess;

impl WeaveProcess for AfterProcess {
    fn name(&self) -> &'static str {
        "after"
    }

    fn point(&self) -> InjectionPoint {
        InjectionPoint::After
    }

    fn apply(&self, ctx: &mut WeaveContext<'_>, plan: &InjectionPlan) -> Result<()> {
        let instance = ctx.aspect_instance(plan)?;
        let target = ctx.module.method(plan.target)?.clone();
        let mut body = ctx.module.take_body(plan.target)?;

        let returns: Vec<_> = body
            .return_points()
            .into_iter()
            .filter(|&ret| !ctx.is_abort_exit(plan.target, ret))
            .collect();
        for ret in &returns {
            let mut asm = InstructionAssembler::new(&mut body);
            let site = ArgumentSite::Target {
                target: &target,
                abort_flag: None,
            };
            emit_advice_call(&mut asm, plan, instance, &site)?;
            let sequence = asm.finish()?;
            body.insert_before(*ret, sequence)?;
        }

        ctx.module.set_body(plan.target, body)?;
        ctx.touch(plan.target);
        ctx.summary.after += 1;
        debug!(
            "Injected {} after {} at {} return(s)",
            ctx.module.method_full_name(plan.advice),
            ctx.module.method_full_name(plan.target),
            returns.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        assembly::Operand,
        test::{emulator::Emulator, emulator::Value, fixtures, init_logging},
        weaver::plan::InjectionPoint,
        Weaver,
    };

    fn advice_calls(emulator: &Emulator<'_>) -> usize {
        emulator
            .trace()
            .iter()
            .filter(|name| name.as_str() == "App.Audit::OnExit")
            .count()
    }

    #[test]
    fn runs_on_every_return_path() {
        init_logging();
        let mut module = fixtures::after_module();
        Weaver::default().weave(&mut module).unwrap();

        for (input, expected) in [(5, 1), (-5, 2)] {
            let mut emulator = Emulator::new(&module);
            let this = emulator.instantiate("App.Service").unwrap();
            let result = emulator
                .invoke("App.Service", "Sign", this, vec![Value::I4(input)])
                .unwrap();
            assert_eq!(result, Some(Value::I4(expected)));
            assert_eq!(advice_calls(&emulator), 1);
        }
    }

    #[test]
    fn runs_once_on_exits_of_protected_regions() {
        init_logging();
        let mut module = fixtures::after_module();
        Weaver::default().weave(&mut module).unwrap();

        for input in [0, 1] {
            let mut emulator = Emulator::new(&module);
            let this = emulator.instantiate("App.Service").unwrap();
            let result = emulator
                .invoke("App.Service", "Guarded", this, vec![Value::I4(input)])
                .unwrap();
            assert_eq!(result, None);
            assert_eq!(advice_calls(&emulator), 1, "input {input}");
        }
    }

    #[test]
    fn woven_body_stays_consistent() {
        let mut module = fixtures::after_module();
        Weaver::default().weave(&mut module).unwrap();

        let ty = module.find_type("App.Service").unwrap();
        let id = module.find_method(ty, "Guarded").unwrap();
        let body = module.method(id).unwrap().body.as_ref().unwrap();
        body.validate().unwrap();

        let handler = &body.exception_handlers[0];
        let end = handler.handler_end.unwrap();
        let position = body.position(end).unwrap();
        assert!(!body.instructions[position].is_return());
    }

    #[test]
    fn aborted_calls_skip_after_advices_in_either_order() {
        init_logging();
        for after_first in [false, true] {
            let mut module = fixtures::gated_module(after_first);
            let plans = Weaver::default().plan(&module).unwrap();
            let first = if after_first {
                InjectionPoint::After
            } else {
                InjectionPoint::Before
            };
            assert_eq!(plans[0].point, first);
            Weaver::default().weave(&mut module).unwrap();

            let gate = module.find_type("App.Gate").unwrap();
            let exit = module.find_method(gate, "Exit").unwrap();
            let service = module.find_type("App.Service").unwrap();
            let run = module.find_method(service, "Run").unwrap();
            let sites = module
                .method(run)
                .unwrap()
                .body
                .as_ref()
                .unwrap()
                .instructions
                .iter()
                .filter(|i| matches!(&i.operand, Operand::Method(m) if m.definition() == Some(exit)))
                .count();
            assert_eq!(sites, 1, "after_first {after_first}");

            let mut emulator = Emulator::new(&module);
            let this = emulator.instantiate("App.Service").unwrap();
            emulator.invoke("App.Service", "Run", this, vec![]).unwrap();
            assert_eq!(emulator.trace(), &["App.Service::Run", "App.Gate::Check"]);
        }
    }
}
