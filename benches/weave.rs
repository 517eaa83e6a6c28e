//! Benchmarks for planning and weaving.
//!
//! Both benchmarks run over a synthetic module of many classes that share one aspect with a
//! before, an after and an around advice:
//! - Discovery alone, sequential and parallel
//! - A complete weave, including the staged copy of the module

extern crate dotweave;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use dotweave::prelude::*;
use std::hint::black_box;

const CLASSES: usize = 200;
const METHODS: usize = 8;

fn advice(config: &WeaverConfig, name: &str, points: InjectionPoints) -> MethodBuilder {
    MethodBuilder::new(name)
        .public()
        .static_method()
        .attribute(config.advice_annotation(points, InjectionTargets::METHOD))
        .parameter_with(
            "name",
            TypeSignature::String,
            config.argument_annotation(AdviceArgumentSource::TargetName),
        )
        .implementation(|asm| {
            asm.ret()?;
            Ok(())
        })
}

fn build_module(config: &WeaverConfig) -> Module {
    let mut module = Module::new("Bench.dll");

    ClassBuilder::new("Aspect")
        .namespace("Bench")
        .default_constructor()
        .method(advice(config, "OnEnter", InjectionPoints::BEFORE))
        .method(advice(config, "OnExit", InjectionPoints::AFTER))
        .method(
            MethodBuilder::new("Around")
                .public()
                .returns(TypeSignature::Object)
                .attribute(config.around_annotation(InjectionTargets::METHOD))
                .parameter_with(
                    "target",
                    TypeSignature::boxed_invoker(),
                    config.argument_annotation(AdviceArgumentSource::Target),
                )
                .parameter_with(
                    "args",
                    TypeSignature::object_array(),
                    config.argument_annotation(AdviceArgumentSource::TargetArguments),
                )
                .implementation(|asm| {
                    asm.ldarg(1)?
                        .ldarg(2)?
                        .callvirt(MethodRef::External(ExternalMethod::boxed_invoker_invoke()))?
                        .ret()?;
                    Ok(())
                }),
        )
        .build(&mut module)
        .unwrap();

    for class in 0..CLASSES {
        let mut builder = ClassBuilder::new(&format!("Service{class}"))
            .namespace("Bench")
            .attribute(config.aspect_annotation("Bench.Aspect"));
        for method in 0..METHODS {
            builder = builder.method(
                MethodBuilder::new(&format!("Method{method}"))
                    .public()
                    .returns(TypeSignature::I4)
                    .parameter("a", TypeSignature::I4)
                    .parameter("b", TypeSignature::ByRef(Box::new(TypeSignature::I4)))
                    .implementation(|asm| {
                        asm.ldarg(1)?
                            .brtrue("positive")?
                            .ldc_i4(0)?
                            .ret()?
                            .label("positive")?
                            .ldarg(1)?
                            .ldarg(2)?
                            .ldobj(TypeSignature::I4)?
                            .add()?
                            .ret()?;
                        Ok(())
                    }),
            );
        }
        builder.build(&mut module).unwrap();
    }

    module
}

/// Benchmark discovery on its own, with and without parallel planning.
fn bench_plan(c: &mut Criterion) {
    let config = WeaverConfig::default();
    let module = build_module(&config);

    let parallel = Weaver::new(config.clone());
    c.bench_function("plan_parallel", |b| {
        b.iter(|| {
            let plans = parallel.plan(black_box(&module)).unwrap();
            black_box(plans)
        });
    });

    let sequential = Weaver::new(config.with_parallel_planning(false));
    c.bench_function("plan_sequential", |b| {
        b.iter(|| {
            let plans = sequential.plan(black_box(&module)).unwrap();
            black_box(plans)
        });
    });
}

/// Benchmark a complete weave of a fresh module.
fn bench_weave(c: &mut Criterion) {
    let config = WeaverConfig::default();
    let module = build_module(&config);
    let weaver = Weaver::new(config);

    c.bench_function("weave_full", |b| {
        b.iter_batched(
            || module.clone(),
            |mut module| {
                let summary = weaver.weave(&mut module).unwrap();
                black_box(summary)
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, bench_plan, bench_weave);
criterion_main!(benches);
