//! Integration tests for high-level builder combinations.
//!
//! These build complete types the way a loader would hand them to the weaver and check the
//! resulting graph: member order, tokens, accessor links and body consistency.

use dotweave::prelude::*;

/// A view model with properties, an event and a constructor, similar to:
///
/// ```csharp
/// public class PersonViewModel {
///     public string Name { get; set; }
///     public int Age { get; set; }
///     public event EventHandler Changed;
///     public void Reset() { }
/// }
/// ```
#[test]
fn viewmodel_with_properties_and_events() -> Result<()> {
    let mut module = Module::new("App.dll");
    let handler = TypeSignature::Class("System.EventHandler".to_string());

    let ty = ClassBuilder::new("PersonViewModel")
        .namespace("App.ViewModels")
        .public()
        .default_constructor()
        .method(MethodBuilder::new("Reset").public().implementation(|asm| {
            asm.ret()?;
            Ok(())
        }))
        .auto_property("Name", TypeSignature::String)
        .auto_property("Age", TypeSignature::I4)
        .event(
            EventBuilder::new("Changed", handler.clone())
                .add_on(
                    MethodBuilder::new("add_Changed")
                        .public()
                        .parameter("value", handler.clone())
                        .implementation(|asm| {
                            asm.ret()?;
                            Ok(())
                        }),
                )
                .remove_on(
                    MethodBuilder::new("remove_Changed")
                        .public()
                        .parameter("value", handler)
                        .implementation(|asm| {
                            asm.ret()?;
                            Ok(())
                        }),
                ),
        )
        .build(&mut module)?;

    let typedef = module.ty(ty)?;
    assert_eq!(typedef.full_name(), "App.ViewModels.PersonViewModel");
    assert_eq!(typedef.methods.len(), 8);
    assert_eq!(typedef.fields.len(), 2);
    assert_eq!(typedef.properties.len(), 2);
    assert_eq!(typedef.events.len(), 1);

    let tokens: Vec<u32> = typedef
        .methods
        .iter()
        .map(|&id| module.method(id).unwrap().token.value())
        .collect();
    assert_eq!(tokens, (0x0600_0001..=0x0600_0008).collect::<Vec<_>>());

    let event = &typedef.events[0];
    assert!(module.method(event.add_on.unwrap())?.is_add_on());
    assert!(module.method(event.remove_on.unwrap())?.is_remove_on());

    for &id in &typedef.methods {
        module.method(id)?.body.as_ref().unwrap().validate()?;
    }
    Ok(())
}

/// Tokens keep counting across types in build order.
#[test]
fn tokens_follow_build_order_across_types() -> Result<()> {
    let mut module = Module::new("App.dll");

    let first = ClassBuilder::new("First")
        .namespace("App")
        .default_constructor()
        .field("count", TypeSignature::I4)
        .build(&mut module)?;
    let second = ClassBuilder::new("Second")
        .namespace("App")
        .default_constructor()
        .field("name", TypeSignature::String)
        .build(&mut module)?;

    let first = module.ty(first)?;
    let second = module.ty(second)?;
    assert!(first.token < second.token);
    assert_eq!(module.method(first.methods[0])?.token.value(), 0x0600_0001);
    assert_eq!(module.method(second.methods[0])?.token.value(), 0x0600_0002);
    assert_eq!(module.field(second.fields[0]).unwrap().token.value(), 0x0400_0002);
    Ok(())
}

/// Branches, locals and protected regions assembled through the builder survive validation.
#[test]
fn method_with_locals_branches_and_handlers() -> Result<()> {
    let mut module = Module::new("App.dll");
    let ty = ClassBuilder::new("Parser").namespace("App").build(&mut module)?;

    let id = MethodBuilder::new("TryParse")
        .public()
        .returns(TypeSignature::Boolean)
        .parameter("input", TypeSignature::String)
        .local("ok", TypeSignature::Boolean)
        .implementation(|asm| {
            asm.label("try")?
                .ldarg(1)?
                .brfalse("fail")?
                .ldc_i4(1)?
                .stloc(0)?
                .leave("exit")?
                .label("fail")?
                .ldstr("empty")?
                .throw()?
                .label("handler")?
                .pop()?
                .ldc_i4(0)?
                .stloc(0)?
                .leave("exit")?
                .label("exit")?
                .ldloc(0)?
                .ret()?
                .protect(
                    ExceptionHandlerFlags::EXCEPTION,
                    "try",
                    "handler",
                    "exit",
                    Some(TypeSignature::Class("System.Exception".to_string())),
                )?;
            Ok(())
        })
        .build(&mut module, ty)?;

    let body = module.method(id)?.body.as_ref().unwrap();
    body.validate()?;
    assert_eq!(body.locals.len(), 1);
    assert_eq!(body.exception_handlers.len(), 1);
    assert_eq!(body.return_points().len(), 1);
    Ok(())
}
