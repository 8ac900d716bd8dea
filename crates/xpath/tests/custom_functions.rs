use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rstest::rstest;
use xforms_xpath::simple_node::{doc, elem, text};
use xforms_xpath::{
    Error, ErrorCode, EvalContextBuilder, FunctionRegistry, RegistrationError, SimpleDocument,
    SimpleNodeId, Value, ValueType, evaluate_str,
};

type Registry = FunctionRegistry<SimpleNodeId>;

fn document() -> SimpleDocument {
    doc().child(elem("f").child(elem("a").child(text("21"))).child(elem("b").child(text("x")))).build()
}

fn eval_with(reg: Registry, expr: &str) -> Result<Value<SimpleNodeId>, Error> {
    let d = document();
    let ctx = EvalContextBuilder::new(&d, d.document()).with_functions(Arc::new(reg)).build();
    evaluate_str(expr, &ctx)
}

#[test]
fn registered_function_receives_coerced_arguments() {
    let mut reg = Registry::with_builtins();
    reg.register("double", &["number"], "number", |_ctx, args| match args {
        [Value::Number(n)] => Ok(Value::Number(n * 2.0)),
        _ => Err(Error::failed("expected one number")),
    })
    .unwrap();
    assert_eq!(eval_with(reg, "double(/f/a)").unwrap(), Value::Number(42.0));
}

#[test]
fn result_is_coerced_to_declared_return_type() {
    let mut reg = Registry::with_builtins();
    reg.register("answer", &[], "string", |_ctx, _args| Ok(Value::Number(42.0))).unwrap();
    assert_eq!(eval_with(reg, "answer()").unwrap(), Value::String("42".into()));
}

#[test]
fn node_set_parameters_reject_atomic_arguments() {
    let mut reg = Registry::with_builtins();
    reg.register_typed("size", vec![ValueType::NodeSet], ValueType::Number, |_ctx, args| {
        match args {
            [Value::NodeSet(nodes)] => Ok(Value::Number(nodes.len() as f64)),
            _ => Err(Error::failed("expected a node-set")),
        }
    })
    .unwrap();
    let reg2 = reg.clone();
    assert_eq!(eval_with(reg, "size(/f/*)").unwrap(), Value::Number(2.0));
    assert_eq!(eval_with(reg2, "size('a')").unwrap_err().code, ErrorCode::XPTY0004);
}

#[test]
fn arity_is_checked_before_the_implementation_runs() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let mut reg = Registry::with_builtins();
    reg.register("f", &["string"], "string", move |_ctx, args| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(args[0].clone())
    })
    .unwrap();
    let err = eval_with(reg.clone(), "f(1, 2)").unwrap_err();
    assert_eq!(err.code, ErrorCode::XPST0017);
    assert_eq!(err.message, "function f() cannot be called with two arguments");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    assert_eq!(eval_with(reg, "f(1)").unwrap(), Value::String("1".into()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn implementation_errors_surface_unchanged() {
    let mut reg = Registry::with_builtins();
    reg.register("boom", &[], "string", |_ctx, _args| Err(Error::failed("kaboom"))).unwrap();
    let err = eval_with(reg, "boom()").unwrap_err();
    assert_eq!(err.code, ErrorCode::FOER0000);
    assert_eq!(err.message, "kaboom");
}

#[rstest]
#[case(&["dog"], "string", "Unsupported arg type(s): 'dog'")]
#[case(&["string", "dog", "cat"], "string", "Unsupported arg type(s): 'dog', 'cat'")]
#[case(&["string"], "fish", "Unsupported return type: 'fish'")]
fn unsupported_type_tags_are_rejected(
    #[case] args: &[&str],
    #[case] ret: &str,
    #[case] message: &str,
) {
    let mut reg = Registry::with_builtins();
    let err = reg.register("f", args, ret, |_ctx, _args| Ok(Value::Boolean(true))).unwrap_err();
    assert_eq!(err.to_string(), message);
    assert!(!reg.contains("f"));
}

#[rstest]
#[case("concat")]
#[case("if")]
#[case("selected")]
#[case("cos")]
#[case("pow")]
fn built_in_names_cannot_be_reused(#[case] name: &str) {
    let mut reg = Registry::with_builtins();
    let err = reg.register(name, &[], "string", |_ctx, _args| Ok(Value::Boolean(true))).unwrap_err();
    assert_eq!(err, RegistrationError::Duplicate(name.to_string()));
}

#[test]
fn second_registration_of_a_name_fails() {
    let mut reg = Registry::with_builtins();
    reg.register("f", &[], "boolean", |_ctx, _args| Ok(Value::Boolean(true))).unwrap();
    let err = reg.register("f", &["number"], "number", |_ctx, _args| Ok(Value::Number(1.0))).unwrap_err();
    assert_eq!(err.to_string(), "There is already a function with the name: 'f'");
}
