use rstest::{fixture, rstest};
use xforms_core::{FormDefinition, NodeBuilder};
use xforms_runtime::{EngineConfig, Form, FormError, MutationError, OutputKind, XNode};
use xforms_xpath::Value;

fn load(root: NodeBuilder) -> Form {
    Form::new(FormDefinition::from_builder(root).unwrap()).unwrap()
}

#[fixture]
fn doubled() -> Form {
    load(
        NodeBuilder::group("f")
            .child(NodeBuilder::value("a"))
            .child(NodeBuilder::value("b").with_calculate("/f/a * 2")),
    )
}

#[fixture]
fn cascade() -> Form {
    load(
        NodeBuilder::group("f")
            .child(NodeBuilder::value("toggle").with_default("yes"))
            .child(
                NodeBuilder::group("g")
                    .with_relevant("/f/toggle = 'yes'")
                    .child(NodeBuilder::value("x").with_default("hello"))
                    .child(NodeBuilder::group("inner").child(NodeBuilder::value("y").with_default("deep"))),
            )
            .child(NodeBuilder::value("len").with_calculate("string-length(/f/g/x)")),
    )
}

#[rstest]
#[case("3", "6")]
#[case("2.5", "5")]
#[case("-0", "0")]
#[case("x", "NaN")]
#[case("", "NaN")]
fn calculate_follows_its_input(mut doubled: Form, #[case] input: &str, #[case] expected: &str) {
    let a = doubled.resolve("/f/a").unwrap();
    let snapshot = doubled.set_value(a, input).unwrap();
    assert_eq!(snapshot.value_of("/f/b"), Some(expected));
    let b = snapshot.find("/f/b").unwrap();
    assert!(b.valid);
    assert!(b.errors.is_empty());
}

#[rstest]
fn calculated_nodes_are_readonly(mut doubled: Form) {
    assert!(doubled.snapshot().find("/f/b").unwrap().readonly);
    let b = doubled.resolve("/f/b").unwrap();
    assert_eq!(doubled.set_value(b, "1"), Err(MutationError::ReadOnly("/f/b".into())));
}

#[rstest]
fn dependencies_reflect_latest_evaluation(mut doubled: Form) {
    let a = doubled.resolve("/f/a").unwrap();
    let b = doubled.resolve("/f/b").unwrap();
    assert_eq!(doubled.dependencies(b, OutputKind::Calculate), Some(vec![a]));
    assert_eq!(doubled.dependencies(b, OutputKind::Relevant), None);
}

#[rstest]
fn losing_relevance_clears_the_subtree(mut cascade: Form) {
    let toggle = cascade.resolve("/f/toggle").unwrap();
    let snapshot = cascade.set_value(toggle, "no").unwrap();

    let g = snapshot.find("/f/g").unwrap();
    assert!(!g.relevant);
    for reference in ["/f/g/x", "/f/g/inner/y"] {
        let node = snapshot.find(reference).unwrap();
        assert!(!node.relevant, "{reference} should inherit non-relevance");
        assert_eq!(node.value.as_deref(), Some(""));
    }
    assert_eq!(snapshot.value_of("/f/len"), Some("0"));
}

#[rstest]
fn cleared_values_are_not_restored(mut cascade: Form) {
    let toggle = cascade.resolve("/f/toggle").unwrap();
    cascade.set_value(toggle, "no").unwrap();
    let snapshot = cascade.set_value(toggle, "yes").unwrap();

    assert!(snapshot.find("/f/g/x").unwrap().relevant);
    assert_eq!(snapshot.value_of("/f/g/x"), Some(""));
    assert_eq!(snapshot.value_of("/f/g/inner/y"), Some(""));
    assert_eq!(snapshot.value_of("/f/len"), Some("0"));
}

#[rstest]
fn writes_to_non_relevant_nodes_are_rejected(mut cascade: Form) {
    let toggle = cascade.resolve("/f/toggle").unwrap();
    let x = cascade.resolve("/f/g/x").unwrap();
    cascade.set_value(toggle, "no").unwrap();
    let before = serde_json::to_string(cascade.snapshot()).unwrap();

    assert_eq!(cascade.set_value(x, "again"), Err(MutationError::NotRelevant("/f/g/x".into())));
    assert_eq!(serde_json::to_string(cascade.snapshot()).unwrap(), before);
}

#[test]
fn readonly_is_inherited() {
    let mut form = load(
        NodeBuilder::group("f").child(
            NodeBuilder::group("locked")
                .with_readonly("true()")
                .child(NodeBuilder::value("x").with_default("keep")),
        ),
    );
    let x = form.resolve("/f/locked/x").unwrap();
    assert!(form.snapshot().find("/f/locked/x").unwrap().readonly);
    assert_eq!(form.set_value(x, "change"), Err(MutationError::ReadOnly("/f/locked/x".into())));
    assert_eq!(form.value(x).as_deref(), Some("keep"));
}

#[rstest]
fn recomputation_without_mutation_is_idempotent(mut cascade: Form) {
    let toggle = cascade.resolve("/f/toggle").unwrap();
    cascade.set_value(toggle, "no").unwrap();
    let first = serde_json::to_string(cascade.snapshot()).unwrap();
    let second = serde_json::to_string(cascade.recompute()).unwrap();
    let third = serde_json::to_string(cascade.recompute()).unwrap();
    assert_eq!(first, second);
    assert_eq!(second, third);
}

#[test]
fn required_and_constraint_drive_validity() {
    let mut form = load(
        NodeBuilder::group("f").child(
            NodeBuilder::value("age")
                .with_required("true()")
                .with_constraint(". >= 18", Some("must be an adult")),
        ),
    );
    let age = form.resolve("/f/age").unwrap();

    let node = form.snapshot().find("/f/age").unwrap();
    assert!(node.required);
    assert!(!node.valid);
    assert_eq!(node.errors, ["must be an adult"]);

    let node = form.set_value(age, "12").unwrap().find("/f/age").unwrap();
    assert!(!node.valid);

    let node = form.set_value(age, "30").unwrap().find("/f/age").unwrap();
    assert!(node.valid);
    assert!(node.errors.is_empty());
}

#[test]
fn evaluation_errors_stay_on_their_output() {
    let form = load(
        NodeBuilder::group("f")
            .child(NodeBuilder::value("broken").with_calculate("no-such-function(1)"))
            .child(NodeBuilder::value("fine").with_calculate("1 + 1")),
    );
    let snapshot = form.snapshot();

    let broken = snapshot.find("/f/broken").unwrap();
    assert!(!broken.valid);
    assert_eq!(broken.value.as_deref(), Some(""));
    assert_eq!(
        broken.errors,
        ["calculate: function no-such-function() is not defined (XPST0017)"]
    );

    let fine = snapshot.find("/f/fine").unwrap();
    assert!(fine.valid);
    assert_eq!(fine.value.as_deref(), Some("2"));
}

#[test]
fn cycles_terminate_with_a_diagnostic() {
    let definition = FormDefinition::from_builder(
        NodeBuilder::group("f")
            .child(NodeBuilder::value("a").with_calculate("concat(/f/b, 'x')"))
            .child(NodeBuilder::value("b").with_calculate("concat(/f/a, 'y')"))
            .child(NodeBuilder::value("c")),
    )
    .unwrap();
    let config = EngineConfig::new().with_max_evaluations_per_output(4);
    let mut form = Form::with_config(definition, config).unwrap();

    let diagnostics = form.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    let diagnostic = &diagnostics[0];
    assert_eq!(diagnostic.output, OutputKind::Calculate);
    assert_eq!(diagnostic.evaluations, 4);
    assert!(["/f/a", "/f/b"].contains(&diagnostic.reference.as_str()));
    assert_eq!(
        diagnostic.to_string(),
        format!("dependency cycle: calculate of {} did not settle after 4 evaluations", diagnostic.reference)
    );

    let c = form.resolve("/f/c").unwrap();
    let snapshot = form.set_value(c, "unrelated").unwrap();
    assert_eq!(snapshot.value_of("/f/c"), Some("unrelated"));
    assert!(form.diagnostics().is_empty());
}

#[test]
fn variables_from_config_are_bound() {
    let definition = FormDefinition::from_builder(
        NodeBuilder::group("f")
            .child(NodeBuilder::value("net").with_default("100"))
            .child(NodeBuilder::value("gross").with_calculate("/f/net * $rate")),
    )
    .unwrap();
    let form = Form::with_config(definition, EngineConfig::new().with_variable("rate", 1.2)).unwrap();
    assert_eq!(form.snapshot().value_of("/f/gross"), Some("120"));
}

#[test]
fn registered_functions_take_part_in_recomputation() {
    let mut form = load(
        NodeBuilder::group("f")
            .child(NodeBuilder::value("a").with_default("3"))
            .child(NodeBuilder::value("b").with_calculate("double(/f/a)")),
    );
    assert!(!form.snapshot().find("/f/b").unwrap().valid);

    let snapshot = form
        .register_function("double", &["number"], "number", |_, args| match &args[0] {
            Value::Number(n) => Ok(Value::Number(n * 2.0)),
            _ => unreachable!("argument is coerced to a number"),
        })
        .unwrap();
    assert_eq!(snapshot.value_of("/f/b"), Some("6"));
    assert!(snapshot.find("/f/b").unwrap().valid);

    let a = form.resolve("/f/a").unwrap();
    assert_eq!(form.set_value(a, "21").unwrap().value_of("/f/b"), Some("42"));
}

#[rstest]
#[case("concat", &["string"], "string")]
#[case("cos", &["number"], "number")]
fn registering_a_builtin_name_fails(#[case] name: &str, #[case] args: &[&str], #[case] ret: &str) {
    let mut form = load(NodeBuilder::group("f").child(NodeBuilder::value("a")));
    let err = form.register_function(name, args, ret, |_, _| Ok(Value::Boolean(true)));
    assert_eq!(
        err.unwrap_err().to_string(),
        format!("There is already a function with the name: '{name}'")
    );
}

#[test]
fn syntax_errors_fail_the_load() {
    let definition = FormDefinition::from_builder(
        NodeBuilder::group("f").child(NodeBuilder::value("a").with_relevant("/f/b = ")),
    )
    .unwrap();
    let Err(FormError::Syntax { reference, bind, .. }) = Form::new(definition) else {
        panic!("expected a syntax error");
    };
    assert_eq!(reference, "/f/a");
    assert_eq!(bind, "relevant");
}

#[rstest]
fn ad_hoc_evaluation_sees_the_instance(mut doubled: Form) {
    let a = doubled.resolve("/f/a").unwrap();
    doubled.set_value(a, "4").unwrap();
    assert_eq!(doubled.evaluate("/f/b + 1").unwrap(), Value::Number(9.0));
    let Value::NodeSet(nodes) = doubled.evaluate("/f/*").unwrap() else { panic!("expected nodes") };
    let texts: Vec<_> = nodes.iter().map(|n| doubled.node_text(*n)).collect();
    assert_eq!(texts, ["4", "8"]);
    assert_eq!(doubled.node_reference(nodes[1]), "/f/b");
}

#[rstest]
#[case("count(/f/a/text())", Value::Number(1.0))]
#[case("string(/f/a/text())", Value::String("v".into()))]
#[case("count(/f/empty/text())", Value::Number(0.0))]
#[case("count(/f/a/node())", Value::Number(1.0))]
#[case("count(/f/*)", Value::Number(3.0))]
fn value_nodes_expose_text_children(#[case] expression: &str, #[case] expected: Value<XNode>) {
    let mut form = load(
        NodeBuilder::group("f")
            .child(NodeBuilder::value("a").with_default("v"))
            .child(NodeBuilder::value("empty"))
            .child(NodeBuilder::value("echo").with_calculate("concat('[', /f/empty/text(), ']')")),
    );
    assert_eq!(form.evaluate(expression).unwrap(), expected, "{expression}");
}

#[test]
fn text_reads_follow_a_value_that_was_empty() {
    let mut form = load(
        NodeBuilder::group("f")
            .child(NodeBuilder::value("a"))
            .child(NodeBuilder::value("echo").with_calculate("concat('[', /f/a/text(), ']')")),
    );
    assert_eq!(form.snapshot().value_of("/f/echo"), Some("[]"));

    let a = form.resolve("/f/a").unwrap();
    assert_eq!(form.set_value(a, "x").unwrap().value_of("/f/echo"), Some("[x]"));
    let Value::NodeSet(nodes) = form.evaluate("/f/a/text()").unwrap() else { panic!("expected nodes") };
    assert_eq!(form.node_reference(nodes[0]), "/f/a/text()");
    assert_eq!(form.resolve("/f/a/text()"), Ok(a));
}
