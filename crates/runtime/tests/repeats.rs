use std::sync::Arc;

use rstest::{fixture, rstest};
use xforms_core::{DefinitionKind, FormDefinition, NodeBuilder};
use xforms_runtime::{Form, MutationError, NodeId};

fn load(root: NodeBuilder) -> Form {
    Form::new(FormDefinition::from_builder(root).unwrap()).unwrap()
}

fn line(x: &str) -> NodeBuilder {
    NodeBuilder::instance()
        .child(NodeBuilder::value("x").with_default(x))
        .child(NodeBuilder::value("pos").with_calculate("position()"))
}

#[fixture]
fn lines() -> Form {
    load(
        NodeBuilder::group("f")
            .child(
                NodeBuilder::repeat("rep")
                    .with_instance(line("a"))
                    .with_instance(line("b"))
                    .with_instance(line("c")),
            )
            .child(NodeBuilder::value("count").with_calculate("count(/f/rep)"))
            .child(NodeBuilder::value("joined").with_calculate("join(' ', /f/rep/x)")),
    )
}

fn values(form: &Form, range: NodeId) -> Vec<String> {
    form.instances(range)
        .into_iter()
        .map(|instance| form.value(form.children(instance)[0]).unwrap())
        .collect()
}

#[rstest]
fn default_instances_materialize_in_order(lines: Form) {
    let snapshot = lines.snapshot();
    assert_eq!(snapshot.value_of("/f/rep[1]/x"), Some("a"));
    assert_eq!(snapshot.value_of("/f/rep[3]/x"), Some("c"));
    assert_eq!(snapshot.value_of("/f/rep[2]/pos"), Some("2"));
    assert_eq!(snapshot.value_of("/f/count"), Some("3"));
    assert_eq!(snapshot.value_of("/f/joined"), Some("a b c"));
}

#[test]
fn adding_at_the_front_uses_the_cleared_template() {
    let mut form =
        load(NodeBuilder::group("f").child(NodeBuilder::repeat("rep").with_instance(line("first"))));
    let range = form.resolve("/f/rep").unwrap();
    let original = form.instances(range)[0];

    form.add_instances(range, Some(-1), 2).unwrap();

    let instances = form.instances(range);
    assert_eq!(instances.len(), 3);
    assert_eq!(instances[2], original);
    assert_eq!(values(&form, range), ["", "", "first"]);
    assert_eq!(form.snapshot().value_of("/f/rep[3]/pos"), Some("3"));
}

#[rstest]
#[case(1)]
#[case(2)]
fn an_empty_range_grows_from_its_template(#[case] edited: usize) {
    let mut form = load(
        NodeBuilder::group("f")
            .child(NodeBuilder::repeat("rep").with_template(line("d")))
            .child(NodeBuilder::value("count").with_calculate("count(/f/rep)")),
    );
    let range = form.resolve("/f/rep").unwrap();
    assert!(form.instances(range).is_empty());

    let snapshot = form.add_instances(range, Some(-1), 2).unwrap();
    assert_eq!(snapshot.value_of("/f/count"), Some("2"));
    assert_eq!(snapshot.value_of("/f/rep[1]/pos"), Some("1"));
    assert_eq!(snapshot.value_of("/f/rep[2]/pos"), Some("2"));
    assert_eq!(values(&form, range), ["d", "d"]);

    let node = form.resolve(&format!("/f/rep[{edited}]/x")).unwrap();
    form.set_value(node, "changed").unwrap();
    let other = 3 - edited;
    assert_eq!(form.snapshot().value_of(&format!("/f/rep[{edited}]/x")), Some("changed"));
    assert_eq!(form.snapshot().value_of(&format!("/f/rep[{other}]/x")), Some("d"));
}

#[rstest]
fn new_instances_are_independent(mut lines: Form) {
    let range = lines.resolve("/f/rep").unwrap();
    lines.add_instances(range, None, 2).unwrap();
    let first = lines.resolve("/f/rep[4]/x").unwrap();

    let snapshot = lines.set_value(first, "one").unwrap();
    assert_eq!(snapshot.value_of("/f/rep[4]/x"), Some("one"));
    assert_eq!(snapshot.value_of("/f/rep[5]/x"), Some(""));
    assert_eq!(snapshot.value_of("/f/count"), Some("5"));
}

#[rstest]
#[case(Some(-1), 0)]
#[case(Some(0), 1)]
#[case(Some(1), 2)]
#[case(Some(2), 3)]
#[case(None, 3)]
fn earlier_instances_keep_identity_and_value(mut lines: Form, #[case] after: Option<isize>, #[case] at: usize) {
    let range = lines.resolve("/f/rep").unwrap();
    let before = lines.instances(range);
    let before_values = values(&lines, range);

    lines.add_instances(range, after, 1).unwrap();

    let now = lines.instances(range);
    assert_eq!(now.len(), before.len() + 1);
    assert_eq!(now[..at], before[..at]);
    assert_eq!(now[at + 1..], before[at..]);
    assert_eq!(values(&lines, range)[..at], before_values[..at]);
    assert_eq!(lines.value(lines.children(now[at])[0]).as_deref(), Some(""));
}

#[rstest]
fn removing_keeps_survivors_in_order(mut lines: Form) {
    let range = lines.resolve("/f/rep").unwrap();
    let snapshot = lines.remove_instances(range, 1, 1).unwrap();
    assert_eq!(snapshot.value_of("/f/joined"), Some("a c"));
    assert_eq!(snapshot.value_of("/f/rep[2]/x"), Some("c"));
    assert_eq!(snapshot.value_of("/f/rep[2]/pos"), Some("2"));
    assert_eq!(snapshot.value_of("/f/count"), Some("2"));
}

#[rstest]
fn removing_every_instance_leaves_an_empty_range(mut lines: Form) {
    let range = lines.resolve("/f/rep").unwrap();
    let snapshot = lines.remove_instances(range, 0, 3).unwrap();
    assert_eq!(snapshot.value_of("/f/count"), Some("0"));
    assert!(snapshot.find("/f/rep").unwrap().children.is_empty());

    lines.add_instances(range, None, 1).unwrap();
    assert_eq!(lines.instances(range).len(), 1);
}

#[rstest]
#[case(Some(3))]
#[case(Some(7))]
#[case(Some(-2))]
fn out_of_range_add_commits_nothing(mut lines: Form, #[case] after: Option<isize>) {
    let range = lines.resolve("/f/rep").unwrap();
    let before = serde_json::to_string(lines.snapshot()).unwrap();

    let err = lines.add_instances(range, after, 2).unwrap_err();
    assert!(matches!(err, MutationError::IndexOutOfRange { len: 3, .. }), "{err:?}");
    assert_eq!(serde_json::to_string(lines.snapshot()).unwrap(), before);
    assert_eq!(lines.instances(range).len(), 3);
}

#[rstest]
#[case(3, 1)]
#[case(2, 2)]
#[case(0, 4)]
fn out_of_range_remove_commits_nothing(mut lines: Form, #[case] start: usize, #[case] count: usize) {
    let range = lines.resolve("/f/rep").unwrap();
    let before = lines.instances(range);

    let err = lines.remove_instances(range, start, count).unwrap_err();
    assert!(matches!(err, MutationError::IndexOutOfRange { .. }), "{err:?}");
    assert_eq!(lines.instances(range), before);
}

#[rstest]
fn removed_nodes_never_resolve_again(mut lines: Form) {
    let range = lines.resolve("/f/rep").unwrap();
    let stale = lines.resolve("/f/rep[1]/x").unwrap();
    lines.remove_instances(range, 0, 1).unwrap();
    lines.add_instances(range, Some(-1), 3).unwrap();

    assert!(!lines.contains(stale));
    assert_eq!(lines.set_value(stale, "zombie"), Err(MutationError::UnknownNode(stale)));
    assert_eq!(lines.reference(stale), Err(MutationError::UnknownNode(stale)));
}

#[rstest]
fn structural_calls_need_a_range(mut lines: Form) {
    let x = lines.resolve("/f/rep[1]/x").unwrap();
    assert_eq!(lines.add_instances(x, None, 1), Err(MutationError::NotARepeat("/f/rep[1]/x".into())));
    assert_eq!(lines.remove_instances(x, 0, 1), Err(MutationError::NotARepeat("/f/rep[1]/x".into())));
}

#[test]
fn explicit_templates_must_belong_to_the_range() {
    let definition = FormDefinition::from_builder(
        NodeBuilder::group("f")
            .child(NodeBuilder::repeat("a").with_template(NodeBuilder::instance().child(NodeBuilder::value("x"))))
            .child(NodeBuilder::repeat("b").with_template(NodeBuilder::instance().child(NodeBuilder::value("y")))),
    )
    .unwrap();
    let mut form = Form::new(definition.clone()).unwrap();
    let a = form.resolve("/f/a").unwrap();

    let DefinitionKind::Repeat { template: b_template, .. } = &definition.find("/f/b").unwrap().kind
    else {
        panic!("expected repeat");
    };
    let err = form.add_instances_from(a, None, 1, Arc::clone(b_template)).unwrap_err();
    assert_eq!(err, MutationError::TemplateMismatch { reference: "/f/a".into(), template: "/f/b".into() });

    let DefinitionKind::Repeat { template: a_template, .. } = &definition.find("/f/a").unwrap().kind
    else {
        panic!("expected repeat");
    };
    form.add_instances_from(a, None, 2, Arc::clone(a_template)).unwrap();
    assert_eq!(form.instances(a).len(), 2);
}

#[rstest]
fn references_resolve_by_position_and_expression(mut lines: Form) {
    let second = lines.resolve("/f/rep[2]").unwrap();
    assert_eq!(lines.reference(second).unwrap(), "/f/rep[2]");
    let x = lines.resolve("/f/rep[x = 'c']/x").unwrap();
    assert_eq!(lines.reference(x).unwrap(), "/f/rep[3]/x");
    assert_eq!(
        lines.resolve("/f/nothing"),
        Err(MutationError::UnknownReference("/f/nothing".into()))
    );
}
