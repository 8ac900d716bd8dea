use rstest::rstest;
use xforms_core::{
    BindKind, Category, DefinitionError, DefinitionKind, FormDefinition, ItemsetDefinition,
    NodeBuilder, NodeType, SelectMode,
};

fn sample() -> NodeBuilder {
    NodeBuilder::group("f")
        .child(NodeBuilder::value("a").with_default("1"))
        .child(NodeBuilder::value("b").with_calculate("/f/a * 2"))
        .child(
            NodeBuilder::repeat("rep")
                .with_instance(NodeBuilder::instance().child(NodeBuilder::value("x").with_default("first")))
                .with_instance(NodeBuilder::instance().child(NodeBuilder::value("x").with_default("second"))),
        )
        .child(
            NodeBuilder::select("color", SelectMode::Multiple)
                .with_default("red red blue")
                .with_item("red", "Red")
                .with_item("blue", "Blue"),
        )
}

#[test]
fn references_are_absolute_paths() {
    let form = FormDefinition::from_builder(sample()).unwrap();
    assert_eq!(form.root().reference, "/f");
    assert_eq!(form.root().node_type(), NodeType::Root);
    let b = form.find("/f/b").unwrap();
    assert_eq!(b.category(), Category::Control);
    assert_eq!(b.bind.expressions().collect::<Vec<_>>(), [(BindKind::Calculate, "/f/a * 2")]);
    assert_eq!(form.find("/f/rep/x").unwrap().node_type(), NodeType::ValueNode);
}

#[test]
fn first_instance_becomes_template_with_cleared_defaults() {
    let form = FormDefinition::from_builder(sample()).unwrap();
    let DefinitionKind::Repeat { template, instances } = &form.find("/f/rep").unwrap().kind else {
        panic!("expected repeat");
    };
    assert_eq!(instances.len(), 2);
    assert_eq!(template.node_type(), NodeType::RepeatInstance);
    assert_eq!(template.children[0].kind, DefinitionKind::Value { default: String::new() });
    assert_eq!(instances[1].children[0].kind, DefinitionKind::Value { default: "second".into() });
}

#[test]
fn explicit_template_is_not_materialized() {
    let repeat = NodeBuilder::repeat("rep")
        .with_template(NodeBuilder::instance().child(NodeBuilder::value("x").with_default("t")))
        .with_instance(NodeBuilder::instance().child(NodeBuilder::value("x").with_default("i")));
    let form = FormDefinition::from_builder(NodeBuilder::group("f").child(repeat)).unwrap();
    let DefinitionKind::Repeat { template, instances } = &form.find("/f/rep").unwrap().kind else {
        panic!("expected repeat");
    };
    assert_eq!(instances.len(), 1);
    assert_eq!(template.children[0].kind, DefinitionKind::Value { default: "t".into() });
}

#[rstest]
#[case::two_flagged_instances(
    NodeBuilder::repeat("rep")
        .with_template(NodeBuilder::instance())
        .with_template(NodeBuilder::instance())
)]
#[case::body_and_flagged_instance(
    NodeBuilder::repeat("rep")
        .child(NodeBuilder::value("x"))
        .with_template(NodeBuilder::instance())
)]
fn second_template_declaration_is_rejected(#[case] repeat: NodeBuilder) {
    let err = FormDefinition::from_builder(NodeBuilder::group("f").child(repeat)).unwrap_err();
    assert!(matches!(err, DefinitionError::DuplicateTemplate { ref reference } if reference == "/f/rep"));
}

#[test]
fn select_cannot_declare_items_and_itemset() {
    let select = NodeBuilder::select("s", SelectMode::Single)
        .with_item("a", "A")
        .with_itemset(ItemsetDefinition::new("/f/opts/o", "v", "l"));
    let err = FormDefinition::from_builder(NodeBuilder::group("f").child(select)).unwrap_err();
    assert!(matches!(err, DefinitionError::ConflictingItems { .. }));
}

#[test]
fn select_defaults_are_unique_and_single_keeps_one() {
    let form = FormDefinition::from_builder(
        sample().child(NodeBuilder::select("one", SelectMode::Single).with_default("a b")),
    )
    .unwrap();
    let DefinitionKind::Select { default, mode, .. } = &form.find("/f/color").unwrap().kind else {
        panic!("expected select");
    };
    assert_eq!(*mode, SelectMode::Multiple);
    assert_eq!(default, &["red", "blue"]);
    let DefinitionKind::Select { default, .. } = &form.find("/f/one").unwrap().kind else {
        panic!("expected select");
    };
    assert_eq!(default, &["a"]);
}

#[rstest]
#[case("")]
#[case("9lives")]
#[case("has space")]
fn invalid_names_are_rejected(#[case] name: &str) {
    let err = FormDefinition::from_builder(NodeBuilder::group("f").child(NodeBuilder::value(name)))
        .unwrap_err();
    assert!(matches!(err, DefinitionError::InvalidName { .. }), "{name}");
}

#[test]
fn root_must_be_a_group() {
    let err = FormDefinition::from_builder(NodeBuilder::repeat("f")).unwrap_err();
    assert_eq!(err.to_string(), "the form root must be a group, found repeat");
}

#[test]
fn json_descriptions_deserialize_into_builders() {
    let json = r#"{
        "name": "f",
        "children": [
            { "name": "flag", "default": "yes" },
            { "name": "g", "bind": { "relevant": "/f/flag = 'yes'" },
              "children": [ { "name": "x", "default": "foo" } ] },
            { "name": "rep", "kind": "repeat",
              "instances": [ { "template": true, "children": [ { "name": "v" } ] } ] },
            { "name": "s", "kind": "select1",
              "itemset": { "nodeset": "/f/rep" } }
        ]
    }"#;
    let form = FormDefinition::from_json(json).unwrap();
    assert_eq!(form.find("/f/g").unwrap().node_type(), NodeType::Subtree);
    assert_eq!(form.find("/f/g/x").unwrap().kind, DefinitionKind::Value { default: "foo".into() });
    let DefinitionKind::Select { itemset: Some(itemset), .. } = &form.find("/f/s").unwrap().kind
    else {
        panic!("expected itemset select");
    };
    assert_eq!(itemset.value, "value");
    assert_eq!(itemset.label, "label");
}

#[test]
fn unknown_json_fields_are_rejected() {
    let err = FormDefinition::from_json(r#"{ "name": "f", "colour": "red" }"#).unwrap_err();
    assert!(matches!(err, DefinitionError::Json(_)));
}
