use rstest::rstest;
use xforms_xpath::simple_node::{doc, elem, text};
use xforms_xpath::{
    DataModel, EvalContextBuilder, SimpleDocument, SimpleNodeId, Value, evaluate, evaluate_tracked,
    parse_xpath,
};

fn document(a: &str) -> SimpleDocument {
    doc()
        .child(
            elem("f")
                .child(elem("a").child(text(a)))
                .child(elem("b").child(text("bee")))
                .child(elem("c").child(text("sea")))
                .child(elem("rep").child(elem("v").child(text("1"))))
                .child(elem("rep").child(elem("v").child(text("2")))),
        )
        .build()
}

fn node(d: &SimpleDocument, path: &str) -> SimpleNodeId {
    let ctx = EvalContextBuilder::new(d, d.document()).build();
    match evaluate(&parse_xpath(path).unwrap(), &ctx).unwrap() {
        Value::NodeSet(nodes) => nodes[0],
        other => panic!("{path} is not a node-set: {other:?}"),
    }
}

fn deps_at(d: &SimpleDocument, context: SimpleNodeId, expr: &str) -> Vec<String> {
    let ctx = EvalContextBuilder::new(d, context).build();
    let evaluation = evaluate_tracked(&parse_xpath(expr).unwrap(), &ctx);
    evaluation
        .dependencies
        .nodes()
        .iter()
        .map(|n| {
            let name = d.name(*n).unwrap_or_else(|| "#doc".into());
            format!("{name}={}", d.string_value(*n))
        })
        .collect()
}

fn deps(d: &SimpleDocument, expr: &str) -> Vec<String> {
    deps_at(d, d.document(), expr)
}

#[rstest]
#[case("/f/a * 2", &["a=3"])]
#[case("/f/a = 3 or /f/b = 'x'", &["a=3"])]
#[case("/f/a = 4 and /f/b = 'x'", &["a=3"])]
#[case("/f/a = 4 or /f/b = 'x'", &["a=3", "b=bee"])]
#[case("if(/f/a = 3, /f/b, /f/c)", &["a=3", "b=bee"])]
#[case("1 + 2", &[])]
fn only_taken_branches_are_recorded(#[case] expr: &str, #[case] expected: &[&str]) {
    let d = document("3");
    assert_eq!(deps(&d, expr), expected);
}

#[test]
fn recorded_set_follows_the_data() {
    let expr = "if(/f/a = 3, /f/b, /f/c)";
    assert_eq!(deps(&document("3"), expr), ["a=3", "b=bee"]);
    assert_eq!(deps(&document("4"), expr), ["a=4", "c=sea"]);
}

#[test]
fn predicates_record_candidates_and_what_they_read() {
    let d = document("3");
    let got = deps(&d, "count(/f/rep[v > 1])");
    assert_eq!(got, ["rep=1", "rep=2", "v=1", "v=2"]);
}

#[test]
fn intermediate_steps_are_not_recorded() {
    let d = document("3");
    assert!(!deps(&d, "/f/a").iter().any(|n| n.starts_with("f=")));
}

#[test]
fn context_reads_are_recorded() {
    let d = document("3");
    let a = node(&d, "/f/a");
    assert_eq!(deps_at(&d, a, "."), ["a=3"]);
    assert_eq!(deps_at(&d, a, "string-length() + 1"), ["a=3"]);
    assert_eq!(deps_at(&d, a, "current()"), ["a=3"]);
    assert_eq!(deps_at(&d, a, "../b"), ["b=bee"]);
}

#[rstest]
#[case("3", "count(/f/a/text())", &["a=3", "#doc=3"])]
#[case("", "count(/f/a/text())", &["a="])]
#[case("", "string(/f/a/node())", &["a="])]
fn text_steps_record_the_element_they_read(
    #[case] a: &str,
    #[case] expr: &str,
    #[case] expected: &[&str],
) {
    let d = if a.is_empty() {
        doc().child(elem("f").child(elem("a"))).build()
    } else {
        document(a)
    };
    assert_eq!(deps(&d, expr), expected);
}

#[test]
fn dependencies_survive_evaluation_errors() {
    let d = document("3");
    let ctx = EvalContextBuilder::new(&d, d.document()).build();
    let evaluation = evaluate_tracked(&parse_xpath("/f/a + nope()").unwrap(), &ctx);
    assert!(evaluation.result.is_err());
    assert!(evaluation.dependencies.contains(node(&d, "/f/a")));
}

#[test]
fn each_evaluation_gets_a_fresh_tracker() {
    let d = document("3");
    let expr = parse_xpath("/f/b").unwrap();
    let ctx = EvalContextBuilder::new(&d, d.document()).build();
    let first = evaluate_tracked(&expr, &ctx);
    let second = evaluate_tracked(&expr, &ctx);
    assert_eq!(first.dependencies.nodes(), second.dependencies.nodes());
    assert_eq!(second.dependencies.len(), 1);
}
