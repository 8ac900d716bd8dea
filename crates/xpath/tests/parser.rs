use rstest::rstest;
use xforms_xpath::parse_xpath;
use xforms_xpath::parser::ast::{Axis, Expr, NodeTest, PathStart};

fn canonical(src: &str) -> String {
    parse_xpath(src).unwrap_or_else(|e| panic!("parse failed for {src}: {e}")).to_string()
}

#[rstest]
#[case("1 + 2 * 3", "(1 + (2 * 3))")]
#[case("(1 + 2) * 3", "((1 + 2) * 3)")]
#[case("a or b and c", "(child::a or (child::b and child::c))")]
#[case("1 = 2 < 3", "(1 = (2 < 3))")]
#[case("1 - 2 - 3", "((1 - 2) - 3)")]
#[case("-1 - -2", "(-(1) - -(2))")]
#[case("--1", "-(-(1))")]
#[case("a | b | c", "((child::a | child::b) | child::c)")]
#[case("-a | b", "-((child::a | child::b))")]
#[case("8 div 2 mod 3", "((8 div 2) mod 3)")]
fn precedence(#[case] src: &str, #[case] expected: &str) {
    assert_eq!(canonical(src), expected);
}

#[rstest]
#[case("div div div", "(child::div div child::div)")]
#[case("* * *", "(child::* * child::*)")]
#[case("or or or", "(child::or or child::or)")]
#[case("mod mod mod", "(child::mod mod child::mod)")]
#[case("a-b", "child::a-b")]
#[case("a - b", "(child::a - child::b)")]
#[case("5-3", "(5 - 3)")]
#[case("child", "child::child")]
#[case("child::child", "child::child")]
#[case("text()", "child::text()")]
#[case("text", "child::text")]
#[case("order", "child::order")]
#[case("android", "child::android")]
#[case("jr:template", "child::jr:template")]
#[case("h:*", "child::h:*")]
fn lexical_disambiguation(#[case] src: &str, #[case] expected: &str) {
    assert_eq!(canonical(src), expected);
}

#[rstest]
#[case("/", "(/)")]
#[case("/f/a", "/child::f/child::a")]
#[case("//a", "/descendant-or-self::node()/child::a")]
#[case("a//b", "child::a/descendant-or-self::node()/child::b")]
#[case(".", "self::node()")]
#[case("..", "parent::node()")]
#[case("../@id", "parent::node()/attribute::id")]
#[case("a[1][@x = 'y']", "child::a[1][(attribute::x = 'y')]")]
#[case("(/f/a)[1]/b", "((/child::f/child::a)[1])/child::b")]
#[case("$x + count(a | b)", "($x + count((child::a | child::b)))")]
#[case("preceding-sibling::rep[1]", "preceding-sibling::rep[1]")]
#[case("ancestor-or-self::node()", "ancestor-or-self::node()")]
#[case("\"it's\"", "\"it's\"")]
#[case("concat('a', \"b\")", "concat('a', 'b')")]
#[case(".5 + 1.", "(0.5 + 1)")]
fn paths_and_primaries(#[case] src: &str, #[case] expected: &str) {
    assert_eq!(canonical(src), expected);
}

#[test]
fn double_slash_expands_to_descendant_or_self_step() {
    let Expr::Path(path) = parse_xpath("//a").unwrap() else { panic!("expected path") };
    assert_eq!(path.start, PathStart::Root);
    assert_eq!(path.steps.len(), 2);
    assert_eq!(path.steps[0].axis, Axis::DescendantOrSelf);
    assert_eq!(path.steps[0].test, NodeTest::Node);
    assert_eq!(path.steps[1].test, NodeTest::Name("a".into()));
}

#[rstest]
#[case("/f/rep[position() = last()]/x + 2 * count(//y)")]
#[case("if(/f/a = 'yes', concat(../b, 'x'), -(3 div 0))")]
#[case("(//a | ./b)[2]/@c != 1.25")]
#[case("selected(/f/s, 'b') and not(/f/g/x = '') or $v")]
#[case("following::*[1]/preceding-sibling::node()[last()]")]
#[case("\"it's\" = 'say \"hi\"'")]
#[case("(/)")]
#[case("/")]
#[case("-(-(1))")]
fn canonical_round_trip(#[case] src: &str) {
    let first = parse_xpath(src).unwrap();
    let again = parse_xpath(&first.to_string()).unwrap();
    assert_eq!(first, again);
    assert_eq!(first.to_string(), again.to_string());
}

#[rstest]
#[case("1 +")]
#[case("/f/a[")]
#[case("concat('a',")]
fn syntax_error_at_end_of_input(#[case] src: &str) {
    let err = parse_xpath(src).unwrap_err();
    assert_eq!(err.code, "XPST0003");
    assert_eq!(err.token, "end of input");
    assert_eq!(err.line, 1);
}

#[test]
fn syntax_error_names_offending_token() {
    let err = parse_xpath("1 + )").unwrap_err();
    assert_eq!(err.code, "XPST0003");
    assert_eq!(err.token, "')'");
    assert!(err.to_string().contains("')'"));
}

#[test]
fn syntax_error_reports_line_and_column() {
    let err = parse_xpath("1 +\n  )").unwrap_err();
    assert_eq!(err.line, 2);
    assert!(err.column >= 1);
}

#[rstest]
#[case("")]
#[case("'unterminated")]
#[case("a b")]
#[case("@")]
#[case("unknown-axis::x")]
fn rejects_malformed_text(#[case] src: &str) {
    assert!(parse_xpath(src).is_err(), "{src} should not parse");
}
