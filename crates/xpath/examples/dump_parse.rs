//! Print the pest parse tree and canonical form of an expression.
//!
//! `cargo run -p xforms-xpath --example xforms_xpath_dump_parse -- "/f/a[. > 2]"`

use pest::Parser;
use pest::iterators::Pair;
use xforms_xpath::parser::{Rule, XPathParser};

fn dump(pair: &Pair<'_, Rule>, depth: usize) {
    let span = pair.as_span();
    let (start, end) = (span.start(), span.end());
    println!("{:indent$}{:?} [{start}..{end}] {:?}", "", pair.as_rule(), pair.as_str(), indent = depth * 2);
    for inner in pair.clone().into_inner() {
        dump(&inner, depth + 1);
    }
}

fn main() {
    let Some(source) = std::env::args().nth(1) else {
        eprintln!("usage: dump_parse <expression>");
        std::process::exit(2);
    };
    match XPathParser::parse(Rule::xpath, &source) {
        Ok(pairs) => pairs.for_each(|pair| dump(&pair, 0)),
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    }
    match XPathParser::parse_to_ast(&source) {
        Ok(expr) => println!("canonical: {expr}"),
        Err(error) => eprintln!("{error}"),
    }
}
