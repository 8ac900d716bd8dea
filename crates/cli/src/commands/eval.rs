use std::fmt::Write;
use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use xforms_xpath::simple_node::doc;
use xforms_xpath::xdm::format_number;
use xforms_xpath::{DataModel, EvalContextBuilder, Value, evaluate_str};

use crate::OutputFormat;
use crate::util::{CliResult, colorize_reference, colorize_value, load_form};

#[derive(Args, Debug, Clone)]
pub struct EvalArgs {
    #[arg(value_name = "XPATH")]
    pub expression: String,

    #[arg(
        long = "form",
        value_name = "FILE",
        help = "Form definition (JSON) whose materialized instance is the context. Default: an empty document."
    )]
    pub form: Option<PathBuf>,

    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub(crate) struct NodeSummary {
    reference: String,
    value: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub(crate) enum ResultSummary {
    String { value: String },
    Number { value: String },
    Boolean { value: bool },
    NodeSet { nodes: Vec<NodeSummary> },
}

pub fn run(args: &EvalArgs) -> CliResult<String> {
    let summary = match &args.form {
        Some(path) => {
            let mut form = load_form(path)?;
            let value = form.evaluate(&args.expression)?;
            summarize(value, |node| NodeSummary {
                reference: form.node_reference(node),
                value: form.node_text(node),
            })
        }
        None => {
            let document = doc().build();
            let ctx = EvalContextBuilder::new(&document, document.document()).build();
            let value = evaluate_str(&args.expression, &ctx)?;
            summarize(value, |node| NodeSummary {
                reference: "/".to_string(),
                value: document.string_value(node),
            })
        }
    };

    let output = match args.format {
        OutputFormat::Text => render_result_text(&summary),
        OutputFormat::Json => serde_json::to_string_pretty(&summary)?,
    };
    Ok(output)
}

fn summarize<N>(value: Value<N>, describe: impl Fn(N) -> NodeSummary) -> ResultSummary {
    match value {
        Value::String(value) => ResultSummary::String { value },
        Value::Number(n) => ResultSummary::Number { value: format_number(n) },
        Value::Boolean(value) => ResultSummary::Boolean { value },
        Value::NodeSet(nodes) => {
            ResultSummary::NodeSet { nodes: nodes.into_iter().map(describe).collect() }
        }
    }
}

pub(crate) fn render_result_text(summary: &ResultSummary) -> String {
    let mut output = String::new();
    match summary {
        ResultSummary::String { value } | ResultSummary::Number { value } => {
            let _ = writeln!(&mut output, "{}", colorize_value(value));
        }
        ResultSummary::Boolean { value } => {
            let _ = writeln!(&mut output, "{}", colorize_value(&value.to_string()));
        }
        ResultSummary::NodeSet { nodes } if nodes.is_empty() => {
            let _ = writeln!(&mut output, "(empty node-set)");
        }
        ResultSummary::NodeSet { nodes } => {
            for node in nodes {
                let _ = writeln!(
                    &mut output,
                    "{} = {}",
                    colorize_reference(&node.reference),
                    colorize_value(&format!("{:?}", node.value))
                );
            }
        }
    }
    output.trim_end().to_owned()
}
