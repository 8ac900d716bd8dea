use std::fmt::Write;
use std::path::PathBuf;

use anyhow::{Context, anyhow, bail};
use clap::{ArgMatches, Args};
use tracing::debug;
use xforms_core::NodeSnapshot;
use xforms_runtime::Form;

use crate::OutputFormat;
use crate::util::{
    CliResult, colorize_error, colorize_flag, colorize_reference, colorize_value, load_form,
};

#[derive(Args, Debug, Clone)]
pub struct SnapshotArgs {
    #[arg(long = "form", value_name = "FILE", help = "Form definition (JSON).")]
    pub form: PathBuf,

    #[arg(
        long = "set",
        value_name = "REF=VALUE",
        action = clap::ArgAction::Append,
        help = "Write VALUE into the value node at REF."
    )]
    pub set: Vec<String>,

    #[arg(
        long = "select",
        value_name = "REF=ITEM",
        action = clap::ArgAction::Append,
        help = "Select ITEM in the select at REF."
    )]
    pub select: Vec<String>,

    #[arg(
        long = "deselect",
        value_name = "REF=ITEM",
        action = clap::ArgAction::Append,
        help = "Deselect ITEM in the select at REF."
    )]
    pub deselect: Vec<String>,

    #[arg(
        long = "add",
        value_name = "REF[:AFTER[:COUNT]]",
        action = clap::ArgAction::Append,
        help = "Add COUNT (default 1) instances to the repeat at REF after 0-based ordinal AFTER \
                (-1 = front, default: end)."
    )]
    pub add: Vec<String>,

    #[arg(
        long = "remove",
        value_name = "REF:START[:COUNT]",
        action = clap::ArgAction::Append,
        help = "Remove COUNT (default 1) instances from the repeat at REF starting at 0-based ordinal START."
    )]
    pub remove: Vec<String>,

    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Flags in command line order. Empty means grouped by kind.
    #[arg(skip)]
    pub order: Vec<MutationKind>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MutationKind {
    Set,
    Select,
    Deselect,
    Add,
    Remove,
}

impl MutationKind {
    const ALL: [MutationKind; 5] = [
        MutationKind::Set,
        MutationKind::Select,
        MutationKind::Deselect,
        MutationKind::Add,
        MutationKind::Remove,
    ];

    fn id(self) -> &'static str {
        match self {
            MutationKind::Set => "set",
            MutationKind::Select => "select",
            MutationKind::Deselect => "deselect",
            MutationKind::Add => "add",
            MutationKind::Remove => "remove",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Set { reference: String, value: String },
    Select { reference: String, item: String },
    Deselect { reference: String, item: String },
    Add { reference: String, after: Option<isize>, count: usize },
    Remove { reference: String, start: usize, count: usize },
}

impl SnapshotArgs {
    /// Remember the relative order of mutation flags as given on the command line.
    pub fn record_order(&mut self, matches: &ArgMatches) {
        let mut positions: Vec<(usize, MutationKind)> = Vec::new();
        for kind in MutationKind::ALL {
            if let Some(indices) = matches.indices_of(kind.id()) {
                positions.extend(indices.map(|i| (i, kind)));
            }
        }
        positions.sort_by_key(|(i, _)| *i);
        self.order = positions.into_iter().map(|(_, kind)| kind).collect();
    }

    pub fn mutations(&self) -> CliResult<Vec<Mutation>> {
        let order: Vec<MutationKind> = if self.order.is_empty() {
            MutationKind::ALL.iter().flat_map(|k| std::iter::repeat_n(*k, self.values(*k).len())).collect()
        } else {
            self.order.clone()
        };
        let mut cursors = [0usize; 5];
        let mut mutations = Vec::with_capacity(order.len());
        for kind in order {
            let slot = kind as usize;
            let text = self
                .values(kind)
                .get(cursors[slot])
                .ok_or_else(|| anyhow!("missing value for --{}", kind.id()))?;
            cursors[slot] += 1;
            mutations.push(
                parse_mutation(kind, text).with_context(|| format!("invalid --{} {text}", kind.id()))?,
            );
        }
        Ok(mutations)
    }

    fn values(&self, kind: MutationKind) -> &[String] {
        match kind {
            MutationKind::Set => &self.set,
            MutationKind::Select => &self.select,
            MutationKind::Deselect => &self.deselect,
            MutationKind::Add => &self.add,
            MutationKind::Remove => &self.remove,
        }
    }
}

pub fn run(args: &SnapshotArgs) -> CliResult<String> {
    let mutations = args.mutations()?;
    let mut form = load_form(&args.form)?;
    for mutation in &mutations {
        debug!(?mutation, "applying mutation");
        apply(&mut form, mutation).with_context(|| format!("{mutation:?} failed"))?;
    }

    let output = match args.format {
        OutputFormat::Text => render_snapshot_text(&form),
        OutputFormat::Json => serde_json::to_string_pretty(form.snapshot())?,
    };
    Ok(output)
}

pub fn apply(form: &mut Form, mutation: &Mutation) -> CliResult<()> {
    match mutation {
        Mutation::Set { reference, value } => {
            let node = form.resolve(reference)?;
            form.set_value(node, value)?;
        }
        Mutation::Select { reference, item } => {
            let node = form.resolve(reference)?;
            form.select(node, item)?;
        }
        Mutation::Deselect { reference, item } => {
            let node = form.resolve(reference)?;
            form.deselect(node, item)?;
        }
        Mutation::Add { reference, after, count } => {
            let node = form.resolve(reference)?;
            form.add_instances(node, *after, *count)?;
        }
        Mutation::Remove { reference, start, count } => {
            let node = form.resolve(reference)?;
            form.remove_instances(node, *start, *count)?;
        }
    }
    Ok(())
}

pub fn parse_mutation(kind: MutationKind, text: &str) -> CliResult<Mutation> {
    match kind {
        MutationKind::Set | MutationKind::Select | MutationKind::Deselect => {
            let [reference, value] = split_top_level(text, '=', 1)[..] else {
                bail!("expected REF=VALUE");
            };
            let (reference, value) = (reference.trim().to_string(), value.to_string());
            Ok(match kind {
                MutationKind::Set => Mutation::Set { reference, value },
                MutationKind::Select => Mutation::Select { reference, item: value },
                _ => Mutation::Deselect { reference, item: value },
            })
        }
        MutationKind::Add => {
            let parts = split_top_level(text, ':', 2);
            let reference = parts[0].trim().to_string();
            let after = match parts.get(1).map(|s| s.trim()) {
                None | Some("" | "end") => None,
                Some(after) => Some(after.parse::<isize>().context("AFTER must be an integer")?),
            };
            let count = match parts.get(2) {
                Some(count) => count.trim().parse::<usize>().context("COUNT must be a non-negative integer")?,
                None => 1,
            };
            Ok(Mutation::Add { reference, after, count })
        }
        MutationKind::Remove => {
            let parts = split_top_level(text, ':', 2);
            let Some(start) = parts.get(1) else { bail!("expected REF:START[:COUNT]") };
            let start = start.trim().parse::<usize>().context("START must be a non-negative integer")?;
            let count = match parts.get(2) {
                Some(count) => count.trim().parse::<usize>().context("COUNT must be a non-negative integer")?,
                None => 1,
            };
            Ok(Mutation::Remove { reference: parts[0].trim().to_string(), start, count })
        }
    }
}

/// Split on `separator` outside of predicates and string literals, at most `max_splits` times.
fn split_top_level(text: &str, separator: char, max_splits: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, c) if c == separator && depth == 0 && parts.len() < max_splits => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn render_snapshot_text(form: &Form) -> String {
    let mut output = String::new();
    render_node(&mut output, form.snapshot(), 0);
    for diagnostic in form.diagnostics() {
        let _ = writeln!(&mut output, "{}", colorize_error(&format!("! {diagnostic}")));
    }
    output.trim_end().to_owned()
}

fn render_node(output: &mut String, node: &NodeSnapshot, depth: usize) {
    let indent = "  ".repeat(depth);
    let mut line = format!("{indent}{}", colorize_reference(&node.reference));
    if let Some(value) = &node.value {
        let _ = write!(line, " = {}", colorize_value(&format!("{value:?}")));
    }
    let mut flags = vec![node.node_type.as_str()];
    if !node.relevant {
        flags.push("non-relevant");
    }
    if node.readonly {
        flags.push("readonly");
    }
    if node.required {
        flags.push("required");
    }
    if !node.valid {
        flags.push("invalid");
    }
    let _ = write!(line, " {}", colorize_flag(&format!("[{}]", flags.join(", "))));
    if let Some(label) = &node.label {
        let _ = write!(line, " {}", colorize_flag(&format!("{label:?}")));
    }
    let _ = writeln!(output, "{line}");

    if let Some(items) = &node.items {
        let values: Vec<&str> = items.iter().map(|i| i.value.as_str()).collect();
        let _ = writeln!(output, "{indent}  {}", colorize_flag(&format!("items: {}", values.join(", "))));
    }
    for error in &node.errors {
        let _ = writeln!(output, "{indent}  {}", colorize_error(&format!("! {error}")));
    }
    for child in &node.children {
        render_node(output, child, depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/f/a=3", Mutation::Set { reference: "/f/a".into(), value: "3".into() })]
    #[case("/f/a=x=y", Mutation::Set { reference: "/f/a".into(), value: "x=y".into() })]
    #[case("/f/rep[x='a=b']/x=", Mutation::Set { reference: "/f/rep[x='a=b']/x".into(), value: String::new() })]
    fn parses_assignments(#[case] text: &str, #[case] expected: Mutation) {
        assert_eq!(parse_mutation(MutationKind::Set, text).unwrap(), expected);
    }

    #[rstest]
    #[case("/f/rep", None, 1)]
    #[case("/f/rep:-1", Some(-1), 1)]
    #[case("/f/rep:end:3", None, 3)]
    #[case("/f/rep:0:2", Some(0), 2)]
    fn parses_additions(#[case] text: &str, #[case] after: Option<isize>, #[case] count: usize) {
        assert_eq!(
            parse_mutation(MutationKind::Add, text).unwrap(),
            Mutation::Add { reference: "/f/rep".into(), after, count }
        );
    }

    #[rstest]
    fn parses_removals() {
        assert_eq!(
            parse_mutation(MutationKind::Remove, "/f/rep[x = 'a:b']:1").unwrap(),
            Mutation::Remove { reference: "/f/rep[x = 'a:b']".into(), start: 1, count: 1 }
        );
        assert!(parse_mutation(MutationKind::Remove, "/f/rep").is_err());
        assert!(parse_mutation(MutationKind::Remove, "/f/rep:-1").is_err());
    }

    #[rstest]
    fn without_recorded_order_mutations_group_by_kind() {
        let args = SnapshotArgs {
            form: PathBuf::from("unused.json"),
            set: vec!["/f/a=1".into()],
            select: Vec::new(),
            deselect: Vec::new(),
            add: vec!["/f/rep".into()],
            remove: vec!["/f/rep:0".into()],
            format: OutputFormat::Text,
            order: Vec::new(),
        };
        let kinds: Vec<_> = args
            .mutations()
            .unwrap()
            .into_iter()
            .map(|m| match m {
                Mutation::Set { .. } => "set",
                Mutation::Add { .. } => "add",
                Mutation::Remove { .. } => "remove",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, ["set", "add", "remove"]);
    }
}
