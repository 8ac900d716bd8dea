use super::{num_arg, str_arg};
use crate::engine::runtime::{CallCtx, Error};
use crate::model::NodeHandle;
use crate::xdm::Value;

/// String argument, or the context node's string value when omitted.
fn string_or_context<N: NodeHandle>(ctx: &CallCtx<N>, args: &[Value<N>]) -> String {
    if args.is_empty() { ctx.string_value(ctx.node) } else { str_arg(args, 0).to_string() }
}

pub(super) fn string_fn<N: NodeHandle>(ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    let s = match args.first() {
        None => ctx.string_value(ctx.node),
        Some(v) => ctx.value_to_string(v),
    };
    Ok(Value::String(s))
}

pub(super) fn concat_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    let out: String = (0..args.len()).map(|i| str_arg(args, i)).collect();
    Ok(Value::String(out))
}

pub(super) fn starts_with_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    Ok(Value::Boolean(str_arg(args, 0).starts_with(str_arg(args, 1))))
}

pub(super) fn ends_with_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    Ok(Value::Boolean(str_arg(args, 0).ends_with(str_arg(args, 1))))
}

pub(super) fn contains_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    Ok(Value::Boolean(str_arg(args, 0).contains(str_arg(args, 1))))
}

pub(super) fn substring_before_fn<N: NodeHandle>(
    _ctx: &CallCtx<N>,
    args: &[Value<N>],
) -> Result<Value<N>, Error> {
    let s = str_arg(args, 0).split_once(str_arg(args, 1)).map(|(before, _)| before);
    Ok(Value::String(s.unwrap_or_default().to_string()))
}

pub(super) fn substring_after_fn<N: NodeHandle>(
    _ctx: &CallCtx<N>,
    args: &[Value<N>],
) -> Result<Value<N>, Error> {
    let s = str_arg(args, 0).split_once(str_arg(args, 1)).map(|(_, after)| after);
    Ok(Value::String(s.unwrap_or_default().to_string()))
}

/// Characters at positions `p` with `round(start) <= p < round(start) + round(len)`.
pub(super) fn substring_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    let start = super::numeric::xpath_round(num_arg(args, 1));
    let end = if args.len() > 2 {
        start + super::numeric::xpath_round(num_arg(args, 2))
    } else {
        f64::INFINITY
    };
    let out: String = str_arg(args, 0)
        .chars()
        .enumerate()
        .filter(|(i, _)| {
            let p = (i + 1) as f64;
            p >= start && p < end
        })
        .map(|(_, c)| c)
        .collect();
    Ok(Value::String(out))
}

pub(super) fn string_length_fn<N: NodeHandle>(ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    Ok(Value::Number(string_or_context(ctx, args).chars().count() as f64))
}

pub(super) fn normalize_space_fn<N: NodeHandle>(ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    let s = string_or_context(ctx, args);
    Ok(Value::String(s.split_whitespace().collect::<Vec<_>>().join(" ")))
}

pub(super) fn translate_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    let from: Vec<char> = str_arg(args, 1).chars().collect();
    let to: Vec<char> = str_arg(args, 2).chars().collect();
    let out: String = str_arg(args, 0)
        .chars()
        .filter_map(|c| match from.iter().position(|f| *f == c) {
            Some(i) => to.get(i).copied(),
            None => Some(c),
        })
        .collect();
    Ok(Value::String(out))
}

/// `join(separator, values...)`: node-set arguments contribute every node.
pub(super) fn join_fn<N: NodeHandle>(ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    let separator = ctx.value_to_string(&args[0]);
    let mut parts = Vec::new();
    for arg in &args[1..] {
        match arg {
            Value::NodeSet(nodes) => parts.extend(nodes.iter().map(|n| ctx.string_value(*n))),
            other => parts.push(ctx.value_to_string(other)),
        }
    }
    Ok(Value::String(parts.join(&separator)))
}

pub(super) fn coalesce_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    let first = str_arg(args, 0);
    let s = if first.is_empty() { str_arg(args, 1) } else { first };
    Ok(Value::String(s.to_string()))
}
