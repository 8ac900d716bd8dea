use super::num_arg;
use crate::engine::runtime::{CallCtx, Error};
use crate::model::NodeHandle;
use crate::xdm::{Value, string_to_number};

/// XPath 1.0 `round`: halves round towards positive infinity.
pub(crate) fn xpath_round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() { n } else { (n + 0.5).floor() }
}

pub(super) fn number_fn<N: NodeHandle>(ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    let n = match args.first() {
        None => string_to_number(&ctx.string_value(ctx.node)),
        Some(v) => ctx.value_to_number(v),
    };
    Ok(Value::Number(n))
}

pub(super) fn sum_fn<N: NodeHandle>(ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    let nodes = args[0].clone().into_node_set()?;
    let total: f64 = nodes.iter().map(|n| string_to_number(&ctx.string_value(*n))).sum();
    Ok(Value::Number(total))
}

pub(super) fn floor_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    Ok(Value::Number(num_arg(args, 0).floor()))
}

pub(super) fn ceiling_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    Ok(Value::Number(num_arg(args, 0).ceil()))
}

pub(super) fn round_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    Ok(Value::Number(xpath_round(num_arg(args, 0))))
}

pub(super) fn int_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    Ok(Value::Number(num_arg(args, 0).trunc()))
}

pub(super) fn abs_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    Ok(Value::Number(num_arg(args, 0).abs()))
}

/// Every number in the arguments; node-sets contribute one number per node.
fn flatten_numbers<N: NodeHandle>(ctx: &CallCtx<N>, args: &[Value<N>]) -> Vec<f64> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Value::NodeSet(nodes) => {
                out.extend(nodes.iter().map(|n| string_to_number(&ctx.string_value(*n))))
            }
            other => out.push(ctx.value_to_number(other)),
        }
    }
    out
}

fn fold_numbers(values: Vec<f64>, pick: fn(f64, f64) -> f64) -> f64 {
    if values.is_empty() || values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    values.into_iter().reduce(pick).unwrap_or(f64::NAN)
}

pub(super) fn min_fn<N: NodeHandle>(ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    Ok(Value::Number(fold_numbers(flatten_numbers(ctx, args), f64::min)))
}

pub(super) fn max_fn<N: NodeHandle>(ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    Ok(Value::Number(fold_numbers(flatten_numbers(ctx, args), f64::max)))
}
