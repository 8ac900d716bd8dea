use super::str_arg;
use crate::engine::runtime::{CallCtx, Error};
use crate::model::NodeHandle;
use crate::xdm::Value;

pub(super) fn true_fn<N: NodeHandle>(_ctx: &CallCtx<N>, _args: &[Value<N>]) -> Result<Value<N>, Error> {
    Ok(Value::Boolean(true))
}

pub(super) fn false_fn<N: NodeHandle>(_ctx: &CallCtx<N>, _args: &[Value<N>]) -> Result<Value<N>, Error> {
    Ok(Value::Boolean(false))
}

pub(super) fn not_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    Ok(Value::Boolean(!args[0].to_boolean()))
}

pub(super) fn boolean_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    Ok(Value::Boolean(args[0].to_boolean()))
}

pub(super) fn boolean_from_string_fn<N: NodeHandle>(
    _ctx: &CallCtx<N>,
    args: &[Value<N>],
) -> Result<Value<N>, Error> {
    let s = str_arg(args, 0);
    Ok(Value::Boolean(s == "true" || s == "1"))
}

/// Eager form; the evaluator short-circuits calls to the built-in.
pub(super) fn if_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    Ok(if args[0].to_boolean() { args[1].clone() } else { args[2].clone() })
}
