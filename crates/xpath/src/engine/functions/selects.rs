//! Helpers over space-separated selection lists.

use super::{num_arg, str_arg};
use crate::engine::runtime::{CallCtx, Error};
use crate::model::NodeHandle;
use crate::xdm::Value;

pub(super) fn selected_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    let wanted = str_arg(args, 1).trim();
    Ok(Value::Boolean(str_arg(args, 0).split_whitespace().any(|v| v == wanted)))
}

pub(super) fn count_selected_fn<N: NodeHandle>(
    _ctx: &CallCtx<N>,
    args: &[Value<N>],
) -> Result<Value<N>, Error> {
    Ok(Value::Number(str_arg(args, 0).split_whitespace().count() as f64))
}

/// Zero-based; out of range yields the empty string.
pub(super) fn selected_at_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    let index = num_arg(args, 1);
    let item = if index.is_finite() && index >= 0.0 {
        str_arg(args, 0).split_whitespace().nth(index.trunc() as usize)
    } else {
        None
    };
    Ok(Value::String(item.unwrap_or_default().to_string()))
}
