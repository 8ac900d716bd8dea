use crate::engine::runtime::{CallCtx, Error};
use crate::model::NodeHandle;
use crate::xdm::Value;

pub(super) fn last_fn<N: NodeHandle>(ctx: &CallCtx<N>, _args: &[Value<N>]) -> Result<Value<N>, Error> {
    Ok(Value::Number(ctx.size as f64))
}

/// `position()` is the context position; `position(node-set)` is the 1-based
/// index of the first node among its same-named siblings.
pub(super) fn position_fn<N: NodeHandle>(ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    let Some(arg) = args.first() else {
        return Ok(Value::Number(ctx.position as f64));
    };
    let nodes = arg.clone().into_node_set()?;
    let Some(&node) = nodes.first() else {
        return Ok(Value::Number(f64::NAN));
    };
    let name = ctx.model.name(node);
    let Some(parent) = ctx.model.parent(node) else {
        return Ok(Value::Number(1.0));
    };
    let index = ctx
        .model
        .children(parent)
        .into_iter()
        .filter(|c| ctx.model.name(*c) == name)
        .position(|c| c == node)
        .map_or(f64::NAN, |i| (i + 1) as f64);
    Ok(Value::Number(index))
}

pub(super) fn count_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    let nodes = args[0].clone().into_node_set()?;
    Ok(Value::Number(nodes.len() as f64))
}

fn target_node<N: NodeHandle>(ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Option<N>, Error> {
    match args.first() {
        None => Ok(Some(ctx.node)),
        Some(v) => Ok(v.clone().into_node_set()?.first().copied()),
    }
}

pub(super) fn name_fn<N: NodeHandle>(ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    let name = target_node(ctx, args)?.and_then(|n| ctx.model.name(n)).unwrap_or_default();
    Ok(Value::String(name))
}

pub(super) fn local_name_fn<N: NodeHandle>(ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    let name = target_node(ctx, args)?.and_then(|n| ctx.model.name(n)).unwrap_or_default();
    let local = name.rsplit_once(':').map_or(name.as_str(), |(_, l)| l).to_string();
    Ok(Value::String(local))
}

pub(super) fn current_fn<N: NodeHandle>(ctx: &CallCtx<N>, _args: &[Value<N>]) -> Result<Value<N>, Error> {
    ctx.record(ctx.current);
    Ok(Value::NodeSet(vec![ctx.current]))
}
