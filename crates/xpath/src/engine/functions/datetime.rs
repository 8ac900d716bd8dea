use chrono::{DateTime, FixedOffset, Local, SecondsFormat};

use crate::engine::runtime::{CallCtx, Error};
use crate::model::NodeHandle;
use crate::xdm::Value;

fn now_of<N>(ctx: &CallCtx<N>) -> DateTime<FixedOffset> {
    ctx.now.unwrap_or_else(|| Local::now().fixed_offset())
}

pub(super) fn today_fn<N: NodeHandle>(ctx: &CallCtx<N>, _args: &[Value<N>]) -> Result<Value<N>, Error> {
    Ok(Value::String(now_of(ctx).format("%Y-%m-%d").to_string()))
}

pub(super) fn now_fn<N: NodeHandle>(ctx: &CallCtx<N>, _args: &[Value<N>]) -> Result<Value<N>, Error> {
    Ok(Value::String(now_of(ctx).to_rfc3339_opts(SecondsFormat::Millis, false)))
}
