//! Trigonometric, exponential and power functions. Arguments arrive coerced
//! to numbers; out-of-domain inputs yield NaN as IEEE 754 does.

use super::num_arg;
use crate::engine::runtime::{CallCtx, Error};
use crate::model::NodeHandle;
use crate::xdm::Value;

type MathResult<N> = Result<Value<N>, Error>;

fn unary<N>(args: &[Value<N>], op: fn(f64) -> f64) -> MathResult<N> {
    Ok(Value::Number(op(num_arg(args, 0))))
}

pub(super) fn pi_fn<N: NodeHandle>(_ctx: &CallCtx<N>, _args: &[Value<N>]) -> MathResult<N> {
    Ok(Value::Number(std::f64::consts::PI))
}

pub(super) fn sqrt_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> MathResult<N> {
    unary(args, f64::sqrt)
}

pub(super) fn pow_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> MathResult<N> {
    Ok(Value::Number(num_arg(args, 0).powf(num_arg(args, 1))))
}

pub(super) fn exp_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> MathResult<N> {
    unary(args, f64::exp)
}

pub(super) fn exp10_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> MathResult<N> {
    unary(args, |n| 10f64.powf(n))
}

/// Natural logarithm.
pub(super) fn log_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> MathResult<N> {
    unary(args, f64::ln)
}

pub(super) fn log10_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> MathResult<N> {
    unary(args, f64::log10)
}

pub(super) fn sin_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> MathResult<N> {
    unary(args, f64::sin)
}

pub(super) fn cos_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> MathResult<N> {
    unary(args, f64::cos)
}

pub(super) fn tan_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> MathResult<N> {
    unary(args, f64::tan)
}

pub(super) fn asin_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> MathResult<N> {
    unary(args, f64::asin)
}

pub(super) fn acos_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> MathResult<N> {
    unary(args, f64::acos)
}

pub(super) fn atan_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> MathResult<N> {
    unary(args, f64::atan)
}

/// `atan2(y, x)`.
pub(super) fn atan2_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> MathResult<N> {
    Ok(Value::Number(num_arg(args, 0).atan2(num_arg(args, 1))))
}
