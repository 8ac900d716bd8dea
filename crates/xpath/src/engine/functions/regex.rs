use fancy_regex::Regex;

use super::str_arg;
use crate::engine::runtime::{CallCtx, Error, ErrorCode};
use crate::model::NodeHandle;
use crate::xdm::Value;

pub(super) fn regex_fn<N: NodeHandle>(_ctx: &CallCtx<N>, args: &[Value<N>]) -> Result<Value<N>, Error> {
    let pattern = str_arg(args, 1);
    let re = Regex::new(pattern)
        .map_err(|e| Error::new(ErrorCode::FORX0002, format!("invalid pattern '{pattern}': {e}")))?;
    let matched = re
        .is_match(str_arg(args, 0))
        .map_err(|e| Error::failed(format!("regex evaluation failed: {e}")))?;
    Ok(Value::Boolean(matched))
}
