//! XPath 1.0 value model: the four value types and their conversions.

use core::fmt;
use core::str::FromStr;

use crate::engine::runtime::{Error, ErrorCode};
use crate::model::{DataModel, NodeHandle};
use crate::parser::ast::BinaryOp;

#[derive(Debug, Clone, PartialEq)]
pub enum Value<N> {
    String(String),
    Number(f64),
    Boolean(bool),
    /// Nodes in document order without duplicates.
    NodeSet(Vec<N>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    String,
    Number,
    Boolean,
    NodeSet,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::NodeSet => "node-set",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedType(pub String);

impl FromStr for ValueType {
    type Err = UnsupportedType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(ValueType::String),
            "number" => Ok(ValueType::Number),
            "boolean" => Ok(ValueType::Boolean),
            "node-set" => Ok(ValueType::NodeSet),
            other => Err(UnsupportedType(other.to_string())),
        }
    }
}

/// A value that does not reference any node; used for variable bindings.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomicValue {
    String(String),
    Number(f64),
    Boolean(bool),
}

impl AtomicValue {
    pub fn to_boolean(&self) -> bool {
        match self {
            AtomicValue::String(s) => !s.is_empty(),
            AtomicValue::Number(n) => number_to_boolean(*n),
            AtomicValue::Boolean(b) => *b,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            AtomicValue::String(s) => string_to_number(s),
            AtomicValue::Number(n) => *n,
            AtomicValue::Boolean(b) => f64::from(u8::from(*b)),
        }
    }

    pub fn to_string_value(&self) -> String {
        match self {
            AtomicValue::String(s) => s.clone(),
            AtomicValue::Number(n) => format_number(*n),
            AtomicValue::Boolean(b) => b.to_string(),
        }
    }

    pub fn into_value<N>(self) -> Value<N> {
        match self {
            AtomicValue::String(s) => Value::String(s),
            AtomicValue::Number(n) => Value::Number(n),
            AtomicValue::Boolean(b) => Value::Boolean(b),
        }
    }
}

impl From<&str> for AtomicValue {
    fn from(s: &str) -> Self {
        AtomicValue::String(s.to_string())
    }
}

impl From<String> for AtomicValue {
    fn from(s: String) -> Self {
        AtomicValue::String(s)
    }
}

impl From<f64> for AtomicValue {
    fn from(n: f64) -> Self {
        AtomicValue::Number(n)
    }
}

impl From<bool> for AtomicValue {
    fn from(b: bool) -> Self {
        AtomicValue::Boolean(b)
    }
}

/// Render a number the way XPath 1.0 `string()` does.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() };
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        // exact: integral and well inside the i64 range
        return format!("{}", n as i64);
    }
    format!("{n}")
}

/// Locale-invariant decimal parse; anything outside `-?digits(.digits?)?|-?.digits` is NaN.
pub fn string_to_number(s: &str) -> f64 {
    let t = s.trim_matches([' ', '\t', '\r', '\n']);
    let digits = t.strip_prefix('-').unwrap_or(t);
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };
    let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    let valid = all_digits(int_part)
        && frac_part.is_none_or(all_digits)
        && (!int_part.is_empty() || frac_part.is_some_and(|f| !f.is_empty()));
    if !valid {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

pub fn number_to_boolean(n: f64) -> bool {
    n != 0.0 && !n.is_nan()
}

impl<N: NodeHandle> Value<N> {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::String(_) => ValueType::String,
            Value::Number(_) => ValueType::Number,
            Value::Boolean(_) => ValueType::Boolean,
            Value::NodeSet(_) => ValueType::NodeSet,
        }
    }

    pub fn to_boolean(&self) -> bool {
        match self {
            Value::String(s) => !s.is_empty(),
            Value::Number(n) => number_to_boolean(*n),
            Value::Boolean(b) => *b,
            Value::NodeSet(nodes) => !nodes.is_empty(),
        }
    }

    pub fn to_string_value(&self, model: &dyn DataModel<Node = N>) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Number(n) => format_number(*n),
            Value::Boolean(b) => b.to_string(),
            Value::NodeSet(nodes) => {
                nodes.first().map(|n| model.string_value(*n)).unwrap_or_default()
            }
        }
    }

    pub fn to_number(&self, model: &dyn DataModel<Node = N>) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Boolean(b) => f64::from(u8::from(*b)),
            other => string_to_number(&other.to_string_value(model)),
        }
    }

    pub fn into_node_set(self) -> Result<Vec<N>, Error> {
        match self {
            Value::NodeSet(nodes) => Ok(nodes),
            other => Err(Error::new(
                ErrorCode::XPTY0004,
                format!("cannot convert {} to a node-set", other.value_type()),
            )),
        }
    }

    /// Convert to the requested type; only node-sets convert to node-sets.
    pub fn coerce(self, ty: ValueType, model: &dyn DataModel<Node = N>) -> Result<Value<N>, Error> {
        Ok(match ty {
            ValueType::String => Value::String(self.to_string_value(model)),
            ValueType::Number => Value::Number(self.to_number(model)),
            ValueType::Boolean => Value::Boolean(self.to_boolean()),
            ValueType::NodeSet => Value::NodeSet(self.into_node_set()?),
        })
    }

    /// Drop node identity, keeping the string value of node-sets.
    pub fn to_atomic(&self, model: &dyn DataModel<Node = N>) -> AtomicValue {
        match self {
            Value::String(s) => AtomicValue::String(s.clone()),
            Value::Number(n) => AtomicValue::Number(*n),
            Value::Boolean(b) => AtomicValue::Boolean(*b),
            Value::NodeSet(_) => AtomicValue::String(self.to_string_value(model)),
        }
    }
}

impl<N> From<AtomicValue> for Value<N> {
    fn from(v: AtomicValue) -> Self {
        v.into_value()
    }
}

fn mirror(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::Lt => BinaryOp::Gt,
        BinaryOp::Le => BinaryOp::Ge,
        BinaryOp::Gt => BinaryOp::Lt,
        BinaryOp::Ge => BinaryOp::Le,
        other => other,
    }
}

fn compare_atomic(op: BinaryOp, left: &AtomicValue, right: &AtomicValue) -> bool {
    use AtomicValue as A;
    match op {
        BinaryOp::Eq | BinaryOp::Ne => {
            let equal = match (left, right) {
                (A::Boolean(_), _) | (_, A::Boolean(_)) => left.to_boolean() == right.to_boolean(),
                (A::Number(_), _) | (_, A::Number(_)) => left.to_number() == right.to_number(),
                _ => left.to_string_value() == right.to_string_value(),
            };
            if op == BinaryOp::Eq { equal } else { !equal }
        }
        _ => {
            let (a, b) = (left.to_number(), right.to_number());
            match op {
                BinaryOp::Lt => a < b,
                BinaryOp::Le => a <= b,
                BinaryOp::Gt => a > b,
                BinaryOp::Ge => a >= b,
                _ => false,
            }
        }
    }
}

/// XPath 1.0 comparison of two values with `=`, `!=`, `<`, `<=`, `>`, `>=`.
///
/// Node-sets compare existentially over their nodes' string values; a boolean
/// operand compares against the node-set's emptiness.
pub fn compare<N: NodeHandle>(
    model: &dyn DataModel<Node = N>,
    op: BinaryOp,
    left: &Value<N>,
    right: &Value<N>,
) -> bool {
    match (left, right) {
        (Value::NodeSet(a), Value::NodeSet(b)) => {
            let rights: Vec<AtomicValue> =
                b.iter().map(|n| AtomicValue::String(model.string_value(*n))).collect();
            a.iter().any(|n| {
                let l = AtomicValue::String(model.string_value(*n));
                rights.iter().any(|r| compare_atomic(op, &l, r))
            })
        }
        (Value::NodeSet(a), other) => compare_node_set(model, op, a, &other.to_atomic(model)),
        (other, Value::NodeSet(b)) => {
            compare_node_set(model, mirror(op), b, &other.to_atomic(model))
        }
        (l, r) => compare_atomic(op, &l.to_atomic(model), &r.to_atomic(model)),
    }
}

fn compare_node_set<N: NodeHandle>(
    model: &dyn DataModel<Node = N>,
    op: BinaryOp,
    nodes: &[N],
    other: &AtomicValue,
) -> bool {
    if let AtomicValue::Boolean(_) = other {
        return compare_atomic(op, &AtomicValue::Boolean(!nodes.is_empty()), other);
    }
    nodes.iter().any(|n| compare_atomic(op, &AtomicValue::String(model.string_value(*n)), other))
}
