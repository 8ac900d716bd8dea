use core::fmt;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use thiserror::Error;

use crate::engine::tracker::DependencyTracker;
use crate::model::{DataModel, NodeHandle};
use crate::xdm::{AtomicValue, Value, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    XPST0003, // syntax error
    XPST0008, // unknown variable
    XPST0017, // unknown function or wrong arity
    XPTY0004, // type error
    FOER0000, // failure raised by a function implementation
    FORX0002, // invalid regular expression
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        use ErrorCode::*;
        match self {
            XPST0003 => "XPST0003",
            XPST0008 => "XPST0008",
            XPST0017 => "XPST0017",
            XPTY0004 => "XPTY0004",
            FOER0000 => "FOER0000",
            FORX0002 => "FORX0002",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evaluation error. Isolated to the expression that raised it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({code})")]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    /// Generic failure raised from inside a function implementation.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::FOER0000, message)
    }
}

impl From<crate::parser::XPathParseError> for Error {
    fn from(e: crate::parser::XPathParseError) -> Self {
        Self::new(ErrorCode::XPST0003, e.to_string())
    }
}

/// Everything one evaluation needs from its host.
///
/// The context node doubles as the `current()` node.
pub struct EvalContext<'a, N> {
    pub model: &'a dyn DataModel<Node = N>,
    pub node: N,
    pub position: usize,
    pub size: usize,
    pub variables: Arc<HashMap<String, AtomicValue>>,
    pub functions: Arc<FunctionRegistry<N>>,
    pub now: Option<DateTime<FixedOffset>>,
}

pub struct EvalContextBuilder<'a, N> {
    ctx: EvalContext<'a, N>,
}

impl<'a, N: NodeHandle> EvalContextBuilder<'a, N> {
    pub fn new(model: &'a dyn DataModel<Node = N>, node: N) -> Self {
        Self {
            ctx: EvalContext {
                model,
                node,
                position: 1,
                size: 1,
                variables: Arc::new(HashMap::new()),
                functions: Arc::new(FunctionRegistry::with_builtins()),
                now: None,
            },
        }
    }

    pub fn with_position(mut self, position: usize, size: usize) -> Self {
        self.ctx.position = position;
        self.ctx.size = size;
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<AtomicValue>) -> Self {
        Arc::make_mut(&mut self.ctx.variables).insert(name.into(), value.into());
        self
    }

    pub fn with_variables(mut self, variables: Arc<HashMap<String, AtomicValue>>) -> Self {
        self.ctx.variables = variables;
        self
    }

    pub fn with_functions(mut self, functions: Arc<FunctionRegistry<N>>) -> Self {
        self.ctx.functions = functions;
        self
    }

    /// Fixed instant for `today()`/`now()`.
    pub fn with_now(mut self, now: DateTime<FixedOffset>) -> Self {
        self.ctx.now = Some(now);
        self
    }

    pub fn build(self) -> EvalContext<'a, N> {
        self.ctx
    }
}

/// View handed to function implementations.
pub struct CallCtx<'a, N> {
    pub model: &'a dyn DataModel<Node = N>,
    pub node: N,
    pub position: usize,
    pub size: usize,
    pub current: N,
    pub now: Option<DateTime<FixedOffset>>,
    pub(crate) tracker: Option<&'a RefCell<DependencyTracker<N>>>,
}

impl<N: NodeHandle> CallCtx<'_, N> {
    /// String value of `node`, recorded as a dependency of the running evaluation.
    pub fn string_value(&self, node: N) -> String {
        self.record(node);
        self.model.string_value(node)
    }

    pub fn record(&self, node: N) {
        if let Some(tracker) = self.tracker {
            tracker.borrow_mut().record(node);
        }
    }

    pub fn value_to_string(&self, value: &Value<N>) -> String {
        match value {
            Value::NodeSet(nodes) => nodes.first().map(|n| self.string_value(*n)).unwrap_or_default(),
            other => other.to_string_value(self.model),
        }
    }

    pub fn value_to_number(&self, value: &Value<N>) -> f64 {
        match value {
            Value::NodeSet(_) => crate::xdm::string_to_number(&self.value_to_string(value)),
            other => other.to_number(self.model),
        }
    }
}

pub type FunctionImpl<N> =
    Arc<dyn Fn(&CallCtx<N>, &[Value<N>]) -> Result<Value<N>, Error> + Send + Sync>;

pub struct FunctionEntry<N> {
    pub min_arity: usize,
    /// `None` for variadic functions.
    pub max_arity: Option<usize>,
    /// Declared parameter types; the last one repeats for variadic functions.
    /// Untyped parameters receive the argument as evaluated.
    pub params: Vec<Option<ValueType>>,
    pub returns: Option<ValueType>,
    pub builtin: bool,
    func: FunctionImpl<N>,
}

impl<N> Clone for FunctionEntry<N> {
    fn clone(&self) -> Self {
        Self {
            min_arity: self.min_arity,
            max_arity: self.max_arity,
            params: self.params.clone(),
            returns: self.returns,
            builtin: self.builtin,
            func: Arc::clone(&self.func),
        }
    }
}

impl<N: NodeHandle> FunctionEntry<N> {
    fn accepts(&self, argc: usize) -> bool {
        argc >= self.min_arity && self.max_arity.is_none_or(|m| argc <= m)
    }

    fn param_type(&self, index: usize) -> Option<ValueType> {
        self.params.get(index).or_else(|| self.params.last()).copied().flatten()
    }

    /// Coerce arguments, run the implementation and coerce its result.
    pub fn invoke(&self, ctx: &CallCtx<N>, args: Vec<Value<N>>) -> Result<Value<N>, Error> {
        let args = args
            .into_iter()
            .enumerate()
            .map(|(i, v)| match self.param_type(i) {
                Some(ValueType::String) => Ok(Value::String(ctx.value_to_string(&v))),
                Some(ValueType::Number) => Ok(Value::Number(ctx.value_to_number(&v))),
                Some(ty) => v.coerce(ty, ctx.model),
                None => Ok(v),
            })
            .collect::<Result<Vec<_>, Error>>()?;
        let result = (self.func)(ctx, &args)?;
        match self.returns {
            Some(ty) => result.coerce(ty, ctx.model),
            None => Ok(result),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    Unknown(String),
    WrongArity { name: String, argc: usize },
}

impl From<ResolveError> for Error {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::Unknown(name) => {
                Error::new(ErrorCode::XPST0017, format!("function {name}() is not defined"))
            }
            ResolveError::WrongArity { name, argc } => Error::new(
                ErrorCode::XPST0017,
                format!("function {name}() cannot be called with {}", humanize_argc(argc)),
            ),
        }
    }
}

fn humanize_argc(argc: usize) -> String {
    match argc {
        0 => "no arguments".to_string(),
        1 => "one argument".to_string(),
        2 => "two arguments".to_string(),
        3 => "three arguments".to_string(),
        n => format!("{n} arguments"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("Unsupported arg type(s): {}", quote_list(.0))]
    UnsupportedArgTypes(Vec<String>),
    #[error("Unsupported return type: '{0}'")]
    UnsupportedReturnType(String),
    #[error("There is already a function with the name: '{0}'")]
    Duplicate(String),
}

fn quote_list(items: &[String]) -> String {
    items.iter().map(|t| format!("'{t}'")).collect::<Vec<_>>().join(", ")
}

/// Functions callable from expressions, keyed by name.
pub struct FunctionRegistry<N> {
    fns: HashMap<String, FunctionEntry<N>>,
}

impl<N> Default for FunctionRegistry<N> {
    fn default() -> Self {
        Self { fns: HashMap::new() }
    }
}

impl<N> Clone for FunctionRegistry<N> {
    fn clone(&self) -> Self {
        Self { fns: self.fns.clone() }
    }
}

impl<N: NodeHandle> FunctionRegistry<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        crate::engine::functions::register_default_functions(&mut reg);
        reg
    }

    pub(crate) fn register_builtin<F>(
        &mut self,
        name: &str,
        min_arity: usize,
        max_arity: Option<usize>,
        params: Vec<Option<ValueType>>,
        func: F,
    ) where
        F: Fn(&CallCtx<N>, &[Value<N>]) -> Result<Value<N>, Error> + Send + Sync + 'static,
    {
        self.fns.insert(
            name.to_string(),
            FunctionEntry {
                min_arity,
                max_arity,
                params,
                returns: None,
                builtin: true,
                func: Arc::new(func),
            },
        );
    }

    /// Register a host function using textual type tags
    /// (`string`, `number`, `boolean`, `node-set`).
    pub fn register<F>(
        &mut self,
        name: &str,
        arg_types: &[&str],
        return_type: &str,
        func: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(&CallCtx<N>, &[Value<N>]) -> Result<Value<N>, Error> + Send + Sync + 'static,
    {
        let mut params = Vec::with_capacity(arg_types.len());
        let mut unsupported = Vec::new();
        for tag in arg_types {
            match tag.parse::<ValueType>() {
                Ok(ty) => params.push(ty),
                Err(e) => unsupported.push(e.0),
            }
        }
        if !unsupported.is_empty() {
            return Err(RegistrationError::UnsupportedArgTypes(unsupported));
        }
        let returns = return_type
            .parse::<ValueType>()
            .map_err(|e| RegistrationError::UnsupportedReturnType(e.0))?;
        self.register_typed(name, params, returns, func)
    }

    pub fn register_typed<F>(
        &mut self,
        name: &str,
        arg_types: Vec<ValueType>,
        return_type: ValueType,
        func: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(&CallCtx<N>, &[Value<N>]) -> Result<Value<N>, Error> + Send + Sync + 'static,
    {
        if self.fns.contains_key(name) {
            return Err(RegistrationError::Duplicate(name.to_string()));
        }
        let arity = arg_types.len();
        self.fns.insert(
            name.to_string(),
            FunctionEntry {
                min_arity: arity,
                max_arity: Some(arity),
                params: arg_types.into_iter().map(Some).collect(),
                returns: Some(return_type),
                builtin: false,
                func: Arc::new(func),
            },
        );
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fns.contains_key(name)
    }

    pub fn resolve(&self, name: &str, argc: usize) -> Result<&FunctionEntry<N>, ResolveError> {
        let entry = self.fns.get(name).ok_or_else(|| ResolveError::Unknown(name.to_string()))?;
        if !entry.accepts(argc) {
            return Err(ResolveError::WrongArity { name: name.to_string(), argc });
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn humanized_arity_messages() {
        let e: Error = ResolveError::WrongArity { name: "not".into(), argc: 0 }.into();
        assert_eq!(e.message, "function not() cannot be called with no arguments");
        let e: Error = ResolveError::WrongArity { name: "f".into(), argc: 1 }.into();
        assert_eq!(e.message, "function f() cannot be called with one argument");
        assert_eq!(e.code, ErrorCode::XPST0017);
    }

    #[test]
    fn registration_messages() {
        let e = RegistrationError::UnsupportedArgTypes(vec!["dog".into()]);
        assert_eq!(e.to_string(), "Unsupported arg type(s): 'dog'");
        let e = RegistrationError::UnsupportedReturnType("fish".into());
        assert_eq!(e.to_string(), "Unsupported return type: 'fish'");
        let e = RegistrationError::Duplicate("f".into());
        assert_eq!(e.to_string(), "There is already a function with the name: 'f'");
    }
}
