use std::collections::HashMap;

use xforms_xpath::AtomicValue;

/// Options for a [`crate::Form`].
#[derive(Clone, Debug)]
pub struct EngineConfig {
    max_evaluations_per_output: usize,
    expression_cache_capacity: usize,
    variables: HashMap<String, AtomicValue>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_evaluations_per_output: 16,
            expression_cache_capacity: 256,
            variables: HashMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluations of one output within a single pass before it is reported as a cycle.
    pub fn with_max_evaluations_per_output(mut self, max: usize) -> Self {
        self.max_evaluations_per_output = max.max(1);
        self
    }

    pub fn with_expression_cache_capacity(mut self, capacity: usize) -> Self {
        self.expression_cache_capacity = capacity;
        self
    }

    /// Bind `$name` in every expression the form evaluates.
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<AtomicValue>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn max_evaluations_per_output(&self) -> usize {
        self.max_evaluations_per_output
    }

    pub fn expression_cache_capacity(&self) -> usize {
        self.expression_cache_capacity
    }

    pub fn variables(&self) -> &HashMap<String, AtomicValue> {
        &self.variables
    }
}
