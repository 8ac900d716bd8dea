use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use xforms_core::{DefinitionKind, NodeDefinition};
use xforms_xpath::ExpressionCache;
use xforms_xpath::parser::ast::Expr;

use crate::error::FormError;
use crate::scheduler::OutputKind;

pub(crate) struct CompiledItemset {
    pub nodeset: Arc<Expr>,
    pub value: Arc<Expr>,
    pub label: Arc<Expr>,
}

#[derive(Default)]
pub(crate) struct CompiledBinds {
    pub expressions: BTreeMap<OutputKind, Arc<Expr>>,
    pub itemset: Option<CompiledItemset>,
}

impl CompiledBinds {
    pub fn outputs(&self) -> impl Iterator<Item = OutputKind> + '_ {
        self.expressions.keys().copied().chain(self.itemset.as_ref().map(|_| OutputKind::Itemset))
    }
}

/// Parsed bind expressions keyed by definition reference. Repeat templates
/// and default instances share a reference and therefore one entry.
#[derive(Default)]
pub(crate) struct BindTable {
    by_reference: HashMap<String, CompiledBinds>,
}

impl BindTable {
    pub fn compile(root: &NodeDefinition, cache: &mut ExpressionCache) -> Result<Self, FormError> {
        let mut table = Self::default();
        table.visit(root, cache)?;
        Ok(table)
    }

    fn visit(&mut self, definition: &NodeDefinition, cache: &mut ExpressionCache) -> Result<(), FormError> {
        // A range shares its reference with its instances and has no outputs of its own.
        if let DefinitionKind::Repeat { template, instances } = &definition.kind {
            for instance in std::iter::once(template).chain(instances) {
                self.visit(instance, cache)?;
            }
            return Ok(());
        }
        if !self.by_reference.contains_key(&definition.reference) {
            let compiled = compile_node(definition, cache)?;
            self.by_reference.insert(definition.reference.clone(), compiled);
        }
        for child in &definition.children {
            self.visit(child, cache)?;
        }
        Ok(())
    }

    pub fn get(&self, reference: &str) -> Option<&CompiledBinds> {
        self.by_reference.get(reference)
    }

    pub fn outputs(&self, reference: &str) -> Vec<OutputKind> {
        self.get(reference).map(|b| b.outputs().collect()).unwrap_or_default()
    }
}

fn compile_node(definition: &NodeDefinition, cache: &mut ExpressionCache) -> Result<CompiledBinds, FormError> {
    let parse = |cache: &mut ExpressionCache, bind: &str, text: &str| {
        cache.get_or_parse(text).map_err(|source| FormError::Syntax {
            reference: definition.reference.clone(),
            bind: bind.to_string(),
            source,
        })
    };
    let mut compiled = CompiledBinds::default();
    for (kind, text) in definition.bind.expressions() {
        compiled.expressions.insert(OutputKind::from(kind), parse(cache, kind.as_str(), text)?);
    }
    if let DefinitionKind::Select { itemset: Some(itemset), .. } = &definition.kind {
        compiled.itemset = Some(CompiledItemset {
            nodeset: parse(cache, "itemset", &itemset.nodeset)?,
            value: parse(cache, "itemset value", &itemset.value)?,
            label: parse(cache, "itemset label", &itemset.label)?,
        });
    }
    Ok(compiled)
}
