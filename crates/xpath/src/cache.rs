//! Compiled-expression cache keyed by source text.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::parser::{XPathParseError, ast::Expr, parse_xpath};

pub struct ExpressionCache {
    entries: LruCache<String, Arc<Expr>>,
    hits: u64,
    misses: u64,
}

impl ExpressionCache {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { entries: LruCache::new(capacity), hits: 0, misses: 0 }
    }

    /// Parse `text`, reusing the AST of an earlier identical request.
    pub fn get_or_parse(&mut self, text: &str) -> Result<Arc<Expr>, XPathParseError> {
        if let Some(expr) = self.entries.get(text) {
            self.hits += 1;
            return Ok(Arc::clone(expr));
        }
        self.misses += 1;
        let expr = Arc::new(parse_xpath(text)?);
        tracing::trace!(expression = text, cached = self.entries.len(), "compiled expression");
        self.entries.put(text.to_string(), Arc::clone(&expr));
        Ok(expr)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

impl Default for ExpressionCache {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::ExpressionCache;
    use std::sync::Arc;

    #[test]
    fn identical_text_is_parsed_once() {
        let mut cache = ExpressionCache::new(2);
        let a = cache.get_or_parse("/f/a * 2").unwrap();
        let b = cache.get_or_parse("/f/a * 2").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!((cache.hits(), cache.misses()), (1, 1));
    }

    #[test]
    fn least_recently_used_entry_is_evicted() {
        let mut cache = ExpressionCache::new(2);
        let first = cache.get_or_parse("1").unwrap();
        cache.get_or_parse("2").unwrap();
        cache.get_or_parse("3").unwrap();
        assert_eq!(cache.len(), 2);
        let again = cache.get_or_parse("1").unwrap();
        assert!(!Arc::ptr_eq(&first, &again));
    }
}
