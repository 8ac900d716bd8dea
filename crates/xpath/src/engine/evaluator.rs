//! Tree-walking evaluator for XPath 1.0 expressions over a `DataModel`.
//!
//! Location steps produce nodes in proximity order (reverse axes walk away
//! from the context node) so predicate positions count along the axis; every
//! step result is then re-sorted into document order.

use std::cell::RefCell;

use crate::engine::runtime::{CallCtx, Error, ErrorCode, EvalContext};
use crate::engine::tracker::{DependencyTracker, Evaluation};
use crate::model::{DataModel, NodeHandle, NodeKind, sort_document_order};
use crate::parser::ast::{Axis, BinaryOp, Expr, Literal, NodeTest, PathExpr, PathStart, Step};
use crate::parser::parse_xpath;
use crate::xdm::{AtomicValue, Value, compare};

pub fn evaluate<N: NodeHandle>(expr: &Expr, ctx: &EvalContext<'_, N>) -> Result<Value<N>, Error> {
    Evaluator { ctx, tracker: None }.run(expr)
}

/// Evaluate and report every node the evaluation read.
pub fn evaluate_tracked<N: NodeHandle>(expr: &Expr, ctx: &EvalContext<'_, N>) -> Evaluation<N> {
    let tracker = RefCell::new(DependencyTracker::new());
    let result = Evaluator { ctx, tracker: Some(&tracker) }.run(expr);
    Evaluation { result, dependencies: tracker.into_inner() }
}

/// Parse and evaluate in one go; syntax errors surface as `XPST0003`.
pub fn evaluate_str<N: NodeHandle>(text: &str, ctx: &EvalContext<'_, N>) -> Result<Value<N>, Error> {
    let expr = parse_xpath(text)?;
    evaluate(&expr, ctx)
}

#[derive(Debug, Clone, Copy)]
struct Focus<N> {
    node: N,
    position: usize,
    size: usize,
}

struct Evaluator<'a, N> {
    ctx: &'a EvalContext<'a, N>,
    tracker: Option<&'a RefCell<DependencyTracker<N>>>,
}

impl<'a, N: NodeHandle> Evaluator<'a, N> {
    fn model(&self) -> &'a dyn DataModel<Node = N> {
        self.ctx.model
    }

    fn run(&self, expr: &Expr) -> Result<Value<N>, Error> {
        let focus =
            Focus { node: self.ctx.node, position: self.ctx.position, size: self.ctx.size };
        self.eval(expr, focus)
    }

    fn record(&self, nodes: &[N]) {
        if let Some(tracker) = self.tracker {
            tracker.borrow_mut().record_all(nodes.iter().copied());
        }
    }

    fn eval(&self, expr: &Expr, focus: Focus<N>) -> Result<Value<N>, Error> {
        match expr {
            Expr::Literal(Literal::String(s)) => Ok(Value::String(s.clone())),
            Expr::Literal(Literal::Number(n)) => Ok(Value::Number(*n)),
            Expr::VarRef(name) => self
                .ctx
                .variables
                .get(name)
                .cloned()
                .map(AtomicValue::into_value)
                .ok_or_else(|| {
                    Error::new(ErrorCode::XPST0008, format!("variable ${name} is not defined"))
                }),
            Expr::FunctionCall { name, args } => self.call(name, args, focus),
            Expr::Binary { left, op, right } => self.binary(left, *op, right, focus),
            Expr::Negate(inner) => Ok(Value::Number(-self.number(inner, focus)?)),
            Expr::Union { left, right } => {
                let mut nodes = self.node_set(left, focus)?;
                nodes.extend(self.node_set(right, focus)?);
                sort_document_order(self.model(), &mut nodes);
                Ok(Value::NodeSet(nodes))
            }
            Expr::Filter { base, predicates } => {
                let nodes = self.node_set(base, focus)?;
                Ok(Value::NodeSet(self.apply_predicates(nodes, predicates)?))
            }
            Expr::Path(path) => self.path(path, focus).map(Value::NodeSet),
        }
    }

    fn number(&self, expr: &Expr, focus: Focus<N>) -> Result<f64, Error> {
        Ok(self.eval(expr, focus)?.to_number(self.model()))
    }

    fn node_set(&self, expr: &Expr, focus: Focus<N>) -> Result<Vec<N>, Error> {
        self.eval(expr, focus)?.into_node_set()
    }

    fn binary(
        &self,
        left: &Expr,
        op: BinaryOp,
        right: &Expr,
        focus: Focus<N>,
    ) -> Result<Value<N>, Error> {
        match op {
            BinaryOp::Or => {
                if self.eval(left, focus)?.to_boolean() {
                    return Ok(Value::Boolean(true));
                }
                Ok(Value::Boolean(self.eval(right, focus)?.to_boolean()))
            }
            BinaryOp::And => {
                if !self.eval(left, focus)?.to_boolean() {
                    return Ok(Value::Boolean(false));
                }
                Ok(Value::Boolean(self.eval(right, focus)?.to_boolean()))
            }
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let l = self.eval(left, focus)?;
                let r = self.eval(right, focus)?;
                Ok(Value::Boolean(compare(self.model(), op, &l, &r)))
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let a = self.number(left, focus)?;
                let b = self.number(right, focus)?;
                Ok(Value::Number(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    _ => a % b,
                }))
            }
        }
    }

    fn call(&self, name: &str, args: &[Expr], focus: Focus<N>) -> Result<Value<N>, Error> {
        let entry = self.ctx.functions.resolve(name, args.len())?;
        // only the taken branch of a built-in if() is evaluated
        if entry.builtin
            && name == "if"
            && let [cond, then, otherwise] = args
        {
            let branch = if self.eval(cond, focus)?.to_boolean() { then } else { otherwise };
            return self.eval(branch, focus);
        }
        let values = args.iter().map(|a| self.eval(a, focus)).collect::<Result<Vec<_>, _>>()?;
        let call = CallCtx {
            model: self.model(),
            node: focus.node,
            position: focus.position,
            size: focus.size,
            current: self.ctx.node,
            now: self.ctx.now,
            tracker: self.tracker,
        };
        entry.invoke(&call, values)
    }

    // ===== Paths =====

    fn path(&self, path: &PathExpr, focus: Focus<N>) -> Result<Vec<N>, Error> {
        let mut nodes = match &path.start {
            PathStart::Root => vec![self.model().root(focus.node)],
            PathStart::Relative => vec![focus.node],
            PathStart::Expr(base) => self.node_set(base, focus)?,
        };
        if path.steps.is_empty() {
            self.record(&nodes);
            return Ok(nodes);
        }
        let last = path.steps.len() - 1;
        for (i, step) in path.steps.iter().enumerate() {
            let mut next = Vec::new();
            for &node in &nodes {
                next.extend(self.step(node, step, i == last)?);
            }
            sort_document_order(self.model(), &mut next);
            nodes = next;
        }
        Ok(nodes)
    }

    fn step(&self, node: N, step: &Step, record: bool) -> Result<Vec<N>, Error> {
        let candidates: Vec<N> = self
            .axis(node, step.axis)
            .into_iter()
            .filter(|n| self.matches(*n, step.axis, &step.test))
            .collect();
        if record {
            // Text content is read through the parent, which exists even while it is empty.
            if step.axis == Axis::Child && matches!(step.test, NodeTest::Text | NodeTest::Node) {
                self.record(&[node]);
            }
            self.record(&candidates);
        }
        self.apply_predicates(candidates, &step.predicates)
    }

    fn apply_predicates(&self, nodes: Vec<N>, predicates: &[Expr]) -> Result<Vec<N>, Error> {
        let mut current = nodes;
        for pred in predicates {
            let size = current.len();
            let mut kept = Vec::with_capacity(size);
            for (i, &node) in current.iter().enumerate() {
                let focus = Focus { node, position: i + 1, size };
                let keep = match self.eval(pred, focus)? {
                    Value::Number(k) => k == (i + 1) as f64,
                    other => other.to_boolean(),
                };
                if keep {
                    kept.push(node);
                }
            }
            current = kept;
        }
        Ok(current)
    }

    fn matches(&self, node: N, axis: Axis, test: &NodeTest) -> bool {
        let principal = if axis == Axis::Attribute { NodeKind::Attribute } else { NodeKind::Element };
        let kind = self.model().kind(node);
        match test {
            NodeTest::Any => kind == principal,
            NodeTest::Name(name) => {
                kind == principal && self.model().name(node).as_deref() == Some(name.as_str())
            }
            NodeTest::Prefix(prefix) => {
                kind == principal
                    && self
                        .model()
                        .name(node)
                        .is_some_and(|q| q.split_once(':').is_some_and(|(p, _)| p == prefix))
            }
            NodeTest::Node => true,
            NodeTest::Text => kind == NodeKind::Text,
            NodeTest::Comment => kind == NodeKind::Comment,
        }
    }

    /// Nodes along `axis` in proximity order.
    fn axis(&self, node: N, axis: Axis) -> Vec<N> {
        let m = self.model();
        match axis {
            Axis::Child => m.children(node),
            Axis::Attribute => m.attributes(node),
            Axis::SelfAxis => vec![node],
            Axis::Namespace => Vec::new(),
            Axis::Parent => m.parent(node).into_iter().collect(),
            Axis::Descendant => {
                let mut out = Vec::new();
                self.descendants(node, &mut out);
                out
            }
            Axis::DescendantOrSelf => {
                let mut out = vec![node];
                self.descendants(node, &mut out);
                out
            }
            Axis::Ancestor => self.ancestors(node),
            Axis::AncestorOrSelf => {
                let mut out = vec![node];
                out.extend(self.ancestors(node));
                out
            }
            Axis::FollowingSibling => {
                let (sibs, idx) = self.siblings(node);
                idx.map(|i| sibs[i + 1..].to_vec()).unwrap_or_default()
            }
            Axis::PrecedingSibling => {
                let (sibs, idx) = self.siblings(node);
                idx.map(|i| sibs[..i].iter().rev().copied().collect()).unwrap_or_default()
            }
            Axis::Following => self.following(node),
            Axis::Preceding => self.preceding(node),
        }
    }

    fn descendants(&self, node: N, out: &mut Vec<N>) {
        for child in self.model().children(node) {
            out.push(child);
            self.descendants(child, out);
        }
    }

    fn ancestors(&self, node: N) -> Vec<N> {
        let mut out = Vec::new();
        let mut current = node;
        while let Some(parent) = self.model().parent(current) {
            out.push(parent);
            current = parent;
        }
        out
    }

    /// Children of the parent and the index of `node` among them; attributes have no siblings.
    fn siblings(&self, node: N) -> (Vec<N>, Option<usize>) {
        if self.model().kind(node) == NodeKind::Attribute {
            return (Vec::new(), None);
        }
        let Some(parent) = self.model().parent(node) else {
            return (Vec::new(), None);
        };
        let sibs = self.model().children(parent);
        let idx = sibs.iter().position(|s| *s == node);
        (sibs, idx)
    }

    fn following(&self, node: N) -> Vec<N> {
        let mut out = Vec::new();
        let mut current = node;
        if self.model().kind(node) == NodeKind::Attribute
            && let Some(owner) = self.model().parent(node)
        {
            self.descendants(owner, &mut out);
            current = owner;
        }
        loop {
            let (sibs, idx) = self.siblings(current);
            if let Some(i) = idx {
                for &sib in &sibs[i + 1..] {
                    out.push(sib);
                    self.descendants(sib, &mut out);
                }
            }
            match self.model().parent(current) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        out
    }

    fn preceding(&self, node: N) -> Vec<N> {
        let mut out = Vec::new();
        let mut current = node;
        if self.model().kind(node) == NodeKind::Attribute
            && let Some(owner) = self.model().parent(node)
        {
            current = owner;
        }
        loop {
            let (sibs, idx) = self.siblings(current);
            if let Some(i) = idx {
                for &sib in sibs[..i].iter().rev() {
                    let mut subtree = vec![sib];
                    self.descendants(sib, &mut subtree);
                    out.extend(subtree.into_iter().rev());
                }
            }
            match self.model().parent(current) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        out
    }
}
