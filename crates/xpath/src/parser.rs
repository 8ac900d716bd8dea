use pest::Parser;
use pest::iterators::Pair;
use thiserror::Error;

pub mod ast;

use ast::{Axis, BinaryOp, Expr, Literal, NodeTest, PathExpr, PathStart, Step};

#[derive(pest_derive::Parser)]
#[grammar = "xpath.pest"]
pub struct XPathParser;

/// Syntax error raised while parsing expression text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at line {line}, column {column} (found {token}) [{code}]")]
pub struct XPathParseError {
    pub code: &'static str,
    /// Byte offset of the offending token.
    pub position: usize,
    pub line: usize,
    pub column: usize,
    pub token: String,
    pub message: String,
}

impl XPathParseError {
    fn at(input: &str, position: usize, message: impl Into<String>) -> Self {
        let position = position.min(input.len());
        let before = &input[..position];
        let line = before.matches('\n').count() + 1;
        let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
        Self {
            code: "XPST0003",
            position,
            line,
            column,
            token: offending_token(&input[position..]),
            message: message.into(),
        }
    }

    fn from_pest(input: &str, err: &pest::error::Error<Rule>) -> Self {
        let position = match err.location {
            pest::error::InputLocation::Pos(p) => p,
            pest::error::InputLocation::Span((start, _)) => start,
        };
        let message = match &err.variant {
            pest::error::ErrorVariant::ParsingError { positives, .. } if !positives.is_empty() => {
                let expected: Vec<String> =
                    positives.iter().map(|r| format!("{r:?}")).collect();
                format!("unexpected token, expected one of {}", expected.join(", "))
            }
            pest::error::ErrorVariant::CustomError { message } => message.clone(),
            pest::error::ErrorVariant::ParsingError { .. } => "unexpected token".to_string(),
        };
        Self::at(input, position, message)
    }
}

/// Token text at the start of `rest`: a name, a number, a quoted literal or a single symbol.
fn offending_token(rest: &str) -> String {
    let rest = rest.trim_start();
    let Some(first) = rest.chars().next() else {
        return "end of input".to_string();
    };
    let len = if first.is_alphanumeric() || first == '_' {
        rest.find(|c: char| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')))
            .unwrap_or(rest.len())
    } else if first == '\'' || first == '"' {
        rest[1..].find(first).map_or(rest.len(), |i| i + 2)
    } else {
        first.len_utf8()
    };
    format!("'{}'", &rest[..len])
}

/// Parse expression text into an AST.
pub fn parse_xpath(input: &str) -> Result<Expr, XPathParseError> {
    XPathParser::parse_to_ast(input)
}

impl XPathParser {
    /// Build the AST for evaluation from the XPath input.
    pub fn parse_to_ast(input: &str) -> Result<Expr, XPathParseError> {
        let mut pairs = Self::parse(Rule::xpath, input)
            .map_err(|e| XPathParseError::from_pest(input, &e))?;
        let root = pairs
            .next()
            .ok_or_else(|| XPathParseError::at(input, 0, "empty expression"))?;
        let expr = root
            .into_inner()
            .find(|p| p.as_rule() == Rule::expr)
            .ok_or_else(|| XPathParseError::at(input, 0, "empty expression"))?;
        Self::build_expr(input, expr)
    }

    fn build_expr(input: &str, pair: Pair<'_, Rule>) -> Result<Expr, XPathParseError> {
        let start = pair.as_span().start();
        match pair.as_rule() {
            Rule::expr | Rule::path_expr | Rule::parenthesized_expr | Rule::primary_expr => {
                let inner = Self::only_child(input, pair)?;
                Self::build_expr(input, inner)
            }
            Rule::or_expr
            | Rule::and_expr
            | Rule::equality_expr
            | Rule::relational_expr
            | Rule::additive_expr
            | Rule::multiplicative_expr => Self::fold_binary(input, pair),
            Rule::unary_expr => {
                let mut negations = 0usize;
                let mut operand = None;
                for p in pair.into_inner() {
                    match p.as_rule() {
                        Rule::OP_MINUS => negations += 1,
                        _ => operand = Some(Self::build_expr(input, p)?),
                    }
                }
                let mut expr = operand
                    .ok_or_else(|| XPathParseError::at(input, start, "missing operand"))?;
                for _ in 0..negations {
                    expr = Expr::Negate(Box::new(expr));
                }
                Ok(expr)
            }
            Rule::union_expr => {
                let mut inner = pair.into_inner().filter(|p| p.as_rule() != Rule::OP_PIPE);
                let first = inner
                    .next()
                    .ok_or_else(|| XPathParseError::at(input, start, "missing operand"))?;
                let mut expr = Self::build_expr(input, first)?;
                for next in inner {
                    expr = Expr::Union {
                        left: Box::new(expr),
                        right: Box::new(Self::build_expr(input, next)?),
                    };
                }
                Ok(expr)
            }
            Rule::absolute_path => Self::build_absolute_path(input, pair),
            Rule::relative_path => {
                let mut steps = Vec::new();
                Self::collect_steps(input, pair, &mut steps)?;
                Ok(Expr::Path(PathExpr { start: PathStart::Relative, steps }))
            }
            Rule::filter_path => Self::build_filter_path(input, pair),
            Rule::string_literal => {
                let text = pair.into_inner().next().map(|p| p.as_str().to_string()).unwrap_or_default();
                Ok(Expr::Literal(Literal::String(text)))
            }
            Rule::number_literal => {
                let text = pair.as_str();
                let value = text.parse::<f64>().map_err(|_| {
                    XPathParseError::at(input, start, format!("invalid number literal '{text}'"))
                })?;
                Ok(Expr::Literal(Literal::Number(value)))
            }
            Rule::var_ref => {
                let name = pair
                    .into_inner()
                    .next()
                    .ok_or_else(|| XPathParseError::at(input, start, "missing variable name"))?;
                Ok(Expr::VarRef(name.as_str().to_string()))
            }
            Rule::function_call => {
                let mut inner = pair.into_inner();
                let name = inner
                    .next()
                    .ok_or_else(|| XPathParseError::at(input, start, "missing function name"))?;
                let args =
                    inner.map(|a| Self::build_expr(input, a)).collect::<Result<Vec<_>, _>>()?;
                Ok(Expr::FunctionCall { name: name.as_str().to_string(), args })
            }
            other => Err(XPathParseError::at(
                input,
                start,
                format!("unsupported expression rule {other:?}"),
            )),
        }
    }

    fn only_child<'i>(input: &str, pair: Pair<'i, Rule>) -> Result<Pair<'i, Rule>, XPathParseError> {
        let start = pair.as_span().start();
        pair.into_inner()
            .next()
            .ok_or_else(|| XPathParseError::at(input, start, "empty expression"))
    }

    fn fold_binary(input: &str, pair: Pair<'_, Rule>) -> Result<Expr, XPathParseError> {
        let start = pair.as_span().start();
        let mut inner = pair.into_inner();
        let first = inner
            .next()
            .ok_or_else(|| XPathParseError::at(input, start, "missing operand"))?;
        let mut expr = Self::build_expr(input, first)?;
        while let Some(op_pair) = inner.next() {
            let op_start = op_pair.as_span().start();
            let op = Self::binary_op(&op_pair)
                .ok_or_else(|| XPathParseError::at(input, op_start, "unknown operator"))?;
            let right = inner
                .next()
                .ok_or_else(|| XPathParseError::at(input, op_start, "missing right operand"))?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(Self::build_expr(input, right)?),
            };
        }
        Ok(expr)
    }

    /// Operator pairs are either the token itself (`K_OR`) or a wrapper (`additive_op`).
    fn binary_op(pair: &Pair<'_, Rule>) -> Option<BinaryOp> {
        let token = match pair.as_rule() {
            Rule::equality_op | Rule::relational_op | Rule::additive_op | Rule::multiplicative_op => {
                pair.clone().into_inner().next()?.as_rule()
            }
            rule => rule,
        };
        Some(match token {
            Rule::K_OR => BinaryOp::Or,
            Rule::K_AND => BinaryOp::And,
            Rule::OP_EQ => BinaryOp::Eq,
            Rule::OP_NE => BinaryOp::Ne,
            Rule::OP_LT => BinaryOp::Lt,
            Rule::OP_LTE => BinaryOp::Le,
            Rule::OP_GT => BinaryOp::Gt,
            Rule::OP_GTE => BinaryOp::Ge,
            Rule::OP_PLUS => BinaryOp::Add,
            Rule::OP_MINUS => BinaryOp::Sub,
            Rule::OP_STAR => BinaryOp::Mul,
            Rule::K_DIV => BinaryOp::Div,
            Rule::K_MOD => BinaryOp::Mod,
            _ => return None,
        })
    }

    fn build_absolute_path(input: &str, pair: Pair<'_, Rule>) -> Result<Expr, XPathParseError> {
        let mut steps = Vec::new();
        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::OP_DSLASH => steps.push(Step::new(Axis::DescendantOrSelf, NodeTest::Node)),
                Rule::OP_SLASH => {}
                Rule::relative_path => Self::collect_steps(input, p, &mut steps)?,
                _ => {}
            }
        }
        Ok(Expr::Path(PathExpr { start: PathStart::Root, steps }))
    }

    fn build_filter_path(input: &str, pair: Pair<'_, Rule>) -> Result<Expr, XPathParseError> {
        let start = pair.as_span().start();
        let mut inner = pair.into_inner();
        let filter = inner
            .next()
            .ok_or_else(|| XPathParseError::at(input, start, "missing primary expression"))?;

        let mut parts = filter.into_inner();
        let primary = parts
            .next()
            .ok_or_else(|| XPathParseError::at(input, start, "missing primary expression"))?;
        let base = Self::build_expr(input, primary)?;
        let predicates = parts
            .map(|p| Self::build_predicate(input, p))
            .collect::<Result<Vec<_>, _>>()?;
        let base = if predicates.is_empty() {
            base
        } else {
            Expr::Filter { base: Box::new(base), predicates }
        };

        let mut steps = Vec::new();
        for p in inner {
            match p.as_rule() {
                Rule::path_separator => {
                    if Self::is_descendant_separator(&p) {
                        steps.push(Step::new(Axis::DescendantOrSelf, NodeTest::Node));
                    }
                }
                Rule::relative_path => Self::collect_steps(input, p, &mut steps)?,
                _ => {}
            }
        }
        if steps.is_empty() {
            return Ok(base);
        }
        Ok(Expr::Path(PathExpr { start: PathStart::Expr(Box::new(base)), steps }))
    }

    fn is_descendant_separator(pair: &Pair<'_, Rule>) -> bool {
        pair.clone().into_inner().next().is_some_and(|t| t.as_rule() == Rule::OP_DSLASH)
    }

    fn collect_steps(
        input: &str,
        pair: Pair<'_, Rule>,
        steps: &mut Vec<Step>,
    ) -> Result<(), XPathParseError> {
        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::path_separator => {
                    if Self::is_descendant_separator(&p) {
                        steps.push(Step::new(Axis::DescendantOrSelf, NodeTest::Node));
                    }
                }
                Rule::step => steps.push(Self::build_step(input, p)?),
                _ => {}
            }
        }
        Ok(())
    }

    fn build_step(input: &str, pair: Pair<'_, Rule>) -> Result<Step, XPathParseError> {
        let start = pair.as_span().start();
        let mut axis = Axis::Child;
        let mut test = None;
        let mut predicates = Vec::new();
        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::abbrev_step => {
                    let token = p.into_inner().next().map(|t| t.as_rule());
                    return Ok(match token {
                        Some(Rule::OP_DOTDOT) => Step::new(Axis::Parent, NodeTest::Node),
                        _ => Step::new(Axis::SelfAxis, NodeTest::Node),
                    });
                }
                Rule::axis_spec => {
                    let mut spec = p.into_inner();
                    match spec.next() {
                        Some(t) if t.as_rule() == Rule::OP_AT => axis = Axis::Attribute,
                        Some(t) => {
                            axis = Axis::from_name(t.as_str()).ok_or_else(|| {
                                XPathParseError::at(
                                    input,
                                    t.as_span().start(),
                                    format!("unknown axis '{}'", t.as_str()),
                                )
                            })?;
                        }
                        None => {}
                    }
                }
                Rule::node_test => test = Some(Self::build_node_test(input, p)?),
                Rule::predicate => predicates.push(Self::build_predicate(input, p)?),
                _ => {}
            }
        }
        let test = test.ok_or_else(|| XPathParseError::at(input, start, "missing node test"))?;
        Ok(Step { axis, test, predicates })
    }

    fn build_node_test(input: &str, pair: Pair<'_, Rule>) -> Result<NodeTest, XPathParseError> {
        let inner = Self::only_child(input, pair)?;
        match inner.as_rule() {
            Rule::kind_test => {
                let name = inner.into_inner().next().map(|p| p.as_str()).unwrap_or("node");
                Ok(match name {
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    _ => NodeTest::Node,
                })
            }
            _ => {
                let text = inner.as_str();
                Ok(if text == "*" {
                    NodeTest::Any
                } else if let Some(prefix) = text.strip_suffix(":*") {
                    NodeTest::Prefix(prefix.to_string())
                } else {
                    NodeTest::Name(text.to_string())
                })
            }
        }
    }

    fn build_predicate(input: &str, pair: Pair<'_, Rule>) -> Result<Expr, XPathParseError> {
        let inner = Self::only_child(input, pair)?;
        Self::build_expr(input, inner)
    }
}
