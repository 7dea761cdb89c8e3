//! Function definitions of the form `x=...; y=...; z=...`.
//!
//! The tessellator only needs [`ExpressionEvaluator`]; [`MevalEvaluator`] is
//! the stock implementation backed by `meval`. Statements run in order, so a
//! later statement can read a value assigned by an earlier one. A statement
//! without `=` assigns `z`.

use std::collections::HashMap;

use meval::{Context, ContextProvider, Expr};

use crate::error::EvalError;

/// Evaluates a definition against the current variable bindings.
pub trait ExpressionEvaluator {
    fn bind(&mut self, name: &str, value: f64);
    /// Returns the evaluated `(x, y, z)`.
    fn evaluate(&mut self, expression: &str) -> Result<[f64; 3], EvalError>;
}

struct Statement {
    target: String,
    source: String,
    expr: Expr,
}

#[derive(Default, Clone)]
struct Scope {
    vars: HashMap<String, f64>,
}

impl ContextProvider for Scope {
    fn get_var(&self, name: &str) -> Option<f64> {
        self.vars.get(name).copied()
    }
}

/// `meval`-backed evaluator with a per-definition parse cache. Only
/// definitions that parse are cached.
pub struct MevalEvaluator {
    bindings: Scope,
    builtins: Context<'static>,
    programs: HashMap<String, Vec<Statement>>,
}

impl Default for MevalEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl MevalEvaluator {
    pub fn new() -> Self {
        Self {
            bindings: Scope::default(),
            builtins: build_context(),
            programs: HashMap::new(),
        }
    }

    /// Parses a definition without evaluating it.
    pub fn check(&mut self, expression: &str) -> Result<(), EvalError> {
        cached(&mut self.programs, expression).map(|_| ())
    }

    /// Drops cached parses whose source `keep` rejects.
    pub fn retain<F: FnMut(&str) -> bool>(&mut self, mut keep: F) {
        self.programs.retain(|source, _| keep(source));
    }

    /// Number of cached definitions.
    pub fn cached(&self) -> usize {
        self.programs.len()
    }
}

fn cached<'a>(
    programs: &'a mut HashMap<String, Vec<Statement>>,
    expression: &str,
) -> Result<&'a [Statement], EvalError> {
    if !programs.contains_key(expression) {
        let parsed = parse_program(expression)?;
        programs.insert(expression.to_string(), parsed);
    }
    Ok(programs.get(expression).map(Vec::as_slice).unwrap_or_default())
}

impl ExpressionEvaluator for MevalEvaluator {
    fn bind(&mut self, name: &str, value: f64) {
        self.bindings.vars.insert(name.to_string(), value);
    }

    fn evaluate(&mut self, expression: &str) -> Result<[f64; 3], EvalError> {
        let program = cached(&mut self.programs, expression)?;

        let mut scope = self.bindings.clone();
        for stmt in program {
            let value = stmt
                .expr
                .eval_with_context((&scope, &self.builtins))
                .map_err(|e| EvalError::Evaluate {
                    statement: stmt.source.clone(),
                    reason: e.to_string(),
                })?;
            if !value.is_finite() {
                return Err(EvalError::NonFinite {
                    name: stmt.target.clone(),
                });
            }
            scope.vars.insert(stmt.target.clone(), value);
        }

        let get = |name: &str| scope.vars.get(name).copied().unwrap_or(0.0);
        Ok([get("x"), get("y"), get("z")])
    }
}

fn parse_program(source: &str) -> Result<Vec<Statement>, EvalError> {
    let mut statements = Vec::new();
    for raw in source.split(';') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let (target, body) = match raw.split_once('=') {
            Some((lhs, rhs)) => (lhs.trim(), rhs.trim()),
            None => ("z", raw),
        };
        if !is_identifier(target) {
            return Err(EvalError::Parse {
                statement: raw.to_string(),
                reason: format!("`{target}` is not a variable name"),
            });
        }
        let expr: Expr = body.parse().map_err(|e: meval::Error| EvalError::Parse {
            statement: raw.to_string(),
            reason: e.to_string(),
        })?;
        statements.push(Statement {
            target: target.to_string(),
            source: raw.to_string(),
            expr,
        });
    }
    Ok(statements)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn build_context() -> Context<'static> {
    let mut context = Context::new();
    context.func3("clamp", |v, lo, hi| v.clamp(lo.min(hi), lo.max(hi)));
    context.func3("lerp", |a, b, t| a + (b - a) * t);
    context.func("sign", f64::signum);
    context.func("deg", f64::to_degrees);
    context.func("rad", f64::to_radians);
    context.func2("mod", |a, b| if b == 0.0 { f64::NAN } else { a.rem_euclid(b) });
    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_run_in_order() {
        let mut ev = MevalEvaluator::new();
        ev.bind("u", 0.5);
        ev.bind("v", 0.25);
        let out = ev.evaluate("x = u * 2; y = v; z = x + y").unwrap();
        assert_eq!(out, [1.0, 0.25, 1.25]);
    }

    #[test]
    fn bare_expression_assigns_z() {
        let mut ev = MevalEvaluator::new();
        ev.bind("x", 3.0);
        ev.bind("y", -1.0);
        assert_eq!(ev.evaluate("x*y").unwrap(), [3.0, -1.0, -3.0]);
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let mut ev = MevalEvaluator::new();
        ev.bind("x", 0.0);
        let err = ev.evaluate("z = 1/x").unwrap_err();
        assert!(matches!(err, EvalError::NonFinite { .. }));
    }

    #[test]
    fn bad_syntax_reports_parse_error() {
        let mut ev = MevalEvaluator::new();
        assert!(matches!(ev.evaluate("z = (1 +"), Err(EvalError::Parse { .. })));
        assert!(matches!(ev.check("3x = 1"), Err(EvalError::Parse { .. })));
        assert_eq!(ev.cached(), 0);
    }

    #[test]
    fn cache_keeps_only_retained_definitions() {
        let mut ev = MevalEvaluator::new();
        ev.check("z = x").unwrap();
        ev.check("z = y").unwrap();
        ev.check("z = x").unwrap();
        assert_eq!(ev.cached(), 2);
        ev.retain(|source| source == "z = y");
        assert_eq!(ev.cached(), 1);
        ev.bind("y", 2.0);
        assert_eq!(ev.evaluate("z = y").unwrap()[2], 2.0);
    }

    #[test]
    fn unknown_variable_is_an_evaluation_error() {
        let mut ev = MevalEvaluator::new();
        assert!(matches!(ev.evaluate("z = q"), Err(EvalError::Evaluate { .. })));
    }
}
