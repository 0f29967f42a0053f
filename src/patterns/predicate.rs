//! Pluggable predicate evaluation for `branch` steps and pattern
//! `trigger_conditions` (spec §4.5, §9 Open Question).
//!
//! The spec deliberately does not define a predicate DSL syntax — only that
//! one must be pluggable. This module ships exactly one concrete grammar
//! (documented below) behind the `PredicateEvaluator` trait; callers that
//! need a richer language implement their own evaluator against the same
//! trait rather than extending this one's parser.
//!
//! ## Supported grammar
//!
//! ```text
//! predicate   ::= or_expr
//! or_expr     ::= and_expr ( "||" and_expr )*
//! and_expr    ::= comparison ( "&&" comparison )*
//! comparison  ::= field op literal | field
//! op          ::= ">" | ">=" | "<" | "<=" | "==" | "!="
//! field       ::= identifier (dotted path into the evaluation context)
//! literal     ::= number | "true" | "false" | quoted string
//! ```
//!
//! `&&` binds tighter than `||`; there is no parenthesization. A bare `field`
//! with no operator (e.g. `explicit_request`) evaluates truthiness: present
//! and non-zero/non-false/non-empty.

use serde_json::Value;
use std::collections::HashMap;

pub trait PredicateEvaluator: Send + Sync {
    fn evaluate(&self, predicate: &str, context: &HashMap<String, Value>) -> bool;
}

#[derive(Debug, Default)]
pub struct DefaultPredicateEvaluator;

impl PredicateEvaluator for DefaultPredicateEvaluator {
    fn evaluate(&self, predicate: &str, context: &HashMap<String, Value>) -> bool {
        eval_or(predicate.trim(), context)
    }
}

fn eval_or(expr: &str, ctx: &HashMap<String, Value>) -> bool {
    expr.split("||").any(|clause| eval_and(clause.trim(), ctx))
}

fn eval_and(expr: &str, ctx: &HashMap<String, Value>) -> bool {
    expr.split("&&").all(|clause| eval_comparison(clause.trim(), ctx))
}

const OPS: &[&str] = &[">=", "<=", "==", "!=", ">", "<"];

fn eval_comparison(clause: &str, ctx: &HashMap<String, Value>) -> bool {
    for op in OPS {
        if let Some(idx) = clause.find(op) {
            let field = clause[..idx].trim();
            let literal = clause[idx + op.len()..].trim();
            return compare(field, op, literal, ctx);
        }
    }
    // Bare field: truthiness check.
    truthy(lookup(clause, ctx))
}

fn lookup<'a>(field: &str, ctx: &'a HashMap<String, Value>) -> Option<&'a Value> {
    let mut parts = field.split('.');
    let first = parts.next()?;
    let mut current = ctx.get(first)?;
    for part in parts {
        current = current.get(part)?;
    }
    Some(current)
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Null) => false,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

fn compare(field: &str, op: &str, literal: &str, ctx: &HashMap<String, Value>) -> bool {
    let actual = match lookup(field, ctx) {
        Some(v) => v,
        None => return false,
    };
    let literal = parse_literal(literal);

    match (actual.as_f64(), literal.as_f64()) {
        (Some(a), Some(b)) => numeric_compare(a, op, b),
        _ => {
            let a = actual.as_str().map(|s| s.to_string()).unwrap_or_else(|| actual.to_string());
            let b = literal.as_str().map(|s| s.to_string()).unwrap_or_else(|| literal.to_string());
            match op {
                "==" => a == b,
                "!=" => a != b,
                _ => false,
            }
        }
    }
}

fn numeric_compare(a: f64, op: &str, b: f64) -> bool {
    match op {
        ">" => a > b,
        ">=" => a >= b,
        "<" => a < b,
        "<=" => a <= b,
        "==" => a == b,
        "!=" => a != b,
        _ => false,
    }
}

fn parse_literal(raw: &str) -> Value {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<f64>() {
        return serde_json::json!(n);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.trim_matches('"').to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn numeric_greater_than() {
        let eval = DefaultPredicateEvaluator;
        let c = ctx(&[("clarification_depth", Value::from(4))]);
        assert!(eval.evaluate("clarification_depth > 3", &c));
        assert!(!eval.evaluate("clarification_depth > 10", &c));
    }

    #[test]
    fn and_and_or_precedence() {
        let eval = DefaultPredicateEvaluator;
        let c = ctx(&[
            ("clarification_depth", Value::from(4)),
            ("validation_failures", Value::from(0)),
        ]);
        // (depth>3 && failures>5) || depth>3  -> true via the right-hand clause
        assert!(eval.evaluate(
            "clarification_depth > 3 && validation_failures > 5 || clarification_depth > 3",
            &c
        ));
    }

    #[test]
    fn bare_field_truthiness() {
        let eval = DefaultPredicateEvaluator;
        let c = ctx(&[("explicit_request", Value::Bool(true))]);
        assert!(eval.evaluate("explicit_request", &c));
        let c2 = ctx(&[("explicit_request", Value::Bool(false))]);
        assert!(!eval.evaluate("explicit_request", &c2));
    }

    #[test]
    fn missing_field_is_false() {
        let eval = DefaultPredicateEvaluator;
        let c = HashMap::new();
        assert!(!eval.evaluate("anything > 1", &c));
    }

    #[test]
    fn string_equality() {
        let eval = DefaultPredicateEvaluator;
        let c = ctx(&[("account_type", Value::from("savings"))]);
        assert!(eval.evaluate(r#"account_type == "savings""#, &c));
        assert!(!eval.evaluate(r#"account_type == "checking""#, &c));
    }
}
