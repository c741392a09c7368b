//! Local boolean rewriting.
//!
//! Bottom-up application of constant folding, double-negation removal and
//! the variable/negated-variable rules. The result is a fresh tree; the
//! input is never mutated. No normal form is attempted: the rules are
//! purely local, idempotent, and never introduce free variables.

use crate::expr::BoolExpr;

impl BoolExpr {
    pub fn simplify(&self) -> BoolExpr {
        simplify(self)
    }
}

pub fn simplify(expr: &BoolExpr) -> BoolExpr {
    match expr {
        BoolExpr::Const(_) | BoolExpr::Var(_) | BoolExpr::Any(_) => expr.clone(),
        BoolExpr::Call(name, args) => {
            BoolExpr::Call(name.clone(), args.iter().map(simplify).collect())
        }
        BoolExpr::Not(operand) => negate(simplify(operand)),
        BoolExpr::And(l, r) => simplify_and(simplify(l), simplify(r)),
        BoolExpr::Or(l, r) => simplify_or(simplify(l), simplify(r)),
        BoolExpr::Impl(l, r) => simplify_impl(simplify(l), simplify(r)),
        BoolExpr::Eq(l, r) => BoolExpr::iff(simplify(l), simplify(r)),
    }
}

/// Negation of an already simplified operand.
fn negate(operand: BoolExpr) -> BoolExpr {
    match operand {
        BoolExpr::Const(value) => BoolExpr::Const(!value),
        BoolExpr::Not(inner) => *inner,
        other => BoolExpr::not(other),
    }
}

fn simplify_and(left: BoolExpr, right: BoolExpr) -> BoolExpr {
    match (&left, &right) {
        (BoolExpr::Const(true), _) => right,
        (_, BoolExpr::Const(true)) => left,
        (BoolExpr::Const(false), _) | (_, BoolExpr::Const(false)) => BoolExpr::Const(false),
        (BoolExpr::Var(a), BoolExpr::Var(b)) if a == b => left,
        _ if complementary(&left, &right) => BoolExpr::Const(false),
        _ => BoolExpr::and(left, right),
    }
}

fn simplify_or(left: BoolExpr, right: BoolExpr) -> BoolExpr {
    match (&left, &right) {
        (BoolExpr::Const(false), _) => right,
        (_, BoolExpr::Const(false)) => left,
        (BoolExpr::Const(true), _) | (_, BoolExpr::Const(true)) => BoolExpr::Const(true),
        (BoolExpr::Var(a), BoolExpr::Var(b)) if a == b => left,
        _ if complementary(&left, &right) => BoolExpr::Const(true),
        _ => BoolExpr::or(left, right),
    }
}

fn simplify_impl(left: BoolExpr, right: BoolExpr) -> BoolExpr {
    match right {
        BoolExpr::Const(true) => BoolExpr::Const(true),
        BoolExpr::Const(false) => negate(left),
        _ => BoolExpr::implies(left, right),
    }
}

/// One side a variable, the other its negation.
fn complementary(left: &BoolExpr, right: &BoolExpr) -> bool {
    match (left, right) {
        (BoolExpr::Var(a), BoolExpr::Not(inner)) | (BoolExpr::Not(inner), BoolExpr::Var(a)) => {
            matches!(&**inner, BoolExpr::Var(b) if a == b)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use crate::parser::parse;
    use crate::strategy;

    fn simplified(input: &str, expected: &str) {
        let expr = parse(input).expect(input);
        assert_eq!(expr.simplify().to_string(), expected, "input: {:?}", input);
    }

    #[test]
    fn constant_folding() {
        simplified("!1", "0");
        simplified("!0", "1");
        simplified("A && 1", "A");
        simplified("1 && A", "A");
        simplified("A && 0", "0");
        simplified("A || 0", "A");
        simplified("A || 1", "1");
    }

    #[test]
    fn double_negation() {
        simplified("!!A", "A");
        simplified("!!!A", "!A");
        simplified("!!!!!A", "!A");
    }

    #[test]
    fn variable_rules() {
        simplified("A && A", "A");
        simplified("A && !A", "0");
        simplified("!A && A", "0");
        simplified("A || A", "A");
        simplified("A || !A", "1");
        simplified("!A || A", "1");
    }

    #[test]
    fn implication_rules() {
        simplified("A -> 1", "1");
        simplified("A -> 0", "!A");
        simplified("!A -> 0", "A");
        simplified("A && !A || B && !B", "0");
    }

    #[test]
    fn equivalence_and_calls_are_untouched() {
        simplified("A <-> B", "A <-> B");
        simplified("foo(A && 1)", "foo(A)");
        simplified("(A && 1) <-> (B || 0)", "A <-> B");
    }

    proptest! {
        #[test]
        fn simplify_is_idempotent(expr in strategy::expr(4, 8)) {
            let once = expr.simplify();
            prop_assert_eq!(once.simplify(), once);
        }

        #[test]
        fn simplify_preserves_meaning(expr in strategy::expr(3, 6)) {
            let simplified = expr.simplify();
            // Three variables, eight assignments.
            for bits in 0u8..8 {
                let env = |name: &str| {
                    let index: usize = name[1..].parse().unwrap();
                    bits & (1 << index) != 0
                };
                prop_assert_eq!(expr.eval(&env), simplified.eval(&env));
            }
        }
    }
}
