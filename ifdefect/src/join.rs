//! Assembling formula strings from independently produced parts.

use ifdefect_formula::BoolExpr;

/// Joins formula fragments, skipping empty parts.
///
/// In unique mode a fragment is kept only on its first occurrence, which is
/// what scoped base expressions need when several blocks share ancestors.
#[derive(Default)]
pub struct FormulaJoiner {
    parts: Vec<String>,
    unique: bool,
}

impl FormulaJoiner {
    pub fn new() -> FormulaJoiner {
        FormulaJoiner::default()
    }

    pub fn unique() -> FormulaJoiner {
        FormulaJoiner {
            parts: Vec::new(),
            unique: true,
        }
    }

    pub fn push(&mut self, part: impl Into<String>) {
        let part = part.into();
        if part.is_empty() {
            return;
        }
        if self.unique && self.parts.contains(&part) {
            return;
        }
        self.parts.push(part);
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn join(&self, separator: &str) -> String {
        self.parts.join(separator)
    }
}

/// Print an expression so that it can be glued to others with `&&`.
///
/// Atoms and negated atoms stay bare, everything else is parenthesized.
pub fn parenthesize(expr: &BoolExpr) -> String {
    let atomic = match expr {
        BoolExpr::Const(_) | BoolExpr::Var(_) | BoolExpr::Any(_) | BoolExpr::Call(..) => true,
        BoolExpr::Not(inner) => matches!(
            **inner,
            BoolExpr::Const(_) | BoolExpr::Var(_) | BoolExpr::Any(_) | BoolExpr::Call(..)
        ),
        _ => false,
    };
    if atomic {
        expr.to_string()
    } else {
        format!("({})", expr)
    }
}
