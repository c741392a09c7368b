//! Tseitin encoding of boolean expressions into the clause registry.
//!
//! Each sub-expression is represented by a signed literal: variables map to
//! registered ids, negation flips the sign, and every other connective gets
//! a fresh definition variable with the usual gate clauses. Asserting a
//! formula flattens its top-level structure instead of binding a root
//! variable, so conjunctions of equivalences (the shape block constraints
//! take) turn into short clauses over the named variables themselves.

use rustc_hash::FxHashSet;

use ifdefect_formula::BoolExpr;

use crate::cnf::Cnf;

/// How constant leaves are encoded.
///
/// `Bound` pins the allocated variable with a unit clause; `Free` leaves it
/// open so a later consumer may satisfy or falsify the placeholder.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConstantPolicy {
    Bound,
    Free,
}

/// Encodes expressions into a [`Cnf`].
pub struct CnfBuilder<'a> {
    cnf: &'a mut Cnf,
    constant_policy: ConstantPolicy,
    ignored: FxHashSet<String>,
}

impl<'a> CnfBuilder<'a> {
    pub fn new(cnf: &'a mut Cnf, constant_policy: ConstantPolicy) -> CnfBuilder<'a> {
        CnfBuilder {
            cnf,
            constant_policy,
            ignored: FxHashSet::default(),
        }
    }

    /// Treat the given variable names as free existentials: every
    /// occurrence gets a fresh, unregistered variable, so they constrain
    /// nothing.
    pub fn ignore_symbols(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ignored.extend(names.into_iter().map(Into::into));
        self
    }

    /// Assert `expr`, flattening top-level conjunctive structure.
    pub fn assert_formula(&mut self, expr: &BoolExpr) {
        match expr {
            BoolExpr::And(l, r) => {
                self.assert_formula(l);
                self.assert_formula(r);
            }
            BoolExpr::Or(..) => {
                let mut clause = Vec::new();
                self.collect_disjuncts(expr, &mut clause);
                self.cnf.push_clause(&clause);
            }
            BoolExpr::Impl(l, r) => {
                let a = self.encode(l);
                let b = self.encode(r);
                self.cnf.push_clause(&[-a, b]);
            }
            BoolExpr::Eq(l, r) => {
                let a = self.encode(l);
                let b = self.encode(r);
                self.cnf.push_clause(&[-a, b]);
                self.cnf.push_clause(&[a, -b]);
            }
            _ => {
                let lit = self.encode(expr);
                self.cnf.push_clause(&[lit]);
            }
        }
    }

    fn collect_disjuncts(&mut self, expr: &BoolExpr, clause: &mut Vec<i32>) {
        match expr {
            BoolExpr::Or(l, r) => {
                self.collect_disjuncts(l, clause);
                self.collect_disjuncts(r, clause);
            }
            _ => clause.push(self.encode(expr)),
        }
    }

    /// Encode a sub-expression, returning the literal that represents it.
    pub fn encode(&mut self, expr: &BoolExpr) -> i32 {
        match expr {
            BoolExpr::Var(name) => self.variable(name),
            BoolExpr::Not(operand) => -self.encode(operand),
            BoolExpr::Const(value) => {
                let t = self.cnf.new_var();
                if self.constant_policy == ConstantPolicy::Bound {
                    self.cnf.push_clause(&[if *value { t } else { -t }]);
                }
                t
            }
            BoolExpr::And(l, r) => {
                let a = self.encode(l);
                let b = self.encode(r);
                let t = self.cnf.new_var();
                self.cnf.push_clause(&[-t, a]);
                self.cnf.push_clause(&[-t, b]);
                self.cnf.push_clause(&[t, -a, -b]);
                t
            }
            BoolExpr::Or(l, r) => {
                let a = self.encode(l);
                let b = self.encode(r);
                let t = self.cnf.new_var();
                self.cnf.push_clause(&[-t, a, b]);
                self.cnf.push_clause(&[t, -a]);
                self.cnf.push_clause(&[t, -b]);
                t
            }
            BoolExpr::Impl(l, r) => {
                let a = self.encode(l);
                let b = self.encode(r);
                let t = self.cnf.new_var();
                self.cnf.push_clause(&[-t, -a, b]);
                self.cnf.push_clause(&[t, a]);
                self.cnf.push_clause(&[t, -b]);
                t
            }
            BoolExpr::Eq(l, r) => {
                let a = self.encode(l);
                let b = self.encode(r);
                let t = self.cnf.new_var();
                self.cnf.push_clause(&[-t, -a, b]);
                self.cnf.push_clause(&[-t, a, -b]);
                self.cnf.push_clause(&[t, a, b]);
                self.cnf.push_clause(&[t, -a, -b]);
                t
            }
            // Identical calls share one variable within a registry: the
            // printed form is the registry key.
            BoolExpr::Call(..) => self.variable(&expr.to_string()),
            BoolExpr::Any(_) => self.cnf.new_var(),
        }
    }

    fn variable(&mut self, name: &str) -> i32 {
        if self.ignored.contains(name) {
            return self.cnf.new_var();
        }
        match self.cnf.cnf_var(name) {
            Some(var) => var,
            None => {
                let var = self.cnf.new_var();
                self.cnf.set_cnf_var(name, var);
                var
            }
        }
    }
}
