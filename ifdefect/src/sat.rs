//! Incremental SAT solving over the clause registry.
//!
//! A [`SatContext`] owns a [`Cnf`] and one solver instance. Clauses pushed
//! into the registry are loaded into the solver on the next
//! [`check_sat`](SatContext::check_sat); queued assumptions are handed to
//! the solver and consumed by the same call. The solver is per-instance,
//! so several contexts can coexist, each with its own loaded clause set.

use std::collections::BTreeMap;

use log::error;
use rustc_hash::FxHashMap;
use thiserror::Error;
use varisat::{ExtendFormula, Lit, Solver};

use crate::cnf::Cnf;

/// Possible errors while driving the solver.
#[derive(Debug, Error)]
pub enum SatError {
    #[error("solver error: {0}")]
    Solver(String),
}

/// A clause registry loaded into an incremental solver.
pub struct SatContext {
    cnf: Cnf,
    solver: Solver<'static>,
    loaded: usize,
    assumptions: Vec<i32>,
    last_assumptions: Vec<i32>,
    model: Option<FxHashMap<i32, bool>>,
}

impl SatContext {
    pub fn new(cnf: Cnf) -> SatContext {
        SatContext {
            cnf,
            solver: Solver::new(),
            loaded: 0,
            assumptions: Vec::new(),
            last_assumptions: Vec::new(),
            model: None,
        }
    }

    pub fn cnf(&self) -> &Cnf {
        &self.cnf
    }

    /// The registry stays writable; new clauses are picked up by the next
    /// [`check_sat`](SatContext::check_sat).
    pub fn cnf_mut(&mut self) -> &mut Cnf {
        &mut self.cnf
    }

    pub fn into_cnf(self) -> Cnf {
        self.cnf
    }

    /// Queue a literal for the next satisfiability check.
    pub fn push_assumption(&mut self, lit: i32) {
        self.assumptions.push(lit);
    }

    /// Queue an assumption on a registered variable.
    ///
    /// Assumptions on unregistered names are ignored with an error log, so
    /// a caller probing blocks of an unrelated file fails loudly instead of
    /// silently constraining a fresh variable.
    pub fn push_assumption_name(&mut self, name: &str, value: bool) {
        match self.cnf.cnf_var(name) {
            Some(var) => self.push_assumption(if value { var } else { -var }),
            None => {
                error!("ignoring assumption on unregistered variable {}", name);
            }
        }
    }

    /// Assumptions handed to the most recent [`check_sat`](SatContext::check_sat).
    pub fn last_assumptions(&self) -> &[i32] {
        &self.last_assumptions
    }

    /// Load pending clauses, apply queued assumptions, and solve.
    pub fn check_sat(&mut self) -> Result<bool, SatError> {
        let literals = self.cnf.literals();
        let mut clause = Vec::new();
        let mut consumed = self.loaded;
        for (offset, &lit) in literals[self.loaded..].iter().enumerate() {
            if lit == 0 {
                self.solver.add_clause(&clause);
                clause.clear();
                consumed = self.loaded + offset + 1;
            } else {
                clause.push(Lit::from_dimacs(lit as isize));
            }
        }
        self.loaded = consumed;

        let assumed: Vec<Lit> = self
            .assumptions
            .iter()
            .map(|&lit| Lit::from_dimacs(lit as isize))
            .collect();
        self.last_assumptions = std::mem::replace(&mut self.assumptions, Vec::new());
        self.solver.assume(&assumed);

        let satisfiable = self
            .solver
            .solve()
            .map_err(|err| SatError::Solver(err.to_string()))?;

        self.model = if satisfiable {
            self.solver.model().map(|lits| {
                lits.iter()
                    .map(|lit| (lit.var().to_dimacs() as i32, lit.is_positive()))
                    .collect()
            })
        } else {
            None
        };
        Ok(satisfiable)
    }

    /// Model value of a literal; `None` after UNSAT or for variables the
    /// solver never saw.
    pub fn lit_value(&self, lit: i32) -> Option<bool> {
        let model = self.model.as_ref()?;
        let positive = model.get(&lit.abs()).copied()?;
        Some(if lit < 0 { !positive } else { positive })
    }

    /// Model value of a registered variable.
    pub fn value(&self, name: &str) -> Option<bool> {
        self.lit_value(self.cnf.cnf_var(name)?)
    }

    /// The full model projected onto registered names, in name order.
    pub fn assignment(&self) -> BTreeMap<String, bool> {
        let mut assignment = BTreeMap::new();
        for (name, var) in self.cnf.vars() {
            if let Some(value) = self.lit_value(var) {
                assignment.insert(name.to_string(), value);
            }
        }
        assignment
    }

    /// The subset of the last assumptions that made the formula
    /// unsatisfiable. Not guaranteed minimal.
    pub fn failed_assumptions(&self) -> Vec<i32> {
        match self.solver.failed_core() {
            Some(core) => core.iter().map(|lit| lit.to_dimacs() as i32).collect(),
            None => Vec::new(),
        }
    }
}
