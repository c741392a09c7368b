//! Minimal unsatisfiable subset extraction.
//!
//! Every clause is guarded by a fresh selector variable and the selectors
//! are assumed; the failed-assumption core then shrinks by deletion: drop
//! the last candidate, re-solve, and either commit it to the core (the rest
//! became satisfiable) or adopt the smaller failed core. The committed
//! clauses are asserted as units so later iterations solve against them.

use varisat::{ExtendFormula, Lit, Solver};

use crate::cnf::Cnf;
use crate::sat::SatError;

/// Minimize an unsatisfiable clause set.
///
/// Returns the indices of a minimal unsatisfiable subset of `clauses`, in
/// ascending order, or `None` when the clause set is satisfiable.
/// `var_count` must be at least the largest variable index used.
pub fn minimize_unsat(
    clauses: &[Vec<i32>],
    var_count: i32,
) -> Result<Option<Vec<usize>>, SatError> {
    let mut solver = Solver::new();
    let selector =
        |index: usize| Lit::from_dimacs((var_count + 1 + index as i32) as isize);

    for (index, clause) in clauses.iter().enumerate() {
        let mut lits: Vec<Lit> = clause
            .iter()
            .map(|&lit| Lit::from_dimacs(lit as isize))
            .collect();
        lits.push(!selector(index));
        solver.add_clause(&lits);
    }

    let all: Vec<Lit> = (0..clauses.len()).map(selector).collect();
    solver.assume(&all);
    if solve(&mut solver)? {
        return Ok(None);
    }
    let mut candidates: Vec<Lit> = match solver.failed_core() {
        Some(core) => core.to_vec(),
        None => all,
    };

    let mut core: Vec<Lit> = Vec::new();
    while !candidates.is_empty() {
        solver.assume(&candidates[..candidates.len() - 1]);
        if solve(&mut solver)? {
            let needed = match candidates.pop() {
                Some(lit) => lit,
                None => break,
            };
            core.push(needed);
            solver.add_clause(&[needed]);
        } else {
            candidates = match solver.failed_core() {
                Some(shrunk) => shrunk.to_vec(),
                None => Vec::new(),
            };
        }
    }

    let base = var_count as isize;
    let mut indices: Vec<usize> = core
        .iter()
        .map(|lit| (lit.to_dimacs() - base - 1) as usize)
        .collect();
    indices.sort_unstable();
    Ok(Some(indices))
}

fn solve(solver: &mut Solver) -> Result<bool, SatError> {
    solver
        .solve()
        .map_err(|err| SatError::Solver(err.to_string()))
}

/// Render clauses over registry names, e.g. `(!B1 v !B0) ^ (B1)`.
///
/// Auxiliary variables without a name fall back to their integer form.
pub fn format_clauses<'a>(cnf: &Cnf, clauses: impl IntoIterator<Item = &'a [i32]>) -> String {
    let mut rendered = Vec::new();
    for clause in clauses {
        let lits: Vec<String> = clause
            .iter()
            .map(|&lit| {
                let sign = if lit < 0 { "!" } else { "" };
                match cnf.symbol_name(lit.abs()) {
                    Some(name) => format!("{}{}", sign, name),
                    None => format!("{}{}", sign, lit.abs()),
                }
            })
            .collect();
        rendered.push(format!("({})", lits.join(" v ")));
    }
    rendered.join(" ^ ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn satisfiable_input_yields_no_core() {
        let clauses = vec![vec![1, 2], vec![-1]];
        assert_eq!(minimize_unsat(&clauses, 2).unwrap(), None);
    }

    #[test]
    fn core_is_minimal() {
        // (1) (-1 2) (-2) is unsatisfiable; (3 4) is irrelevant.
        let clauses = vec![vec![3, 4], vec![1], vec![-1, 2], vec![-2]];
        let core = minimize_unsat(&clauses, 4).unwrap().unwrap();
        assert_eq!(core, vec![1, 2, 3]);
    }

    #[test]
    fn chain_contradiction_keeps_the_whole_chain() {
        // 1 -> 2 -> 3 together with (1) and (-3).
        let clauses = vec![vec![1], vec![-1, 2], vec![-2, 3], vec![-3]];
        let core = minimize_unsat(&clauses, 3).unwrap().unwrap();
        assert_eq!(core, vec![0, 1, 2, 3]);
    }

    #[test]
    fn formatting_uses_registry_names() {
        let mut cnf = Cnf::new();
        cnf.set_cnf_var("B0", 1);
        cnf.set_cnf_var("B1", 2);
        let clauses: Vec<Vec<i32>> = vec![vec![-2, -1], vec![2]];
        let text = format_clauses(
            &cnf,
            clauses.iter().map(Vec::as_slice),
        );
        assert_eq!(text, "(!B1 v !B0) ^ (B1)");
    }
}
