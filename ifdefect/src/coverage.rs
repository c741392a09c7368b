//! Block-coverage enumeration.
//!
//! The base formula of a file joins its code constraints, the sliced
//! configuration model, the negation of missing symbols (for complete
//! models), and the forced ALWAYS_ON/ALWAYS_OFF literals. Two strategies
//! enumerate covering configurations on top of it: the greedy one solves
//! once per uncovered block and keeps every assignment that covers
//! something new, the minimizing one accretes as many blocks as possible
//! into each configuration before emitting it.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};

use log::{debug, error, info};
use thiserror::Error;

use ifdefect_formula::{parse, ParseError};

use crate::cnf::Cnf;
use crate::cpp::{is_block_name, CppFile};
use crate::join::FormulaJoiner;
use crate::model::ConfigurationModel;
use crate::sat::{SatContext, SatError};
use crate::tseitin::{CnfBuilder, ConstantPolicy};

/// A full model readback, keyed by registered variable name.
pub type Assignment = BTreeMap<String, bool>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CoverageStrategy {
    Simple,
    Minimize,
}

/// Possible errors while enumerating coverage.
#[derive(Debug, Error)]
pub enum CoverageError {
    #[error("failed to parse base expression: {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Sat(#[from] SatError),
}

/// SAT checker over a fixed base formula, probed with per-query
/// assumptions.
pub struct BaseChecker {
    ctx: SatContext,
}

impl BaseChecker {
    pub fn new(base_formula: &str) -> Result<BaseChecker, CoverageError> {
        let expr = parse(base_formula)?;
        let mut cnf = Cnf::new();
        CnfBuilder::new(&mut cnf, ConstantPolicy::Bound).assert_formula(&expr);
        Ok(BaseChecker {
            ctx: SatContext::new(cnf),
        })
    }

    /// Is the base formula satisfiable with every named block enabled?
    pub fn check_enabled(&mut self, enabled: &BTreeSet<String>) -> Result<bool, SatError> {
        for name in enabled {
            self.ctx.push_assumption_name(name, true);
        }
        self.ctx.check_sat()
    }

    /// Satisfiability under explicit variable assumptions.
    pub fn check_with(&mut self, assumptions: &[(&str, bool)]) -> Result<bool, SatError> {
        for (name, value) in assumptions {
            self.ctx.push_assumption_name(name, *value);
        }
        self.ctx.check_sat()
    }

    /// The model of the last satisfiable check.
    pub fn assignment(&self) -> Assignment {
        self.ctx.assignment()
    }

    pub fn cnf(&self) -> &Cnf {
        self.ctx.cnf()
    }
}

/// Enumerates covering configurations for one file.
pub struct CoverageAnalyzer<'a> {
    file: &'a CppFile,
    model: Option<&'a ConfigurationModel>,
    missing: BTreeSet<String>,
}

impl<'a> CoverageAnalyzer<'a> {
    pub fn new(file: &'a CppFile, model: Option<&'a ConfigurationModel>) -> CoverageAnalyzer<'a> {
        CoverageAnalyzer {
            file,
            model,
            missing: BTreeSet::new(),
        }
    }

    /// Symbols of the last base expression that neither the model nor the
    /// file itself knows.
    pub fn missing(&self) -> &BTreeSet<String> {
        &self.missing
    }

    /// Assemble the SAT backdrop for this file, optionally scoped to a
    /// subset of blocks that are each forced on.
    pub fn base_file_expression(&mut self, blocks: Option<&[usize]>) -> String {
        let code_formula = match blocks {
            None => self.file.code_constraints(),
            Some(indices) => self.file.scoped_constraints(indices),
        };

        let mut formula = FormulaJoiner::new();
        formula.push(code_formula.clone());

        if let Some(model) = self.model {
            let file = self.file;
            let seeds = model.items_in(&code_formula);
            let intersected = model.intersect(&seeds, |name| file.knows_symbol(name));
            formula.push(intersected.formula);
            self.missing = intersected.missing;
            // Only a complete model may force unknown symbols off.
            if model.is_complete() {
                for name in &self.missing {
                    formula.push(format!("!{}", name));
                }
            }

            if let Some(always_on) = model.meta_value("ALWAYS_ON") {
                if blocks.is_none() {
                    info!("{} items have been forcefully set", always_on.len());
                }
                for name in always_on {
                    formula.push(name.clone());
                }
            }
            if let Some(always_off) = model.meta_value("ALWAYS_OFF") {
                if blocks.is_none() {
                    info!("{} items have been forcefully unset", always_off.len());
                }
                for name in always_off {
                    formula.push(format!("!{}", name));
                }
            }
        }

        let base = formula.join(" && ");
        debug!("base file expression: {}", base);
        base
    }

    pub fn block_coverage(
        &mut self,
        strategy: CoverageStrategy,
    ) -> Result<Vec<Assignment>, CoverageError> {
        let base = self.base_file_expression(None);
        let mut checker = BaseChecker::new(&base)?;
        match strategy {
            CoverageStrategy::Simple => self.simple(&mut checker),
            CoverageStrategy::Minimize => self.minimize(&mut checker),
        }
    }

    /// One solve per uncovered block; a solution is recorded when its
    /// projected configuration is new and at least one previously
    /// uncovered block became covered.
    fn simple(&self, checker: &mut BaseChecker) -> Result<Vec<Assignment>, CoverageError> {
        let mut covered: BTreeSet<String> = BTreeSet::new();
        let mut found_configurations: BTreeSet<Assignment> = BTreeSet::new();
        let mut solutions = Vec::new();

        for block in self.file.blocks() {
            let name = block.name();
            if covered.contains(name) {
                continue;
            }

            let mut single = BTreeSet::new();
            single.insert(name.to_string());
            if !checker.check_enabled(&single)? {
                // Unsolvable: a defect, not a coverage obligation.
                debug!("block {} cannot be enabled", name);
                continue;
            }

            let assignment = checker.assignment();
            let mut new_block = false;
            let mut configuration = Assignment::new();
            for (var, &enabled) in &assignment {
                if is_block_name(var) {
                    if enabled && covered.insert(var.clone()) {
                        new_block = true;
                    }
                    continue;
                }
                if self.model.map_or(true, |m| m.in_configuration_space(var)) {
                    configuration.insert(var.clone(), enabled);
                }
            }

            if found_configurations.insert(configuration) && new_block {
                solutions.push(assignment);
            }
        }
        Ok(solutions)
    }

    /// Accrete one block at a time into the current configuration; emit it
    /// when no further block fits.
    fn minimize(&self, checker: &mut BaseChecker) -> Result<Vec<Assignment>, CoverageError> {
        let total = self.file.blocks().len();
        let mut covered: BTreeSet<String> = BTreeSet::new();
        let mut configuration: BTreeSet<String> = BTreeSet::new();
        let mut solutions = Vec::new();

        // Initial phase: one unconstrained solve usually enables many
        // blocks at once; the accretion loop only has to mop up the rest.
        if checker.check_enabled(&configuration)? {
            for (var, &enabled) in &checker.assignment() {
                if enabled && is_block_name(var) {
                    configuration.insert(var.clone());
                    covered.insert(var.clone());
                }
            }
            if !configuration.is_empty() {
                solutions.push(checker.assignment());
                configuration.clear();
            }
        }

        while covered.len() < total {
            for index in 0..total {
                let name = self.file.blocks()[index].name().to_string();
                if covered.contains(&name) {
                    continue;
                }
                // An already chosen block of the same if-chain rules this
                // one out without a solver call.
                if self.file.conflicts_with(index, &configuration) {
                    continue;
                }

                configuration.insert(name.clone());
                if !checker.check_enabled(&configuration)? {
                    if configuration.len() == 1 {
                        // Dead on its own; no configuration will cover it.
                        covered.insert(name.clone());
                        configuration.clear();
                    } else {
                        configuration.remove(&name);
                    }
                    continue;
                }
                covered.insert(name);
            }

            if !configuration.is_empty() {
                if checker.check_enabled(&configuration)? {
                    solutions.push(checker.assignment());
                } else {
                    error!("checker rejected a previously satisfiable configuration");
                }
                configuration.clear();
            }
        }
        Ok(solutions)
    }
}

/// Serialize one solution: `NAME=y` for enabled configuration-space
/// symbols, `# NAME=n` for disabled ones.
pub fn write_configuration(
    assignment: &Assignment,
    model: Option<&ConfigurationModel>,
    out: &mut impl Write,
) -> io::Result<()> {
    for (name, &enabled) in assignment {
        if is_block_name(name) {
            continue;
        }
        let in_space = match model {
            Some(model) => model.in_configuration_space(name),
            None => name.starts_with("CONFIG_"),
        };
        if !in_space {
            continue;
        }
        if enabled {
            writeln!(out, "{}=y", name)?;
        } else {
            writeln!(out, "# {}=n", name)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forced_model() -> ConfigurationModel {
        let mut model =
            ConfigurationModel::from_reader("test", &b"Item A boolean\n"[..]).unwrap();
        model.add_meta_value("ALWAYS_ON", "CONFIG_A").unwrap();
        model
    }

    fn if_else_file() -> CppFile {
        CppFile::parse("test.c", "#ifdef CONFIG_A\n#else\n#endif\n").unwrap()
    }

    #[test]
    fn base_expression_joins_code_model_and_forced_literals() {
        let file = if_else_file();
        let model = forced_model();
        let mut analyzer = CoverageAnalyzer::new(&file, Some(&model));
        let base = analyzer.base_file_expression(None);
        assert!(base.contains("(B0 <-> CONFIG_A)"));
        assert!(base.contains("(B1 <-> !B0)"));
        assert!(base.contains("(B00 <-> FILE_test.c)"));
        assert!(base.ends_with("&& CONFIG_A"));
        parse(&base).unwrap();
    }

    #[test]
    fn missing_symbols_are_negated_for_complete_models() {
        let file = CppFile::parse("test.c", "#ifdef CONFIG_GONE\n#endif\n").unwrap();
        let model = forced_model();
        let mut analyzer = CoverageAnalyzer::new(&file, Some(&model));
        let base = analyzer.base_file_expression(None);
        assert!(base.contains("!CONFIG_GONE"));
        assert!(analyzer.missing().contains("CONFIG_GONE"));

        let solutions = analyzer.block_coverage(CoverageStrategy::Simple).unwrap();
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].get("CONFIG_GONE"), Some(&false));
        assert_eq!(solutions[0].get("B0"), Some(&false));
    }

    #[test]
    fn forced_symbols_drive_simple_coverage() {
        let file = if_else_file();
        let model = forced_model();
        let mut analyzer = CoverageAnalyzer::new(&file, Some(&model));
        let solutions = analyzer.block_coverage(CoverageStrategy::Simple).unwrap();
        assert_eq!(solutions.len(), 1);
        let solution = &solutions[0];
        assert_eq!(solution.get("CONFIG_A"), Some(&true));
        assert_eq!(solution.get("B0"), Some(&true));
        assert_eq!(solution.get("B1"), Some(&false));
    }

    #[test]
    fn strategies_agree_on_dead_blocks() {
        let file = if_else_file();
        let model = forced_model();
        let simple = CoverageAnalyzer::new(&file, Some(&model))
            .block_coverage(CoverageStrategy::Simple)
            .unwrap();
        let minimized = CoverageAnalyzer::new(&file, Some(&model))
            .block_coverage(CoverageStrategy::Minimize)
            .unwrap();
        assert_eq!(simple.len(), 1);
        assert_eq!(minimized.len(), 1);
        // B1 is the dead else branch under both strategies.
        assert_eq!(simple[0].get("B1"), Some(&false));
        assert_eq!(minimized[0].get("B1"), Some(&false));
    }

    #[test]
    fn configurations_serialize_in_kconfig_style() {
        let mut assignment = Assignment::new();
        assignment.insert("CONFIG_A".to_string(), true);
        assignment.insert("CONFIG_B".to_string(), false);
        assignment.insert("B0".to_string(), true);
        assignment.insert("FILE_test.c".to_string(), true);
        let mut out = Vec::new();
        write_configuration(&assignment, None, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "CONFIG_A=y\n# CONFIG_B=n\n"
        );
    }
}
