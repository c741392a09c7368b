//! Dead and undead block detection.
//!
//! A block is *dead* when the base formula cannot select it at all, and
//! *undead* when its parent cannot be selected without it (the
//! complementary sibling is dead, so the block is forced on). Dead blocks
//! additionally get a minimal unsatisfiable core over the base clauses for
//! the report.

use log::info;
use thiserror::Error;

use crate::cnf::Cnf;
use crate::coverage::{BaseChecker, CoverageAnalyzer, CoverageError};
use crate::cpp::CppFile;
use crate::model::ConfigurationModel;
use crate::mus::{format_clauses, minimize_unsat};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DefectKind {
    Dead,
    Undead,
}

/// One defective block.
#[derive(Debug)]
pub struct BlockDefect {
    pub block: String,
    pub kind: DefectKind,
    /// Analyzed against a configuration model, as opposed to code only.
    pub global: bool,
    /// Minimal unsatisfiable core, rendered over variable names; dead
    /// blocks only.
    pub mus: Option<String>,
}

impl BlockDefect {
    /// Report artifact name, e.g. `foo.c.B1.kconfig.globally.dead`.
    pub fn report_name(&self, path: &str) -> String {
        let scope = if self.global { "kconfig.globally" } else { "code" };
        let kind = match self.kind {
            DefectKind::Dead => "dead",
            DefectKind::Undead => "undead",
        };
        format!("{}.{}.{}.{}", path, self.block, scope, kind)
    }
}

/// Classifies every block of one file.
pub struct DefectAnalyzer<'a> {
    file: &'a CppFile,
    model: Option<&'a ConfigurationModel>,
}

/// Possible errors during defect analysis.
#[derive(Debug, Error)]
pub enum DefectError {
    #[error(transparent)]
    Coverage(#[from] CoverageError),
}

impl<'a> DefectAnalyzer<'a> {
    pub fn new(file: &'a CppFile, model: Option<&'a ConfigurationModel>) -> DefectAnalyzer<'a> {
        DefectAnalyzer { file, model }
    }

    pub fn analyze(&self) -> Result<Vec<BlockDefect>, DefectError> {
        let base = CoverageAnalyzer::new(self.file, self.model).base_file_expression(None);
        let mut checker = BaseChecker::new(&base)?;
        let global = self.model.is_some();

        let mut defects = Vec::new();
        for index in 1..self.file.blocks().len() {
            let name = self.file.blocks()[index].name().to_string();

            if !checker
                .check_with(&[(name.as_str(), true)])
                .map_err(CoverageError::from)?
            {
                let mus = dead_block_core(checker.cnf(), &name)?;
                defects.push(BlockDefect {
                    block: name,
                    kind: DefectKind::Dead,
                    global,
                    mus,
                });
                continue;
            }

            let parent = self
                .file
                .parent_of(index)
                .map(|parent| self.file.blocks()[parent].name().to_string())
                .unwrap_or_else(|| "B00".to_string());
            if !checker
                .check_with(&[(parent.as_str(), true), (name.as_str(), false)])
                .map_err(CoverageError::from)?
            {
                defects.push(BlockDefect {
                    block: name,
                    kind: DefectKind::Undead,
                    global,
                    mus: None,
                });
            }
        }
        info!(
            "{}: {} defective blocks",
            self.file.path(),
            defects.len()
        );
        Ok(defects)
    }
}

/// Minimize the clause set that kills a dead block.
fn dead_block_core(cnf: &Cnf, block: &str) -> Result<Option<String>, DefectError> {
    let var = match cnf.cnf_var(block) {
        Some(var) => var,
        None => return Ok(None),
    };
    let mut clauses: Vec<Vec<i32>> = cnf.clause_iter().map(|clause| clause.to_vec()).collect();
    clauses.push(vec![var]);
    let core = minimize_unsat(&clauses, cnf.var_count()).map_err(CoverageError::from)?;
    Ok(core.map(|indices| {
        format_clauses(cnf, indices.iter().map(|&index| clauses[index].as_slice()))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forced_symbols_make_blocks_dead_and_undead() {
        let file = CppFile::parse("test.c", "#ifdef CONFIG_A\n#else\n#endif\n").unwrap();
        let mut model =
            ConfigurationModel::from_reader("test", &b"Item A boolean\n"[..]).unwrap();
        model.add_meta_value("ALWAYS_ON", "CONFIG_A").unwrap();

        let defects = DefectAnalyzer::new(&file, Some(&model)).analyze().unwrap();
        assert_eq!(defects.len(), 2);

        let undead = &defects[0];
        assert_eq!(undead.block, "B0");
        assert_eq!(undead.kind, DefectKind::Undead);
        assert_eq!(undead.report_name("test.c"), "test.c.B0.kconfig.globally.undead");

        let dead = &defects[1];
        assert_eq!(dead.block, "B1");
        assert_eq!(dead.kind, DefectKind::Dead);
        assert!(dead.mus.is_some());
        assert_eq!(dead.report_name("test.c"), "test.c.B1.kconfig.globally.dead");
    }

    #[test]
    fn healthy_files_have_no_defects() {
        let file = CppFile::parse("test.c", "#ifdef CONFIG_A\n#else\n#endif\n").unwrap();
        let defects = DefectAnalyzer::new(&file, None).analyze().unwrap();
        assert!(defects.is_empty());
    }
}
