//! Analysis of conditional-compilation variability in preprocessor-guarded
//! source trees.
//!
//! Given a configuration model derived from a Kconfig-style description and
//! a source file, this crate decides which `#ifdef` blocks are *dead*
//! (never selectable) or *undead* (forced on whenever their parent is
//! selected), and synthesizes a small family of configurations covering
//! every live block.
//!
//! The pipeline: [`cpp`] parses the conditional structure of a file into a
//! block tree, [`model`] turns dumped Kconfig facts into per-symbol
//! dependency formulas, [`coverage`] joins both into a base formula,
//! [`tseitin`] encodes it into the [`cnf`] clause registry, and [`sat`]
//! drives the solver incrementally under assumptions. [`defect`] and
//! [`mus`] build the dead/undead reports on top.

pub mod cnf;
pub mod coverage;
pub mod cpp;
pub mod defect;
pub mod join;
pub mod model;
pub mod mus;
pub mod sat;
pub mod tseitin;

pub use crate::cnf::{Cnf, CnfError, SymbolType};
pub use crate::coverage::{
    write_configuration, Assignment, BaseChecker, CoverageAnalyzer, CoverageError,
    CoverageStrategy,
};
pub use crate::cpp::{is_block_name, CppError, CppFile};
pub use crate::defect::{BlockDefect, DefectAnalyzer, DefectError, DefectKind};
pub use crate::model::{load_symbol_list, ConfigurationModel, Intersect, ModelError};
pub use crate::sat::{SatContext, SatError};
pub use crate::tseitin::{CnfBuilder, ConstantPolicy};
