//! Boolean expression algebra for conditional-compilation analysis.
//!
//! Guard expressions taken from preprocessor directives and configuration
//! models are parsed into [`BoolExpr`] trees, printed back in a canonical
//! surface syntax, and rewritten by the local simplifier. Downstream crates
//! turn these trees into CNF; this crate is purely symbolic.

pub mod expr;
pub mod parser;
pub mod simplify;

#[cfg(any(test, feature = "internal-testing"))]
#[doc(hidden)]
pub mod strategy;

pub use crate::expr::BoolExpr;
pub use crate::parser::{parse, ParseError};
