//! Clause and symbol registry with the on-disk CNF format.
//!
//! A [`Cnf`] collects clauses as a flat buffer of DIMACS literals with `0`
//! terminators, together with the name/variable registry, per-symbol type
//! information and free-form metadata. The on-disk format is DIMACS with
//! comment extensions (`c sym`, `c var`, `c meta_value`); readers accept
//! the comment lines in any order before the `p cnf` header and ignore
//! unknown `c` lines.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

use log::error;
use regex::Regex;
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Possible errors while loading a CNF file.
#[derive(Debug, Error)]
pub enum CnfError {
    #[error("failed to parse line: '{0}'")]
    BadLine(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("invalid regular expression: {0}")]
    Regex(#[from] regex::Error),
}

/// Kconfig symbol kinds with their on-disk type ids.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SymbolType {
    Boolean = 1,
    Tristate = 2,
    Int = 3,
    Hex = 4,
    String = 5,
    Other = 6,
}

impl SymbolType {
    pub fn from_id(id: u32) -> Option<SymbolType> {
        match id {
            1 => Some(SymbolType::Boolean),
            2 => Some(SymbolType::Tristate),
            3 => Some(SymbolType::Int),
            4 => Some(SymbolType::Hex),
            5 => Some(SymbolType::String),
            6 => Some(SymbolType::Other),
            _ => None,
        }
    }

    pub fn id(self) -> u32 {
        self as u32
    }

    /// Symbol type as written in `Item` facts; unknown spellings are
    /// [`Other`](SymbolType::Other).
    pub fn from_fact(text: &str) -> SymbolType {
        match text {
            "boolean" | "bool" => SymbolType::Boolean,
            "tristate" => SymbolType::Tristate,
            "int" | "integer" => SymbolType::Int,
            "hex" => SymbolType::Hex,
            "string" => SymbolType::String,
            _ => SymbolType::Other,
        }
    }
}

impl std::fmt::Display for SymbolType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            SymbolType::Boolean => "BOOLEAN",
            SymbolType::Tristate => "TRISTATE",
            SymbolType::Int => "INT",
            SymbolType::Hex => "HEX",
            SymbolType::String => "STRING",
            SymbolType::Other => "OTHER",
        };
        write!(f, "{}", name)
    }
}

/// Clause and symbol registry.
#[derive(Default)]
pub struct Cnf {
    varcount: i32,
    clausecount: usize,
    clauses: Vec<i32>,
    cnfvars: BTreeMap<String, i32>,
    boolvars: FxHashMap<i32, String>,
    symboltypes: BTreeMap<String, SymbolType>,
    associated_symbols: FxHashMap<String, String>,
    meta_information: BTreeMap<String, Vec<String>>,
}

impl Cnf {
    pub fn new() -> Cnf {
        Cnf::default()
    }

    pub fn var_count(&self) -> i32 {
        self.varcount
    }

    pub fn clause_count(&self) -> usize {
        self.clausecount
    }

    /// Allocate the next free variable.
    pub fn new_var(&mut self) -> i32 {
        self.varcount += 1;
        self.varcount
    }

    /// The variable registered for `name`, if any.
    pub fn cnf_var(&self, name: &str) -> Option<i32> {
        self.cnfvars.get(name).copied()
    }

    /// Register `var` for `name` in both direction maps.
    pub fn set_cnf_var(&mut self, name: &str, var: i32) {
        if var.abs() > self.varcount {
            self.varcount = var.abs();
        }
        self.cnfvars.insert(name.to_string(), var);
        self.boolvars.insert(var, name.to_string());
    }

    pub fn symbol_name(&self, var: i32) -> Option<&str> {
        self.boolvars.get(&var).map(String::as_str)
    }

    /// Named variables in name order.
    pub fn vars(&self) -> impl Iterator<Item = (&str, i32)> {
        self.cnfvars.iter().map(|(name, &var)| (name.as_str(), var))
    }

    pub fn symbol_type(&self, name: &str) -> Option<SymbolType> {
        self.symboltypes.get(name).copied()
    }

    /// Record the type of a symbol given by its bare name.
    ///
    /// The `CONFIG_`-prefixed variable is associated with the bare symbol;
    /// tristate symbols additionally associate their `_MODULE` variant.
    pub fn set_symbol_type(&mut self, name: &str, symbol_type: SymbolType) {
        self.associated_symbols
            .insert(format!("CONFIG_{}", name), name.to_string());
        if symbol_type == SymbolType::Tristate {
            self.associated_symbols
                .insert(format!("CONFIG_{}_MODULE", name), name.to_string());
        }
        self.symboltypes.insert(name.to_string(), symbol_type);
    }

    /// The bare symbol a `CONFIG_*` variable belongs to, if registered.
    pub fn associated_symbol(&self, var_name: &str) -> Option<&str> {
        self.associated_symbols.get(var_name).map(String::as_str)
    }

    /// Append one literal; `0` terminates the current clause.
    pub fn push_var(&mut self, lit: i32) {
        if lit.abs() > self.varcount {
            self.varcount = lit.abs();
        }
        if lit == 0 {
            self.clausecount += 1;
        }
        self.clauses.push(lit);
    }

    /// Terminate the current clause.
    pub fn end_clause(&mut self) {
        self.push_var(0);
    }

    /// Append a complete clause.
    pub fn push_clause(&mut self, lits: &[i32]) {
        for &lit in lits {
            self.push_var(lit);
        }
        self.end_clause();
    }

    /// The flat clause buffer, `0`-terminated per clause.
    pub fn literals(&self) -> &[i32] {
        &self.clauses
    }

    /// Iterator over the complete clauses.
    pub fn clause_iter(&self) -> ClauseIter {
        ClauseIter {
            rest: &self.clauses,
        }
    }

    /// Append `value` to the metadata list of `key` unless already present.
    pub fn add_meta_value(&mut self, key: &str, value: &str) {
        let values = self.meta_information.entry(key.to_string()).or_default();
        if !values.iter().any(|existing| existing == value) {
            values.push(value.to_string());
        }
    }

    pub fn meta_value(&self, key: &str) -> Option<&[String]> {
        self.meta_information.get(key).map(Vec::as_slice)
    }

    /// Serialize in DIMACS format with comment extensions.
    pub fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "c File Format Version: 2.0")?;
        writeln!(out, "c Generated by ifdefect")?;
        writeln!(out, "c Type info:")?;
        writeln!(out, "c c sym <symbolname> <typeid>")?;
        writeln!(out, "c with <typeid> being an integer out of:")?;
        writeln!(
            out,
            "c enum {{S_BOOLEAN=1, S_TRISTATE=2, S_INT=3, S_HEX=4, S_STRING=5, S_OTHER=6}}"
        )?;
        writeln!(out, "c variable names:")?;
        writeln!(out, "c c var <variablename> <cnfvar>")?;
        for (key, values) in &self.meta_information {
            write!(out, "c meta_value {}", key)?;
            for value in values {
                write!(out, " {}", value)?;
            }
            writeln!(out)?;
        }
        for (symbol, symbol_type) in &self.symboltypes {
            writeln!(out, "c sym {} {}", symbol, symbol_type.id())?;
        }
        for (name, var) in &self.cnfvars {
            writeln!(out, "c var {} {}", name, var)?;
        }
        writeln!(out, "p cnf {} {}", self.varcount, self.clausecount)?;
        for &lit in &self.clauses {
            if lit == 0 {
                writeln!(out, "0")?;
            } else {
                write!(out, "{} ", lit)?;
            }
        }
        Ok(())
    }

    /// Load a CNF file.
    ///
    /// Comment lines may appear in any order before the header; unknown
    /// comment lines are ignored. A line that is neither a comment, the
    /// header, nor a clause is an error.
    pub fn read_from(input: impl BufRead) -> Result<Cnf, CnfError> {
        let var_regex = Regex::new(r"^c var (.+) (-?\d+)$")?;
        let sym_regex = Regex::new(r"^c sym (.+) (\d)$")?;
        let dim_regex = Regex::new(r"^p cnf (\d+) (\d+)$")?;
        let meta_regex = Regex::new(r"^c meta_value (\S+)\s+(.+)$")?;
        let clause_regex = Regex::new(r"^-?\d+")?;

        let mut cnf = Cnf::new();
        for line in input.lines() {
            let line = line?;
            if let Some(caps) = var_regex.captures(&line) {
                let var = caps[2].parse::<i32>().map_err(|_| {
                    CnfError::BadLine(line.clone())
                })?;
                cnf.set_cnf_var(&caps[1], var);
            } else if let Some(caps) = sym_regex.captures(&line) {
                let id = caps[2].parse::<u32>().map_err(|_| {
                    CnfError::BadLine(line.clone())
                })?;
                match SymbolType::from_id(id) {
                    Some(symbol_type) => cnf.set_symbol_type(&caps[1], symbol_type),
                    None => return Err(CnfError::BadLine(line)),
                }
            } else if dim_regex.is_match(&line) {
                // Header dimensions are implied by the clauses themselves.
            } else if let Some(caps) = meta_regex.captures(&line) {
                let key = caps[1].to_string();
                for value in caps[2].split_whitespace() {
                    cnf.add_meta_value(&key, value);
                }
            } else if clause_regex.is_match(&line) {
                for field in line.split_whitespace() {
                    let lit = field
                        .parse::<i32>()
                        .map_err(|_| CnfError::BadLine(line.clone()))?;
                    cnf.push_var(lit);
                }
            } else if line.starts_with("c ") || line == "c" {
                // Other comments are ignored.
            } else if !line.trim().is_empty() {
                error!("failed to parse line: '{}'", line);
                return Err(CnfError::BadLine(line));
            }
        }
        Ok(cnf)
    }
}

pub struct ClauseIter<'a> {
    rest: &'a [i32],
}

impl<'a> Iterator for ClauseIter<'a> {
    type Item = &'a [i32];

    fn next(&mut self) -> Option<&'a [i32]> {
        let end = self.rest.iter().position(|&lit| lit == 0)?;
        let clause = &self.rest[..end];
        self.rest = &self.rest[end + 1..];
        Some(clause)
    }
}
