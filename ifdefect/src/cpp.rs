//! Conditional-block view of a source file.
//!
//! Only conditional-compilation structure is scanned: `#if`, `#ifdef`,
//! `#ifndef`, `#elif`, `#else`, `#endif`, plus `#define`/`#undef` of the
//! flags those conditions test. Blocks are named `B0, B1, …` in document
//! order under a root block `B00` that stands for the file itself; every
//! block records its parent and its previous sibling in the same
//! `#if`-chain.
//!
//! A flag defined or undefined inside a conditional block is rewritten:
//! later references resolve to a fresh variant name (one trailing `.` per
//! rewrite) and bridge formulas relate variant and original depending on
//! whether the defining block is selected.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use regex::Regex;
use rustc_hash::FxHashMap;
use thiserror::Error;

use ifdefect_formula::{parse, BoolExpr, ParseError};

use crate::join::{parenthesize, FormulaJoiner};

/// Possible errors while scanning a source file.
#[derive(Debug, Error)]
pub enum CppError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid regular expression: {0}")]
    Regex(#[from] regex::Error),
    #[error("{file}:{line}: unbalanced conditional directive")]
    Unbalanced { file: String, line: usize },
    #[error("{file}:{line}: conditional directive without a condition")]
    MissingCondition { file: String, line: usize },
    #[error("{file}:{line}: {source}")]
    BadExpression {
        file: String,
        line: usize,
        #[source]
        source: ParseError,
    },
}

/// True for generated block names (`B0`, `B1`, …, including `B00`).
pub fn is_block_name(name: &str) -> bool {
    name.len() > 1
        && name.starts_with('B')
        && name[1..].chars().all(|c| c.is_ascii_digit())
}

/// One conditional block.
pub struct Block {
    name: String,
    parent: Option<usize>,
    prev: Option<usize>,
    is_if: bool,
    guard: Option<BoolExpr>,
    start_line: usize,
    end_line: usize,
}

impl Block {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this block starts an `#if`-chain (as opposed to continuing
    /// one with `#elif`/`#else`).
    pub fn is_if_block(&self) -> bool {
        self.is_if
    }

    /// The local guard expression; `#else` blocks have none.
    pub fn guard(&self) -> Option<&BoolExpr> {
        self.guard.as_ref()
    }

    pub fn lines(&self) -> (usize, usize) {
        (self.start_line, self.end_line)
    }
}

struct DefineEvent {
    flag: String,
    old: String,
    new: String,
    block: usize,
    define: bool,
}

/// The parsed conditional structure of one source file.
pub struct CppFile {
    path: String,
    file_var: String,
    blocks: Vec<Block>,
    bridges: Vec<BoolExpr>,
    known: BTreeSet<String>,
    referenced: BTreeSet<String>,
}

impl CppFile {
    pub fn from_path(path: impl AsRef<Path>) -> Result<CppFile, CppError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)?;
        Self::parse(&path.to_string_lossy(), &source)
    }

    pub fn parse(path: &str, source: &str) -> Result<CppFile, CppError> {
        Scanner::new(path)?.scan(source)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The presence atom of this file, `FILE_<sanitized path>`.
    pub fn file_var(&self) -> &str {
        &self.file_var
    }

    /// All blocks, root first, then in document order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block_by_name(&self, name: &str) -> Option<usize> {
        self.blocks.iter().position(|block| block.name == name)
    }

    pub fn parent_of(&self, index: usize) -> Option<usize> {
        self.blocks[index].parent
    }

    pub fn prev_of(&self, index: usize) -> Option<usize> {
        self.blocks[index].prev
    }

    /// Identifiers referenced by the guard expressions, before macro
    /// rewriting.
    pub fn referenced_symbols(&self) -> &BTreeSet<String> {
        &self.referenced
    }

    /// Whether the file itself defines or undefines this name (any rewrite
    /// variant counts).
    pub fn knows_symbol(&self, name: &str) -> bool {
        self.known.contains(name)
    }

    /// The reachability formula of one block.
    ///
    /// `Bn <-> parent && !prev₁ && … && guard`, with the parent conjunct
    /// omitted directly under the root; the root itself is equivalent to
    /// the file presence atom.
    pub fn block_expression(&self, index: usize) -> BoolExpr {
        let block = &self.blocks[index];
        if index == 0 {
            return BoolExpr::iff(
                BoolExpr::var(block.name.clone()),
                BoolExpr::var(self.file_var.clone()),
            );
        }
        let mut parts = Vec::new();
        if let Some(parent) = block.parent {
            if parent != 0 {
                parts.push(BoolExpr::var(self.blocks[parent].name.clone()));
            }
        }
        let mut chain = Vec::new();
        let mut cursor = block.prev;
        while let Some(prev) = cursor {
            chain.push(prev);
            cursor = self.blocks[prev].prev;
        }
        for &prev in chain.iter().rev() {
            parts.push(BoolExpr::not(BoolExpr::var(self.blocks[prev].name.clone())));
        }
        if let Some(guard) = &block.guard {
            parts.push(guard.clone());
        }
        BoolExpr::iff(BoolExpr::var(block.name.clone()), BoolExpr::conj(parts))
    }

    /// The conjunction backing satisfiability queries: every block
    /// expression including the root's file equivalence, the macro bridge
    /// formulas, and the root assertion.
    pub fn code_constraints(&self) -> String {
        let mut joiner = FormulaJoiner::new();
        for index in 1..self.blocks.len() {
            joiner.push(parenthesize(&self.block_expression(index)));
        }
        joiner.push(parenthesize(&self.block_expression(0)));
        self.push_bridges(&mut joiner);
        joiner.push(self.blocks[0].name.clone());
        joiner.join(" && ")
    }

    /// The printable precondition of the whole file: all block expressions
    /// and bridges, without the file presence atom.
    pub fn file_precondition(&self) -> String {
        let mut joiner = FormulaJoiner::new();
        for index in 1..self.blocks.len() {
            joiner.push(parenthesize(&self.block_expression(index)));
        }
        self.push_bridges(&mut joiner);
        joiner.push(self.blocks[0].name.clone());
        joiner.join(" && ")
    }

    /// The printable precondition of one block: the block itself, the
    /// expressions of every block it transitively depends on (ancestors
    /// and previous siblings) in document order, and the bridges.
    pub fn precondition(&self, index: usize) -> String {
        let mut joiner = FormulaJoiner::new();
        joiner.push(self.blocks[index].name.clone());
        for &block in &self.required_blocks(index) {
            joiner.push(parenthesize(&self.block_expression(block)));
        }
        self.push_bridges(&mut joiner);
        joiner.push(self.blocks[0].name.clone());
        joiner.join(" && ")
    }

    /// Constraints for a subset of blocks, each forced on: the union of
    /// the expressions they depend on plus the block assertions.
    pub fn scoped_constraints(&self, indices: &[usize]) -> String {
        let mut joiner = FormulaJoiner::unique();
        for &index in indices {
            for &block in &self.required_blocks(index) {
                joiner.push(parenthesize(&self.block_expression(block)));
            }
            joiner.push(self.blocks[index].name.clone());
        }
        self.push_bridges(&mut joiner);
        joiner.push(self.blocks[0].name.clone());
        joiner.join(" && ")
    }

    /// Blocks whose expressions constrain `index`: itself, its ancestors,
    /// and the previous siblings of each, transitively. Sorted by block
    /// index, the root excluded.
    fn required_blocks(&self, index: usize) -> BTreeSet<usize> {
        let mut needed = BTreeSet::new();
        let mut work = vec![index];
        while let Some(current) = work.pop() {
            if current == 0 || !needed.insert(current) {
                continue;
            }
            if let Some(parent) = self.blocks[current].parent {
                work.push(parent);
            }
            if let Some(prev) = self.blocks[current].prev {
                work.push(prev);
            }
        }
        needed
    }

    fn push_bridges(&self, joiner: &mut FormulaJoiner) {
        for bridge in &self.bridges {
            joiner.push(parenthesize(bridge));
        }
    }

    /// Whether enabling this block contradicts a block of the same
    /// `#if`-chain that is already part of the configuration.
    pub fn conflicts_with(&self, index: usize, configuration: &BTreeSet<String>) -> bool {
        let mut current = index;
        loop {
            if configuration.contains(&self.blocks[current].name) {
                return true;
            }
            if self.blocks[current].is_if {
                return false;
            }
            match self.blocks[current].prev {
                Some(prev) => current = prev,
                None => return false,
            }
        }
    }
}

struct Scanner {
    path: String,
    defined_paren: Regex,
    defined_plain: Regex,
}

impl Scanner {
    fn new(path: &str) -> Result<Scanner, CppError> {
        Ok(Scanner {
            path: path.to_string(),
            defined_paren: Regex::new(r"defined\s*\(\s*([A-Za-z0-9_]+)\s*\)")?,
            defined_plain: Regex::new(r"defined\s+([A-Za-z0-9_]+)")?,
        })
    }

    fn scan(&self, source: &str) -> Result<CppFile, CppError> {
        let raw: Vec<&str> = source.lines().collect();

        let file_var = format!("FILE_{}", sanitize(&self.path));
        let mut blocks = vec![Block {
            name: "B00".to_string(),
            parent: None,
            prev: None,
            is_if: true,
            guard: Some(BoolExpr::var(file_var.clone())),
            start_line: 1,
            end_line: raw.len(),
        }];
        let mut open: Vec<usize> = vec![0];
        let mut counter = 0usize;
        let mut defines: FxHashMap<String, String> = FxHashMap::default();
        let mut events: Vec<DefineEvent> = Vec::new();
        let mut known = BTreeSet::new();
        let mut referenced = BTreeSet::new();

        let mut index = 0;
        while index < raw.len() {
            let line_no = index + 1;
            let mut logical = raw[index].to_string();
            while logical.ends_with('\\') && index + 1 < raw.len() {
                logical.pop();
                index += 1;
                logical.push_str(raw[index]);
            }
            index += 1;

            let trimmed = logical.trim_start();
            if !trimmed.starts_with('#') {
                continue;
            }
            let directive = trimmed[1..].trim_start();
            let keyword: String = directive
                .chars()
                .take_while(|c| c.is_ascii_alphabetic())
                .collect();
            let tail = strip_comment(directive[keyword.len()..].trim());

            match keyword.as_str() {
                "if" => {
                    let guard =
                        self.parse_condition(tail, line_no, &defines, &mut referenced)?;
                    let parent = top(&open);
                    push_block(&mut blocks, &mut open, &mut counter, Block {
                        name: String::new(),
                        parent: Some(parent),
                        prev: None,
                        is_if: true,
                        guard: Some(guard),
                        start_line: line_no,
                        end_line: line_no,
                    });
                }
                "ifdef" | "ifndef" => {
                    let flag = leading_ident(tail).ok_or_else(|| {
                        CppError::MissingCondition {
                            file: self.path.clone(),
                            line: line_no,
                        }
                    })?;
                    referenced.insert(flag.to_string());
                    let variant = defines
                        .get(flag)
                        .cloned()
                        .unwrap_or_else(|| flag.to_string());
                    let mut guard = BoolExpr::var(variant);
                    if keyword == "ifndef" {
                        guard = BoolExpr::not(guard);
                    }
                    let parent = top(&open);
                    push_block(&mut blocks, &mut open, &mut counter, Block {
                        name: String::new(),
                        parent: Some(parent),
                        prev: None,
                        is_if: true,
                        guard: Some(guard),
                        start_line: line_no,
                        end_line: line_no,
                    });
                }
                "elif" | "else" => {
                    let sibling = self.close(&mut blocks, &mut open, line_no)?;
                    let guard = if keyword == "elif" {
                        Some(self.parse_condition(tail, line_no, &defines, &mut referenced)?)
                    } else {
                        None
                    };
                    let parent = blocks[sibling].parent;
                    push_block(&mut blocks, &mut open, &mut counter, Block {
                        name: String::new(),
                        parent,
                        prev: Some(sibling),
                        is_if: false,
                        guard,
                        start_line: line_no,
                        end_line: line_no,
                    });
                }
                "endif" => {
                    self.close(&mut blocks, &mut open, line_no)?;
                }
                "define" | "undef" => {
                    if let Some(flag) = leading_ident(tail) {
                        let old = defines
                            .get(flag)
                            .cloned()
                            .unwrap_or_else(|| flag.to_string());
                        let new = format!("{}.", old);
                        known.insert(old.clone());
                        known.insert(new.clone());
                        defines.insert(flag.to_string(), new.clone());
                        events.push(DefineEvent {
                            flag: flag.to_string(),
                            old,
                            new,
                            block: top(&open),
                            define: keyword == "define",
                        });
                    }
                }
                _ => {}
            }
        }

        if open.len() != 1 {
            return Err(CppError::Unbalanced {
                file: self.path.clone(),
                line: raw.len(),
            });
        }

        let mut bridges = Vec::new();
        for event in &events {
            if !referenced.contains(&event.flag) {
                continue;
            }
            let block = BoolExpr::var(blocks[event.block].name.clone());
            let old = BoolExpr::var(event.old.clone());
            let new = BoolExpr::var(event.new.clone());
            bridges.push(if event.define {
                BoolExpr::implies(block.clone(), new.clone())
            } else {
                BoolExpr::implies(block.clone(), BoolExpr::not(new.clone()))
            });
            bridges.push(BoolExpr::implies(
                BoolExpr::and(old.clone(), BoolExpr::not(block.clone())),
                new.clone(),
            ));
            bridges.push(BoolExpr::implies(
                BoolExpr::and(new, BoolExpr::not(block)),
                old,
            ));
        }

        Ok(CppFile {
            path: self.path.clone(),
            file_var,
            blocks,
            bridges,
            known,
            referenced,
        })
    }

    fn parse_condition(
        &self,
        tail: &str,
        line: usize,
        defines: &FxHashMap<String, String>,
        referenced: &mut BTreeSet<String>,
    ) -> Result<BoolExpr, CppError> {
        let text = self.defined_paren.replace_all(tail, "$1");
        let text = self.defined_plain.replace_all(&text, "$1");
        let expr = parse(&text).map_err(|source| CppError::BadExpression {
            file: self.path.clone(),
            line,
            source,
        })?;
        expr.for_each_var(&mut |name| {
            referenced.insert(name.to_string());
        });
        Ok(expr.map_vars(&mut |name| defines.get(name).cloned()))
    }

    fn close(
        &self,
        blocks: &mut [Block],
        open: &mut Vec<usize>,
        line: usize,
    ) -> Result<usize, CppError> {
        match open.pop() {
            Some(0) | None => Err(CppError::Unbalanced {
                file: self.path.clone(),
                line,
            }),
            Some(index) => {
                blocks[index].end_line = line;
                Ok(index)
            }
        }
    }
}

fn top(open: &[usize]) -> usize {
    *open.last().unwrap_or(&0)
}

fn push_block(blocks: &mut Vec<Block>, open: &mut Vec<usize>, counter: &mut usize, mut block: Block) {
    block.name = format!("B{}", *counter);
    *counter += 1;
    let index = blocks.len();
    blocks.push(block);
    open.push(index);
}

fn leading_ident(text: &str) -> Option<&str> {
    let text = text.trim_start();
    let end = text
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    if end == 0 {
        None
    } else {
        Some(&text[..end])
    }
}

fn strip_comment(text: &str) -> &str {
    let text = match text.find("//") {
        Some(position) => &text[..position],
        None => text,
    };
    let text = match text.find("/*") {
        Some(position) => &text[..position],
        None => text,
    };
    text.trim()
}

fn sanitize(path: &str) -> String {
    path.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NESTED: &str = "#ifdef CONFIG_TOPLEVEL_A\n\
                          code\n\
                          #ifdef CONFIG_LEVEL_A_B\n\
                          code\n\
                          #endif\n\
                          code\n\
                          #endif\n\
                          #ifdef CONFIG_TOPLEVEL_C\n\
                          code\n\
                          #ifdef CONFIG_LEVEL_C_B\n\
                          code\n\
                          #endif\n\
                          code\n\
                          #else\n\
                          code\n\
                          #endif\n";

    #[test]
    fn block_names_follow_document_order() {
        let file = CppFile::parse("preconditions.c", NESTED).unwrap();
        let names: Vec<&str> = file.blocks().iter().map(Block::name).collect();
        assert_eq!(names, vec!["B00", "B0", "B1", "B2", "B3", "B4"]);
    }

    #[test]
    fn parents_and_siblings_are_linked() {
        let file = CppFile::parse("preconditions.c", NESTED).unwrap();
        let b1 = file.block_by_name("B1").unwrap();
        let b3 = file.block_by_name("B3").unwrap();
        let b4 = file.block_by_name("B4").unwrap();
        assert_eq!(file.parent_of(b1), file.block_by_name("B0"));
        assert_eq!(file.parent_of(b3), file.block_by_name("B2"));
        assert_eq!(file.parent_of(b4), Some(0));
        assert_eq!(file.prev_of(b4), file.block_by_name("B2"));
        assert!(!file.blocks()[b4].is_if_block());
        assert!(file.blocks()[b3].is_if_block());
    }

    #[test]
    fn block_expressions_include_parent_and_sibling_chain() {
        let file = CppFile::parse("preconditions.c", NESTED).unwrap();
        let b3 = file.block_by_name("B3").unwrap();
        let b4 = file.block_by_name("B4").unwrap();
        assert_eq!(
            file.block_expression(b3).to_string(),
            "B3 <-> B2 && CONFIG_LEVEL_C_B"
        );
        assert_eq!(file.block_expression(b4).to_string(), "B4 <-> !B2");
        assert_eq!(
            file.block_expression(0).to_string(),
            "B00 <-> FILE_preconditions.c"
        );
    }

    #[test]
    fn elif_chains_negate_all_previous_siblings() {
        let source = "#if A\n#elif B\n#elif C\n#else\n#endif\n";
        let file = CppFile::parse("chain.c", source).unwrap();
        let b2 = file.block_by_name("B2").unwrap();
        let b3 = file.block_by_name("B3").unwrap();
        assert_eq!(
            file.block_expression(b2).to_string(),
            "B2 <-> !B0 && !B1 && C"
        );
        assert_eq!(file.block_expression(b3).to_string(), "B3 <-> !B0 && !B1 && !B2");
    }

    #[test]
    fn defined_calls_are_unwrapped() {
        let source = "#if defined(CONFIG_A) && defined CONFIG_B\n#endif\n";
        let file = CppFile::parse("defined.c", source).unwrap();
        assert_eq!(
            file.block_expression(1).to_string(),
            "B0 <-> CONFIG_A && CONFIG_B"
        );
    }

    #[test]
    fn preconditions_list_needed_blocks_in_order() {
        let file = CppFile::parse("preconditions.c", NESTED).unwrap();
        let b3 = file.block_by_name("B3").unwrap();
        assert_eq!(
            file.precondition(b3),
            "B3 && (B2 <-> CONFIG_TOPLEVEL_C) && (B3 <-> B2 && CONFIG_LEVEL_C_B) && B00"
        );
    }

    #[test]
    fn defines_rewrite_later_references() {
        let source = "#undef X\n\
                      #define BUFFER 1000\n\
                      #ifdef CONFIG_A\n\
                      #define CONFIG_C\n\
                      #endif\n\
                      #ifdef CONFIG_C\n\
                      #endif\n";
        let file = CppFile::parse("cpppc-define.c", source).unwrap();
        assert_eq!(
            file.file_precondition(),
            "(B0 <-> CONFIG_A) && (B1 <-> CONFIG_C.) && (B0 -> CONFIG_C.) && \
             (CONFIG_C && !B0 -> CONFIG_C.) && (CONFIG_C. && !B0 -> CONFIG_C) && B00"
        );
        assert!(file.knows_symbol("CONFIG_C"));
        assert!(file.knows_symbol("CONFIG_C."));
        assert!(!file.knows_symbol("CONFIG_A"));
    }

    #[test]
    fn sibling_conflict_walk_stops_at_the_if_block() {
        let source = "#if A\n#elif B\n#else\n#endif\n#if C\n#endif\n";
        let file = CppFile::parse("conflict.c", source).unwrap();
        let b2 = file.block_by_name("B2").unwrap();
        let b3 = file.block_by_name("B3").unwrap();
        let config: BTreeSet<String> = vec!["B0".to_string()].into_iter().collect();
        assert!(file.conflicts_with(b2, &config));
        assert!(!file.conflicts_with(b3, &config));
    }

    #[test]
    fn unbalanced_files_are_rejected() {
        assert!(CppFile::parse("bad.c", "#endif\n").is_err());
        assert!(CppFile::parse("bad.c", "#if A\n").is_err());
        assert!(CppFile::parse("bad.c", "#else\n#endif\n").is_err());
    }

    #[test]
    fn block_names_are_recognized() {
        assert!(is_block_name("B0"));
        assert!(is_block_name("B00"));
        assert!(is_block_name("B172"));
        assert!(!is_block_name("B"));
        assert!(!is_block_name("CONFIG_B0"));
        assert!(!is_block_name("B0x"));
    }
}
