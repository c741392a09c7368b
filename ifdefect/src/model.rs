//! Configuration models derived from dumped Kconfig facts.
//!
//! A model file carries one fact per line (`Item`, `Depends`, `Default`,
//! `ItemSelects`, `HasPrompts`, `Choice`, `ChoiceItem`, `Definition`) with
//! double-quoted expression fields. Loading computes one *local formula*
//! per symbol: its dependencies, the targets it selects, the
//! reverse-selector/default binding for promptless symbols, and mutual
//! exclusion inside choice groups. Analyses then slice the sub-model
//! reachable from the symbols a file actually mentions.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use log::{debug, error, info};
use regex::Regex;
use rustc_hash::FxHashMap;
use thiserror::Error;

use ifdefect_formula::{parse, BoolExpr};

use crate::cnf::SymbolType;
use crate::join::FormulaJoiner;

/// Possible errors while loading a configuration model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("invalid regular expression: {0}")]
    Regex(#[from] regex::Error),
}

/// Result of intersecting a model with the symbols a file references.
pub struct Intersect {
    /// The joined formula `(name -> (local formula))` over the slice, plus
    /// the forced ALWAYS_ON/ALWAYS_OFF literals known to the model.
    pub formula: String,
    /// Seed symbols unknown to both the model and the caller's predicate.
    pub missing: BTreeSet<String>,
    /// Number of sliced symbols the model knows.
    pub valid_items: usize,
}

/// A loaded configuration model.
pub struct ConfigurationModel {
    name: String,
    types: FxHashMap<String, SymbolType>,
    formulas: std::collections::BTreeMap<String, String>,
    definitions: FxHashMap<String, String>,
    meta: std::collections::BTreeMap<String, Vec<String>>,
    space_regex: Regex,
    item_regex: Regex,
    feature_regex: Regex,
}

/// Default configuration-space test: every `CONFIG_`-prefixed name.
pub const DEFAULT_SPACE_REGEX: &str = "^CONFIG_[^ ]+$";

impl ConfigurationModel {
    /// Load a model file; the file stem becomes the model name.
    pub fn from_file(path: impl AsRef<Path>) -> Result<ConfigurationModel, ModelError> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        let reader = BufReader::new(File::open(path)?);
        let model = Self::from_reader(&name, reader)?;
        info!("loaded configuration model for {}", model.name);
        Ok(model)
    }

    pub fn from_reader(
        name: &str,
        reader: impl BufRead,
    ) -> Result<ConfigurationModel, ModelError> {
        let facts = Facts::parse(reader)?;
        let mut model = ConfigurationModel {
            name: name.to_string(),
            types: FxHashMap::default(),
            formulas: Default::default(),
            definitions: facts.definitions.clone(),
            meta: Default::default(),
            space_regex: Regex::new(DEFAULT_SPACE_REGEX)?,
            item_regex: Regex::new(r"\b(?:CONFIG|FILE|FREE)_[A-Za-z0-9_.]*")?,
            feature_regex: Regex::new(r"^CONFIG_(.+?)(_MODULE)?$")?,
        };
        model.build(&facts);
        if model.formulas.is_empty() {
            // An empty model cannot possibly be complete.
            model.add_meta_value("CONFIGURATION_SPACE_INCOMPLETE", "1")?;
        }
        Ok(model)
    }

    fn build(&mut self, facts: &Facts) {
        let mut free_vars = 0u32;

        for (name, type_text) in &facts.items {
            self.types
                .insert(name.clone(), SymbolType::from_fact(type_text));
        }

        for (name, _) in &facts.items {
            let mut parts = Vec::new();
            push_depends(&mut parts, facts, name, &mut free_vars);
            push_selects(&mut parts, facts, name, &mut free_vars);
            if facts.prompts.get(name) == Some(&0) {
                parts.push(promptless_binding(facts, name, &mut free_vars));
            }
            push_choice_membership(&mut parts, facts, name);
            self.formulas.insert(full_name(name), render(parts));
        }

        for (group, required, _mode) in &facts.choices {
            let mut parts = Vec::new();
            push_depends(&mut parts, facts, group, &mut free_vars);
            if let Some(items) = facts.choice_items.get(group) {
                if !items.is_empty() {
                    parts.push(choice_alternatives(items, *required));
                }
            }
            self.formulas.insert(full_name(group), render(parts));
        }

        // Dependency facts for names that are not items, e.g. file
        // presence conditions keyed FILE_<path>.
        for (name, _) in &facts.depends {
            let key = full_name(name);
            if self.formulas.contains_key(&key) {
                continue;
            }
            let mut parts = Vec::new();
            push_depends(&mut parts, facts, name, &mut free_vars);
            self.formulas.insert(key, render(parts));
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a variable name belongs to the user-tunable space.
    pub fn in_configuration_space(&self, name: &str) -> bool {
        self.space_regex.is_match(name)
    }

    pub fn contains_symbol(&self, name: &str) -> bool {
        self.formulas.contains_key(name)
    }

    /// The stored local formula of a symbol; empty means unconstrained.
    pub fn formula(&self, name: &str) -> Option<&str> {
        self.formulas.get(name).map(String::as_str)
    }

    pub fn is_boolean(&self, item: &str) -> bool {
        self.types.get(item) == Some(&SymbolType::Boolean)
    }

    pub fn is_tristate(&self, item: &str) -> bool {
        self.types.get(item) == Some(&SymbolType::Tristate)
    }

    /// Type of a feature name, normalizing the `CONFIG_` prefix and a
    /// `_MODULE` suffix; `None` when the symbol is not in the model.
    pub fn type_of(&self, feature: &str) -> Option<SymbolType> {
        let caps = self.feature_regex.captures(feature)?;
        self.types.get(&caps[1]).copied()
    }

    pub fn definition(&self, item: &str) -> Option<&str> {
        self.definitions.get(item).map(String::as_str)
    }

    pub fn add_meta_value(&mut self, key: &str, value: &str) -> Result<(), ModelError> {
        let values = self.meta.entry(key.to_string()).or_default();
        if !values.iter().any(|existing| existing == value) {
            values.push(value.to_string());
        }
        if key == "CONFIGURATION_SPACE_REGEX" {
            if let Some(pattern) = self.meta.get(key).and_then(|v| v.first()) {
                self.space_regex = Regex::new(pattern)?;
                info!("set configuration space regex to '{}'", pattern);
            }
        }
        Ok(())
    }

    pub fn meta_value(&self, key: &str) -> Option<&[String]> {
        self.meta.get(key).map(Vec::as_slice)
    }

    /// A model is complete unless flagged otherwise; missing symbols are
    /// only forced off for complete models.
    pub fn is_complete(&self) -> bool {
        self.meta_value("CONFIGURATION_SPACE_INCOMPLETE").is_none()
    }

    /// Model-relevant identifiers occurring in a formula string.
    pub fn items_in(&self, text: &str) -> BTreeSet<String> {
        self.item_regex
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Least fixed point of "add every symbol mentioned by the local
    /// formula of an already included symbol".
    pub fn find_interesting(&self, seeds: &BTreeSet<String>) -> BTreeSet<String> {
        let mut result = seeds.clone();
        let mut work: Vec<String> = seeds.iter().cloned().collect();
        while let Some(item) = work.pop() {
            if let Some(formula) = self.formulas.get(&item) {
                if formula.is_empty() {
                    continue;
                }
                for found in self.items_in(formula) {
                    if result.insert(found.clone()) {
                        work.push(found);
                    }
                }
            }
        }
        result
    }

    /// Join the sliced local formulas for the given seed symbols.
    ///
    /// `checker` tells whether the analyzed file itself knows a symbol
    /// (e.g. one of its own macro definitions); configuration-space seeds
    /// unknown to both sides end up in `missing`. File presence atoms and
    /// other out-of-space names are never reported missing.
    pub fn intersect(
        &self,
        seeds: &BTreeSet<String>,
        checker: impl Fn(&str) -> bool,
    ) -> Intersect {
        let mut interesting = self.find_interesting(seeds);
        let always_on = self.meta_value("ALWAYS_ON").unwrap_or(&[]).to_vec();
        let always_off = self.meta_value("ALWAYS_OFF").unwrap_or(&[]).to_vec();
        for name in always_on.iter().chain(always_off.iter()) {
            interesting.insert(name.clone());
        }

        let mut joiner = FormulaJoiner::new();
        for name in &interesting {
            if let Some(formula) = self.formulas.get(name) {
                if !formula.is_empty() {
                    joiner.push(format!("({} -> ({}))", name, formula));
                }
            }
        }

        let mut missing = BTreeSet::new();
        let mut valid_items = 0;
        for name in &interesting {
            if self.formulas.contains_key(name) {
                valid_items += 1;
                if always_on.contains(name) {
                    joiner.push(name.clone());
                }
                if always_off.contains(name) {
                    joiner.push(format!("!{}", name));
                }
            } else if seeds.contains(name)
                && self.in_configuration_space(name)
                && !checker(name)
            {
                missing.insert(name.clone());
            }
        }
        debug!(
            "out of {} seed items {} have been put in the missing set",
            seeds.len(),
            missing.len()
        );
        Intersect {
            formula: joiner.join(" && "),
            missing,
            valid_items,
        }
    }

    /// One report line per referenced feature, alphabetically and with
    /// `_MODULE` variants folded onto their base symbol.
    pub fn symbol_report<'a>(
        &self,
        features: impl IntoIterator<Item = &'a str>,
    ) -> Vec<String> {
        let mut lines = BTreeSet::new();
        for feature in features {
            if let Some(caps) = self.feature_regex.captures(feature) {
                let base = &caps[1];
                let line = match self.types.get(base) {
                    Some(symbol_type) => format!("CONFIG_{} ({})", base, symbol_type),
                    None => format!("CONFIG_{} (MISSING)", base),
                };
                lines.insert(line);
            }
        }
        lines.into_iter().collect()
    }
}

/// Load a one-symbol-per-line list, used for whitelists and blacklists.
pub fn load_symbol_list(path: impl AsRef<Path>) -> io::Result<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);
    let mut symbols = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        symbols.push(line.to_string());
    }
    Ok(symbols)
}

/// The variable name of a symbol: already-prefixed names pass through.
fn full_name(name: &str) -> String {
    if name.starts_with("CONFIG_") || name.starts_with("FILE_") || name.starts_with("FREE_") {
        name.to_string()
    } else {
        format!("CONFIG_{}", name)
    }
}

fn render(parts: Vec<BoolExpr>) -> String {
    if parts.is_empty() {
        String::new()
    } else {
        BoolExpr::conj(parts).to_string()
    }
}

/// Parse a quoted fact expression; empty strings denote true. Parse errors
/// are logged and drop the expression.
fn parse_fact_expr(text: &str, free_vars: &mut u32) -> Option<BoolExpr> {
    if text.trim().is_empty() {
        return Some(BoolExpr::constant(true));
    }
    match parse(text) {
        Ok(expr) => Some(rewrite(&expr, free_vars)),
        Err(err) => {
            error!("skipping malformed expression '{}': {}", text, err);
            None
        }
    }
}

/// Rewrite fact expressions into model variables: bare symbol names gain
/// the `CONFIG_` prefix, `y`/`n` become constants, and `m` becomes a fresh
/// unconstrained variable.
fn rewrite(expr: &BoolExpr, free_vars: &mut u32) -> BoolExpr {
    match expr {
        BoolExpr::Var(name) => match name.as_str() {
            "y" => BoolExpr::constant(true),
            "n" => BoolExpr::constant(false),
            "m" | "unknown" => {
                *free_vars += 1;
                BoolExpr::var(format!("FREE_{}", free_vars))
            }
            _ => BoolExpr::var(full_name(name)),
        },
        BoolExpr::Const(_) | BoolExpr::Any(_) => expr.clone(),
        BoolExpr::Not(operand) => BoolExpr::not(rewrite(operand, free_vars)),
        BoolExpr::And(l, r) => BoolExpr::and(rewrite(l, free_vars), rewrite(r, free_vars)),
        BoolExpr::Or(l, r) => BoolExpr::or(rewrite(l, free_vars), rewrite(r, free_vars)),
        BoolExpr::Impl(l, r) => {
            BoolExpr::implies(rewrite(l, free_vars), rewrite(r, free_vars))
        }
        BoolExpr::Eq(l, r) => BoolExpr::iff(rewrite(l, free_vars), rewrite(r, free_vars)),
        BoolExpr::Call(name, args) => BoolExpr::Call(
            name.clone(),
            args.iter().map(|arg| rewrite(arg, free_vars)).collect(),
        ),
    }
}

fn push_depends(parts: &mut Vec<BoolExpr>, facts: &Facts, name: &str, free_vars: &mut u32) {
    if let Some(dep_texts) = facts.depends.get(name) {
        let exprs: Vec<BoolExpr> = dep_texts
            .iter()
            .filter_map(|text| parse_fact_expr(text, free_vars))
            .filter(|expr| *expr != BoolExpr::Const(true))
            .collect();
        if !exprs.is_empty() {
            parts.push(BoolExpr::disj(exprs));
        }
    }
}

fn push_selects(parts: &mut Vec<BoolExpr>, facts: &Facts, name: &str, free_vars: &mut u32) {
    if let Some(selects) = facts.selects.get(name) {
        for (target, visibility) in selects {
            let target_var = BoolExpr::var(full_name(target));
            match parse_fact_expr(visibility, free_vars) {
                Some(BoolExpr::Const(true)) => parts.push(target_var),
                Some(vis) => parts.push(BoolExpr::implies(vis, target_var)),
                None => {}
            }
        }
    }
}

/// A promptless symbol is on only through a reverse selector or a firing
/// default.
fn promptless_binding(facts: &Facts, name: &str, free_vars: &mut u32) -> BoolExpr {
    let mut alternatives = Vec::new();
    if let Some(selectors) = facts.selected_by.get(name) {
        for (selector, visibility) in selectors {
            let selector_var = BoolExpr::var(full_name(selector));
            let alternative = match parse_fact_expr(visibility, free_vars) {
                Some(BoolExpr::Const(true)) | None => selector_var,
                Some(vis) => BoolExpr::and(selector_var, vis),
            };
            alternatives.push(alternative);
        }
    }
    if let Some(defaults) = facts.defaults.get(name) {
        for (value, visibility) in defaults {
            let value_expr = match parse_fact_expr(value, free_vars) {
                Some(expr) => expr,
                None => continue,
            };
            let vis_expr = match parse_fact_expr(visibility, free_vars) {
                Some(expr) => expr,
                None => continue,
            };
            let alternative = BoolExpr::and(value_expr, vis_expr).simplify();
            if alternative != BoolExpr::Const(false) {
                alternatives.push(alternative);
            }
        }
    }
    BoolExpr::disj(alternatives)
}

fn push_choice_membership(parts: &mut Vec<BoolExpr>, facts: &Facts, name: &str) {
    if let Some(group) = facts.item_choice.get(name) {
        if let Some(items) = facts.choice_items.get(group) {
            for sibling in items {
                if sibling != name {
                    parts.push(BoolExpr::not(BoolExpr::var(full_name(sibling))));
                }
            }
        }
        parts.push(BoolExpr::var(full_name(group)));
    }
}

/// Exactly-one alternative per item, plus the all-off alternative for
/// optional groups.
fn choice_alternatives(items: &[String], required: bool) -> BoolExpr {
    let count = items.len() + if required { 0 } else { 1 };
    let mut alternatives = Vec::new();
    for selected in 0..count {
        let alternative = BoolExpr::conj(items.iter().enumerate().map(|(index, item)| {
            let var = BoolExpr::var(full_name(item));
            if index == selected {
                var
            } else {
                BoolExpr::not(var)
            }
        }));
        alternatives.push(alternative);
    }
    BoolExpr::disj(alternatives)
}

#[derive(Default)]
struct Facts {
    items: Vec<(String, String)>,
    depends: FxHashMap<String, Vec<String>>,
    prompts: FxHashMap<String, u32>,
    defaults: FxHashMap<String, Vec<(String, String)>>,
    selects: FxHashMap<String, Vec<(String, String)>>,
    selected_by: FxHashMap<String, Vec<(String, String)>>,
    choices: Vec<(String, bool, bool)>,
    choice_items: FxHashMap<String, Vec<String>>,
    item_choice: FxHashMap<String, String>,
    definitions: FxHashMap<String, String>,
}

impl Facts {
    fn parse(reader: impl BufRead) -> Result<Facts, ModelError> {
        let mut facts = Facts::default();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let fields = match split_fields(&line) {
                Some(fields) => fields,
                None => {
                    error!("failed to parse model line: '{}'", line);
                    continue;
                }
            };
            if !facts.record(&fields) {
                error!("failed to parse model line: '{}'", line);
            }
        }
        Ok(facts)
    }

    fn record(&mut self, fields: &[String]) -> bool {
        match fields {
            [kind, name, item_type] if kind == "Item" => {
                self.items.push((name.clone(), item_type.clone()));
            }
            [kind, name, expr] if kind == "Depends" => {
                self.depends.entry(name.clone()).or_default().push(expr.clone());
            }
            [kind, name, count] if kind == "HasPrompts" => match count.parse() {
                Ok(count) => {
                    self.prompts.insert(name.clone(), count);
                }
                Err(_) => return false,
            },
            [kind, name, value, visibility] if kind == "Default" => {
                self.defaults
                    .entry(name.clone())
                    .or_default()
                    .push((value.clone(), visibility.clone()));
            }
            [kind, name, target, visibility] if kind == "ItemSelects" => {
                self.selects
                    .entry(name.clone())
                    .or_default()
                    .push((target.clone(), visibility.clone()));
                self.selected_by
                    .entry(target.clone())
                    .or_default()
                    .push((name.clone(), visibility.clone()));
            }
            [kind, group, requirement, mode] if kind == "Choice" => {
                self.choices.push((
                    group.clone(),
                    requirement == "required",
                    mode == "tristate",
                ));
            }
            [kind, name, group] if kind == "ChoiceItem" => {
                self.choice_items
                    .entry(group.clone())
                    .or_default()
                    .push(name.clone());
                self.item_choice.insert(name.clone(), group.clone());
            }
            [kind, name, location] if kind == "Definition" => {
                self.definitions.insert(name.clone(), location.clone());
            }
            _ => return false,
        }
        true
    }
}

/// Split a fact line into whitespace-separated fields; double-quoted
/// fields may contain whitespace and escape `"` and `\` with a backslash.
/// Returns `None` on an unterminated quote.
fn split_fields(line: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
            chars.next();
        }
        match chars.peek() {
            None => return Some(fields),
            Some('"') => {
                chars.next();
                let mut field = String::new();
                loop {
                    match chars.next() {
                        None => return None,
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped @ '"') | Some(escaped @ '\\') => field.push(escaped),
                            Some(other) => {
                                field.push('\\');
                                field.push(other);
                            }
                            None => return None,
                        },
                        Some(other) => field.push(other),
                    }
                }
                fields.push(field);
            }
            Some(_) => {
                let mut field = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() {
                        break;
                    }
                    field.push(c);
                    chars.next();
                }
                fields.push(field);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_model(input: &str) -> ConfigurationModel {
        ConfigurationModel::from_reader("test", input.as_bytes()).unwrap()
    }

    #[test]
    fn field_splitting_handles_quotes_and_escapes() {
        assert_eq!(
            split_fields("Depends FOO \"BAR && BAZ\"").unwrap(),
            vec!["Depends", "FOO", "BAR && BAZ"]
        );
        assert_eq!(
            split_fields(r#"Definition FOO "a \"b\" \\ c""#).unwrap(),
            vec!["Definition", "FOO", r#"a "b" \ c"#]
        );
        assert_eq!(split_fields("Item\tFOO\tboolean").unwrap().len(), 3);
        assert!(split_fields("Depends FOO \"unterminated").is_none());
    }

    #[test]
    fn dependencies_become_prefixed_implications() {
        let model = load_model("Item FOO boolean\nItem BAR boolean\nDepends FOO \"BAR\"\n");
        assert_eq!(model.formula("CONFIG_FOO"), Some("CONFIG_BAR"));
        assert_eq!(model.formula("CONFIG_BAR"), Some(""));
        assert!(model.contains_symbol("CONFIG_FOO"));
        assert!(!model.contains_symbol("CONFIG_MISSING"));
    }

    #[test]
    fn multiple_depends_lines_are_disjoined() {
        let model = load_model("Item FOO boolean\nDepends FOO \"A\"\nDepends FOO \"B\"\n");
        assert_eq!(model.formula("CONFIG_FOO"), Some("CONFIG_A || CONFIG_B"));
    }

    #[test]
    fn tristate_values_rewrite_to_constants_and_free_items() {
        let model = load_model("Item FOO boolean\nDepends FOO \"A && y || n\"\n");
        assert_eq!(model.formula("CONFIG_FOO"), Some("CONFIG_A && 1 || 0"));
        let model = load_model("Item FOO boolean\nDepends FOO \"m\"\n");
        assert_eq!(model.formula("CONFIG_FOO"), Some("FREE_1"));
    }

    #[test]
    fn selects_imply_their_targets() {
        let model = load_model(
            "Item FOO boolean\nItem BAR boolean\n\
             ItemSelects FOO \"BAR\" \"\"\n\
             ItemSelects FOO \"BAZ\" \"GUARD\"\n",
        );
        assert_eq!(
            model.formula("CONFIG_FOO"),
            Some("CONFIG_BAR && (CONFIG_GUARD -> CONFIG_BAZ)")
        );
    }

    #[test]
    fn promptless_symbols_bind_to_selectors_and_defaults() {
        let model = load_model(
            "Item FOO boolean\nItem SEL boolean\n\
             HasPrompts FOO 0\n\
             ItemSelects SEL \"FOO\" \"\"\n\
             Default FOO \"y\" \"VIS\"\n",
        );
        assert_eq!(
            model.formula("CONFIG_FOO"),
            Some("CONFIG_SEL || CONFIG_VIS")
        );

        let unreachable = load_model("Item FOO boolean\nHasPrompts FOO 0\n");
        assert_eq!(unreachable.formula("CONFIG_FOO"), Some("0"));
    }

    #[test]
    fn choice_groups_are_mutually_exclusive() {
        let model = load_model(
            "Item A boolean\nItem B boolean\n\
             Choice CHOICE_0 required boolean\n\
             ChoiceItem A CHOICE_0\nChoiceItem B CHOICE_0\n",
        );
        assert_eq!(
            model.formula("CONFIG_A"),
            Some("!CONFIG_B && CONFIG_CHOICE_0")
        );
        assert_eq!(
            model.formula("CONFIG_CHOICE_0"),
            Some("CONFIG_A && !CONFIG_B || !CONFIG_A && CONFIG_B")
        );
    }

    #[test]
    fn optional_choice_groups_allow_no_selection() {
        let model = load_model(
            "Item A boolean\nItem B boolean\n\
             Choice CHOICE_0 optional boolean\n\
             ChoiceItem A CHOICE_0\nChoiceItem B CHOICE_0\n",
        );
        assert_eq!(
            model.formula("CONFIG_CHOICE_0"),
            Some("CONFIG_A && !CONFIG_B || !CONFIG_A && CONFIG_B || !CONFIG_A && !CONFIG_B")
        );
    }

    #[test]
    fn slicing_follows_formula_mentions() {
        let model = load_model(
            "Item FOO boolean\nItem BAR boolean\nItem BAZ boolean\nItem UNRELATED boolean\n\
             Depends FOO \"BAR\"\nDepends BAR \"BAZ\"\n",
        );
        let seeds: BTreeSet<String> = vec!["CONFIG_FOO".to_string()].into_iter().collect();
        let interesting = model.find_interesting(&seeds);
        assert!(interesting.contains("CONFIG_FOO"));
        assert!(interesting.contains("CONFIG_BAR"));
        assert!(interesting.contains("CONFIG_BAZ"));
        assert!(!interesting.contains("CONFIG_UNRELATED"));
    }

    #[test]
    fn intersect_joins_the_slice_and_reports_missing() {
        let model = load_model("Item FOO boolean\nItem BAR boolean\nDepends FOO \"BAR\"\n");
        let seeds: BTreeSet<String> = vec![
            "CONFIG_FOO".to_string(),
            "CONFIG_GONE".to_string(),
            "CONFIG_DEFINED_LOCALLY".to_string(),
        ]
        .into_iter()
        .collect();
        let result = model.intersect(&seeds, |name| name == "CONFIG_DEFINED_LOCALLY");
        assert_eq!(result.formula, "(CONFIG_FOO -> (CONFIG_BAR))");
        assert_eq!(result.valid_items, 2);
        assert_eq!(
            result.missing.iter().collect::<Vec<_>>(),
            vec!["CONFIG_GONE"]
        );
    }

    #[test]
    fn always_on_symbols_are_forced_in_the_intersection() {
        let mut model = load_model("Item FOO boolean\nItem BAR boolean\nDepends FOO \"BAR\"\n");
        model.add_meta_value("ALWAYS_ON", "CONFIG_BAR").unwrap();
        model.add_meta_value("ALWAYS_OFF", "CONFIG_FOO").unwrap();
        let result = model.intersect(&BTreeSet::new(), |_| false);
        assert_eq!(
            result.formula,
            "(CONFIG_FOO -> (CONFIG_BAR)) && CONFIG_BAR && !CONFIG_FOO"
        );
    }

    #[test]
    fn empty_models_are_incomplete() {
        let model = load_model("");
        assert!(!model.is_complete());
        let model = load_model("Item FOO boolean\n");
        assert!(model.is_complete());
    }

    #[test]
    fn configuration_space_uses_the_meta_regex() {
        let mut model = load_model("Item FOO boolean\n");
        assert!(model.in_configuration_space("CONFIG_ANYTHING"));
        assert!(!model.in_configuration_space("FILE_foo.c"));
        model
            .add_meta_value("CONFIGURATION_SPACE_REGEX", "^CONFIG_F")
            .unwrap();
        assert!(model.in_configuration_space("CONFIG_FOO"));
        assert!(!model.in_configuration_space("CONFIG_BAR"));
    }

    #[test]
    fn type_queries_normalize_feature_names() {
        let model = load_model("Item FOO boolean\nItem MOD tristate\n");
        assert_eq!(model.type_of("CONFIG_FOO"), Some(SymbolType::Boolean));
        assert_eq!(model.type_of("CONFIG_MOD_MODULE"), Some(SymbolType::Tristate));
        assert_eq!(model.type_of("CONFIG_GONE"), None);
        assert!(model.is_boolean("FOO"));
        assert!(!model.is_tristate("FOO"));
        assert!(model.is_tristate("MOD"));
    }

    #[test]
    fn symbol_report_folds_module_variants() {
        let model = load_model("Item FOO boolean\nItem SND tristate\n");
        let report = model.symbol_report(
            vec![
                "CONFIG_SND_MODULE",
                "CONFIG_SND",
                "CONFIG_FOO",
                "CONFIG_GONE",
            ]
            .into_iter(),
        );
        assert_eq!(
            report,
            vec![
                "CONFIG_FOO (BOOLEAN)",
                "CONFIG_GONE (MISSING)",
                "CONFIG_SND (TRISTATE)",
            ]
        );
    }
}
