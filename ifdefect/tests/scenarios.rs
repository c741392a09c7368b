//! End-to-end scenarios over the fixture files in `tests/data`.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use ifdefect::{
    load_symbol_list, ConfigurationModel, CoverageAnalyzer, CoverageStrategy, CppFile,
    DefectAnalyzer, DefectKind,
};
use ifdefect_formula::{parse, BoolExpr};

fn data(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(name)
}

/// Parse a fixture under its bare name, so file atoms come out as
/// `FILE_<fixture name>`.
fn fixture_file(name: &str) -> CppFile {
    let source = fs::read_to_string(data(name)).unwrap();
    CppFile::parse(name, &source).unwrap()
}

fn fixture_model(name: &str) -> ConfigurationModel {
    ConfigurationModel::from_file(data(name)).unwrap()
}

/// The clauses of a rendered core, as sets of literal names.
fn clause_set(text: &str) -> BTreeSet<BTreeSet<String>> {
    text.split(" ^ ")
        .map(|clause| {
            clause
                .trim_start_matches('(')
                .trim_end_matches(')')
                .split(" v ")
                .map(str::to_string)
                .collect()
        })
        .collect()
}

/// Top-level conjuncts in canonical printed form.
fn conjuncts(input: &str) -> BTreeSet<String> {
    fn flatten(expr: &BoolExpr, out: &mut BTreeSet<String>) {
        match expr {
            BoolExpr::And(l, r) => {
                flatten(l, out);
                flatten(r, out);
            }
            other => {
                out.insert(other.to_string());
            }
        }
    }
    let mut out = BTreeSet::new();
    flatten(&parse(input).unwrap(), &mut out);
    out
}

#[test]
fn dead_and_undead_detection_with_minimal_core() {
    let file = fixture_file("mus_test.c");
    let model = fixture_model("file-presence-conditions.model");

    let defects = DefectAnalyzer::new(&file, Some(&model)).analyze().unwrap();
    assert_eq!(defects.len(), 2);

    let undead = &defects[0];
    assert_eq!(undead.block, "B0");
    assert_eq!(undead.kind, DefectKind::Undead);
    assert_eq!(
        undead.report_name("mus_test.c"),
        "mus_test.c.B0.kconfig.globally.undead"
    );

    let dead = &defects[1];
    assert_eq!(dead.block, "B1");
    assert_eq!(dead.kind, DefectKind::Dead);
    assert_eq!(
        dead.report_name("mus_test.c"),
        "mus_test.c.B1.kconfig.globally.dead"
    );

    let mus = dead.mus.as_ref().unwrap();
    let expected = "(!B1 v !B0) ^ (B1) ^ (B0 v !CONFIG_BAR) ^ (B00) \
                    ^ (!B00 v FILE_mus_test.c) ^ (!CONFIG_FOO v CONFIG_BAR) \
                    ^ (!FILE_mus_test.c v CONFIG_FOO)";
    assert_eq!(clause_set(mus), clause_set(expected));
}

#[test]
fn block_precondition_without_a_model() {
    let file = fixture_file("preconditions.c");
    let b3 = file.block_by_name("B3").unwrap();
    let precondition = file.precondition(b3);
    let expected =
        "B3 && ( B2 <-> CONFIG_TOPLEVEL_C ) && ( B3 <-> B2 && CONFIG_LEVEL_C_B ) && B00";
    assert_eq!(parse(&precondition).unwrap(), parse(expected).unwrap());
}

#[test]
fn coverage_with_whitelist_and_blacklist() {
    let file = fixture_file("coverage_wl.c");
    let mut model = fixture_model("coverage_wl.model");
    for name in load_symbol_list(data("coverage_wl.whitelist")).unwrap() {
        model.add_meta_value("ALWAYS_ON", &name).unwrap();
    }
    for name in load_symbol_list(data("coverage_wl.blacklist")).unwrap() {
        model.add_meta_value("ALWAYS_OFF", &name).unwrap();
    }

    assert_eq!(file.blocks().len(), 5);

    let solutions = CoverageAnalyzer::new(&file, Some(&model))
        .block_coverage(CoverageStrategy::Simple)
        .unwrap();
    assert_eq!(solutions.len(), 1);

    let solution = &solutions[0];
    assert_eq!(solution.get("CONFIG_TO_BE_SET"), Some(&true));
    assert_eq!(solution.get("CONFIG_THAT_IS_ALWAYS_ON"), Some(&true));
    assert_eq!(solution.get("CONFIG_OFF"), Some(&false));
    assert_eq!(solution.get("FILE_coverage_wl.c"), Some(&true));

    let enabled: BTreeSet<&str> = solution
        .iter()
        .filter(|(name, &value)| ifdefect::is_block_name(name) && value)
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(enabled, vec!["B00", "B1", "B2"].into_iter().collect());

    // The minimizing strategy reaches the same single configuration and
    // agrees on the dead blocks.
    let minimized = CoverageAnalyzer::new(&file, Some(&model))
        .block_coverage(CoverageStrategy::Minimize)
        .unwrap();
    assert_eq!(minimized.len(), 1);
    let also_enabled: BTreeSet<&str> = minimized[0]
        .iter()
        .filter(|(name, &value)| ifdefect::is_block_name(name) && value)
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(also_enabled, enabled);
}

#[test]
fn macro_definitions_produce_rewrite_variants() {
    let file = fixture_file("cpppc-define.c");
    let precondition = file.file_precondition();
    let expected = "( B0 <-> CONFIG_A ) \
                    && ( B1 <-> CONFIG_C. ) \
                    && (B0 -> CONFIG_C.) \
                    && ((CONFIG_C  && !(B0)) -> CONFIG_C.) \
                    && ((CONFIG_C. && !(B0)) -> CONFIG_C ) \
                    && B00";
    assert_eq!(conjuncts(&precondition), conjuncts(expected));
}

#[test]
fn symbol_enumeration_against_the_model() {
    let file = fixture_file("cppsym.c");
    let model = fixture_model("x86.model");
    let report = model.symbol_report(
        file.referenced_symbols()
            .iter()
            .map(String::as_str),
    );
    assert_eq!(
        report,
        vec![
            "CONFIG_CGROUP_SCHED (BOOLEAN)",
            "CONFIG_FAIR_GROUP_SCHED (BOOLEAN)",
            "CONFIG_RT_GROUP_SCHED (BOOLEAN)",
            "CONFIG_SND_HDA_INTEL (TRISTATE)",
            "CONFIG_SPARC (MISSING)",
        ]
    );
}

#[test]
fn model_type_queries() {
    let model = fixture_model("x86.model");

    assert!(model.in_configuration_space("CONFIG_64BIT"));
    assert!(model.in_configuration_space("CONFIG_ACPI_BLACKLIST_YEAR"));
    assert!(model.in_configuration_space("CONFIG_ARM"));
    assert!(model.in_configuration_space("CONFIG_CGROUP_DEBUG"));
    assert!(model.in_configuration_space("CONFIG_IKCONFIG"));

    assert!(!model.is_boolean("ARM"));
    assert!(!model.is_tristate("ARM"));
    assert!(!model.is_boolean("ACPI_BLACKLIST_YEAR"));
    assert!(!model.is_tristate("ACPI_BLACKLIST_YEAR"));

    assert!(model.is_boolean("CGROUP_DEBUG"));
    assert!(model.is_boolean("64BIT"));
    assert!(model.is_tristate("IKCONFIG"));

    assert_eq!(model.definition("64BIT"), Some("arch/x86/Kconfig:4"));
}
