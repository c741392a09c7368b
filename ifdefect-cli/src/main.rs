use std::fs::File;
use std::io::Write;

use anyhow::{anyhow, Context, Error};
use clap::{App, Arg};
use env_logger::{fmt, Builder};
use log::{error, info, Level, LevelFilter, Record};

use ifdefect::{
    load_symbol_list, write_configuration, ConfigurationModel, CoverageAnalyzer,
    CoverageStrategy, CppFile, DefectAnalyzer, DefectKind,
};

fn main() {
    let exit_code = match main_with_err() {
        Err(err) => {
            error!("{:#}", err);
            1
        }
        Ok(exit_code) => exit_code,
    };
    std::process::exit(exit_code);
}

fn main_with_err() -> Result<i32, Error> {
    let matches = App::new("ifdefect")
        .version(env!("CARGO_PKG_VERSION"))
        .about("dead/undead analysis and configuration coverage for preprocessor-guarded code")
        .arg(Arg::from_usage(
            "-m, --model [FILE] 'Configuration model to check against'",
        ))
        .arg(
            Arg::from_usage("-j, --job [JOB] 'Analysis to run'")
                .possible_values(&["dead", "coverage", "blockpc", "cppsym"])
                .default_value("dead"),
        )
        .arg(
            Arg::from_usage("-C, --coverage-strategy [STRATEGY] 'Coverage enumeration strategy'")
                .possible_values(&["simple", "min"])
                .default_value("simple"),
        )
        .arg(Arg::from_usage(
            "-W, --whitelist [FILE] 'Symbols to force on (ALWAYS_ON)'",
        ))
        .arg(Arg::from_usage(
            "-B, --blacklist [FILE] 'Symbols to force off (ALWAYS_OFF)'",
        ))
        .arg(Arg::from_usage(
            "--block [NAME] 'Block to report the precondition of (blockpc job)'",
        ))
        .arg(Arg::from_usage(
            "-v... 'Increase verbosity (-v debug, -vv trace)'",
        ))
        .arg(Arg::from_usage("<FILE>... 'Source files to analyze'"))
        .get_matches();

    let format = |buf: &mut fmt::Formatter, record: &Record| {
        if record.level() == Level::Info {
            writeln!(buf, "I: {}", record.args())
        } else {
            writeln!(buf, "{}: {}", &record.level().to_string()[..1], record.args())
        }
    };

    let level = match matches.occurrences_of("v") {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    Builder::new().format(format).filter(None, level).init();

    let model = match matches.value_of("model") {
        Some(path) => {
            let mut model = ConfigurationModel::from_file(path)
                .with_context(|| format!("failed to load model {}", path))?;
            if let Some(whitelist) = matches.value_of("whitelist") {
                let symbols = load_symbol_list(whitelist)
                    .with_context(|| format!("failed to load whitelist {}", whitelist))?;
                info!("loaded {} items to whitelist", symbols.len());
                for symbol in symbols {
                    model.add_meta_value("ALWAYS_ON", &symbol)?;
                }
            }
            if let Some(blacklist) = matches.value_of("blacklist") {
                let symbols = load_symbol_list(blacklist)
                    .with_context(|| format!("failed to load blacklist {}", blacklist))?;
                info!("loaded {} items to blacklist", symbols.len());
                for symbol in symbols {
                    model.add_meta_value("ALWAYS_OFF", &symbol)?;
                }
            }
            info!("using {} as primary model", model.name());
            Some(model)
        }
        None => None,
    };

    let job = matches.value_of("job").unwrap_or("dead");
    let strategy = match matches.value_of("coverage-strategy") {
        Some("min") => CoverageStrategy::Minimize,
        _ => CoverageStrategy::Simple,
    };
    let block = matches.value_of("block");

    let mut failures = 0;
    for path in matches.values_of("FILE").into_iter().flatten() {
        if let Err(err) = process_file(path, job, strategy, block, model.as_ref()) {
            error!("couldn't process {}: {:#}", path, err);
            failures += 1;
        }
    }
    Ok(if failures == 0 { 0 } else { 2 })
}

fn process_file(
    path: &str,
    job: &str,
    strategy: CoverageStrategy,
    block: Option<&str>,
    model: Option<&ConfigurationModel>,
) -> Result<(), Error> {
    let file = CppFile::from_path(path)?;
    match job {
        "blockpc" => {
            let index = match block {
                Some(name) => file
                    .block_by_name(name)
                    .ok_or_else(|| anyhow!("no block named {} in {}", name, path))?,
                None => 0,
            };
            match block {
                Some(_) => println!("{}", file.precondition(index)),
                None => println!("{}", file.file_precondition()),
            }
        }
        "cppsym" => match model {
            Some(model) => {
                for line in
                    model.symbol_report(file.referenced_symbols().iter().map(String::as_str))
                {
                    println!("{}", line);
                }
            }
            None => {
                for name in file.referenced_symbols() {
                    println!("{}", name);
                }
            }
        },
        "coverage" => {
            let solutions = CoverageAnalyzer::new(&file, model).block_coverage(strategy)?;
            let total = file.blocks().len();
            let covered: std::collections::BTreeSet<&String> = solutions
                .iter()
                .flat_map(|solution| {
                    solution
                        .iter()
                        .filter(|(name, &value)| ifdefect::is_block_name(name) && value)
                        .map(|(name, _)| name)
                })
                .collect();
            for (index, solution) in solutions.iter().enumerate() {
                let config_path = format!("{}.config{}", path, index + 1);
                let mut out = File::create(&config_path)
                    .with_context(|| format!("failed to create {}", config_path))?;
                write_configuration(solution, model, &mut out)?;
            }
            info!(
                "{}, found solutions: {}, coverage: {}/{} blocks enabled",
                path,
                solutions.len(),
                covered.len(),
                total
            );
        }
        _ => {
            let defects = DefectAnalyzer::new(&file, model).analyze()?;
            for defect in &defects {
                let report = defect.report_name(path);
                info!("creating {}", report);
                let mut out = File::create(&report)
                    .with_context(|| format!("failed to create {}", report))?;
                writeln!(out, "{}", file.file_precondition())?;
                if defect.kind == DefectKind::Dead {
                    if let Some(mus) = &defect.mus {
                        let mus_path = format!("{}.mus", report);
                        info!("creating {}", mus_path);
                        let mut out = File::create(&mus_path)
                            .with_context(|| format!("failed to create {}", mus_path))?;
                        writeln!(out, "{}", mus)?;
                    }
                }
            }
        }
    }
    Ok(())
}
