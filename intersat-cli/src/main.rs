use std::env;
use std::fs;
use std::io::{self, Write};

use anyhow::{Context, Error};
use clap::{App, AppSettings, Arg};
use env_logger::{fmt, Builder, Target};
use log::{error, info, Level, LevelFilter, Record};

use intersat::{BinaryDratWriter, DrupWriter, SolveResult, Solver, SolverConfig};

fn main() {
    init_logging();

    let exit_code = match main_with_err() {
        Err(err) => {
            error!("{}", err);
            1
        }
        Ok(exit_code) => exit_code,
    };
    std::process::exit(exit_code);
}

fn init_logging() {
    let format = |buf: &mut fmt::Formatter, record: &Record| {
        if record.level() == Level::Info {
            writeln!(buf, "c {}", record.args())
        } else {
            writeln!(buf, "c {}: {}", record.level(), record.args())
        }
    };

    let mut builder = Builder::new();
    builder
        .target(Target::Stdout)
        .format(format)
        .filter(None, LevelFilter::Info);

    if let Ok(ref env_var) = env::var("INTERSAT_LOG") {
        builder.parse_filters(env_var);
    }

    builder.init();
}

fn main_with_err() -> Result<i32, Error> {
    let matches = App::new("intersat")
        .version(env!("CARGO_PKG_VERSION"))
        .setting(AppSettings::DisableHelpSubcommand)
        .arg_from_usage("[INPUT] 'The input file to use (stdin if omitted)'")
        .arg_from_usage("[config-file] --config=[FILE] 'Read solver parameters from a TOML file'")
        .arg_from_usage("[proof-file] --proof=[FILE] 'Write a clausal proof to the specified file'")
        .arg(
            Arg::from_usage(
                "[proof-format] --proof-format=[FORMAT] 'Proof format to use (drup|binary-drat)'",
            )
            .default_value("drup")
            .possible_values(&["drup", "binary-drat"]),
        )
        .arg_from_usage("[seed] --seed=[SEED] 'Seed for the decision randomization'")
        .get_matches();

    let mut solver = Solver::new();

    if let Some(path) = matches.value_of("config-file") {
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path))?;
        let config: SolverConfig =
            toml::from_str(&content).with_context(|| format!("cannot parse config file {}", path))?;
        solver.set_config(config)?;
    }

    if let Some(seed) = matches.value_of("seed") {
        solver.set_rng_seed(seed.parse().context("seed must be an unsigned integer")?);
    }

    if let Some(path) = matches.value_of("proof-file") {
        let file = fs::File::create(path)
            .with_context(|| format!("cannot create proof file {}", path))?;
        match matches.value_of("proof-format") {
            Some("binary-drat") => solver.set_trace_sink(BinaryDratWriter::new(file))?,
            _ => solver.set_trace_sink(DrupWriter::new(file))?,
        }
    }

    match matches.value_of("INPUT") {
        Some(path) => {
            info!("solving {}", path);
            let file =
                fs::File::open(path).with_context(|| format!("cannot open input file {}", path))?;
            solver.add_dimacs_cnf(file)?;
        }
        None => {
            info!("solving from stdin");
            let stdin = io::stdin();
            solver.add_dimacs_cnf(stdin.lock())?;
        }
    }

    let result = solver.solve()?;

    let (propagations, decisions, conflicts) = solver.stats();
    info!(
        "{} propagations, {} decisions, {} conflicts",
        propagations, decisions, conflicts
    );

    let stdout = io::stdout();
    let mut stdout = stdout.lock();

    match result {
        SolveResult::Sat => {
            writeln!(stdout, "s SATISFIABLE")?;
            write_model(&mut stdout, &solver)?;
            Ok(10)
        }
        SolveResult::Unsat => {
            writeln!(stdout, "s UNSATISFIABLE")?;
            Ok(20)
        }
        SolveResult::Unknown => {
            writeln!(stdout, "s UNKNOWN")?;
            Ok(0)
        }
    }
}

fn write_model(target: &mut impl Write, solver: &Solver) -> Result<(), Error> {
    let model = solver.model().expect("model of a SAT result");

    let mut line_start = true;
    let mut column = 0;

    for lit in model {
        let token = lit.to_dimacs().to_string();
        if column + token.len() + 3 > 78 {
            writeln!(target)?;
            line_start = true;
            column = 0;
        }
        if line_start {
            write!(target, "v")?;
            line_start = false;
            column = 1;
        }
        write!(target, " {}", token)?;
        column += token.len() + 1;
    }
    if !line_start {
        writeln!(target)?;
    }
    writeln!(target, "v 0")?;

    Ok(())
}
