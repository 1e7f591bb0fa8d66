use std::env;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Error};
use clap::{value_t, App, AppSettings, Arg};
use env_logger::{fmt, Builder, Target};
use log::{error, info};
use log::{Level, LevelFilter, Record};

use peersat::config::Config;
use peersat::ending::SolveResult;
use peersat::engine::{EngineRef, SyntheticEngine};
use peersat::portfolio;
use peersat::transport::{TcpMesh, Transport};

use peersat_formula::dimacs::{parse_dimacs, read_dimacs_file};
use peersat_formula::CnfFormula;

mod wire_test;

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

    if let Ok(ref env_var) = env::var("PEERSAT_LOG") {
        builder.parse_filters(env_var);
    }

    builder.init();
}

fn banner() {
    info!("This is peersat {}", env!("CARGO_PKG_VERSION"));
    info!("  clause-exchange harness with synthetic solver engines");
}

fn main_with_err() -> Result<i32, Error> {
    let matches = App::new("peersat")
        .version(env!("CARGO_PKG_VERSION"))
        .setting(AppSettings::DisableHelpSubcommand)
        .about(
            "Races diversified clause producers on a CNF formula and \
             exchanges learned clauses locally and across processes.",
        )
        .arg_from_usage("[INPUT] 'The input CNF file to use (stdin if omitted)'")
        .arg_from_usage("[config-file] --config=[FILE] 'Read parameters from a TOML file'")
        .arg_from_usage("-c, --cpus=[N] 'Number of solver engines'")
        .arg_from_usage("-t, --timeout=[SECONDS] 'Wall-clock limit, 0 for none'")
        .arg_from_usage(
            "--shr-strat=[N] 'Local sharing strategy in 1..=5, 0 picks at random'",
        )
        .arg_from_usage("--shr-sleep=[MICROS] 'Sharer round period in microseconds'")
        .arg_from_usage("--shr-lit=[N] 'Local per-round literal budget'")
        .arg_from_usage("--dup 'Enable duplicate detection and promotion'")
        .arg_from_usage("--lbd-limit=[N] 'Maximum LBD of exported clauses'")
        .arg_from_usage("--gshr-lit=[N] 'Global per-round literal budget'")
        .arg(
            Arg::from_usage("--gshr-strat=[STRATEGY] 'Global sharing strategy'")
                .possible_values(&["allgather", "tree", "ring"]),
        )
        .arg_from_usage("--max-cls-size=[N] 'Maximum clause size in the global databases'")
        .arg_from_usage("--one-sharer 'Drive all strategies from one multi-sharer thread'")
        .arg_from_usage(
            "--ranks=[ADDRS] 'Comma separated host:port list enabling distributed sharing'",
        )
        .arg_from_usage("--rank=[N] 'This process position in the --ranks list'")
        .arg_from_usage(
            "--wire-test 'Check the wire round-trip of every global topology and exit'",
        )
        .get_matches();

    init_logging();
    banner();

    if matches.is_present("wire-test") {
        return wire_test::run();
    }

    let mut config = Config::default();

    if let Some(config_path) = matches.value_of("config-file") {
        config = Config::load(config_path)?;
    }

    if matches.is_present("cpus") {
        config.cpus = value_t!(matches, "cpus", usize)?;
    }
    if matches.is_present("timeout") {
        config.timeout = value_t!(matches, "timeout", i64)?;
    }
    if matches.is_present("shr-strat") {
        config.shr_strat = value_t!(matches, "shr-strat", u32)?;
    }
    if matches.is_present("shr-sleep") {
        config.shr_sleep = value_t!(matches, "shr-sleep", u64)?;
    }
    if matches.is_present("shr-lit") {
        config.shr_lit = value_t!(matches, "shr-lit", usize)?;
    }
    if matches.is_present("dup") {
        config.dup = true;
    }
    if matches.is_present("lbd-limit") {
        config.lbd_limit = value_t!(matches, "lbd-limit", u32)?;
    }
    if matches.is_present("gshr-lit") {
        config.gshr_lit = value_t!(matches, "gshr-lit", usize)?;
    }
    if matches.is_present("gshr-strat") {
        config.gshr_strat = match matches.value_of("gshr-strat").unwrap() {
            "allgather" => 1,
            "tree" => 2,
            "ring" => 3,
            other => return Err(anyhow!("unknown global strategy {}", other)),
        };
    }
    if matches.is_present("max-cls-size") {
        config.max_cls_size = value_t!(matches, "max-cls-size", usize)?;
    }
    if matches.is_present("one-sharer") {
        config.one_sharer = true;
    }

    // distributed mode is implied by a rank list
    let transport: Option<Arc<dyn Transport>> = match matches.value_of("ranks") {
        None => None,
        Some(ranks) => {
            let addrs = parse_ranks(ranks)?;
            let rank = value_t!(matches, "rank", usize)
                .context("--ranks needs --rank to know this process position")?;
            if rank >= addrs.len() {
                return Err(anyhow!("--rank {} is outside the rank list", rank));
            }
            info!("joining a {} rank mesh as rank {}", addrs.len(), rank);
            config.dist = true;
            Some(Arc::new(TcpMesh::connect(rank, &addrs)?))
        }
    };

    let formula = read_formula(matches.value_of("INPUT"))?;
    info!(
        "loaded formula with {} variables and {} clauses",
        formula.var_count(),
        formula.len()
    );

    let engines: Vec<EngineRef> = (0..config.cpus)
        .map(|id| EngineRef::new(Arc::new(SyntheticEngine::new(id as i32, config.lbd_limit))))
        .collect();
    // the strengthening strategy feeds each group through a reducer
    let reducers: Vec<EngineRef> = if config.shr_strat == 2 {
        (0..2)
            .map(|offset| {
                let id = (config.cpus + offset) as i32;
                EngineRef::new(Arc::new(SyntheticEngine::new(id, config.lbd_limit)))
            })
            .collect()
    } else {
        vec![]
    };

    let outcome = portfolio::run(&config, &formula, engines, reducers, transport)?;

    println!();
    match outcome.result {
        SolveResult::Sat => {
            println!("s SATISFIABLE");
            if !outcome.model.is_empty() {
                print_model(&outcome.model);
            }
            Ok(10)
        }
        SolveResult::Unsat => {
            println!("s UNSATISFIABLE");
            Ok(20)
        }
        SolveResult::Timeout => {
            println!("s TIMEOUT");
            Ok(0)
        }
        SolveResult::Unknown => {
            println!("s UNKNOWN");
            Ok(0)
        }
    }
}

fn read_formula(input: Option<&str>) -> Result<CnfFormula, Error> {
    match input {
        Some(path) => read_dimacs_file(path),
        None => {
            info!("reading formula from stdin");
            let stdin = io::stdin();
            let formula = parse_dimacs(stdin.lock())?;
            Ok(formula)
        }
    }
}

fn parse_ranks(ranks: &str) -> Result<Vec<SocketAddr>, Error> {
    ranks
        .split(',')
        .map(|addr| {
            addr.trim()
                .parse()
                .with_context(|| format!("invalid rank address {}", addr))
        })
        .collect()
}

fn print_model(model: &[peersat_formula::Lit]) {
    let mut line = String::from("v");
    for lit in model {
        line.push_str(&format!(" {}", lit));
    }
    line.push_str(" 0");
    println!("{}", line);
}
