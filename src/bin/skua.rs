extern crate skua_phase;

#[macro_use]
extern crate log;

use anyhow::{bail, Context, Result};
use clap::{crate_version, Arg, ArgAction, ArgMatches, Command};
use env_logger::Builder;
use log::LevelFilter;
use rayon::prelude::*;

use skua_phase::evaluation::local_phasing_correctness::phasing_correctness;
use skua_phase::evaluation::phased_vcf::{read_phased_variants, shared_contigs};

fn build_cli() -> Command {
    Command::new("skua")
        .version(crate_version!())
        .about("Haplotype phasing and consensus toolkit for noisy long reads")
        .subcommand_required(true)
        .subcommand(
            Command::new("correctness")
                .about("Local phasing correctness of a query phased VCF against a truth phased VCF")
                .arg(
                    Arg::new("query")
                        .help("Query phased VCF (PASS, het, PS-tagged records are used)")
                        .required(true),
                )
                .arg(
                    Arg::new("truth")
                        .help("Truth phased VCF")
                        .required(true),
                )
                .arg(
                    Arg::new("decays")
                        .long("decays")
                        .help("Comma separated decay factors in [0, 1]")
                        .default_value("0.0,0.5,0.9,0.99,1.0"),
                )
                .arg(
                    Arg::new("threads")
                        .short('t')
                        .long("threads")
                        .help("Number of threads for decay evaluation")
                        .default_value("1"),
                )
                .arg(
                    Arg::new("verbose")
                        .short('v')
                        .long("verbose")
                        .action(ArgAction::Count)
                        .help("Increase logging verbosity"),
                ),
        )
}

fn set_log_level(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let mut builder = Builder::new();
    builder.filter_level(level);
    if std::env::var("RUST_LOG").is_ok() {
        builder.parse(&std::env::var("RUST_LOG").unwrap());
    }
    builder.init();
}

fn run_correctness(m: &ArgMatches) -> Result<()> {
    let query_path = m.get_one::<String>("query").unwrap();
    let truth_path = m.get_one::<String>("truth").unwrap();

    let decays: Vec<f64> = m
        .get_one::<String>("decays")
        .unwrap()
        .split(',')
        .map(|d| {
            d.trim()
                .parse::<f64>()
                .with_context(|| format!("Invalid decay value '{}'", d))
        })
        .collect::<Result<_>>()?;
    if decays.is_empty() {
        bail!("No decay values given");
    }

    let threads: usize = m
        .get_one::<String>("threads")
        .unwrap()
        .parse()
        .context("Invalid thread count")?;
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .context("Could not initialize thread pool")?;

    let query = read_phased_variants(query_path)
        .with_context(|| format!("Failed to read query VCF {}", query_path))?;
    let truth = read_phased_variants(truth_path)
        .with_context(|| format!("Failed to read truth VCF {}", truth_path))?;

    let contigs = shared_contigs(&query, &truth);
    if contigs.is_empty() {
        bail!("Query and truth VCFs share no contigs");
    }
    info!("Evaluating {} shared contigs", contigs.len());

    println!("#contig\tdecay\tcorrectness\tshared_het_variants");
    for contig in &contigs {
        let query_variants = &query[contig];
        let truth_variants = &truth[contig];

        let results: Vec<(f64, f64, usize)> = decays
            .par_iter()
            .map(|decay| {
                let (correctness, num_phased) =
                    phasing_correctness(query_variants, truth_variants, *decay)?;
                Ok((*decay, correctness, num_phased))
            })
            .collect::<Result<_, skua_phase::utils::errors::SkuaError>>()?;

        for (decay, correctness, num_phased) in results {
            println!("{}\t{}\t{:.6}\t{}", contig, decay, correctness, num_phased);
        }
    }

    Ok(())
}

fn main() {
    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("correctness", m)) => {
            set_log_level(m.get_count("verbose"));
            if let Err(e) = run_correctness(m) {
                error!("{:#}", e);
                std::process::exit(1);
            }
        }
        _ => unreachable!(),
    }
}
