
use log::{LevelFilter, error, info, warn};
use rust_lib_reference_genome::reference_genome::ReferenceGenome;
use std::time::Instant;

use calldiff::cli::core::{Commands, get_cli};
use calldiff::cli::diff::{DiffSettings, check_diff_settings};
use calldiff::data_types::outcome::Classification;
use calldiff::diff_engine::{DiffConfigBuilder, DiffError};
use calldiff::orderer::{ContigOrder, ContigOrderMode, InMemoryOrderer};
use calldiff::parsing::reference::{IndexedFastaReference, ReferenceProvider};
use calldiff::pipeline::run_diff;
use calldiff::util::json_io::save_json;
use calldiff::writers::report::DiffReport;
use calldiff::writers::summary::SummaryWriter;

fn run_diff_command(settings: DiffSettings) {
    // start the timer
    let start_time = Instant::now();

    // set up logging before we check the other settings
    let filter_level: LevelFilter = match settings.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace
    };
    env_logger::builder()
        .format_timestamp_millis()
        .filter_level(filter_level)
        .init();

    let resolved = match check_diff_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };
    let settings = &resolved.settings;

    // open the reference
    let mut reference: Box<dyn ReferenceProvider> = if settings.preload_reference {
        info!("Pre-loading reference genome into memory...");
        match ReferenceGenome::from_fasta(&settings.reference_fn) {
            Ok(rg) => Box::new(rg),
            Err(e) => {
                error!("Error while loading reference genome: {e:?}");
                std::process::exit(exitcode::IOERR);
            }
        }
    } else {
        info!("Opening indexed reference genome...");
        match IndexedFastaReference::from_path(&settings.reference_fn, settings.reference_index_fn.as_deref()) {
            Ok(ifr) => Box::new(ifr),
            Err(e) => {
                error!("Error while opening reference genome: {e:#}");
                std::process::exit(exitcode::IOERR);
            }
        }
    };

    let contig_order = match settings.contig_order {
        ContigOrderMode::Lexicographic => ContigOrder::Lexicographic,
        ContigOrderMode::Reference => ContigOrder::from_contigs(reference.contig_names().as_slice())
    };

    // build our diff configuration
    let diff_config = match DiffConfigBuilder::default()
        .equivalence(settings.equivalence)
        .contig_order(contig_order)
        .max_mismatches(settings.max_mismatches)
        .build() {
        Ok(dc) => dc,
        Err(e) => {
            error!("Error while building diff config: {e:?}");
            std::process::exit(exitcode::SOFTWARE);
        }
    };

    let stats = match run_diff(
        &resolved.lhs_source, &resolved.rhs_source, resolved.api_config.as_ref(),
        settings.presorted, &InMemoryOrderer, reference.as_mut(), &diff_config
    ) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while comparing calls: {e:#}");
            let code = match e {
                DiffError::Source { .. } => exitcode::IOERR,
                DiffError::OutOfOrderInput { .. } => {
                    error!("Inputs must be sorted when --presorted is set; remove it to sort in memory.");
                    exitcode::DATAERR
                },
                DiffError::ReferenceLookup(_) => exitcode::DATAERR
            };
            std::process::exit(code);
        }
    };

    info!("Diff results:");
    for classification in [Classification::Match, Classification::Mismatch, Classification::LhsOnly, Classification::RhsOnly] {
        info!("\t{}: {}", classification.as_ref(), stats.count(classification));
    }
    info!("\tConcordance: {:?}", stats.counts().concordance());
    if stats.truncated() {
        let non_matching = stats.counts().total() - stats.count(Classification::Match);
        warn!("Stopped after {non_matching} non-matching positions, statistics cover only part of the inputs.");
    }

    // the report is the only thing on stdout
    print!("{}", DiffReport::new(&settings.diff_label, &stats));

    if let Some(summary_fn) = settings.output_summary.as_deref() {
        info!("Saving output summary to {summary_fn:?}...");
        let summary_writer = SummaryWriter::new(settings.diff_label.clone());
        if let Err(e) = summary_writer.write_summary(&stats, summary_fn) {
            error!("Error while saving summary file: {e:#}");
            std::process::exit(exitcode::CANTCREAT);
        }
    }

    if let Some(json_fn) = settings.output_json.as_deref() {
        info!("Saving statistics to {json_fn:?}...");
        if let Err(e) = save_json(&stats, json_fn) {
            error!("Error while saving JSON file: {e:#}");
            std::process::exit(exitcode::CANTCREAT);
        }
    }

    info!("Diff completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn main() {
    let cli = get_cli();
    match cli.command {
        Commands::Diff(settings) => {
            run_diff_command(*settings);
        }
    }

    info!("Process finished successfully.");
}
