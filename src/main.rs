use clap::{Parser, Subcommand};
use epialignment::align::AlignOptions;
use epialignment::dispatch;
use epialignment::error::{Error, ExitCode};
use epialignment::io::{ReadFileZip, ReadInput, WriteFileZipStdout};
use epialignment::model::ModelTables;
use epialignment::params::ModelParams;
use epialignment::reader::PairedRecordReader;
use epialignment::writer;
use std::io::BufReader;
use std::sync::Arc;

mod args;

use args::AlignArgs;
use clap::error::ErrorKind;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Align(AlignArgs),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Align(args) => run_align(&args),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}

fn run_align(args: &AlignArgs) -> Result<(), Error> {
    if args.processes == 0 {
        args::abort_clap(ErrorKind::InvalidValue, "-p/--processes must be at least 1", Some("align"));
    }

    let params_reader = BufReader::new(ReadFileZip::open(&args.equil_file)?);
    let params = ModelParams::parse(params_reader)?;

    let input_reader = BufReader::new(ReadInput::open(&args.input)?);
    let pairs = PairedRecordReader::new(input_reader).read_all_pairs()?;

    if pairs.is_empty() {
        return Err(Error::NoInput);
    }

    // Only the run-invariant tables are built once; each pair derives its
    // own lambda/beta/link-probabilities/D from its own mean length inside
    // `dispatch::align_all`.
    let tables = Arc::new(ModelTables::build(&params));

    let opts = AlignOptions {
        want_score_vector: args.out_scores.is_some(),
        want_traceback:    args.align_path.is_some(),
    };

    let results = dispatch::align_all(pairs, &params, &tables, args.processes, opts)?;

    let mut summary_out = WriteFileZipStdout::create(args.output.as_ref())?;
    writer::write_summary(&mut summary_out, &results)?;

    if let Some(scores_path) = &args.out_scores {
        let mut scores_out = WriteFileZipStdout::create(Some(scores_path))?;
        writer::write_score_vectors(&mut scores_out, &results)?;
    }

    if let Some(align_path) = &args.align_path {
        let mut traceback_out = WriteFileZipStdout::create(Some(align_path))?;
        writer::write_traceback(&mut traceback_out, &results)?;
    }

    Ok(())
}
