use crate::Cli;
use clap::{Args, CommandFactory, error::ErrorKind};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct AlignArgs {
    /// Fastq-like paired-track input file. Pass `-` to read from stdin.
    /// May be gzip-compressed (`.gz`).
    pub input: String,

    #[arg(short = 'e', long = "equil-file")]
    /// Evolutionary parameter bundle (substitution rate, indel rate,
    /// per-track rates, equilibria, channel weights). May be
    /// gzip-compressed (`.gz`).
    pub equil_file: PathBuf,

    #[arg(short = 'p', long = "processes", default_value_t = 1)]
    /// Number of worker threads to align pairs with.
    pub processes: usize,

    #[arg(short = 'o', long = "output")]
    /// Summary output path. Defaults to stdout when omitted.
    pub output: Option<PathBuf>,

    #[arg(short = 'O', long = "out-scores")]
    /// Score-vector output path. Enables score-vector mode when given.
    pub out_scores: Option<PathBuf>,

    #[arg(short = 'r', long = "align-path")]
    /// Alignment traceback output path. Enables traceback mode when given.
    pub align_path: Option<PathBuf>,
}

/// Aborts clap with a given error `message` due to a custom parsing error.
///
/// The subcommand should be specified as a lowercase string with `subcommand`
/// if available. This ensures the help message is as informative as possible.
/// If an invalid subcommand is passed, it will be ignored.
pub(crate) fn abort_clap(kind: ErrorKind, message: impl std::fmt::Display, subcommand: Option<&str>) -> ! {
    let mut command = Cli::command();

    if let Some(subcommand) = subcommand
        && let Some(c) = command.get_subcommands_mut().find(|c| c.get_name() == subcommand)
    {
        c.error(kind, message).exit();
    } else {
        command.error(kind, message).exit()
    }
}
