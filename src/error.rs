//! Error types for the alignment engine and their mapping to process exit
//! codes, in the same hand-rolled style as `irma-core`'s `OpenFastqError` and
//! `ZipPairedReadsError` (manual `Display`/`Error` impls rather than
//! `thiserror`, plus a small marker trait for the numeric code).

use std::fmt;

/// A single error type spanning every recoverable failure in the engine,
/// with one variant per error kind.
#[non_exhaustive]
#[derive(Debug)]
pub enum Error {
    /// The parameter bundle could not be parsed: a non-numeric rate, a
    /// probability outside (0,1), or a weight count that does not match the
    /// number of tracks.
    MalformedParams(String),
    /// The derived model is degenerate: `(1 - exp(-mu) - mu*beta) < 0`, so
    /// the link probabilities are not well-defined for this pair's average
    /// length.
    InvalidParameters(String),
    /// A record is missing its `@` header line. Mirrors the reference
    /// parser's `Exception(301, ...)`.
    MissingHeader(String),
    /// A track column-string's length differs from the base line's length.
    TrackLengthMismatch { name: String, expected: usize, found: usize },
    /// Any other structurally malformed record (e.g. a track line appearing
    /// before `+`, or a non-binary character in a track).
    MalformedInput(String),
    /// An input pair's two regions disagree on the number of epigenomic
    /// tracks (K).
    InconsistentTrackArity {
        name:    String,
        k_query: usize,
        k_target: usize,
    },
    /// A pair failed during alignment in a worker, and the dispatcher has
    /// aborted the remaining work.
    WorkerFailure { name: String, source: Box<Error> },
    /// An index or side file that was expected to exist is missing.
    MissingIndex(String),
    /// The input file type was not recognized (e.g. empty file, wrong
    /// extension semantics).
    BadFileType(String),
    /// No input was provided at all.
    NoInput,
    /// The record stream ended with a dangling S1 that has no matching S2
    /// (an odd number of records). Mirrors the reference parser's
    /// `Exception(302, ...)`.
    UnpairedInput(String),
    /// A plain IO failure, propagated with context the way
    /// `MapFailedOpenExt`/`MapFailedWriteExt` add path context in `io::mod`.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedParams(msg) => write!(f, "malformed parameter file: {msg}"),
            Error::InvalidParameters(msg) => write!(f, "invalid model parameters: {msg}"),
            Error::MissingHeader(msg) => write!(f, "malformed input, missing header: {msg}"),
            Error::TrackLengthMismatch { name, expected, found } => write!(
                f,
                "pair '{name}' has a track whose length ({found}) does not match the base line ({expected})"
            ),
            Error::MalformedInput(msg) => write!(f, "malformed input: {msg}"),
            Error::InconsistentTrackArity {
                name,
                k_query,
                k_target,
            } => write!(
                f,
                "pair '{name}' has mismatched track counts (query has {k_query}, target has {k_target})"
            ),
            Error::WorkerFailure { name, source } => write!(f, "pair '{name}' failed: {source}"),
            Error::MissingIndex(msg) => write!(f, "missing index: {msg}"),
            Error::BadFileType(msg) => write!(f, "unrecognized input file type: {msg}"),
            Error::NoInput => write!(f, "no input provided"),
            Error::UnpairedInput(msg) => write!(f, "unpaired input: {msg}"),
            Error::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::WorkerFailure { source, .. } => Some(source),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// Maps an [`Error`] to the process exit code documented in spec §6.
pub trait ExitCode {
    fn exit_code(&self) -> i32;
}

impl ExitCode for Error {
    fn exit_code(&self) -> i32 {
        match self {
            Error::NoInput => 200,
            Error::BadFileType(_) => 201,
            Error::UnpairedInput(_) => 202,
            Error::TrackLengthMismatch { .. } => 203,
            Error::InconsistentTrackArity { .. } => 204,
            Error::InvalidParameters(_) => 206,
            Error::MissingHeader(_) => 301,
            Error::MalformedInput(_) | Error::MalformedParams(_) => 302,
            Error::MissingIndex(_) => 310,
            Error::WorkerFailure { source, .. } => source.exit_code(),
            Error::Io(_) => 1,
        }
    }
}
