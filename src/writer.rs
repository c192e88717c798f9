//! C7: Result Writer.
//!
//! Emits the three output streams described in spec §4.7/§6: the mandatory
//! tab-separated summary, an optional comma-separated score-vector file,
//! and an optional wrapped traceback file. Built on [`WriteFileZipStdout`],
//! the same gzip/stdout-transparent sink `irma-core`'s writers use.

use crate::error::Error;
use crate::io::WriteFileZipStdout;
use crate::region::RegionPair;
use std::io::Write;

/// Traceback blocks wrap at this many columns, per spec §6.
const WRAP_WIDTH: usize = 100;

/// Writes the mandatory summary line for every pair: `name, L, L̄,
/// start_row, loc1, start_col, loc2`.
///
/// ## Errors
/// Returns [`Error::Io`] on a write failure, and assumes every pair already
/// carries `score`/`averaged_score`/`start_point`/`endpoint` (i.e. C4 has
/// run on it).
pub fn write_summary(out: &mut WriteFileZipStdout, pairs: &[RegionPair]) -> Result<(), Error> {
    for pair in pairs {
        let score = pair.score.expect("alignment must have run before writing the summary");
        let averaged = pair.averaged_score.expect("alignment must have run before writing the summary");
        let (start_row, start_col) = pair.start_point.expect("alignment must have run before writing the summary");
        let (loc1, loc2) = pair.endpoint.expect("alignment must have run before writing the summary");
        writeln!(
            out,
            "{}\t{score}\t{averaged}\t{start_row}\t{loc1}\t{start_col}\t{loc2}",
            pair.display_name()
        )?;
    }
    Ok(())
}

/// Writes one comma-separated score-vector line per pair: `name, v1, v2,
/// …, v_{m+n}`.
///
/// ## Errors
/// Returns [`Error::Io`] on a write failure.
pub fn write_score_vectors(out: &mut WriteFileZipStdout, pairs: &[RegionPair]) -> Result<(), Error> {
    for pair in pairs {
        let vector = pair
            .score_vector
            .as_ref()
            .expect("score-vector mode must have been requested before writing it");
        write!(out, "{}", pair.display_name())?;
        for v in vector {
            write!(out, ",{v}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Writes the traceback blocks for every pair with a reconstructed path:
/// a `@Sequence name: <name>` header, then K lines of S1 marks, the S1
/// bases, the match markers, the S2 bases, and K lines of S2 marks, each
/// wrapped to [`WRAP_WIDTH`] columns and separated from the next block by a
/// blank line.
///
/// ## Errors
/// Returns [`Error::Io`] on a write failure.
pub fn write_traceback(out: &mut WriteFileZipStdout, pairs: &[RegionPair]) -> Result<(), Error> {
    for pair in pairs {
        let Some(path) = pair.alignment_path.as_ref() else {
            continue;
        };
        writeln!(out, "@Sequence name: {}", pair.display_name())?;

        let len = path.s1_bases.len();
        let mut start = 0;
        while start < len || len == 0 {
            let end = (start + WRAP_WIDTH).min(len);

            // S1's K track lines print top-down in reversed (descending)
            // index order; S2's print ascending. Not a typo.
            for track in path.s1_tracks.iter().rev() {
                writeln!(out, "{}", &track[start..end])?;
            }
            writeln!(out, "{}", &path.s1_bases[start..end])?;
            writeln!(out, "{}", &path.markers[start..end])?;
            writeln!(out, "{}", &path.s2_bases[start..end])?;
            for track in &path.s2_tracks {
                writeln!(out, "{}", &track[start..end])?;
            }

            if len == 0 {
                break;
            }
            start = end;
        }
        writeln!(out)?;
    }
    Ok(())
}
