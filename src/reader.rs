//! C3: Input Reader.
//!
//! Parses the fastq-like paired-record stream described in spec §4.3/§6
//! into `RegionPair`s. Structurally this is the same "read two alternating
//! records, zip them, fail loudly on a dangling tail" shape as
//! `irma-core`'s `DeinterleavedPairedReads`/`ZipReads`, just specialized to
//! this format's header/base/track layout instead of FASTQ.

use crate::error::Error;
use crate::region::{Region, RegionPair, TrackedPosition};
use std::io::BufRead;

/// One raw record before pairing: a name, optional verbatim header suffix,
/// the base string, and the per-track column-strings (all the same
/// length as the base string).
struct RawRecord {
    name:          String,
    header_suffix: Option<String>,
    bases:         String,
    tracks:        Vec<String>,
}

/// Reads [`RegionPair`]s one alternating pair at a time from a buffered
/// text stream.
pub struct PairedRecordReader<R> {
    lines:       std::iter::Peekable<std::io::Lines<R>>,
    stream_done: bool,
}

impl<R: BufRead> PairedRecordReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines:       reader.lines().peekable(),
            stream_done: false,
        }
    }

    /// Reads every pair in the stream into a `Vec`, preserving input order.
    ///
    /// ## Errors
    /// Returns [`Error::MissingHeader`] if a record does not begin with
    /// `@`, [`Error::MalformedInput`] for other structural violations (no
    /// `+` separator, a track line out of place), [`Error::TrackLengthMismatch`]
    /// when a track's length differs from the base line's, and
    /// [`Error::UnpairedInput`] when the stream ends with a dangling S1.
    pub fn read_all_pairs(mut self) -> Result<Vec<RegionPair>, Error> {
        let mut pairs = Vec::new();
        loop {
            let Some(first) = self.next_record()? else {
                break;
            };
            let Some(second) = self.next_record()? else {
                return Err(Error::UnpairedInput(format!(
                    "record '{}' has no matching second record to complete its pair",
                    first.name
                )));
            };
            pairs.push(pair_records(first, second)?);
        }
        Ok(pairs)
    }

    fn next_record(&mut self) -> Result<Option<RawRecord>, Error> {
        if self.stream_done {
            return Ok(None);
        }

        // Skip nothing: a leading blank line terminates the stream outright.
        let header = match self.lines.next() {
            None => {
                self.stream_done = true;
                return Ok(None);
            }
            Some(line) => line.map_err(Error::Io)?,
        };

        if header.trim().is_empty() {
            self.stream_done = true;
            return Ok(None);
        }

        let Some(tail) = header.strip_prefix('@') else {
            return Err(Error::MissingHeader(format!(
                "expected a line beginning with '@', found '{header}'"
            )));
        };

        let (name, header_suffix) = match tail.split_once("$$$") {
            Some((name, rest)) => (name.to_owned(), Some(format!("$$${rest}"))),
            None => (tail.to_owned(), None),
        };

        let mut bases = String::new();
        let found_plus = loop {
            match self.lines.next() {
                None => break false,
                Some(line) => {
                    let line = line.map_err(Error::Io)?;
                    if line.trim() == "+" {
                        break true;
                    }
                    bases.push_str(&line.to_ascii_uppercase());
                }
            }
        };

        if !found_plus {
            return Err(Error::MalformedInput(format!(
                "record '{name}' has no '+' separator before its track lines"
            )));
        }

        let mut tracks = Vec::new();
        loop {
            let should_take = match self.lines.peek() {
                None => {
                    self.stream_done = true;
                    false
                }
                Some(Err(_)) => true,
                Some(Ok(line)) => {
                    if line.trim().is_empty() {
                        self.stream_done = true;
                        self.lines.next();
                        false
                    } else {
                        !line.starts_with('@')
                    }
                }
            };

            if !should_take {
                break;
            }

            let line = self.lines.next().unwrap().map_err(Error::Io)?;
            if line.len() != bases.len() {
                return Err(Error::TrackLengthMismatch {
                    name:     name.clone(),
                    expected: bases.len(),
                    found:    line.len(),
                });
            }
            tracks.push(line);
        }

        Ok(Some(RawRecord {
            name,
            header_suffix,
            bases,
            tracks,
        }))
    }
}

fn build_region(record: RawRecord) -> Region {
    let num_tracks = record.tracks.len();
    let bases = record.bases.as_bytes();
    let mut positions = Vec::with_capacity(bases.len());

    for (i, &base) in bases.iter().enumerate() {
        let mut marks = 0u32;
        for (t, track) in record.tracks.iter().enumerate() {
            if track.as_bytes()[i] == b'1' {
                marks |= 1 << t;
            }
        }
        positions.push(TrackedPosition::new(base, marks));
    }

    Region::new(record.name, positions, num_tracks)
}

fn pair_records(first: RawRecord, second: RawRecord) -> Result<RegionPair, Error> {
    let name = first.name.clone();
    let header_suffix = first.header_suffix.clone();
    let k1 = first.tracks.len();
    let k2 = second.tracks.len();
    if k1 != k2 {
        return Err(Error::InconsistentTrackArity {
            name,
            k_query: k1,
            k_target: k2,
        });
    }

    let s1 = build_region(first);
    let s2 = build_region(second);
    Ok(RegionPair::new(name, s1, s2, header_suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_a_simple_one_track_pair() {
        let text = "@r1\nACG\n+\n010\n@r2\nACTG\n+\n0100\n";
        let pairs = PairedRecordReader::new(Cursor::new(text)).read_all_pairs().unwrap();
        assert_eq!(pairs.len(), 1);
        let pair = &pairs[0];
        assert_eq!(pair.name, "r1");
        assert_eq!(pair.s1.len(), 3);
        assert_eq!(pair.s2.len(), 4);
        assert_eq!(pair.s1.positions[1].marks, 1);
        assert_eq!(pair.s2.positions[1].marks, 1);
    }

    #[test]
    fn preserves_the_dollar_suffix_verbatim() {
        let text = "@r1$$$3$7\nAC\n+\n01\n@r2\nAC\n+\n01\n";
        let pairs = PairedRecordReader::new(Cursor::new(text)).read_all_pairs().unwrap();
        assert_eq!(pairs[0].name, "r1");
        assert_eq!(pairs[0].header_suffix.as_deref(), Some("$$$3$7"));
    }

    #[test]
    fn rejects_a_missing_header() {
        let text = "ACG\n+\n010\n";
        assert!(PairedRecordReader::new(Cursor::new(text)).read_all_pairs().is_err());
    }

    #[test]
    fn rejects_uneven_pair_counts() {
        let text = "@r1\nACG\n+\n010\n";
        let err = PairedRecordReader::new(Cursor::new(text)).read_all_pairs().unwrap_err();
        assert!(matches!(err, Error::UnpairedInput(_)));
    }

    #[test]
    fn rejects_a_track_length_mismatch() {
        let text = "@r1\nACG\n+\n01\n@r2\nACG\n+\n010\n";
        let err = PairedRecordReader::new(Cursor::new(text)).read_all_pairs().unwrap_err();
        assert!(matches!(err, Error::TrackLengthMismatch { .. }));
    }

    #[test]
    fn rejects_mismatched_track_arity_between_query_and_target() {
        let text = "@r1\nAC\n+\n01\n10\n@r2\nAC\n+\n01\n";
        let err = PairedRecordReader::new(Cursor::new(text)).read_all_pairs().unwrap_err();
        assert!(matches!(err, Error::InconsistentTrackArity { .. }));
    }

    #[test]
    fn a_trailing_blank_line_terminates_the_stream() {
        let text = "@r1\nAC\n+\n01\n@r2\nAC\n+\n01\n\n@r3\nAC\n+\n01\n@r4\nAC\n+\n01\n";
        let pairs = PairedRecordReader::new(Cursor::new(text)).read_all_pairs().unwrap();
        assert_eq!(pairs.len(), 1);
    }
}
