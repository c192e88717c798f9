//! C5: Traceback.
//!
//! Walks the backtrack matrix produced by C4 from an endpoint back to row
//! 0 or column 0, emitting the aligned base/track strings. See spec §4.5.
//!
//! This operates purely in query-row/target-column space; [`align_pair`]
//! relabels the result as S1/S2 depending on which physical region played
//! the query axis.
//!
//! [`align_pair`]: super::align_pair

use super::{BacktrackMatrix, Code};
use crate::region::{AlignmentPath, MatrixPoint, Region};

/// Reconstructs the alignment path ending at `endpoint`, labeling the
/// query-row region as "S1" and the target-column region as "S2" (the
/// caller remaps these if the kernel swapped roles).
pub fn reconstruct(row_region: &Region, col_region: &Region, backtrack: &BacktrackMatrix, endpoint: MatrixPoint) -> AlignmentPath {
    let num_tracks = row_region.num_tracks;

    let mut s1_bases = Vec::new();
    let mut s2_bases = Vec::new();
    let mut markers = Vec::new();
    let mut s1_tracks = vec![Vec::new(); num_tracks];
    let mut s2_tracks = vec![Vec::new(); num_tracks];

    let (mut i, mut j) = endpoint;

    while i > 0 && j > 0 {
        let code = backtrack
            .get(i, j)
            .expect("every cell on a walked traceback path was visited during the DP sweep");

        match code {
            Code::U => {
                let pos = row_region.positions[i - 1];
                push_position(&mut s1_bases, &mut s1_tracks, pos.base, pos.marks, num_tracks);
                push_gap(&mut s2_bases, &mut s2_tracks, num_tracks);
                i -= 1;
            }
            Code::L => {
                let pos = col_region.positions[j - 1];
                push_gap(&mut s1_bases, &mut s1_tracks, num_tracks);
                push_position(&mut s2_bases, &mut s2_tracks, pos.base, pos.marks, num_tracks);
                j -= 1;
            }
            Code::D => {
                let row_pos = row_region.positions[i - 1];
                let col_pos = col_region.positions[j - 1];
                push_position(&mut s1_bases, &mut s1_tracks, row_pos.base, row_pos.marks, num_tracks);
                push_position(&mut s2_bases, &mut s2_tracks, col_pos.base, col_pos.marks, num_tracks);
                i -= 1;
                j -= 1;
            }
            Code::Z => {
                // The diagonal insertion branch still consumes a query
                // index, but the query contributes no displayed base.
                let col_pos = col_region.positions[j - 1];
                push_gap(&mut s1_bases, &mut s1_tracks, num_tracks);
                push_position(&mut s2_bases, &mut s2_tracks, col_pos.base, col_pos.marks, num_tracks);
                i -= 1;
                j -= 1;
            }
        }

        let top = *s1_bases.last().unwrap();
        let bottom = *s2_bases.last().unwrap();
        markers.push(if top == bottom { b'|' } else { b' ' });
    }

    s1_bases.reverse();
    s2_bases.reverse();
    markers.reverse();
    for track in s1_tracks.iter_mut().chain(s2_tracks.iter_mut()) {
        track.reverse();
    }

    AlignmentPath {
        s1_bases: bytes_to_string(s1_bases),
        s2_bases: bytes_to_string(s2_bases),
        markers: bytes_to_string(markers),
        s1_tracks: s1_tracks.into_iter().map(bytes_to_string).collect(),
        s2_tracks: s2_tracks.into_iter().map(bytes_to_string).collect(),
    }
}

fn push_position(bases: &mut Vec<u8>, tracks: &mut [Vec<u8>], base: u8, marks: u32, num_tracks: usize) {
    bases.push(base);
    for (t, track) in tracks.iter_mut().enumerate().take(num_tracks) {
        track.push(if (marks >> t) & 1 == 1 { b'1' } else { b'0' });
    }
}

fn push_gap(bases: &mut Vec<u8>, tracks: &mut [Vec<u8>], num_tracks: usize) {
    bases.push(b'-');
    for track in tracks.iter_mut().take(num_tracks) {
        track.push(b'-');
    }
}

fn bytes_to_string(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).expect("traceback only emits ASCII bytes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::{AlignOptions, align_pair};
    use crate::model::{Model, ModelTables};
    use crate::params::ModelParams;
    use crate::region::{RegionPair, TrackedPosition};
    use std::sync::Arc;

    fn region(name: &str, bases: &str, marks: &[u32]) -> Region {
        let positions = bases
            .bytes()
            .zip(marks.iter())
            .map(|(b, &m)| TrackedPosition::new(b, m))
            .collect();
        Region::new(name.to_string(), positions, 1)
    }

    fn uniform_model() -> Model {
        let params = ModelParams {
            s: 0.1,
            mu: 0.01,
            kappa: vec![0.1],
            pi_base: [0.25, 0.25, 0.25, 0.25],
            pi_track: vec![(0.9, 0.1)],
            weights: vec![1.0, 0.0],
        };
        let tables = Arc::new(ModelTables::build(&params));
        Model::build(&params, tables, 20.0).unwrap()
    }

    /// Every aligned column reports the same length across S1, S2, markers,
    /// and every track string (spec §8 scenario 6).
    #[test]
    fn reconstructed_path_columns_are_all_the_same_length() {
        let model = uniform_model();
        let mut pair = RegionPair::new(
            "p".into(),
            region("s1", "ACG", &[0, 1, 0]),
            region("s2", "ACTG", &[0, 1, 0, 0]),
            None,
        );
        align_pair(&mut pair, &model, AlignOptions {
            want_traceback: true,
            ..Default::default()
        })
        .unwrap();

        let path = pair.alignment_path.unwrap();
        let len = path.s1_bases.len();
        assert_eq!(path.s2_bases.len(), len);
        assert_eq!(path.markers.len(), len);
        for track in path.s1_tracks.iter().chain(path.s2_tracks.iter()) {
            assert_eq!(track.len(), len);
        }
    }

    #[test]
    fn a_matched_column_gets_a_pipe_marker() {
        let model = uniform_model();
        let mut pair = RegionPair::new("p".into(), region("s1", "ACGT", &[0, 0, 0, 0]), region("s2", "ACGT", &[0, 0, 0, 0]), None);
        align_pair(&mut pair, &model, AlignOptions {
            want_traceback: true,
            ..Default::default()
        })
        .unwrap();

        let path = pair.alignment_path.unwrap();
        assert_eq!(path.s1_bases, "ACGT");
        assert_eq!(path.markers, "||||");
    }
}
