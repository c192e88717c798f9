//! C4: Alignment Kernel.
//!
//! Fills the two rolling log-space DP matrices described in spec §4.4 for
//! one `RegionPair`, reports the semi-global score/endpoint/start-point/
//! averaged score, and optionally the per-column score vector and the
//! dense backtrack matrix C5 walks.

pub mod traceback;

use crate::error::Error;
use crate::model::{Model, ModelTables};
use crate::region::{MatrixPoint, Region, RegionPair};
use std::sync::Arc;

const NEG_INF: f64 = f64::NEG_INFINITY;

/// One of the four moves a DP cell can have arrived from, recorded for
/// `RegionPair`s whose alignment path was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    /// "Upper": consume a query position, gap in target.
    U,
    /// Diagonal match branch of `ent1`.
    D,
    /// Diagonal insertion branch of `ent1` (target position treated as
    /// inserted even though the move still consumes a query index).
    Z,
    /// "Left": consume a target position, gap in query.
    L,
}

/// The dense `(m+1) x (n+1)` backtrack matrix, in query-row/target-column
/// space (see [`align_pair`] for how that space maps back onto S1/S2).
pub struct BacktrackMatrix {
    codes: Vec<Option<Code>>,
    cols:  usize,
}

impl BacktrackMatrix {
    fn new(rows: usize, cols: usize) -> Self {
        Self {
            codes: vec![None; rows * cols],
            cols,
        }
    }

    fn set(&mut self, row: usize, col: usize, code: Code) {
        self.codes[row * self.cols + col] = Some(code);
    }

    pub fn get(&self, row: usize, col: usize) -> Option<Code> {
        self.codes[row * self.cols + col]
    }
}

/// What [`align_pair`] should compute beyond the mandatory score/endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlignOptions {
    pub want_score_vector: bool,
    pub want_traceback:    bool,
}

/// The raw kernel output, in query-row (shorter region) / target-column
/// (longer region) space.
struct KernelOutput {
    score:          f64,
    averaged_score: f64,
    endpoint:       MatrixPoint,
    start_point:    MatrixPoint,
    score_vector:   Option<Vec<f64>>,
    backtrack:      Option<BacktrackMatrix>,
}

/// Runs C4 (and, if requested, C5) on `pair`, writing the results back into
/// its output fields. `pair.s1`/`pair.s2` are read-only; only the output
/// fields are mutated.
///
/// ## Errors
/// Returns [`Error::InconsistentTrackArity`] if `pair.s1` and `pair.s2`
/// disagree on track count (this should already have been caught by the
/// reader, but the kernel re-checks since it is the authoritative
/// precondition from spec §4.4), and propagates [`Error::InvalidParameters`]
/// from the [`Model`] build.
pub fn align_pair(pair: &mut RegionPair, model: &Model, opts: AlignOptions) -> Result<(), Error> {
    if pair.s1.num_tracks != pair.s2.num_tracks {
        return Err(Error::InconsistentTrackArity {
            name:     pair.name.clone(),
            k_query:  pair.s1.num_tracks,
            k_target: pair.s2.num_tracks,
        });
    }

    if pair.s1.is_empty() || pair.s2.is_empty() {
        pair.score = Some(0.0);
        pair.averaged_score = Some(0.0);
        pair.start_point = Some((0, 0));
        pair.endpoint = Some((0, 0));
        if opts.want_score_vector {
            pair.score_vector = Some(Vec::new());
        }
        return Ok(());
    }

    // The shorter region always plays the query/row axis; `row_is_s1`
    // records which physical region that was so results can be mapped
    // back onto (loc1, loc2)/(sp1, sp2) in S1/S2 terms.
    let row_is_s1 = pair.s1.len() <= pair.s2.len();
    let (row_region, col_region) = if row_is_s1 {
        (&pair.s1, &pair.s2)
    } else {
        (&pair.s2, &pair.s1)
    };

    let output = run_kernel(row_region, col_region, model, opts);

    let (loc1, loc2) = if row_is_s1 {
        (output.endpoint.0, output.endpoint.1)
    } else {
        (output.endpoint.1, output.endpoint.0)
    };
    let (sp1, sp2) = if row_is_s1 {
        (output.start_point.0, output.start_point.1)
    } else {
        (output.start_point.1, output.start_point.0)
    };

    pair.score = Some(output.score);
    pair.averaged_score = Some(output.averaged_score);
    pair.endpoint = Some((loc1, loc2));
    pair.start_point = Some((sp1, sp2));
    pair.score_vector = output.score_vector;

    if let Some(backtrack) = output.backtrack {
        let path = traceback::reconstruct(row_region, col_region, &backtrack, output.endpoint);
        pair.alignment_path = Some(if row_is_s1 {
            path
        } else {
            path.swapped()
        });
    }

    Ok(())
}

/// Runs the kernel but also returns every `(m2, m3)` pair computed along the
/// way, for the `m2_never_exceeds_m3` invariant test. Not used by production
/// code, which only needs the final [`KernelOutput`].
#[cfg(test)]
fn run_kernel_tracking_m2_m3(row_region: &Region, col_region: &Region, model: &Model) -> Vec<(f64, f64)> {
    let m = row_region.len();
    let n = col_region.len();
    let half_d = model.d / 2.0;

    let mut m3_prev = vec![0.0f64; n + 1];
    let mut pairs = Vec::new();

    for i in 1..=m {
        let mut m3_cur = vec![NEG_INF; n + 1];
        let mut m2_cur = vec![NEG_INF; n + 1];
        m3_cur[0] = 0.0;
        m2_cur[0] = 0.0;
        let row_pos = row_region.positions[i - 1];

        for j in 1..=n {
            let col_pos = col_region.positions[j - 1];
            let match_score = model.log_base_transition(row_pos.base, col_pos.base)
                + model.log_p1
                + model.log_combined_track_transition(row_pos.marks, col_pos.marks);
            let insert_query_score = model.log_p1_double_prime + model.log_joint_equilibrium(col_pos.base, col_pos.marks);
            let best_emit = match_score.max(insert_query_score);

            let ent0 = model.log_lambda_mu + model.log_p0_prime + m3_prev[j] - half_d;
            let ent1 = model.log_lambda_mu + best_emit + m3_prev[j - 1]
                - model.log_joint_equilibrium(col_pos.base, col_pos.marks)
                - model.d;
            let ent2 = model.log_lambda_beta + m2_cur[j - 1] - half_d;

            let (m3_val, _) = max3(ent0, ent1, ent2);
            m3_cur[j] = m3_val;
            m2_cur[j] = max2(ent1, ent2);
            pairs.push((m2_cur[j], m3_cur[j]));
        }

        m3_prev = m3_cur;
    }

    pairs
}

fn run_kernel(row_region: &Region, col_region: &Region, model: &Model, opts: AlignOptions) -> KernelOutput {
    let m = row_region.len();
    let n = col_region.len();
    let half_d = model.d / 2.0;

    let mut m3_prev = vec![0.0f64; n + 1];
    let mut sp3_prev: Vec<MatrixPoint> = (0..=n).map(|j| (0, j)).collect();

    let mut last_col = vec![0.0f64; m + 1];
    let mut last_col_sp: Vec<MatrixPoint> = vec![(0, 0); m + 1];
    last_col[0] = m3_prev[n];
    last_col_sp[0] = sp3_prev[n];

    let mut backtrack = opts.want_traceback.then(|| BacktrackMatrix::new(m + 1, n + 1));

    for i in 1..=m {
        let mut m3_cur = vec![NEG_INF; n + 1];
        let mut m2_cur = vec![NEG_INF; n + 1];
        let mut sp3_cur: Vec<MatrixPoint> = vec![(0, 0); n + 1];
        let mut sp2_cur: Vec<MatrixPoint> = vec![(0, 0); n + 1];

        // Column 0: free start along the query axis (see spec §4.4
        // initialisation; M2[i][0] is set equal to M3[i][0] so the first
        // `ent2` transition at j=1 is well-defined).
        m3_cur[0] = 0.0;
        m2_cur[0] = 0.0;
        sp3_cur[0] = (i, 0);
        sp2_cur[0] = (i, 0);

        let row_pos = row_region.positions[i - 1];

        for j in 1..=n {
            let col_pos = col_region.positions[j - 1];

            let match_score = model.log_base_transition(row_pos.base, col_pos.base)
                + model.log_p1
                + model.log_combined_track_transition(row_pos.marks, col_pos.marks);
            let insert_query_score = model.log_p1_double_prime + model.log_joint_equilibrium(col_pos.base, col_pos.marks);
            let (best_emit, match_branch) = if match_score >= insert_query_score {
                (match_score, true)
            } else {
                (insert_query_score, false)
            };

            let ent0 = model.log_lambda_mu + model.log_p0_prime + m3_prev[j] - half_d;
            let ent1 = model.log_lambda_mu + best_emit + m3_prev[j - 1]
                - model.log_joint_equilibrium(col_pos.base, col_pos.marks)
                - model.d;
            let ent2 = model.log_lambda_beta + m2_cur[j - 1] - half_d;

            let (m3_val, m3_src) = max3(ent0, ent1, ent2);
            m3_cur[j] = m3_val;
            m2_cur[j] = max2(ent1, ent2);

            sp3_cur[j] = match m3_src {
                Ent::Zero => sp3_prev[j],
                Ent::One => sp3_prev[j - 1],
                Ent::Two => sp2_cur[j - 1],
            };
            sp2_cur[j] = if ent1 >= ent2 { sp3_prev[j - 1] } else { sp2_cur[j - 1] };

            if let Some(bt) = backtrack.as_mut() {
                let code = match m3_src {
                    Ent::Zero => Code::U,
                    Ent::One => {
                        if match_branch {
                            Code::D
                        } else {
                            Code::Z
                        }
                    }
                    Ent::Two => Code::L,
                };
                bt.set(i, j, code);
            }
        }

        last_col[i] = m3_cur[n];
        last_col_sp[i] = sp3_cur[n];

        m3_prev = m3_cur;
        sp3_prev = sp3_cur;
    }

    let final_row = &m3_prev[1..=n];
    let final_col = &last_col[1..=m];

    let (r_val, r_idx) = argmax(final_row);
    let (c_val, c_idx) = argmax(final_col);

    let (score, endpoint, start_point) = if r_val >= c_val {
        (r_val, (m, r_idx + 1), sp3_prev[r_idx + 1])
    } else {
        (c_val, (c_idx + 1, n), last_col_sp[c_idx + 1])
    };

    let averaged_score = (final_row.iter().sum::<f64>() + final_col.iter().sum::<f64>()) / (m + n) as f64;

    let score_vector = opts.want_score_vector.then(|| {
        let mut v = Vec::with_capacity(m + n);
        v.extend_from_slice(final_row);
        v.extend_from_slice(final_col);
        v
    });

    KernelOutput {
        score,
        averaged_score,
        endpoint,
        start_point,
        score_vector,
        backtrack,
    }
}

#[derive(Clone, Copy)]
enum Ent {
    Zero,
    One,
    Two,
}

/// Picks the maximum of three candidates, preferring `ent0` over `ent1`
/// over `ent2` on ties, per spec §4.4.
fn max3(ent0: f64, ent1: f64, ent2: f64) -> (f64, Ent) {
    if ent0 >= ent1 && ent0 >= ent2 {
        (ent0, Ent::Zero)
    } else if ent1 >= ent2 {
        (ent1, Ent::One)
    } else {
        (ent2, Ent::Two)
    }
}

fn max2(ent1: f64, ent2: f64) -> f64 {
    if ent1 >= ent2 {
        ent1
    } else {
        ent2
    }
}

fn argmax(values: &[f64]) -> (f64, usize) {
    let mut best_val = values[0];
    let mut best_idx = 0;
    for (idx, &val) in values.iter().enumerate().skip(1) {
        if val > best_val {
            best_val = val;
            best_idx = idx;
        }
    }
    (best_val, best_idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ModelParams;
    use crate::region::TrackedPosition;

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

    #[test]
    fn m2_never_exceeds_m3() {
        let model = uniform_model();
        let row = region("q", "ACGT", &[0, 1, 0, 1]);
        let col = region("t", "ACGTACGT", &[0, 1, 0, 1, 0, 0, 1, 1]);
        for (m2, m3) in run_kernel_tracking_m2_m3(&row, &col, &model) {
            assert!(m2 <= m3, "m2 ({m2}) exceeded m3 ({m3})");
        }
    }

    #[test]
    fn identical_regions_reach_the_far_corner() {
        let model = uniform_model();
        let row = region("q", "ACGT", &[0, 0, 0, 0]);
        let col = region("t", "ACGT", &[0, 0, 0, 0]);
        let output = run_kernel(&row, &col, &model, AlignOptions::default());
        assert_eq!(output.endpoint, (4, 4));
        assert_eq!(output.start_point, (0, 0));
    }

    #[test]
    fn role_symmetry_swapping_regions_preserves_the_score() {
        let model = uniform_model();
        let row = region("q", "ACG", &[0, 1, 0]);
        let col = region("t", "ACTG", &[0, 1, 0, 0]);
        let forward = run_kernel(&row, &col, &model, AlignOptions::default());
        let reverse = run_kernel(&col, &row, &model, AlignOptions::default());
        assert!((forward.score - reverse.score).abs() < 1e-9);
    }

    #[test]
    fn a_single_target_gap_is_found() {
        let model = uniform_model();
        let row = region("q", "ACG", &[0, 1, 0]);
        let col = region("t", "ACTG", &[0, 1, 0, 0]);
        let output = run_kernel(&row, &col, &model, AlignOptions {
            want_traceback: true,
            ..Default::default()
        });
        assert_eq!(output.endpoint, (3, 4));
        let bt = output.backtrack.unwrap();
        let mut codes = Vec::new();
        let (mut i, mut j) = output.endpoint;
        while i > 0 && j > 0 {
            let code = bt.get(i, j).unwrap();
            codes.push(code);
            match code {
                Code::U => i -= 1,
                Code::L => j -= 1,
                Code::D | Code::Z => {
                    i -= 1;
                    j -= 1;
                }
            }
        }
        assert!(codes.contains(&Code::L));
    }

    #[test]
    fn score_vector_length_matches_m_plus_n() {
        let model = uniform_model();
        let row = region("q", "ACG", &[0, 1, 0]);
        let col = region("t", "ACTG", &[0, 1, 0, 0]);
        let output = run_kernel(&row, &col, &model, AlignOptions {
            want_score_vector: true,
            ..Default::default()
        });
        assert_eq!(output.score_vector.unwrap().len(), row.len() + col.len());
    }
}
