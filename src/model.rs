//! C2: Model Builder.
//!
//! Derives the log-space base and per-track transition tables and the
//! joint equilibrium table once per run ([`ModelTables`]), and — per
//! `RegionPair`, from that pair's own average length — the link
//! probabilities and the path-length normalisation constant `D`
//! ([`Model`]). See spec §3/§4.2: λ (and everything derived from it) is a
//! per-pair quantity, not a run-wide constant.
//!
//! The combined per-track transition and the joint equilibrium are stored
//! as dense flat tables indexed by a `u32` bitmask over the 2^K epigenomic
//! state space, per the design note against string- or char-keyed
//! containers: there is no `HashMap` anywhere in this module.

use crate::error::Error;
use crate::params::{BASES, ModelParams};
use std::sync::Arc;

/// The run-invariant log-space tables: built once from [`ModelParams`] and
/// shared read-only across every pair and every worker.
#[derive(Debug, Clone)]
pub struct ModelTables {
    pub num_tracks: usize,
    /// `1 << num_tracks`, the size of the epigenomic state space.
    pub num_states: usize,

    /// `log_f[b][b'] = w0 * log(f(b -> b'))`, indexed by position in
    /// [`BASES`].
    log_f: [[f64; 4]; 4],
    /// Flat `num_states x num_states` table: `combined_logg[e * num_states
    /// + e'] = sum_i w_i * log(g_i(bit_i(e) -> bit_i(e')))`.
    combined_logg: Vec<f64>,
    /// Flat `4 x num_states` table: `joint_equilib[b * num_states + e] =
    /// w0 * log(pi_base(b)) + sum_i w_i * log(pi_i(bit_i(e)))`.
    joint_equilib: Vec<f64>,
}

impl ModelTables {
    pub fn build(params: &ModelParams) -> Self {
        let w0 = params.weights[0];
        let log_f = build_base_transition(params.s, &params.pi_base, w0);

        let num_tracks = params.num_tracks();
        let num_states = 1usize << num_tracks;
        let combined_logg = build_combined_logg(params, num_states);
        let joint_equilib = build_joint_equilibrium(params, num_states);

        ModelTables {
            num_tracks,
            num_states,
            log_f,
            combined_logg,
            joint_equilib,
        }
    }

    #[inline]
    fn base_index(base: u8) -> usize {
        BASES.iter().position(|b| *b == base).unwrap_or(0)
    }

    /// `w0 * log(f(from -> to))`, the weighted log base transition.
    #[inline]
    pub fn log_base_transition(&self, from: u8, to: u8) -> f64 {
        self.log_f[Self::base_index(from)][Self::base_index(to)]
    }

    /// The combined, weighted log transition across all tracks at once.
    #[inline]
    pub fn log_combined_track_transition(&self, from_marks: u32, to_marks: u32) -> f64 {
        self.combined_logg[from_marks as usize * self.num_states + to_marks as usize]
    }

    /// The joint base x epi-state equilibrium log weight of an inserted
    /// target position.
    #[inline]
    pub fn log_joint_equilibrium(&self, base: u8, marks: u32) -> f64 {
        self.joint_equilib[Self::base_index(base) * self.num_states + marks as usize]
    }
}

/// The per-pair derived model: one `RegionPair`'s link probabilities and
/// path-length normalisation constant, plus a handle to the shared
/// [`ModelTables`].
#[derive(Debug, Clone)]
pub struct Model {
    tables: Arc<ModelTables>,

    /// `log(p'_0) = log(mu * beta)`.
    pub log_p0_prime: f64,
    /// `log(p_1)`.
    pub log_p1: f64,
    /// `log(p''_1)`.
    pub log_p1_double_prime: f64,
    /// `log(lambda / mu)`.
    pub log_lambda_mu: f64,
    /// `log(lambda * beta)`.
    pub log_lambda_beta: f64,
    /// Path-length normalisation constant, subtracted once per diagonal
    /// step (half for each half-diagonal contribution).
    pub d: f64,
}

impl Model {
    /// Derives a [`Model`] for one pair's average region length `mean_len =
    /// (|S1| + |S2|) / 2`, against the shared `tables`.
    ///
    /// ## Errors
    /// Returns [`Error::InvalidParameters`] if `(1 - exp(-mu) - mu*beta) <
    /// 0`, in which case the link probabilities (and hence the score) are
    /// undefined for this pair's length.
    pub fn build(params: &ModelParams, tables: Arc<ModelTables>, mean_len: f64) -> Result<Self, Error> {
        let mu = params.mu;
        let lambda = mu * mean_len / (mean_len + 2.0);
        let exp_lambda_minus_mu = (lambda - mu).exp();
        let beta = (1.0 - exp_lambda_minus_mu) / (mu - lambda * exp_lambda_minus_mu);

        let survival = survival_term(mu, beta);
        if survival < 0.0 {
            return Err(Error::InvalidParameters(format!(
                "(1 - exp(-mu) - mu*beta) = {survival} < 0 for mean length {mean_len}"
            )));
        }

        let lambda_beta = lambda * beta;
        let p0_prime = mu * beta;
        let p1 = (-mu).exp() * (1.0 - lambda_beta);
        let p1_double_prime = 1.0 - lambda_beta;

        let log_p1 = p1.ln();
        let log_p1_double_prime = p1_double_prime.ln();
        let log_lambda_mu = (lambda / mu).ln();
        let log_lambda_beta = lambda_beta.ln();
        let d = log_p1.max(log_p1_double_prime) + log_lambda_mu;

        Ok(Model {
            tables,
            log_p0_prime: p0_prime.ln(),
            log_p1,
            log_p1_double_prime,
            log_lambda_mu,
            log_lambda_beta,
            d,
        })
    }

    #[inline]
    pub fn num_tracks(&self) -> usize {
        self.tables.num_tracks
    }

    #[inline]
    pub fn num_states(&self) -> usize {
        self.tables.num_states
    }

    /// `w0 * log(f(from -> to))`, the weighted log base transition.
    #[inline]
    pub fn log_base_transition(&self, from: u8, to: u8) -> f64 {
        self.tables.log_base_transition(from, to)
    }

    /// The combined, weighted log transition across all tracks at once.
    #[inline]
    pub fn log_combined_track_transition(&self, from_marks: u32, to_marks: u32) -> f64 {
        self.tables.log_combined_track_transition(from_marks, to_marks)
    }

    /// The joint base x epi-state equilibrium log weight of an inserted
    /// target position.
    #[inline]
    pub fn log_joint_equilibrium(&self, base: u8, marks: u32) -> f64 {
        self.tables.log_joint_equilibrium(base, marks)
    }
}

/// `1 - exp(-mu) - mu*beta`: the degenerate-model validity check from spec
/// §4.2. Negative means the link probabilities are not well-defined.
fn survival_term(mu: f64, beta: f64) -> f64 {
    1.0 - (-mu).exp() - mu * beta
}

fn build_base_transition(s: f64, pi_base: &[f64; 4], w0: f64) -> [[f64; 4]; 4] {
    let e = (-s).exp();
    let mut table = [[0.0; 4]; 4];
    for (from, row) in table.iter_mut().enumerate() {
        for (to, cell) in row.iter_mut().enumerate() {
            let indicator = if from == to { 1.0 } else { 0.0 };
            let f = e * indicator + pi_base[to] * (1.0 - e);
            *cell = w0 * f.ln();
        }
    }
    table
}

/// Per-track transition `g_i(e -> e') = exp(-kappa_i)*[e=e'] + pi_i(e')*(1 -
/// exp(-kappa_i))`, weighted by `w_i` and summed over tracks to build the
/// `num_states x num_states` flat table.
fn build_combined_logg(params: &ModelParams, num_states: usize) -> Vec<f64> {
    let mut table = vec![0.0f64; num_states * num_states];
    for from in 0..num_states {
        for to in 0..num_states {
            let mut total = 0.0;
            for (track, &kappa_i) in params.kappa.iter().enumerate() {
                let e_kappa = (-kappa_i).exp();
                let from_bit = (from >> track) & 1;
                let to_bit = (to >> track) & 1;
                let (pi0, pi1) = params.pi_track[track];
                let pi_to = if to_bit == 1 { pi1 } else { pi0 };
                let indicator = if from_bit == to_bit { 1.0 } else { 0.0 };
                let g = e_kappa * indicator + pi_to * (1.0 - e_kappa);
                let w_i = params.weights[1 + track];
                total += w_i * g.ln();
            }
            table[from * num_states + to] = total;
        }
    }
    table
}

fn build_joint_equilibrium(params: &ModelParams, num_states: usize) -> Vec<f64> {
    let w0 = params.weights[0];
    let mut table = vec![0.0f64; 4 * num_states];
    for (base_idx, &pi_b) in params.pi_base.iter().enumerate() {
        for marks in 0..num_states {
            let mut total = w0 * pi_b.ln();
            for (track, &(pi0, pi1)) in params.pi_track.iter().enumerate() {
                let bit = (marks >> track) & 1;
                let pi_e = if bit == 1 { pi1 } else { pi0 };
                total += params.weights[1 + track] * pi_e.ln();
            }
            table[base_idx * num_states + marks] = total;
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_params() -> ModelParams {
        ModelParams {
            s: 0.1,
            mu: 0.01,
            kappa: vec![0.1],
            pi_base: [0.25, 0.25, 0.25, 0.25],
            pi_track: vec![(0.9, 0.1)],
            weights: vec![1.0, 0.0],
        }
    }

    fn build_model(params: &ModelParams, mean_len: f64) -> Model {
        let tables = Arc::new(ModelTables::build(params));
        Model::build(params, tables, mean_len).unwrap()
    }

    #[test]
    fn builds_without_error_for_reasonable_lengths() {
        let params = uniform_params();
        let model = build_model(&params, 20.0);
        assert_eq!(model.num_states(), 2);
        assert!(model.d.is_finite());
    }

    #[test]
    fn zero_weight_track_contributes_nothing_to_combined_transition() {
        let params = uniform_params();
        let model = build_model(&params, 20.0);
        // weights[1] == 0.0, so every combined track transition collapses to 0.
        for from in 0..model.num_states() {
            for to in 0..model.num_states() {
                assert!((model.log_combined_track_transition(from as u32, to as u32)).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn base_self_transition_is_the_most_likely() {
        let params = uniform_params();
        let model = build_model(&params, 20.0);
        for &b in BASES.iter() {
            for &b2 in BASES.iter() {
                if b2 != b {
                    assert!(model.log_base_transition(b, b) >= model.log_base_transition(b, b2));
                }
            }
        }
    }

    #[test]
    fn survival_term_goes_negative_for_an_oversized_beta() {
        // The derived lambda used in `Model::build` keeps beta in a safe
        // range in practice, but the validity check itself must still
        // reject a beta large enough to push mu*beta past 1 - exp(-mu).
        assert!(survival_term(1.0, 10.0) < 0.0);
    }

    #[test]
    fn survival_term_is_nonnegative_for_realistic_derived_beta() {
        let params = uniform_params();
        let model = build_model(&params, 20.0);
        assert!(model.log_p0_prime.is_finite());
    }

    #[test]
    fn two_pairs_of_different_lengths_get_different_d() {
        let params = uniform_params();
        let tables = Arc::new(ModelTables::build(&params));
        let short = Model::build(&params, tables.clone(), 10.0).unwrap();
        let long = Model::build(&params, tables, 500.0).unwrap();
        assert!((short.d - long.d).abs() > 1e-9, "D should vary with each pair's own mean length");
    }
}
