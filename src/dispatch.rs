//! C6: Work Dispatcher.
//!
//! Partitions a batch of [`RegionPair`]s across workers, the same
//! `par_bridge`/`MaybeParIter`-style rayon dispatch `irma-core` uses for its
//! standalone processes, just fanning out over region pairs instead of
//! records. Results come back re-ordered into input order, and any worker
//! failure aborts the batch and surfaces the first error.

use crate::align::{self, AlignOptions};
use crate::error::Error;
use crate::model::{Model, ModelTables};
use crate::params::ModelParams;
use crate::region::RegionPair;
use std::sync::Arc;

#[cfg(not(feature = "dev_no_rayon"))]
use rayon::prelude::*;

/// `(|S1| + |S2|) / 2`, the per-pair average length spec §4.2 derives λ
/// from.
fn mean_len(pair: &RegionPair) -> f64 {
    (pair.s1.len() + pair.s2.len()) as f64 / 2.0
}

/// Aligns every pair in `pairs`, using up to `num_workers` workers. Each
/// pair gets its own [`Model`], rebuilt from `params` and the shared
/// `tables` against that pair's own `(|S1| + |S2|) / 2` — spec §3/§4.2 are
/// explicit that λ (and everything derived from it) is a per-pair quantity,
/// not a run-wide constant. `tables` is the one piece of run-invariant
/// state, safe to share read-only across every pair and every worker.
///
/// Results are returned in the same order as `pairs`.
///
/// Warns on stderr, mirroring `processes::integrated::num_procs`, when
/// `num_workers` exceeds the number of logical cores detected by
/// [`num_cpus::get`].
///
/// ## Errors
/// Returns the first [`Error`] raised by any worker, wrapped in
/// [`Error::WorkerFailure`] with the offending pair's name. A pair whose
/// own derived model is invalid (§4.2's survival-term check) fails the same
/// way as an alignment-kernel failure. The batch is not partially applied
/// on failure: either every pair aligns or the whole call fails.
pub fn align_all(
    mut pairs: Vec<RegionPair>,
    params: &ModelParams,
    tables: &Arc<ModelTables>,
    num_workers: usize,
    opts: AlignOptions,
) -> Result<Vec<RegionPair>, Error> {
    let available = num_cpus::get();
    if num_workers > available {
        eprintln!("warning: -p {num_workers} exceeds the {available} logical cores detected; proceeding anyway");
    }

    let align_one = |pair: &mut RegionPair| -> Result<(), Error> {
        let model = Model::build(params, tables.clone(), mean_len(pair)).map_err(|source| Error::WorkerFailure {
            name: pair.name.clone(),
            source: Box::new(source),
        })?;
        align::align_pair(pair, &model, opts).map_err(|source| Error::WorkerFailure {
            name: pair.name.clone(),
            source: Box::new(source),
        })
    };

    #[cfg(not(feature = "dev_no_rayon"))]
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_workers.max(1))
            .build()
            .map_err(|e| Error::WorkerFailure {
                name:   "<pool>".to_string(),
                source: Box::new(Error::Io(std::io::Error::other(e))),
            })?;

        pool.install(|| pairs.par_iter_mut().try_for_each(align_one))?;
    }

    #[cfg(feature = "dev_no_rayon")]
    {
        for pair in pairs.iter_mut() {
            align_one(pair)?;
        }
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExitCode;
    use crate::params::ModelParams;
    use crate::region::{Region, TrackedPosition};

    fn region(name: &str, bases: &str) -> Region {
        let positions = bases.bytes().map(|b| TrackedPosition::new(b, 0)).collect();
        Region::new(name.to_string(), positions, 1)
    }

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

    #[test]
    fn preserves_input_order() {
        let params = uniform_params();
        let tables = Arc::new(ModelTables::build(&params));
        let pairs = vec![
            RegionPair::new("a".into(), region("a1", "ACGT"), region("a2", "ACGT"), None),
            RegionPair::new("b".into(), region("b1", "TTTT"), region("b2", "TTTT"), None),
            RegionPair::new("c".into(), region("c1", "GGGG"), region("c2", "GGGG"), None),
        ];
        let results = align_all(pairs, &params, &tables, 2, AlignOptions::default()).unwrap();
        let names: Vec<_> = results.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert!(results.iter().all(|p| p.score.is_some()));
    }

    #[test]
    fn differently_sized_pairs_each_get_their_own_model() {
        // A regression guard for the bug where every pair in a batch shared
        // one model derived from a batch-averaged length: a short pair and
        // a long pair of otherwise-identical sequence should not collapse
        // to the same derived D once each gets its own mean_len.
        let params = uniform_params();
        let tables = Arc::new(ModelTables::build(&params));
        let short = Model::build(&params, tables.clone(), mean_len(&RegionPair::new(
            "s".into(),
            region("s1", "AC"),
            region("s2", "AC"),
            None,
        )))
        .unwrap();
        let long_bases = "ACGT".repeat(50);
        let long = Model::build(
            &params,
            tables,
            mean_len(&RegionPair::new("l".into(), region("l1", &long_bases), region("l2", &long_bases), None)),
        )
        .unwrap();
        assert!((short.d - long.d).abs() > 1e-9);
    }

    #[test]
    fn a_track_arity_mismatch_in_one_pair_fails_the_whole_batch() {
        let params = uniform_params();
        let tables = Arc::new(ModelTables::build(&params));
        let mut bad = RegionPair::new("bad".into(), region("s1", "AC"), region("s2", "AC"), None);
        bad.s2.num_tracks = 2;
        let pairs = vec![RegionPair::new("ok".into(), region("s1", "AC"), region("s2", "AC"), None), bad];
        let err = align_all(pairs, &params, &tables, 1, AlignOptions::default()).unwrap_err();
        assert!(matches!(err, Error::WorkerFailure { .. }));
        assert_eq!(err.exit_code(), 204);
    }

    #[test]
    fn parallel_and_serial_dispatch_agree() {
        let params = uniform_params();
        let tables = Arc::new(ModelTables::build(&params));
        let pairs = vec![RegionPair::new("p".into(), region("s1", "ACGTACGT"), region("s2", "ACGTTCGT"), None)];
        let p1 = align_all(pairs.clone(), &params, &tables, 1, AlignOptions::default()).unwrap();
        let p8 = align_all(pairs, &params, &tables, 8, AlignOptions::default()).unwrap();
        assert_eq!(p1[0].score, p8[0].score);
    }
}
