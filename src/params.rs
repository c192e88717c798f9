//! C1: Parameter Loader.
//!
//! Reads the evolutionary parameter bundle: substitution rate `s`, indel
//! rate `mu`, per-track rates `kappa_i`, base equilibria, per-track
//! equilibria, and the channel weights. See spec §4.1 and the grammar in
//! §6 for the exact line shapes.

use crate::error::Error;
use std::io::BufRead;

/// The base alphabet, fixed order used throughout (indices 0..4).
pub const BASES: [u8; 4] = *b"ACGT";

/// The raw, unvalidated-but-parsed evolutionary parameter bundle.
#[derive(Debug, Clone)]
pub struct ModelParams {
    pub s:   f64,
    pub mu:  f64,
    pub kappa: Vec<f64>,
    /// Base equilibria in `BASES` order.
    pub pi_base: [f64; 4],
    /// Per-track equilibria: `pi_track[i] = (pi_i(0), pi_i(1))`.
    pub pi_track: Vec<(f64, f64)>,
    /// Channel weights: `weights[0]` is the base channel, `weights[1..]`
    /// are the per-track weights, in the same order as `pi_track`.
    pub weights: Vec<f64>,
}

impl ModelParams {
    /// Number of epigenomic tracks, K.
    pub fn num_tracks(&self) -> usize {
        self.kappa.len()
    }

    /// Reads and validates a parameter bundle from any line-buffered
    /// reader (a plain file, a gzip-decoded stream, or stdin).
    ///
    /// ## Errors
    /// Returns [`Error::MalformedParams`] if the grammar in spec §6 is
    /// violated, any rate is not strictly positive, any probability is
    /// outside (0,1), or the weight count doesn't match `1 + num_tracks`.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, Error> {
        let mut lines = reader.lines();

        let s = next_float(&mut lines, "substitution rate s")?;
        let mu = next_float(&mut lines, "indel rate mu")?;

        if s <= 0.0 {
            return Err(Error::MalformedParams(format!("substitution rate s must be > 0, got {s}")));
        }
        if mu <= 0.0 {
            return Err(Error::MalformedParams(format!("indel rate mu must be > 0, got {mu}")));
        }

        let mut kappa = Vec::new();
        let base_line = loop {
            let line = next_nonblank(&mut lines)?
                .ok_or_else(|| Error::MalformedParams("parameter file ended before base equilibria".into()))?;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() == 1 && !tokens[0].contains(':') {
                let k = parse_positive_rate(tokens[0], "track rate kappa_i")?;
                kappa.push(k);
            } else {
                break tokens.into_iter().map(str::to_owned).collect::<Vec<_>>();
            }
        };

        let pi_base = parse_base_equilibria(&base_line)?;

        let mut pi_track = Vec::with_capacity(kappa.len());
        for _ in 0..kappa.len() {
            let line = next_nonblank(&mut lines)?
                .ok_or_else(|| Error::MalformedParams("parameter file ended before all track equilibria".into()))?;
            pi_track.push(parse_track_equilibrium(&line)?);
        }

        let weights_line = next_nonblank(&mut lines)?
            .ok_or_else(|| Error::MalformedParams("parameter file ended before channel weights".into()))?;
        let weights: Vec<f64> = weights_line
            .split_whitespace()
            .map(|tok| {
                tok.parse::<f64>()
                    .map_err(|_| Error::MalformedParams(format!("could not parse weight '{tok}'")))
            })
            .collect::<Result<_, _>>()?;

        if weights.len() != 1 + kappa.len() {
            return Err(Error::MalformedParams(format!(
                "expected {} channel weights (1 base + {} tracks), found {}",
                1 + kappa.len(),
                kappa.len(),
                weights.len()
            )));
        }
        if weights.iter().any(|w| *w < 0.0) {
            return Err(Error::MalformedParams("channel weights must be non-negative".into()));
        }

        Ok(ModelParams {
            s,
            mu,
            kappa,
            pi_base,
            pi_track,
            weights,
        })
    }
}

fn next_float(lines: &mut std::io::Lines<impl BufRead>, what: &str) -> Result<f64, Error> {
    let line = next_nonblank(lines)?.ok_or_else(|| Error::MalformedParams(format!("parameter file ended before {what}")))?;
    line.trim()
        .parse::<f64>()
        .map_err(|_| Error::MalformedParams(format!("could not parse {what} from '{line}'")))
}

fn next_nonblank(lines: &mut std::io::Lines<impl BufRead>) -> Result<Option<String>, Error> {
    for line in lines {
        let line = line.map_err(Error::Io)?;
        if !line.trim().is_empty() {
            return Ok(Some(line));
        }
    }
    Ok(None)
}

fn parse_positive_rate(token: &str, what: &str) -> Result<f64, Error> {
    let v: f64 = token
        .parse()
        .map_err(|_| Error::MalformedParams(format!("could not parse {what} from '{token}'")))?;
    if v <= 0.0 {
        return Err(Error::MalformedParams(format!("{what} must be > 0, got {v}")));
    }
    Ok(v)
}

fn parse_key_value(token: &str) -> Result<(&str, f64), Error> {
    let (key, value) = token
        .split_once(':')
        .ok_or_else(|| Error::MalformedParams(format!("expected 'key:value', got '{token}'")))?;
    let value: f64 = value
        .parse()
        .map_err(|_| Error::MalformedParams(format!("could not parse probability from '{token}'")))?;
    if !(0.0..1.0).contains(&value) || value == 0.0 {
        return Err(Error::MalformedParams(format!(
            "probability '{key}' must be in (0,1), got {value}"
        )));
    }
    Ok((key, value))
}

fn parse_base_equilibria(tokens: &[String]) -> Result<[f64; 4], Error> {
    let mut pi = [f64::NAN; 4];
    for token in tokens {
        let (key, value) = parse_key_value(token)?;
        let idx = BASES
            .iter()
            .position(|b| (*b as char).to_string() == key)
            .ok_or_else(|| Error::MalformedParams(format!("unexpected base equilibrium key '{key}'")))?;
        pi[idx] = value;
    }
    if pi.iter().any(|v| v.is_nan()) {
        return Err(Error::MalformedParams("base equilibria must supply all of A, C, G, T".into()));
    }
    Ok(pi)
}

fn parse_track_equilibrium(line: &str) -> Result<(f64, f64), Error> {
    let mut pi0 = None;
    let mut pi1 = None;
    for token in line.split_whitespace() {
        let (key, value) = parse_key_value(token)?;
        match key {
            "0" => pi0 = Some(value),
            "1" => pi1 = Some(value),
            other => return Err(Error::MalformedParams(format!("unexpected track equilibrium key '{other}'"))),
        }
    }
    match (pi0, pi1) {
        (Some(p0), Some(p1)) => Ok((p0, p1)),
        _ => Err(Error::MalformedParams("track equilibrium line must supply both '0:' and '1:'".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> &'static str {
        "0.1\n0.01\n0.1\nA:0.25\tC:0.25\tG:0.25\tT:0.25\n0:0.9\t1:0.1\n1.0\t0.0\n"
    }

    #[test]
    fn parses_a_well_formed_bundle() {
        let params = ModelParams::parse(Cursor::new(sample())).unwrap();
        assert_eq!(params.num_tracks(), 1);
        assert!((params.s - 0.1).abs() < 1e-12);
        assert!((params.mu - 0.01).abs() < 1e-12);
        assert_eq!(params.kappa, vec![0.1]);
        assert_eq!(params.pi_track, vec![(0.9, 0.1)]);
        assert_eq!(params.weights, vec![1.0, 0.0]);
    }

    #[test]
    fn rejects_negative_rate() {
        let text = "-0.1\n0.01\nA:0.25\tC:0.25\tG:0.25\tT:0.25\n1.0\n";
        assert!(ModelParams::parse(Cursor::new(text)).is_err());
    }

    #[test]
    fn rejects_mismatched_weight_count() {
        let text = "0.1\n0.01\n0.1\nA:0.25\tC:0.25\tG:0.25\tT:0.25\n0:0.9\t1:0.1\n1.0\n";
        assert!(ModelParams::parse(Cursor::new(text)).is_err());
    }

    #[test]
    fn rejects_boundary_probability() {
        let text = "0.1\n0.01\nA:1.0\tC:0.0\tG:0.0\tT:0.0\n1.0\n";
        assert!(ModelParams::parse(Cursor::new(text)).is_err());
    }
}
