//! Synthetic input: `name;value` rows drawn around per-station means.

use std::io::{self, Write};

use rand::Rng;
use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::config::MAX_NAME_LEN;

/// Largest magnitude the value grammar allows.
const LIMIT: f64 = 99.9;

#[derive(Debug, Error)]
pub enum GenError {
    #[error("station list line {line}: {reason}")]
    StationList { line: usize, reason: String },
    #[error("station list is empty")]
    NoStations,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Station {
    pub name: String,
    pub mean: f64,
}

/// Reads `name;mean` lines. Blank lines and lines starting with `#` are skipped.
pub fn parse_stations(text: &str) -> Result<Vec<Station>, GenError> {
    let mut stations = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let bad = |reason: &str| GenError::StationList {
            line: i + 1,
            reason: reason.to_string(),
        };
        let (name, mean) = line.split_once(';').ok_or_else(|| bad("missing `;`"))?;
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(bad("name must be 1..=127 bytes"));
        }
        let mean = mean.trim().parse::<f64>().map_err(|e| bad(&e.to_string()))?;
        stations.push(Station {
            name: name.to_string(),
            mean,
        });
    }
    if stations.is_empty() {
        return Err(GenError::NoStations);
    }
    Ok(stations)
}

/// Picks `count` distinct stations at random, or all of them if there are fewer.
pub fn pick_stations<'a>(
    stations: &'a [Station],
    count: usize,
    rng: &mut impl Rng,
) -> Vec<&'a Station> {
    if count >= stations.len() {
        return stations.iter().collect();
    }
    let mut picked = FxHashSet::default();
    let mut out = Vec::with_capacity(count);
    while out.len() < count {
        let i = rng.gen_range(0..stations.len());
        if picked.insert(i) {
            out.push(&stations[i]);
        }
    }
    out
}

/// Standard normal samples by the Marsaglia polar method; each round yields two.
#[derive(Default)]
pub struct Gaussian {
    spare: Option<f64>,
}

impl Gaussian {
    pub fn sample(&mut self, rng: &mut impl Rng) -> f64 {
        if let Some(v) = self.spare.take() {
            return v;
        }
        loop {
            let u = rng.gen::<f64>() * 2.0 - 1.0;
            let v = rng.gen::<f64>() * 2.0 - 1.0;
            let s = u * u + v * v;
            if s < 1.0 && s != 0.0 {
                let scale = (-2.0 * s.ln() / s).sqrt();
                self.spare = Some(v * scale);
                return u * scale;
            }
        }
    }
}

/// Writes `rows` lines, each a random pick from `stations` with a value of
/// `mean + 10 * N(0, 1)`, clamped to what the parser accepts.
pub fn write_rows(
    stations: &[&Station],
    rows: u64,
    rng: &mut impl Rng,
    out: &mut impl Write,
) -> io::Result<()> {
    let mut gaussian = Gaussian::default();
    for _ in 0..rows {
        let station = stations[rng.gen_range(0..stations.len())];
        let value = (station.mean + gaussian.sample(&mut *rng) * 10.0).clamp(-LIMIT, LIMIT);
        writeln!(out, "{};{:.1}", station.name, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::aggregate;

    const STATIONS: &str = "# name;mean\nHamburg;9.7\nBulawayo;18.9\n\nPalembang;27.3\nSt. John's;5.0\n";

    #[test]
    fn parses_station_list() {
        let stations = parse_stations(STATIONS).unwrap();
        assert_eq!(stations.len(), 4);
        assert_eq!(
            stations[3],
            Station {
                name: "St. John's".into(),
                mean: 5.0
            }
        );
    }

    #[test]
    fn rejects_bad_station_lines() {
        for (text, line) in [("ok;1.0\nbroken\n", 2), (";1.0\n", 1), ("x;warm\n", 1)] {
            match parse_stations(text) {
                Err(GenError::StationList { line: l, .. }) => assert_eq!(l, line, "`{text:?}`"),
                other => panic!("expected StationList error for `{text:?}`, got {other:?}"),
            }
        }
        assert!(matches!(parse_stations("# nothing\n"), Err(GenError::NoStations)));
    }

    #[test]
    fn picks_distinct_stations() {
        let stations = parse_stations(STATIONS).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let picked = pick_stations(&stations, 3, &mut rng);
        let names = picked.iter().map(|s| s.name.as_str()).collect::<FxHashSet<_>>();
        assert_eq!(names.len(), 3);
        assert_eq!(pick_stations(&stations, 10, &mut rng).len(), 4);
    }

    #[test]
    fn generated_rows_parse_cleanly() {
        let stations = parse_stations(STATIONS).unwrap();
        let picked = stations.iter().collect::<Vec<_>>();
        let mut rng = StdRng::seed_from_u64(42);
        let mut out = Vec::new();
        write_rows(&picked, 2000, &mut rng, &mut out).unwrap();

        let table = aggregate(&out, &EngineConfig::new(2, 6)).expect("generated data is valid");
        let total = table.iter().map(|(_, s)| s.count).sum::<u64>();
        assert_eq!(total, 2000);
        assert!(table.len() <= 4);
    }

    #[test]
    fn extreme_means_are_clamped() {
        let hot = Station {
            name: "hot".into(),
            mean: 1000.0,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let mut out = Vec::new();
        write_rows(&[&hot], 10, &mut rng, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "hot;99.9\n".repeat(10));
    }
}
