//! Per-worker hash aggregation.
//!
//! [AggregateTable] is a fixed-capacity open-addressing map from name bytes to [Aggregate].
//! Each key walks its own odd stride derived from the top bits of its hash, so colliding keys
//! take different paths through the slot array instead of piling up in one run.
//! The table never grows and never deletes; the only operation is [AggregateTable::upsert].

use tracing::debug;

use crate::arena::{NameArena, NameRef};
use crate::config::EngineConfig;
use crate::error::{BrcError, Result};
use crate::parse::hash_name;

/// Count, sum, min and max of a set of observations in tenths.
/// `count == 0` is the empty aggregate and folds as an identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Aggregate {
    pub count: u64,
    pub sum: i64,
    pub min: i16,
    pub max: i16,
}

impl Aggregate {
    /// Aggregate of a single observation.
    pub fn single(measurement: i16) -> Self {
        Self {
            count: 1,
            sum: measurement as i64,
            min: measurement,
            max: measurement,
        }
    }

    /// Folds `other` into `self`. Commutative and associative.
    #[inline]
    pub fn merge(&mut self, other: &Aggregate) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        self.count += other.count;
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Mean in the input's unit (not tenths).
    pub fn mean(&self) -> f64 {
        self.sum as f64 / (10.0 * self.count as f64)
    }
}

#[derive(Clone, Copy, Default)]
struct Slot {
    name: NameRef,
    stats: Aggregate,
}

/// Open-addressing table owned by one worker, together with the arena holding its names.
pub struct AggregateTable {
    slots: Box<[Slot]>,
    arena: NameArena,
    exp: u32,
    len: usize,
    max_names: usize,
}

impl AggregateTable {
    /// `config` must already be validated.
    pub fn new(config: &EngineConfig) -> Self {
        // probing shifts the hash right by `64 - exp`
        debug_assert!(
            (1..=30).contains(&config.table_exp),
            "table exponent {} outside 1..=30",
            config.table_exp
        );
        Self {
            slots: vec![Slot::default(); config.capacity()].into_boxed_slice(),
            arena: NameArena::new(config.arena_bytes),
            exp: config.table_exp,
            len: 0,
            max_names: config.max_names,
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Folds `observation` into the aggregate for `name`, claiming a slot on first sight.
    /// `hash` must be [hash_name] of `name`.
    #[inline]
    pub fn upsert(&mut self, name: &[u8], hash: u64, observation: &Aggregate) -> Result<()> {
        let idx = self.find_or_claim(name, hash)?;
        self.slots[idx].stats.merge(observation);
        Ok(())
    }

    fn find_or_claim(&mut self, name: &[u8], hash: u64) -> Result<usize> {
        let mask = self.slots.len() - 1;
        let step = ((hash >> (64 - self.exp)) as usize) | 1;
        let mut idx = hash as usize;
        // an odd step visits every slot once per lap of a power-of-two table
        for _ in 0..self.slots.len() {
            idx = idx.wrapping_add(step) & mask;
            let slot = self.slots[idx];
            if slot.name.is_empty() {
                if self.len == self.max_names {
                    return Err(self.full());
                }
                self.slots[idx].name = self.arena.alloc(name)?;
                self.len += 1;
                return Ok(idx);
            }
            if self.arena.get(slot.name) == name {
                return Ok(idx);
            }
        }
        Err(self.full())
    }

    #[cold]
    fn full(&self) -> BrcError {
        BrcError::TableFull {
            max_names: self.max_names,
            capacity: self.slots.len(),
        }
    }

    /// Looks up the aggregate for `name` without inserting.
    pub fn get(&self, name: &[u8]) -> Option<&Aggregate> {
        let hash = hash_name(name);
        let mask = self.slots.len() - 1;
        let step = ((hash >> (64 - self.exp)) as usize) | 1;
        let mut idx = hash as usize;
        for _ in 0..self.slots.len() {
            idx = idx.wrapping_add(step) & mask;
            let slot = &self.slots[idx];
            if slot.name.is_empty() {
                return None;
            }
            if self.arena.get(slot.name) == name {
                return Some(&slot.stats);
            }
        }
        None
    }

    /// Occupied entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &Aggregate)> + '_ {
        self.slots
            .iter()
            .filter(|s| !s.name.is_empty())
            .map(|s| (self.arena.get(s.name), &s.stats))
    }

    /// Folds every entry of `other` into `self`, re-hashing each name.
    pub fn absorb(&mut self, other: &AggregateTable) -> Result<()> {
        for (name, stats) in other.iter() {
            self.upsert(name, hash_name(name), stats)?;
        }
        Ok(())
    }
}

/// Reduces per-worker tables into the first one. Runs after every worker has joined.
pub fn merge_tables(tables: Vec<AggregateTable>) -> Result<Option<AggregateTable>> {
    let mut tables = tables.into_iter();
    let Some(mut primary) = tables.next() else {
        return Ok(None);
    };
    for (i, table) in tables.enumerate() {
        primary.absorb(&table)?;
        debug!(
            worker = i + 1,
            names = table.len(),
            merged = primary.len(),
            "merged worker table"
        );
    }
    Ok(Some(primary))
}

#[cfg(test)]
mod test {
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use rustc_hash::FxHashMap;

    use super::*;

    fn small_config() -> EngineConfig {
        EngineConfig::new(1, 7)
    }

    fn upsert_one(table: &mut AggregateTable, name: &[u8], measurement: i16) -> Result<()> {
        table.upsert(name, hash_name(name), &Aggregate::single(measurement))
    }

    #[test]
    fn upsert_claims_once_per_name() {
        let mut table = AggregateTable::new(&small_config());
        for (name, expected_len) in [
            (b"abc" as &[u8], 1),
            (b"def", 2),
            (b"abc", 2),
            (b"def", 2),
            (b"012", 3),
            (b"ab", 4),
            (b"abcd", 5),
        ] {
            upsert_one(&mut table, name, 10).expect("table has room");
            assert_eq!(
                table.len(),
                expected_len,
                "after upserting `{}`",
                String::from_utf8_lossy(name)
            );
        }
        assert_eq!(table.iter().count(), 5);
    }

    #[test]
    fn upsert_folds_observations() {
        let mut table = AggregateTable::new(&small_config());
        for (name, v) in [(b"abc" as &[u8], 10), (b"def", 20), (b"abc", 30)] {
            upsert_one(&mut table, name, v).unwrap();
        }
        assert_eq!(
            table.get(b"abc"),
            Some(&Aggregate {
                count: 2,
                sum: 40,
                min: 10,
                max: 30
            })
        );
        assert_eq!(table.get(b"def"), Some(&Aggregate::single(20)));
        assert_eq!(table.get(b"ghi"), None);
    }

    #[test]
    fn extremes_start_from_first_observation() {
        let mut table = AggregateTable::new(&small_config());
        for v in [-55, -12, -99] {
            upsert_one(&mut table, b"cold", v).unwrap();
        }
        let stats = table.get(b"cold").unwrap();
        assert_eq!((stats.min, stats.max, stats.sum), (-99, -12, -166));
    }

    #[test]
    fn table_full_is_fatal() {
        let config = EngineConfig::new(1, 3).with_max_names(3);
        let mut table = AggregateTable::new(&config);
        for name in [b"a" as &[u8], b"b", b"c"] {
            upsert_one(&mut table, name, 1).expect("within max names");
        }
        upsert_one(&mut table, b"a", 1).expect("existing names still fold");
        match upsert_one(&mut table, b"d", 1) {
            Err(BrcError::TableFull {
                max_names,
                capacity,
            }) => assert_eq!((max_names, capacity), (3, 8)),
            other => panic!("expected TableFull, got {other:?}"),
        }
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn colliding_hashes_get_distinct_slots() {
        let mut table = AggregateTable::new(&small_config());
        // same hash for every name: only byte equality tells them apart
        for (i, name) in [b"x" as &[u8], b"y", b"z", b"w"].iter().enumerate() {
            table.upsert(name, 42, &Aggregate::single(i as i16)).unwrap();
        }
        assert_eq!(table.len(), 4);
        let mut found = table
            .iter()
            .map(|(n, s)| (n.to_vec(), s.sum))
            .collect::<Vec<_>>();
        found.sort();
        assert_eq!(
            found,
            vec![
                (b"w".to_vec(), 3),
                (b"x".to_vec(), 0),
                (b"y".to_vec(), 1),
                (b"z".to_vec(), 2)
            ]
        );
    }

    #[test]
    fn merge_of_empty_is_identity() {
        let mut a = Aggregate::default();
        let b = Aggregate::single(-7);
        a.merge(&b);
        assert_eq!(a, b);
        a.merge(&Aggregate::default());
        assert_eq!(a, b);
    }

    #[test]
    fn merging_partitions_matches_single_pass() {
        let mut rng = StdRng::seed_from_u64(0x1b7c);
        let names = (0..40).map(|i| format!("station{i}")).collect::<Vec<_>>();
        let observations = (0..5000)
            .map(|_| {
                (
                    names[rng.gen_range(0..names.len())].clone(),
                    rng.gen_range(-999..=999i16),
                )
            })
            .collect::<Vec<_>>();

        let mut oracle = FxHashMap::<&str, Aggregate>::default();
        for (name, v) in &observations {
            oracle
                .entry(name.as_str())
                .or_default()
                .merge(&Aggregate::single(*v));
        }

        for parts in [1, 2, 3, 7] {
            let mut tables = (0..parts)
                .map(|_| AggregateTable::new(&small_config()))
                .collect::<Vec<_>>();
            for (name, v) in &observations {
                let t = rng.gen_range(0..parts);
                upsert_one(&mut tables[t], name.as_bytes(), *v).unwrap();
            }
            // merge order must not matter
            tables.reverse();
            let merged = merge_tables(tables).unwrap().expect("at least one table");
            assert_eq!(merged.len(), oracle.len(), "{parts} partitions");
            for (name, expected) in &oracle {
                assert_eq!(
                    merged.get(name.as_bytes()),
                    Some(expected),
                    "{parts} partitions, name {name}"
                );
            }
        }
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "table exponent 0 outside")]
    fn zero_exponent_is_caught_at_construction() {
        let _table = AggregateTable::new(&EngineConfig::new(1, 0));
    }

    #[test]
    fn merge_tables_of_nothing() {
        assert!(merge_tables(Vec::new()).unwrap().is_none());
    }
}
