//! Ordering and rendering of the final aggregates.
//!
//! Format: `{first=min/mean/max, second=min/mean/max, ...}`, one decimal per field.

use std::io::{self, Write};

use crate::table::{Aggregate, AggregateTable};

/// One name and its aggregate, borrowed from the table's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entry<'a> {
    pub name: &'a [u8],
    pub stats: Aggregate,
}

/// Occupied entries ordered by name, bytewise; a strict prefix sorts first.
pub fn sorted_entries(table: &AggregateTable) -> Vec<Entry<'_>> {
    let mut entries = table
        .iter()
        .map(|(name, stats)| Entry {
            name,
            stats: *stats,
        })
        .collect::<Vec<_>>();
    // names are unique per table
    entries.sort_unstable_by(|a, b| a.name.cmp(b.name));
    entries
}

/// Writes the report without a trailing newline.
pub fn write_report(entries: &[Entry<'_>], out: &mut impl Write) -> io::Result<()> {
    write!(out, "{{")?;
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            write!(out, ", ")?;
        }
        out.write_all(entry.name)?;
        let stats = &entry.stats;
        write!(
            out,
            "={:.1}/{:.1}/{:.1}",
            stats.min as f64 / 10.0,
            stats.mean(),
            stats.max as f64 / 10.0
        )?;
    }
    write!(out, "}}")
}

/// The report as a `String`, bytes outside UTF-8 replaced.
pub fn render(entries: &[Entry<'_>]) -> String {
    let mut out = Vec::with_capacity(entries.len() * 32 + 2);
    // writing to a Vec cannot fail
    let _ = write_report(entries, &mut out);
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::EngineConfig;
    use crate::parse::hash_name;

    fn table_of(rows: &[(&str, i16)]) -> AggregateTable {
        let mut table = AggregateTable::new(&EngineConfig::new(1, 8));
        for (name, v) in rows {
            table
                .upsert(name.as_bytes(), hash_name(name.as_bytes()), &Aggregate::single(*v))
                .unwrap();
        }
        table
    }

    #[test]
    fn names_sort_bytewise_prefix_first() {
        let table = table_of(&[
            ("abc", 1),
            ("ab", 1),
            ("Zurich", 1),
            ("abd", 1),
            ("a", 1),
            ("b", 1),
            ("Ab", 1),
        ]);
        let names = sorted_entries(&table)
            .iter()
            .map(|e| String::from_utf8_lossy(e.name).into_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, ["Ab", "Zurich", "a", "ab", "abc", "abd", "b"]);
    }

    #[test]
    fn render_formats_one_decimal() {
        for (rows, expected) in [
            (vec![], "{}"),
            (vec![("x", -55)], "{x=-5.5/-5.5/-5.5}"),
            (
                vec![("abc", 10), ("def", 20), ("abc", 30)],
                "{abc=1.0/2.0/3.0, def=2.0/2.0/2.0}",
            ),
            (vec![("m", 0), ("m", 1), ("m", 1)], "{m=0.0/0.1/0.1}"),
            (vec![("n", -1), ("n", 0)], "{n=-0.1/-0.1/0.0}"),
            (vec![("h", 999), ("h", -999)], "{h=-99.9/0.0/99.9}"),
        ] {
            let table = table_of(&rows);
            assert_eq!(render(&sorted_entries(&table)), expected, "rows: {rows:?}");
        }
    }
}
