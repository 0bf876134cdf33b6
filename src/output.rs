//! CSV output of the lag table
//!
//! Columns: `l` lag, `m` mean, `v` variance across batches, `n` number of
//! contributing batches, `t` row type, `b` batch label. P2 means are divided
//! by the Ks mean; variances are written as aggregated.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::aggregator::{CorrelationTable, RowKind};

pub const HEADER: &str = "l,m,v,n,t,b";
const BATCH_LABEL: &str = "all";

/// Write `table` as CSV, returning the number of data rows.
pub fn write_csv<W: Write>(table: &CorrelationTable, mut writer: W) -> Result<usize> {
    writeln!(writer, "{}", HEADER)?;

    let ks = table.ks().map(|row| row.mean).unwrap_or(f64::NAN);
    for row in &table.rows {
        let mean = match row.kind {
            RowKind::Ks => row.mean,
            RowKind::P2 => row.mean / ks,
        };
        writeln!(
            writer,
            "{},{},{},{},{},{}",
            row.lag,
            mean,
            row.variance.unwrap_or(f64::NAN),
            row.sample_count,
            row.kind.label(),
            BATCH_LABEL
        )?;
    }
    writer.flush()?;
    Ok(table.rows.len())
}

/// Create `path` and write the table into it.
pub fn write_table<P: AsRef<Path>>(path: P, table: &CorrelationTable) -> Result<usize> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file {}", path.display()))?;
    write_csv(table, BufWriter::new(file))
        .with_context(|| format!("Failed to write {}", path.display()))
}
