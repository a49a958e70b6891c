//! Reading and writing summaries as CSV.
//!
//! Tables are written with a header row and a leading row-index column whose
//! header is empty.  Floats are written in their shortest round-trippable
//! form, so reading a table back gives exactly the values which were written.

use crate::{Error, MetaData, Result, Table, Values};
use std::io::{Read, Write};
use std::path::PathBuf;

/// Controls whether (and where) an [`crate::Aggregator`] writes its results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteSettings {
    /// Write the result of every `aggregate` call to disk
    pub running_writes: bool,
    /// Give every write its own file, suffixed with an incrementing index.
    /// Otherwise the same file is overwritten each time.
    pub separate_files: bool,
    /// The first index used when `separate_files` is set
    pub separate_files_start_index: u64,
    pub filename: String,
    pub meta_data_filename: String,
    /// Prepended verbatim to the filenames, so directories need a trailing
    /// separator
    pub path: String,
}

impl Default for WriteSettings {
    fn default() -> WriteSettings {
        let filename = "aggregated_output".to_string();
        WriteSettings {
            running_writes: false,
            separate_files: false,
            separate_files_start_index: 0,
            meta_data_filename: format!("{}_metadata", filename),
            filename,
            path: String::new(),
        }
    }
}

impl WriteSettings {
    /// The paths of the table and the metadata files for a write.  `index`
    /// is `None` unless `separate_files` is set.
    pub fn paths(&self, index: Option<u64>) -> (PathBuf, PathBuf) {
        let stem = match index {
            Some(i) => format!("{}{}{}", self.path, self.filename, i),
            None => format!("{}{}", self.path, self.filename),
        };
        (
            PathBuf::from(format!("{}.csv", stem)),
            PathBuf::from(format!("{}{}.csv", stem, self.meta_data_filename)),
        )
    }
}

pub fn write_table(out: impl Write, table: &Table) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(std::iter::once("").chain(table.names()))?;
    for row in 0..table.n_rows() {
        let cells = table.columns().iter().map(|c| c.values.cell(row));
        wtr.write_record(std::iter::once(row.to_string()).chain(cells))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read a table written by [`write_table`].  Also accepts plain CSV with no
/// index column: the first column is only skipped if its header is empty.
///
/// A column is numeric if every cell parses as a float; otherwise it's text.
/// Use [`read_table_with_ids`] when the table has identifier columns.
pub fn read_table(input: impl Read) -> Result<Table> {
    read_table_with_ids(input, &[] as &[&str])
}

/// Like [`read_table`], but the columns named in `id_fields` are always
/// read as text, so identifiers such as `007` are kept exactly as written.
pub fn read_table_with_ids(input: impl Read, id_fields: &[impl AsRef<str>]) -> Result<Table> {
    let mut rdr = csv::Reader::from_reader(input);
    let headers = rdr.headers()?.clone();
    let skip = usize::from(headers.get(0) == Some(""));
    let mut cells: Vec<Vec<String>> = vec![vec![]; headers.len() - skip];
    for row in rdr.into_records() {
        let row = row?;
        for (col, x) in cells.iter_mut().zip(row.iter().skip(skip)) {
            col.push(x.to_string());
        }
    }
    let mut table = Table::new();
    for (name, col) in headers.iter().skip(skip).zip(cells) {
        let is_id = id_fields.iter().any(|id| id.as_ref() == name);
        let parsed = col.iter().map(|x| x.parse()).collect::<Result<Vec<f64>, _>>();
        let values = match parsed {
            Ok(xs) if !is_id => Values::Numeric(xs),
            _ => Values::Text(col),
        };
        table.push_column(name, values)?;
    }
    Ok(table)
}

pub fn write_metadata(out: impl Write, meta: MetaData) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(["", "num_frames"])?;
    wtr.write_record(["0".to_string(), meta.num_frames.to_string()])?;
    wtr.flush()?;
    Ok(())
}

pub fn read_metadata(input: impl Read) -> Result<MetaData> {
    let mut rdr = csv::Reader::from_reader(input);
    match rdr.deserialize::<MetaData>().next() {
        Some(meta) => Ok(meta?),
        None => Err(Error::MissingMetaData),
    }
}
