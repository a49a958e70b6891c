use crate::{read_metadata, read_table};
use anyhow::{anyhow, ensure, Result};
use bpaf::Bpaf;
use running_summary::{persist, var_name, Table};
use std::io::Write;
use std::path::PathBuf;

#[derive(Bpaf, Clone, Debug)]
pub struct Options {
    /// A column which identifies a row.  May be given more than once.
    #[bpaf(long("id"), argument("FIELD"))]
    pub id_fields: Vec<String>,
    /// The metadata which goes with the summary
    #[bpaf(argument("META"))]
    pub meta: Option<PathBuf>,
    /// A summary written by `fold`.  Read from stdin if omitted.
    #[bpaf(positional("FILE"))]
    pub file: Option<PathBuf>,
}

pub fn show(opts: Options) -> Result<()> {
    let summary = match &opts.file {
        Some(path) => read_table(path, &opts.id_fields)?,
        None => persist::read_table_with_ids(std::io::stdin(), &opts.id_fields)?,
    };
    let stdout = std::io::stdout();
    let mut stdout = stdout.lock();
    if let Some(path) = &opts.meta {
        writeln!(stdout, "{} frames\n", read_metadata(path)?.num_frames)?;
    }
    render(&mut stdout, &summary, &opts.id_fields)
}

/// One line per row: the identifiers, then "mean ± stddev" for every field
/// which has a variance column.
fn render(out: impl Write, summary: &Table, id_fields: &[String]) -> Result<()> {
    for id in id_fields {
        ensure!(summary.contains(id), "No such column: {}", id);
    }
    let fields = summary
        .names()
        .filter(|x| !id_fields.iter().any(|id| id == x))
        .filter(|x| summary.contains(&var_name(x)))
        .collect::<Vec<_>>();
    let mut out = tabwriter::TabWriter::new(out);
    let header = id_fields.iter().map(String::as_str).chain(fields.iter().copied());
    writeln!(out, "{}", header.collect::<Vec<_>>().join("\t"))?;
    for row in 0..summary.n_rows() {
        let mut cells = id_fields
            .iter()
            .filter_map(|id| summary.column(id))
            .map(|c| c.values.cell(row))
            .collect::<Vec<_>>();
        for field in &fields {
            let mean = summary
                .numeric(field)
                .ok_or_else(|| anyhow!("{} is not numeric", field))?[row];
            let var = summary
                .numeric(&var_name(field))
                .ok_or_else(|| anyhow!("{} is not numeric", var_name(field)))?[row];
            cells.push(format!("{:.4} ± {:.4}", mean, var.sqrt()));
        }
        writeln!(out, "{}", cells.join("\t"))?;
    }
    out.flush()?;
    Ok(())
}
