use crate::{read_metadata, read_table};
use anyhow::{anyhow, bail, Context, Result};
use bpaf::Bpaf;
use log::*;
use running_summary::{persist, Aggregator, MetaData, Table, WriteSettings};
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Bpaf, Clone, Debug)]
pub struct Options {
    /// A column which identifies a row and is never averaged.  May be given
    /// more than once.
    #[bpaf(long("id"), argument("FIELD"))]
    pub id_fields: Vec<String>,
    /// Continue folding into an existing summary instead of starting from
    /// the first FILE
    #[bpaf(argument("SUMMARY"))]
    pub resume: Option<PathBuf>,
    /// The metadata which goes with --resume
    #[bpaf(argument("META"))]
    pub resume_meta: Option<PathBuf>,
    /// Write the final metadata here
    #[bpaf(argument("META"))]
    pub meta_out: Option<PathBuf>,
    /// Don't check that identifier columns line up between samples
    pub trust_order: bool,
    /// Write the summary to disk after every sample
    pub running_writes: bool,
    /// Give each running write its own numbered file
    pub separate_files: bool,
    /// The first number used by --separate-files
    #[bpaf(argument("N"), fallback(0))]
    pub start_index: u64,
    /// The file name for running writes
    #[bpaf(argument("NAME"), fallback("aggregated_output".to_string()))]
    pub filename: String,
    /// The metadata file name for running writes [default: NAME_metadata]
    #[bpaf(argument("NAME"))]
    pub meta_filename: Option<String>,
    /// Prepended to the file names of running writes
    #[bpaf(argument("PREFIX"), fallback(String::new()))]
    pub path: String,
    /// Samples to fold, in order
    #[bpaf(positional("FILE"))]
    pub files: Vec<PathBuf>,
}

impl Options {
    fn write_settings(&self) -> WriteSettings {
        WriteSettings {
            running_writes: self.running_writes,
            separate_files: self.separate_files,
            separate_files_start_index: self.start_index,
            filename: self.filename.clone(),
            meta_data_filename: self
                .meta_filename
                .clone()
                .unwrap_or_else(|| format!("{}_metadata", self.filename)),
            path: self.path.clone(),
        }
    }
}

pub fn fold(opts: Options) -> Result<()> {
    let mut agg = Aggregator::new(opts.id_fields.iter().cloned())
        .with_write_settings(opts.write_settings())
        .with_order_check(!opts.trust_order);
    let resume = match resume_paths(opts.resume.as_deref(), opts.resume_meta.as_deref())? {
        Some((summary, meta)) => Some((
            read_table(summary, &opts.id_fields)?,
            read_metadata(meta)?,
        )),
        None => None,
    };
    let samples = opts
        .files
        .iter()
        .map(|path| -> Result<(String, Table)> {
            Ok((path.display().to_string(), read_table(path, &opts.id_fields)?))
        });
    let (summary, meta) = fold_samples(&mut agg, resume, samples)?;
    info!("Summarized {} frames", meta.num_frames);

    if let Some(path) = &opts.meta_out {
        persist::write_metadata(File::create(path)?, meta)?;
    }
    let stdout = std::io::stdout();
    persist::write_table(stdout.lock(), &summary)?;
    Ok(())
}

/// `--resume` and `--resume-meta` only make sense together.
fn resume_paths<'a>(
    summary: Option<&'a Path>,
    meta: Option<&'a Path>,
) -> Result<Option<(&'a Path, &'a Path)>> {
    match (summary, meta) {
        (Some(summary), Some(meta)) => Ok(Some((summary, meta))),
        (None, None) => Ok(None),
        _ => bail!("--resume and --resume-meta must be given together"),
    }
}

/// Fold named samples, in order, into `resume` (or into the first sample if
/// there's nothing to resume).  Samples are read lazily, so only the summary
/// and the current sample are in memory at once.
fn fold_samples(
    agg: &mut Aggregator,
    resume: Option<(Table, MetaData)>,
    samples: impl IntoIterator<Item = Result<(String, Table)>>,
) -> Result<(Table, MetaData)> {
    let mut samples = samples.into_iter();
    let (mut summary, mut meta) = match resume {
        Some((summary, meta)) => (summary, Some(meta)),
        None => {
            let (_, first) = samples.next().ok_or_else(|| anyhow!("No samples given"))??;
            (first, None)
        }
    };
    for sample in samples {
        let (name, sample) = sample?;
        let (s, m) = agg
            .aggregate(&summary, &sample, meta)
            .with_context(|| format!("Folding in {}", name))?;
        debug!("{}: {} frames", name, m.num_frames);
        summary = s;
        meta = Some(m);
    }
    let meta = meta.ok_or_else(|| anyhow!("Need at least two samples to make a summary"))?;
    Ok((summary, meta))
}
