mod fold;
mod generate;
mod show;

use anyhow::{Context, Result};
use bpaf::Bpaf;
use running_summary::{persist, MetaData, Table};
use std::fs::File;
use std::path::Path;

#[derive(Bpaf, Clone, Debug)]
#[bpaf(options)]
enum Subcommand {
    /// Fold CSV samples into a running mean/variance summary
    #[bpaf(command)]
    Fold(#[bpaf(external(fold::options))] fold::Options),
    /// Write a table of normally-distributed random data
    #[bpaf(command)]
    Generate(#[bpaf(external(generate::options))] generate::Options),
    /// Pretty-print a summary
    #[bpaf(command)]
    Show(#[bpaf(external(show::options))] show::Options),
}

fn main() {
    env_logger::init();
    let result = match subcommand().run() {
        Subcommand::Fold(opts) => fold::fold(opts),
        Subcommand::Generate(opts) => generate::generate(opts),
        Subcommand::Show(opts) => show::show(opts),
    };
    match result {
        Ok(()) => (),
        Err(e) => {
            // Ignore EPIPE
            let epipe = e
                .chain()
                .filter_map(|x| x.downcast_ref::<std::io::Error>())
                .any(|x| x.kind() == std::io::ErrorKind::BrokenPipe);
            if epipe {
                return;
            }
            eprintln!("Error: {:#}", e);
            std::process::exit(1)
        }
    }
}

/// Identifier columns are read as text, so they're written back unchanged.
pub fn read_table(path: &Path, id_fields: &[String]) -> Result<Table> {
    let file = File::open(path).with_context(|| format!("Opening {}", path.display()))?;
    persist::read_table_with_ids(file, id_fields)
        .with_context(|| format!("Reading {}", path.display()))
}

pub fn read_metadata(path: &Path) -> Result<MetaData> {
    let file = File::open(path).with_context(|| format!("Opening {}", path.display()))?;
    persist::read_metadata(file).with_context(|| format!("Reading {}", path.display()))
}
