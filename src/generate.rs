use anyhow::{bail, ensure, Result};
use bpaf::Bpaf;
use rand::rngs::StdRng;
use rand::SeedableRng;
use running_summary::{persist, toy};

#[derive(Bpaf, Clone, Debug)]
pub struct Options {
    /// The number of rows
    #[bpaf(argument("N"), fallback(10))]
    pub rows: usize,
    /// The mean of a column.  Give once per column [default: two columns
    /// with mean 0]
    #[bpaf(argument("X"))]
    pub mean: Vec<f64>,
    /// The standard deviation of a column.  Give once per column [default: 1]
    #[bpaf(argument("X"))]
    pub std_dev: Vec<f64>,
    /// Seed the RNG, for reproducible output
    #[bpaf(argument("SEED"))]
    pub seed: Option<u64>,
    /// Add an "id" column holding the row number
    pub ids: bool,
}

pub fn generate(opts: Options) -> Result<()> {
    let means = if opts.mean.is_empty() {
        vec![0., 0.]
    } else {
        opts.mean
    };
    let std_devs = if opts.std_dev.is_empty() {
        vec![1.; means.len()]
    } else {
        opts.std_dev
    };
    ensure!(
        means.len() == std_devs.len(),
        "Got {} means but {} standard deviations",
        means.len(),
        std_devs.len()
    );
    if let Some(x) = std_devs.iter().find(|x| !(x.is_finite() && **x >= 0.)) {
        bail!("Bad standard deviation: {}", x);
    }
    let mut rng = match opts.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let table = if opts.ids {
        toy::generate_with_ids(opts.rows, &means, &std_devs, &mut rng)
    } else {
        toy::generate(opts.rows, &means, &std_devs, &mut rng)
    };
    let stdout = std::io::stdout();
    persist::write_table(stdout.lock(), &table)?;
    Ok(())
}
