//! Random sample tables, for testing.

use crate::{Table, Values};
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// A table of `rows` rows with one column per entry of `means`.  Column `i`
/// is named `"i"` and each of its cells is drawn independently from
/// N(`means[i]`, `std_devs[i]`²).
///
/// Panics if `means` and `std_devs` differ in length, or if a standard
/// deviation is negative or not finite.
pub fn generate(rows: usize, means: &[f64], std_devs: &[f64], rng: &mut impl Rng) -> Table {
    assert_eq!(means.len(), std_devs.len());
    let mut table = Table::new();
    for (i, (&mean, &std_dev)) in means.iter().zip(std_devs).enumerate() {
        let dist = Normal::new(mean, std_dev).unwrap();
        let xs = dist.sample_iter(&mut *rng).take(rows).collect::<Vec<f64>>();
        // Names are unique and lengths all match
        table.push_column(i.to_string(), xs).unwrap();
    }
    table
}

/// Like [`generate`], but with a leading identifier column `"id"` holding
/// the row numbers as text.
pub fn generate_with_ids(
    rows: usize,
    means: &[f64],
    std_devs: &[f64],
    rng: &mut impl Rng,
) -> Table {
    let ids = (0..rows).map(|i| i.to_string()).collect::<Vec<_>>();
    let mut table = Table::from_columns(vec![("id", Values::Text(ids))]).unwrap();
    for col in generate(rows, means, std_devs, rng).columns() {
        table.push_column(col.name.clone(), col.values.clone()).unwrap();
    }
    table
}
