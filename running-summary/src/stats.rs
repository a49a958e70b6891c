/// The name of the variance column which accompanies `field` in a summary.
pub fn var_name(field: &str) -> String {
    format!("{}_var", field)
}

/// Combine the first two observations of a field.
///
/// Returns the two-point mean and the seed for the variance column.  Note
/// that the seed is sqrt((a-m)² + (b-m)²), which is a standard deviation,
/// not a variance.  [`fold`] treats it as a variance anyway.  In practice
/// this doesn't matter: at n=2 the `var / (n-1)` term of `fold` cancels the
/// seed completely.
pub fn bootstrap(a: f64, b: f64) -> (f64, f64) {
    let mean = (a + b) / 2.;
    let var = ((a - mean).powi(2) + (b - mean).powi(2)).sqrt();
    (mean, var)
}

/// Fold the observation `x` into a field which has seen `n` observations so
/// far, with running mean `mean` and running sample variance `var`.
///
/// The variance update is expressed in terms of the *previous* mean:
///
/// ```text
/// var' = var + (x - mean)²/n - var/(n-1)
/// ```
///
/// `n` must be at least 2.
pub fn fold(mean: f64, var: f64, n: u64, x: f64) -> (f64, f64) {
    let n = n as f64;
    let new_mean = (mean * n + x) / (n + 1.);
    let delta = x - mean; // diff from the old mean
    let new_var = var + delta * delta / n - var / (n - 1.);
    (new_mean, new_var)
}
