/*! Fold a sequence of tables into a running mean/variance summary.

Each sample is a table of named columns.  Some columns are *identifiers*:
they're copied through untouched.  Every other column is a *measured field*.
Folding samples together produces a summary in which each measured field
`f` holds the running mean, and a companion column `f_var` holds the running
sample variance.  Only two tables are ever held at once: the summary so far,
and the next sample.

## Example

```
# use running_summary::*;
let mut agg = Aggregator::new(Vec::<String>::new());
let x = |v: f64| Table::from_columns(vec![("x", vec![v])]).unwrap();

let (summary, meta) = agg.aggregate(&x(1.0), &x(3.0), None).unwrap();
assert_eq!(meta.num_frames, 2);
assert_eq!(summary.numeric("x").unwrap(), &[2.0]);

let (summary, meta) = agg.aggregate(&summary, &x(5.0), Some(meta)).unwrap();
assert_eq!(meta.num_frames, 3);
assert_eq!(summary.numeric("x").unwrap(), &[3.0]);
assert!((summary.numeric("x_var").unwrap()[0] - 4.5).abs() < 1e-12);
```

Rows are matched by position, not joined by identifier.  By default the
aggregator checks that identifier values line up across the two tables; see
[`Aggregator::with_order_check`].
*/

mod aggregator;
pub mod persist;
mod stats;
mod table;
pub mod toy;

pub use aggregator::*;
pub use persist::WriteSettings;
pub use stats::var_name;
pub use table::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// How many samples have been folded into a summary.
///
/// Always travels alongside the summary table it describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaData {
    pub num_frames: u64,
}

#[derive(Debug)]
pub enum Error {
    /// A column needed for the merge is missing from the running summary
    MissingField(String),
    /// The two tables have different row counts
    InconsistentShapes { expected: usize, actual: usize },
    /// Identifier values differ between the two tables at the given row
    FramesUnordered { row: usize, field: String },
    /// A measured field contains non-numeric data
    NonNumericField(String),
    /// A column's length doesn't match the rest of the table
    RaggedColumn {
        name: String,
        expected: usize,
        actual: usize,
    },
    /// A column name appears twice in one table
    DuplicateColumn(String),
    /// The current table is a summary, but no metadata was supplied
    MissingMetaData,
    /// A summary must have at least two frames folded into it
    TooFewFrames(u64),
    /// The frame count can't be incremented any further
    TooManyFrames(u64),
    Io(std::io::Error),
    Csv(csv::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MissingField(name) => write!(f, "Missing field: {}", name),
            Error::InconsistentShapes { expected, actual } => write!(
                f,
                "Inconsistent shapes: expected {} rows, got {}",
                expected, actual
            ),
            Error::FramesUnordered { row, field } => {
                write!(f, "Frames unordered: \"{}\" differs at row {}", field, row)
            }
            Error::NonNumericField(name) => write!(f, "Field {} is not numeric", name),
            Error::RaggedColumn {
                name,
                expected,
                actual,
            } => write!(
                f,
                "Column {} has {} rows, but the table has {}",
                name, actual, expected
            ),
            Error::DuplicateColumn(name) => write!(f, "Duplicate column: {}", name),
            Error::MissingMetaData => {
                f.write_str("The current table is already aggregated but no metadata was given")
            }
            Error::TooFewFrames(n) => write!(
                f,
                "A summary needs at least 2 frames, but metadata says {}",
                n
            ),
            Error::TooManyFrames(n) => {
                write!(f, "Can't fold another frame into a summary of {} frames", n)
            }
            Error::Io(e) => write!(f, "{}", e),
            Error::Csv(e) => write!(f, "{}", e),
        }
    }
}
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Csv(e) => Some(e),
            _ => None,
        }
    }
}
impl From<std::io::Error> for Error {
    fn from(x: std::io::Error) -> Error {
        Error::Io(x)
    }
}
impl From<csv::Error> for Error {
    fn from(x: csv::Error) -> Error {
        Error::Csv(x)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
