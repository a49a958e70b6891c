use crate::{Error, Result};

/// The contents of a single column.
#[derive(Clone, Debug, PartialEq)]
pub enum Values {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}
impl Values {
    pub fn len(&self) -> usize {
        match self {
            Values::Numeric(xs) => xs.len(),
            Values::Text(xs) => xs.len(),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            Values::Numeric(xs) => Some(xs),
            Values::Text(_) => None,
        }
    }
    /// The cell at `row`, formatted for output.  Floats use the shortest
    /// representation which round-trips.
    pub fn cell(&self, row: usize) -> String {
        match self {
            Values::Numeric(xs) => xs[row].to_string(),
            Values::Text(xs) => xs[row].clone(),
        }
    }
    /// Whether the cells at `row` hold the same value.  NaN matches NaN.
    pub fn same_at(&self, other: &Values, row: usize) -> bool {
        match (self, other) {
            (Values::Numeric(x), Values::Numeric(y)) => {
                x[row] == y[row] || (x[row].is_nan() && y[row].is_nan())
            }
            (Values::Text(x), Values::Text(y)) => x[row] == y[row],
            _ => false,
        }
    }
}
impl From<Vec<f64>> for Values {
    fn from(x: Vec<f64>) -> Values {
        Values::Numeric(x)
    }
}
impl From<Vec<String>> for Values {
    fn from(x: Vec<String>) -> Values {
        Values::Text(x)
    }
}
impl From<Vec<&str>> for Values {
    fn from(x: Vec<&str>) -> Values {
        Values::Text(x.into_iter().map(str::to_string).collect())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Values,
}

/// An ordered collection of named, equal-length columns.
///
/// Rows have no identity of their own: row `i` of one table corresponds to
/// row `i` of another.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Table {
        Table::default()
    }

    pub fn from_columns<N, V>(columns: impl IntoIterator<Item = (N, V)>) -> Result<Table>
    where
        N: Into<String>,
        V: Into<Values>,
    {
        let mut table = Table::new();
        for (name, values) in columns {
            table.push_column(name, values)?;
        }
        Ok(table)
    }

    /// Append a column.  Fails if the name is already taken, or if the
    /// length doesn't match the existing columns.
    pub fn push_column(&mut self, name: impl Into<String>, values: impl Into<Values>) -> Result<()> {
        let name = name.into();
        let values = values.into();
        if self.contains(&name) {
            return Err(Error::DuplicateColumn(name));
        }
        if let Some(first) = self.columns.first() {
            if first.values.len() != values.len() {
                return Err(Error::RaggedColumn {
                    name,
                    expected: first.values.len(),
                    actual: values.len(),
                });
            }
        }
        self.columns.push(Column { name, values });
        Ok(())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// The values of a numeric column.  `None` if the column is absent or
    /// holds text.
    pub fn numeric(&self, name: &str) -> Option<&[f64]> {
        self.column(name)?.values.as_numeric()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }
}
