use crate::persist::{self, WriteSettings};
use crate::stats::{self, var_name};
use crate::{Error, MetaData, Result, Table};
use log::*;

/// Whether a table is a plain sample or a running summary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// A single, unaveraged sample.  Has no `_var` columns.
    Raw,
    /// A summary of `num_frames` samples.  Every measured field has a `_var`
    /// companion.
    Aggregated(MetaData),
}

impl State {
    /// Decide whether `current` is a raw sample or a summary, by comparing
    /// its columns with those of `incoming` (which is always raw).  If every
    /// column of `current` also appears in `incoming` then `current` hasn't
    /// grown any `_var` columns yet, so it's raw.
    ///
    /// `meta` is ignored for raw tables and required for summaries.
    pub fn classify(current: &Table, incoming: &Table, meta: Option<MetaData>) -> Result<State> {
        if current.names().all(|name| incoming.contains(name)) {
            return Ok(State::Raw);
        }
        let meta = meta.ok_or(Error::MissingMetaData)?;
        if meta.num_frames < 2 {
            return Err(Error::TooFewFrames(meta.num_frames));
        }
        Ok(State::Aggregated(meta))
    }
}

/// Folds tables into a running summary.
///
/// The aggregator itself holds no running state: the caller threads each
/// `(summary, metadata)` pair into the next call.  The only thing which
/// changes between calls is the index used to name output files when
/// [`WriteSettings::separate_files`] is set, so independent aggregation
/// chains should use independent aggregators.
pub struct Aggregator {
    id_fields: Vec<String>,
    write_settings: WriteSettings,
    write_index: u64,
    order_check: bool,
}

impl Aggregator {
    /// `id_fields` are the columns which identify a row.  They are copied
    /// through and never averaged.
    pub fn new(id_fields: impl IntoIterator<Item = impl Into<String>>) -> Aggregator {
        let write_settings = WriteSettings::default();
        Aggregator {
            id_fields: id_fields.into_iter().map(Into::into).collect(),
            write_index: write_settings.separate_files_start_index,
            write_settings,
            order_check: true,
        }
    }

    pub fn with_write_settings(mut self, settings: WriteSettings) -> Aggregator {
        self.write_index = settings.separate_files_start_index;
        self.write_settings = settings;
        self
    }

    /// When enabled (the default), the identifier columns of the two tables
    /// must hold the same values row-by-row, or the merge fails with
    /// [`Error::FramesUnordered`].  When disabled, rows are trusted to line
    /// up and the identifiers are taken from the incoming table.
    pub fn with_order_check(mut self, check: bool) -> Aggregator {
        self.order_check = check;
        self
    }

    pub fn id_fields(&self) -> &[String] {
        &self.id_fields
    }

    fn is_id(&self, name: &str) -> bool {
        self.id_fields.iter().any(|x| x == name)
    }

    /// Fold `incoming` into `current`.
    ///
    /// If `current` is a raw sample, the two are combined into a fresh
    /// summary with `num_frames = 2` (and `meta` is ignored).  Otherwise
    /// `current` must be a summary and `meta` must describe it.
    ///
    /// On failure neither table is touched and nothing is written.
    pub fn aggregate(
        &mut self,
        current: &Table,
        incoming: &Table,
        meta: Option<MetaData>,
    ) -> Result<(Table, MetaData)> {
        let state = State::classify(current, incoming, meta)?;
        self.fold(current, state, incoming)
    }

    /// Like [`Aggregator::aggregate`], but with the state of `current`
    /// given explicitly rather than inferred from its columns.
    pub fn fold(
        &mut self,
        current: &Table,
        state: State,
        incoming: &Table,
    ) -> Result<(Table, MetaData)> {
        let (table, meta) = match state {
            State::Raw => self.bootstrap(current, incoming)?,
            State::Aggregated(meta) => self.merge(current, meta, incoming)?,
        };
        if self.write_settings.running_writes {
            self.write(&table, meta)?;
        }
        Ok((table, meta))
    }

    fn is_measured(&self, incoming: &Table, name: &str) -> bool {
        !self.is_id(name)
            && !name
                .strip_suffix("_var")
                .map_or(false, |base| incoming.contains(base))
    }

    /// The measured fields of a raw sample: everything except identifiers.
    /// A `_var` column whose base field is also present is ignored.
    fn measured_fields<'a>(&'a self, incoming: &'a Table) -> impl Iterator<Item = &'a str> + 'a {
        incoming
            .names()
            .filter(move |name| self.is_measured(incoming, name))
    }

    fn bootstrap(&self, current: &Table, incoming: &Table) -> Result<(Table, MetaData)> {
        self.check_fields(current, incoming, false)?;
        check_format(current, incoming)?;
        self.check_order(current, incoming)?;
        let fields = self.measured_fields(incoming).collect::<Vec<_>>();
        debug!("Bootstrapping a summary from fields {:?}", fields);
        let mut out = self.copy_ids(incoming)?;
        for field in fields {
            let xs = numeric_field(current, field)?;
            let ys = numeric_field(incoming, field)?;
            let (means, vars): (Vec<f64>, Vec<f64>) = xs
                .iter()
                .zip(ys)
                .map(|(&x, &y)| stats::bootstrap(x, y))
                .unzip();
            out.push_column(field, means)?;
            out.push_column(var_name(field), vars)?;
        }
        Ok((out, MetaData { num_frames: 2 }))
    }

    fn merge(&self, current: &Table, meta: MetaData, incoming: &Table) -> Result<(Table, MetaData)> {
        self.check_fields(current, incoming, true)?;
        check_format(current, incoming)?;
        self.check_order(current, incoming)?;
        let n = meta.num_frames;
        let num_frames = n.checked_add(1).ok_or(Error::TooManyFrames(n))?;
        debug!("Folding frame {} into the summary", num_frames);
        let mut out = self.copy_ids(incoming)?;
        for field in self.measured_fields(incoming) {
            let means = numeric_field(current, field)?;
            let vars = numeric_field(current, &var_name(field))?;
            let xs = numeric_field(incoming, field)?;
            let (new_means, new_vars): (Vec<f64>, Vec<f64>) = means
                .iter()
                .zip(vars)
                .zip(xs)
                .map(|((&mean, &var), &x)| stats::fold(mean, var, n, x))
                .unzip();
            out.push_column(field, new_means)?;
            out.push_column(var_name(field), new_vars)?;
        }
        Ok((out, MetaData { num_frames }))
    }

    /// Every identifier must be present in `incoming`, and every column of
    /// `incoming` must be present in `current`.  When `current` is a
    /// summary, every measured field also needs its `_var` companion.
    fn check_fields(&self, current: &Table, incoming: &Table, need_var: bool) -> Result<()> {
        if let Some(id) = self.id_fields.iter().find(|id| !incoming.contains(id)) {
            return Err(Error::MissingField(id.clone()));
        }
        for name in incoming.names() {
            let measured = self.is_measured(incoming, name);
            if !measured && !self.is_id(name) {
                continue;
            }
            if !current.contains(name) {
                return Err(Error::MissingField(name.to_string()));
            }
            if need_var && measured && !current.contains(&var_name(name)) {
                return Err(Error::MissingField(var_name(name)));
            }
        }
        Ok(())
    }

    fn check_order(&self, current: &Table, incoming: &Table) -> Result<()> {
        if !self.order_check {
            return Ok(());
        }
        for field in &self.id_fields {
            let (x, y) = match (current.column(field), incoming.column(field)) {
                (Some(x), Some(y)) => (&x.values, &y.values),
                _ => continue,
            };
            if let Some(row) = (0..x.len()).find(|&row| !x.same_at(y, row)) {
                return Err(Error::FramesUnordered {
                    row,
                    field: field.clone(),
                });
            }
        }
        Ok(())
    }

    fn copy_ids(&self, incoming: &Table) -> Result<Table> {
        let mut out = Table::new();
        for col in incoming.columns().iter().filter(|c| self.is_id(&c.name)) {
            out.push_column(col.name.clone(), col.values.clone())?;
        }
        Ok(out)
    }

    fn write(&mut self, table: &Table, meta: MetaData) -> Result<()> {
        let index = if self.write_settings.separate_files {
            Some(self.write_index)
        } else {
            None
        };
        let (table_path, meta_path) = self.write_settings.paths(index);
        info!("Writing summary of {} frames to {}", meta.num_frames, table_path.display());
        persist::write_table(std::fs::File::create(&table_path)?, table)?;
        persist::write_metadata(std::fs::File::create(&meta_path)?, meta)?;
        self.write_index += 1;
        Ok(())
    }
}

/// Row counts must match.
fn check_format(current: &Table, incoming: &Table) -> Result<()> {
    if current.n_rows() != incoming.n_rows() {
        return Err(Error::InconsistentShapes {
            expected: current.n_rows(),
            actual: incoming.n_rows(),
        });
    }
    Ok(())
}

fn numeric_field<'a>(table: &'a Table, field: &str) -> Result<&'a [f64]> {
    table
        .column(field)
        .ok_or_else(|| Error::MissingField(field.to_string()))?
        .values
        .as_numeric()
        .ok_or_else(|| Error::NonNumericField(field.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Values;
    use approx::assert_relative_eq;

    fn raw(x: f64) -> Table {
        Table::from_columns(vec![("x", vec![x])]).unwrap()
    }

    fn sample(ids: Vec<&str>, a: Vec<f64>, b: Vec<f64>) -> Table {
        Table::from_columns(vec![
            ("id", Values::from(ids)),
            ("a", Values::from(a)),
            ("b", Values::from(b)),
        ])
        .unwrap()
    }

    #[test]
    fn test_worked_example() {
        let mut agg = Aggregator::new(Vec::<String>::new());
        let (summary, meta) = agg.aggregate(&raw(1.), &raw(3.), None).unwrap();
        assert_eq!(meta, MetaData { num_frames: 2 });
        assert_eq!(summary.numeric("x").unwrap(), &[2.]);
        assert_relative_eq!(summary.numeric("x_var").unwrap()[0], 2f64.sqrt());

        let (summary, meta) = agg.aggregate(&summary, &raw(5.), Some(meta)).unwrap();
        assert_eq!(meta, MetaData { num_frames: 3 });
        assert_eq!(summary.numeric("x").unwrap(), &[3.]);
        assert_relative_eq!(summary.numeric("x_var").unwrap()[0], 4.5, epsilon = 1e-12);
    }

    #[test]
    fn test_bootstrap_shape() {
        let mut agg = Aggregator::new(vec!["id"]);
        let x = sample(vec!["p", "q", "r"], vec![1., 2., 3.], vec![0., 0., 0.]);
        let y = sample(vec!["p", "q", "r"], vec![3., 2., 1.], vec![1., 1., 1.]);
        let (summary, meta) = agg.aggregate(&x, &y, None).unwrap();
        assert_eq!(meta.num_frames, 2);
        assert_eq!(
            summary.names().collect::<Vec<_>>(),
            vec!["id", "a", "a_var", "b", "b_var"]
        );
        assert_eq!(summary.n_rows(), 3);
        assert_eq!(summary.column("id"), y.column("id"));
        assert_eq!(summary.numeric("a").unwrap(), &[2., 2., 2.]);
        assert_eq!(summary.numeric("b").unwrap(), &[0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_metadata_increments() {
        let mut agg = Aggregator::new(vec!["id"]);
        let x = sample(vec!["p"], vec![1.], vec![2.]);
        let (mut summary, mut meta) = agg.aggregate(&x, &x, None).unwrap();
        for n in 2..10 {
            assert_eq!(meta.num_frames, n);
            let (s, m) = agg.aggregate(&summary, &x, Some(meta)).unwrap();
            assert_eq!(m.num_frames, n + 1);
            summary = s;
            meta = m;
        }
        // Constant input: the mean stays put and the variance goes to zero
        assert_eq!(summary.numeric("a").unwrap(), &[1.]);
        assert_eq!(summary.numeric("a_var").unwrap(), &[0.]);
    }

    #[test]
    fn test_missing_field() {
        let mut agg = Aggregator::new(vec!["id"]);
        let x = sample(vec!["p"], vec![1.], vec![2.]);
        let (summary, meta) = agg.aggregate(&x, &x, None).unwrap();

        let mut extra = x.clone();
        extra.push_column("c", vec![4.]).unwrap();
        match agg.aggregate(&summary, &extra, Some(meta)) {
            Err(Error::MissingField(name)) => assert_eq!(name, "c"),
            x => panic!("Unexpected result: {:?}", x),
        }
    }

    #[test]
    fn test_missing_var() {
        let mut agg = Aggregator::new(vec!["id"]);
        let summary = Table::from_columns(vec![
            ("id", Values::from(vec!["p"])),
            ("a", Values::from(vec![1.])),
            ("a_var", Values::from(vec![1.])),
            ("b", Values::from(vec![1.])),
        ])
        .unwrap();
        let x = sample(vec!["p"], vec![1.], vec![2.]);
        match agg.aggregate(&summary, &x, Some(MetaData { num_frames: 4 })) {
            Err(Error::MissingField(name)) => assert_eq!(name, "b_var"),
            x => panic!("Unexpected result: {:?}", x),
        }
    }

    #[test]
    fn test_missing_id() {
        let mut agg = Aggregator::new(vec!["id"]);
        let x = Table::from_columns(vec![("ID", vec![1., 2.]), ("x", vec![3., 4.])]).unwrap();
        match agg.aggregate(&x, &x, None) {
            Err(Error::MissingField(name)) => assert_eq!(name, "id"),
            x => panic!("Unexpected result: {:?}", x),
        }

        let summary = Table::from_columns(vec![("x", vec![3.]), ("x_var", vec![0.])]).unwrap();
        let sample = Table::from_columns(vec![("x", vec![5.])]).unwrap();
        assert!(matches!(
            agg.aggregate(&summary, &sample, Some(MetaData { num_frames: 2 })),
            Err(Error::MissingField(name)) if name == "id"
        ));
    }

    #[test]
    fn test_frame_count_overflow() {
        let mut agg = Aggregator::new(Vec::<String>::new());
        let summary = Table::from_columns(vec![("x", vec![3.]), ("x_var", vec![0.])]).unwrap();
        let meta = MetaData {
            num_frames: u64::MAX,
        };
        assert!(matches!(
            agg.aggregate(&summary, &raw(1.), Some(meta)),
            Err(Error::TooManyFrames(n)) if n == u64::MAX
        ));
    }

    #[test]
    fn test_ids_survive_csv() {
        let input = &b"id,x\n007,1\n1e3,2\n"[..];
        let sample = persist::read_table_with_ids(input, &["id"]).unwrap();
        let mut agg = Aggregator::new(vec!["id"]);
        let (summary, _) = agg.aggregate(&sample, &sample, None).unwrap();
        let mut out = vec![];
        persist::write_table(&mut out, &summary).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            ",id,x,x_var\n0,007,1,0\n1,1e3,2,0\n"
        );
    }

    #[test]
    fn test_inconsistent_shapes() {
        let mut agg = Aggregator::new(vec!["id"]);
        let x = sample(vec!["p", "q"], vec![1., 2.], vec![2., 3.]);
        let (summary, meta) = agg.aggregate(&x, &x, None).unwrap();
        let y = sample(vec!["p"], vec![1.], vec![2.]);
        match agg.aggregate(&summary, &y, Some(meta)) {
            Err(Error::InconsistentShapes { expected, actual }) => {
                assert_eq!(expected, 2);
                assert_eq!(actual, 1);
            }
            x => panic!("Unexpected result: {:?}", x),
        }
        // Also caught when bootstrapping
        assert!(matches!(
            agg.aggregate(&y, &x, None),
            Err(Error::InconsistentShapes {
                expected: 1,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_frames_unordered() {
        let mut agg = Aggregator::new(vec!["id"]);
        let x = sample(vec!["p", "q"], vec![1., 2.], vec![2., 3.]);
        let y = sample(vec!["q", "p"], vec![2., 1.], vec![3., 2.]);
        match agg.aggregate(&x, &y, None) {
            Err(Error::FramesUnordered { row, field }) => {
                assert_eq!(row, 0);
                assert_eq!(field, "id");
            }
            x => panic!("Unexpected result: {:?}", x),
        }

        // With the check off, rows are trusted and ids come from `incoming`
        let mut agg = Aggregator::new(vec!["id"]).with_order_check(false);
        let (summary, _) = agg.aggregate(&x, &y, None).unwrap();
        assert_eq!(summary.column("id"), y.column("id"));
        assert_eq!(summary.numeric("a").unwrap(), &[1.5, 1.5]);
    }

    #[test]
    fn test_missing_metadata() {
        let mut agg = Aggregator::new(Vec::<String>::new());
        let (summary, _) = agg.aggregate(&raw(1.), &raw(2.), None).unwrap();
        assert!(matches!(
            agg.aggregate(&summary, &raw(3.), None),
            Err(Error::MissingMetaData)
        ));
        assert!(matches!(
            agg.aggregate(&summary, &raw(3.), Some(MetaData { num_frames: 1 })),
            Err(Error::TooFewFrames(1))
        ));
    }

    #[test]
    fn test_non_numeric() {
        let mut agg = Aggregator::new(Vec::<String>::new());
        let x = Table::from_columns(vec![("x", vec!["one"])]).unwrap();
        let y = Table::from_columns(vec![("x", vec!["two"])]).unwrap();
        match agg.aggregate(&x, &y, None) {
            Err(Error::NonNumericField(name)) => assert_eq!(name, "x"),
            x => panic!("Unexpected result: {:?}", x),
        }
    }

    #[test]
    fn test_classify() {
        let x = raw(1.);
        let summary = Table::from_columns(vec![("x", vec![1.]), ("x_var", vec![0.])]).unwrap();
        let meta = MetaData { num_frames: 7 };
        assert_eq!(State::classify(&x, &x, None).unwrap(), State::Raw);
        assert_eq!(State::classify(&x, &x, Some(meta)).unwrap(), State::Raw);
        assert_eq!(
            State::classify(&summary, &x, Some(meta)).unwrap(),
            State::Aggregated(meta)
        );
    }

    #[test]
    fn test_explicit_state() {
        let mut agg = Aggregator::new(Vec::<String>::new());
        let (summary, meta) = agg.fold(&raw(1.), State::Raw, &raw(3.)).unwrap();
        let (summary, meta) = agg
            .fold(&summary, State::Aggregated(meta), &raw(5.))
            .unwrap();
        assert_eq!(meta.num_frames, 3);
        assert_eq!(summary.numeric("x").unwrap(), &[3.]);
    }

    #[test]
    fn test_incoming_var_ignored() {
        let mut agg = Aggregator::new(Vec::<String>::new());
        let (summary, meta) = agg.aggregate(&raw(1.), &raw(3.), None).unwrap();
        let noisy = Table::from_columns(vec![("x", vec![5.]), ("x_var", vec![100.])]).unwrap();
        let state = State::Aggregated(meta);
        let (summary, _) = agg.fold(&summary, state, &noisy).unwrap();
        assert_eq!(summary.names().collect::<Vec<_>>(), vec!["x", "x_var"]);
        assert_relative_eq!(summary.numeric("x_var").unwrap()[0], 4.5, epsilon = 1e-12);
    }

    #[test]
    fn test_running_writes() {
        let dir = tempfile::tempdir().unwrap();
        let settings = WriteSettings {
            running_writes: true,
            separate_files: true,
            separate_files_start_index: 5,
            path: format!("{}/", dir.path().display()),
            ..WriteSettings::default()
        };
        let mut agg = Aggregator::new(Vec::<String>::new()).with_write_settings(settings);
        let (summary, meta) = agg.aggregate(&raw(1.), &raw(3.), None).unwrap();
        let (summary, meta) = agg.aggregate(&summary, &raw(5.), Some(meta)).unwrap();

        let table_path = dir.path().join("aggregated_output6.csv");
        let meta_path = dir
            .path()
            .join("aggregated_output6aggregated_output_metadata.csv");
        assert!(dir.path().join("aggregated_output5.csv").exists());
        let read = persist::read_table(std::fs::File::open(table_path).unwrap()).unwrap();
        assert_eq!(read, summary);
        let read_meta = persist::read_metadata(std::fs::File::open(meta_path).unwrap()).unwrap();
        assert_eq!(read_meta, meta);

        // Failed calls write nothing
        assert!(agg.aggregate(&summary, &Table::new(), None).is_err());
        assert!(!dir.path().join("aggregated_output7.csv").exists());
    }
}
