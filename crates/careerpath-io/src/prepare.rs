//! Turns a raw [`Table`] into a numeric feature matrix and a label column.

use std::collections::BTreeSet;

use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::{AUXILIARY_COLUMN, FeatureSchema, TARGET_COLUMN, Table};

/// Feature matrix and labels, index-aligned, with columns in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedData {
    /// Feature names, equal to the schema's columns.
    pub feature_names: Vec<String>,
    /// `features[row][column]`.
    pub features: Vec<Vec<f64>>,
    /// Raw target value of each row.
    pub labels: Vec<String>,
}

impl PreparedData {
    /// Number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.features.len()
    }
}

/// One feature column after numeric parsing or one-hot expansion.
struct Expanded {
    name: String,
    values: Vec<f64>,
}

/// Splits a table into features and labels.
///
/// Drops the target and auxiliary columns, one-hot encodes every column
/// that does not parse as numbers (categories sorted, the first dropped,
/// new columns named `{column}_{category}`), then checks the result
/// against the schema and reorders it to schema order.
#[derive(Debug, Clone)]
pub struct FeaturePreparer {
    schema: FeatureSchema,
    target: String,
    dropped: Vec<String>,
}

impl Default for FeaturePreparer {
    fn default() -> Self {
        Self::new(FeatureSchema::career())
    }
}

impl FeaturePreparer {
    /// Prepare against `schema`, with `Field` as target and `Career` dropped.
    #[must_use]
    pub fn new(schema: FeatureSchema) -> Self {
        Self {
            schema,
            target: TARGET_COLUMN.to_string(),
            dropped: vec![AUXILIARY_COLUMN.to_string()],
        }
    }

    /// Override the target column name.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Override the non-feature columns to drop.
    #[must_use]
    pub fn with_dropped_columns(mut self, dropped: Vec<String>) -> Self {
        self.dropped = dropped;
        self
    }

    /// Return the schema prepared tables must match.
    #[must_use]
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Prepare `table`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::MissingColumn`] | The target column is absent |
    /// | [`IoError::MissingValue`] | A numeric cell reads as NaN |
    /// | [`IoError::SchemaMismatch`] | Produced columns differ from the schema |
    #[instrument(skip_all, fields(n_rows = table.n_rows(), n_columns = table.columns().len()))]
    pub fn prepare(&self, table: &Table) -> Result<PreparedData, IoError> {
        let target_index = table.require_column(&self.target)?;
        let labels: Vec<String> = table.column(target_index).map(str::to_string).collect();

        let mut expanded = Vec::new();
        for (index, name) in table.columns().iter().enumerate() {
            if index == target_index || self.dropped.contains(name) {
                continue;
            }
            match parse_numeric(table, index)? {
                Some(values) => expanded.push(Expanded {
                    name: name.clone(),
                    values,
                }),
                None => {
                    let before = expanded.len();
                    one_hot(table, index, &mut expanded);
                    debug!(
                        column = %name,
                        n_indicators = expanded.len() - before,
                        "one-hot encoded categorical column"
                    );
                }
            }
        }

        let produced: Vec<String> = expanded.iter().map(|e| e.name.clone()).collect();
        let order = self.schema.reorder_indices(&produced)?;

        let features: Vec<Vec<f64>> = (0..table.n_rows())
            .map(|row| order.iter().map(|&col| expanded[col].values[row]).collect())
            .collect();

        info!(
            n_rows = features.len(),
            n_features = order.len(),
            "features prepared"
        );

        Ok(PreparedData {
            feature_names: self.schema.columns().to_vec(),
            features,
            labels,
        })
    }
}

/// Parse a column as numbers; `None` when any cell is not numeric.
fn parse_numeric(table: &Table, index: usize) -> Result<Option<Vec<f64>>, IoError> {
    let mut values = Vec::with_capacity(table.n_rows());
    for (row_index, cell) in table.column(index).enumerate() {
        let Ok(value) = cell.parse::<f64>() else {
            return Ok(None);
        };
        if value.is_nan() {
            return Err(IoError::MissingValue {
                path: table.source().to_path_buf(),
                row_index,
                column: table.columns()[index].clone(),
            });
        }
        values.push(value);
    }
    Ok(Some(values))
}

/// Append one indicator column per category except the first.
fn one_hot(table: &Table, index: usize, out: &mut Vec<Expanded>) {
    let name = &table.columns()[index];
    let categories: BTreeSet<&str> = table.column(index).collect();
    for category in categories.into_iter().skip(1) {
        out.push(Expanded {
            name: format!("{name}_{category}"),
            values: table
                .column(index)
                .map(|cell| if cell == category { 1.0 } else { 0.0 })
                .collect(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| (*x).to_string()).collect()
    }

    fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
        Table::new("mem.csv", s(columns), rows.iter().map(|r| s(r)).collect()).unwrap()
    }

    #[test]
    fn drops_target_and_auxiliary_columns() {
        let t = table(
            &["Field", "Career", "b", "a"],
            &[&["Sci", "Chemist", "1", "2"], &["Art", "Painter", "3", "4"]],
        );
        let schema = FeatureSchema::new(s(&["a", "b"])).unwrap();
        let prepared = FeaturePreparer::new(schema).prepare(&t).unwrap();

        assert_eq!(prepared.feature_names, s(&["a", "b"]));
        assert_eq!(prepared.features, vec![vec![2.0, 1.0], vec![4.0, 3.0]]);
        assert_eq!(prepared.labels, s(&["Sci", "Art"]));
    }

    #[test]
    fn categorical_columns_are_one_hot_encoded_drop_first() {
        let t = table(
            &["Field", "score", "track"],
            &[
                &["Sci", "1", "online"],
                &["Art", "2", "campus"],
                &["Sci", "3", "hybrid"],
            ],
        );
        // Categories sort as campus < hybrid < online; campus is dropped.
        let schema = FeatureSchema::new(s(&["score", "track_hybrid", "track_online"])).unwrap();
        let prepared = FeaturePreparer::new(schema).prepare(&t).unwrap();

        assert_eq!(
            prepared.features,
            vec![vec![1.0, 0.0, 1.0], vec![2.0, 0.0, 0.0], vec![3.0, 1.0, 0.0]]
        );
    }

    #[test]
    fn unexpected_indicator_columns_are_a_schema_mismatch() {
        let t = table(&["Field", "score", "track"], &[&["Sci", "1", "a"], &["Art", "2", "b"]]);
        let schema = FeatureSchema::new(s(&["score"])).unwrap();
        let err = FeaturePreparer::new(schema).prepare(&t).unwrap_err();
        assert!(matches!(
            err,
            IoError::SchemaMismatch { ref unexpected, .. } if unexpected == &s(&["track_b"])
        ));
        assert!(err.is_schema_error());
    }

    #[test]
    fn missing_schema_column_is_a_schema_mismatch() {
        let t = table(&["Field", "a"], &[&["Sci", "1"]]);
        let schema = FeatureSchema::new(s(&["a", "b"])).unwrap();
        let err = FeaturePreparer::new(schema).prepare(&t).unwrap_err();
        assert!(matches!(err, IoError::SchemaMismatch { ref missing, .. } if missing == &s(&["b"])));
    }

    #[test]
    fn missing_target_is_reported() {
        let t = table(&["a"], &[&["1"]]);
        let schema = FeatureSchema::new(s(&["a"])).unwrap();
        let err = FeaturePreparer::new(schema).prepare(&t).unwrap_err();
        assert!(matches!(err, IoError::MissingColumn { column, .. } if column == "Field"));
    }

    #[test]
    fn nan_cell_is_missing_value() {
        let t = table(&["Field", "a"], &[&["Sci", "1"], &["Art", "NaN"]]);
        let schema = FeatureSchema::new(s(&["a"])).unwrap();
        let err = FeaturePreparer::new(schema).prepare(&t).unwrap_err();
        assert!(matches!(err, IoError::MissingValue { row_index: 1, .. }));
    }

    #[test]
    fn idempotent_on_numeric_input() {
        let t = table(
            &["Field", "Career", "b", "a"],
            &[&["Sci", "Chemist", "1.5", "2"], &["Art", "Painter", "3", "4.25"]],
        );
        let preparer = FeaturePreparer::new(FeatureSchema::new(s(&["a", "b"])).unwrap());
        let first = preparer.prepare(&t).unwrap();

        // Rebuild a table from the prepared output and prepare it again.
        let mut columns = vec!["Field".to_string()];
        columns.extend(first.feature_names.iter().cloned());
        let rows: Vec<Vec<String>> = first
            .labels
            .iter()
            .zip(&first.features)
            .map(|(label, row)| {
                std::iter::once(label.clone())
                    .chain(row.iter().map(f64::to_string))
                    .collect()
            })
            .collect();
        let again = preparer
            .prepare(&Table::new("mem.csv", columns, rows).unwrap())
            .unwrap();

        assert_eq!(first, again);
        assert_eq!(first, preparer.prepare(&t).unwrap());
    }
}
