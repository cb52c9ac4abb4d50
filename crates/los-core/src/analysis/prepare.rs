//! Feature preparation: label encoding, mean imputation, standardization.

use std::collections::{BTreeMap, BTreeSet};

use los_math::{observed_mean, standardize, Standardization};
use nalgebra::DMatrix;

use crate::data::{Column, ObservationTable};
use crate::error::{AnalysisError, Result};

/// Dense, fully observed, standardized feature matrix.
#[derive(Debug, Clone)]
pub struct PreparedMatrix {
    /// Feature names, one per matrix column.
    pub columns: Vec<String>,
    /// Rows are observations in table order.
    pub data: DMatrix<f64>,
    /// Per-column centering and scaling.
    pub scaling: Vec<Standardization>,
    /// Sorted class labels for every label-encoded column.
    pub encodings: BTreeMap<String, Vec<String>>,
}

impl PreparedMatrix {
    /// Number of columns that were not constant before scaling.
    pub fn informative_columns(&self) -> usize {
        self.scaling.iter().filter(|s| !s.constant).count()
    }
}

/// Number sorted distinct labels 0..n-1 and map each cell to its index.
///
/// Missing cells stay missing. Returns the class list and the codes.
pub fn label_encode(cells: &[Option<String>]) -> (Vec<String>, Vec<Option<f64>>) {
    let classes: Vec<String> = cells
        .iter()
        .flatten()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let index: BTreeMap<&str, usize> = classes
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();
    let codes = cells
        .iter()
        .map(|c| c.as_deref().and_then(|s| index.get(s)).map(|&i| i as f64))
        .collect();
    (classes, codes)
}

/// Build the prepared matrix for `features` from `table`.
pub fn prepare_features(table: &ObservationTable, features: &[String]) -> Result<PreparedMatrix> {
    if features.is_empty() {
        return Err(AnalysisError::DataPreparation(
            "no clustering features requested".to_string(),
        ));
    }
    if table.is_empty() {
        return Err(AnalysisError::DataPreparation(
            "observation table is empty".to_string(),
        ));
    }

    let n = table.len();
    let mut data = DMatrix::zeros(n, features.len());
    let mut scaling = Vec::with_capacity(features.len());
    let mut encodings = BTreeMap::new();

    for (j, name) in features.iter().enumerate() {
        let column = table.column(name).ok_or_else(|| {
            AnalysisError::DataPreparation(format!("feature {name:?} is not a column of the table"))
        })?;
        let cells = match column {
            Column::Numeric(values) => values,
            Column::Categorical(labels) => {
                let (classes, codes) = label_encode(&labels);
                encodings.insert(name.clone(), classes);
                codes
            }
        };

        let fill = observed_mean(&cells).ok_or_else(|| {
            AnalysisError::DataPreparation(format!("feature {name:?} has no observed values"))
        })?;
        let mut values: Vec<f64> = cells.iter().map(|c| c.unwrap_or(fill)).collect();
        scaling.push(standardize(&mut values));
        for (i, v) in values.into_iter().enumerate() {
            data[(i, j)] = v;
        }
    }

    Ok(PreparedMatrix {
        columns: features.to_vec(),
        data,
        scaling,
        encodings,
    })
}
