//! # Datasets
//!
//! A dataset is a pair of row-major tables: one row of input features and
//! one row of expected outputs per example. No other schema exists; the
//! optimisers index rows directly.

/// A flat row-major table of scalars.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    width: usize,
    values: Vec<f64>,
}

impl DataTable {
    /// Build a table from its column count and flattened rows.
    pub fn new(width: usize, values: Vec<f64>) -> Self {
        assert!(width > 0, "a table needs at least one column");
        assert_eq!(
            values.len() % width,
            0,
            "value count {} is not a multiple of the width {}",
            values.len(),
            width
        );
        Self { width, values }
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.values.len() / self.width
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Read one cell.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        assert!(col < self.width, "column {} out of {}", col, self.width);
        self.values[row * self.width + col]
    }

    /// Borrow one full row.
    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row * self.width..(row + 1) * self.width]
    }
}

/// Paired input and output tables with one row per training example.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    inputs: DataTable,
    outputs: DataTable,
}

impl DataSet {
    pub fn new(inputs: DataTable, outputs: DataTable) -> Self {
        assert_eq!(
            inputs.len(),
            outputs.len(),
            "input and output tables must have the same number of rows"
        );
        Self { inputs, outputs }
    }

    pub fn inputs(&self) -> &DataTable {
        &self.inputs
    }

    pub fn outputs(&self) -> &DataTable {
        &self.outputs
    }

    /// Number of examples.
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}
