// src/storage/table.rs

//! In-memory column table.
//!
//! The crate's unit of tabular data: an ordered set of named, nullable
//! columns of string, integer or float values. Converts losslessly to and
//! from arrow record batches for parquet I/O, and carries the small set of
//! column operations the cleaning and merge layers need.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use arrow_array::{Array, ArrayRef, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};

use crate::error::{AppError, Result};

/// Values of one column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Utf8(Vec<Option<String>>),
    Int64(Vec<Option<i64>>),
    Float64(Vec<Option<f64>>),
}

impl ColumnData {
    /// Number of values (including nulls).
    pub fn len(&self) -> usize {
        match self {
            Self::Utf8(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short type name for reports.
    pub fn dtype(&self) -> &'static str {
        match self {
            Self::Utf8(_) => "utf8",
            Self::Int64(_) => "int64",
            Self::Float64(_) => "float64",
        }
    }

    fn empty_like(&self) -> Self {
        match self {
            Self::Utf8(_) => Self::Utf8(Vec::new()),
            Self::Int64(_) => Self::Int64(Vec::new()),
            Self::Float64(_) => Self::Float64(Vec::new()),
        }
    }

    fn push_null(&mut self) {
        match self {
            Self::Utf8(v) => v.push(None),
            Self::Int64(v) => v.push(None),
            Self::Float64(v) => v.push(None),
        }
    }

    fn push_from(&mut self, other: &ColumnData, idx: usize) -> Result<()> {
        match (self, other) {
            (Self::Utf8(dst), Self::Utf8(src)) => dst.push(src[idx].clone()),
            (Self::Int64(dst), Self::Int64(src)) => dst.push(src[idx]),
            (Self::Float64(dst), Self::Float64(src)) => dst.push(src[idx]),
            (dst, src) => {
                return Err(AppError::validation(format!(
                    "column type mismatch: {} vs {}",
                    dst.dtype(),
                    src.dtype()
                )));
            }
        }
        Ok(())
    }

    /// Number of null values.
    pub fn null_count(&self) -> usize {
        match self {
            Self::Utf8(v) => v.iter().filter(|x| x.is_none()).count(),
            Self::Int64(v) => v.iter().filter(|x| x.is_none()).count(),
            Self::Float64(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    /// Number of distinct non-null values.
    pub fn unique_count(&self) -> usize {
        match self {
            Self::Utf8(v) => v.iter().flatten().collect::<HashSet<_>>().len(),
            Self::Int64(v) => v.iter().flatten().collect::<HashSet<_>>().len(),
            Self::Float64(v) => v
                .iter()
                .flatten()
                .map(|f| f.to_bits())
                .collect::<HashSet<_>>()
                .len(),
        }
    }

    /// Value at `idx` rendered as a string, `""` for null. Used for row keys.
    fn render(&self, idx: usize) -> String {
        match self {
            Self::Utf8(v) => v[idx].clone().unwrap_or_default(),
            Self::Int64(v) => v[idx].map(|x| x.to_string()).unwrap_or_default(),
            Self::Float64(v) => v[idx].map(|x| x.to_string()).unwrap_or_default(),
        }
    }

    /// Numeric view of a value, when the column is numeric.
    pub fn numeric(&self, idx: usize) -> Option<f64> {
        match self {
            Self::Utf8(_) => None,
            Self::Int64(v) => v[idx].map(|x| x as f64),
            Self::Float64(v) => v[idx],
        }
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn utf8(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Utf8(values),
        }
    }

    pub fn int64(name: impl Into<String>, values: Vec<Option<i64>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Int64(values),
        }
    }

    pub fn float64(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Float64(values),
        }
    }
}

/// An ordered set of equally sized columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Empty table with no columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from columns, checking that lengths agree.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        if let Some(first) = columns.first() {
            let rows = first.data.len();
            for column in &columns {
                if column.data.len() != rows {
                    return Err(AppError::validation(format!(
                        "column {} has {} rows, expected {rows}",
                        column.name,
                        column.data.len()
                    )));
                }
            }
        }

        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate column name {}",
                    column.name
                )));
            }
        }

        Ok(Self { columns })
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.data.len())
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// String values of a column, if it is a string column.
    pub fn utf8_values(&self, name: &str) -> Option<&[Option<String>]> {
        match self.column(name).map(|c| &c.data) {
            Some(ColumnData::Utf8(v)) => Some(v),
            _ => None,
        }
    }

    /// Integer values of a column, if it is an integer column.
    pub fn int64_values(&self, name: &str) -> Option<&[Option<i64>]> {
        match self.column(name).map(|c| &c.data) {
            Some(ColumnData::Int64(v)) => Some(v),
            _ => None,
        }
    }

    /// Float values of a column, if it is a float column.
    pub fn float64_values(&self, name: &str) -> Option<&[Option<f64>]> {
        match self.column(name).map(|c| &c.data) {
            Some(ColumnData::Float64(v)) => Some(v),
            _ => None,
        }
    }

    /// Index of the first row whose `column` value equals `value`.
    pub fn find_row(&self, column: &str, value: &str) -> Option<usize> {
        let values = self.utf8_values(column)?;
        values
            .iter()
            .position(|v| v.as_deref() == Some(value))
    }

    /// New table keeping only the rows `keep` selects.
    pub fn retain_rows(&self, keep: impl Fn(usize) -> bool) -> Table {
        let mut columns: Vec<Column> = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                data: c.data.empty_like(),
            })
            .collect();

        for idx in 0..self.num_rows() {
            if !keep(idx) {
                continue;
            }
            for (dst, src) in columns.iter_mut().zip(&self.columns) {
                // Types always match: dst was built from src.
                let _ = dst.data.push_from(&src.data, idx);
            }
        }
        Table { columns }
    }

    /// Contiguous row slice as a new table.
    pub fn slice(&self, offset: usize, len: usize) -> Table {
        let end = (offset + len).min(self.num_rows());
        self.retain_rows(|idx| idx >= offset && idx < end)
    }

    /// Concatenate tables over the union of their columns.
    ///
    /// Columns absent from one input are null-filled for its rows, so tables
    /// with drifting dynamic columns (per-game statistics) still combine.
    /// Same-named columns must agree on type.
    pub fn concat(tables: &[&Table]) -> Result<Table> {
        let mut order: Vec<&str> = Vec::new();
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for table in tables {
            for column in &table.columns {
                if seen.insert(&column.name) {
                    order.push(&column.name);
                }
            }
        }

        let mut result: Vec<Column> = Vec::with_capacity(order.len());
        for name in order {
            // The first table that has this column decides the type.
            let template = tables
                .iter()
                .find_map(|t| t.column(name))
                .expect("column name collected from inputs");
            let mut data = template.data.empty_like();

            for table in tables {
                match table.column(name) {
                    Some(column) => {
                        for idx in 0..table.num_rows() {
                            data.push_from(&column.data, idx)?;
                        }
                    }
                    None => {
                        for _ in 0..table.num_rows() {
                            data.push_null();
                        }
                    }
                }
            }
            result.push(Column {
                name: name.to_string(),
                data,
            });
        }
        Table::from_columns(result)
    }

    /// Composite key of a row over `subset` columns (all columns when empty).
    pub fn row_key(&self, idx: usize, subset: &[&str]) -> String {
        let mut parts = Vec::new();
        if subset.is_empty() {
            for column in &self.columns {
                parts.push(column.data.render(idx));
            }
        } else {
            for name in subset {
                if let Some(column) = self.column(name) {
                    parts.push(column.data.render(idx));
                }
            }
        }
        parts.join("\u{1f}")
    }

    /// Number of rows whose key over `subset` repeats an earlier row.
    pub fn duplicate_count(&self, subset: &[&str]) -> usize {
        let mut seen = HashSet::new();
        let mut duplicates = 0;
        for idx in 0..self.num_rows() {
            if !seen.insert(self.row_key(idx, subset)) {
                duplicates += 1;
            }
        }
        duplicates
    }

    /// New table with duplicate rows (by `subset` key) removed, keeping the
    /// first occurrence.
    pub fn drop_duplicates(&self, subset: &[&str]) -> Table {
        let mut seen = HashSet::new();
        let mut keep = vec![false; self.num_rows()];
        for (idx, slot) in keep.iter_mut().enumerate() {
            *slot = seen.insert(self.row_key(idx, subset));
        }
        self.retain_rows(|idx| keep[idx])
    }

    /// Median of a numeric column's non-null values.
    pub fn median(&self, name: &str) -> Option<f64> {
        let column = self.column(name)?;
        let mut values: Vec<f64> = (0..self.num_rows())
            .filter_map(|idx| column.data.numeric(idx))
            .collect();
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.partial_cmp(b).expect("no NaN in table columns"));
        let mid = values.len() / 2;
        if values.len() % 2 == 0 {
            Some((values[mid - 1] + values[mid]) / 2.0)
        } else {
            Some(values[mid])
        }
    }

    /// Clamp a numeric column's values into `[min, max]`.
    pub fn clip_column(&mut self, name: &str, min: f64, max: f64) {
        if let Some(column) = self.column_mut(name) {
            match &mut column.data {
                ColumnData::Int64(v) => {
                    for value in v.iter_mut().flatten() {
                        *value = (*value).clamp(min as i64, max as i64);
                    }
                }
                ColumnData::Float64(v) => {
                    for value in v.iter_mut().flatten() {
                        *value = value.clamp(min, max);
                    }
                }
                ColumnData::Utf8(_) => {}
            }
        }
    }

    /// Replace nulls in a string column.
    pub fn fill_null_utf8(&mut self, name: &str, fill: &str) {
        if let Some(ColumnData::Utf8(v)) = self.column_mut(name).map(|c| &mut c.data) {
            for value in v.iter_mut() {
                if value.is_none() {
                    *value = Some(fill.to_string());
                }
            }
        }
    }

    /// Replace empty strings in a string column.
    pub fn fill_empty_utf8(&mut self, name: &str, fill: &str) {
        if let Some(ColumnData::Utf8(v)) = self.column_mut(name).map(|c| &mut c.data) {
            for value in v.iter_mut() {
                if value.as_deref() == Some("") {
                    *value = Some(fill.to_string());
                }
            }
        }
    }

    /// Replace nulls in a numeric column with a fixed value.
    pub fn fill_null_numeric(&mut self, name: &str, fill: f64) {
        if let Some(column) = self.column_mut(name) {
            match &mut column.data {
                ColumnData::Int64(v) => {
                    for value in v.iter_mut() {
                        if value.is_none() {
                            *value = Some(fill as i64);
                        }
                    }
                }
                ColumnData::Float64(v) => {
                    for value in v.iter_mut() {
                        if value.is_none() {
                            *value = Some(fill);
                        }
                    }
                }
                ColumnData::Utf8(_) => {}
            }
        }
    }

    /// New table without rows that are null in `name`.
    pub fn drop_nulls(&self, name: &str) -> Table {
        let Some(column) = self.column(name) else {
            return self.clone();
        };
        let nulls: Vec<bool> = (0..self.num_rows())
            .map(|idx| match &column.data {
                ColumnData::Utf8(v) => v[idx].is_none(),
                ColumnData::Int64(v) => v[idx].is_none(),
                ColumnData::Float64(v) => v[idx].is_none(),
            })
            .collect();
        self.retain_rows(|idx| !nulls[idx])
    }

    /// Convert to an arrow record batch.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = Vec::with_capacity(self.columns.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.columns.len());

        for column in &self.columns {
            match &column.data {
                ColumnData::Utf8(v) => {
                    fields.push(Field::new(&column.name, DataType::Utf8, true));
                    arrays.push(Arc::new(StringArray::from(v.clone())));
                }
                ColumnData::Int64(v) => {
                    fields.push(Field::new(&column.name, DataType::Int64, true));
                    arrays.push(Arc::new(Int64Array::from(v.clone())));
                }
                ColumnData::Float64(v) => {
                    fields.push(Field::new(&column.name, DataType::Float64, true));
                    arrays.push(Arc::new(Float64Array::from(v.clone())));
                }
            }
        }

        let schema = Arc::new(Schema::new(fields));
        Ok(RecordBatch::try_new(schema, arrays)?)
    }

    /// Convert from an arrow record batch.
    pub fn from_record_batch(batch: &RecordBatch) -> Result<Table> {
        let mut columns = Vec::with_capacity(batch.num_columns());
        let schema = batch.schema();

        for (field, array) in schema.fields().iter().zip(batch.columns()) {
            let data = match field.data_type() {
                DataType::Utf8 => {
                    let array = array
                        .as_any()
                        .downcast_ref::<StringArray>()
                        .expect("utf8 field downcasts to StringArray");
                    ColumnData::Utf8(
                        (0..array.len())
                            .map(|i| (!array.is_null(i)).then(|| array.value(i).to_string()))
                            .collect(),
                    )
                }
                DataType::Int64 => {
                    let array = array
                        .as_any()
                        .downcast_ref::<Int64Array>()
                        .expect("int64 field downcasts to Int64Array");
                    ColumnData::Int64(
                        (0..array.len())
                            .map(|i| (!array.is_null(i)).then(|| array.value(i)))
                            .collect(),
                    )
                }
                DataType::Float64 => {
                    let array = array
                        .as_any()
                        .downcast_ref::<Float64Array>()
                        .expect("float64 field downcasts to Float64Array");
                    ColumnData::Float64(
                        (0..array.len())
                            .map(|i| (!array.is_null(i)).then(|| array.value(i)))
                            .collect(),
                    )
                }
                other => {
                    return Err(AppError::validation(format!(
                        "unsupported column type {other} in column {}",
                        field.name()
                    )));
                }
            };
            columns.push(Column {
                name: field.name().clone(),
                data,
            });
        }

        Table::from_columns(columns)
    }

    /// Per-column null counts keyed by column name.
    pub fn null_counts(&self) -> HashMap<String, usize> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.data.null_count()))
            .collect()
    }
}
