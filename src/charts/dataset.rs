//! In-memory CSV table with the column queries the local charts need

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use super::ChartError;

/// Date layouts tried in order when bucketing by day
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"];

/// A parsed CSV file, cells kept as trimmed strings
#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn from_path(path: &Path) -> Result<Self, ChartError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ChartError> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(|c| c.trim().to_string()).collect());
        }
        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn cells(&self, col: usize) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .map(move |row| row.get(col).map(String::as_str).unwrap_or(""))
    }

    /// Values of a numeric column, `NaN` for blank cells
    ///
    /// A column is numeric when every non-blank cell parses as a float and
    /// at least one cell is non-blank.
    pub fn numeric(&self, col: usize) -> Option<Vec<f64>> {
        let mut seen = false;
        let mut values = Vec::with_capacity(self.rows.len());
        for cell in self.cells(col) {
            if cell.is_empty() {
                values.push(f64::NAN);
                continue;
            }
            values.push(cell.parse::<f64>().ok()?);
            seen = true;
        }
        seen.then_some(values)
    }

    /// Numeric column by name
    pub fn numeric_named(&self, name: &str) -> Option<Vec<f64>> {
        self.column_index(name).and_then(|i| self.numeric(i))
    }

    /// Indices of numeric columns in header order
    pub fn numeric_columns(&self) -> Vec<usize> {
        (0..self.headers.len())
            .filter(|&i| self.numeric(i).is_some())
            .collect()
    }

    /// Indices of text columns in header order
    pub fn categorical_columns(&self) -> Vec<usize> {
        (0..self.headers.len())
            .filter(|&i| self.numeric(i).is_none() && self.cells(i).any(|c| !c.is_empty()))
            .collect()
    }

    /// Sum of `value_col` per distinct `group_col`, in first-seen order
    ///
    /// Rows with a blank group or non-finite value are skipped.
    pub fn sum_by(&self, group_col: usize, values: &[f64]) -> Vec<(String, f64)> {
        let mut order: Vec<String> = Vec::new();
        let mut sums: HashMap<String, f64> = HashMap::new();
        for (key, value) in self.cells(group_col).zip(values) {
            if key.is_empty() || !value.is_finite() {
                continue;
            }
            if !sums.contains_key(key) {
                order.push(key.to_string());
            }
            *sums.entry(key.to_string()).or_insert(0.0) += value;
        }
        order
            .into_iter()
            .map(|k| {
                let total = sums.get(&k).copied().unwrap_or_default();
                (k, total)
            })
            .collect()
    }

    /// Occurrence counts, most frequent first (ties keep first-seen order)
    pub fn value_counts(&self, col: usize) -> Vec<(String, usize)> {
        let mut order: Vec<String> = Vec::new();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for cell in self.cells(col).filter(|c| !c.is_empty()) {
            if !counts.contains_key(cell) {
                order.push(cell.to_string());
            }
            *counts.entry(cell.to_string()).or_insert(0) += 1;
        }
        let mut ranked: Vec<(String, usize)> = order
            .into_iter()
            .map(|k| {
                let n = counts.get(&k).copied().unwrap_or_default();
                (k, n)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }

    /// Per-day sums of `values`, ascending by date; unparseable dates dropped
    pub fn daily_sums(&self, date_col: usize, values: &[f64]) -> Vec<(NaiveDate, f64)> {
        let mut days: HashMap<NaiveDate, f64> = HashMap::new();
        for (cell, value) in self.cells(date_col).zip(values) {
            let Some(day) = parse_date(cell) else {
                continue;
            };
            if value.is_finite() {
                *days.entry(day).or_insert(0.0) += value;
            }
        }
        let mut series: Vec<(NaiveDate, f64)> = days.into_iter().collect();
        series.sort_by_key(|(day, _)| *day);
        series
    }
}

/// Calendar day of a date or timestamp cell
pub fn parse_date(cell: &str) -> Option<NaiveDate> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(cell) {
        return Some(ts.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(cell, fmt) {
            return Some(ts.date());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(cell, fmt).ok())
}

/// Pearson correlation over pairs where both values are finite
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}
