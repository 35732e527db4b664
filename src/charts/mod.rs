//! Local chart rendering (the `local` pipeline variant)
//!
//! Produces four fixed charts from the dataset without the generator or a
//! sandbox. Each chart has a primary rule keyed on the sales columns and a
//! fallback keyed on column types, so any table with a numeric column gets
//! all four files. A chart that still fails is skipped on its own.
//!
//! | # | primary | fallback |
//! |---|---------|----------|
//! | 1 | bar: `total` summed by `categories`, descending | histogram of first numeric column |
//! | 2 | line: daily `total` over `order_date` | line of first numeric column, first 100 rows |
//! | 3 | scatter `quantity` vs `price` + correlation | scatter of first two numeric columns |
//! | 4 | top-10 `product_names` by `total` | top-10 value counts of first text column |

pub mod dataset;
pub mod render;

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

pub use dataset::{parse_date, pearson, Table};

use crate::agent::{AgentKind, AgentReport, ChartArtifact};
use crate::metrics::CHARTS_RENDERED;

/// Error type for local chart rendering
#[derive(Debug)]
pub enum ChartError {
    /// Neither the primary nor the fallback rule found usable data
    NoSuitableColumn(String),
    /// The drawing backend failed
    Render(String),
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for ChartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChartError::NoSuitableColumn(msg) => write!(f, "No suitable column: {}", msg),
            ChartError::Render(msg) => write!(f, "Render error: {}", msg),
            ChartError::Io(e) => write!(f, "IO error: {}", e),
            ChartError::Csv(e) => write!(f, "CSV error: {}", e),
        }
    }
}

impl std::error::Error for ChartError {}

impl From<std::io::Error> for ChartError {
    fn from(e: std::io::Error) -> Self {
        ChartError::Io(e)
    }
}

impl From<csv::Error> for ChartError {
    fn from(e: csv::Error) -> Self {
        ChartError::Csv(e)
    }
}

const HIST_BINS: usize = 30;
const TREND_ROWS: usize = 100;
const TOP_N: usize = 10;

type ChartPlan = fn(&Table, &Path) -> Result<(), ChartError>;

/// Fixed chart list, in output order
const PLANS: [(&str, ChartPlan); 4] = [
    ("Sales by Category", category_chart),
    ("Revenue Over Time", trend_chart),
    ("Quantity vs Price Relationship", relationship_chart),
    ("Top 10 Products by Revenue", top_products_chart),
];

/// Deterministic replacement for the remote visualization agent
#[derive(Debug, Clone)]
pub struct LocalVisualizer {
    output_dir: PathBuf,
}

impl LocalVisualizer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Render the charts as `chart_<n>.png` under the output directory
    ///
    /// Returns `{charts: [path], count}`; an unreadable dataset or output
    /// directory gives the error-shaped visualization result.
    pub fn run(&self, dataset: &Path) -> AgentReport {
        println!("[VIZ] Creating visualizations locally");

        if let Err(e) = std::fs::create_dir_all(&self.output_dir) {
            return AgentReport::failed(AgentKind::Visualization, ChartError::from(e).to_string());
        }
        let table = match Table::from_path(dataset) {
            Ok(table) => table,
            Err(e) => return AgentReport::failed(AgentKind::Visualization, e.to_string()),
        };
        println!(
            "[VIZ] ✓ Loaded CSV: {} rows, {} columns",
            table.len(),
            table.headers().len()
        );

        if table.is_empty() {
            warn!(dataset = %dataset.display(), "Dataset has no rows, nothing to chart");
            println!("[VIZ] ⚠ Dataset has no rows, no charts created");
            return AgentReport::charts(Vec::new());
        }

        let charts = self.render_plans(&table, &PLANS);

        CHARTS_RENDERED
            .with_label_values(&["local"])
            .inc_by(charts.len() as u64);
        info!(count = charts.len(), dir = %self.output_dir.display(), "Local charts rendered");
        AgentReport::charts(charts)
    }

    /// Run each plan in order; a failing or panicking plan skips only its chart
    fn render_plans(&self, table: &Table, plans: &[(&str, ChartPlan)]) -> Vec<ChartArtifact> {
        let mut charts = Vec::new();
        for (i, (title, plan)) in plans.iter().enumerate() {
            let n = i + 1;
            let path = self.output_dir.join(format!("chart_{}.png", n));
            println!("[VIZ] ℹ Creating chart {}: {}", n, title);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| plan(table, &path)))
                .unwrap_or_else(|payload| Err(ChartError::Render(panic_text(payload.as_ref()))));
            match outcome {
                Ok(()) => {
                    println!("[VIZ] ✓ Saved chart {}: {}", n, path.display());
                    charts.push(ChartArtifact::File(path));
                }
                Err(e) => {
                    warn!(chart = n, error = %e, "Skipping chart");
                    println!("[VIZ] ⚠ Error creating chart {}: {}", n, e);
                }
            }
        }
        charts
    }
}

fn panic_text(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "renderer panicked".to_string())
}

fn first_numeric(table: &Table) -> Result<(String, Vec<f64>), ChartError> {
    table
        .numeric_columns()
        .first()
        .and_then(|&i| Some((table.headers()[i].clone(), table.numeric(i)?)))
        .ok_or_else(|| ChartError::NoSuitableColumn("no numeric column".to_string()))
}

fn category_chart(table: &Table, path: &Path) -> Result<(), ChartError> {
    if let (Some(cat), Some(total)) = (table.column_index("categories"), table.numeric_named("total")) {
        let mut sums = table.sum_by(cat, &total);
        sums.sort_by(|a, b| b.1.total_cmp(&a.1));
        return render::bar_chart(path, "Total Revenue by Category", "Category", "Revenue ($)", &sums);
    }

    let (name, values) = first_numeric(table)?;
    render::histogram(
        path,
        "Distribution of First Numeric Column",
        &name,
        &values,
        HIST_BINS,
    )
}

fn trend_chart(table: &Table, path: &Path) -> Result<(), ChartError> {
    if let (Some(date), Some(total)) = (table.column_index("order_date"), table.numeric_named("total")) {
        let days = table.daily_sums(date, &total);
        let labels: Vec<String> = days.iter().map(|(d, _)| d.format("%Y-%m-%d").to_string()).collect();
        let values: Vec<f64> = days.iter().map(|(_, v)| *v).collect();
        return render::line_chart(path, "Daily Revenue Trend", "Date", "Revenue ($)", &labels, &values);
    }

    let (name, values) = first_numeric(table)?;
    let head: Vec<f64> = values.into_iter().take(TREND_ROWS).collect();
    render::line_chart(path, "Trend Line (First 100 rows)", "Index", &name, &[], &head)
}

fn relationship_chart(table: &Table, path: &Path) -> Result<(), ChartError> {
    if let (Some(qty), Some(price)) = (table.numeric_named("quantity"), table.numeric_named("price")) {
        let annotation = pearson(&qty, &price).map(|r| format!("Correlation: {:.3}", r));
        return render::scatter_chart(
            path,
            "Quantity vs Price Relationship",
            "Quantity",
            "Price ($)",
            &qty,
            &price,
            annotation.as_deref(),
        );
    }

    let numeric = table.numeric_columns();
    match numeric.as_slice() {
        [a, b, ..] => {
            let (xa, xb) = (&table.headers()[*a], &table.headers()[*b]);
            let xs = table.numeric(*a).unwrap_or_default();
            let ys = table.numeric(*b).unwrap_or_default();
            render::scatter_chart(path, &format!("{} vs {}", xa, xb), xa, xb, &xs, &ys, None)
        }
        // single numeric column: plot it against row position
        [a] => {
            let name = &table.headers()[*a];
            let ys = table.numeric(*a).unwrap_or_default();
            let xs: Vec<f64> = (0..ys.len()).map(|i| i as f64).collect();
            render::scatter_chart(path, &format!("Index vs {}", name), "Index", name, &xs, &ys, None)
        }
        [] => Err(ChartError::NoSuitableColumn("no numeric column".to_string())),
    }
}

fn top_products_chart(table: &Table, path: &Path) -> Result<(), ChartError> {
    if let (Some(product), Some(total)) = (table.column_index("product_names"), table.numeric_named("total")) {
        let mut sums = table.sum_by(product, &total);
        sums.sort_by(|a, b| a.1.total_cmp(&b.1));
        let top = sums.split_off(sums.len().saturating_sub(TOP_N));
        return render::horizontal_bar_chart(path, "Top 10 Products by Revenue", "Revenue ($)", &top);
    }

    // no text column: count the first column's values instead
    let col = table
        .categorical_columns()
        .first()
        .copied()
        .or_else(|| (!table.headers().is_empty()).then_some(0))
        .ok_or_else(|| ChartError::NoSuitableColumn("table has no columns".to_string()))?;
    let counts: Vec<(String, f64)> = table
        .value_counts(col)
        .into_iter()
        .take(TOP_N)
        .map(|(k, n)| (k, n as f64))
        .collect();
    let title = format!("Top 10 {} Values", table.headers()[col]);
    render::horizontal_bar_chart(path, &title, "Count", &counts)
}
