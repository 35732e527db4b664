//! Standalone chart dashboard (`visualizations.html`)

use std::path::{Path, PathBuf};

use super::{esc, relative_to};

const DASHBOARD_CSS: &str = r#"
* { margin: 0; padding: 0; box-sizing: border-box; }
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
       background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); min-height: 100vh; padding: 40px 20px; }
.container { max-width: 1400px; margin: 0 auto; }
h1 { text-align: center; color: white; margin-bottom: 40px; font-size: 2.5em; }
.grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(600px, 1fr)); gap: 30px; }
.chart-card { background: white; border-radius: 15px; padding: 20px; box-shadow: 0 10px 30px rgba(0,0,0,0.2); }
.chart-card h2 { color: #333; margin-bottom: 15px; font-size: 1.3em; }
.chart-card img { width: 100%; height: auto; border-radius: 8px; }
"#;

/// Grid of numbered chart cards; `dashboard_dir` is where the page is written
pub fn visualization_dashboard(charts: &[PathBuf], dashboard_dir: &Path) -> String {
    let mut cards = String::new();
    for (i, chart) in charts.iter().enumerate() {
        cards.push_str(&format!(
            "<div class=\"chart-card\">\n<h2>Chart {n}</h2>\n<img src=\"{}\" alt=\"Chart {n}\">\n</div>\n",
            esc(&relative_to(chart, dashboard_dir)),
            n = i + 1
        ));
    }

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
         <title>Data Visualization Dashboard</title>\n<style>{}</style>\n</head>\n<body>\n\
         <div class=\"container\">\n<h1>Data Visualization Dashboard</h1>\n\
         <div class=\"grid\">\n{}</div>\n</div>\n</body>\n</html>\n",
        DASHBOARD_CSS, cards
    )
}
