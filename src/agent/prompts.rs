//! Task prompts for the analysis agents and the coordinator

use serde_json::Value;

use super::report::AgentKind;

/// First-attempt task prompt for an agent, given the dataset's sandbox path
pub fn task_prompt(kind: AgentKind, dataset_path: &str) -> String {
    match kind {
        AgentKind::Statistical => statistical_prompt(dataset_path),
        AgentKind::Anomaly => anomaly_prompt(dataset_path),
        AgentKind::Visualization => visualization_prompt(dataset_path),
    }
}

fn statistical_prompt(dataset_path: &str) -> String {
    format!(
        r#"You are a statistical analyst. A dataset has been uploaded to {dataset_path}.

Your task: Perform comprehensive statistical analysis including:
1. Summary statistics (mean, median, std dev, min, max, quartiles) for ALL numeric columns
2. Correlation analysis - find correlations with |r| > 0.3 and report them
3. Distribution analysis - test for normality using Shapiro-Wilk test (sample max 5000 rows)
4. Identify the 3 strongest relationships in the data

Write Python code that:
- Loads the CSV with pandas
- Computes all statistics
- Creates a results dictionary with the keys "summary_statistics", "correlations",
  "distribution_tests" and "strongest_relationships"
- Prints the results as JSON

IMPORTANT: Print the results as a single valid JSON object at the end."#
    )
}

fn anomaly_prompt(dataset_path: &str) -> String {
    format!(
        r#"You are an anomaly detection specialist. A dataset has been uploaded to {dataset_path}.

Your task: Detect ALL data quality issues and anomalies:

1. **Statistical Outliers**: Use Z-score method (|z| > 3) for ALL numeric columns
2. **Impossible Values**:
   - Negative values where they shouldn't exist (quantities, prices, totals, etc)
   - Values outside valid ranges (e.g., rates > 1)
3. **Missing Values**: Count missing values per column
4. **Duplicate Rows**: Find exact duplicate rows
5. **Suspicious Patterns**: Detect repeated exact values that seem unnatural

Write Python code that:
- Loads the CSV with pandas
- Checks all the above issues
- Creates a results dictionary with:
  {{
    "outliers": [list of dicts with row, column, value, reason, z_score],
    "data_quality": {{
      "missing_values": {{column: count}},
      "duplicate_rows": count,
      "suspicious_patterns": [descriptions]
    }},
    "total_issues": count,
    "severity": "low/medium/high"
  }}
- Prints the results as JSON

IMPORTANT: Print the complete results as a single valid JSON object."#
    )
}

fn visualization_prompt(dataset_path: &str) -> String {
    format!(
        r#"You are a data visualization expert. A dataset has been uploaded to {dataset_path}.

Your task: Create 4 insightful visualizations of this dataset, for example:
1. Correlation heatmap of the numeric columns
2. Distribution of a key numeric variable
3. Relationship between two numeric variables
4. Trend over time or breakdown by category

Write Python code with pandas, matplotlib and seaborn that creates all 4 charts.
MUST call plt.show() after each plot."#
    )
}

/// Stricter retry prompt used once when the first program does not plot
pub fn visualization_retry_prompt(dataset_path: &str) -> String {
    format!(
        r#"You are a data visualization expert. A dataset has been uploaded to {dataset_path}.

STEP 1: First, load the data and examine its structure to understand what columns are available.

STEP 2: Based on the available columns, create 4 insightful visualizations. Choose appropriate visualizations such as:
- Correlation heatmap for numeric columns
- Distribution plots for key numeric variables
- Scatter plots showing relationships between variables
- Time series plots if date columns exist
- Category analysis if categorical columns exist

CRITICAL REQUIREMENTS:
1. You MUST create exactly 4 separate visualizations
2. Each visualization MUST be followed by plt.show() to display it
3. Use plt.figure() before each new plot
4. Choose visualizations that match the actual columns in the dataset

Example structure:
```python
import pandas as pd
import matplotlib.pyplot as plt
import seaborn as sns

df = pd.read_csv('{dataset_path}')

# Chart 1
plt.figure(figsize=(10, 6))
# ... create plot based on actual columns ...
plt.show()  # REQUIRED

# Chart 2
plt.figure(figsize=(10, 6))
# ... create plot based on actual columns ...
plt.show()  # REQUIRED

# Continue for charts 3 and 4...
```

Write the complete Python code now."#
    )
}

/// Follow-up asking for a prose reading of the program output
pub const INTERPRETATION_REQUEST: &str =
    "Interpret these results for a business audience: what stands out, what is reliable, and what needs follow-up. Answer in prose; do not run more code.";

/// Summarization prompt for the coordinator
///
/// Statistics and anomalies are embedded as pretty-printed JSON; the
/// visualization result is reduced to its chart count.
pub fn synthesis_prompt(stats: &Value, chart_count: usize, anomalies: &Value) -> String {
    let stats_json = serde_json::to_string_pretty(stats).unwrap_or_else(|_| stats.to_string());
    let anomalies_json =
        serde_json::to_string_pretty(anomalies).unwrap_or_else(|_| anomalies.to_string());

    format!(
        r#"You are a business strategy consultant. You've received analysis from 3 specialist teams:

**STATISTICAL ANALYSIS TEAM:**
{stats_json}

**VISUALIZATION TEAM:**
Generated {chart_count} charts showing data patterns and relationships.

**ANOMALY DETECTION TEAM:**
{anomalies_json}

Your task: Create a compelling executive report with:

## Executive Summary
3-4 sentence overview of the most critical findings

## Key Findings
Top 5 insights that matter most for business decisions. For each:
- What the data shows
- Why it matters
- Supporting evidence from the analysis

## Recommendations
3-5 actionable recommendations with:
- Specific action to take
- Expected impact
- Priority level (High/Medium/Low)

## Risk Assessment
2-3 key risks identified from the data quality and anomaly analysis

## Data Quality Notes
Brief summary of data issues found and their potential impact

Use clear, business-friendly language. Be specific with numbers where available. Focus on actionable insights."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prompts_embed_dataset_path() {
        for kind in [AgentKind::Statistical, AgentKind::Anomaly, AgentKind::Visualization] {
            assert!(task_prompt(kind, "/home/user/data.csv").contains("/home/user/data.csv"));
        }
        let retry = visualization_retry_prompt("/home/user/data.csv");
        assert!(retry.contains("pd.read_csv('/home/user/data.csv')"));
        assert!(retry.matches("plt.show()").count() >= 2);
    }

    #[test]
    fn test_anomaly_prompt_keeps_literal_braces() {
        let prompt = task_prompt(AgentKind::Anomaly, "/d.csv");
        assert!(prompt.contains("\"data_quality\": {"));
        assert!(prompt.contains("{column: count}"));
    }

    #[test]
    fn test_synthesis_prompt_reduces_visualization_to_count() {
        let prompt = synthesis_prompt(&json!({"n": 1}), 4, &json!({"total_issues": 2}));
        assert!(prompt.contains("Generated 4 charts"));
        assert!(prompt.contains("\"total_issues\": 2"));
        assert!(prompt.contains("## Risk Assessment"));
    }
}
