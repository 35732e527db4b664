//! Loose structure recovered from the coordinator's prose
//!
//! `## ` starts a section, `### ` a subheading, `**Label:** text` a finding
//! card; anything else is a paragraph. Text before the first section goes
//! into an untitled leading section so an error message still shows.

use super::esc;

/// One classified non-blank line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsightLine {
    Subheading(String),
    Finding { label: String, text: String },
    Paragraph(String),
}

impl InsightLine {
    fn classify(line: &str) -> Self {
        if let Some(rest) = line.strip_prefix("### ") {
            return InsightLine::Subheading(rest.trim().to_string());
        }
        if line.starts_with("**") {
            if let Some((label, text)) = line.split_once(':') {
                return InsightLine::Finding {
                    label: label.replace("**", "").replace("###", "").trim().to_string(),
                    text: text.replace("**", "").trim().to_string(),
                };
            }
        }
        InsightLine::Paragraph(line.to_string())
    }
}

/// A `## ` section and its lines; `title` is empty for leading text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightSection {
    pub title: String,
    pub lines: Vec<InsightLine>,
}

/// Split prose into sections in document order
pub fn parse_insights(text: &str) -> Vec<InsightSection> {
    let mut sections = vec![InsightSection {
        title: String::new(),
        lines: Vec::new(),
    }];

    for raw in text.lines() {
        let line = raw.trim();
        if let Some(title) = raw.strip_prefix("## ") {
            sections.push(InsightSection {
                title: title.trim().to_string(),
                lines: Vec::new(),
            });
        } else if !line.is_empty() {
            if let Some(current) = sections.last_mut() {
                current.lines.push(InsightLine::classify(line));
            }
        }
    }

    sections.retain(|s| !s.title.is_empty() || !s.lines.is_empty());
    sections
}

/// Collapsible HTML blocks; sections without content are skipped
pub fn insights_html(sections: &[InsightSection]) -> String {
    let mut html = String::new();

    for (i, section) in sections.iter().enumerate() {
        if section.lines.is_empty() {
            continue;
        }
        let title = if section.title.is_empty() {
            "Overview"
        } else {
            section.title.as_str()
        };
        let open = if i <= 1 { " open" } else { "" };
        html.push_str(&format!(
            "<details class=\"insight\" id=\"insight-{}\"{}>\n<summary>{}</summary>\n<div class=\"content\">\n",
            i,
            open,
            esc(title)
        ));
        for line in &section.lines {
            match line {
                InsightLine::Subheading(text) => {
                    html.push_str(&format!("<h4>{}</h4>\n", esc(text)));
                }
                InsightLine::Finding { label, text } => {
                    html.push_str(&format!(
                        "<div class=\"finding-card\"><h4>{}</h4><p>{}</p></div>\n",
                        esc(label),
                        esc(text)
                    ));
                }
                InsightLine::Paragraph(text) => {
                    html.push_str(&format!("<p>{}</p>\n", esc(text)));
                }
            }
        }
        html.push_str("</div>\n</details>\n");
    }

    if html.is_empty() {
        html.push_str("<p class=\"muted\">No insights were produced.</p>\n");
    }
    html
}
