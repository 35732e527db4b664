//! Plot validation for generated visualization programs
//!
//! The sandbox only captures a figure when the program renders it, so a
//! program with no plotting calls, or fewer `plt.show()` calls than charts
//! requested, yields nothing useful. The check is a textual heuristic.
//! Captured figures are checked too: a payload counts as a chart only if it
//! decodes to PNG bytes.

use base64::Engine;

/// Calls that indicate the program draws something
pub const PLOT_KEYWORDS: &[&str] = &[
    "plt.plot",
    "plt.bar",
    "plt.scatter",
    "plt.hist",
    "sns.heatmap",
    "sns.histplot",
    "sns.scatterplot",
    "sns.lineplot",
    "sns.barplot",
    "sns.boxplot",
];

/// Marker that makes the interpreter emit a figure
pub const SHOW_MARKER: &str = "plt.show()";

/// Charts requested from the generator, one show call each
pub const MIN_SHOW_CALLS: usize = 4;

/// Outcome of inspecting one generated program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlotCheck {
    pub has_plotting: bool,
    pub show_calls: usize,
}

impl PlotCheck {
    pub fn inspect(code: &str) -> Self {
        Self {
            has_plotting: PLOT_KEYWORDS.iter().any(|k| code.contains(k)),
            show_calls: code.matches(SHOW_MARKER).count(),
        }
    }

    pub fn passed(&self) -> bool {
        self.has_plotting && self.show_calls >= MIN_SHOW_CALLS
    }
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Whether a base64 figure payload decodes to a PNG image
pub fn is_png_payload(payload: &str) -> bool {
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map(|bytes| bytes.starts_with(&PNG_SIGNATURE))
        .unwrap_or(false)
}
