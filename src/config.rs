//! # Pagination Configuration
//!
//! Every safety valve and every class name the engine recognizes lives here
//! rather than in the algorithm. All fields have defaults, so an empty JSON
//! object is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::FolioError;

/// Complete configuration for one pagination run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaginationConfig {
    pub limits: Limits,
    /// Slack in pixels before content counts as overflowing.
    pub tolerance: f64,
    /// Clearance kept above the footer, added to the bottom inset.
    pub footer_buffer: f64,
    pub markers: Markers,
    /// Headings that never get pulled onto the next page with the block
    /// that follows them. Matched against the trimmed heading text.
    pub orphan_exempt_headings: Vec<String>,
    /// Appended to the TOC title on continuation pages.
    pub continued_suffix: String,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            tolerance: 2.0,
            footer_buffer: 12.0,
            markers: Markers::default(),
            orphan_exempt_headings: vec!["Proposed Pricing".to_string()],
            continued_suffix: " (CONTINUED)".to_string(),
        }
    }
}

impl PaginationConfig {
    /// Load a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, FolioError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn is_orphan_exempt(&self, heading_text: &str) -> bool {
        let text = heading_text.trim();
        self.orphan_exempt_headings.iter().any(|h| h.trim() == text)
    }
}

/// Bounds that guarantee termination on pathological content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Limits {
    /// Outer pagination passes.
    pub max_passes: usize,
    /// Queue steps inside one pass.
    pub max_steps_per_pass: usize,
    /// Times a single page may be revisited within one pass.
    pub max_page_retries: u32,
    /// Wall-clock budget for the whole pass loop.
    pub time_budget_ms: u64,
    /// Moves the final remediation sweep may make.
    pub max_forced_moves: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_passes: 7,
            max_steps_per_pass: 2000,
            max_page_retries: 50,
            time_budget_ms: 5000,
            max_forced_moves: 12,
        }
    }
}

impl Limits {
    pub fn time_budget(&self) -> Duration {
        Duration::from_millis(self.time_budget_ms)
    }
}

/// Class names that give the markup its page structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Markers {
    pub page: String,
    pub cover: String,
    pub toc: String,
    /// `<header>` elements are recognized as well.
    pub header: String,
    /// `<footer>` elements are recognized as well.
    pub footer: String,
    pub body: String,
    pub page_number: String,
    pub page_total: String,
    pub force_break: Vec<String>,
    pub keep_together: Vec<String>,
    pub no_number: String,
    pub toc_list: String,
    pub toc_title: String,
    pub heading_number: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            page: "page".to_string(),
            cover: "cover".to_string(),
            toc: "toc".to_string(),
            header: "page-header".to_string(),
            footer: "page-footer".to_string(),
            body: "page-body".to_string(),
            page_number: "page-number".to_string(),
            page_total: "page-total".to_string(),
            force_break: vec!["page-break".to_string(), "force-page-break".to_string()],
            keep_together: vec![
                "component-layout".to_string(),
                "architecture-section".to_string(),
                "support-table-core".to_string(),
            ],
            no_number: "no-number".to_string(),
            toc_list: "toc-list".to_string(),
            toc_title: "toc-title".to_string(),
            heading_number: "heading-number".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config = PaginationConfig::from_json("{}").unwrap();
        assert_eq!(config.limits.max_passes, 7);
        assert_eq!(config.limits.max_steps_per_pass, 2000);
        assert_eq!(config.limits.max_page_retries, 50);
        assert_eq!(config.limits.time_budget(), Duration::from_secs(5));
        assert_eq!(config.limits.max_forced_moves, 12);
        assert_eq!(config.markers.page, "page");
    }

    #[test]
    fn partial_overrides() {
        let config = PaginationConfig::from_json(
            r#"{ "limits": { "maxPasses": 3 }, "orphanExemptHeadings": [], "markers": { "body": "sheet-body" } }"#,
        )
        .unwrap();
        assert_eq!(config.limits.max_passes, 3);
        assert_eq!(config.limits.max_forced_moves, 12);
        assert_eq!(config.markers.body, "sheet-body");
        assert_eq!(config.markers.footer, "page-footer");
        assert!(!config.is_orphan_exempt("Proposed Pricing"));
    }

    #[test]
    fn orphan_exemption_matches_trimmed_text() {
        let config = PaginationConfig::default();
        assert!(config.is_orphan_exempt("  Proposed Pricing \n"));
        assert!(!config.is_orphan_exempt("Proposed Pricing Details"));
    }

    #[test]
    fn wrong_type_is_a_config_error() {
        let err = PaginationConfig::from_json(r#"{ "tolerance": "lots" }"#).unwrap_err();
        assert!(matches!(err, FolioError::Config { .. }));
    }
}
