//! # Inline Style
//!
//! The engine reads and writes a small part of CSS through `style=""`
//! attributes: box edges, explicit heights, break avoidance and `display`.
//! This is not a cascade. Geometry always comes from the layout probe;
//! these helpers only let the engine reserve header/footer space by
//! rewriting a page body's padding, and let the reference layout read the
//! same declarations back.

use serde::{Deserialize, Serialize};

/// Edge values (top, right, bottom, left) used for margin and padding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Edges {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Edges {
    pub fn uniform(v: f64) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub fn symmetric(vertical: f64, horizontal: f64) -> Self {
        Self {
            top: vertical,
            right: horizontal,
            bottom: vertical,
            left: horizontal,
        }
    }

    /// Expand a 1–4 value CSS shorthand.
    fn from_shorthand(values: &[f64]) -> Option<Self> {
        match *values {
            [all] => Some(Self::uniform(all)),
            [v, h] => Some(Self::symmetric(v, h)),
            [top, h, bottom] => Some(Self {
                top,
                right: h,
                bottom,
                left: h,
            }),
            [top, right, bottom, left] => Some(Self {
                top,
                right,
                bottom,
                left,
            }),
            _ => None,
        }
    }
}

/// Parse a CSS length into CSS pixels. Percentages, `auto` and font-relative
/// units are not resolvable here and yield `None`.
pub fn parse_length(value: &str) -> Option<f64> {
    let v = value.trim().to_ascii_lowercase();
    let (number, scale) = if let Some(n) = v.strip_suffix("px") {
        (n, 1.0)
    } else if let Some(n) = v.strip_suffix("pt") {
        (n, 96.0 / 72.0)
    } else if let Some(n) = v.strip_suffix("in") {
        (n, 96.0)
    } else if let Some(n) = v.strip_suffix("cm") {
        (n, 96.0 / 2.54)
    } else if let Some(n) = v.strip_suffix("mm") {
        (n, 96.0 / 25.4)
    } else {
        (v.as_str(), 1.0)
    };
    number.trim().parse::<f64>().ok().map(|n| n * scale)
}

/// Format a pixel value the way the engine writes it: at most two decimals,
/// no trailing zeros.
pub fn format_px(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    let mut s = format!("{rounded:.2}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    if s == "-0" {
        s = "0".to_string();
    }
    format!("{s}px")
}

/// Ordered `property: value` declarations from a `style` attribute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineStyle {
    declarations: Vec<(String, String)>,
}

impl InlineStyle {
    pub fn parse(style: &str) -> Self {
        let declarations = style
            .split(';')
            .filter_map(|decl| {
                let (prop, value) = decl.split_once(':')?;
                let prop = prop.trim().to_ascii_lowercase();
                let value = value.trim().to_string();
                (!prop.is_empty()).then_some((prop, value))
            })
            .collect();
        Self { declarations }
    }

    /// The last declaration for `prop` wins, as in CSS.
    pub fn get(&self, prop: &str) -> Option<&str> {
        self.declarations
            .iter()
            .rev()
            .find(|(p, _)| p == prop)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, prop: &str, value: &str) {
        self.declarations.retain(|(p, _)| p != prop);
        self.declarations.push((prop.to_string(), value.to_string()));
    }

    pub fn length(&self, prop: &str) -> Option<f64> {
        self.get(prop).and_then(parse_length)
    }

    fn edges(&self, base: &str) -> Edges {
        let mut edges = self
            .get(base)
            .and_then(|v| {
                let values: Option<Vec<f64>> = v.split_whitespace().map(parse_length).collect();
                Edges::from_shorthand(&values?)
            })
            .unwrap_or_default();
        if let Some(v) = self.length(&format!("{base}-top")) {
            edges.top = v;
        }
        if let Some(v) = self.length(&format!("{base}-right")) {
            edges.right = v;
        }
        if let Some(v) = self.length(&format!("{base}-bottom")) {
            edges.bottom = v;
        }
        if let Some(v) = self.length(&format!("{base}-left")) {
            edges.left = v;
        }
        edges
    }

    pub fn padding(&self) -> Edges {
        self.edges("padding")
    }

    pub fn margin(&self) -> Edges {
        self.edges("margin")
    }

    pub fn height(&self) -> Option<f64> {
        self.length("height")
    }

    pub fn avoids_break_inside(&self) -> bool {
        ["break-inside", "page-break-inside"]
            .iter()
            .any(|p| self.get(p).is_some_and(|v| v.eq_ignore_ascii_case("avoid")))
    }

    pub fn is_hidden(&self) -> bool {
        self.get("display").is_some_and(|v| v.eq_ignore_ascii_case("none"))
    }
}

impl std::fmt::Display for InlineStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (prop, value)) in self.declarations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{prop}: {value}")?;
        }
        Ok(())
    }
}
