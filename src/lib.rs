//! scorelayout: alignment, spacing, justification and pagination engine for
//! engraved music scores.
//!
//! A [`Document`] is an arena tree of score content. Layout positions every
//! element horizontally by musical time and vertically by staff, breaks the
//! content into systems and pages and justifies them. Rendering is left to
//! the caller; glyph sizes come from a [`GlyphMetrics`] provider.
//!
//! # Example
//! ```no_run
//! use scorelayout::{layout_document, document_from_json, LayoutOptions};
//!
//! let json = std::fs::read_to_string("score.json").unwrap();
//! let mut doc = document_from_json(&json).unwrap();
//! let report = layout_document(&mut doc, &LayoutOptions::default()).unwrap();
//! println!("Pages: {}", report.pages);
//! println!("Systems: {}", report.systems);
//! for warning in &report.warnings {
//!     println!("{warning}");
//! }
//! ```

pub mod builder;
pub mod engine;
pub mod error;
pub mod layout;
pub mod layout_map;
pub mod metrics;
pub mod model;
pub mod options;
pub mod paginate;

pub use builder::ScoreBuilder;
pub use engine::LayoutEngine;
pub use error::{LayoutError, LayoutReport, LayoutWarning, Result};
pub use layout_map::{compute_layout_map, layout_map_to_json, LayoutMap};
pub use metrics::{DefaultMetrics, Glyph, GlyphMetrics};
pub use model::*;
pub use options::{BreakPolicy, LayoutOptions};

/// Lay out a document with the built-in glyph metrics.
/// Convenience function for [`LayoutEngine::layout`].
pub fn layout_document(doc: &mut Document, options: &LayoutOptions) -> Result<LayoutReport> {
    LayoutEngine::with_default_metrics(options.clone())?.layout(doc)
}

/// Lay out a document measuring glyphs with `metrics`.
pub fn layout_document_with<M: GlyphMetrics>(
    doc: &mut Document,
    metrics: M,
    options: &LayoutOptions,
) -> Result<LayoutReport> {
    LayoutEngine::new(metrics, options.clone())?.layout(doc)
}

/// Convert a document to a JSON string. Tracks are not serialized; they are
/// rebuilt by the next layout.
pub fn document_to_json(doc: &Document) -> Result<String> {
    Ok(serde_json::to_string_pretty(doc)?)
}

/// Parse a document from JSON produced by [`document_to_json`].
pub fn document_from_json(json: &str) -> Result<Document> {
    Ok(serde_json::from_str(json)?)
}
