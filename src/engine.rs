//! The layout pipeline.
//!
//! [`LayoutEngine::layout`] runs every pass in order. The individual passes
//! are public for callers that need to stop halfway, e.g. to inspect the
//! natural widths before cast-off.

use crate::error::{LayoutReport, Result};
use crate::layout::horizontal::layout_horizontal;
use crate::layout::justify::{justify_page, justify_system};
use crate::layout::vertical::layout_vertical;
use crate::layout::LayoutContext;
use crate::metrics::{DefaultMetrics, GlyphMetrics};
use crate::model::Document;
use crate::options::{BreakPolicy, LayoutOptions};
use crate::paginate::{self, SystemBreaks};

pub struct LayoutEngine<M: GlyphMetrics = DefaultMetrics> {
    metrics: M,
    options: LayoutOptions,
}

impl LayoutEngine<DefaultMetrics> {
    /// An engine measuring glyphs with the built-in table.
    pub fn with_default_metrics(options: LayoutOptions) -> Result<Self> {
        let metrics = DefaultMetrics { unit: options.unit };
        Self::new(metrics, options)
    }
}

impl<M: GlyphMetrics> LayoutEngine<M> {
    pub fn new(metrics: M, options: LayoutOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { metrics, options })
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    fn context<'a>(&'a self, report: &'a mut LayoutReport) -> LayoutContext<'a> {
        LayoutContext {
            metrics: &self.metrics,
            options: &self.options,
            report,
        }
    }

    /// Lay out `doc` completely. Score-based documents are converted to
    /// page-based form first; page-based ones are cast off again from
    /// scratch.
    pub fn layout(&self, doc: &mut Document) -> Result<LayoutReport> {
        let mut report = LayoutReport::default();
        self.prepare(doc)?;
        self.layout_horizontally(doc, &mut report)?;

        let policy = self.options.breaks;
        if policy != BreakPolicy::None {
            self.cast_off_systems(doc, &mut report)?;
            self.layout_horizontally(doc, &mut report)?;
            self.justify_systems(doc, &mut report)?;
        }
        self.layout_vertically(doc, &mut report)?;
        if policy != BreakPolicy::None {
            self.cast_off_pages(doc, &mut report)?;
        }
        self.position_systems(doc, &mut report)?;
        if self.options.justify_vertically {
            self.justify_pages(doc, &mut report)?;
        }

        report.pages = doc.pages()?.len();
        report.systems = doc.systems()?.len();
        log::debug!(
            "layout done: {} pages, {} systems, {} warnings",
            report.pages,
            report.systems,
            report.warnings.len()
        );
        Ok(report)
    }

    /// Bring `doc` to a single continuous system on a single page.
    pub fn prepare(&self, doc: &mut Document) -> Result<()> {
        paginate::convert_to_page_based(doc)?;
        if doc.pages()?.len() != 1 || doc.systems()?.len() != 1 {
            paginate::uncast_off(doc)?;
        }
        Ok(())
    }

    /// Align, space and integrate every measure and position the measures
    /// of each system side by side.
    pub fn layout_horizontally(&self, doc: &mut Document, report: &mut LayoutReport) -> Result<()> {
        layout_horizontal(doc, &mut self.context(report))
    }

    pub fn cast_off_systems(&self, doc: &mut Document, report: &mut LayoutReport) -> Result<()> {
        let breaks = match self.options.breaks {
            BreakPolicy::Line | BreakPolicy::Encoded => SystemBreaks::Encoded,
            BreakPolicy::Smart => SystemBreaks::Width { smart: true },
            BreakPolicy::Auto | BreakPolicy::None => SystemBreaks::Width { smart: false },
        };
        let no_widow = self.options.breaks_no_widow;
        paginate::cast_off_systems(doc, breaks, no_widow, &mut self.context(report))
    }

    /// Stretch every system to the system width. Returns the ratios applied.
    pub fn justify_systems(&self, doc: &mut Document, report: &mut LayoutReport) -> Result<Vec<f64>> {
        let systems = doc.systems()?;
        let mut ctx = self.context(report);
        let mut ratios = Vec::with_capacity(systems.len());
        for (i, &system) in systems.iter().enumerate() {
            let last = i + 1 == systems.len();
            ratios.push(justify_system(doc, system, last, &mut ctx)?);
        }
        Ok(ratios)
    }

    pub fn layout_vertically(&self, doc: &mut Document, report: &mut LayoutReport) -> Result<()> {
        layout_vertical(doc, &mut self.context(report))
    }

    pub fn cast_off_pages(&self, doc: &mut Document, report: &mut LayoutReport) -> Result<()> {
        let encoded = self.options.breaks == BreakPolicy::Encoded;
        paginate::cast_off_pages(doc, encoded, &self.context(report))
    }

    pub fn position_systems(&self, doc: &mut Document, report: &mut LayoutReport) -> Result<()> {
        paginate::position_systems(doc, &self.context(report))
    }

    /// Spread spare page height over system and staff gaps. Systems must be
    /// positioned.
    pub fn justify_pages(&self, doc: &mut Document, report: &mut LayoutReport) -> Result<()> {
        let pages = doc.pages()?;
        let ctx = self.context(report);
        for (i, &page) in pages.iter().enumerate() {
            justify_page(doc, page, i == 0, i + 1 == pages.len(), &ctx)?;
        }
        Ok(())
    }
}
