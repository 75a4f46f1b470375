//! Layout options.
//!
//! All lengths are in layout units (tenths of a millimetre at staff size 100,
//! so the default page is A4). Options deserialize from camelCase JSON and any
//! missing field takes its default.

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, Result};

/// How continuous content is cut into systems and pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakPolicy {
    /// One continuous system on a single page.
    None,
    /// Systems and pages are filled by width and height.
    #[default]
    Auto,
    /// Encoded system breaks, pages by height.
    Line,
    /// Like `Auto`, but encoded system breaks are used when the system is
    /// already reasonably full.
    Smart,
    /// Encoded system and page breaks only.
    Encoded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutOptions {
    /// Multiplier of the spacing curve (0.0..=1.0).
    pub spacing_linear: f64,
    /// Exponent of the spacing curve (0.0..=1.0); 1.0 is proportional spacing.
    pub spacing_non_linear: f64,
    /// Do not justify the last system when it would be stretched more than
    /// `1 / min_last_justification`. 0.0 always justifies.
    pub min_last_justification: f64,
    pub justify_vertically: bool,
    /// Cap on the vertical space distributed, as a fraction of the page height.
    pub justification_max_vertical: f64,
    /// Weight of inter-staff gaps in vertical justification.
    pub justification_staff: f64,
    /// Weight of inter-system gaps in vertical justification.
    pub justification_system: f64,
    pub breaks: BreakPolicy,
    /// Fill ratio above which an encoded system break is honoured in smart mode.
    pub breaks_smart_sb: f64,
    /// Merge a final single-measure system into the previous one.
    pub breaks_no_widow: bool,
    /// Minimum distance between the overflows of two adjacent staves.
    pub minimum_staff_spacing: i32,
    /// Distance between two systems on a page.
    pub system_spacing: i32,
    pub page_width: i32,
    pub page_height: i32,
    pub page_margin_left: i32,
    pub page_margin_right: i32,
    pub page_margin_top: i32,
    pub page_margin_bottom: i32,
    /// Header space reserved on the first page (title block).
    pub first_page_header_height: i32,
    /// Header space reserved on every other page.
    pub header_height: i32,
    pub footer_height: i32,
    /// Maximum number of systems per page, 0 for no limit.
    pub system_max_per_page: u32,
    /// Drawing unit: half the distance between two staff lines.
    pub unit: i32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            spacing_linear: 0.25,
            spacing_non_linear: 0.6,
            min_last_justification: 0.8,
            justify_vertically: false,
            justification_max_vertical: 0.3,
            justification_staff: 1.0,
            justification_system: 1.0,
            breaks: BreakPolicy::Auto,
            breaks_smart_sb: 0.66,
            breaks_no_widow: false,
            minimum_staff_spacing: 72,
            system_spacing: 108,
            page_width: 2100,
            page_height: 2970,
            page_margin_left: 50,
            page_margin_right: 50,
            page_margin_top: 50,
            page_margin_bottom: 50,
            first_page_header_height: 0,
            header_height: 0,
            footer_height: 0,
            system_max_per_page: 0,
            unit: 9,
        }
    }
}

impl LayoutOptions {
    /// Parse options from JSON; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: LayoutOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        let unit_range = |name: &str, value: f64| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(LayoutError::InvalidOptions(format!(
                    "{name} must be within 0.0..=1.0, got {value}"
                )))
            }
        };
        unit_range("spacingLinear", self.spacing_linear)?;
        unit_range("spacingNonLinear", self.spacing_non_linear)?;
        unit_range("minLastJustification", self.min_last_justification)?;
        unit_range("justificationMaxVertical", self.justification_max_vertical)?;
        unit_range("breaksSmartSb", self.breaks_smart_sb)?;
        if self.justification_staff < 0.0 || self.justification_system < 0.0 {
            return Err(LayoutError::InvalidOptions(
                "justification weights must not be negative".into(),
            ));
        }
        if self.unit <= 0 {
            return Err(LayoutError::InvalidOptions(format!(
                "unit must be positive, got {}",
                self.unit
            )));
        }
        if self.minimum_staff_spacing < 0 || self.system_spacing < 0 {
            return Err(LayoutError::InvalidOptions(
                "spacings must not be negative".into(),
            ));
        }
        if self.system_width() <= 0 {
            return Err(LayoutError::InvalidOptions(format!(
                "page width {} leaves no room between margins {} and {}",
                self.page_width, self.page_margin_left, self.page_margin_right
            )));
        }
        if self.available_height(true) <= 0 || self.available_height(false) <= 0 {
            return Err(LayoutError::InvalidOptions(format!(
                "page height {} leaves no room for systems",
                self.page_height
            )));
        }
        Ok(())
    }

    /// Width available to a system between the page margins.
    pub fn system_width(&self) -> i32 {
        self.page_width - self.page_margin_left - self.page_margin_right
    }

    /// Height available to systems on a page.
    pub fn available_height(&self, first_page: bool) -> i32 {
        let header = if first_page {
            self.first_page_header_height
        } else {
            self.header_height
        };
        self.page_height - self.page_margin_top - self.page_margin_bottom - header - self.footer_height
    }

    /// Top of the first system on a page.
    pub fn content_top(&self, first_page: bool) -> i32 {
        let header = if first_page {
            self.first_page_header_height
        } else {
            self.header_height
        };
        self.page_margin_top + header
    }
}
