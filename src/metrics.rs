//! Glyph metrics provider.
//!
//! The engine never draws; it only asks for the size of the symbols it lays
//! out. Callers with a real music font implement [`GlyphMetrics`];
//! [`DefaultMetrics`] carries a table of typical engraving proportions
//! expressed in staff spaces.

use crate::model::{Accidental, BarRendition, ClefShape, Duration};

/// Symbols whose extent the layout needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glyph {
    Notehead(Duration),
    Rest(Duration),
    Accid(Accidental),
    Dot,
    Clef(ClefShape),
    /// One accidental of a key signature.
    KeyAccid(Accidental),
    MeterDigit,
    MeterSymbol,
    Mensur,
    BarLine(BarRendition),
    Dynamic,
    Hairpin,
    Slur,
    Octave,
    Pedal,
    Fermata,
}

pub trait GlyphMetrics {
    /// Advance width of `glyph` at `size` percent.
    fn width(&self, glyph: Glyph, size: u16) -> i32;

    /// Height of `glyph` at `size` percent.
    fn height(&self, glyph: Glyph, size: u16) -> i32;

    /// Width of a text run.
    fn text_width(&self, text: &str, size: u16) -> i32 {
        (text.chars().count() as f64 * self.text_height(size) as f64 * TEXT_CHAR_WIDTH_FACTOR)
            .round() as i32
    }

    /// Line height of text.
    fn text_height(&self, size: u16) -> i32;
}

/// Average character width as a fraction of the font size.
const TEXT_CHAR_WIDTH_FACTOR: f64 = 0.55;

// ── Proportions in staff spaces ─────────────────────────────────────
const NOTEHEAD_BLACK: f64 = 1.18;
const NOTEHEAD_WHOLE: f64 = 1.69;
const NOTEHEAD_BREVE: f64 = 2.5;
const ACCID_SHARP: f64 = 1.0;
const ACCID_FLAT: f64 = 0.9;
const ACCID_NATURAL: f64 = 0.67;
const ACCID_DOUBLE_FLAT: f64 = 1.6;
const DOT: f64 = 0.4;
const CLEF_G: f64 = 2.68;
const CLEF_F: f64 = 2.55;
const CLEF_C: f64 = 2.6;
const CLEF_PERC: f64 = 1.2;
const METER_DIGIT: f64 = 1.7;
const METER_SYMBOL: f64 = 1.6;
const TEXT_SIZE: f64 = 2.0;
const STAFF_HEIGHT_SPACES: f64 = 4.0;

#[derive(Debug, Clone, Copy)]
pub struct DefaultMetrics {
    /// Half a staff space in layout units.
    pub unit: i32,
}

impl Default for DefaultMetrics {
    fn default() -> Self {
        Self { unit: 9 }
    }
}

impl DefaultMetrics {
    pub fn new(unit: i32) -> Self {
        Self { unit }
    }

    fn spaces(&self, spaces: f64, size: u16) -> i32 {
        (spaces * 2.0 * self.unit as f64 * size as f64 / 100.0).round() as i32
    }

    fn accid_width(accid: Accidental) -> f64 {
        match accid {
            Accidental::Sharp | Accidental::DoubleSharp => ACCID_SHARP,
            Accidental::Flat => ACCID_FLAT,
            Accidental::Natural => ACCID_NATURAL,
            Accidental::DoubleFlat => ACCID_DOUBLE_FLAT,
        }
    }
}

impl GlyphMetrics for DefaultMetrics {
    fn width(&self, glyph: Glyph, size: u16) -> i32 {
        let spaces = match glyph {
            Glyph::Notehead(dur) => match dur {
                Duration::Maxima | Duration::Long | Duration::Breve => NOTEHEAD_BREVE,
                Duration::Whole => NOTEHEAD_WHOLE,
                _ => NOTEHEAD_BLACK,
            },
            Glyph::Rest(dur) => match dur {
                Duration::Maxima | Duration::Long | Duration::Breve => 0.7,
                Duration::Whole | Duration::Half => 1.13,
                Duration::Quarter => 1.08,
                Duration::Eighth => 1.0,
                Duration::Sixteenth => 1.28,
                _ => 1.4,
            },
            Glyph::Accid(accid) | Glyph::KeyAccid(accid) => Self::accid_width(accid),
            Glyph::Dot => DOT,
            Glyph::Clef(shape) => match shape {
                ClefShape::G => CLEF_G,
                ClefShape::F => CLEF_F,
                ClefShape::C => CLEF_C,
                ClefShape::Perc => CLEF_PERC,
            },
            Glyph::MeterDigit => METER_DIGIT,
            Glyph::MeterSymbol | Glyph::Mensur => METER_SYMBOL,
            Glyph::BarLine(form) => match form {
                BarRendition::Single | BarRendition::Dashed => 0.16,
                BarRendition::Double => 0.6,
                BarRendition::End => 0.8,
                BarRendition::RptStart | BarRendition::RptEnd => 1.3,
                BarRendition::RptBoth => 2.2,
                BarRendition::Invis => 0.0,
            },
            Glyph::Dynamic => 2.4,
            Glyph::Hairpin | Glyph::Slur | Glyph::Octave => 4.0,
            Glyph::Pedal => 2.2,
            Glyph::Fermata => 2.2,
        };
        self.spaces(spaces, size)
    }

    fn height(&self, glyph: Glyph, size: u16) -> i32 {
        let spaces = match glyph {
            Glyph::Notehead(_) | Glyph::Dot => 1.0,
            Glyph::Rest(_) => 2.0,
            Glyph::Accid(_) | Glyph::KeyAccid(_) => 2.5,
            Glyph::Clef(ClefShape::G) => 7.0,
            Glyph::Clef(_) => 4.0,
            Glyph::MeterDigit | Glyph::MeterSymbol | Glyph::Mensur => 2.0,
            Glyph::BarLine(_) => STAFF_HEIGHT_SPACES,
            Glyph::Dynamic => 1.8,
            Glyph::Hairpin => 1.5,
            Glyph::Slur => 2.0,
            Glyph::Octave | Glyph::Pedal => 1.8,
            Glyph::Fermata => 1.3,
        };
        self.spaces(spaces, size)
    }

    fn text_height(&self, size: u16) -> i32 {
        self.spaces(TEXT_SIZE, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_scale_with_size() {
        let metrics = DefaultMetrics::default();
        let full = metrics.width(Glyph::Notehead(Duration::Quarter), 100);
        let cue = metrics.width(Glyph::Notehead(Duration::Quarter), 75);
        assert_eq!(full, 21);
        assert!(cue < full, "cue-size notehead {cue} should be narrower than {full}");
    }

    #[test]
    fn text_width_grows_with_length() {
        let metrics = DefaultMetrics::default();
        assert!(metrics.text_width("allegro", 100) > metrics.text_width("f", 100));
        assert_eq!(metrics.text_width("", 100), 0);
    }
}
