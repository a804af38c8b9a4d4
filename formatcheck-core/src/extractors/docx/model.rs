//! In-memory model of the WordprocessingML parts the checks need.
//!
//! Only formatting that feeds a rule is kept: fonts, sizes, line spacing,
//! paragraph styles, page margins and page breaks. Everything is stored the
//! way Word stores it (half-points, twips, 240ths of a line) and converted at
//! the point of measurement.

use std::collections::{HashMap, HashSet};

/// Twentieths of a point per inch
pub const TWIPS_PER_INCH: f64 = 1440.0;

/// `w:line` value for single spacing under `lineRule="auto"`
pub const AUTO_LINE_UNIT: f64 = 240.0;

#[derive(Debug, Clone, Default)]
pub struct StructuredDocument {
    /// Body-level paragraphs in document order
    pub paragraphs: Vec<Paragraph>,
    /// Section geometry in document order; the first entry is the first section
    pub sections: Vec<SectionGeometry>,
    pub styles: StyleSheet,
    pub theme: ThemeFonts,
    /// Page count as last rendered by the authoring application
    pub page_count: Option<u32>,
}

impl StructuredDocument {
    pub fn first_section(&self) -> Option<&SectionGeometry> {
        self.sections.first()
    }

    /// Paragraphs up to and including the one that ends the first page.
    pub fn title_page(&self) -> &[Paragraph] {
        match self.paragraphs.iter().position(|p| p.ends_page) {
            Some(index) => &self.paragraphs[..=index],
            None => &self.paragraphs,
        }
    }

    pub fn full_text(&self) -> String {
        join_paragraph_text(&self.paragraphs)
    }
}

pub fn join_paragraph_text(paragraphs: &[Paragraph]) -> String {
    paragraphs
        .iter()
        .map(Paragraph::text)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Default)]
pub struct Paragraph {
    /// `w:pStyle`; `None` means the default paragraph style applies
    pub style_id: Option<String>,
    pub properties: ParagraphProperties,
    pub runs: Vec<Run>,
    /// Contains a page break, a rendered page boundary, or a section break
    pub ends_page: bool,
}

impl Paragraph {
    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }

    /// Runs with at least one non-whitespace character
    pub fn visible_runs(&self) -> impl Iterator<Item = &Run> {
        self.runs.iter().filter(|run| run.is_visible())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Run {
    pub text: String,
    /// `w:rStyle` character style
    pub style_id: Option<String>,
    pub properties: RunProperties,
}

impl Run {
    pub fn is_visible(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunProperties {
    pub font: Option<FontSpec>,
    /// `w:sz`, in half-points
    pub size_half_points: Option<u32>,
}

impl RunProperties {
    pub fn size_points(&self) -> Option<f64> {
        self.size_half_points.map(|half| f64::from(half) / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontSpec {
    Named(String),
    Theme(ThemeFontSlot),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeFontSlot {
    /// Headings font
    Major,
    /// Body font
    Minor,
}

impl ThemeFontSlot {
    /// Parse `w:asciiTheme` values such as `minorHAnsi` or `majorBidi`.
    pub fn from_attribute(value: &str) -> Option<Self> {
        if value.starts_with("major") {
            Some(ThemeFontSlot::Major)
        } else if value.starts_with("minor") {
            Some(ThemeFontSlot::Minor)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParagraphProperties {
    pub line_spacing: Option<LineSpacing>,
}

/// `w:spacing` line settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSpacing {
    /// Proportional, in 240ths of a line (`lineRule="auto"`)
    Auto(u32),
    /// Fixed line height in twips
    Exact(u32),
    /// Minimum line height in twips
    AtLeast(u32),
}

impl LineSpacing {
    pub fn from_attributes(line: u32, rule: Option<&str>) -> Self {
        match rule {
            Some("exact") => LineSpacing::Exact(line),
            Some("atLeast") => LineSpacing::AtLeast(line),
            _ => LineSpacing::Auto(line),
        }
    }

    /// Word's named "1.5 lines" setting
    pub fn is_one_and_a_half(&self) -> bool {
        matches!(self, LineSpacing::Auto(360))
    }

    /// Line multiplier, for proportional spacing only
    pub fn multiplier(&self) -> Option<f64> {
        match self {
            LineSpacing::Auto(line) => Some(f64::from(*line) / AUTO_LINE_UNIT),
            LineSpacing::Exact(_) | LineSpacing::AtLeast(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SectionGeometry {
    pub margins: Option<PageMargins>,
}

/// `w:pgMar`, in twips
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageMargins {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl PageMargins {
    /// (top, bottom, left, right) in inches
    pub fn inches(&self) -> [f64; 4] {
        [self.top, self.bottom, self.left, self.right].map(|twips| twips / TWIPS_PER_INCH)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StyleKind {
    #[default]
    Paragraph,
    Character,
    Table,
    Numbering,
}

impl StyleKind {
    pub fn from_attribute(value: Option<&str>) -> Self {
        match value {
            Some("character") => StyleKind::Character,
            Some("table") => StyleKind::Table,
            Some("numbering") => StyleKind::Numbering,
            _ => StyleKind::Paragraph,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Style {
    pub id: String,
    pub name: Option<String>,
    pub kind: StyleKind,
    pub based_on: Option<String>,
    pub is_default: bool,
    pub run: RunProperties,
    pub paragraph: ParagraphProperties,
}

impl Style {
    /// Display name, falling back to the style id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    pub styles: HashMap<String, Style>,
    /// `w:docDefaults/w:rPrDefault`
    pub default_run: RunProperties,
    /// `w:docDefaults/w:pPrDefault`
    pub default_paragraph: ParagraphProperties,
}

impl StyleSheet {
    pub fn get(&self, id: &str) -> Option<&Style> {
        self.styles.get(id)
    }

    /// The style and its `basedOn` ancestors, nearest first. Stops on cycles
    /// and dangling references.
    pub fn chain(&self, id: &str) -> Vec<&Style> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(id);
        while let Some(current) = next {
            if !seen.insert(current) {
                break;
            }
            let Some(style) = self.styles.get(current) else {
                break;
            };
            chain.push(style);
            next = style.based_on.as_deref();
        }
        chain
    }

    /// The paragraph style marked `w:default="1"` (normally "Normal").
    /// If several are marked, the smallest id wins.
    pub fn default_paragraph_style(&self) -> Option<&Style> {
        self.styles
            .values()
            .filter(|style| style.kind == StyleKind::Paragraph && style.is_default)
            .min_by(|a, b| a.id.cmp(&b.id))
            .or_else(|| self.styles.get("Normal"))
    }

    /// Effective paragraph style for a paragraph
    pub fn paragraph_style(&self, paragraph: &Paragraph) -> Option<&Style> {
        match paragraph.style_id.as_deref() {
            Some(id) => self.get(id),
            None => self.default_paragraph_style(),
        }
    }
}

/// Latin typefaces from the document theme
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemeFonts {
    pub major: Option<String>,
    pub minor: Option<String>,
}

impl ThemeFonts {
    pub fn typeface(&self, slot: ThemeFontSlot) -> Option<&str> {
        match slot {
            ThemeFontSlot::Major => self.major.as_deref(),
            ThemeFontSlot::Minor => self.minor.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(id: &str, based_on: Option<&str>) -> Style {
        Style {
            id: id.to_string(),
            based_on: based_on.map(str::to_string),
            ..Style::default()
        }
    }

    #[test]
    fn test_style_chain_follows_based_on() {
        let mut sheet = StyleSheet::default();
        sheet.styles.insert("Normal".into(), style("Normal", None));
        sheet.styles.insert("Heading1".into(), style("Heading1", Some("Normal")));
        sheet.styles.insert("Heading2".into(), style("Heading2", Some("Heading1")));

        let ids: Vec<&str> = sheet.chain("Heading2").iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["Heading2", "Heading1", "Normal"]);
    }

    #[test]
    fn test_style_chain_survives_cycles_and_dangling_refs() {
        let mut sheet = StyleSheet::default();
        sheet.styles.insert("A".into(), style("A", Some("B")));
        sheet.styles.insert("B".into(), style("B", Some("A")));
        sheet.styles.insert("C".into(), style("C", Some("Missing")));

        assert_eq!(sheet.chain("A").len(), 2);
        assert_eq!(sheet.chain("C").len(), 1);
        assert!(sheet.chain("Missing").is_empty());
    }

    #[test]
    fn test_duplicate_default_paragraph_styles_pick_smallest_id() {
        let mut sheet = StyleSheet::default();
        for id in ["Zeta", "Body", "Normal", "Alpha"] {
            let mut entry = style(id, None);
            entry.is_default = id != "Normal";
            sheet.styles.insert(id.into(), entry);
        }
        let mut character = style("AAA", None);
        character.kind = StyleKind::Character;
        character.is_default = true;
        sheet.styles.insert("AAA".into(), character);

        assert_eq!(sheet.default_paragraph_style().map(|s| s.id.as_str()), Some("Alpha"));
    }

    #[test]
    fn test_default_paragraph_style_falls_back_to_normal() {
        let mut sheet = StyleSheet::default();
        sheet.styles.insert("Normal".into(), style("Normal", None));
        assert_eq!(sheet.default_paragraph_style().map(|s| s.id.as_str()), Some("Normal"));
    }

    #[test]
    fn test_line_spacing_modes() {
        assert!(LineSpacing::from_attributes(360, Some("auto")).is_one_and_a_half());
        assert!(LineSpacing::from_attributes(360, None).is_one_and_a_half());
        assert_eq!(LineSpacing::from_attributes(480, None).multiplier(), Some(2.0));
        assert_eq!(LineSpacing::from_attributes(360, Some("exact")).multiplier(), None);
        assert!(!LineSpacing::AtLeast(360).is_one_and_a_half());
    }

    #[test]
    fn test_margins_in_inches() {
        let margins = PageMargins {
            top: 1440.0,
            bottom: 1440.0,
            left: 2160.0,
            right: 720.0,
        };
        assert_eq!(margins.inches(), [1.0, 1.0, 1.5, 0.5]);
    }

    #[test]
    fn test_title_page_stops_at_first_break() {
        let mut doc = StructuredDocument::default();
        for (text, ends_page) in [("Title", false), ("Author", true), ("Abstract", false)] {
            doc.paragraphs.push(Paragraph {
                runs: vec![Run {
                    text: text.to_string(),
                    ..Run::default()
                }],
                ends_page,
                ..Paragraph::default()
            });
        }
        assert_eq!(doc.title_page().len(), 2);
    }
}
