//! Raw measurements taken from a document before any rule decides pass/fail.
//!
//! Effective run and paragraph formatting is resolved through ordered chains
//! of [`Resolver`] links. The first link that yields a value wins, so the
//! precedence of direct formatting, styles, defaults and theme is exactly the
//! order of each chain.

use crate::config::Policy;
use crate::extractors::docx::{FontSpec, LineSpacing, Paragraph, Run, Style, StructuredDocument, ThemeFontSlot};
use regex::Regex;
use std::sync::LazyLock;

/// Bracketed integer citation marker, e.g. `[3]`
pub static CITATION_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[(\d+)\]").unwrap());

/// Numeric outline prefix, e.g. `1 `, `2.3 `, `4.1.2\t`
pub static HEADING_NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(?:\.\d+)*\s").unwrap());

static WHITESPACE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Largest size difference, in points, that still counts as the target size
pub const FONT_SIZE_TOLERANCE_PT: f64 = 0.6;

/// Largest multiplier difference that still counts as the target spacing
pub const LINE_SPACING_TOLERANCE: f64 = 0.2;

// Absorbs binary rounding at the exact tolerance boundary
const EPSILON: f64 = 1e-9;

// ===== TEXT SIGNALS =====

/// Collapse whitespace runs to one space, trim, lowercase.
pub fn normalize_text(text: &str) -> String {
    WHITESPACE_REGEX
        .replace_all(text.trim(), " ")
        .to_lowercase()
}

/// Phrases from `required` that do not occur in `text`, ignoring case and
/// whitespace differences. Order follows `required`.
pub fn missing_phrases<'a>(text: &str, required: &'a [String]) -> Vec<&'a str> {
    let haystack = normalize_text(text);
    required
        .iter()
        .filter(|phrase| !haystack.contains(&normalize_text(phrase)))
        .map(String::as_str)
        .collect()
}

pub fn has_citation_marker(text: &str) -> bool {
    CITATION_REGEX.is_match(text)
}

pub fn has_outline_number(text: &str) -> bool {
    HEADING_NUMBER_REGEX.is_match(text)
}

pub fn is_heading_style(style_name: &str) -> bool {
    style_name.to_lowercase().starts_with("heading")
}

/// `count / total` compared against the allowed share; `total` is floored at 1.
pub fn within_tolerance(count: usize, total: usize, tolerance: f64) -> bool {
    nonconforming_ratio(count, total) <= tolerance + EPSILON
}

pub fn nonconforming_ratio(count: usize, total: usize) -> f64 {
    count as f64 / total.max(1) as f64
}

// ===== RESOLVER CHAINS =====

/// What a resolver link can look at: the document, the paragraph, and the
/// run being measured (absent when the paragraph has no visible runs).
#[derive(Clone, Copy)]
pub struct ResolveContext<'a> {
    pub document: &'a StructuredDocument,
    pub paragraph: &'a Paragraph,
    pub run: Option<&'a Run>,
}

impl<'a> ResolveContext<'a> {
    pub fn new(document: &'a StructuredDocument, paragraph: &'a Paragraph, run: Option<&'a Run>) -> Self {
        Self {
            document,
            paragraph,
            run,
        }
    }

    fn style_chain(&self, id: Option<&str>) -> Vec<&'a Style> {
        id.map(|id| self.document.styles.chain(id)).unwrap_or_default()
    }

    fn run_style_chain(&self) -> Vec<&'a Style> {
        self.style_chain(self.run.and_then(|run| run.style_id.as_deref()))
    }

    fn paragraph_style_chain(&self) -> Vec<&'a Style> {
        self.style_chain(self.paragraph.style_id.as_deref())
    }

    fn default_style_chain(&self) -> Vec<&'a Style> {
        let default_id = self
            .document
            .styles
            .default_paragraph_style()
            .map(|style| style.id.as_str());
        self.style_chain(default_id)
    }
}

/// One named link in a resolution chain
pub struct Resolver<T> {
    pub name: &'static str,
    pub resolve: for<'a> fn(&ResolveContext<'a>) -> Option<T>,
}

/// Try each link in order and return the first value found.
pub fn resolve<T>(chain: &[Resolver<T>], context: &ResolveContext<'_>) -> Option<T> {
    chain.iter().find_map(|link| (link.resolve)(context))
}

/// Like [`resolve`], also naming the link that answered.
pub fn resolve_with_source<T>(chain: &[Resolver<T>], context: &ResolveContext<'_>) -> Option<(&'static str, T)> {
    chain
        .iter()
        .find_map(|link| (link.resolve)(context).map(|value| (link.name, value)))
}

pub const FONT_CHAIN: &[Resolver<FontSpec>] = &[
    Resolver { name: "run", resolve: font_from_run },
    Resolver { name: "run_style", resolve: font_from_run_style },
    Resolver { name: "paragraph_style", resolve: font_from_paragraph_style },
    Resolver { name: "default_style", resolve: font_from_default_style },
    Resolver { name: "document_defaults", resolve: font_from_document_defaults },
];

pub const SIZE_CHAIN: &[Resolver<u32>] = &[
    Resolver { name: "run", resolve: size_from_run },
    Resolver { name: "run_style", resolve: size_from_run_style },
    Resolver { name: "paragraph_style", resolve: size_from_paragraph_style },
    Resolver { name: "default_style", resolve: size_from_default_style },
    Resolver { name: "document_defaults", resolve: size_from_document_defaults },
];

pub const SPACING_CHAIN: &[Resolver<LineSpacing>] = &[
    Resolver { name: "paragraph", resolve: spacing_from_paragraph },
    Resolver { name: "paragraph_style", resolve: spacing_from_paragraph_style },
    Resolver { name: "default_style", resolve: spacing_from_default_style },
    Resolver { name: "document_defaults", resolve: spacing_from_document_defaults },
];

fn font_from_run(ctx: &ResolveContext<'_>) -> Option<FontSpec> {
    ctx.run.and_then(|run| run.properties.font.clone())
}

fn font_from_run_style(ctx: &ResolveContext<'_>) -> Option<FontSpec> {
    ctx.run_style_chain().into_iter().find_map(|style| style.run.font.clone())
}

fn font_from_paragraph_style(ctx: &ResolveContext<'_>) -> Option<FontSpec> {
    ctx.paragraph_style_chain().into_iter().find_map(|style| style.run.font.clone())
}

fn font_from_default_style(ctx: &ResolveContext<'_>) -> Option<FontSpec> {
    ctx.default_style_chain().into_iter().find_map(|style| style.run.font.clone())
}

fn font_from_document_defaults(ctx: &ResolveContext<'_>) -> Option<FontSpec> {
    ctx.document.styles.default_run.font.clone()
}

fn size_from_run(ctx: &ResolveContext<'_>) -> Option<u32> {
    ctx.run.and_then(|run| run.properties.size_half_points)
}

fn size_from_run_style(ctx: &ResolveContext<'_>) -> Option<u32> {
    ctx.run_style_chain().into_iter().find_map(|style| style.run.size_half_points)
}

fn size_from_paragraph_style(ctx: &ResolveContext<'_>) -> Option<u32> {
    ctx.paragraph_style_chain().into_iter().find_map(|style| style.run.size_half_points)
}

fn size_from_default_style(ctx: &ResolveContext<'_>) -> Option<u32> {
    ctx.default_style_chain().into_iter().find_map(|style| style.run.size_half_points)
}

fn size_from_document_defaults(ctx: &ResolveContext<'_>) -> Option<u32> {
    ctx.document.styles.default_run.size_half_points
}

fn spacing_from_paragraph(ctx: &ResolveContext<'_>) -> Option<LineSpacing> {
    ctx.paragraph.properties.line_spacing
}

fn spacing_from_paragraph_style(ctx: &ResolveContext<'_>) -> Option<LineSpacing> {
    ctx.paragraph_style_chain().into_iter().find_map(|style| style.paragraph.line_spacing)
}

fn spacing_from_default_style(ctx: &ResolveContext<'_>) -> Option<LineSpacing> {
    ctx.default_style_chain().into_iter().find_map(|style| style.paragraph.line_spacing)
}

fn spacing_from_document_defaults(ctx: &ResolveContext<'_>) -> Option<LineSpacing> {
    ctx.document.styles.default_paragraph.line_spacing
}

/// Effective font family. Theme references are looked up in the theme; when
/// nothing in the chain names a font, the theme's body font applies.
pub fn resolve_font_name(ctx: &ResolveContext<'_>) -> Option<String> {
    let theme = &ctx.document.theme;
    match resolve(FONT_CHAIN, ctx) {
        Some(FontSpec::Named(name)) => Some(name),
        Some(FontSpec::Theme(slot)) => theme.typeface(slot).map(str::to_string),
        None => theme.typeface(ThemeFontSlot::Minor).map(str::to_string),
    }
}

/// Effective font size in points
pub fn resolve_font_size(ctx: &ResolveContext<'_>) -> Option<f64> {
    resolve(SIZE_CHAIN, ctx).map(|half_points| f64::from(half_points) / 2.0)
}

pub fn resolve_line_spacing(ctx: &ResolveContext<'_>) -> Option<LineSpacing> {
    resolve(SPACING_CHAIN, ctx)
}

// ===== PER-PARAGRAPH AND DOCUMENT SIGNALS =====

/// Style name used to classify a paragraph. A style id missing from the
/// style sheet is used as its own name.
pub fn paragraph_style_name<'a>(document: &'a StructuredDocument, paragraph: &'a Paragraph) -> Option<&'a str> {
    match paragraph.style_id.as_deref() {
        Some(id) => Some(document.styles.get(id).map(Style::display_name).unwrap_or(id)),
        None => document.styles.default_paragraph_style().map(Style::display_name),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParagraphSignals {
    pub font_conforms: bool,
    pub size_conforms: bool,
    pub spacing_conforms: bool,
    pub is_heading: bool,
    pub has_outline_number: bool,
    pub has_citation: bool,
}

impl ParagraphSignals {
    /// Measure one paragraph. Every visible run must conform; a paragraph
    /// without visible runs is measured through its styles alone.
    pub fn measure(document: &StructuredDocument, paragraph: &Paragraph, policy: &Policy) -> Self {
        let visible: Vec<Option<&Run>> = {
            let runs: Vec<Option<&Run>> = paragraph.visible_runs().map(Some).collect();
            if runs.is_empty() {
                vec![None]
            } else {
                runs
            }
        };

        let target_font = policy.font.trim().to_lowercase();
        let font_conforms = visible.iter().all(|run| {
            let ctx = ResolveContext::new(document, paragraph, *run);
            resolve_font_name(&ctx)
                .map(|name| name.trim().to_lowercase() == target_font)
                .unwrap_or(false)
        });

        let size_conforms = visible.iter().all(|run| {
            let ctx = ResolveContext::new(document, paragraph, *run);
            resolve_font_size(&ctx)
                .map(|size| (size - policy.font_size).abs() <= FONT_SIZE_TOLERANCE_PT + EPSILON)
                .unwrap_or(false)
        });

        let spacing_conforms = spacing_conforms(
            resolve_line_spacing(&ResolveContext::new(document, paragraph, None)),
            policy.line_spacing,
        );

        let text = paragraph.text();
        Self {
            font_conforms,
            size_conforms,
            spacing_conforms,
            is_heading: paragraph_style_name(document, paragraph).is_some_and(is_heading_style),
            has_outline_number: has_outline_number(&text),
            has_citation: has_citation_marker(&text),
        }
    }
}

/// Named one-and-a-half mode, or a proportional multiplier near the target.
pub fn spacing_conforms(spacing: Option<LineSpacing>, target: f64) -> bool {
    match spacing {
        Some(spacing) if spacing.is_one_and_a_half() => true,
        Some(spacing) => spacing
            .multiplier()
            .is_some_and(|multiplier| (multiplier - target).abs() <= LINE_SPACING_TOLERANCE + EPSILON),
        None => false,
    }
}

/// Aggregated measurements for a whole structured document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentSignals {
    pub paragraph_count: usize,
    pub nonconforming_font: usize,
    pub nonconforming_size: usize,
    pub nonconforming_spacing: usize,
    /// Text of heading paragraphs missing an outline number
    pub unnumbered_headings: Vec<String>,
    pub has_citation: bool,
    /// First section margins in inches (top, bottom, left, right)
    pub margins_in: Option<[f64; 4]>,
}

impl DocumentSignals {
    pub fn extract(document: &StructuredDocument, policy: &Policy) -> Self {
        let mut signals = DocumentSignals {
            paragraph_count: document.paragraphs.len(),
            margins_in: document
                .first_section()
                .and_then(|section| section.margins)
                .map(|margins| margins.inches()),
            ..DocumentSignals::default()
        };

        for paragraph in &document.paragraphs {
            let measured = ParagraphSignals::measure(document, paragraph, policy);
            signals.nonconforming_font += usize::from(!measured.font_conforms);
            signals.nonconforming_size += usize::from(!measured.size_conforms);
            signals.nonconforming_spacing += usize::from(!measured.spacing_conforms);
            signals.has_citation |= measured.has_citation;
            if measured.is_heading && !measured.has_outline_number {
                signals.unnumbered_headings.push(paragraph.text());
            }
        }

        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::docx::{ParagraphProperties, RunProperties, StyleSheet, ThemeFonts};

    fn run(text: &str, properties: RunProperties) -> Run {
        Run {
            text: text.to_string(),
            style_id: None,
            properties,
        }
    }

    fn named(font: &str) -> Option<FontSpec> {
        Some(FontSpec::Named(font.to_string()))
    }

    fn document_with_normal(normal_run: RunProperties) -> StructuredDocument {
        let mut styles = StyleSheet::default();
        styles.styles.insert(
            "Normal".into(),
            Style {
                id: "Normal".into(),
                name: Some("Normal".into()),
                is_default: true,
                run: normal_run,
                ..Style::default()
            },
        );
        styles.styles.insert(
            "Heading1".into(),
            Style {
                id: "Heading1".into(),
                name: Some("heading 1".into()),
                based_on: Some("Normal".into()),
                run: RunProperties {
                    font: named("Arial"),
                    size_half_points: Some(32),
                },
                ..Style::default()
            },
        );
        StructuredDocument {
            styles,
            theme: ThemeFonts {
                major: Some("Calibri Light".into()),
                minor: Some("Calibri".into()),
            },
            ..StructuredDocument::default()
        }
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Chapter\t1 \n  INTRODUCTION "), "chapter 1 introduction");
    }

    #[test]
    fn test_missing_phrases_ignores_case_and_spacing() {
        let required = vec!["Abstract".to_string(), "Table of  Contents".to_string(), "Conclusion".to_string()];
        let text = "ABSTRACT\n...\ntable of\ncontents\n...";
        assert_eq!(missing_phrases(text, &required), vec!["Conclusion"]);
    }

    #[test]
    fn test_citation_and_outline_patterns() {
        assert!(has_citation_marker("as shown in [7] above"));
        assert!(!has_citation_marker("as shown in [a] or (7)"));
        assert!(has_outline_number("1.2 Background"));
        assert!(has_outline_number("3\tResults"));
        assert!(!has_outline_number("Introduction"));
        assert!(!has_outline_number("1.2Background"));
    }

    #[test]
    fn test_boundary_ratio_is_inclusive() {
        assert!(within_tolerance(1, 10, 0.1));
        assert!(!within_tolerance(2, 10, 0.1));
        assert!(within_tolerance(0, 0, 0.0));
        assert_eq!(nonconforming_ratio(3, 0), 3.0);
    }

    #[test]
    fn test_run_formatting_beats_styles() {
        let doc = document_with_normal(RunProperties {
            font: named("Times New Roman"),
            size_half_points: Some(24),
        });
        let paragraph = Paragraph::default();
        let direct = run("x", RunProperties { font: named("Georgia"), size_half_points: Some(22) });

        let ctx = ResolveContext::new(&doc, &paragraph, Some(&direct));
        assert_eq!(resolve_with_source(FONT_CHAIN, &ctx).map(|(link, _)| link), Some("run"));
        assert_eq!(resolve_font_name(&ctx).as_deref(), Some("Georgia"));
        assert_eq!(resolve_font_size(&ctx), Some(11.0));
    }

    #[test]
    fn test_policy_font_padding_is_ignored() {
        let doc = document_with_normal(RunProperties {
            font: named("Times New Roman"),
            size_half_points: Some(24),
        });
        let paragraph = Paragraph {
            runs: vec![run("Body text", RunProperties::default())],
            ..Paragraph::default()
        };
        let policy = Policy {
            font: " Times New Roman ".into(),
            ..Policy::default()
        };
        assert!(ParagraphSignals::measure(&doc, &paragraph, &policy).font_conforms);
    }

    #[test]
    fn test_paragraph_style_then_default_style() {
        let doc = document_with_normal(RunProperties {
            font: named("Times New Roman"),
            size_half_points: Some(24),
        });
        let plain = run("x", RunProperties::default());

        let heading = Paragraph {
            style_id: Some("Heading1".into()),
            ..Paragraph::default()
        };
        let ctx = ResolveContext::new(&doc, &heading, Some(&plain));
        assert_eq!(resolve_with_source(FONT_CHAIN, &ctx).map(|(link, _)| link), Some("paragraph_style"));
        assert_eq!(resolve_font_size(&ctx), Some(16.0));

        let body = Paragraph::default();
        let ctx = ResolveContext::new(&doc, &body, Some(&plain));
        assert_eq!(resolve_with_source(FONT_CHAIN, &ctx).map(|(link, _)| link), Some("default_style"));
        assert_eq!(resolve_font_name(&ctx).as_deref(), Some("Times New Roman"));
    }

    #[test]
    fn test_theme_font_fallback() {
        let mut doc = document_with_normal(RunProperties::default());
        let paragraph = Paragraph::default();
        let ctx = ResolveContext::new(&doc, &paragraph, None);
        assert_eq!(resolve_font_name(&ctx).as_deref(), Some("Calibri"));
        assert_eq!(resolve_font_size(&ctx), None);

        doc.styles.default_run.font = Some(FontSpec::Theme(ThemeFontSlot::Major));
        let ctx = ResolveContext::new(&doc, &paragraph, None);
        assert_eq!(resolve_font_name(&ctx).as_deref(), Some("Calibri Light"));
    }

    #[test]
    fn test_spacing_resolution_and_conformance() {
        let mut doc = document_with_normal(RunProperties::default());
        doc.styles.default_paragraph = ParagraphProperties {
            line_spacing: Some(LineSpacing::Auto(259)),
        };
        let inherited = Paragraph::default();
        let ctx = ResolveContext::new(&doc, &inherited, None);
        assert_eq!(resolve_line_spacing(&ctx), Some(LineSpacing::Auto(259)));
        assert!(!spacing_conforms(resolve_line_spacing(&ctx), 1.5));

        assert!(spacing_conforms(Some(LineSpacing::Auto(360)), 2.0));
        assert!(spacing_conforms(Some(LineSpacing::Auto(408)), 1.5));
        assert!(!spacing_conforms(Some(LineSpacing::Exact(360)), 1.5));
        assert!(!spacing_conforms(None, 1.5));
    }

    #[test]
    fn test_document_signals_count_nonconforming_paragraphs() {
        let mut doc = document_with_normal(RunProperties {
            font: named("Times New Roman"),
            size_half_points: Some(24),
        });
        let spacing = ParagraphProperties {
            line_spacing: Some(LineSpacing::Auto(360)),
        };
        doc.paragraphs = vec![
            Paragraph {
                style_id: Some("Heading1".into()),
                properties: spacing.clone(),
                runs: vec![run("Introduction", RunProperties::default())],
                ends_page: false,
            },
            Paragraph {
                properties: spacing.clone(),
                runs: vec![run("Prior work [3] matters.", RunProperties::default())],
                ..Paragraph::default()
            },
            Paragraph {
                properties: spacing,
                ..Paragraph::default()
            },
        ];

        let signals = DocumentSignals::extract(&doc, &Policy::default());
        assert_eq!(signals.paragraph_count, 3);
        assert_eq!(signals.nonconforming_font, 1);
        assert_eq!(signals.nonconforming_size, 1);
        assert_eq!(signals.nonconforming_spacing, 0);
        assert_eq!(signals.unnumbered_headings, vec!["Introduction".to_string()]);
        assert!(signals.has_citation);
        assert!(signals.margins_in.is_none());
    }
}
