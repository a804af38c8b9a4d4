//! WordprocessingML part parsers
//!
//! Each parser walks the part once with quick-xml, keeping a stack of open
//! element local names so properties are attributed by their position
//! (`w:p/w:pPr/w:spacing` vs `w:style/w:pPr/w:spacing`) rather than by name alone.

use super::model::*;
use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

type Stack = Vec<Vec<u8>>;

/// True when the innermost open elements are exactly `path` (outermost first)
fn ends_with(stack: &Stack, path: &[&str]) -> bool {
    stack.len() >= path.len()
        && stack[stack.len() - path.len()..]
            .iter()
            .zip(path)
            .all(|(open, expected)| open.as_slice() == expected.as_bytes())
}

/// Attribute value by local name (namespace prefix ignored)
fn attr(element: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn attr_u32(element: &BytesStart<'_>, local: &[u8]) -> Option<u32> {
    attr(element, local).and_then(|value| value.trim().parse().ok())
}

/// Measurement in twips. Plain integers are twips; strict-OOXML unit suffixes are converted.
fn parse_twips(value: &str) -> Option<f64> {
    let value = value.trim();
    if let Ok(twips) = value.parse::<f64>() {
        return Some(twips);
    }
    let split = value.find(|c: char| c.is_ascii_alphabetic())?;
    let (number, unit) = value.split_at(split);
    let number: f64 = number.parse().ok()?;
    let per_unit = match unit {
        "in" => TWIPS_PER_INCH,
        "cm" => TWIPS_PER_INCH / 2.54,
        "mm" => TWIPS_PER_INCH / 25.4,
        "pt" => 20.0,
        "pc" => 240.0,
        _ => return None,
    };
    Some(number * per_unit)
}

fn parse_font(element: &BytesStart<'_>) -> Option<FontSpec> {
    // Theme references take precedence over explicit names, as in Word
    let theme = attr(element, b"asciiTheme")
        .or_else(|| attr(element, b"hAnsiTheme"))
        .and_then(|value| ThemeFontSlot::from_attribute(&value));
    if let Some(slot) = theme {
        return Some(FontSpec::Theme(slot));
    }
    attr(element, b"ascii")
        .or_else(|| attr(element, b"hAnsi"))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .map(FontSpec::Named)
}

fn parse_spacing(element: &BytesStart<'_>) -> Option<LineSpacing> {
    let line = attr_u32(element, b"line")?;
    let rule = attr(element, b"lineRule");
    Some(LineSpacing::from_attributes(line, rule.as_deref()))
}

fn parse_margins(element: &BytesStart<'_>) -> Option<PageMargins> {
    let side = |name: &[u8]| attr(element, name).and_then(|v| parse_twips(&v));
    Some(PageMargins {
        top: side(b"top")?,
        bottom: side(b"bottom")?,
        left: side(b"left")?,
        right: side(b"right")?,
    })
}

/// Apply an `rPr` child (`rFonts`, `sz`) to a run property set
fn apply_run_property(element: &BytesStart<'_>, local: &[u8], target: &mut RunProperties) {
    match local {
        b"rFonts" => {
            if let Some(font) = parse_font(element) {
                target.font = Some(font);
            }
        }
        b"sz" => {
            if let Some(half_points) = attr_u32(element, b"val") {
                target.size_half_points = Some(half_points);
            }
        }
        _ => {}
    }
}

/// Parse `word/document.xml` into paragraphs and section geometry.
///
/// Only paragraphs directly under `w:body` are collected, matching what a
/// reader sees as the document's running text. Table cells and text boxes are
/// skipped.
pub fn parse_document(xml: &str) -> Result<(Vec<Paragraph>, Vec<SectionGeometry>)> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Stack = Vec::new();
    let mut paragraphs = Vec::new();
    let mut sections = Vec::new();

    let mut paragraph: Option<Paragraph> = None;
    let mut run: Option<Run> = None;
    let mut section: Option<SectionGeometry> = None;
    // Depth at which an ignored subtree (text box content) started
    let mut skip_from: Option<usize> = None;

    loop {
        let event = reader
            .read_event()
            .with_context(|| format!("malformed document.xml at byte {}", reader.buffer_position()))?;

        match event {
            Event::Start(ref element) | Event::Empty(ref element) => {
                let is_start = matches!(event, Event::Start(_));
                let local = element.local_name().as_ref().to_vec();

                if skip_from.is_none() {
                    handle_document_element(
                        element,
                        &local,
                        &stack,
                        &mut paragraph,
                        &mut run,
                        &mut section,
                    );
                }

                if is_start {
                    let opens_text_box = local.as_slice() == b"txbxContent";
                    stack.push(local);
                    if skip_from.is_none() && opens_text_box {
                        skip_from = Some(stack.len());
                    }
                } else if skip_from.is_none() {
                    // Self-closing elements never see an End event
                    match local.as_slice() {
                        b"p" if ends_with(&stack, &["body"]) => {
                            if let Some(paragraph) = paragraph.take() {
                                paragraphs.push(paragraph);
                            }
                        }
                        b"r" => run = None,
                        b"sectPr" => {
                            if let Some(section) = section.take() {
                                sections.push(section);
                            }
                        }
                        _ => {}
                    }
                }
            }
            Event::Text(ref text) if skip_from.is_none() => {
                if let Some(run) = run.as_mut() {
                    if ends_with(&stack, &["r", "t"]) {
                        run.text.push_str(&text.unescape().context("bad text entity")?);
                    }
                }
            }
            Event::End(ref element) => {
                let depth = stack.len();
                stack.pop();
                if skip_from == Some(depth) {
                    skip_from = None;
                    continue;
                }
                if skip_from.is_some() {
                    continue;
                }

                match element.local_name().as_ref() {
                    b"r" => {
                        if let (Some(paragraph), Some(run)) = (paragraph.as_mut(), run.take()) {
                            paragraph.runs.push(run);
                        }
                    }
                    b"p" if ends_with(&stack, &["body"]) => {
                        if let Some(paragraph) = paragraph.take() {
                            paragraphs.push(paragraph);
                        }
                    }
                    b"sectPr" => {
                        if let Some(section) = section.take() {
                            sections.push(section);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok((paragraphs, sections))
}

fn handle_document_element(
    element: &BytesStart<'_>,
    local: &[u8],
    stack: &Stack,
    paragraph: &mut Option<Paragraph>,
    run: &mut Option<Run>,
    section: &mut Option<SectionGeometry>,
) {
    match local {
        b"p" if ends_with(stack, &["body"]) => {
            *paragraph = Some(Paragraph::default());
        }
        b"sectPr" if ends_with(stack, &["body"]) || ends_with(stack, &["p", "pPr"]) => {
            *section = Some(SectionGeometry::default());
            if let Some(paragraph) = paragraph.as_mut() {
                paragraph.ends_page = true;
            }
        }
        b"pgMar" if ends_with(stack, &["sectPr"]) => {
            if let Some(section) = section.as_mut() {
                section.margins = parse_margins(element);
            }
        }
        _ => {}
    }

    let Some(paragraph) = paragraph.as_mut() else {
        return;
    };

    match local {
        b"pStyle" if ends_with(stack, &["p", "pPr"]) => {
            paragraph.style_id = attr(element, b"val");
        }
        b"spacing" if ends_with(stack, &["p", "pPr"]) => {
            if let Some(spacing) = parse_spacing(element) {
                paragraph.properties.line_spacing = Some(spacing);
            }
        }
        b"r" => {
            *run = Some(Run::default());
        }
        b"rStyle" if ends_with(stack, &["r", "rPr"]) => {
            if let Some(run) = run.as_mut() {
                run.style_id = attr(element, b"val");
            }
        }
        b"rFonts" | b"sz" if ends_with(stack, &["r", "rPr"]) => {
            if let Some(run) = run.as_mut() {
                apply_run_property(element, local, &mut run.properties);
            }
        }
        b"tab" if ends_with(stack, &["r"]) => {
            if let Some(run) = run.as_mut() {
                run.text.push('\t');
            }
        }
        b"br" | b"cr" if ends_with(stack, &["r"]) => {
            if attr(element, b"type").as_deref() == Some("page") {
                paragraph.ends_page = true;
            } else if let Some(run) = run.as_mut() {
                run.text.push('\n');
            }
        }
        b"lastRenderedPageBreak" => {
            paragraph.ends_page = true;
        }
        _ => {}
    }
}

/// Parse `word/styles.xml`
pub fn parse_styles(xml: &str) -> Result<StyleSheet> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Stack = Vec::new();
    let mut sheet = StyleSheet::default();
    let mut style: Option<Style> = None;

    loop {
        let event = reader
            .read_event()
            .with_context(|| format!("malformed styles.xml at byte {}", reader.buffer_position()))?;

        match event {
            Event::Start(ref element) | Event::Empty(ref element) => {
                let is_start = matches!(event, Event::Start(_));
                let local = element.local_name().as_ref().to_vec();

                match local.as_slice() {
                    b"style" if ends_with(&stack, &["styles"]) => {
                        style = Some(Style {
                            id: attr(element, b"styleId").unwrap_or_default(),
                            kind: StyleKind::from_attribute(attr(element, b"type").as_deref()),
                            is_default: attr(element, b"default")
                                .map(|v| v == "1" || v == "true")
                                .unwrap_or(false),
                            ..Style::default()
                        });
                        if !is_start {
                            // Self-closing style carries no properties
                            if let Some(style) = style.take() {
                                sheet.styles.insert(style.id.clone(), style);
                            }
                        }
                    }
                    b"name" if ends_with(&stack, &["style"]) => {
                        if let Some(style) = style.as_mut() {
                            style.name = attr(element, b"val");
                        }
                    }
                    b"basedOn" if ends_with(&stack, &["style"]) => {
                        if let Some(style) = style.as_mut() {
                            style.based_on = attr(element, b"val");
                        }
                    }
                    b"rFonts" | b"sz" if ends_with(&stack, &["style", "rPr"]) => {
                        if let Some(style) = style.as_mut() {
                            apply_run_property(element, &local, &mut style.run);
                        }
                    }
                    b"rFonts" | b"sz" if ends_with(&stack, &["rPrDefault", "rPr"]) => {
                        apply_run_property(element, &local, &mut sheet.default_run);
                    }
                    b"spacing" if ends_with(&stack, &["style", "pPr"]) => {
                        if let Some(style) = style.as_mut() {
                            if let Some(spacing) = parse_spacing(element) {
                                style.paragraph.line_spacing = Some(spacing);
                            }
                        }
                    }
                    b"spacing" if ends_with(&stack, &["pPrDefault", "pPr"]) => {
                        if let Some(spacing) = parse_spacing(element) {
                            sheet.default_paragraph.line_spacing = Some(spacing);
                        }
                    }
                    _ => {}
                }

                if is_start {
                    stack.push(local);
                }
            }
            Event::End(ref element) => {
                stack.pop();
                if element.local_name().as_ref() == b"style" && ends_with(&stack, &["styles"]) {
                    if let Some(style) = style.take() {
                        sheet.styles.insert(style.id.clone(), style);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(sheet)
}

/// Parse the theme part for its major/minor latin typefaces
pub fn parse_theme(xml: &str) -> Result<ThemeFonts> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Stack = Vec::new();
    let mut fonts = ThemeFonts::default();

    loop {
        let event = reader
            .read_event()
            .with_context(|| format!("malformed theme at byte {}", reader.buffer_position()))?;

        match event {
            Event::Start(ref element) | Event::Empty(ref element) => {
                let local = element.local_name().as_ref().to_vec();
                if local.as_slice() == b"latin" {
                    let typeface = attr(element, b"typeface").filter(|t| !t.trim().is_empty());
                    if ends_with(&stack, &["majorFont"]) {
                        fonts.major = fonts.major.take().or(typeface);
                    } else if ends_with(&stack, &["minorFont"]) {
                        fonts.minor = fonts.minor.take().or(typeface);
                    }
                }
                if matches!(event, Event::Start(_)) {
                    stack.push(local);
                }
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(fonts)
}

/// Parse `docProps/app.xml` for the last rendered page count
pub fn parse_app_properties(xml: &str) -> Result<Option<u32>> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Stack = Vec::new();
    let mut pages = None;

    loop {
        let event = reader
            .read_event()
            .with_context(|| format!("malformed app.xml at byte {}", reader.buffer_position()))?;

        match event {
            Event::Start(ref element) => {
                stack.push(element.local_name().as_ref().to_vec());
            }
            Event::Text(ref text) if ends_with(&stack, &["Properties", "Pages"]) => {
                pages = text.unescape()?.trim().parse().ok();
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(pages)
}
