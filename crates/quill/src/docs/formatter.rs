//! Edit-batch builders for headings and body paragraphs.
//!
//! Nothing here touches the network. Each builder returns the requests that
//! insert one paragraph at a given index and style it; callers concatenate
//! them into a single batch and advance their own cursor by
//! [`inserted_units`].

use super::model::{
    Alignment, Dimension, DocumentStyle, ParagraphStyle, Range, Request, STYLE_HEADING_1,
    STYLE_HEADING_2, STYLE_HEADING_3, STYLE_NORMAL, STYLE_TITLE, TextStyle,
    UpdateDocumentStyleRequest, UpdateParagraphStyleRequest, UpdateTextStyleRequest,
    WeightedFontFamily, utf16_len,
};
use std::fmt;
use std::str::FromStr;

const POINTS_PER_CM: f64 = 28.35;

const TEXT_STYLE_FIELDS: &str = "bold,fontSize,weightedFontFamily";
const PARAGRAPH_STYLE_FIELDS: &str =
    "namedStyleType,alignment,lineSpacing,indentFirstLine,spaceAbove,spaceBelow";
const DOCUMENT_STYLE_FIELDS: &str = "marginTop,marginBottom,marginLeft,marginRight";

/// Formatting preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatStyle {
    /// Brazilian academic norm: Times New Roman 12pt, justified, 1.5 line
    /// spacing, 3/2/3/2 cm margins.
    #[default]
    Abnt,
    /// APA: Arial 11pt, left-aligned, double spacing, 2.54 cm margins.
    Apa,
}

impl fmt::Display for FormatStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatStyle::Abnt => write!(f, "abnt"),
            FormatStyle::Apa => write!(f, "apa"),
        }
    }
}

impl FromStr for FormatStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abnt" => Ok(FormatStyle::Abnt),
            "apa" => Ok(FormatStyle::Apa),
            other => Err(format!("unknown style '{other}' (expected abnt or apa)")),
        }
    }
}

struct Preset {
    font_family: &'static str,
    font_size: f64,
    title_size: f64,
    body_alignment: Alignment,
    line_spacing: f64,
    first_line_indent: f64,
    /// Top, bottom, left, right, in centimetres.
    margins_cm: [f64; 4],
}

impl FormatStyle {
    fn preset(self) -> Preset {
        match self {
            FormatStyle::Abnt => Preset {
                font_family: "Times New Roman",
                font_size: 12.0,
                title_size: 14.0,
                body_alignment: Alignment::Justified,
                line_spacing: 150.0,
                first_line_indent: 35.4,
                margins_cm: [3.0, 2.0, 3.0, 2.0],
            },
            FormatStyle::Apa => Preset {
                font_family: "Arial",
                font_size: 11.0,
                title_size: 14.0,
                body_alignment: Alignment::Start,
                line_spacing: 200.0,
                first_line_indent: 36.0,
                margins_cm: [2.54; 4],
            },
        }
    }
}

/// Builds styled insert batches under one [`FormatStyle`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AcademicFormatter {
    style: FormatStyle,
}

impl AcademicFormatter {
    pub fn new(style: FormatStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> FormatStyle {
        self.style
    }

    /// Page margins for the preset.
    pub fn document_style(&self) -> Vec<Request> {
        let [top, bottom, left, right] = self.style.preset().margins_cm;
        let cm = |v: f64| Some(Dimension::pt(v * POINTS_PER_CM));
        vec![Request::UpdateDocumentStyle(UpdateDocumentStyleRequest {
            document_style: DocumentStyle {
                margin_top: cm(top),
                margin_bottom: cm(bottom),
                margin_left: cm(left),
                margin_right: cm(right),
            },
            fields: DOCUMENT_STYLE_FIELDS.to_string(),
        })]
    }

    /// A heading paragraph at `index`.
    ///
    /// Level 0 is the document title (centered, larger, bold). Level 1 is
    /// upper-cased and bold, level 2 bold in original case, deeper levels
    /// plain weight.
    pub fn heading(&self, text: &str, level: u8, index: i64) -> Vec<Request> {
        let preset = self.style.preset();
        let text = match level {
            1 => text.to_uppercase(),
            _ => text.to_string(),
        };
        let (named, alignment, size, bold) = match level {
            0 => (STYLE_TITLE, Alignment::Center, preset.title_size, true),
            1 => (STYLE_HEADING_1, Alignment::Start, preset.font_size, true),
            2 => (STYLE_HEADING_2, Alignment::Start, preset.font_size, true),
            _ => (STYLE_HEADING_3, Alignment::Start, preset.font_size, false),
        };
        let paragraph_style = ParagraphStyle {
            named_style_type: Some(named.to_string()),
            alignment: Some(alignment),
            line_spacing: Some(preset.line_spacing),
            indent_first_line: Some(Dimension::pt(0.0)),
            space_above: Some(Dimension::pt(12.0)),
            space_below: Some(Dimension::pt(12.0)),
        };
        let text_style = TextStyle {
            bold: Some(bold),
            font_size: Some(Dimension::pt(size)),
            weighted_font_family: Some(WeightedFontFamily {
                font_family: preset.font_family.to_string(),
            }),
        };
        styled_paragraph(&text, index, text_style, paragraph_style)
    }

    /// A body paragraph at `index`.
    pub fn paragraph(&self, text: &str, index: i64) -> Vec<Request> {
        let preset = self.style.preset();
        let paragraph_style = ParagraphStyle {
            named_style_type: Some(STYLE_NORMAL.to_string()),
            alignment: Some(preset.body_alignment),
            line_spacing: Some(preset.line_spacing),
            indent_first_line: Some(Dimension::pt(preset.first_line_indent)),
            space_above: Some(Dimension::pt(0.0)),
            space_below: Some(Dimension::pt(0.0)),
        };
        let text_style = TextStyle {
            bold: Some(false),
            font_size: Some(Dimension::pt(preset.font_size)),
            weighted_font_family: Some(WeightedFontFamily {
                font_family: preset.font_family.to_string(),
            }),
        };
        styled_paragraph(text, index, text_style, paragraph_style)
    }
}

/// Insert `text + "\n"` at `index`, style the run, style the paragraph.
/// An empty run-style range is rejected by the service, so empty text gets
/// no run-style request.
fn styled_paragraph(
    text: &str,
    index: i64,
    text_style: TextStyle,
    paragraph_style: ParagraphStyle,
) -> Vec<Request> {
    let len = utf16_len(text);
    let mut requests = vec![Request::insert_text(index, format!("{text}\n"))];
    if len > 0 {
        requests.push(Request::UpdateTextStyle(UpdateTextStyleRequest {
            range: Range {
                start_index: index,
                end_index: index + len,
            },
            text_style,
            fields: TEXT_STYLE_FIELDS.to_string(),
        }));
    }
    requests.push(Request::UpdateParagraphStyle(UpdateParagraphStyleRequest {
        range: Range {
            start_index: index,
            end_index: index + len + 1,
        },
        paragraph_style,
        fields: PARAGRAPH_STYLE_FIELDS.to_string(),
    }));
    requests
}

/// Total UTF-16 units inserted by `requests`.
pub fn inserted_units(requests: &[Request]) -> i64 {
    requests
        .iter()
        .map(|r| match r {
            Request::InsertText(insert) => utf16_len(&insert.text),
            _ => 0,
        })
        .sum()
}
