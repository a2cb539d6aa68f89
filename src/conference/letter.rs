//! Letter of Acceptance rendering.
//!
//! genpdf needs real font files for metrics, so a font directory must exist
//! either in `conference.font_dir` or in one of the usual system locations.

use std::path::Path;

use chrono::NaiveDateTime;
use genpdf::{elements, fonts, style, Alignment, Document, Element, SimplePageDecorator};
use thiserror::Error;

use crate::config::ConferenceConfig;

const SYSTEM_FONT_DIRS: [&str; 5] = [
    "/usr/share/fonts/truetype/liberation",
    "/usr/share/fonts/truetype/dejavu",
    "/usr/share/fonts/TTF",
    "/System/Library/Fonts/Supplemental",
    "/Library/Fonts",
];

const FONT_FAMILIES: [&str; 3] = ["LiberationSans", "DejaVuSans", "Arial"];

pub const LETTER_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Error)]
pub enum LetterError {
    #[error("No usable font family found (set conference.font_dir)")]
    FontsUnavailable,
    #[error("Failed to render letter: {0}")]
    Render(#[from] genpdf::error::Error),
    #[error("Letter rendering task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// What the letter says about one accepted submission.
#[derive(Debug, Clone)]
pub struct LetterDetails {
    pub submission_id: uuid::Uuid,
    pub title: String,
    pub authors: Vec<String>,
    pub presentation_type: String,
    pub approved_at: Option<NaiveDateTime>,
}

impl LetterDetails {
    pub fn filename(&self) -> String {
        format!("letter-of-acceptance-{}.pdf", self.submission_id)
    }
}

fn load_fonts(conference: &ConferenceConfig) -> Result<fonts::FontFamily<fonts::FontData>, LetterError> {
    conference
        .font_dir
        .iter()
        .map(String::as_str)
        .chain(SYSTEM_FONT_DIRS)
        .filter(|dir| Path::new(dir).exists())
        .find_map(|dir| {
            FONT_FAMILIES
                .iter()
                .find_map(|name| fonts::from_files(dir, name, None).ok())
        })
        .ok_or(LetterError::FontsUnavailable)
}

/// Renders the letter to PDF bytes.
pub fn render(conference: &ConferenceConfig, details: &LetterDetails) -> Result<Vec<u8>, LetterError> {
    let mut doc = Document::new(load_fonts(conference)?);
    doc.set_title(format!("Letter of Acceptance - {}", conference.name));

    let mut decorator = SimplePageDecorator::new();
    decorator.set_margins(20);
    doc.set_page_decorator(decorator);

    let date = details
        .approved_at
        .unwrap_or_else(|| chrono::Utc::now().naive_utc())
        .format("%B %d, %Y")
        .to_string();

    doc.push(
        elements::Paragraph::new(conference.name.as_str())
            .aligned(Alignment::Center)
            .styled(style::Style::new().bold().with_font_size(20)),
    );
    doc.push(
        elements::Paragraph::new("Letter of Acceptance")
            .aligned(Alignment::Center)
            .styled(style::Style::new().with_font_size(16)),
    );
    doc.push(elements::Break::new(1.5));
    doc.push(elements::Paragraph::new(date));
    doc.push(elements::Break::new(1.0));

    doc.push(elements::Paragraph::new("Dear authors,"));
    doc.push(elements::Break::new(0.5));
    doc.push(elements::Paragraph::new(format!(
        "We are pleased to confirm that your abstract has been accepted for {} presentation at {}:",
        details.presentation_type, conference.name
    )));
    doc.push(elements::Break::new(0.5));
    doc.push(
        elements::Paragraph::new(details.title.as_str())
            .styled(style::Style::new().bold().with_font_size(13)),
    );
    if !details.authors.is_empty() {
        doc.push(elements::Paragraph::new(details.authors.join(", ")).styled(style::Style::new().italic()));
    }
    doc.push(elements::Break::new(0.5));
    doc.push(elements::Paragraph::new(
        "Your registration payment has been received and verified.",
    ));
    doc.push(elements::Break::new(1.5));
    doc.push(elements::Paragraph::new("Sincerely,"));
    doc.push(elements::Paragraph::new(conference.signatory.as_str()));
    doc.push(elements::Break::new(1.0));
    doc.push(
        elements::Paragraph::new(format!("Reference: {}", details.submission_id))
            .styled(style::Style::new().with_font_size(8)),
    );

    let mut pdf = Vec::new();
    doc.render(&mut pdf)?;
    Ok(pdf)
}

/// Renders on the blocking pool; layout work is CPU bound.
pub async fn render_blocking(
    conference: &ConferenceConfig,
    details: &LetterDetails,
) -> Result<Vec<u8>, LetterError> {
    let conference = conference.clone();
    let details = details.clone();
    tokio::task::spawn_blocking(move || render(&conference, &details)).await?
}
