//! Archival document rendering
//!
//! The sweep hands a finished conversation to a `TranscriptRenderer` and
//! then checks that the document really exists before it deletes anything.
//! Both renderers produce the same layout: a title line, a `Transcript`
//! heading and one `name [HH:MM:SS] : text` entry per utterance.

use async_trait::async_trait;
use ivts_common::config::DocumentFormat;
use ivts_common::db::{Interview, SpeakerRole, TranscriptLine};
use ivts_common::{Error, Result};
use printpdf::{BuiltinFont, Mm, PdfDocument};
use std::path::Path;
use std::sync::Arc;

#[async_trait]
pub trait TranscriptRenderer: Send + Sync {
    /// File extension of produced documents (without the dot)
    fn extension(&self) -> &'static str;

    /// Write the document for `conversation` to `output`
    async fn render(
        &self,
        interview: &Interview,
        conversation: &[TranscriptLine],
        output: &Path,
    ) -> Result<()>;
}

/// Renderer for the configured archive format
pub fn renderer_for(format: DocumentFormat) -> Arc<dyn TranscriptRenderer> {
    match format {
        DocumentFormat::Pdf => Arc::new(PdfTranscriptRenderer),
        DocumentFormat::Text => Arc::new(TextTranscriptRenderer),
    }
}

/// Drop an `@domain` suffix from e-mail style user names
pub fn display_name(name: &str) -> &str {
    name.split('@').next().unwrap_or(name)
}

/// Display name of the first candidate line, if any
pub fn candidate_display_name(conversation: &[TranscriptLine]) -> Option<&str> {
    conversation
        .iter()
        .find(|line| line.speaker_role == SpeakerRole::Candidate)
        .map(|line| display_name(&line.speaker_name))
}

fn document_title(interview: &Interview, conversation: &[TranscriptLine]) -> String {
    format!(
        "Interview with {} - {} - Transcript",
        candidate_display_name(conversation).unwrap_or(&interview.id),
        interview.started_at.format("%Y-%m-%d")
    )
}

fn format_line(line: &TranscriptLine) -> String {
    format!(
        "{} [{}] : {}",
        display_name(&line.speaker_name),
        line.created_at.format("%H:%M:%S"),
        line.text
    )
}

/// Write beside the target and rename, so a crash never leaves half a document
async fn write_document(output: &Path, bytes: &[u8]) -> Result<()> {
    let write = async {
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = output.with_extension("partial");
        tokio::fs::write(&partial, bytes).await?;
        tokio::fs::rename(&partial, output).await
    };

    write
        .await
        .map_err(|e| Error::RenderFailure(format!("Failed to write {}: {}", output.display(), e)))
}

/// Plain-text transcript documents
#[derive(Debug, Default, Clone, Copy)]
pub struct TextTranscriptRenderer;

impl TextTranscriptRenderer {
    pub fn render_to_string(interview: &Interview, conversation: &[TranscriptLine]) -> String {
        let mut doc = format!(
            "{}\n\nTranscript\n\n",
            document_title(interview, conversation)
        );

        for line in conversation {
            doc.push_str(&format_line(line));
            doc.push('\n');
        }

        doc
    }
}

#[async_trait]
impl TranscriptRenderer for TextTranscriptRenderer {
    fn extension(&self) -> &'static str {
        "txt"
    }

    async fn render(
        &self,
        interview: &Interview,
        conversation: &[TranscriptLine],
        output: &Path,
    ) -> Result<()> {
        let document = Self::render_to_string(interview, conversation);
        write_document(output, document.as_bytes()).await
    }
}

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 15.0;
const TITLE_PT: f32 = 14.0;
const HEADING_PT: f32 = 12.0;
const BODY_PT: f32 = 10.0;
const BODY_LINE_MM: f32 = 6.0;
const ENTRY_GAP_MM: f32 = 2.0;
/// Characters per body row at 10pt Helvetica inside the margins
const WRAP_COLUMNS: usize = 95;
const PT_TO_MM: f32 = 0.3528;

/// Split `text` into rows of at most `columns` characters, breaking on
/// whitespace and hard-splitting words that are longer than a row
pub fn wrap_text(text: &str, columns: usize) -> Vec<String> {
    let columns = columns.max(1);
    let mut rows = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > columns {
            if !current.is_empty() {
                rows.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(columns);
            rows.push(word.into_iter().collect());
            word = rest;
        }

        let needed = if current.is_empty() { word.len() } else { current.chars().count() + 1 + word.len() };
        if needed > columns {
            rows.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }

    if !current.is_empty() || rows.is_empty() {
        rows.push(current);
    }
    rows
}

fn pdf_error(e: impl std::fmt::Display) -> Error {
    Error::RenderFailure(format!("PDF generation failed: {}", e))
}

/// A4 PDF transcript documents using the built-in Helvetica faces
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTranscriptRenderer;

impl PdfTranscriptRenderer {
    pub fn render_to_bytes(interview: &Interview, conversation: &[TranscriptLine]) -> Result<Vec<u8>> {
        let title = document_title(interview, conversation);

        let (doc, page, layer) = PdfDocument::new(
            title.as_str(),
            Mm(PAGE_WIDTH_MM),
            Mm(PAGE_HEIGHT_MM),
            "Transcript",
        );
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(pdf_error)?;
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(pdf_error)?;

        let mut current = doc.get_page(page).get_layer(layer);
        let mut y = PAGE_HEIGHT_MM - MARGIN_MM - 5.0;

        // Approximate centering: Helvetica averages half an em per glyph
        let title_width = title.chars().count() as f32 * TITLE_PT * 0.5 * PT_TO_MM;
        let title_x = ((PAGE_WIDTH_MM - title_width) / 2.0).max(MARGIN_MM);
        current.use_text(title.as_str(), TITLE_PT, Mm(title_x), Mm(y), &bold);
        y -= 15.0;

        current.use_text("Transcript", HEADING_PT, Mm(MARGIN_MM), Mm(y), &bold);
        y -= 15.0;

        for line in conversation {
            for row in wrap_text(&format_line(line), WRAP_COLUMNS) {
                if y < MARGIN_MM {
                    let (page, layer) =
                        doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Transcript");
                    current = doc.get_page(page).get_layer(layer);
                    y = PAGE_HEIGHT_MM - MARGIN_MM;
                }
                current.use_text(row, BODY_PT, Mm(MARGIN_MM), Mm(y), &regular);
                y -= BODY_LINE_MM;
            }
            y -= ENTRY_GAP_MM;
        }

        doc.save_to_bytes().map_err(pdf_error)
    }
}

#[async_trait]
impl TranscriptRenderer for PdfTranscriptRenderer {
    fn extension(&self) -> &'static str {
        "pdf"
    }

    async fn render(
        &self,
        interview: &Interview,
        conversation: &[TranscriptLine],
        output: &Path,
    ) -> Result<()> {
        let interview = interview.clone();
        let conversation = conversation.to_vec();

        // Layout is CPU-bound and the document handle is not Send
        let bytes = tokio::task::spawn_blocking(move || {
            Self::render_to_bytes(&interview, &conversation)
        })
        .await
        .map_err(|e| Error::RenderFailure(format!("PDF task failed: {}", e)))??;

        write_document(output, &bytes).await
    }
}
