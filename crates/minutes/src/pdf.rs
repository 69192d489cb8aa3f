//! Renders minutes to PDF with `printpdf`. The reference repo hand-rolls raw
//! PDF bytes in `export/pdf.rs`; this crate instead uses `printpdf`'s
//! standard-14 builtin fonts (Helvetica/Helvetica-Bold), which render text
//! without requiring any embedded TTF asset on disk — unlike the higher-level
//! `genpdf` layout crate the reference repo declares but never activates,
//! which requires loading font files it never ships.

use std::io::{BufWriter, Cursor};

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};

use sfuctl_transcription::TranscriptChunk;

const PAGE_WIDTH_MM: f64 = 210.0;
const PAGE_HEIGHT_MM: f64 = 297.0;
const MARGIN_MM: f64 = 15.0;
const BODY_FONT_SIZE: f64 = 11.0;
const HEADING_FONT_SIZE: f64 = 15.0;
const LINE_HEIGHT_MM: f64 = 5.5;
const CHARS_PER_LINE: usize = 95;

struct Layout {
    doc: PdfDocumentReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    layer: PdfLayerReference,
    cursor_y: f64,
}

impl Layout {
    fn new(title: &str) -> anyhow::Result<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
        let regular = doc.add_builtin_font(BuiltinFont::Helvetica)?;
        let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self { doc, regular, bold, layer, cursor_y: PAGE_HEIGHT_MM - MARGIN_MM })
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.cursor_y = PAGE_HEIGHT_MM - MARGIN_MM;
    }

    fn ensure_room(&mut self) {
        if self.cursor_y <= MARGIN_MM {
            self.new_page();
        }
    }

    fn heading(&mut self, text: &str) {
        self.ensure_room();
        self.layer.use_text(text, HEADING_FONT_SIZE, Mm(MARGIN_MM), Mm(self.cursor_y), &self.bold);
        self.cursor_y -= LINE_HEIGHT_MM * 1.5;
    }

    fn paragraph(&mut self, text: &str) {
        for line in wrap_text(text, CHARS_PER_LINE) {
            self.ensure_room();
            self.layer.use_text(&line, BODY_FONT_SIZE, Mm(MARGIN_MM), Mm(self.cursor_y), &self.regular);
            self.cursor_y -= LINE_HEIGHT_MM;
        }
    }

    fn gap(&mut self) {
        self.cursor_y -= LINE_HEIGHT_MM;
    }

    fn into_bytes(self) -> anyhow::Result<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        self.doc.save(&mut BufWriter::new(&mut buf))?;
        Ok(buf.into_inner())
    }
}

/// Greedy word-wrap at a fixed column width; printpdf has no built-in
/// layout engine, so the minutes body is wrapped before each `use_text` call.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
        } else if current.len() + 1 + word.len() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

pub fn render_minutes_pdf(room_id: &str, summary: &str, transcript: &[TranscriptChunk]) -> anyhow::Result<Vec<u8>> {
    let mut layout = Layout::new(&format!("Minutes — {room_id}"))?;

    layout.heading(&format!("Meeting Minutes: {room_id}"));
    layout.gap();

    layout.heading("Summary");
    layout.paragraph(if summary.trim().is_empty() { "(no summary available)" } else { summary });
    layout.gap();

    layout.heading("Transcript");
    if transcript.is_empty() {
        layout.paragraph("(no transcript captured)");
    } else {
        for chunk in transcript {
            let speaker = chunk.speaker.as_deref().unwrap_or("unknown");
            let line = format!("[{}] {}: {}", format_ms(chunk.start_ms), speaker, chunk.text);
            layout.paragraph(&line);
        }
    }

    layout.into_bytes()
}

fn format_ms(ms: i64) -> String {
    let total_secs = ms.max(0) / 1000;
    let minutes = total_secs / 60;
    let seconds = total_secs % 60;
    format!("{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_non_empty_pdf_bytes() {
        let chunks = vec![TranscriptChunk {
            start_ms: 0,
            end_ms: 1000,
            text: "hello there".to_string(),
            speaker: Some("alice@x.y".to_string()),
        }];
        let bytes = render_minutes_pdf("r1", "A short summary.", &chunks).expect("render should succeed");
        assert!(!bytes.is_empty());
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn renders_with_empty_transcript_and_summary() {
        let bytes = render_minutes_pdf("r1", "", &[]).expect("render should succeed");
        assert!(!bytes.is_empty());
    }

    #[test]
    fn wrap_text_respects_width() {
        let text = "word ".repeat(50);
        let lines = wrap_text(&text, 20);
        assert!(lines.iter().all(|l| l.len() <= 20 || !l.contains(' ')));
    }
}
