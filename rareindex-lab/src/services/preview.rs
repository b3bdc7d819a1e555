//! DOCX preview generation
//!
//! DOCX -> HTML through `pandoc`, HTML reduced to text blocks, blocks laid
//! out on A4 pages with `printpdf`. The PDF lands next to the uploads as
//! `previews/<stem>_preview.pdf` and its path is written back to the row.
//! Failures are logged and never propagate to the save that triggered them.
//!
//! Text is set in an embedded TrueType font when one is available. The PDF
//! base fonts only cover WinAnsi, so without one, characters such as `ş`
//! or `ı` are folded to their closest Latin-1 form.

use crate::db::documents::{self, DocumentTable};
use rareindex_common::config::PreviewConfig;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use regex::Regex;
use sqlx::SqlitePool;
use std::borrow::Cow;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Subdirectory of the media root holding generated previews
pub const PREVIEW_DIR: &str = "previews";

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;

/// Unicode TrueType fonts tried when none is configured
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial Unicode.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("{0} {1} not found")]
    NotFound(&'static str, i64),

    #[error("Conversion failed: {0}")]
    Conversion(String),

    #[error("Invalid HTML pattern: {0}")]
    Html(#[from] regex::Error),

    #[error("PDF rendering failed: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Turns a source document into HTML
pub trait DocumentConverter: Send + Sync {
    fn to_html(&self, source: &Path) -> Result<String, PreviewError>;
}

/// Runs the external `pandoc` binary
pub struct PandocConverter {
    program: PathBuf,
}

impl PandocConverter {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("pandoc"),
        }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }
}

impl Default for PandocConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentConverter for PandocConverter {
    fn to_html(&self, source: &Path) -> Result<String, PreviewError> {
        let output = Command::new(&self.program)
            .arg(source)
            .args(["--from", "docx", "--to", "html", "--mathml"])
            .output()
            .map_err(|e| PreviewError::Conversion(format!("could not run {}: {}", self.program.display(), e)))?;

        if !output.status.success() {
            return Err(PreviewError::Conversion(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Text block extracted from converted HTML
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading(u8, String),
    Paragraph(String),
    ListItem(String),
    TableRow(String),
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Headings, paragraphs, list items and table rows, in document order
pub fn html_to_blocks(html: &str) -> Result<Vec<Block>, PreviewError> {
    let block_re = Regex::new(r"(?is)<(h[1-6]|p|li|tr)\b[^>]*>(.*?)</(?:h[1-6]|p|li|tr)>")?;
    let cell_end_re = Regex::new(r"(?i)</t[dh]>")?;
    let tag_re = Regex::new(r"<[^>]*>")?;
    let space_re = Regex::new(r"\s+")?;

    let mut blocks = Vec::new();
    for caps in block_re.captures_iter(html) {
        let tag = caps[1].to_ascii_lowercase();
        let inner = if tag == "tr" {
            cell_end_re.replace_all(&caps[2], " | ").into_owned()
        } else {
            caps[2].to_string()
        };
        let stripped = tag_re.replace_all(&inner, " ");
        let text = space_re.replace_all(&decode_entities(&stripped), " ").trim().to_string();
        let text = text.trim_end_matches('|').trim().to_string();
        if text.is_empty() {
            continue;
        }

        let block = match tag.as_str() {
            "p" => Block::Paragraph(text),
            "li" => Block::ListItem(text),
            "tr" => Block::TableRow(text),
            heading => Block::Heading(heading[1..].parse().unwrap_or(1), text),
        };
        blocks.push(block);
    }
    Ok(blocks)
}

fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.chars().count() + word.chars().count() + 1 > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Read the configured font, or the first system font found
pub fn load_font(configured: Option<&Path>) -> Option<Vec<u8>> {
    if let Some(path) = configured {
        match std::fs::read(path) {
            Ok(bytes) => {
                info!(font = %path.display(), "Preview font loaded");
                return Some(bytes);
            }
            Err(e) => warn!(font = %path.display(), error = %e, "Configured preview font unreadable"),
        }
    }

    for candidate in SYSTEM_FONTS {
        if let Ok(bytes) = std::fs::read(candidate) {
            info!(font = %candidate, "Preview font loaded");
            return Some(bytes);
        }
    }
    warn!("No Unicode font found, previews use the PDF base fonts");
    None
}

/// Map text onto what the PDF base fonts can show
///
/// Turkish letters missing from WinAnsi lose their diacritic, typographic
/// punctuation becomes ASCII, anything else outside Latin-1 becomes `?`.
/// Returns the text and the number of characters changed.
pub fn fold_to_base_font(text: &str) -> (Cow<'_, str>, usize) {
    let representable = |c: char| (' '..='~').contains(&c) || ('\u{a0}'..='\u{ff}').contains(&c);
    if text.chars().all(representable) {
        return (Cow::Borrowed(text), 0);
    }

    let mut out = String::with_capacity(text.len());
    let mut changed = 0;
    for c in text.chars() {
        if representable(c) {
            out.push(c);
            continue;
        }
        changed += 1;
        let folded = match c {
            'Ş' => "S",
            'ş' => "s",
            'Ğ' => "G",
            'ğ' => "g",
            'İ' => "I",
            'ı' => "i",
            '\u{2018}' | '\u{2019}' => "'",
            '\u{201c}' | '\u{201d}' => "\"",
            '\u{2013}' | '\u{2014}' | '\u{2022}' => "-",
            '\u{2026}' => "...",
            '\t' => " ",
            _ => "?",
        };
        out.push_str(folded);
    }
    (Cow::Owned(out), changed)
}

/// Writes lines top to bottom, opening a new page when the margin is reached
struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
    /// Base fonts in use: fold text to Latin-1
    fold: bool,
    folded: usize,
}

impl PageWriter {
    fn new(title: &str) -> Self {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
        let layer = doc.get_page(page).get_layer(layer);
        Self {
            doc,
            layer,
            y: PAGE_HEIGHT_MM - MARGIN_MM,
            fold: false,
            folded: 0,
        }
    }

    fn line(&mut self, text: &str, size: f32, indent: f32, font: &IndirectFontRef) {
        let height = size * 0.5;
        if self.y - height < MARGIN_MM {
            let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT_MM - MARGIN_MM;
        }
        if self.fold {
            let (text, changed) = fold_to_base_font(text);
            self.folded += changed;
            self.layer.use_text(text, size, Mm(MARGIN_MM + indent), Mm(self.y), font);
        } else {
            self.layer.use_text(text, size, Mm(MARGIN_MM + indent), Mm(self.y), font);
        }
        self.y -= height;
    }

    fn gap(&mut self, mm: f32) {
        self.y -= mm;
    }
}

fn builtin(doc: &PdfDocumentReference, font: BuiltinFont) -> Result<IndirectFontRef, PreviewError> {
    doc.add_builtin_font(font)
        .map_err(|e| PreviewError::Render(format!("font: {e}")))
}

/// Lay blocks out on A4 pages
///
/// `font` is a TrueType file embedded for every style; headings are set
/// larger rather than bold. An unusable font falls back to the base fonts.
pub fn render_pdf(title: &str, blocks: &[Block], font: Option<&[u8]>) -> Result<Vec<u8>, PreviewError> {
    let mut writer = PageWriter::new(title);
    let embedded = match font {
        Some(bytes) => match writer.doc.add_external_font(bytes) {
            Ok(font) => Some(font),
            Err(e) => {
                warn!(error = %e, "Preview font rejected, using base fonts");
                None
            }
        },
        None => None,
    };
    let (font, bold, mono) = match embedded {
        Some(font) => (font.clone(), font.clone(), font),
        None => {
            writer.fold = true;
            (
                builtin(&writer.doc, BuiltinFont::Helvetica)?,
                builtin(&writer.doc, BuiltinFont::HelveticaBold)?,
                builtin(&writer.doc, BuiltinFont::Courier)?,
            )
        }
    };

    for block in blocks {
        match block {
            Block::Heading(level, text) => {
                let size = if *level <= 1 { 14.0 } else { 12.0 };
                writer.gap(2.0);
                for line in wrap_text(text, 70) {
                    writer.line(&line, size, 0.0, &bold);
                }
                writer.gap(1.5);
            }
            Block::Paragraph(text) => {
                for line in wrap_text(text, 95) {
                    writer.line(&line, 9.0, 0.0, &font);
                }
                writer.gap(2.0);
            }
            Block::ListItem(text) => {
                for (i, line) in wrap_text(text, 90).into_iter().enumerate() {
                    let line = if i == 0 { format!("- {}", line) } else { format!("  {}", line) };
                    writer.line(&line, 9.0, 5.0, &font);
                }
            }
            Block::TableRow(text) => {
                for line in wrap_text(text, 100) {
                    writer.line(&line, 8.0, 0.0, &mono);
                }
            }
        }
    }

    if writer.folded > 0 {
        warn!(
            document = %title,
            characters = writer.folded,
            "Characters outside the base fonts were substituted; set preview.font"
        );
    }

    let mut buf = BufWriter::new(Vec::new());
    writer
        .doc
        .save(&mut buf)
        .map_err(|e| PreviewError::Render(format!("save: {e}")))?;
    buf.into_inner()
        .map_err(|e| PreviewError::Render(format!("buffer: {e}")))
}

/// Counts from a bulk preview run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviewRunSummary {
    pub generated: usize,
    pub failed: usize,
}

pub struct PreviewService {
    pool: SqlitePool,
    media_dir: PathBuf,
    converter: Arc<dyn DocumentConverter>,
    font: Option<Arc<Vec<u8>>>,
}

impl PreviewService {
    pub fn new(pool: SqlitePool, media_dir: PathBuf, converter: Arc<dyn DocumentConverter>) -> Self {
        Self {
            pool,
            media_dir,
            converter,
            font: None,
        }
    }

    /// `pandoc` from the configured program, font from [`load_font`]
    pub fn from_config(pool: SqlitePool, media_dir: PathBuf, config: &PreviewConfig) -> Self {
        let converter = match &config.pandoc {
            Some(program) => PandocConverter::with_program(program),
            None => PandocConverter::new(),
        };
        let service = Self::new(pool, media_dir, Arc::new(converter));
        match load_font(config.font.as_deref()) {
            Some(font) => service.with_font(font),
            None => service,
        }
    }

    /// Embed this TrueType font in every preview
    pub fn with_font(mut self, font: Vec<u8>) -> Self {
        self.font = Some(Arc::new(font));
        self
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    /// Generate a preview if the row needs one; errors are logged and swallowed
    ///
    /// Returns the stored preview path when one was written.
    pub async fn generate(&self, table: DocumentTable, id: i64) -> Option<String> {
        match self.try_generate(table, id).await {
            Ok(path) => path,
            Err(e) => {
                error!(table = table.table(), id, error = %e, "Preview generation failed");
                None
            }
        }
    }

    /// `Ok(None)` when there is nothing to do: preview already present, no
    /// source file, or a source that is not DOCX
    pub async fn try_generate(&self, table: DocumentTable, id: i64) -> Result<Option<String>, PreviewError> {
        let paths = documents::document_paths(&self.pool, table, id)
            .await?
            .ok_or(PreviewError::NotFound(table.table(), id))?;

        if paths.preview_path.as_deref().is_some_and(|p| !p.is_empty()) {
            debug!(table = table.table(), id, "Preview already present");
            return Ok(None);
        }
        let Some(file_path) = paths.file_path.filter(|p| !p.is_empty()) else {
            return Ok(None);
        };
        if !file_path.to_ascii_lowercase().ends_with(".docx") {
            return Ok(None);
        }

        let source = self.media_dir.join(&file_path);
        let converter = Arc::clone(&self.converter);
        let html = tokio::task::spawn_blocking(move || converter.to_html(&source))
            .await
            .map_err(|e| PreviewError::Conversion(e.to_string()))??;

        let stem = Path::new(&file_path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("document_{}", id));
        let blocks = html_to_blocks(&html)?;
        let pdf = render_pdf(&stem, &blocks, self.font.as_deref().map(Vec::as_slice))?;

        let preview_dir = self.media_dir.join(PREVIEW_DIR);
        tokio::fs::create_dir_all(&preview_dir).await?;
        let mut file_name = format!("{}_preview.pdf", stem);
        if preview_dir.join(&file_name).exists() {
            file_name = format!("{}_preview_{}.pdf", stem, id);
        }
        tokio::fs::write(preview_dir.join(&file_name), pdf).await?;

        let relative = format!("{}/{}", PREVIEW_DIR, file_name);
        documents::set_preview_path(&self.pool, table, id, &relative).await?;
        info!(table = table.table(), id, preview = %relative, blocks = blocks.len(), "Generated preview");
        Ok(Some(relative))
    }

    /// Previews for every report and request form still missing one
    pub async fn generate_missing(&self) -> Result<PreviewRunSummary, PreviewError> {
        let mut summary = PreviewRunSummary::default();
        for table in DocumentTable::ALL {
            let ids = documents::documents_missing_preview(&self.pool, table).await?;
            info!(table = table.table(), count = ids.len(), "Documents needing preview");
            for id in ids {
                match self.try_generate(table, id).await {
                    Ok(Some(_)) => summary.generated += 1,
                    Ok(None) => {}
                    Err(e) => {
                        error!(table = table.table(), id, error = %e, "Preview generation failed");
                        summary.failed += 1;
                    }
                }
            }
        }
        Ok(summary)
    }
}
