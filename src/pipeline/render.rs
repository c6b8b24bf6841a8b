//! One record → one single-page PDF drawn over the background form.
//!
//! ## Why build the PDF by hand?
//!
//! A note is one image plus thirteen short strings. lopdf lets us emit
//! exactly that: a Flate-compressed RGB image XObject stretched over the
//! page, and a text block in the standard Helvetica font, which viewers
//! provide themselves so nothing needs embedding. The image is compressed
//! once per batch in [`Template`] and shared by every job.
//!
//! Rendering is synchronous and CPU-bound; the orchestrator runs it on the
//! blocking pool.

use crate::error::{BatchError, RenderJobError};
use crate::output::Artifact;
use crate::pipeline::layout::{self, PlacedText, LAYOUT_VERSION, PAGE_HEIGHT, PAGE_WIDTH};
use crate::pipeline::normalize::NormalizedRecord;
use crate::pipeline::text::{self, ASCENT, LINE_HEIGHT};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use std::fmt;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const FONT_NAME: &str = "F1";
const IMAGE_NAME: &str = "Im1";

// ── Template ─────────────────────────────────────────────────────────────────

/// The background form, decoded and compressed once per batch.
#[derive(Clone)]
pub struct Template {
    width: u32,
    height: u32,
    /// Zlib-compressed 8-bit RGB samples.
    data: Vec<u8>,
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("compressed_bytes", &self.data.len())
            .finish()
    }
}

impl Template {
    /// Load and compress the image at `path`.
    ///
    /// # Errors
    /// - [`BatchError::TemplateMissing`] if `path` is not a file
    /// - [`BatchError::TemplateUnreadable`] if it cannot be read or decoded
    pub fn load(path: &Path) -> Result<Self, BatchError> {
        if !path.is_file() {
            return Err(BatchError::TemplateMissing {
                path: path.to_path_buf(),
            });
        }

        let unreadable = |detail: String| BatchError::TemplateUnreadable {
            path: path.to_path_buf(),
            detail,
        };

        let bytes = std::fs::read(path).map_err(|e| unreadable(e.to_string()))?;
        let image = image::load_from_memory(&bytes).map_err(|e| unreadable(e.to_string()))?;
        let template = Self::from_image(&image).map_err(|e| unreadable(e.to_string()))?;

        debug!(
            "Template loaded: {} ({}x{} px, {} bytes compressed)",
            path.display(),
            template.width,
            template.height,
            template.data.len()
        );
        Ok(template)
    }

    /// Compress an already decoded image. Alpha is discarded.
    pub fn from_image(image: &DynamicImage) -> std::io::Result<Self> {
        let rgb = image.to_rgb8();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(rgb.as_raw())?;
        Ok(Self {
            width: rgb.width(),
            height: rgb.height(),
            data: encoder.finish()?,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The image as a PDF XObject stream.
    fn xobject(&self) -> Stream {
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => self.width as i64,
                "Height" => self.height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            self.data.clone(),
        )
        // Already deflated; `Document::compress` must leave it alone.
        .with_compression(false)
    }
}

// ── Jobs ─────────────────────────────────────────────────────────────────────

/// One note to render.
#[derive(Debug, Clone)]
pub struct RenderJob {
    /// 1-based sequence index (row order).
    pub index: usize,
    pub record: NormalizedRecord,
    pub template: Arc<Template>,
}

/// Render `job` and write it to `dest` atomically.
///
/// The PDF is written to a temp file next to `dest` and renamed into place,
/// so a failed job never leaves a partial `usuario_N.pdf`.
pub fn render_document(
    job: &RenderJob,
    dest: &Path,
    font_size: f32,
) -> Result<Artifact, RenderJobError> {
    let mut doc = build_document(job, font_size)?;

    let write_err = |e: &dyn fmt::Display| RenderJobError::Write {
        index: job.index,
        path: dest.to_path_buf(),
        detail: e.to_string(),
    };

    let dir = dest
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| write_err(&e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        doc.save_to(&mut writer).map_err(|e| write_err(&e))?;
        writer.flush().map_err(|e| write_err(&e))?;
    }
    let bytes = tmp
        .as_file()
        .metadata()
        .map_err(|e| write_err(&e))?
        .len();
    tmp.persist(dest).map_err(|e| write_err(&e.error))?;

    debug!("Note {} written: {} ({} bytes)", job.index, dest.display(), bytes);
    Ok(Artifact {
        index: job.index,
        path: dest.to_path_buf(),
        bytes,
    })
}

/// Render `job` into memory.
pub fn render_to_bytes(job: &RenderJob, font_size: f32) -> Result<Vec<u8>, RenderJobError> {
    let mut doc = build_document(job, font_size)?;
    let mut buf = Vec::new();
    doc.save_to(&mut buf).map_err(|e| RenderJobError::Encode {
        index: job.index,
        detail: e.to_string(),
    })?;
    Ok(buf)
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn build_document(job: &RenderJob, font_size: f32) -> Result<Document, RenderJobError> {
    let placed = layout::resolve(&job.record, layout::PROMISSORY_NOTE_LAYOUT);

    let mut operations = background_operations();
    operations.extend(text_operations(&placed, font_size));
    let content = Content { operations }
        .encode()
        .map_err(|e| RenderJobError::Encode {
            index: job.index,
            detail: e.to_string(),
        })?;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let image_id = doc.add_object(job.template.xobject());
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(PAGE_WIDTH),
            Object::Real(PAGE_HEIGHT),
        ],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { FONT_NAME => font_id },
            "XObject" => dictionary! { IMAGE_NAME => image_id },
        },
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let info_id = doc.add_object(dictionary! {
        "Title" => pdf_string(&format!("Nota promissória {}", job.index)),
        "Producer" => pdf_string(concat!("promissoria ", env!("CARGO_PKG_VERSION"))),
        "LayoutVersion" => pdf_string(LAYOUT_VERSION),
    });
    doc.trailer.set("Info", info_id);

    doc.compress();
    Ok(doc)
}

/// Stretch the template over the whole page.
fn background_operations() -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                Object::Real(PAGE_WIDTH),
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(PAGE_HEIGHT),
                Object::Integer(0),
                Object::Integer(0),
            ],
        ),
        Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]
}

/// Wrap and position every placement. One `Tm` + `Tj` per line.
fn text_operations(placed: &[PlacedText], font_size: f32) -> Vec<Operation> {
    let mut ops = vec![
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(FONT_NAME.as_bytes().to_vec()), Object::Real(font_size)],
        ),
    ];

    let line_height = LINE_HEIGHT * font_size;
    for p in placed {
        for (i, line) in text::wrap_text(&p.text, p.width, font_size)
            .iter()
            .enumerate()
        {
            if line.is_empty() {
                continue;
            }
            let baseline = p.y + i as f32 * line_height + ASCENT * font_size;
            ops.push(Operation::new(
                "Tm",
                vec![
                    Object::Integer(1),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(1),
                    Object::Real(p.x),
                    Object::Real(PAGE_HEIGHT - baseline),
                ],
            ));
            ops.push(Operation::new(
                "Tj",
                vec![Object::String(text::encode_winansi(line), StringFormat::Literal)],
            ));
        }
    }

    ops.push(Operation::new("ET", vec![]));
    ops
}

fn pdf_string(s: &str) -> Object {
    Object::String(text::encode_winansi(s), StringFormat::Literal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::normalize::{normalize, placeholders};
    use crate::pipeline::parse::{CellValue, RawRecord};
    use image::{Rgb, RgbImage};

    fn template() -> Arc<Template> {
        let img = RgbImage::from_pixel(4, 6, Rgb([250, 250, 240]));
        Arc::new(Template::from_image(&DynamicImage::ImageRgb8(img)).unwrap())
    }

    fn job(index: usize, record: RawRecord) -> RenderJob {
        RenderJob {
            index,
            record: normalize(&record),
            template: template(),
        }
    }

    fn shown_text(pdf: &[u8]) -> Vec<String> {
        let mut doc = Document::load_mem(pdf).unwrap();
        doc.decompress();
        let page_id = *doc.get_pages().values().next().unwrap();
        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        content
            .operations
            .iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| match op.operands.first() {
                Some(Object::String(bytes, _)) => Some(bytes.iter().map(|&b| b as char).collect()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn blank_record_renders_placeholders() {
        let pdf = render_to_bytes(&job(1, RawRecord::default()), 12.0).unwrap();
        let lines = shown_text(&pdf);
        let count = |s: &str| lines.iter().filter(|l| l.as_str() == s).count();

        assert_eq!(count(placeholders::ID), 1);
        assert_eq!(count(&format!("R$ {}", placeholders::AMOUNT)), 1);
        assert_eq!(count(placeholders::PAYEE_NAME), 1);
        assert_eq!(count(placeholders::PAYMENT_CITY), 1);
        assert_eq!(count(placeholders::ISSUER_NAME), 1);
        assert_eq!(
            count(&format!(
                "ou à sua ordem, a quantia de {}",
                placeholders::AMOUNT_IN_WORDS
            )),
            1
        );
        // Due date and issue date.
        assert_eq!(count(placeholders::DATE), 2);
        // Payee and issuer tax ids.
        assert_eq!(count(placeholders::TAX_ID), 2);
        // Issuer address and the signature line share the same run.
        assert_eq!(count(placeholders::ISSUER_ADDRESS), 2);
        assert_eq!(count("Ass. do Emitente"), 1);
        assert_eq!(lines.len(), 13);
    }

    #[test]
    fn page_is_a4_single_page() {
        let pdf = render_to_bytes(&job(1, RawRecord::default()), 12.0).unwrap();
        let doc = Document::load_mem(&pdf).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
        let page = doc.get_dictionary(*pages.values().next().unwrap()).unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        let w = media_box[2].as_float().unwrap();
        let h = media_box[3].as_float().unwrap();
        assert!((w - 595.28).abs() < 0.01 && (h - 841.89).abs() < 0.01);
    }

    #[test]
    fn long_words_line_wraps_within_400pt() {
        let mut raw = RawRecord::default();
        raw.insert("Valor", CellValue::Text("2500.50".into()));
        let lines = shown_text(&render_to_bytes(&job(1, raw), 12.0).unwrap());
        let first = lines
            .iter()
            .position(|l| l.starts_with("ou à sua ordem"))
            .unwrap();
        assert_eq!(
            format!("{} {}", lines[first], lines[first + 1]),
            "ou à sua ordem, a quantia de dois mil e quinhentos reais e cinquenta centavos"
        );
    }

    #[test]
    fn render_document_writes_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("usuario_3.pdf");
        let artifact = render_document(&job(3, RawRecord::default()), &dest, 12.0).unwrap();

        assert_eq!(artifact.index, 3);
        assert_eq!(artifact.path, dest);
        assert_eq!(artifact.bytes, std::fs::metadata(&dest).unwrap().len());
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("usuario_3.pdf")]);
    }

    #[test]
    fn failed_write_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("usuario_1.pdf");
        std::fs::create_dir(&dest).unwrap();

        let err = render_document(&job(1, RawRecord::default()), &dest, 12.0).unwrap_err();
        assert!(matches!(err, RenderJobError::Write { index: 1, .. }));
        // Only the blocking directory remains; the temp file was removed.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_template_is_reported() {
        let err = Template::load(Path::new("/nonexistent/form.png")).unwrap_err();
        assert!(matches!(err, BatchError::TemplateMissing { .. }));
    }

    #[test]
    fn undecodable_template_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("form.png");
        std::fs::write(&path, b"not a png").unwrap();
        let err = Template::load(&path).unwrap_err();
        assert!(matches!(err, BatchError::TemplateUnreadable { .. }));
    }
}
