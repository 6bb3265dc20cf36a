//! PDF page rendering for vision OCR.
//!
//! The default renderer does not rasterize page content; it pulls the
//! embedded scan image out of each page, which is how scanned documents
//! arriving in a document archive are structured: one full-page image
//! XObject per page. Vector-only PDFs fail to render and the processor
//! falls back to the text the document service extracted.

use std::sync::Mutex;

use image::ImageOutputFormat;
use lopdf::{Object, ObjectId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("could not parse PDF: {0}")]
    Pdf(String),

    #[error("could not decode page image: {0}")]
    Image(String),
}

/// Renders the pages of an original document into PNG images.
pub trait PageRenderer: Send + Sync {
    fn page_count(&self, pdf: &[u8]) -> Result<usize, RenderError>;

    /// All pages, in order. Any page that cannot produce an image fails
    /// the whole render; the caller degrades to service-extracted text.
    fn render_pages(&self, pdf: &[u8]) -> Result<Vec<Vec<u8>>, RenderError>;
}

/// Renderer extracting each page's largest embedded image XObject.
pub struct EmbeddedImageRenderer;

impl PageRenderer for EmbeddedImageRenderer {
    fn page_count(&self, pdf: &[u8]) -> Result<usize, RenderError> {
        let doc = load_pdf(pdf)?;
        Ok(doc.page_iter().count())
    }

    fn render_pages(&self, pdf: &[u8]) -> Result<Vec<Vec<u8>>, RenderError> {
        let doc = load_pdf(pdf)?;
        let page_ids: Vec<ObjectId> = doc.page_iter().collect();

        let mut pages = Vec::with_capacity(page_ids.len());
        for (index, page_id) in page_ids.iter().enumerate() {
            let image_bytes = largest_page_image(&doc, *page_id).map_err(|e| {
                RenderError::Pdf(format!("page {}: {e}", index + 1))
            })?;
            pages.push(reencode_png(&image_bytes)?);
        }

        tracing::debug!(pages = pages.len(), "rendered document pages");
        Ok(pages)
    }
}

fn load_pdf(pdf: &[u8]) -> Result<lopdf::Document, RenderError> {
    lopdf::Document::load_mem(pdf).map_err(|e| RenderError::Pdf(e.to_string()))
}

/// The largest image XObject on a page is taken to be the page scan.
fn largest_page_image(
    doc: &lopdf::Document,
    page_id: ObjectId,
) -> Result<Vec<u8>, RenderError> {
    let page = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|e| RenderError::Pdf(format!("page object: {e}")))?;

    let resources = dict_entry(doc, page, b"Resources")?;
    let xobjects = dict_entry(doc, resources, b"XObject")?;

    let mut largest: Option<Vec<u8>> = None;
    for (_name, entry) in xobjects.iter() {
        let stream = match deref(doc, entry) {
            Object::Stream(s) => s,
            _ => continue,
        };
        if !matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Image") {
            continue;
        }
        let bytes = image_stream_bytes(stream)?;
        if largest.as_ref().map_or(true, |prev| bytes.len() > prev.len()) {
            largest = Some(bytes);
        }
    }

    largest.ok_or_else(|| RenderError::Pdf("no embedded page image".into()))
}

/// Image bytes out of a PDF stream. DCTDecode streams are raw JPEG;
/// everything else is decompressed and must decode as a complete image
/// or as raw grayscale/RGB pixel rows.
fn image_stream_bytes(stream: &lopdf::Stream) -> Result<Vec<u8>, RenderError> {
    let content = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    if has_dct_filter(&stream.dict) || image::load_from_memory(&content).is_ok() {
        return Ok(content);
    }

    raw_pixels_to_image(&stream.dict, &content)
}

fn has_dct_filter(dict: &lopdf::Dictionary) -> bool {
    match dict.get(b"Filter") {
        Ok(Object::Name(n)) => n == b"DCTDecode",
        Ok(Object::Array(filters)) => filters
            .iter()
            .any(|f| matches!(f, Object::Name(n) if n == b"DCTDecode")),
        _ => false,
    }
}

/// Rebuild an image from raw pixel rows using /Width, /Height and the
/// declared color space. Grayscale and RGB cover scanner output.
fn raw_pixels_to_image(
    dict: &lopdf::Dictionary,
    pixels: &[u8],
) -> Result<Vec<u8>, RenderError> {
    let width = dict_int(dict, b"Width")? as u32;
    let height = dict_int(dict, b"Height")? as u32;

    let channels: u32 = match dict.get(b"ColorSpace") {
        Ok(Object::Name(n)) if n == b"DeviceGray" => 1,
        _ => 3,
    };

    let expected = (width * height * channels) as usize;
    if pixels.len() < expected {
        return Err(RenderError::Image(format!(
            "pixel buffer holds {} bytes, {}x{}x{} needs {expected}",
            pixels.len(),
            width,
            height,
            channels
        )));
    }

    let rows = pixels[..expected].to_vec();
    let dynamic = if channels == 1 {
        image::GrayImage::from_raw(width, height, rows).map(image::DynamicImage::ImageLuma8)
    } else {
        image::RgbImage::from_raw(width, height, rows).map(image::DynamicImage::ImageRgb8)
    };
    let dynamic = dynamic
        .ok_or_else(|| RenderError::Image("pixel buffer does not form an image".into()))?;

    let mut buffer = std::io::Cursor::new(Vec::new());
    dynamic
        .write_to(&mut buffer, ImageOutputFormat::Png)
        .map_err(|e| RenderError::Image(e.to_string()))?;
    Ok(buffer.into_inner())
}

/// Decode whatever the stream produced and re-encode as PNG for the
/// vision model.
fn reencode_png(bytes: &[u8]) -> Result<Vec<u8>, RenderError> {
    if bytes.starts_with(b"\x89PNG") {
        return Ok(bytes.to_vec());
    }
    let decoded =
        image::load_from_memory(bytes).map_err(|e| RenderError::Image(e.to_string()))?;
    let mut buffer = std::io::Cursor::new(Vec::new());
    decoded
        .write_to(&mut buffer, ImageOutputFormat::Png)
        .map_err(|e| RenderError::Image(e.to_string()))?;
    Ok(buffer.into_inner())
}

fn deref<'a>(doc: &'a lopdf::Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

fn dict_entry<'a>(
    doc: &'a lopdf::Document,
    dict: &'a lopdf::Dictionary,
    key: &[u8],
) -> Result<&'a lopdf::Dictionary, RenderError> {
    let entry = dict.get(key).map_err(|_| {
        RenderError::Pdf(format!("missing /{}", String::from_utf8_lossy(key)))
    })?;
    deref(doc, entry).as_dict().map_err(|_| {
        RenderError::Pdf(format!("/{} is not a dictionary", String::from_utf8_lossy(key)))
    })
}

fn dict_int(dict: &lopdf::Dictionary, key: &[u8]) -> Result<i64, RenderError> {
    dict.get(key)
        .and_then(Object::as_i64)
        .map_err(|_| RenderError::Pdf(format!("missing /{}", String::from_utf8_lossy(key))))
}

/// Configurable `PageRenderer` for tests. Records render calls.
pub struct MockPageRenderer {
    pages: usize,
    fail_render: bool,
    render_calls: Mutex<usize>,
}

impl MockPageRenderer {
    pub fn new(pages: usize) -> Self {
        Self {
            pages,
            fail_render: false,
            render_calls: Mutex::new(0),
        }
    }

    pub fn failing_render(mut self) -> Self {
        self.fail_render = true;
        self
    }

    pub fn render_calls(&self) -> usize {
        *self.render_calls.lock().unwrap()
    }
}

impl PageRenderer for MockPageRenderer {
    fn page_count(&self, _pdf: &[u8]) -> Result<usize, RenderError> {
        Ok(self.pages)
    }

    fn render_pages(&self, _pdf: &[u8]) -> Result<Vec<Vec<u8>>, RenderError> {
        *self.render_calls.lock().unwrap() += 1;
        if self.fail_render {
            return Err(RenderError::Pdf("render unavailable".into()));
        }
        Ok(vec![vec![0u8; 16]; self.pages])
    }
}
