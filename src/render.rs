//! Certificate rendering.
//!
//! Turns a recipient name into an artifact pair: a print-ready PDF and a
//! JPEG preview, both derived from a fresh copy of the template image with
//! the name centered inside the configured box.

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use snafu::prelude::*;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use printpdf::{ColorBits, ColorSpace, ImageTransform, ImageXObject, Mm, PdfDocument, Px};

use crate::config::{CertificateConfig, NameBox, OutputConfig};
use crate::error::{
    CreateOutputDirSnafu, CreatePdfSnafu, LoadTemplateSnafu, ParseFontSnafu, ReadFontSnafu,
    RenderError, WriteJpegSnafu, WritePdfSnafu,
};
use crate::roster::sanitize_filename;

/// Render resolution used when embedding the page image into the PDF.
const PDF_DPI: f32 = 100.0;

/// The two artifact files produced for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPair {
    pub pdf: PathBuf,
    pub jpg: PathBuf,
}

/// Derive the artifact paths for a recipient name.
///
/// Both stages use this derivation, so the dispatcher always looks for
/// exactly the files the generator wrote.
pub fn artifact_paths(output: &OutputConfig, name: &str) -> ArtifactPair {
    let key = sanitize_filename(name);
    ArtifactPair {
        pdf: Path::new(&output.pdf_dir).join(format!("{key}.pdf")),
        jpg: Path::new(&output.jpg_dir).join(format!("{key}.jpg")),
    }
}

/// Rendering seam for the generator loop.
pub trait Render {
    /// Render both artifacts for one recipient name.
    fn render(&self, name: &str) -> Result<ArtifactPair, RenderError>;
}

/// Production renderer backed by the template image and a fixed-size font.
///
/// Loading the template and font happens once at construction; failure there
/// is fatal to the whole run, before any row is processed.
#[derive(Debug)]
pub struct CertificateRenderer {
    template: RgbImage,
    font: FontVec,
    scale: PxScale,
    name_box: NameBox,
    text_color: Rgb<u8>,
    output: OutputConfig,
}

impl CertificateRenderer {
    /// Load the template image and font. Fatal preconditions of the generator.
    pub fn new(
        certificate: &CertificateConfig,
        output: &OutputConfig,
    ) -> Result<Self, RenderError> {
        let template = image::open(&certificate.template)
            .context(LoadTemplateSnafu {
                path: &certificate.template,
            })?
            .to_rgb8();

        let font_bytes = fs::read(&certificate.font).context(ReadFontSnafu {
            path: &certificate.font,
        })?;
        let font = FontVec::try_from_vec(font_bytes).context(ParseFontSnafu {
            path: &certificate.font,
        })?;

        Ok(Self {
            template,
            font,
            scale: PxScale::from(certificate.font_size),
            name_box: certificate.name_box,
            text_color: Rgb(certificate.text_color),
            output: output.clone(),
        })
    }

}

impl Render for CertificateRenderer {
    fn render(&self, name: &str) -> Result<ArtifactPair, RenderError> {
        let paths = artifact_paths(&self.output, name);

        // Fresh copy per row; the template itself is never mutated.
        let mut page = self.template.clone();

        let (text_w, text_h) = measure_text(&self.font, self.scale, name);
        let (x, y) = centered_origin(&self.name_box, text_w, text_h);
        draw_text_mut(&mut page, self.text_color, x, y, self.scale, &self.font, name);

        fs::create_dir_all(&self.output.jpg_dir).context(CreateOutputDirSnafu {
            path: &self.output.jpg_dir,
        })?;
        page.save(&paths.jpg).context(WriteJpegSnafu {
            path: paths.jpg.display().to_string(),
        })?;

        fs::create_dir_all(&self.output.pdf_dir).context(CreateOutputDirSnafu {
            path: &self.output.pdf_dir,
        })?;
        write_pdf(&page, &paths.pdf)?;

        Ok(paths)
    }
}

/// Write a single-page PDF whose page is the rendered raster, embedded as
/// raw RGB pixels at the fixed resolution.
fn write_pdf(page: &RgbImage, path: &Path) -> Result<(), RenderError> {
    let width = Mm(page.width() as f32 * 25.4 / PDF_DPI);
    let height = Mm(page.height() as f32 * 25.4 / PDF_DPI);

    let (doc, page_idx, layer_idx) = PdfDocument::new("Certificate", width, height, "certificate");
    let layer = doc.get_page(page_idx).get_layer(layer_idx);

    let embedded = printpdf::Image::from(ImageXObject {
        width: Px(page.width() as usize),
        height: Px(page.height() as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: false,
        image_data: page.as_raw().clone(),
        image_filter: None,
        smask: None,
        clipping_bbox: None,
    });
    embedded.add_to_layer(
        layer,
        ImageTransform {
            dpi: Some(PDF_DPI),
            ..Default::default()
        },
    );

    let file = File::create(path).context(CreatePdfSnafu {
        path: path.display().to_string(),
    })?;
    doc.save(&mut BufWriter::new(file)).context(WritePdfSnafu {
        path: path.display().to_string(),
    })?;
    Ok(())
}

/// Bounding size of the rendered text at the given scale.
fn measure_text(font: &impl Font, scale: PxScale, text: &str) -> (i32, i32) {
    let scaled = font.as_scaled(scale);

    let mut width = 0.0;
    let mut previous = None;
    for c in text.chars() {
        let glyph = scaled.glyph_id(c);
        if let Some(prev) = previous {
            width += scaled.kern(prev, glyph);
        }
        width += scaled.h_advance(glyph);
        previous = Some(glyph);
    }
    let height = scaled.ascent() - scaled.descent();

    (width.round() as i32, height.round() as i32)
}

/// Top-left origin that centers text of the given size inside the box.
fn centered_origin(name_box: &NameBox, text_w: i32, text_h: i32) -> (i32, i32) {
    let x = name_box.x1 + (name_box.width() - text_w) / 2;
    let y = name_box.y1 + (name_box.height() - text_h) / 2;
    (x, y)
}
