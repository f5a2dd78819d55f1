//! PDF page -> pixels, and pixels -> PNG.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use tracing::debug;

use crate::error::RasterError;

/// PDF user space is 72 units per inch.
pub const PDF_NATIVE_DPI: f32 = 72.0;

/// An RGBA8 pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterSurface {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RasterSurface {
    /// Decodes a PNG, normalising any 8 or 16 bit gray/RGB layout to RGBA8.
    pub fn from_png(bytes: &[u8]) -> Result<Self, RasterError> {
        let mut decoder = png::Decoder::new(bytes);
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder.read_info()?;
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf)?;
        let data = &buf[..info.buffer_size()];

        if info.bit_depth != png::BitDepth::Eight {
            return Err(RasterError::Unsupported(format!("bit depth {:?}", info.bit_depth)));
        }

        let pixels = match info.color_type {
            png::ColorType::Rgba => data.to_vec(),
            png::ColorType::Rgb => data
                .chunks_exact(3)
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
            png::ColorType::Grayscale => data.iter().flat_map(|&g| [g, g, g, 255]).collect(),
            png::ColorType::GrayscaleAlpha => data
                .chunks_exact(2)
                .flat_map(|p| [p[0], p[0], p[0], p[1]])
                .collect(),
            other => return Err(RasterError::Unsupported(format!("color type {other:?}"))),
        };

        Ok(Self {
            width: info.width,
            height: info.height,
            pixels,
        })
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, RasterError> {
        let expected = self.width as usize * self.height as usize * 4;
        if self.pixels.len() != expected {
            return Err(RasterError::Unsupported(format!(
                "{} bytes for a {}x{} RGBA surface",
                self.pixels.len(),
                self.width,
                self.height
            )));
        }

        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(&self.pixels)?;
            writer.finish()?;
        }
        Ok(out)
    }
}

/// Renders one page of a binary document onto a raster surface.
pub trait Rasterizer: Send + Sync {
    /// `page` is 1-based; `scale` multiplies the document's native resolution.
    fn rasterize(&self, pdf: &[u8], page: u32, scale: f32) -> Result<RasterSurface, RasterError>;
}

/// Rasterizes with poppler's `pdftoppm`.
pub struct PdftoppmRasterizer {
    binary: PathBuf,
}

impl PdftoppmRasterizer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

pub fn dpi_for_scale(scale: f32) -> u32 {
    (PDF_NATIVE_DPI * scale).round() as u32
}

impl Rasterizer for PdftoppmRasterizer {
    fn rasterize(&self, pdf: &[u8], page: u32, scale: f32) -> Result<RasterSurface, RasterError> {
        if page == 0 {
            return Err(RasterError::PageOutOfRange(page));
        }
        if !(scale.is_finite() && scale > 0.0) {
            return Err(RasterError::InvalidScale(scale));
        }

        let workdir = tempfile::tempdir()?;
        let pdf_path = workdir.path().join("document.pdf");
        let out_prefix = workdir.path().join("page");
        fs::write(&pdf_path, pdf)?;

        let dpi = dpi_for_scale(scale);
        debug!(page, dpi, "rasterizing page");
        let output = Command::new(&self.binary)
            .arg("-f")
            .arg(page.to_string())
            .arg("-l")
            .arg(page.to_string())
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-png")
            .arg("-singlefile")
            .arg(&pdf_path)
            .arg(&out_prefix)
            .output()
            .map_err(|source| RasterError::Launch {
                binary: self.binary.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(RasterError::Failed(if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            }));
        }

        // pdftoppm exits cleanly but writes nothing when the page is past the end
        let png_path = out_prefix.with_extension("png");
        if !png_path.exists() {
            return Err(RasterError::PageOutOfRange(page));
        }
        RasterSurface::from_png(&fs::read(png_path)?)
    }
}
