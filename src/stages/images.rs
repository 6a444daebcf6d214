//! `optimize-images`: recompress images already in the output tree.
//!
//! Every candidate is processed in parallel in memory; results are written
//! only after all of them succeeded, and only when they are smaller.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::ImageFormat;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use jwalk::WalkDir;
use rayon::prelude::*;

use super::ImageOptimizer;
use super::write_atomic;
use crate::logger::ProgressLine;
use crate::pipeline::{ImageSettings, PipelineConfig, StageError, StageKind};
use crate::utils::fmt::format_bytes;
use crate::{debug, log};

pub fn run(config: &PipelineConfig, optimizer: &dyn ImageOptimizer) -> Result<usize> {
    let Some(settings) = config.images() else {
        return Ok(0);
    };
    let output = config.output();
    let candidates: Vec<PathBuf> = WalkDir::new(output)
        .sort(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|path| settings.test.is_match(&path.to_string_lossy()))
        .collect();

    if candidates.is_empty() {
        return Ok(0);
    }

    let progress = ProgressLine::new("images", &[("images", candidates.len())]);
    let results: Vec<Option<Shrunk>> = candidates
        .par_iter()
        .map(|path| {
            let shrunk = shrink(path, optimizer, settings);
            progress.inc("images");
            shrunk
        })
        .collect::<Result<_>>()?;
    progress.finish();

    let mut written = 0;
    let mut saved = 0u64;
    for shrunk in results.into_iter().flatten() {
        write_atomic(&shrunk.path, &shrunk.data)?;
        saved += shrunk.saved;
        written += 1;
    }

    if written > 0 {
        log!("images"; "recompressed {} of {}, saved {}", written, candidates.len(), format_bytes(saved));
    }
    Ok(written)
}

struct Shrunk {
    path: PathBuf,
    data: Vec<u8>,
    saved: u64,
}

fn shrink(path: &Path, optimizer: &dyn ImageOptimizer, settings: &ImageSettings) -> Result<Option<Shrunk>> {
    let original = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let optimized = optimizer
        .optimize(path, &original, settings)
        .map_err(|err| StageError::new(StageKind::OptimizeImages, format!("{err:#}")).at(path))?;

    Ok(optimized
        .filter(|data| data.len() < original.len())
        .map(|data| Shrunk {
            path: path.to_path_buf(),
            saved: (original.len() - data.len()) as u64,
            data,
        }))
}

// ============================================================================
// built-in optimizer
// ============================================================================

/// JPEG at the configured quality, PNG at best compression, SVG through usvg.
/// GIF and anything else is left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinImageOptimizer;

impl ImageOptimizer for BuiltinImageOptimizer {
    fn optimize(&self, path: &Path, data: &[u8], settings: &ImageSettings) -> Result<Option<Vec<u8>>> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("jpg" | "jpeg") => recompress_jpeg(data, settings.jpeg_quality).map(Some),
            Some("png") => recompress_png(data).map(Some),
            Some("svg") => minify_svg(data).map(Some),
            _ => {
                debug!("images"; "leaving {} as-is", path.display());
                Ok(None)
            }
        }
    }
}

fn recompress_jpeg(data: &[u8], quality: u8) -> Result<Vec<u8>> {
    let img = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
        .context("failed to decode JPEG")?;
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    img.write_with_encoder(encoder)
        .context("failed to encode JPEG")?;
    Ok(buf)
}

fn recompress_png(data: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory_with_format(data, ImageFormat::Png)
        .context("failed to decode PNG")?;
    let mut buf = Cursor::new(Vec::new());
    let encoder =
        PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive);
    img.write_with_encoder(encoder)
        .context("failed to encode PNG")?;
    Ok(buf.into_inner())
}

fn minify_svg(data: &[u8]) -> Result<Vec<u8>> {
    let tree = usvg::Tree::from_data(data, &usvg::Options::default())
        .context("failed to parse SVG")?;
    let options = usvg::WriteOptions {
        indent: usvg::Indent::None,
        ..Default::default()
    };
    Ok(tree.to_string(&options).into_bytes())
}
