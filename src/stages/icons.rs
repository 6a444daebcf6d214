//! `generate-icons`: icon set, `manifest.json`, and their links in the shell.
//!
//! Every link carries a `?v=` content fingerprint so a changed icon is never
//! served from a stale cache.

use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use image::codecs::ico::{IcoEncoder, IcoFrame};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, ImageFormat, Rgba, RgbaImage};
use serde::Serialize;

use super::shell::{self, insert_before, public_url};
use super::{IconFile, IconGenerator, IconKind, write_atomic};
use crate::config::{DisplayMode, ManifestConfig, Orientation};
use crate::embed::escape_html;
use crate::pipeline::{PipelineConfig, StageError, StageKind};
use crate::utils::hash;

/// File name of the web-app manifest.
pub const MANIFEST_FILE: &str = "manifest.json";

pub fn run(config: &PipelineConfig, generator: &dyn IconGenerator) -> Result<usize> {
    let source = config.icon_source().ok_or_else(|| {
        StageError::new(StageKind::GenerateIcons, "no source icon configured")
    })?;
    if !source.is_file() {
        return Err(StageError::new(StageKind::GenerateIcons, "source icon does not exist")
            .at(source)
            .into());
    }

    let shell_path = shell::shell_path(config);
    let html = std::fs::read_to_string(&shell_path).map_err(|_| {
        StageError::new(StageKind::GenerateIcons, "HTML shell is missing").at(&shell_path)
    })?;

    let manifest = config.manifest();
    let icons = generator
        .generate(source, manifest)
        .map_err(|err| StageError::new(StageKind::GenerateIcons, format!("{err:#}")).at(source))?;

    let output = config.output();
    for icon in &icons {
        write_atomic(&output.join(&icon.name), &icon.data)?;
    }

    let json = web_manifest(manifest, &icons, config.public_path())?;
    write_atomic(&output.join(MANIFEST_FILE), json.as_bytes())?;

    let links = link_tags(&icons, &json, manifest, config.public_path());
    write_atomic(&shell_path, insert_before(&html, "</head>", &links).as_bytes())?;

    Ok(icons.len() + 2)
}

// ============================================================================
// manifest.json
// ============================================================================

#[derive(Serialize)]
struct WebManifest<'a> {
    name: &'a str,
    short_name: &'a str,
    description: &'a str,
    lang: &'static str,
    dir: &'static str,
    start_url: &'a str,
    scope: &'a str,
    display: DisplayMode,
    orientation: Orientation,
    background_color: &'a str,
    theme_color: &'a str,
    icons: Vec<ManifestIcon>,
}

#[derive(Serialize)]
struct ManifestIcon {
    src: String,
    sizes: String,
    #[serde(rename = "type")]
    mime: &'static str,
}

fn web_manifest(manifest: &ManifestConfig, icons: &[IconFile], public_path: &str) -> Result<String> {
    let icons = icons
        .iter()
        .filter(|icon| icon.kind == IconKind::AndroidChrome)
        .map(|icon| ManifestIcon {
            src: format!(
                "{}?v={}",
                public_url(public_path, &icon.name),
                hash::fingerprint(&icon.data)
            ),
            sizes: format!("{0}x{0}", icon.size),
            mime: "image/png",
        })
        .collect();

    let document = WebManifest {
        name: &manifest.name,
        short_name: manifest.short_name(),
        description: &manifest.description,
        lang: "en-US",
        dir: "auto",
        start_url: &manifest.start_url,
        scope: &manifest.serviceworker.scope,
        display: manifest.display,
        orientation: manifest.orientation,
        background_color: &manifest.background_color,
        theme_color: &manifest.theme_color,
        icons,
    };
    serde_json::to_string_pretty(&document).context("failed to serialize manifest.json")
}

fn link_tags(icons: &[IconFile], manifest_json: &str, manifest: &ManifestConfig, public_path: &str) -> String {
    let href = |name: &str, data: &[u8]| {
        escape_html(&format!(
            "{}?v={}",
            public_url(public_path, name),
            hash::fingerprint(data)
        ))
    };

    let mut tags = String::new();
    for icon in icons {
        let link = match icon.kind {
            IconKind::AppleTouch => format!(
                "<link rel=\"apple-touch-icon\" sizes=\"{0}x{0}\" href=\"{1}\">\n",
                icon.size,
                href(&icon.name, &icon.data)
            ),
            IconKind::Favicon => format!(
                "<link rel=\"icon\" type=\"image/png\" sizes=\"{0}x{0}\" href=\"{1}\">\n",
                icon.size,
                href(&icon.name, &icon.data)
            ),
            IconKind::FaviconIco => format!(
                "<link rel=\"shortcut icon\" href=\"{}\">\n",
                href(&icon.name, &icon.data)
            ),
            IconKind::AndroidChrome => continue,
        };
        tags.push_str(&link);
    }
    tags.push_str(&format!(
        "<link rel=\"manifest\" href=\"{}\">\n",
        href(MANIFEST_FILE, manifest_json.as_bytes())
    ));
    tags.push_str(&format!(
        "<meta name=\"apple-mobile-web-app-title\" content=\"{}\">\n",
        escape_html(manifest.short_name())
    ));
    tags
}

// ============================================================================
// built-in generator
// ============================================================================

const ANDROID_SIZES: [u32; 2] = [192, 512];
const APPLE_SIZE: u32 = 180;
const FAVICON_SIZES: [u32; 2] = [16, 32];

/// Rasterizes the icon set from a PNG, JPEG or GIF source.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinIconGenerator;

impl IconGenerator for BuiltinIconGenerator {
    fn generate(&self, source: &Path, manifest: &ManifestConfig) -> Result<Vec<IconFile>> {
        let format = ImageFormat::from_path(source)
            .ok()
            .filter(|f| matches!(f, ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif))
            .with_context(|| {
                format!("unsupported source icon format (use PNG, JPEG or GIF): {}", source.display())
            })?;
        let data = std::fs::read(source)
            .with_context(|| format!("failed to read {}", source.display()))?;
        let img = image::load_from_memory_with_format(&data, format)
            .context("failed to decode source icon")?;

        let [r, g, b] = manifest.background_rgb();
        let background = Rgba([r, g, b, 255]);

        let mut icons = Vec::with_capacity(6);
        for size in ANDROID_SIZES {
            icons.push(IconFile {
                name: format!("android-chrome-{size}x{size}.png"),
                size,
                kind: IconKind::AndroidChrome,
                data: encode_png(&square(&img, size, None))?,
            });
        }
        icons.push(IconFile {
            name: "apple-touch-icon.png".to_string(),
            size: APPLE_SIZE,
            kind: IconKind::AppleTouch,
            data: encode_png(&square(&img, APPLE_SIZE, Some(background)))?,
        });

        let mut frames = Vec::with_capacity(FAVICON_SIZES.len());
        for size in FAVICON_SIZES {
            let icon = square(&img, size, None);
            frames.push(
                IcoFrame::as_png(icon.as_raw(), size, size, ExtendedColorType::Rgba8)
                    .context("failed to encode favicon frame")?,
            );
            icons.push(IconFile {
                name: format!("favicon-{size}x{size}.png"),
                size,
                kind: IconKind::Favicon,
                data: encode_png(&icon)?,
            });
        }

        let mut ico = Vec::new();
        IcoEncoder::new(&mut ico)
            .encode_images(&frames)
            .context("failed to encode favicon.ico")?;
        icons.push(IconFile {
            name: "favicon.ico".to_string(),
            size: FAVICON_SIZES[FAVICON_SIZES.len() - 1],
            kind: IconKind::FaviconIco,
            data: ico,
        });

        Ok(icons)
    }
}

/// Fit `img` into a `size`×`size` square, centered. Transparent padding, or
/// flattened onto `background` when given, in which case every pixel is
/// opaque.
fn square(img: &DynamicImage, size: u32, background: Option<Rgba<u8>>) -> RgbaImage {
    let fitted = img.resize(size, size, FilterType::Lanczos3).to_rgba8();
    let x = (size - fitted.width()) / 2;
    let y = (size - fitted.height()) / 2;

    let Some(background) = background else {
        let mut canvas = RgbaImage::new(size, size);
        imageops::overlay(&mut canvas, &fitted, i64::from(x), i64::from(y));
        return canvas;
    };
    RgbaImage::from_fn(size, size, |px, py| {
        let pixel = (px >= x && py >= y)
            .then(|| fitted.get_pixel_checked(px - x, py - y))
            .flatten()
            .copied()
            .unwrap_or(Rgba([0, 0, 0, 0]));
        flatten(pixel, background)
    })
}

/// `pixel` composited over `background`, which is treated as opaque.
fn flatten(pixel: Rgba<u8>, background: Rgba<u8>) -> Rgba<u8> {
    let alpha = u16::from(pixel[3]);
    let mix = |fg: u8, bg: u8| {
        let blended = (u16::from(fg) * alpha + u16::from(bg) * (255 - alpha) + 127) / 255;
        u8::try_from(blended).unwrap_or(u8::MAX)
    };
    Rgba([
        mix(pixel[0], background[0]),
        mix(pixel[1], background[1]),
        mix(pixel[2], background[2]),
        255,
    ])
}

fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .context("failed to encode PNG")?;
    Ok(buf.into_inner())
}
