//! QR code rendering to PNG, SVG and `data:` URLs.

use std::io::Cursor;

use base64::Engine as _;
use image::{ImageFormat, Rgb, RgbImage};
use qrcode::render::svg;
use qrcode::{Color, EcLevel, QrCode};

use crate::error::{Error, Result};

pub const DEFAULT_SIZE: u32 = 300;
pub const DEFAULT_MARGIN: u32 = 2;
pub const MIN_SIZE: u32 = 50;
pub const MAX_SIZE: u32 = 2000;

pub const MSG_TEXT_REQUIRED: &str = "Text is required";

/// `#rrggbb` (or `#rgb`) colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QrColor(pub [u8; 3]);

impl QrColor {
    pub const BLACK: QrColor = QrColor([0, 0, 0]);
    pub const WHITE: QrColor = QrColor([0xff, 0xff, 0xff]);

    pub fn parse(s: &str) -> Result<Self> {
        let bad = || Error::InvalidInput(format!("invalid colour {s:?}, expected #rrggbb"));
        let hex = s.trim().strip_prefix('#').ok_or_else(bad)?;
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(bad());
        }
        let channel = |i: usize, w: usize| u8::from_str_radix(&hex[i * w..i * w + w], 16);
        let rgb = match hex.len() {
            6 => [channel(0, 2), channel(1, 2), channel(2, 2)],
            3 => [channel(0, 1), channel(1, 1), channel(2, 1)].map(|c| c.map(|v| v * 17)),
            _ => return Err(bad()),
        };
        let [r, g, b] = rgb;
        Ok(Self([
            r.map_err(|_| bad())?,
            g.map_err(|_| bad())?,
            b.map_err(|_| bad())?,
        ]))
    }

    pub fn to_hex(self) -> String {
        let [r, g, b] = self.0;
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

pub fn parse_ec_level(s: &str) -> Result<EcLevel> {
    match s.trim().to_ascii_uppercase().as_str() {
        "L" => Ok(EcLevel::L),
        "M" => Ok(EcLevel::M),
        "Q" => Ok(EcLevel::Q),
        "H" => Ok(EcLevel::H),
        other => Err(Error::InvalidInput(format!(
            "invalid error correction level {other:?}, expected L, M, Q or H"
        ))),
    }
}

#[derive(Clone, Debug)]
pub struct QrOptions {
    /// Edge length of the PNG in pixels; SVG treats it as a minimum.
    pub size: u32,
    /// Quiet zone width in modules.
    pub margin: u32,
    pub level: EcLevel,
    pub dark: QrColor,
    pub light: QrColor,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIZE,
            margin: DEFAULT_MARGIN,
            level: EcLevel::M,
            dark: QrColor::BLACK,
            light: QrColor::WHITE,
        }
    }
}

impl QrOptions {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_SIZE..=MAX_SIZE).contains(&self.size) {
            return Err(Error::InvalidInput(format!(
                "size {} out of range {MIN_SIZE}..={MAX_SIZE}",
                self.size
            )));
        }
        Ok(())
    }
}

fn build_code(text: &str, opts: &QrOptions) -> Result<QrCode> {
    if text.trim().is_empty() {
        return Err(Error::InvalidInput(MSG_TEXT_REQUIRED.to_string()));
    }
    opts.validate()?;
    QrCode::with_error_correction_level(text.as_bytes(), opts.level)
        .map_err(|e| Error::QrCode(e.to_string()))
}

/// Paint the symbol plus quiet zone onto an RGB canvas.
///
/// Each pixel takes the colour of the module under it, so modules may differ by one pixel
/// in width when `size` is not a multiple of the module count.
pub fn render_image(code: &QrCode, opts: &QrOptions) -> RgbImage {
    let width = code.width() as u32;
    let colors = code.to_colors();
    let total = width + 2 * opts.margin;
    let size = opts.size.max(total);
    let dark = Rgb(opts.dark.0);
    let light = Rgb(opts.light.0);

    RgbImage::from_fn(size, size, |px, py| {
        let mx = (px as u64 * total as u64 / size as u64) as u32;
        let my = (py as u64 * total as u64 / size as u64) as u32;
        let inside = (opts.margin..opts.margin + width).contains(&mx)
            && (opts.margin..opts.margin + width).contains(&my);
        if !inside {
            return light;
        }
        let idx = ((my - opts.margin) * width + (mx - opts.margin)) as usize;
        match colors.get(idx) {
            Some(Color::Dark) => dark,
            _ => light,
        }
    })
}

pub fn encode_png(text: &str, opts: &QrOptions) -> Result<Vec<u8>> {
    let code = build_code(text, opts)?;
    let img = render_image(&code, opts);
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| Error::QrCode(format!("png encode: {e}")))?;
    Ok(buffer)
}

/// SVG document. The renderer's own quiet zone is used when `margin` is non-zero.
pub fn encode_svg(text: &str, opts: &QrOptions) -> Result<String> {
    let code = build_code(text, opts)?;
    let dark = opts.dark.to_hex();
    let light = opts.light.to_hex();
    Ok(code
        .render::<svg::Color>()
        .min_dimensions(opts.size, opts.size)
        .dark_color(svg::Color(&dark))
        .light_color(svg::Color(&light))
        .quiet_zone(opts.margin > 0)
        .build())
}

pub fn png_data_url(png: &[u8]) -> String {
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    )
}
