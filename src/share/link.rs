//! Scannable link rendering.

use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine};
use qrcode::render::{svg, unicode};
use qrcode::QrCode;

/// Turns a URL into an image the sender can display.
pub trait LinkEncoder: Send + Sync {
    /// Returns a `data:` URL that can be used directly as an `<img src>`.
    fn encode(&self, url: &str) -> Result<String>;
}

/// QR code rendered as SVG.
#[derive(Debug, Clone, Copy)]
pub struct QrLinkEncoder {
    pub min_size: u32,
}

impl Default for QrLinkEncoder {
    fn default() -> Self {
        Self { min_size: 256 }
    }
}

impl LinkEncoder for QrLinkEncoder {
    fn encode(&self, url: &str) -> Result<String> {
        let code = QrCode::new(url.as_bytes()).context("Failed to generate QR code")?;
        let image = code
            .render::<svg::Color>()
            .min_dimensions(self.min_size, self.min_size)
            .quiet_zone(true)
            .build();

        Ok(format!(
            "data:image/svg+xml;base64,{}",
            general_purpose::STANDARD.encode(image)
        ))
    }
}

/// Unicode half-block rendering for terminals (inverted for dark backgrounds).
pub fn terminal_qr(url: &str) -> Result<String> {
    let code = QrCode::new(url.as_bytes()).context("Failed to generate QR code")?;

    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_svg_data_url() {
        let image = QrLinkEncoder::default()
            .encode("https://example.trycloudflare.com/receive?file=report.pdf")
            .expect("encode");
        let payload = image
            .strip_prefix("data:image/svg+xml;base64,")
            .expect("svg data url prefix");

        let svg = general_purpose::STANDARD.decode(payload).expect("base64");
        let svg = String::from_utf8(svg).expect("utf8");
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn terminal_rendering_is_multiline() {
        let qr = terminal_qr("https://example.com").expect("render");
        assert!(qr.lines().count() > 10);
    }
}
