// SPDX-License-Identifier: MPL-2.0

//! Core types for decode results
//!
//! These types carry a decoded symbol from the worker thread to the session
//! controller and on to the consumer.

/// Symbologies the scanner can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolFormat {
    QrCode,
}

impl std::fmt::Display for SymbolFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymbolFormat::QrCode => write!(f, "QR_CODE"),
        }
    }
}

/// A point on a decoded symbol, in decode-input coordinates
///
/// For QR codes these are the corners of the symbol. Consumers multiply by
/// the result's scale factor to draw them over the thumbnail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultPoint {
    pub x: f32,
    pub y: f32,
}

impl ResultPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// What a decoder found in one decode input
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub payload: String,
    pub format: SymbolFormat,
    pub points: Vec<ResultPoint>,
}

/// A successful decode attempt, ready to hand to the controller
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSymbol {
    pub symbol_payload: String,
    pub symbol_format: SymbolFormat,
    pub render_points: Vec<ResultPoint>,
    /// JPEG-compressed greyscale thumbnail of the scan region
    pub thumbnail: Option<Vec<u8>>,
    /// Thumbnail width divided by scan region width
    pub scale_factor: Option<f32>,
}

impl DecodedSymbol {
    /// A decoded symbol without a thumbnail
    pub fn from_symbol(symbol: Symbol) -> Self {
        Self {
            symbol_payload: symbol.payload,
            symbol_format: symbol.format,
            render_points: symbol.points,
            thumbnail: None,
            scale_factor: None,
        }
    }
}

/// Outcome of one decode attempt
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    Decoded(DecodedSymbol),
    /// Nothing found, or no usable scan region; not an error
    Failed,
}

/// Follow-up action derived from a decoded payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanAction {
    /// URL that can be opened in a browser
    Url(String),
    /// Phone number (tel: URI)
    Phone(String),
    /// Email address (mailto: URI)
    Email {
        address: String,
        subject: Option<String>,
    },
    /// Anything else
    Text(String),
}

impl ScanAction {
    /// Classify a payload, falling back to `Text`
    pub fn parse(content: &str) -> Self {
        let trimmed = content.trim();

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Self::Url(trimmed.to_string());
        }

        if let Some(number) = trimmed.strip_prefix("tel:") {
            return Self::Phone(number.to_string());
        }

        if let Some(rest) = trimmed.strip_prefix("mailto:") {
            let (address, params) = rest.split_once('?').unwrap_or((rest, ""));
            let subject = params
                .split('&')
                .filter_map(|param| param.split_once('='))
                .find(|(key, _)| key.eq_ignore_ascii_case("subject"))
                .map(|(_, value)| urlencoding_decode(value));
            return Self::Email {
                address: address.to_string(),
                subject,
            };
        }

        // Bare domain names
        if !trimmed.contains(' ')
            && trimmed.len() < 256
            && (trimmed.starts_with("www.") || trimmed.ends_with(".com") || trimmed.ends_with(".org"))
        {
            return Self::Url(format!("https://{}", trimmed));
        }

        Self::Text(trimmed.to_string())
    }

    /// The URL to hand to a browser, if this action has one
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Url(_) => "URL",
            Self::Phone(_) => "Phone",
            Self::Email { .. } => "Email",
            Self::Text(_) => "Text",
        }
    }
}

/// Simple URL decoding for query parameters
fn urlencoding_decode(s: &str) -> String {
    let mut bytes = Vec::with_capacity(s.len());
    let mut chars = s.bytes();

    while let Some(b) = chars.next() {
        match b {
            b'%' => {
                let hex: Vec<u8> = chars.by_ref().take(2).collect();
                match std::str::from_utf8(&hex)
                    .ok()
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                {
                    Some(byte) => bytes.push(byte),
                    None => {
                        bytes.push(b'%');
                        bytes.extend_from_slice(&hex);
                    }
                }
            }
            b'+' => bytes.push(b' '),
            _ => bytes.push(b),
        }
    }

    String::from_utf8_lossy(&bytes).into_owned()
}
