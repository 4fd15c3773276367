/// Normalised RGBA colour (each channel in `[0.0, 1.0]`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const BLACK:       Self = Self { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };
    pub const WHITE:       Self = Self { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };
    pub const TRANSPARENT: Self = Self { r: 0.0, g: 0.0, b: 0.0, a: 0.0 };

    /// Parse any of the accepted colour spellings:
    /// `#RRGGBB[AA]`, `0xRRGGBB[AA]`, `rgb(r,g,b)`, `rgba(r,g,b,a)`
    /// (components 0–255), or the literals `black`, `white`, `transparent`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        match s {
            "black" => return Some(Self::BLACK),
            "white" => return Some(Self::WHITE),
            "transparent" => return Some(Self::TRANSPARENT),
            _ => {}
        }

        if let Some(rest) = s.strip_prefix('#') {
            return Self::from_hex(rest);
        }
        if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return Self::from_hex(rest);
        }
        if let Some(rest) = s.strip_prefix("rgba") {
            return Self::from_components(rest, 4);
        }
        if let Some(rest) = s.strip_prefix("rgb") {
            return Self::from_components(rest, 3);
        }
        None
    }

    fn from_hex(hex: &str) -> Option<Self> {
        let byte = |s: &str| -> Option<u8> { u8::from_str_radix(s, 16).ok() };

        match hex.len() {
            6 => Some(Self {
                r: byte(&hex[0..2])? as f64 / 255.0,
                g: byte(&hex[2..4])? as f64 / 255.0,
                b: byte(&hex[4..6])? as f64 / 255.0,
                a: 1.0,
            }),
            8 => Some(Self {
                r: byte(&hex[0..2])? as f64 / 255.0,
                g: byte(&hex[2..4])? as f64 / 255.0,
                b: byte(&hex[4..6])? as f64 / 255.0,
                a: byte(&hex[6..8])? as f64 / 255.0,
            }),
            _ => None,
        }
    }

    /// `(r,g,b)` / `(r,g,b,a)` with decimal components 0–255.
    fn from_components(body: &str, count: usize) -> Option<Self> {
        let body = body.trim().strip_prefix('(')?.strip_suffix(')')?;
        let parts: Vec<u8> = body
            .split(',')
            .map(|p| p.trim().parse::<u8>().ok())
            .collect::<Option<_>>()?;
        if parts.len() != count {
            return None;
        }
        Some(Self {
            r: parts[0] as f64 / 255.0,
            g: parts[1] as f64 / 255.0,
            b: parts[2] as f64 / 255.0,
            a: if count == 4 { parts[3] as f64 / 255.0 } else { 1.0 },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_forms() {
        assert_eq!(Color::parse("#ffffff"), Some(Color::WHITE));
        assert_eq!(Color::parse("0x000000"), Some(Color::BLACK));
        let c = Color::parse("#10204080").unwrap();
        assert!((c.a - 128.0 / 255.0).abs() < 1e-9);
    }

    #[test]
    fn parse_functional_forms() {
        assert_eq!(Color::parse("rgb(255, 255, 255)"), Some(Color::WHITE));
        let c = Color::parse("rgba(0, 0, 0, 0)").unwrap();
        assert_eq!(c.a, 0.0);
        assert_eq!(Color::parse("rgb(1,2)"), None);
        assert_eq!(Color::parse("rgba(1,2,3)"), None);
    }

    #[test]
    fn parse_literals_and_garbage() {
        assert_eq!(Color::parse("transparent"), Some(Color::TRANSPARENT));
        assert_eq!(Color::parse("#12345"), None);
        assert_eq!(Color::parse("magenta"), None);
    }
}
