//! Code 128 barcodes for printed invoices.
//!
//! Only code set B is used: it covers printable ASCII, which is all an
//! invoice or PO number ever contains. The output is an inline SVG so the
//! invoice page needs no image requests.

use core::fmt::Write as _;

/// Errors from [`Code128::encode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BarcodeError {
    #[error("barcode text cannot be empty")]
    Empty,
    #[error("character {0:?} cannot be encoded in Code 128 set B")]
    UnsupportedCharacter(char),
}

/// Bar/space widths for every symbol value, bar first.
const PATTERNS: [&str; 107] = [
    "212222", "222122", "222221", "121223", "121322", "131222", "122213", "122312", "132212",
    "221213", "221312", "231212", "112232", "122132", "122231", "113222", "123122", "123221",
    "223211", "221132", "221231", "213212", "223112", "312131", "311222", "321122", "321221",
    "312212", "322112", "322211", "212123", "212321", "232121", "111323", "131123", "131321",
    "112313", "132113", "132311", "211313", "231113", "231311", "112133", "112331", "132131",
    "113123", "113321", "133121", "313121", "211331", "231131", "213113", "213311", "213131",
    "311123", "311321", "331121", "312113", "312311", "332111", "314111", "221411", "431111",
    "111224", "111422", "121124", "121421", "141122", "141221", "112214", "112412", "122114",
    "122411", "142112", "142211", "241211", "221114", "413111", "241112", "134111", "111242",
    "121142", "121241", "114212", "124112", "124211", "411212", "421112", "421211", "212141",
    "214121", "412121", "111143", "111341", "131141", "114113", "114311", "411113", "411311",
    "113141", "114131", "311141", "411131", "211412", "211214", "211232", "2331112",
];

const START_B: u8 = 104;
const STOP: u8 = 106;
const CHECKSUM_MODULUS: u32 = 103;
const QUIET_ZONE: usize = 10;

/// An encoded Code 128-B symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code128 {
    text: String,
    /// Symbol values: start, data, checksum, stop.
    values: Vec<u8>,
}

impl Code128 {
    /// Encode `text` using code set B.
    ///
    /// # Errors
    ///
    /// Returns [`BarcodeError::Empty`] for empty input and
    /// [`BarcodeError::UnsupportedCharacter`] for anything outside ASCII
    /// 32..=126.
    pub fn encode(text: &str) -> Result<Self, BarcodeError> {
        if text.is_empty() {
            return Err(BarcodeError::Empty);
        }

        let mut values = Vec::with_capacity(text.len() + 3);
        values.push(START_B);
        for c in text.chars() {
            if !(' '..='~').contains(&c) {
                return Err(BarcodeError::UnsupportedCharacter(c));
            }
            // In range, so the subtraction fits a u8
            values.push((c as u8) - 32);
        }

        let weighted: u32 = values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let weight = u32::try_from(i).unwrap_or(u32::MAX).max(1);
                weight * u32::from(v)
            })
            .sum();
        let checksum = u8::try_from(weighted % CHECKSUM_MODULUS).unwrap_or(0);
        values.push(checksum);
        values.push(STOP);

        Ok(Self {
            text: text.to_owned(),
            values,
        })
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The check symbol value.
    #[must_use]
    pub fn checksum(&self) -> u8 {
        self.values
            .len()
            .checked_sub(2)
            .and_then(|i| self.values.get(i))
            .copied()
            .unwrap_or(0)
    }

    /// The symbol as a run of modules, `true` for bar and `false` for space.
    #[must_use]
    pub fn modules(&self) -> Vec<bool> {
        let mut modules = Vec::with_capacity(self.values.len() * 11 + 2);
        for &value in &self.values {
            let pattern = PATTERNS.get(usize::from(value)).copied().unwrap_or("");
            for (i, width) in pattern.bytes().enumerate() {
                let bar = i % 2 == 0;
                for _ in 0..(width - b'0') {
                    modules.push(bar);
                }
            }
        }
        modules
    }

    /// Render as an SVG with one unit per module and a quiet zone on both
    /// sides. Consecutive bar modules are merged into a single rect.
    #[must_use]
    pub fn to_svg(&self, height: u32) -> String {
        let modules = self.modules();
        let width = modules.len() + QUIET_ZONE * 2;

        let mut svg = String::new();
        let _ = write!(
            svg,
            r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {width} {height}" width="{width}" height="{height}" preserveAspectRatio="none" shape-rendering="crispEdges"><rect width="{width}" height="{height}" fill="#fff"/>"##
        );

        let mut i = 0;
        while i < modules.len() {
            if modules.get(i).copied().unwrap_or(false) {
                let start = i;
                while modules.get(i).copied().unwrap_or(false) {
                    i += 1;
                }
                let _ = write!(
                    svg,
                    r##"<rect x="{}" width="{}" height="{height}" fill="#000"/>"##,
                    start + QUIET_ZONE,
                    i - start
                );
            } else {
                i += 1;
            }
        }

        svg.push_str("</svg>");
        svg
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_widths() {
        for (value, pattern) in PATTERNS.iter().enumerate() {
            let total: u32 = pattern.bytes().map(|b| u32::from(b - b'0')).sum();
            let expected = if value == usize::from(STOP) { 13 } else { 11 };
            assert_eq!(total, expected, "pattern {value}");
        }
    }

    #[test]
    fn test_checksum() {
        // (104 + 33) mod 103
        assert_eq!(Code128::encode("A").unwrap().checksum(), 34);
        // (104 + 33 + 2 * 34) mod 103
        assert_eq!(Code128::encode("AB").unwrap().checksum(), 102);
    }

    #[test]
    fn test_module_count() {
        let code = Code128::encode("INV-1042").unwrap();
        // start + 8 data + checksum at 11 modules each, stop at 13
        assert_eq!(code.modules().len(), 10 * 11 + 13);
    }

    #[test]
    fn test_modules_start_and_end_with_bars() {
        let modules = Code128::encode("PO 7781").unwrap().modules();
        assert!(modules[0]);
        assert!(modules[modules.len() - 1]);
        // Stop pattern ends with a two-module termination bar
        assert!(modules[modules.len() - 2]);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(Code128::encode(""), Err(BarcodeError::Empty));
        assert_eq!(
            Code128::encode("caf\u{e9}"),
            Err(BarcodeError::UnsupportedCharacter('\u{e9}'))
        );
        assert_eq!(
            Code128::encode("a\tb"),
            Err(BarcodeError::UnsupportedCharacter('\t'))
        );
    }

    #[test]
    fn test_svg_output() {
        let svg = Code128::encode("42").unwrap().to_svg(60);
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains(r#"height="60""#));
        // Start B begins with a two-module bar right after the quiet zone
        assert!(svg.contains(r##"<rect x="10" width="2" height="60" fill="#000"/>"##));
    }
}
