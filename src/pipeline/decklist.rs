//! Decklist parsing: text → ordered [`RawEntry`] list.
//!
//! Each non-blank line must look like
//!
//! ```text
//! 4 Lightning Bolt (lea) 162
//! 1 Delver of Secrets // Insectile Aberration (isd) 51
//! ```
//!
//! The name is matched lazily so it may itself contain parentheses; the set
//! code is the *last* parenthesised group before the collector number. Output
//! order equals input order, and everything downstream (page order included)
//! relies on that.

use crate::error::GrimoireError;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Separator between the faces of a two-sided card's name.
pub const FACE_SEPARATOR: &str = " // ";

// Collector numbers are a single token: digits, letters, `-`, `/`, `★`, …
static RE_STRICT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\s+(.+?)\s+\(([^)]+)\)\s+(\S+)$").unwrap());

// Anything after the set code counts as the collector number.
static RE_PERMISSIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\s+(.+?)\s+\(([^)]+)\)\s+(.+)$").unwrap());

/// One parsed decklist line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// 1-based line number in the submitted text.
    pub line: usize,
    pub quantity: u32,
    pub name: String,
    pub set_code: String,
    pub collector_number: String,
    pub is_multi_face: bool,
}

/// Parse a whole decklist. Blank lines are ignored; the first malformed line
/// aborts with [`GrimoireError::Parse`].
pub fn parse_decklist(text: &str) -> Result<Vec<RawEntry>, GrimoireError> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut entries = Vec::new();
    for (idx, line) in normalized.split('\n').enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        entries.push(parse_line(idx + 1, line)?);
    }

    debug!("Parsed {} decklist entries", entries.len());
    Ok(entries)
}

/// Parse one non-blank line.
pub fn parse_line(line_no: usize, line: &str) -> Result<RawEntry, GrimoireError> {
    let trimmed = line.trim();
    let parse_error = || GrimoireError::Parse {
        line: line_no,
        content: trimmed.to_string(),
    };

    let caps = RE_STRICT
        .captures(trimmed)
        .or_else(|| RE_PERMISSIVE.captures(trimmed))
        .ok_or_else(parse_error)?;

    let quantity: u32 = caps[1].parse().map_err(|_| parse_error())?;
    if quantity == 0 {
        return Err(parse_error());
    }

    let name = caps[2].trim().to_string();
    let collector_number = caps[4].trim().to_string();

    Ok(RawEntry {
        line: line_no,
        quantity,
        is_multi_face: name.contains(FACE_SEPARATOR),
        name,
        set_code: caps[3].trim().to_string(),
        collector_number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_entry() {
        let entries = parse_decklist("4 Lightning Bolt (lea) 162").unwrap();
        assert_eq!(
            entries,
            vec![RawEntry {
                line: 1,
                quantity: 4,
                name: "Lightning Bolt".into(),
                set_code: "lea".into(),
                collector_number: "162".into(),
                is_multi_face: false,
            }]
        );
    }

    #[test]
    fn name_may_contain_parentheses() {
        let e = parse_line(1, "1 Erase (Not the Urza's Legacy One) (unh) 10").unwrap();
        assert_eq!(e.name, "Erase (Not the Urza's Legacy One)");
        assert_eq!(e.set_code, "unh");
        assert_eq!(e.collector_number, "10");
    }

    #[test]
    fn collector_number_may_contain_letters_hyphens_slashes() {
        assert_eq!(
            parse_line(1, "1 Sol Ring (plst) C21-263").unwrap().collector_number,
            "C21-263"
        );
        assert_eq!(
            parse_line(1, "2 Island (sld) 1/2a").unwrap().collector_number,
            "1/2a"
        );
    }

    #[test]
    fn permissive_fallback_keeps_trimmed_remainder() {
        let e = parse_line(7, "1 Forest (unf) 235 foil").unwrap();
        assert_eq!(e.collector_number, "235 foil");
        assert_eq!(e.line, 7);
    }

    #[test]
    fn detects_multi_face_names() {
        let e = parse_line(1, "1 Delver of Secrets // Insectile Aberration (isd) 51").unwrap();
        assert!(e.is_multi_face);
        assert!(!parse_line(1, "1 Opt (xln) 65").unwrap().is_multi_face);
    }

    #[test]
    fn skips_blank_lines_and_normalizes_line_endings() {
        let text = "\r\n4 Lightning Bolt (lea) 162\r\n   \r\r1 Opt (xln) 65\n\n";
        let entries = parse_decklist(text).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "Lightning Bolt");
        assert_eq!(entries[0].collector_number, "162");
        assert_eq!(entries[1].name, "Opt");
        // \r\n, \r\n, \r, \r: Opt is on the fifth line
        assert_eq!(entries[1].line, 5);
    }

    #[test]
    fn preserves_input_order() {
        let text = "1 C (x) 3\n1 A (x) 1\n1 B (x) 2";
        let names: Vec<_> = parse_decklist(text)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["C", "A", "B"]);
    }

    #[test]
    fn empty_input_yields_no_entries() {
        assert!(parse_decklist("").unwrap().is_empty());
        assert!(parse_decklist(" \n\t\n").unwrap().is_empty());
    }

    #[test]
    fn malformed_line_reports_position_and_content() {
        let err = parse_decklist("1 Opt (xln) 65\nLightning Bolt\n").unwrap_err();
        assert_eq!(
            err,
            GrimoireError::Parse {
                line: 2,
                content: "Lightning Bolt".into()
            }
        );
    }

    #[test]
    fn rejects_zero_and_overflowing_quantity() {
        assert!(parse_line(1, "0 Opt (xln) 65").is_err());
        assert!(parse_line(1, "99999999999 Opt (xln) 65").is_err());
    }

    #[test]
    fn rejects_missing_set_or_collector() {
        assert!(parse_line(1, "1 Opt xln 65").is_err());
        assert!(parse_line(1, "1 Opt (xln)").is_err());
    }
}
