//! Line-based INI tokenizer for rule scripts.
//!
//! Delivers every `key=value` pair to a callback together with the current
//! `[section]` name, in file order. The rule grammar depends on repeated
//! keys (`CellLayout=` appends a row per occurrence), so pairs are never
//! collapsed or reordered. The callback returning `false` aborts parsing
//! with the offending line number.

use crate::{Error, Result};

/// Parse `data` and invoke `on_triple(section, key, value)` per pair.
///
/// Leading/trailing whitespace is trimmed from section names, keys and
/// values. Lines starting with `;` or `#` are comments; inline comments are
/// not stripped, value handlers deal with those themselves.
pub fn parse<F>(data: &[u8], mut on_triple: F) -> Result<()>
where
    F: FnMut(&str, &str, &str) -> bool,
{
    let text = String::from_utf8_lossy(data);
    let mut section = String::new();

    for (index, raw_line) in text.lines().enumerate() {
        let line_number = index + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if let Some(rest) = line.strip_prefix('[') {
            let Some(name) = rest.strip_suffix(']') else {
                return Err(Error::IniSyntax { line: line_number });
            };
            section = name.trim().to_string();
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(Error::IniSyntax { line: line_number });
        };
        if !on_triple(&section, key.trim(), value.trim()) {
            return Err(Error::Rul0Syntax { line: line_number });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivers_triples_in_order() {
        let text = b"; comment\nA=1\n[Sec]\nB=2\nB=3\n";
        let mut seen = Vec::new();
        parse(text, |section, key, value| {
            seen.push((section.to_string(), key.to_string(), value.to_string()));
            true
        })
        .unwrap();
        assert_eq!(
            seen,
            vec![
                (String::new(), "A".into(), "1".into()),
                ("Sec".into(), "B".into(), "2".into()),
                ("Sec".into(), "B".into(), "3".into()),
            ]
        );
    }

    #[test]
    fn test_reports_line_numbers() {
        let text = b"A=1\nnot a pair\n";
        let err = parse(text, |_, _, _| true).unwrap_err();
        assert!(matches!(err, Error::IniSyntax { line: 2 }));

        let text = b"\nA=1\n";
        let err = parse(text, |_, _, _| false).unwrap_err();
        assert!(matches!(err, Error::Rul0Syntax { line: 2 }));
    }

    #[test]
    fn test_unterminated_section_fails() {
        let err = parse(b"[Oops\n", |_, _, _| true).unwrap_err();
        assert!(matches!(err, Error::IniSyntax { line: 1 }));
    }

    #[test]
    fn test_trims_whitespace() {
        parse(b"  [ S ] \n  K = V \n", |section, key, value| {
            assert_eq!((section, key, value), ("S", "K", "V"));
            true
        })
        .unwrap();
    }
}
