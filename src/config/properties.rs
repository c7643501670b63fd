//! Flat `key=value` property documents.
//!
//! Accepts the `.properties` syntax served by the config service and used by local
//! override files: `=`, `:` or whitespace as separator, `#`/`!` comment lines,
//! backslash line continuation, and the escapes `\t \n \r \f \uXXXX`.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

/// A parsed property document.
pub type Properties = BTreeMap<String, String>;

fn is_ws(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\u{c}')
}

/// Parse a property document. Parsing never fails; malformed escapes are kept literally.
pub fn parse(input: &str) -> Properties {
    let mut properties = Properties::new();
    let mut lines = input.lines();

    while let Some(line) = lines.next() {
        let line = line.trim_start_matches(is_ws);
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let mut logical = line.to_string();
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start_matches(is_ws)),
                None => break,
            }
        }

        let (key, value) = split_key_value(&logical);
        properties.insert(unescape(key), unescape(value));
    }

    properties
}

/// Read and parse a property file.
pub fn load(path: &Path) -> io::Result<Properties> {
    let content = fs::read_to_string(path)?;
    Ok(parse(&content))
}

fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = i;
                break;
            }
            c if is_ws(c) => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let mut rest = line[key_end..].trim_start_matches(is_ws);
    if let Some(stripped) = rest.strip_prefix(|c: char| c == '=' || c == ':') {
        rest = stripped.trim_start_matches(is_ws);
    }
    (key, rest)
}

fn unescape(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.clone().take(4).collect();
                match parse_code_unit(&hex) {
                    Some(unit) => {
                        for _ in 0..4 {
                            chars.next();
                        }
                        push_code_unit(&mut out, unit, &mut chars);
                    }
                    None => out.push('u'),
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn parse_code_unit(hex: &str) -> Option<u16> {
    if hex.len() != 4 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(hex, 16).ok()
}

/// Push a UTF-16 code unit, pairing a high surrogate with a following `\uXXXX` low one.
fn push_code_unit(
    out: &mut String,
    unit: u16,
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
) {
    if (0xD800..0xDC00).contains(&unit) {
        let mut lookahead = chars.clone();
        if lookahead.next() == Some('\\') && lookahead.next() == Some('u') {
            let hex: String = lookahead.take(4).collect();
            if let Some(low) = parse_code_unit(&hex).filter(|u| (0xDC00..0xE000).contains(u)) {
                for _ in 0..6 {
                    chars.next();
                }
                out.extend(char::decode_utf16([unit, low]).filter_map(Result::ok));
                return;
            }
        }
    }
    match char::from_u32(unit as u32) {
        Some(c) => out.push(c),
        None => out.push(char::REPLACEMENT_CHARACTER),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separators_and_comments() {
        let props = parse(
            "# comment\n\
             ! another comment\n\
             \n\
             a=1\n\
             b = 2\n\
             c:3\n\
             d 4\n\
             e\n\
             f=\n\
             \t  g  =  spaced value  \n",
        );
        assert_eq!(props["a"], "1");
        assert_eq!(props["b"], "2");
        assert_eq!(props["c"], "3");
        assert_eq!(props["d"], "4");
        assert_eq!(props["e"], "");
        assert_eq!(props["f"], "");
        assert_eq!(props["g"], "spaced value  ");
        assert_eq!(props.len(), 7);
    }

    #[test]
    fn test_continuation() {
        let props = parse("list=a,\\\n    b,\\\n    c\nnext=x\n");
        assert_eq!(props["list"], "a,b,c");
        assert_eq!(props["next"], "x");
    }

    #[test]
    fn test_escaped_backslash_is_not_continuation() {
        let props = parse("path=C:\\\\dir\\\\\nnext=x\n");
        assert_eq!(props["path"], "C:\\dir\\");
        assert_eq!(props["next"], "x");
    }

    #[test]
    fn test_escapes() {
        let props = parse("key\\=with\\:sep=tab\\there\nuni=caf\\u00e9\nemoji=\\uD83D\\uDE00\n");
        assert_eq!(props["key=with:sep"], "tab\there");
        assert_eq!(props["uni"], "café");
        assert_eq!(props["emoji"], "😀");
    }

    #[test]
    fn test_malformed_unicode_escape_kept() {
        let props = parse("a=\\u+123\nb=\\u12\n");
        assert_eq!(props["a"], "u+123");
        assert_eq!(props["b"], "u12");
    }

    #[test]
    fn test_interpolation_placeholders_kept() {
        let props = parse("server.license.dir=${cc.home}/license\n");
        assert_eq!(props["server.license.dir"], "${cc.home}/license");
    }

    #[test]
    fn test_crlf() {
        let props = parse("a=1\r\nb=2\r\n");
        assert_eq!(props["a"], "1");
        assert_eq!(props["b"], "2");
    }

    #[test]
    fn test_later_duplicate_wins() {
        let props = parse("a=1\na=2\n");
        assert_eq!(props["a"], "2");
    }
}
