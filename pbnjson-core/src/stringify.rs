//! Stringifier (§4.10): walks a [`Value`] with a visitor that re-emits the
//! same token vocabulary the lexer produces, in reverse.

use crate::error::Error;
use crate::value::{NumberReprKind, Value};

/// Serializes `value` to compact JSON bytes. Never fails: every [`Value`]
/// constructed through this crate's API is already well-formed enough to
/// stringify (malformed UTF-8 strings degrade to `�` replacement, the
/// same behavior `String::from_utf8_lossy` gives the DOM builder's mirror
/// image).
pub fn stringify(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_value(value, None, 0, &mut out);
    out
}

/// Serializes `value` with newline- and indent-separated formatting.
/// `indent` must consist only of whitespace characters (`\n`, `\v`, `\f`,
/// `\t`, `\r`, and space); this validation is this crate's own addition, not
/// a ported behavior (see DESIGN.md).
pub fn prettify(value: &Value, indent: &str) -> Result<Vec<u8>, Error> {
    if !indent.chars().all(is_pretty_whitespace) {
        return Err(Error::InvalidArgs(format!(
            "prettify indent must be whitespace only, got {indent:?}"
        )));
    }
    let mut out = Vec::new();
    write_value(value, Some(indent), 0, &mut out);
    Ok(out)
}

fn is_pretty_whitespace(c: char) -> bool {
    matches!(c, '\n' | '\u{0B}' | '\u{0C}' | '\t' | '\r' | ' ')
}

fn write_value(value: &Value, indent: Option<&str>, depth: usize, out: &mut Vec<u8>) {
    if value.is_invalid() {
        out.extend_from_slice(b"null");
    } else if value.is_null() {
        out.extend_from_slice(b"null");
    } else if value.is_bool() {
        let (b, _) = value.as_bool();
        out.extend_from_slice(if b { b"true" } else { b"false" });
    } else if value.is_number() {
        write_number(value, out);
    } else if value.is_string() {
        write_escaped_str(value.as_str_bytes().unwrap_or(&[]), out);
    } else if value.is_array() {
        write_array(value, indent, depth, out);
    } else if value.is_object() {
        write_object(value, indent, depth, out);
    }
}

fn write_number(value: &Value, out: &mut Vec<u8>) {
    match value.number_repr_kind() {
        Some(NumberReprKind::Raw) => {
            if let Some(bytes) = value.as_raw_bytes() {
                out.extend_from_slice(bytes);
            }
        }
        Some(NumberReprKind::Integer) => {
            let (n, _) = value.as_i64();
            out.extend_from_slice(n.to_string().as_bytes());
        }
        Some(NumberReprKind::Float) | None => {
            let (f, _) = value.as_f64();
            out.extend_from_slice(format_g14(f).as_bytes());
        }
    }
}

/// Emulates the `%.14g` printf style: up to 14 significant digits, trailing
/// zeros trimmed, switching to exponential form for very large or very small
/// magnitudes the way `%g` does.
fn format_g14(f: f64) -> String {
    if f.is_nan() {
        return "null".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "1e400" } else { "-1e400" }.to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0".to_string() } else { "0".to_string() };
    }

    const PRECISION: usize = 14;
    let exponent = f.abs().log10().floor() as i32;
    let use_exponential = exponent < -4 || exponent >= PRECISION as i32;

    if use_exponential {
        let mantissa_digits = PRECISION.saturating_sub(1);
        let formatted = format!("{f:.mantissa_digits$e}");
        normalize_exponential(&formatted)
    } else {
        let decimals = (PRECISION as i32 - 1 - exponent).max(0) as usize;
        let formatted = format!("{f:.decimals$}");
        trim_trailing_zeros(&formatted)
    }
}

fn trim_trailing_zeros(s: &str) -> String {
    if !s.contains('.') {
        return s.to_string();
    }
    let trimmed = s.trim_end_matches('0');
    let trimmed = trimmed.trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn normalize_exponential(s: &str) -> String {
    let Some((mantissa, exponent)) = s.split_once('e') else {
        return s.to_string();
    };
    let mantissa = trim_trailing_zeros(mantissa);
    let exponent_value: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent_value >= 0 { "+" } else { "-" };
    format!("{mantissa}e{sign}{:02}", exponent_value.abs())
}

fn write_escaped_str(bytes: &[u8], out: &mut Vec<u8>) {
    out.push(b'"');
    let text = String::from_utf8_lossy(bytes);
    for c in text.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            '\u{08}' => out.extend_from_slice(b"\\b"),
            '\u{0C}' => out.extend_from_slice(b"\\f"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

fn write_array(value: &Value, indent: Option<&str>, depth: usize, out: &mut Vec<u8>) {
    let items = value.items();
    out.push(b'[');
    if items.is_empty() {
        out.push(b']');
        return;
    }
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }
        newline_indent(indent, depth + 1, out);
        write_value(item, indent, depth + 1, out);
    }
    newline_indent(indent, depth, out);
    out.push(b']');
}

fn write_object(value: &Value, indent: Option<&str>, depth: usize, out: &mut Vec<u8>) {
    let entries = value.entries();
    out.push(b'{');
    if entries.is_empty() {
        out.push(b'}');
        return;
    }
    for (i, (key, val)) in entries.iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }
        newline_indent(indent, depth + 1, out);
        write_escaped_str(key.as_bytes(), out);
        out.push(b':');
        if indent.is_some() {
            out.push(b' ');
        }
        write_value(val, indent, depth + 1, out);
    }
    newline_indent(indent, depth, out);
    out.push(b'}');
}

fn newline_indent(indent: Option<&str>, depth: usize, out: &mut Vec<u8>) {
    if let Some(unit) = indent {
        out.push(b'\n');
        for _ in 0..depth {
            out.extend_from_slice(unit.as_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::dom::DomBuilder;

    fn parse(input: &[u8]) -> Value {
        let mut lexer = Lexer::new();
        let mut builder = DomBuilder::new();
        assert!(lexer.feed(input, &mut builder));
        assert!(lexer.end(&mut builder));
        builder.finish().expect("document did not close")
    }

    #[test]
    fn compact_round_trips_scalars_and_containers() {
        let v = parse(br#"{"a":[1,2.5,true,null,"x\ny"]}"#);
        let out = stringify(&v);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"{"a":[1,2.5,true,null,"x\ny"]}"#
        );
    }

    #[test]
    fn escapes_quote_backslash_and_control_chars() {
        let v = Value::string_copied("a\"b\\c\u{01}d");
        let out = stringify(&v);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\"a\\\"b\\\\c\\u0001d\""
        );
    }

    #[test]
    fn prettify_rejects_non_whitespace_indent() {
        let v = Value::null();
        assert!(prettify(&v, "xx").is_err());
    }

    #[test]
    fn prettify_indents_nested_containers() {
        let v = parse(br#"{"a":[1]}"#);
        let out = prettify(&v, "  ").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "{\n  \"a\": [\n    1\n  ]\n}");
    }

    #[test]
    fn float_uses_g14_style() {
        let v = Value::from_f64(1.05960464477550000000_f64);
        let out = stringify(&v);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("1.0596046447755"), "got {text}");
    }

    #[test]
    fn integer_avoids_exponential_notation() {
        let v = Value::from_i64(1234567890);
        assert_eq!(stringify(&v), b"1234567890");
    }

    #[test]
    fn raw_number_passes_through_verbatim() {
        let v = parse(b"1.050");
        assert_eq!(stringify(&v), b"1.050");
    }
}
