//! String manipulation functions
//!
//! All of these treat an empty input as empty output and operate on the
//! input as a singleton string (implicit conversion). Regular expressions
//! run in single-line mode by default (`.` matches newlines); the supported
//! flags are `i` (case-insensitive) and `m` (multi-line anchors). Compiled
//! patterns are cached per (pattern, flags).

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD as BASE64_STANDARD, URL_SAFE as BASE64_URL_SAFE};
use parking_lot::Mutex;
use regex::Regex;
use rustc_hash::FxHashMap;

use crate::core::collection::Collection;
use crate::core::error::{FhirPathError, Result};
use crate::core::value::FhirPathValue;
use crate::register_function;

use super::{FunctionCategory, FunctionRegistry};

fn single_string(value: String) -> Collection {
    Collection::single(FhirPathValue::String(value))
}

/// Compile (or fetch) a regex with the default single-line mode plus any
/// user flags applied.
pub(crate) fn compile_regex(pattern: &str, flags: &str, anchored: bool) -> Result<Arc<Regex>> {
    static CACHE: Mutex<Option<FxHashMap<(String, String, bool), Arc<Regex>>>> = Mutex::new(None);

    let mut inline = String::from("s");
    for flag in flags.chars() {
        match flag {
            'i' => inline.push('i'),
            'm' => inline.push('m'),
            other => {
                return Err(FhirPathError::domain_error(format!(
                    "unsupported regex flag '{other}'"
                )));
            }
        }
    }

    let key = (pattern.to_string(), flags.to_string(), anchored);
    let mut guard = CACHE.lock();
    let cache = guard.get_or_insert_with(FxHashMap::default);
    if let Some(hit) = cache.get(&key) {
        return Ok(hit.clone());
    }

    let full = if anchored {
        format!("(?{inline})\\A(?:{pattern})\\z")
    } else {
        format!("(?{inline}){pattern}")
    };
    let regex = Regex::new(&full)
        .map_err(|e| FhirPathError::domain_error(format!("invalid regular expression: {e}")))?;
    let regex = Arc::new(regex);
    if cache.len() >= 256 {
        cache.clear();
    }
    cache.insert(key, regex.clone());
    Ok(regex)
}

fn char_index_of(haystack: &str, needle: &str, last: bool) -> Option<usize> {
    let byte_pos = if last {
        haystack.rfind(needle)?
    } else {
        haystack.find(needle)?
    };
    Some(haystack[..byte_pos].chars().count())
}

impl FunctionRegistry {
    pub(crate) fn register_string_functions(&mut self) {
        register_function!(
            self,
            eager "indexOf",
            category: FunctionCategory::StringManipulation,
            description: "0-based index of the first occurrence of the substring, -1 if absent",
            arity: 1..=1,
            implementation: |cx| {
                let (Some(input), Some(substring)) = (cx.input_string()?, cx.string_arg(0)?)
                else {
                    return Ok(Collection::empty());
                };
                let index = match char_index_of(&input, &substring, false) {
                    Some(i) => i as i32,
                    None => -1,
                };
                Ok(Collection::single(FhirPathValue::Integer(index)))
            }
        );

        register_function!(
            self,
            eager "lastIndexOf",
            category: FunctionCategory::StringManipulation,
            description: "0-based index of the last occurrence of the substring, -1 if absent",
            arity: 1..=1,
            implementation: |cx| {
                let (Some(input), Some(substring)) = (cx.input_string()?, cx.string_arg(0)?)
                else {
                    return Ok(Collection::empty());
                };
                let index = match char_index_of(&input, &substring, true) {
                    Some(i) => i as i32,
                    None => -1,
                };
                Ok(Collection::single(FhirPathValue::Integer(index)))
            }
        );

        register_function!(
            self,
            eager "substring",
            category: FunctionCategory::StringManipulation,
            description: "Part of the string starting at the 0-based start index",
            arity: 1..=2,
            implementation: |cx| {
                let (Some(input), Some(start)) = (cx.input_string()?, cx.integer_arg(0)?) else {
                    return Ok(Collection::empty());
                };
                let total = input.chars().count();
                if start < 0 || start as usize >= total {
                    return Ok(Collection::empty());
                }
                let start = start as usize;
                let length = match cx.arg(1) {
                    None => total - start,
                    Some(_) => match cx.integer_arg(1)? {
                        Some(length) if length >= 0 => length as usize,
                        // A present-but-empty or negative length yields empty.
                        _ => return Ok(Collection::empty()),
                    },
                };
                let result: String = input.chars().skip(start).take(length).collect();
                Ok(single_string(result))
            }
        );

        register_function!(
            self,
            eager "startsWith",
            category: FunctionCategory::StringManipulation,
            description: "True when the string starts with the given prefix",
            arity: 1..=1,
            implementation: |cx| {
                let (Some(input), Some(prefix)) = (cx.input_string()?, cx.string_arg(0)?) else {
                    return Ok(Collection::empty());
                };
                Ok(Collection::single(FhirPathValue::Boolean(
                    input.starts_with(&prefix),
                )))
            }
        );

        register_function!(
            self,
            eager "endsWith",
            category: FunctionCategory::StringManipulation,
            description: "True when the string ends with the given suffix",
            arity: 1..=1,
            implementation: |cx| {
                let (Some(input), Some(suffix)) = (cx.input_string()?, cx.string_arg(0)?) else {
                    return Ok(Collection::empty());
                };
                Ok(Collection::single(FhirPathValue::Boolean(
                    input.ends_with(&suffix),
                )))
            }
        );

        register_function!(
            self,
            eager "contains",
            category: FunctionCategory::StringManipulation,
            description: "True when the string contains the given substring",
            arity: 1..=1,
            implementation: |cx| {
                let (Some(input), Some(substring)) = (cx.input_string()?, cx.string_arg(0)?)
                else {
                    return Ok(Collection::empty());
                };
                Ok(Collection::single(FhirPathValue::Boolean(
                    input.contains(&substring),
                )))
            }
        );

        register_function!(
            self,
            eager "upper",
            category: FunctionCategory::StringManipulation,
            description: "The string in upper case",
            arity: 0..=0,
            implementation: |cx| {
                Ok(match cx.input_string()? {
                    Some(input) => single_string(input.to_uppercase()),
                    None => Collection::empty(),
                })
            }
        );

        register_function!(
            self,
            eager "lower",
            category: FunctionCategory::StringManipulation,
            description: "The string in lower case",
            arity: 0..=0,
            implementation: |cx| {
                Ok(match cx.input_string()? {
                    Some(input) => single_string(input.to_lowercase()),
                    None => Collection::empty(),
                })
            }
        );

        register_function!(
            self,
            eager "replace",
            category: FunctionCategory::StringManipulation,
            description: "The string with every occurrence of a pattern substituted",
            arity: 2..=2,
            implementation: |cx| {
                let (Some(input), Some(pattern), Some(substitution)) =
                    (cx.input_string()?, cx.string_arg(0)?, cx.string_arg(1)?)
                else {
                    return Ok(Collection::empty());
                };
                // An empty pattern surrounds every character.
                let result = if pattern.is_empty() {
                    let mut out = substitution.clone();
                    for ch in input.chars() {
                        out.push(ch);
                        out.push_str(&substitution);
                    }
                    out
                } else {
                    input.replace(&pattern, &substitution)
                };
                Ok(single_string(result))
            }
        );

        register_function!(
            self,
            eager "matches",
            category: FunctionCategory::StringManipulation,
            description: "True when the regex matches anywhere in the string",
            arity: 1..=2,
            implementation: |cx| {
                let (Some(input), Some(pattern)) = (cx.input_string()?, cx.string_arg(0)?)
                else {
                    return Ok(Collection::empty());
                };
                let flags = cx.string_arg(1)?.unwrap_or_default();
                let regex = compile_regex(&pattern, &flags, false)?;
                Ok(Collection::single(FhirPathValue::Boolean(
                    regex.is_match(&input),
                )))
            }
        );

        register_function!(
            self,
            eager "matchesFull",
            category: FunctionCategory::StringManipulation,
            description: "True when the regex matches the entire string",
            arity: 1..=2,
            implementation: |cx| {
                let (Some(input), Some(pattern)) = (cx.input_string()?, cx.string_arg(0)?)
                else {
                    return Ok(Collection::empty());
                };
                let flags = cx.string_arg(1)?.unwrap_or_default();
                let regex = compile_regex(&pattern, &flags, true)?;
                Ok(Collection::single(FhirPathValue::Boolean(
                    regex.is_match(&input),
                )))
            }
        );

        register_function!(
            self,
            eager "replaceMatches",
            category: FunctionCategory::StringManipulation,
            description: "The string with every regex match substituted",
            arity: 2..=3,
            implementation: |cx| {
                let (Some(input), Some(pattern), Some(substitution)) =
                    (cx.input_string()?, cx.string_arg(0)?, cx.string_arg(1)?)
                else {
                    return Ok(Collection::empty());
                };
                let flags = cx.string_arg(2)?.unwrap_or_default();
                let regex = compile_regex(&pattern, &flags, false)?;
                Ok(single_string(
                    regex.replace_all(&input, substitution.as_str()).into_owned(),
                ))
            }
        );

        register_function!(
            self,
            eager "length",
            category: FunctionCategory::StringManipulation,
            description: "Number of characters in the string",
            arity: 0..=0,
            implementation: |cx| {
                Ok(match cx.input_string()? {
                    Some(input) => {
                        Collection::single(FhirPathValue::Integer(input.chars().count() as i32))
                    }
                    None => Collection::empty(),
                })
            }
        );

        register_function!(
            self,
            eager "toChars",
            category: FunctionCategory::StringManipulation,
            description: "The string's characters as a collection of single-character strings",
            arity: 0..=0,
            implementation: |cx| {
                Ok(match cx.input_string()? {
                    Some(input) => Collection::from_values(
                        input
                            .chars()
                            .map(|ch| FhirPathValue::String(ch.to_string()))
                            .collect(),
                    ),
                    None => Collection::empty(),
                })
            }
        );

        register_function!(
            self,
            eager "trim",
            category: FunctionCategory::StringManipulation,
            description: "The string without leading and trailing whitespace",
            arity: 0..=0,
            implementation: |cx| {
                Ok(match cx.input_string()? {
                    Some(input) => single_string(input.trim().to_string()),
                    None => Collection::empty(),
                })
            }
        );

        register_function!(
            self,
            eager "split",
            category: FunctionCategory::StringManipulation,
            description: "The string split around a separator",
            arity: 1..=1,
            implementation: |cx| {
                let (Some(input), Some(separator)) = (cx.input_string()?, cx.string_arg(0)?)
                else {
                    return Ok(Collection::empty());
                };
                let parts: Vec<FhirPathValue> = if separator.is_empty() {
                    input
                        .chars()
                        .map(|ch| FhirPathValue::String(ch.to_string()))
                        .collect()
                } else {
                    input
                        .split(separator.as_str())
                        .map(|part| FhirPathValue::String(part.to_string()))
                        .collect()
                };
                Ok(Collection::from_values(parts))
            }
        );

        register_function!(
            self,
            eager "join",
            category: FunctionCategory::StringManipulation,
            description: "The input strings concatenated with a separator",
            arity: 0..=1,
            implementation: |cx| {
                let separator = cx.string_arg(0)?.unwrap_or_default();
                let mut parts = Vec::with_capacity(cx.input.len());
                for item in cx.input.iter() {
                    let part = item.to_string_value(false).ok_or_else(|| {
                        FhirPathError::type_error(format!(
                            "join() requires string items, got {}",
                            item.type_name()
                        ))
                    })?;
                    parts.push(part);
                }
                Ok(single_string(parts.join(&separator)))
            }
        );

        register_function!(
            self,
            eager "encode",
            category: FunctionCategory::StringManipulation,
            description: "The string encoded as hex, base64 or urlbase64",
            arity: 1..=1,
            implementation: |cx| {
                let (Some(input), Some(format)) = (cx.input_string()?, cx.string_arg(0)?) else {
                    return Ok(Collection::empty());
                };
                let encoded = match format.as_str() {
                    "hex" => hex::encode(input.as_bytes()),
                    "base64" => BASE64_STANDARD.encode(input.as_bytes()),
                    "urlbase64" => BASE64_URL_SAFE.encode(input.as_bytes()),
                    other => {
                        return Err(FhirPathError::domain_error(format!(
                            "unsupported encoding '{other}'"
                        )));
                    }
                };
                Ok(single_string(encoded))
            }
        );

        register_function!(
            self,
            eager "decode",
            category: FunctionCategory::StringManipulation,
            description: "The hex, base64 or urlbase64 string decoded",
            arity: 1..=1,
            implementation: |cx| {
                let (Some(input), Some(format)) = (cx.input_string()?, cx.string_arg(0)?) else {
                    return Ok(Collection::empty());
                };
                let bytes = match format.as_str() {
                    "hex" => hex::decode(input.as_bytes()).map_err(|e| {
                        FhirPathError::domain_error(format!("invalid hex input: {e}"))
                    })?,
                    "base64" => BASE64_STANDARD.decode(input.as_bytes()).map_err(|e| {
                        FhirPathError::domain_error(format!("invalid base64 input: {e}"))
                    })?,
                    "urlbase64" => BASE64_URL_SAFE.decode(input.as_bytes()).map_err(|e| {
                        FhirPathError::domain_error(format!("invalid urlbase64 input: {e}"))
                    })?,
                    other => {
                        return Err(FhirPathError::domain_error(format!(
                            "unsupported encoding '{other}'"
                        )));
                    }
                };
                let decoded = String::from_utf8(bytes).map_err(|_| {
                    FhirPathError::domain_error("decoded bytes are not valid UTF-8")
                })?;
                Ok(single_string(decoded))
            }
        );

        register_function!(
            self,
            eager "escape",
            category: FunctionCategory::StringManipulation,
            description: "The string escaped for html or json embedding",
            arity: 1..=1,
            implementation: |cx| {
                let (Some(input), Some(target)) = (cx.input_string()?, cx.string_arg(0)?) else {
                    return Ok(Collection::empty());
                };
                let escaped = match target.as_str() {
                    "html" => escape_html(&input),
                    "json" => escape_json(&input),
                    other => {
                        return Err(FhirPathError::domain_error(format!(
                            "unsupported escape target '{other}'"
                        )));
                    }
                };
                Ok(single_string(escaped))
            }
        );

        register_function!(
            self,
            eager "unescape",
            category: FunctionCategory::StringManipulation,
            description: "The html or json escaping reversed",
            arity: 1..=1,
            implementation: |cx| {
                let (Some(input), Some(target)) = (cx.input_string()?, cx.string_arg(0)?) else {
                    return Ok(Collection::empty());
                };
                let unescaped = match target.as_str() {
                    "html" => unescape_html(&input),
                    "json" => unescape_json(&input)?,
                    other => {
                        return Err(FhirPathError::domain_error(format!(
                            "unsupported escape target '{other}'"
                        )));
                    }
                };
                Ok(single_string(unescaped))
            }
        );
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let entity_end = rest.find(';').map(|i| i + 1);
        let replaced = entity_end.and_then(|end| {
            let entity = &rest[..end];
            let ch = match entity {
                "&amp;" => '&',
                "&lt;" => '<',
                "&gt;" => '>',
                "&quot;" => '"',
                "&#39;" | "&apos;" => '\'',
                _ => return None,
            };
            Some((ch, end))
        });
        match replaced {
            Some((ch, end)) => {
                out.push(ch);
                rest = &rest[end..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn escape_json(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            ch if (ch as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", ch as u32));
            }
            other => out.push(other),
        }
    }
    out
}

fn unescape_json(input: &str) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let digits: String = chars.by_ref().take(4).collect();
                if digits.len() != 4 {
                    return Err(FhirPathError::domain_error("truncated \\u escape"));
                }
                let code = u32::from_str_radix(&digits, 16).map_err(|_| {
                    FhirPathError::domain_error("invalid \\u escape")
                })?;
                match char::from_u32(code) {
                    Some(ch) => out.push(ch),
                    None => return Err(FhirPathError::domain_error("invalid \\u code point")),
                }
            }
            _ => return Err(FhirPathError::domain_error("invalid JSON escape")),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_escaping_round_trip() {
        let raw = "a < b & 'c' > \"d\"";
        let escaped = escape_html(raw);
        assert_eq!(escaped, "a &lt; b &amp; &#39;c&#39; &gt; &quot;d&quot;");
        assert_eq!(unescape_html(&escaped), raw);
        assert_eq!(unescape_html("&apos;x&unknown;"), "'x&unknown;");
    }

    #[test]
    fn json_escaping_round_trip() {
        let raw = "line\nbreak\t\"quoted\"\\";
        let escaped = escape_json(raw);
        assert_eq!(escaped, "line\\nbreak\\t\\\"quoted\\\"\\\\");
        assert_eq!(unescape_json(&escaped).unwrap(), raw);
        assert_eq!(unescape_json("\\u0041").unwrap(), "A");
        assert!(unescape_json("\\u00").is_err());
    }

    #[test]
    fn regex_default_is_single_line() {
        let regex = compile_regex("hello.world", "i", false).unwrap();
        assert!(regex.is_match("Hello\nWorld"));
        let anchored = compile_regex("hel", "", true).unwrap();
        assert!(!anchored.is_match("hello"));
        assert!(compile_regex("a", "x", false).is_err());
        assert!(compile_regex("(", "", false).is_err());
    }
}
