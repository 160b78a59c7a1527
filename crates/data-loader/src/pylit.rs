//! Parser for the Python-literal list columns in the movie CSVs.
//!
//! The `genres`, `keywords`, `cast` and `crew` columns are `repr()` dumps of
//! Python lists of dicts:
//!
//! ```text
//! [{'id': 16, 'name': 'Animation'}, {'id': 35, 'name': "Children's"}]
//! ```
//!
//! That is not JSON (single quotes, `None`, `True`), so this module carries a
//! small recursive-descent parser for the subset of Python literal syntax
//! those dumps use.

use std::fmt;

/// Deepest bracket nesting accepted; the column dumps never exceed 3
const MAX_DEPTH: usize = 64;

/// A parsed Python literal
#[derive(Debug, Clone, PartialEq)]
pub enum PyValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Lists and tuples both land here
    List(Vec<PyValue>),
    /// Key/value pairs in source order
    Dict(Vec<(PyValue, PyValue)>),
}

impl PyValue {
    /// Look up a string key in a dict; `None` for non-dicts
    pub fn get(&self, key: &str) -> Option<&PyValue> {
        match self {
            PyValue::Dict(pairs) => pairs
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PyValue]> {
        match self {
            PyValue::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Error produced when a cell is not a valid literal
#[derive(Debug, Clone, PartialEq)]
pub struct LiteralError {
    pub offset: usize,
    pub reason: String,
}

impl fmt::Display for LiteralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}", self.reason, self.offset)
    }
}

impl std::error::Error for LiteralError {}

/// Parse one complete literal; trailing non-whitespace is an error.
pub fn parse(input: &str) -> Result<PyValue, LiteralError> {
    let mut parser = Parser {
        src: input.as_bytes(),
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos != parser.src.len() {
        return Err(parser.error("trailing characters"));
    }
    Ok(value)
}

/// `name` of every dict in a list literal, in order.
///
/// Dicts without a string `name` are skipped.
pub fn names(input: &str) -> Result<Vec<String>, LiteralError> {
    names_where(input, |_| true)
}

/// `name` of every dict in a list literal for which `keep` holds.
pub fn names_where<F>(input: &str, keep: F) -> Result<Vec<String>, LiteralError>
where
    F: Fn(&PyValue) -> bool,
{
    let value = parse(input)?;
    let items = value.as_list().unwrap_or(&[]);
    Ok(items
        .iter()
        .filter(|item| keep(item))
        .filter_map(|item| item.get("name").and_then(PyValue::as_str))
        .map(str::to_string)
        .collect())
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, reason: impl Into<String>) -> LiteralError {
        LiteralError {
            offset: self.pos,
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), LiteralError> {
        self.skip_ws();
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", byte as char)))
        }
    }

    fn value(&mut self) -> Result<PyValue, LiteralError> {
        self.skip_ws();
        match self.peek() {
            Some(b'[') => self.nested(|p| p.sequence(b'[', b']')),
            Some(b'(') => self.nested(|p| p.sequence(b'(', b')')),
            Some(b'{') => self.nested(Self::dict),
            Some(quote @ (b'\'' | b'"')) => self.string(quote).map(PyValue::Str),
            Some(b) if b == b'-' || b == b'+' || b == b'.' || b.is_ascii_digit() => self.number(),
            Some(b) if b.is_ascii_alphabetic() => self.ident(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn nested<F>(&mut self, parse: F) -> Result<PyValue, LiteralError>
    where
        F: FnOnce(&mut Self) -> Result<PyValue, LiteralError>,
    {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn sequence(&mut self, open: u8, close: u8) -> Result<PyValue, LiteralError> {
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(PyValue::List(items));
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b) if b == close => {}
                _ => return Err(self.error("expected ',' or closing bracket")),
            }
        }
    }

    fn dict(&mut self) -> Result<PyValue, LiteralError> {
        self.expect(b'{')?;
        let mut pairs = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(b'}') {
                self.pos += 1;
                return Ok(PyValue::Dict(pairs));
            }
            let key = self.value()?;
            self.expect(b':')?;
            let value = self.value()?;
            pairs.push((key, value));
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {}
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn string(&mut self, quote: u8) -> Result<String, LiteralError> {
        self.pos += 1;
        let mut out: Vec<u8> = Vec::new();
        loop {
            let b = self.peek().ok_or_else(|| self.error("unterminated string"))?;
            self.pos += 1;
            if b == quote {
                break;
            }
            if b != b'\\' {
                out.push(b);
                continue;
            }
            let esc = self.peek().ok_or_else(|| self.error("unterminated escape"))?;
            self.pos += 1;
            match esc {
                b'\\' | b'\'' | b'"' => out.push(esc),
                b'n' => out.push(b'\n'),
                b'r' => out.push(b'\r'),
                b't' => out.push(b'\t'),
                b'x' => self.push_code_point(&mut out, 2)?,
                b'u' => self.push_code_point(&mut out, 4)?,
                b'U' => self.push_code_point(&mut out, 8)?,
                other => {
                    out.push(b'\\');
                    out.push(other);
                }
            }
        }
        // Splits only happen on ASCII bytes, so multi-byte sequences stay whole.
        String::from_utf8(out).map_err(|_| self.error("invalid UTF-8 in string"))
    }

    fn push_code_point(&mut self, out: &mut Vec<u8>, digits: usize) -> Result<(), LiteralError> {
        let end = self.pos + digits;
        let hex = self
            .src
            .get(self.pos..end)
            .and_then(|h| std::str::from_utf8(h).ok())
            .ok_or_else(|| self.error("truncated escape"))?;
        let code = u32::from_str_radix(hex, 16).map_err(|_| self.error("bad hex escape"))?;
        let ch = char::from_u32(code).ok_or_else(|| self.error("escape is not a code point"))?;
        let mut buf = [0u8; 4];
        out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
        self.pos = end;
        Ok(())
    }

    fn number(&mut self) -> Result<PyValue, LiteralError> {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(b) if b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E')
        ) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.src[start..self.pos])
            .map_err(|_| self.error("invalid number"))?;
        if let Ok(i) = text.parse::<i64>() {
            return Ok(PyValue::Int(i));
        }
        text.parse::<f64>()
            .map(PyValue::Float)
            .map_err(|_| self.error(format!("invalid number '{}'", text)))
    }

    fn ident(&mut self) -> Result<PyValue, LiteralError> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'_') {
            self.pos += 1;
        }
        match &self.src[start..self.pos] {
            b"None" => Ok(PyValue::None),
            b"True" => Ok(PyValue::Bool(true)),
            b"False" => Ok(PyValue::Bool(false)),
            b"nan" => Ok(PyValue::Float(f64::NAN)),
            b"inf" => Ok(PyValue::Float(f64::INFINITY)),
            _ => {
                self.pos = start;
                Err(self.error("unknown identifier"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_genre_list() {
        let names = names("[{'id': 16, 'name': 'Animation'}, {'id': 35, 'name': 'Comedy'}]").unwrap();
        assert_eq!(names, vec!["Animation", "Comedy"]);
    }

    #[test]
    fn test_double_quoted_and_escaped_strings() {
        let names = names(r#"[{'name': "Children's"}, {'name': 'It\'s ét\xe9'}]"#).unwrap();
        assert_eq!(names, vec!["Children's", "It's été"]);
    }

    #[test]
    fn test_non_ascii_passthrough() {
        let names = names("[{'name': 'Amélie Poulain'}]").unwrap();
        assert_eq!(names, vec!["Amélie Poulain"]);
    }

    #[test]
    fn test_none_bool_and_floats() {
        let value = parse("{'a': None, 'b': True, 'c': -1.5, 'd': (1, 2,)}").unwrap();
        assert_eq!(value.get("a"), Some(&PyValue::None));
        assert_eq!(value.get("b"), Some(&PyValue::Bool(true)));
        assert_eq!(value.get("c"), Some(&PyValue::Float(-1.5)));
        assert_eq!(
            value.get("d"),
            Some(&PyValue::List(vec![PyValue::Int(1), PyValue::Int(2)]))
        );
    }

    #[test]
    fn test_filter_directors() {
        let crew = "[{'job': 'Director', 'name': 'John Lasseter'}, \
                    {'job': 'Screenplay', 'name': 'Joss Whedon'}, \
                    {'job': 'Director', 'name': 'Co Director'}]";
        let directors =
            names_where(crew, |item| item.get("job").and_then(PyValue::as_str) == Some("Director"))
                .unwrap();
        assert_eq!(directors, vec!["John Lasseter", "Co Director"]);
    }

    #[test]
    fn test_empty_list_and_errors() {
        assert!(names("[]").unwrap().is_empty());
        assert!(parse("[{'name': 'x'").is_err());
        assert!(parse("[1] junk").is_err());
        assert!(parse("[{'name': 'unterminated}]").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let ok = format!("{}{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));
        assert!(parse(&ok).is_ok());

        let deep = format!("{}{}", "[".repeat(MAX_DEPTH + 1), "]".repeat(MAX_DEPTH + 1));
        assert_eq!(parse(&deep).unwrap_err().reason, "nesting too deep");

        // unterminated and far past the limit
        let err = names(&"[{'a': (".repeat(200_000)).unwrap_err();
        assert_eq!(err.reason, "nesting too deep");
    }
}
