//! Parser strict pour les paramètres additionnels
//!
//! N'accepte qu'un littéral de mapping dont les valeurs sont scalaires :
//!
//! ```text
//! {'limit': 1000, "order_by": "id desc", 'flag': True, 'ratio': 0.5}
//! ```
//!
//! Clés : chaînes entre apostrophes ou guillemets. Valeurs : chaîne, entier,
//! flottant, `true`/`false` (ou `True`/`False`). Virgule finale tolérée.
//! Tout le reste est rejeté.

use super::{ParamValue, QueryParameters};
use crate::StrideError;

/// Parse le texte des paramètres additionnels
///
/// Seul le texte vide donne un mapping vide ; un texte fait d'espaces est
/// rejeté comme tout autre littéral invalide.
pub fn parse(text: &str) -> Result<QueryParameters, StrideError> {
    if text.is_empty() {
        return Ok(QueryParameters::new());
    }

    let mut parser = Parser {
        data: text.as_bytes(),
        pos: 0,
    };

    parser.skip_ws();
    let params = parser.mapping()?;

    parser.skip_ws();
    if !parser.at_end() {
        return Err(parser.error("unexpected trailing characters"));
    }
    Ok(params)
}

struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    fn error(&self, reason: &str) -> StrideError {
        StrideError::InvalidParameterFormat(format!("{} at position {}", reason, self.pos))
    }

    fn expect(&mut self, byte: u8) -> Result<(), StrideError> {
        self.skip_ws();
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    fn mapping(&mut self) -> Result<QueryParameters, StrideError> {
        if self.peek() != Some(b'{') {
            return Err(self.error("expected a mapping literal"));
        }
        self.pos += 1;

        let mut params = QueryParameters::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(b'}') {
                self.pos += 1;
                return Ok(params);
            }

            let key = match self.peek() {
                Some(q @ (b'\'' | b'"')) => self.string(q)?,
                _ => return Err(self.error("expected a quoted key")),
            };
            self.expect(b':')?;
            self.skip_ws();
            let value = self.scalar()?;
            params.insert(key, value);

            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {}
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn scalar(&mut self) -> Result<ParamValue, StrideError> {
        match self.peek() {
            Some(q @ (b'\'' | b'"')) => Ok(ParamValue::Text(self.string(q)?)),
            Some(b'-' | b'+' | b'.' | b'0'..=b'9') => self.number(),
            Some(b'a'..=b'z' | b'A'..=b'Z') => {
                let start = self.pos;
                while matches!(self.peek(), Some(b'a'..=b'z' | b'A'..=b'Z')) {
                    self.pos += 1;
                }
                match &self.data[start..self.pos] {
                    b"true" | b"True" => Ok(ParamValue::Bool(true)),
                    b"false" | b"False" => Ok(ParamValue::Bool(false)),
                    _ => {
                        self.pos = start;
                        Err(self.error("only scalar values are allowed"))
                    }
                }
            }
            _ => Err(self.error("only scalar values are allowed")),
        }
    }

    fn string(&mut self, quote: u8) -> Result<String, StrideError> {
        self.pos += 1;
        let mut out = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some(b) if b == quote => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    let escaped = match self.peek() {
                        Some(b'n') => b'\n',
                        Some(b't') => b'\t',
                        Some(b'r') => b'\r',
                        Some(c @ (b'\\' | b'\'' | b'"')) => c,
                        _ => return Err(self.error("unsupported escape sequence")),
                    };
                    out.push(escaped);
                    self.pos += 1;
                }
                Some(b) => {
                    out.push(b);
                    self.pos += 1;
                }
            }
        }
        String::from_utf8(out).map_err(|_| self.error("invalid UTF-8 in string"))
    }

    fn number(&mut self) -> Result<ParamValue, StrideError> {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E' | b'_')
        ) {
            self.pos += 1;
        }
        let text: String = std::str::from_utf8(&self.data[start..self.pos])
            .unwrap_or("")
            .chars()
            .filter(|&c| c != '_')
            .collect();

        if let Ok(i) = text.parse::<i64>() {
            return Ok(ParamValue::Int(i));
        }
        match text.parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(ParamValue::Float(f)),
            _ => {
                self.pos = start;
                Err(self.error("invalid number"))
            }
        }
    }
}
