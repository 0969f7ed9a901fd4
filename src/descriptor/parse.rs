//! Parser for the textual form of type descriptors.
//!
//! ```text
//! union  := atom ('[]')* ('|' atom ('[]')*)*
//! atom   := '?' atom | '(' union ')' | literal | keyword | Name ('<' union (',' union)* '>')? | Name '::' Case
//! ```
//!
//! Keywords: `null mixed int float string bool true false object never array
//! list iterable class-string negative-int positive-int non-negative-int`.
//! Bare names parse as classes; see [`TypeDescriptor::resolve_names`].
use std::str::FromStr;

use super::{Literal, TypeDescriptor};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid type expression at offset {offset}: {message}")]
pub struct ParseError {
    pub offset: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Sym(char),
    PathSep,
}

impl FromStr for TypeDescriptor {
    type Err = ParseError;

    fn from_str(src: &str) -> Result<Self, Self::Err> {
        let tokens = lex(src)?;
        let mut p = Parser { tokens, pos: 0, end: src.len() };
        let t = p.union()?;
        match p.peek() {
            None => Ok(t),
            Some(_) => Err(p.error("unexpected trailing input")),
        }
    }
}

// -------------------------------- Lexer ----------------------------------- //

fn lex(src: &str) -> Result<Vec<(usize, Tok)>, ParseError> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        let start = i;
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '<' | '>' | '{' | '}' | '(' | ')' | '[' | ']' | ',' | '|' | '?' => {
                out.push((start, Tok::Sym(c)));
                i += 1;
            }
            ':' if bytes.get(i + 1) == Some(&b':') => {
                out.push((start, Tok::PathSep));
                i += 2;
            }
            '\'' | '"' => {
                let (s, next) = lex_string(src, i, c)?;
                out.push((start, Tok::Str(s)));
                i = next;
            }
            '-' | '0'..='9' => {
                let mut j = i + 1;
                while j < bytes.len() {
                    match bytes[j] {
                        b'0'..=b'9' | b'.' | b'e' | b'E' => j += 1,
                        b'+' | b'-' if matches!(bytes[j - 1], b'e' | b'E') => j += 1,
                        _ => break,
                    }
                }
                let text = &src[i..j];
                let tok = if text.contains(['.', 'e', 'E']) {
                    text.parse::<f64>().map(Tok::Float).ok()
                } else {
                    text.parse::<i64>().map(Tok::Int).ok()
                };
                match tok {
                    Some(t) => out.push((start, t)),
                    None => return Err(ParseError { offset: start, message: format!("invalid number `{text}`") }),
                }
                i = j;
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '\\' => {
                let mut j = i + 1;
                while j < bytes.len()
                    && (bytes[j].is_ascii_alphanumeric() || matches!(bytes[j], b'_' | b'\\' | b'-'))
                {
                    j += 1;
                }
                out.push((start, Tok::Ident(src[i..j].to_string())));
                i = j;
            }
            other => {
                return Err(ParseError { offset: start, message: format!("unexpected character `{other}`") });
            }
        }
    }
    Ok(out)
}

fn lex_string(src: &str, start: usize, quote: char) -> Result<(String, usize), ParseError> {
    let mut out = String::new();
    let mut chars = src[start + 1..].char_indices();
    while let Some((off, ch)) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some((_, escaped)) => out.push(escaped),
                None => break,
            },
            c if c == quote => return Ok((out, start + 1 + off + c.len_utf8())),
            c => out.push(c),
        }
    }
    Err(ParseError { offset: start, message: "unterminated string literal".into() })
}

// -------------------------------- Parser ---------------------------------- //

struct Parser {
    tokens: Vec<(usize, Tok)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Option<Tok> {
        let t = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        t
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(o, _)| *o)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError { offset: self.offset(), message: message.into() }
    }

    fn eat(&mut self, sym: char) -> bool {
        if self.peek() == Some(&Tok::Sym(sym)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, sym: char) -> Result<(), ParseError> {
        if self.eat(sym) { Ok(()) } else { Err(self.error(format!("expected `{sym}`"))) }
    }

    fn union(&mut self) -> Result<TypeDescriptor, ParseError> {
        let mut arms = vec![self.suffixed()?];
        while self.eat('|') {
            arms.push(self.suffixed()?);
        }
        Ok(TypeDescriptor::union(arms))
    }

    // `T[]` is `array<T>`
    fn suffixed(&mut self) -> Result<TypeDescriptor, ParseError> {
        let mut t = self.atom()?;
        while self.eat('[') {
            self.expect(']')?;
            t = TypeDescriptor::list_of(t);
        }
        Ok(t)
    }

    fn list(&mut self, close: char) -> Result<Vec<TypeDescriptor>, ParseError> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Ok(items);
        }
        loop {
            items.push(self.union()?);
            if self.eat(close) {
                return Ok(items);
            }
            self.expect(',')?;
        }
    }

    fn atom(&mut self) -> Result<TypeDescriptor, ParseError> {
        let offset = self.offset();
        match self.next() {
            Some(Tok::Sym('?')) => Ok(TypeDescriptor::nullable(self.atom()?)),
            Some(Tok::Sym('(')) => {
                let inner = self.union()?;
                self.expect(')')?;
                Ok(inner)
            }
            Some(Tok::Int(i)) => Ok(TypeDescriptor::Literal(Literal::Int(i))),
            Some(Tok::Float(f)) => Ok(TypeDescriptor::literal(f)),
            Some(Tok::Str(s)) => Ok(TypeDescriptor::Literal(Literal::String(s))),
            Some(Tok::Ident(name)) => self.named(name),
            Some(_) | None => Err(ParseError { offset, message: "expected a type".into() }),
        }
    }

    fn named(&mut self, name: String) -> Result<TypeDescriptor, ParseError> {
        use TypeDescriptor as T;
        let t = match name.as_str() {
            "null" => T::Null,
            "mixed" => T::Mixed,
            "float" | "double" => T::float(),
            "string" => T::string(),
            "bool" | "boolean" => T::bool(),
            "true" => T::literal(true),
            "false" => T::literal(false),
            "object" => T::ObjectAny,
            "never" => T::never(),
            "negative-int" => T::IntRange { min: None, max: Some(-1) },
            "positive-int" => T::IntRange { min: Some(1), max: None },
            "non-negative-int" => T::IntRange { min: Some(0), max: None },
            "int" | "integer" => {
                if self.eat('<') {
                    let min = self.bound("min")?;
                    self.expect(',')?;
                    let max = self.bound("max")?;
                    self.expect('>')?;
                    T::IntRange { min, max }
                } else {
                    T::int()
                }
            }
            "array" | "iterable" => {
                if self.eat('<') {
                    let mut args = self.list('>')?;
                    match args.len() {
                        1 => T::list_of(args.remove(0)),
                        2 => {
                            let value = args.remove(1);
                            T::array_of(args.remove(0), value)
                        }
                        _ => return Err(self.error("array takes one or two type arguments")),
                    }
                } else if self.eat('{') {
                    T::shape(self.list('}')?)
                } else {
                    T::list_of(T::Mixed)
                }
            }
            "list" => {
                self.expect('<')?;
                let value = self.union()?;
                self.expect('>')?;
                T::array_of(T::int(), value)
            }
            "class-string" => {
                let bound = if self.eat('<') {
                    let b = match self.next() {
                        Some(Tok::Ident(b)) => b,
                        _ => return Err(self.error("expected a class name")),
                    };
                    self.expect('>')?;
                    Some(b)
                } else {
                    None
                };
                T::ClassString { bound }
            }
            _ => {
                if self.peek() == Some(&Tok::PathSep) {
                    self.pos += 1;
                    match self.next() {
                        Some(Tok::Ident(case)) => T::EnumCase { name, case },
                        _ => return Err(self.error("expected an enum case name")),
                    }
                } else if self.eat('<') {
                    T::generic(name, self.list('>')?)
                } else {
                    T::class(name)
                }
            }
        };
        Ok(t)
    }

    fn bound(&mut self, open: &str) -> Result<Option<i64>, ParseError> {
        match self.next() {
            Some(Tok::Int(i)) => Ok(Some(i)),
            Some(Tok::Ident(word)) if word == open => Ok(None),
            _ => Err(self.error(format!("expected an integer or `{open}`"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ScalarKind;

    fn parse(src: &str) -> TypeDescriptor {
        match src.parse() {
            Ok(t) => t,
            Err(e) => panic!("{src}: {e}"),
        }
    }

    #[test]
    fn parses_scalars_and_literals() {
        assert_eq!(parse("int"), TypeDescriptor::Scalar(ScalarKind::Int));
        assert_eq!(parse("'foo'"), TypeDescriptor::literal("foo"));
        assert_eq!(parse("\"foo\""), TypeDescriptor::literal("foo"));
        assert_eq!(parse("1.5"), TypeDescriptor::literal(1.5));
        assert_eq!(parse("-3"), TypeDescriptor::literal(-3));
        assert_eq!(parse("true"), TypeDescriptor::literal(true));
    }

    #[test]
    fn parses_arrays_and_shapes() {
        assert_eq!(parse("array<string>"), TypeDescriptor::list_of(TypeDescriptor::string()));
        assert_eq!(
            parse("iterable<string, Pair>"),
            TypeDescriptor::array_of(TypeDescriptor::string(), TypeDescriptor::class("Pair"))
        );
        assert_eq!(
            parse("array{string, int}"),
            TypeDescriptor::shape(vec![TypeDescriptor::string(), TypeDescriptor::int()])
        );
        assert_eq!(
            parse("Pair[]|null"),
            TypeDescriptor::nullable(TypeDescriptor::list_of(TypeDescriptor::class("Pair")))
        );
    }

    #[test]
    fn parses_unions_nullables_and_generics() {
        assert_eq!(parse("?string"), TypeDescriptor::nullable(TypeDescriptor::string()));
        assert_eq!(
            parse("Box<Animal, int>|null"),
            TypeDescriptor::union(vec![
                TypeDescriptor::generic("Box", vec![TypeDescriptor::class("Animal"), TypeDescriptor::int()]),
                TypeDescriptor::Null,
            ])
        );
        assert_eq!(
            parse("negative-int|int<3, 10>"),
            TypeDescriptor::union(vec![
                TypeDescriptor::IntRange { min: None, max: Some(-1) },
                TypeDescriptor::IntRange { min: Some(3), max: Some(10) },
            ])
        );
        assert_eq!(
            parse("class-string<Animal>"),
            TypeDescriptor::ClassString { bound: Some("Animal".into()) }
        );
        assert_eq!(
            parse("Suit::Hearts"),
            TypeDescriptor::EnumCase { name: "Suit".into(), case: "Hearts".into() }
        );
    }

    #[test]
    fn keywords_are_case_sensitive() {
        assert_eq!(parse("Integer"), TypeDescriptor::class("Integer"));
        assert_eq!(parse("Mixed|Never"), TypeDescriptor::union(vec![
            TypeDescriptor::class("Mixed"),
            TypeDescriptor::class("Never"),
        ]));
        assert_eq!(parse("integer"), TypeDescriptor::int());
        assert_eq!(parse("double"), TypeDescriptor::float());
    }

    #[test]
    fn exponents_take_a_sign() {
        assert_eq!(parse("1e-5"), TypeDescriptor::literal(1e-5));
        assert_eq!(parse("2E+3"), TypeDescriptor::literal(2000.0));
        assert_eq!(parse("-1.5e2|1"), TypeDescriptor::union(vec![
            TypeDescriptor::literal(-150.0),
            TypeDescriptor::literal(1),
        ]));
        assert!("1e".parse::<TypeDescriptor>().is_err());
    }

    #[test]
    fn display_output_parses_back() {
        for src in [
            "array<int|string, Pair|null>",
            "array{string, int}",
            "int<min, -1>",
            "Box<Animal, 'x'>",
            "class-string<Animal>",
            "1.0|false|null",
            "never",
        ] {
            assert_eq!(parse(src).to_string(), src);
        }
    }

    #[test]
    fn reports_offsets() {
        let err = "array<int".parse::<TypeDescriptor>().unwrap_err();
        assert_eq!(err.offset, 9);
        let err = "int $".parse::<TypeDescriptor>().unwrap_err();
        assert_eq!(err.offset, 4);
    }
}
