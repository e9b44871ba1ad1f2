//! # Annotation Parser
//!
//! One-time translation of annotation text into a [`TypeDescriptor`].
//!
//! ```text
//! expr    := term ('|' term)*
//! term    := STRING                       -- quoted forward reference
//!          | NAME ('[' args ']')?
//! args    := arg (',' arg)*
//! arg     := expr | '...' | '[' args? ']' | literal
//! ```
//!
//! Name handling:
//! - `typing.`, `collections.abc.` and `builtins.` prefixes are stripped.
//! - Builtin scalars become `Primitive`, generic collections `Container`.
//! - Typing constructs the matcher has no structural rule for (`Callable`,
//!   `ClassVar`, `ParamSpec`, ...) become `Unsupported` and are routed to the
//!   fallback policy at validation time.
//! - Any other name becomes a `ForwardRef`, resolved against the declaring
//!   namespace when a value is checked.

use std::str::FromStr;

use crate::descriptor::{ContainerKind, LiteralValue, TypeDescriptor};
use crate::error::ParseError;

/// Typing constructs that parse but have no structural matching rule.
const UNSUPPORTED_CONSTRUCTS: &[&str] = &[
    "Awaitable",
    "Callable",
    "ClassVar",
    "Concatenate",
    "Coroutine",
    "Final",
    "Generic",
    "Never",
    "NoReturn",
    "NotRequired",
    "ParamSpec",
    "Required",
    "Self",
    "Type",
    "TypeGuard",
    "TypeIs",
    "Unpack",
];

const STRIPPED_PREFIXES: &[&str] = &["typing.", "typing_extensions.", "collections.abc.", "builtins."];

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Name(String),
    Str(String),
    Int(i64),
    Open,
    Close,
    Comma,
    Pipe,
    Ellipsis,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Name(n) => n.clone(),
            Token::Str(s) => format!("'{s}'"),
            Token::Int(n) => n.to_string(),
            Token::Open => "[".into(),
            Token::Close => "]".into(),
            Token::Comma => ",".into(),
            Token::Pipe => "|".into(),
            Token::Ellipsis => "...".into(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, ParseError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let (offset, ch) = chars[i];
        match ch {
            c if c.is_whitespace() => i += 1,
            '[' => {
                tokens.push((offset, Token::Open));
                i += 1;
            }
            ']' => {
                tokens.push((offset, Token::Close));
                i += 1;
            }
            ',' => {
                tokens.push((offset, Token::Comma));
                i += 1;
            }
            '|' => {
                tokens.push((offset, Token::Pipe));
                i += 1;
            }
            '.' if input[offset..].starts_with("...") => {
                tokens.push((offset, Token::Ellipsis));
                i += 3;
            }
            '\'' | '"' => {
                let quote = ch;
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        Some(&(_, c)) if c == quote => break,
                        Some(&(_, c)) => {
                            text.push(c);
                            i += 1;
                        }
                        None => {
                            return Err(ParseError::UnexpectedEnd {
                                input: input.to_string(),
                            })
                        }
                    }
                }
                i += 1;
                tokens.push((offset, Token::Str(text)));
            }
            c if c == '-' || c.is_ascii_digit() => {
                i += 1;
                while chars.get(i).is_some_and(|&(_, c)| c.is_ascii_digit()) {
                    i += 1;
                }
                let end = chars.get(i).map_or(input.len(), |&(o, _)| o);
                let text = &input[offset..end];
                let n = text.parse::<i64>().map_err(|_| ParseError::InvalidLiteral {
                    literal: text.to_string(),
                    input: input.to_string(),
                })?;
                tokens.push((offset, Token::Int(n)));
            }
            c if c.is_alphabetic() || c == '_' => {
                i += 1;
                while chars
                    .get(i)
                    .is_some_and(|&(_, c)| c.is_alphanumeric() || c == '_' || c == '.')
                {
                    i += 1;
                }
                let end = chars.get(i).map_or(input.len(), |&(o, _)| o);
                tokens.push((offset, Token::Name(input[offset..end].to_string())));
            }
            other => {
                return Err(ParseError::UnexpectedChar {
                    ch: other,
                    offset,
                    input: input.to_string(),
                })
            }
        }
    }
    Ok(tokens)
}

/// A parsed generic argument: a type, a bare literal, `...`, or a bracketed list.
#[derive(Debug)]
enum Arg {
    Type(TypeDescriptor),
    Literal(LiteralValue),
    Ellipsis,
    List(Vec<Arg>),
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        tok
    }

    fn end(&self) -> ParseError {
        ParseError::UnexpectedEnd {
            input: self.input.to_string(),
        }
    }

    fn unexpected(&self, found: &Token, expected: &'static str) -> ParseError {
        ParseError::UnexpectedToken {
            found: found.describe(),
            expected,
            input: self.input.to_string(),
        }
    }

    fn expect(&mut self, want: Token, expected: &'static str) -> Result<(), ParseError> {
        match self.next() {
            Some(tok) if tok == want => Ok(()),
            Some(tok) => Err(self.unexpected(&tok, expected)),
            None => Err(self.end()),
        }
    }

    fn parse_expr(&mut self) -> Result<TypeDescriptor, ParseError> {
        let mut alternatives = vec![self.parse_term()?];
        while self.peek() == Some(&Token::Pipe) {
            self.pos += 1;
            alternatives.push(self.parse_term()?);
        }
        Ok(make_union(alternatives))
    }

    fn parse_term(&mut self) -> Result<TypeDescriptor, ParseError> {
        match self.next() {
            Some(Token::Str(text)) => parse(&text),
            Some(Token::Name(name)) => {
                let args = if self.peek() == Some(&Token::Open) {
                    self.pos += 1;
                    let args = self.parse_args()?;
                    self.expect(Token::Close, "']'")?;
                    Some(args)
                } else {
                    None
                };
                self.resolve_name(&name, args)
            }
            Some(tok) => Err(self.unexpected(&tok, "a type")),
            None => Err(self.end()),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Arg>, ParseError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::Close) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_arg()?);
            if self.peek() == Some(&Token::Comma) {
                self.pos += 1;
                continue;
            }
            return Ok(args);
        }
    }

    fn parse_arg(&mut self) -> Result<Arg, ParseError> {
        match self.peek() {
            Some(Token::Ellipsis) => {
                self.pos += 1;
                Ok(Arg::Ellipsis)
            }
            Some(Token::Open) => {
                self.pos += 1;
                let inner = self.parse_args()?;
                self.expect(Token::Close, "']'")?;
                Ok(Arg::List(inner))
            }
            Some(Token::Int(n)) => {
                let n = *n;
                self.pos += 1;
                Ok(Arg::Literal(LiteralValue::Int(n)))
            }
            Some(Token::Name(name)) if matches!(name.as_str(), "True" | "False") => {
                let b = name == "True";
                self.pos += 1;
                Ok(Arg::Literal(LiteralValue::Bool(b)))
            }
            // Quoted text is a forward reference in type position and a
            // string literal inside Literal[...]; keep both readings.
            Some(Token::Str(text)) => {
                let text = text.clone();
                self.pos += 1;
                Ok(Arg::Literal(LiteralValue::Str(text)))
            }
            Some(_) => Ok(Arg::Type(self.parse_expr()?)),
            None => Err(self.end()),
        }
    }

    fn arity(&self, construct: &str, expected: &'static str) -> ParseError {
        ParseError::Arity {
            construct: construct.to_string(),
            expected,
            input: self.input.to_string(),
        }
    }

    fn arg_type(&self, arg: Arg) -> Result<TypeDescriptor, ParseError> {
        match arg {
            Arg::Type(d) => Ok(d),
            Arg::Literal(LiteralValue::Str(text)) => parse(&text),
            Arg::Literal(LiteralValue::None) => Ok(TypeDescriptor::none()),
            Arg::Literal(lit) => Err(ParseError::InvalidLiteral {
                literal: lit.to_string(),
                input: self.input.to_string(),
            }),
            Arg::Ellipsis => Err(ParseError::UnexpectedToken {
                found: "...".into(),
                expected: "a type",
                input: self.input.to_string(),
            }),
            Arg::List(_) => Err(ParseError::UnexpectedToken {
                found: "[".into(),
                expected: "a type",
                input: self.input.to_string(),
            }),
        }
    }

    fn arg_types(&self, args: Vec<Arg>) -> Result<Vec<TypeDescriptor>, ParseError> {
        args.into_iter().map(|a| self.arg_type(a)).collect()
    }

    fn resolve_name(&self, raw: &str, args: Option<Vec<Arg>>) -> Result<TypeDescriptor, ParseError> {
        let name = STRIPPED_PREFIXES
            .iter()
            .find_map(|p| raw.strip_prefix(p))
            .unwrap_or(raw);

        if UNSUPPORTED_CONSTRUCTS.contains(&name) {
            return Ok(TypeDescriptor::unsupported(name));
        }

        let Some(args) = args else {
            return Ok(bare_name(name));
        };

        match name {
            "list" | "List" | "MutableSequence" => self.single(name, args, ContainerKind::List),
            "set" | "Set" | "frozenset" | "FrozenSet" | "MutableSet" | "AbstractSet" => {
                self.single(name, args, ContainerKind::Set)
            }
            "Sequence" => self.single(name, args, ContainerKind::Sequence),
            "Iterable" | "Iterator" | "Collection" => {
                self.single(name, args, ContainerKind::Iterable)
            }
            // Generator[Yield, Send, Return]: only the yield type is checked.
            "Generator" => {
                let mut types = self.arg_types(args)?;
                if types.is_empty() || types.len() > 3 {
                    return Err(self.arity(name, "1 to 3"));
                }
                types.truncate(1);
                Ok(TypeDescriptor::container(ContainerKind::Iterable, types))
            }
            "dict" | "Dict" | "Mapping" | "MutableMapping" => {
                let types = self.arg_types(args)?;
                if types.len() != 2 {
                    return Err(self.arity(name, "2"));
                }
                Ok(TypeDescriptor::container(ContainerKind::Mapping, types))
            }
            "tuple" | "Tuple" => {
                if args.len() == 2 && matches!(args[1], Arg::Ellipsis) {
                    let mut args = args;
                    args.truncate(1);
                    let element = self.arg_type(args.remove(0))?;
                    return Ok(TypeDescriptor::var_tuple(element));
                }
                Ok(TypeDescriptor::tuple(self.arg_types(args)?))
            }
            "Optional" => {
                let mut types = self.arg_types(args)?;
                if types.len() != 1 {
                    return Err(self.arity(name, "1"));
                }
                Ok(TypeDescriptor::optional(types.remove(0)))
            }
            "Union" => {
                let types = self.arg_types(args)?;
                if types.is_empty() {
                    return Err(self.arity(name, "at least 1"));
                }
                Ok(make_union(types))
            }
            "Literal" => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    match arg {
                        Arg::Literal(lit) => values.push(lit),
                        Arg::Type(TypeDescriptor::Primitive { name }) if name == "NoneType" => {
                            values.push(LiteralValue::None)
                        }
                        other => {
                            return Err(ParseError::InvalidLiteral {
                                literal: format!("{other:?}"),
                                input: self.input.to_string(),
                            })
                        }
                    }
                }
                if values.is_empty() {
                    return Err(self.arity(name, "at least 1"));
                }
                Ok(TypeDescriptor::literal(values))
            }
            "Annotated" => {
                let mut args = args.into_iter();
                let inner = match args.next() {
                    Some(arg) => self.arg_type(arg)?,
                    None => return Err(self.arity(name, "at least 2")),
                };
                let metadata: Vec<String> = args.map(|a| render_metadata(&a)).collect();
                if metadata.is_empty() {
                    return Err(self.arity(name, "at least 2"));
                }
                Ok(TypeDescriptor::annotated(inner, metadata))
            }
            // Unknown generic: resolve the base name later, ignore arguments.
            _ => Ok(TypeDescriptor::forward_ref(name)),
        }
    }

    fn single(&self, name: &str, args: Vec<Arg>, kind: ContainerKind) -> Result<TypeDescriptor, ParseError> {
        let types = self.arg_types(args)?;
        if types.len() != 1 {
            return Err(self.arity(name, "1"));
        }
        Ok(TypeDescriptor::container(kind, types))
    }
}

fn bare_name(name: &str) -> TypeDescriptor {
    match name {
        "Any" => TypeDescriptor::Any,
        "None" | "NoneType" => TypeDescriptor::none(),
        "int" | "float" | "str" | "bool" | "bytes" | "object" | "complex" | "bytearray" => {
            TypeDescriptor::primitive(name)
        }
        "list" | "List" => TypeDescriptor::container(ContainerKind::List, Vec::new()),
        "set" | "Set" | "frozenset" | "FrozenSet" => {
            TypeDescriptor::container(ContainerKind::Set, Vec::new())
        }
        "dict" | "Dict" | "Mapping" => TypeDescriptor::container(ContainerKind::Mapping, Vec::new()),
        "tuple" | "Tuple" => TypeDescriptor::container(ContainerKind::VarTuple, Vec::new()),
        "Sequence" => TypeDescriptor::container(ContainerKind::Sequence, Vec::new()),
        "Iterable" | "Iterator" | "Generator" => {
            TypeDescriptor::container(ContainerKind::Iterable, Vec::new())
        }
        other => TypeDescriptor::forward_ref(other),
    }
}

/// Flatten nested unions; a two-way union with `None` becomes `Optional`.
fn make_union(alternatives: Vec<TypeDescriptor>) -> TypeDescriptor {
    let mut flat = Vec::with_capacity(alternatives.len());
    for alt in alternatives {
        match alt {
            TypeDescriptor::Union { alternatives } => flat.extend(alternatives),
            TypeDescriptor::Optional { inner } => {
                flat.push(*inner);
                flat.push(TypeDescriptor::none());
            }
            other => flat.push(other),
        }
    }
    let mut deduped: Vec<TypeDescriptor> = Vec::with_capacity(flat.len());
    for alt in flat {
        if !deduped.contains(&alt) {
            deduped.push(alt);
        }
    }
    match deduped.len() {
        1 => deduped.remove(0),
        2 if deduped[1] == TypeDescriptor::none() => TypeDescriptor::optional(deduped.remove(0)),
        2 if deduped[0] == TypeDescriptor::none() => TypeDescriptor::optional(deduped.remove(1)),
        _ => TypeDescriptor::union(deduped),
    }
}

fn render_metadata(arg: &Arg) -> String {
    match arg {
        Arg::Type(d) => d.to_string(),
        Arg::Literal(LiteralValue::Str(s)) => s.clone(),
        Arg::Literal(lit) => lit.to_string(),
        Arg::Ellipsis => "...".into(),
        Arg::List(items) => {
            let inner: Vec<String> = items.iter().map(render_metadata).collect();
            format!("[{}]", inner.join(", "))
        }
    }
}

/// Parse annotation text into a descriptor.
pub fn parse(input: &str) -> Result<TypeDescriptor, ParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut parser = Parser {
        input,
        tokens,
        pos: 0,
    };
    let descriptor = parser.parse_expr()?;
    if let Some(tok) = parser.peek() {
        let tok = tok.clone();
        return Err(parser.unexpected(&tok, "end of expression"));
    }
    Ok(descriptor)
}

impl FromStr for TypeDescriptor {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// The parser never panics, whatever it is fed.
        #[test]
        fn parse_never_panics(input in "[a-zA-Z_\\[\\], |.'0-9]{0,40}") {
            let _ = parse(&input);
        }

        /// Plain identifiers always parse, to a primitive or a forward reference.
        #[test]
        fn identifiers_always_parse(name in "[A-Z][a-zA-Z0-9_]{0,15}") {
            let d = parse(&name);
            prop_assert!(d.is_ok(), "{:?}", d);
        }
    }
}
