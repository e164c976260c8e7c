#![forbid(unsafe_code)]

//! A small CSS selector subset.
//!
//! Supported: type (`div`), universal (`*`), id (`#x`), class (`.x`),
//! attribute presence (`[x]`) and equality (`[x="v"]`, `[x=v]`), compound
//! forms of those (`div.card[data-x]`), and the descendant combinator
//! (whitespace). Anything else is a parse error, so an unsupported selector
//! fails loudly instead of silently matching nothing.

use crate::element::Element;

/// Why a selector string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unexpected character {found:?} at offset {offset} in selector {input:?}")]
    Unexpected {
        input: String,
        offset: usize,
        found: char,
    },
    #[error("selector {input:?} ended unexpectedly")]
    UnexpectedEnd { input: String },
    #[error("unterminated attribute selector in {input:?}")]
    UnterminatedAttribute { input: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Simple {
    Tag(String),
    Id(String),
    Class(String),
    Attr { name: String, value: Option<String> },
}

impl Simple {
    fn matches(&self, el: &Element) -> bool {
        match self {
            Self::Tag(tag) => el.tag() == tag.as_str(),
            Self::Id(id) => el.get_attribute("id").as_deref() == Some(id.as_str()),
            Self::Class(class) => el.has_class(class),
            Self::Attr { name, value: None } => el.has_attribute(name),
            Self::Attr {
                name,
                value: Some(value),
            } => el.get_attribute(name).as_deref() == Some(value.as_str()),
        }
    }
}

/// Parsed selector: a chain of compounds joined by descendant combinators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    compounds: Vec<Vec<Simple>>,
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

struct Parser<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn unexpected(&self) -> SelectorError {
        match self.chars.get(self.pos) {
            Some(&(offset, found)) => SelectorError::Unexpected {
                input: self.input.to_string(),
                offset,
                found,
            },
            None => SelectorError::UnexpectedEnd {
                input: self.input.to_string(),
            },
        }
    }

    fn ident(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.unexpected());
        }
        Ok(self.chars[start..self.pos].iter().map(|(_, c)| c).collect())
    }

    fn attribute(&mut self) -> Result<Simple, SelectorError> {
        // Opening '[' already consumed.
        let name = self.ident()?;
        let value = match self.peek() {
            Some(']') => None,
            Some('=') => {
                self.pos += 1;
                Some(self.attribute_value()?)
            }
            _ => return Err(self.unexpected()),
        };
        if self.peek() != Some(']') {
            return Err(self.unexpected());
        }
        self.pos += 1;
        Ok(Simple::Attr { name, value })
    }

    fn attribute_value(&mut self) -> Result<String, SelectorError> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|c| c != quote) {
                    self.pos += 1;
                }
                if self.peek().is_none() {
                    return Err(SelectorError::UnterminatedAttribute {
                        input: self.input.to_string(),
                    });
                }
                let value = self.chars[start..self.pos].iter().map(|(_, c)| c).collect();
                self.pos += 1;
                Ok(value)
            }
            _ => self.ident(),
        }
    }

    fn compound(&mut self) -> Result<Vec<Simple>, SelectorError> {
        let mut parts = Vec::new();
        match self.peek() {
            Some('*') => self.pos += 1,
            Some(c) if is_ident_char(c) => parts.push(Simple::Tag(self.ident()?.to_ascii_lowercase())),
            _ => {}
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    parts.push(Simple::Id(self.ident()?));
                }
                Some('.') => {
                    self.pos += 1;
                    parts.push(Simple::Class(self.ident()?));
                }
                Some('[') => {
                    self.pos += 1;
                    parts.push(self.attribute()?);
                }
                _ => return Ok(parts),
            }
        }
    }

    fn parse(mut self) -> Result<Selector, SelectorError> {
        let mut compounds = Vec::new();
        loop {
            while self.peek().is_some_and(char::is_whitespace) {
                self.pos += 1;
            }
            if self.peek().is_none() {
                break;
            }
            let start = self.pos;
            let compound = self.compound()?;
            if self.pos == start {
                return Err(self.unexpected());
            }
            compounds.push(compound);
            match self.peek() {
                None => break,
                Some(c) if c.is_whitespace() => {}
                Some(_) => return Err(self.unexpected()),
            }
        }
        if compounds.is_empty() {
            return Err(SelectorError::Empty);
        }
        Ok(Selector { compounds })
    }
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        Parser::new(input).parse()
    }

    /// Whether `el` matches. Descendant steps may match ancestors outside
    /// the subtree being queried, as in the DOM.
    #[must_use]
    pub fn matches(&self, el: &Element) -> bool {
        let Some((last, rest)) = self.compounds.split_last() else {
            return false;
        };
        if !last.iter().all(|s| s.matches(el)) {
            return false;
        }
        // Greedy nearest-ancestor matching is exact for descendant-only chains.
        let mut ancestors = el.ancestors().into_iter();
        rest.iter().rev().all(|compound| {
            ancestors
                .by_ref()
                .any(|anc| compound.iter().all(|s| s.matches(&anc)))
        })
    }
}
