//! Markup tokenizer for component documents.
//!
//! The tokenizer is permissive: tag and attribute names keep their case,
//! self-closing tags are recognized on any element, and malformed markup is
//! passed through as text instead of failing.

use source_map::Span;

/// A token produced by [`SfcLexer::next_token`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    OpenTag {
        name: &'a str,
        attrs: Vec<RawAttr<'a>>,
        self_closing: bool,
        span: Span,
    },
    CloseTag {
        name: &'a str,
        span: Span,
    },
    Text {
        text: &'a str,
        span: Span,
    },
    Comment {
        span: Span,
    },
}

/// An attribute as written in an open tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttr<'a> {
    pub name: &'a str,
    pub value: Option<&'a str>,
    pub span: Span,
    pub value_span: Option<Span>,
}

/// A lexer for component documents.
pub struct SfcLexer<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> SfcLexer<'a> {
    /// Create a new lexer for the given source.
    pub fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    /// Get the current position.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Get the remaining source.
    pub fn remaining(&self) -> &'a str {
        &self.source[self.pos..]
    }

    /// Peek at the next character.
    pub fn peek_char(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    /// Consume and return the next character.
    pub fn next_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Skip whitespace and return the number of bytes skipped.
    pub fn skip_whitespace(&mut self) -> usize {
        let start = self.pos;
        self.consume_while(char::is_whitespace);
        self.pos - start
    }

    /// Check if the remaining source starts with the given string.
    pub fn starts_with(&self, s: &str) -> bool {
        self.remaining().starts_with(s)
    }

    /// Consume a string if the remaining source starts with it.
    pub fn consume(&mut self, s: &str) -> bool {
        if self.starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    /// Consume characters while the predicate is true.
    pub fn consume_while<F>(&mut self, pred: F) -> &'a str
    where
        F: Fn(char) -> bool,
    {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if pred(c) {
                self.next_char();
            } else {
                break;
            }
        }
        &self.source[start..self.pos]
    }

    /// Consume until the given string is found (or to the end of input).
    pub fn consume_until(&mut self, s: &str) -> &'a str {
        let start = self.pos;
        match self.remaining().find(s) {
            Some(idx) => self.pos += idx,
            None => self.pos = self.source.len(),
        }
        &self.source[start..self.pos]
    }

    /// Check if at end of input.
    pub fn is_eof(&self) -> bool {
        self.pos >= self.source.len()
    }

    /// Get a span from start to current position.
    pub fn span_from(&self, start: usize) -> Span {
        Span::new(start as u32, self.pos as u32)
    }

    /// Read the next markup token, or `None` at the end of input.
    pub fn next_token(&mut self) -> Option<Token<'a>> {
        if self.is_eof() {
            return None;
        }
        let start = self.pos;

        if self.starts_with("<!--") {
            self.pos += 4;
            self.consume_until("-->");
            self.consume("-->");
            return Some(Token::Comment {
                span: self.span_from(start),
            });
        }

        // Doctype and processing instructions
        if self.starts_with("<!") || self.starts_with("<?") {
            self.consume_until(">");
            self.consume(">");
            return Some(Token::Comment {
                span: self.span_from(start),
            });
        }

        if self.starts_with("</") {
            self.pos += 2;
            if let Some(name) = self.read_tag_name() {
                self.consume_until(">");
                self.consume(">");
                return Some(Token::CloseTag {
                    name,
                    span: self.span_from(start),
                });
            }
            self.pos = start;
        } else if self.starts_with("<") {
            self.pos += 1;
            if let Some(name) = self.read_tag_name() {
                let attrs = self.read_attributes();
                self.skip_whitespace();
                let self_closing = self.consume("/>");
                if !self_closing {
                    self.consume(">");
                }
                return Some(Token::OpenTag {
                    name,
                    attrs,
                    self_closing,
                    span: self.span_from(start),
                });
            }
            self.pos = start;
        }

        // Text runs up to the next `<`; a lone `<` that starts no tag is text
        self.next_char();
        self.consume_while(|c| c != '<');
        Some(Token::Text {
            text: &self.source[start..self.pos],
            span: self.span_from(start),
        })
    }

    /// Read raw text up to (not including) the closing tag of `tag`.
    /// Returns `None` if the closing tag never appears.
    pub fn read_raw_text(&mut self, tag: &str) -> Option<&'a str> {
        let start = self.pos;
        let pattern = format!("</{}", tag);
        let mut search = start;

        while let Some(idx) = self.source[search..].find(&pattern) {
            let at = search + idx;
            let after = self.source[at + pattern.len()..].chars().next();
            if matches!(after, Some('>') | Some(' ') | Some('\t') | Some('\n') | Some('\r')) {
                self.pos = at;
                return Some(&self.source[start..at]);
            }
            search = at + pattern.len();
        }

        self.pos = self.source.len();
        None
    }

    /// Read a tag name.
    fn read_tag_name(&mut self) -> Option<&'a str> {
        let start = self.pos;
        // Tag name must start with letter or underscore
        match self.peek_char() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                self.next_char();
            }
            _ => return None,
        }
        self.consume_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'));
        Some(&self.source[start..self.pos])
    }

    fn read_attributes(&mut self) -> Vec<RawAttr<'a>> {
        let mut attrs = Vec::new();

        loop {
            self.skip_whitespace();
            if self.is_eof() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }

            let attr_start = self.pos;
            let name = self.consume_while(|c| {
                !c.is_whitespace() && !matches!(c, '=' | '>' | '"' | '\'') && c != '/'
            });
            if name.is_empty() {
                // Stray quote or slash
                self.next_char();
                continue;
            }

            let after_name = self.pos;
            self.skip_whitespace();
            if !self.consume("=") {
                self.pos = after_name;
                attrs.push(RawAttr {
                    name,
                    value: None,
                    span: self.span_from(attr_start),
                    value_span: None,
                });
                continue;
            }
            self.skip_whitespace();

            let (value, value_span) = match self.peek_char() {
                Some(quote @ ('"' | '\'')) => {
                    self.next_char();
                    let value_start = self.pos;
                    let value = self.consume_while(|c| c != quote);
                    let value_span = self.span_from(value_start);
                    self.consume(if quote == '"' { "\"" } else { "'" });
                    (value, value_span)
                }
                _ => {
                    let value_start = self.pos;
                    let value = self.consume_while(|c| !c.is_whitespace() && c != '>');
                    (value, self.span_from(value_start))
                }
            };

            attrs.push(RawAttr {
                name,
                value: Some(value),
                span: self.span_from(attr_start),
                value_span: Some(value_span),
            });
        }

        attrs
    }
}
