// Query path parsing: `/`- or `.`-separated segments with optional bracket selectors

use super::QueryError;

/// One step of a structural query
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySegment {
    /// Property to read; `None` for a bare selector such as the second bracket in `a[][x > 1]`
    pub property: Option<String>,
    pub selector: Option<Selector>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// `[]`: enumerate every element
    All,
    /// `[expr]`: numeric index or boolean filter, decided when evaluated
    Expr(String),
}

impl Selector {
    pub fn enumerates(&self) -> bool {
        matches!(self, Selector::All)
    }
}

pub struct QueryPathParser<'p> {
    input: &'p str,
    pos: usize,
}

impl<'p> QueryPathParser<'p> {
    pub fn parse(path: &'p str) -> Result<Vec<QuerySegment>, QueryError> {
        let mut parser = Self { input: path, pos: 0 };
        parser.parse_segments()
    }

    fn parse_segments(&mut self) -> Result<Vec<QuerySegment>, QueryError> {
        let mut segments = Vec::new();
        loop {
            while matches!(self.peek_char(), Some('/' | '.')) {
                self.pos += 1;
            }
            let property = match self.peek_char() {
                None => return Ok(segments),
                Some(quote @ ('"' | '\'')) => Some(self.parse_quoted(quote)?),
                Some('[') => None,
                Some(_) => Some(self.take_until(|c| matches!(c, '/' | '.' | '[' | '"' | '\''))),
            };
            let selector = if self.peek_char() == Some('[') {
                Some(self.parse_selector()?)
            } else {
                None
            };
            segments.push(QuerySegment { property, selector });
        }
    }

    fn parse_quoted(&mut self, quote: char) -> Result<String, QueryError> {
        self.pos += quote.len_utf8();
        let mut name = String::new();
        loop {
            match self.next_char() {
                Some(ch) if ch == quote => return Ok(name),
                Some('\\') => match self.next_char() {
                    Some(escaped) => name.push(escaped),
                    None => break,
                },
                Some(ch) => name.push(ch),
                None => break,
            }
        }
        Err(self.error("unterminated quoted segment"))
    }

    /// Reads `[...]`, skipping over nested brackets and quoted text inside the expression
    fn parse_selector(&mut self) -> Result<Selector, QueryError> {
        self.pos += 1;
        let start = self.pos;
        let mut depth = 0usize;
        let mut quote: Option<char> = None;

        while let Some(ch) = self.next_char() {
            match (quote, ch) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), '\\') => {
                    self.next_char();
                }
                (Some(_), _) => {}
                (None, '"' | '\'' | '`') => quote = Some(ch),
                (None, '[') => depth += 1,
                (None, ']') if depth == 0 => {
                    let expr = self.input[start..self.pos - 1].trim();
                    return Ok(if expr.is_empty() {
                        Selector::All
                    } else {
                        Selector::Expr(expr.to_string())
                    });
                }
                (None, ']') => depth -= 1,
                (None, _) => {}
            }
        }
        Err(self.error("unterminated '['"))
    }

    fn take_until(&mut self, stop: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while let Some(ch) = self.peek_char() {
            if stop(ch) {
                break;
            }
            self.pos += ch.len_utf8();
        }
        self.input[start..self.pos].to_string()
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn next_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn error(&self, message: &str) -> QueryError {
        QueryError::Syntax {
            path: self.input.to_string(),
            message: format!("{} at position {}", message, self.pos),
        }
    }
}
