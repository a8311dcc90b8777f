// Expression parser using recursive descent with one function per precedence level

use serde_json::Value;

use super::ast::{BinaryOp, Expr, LogicalOp, TemplatePart, UnaryOp};
use super::ExpressionError;

type Result<T> = std::result::Result<T, ExpressionError>;

pub struct ExpressionParser {
    input: String,
    pos: usize,
}

impl ExpressionParser {
    pub fn parse(expression: &str) -> Result<Expr> {
        let mut parser = Self {
            input: expression.to_string(),
            pos: 0,
        };
        parser.skip_whitespace();
        if parser.at_end() {
            return Err(parser.error("Empty expression"));
        }
        let expr = parser.parse_expression()?;
        parser.skip_whitespace();
        if let Some(ch) = parser.peek_char() {
            return Err(parser.error(format!("Unexpected character '{}'", ch)));
        }
        Ok(expr)
    }

    fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_conditional()
    }

    fn parse_conditional(&mut self) -> Result<Expr> {
        let test = self.parse_nullish()?;
        self.skip_whitespace();
        if self.peek_char() == Some('?') && self.peek_ahead(1) != Some('?') {
            self.consume_char()?;
            let consequent = self.parse_conditional()?;
            self.skip_whitespace();
            self.expect_char(':')?;
            let alternate = self.parse_conditional()?;
            return Ok(Expr::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            });
        }
        Ok(test)
    }

    fn parse_nullish(&mut self) -> Result<Expr> {
        let mut left = self.parse_or()?;
        loop {
            self.skip_whitespace();
            if self.eat("??") {
                let right = self.parse_or()?;
                left = Expr::logical(LogicalOp::Nullish, left, right);
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        loop {
            self.skip_whitespace();
            if self.eat("||") {
                let right = self.parse_and()?;
                left = Expr::logical(LogicalOp::Or, left, right);
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_equality()?;
        loop {
            self.skip_whitespace();
            if self.eat("&&") {
                let right = self.parse_equality()?;
                left = Expr::logical(LogicalOp::And, left, right);
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut left = self.parse_relational()?;
        loop {
            self.skip_whitespace();
            // Longest operators first so "==" never shadows "==="
            let op = if self.eat("===") {
                BinaryOp::StrictEq
            } else if self.eat("!==") {
                BinaryOp::StrictNe
            } else if self.eat("==") {
                BinaryOp::Eq
            } else if self.eat("!=") {
                BinaryOp::Ne
            } else {
                return Ok(left);
            };
            let right = self.parse_relational()?;
            left = Expr::binary(op, left, right);
        }
    }

    fn parse_relational(&mut self) -> Result<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            self.skip_whitespace();
            let op = if self.eat("<=") {
                BinaryOp::Le
            } else if self.eat(">=") {
                BinaryOp::Ge
            } else if self.eat("<") {
                BinaryOp::Lt
            } else if self.eat(">") {
                BinaryOp::Gt
            } else {
                return Ok(left);
            };
            let right = self.parse_additive()?;
            left = Expr::binary(op, left, right);
        }
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            self.skip_whitespace();
            let op = match self.peek_char() {
                Some('+') => BinaryOp::Add,
                Some('-') => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.consume_char()?;
            let right = self.parse_multiplicative()?;
            left = Expr::binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            self.skip_whitespace();
            let op = match self.peek_char() {
                Some('*') => BinaryOp::Mul,
                Some('/') => BinaryOp::Div,
                Some('%') => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.consume_char()?;
            let right = self.parse_unary()?;
            left = Expr::binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        self.skip_whitespace();
        let op = match self.peek_char() {
            Some('!') => UnaryOp::Not,
            Some('-') => UnaryOp::Negate,
            Some('+') => UnaryOp::Plus,
            _ => return self.parse_postfix(),
        };
        self.consume_char()?;
        let operand = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            self.skip_whitespace();
            match self.peek_char() {
                Some('.') => {
                    self.consume_char()?;
                    self.skip_whitespace();
                    let property = self.parse_identifier()?;
                    expr = Expr::member(expr, property);
                }
                Some('[') => {
                    self.consume_char()?;
                    let index = self.parse_expression()?;
                    self.skip_whitespace();
                    self.expect_char(']')?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Some('(') => {
                    self.consume_char()?;
                    let args = self.parse_list(')')?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        self.skip_whitespace();
        match self.peek_char() {
            Some(ch) if ch.is_ascii_digit() => self.parse_number(),
            Some('.') if self.peek_ahead(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.parse_number()
            }
            Some(quote @ ('\'' | '"')) => {
                let s = self.parse_string(quote)?;
                Ok(Expr::Literal(Value::String(s)))
            }
            Some('`') => self.parse_template(),
            Some('(') => {
                self.consume_char()?;
                let expr = self.parse_expression()?;
                self.skip_whitespace();
                self.expect_char(')')?;
                Ok(expr)
            }
            Some('[') => {
                self.consume_char()?;
                Ok(Expr::Array(self.parse_list(']')?))
            }
            Some('{') => self.parse_object(),
            Some(ch) if is_identifier_start(ch) => {
                let name = self.parse_identifier()?;
                Ok(match name.as_str() {
                    "true" => Expr::Literal(Value::Bool(true)),
                    "false" => Expr::Literal(Value::Bool(false)),
                    "null" => Expr::Literal(Value::Null),
                    "undefined" => Expr::Undefined,
                    _ => Expr::Ident(name),
                })
            }
            Some(ch) => Err(self.error(format!("Unexpected character '{}'", ch))),
            None => Err(self.error("Unexpected end of expression")),
        }
    }

    /// Comma-separated expressions up to `close`, trailing comma allowed
    fn parse_list(&mut self, close: char) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek_char() == Some(close) {
                self.consume_char()?;
                return Ok(items);
            }
            items.push(self.parse_expression()?);
            self.skip_whitespace();
            match self.peek_char() {
                Some(',') => {
                    self.consume_char()?;
                }
                Some(ch) if ch == close => {
                    self.consume_char()?;
                    return Ok(items);
                }
                _ => return Err(self.error(format!("Expected ',' or '{}'", close))),
            }
        }
    }

    fn parse_object(&mut self) -> Result<Expr> {
        self.expect_char('{')?;
        let mut entries = Vec::new();
        loop {
            self.skip_whitespace();
            let key = match self.peek_char() {
                Some('}') => {
                    self.consume_char()?;
                    return Ok(Expr::Object(entries));
                }
                Some(quote @ ('\'' | '"')) => self.parse_string(quote)?,
                Some(ch) if is_identifier_start(ch) => self.parse_identifier()?,
                Some(ch) if ch.is_ascii_digit() => self.take_while(|c| c.is_ascii_digit()),
                _ => return Err(self.error("Expected property name")),
            };
            self.skip_whitespace();
            self.expect_char(':')?;
            let value = self.parse_expression()?;
            entries.push((key, value));
            self.skip_whitespace();
            match self.peek_char() {
                Some(',') => {
                    self.consume_char()?;
                }
                Some('}') => {}
                _ => return Err(self.error("Expected ',' or '}' in object literal")),
            }
        }
    }

    fn parse_number(&mut self) -> Result<Expr> {
        let start = self.pos;
        self.take_while(|c| c.is_ascii_digit());
        let mut is_float = false;
        if self.peek_char() == Some('.') && self.peek_ahead(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.consume_char()?;
            self.take_while(|c| c.is_ascii_digit());
        }
        if matches!(self.peek_char(), Some('e' | 'E')) {
            let sign_offset = usize::from(matches!(self.peek_ahead(1), Some('+' | '-')));
            if self
                .peek_ahead(1 + sign_offset)
                .is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                self.pos += 1 + sign_offset;
                self.take_while(|c| c.is_ascii_digit());
            }
        }
        let text = &self.input[start..self.pos];
        if !is_float {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(Expr::Literal(Value::from(n)));
            }
        }
        let n: f64 = text
            .parse()
            .map_err(|_| self.error(format!("Invalid number '{}'", text)))?;
        Ok(Expr::Literal(super::value::from_f64(n)))
    }

    fn parse_string(&mut self, quote: char) -> Result<String> {
        self.expect_char(quote)?;
        let mut value = String::new();
        loop {
            match self.consume_char()? {
                ch if ch == quote => return Ok(value),
                '\\' => value.push(self.parse_escape()?),
                ch => value.push(ch),
            }
        }
    }

    fn parse_template(&mut self) -> Result<Expr> {
        self.expect_char('`')?;
        let mut parts = Vec::new();
        let mut literal_buf = String::new();

        loop {
            match self.consume_char()? {
                '`' => break,
                '\\' => literal_buf.push(self.parse_escape()?),
                '$' if self.peek_char() == Some('{') => {
                    self.consume_char()?;
                    if !literal_buf.is_empty() {
                        parts.push(TemplatePart::Literal(std::mem::take(&mut literal_buf)));
                    }
                    let expr = self.parse_expression()?;
                    self.skip_whitespace();
                    self.expect_char('}')?;
                    parts.push(TemplatePart::Expr(expr));
                }
                ch => literal_buf.push(ch),
            }
        }

        if !literal_buf.is_empty() {
            parts.push(TemplatePart::Literal(literal_buf));
        }
        Ok(Expr::Template(parts))
    }

    fn parse_escape(&mut self) -> Result<char> {
        Ok(match self.consume_char()? {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            'u' => {
                let start = self.pos;
                for _ in 0..4 {
                    self.consume_char()?;
                }
                let hex = &self.input[start..self.pos];
                u32::from_str_radix(hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.error(format!("Invalid unicode escape '\\u{}'", hex)))?
            }
            other => other,
        })
    }

    fn parse_identifier(&mut self) -> Result<String> {
        match self.peek_char() {
            Some(ch) if is_identifier_start(ch) => Ok(self.take_while(is_identifier_part)),
            _ => Err(self.error("Expected identifier")),
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while let Some(ch) = self.peek_char() {
            if !pred(ch) {
                break;
            }
            self.pos += ch.len_utf8();
        }
        self.input[start..self.pos].to_string()
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.input[self.pos..].starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_ahead(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn consume_char(&mut self) -> Result<char> {
        let ch = self
            .peek_char()
            .ok_or_else(|| self.error("Unexpected end of expression"))?;
        self.pos += ch.len_utf8();
        Ok(ch)
    }

    fn expect_char(&mut self, expected: char) -> Result<()> {
        match self.peek_char() {
            Some(ch) if ch == expected => {
                self.pos += ch.len_utf8();
                Ok(())
            }
            Some(ch) => Err(self.error(format!("Expected '{}' but found '{}'", expected, ch))),
            None => Err(self.error(format!("Expected '{}' but reached end", expected))),
        }
    }

    fn error(&self, message: impl Into<String>) -> ExpressionError {
        ExpressionError::Syntax {
            expression: self.input.clone(),
            position: self.pos,
            message: message.into(),
        }
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

fn is_identifier_part(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}
