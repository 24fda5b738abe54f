// crates/actions/src/calculator.rs
//
// Arithmetic for spoken expressions. The input is rewritten into plain ASCII
// operators, filtered to a fixed character set and evaluated by a small
// recursive-descent parser.

use thiserror::Error;

const MAX_DEPTH: usize = 64;

const WORD_OPERATORS: &[(&str, &str)] = &[
    ("足す", "+"),
    ("たす", "+"),
    ("プラス", "+"),
    ("引く", "-"),
    ("ひく", "-"),
    ("マイナス", "-"),
    ("掛ける", "*"),
    ("かける", "*"),
    ("割る", "/"),
    ("わる", "/"),
];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalcError {
    #[error("no expression found")]
    NoExpression,
    #[error("invalid character '{0}'")]
    InvalidCharacter(char),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected input after expression")]
    TrailingInput,
    #[error("division by zero")]
    DivisionByZero,
    #[error("expression nested too deeply")]
    TooDeep,
    #[error("result is not a finite number")]
    NotFinite,
}

impl CalcError {
    /// Message shown to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            CalcError::NoExpression => "式を認識できませんでした",
            CalcError::DivisionByZero => "0で割ることはできません",
            _ => "計算できませんでした",
        }
    }
}

/// Evaluates a spoken expression and renders `"{expr} = {result}"`.
pub fn try_calculate(input: &str) -> Result<String, CalcError> {
    let display = sanitize(input);
    if !display.chars().any(|c| c.is_ascii_digit()) {
        return Err(CalcError::NoExpression);
    }
    let value = evaluate(&expand_percent(&display))?;
    Ok(format!("{} = {}", display, format_number(value)))
}

/// Like [`try_calculate`] but never fails; errors become the user-facing message.
pub fn calculate(input: &str) -> String {
    try_calculate(input).unwrap_or_else(|err| err.user_message().to_string())
}

/// Maps full-width characters and operator words to ASCII and drops everything
/// outside digits, `.`, `+-*/()%` and spaces.
pub fn sanitize(input: &str) -> String {
    let mut text: String = input.chars().map(to_ascii).collect();
    for (word, op) in WORD_OPERATORS {
        text = text.replace(word, op);
    }
    text.chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | '*' | '/' | '(' | ')' | '%' | ' '))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn to_ascii(c: char) -> char {
    match c {
        '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
        '＋' => '+',
        '－' | '−' => '-',
        '×' | '＊' | '✕' => '*',
        '÷' | '／' => '/',
        '（' => '(',
        '）' => ')',
        '．' => '.',
        '％' => '%',
        '　' => ' ',
        other => other,
    }
}

/// Rewrites `N%` as `(N/100)`.
fn expand_percent(expr: &str) -> String {
    let mut out = String::with_capacity(expr.len() + 8);
    for c in expr.chars() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let start = out
            .char_indices()
            .rev()
            .take_while(|(_, ch)| ch.is_ascii_digit() || *ch == '.')
            .last()
            .map(|(i, _)| i);
        match start {
            Some(i) => {
                let number = out.split_off(i);
                out.push_str(&format!("({}/100)", number));
            }
            // A bare '%' is left for the scanner to reject.
            None => out.push('%'),
        }
    }
    out
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let text = format!("{:.10}", value);
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => n.to_string(),
            Token::Plus => "+".to_string(),
            Token::Minus => "-".to_string(),
            Token::Star => "*".to_string(),
            Token::Slash => "/".to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
        }
    }
}

fn tokenize(expr: &str) -> Result<Vec<Token>, CalcError> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' => {
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| CalcError::InvalidNumber(literal.clone()))?;
                tokens.push(Token::Number(value));
            }
            '+' | '-' | '*' | '/' | '(' | ')' => {
                tokens.push(match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '(' => Token::LParen,
                    _ => Token::RParen,
                });
                i += 1;
            }
            other => return Err(CalcError::InvalidCharacter(other)),
        }
    }

    Ok(tokens)
}

/// Evaluates `expr := term (('+'|'-') term)*`, `term := factor (('*'|'/') factor)*`,
/// `factor := number | '(' expr ')' | '-' factor`.
pub fn evaluate(expr: &str) -> Result<f64, CalcError> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err(CalcError::NoExpression);
    }

    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
    };
    let value = parser.expr(0)?;
    if parser.pos != tokens.len() {
        return Err(CalcError::TrailingInput);
    }
    if !value.is_finite() {
        return Err(CalcError::NotFinite);
    }
    Ok(value)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expr(&mut self, depth: usize) -> Result<f64, CalcError> {
        if depth > MAX_DEPTH {
            return Err(CalcError::TooDeep);
        }
        let mut value = self.term(depth)?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    value += self.term(depth)?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    value -= self.term(depth)?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self, depth: usize) -> Result<f64, CalcError> {
        let mut value = self.factor(depth)?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    value *= self.factor(depth)?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let divisor = self.factor(depth)?;
                    if divisor == 0.0 {
                        return Err(CalcError::DivisionByZero);
                    }
                    value /= divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    fn factor(&mut self, depth: usize) -> Result<f64, CalcError> {
        if depth > MAX_DEPTH {
            return Err(CalcError::TooDeep);
        }
        match self.next().cloned() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Minus) => Ok(-self.factor(depth + 1)?),
            Some(Token::LParen) => {
                let value = self.expr(depth + 1)?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    Some(other) => Err(CalcError::UnexpectedToken(other.describe())),
                    None => Err(CalcError::UnexpectedEnd),
                }
            }
            Some(other) => Err(CalcError::UnexpectedToken(other.describe())),
            None => Err(CalcError::UnexpectedEnd),
        }
    }
}
