//! Tokenizer built from small `nom` fragment parsers, generalizing the
//! teacher's nom-based character-level parsing (number/string/symbol
//! fragments in `parser.rs`) from S-expression atoms to Sona's richer token
//! set. The token stream is consumed by the hand-written recursive-descent
//! parser in `parser.rs`, which nom's combinators don't model as naturally
//! as precedence climbing and statement grammars.

use crate::error::SonaError;
use crate::span::Span;
use nom::branch::alt;
use nom::bytes::complete::{escaped_transform, is_not, tag};
use nom::character::complete::{alpha1, alphanumeric1, char, digit1, one_of};
use nom::combinator::{map, opt, recognize, value};
use nom::multi::{many0, many0_count};
use nom::sequence::{pair, preceded};
use nom::IResult;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Int(i64),
    Float(f64),
    Str(String),
    FString(String),
    Ident(String),

    Let,
    If,
    Elif,
    Else,
    While,
    For,
    In,
    Repeat,
    Break,
    Continue,
    Return,
    Function,
    Class,
    Extends,
    Import,
    From,
    As,
    Try,
    Catch,
    Finally,
    Throw,
    Delete,
    Match,
    Lambda,
    Super,
    True,
    False,
    Null,
    And,
    Or,
    Not,

    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,
    Eq,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Dot,
    DotDotDot,
    Question,
    Semicolon,
    Pipe,
    FatArrow,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

fn keyword_or_ident(s: &str) -> TokenKind {
    match s {
        "let" => TokenKind::Let,
        "if" => TokenKind::If,
        "elif" => TokenKind::Elif,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "for" => TokenKind::For,
        "in" => TokenKind::In,
        "repeat" => TokenKind::Repeat,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "return" => TokenKind::Return,
        "func" | "function" | "fn" => TokenKind::Function,
        "class" => TokenKind::Class,
        "extends" => TokenKind::Extends,
        "import" => TokenKind::Import,
        "from" => TokenKind::From,
        "as" => TokenKind::As,
        "try" => TokenKind::Try,
        "catch" => TokenKind::Catch,
        "finally" => TokenKind::Finally,
        "throw" | "raise" => TokenKind::Throw,
        "delete" => TokenKind::Delete,
        "match" => TokenKind::Match,
        "lambda" => TokenKind::Lambda,
        "super" => TokenKind::Super,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" | "nil" => TokenKind::Null,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        other => TokenKind::Ident(other.to_string()),
    }
}

fn ident_fragment(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))(input)
}

/// A run of digits, tolerating `_` digit-group separators (spec §4.1).
fn digits_with_underscores(input: &str) -> IResult<&str, String> {
    let (rest, text) = recognize(pair(
        digit1,
        many0_count(alt((digit1, tag("_")))),
    ))(input)?;
    Ok((rest, text.chars().filter(|c| *c != '_').collect()))
}

fn number_fragment(input: &str) -> IResult<&str, TokenKind> {
    let (rest, int_part) = digits_with_underscores(input)?;
    let mut rest = rest;
    let mut text = int_part;
    let mut is_float = false;
    if let Ok((after_dot, _)) = char::<_, nom::error::Error<&str>>('.')(rest) {
        if let Ok((after_frac, frac)) = digits_with_underscores(after_dot) {
            text.push('.');
            text.push_str(&frac);
            rest = after_frac;
            is_float = true;
        }
    }
    if let Ok((after_e, sign_and_digits)) =
        recognize::<_, _, nom::error::Error<&str>, _>(preceded(
            one_of("eE"),
            pair(opt(one_of("+-")), digit1),
        ))(rest)
    {
        text.push('e');
        text.push_str(sign_and_digits.trim_start_matches(|c| c == 'e' || c == 'E'));
        rest = after_e;
        is_float = true;
    }
    if is_float {
        let n: f64 = text.parse().unwrap_or(0.0);
        Ok((rest, TokenKind::Float(n)))
    } else {
        let n: i64 = text.parse().unwrap_or(0);
        Ok((rest, TokenKind::Int(n)))
    }
}

fn unicode_escape(input: &str) -> IResult<&str, String> {
    let (rest, _) = tag("u")(input)?;
    let (rest, hex) = nom::bytes::complete::take(4usize)(rest)?;
    let code = u32::from_str_radix(hex, 16)
        .ok()
        .and_then(char::from_u32)
        .unwrap_or('\u{fffd}');
    Ok((rest, code.to_string()))
}

fn escaped_body(quote: char) -> impl Fn(&str) -> IResult<&str, String> + Copy {
    move |input: &str| {
        let not_escape: String = match quote {
            '\'' => "'\\".to_string(),
            _ => "\"\\".to_string(),
        };
        opt(escaped_transform(
            is_not(not_escape.as_str()),
            '\\',
            alt((
                value("\\".to_string(), tag("\\")),
                value("\"".to_string(), tag("\"")),
                value("'".to_string(), tag("'")),
                value("\n".to_string(), tag("n")),
                value("\t".to_string(), tag("t")),
                value("\r".to_string(), tag("r")),
                unicode_escape,
            )),
        ))(input)
        .map(|(rest, content)| (rest, content.unwrap_or_default()))
    }
}

/// Triple-quoted strings (`"""…"""`) are verbatim multi-line literals with no
/// escape processing (spec §4.1).
fn triple_quoted_fragment(input: &str) -> IResult<&str, String> {
    let (rest, _) = tag("\"\"\"")(input)?;
    match rest.find("\"\"\"") {
        Some(end) => Ok((&rest[end + 3..], rest[..end].to_string())),
        None => Err(nom::Err::Error(nom::error::Error::new(
            rest,
            nom::error::ErrorKind::TakeUntil,
        ))),
    }
}

fn plain_string_fragment(input: &str) -> IResult<&str, String> {
    if input.starts_with("\"\"\"") {
        return triple_quoted_fragment(input);
    }
    if let Ok((rest, content)) = preceded(char('"'), escaped_body('"'))(input) {
        let (rest, _) = char('"')(rest)?;
        return Ok((rest, content));
    }
    let (rest, content) = preceded(char('\''), escaped_body('\''))(input)?;
    let (rest, _) = char('\'')(rest)?;
    Ok((rest, content))
}

/// Skips whitespace, `#` line comments, and nestable `/* */` block comments.
/// Block comments track nesting depth so `/* outer /* inner */ still outer */`
/// closes correctly; an unterminated block comment is a lex error rather
/// than a silent truncation.
///
/// `//` is deliberately NOT a comment prefix here even though spec §4.1 lists
/// it alongside `#`: spec §4.3 also freezes `//` as the floor-division
/// operator (see the Open Question decision in DESIGN.md), and a token can't
/// mean both "start a comment" and "divide" from the same two characters
/// with no further context. `#` alone covers line comments; `//` is only
/// ever floor division.
fn skip_trivia(mut input: &str) -> Result<&str, ()> {
    loop {
        let start_len = input.len();
        input = input.trim_start_matches(|c: char| c.is_whitespace());
        if let Some(mut rest) = input.strip_prefix("/*") {
            let mut depth = 1u32;
            loop {
                if let Some(open) = rest.find("/*") {
                    let close = rest.find("*/");
                    match close {
                        Some(c) if c < open => {
                            rest = &rest[c + 2..];
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {
                            rest = &rest[open + 2..];
                            depth += 1;
                        }
                    }
                } else if let Some(close) = rest.find("*/") {
                    rest = &rest[close + 2..];
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                } else {
                    return Err(());
                }
            }
            input = rest;
        } else if input.starts_with('#') && !input.starts_with("#{") {
            let end = input.find('\n').unwrap_or(input.len());
            input = &input[end..];
        }
        if input.len() == start_len {
            break;
        }
    }
    Ok(input)
}

/// Tokenizes an entire source string, tracking line/column for each token.
pub fn tokenize(source: &str) -> Result<Vec<Token>, SonaError> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut rest = source;
    let mut consumed = 0usize;
    let mut line = 1u32;
    let mut column = 1u32;

    loop {
        let before_trivia_len = rest.len();
        rest = skip_trivia(rest).map_err(|_| SonaError::ParseError {
            message: "unterminated block comment".to_string(),
            span: Span::new(consumed, source.len(), line, column),
        })?;
        let trivia_consumed = &source[consumed..consumed + (before_trivia_len - rest.len())];
        for ch in trivia_consumed.chars() {
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        consumed = source.len() - rest.len();

        if rest.is_empty() {
            break;
        }

        let start = consumed;
        let start_line = line;
        let start_col = column;

        let (new_rest, kind) = lex_one(rest).map_err(|_| SonaError::ParseError {
            message: format!("unexpected character near {:?}", &rest[..rest.len().min(20)]),
            span: Span::new(start, start, line, column),
        })?;

        let matched_len = rest.len() - new_rest.len();
        let matched_text = &rest[..matched_len];
        for ch in matched_text.chars() {
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }

        let end = start + matched_len;
        tokens.push(Token {
            kind,
            span: Span::new(start, end, start_line, start_col),
        });

        rest = new_rest;
        consumed = end;
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span::new(consumed, consumed, line, column),
    });
    Ok(tokens)
}

fn lex_one(input: &str) -> IResult<&str, TokenKind> {
    alt((
        map(
            preceded(char('f'), plain_string_fragment_peek),
            TokenKind::FString,
        ),
        map(plain_string_fragment, TokenKind::Str),
        number_fragment,
        map(ident_fragment, keyword_or_ident),
        operator_fragment,
    ))(input)
}

/// Like `plain_string_fragment` but only fires when the very next char after
/// `f` is a quote, so `foo` the identifier isn't mis-tokenized as `f` + `oo`.
fn plain_string_fragment_peek(input: &str) -> IResult<&str, String> {
    if !input.starts_with('"') {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Char,
        )));
    }
    plain_string_fragment(input)
}

fn operator_fragment(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::DotDotDot, tag("...")),
        value(TokenKind::SlashSlash, tag("//")),
        value(TokenKind::StarStar, tag("**")),
        value(TokenKind::EqEq, tag("==")),
        value(TokenKind::FatArrow, tag("=>")),
        value(TokenKind::NotEq, tag("!=")),
        value(TokenKind::LtEq, tag("<=")),
        value(TokenKind::GtEq, tag(">=")),
        value(TokenKind::Plus, char('+')),
        value(TokenKind::Minus, char('-')),
        value(TokenKind::Star, char('*')),
        value(TokenKind::Slash, char('/')),
        value(TokenKind::Percent, char('%')),
        value(TokenKind::Eq, char('=')),
        value(TokenKind::Lt, char('<')),
        value(TokenKind::Gt, char('>')),
        value(TokenKind::LParen, char('(')),
        value(TokenKind::RParen, char(')')),
        value(TokenKind::LBrace, char('{')),
        value(TokenKind::RBrace, char('}')),
        value(TokenKind::LBracket, char('[')),
        value(TokenKind::RBracket, char(']')),
        value(TokenKind::Comma, char(',')),
        value(TokenKind::Colon, char(':')),
        value(TokenKind::Dot, char('.')),
        value(TokenKind::Question, char('?')),
        value(TokenKind::Semicolon, char(';')),
        value(TokenKind::Pipe, char('|')),
        map(one_of("!"), |_| TokenKind::Not),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_simple_arithmetic() {
        let tokens = tokenize("1 + 2 * 3").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Int(1),
                TokenKind::Plus,
                TokenKind::Int(2),
                TokenKind::Star,
                TokenKind::Int(3),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_keywords_and_identifiers() {
        let tokens = tokenize("let count = 0").unwrap();
        assert!(matches!(tokens[0].kind, TokenKind::Let));
        assert!(matches!(tokens[1].kind, TokenKind::Ident(ref s) if s == "count"));
        assert!(matches!(tokens[2].kind, TokenKind::Eq));
    }

    #[test]
    fn skips_line_and_block_comments() {
        let tokens = tokenize("1 # comment\n/* block */2").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind.clone()).collect();
        assert_eq!(kinds, vec![TokenKind::Int(1), TokenKind::Int(2), TokenKind::Eof]);
    }

    #[test]
    fn tracks_line_numbers_across_newlines() {
        let tokens = tokenize("1\n2\n3").unwrap();
        assert_eq!(tokens[0].span.line, 1);
        assert_eq!(tokens[1].span.line, 2);
        assert_eq!(tokens[2].span.line, 3);
    }

    #[test]
    fn floor_div_is_distinct_from_slash() {
        let tokens = tokenize("7 // 2").unwrap();
        assert!(matches!(tokens[1].kind, TokenKind::SlashSlash));
    }
}
