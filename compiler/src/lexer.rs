// Lexer for `.fsp` FIR-engine specification files.
//
// Tokenizes the field-assignment grammar accepted by the parser. Uses the
// `logos` crate for DFA-based lexing. `#` starts a comment running to end of
// line; whitespace (including newlines) is insignificant — `;` terminates
// statements.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: unrecognized characters produce `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// `.fsp` token types.
///
/// `UInt` and `Real` are disjoint: a bare unsigned integer always lexes as
/// `UInt`, while `Real` requires a fraction, an exponent, or a leading minus.
/// The parser accepts either where a real number is expected.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+|#[^\n]*")]
pub enum Token {
    // ── Keywords ──
    #[token("FIR")]
    Fir,
    #[token("sampleRate")]
    SampleRate,
    #[token("coeff")]
    Coeff,

    // ── Symbols ──
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(".")]
    Dot,
    #[token("=")]
    Equals,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,

    // ── Literals ──
    /// Unsigned integer literal (FIR index, sample rate).
    #[regex(r"[0-9]+", parse_uint)]
    UInt(u64),

    /// Real literal that is not a plain unsigned integer.
    #[regex(
        r"-?[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?|-?[0-9]+[eE][+-]?[0-9]+|-[0-9]+",
        parse_real
    )]
    Real(f64),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Fir => write!(f, "FIR"),
            Token::SampleRate => write!(f, "sampleRate"),
            Token::Coeff => write!(f, "coeff"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Dot => write!(f, "."),
            Token::Equals => write!(f, "="),
            Token::Semi => write!(f, ";"),
            Token::Comma => write!(f, ","),
            Token::UInt(v) => write!(f, "{v}"),
            Token::Real(v) => write!(f, "{v}"),
        }
    }
}

// ── Callbacks ──

fn parse_uint(lex: &mut logos::Lexer<'_, Token>) -> Option<u64> {
    lex.slice().parse().ok()
}

fn parse_real(lex: &mut logos::Lexer<'_, Token>) -> Option<f64> {
    lex.slice().parse().ok()
}

// ── Public API ──

/// Lex an `.fsp` source string into tokens.
///
/// Returns all successfully parsed tokens together with any errors for
/// unrecognised characters. Lexing is non-fatal: errors are collected and
/// the lexer continues past bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected character: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: lex and assert no errors, return token list.
    fn lex_ok(source: &str) -> Vec<Token> {
        let result = lex(source);
        assert!(
            result.errors.is_empty(),
            "unexpected lex errors: {:?}",
            result.errors
        );
        result.tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn full_statement() {
        let tokens = lex_ok("FIR[0].sampleRate = 48000;");
        assert_eq!(
            tokens,
            vec![
                Token::Fir,
                Token::LBracket,
                Token::UInt(0),
                Token::RBracket,
                Token::Dot,
                Token::SampleRate,
                Token::Equals,
                Token::UInt(48000),
                Token::Semi,
            ]
        );
    }

    #[test]
    fn coeff_array() {
        let tokens = lex_ok("coeff = [0.5, -0.25, 1e-3, 2];");
        assert_eq!(
            tokens,
            vec![
                Token::Coeff,
                Token::Equals,
                Token::LBracket,
                Token::Real(0.5),
                Token::Comma,
                Token::Real(-0.25),
                Token::Comma,
                Token::Real(1e-3),
                Token::Comma,
                Token::UInt(2),
                Token::RBracket,
                Token::Semi,
            ]
        );
    }

    #[test]
    fn integers_lex_as_uint_not_real() {
        assert_eq!(lex_ok("123"), vec![Token::UInt(123)]);
        assert_eq!(lex_ok("-123"), vec![Token::Real(-123.0)]);
    }

    #[test]
    fn comments_and_whitespace_skipped() {
        let tokens = lex_ok("# a comment line\nFIR # trailing\n[1]");
        assert_eq!(
            tokens,
            vec![Token::Fir, Token::LBracket, Token::UInt(1), Token::RBracket]
        );
    }

    #[test]
    fn spans_are_byte_offsets() {
        let result = lex("FIR[7]");
        assert_eq!(result.tokens[2].1, Span { start: 4, end: 5 });
    }

    #[test]
    fn bad_character_is_collected() {
        let result = lex("FIR @ [0]");
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains('@'));
        // lexing continued past the bad character
        assert_eq!(result.tokens.len(), 4);
    }
}
