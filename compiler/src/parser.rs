// Parser for `.fsp` FIR-engine specification files.
//
// Parses a token stream (from the lexer) into an AST. The grammar is the
// original field-assignment form:
//
//     statement := 'FIR' '[' UINT ']' '.' field ';'
//     field     := 'sampleRate' '=' UINT
//                | 'coeff' '=' '[' (real (',' real)* ','?)? ']'
//
// Uses chumsky combinators.
//
// Preconditions: input is a valid token stream from `lexer::lex()`.
// Postconditions: returns an AST plus any parse errors (non-fatal).
// Failure modes: syntax errors produce `Rich` diagnostics; parsing continues.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::lexer::Token;

/// Result of parsing: AST plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub program: Option<Program>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse an `.fsp` source string. Lexes then parses.
///
/// Returns an AST (if parsing succeeded) plus any errors.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    // Convert lexer output to chumsky stream.
    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = program_parser();
    let (program, parse_errors) = parser.parse(stream).into_output_errors();

    // Merge lex errors + parse errors.
    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        program,
        errors: all_errors,
    }
}

// ── Main parser builder ──

fn program_parser<'tokens, I>(
) -> impl Parser<'tokens, I, Program, extra::Err<Rich<'tokens, Token, SimpleSpan>>>
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    // Field RHS, carried until the head's FIR index is known.
    enum Field {
        Rate(u64, SimpleSpan),
        Coeffs(Vec<(f64, SimpleSpan)>),
    }

    let uint = select! {
        Token::UInt(v) = e => (v, e.span()),
    };

    // A real literal; plain unsigned integers are accepted too.
    let real = select! {
        Token::UInt(v) = e => (v as f64, e.span()),
        Token::Real(v) = e => (v, e.span()),
    };

    // `FIR` `[` index `]` `.`
    let head = just(Token::Fir)
        .ignore_then(
            uint.clone()
                .delimited_by(just(Token::LBracket), just(Token::RBracket)),
        )
        .then_ignore(just(Token::Dot));

    // `sampleRate = <uint>`
    let rate_field = just(Token::SampleRate)
        .ignore_then(just(Token::Equals))
        .ignore_then(uint)
        .map(|(rate, span)| Field::Rate(rate, span));

    // `coeff = [ ... ]` — trailing comma and empty list are accepted here;
    // an empty coefficient list is rejected when the spec model is built.
    let coeff_field = just(Token::Coeff)
        .ignore_then(just(Token::Equals))
        .ignore_then(
            real.separated_by(just(Token::Comma))
                .allow_trailing()
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LBracket), just(Token::RBracket)),
        )
        .map(Field::Coeffs);

    let statement = head
        .then(rate_field.or(coeff_field))
        .then_ignore(just(Token::Semi))
        .map_with(|((fir_index, index_span), field), e| {
            let kind = match field {
                Field::Rate(rate, rate_span) => StatementKind::SampleRate(SampleRateStmt {
                    fir_index,
                    index_span,
                    rate,
                    rate_span,
                }),
                Field::Coeffs(coeffs) => StatementKind::Coeffs(CoeffStmt {
                    fir_index,
                    index_span,
                    coeffs,
                }),
            };
            Statement {
                kind,
                span: e.span(),
            }
        });

    statement
        .repeated()
        .collect::<Vec<_>>()
        .then_ignore(end())
        .map_with(|statements, e| Program {
            statements,
            span: e.span(),
        })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Program {
        let result = parse(source);
        assert!(
            result.errors.is_empty(),
            "unexpected parse errors: {:?}",
            result.errors
        );
        result.program.expect("no program")
    }

    #[test]
    fn sample_rate_statement() {
        let program = parse_ok("FIR[0].sampleRate = 48000;");
        assert_eq!(program.statements.len(), 1);
        match &program.statements[0].kind {
            StatementKind::SampleRate(s) => {
                assert_eq!(s.fir_index, 0);
                assert_eq!(s.rate, 48000);
            }
            other => panic!("expected SampleRate, got {other:?}"),
        }
    }

    #[test]
    fn coeff_statement() {
        let program = parse_ok("FIR[2].coeff = [0.5, -0.25, 1];");
        match &program.statements[0].kind {
            StatementKind::Coeffs(s) => {
                assert_eq!(s.fir_index, 2);
                let values: Vec<f64> = s.coeffs.iter().map(|(v, _)| *v).collect();
                assert_eq!(values, vec![0.5, -0.25, 1.0]);
            }
            other => panic!("expected Coeffs, got {other:?}"),
        }
    }

    #[test]
    fn trailing_comma_accepted() {
        let program = parse_ok("FIR[0].coeff = [0.1, 0.2,];");
        match &program.statements[0].kind {
            StatementKind::Coeffs(s) => assert_eq!(s.coeffs.len(), 2),
            other => panic!("expected Coeffs, got {other:?}"),
        }
    }

    #[test]
    fn empty_coeff_list_parses() {
        // Rejected later by the spec builder, not the grammar.
        let program = parse_ok("FIR[0].coeff = [];");
        match &program.statements[0].kind {
            StatementKind::Coeffs(s) => assert!(s.coeffs.is_empty()),
            other => panic!("expected Coeffs, got {other:?}"),
        }
    }

    #[test]
    fn multiple_statements_with_comments() {
        let source = "\
# lowpass bank
FIR[0].sampleRate = 48000;
FIR[0].coeff = [0.25, 0.5, 0.25];
FIR[1].sampleRate = 8000;   # voice band
FIR[1].coeff = [0.5, 0.5];
";
        let program = parse_ok(source);
        assert_eq!(program.statements.len(), 4);
        assert_eq!(program.statements[2].fir_index(), 1);
    }

    #[test]
    fn missing_semicolon_is_error() {
        let result = parse("FIR[0].sampleRate = 48000");
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn negative_sample_rate_is_error() {
        let result = parse("FIR[0].sampleRate = -48000;");
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn unknown_field_is_error() {
        let result = parse("FIR[0].gain = 3;");
        assert!(!result.errors.is_empty());
    }
}
