use logos::Logos;

use super::{FormulaError, Keyword};
use crate::span::{Span, Spanned};

/// Iterator over lexical elements.
pub(super) type LexIter<'a> = logos::SpannedIter<'a, FormulaLex>;

/// Lexical element of a formula.
#[derive(Debug, Logos, PartialEq, Eq, Clone)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum FormulaLex {
    /// `{{FieldName}}`, holding just the name.
    #[regex(r"\{\{[A-Za-z_][A-Za-z0-9_]*\}\}", lex_field_ref)]
    FieldRef(String),

    /// Table or function name.
    #[regex("[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_owned())]
    Ident(String),

    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", |lex| lex.slice().to_owned())]
    NumLit(String),

    /// Double-quoted text, where `""` stands for a single quote character.
    #[regex(r#""([^"]|"")*""#, lex_str_lit)]
    StrLit(String),

    #[token("!")]
    Bang,

    #[token("(")]
    OpenParen,

    #[token(")")]
    CloseParen,

    #[token(",")]
    Comma,

    #[regex(r"<>|<=|>=|[-+*/^&=<>%]", |lex| lex.slice().to_owned())]
    Operator(String),
}

fn lex_field_ref(lex: &mut logos::Lexer<FormulaLex>) -> String {
    let slice = lex.slice();
    slice[2..slice.len() - 2].to_owned()
}

fn lex_str_lit(lex: &mut logos::Lexer<FormulaLex>) -> String {
    let slice = lex.slice();

    if cfg!(debug_assertions) {
        // Check start and end to be quotes.
        assert_eq!(slice.chars().next(), Some('"'));
        assert_eq!(slice.chars().last(), Some('"'));
    }

    let unquoted = &slice[1..slice.len() - 1];

    // Apply escape sequences.
    unquoted.replace("\"\"", "\"")
}

/// Create a guarded context for running a parser to restore the original state if parsing fails.
pub(super) trait Guard<'lex> {
    fn guard<T, E>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, E>) -> Result<T, E>;
}

impl<'lex> Guard<'lex> for LexIter<'lex> {
    fn guard<T, E>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, E>) -> Result<T, E> {
        let original = self.clone();
        match f(self) {
            Ok(v) => Ok(v),
            Err(e) => {
                *self = original;
                Err(e)
            }
        }
    }
}

impl FormulaLex {
    /// Take the next token, failing on the end of input or on text that is not a token.
    pub(super) fn next_token(iter: &mut LexIter) -> Result<Spanned<FormulaLex>, FormulaError> {
        match iter.next() {
            Some((Ok(token), range)) => Ok(Span::from(range).with(token)),
            Some((Err(()), range)) => Err(FormulaError::UnknownToken {
                text: iter.slice().to_owned(),
                span: range.into(),
            }),
            None => Err(FormulaError::UnexpectedEnd {
                span: Span::at(iter.source().len()),
            }),
        }
    }

    /// Expect next token to be the same as this one.
    pub(super) fn expect(&self, iter: &mut LexIter, expected: &'static str) -> Result<Span, FormulaError> {
        let next = Self::next_token(iter)?;
        if *next == *self {
            Ok(next.span())
        } else {
            Err(FormulaError::unexpected(expected, iter.slice(), next.span()))
        }
    }

    /// Check if next token is the same as this one. If so, advance the iterator and return true.
    pub(super) fn probe(&self, iter: &mut LexIter) -> bool {
        self.spanprobe(iter).is_some()
    }

    /// Check if next token is the same as this one. If so, advance the iterator and return [Span].
    pub(super) fn spanprobe(&self, iter: &mut LexIter) -> Option<Span> {
        let backup = iter.clone();

        if let Some((Ok(next), range)) = iter.next() {
            if next == *self {
                return Some(Span::from(range));
            }
        }

        *iter = backup;
        None
    }

    /// Expect next token to be an identifier.
    pub(super) fn expect_ident(
        iter: &mut LexIter,
        expected: &'static str,
    ) -> Result<Spanned<String>, FormulaError> {
        let (next, span) = Self::next_token(iter)?.split();
        match next {
            FormulaLex::Ident(ident) => Ok(span.with(ident)),
            _ => Err(FormulaError::unexpected(expected, iter.slice(), span)),
        }
    }

    /// Expect next token to be the given function name, in any letter case.
    pub(super) fn expect_keyword(iter: &mut LexIter, keyword: Keyword) -> Result<Span, FormulaError> {
        let ident = Self::expect_ident(iter, keyword.expected())?;
        if Keyword::from_ident(&ident) == Some(keyword) {
            Ok(ident.span())
        } else {
            Err(FormulaError::unexpected(
                keyword.expected(),
                &ident,
                ident.span(),
            ))
        }
    }

    /// Expect next token to be a `{{Field}}` reference.
    pub(super) fn expect_field_ref(
        iter: &mut LexIter,
        expected: &'static str,
    ) -> Result<Spanned<String>, FormulaError> {
        let (next, span) = Self::next_token(iter)?.split();
        match next {
            FormulaLex::FieldRef(name) => Ok(span.with(name)),
            _ => Err(FormulaError::unexpected(expected, iter.slice(), span)),
        }
    }

    /// Expect the input to be fully consumed.
    pub(super) fn expect_end(iter: &mut LexIter) -> Result<(), FormulaError> {
        match iter.next() {
            None => Ok(()),
            Some((Ok(_), range)) => Err(FormulaError::unexpected(
                "end of formula",
                iter.slice(),
                range.into(),
            )),
            Some((Err(()), range)) => Err(FormulaError::UnknownToken {
                text: iter.slice().to_owned(),
                span: range.into(),
            }),
        }
    }
}
