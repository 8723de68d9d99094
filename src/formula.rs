//! Formulas are parsed into one of four shapes:
//!
//! - `INDEX(t!{{Field}}, MATCH(s!{{Key}}, t!{{Id}}, 0))`: single-row lookup in table `t`
//!   by the current record's `Key`, see [IndexMatch];
//! - `COUNTIF(t!{{Field}}, {{Value}})`: count of rows of `t` where `Field` equals the
//!   current record's `Value`, see [CountIf];
//! - `MINIFS(t!{{Result}}, t!{{Cond}}, {{Value}})` and `MAXIFS(...)`: extremum of `Result`
//!   over rows of `t` where `Cond` equals the current record's `Value`, see [MinMaxIfs];
//! - anything else is an arithmetic [Expression] over the current record's fields.
//!
//! The shape functions are recognized only as the whole formula. A formula that calls
//! one of them in any other way fails to parse with [Unparsable].

use log::trace;
use logos::Logos;
use smallvec::SmallVec;
use thiserror::Error;

use crate::error_expl::{ContextBuilder, Pretty};
use crate::span::{Span, Spanned};

mod lex;
mod parse;

pub use lex::FormulaLex;

/// Function names that define the shape of a formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Index,
    Match,
    CountIf,
    MinIfs,
    MaxIfs,
}

impl Keyword {
    pub fn from_ident(ident: &str) -> Option<Keyword> {
        use Keyword::*;

        [Index, Match, CountIf, MinIfs, MaxIfs]
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(ident))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Index => "INDEX",
            Keyword::Match => "MATCH",
            Keyword::CountIf => "COUNTIF",
            Keyword::MinIfs => "MINIFS",
            Keyword::MaxIfs => "MAXIFS",
        }
    }

    /// Name of the shape this keyword introduces, as used in diagnostics.
    pub fn shape_name(&self) -> &'static str {
        match self {
            Keyword::Index | Keyword::Match => "INDEX/MATCH",
            Keyword::CountIf => "COUNTIF",
            Keyword::MinIfs | Keyword::MaxIfs => "MINIFS/MAXIFS",
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            Keyword::Index => "`INDEX`",
            Keyword::Match => "`MATCH`",
            Keyword::CountIf => "`COUNTIF`",
            Keyword::MinIfs => "`MINIFS`",
            Keyword::MaxIfs => "`MAXIFS`",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    #[error("unknown token `{text}`")]
    UnknownToken { text: String, span: Span },

    #[error("unexpected end of formula")]
    UnexpectedEnd { span: Span },

    #[error("expected {expected}, found `{found}`")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
        span: Span,
    },

    #[error("MATCH type `{found}` is not supported, only exact match `0` is")]
    MatchType { found: String, span: Span },

    #[error("{name} ranges must be on one table, found `{result}` and `{criteria}`", name = .keyword.as_str())]
    MixedTables {
        keyword: Keyword,
        result: String,
        criteria: String,
        span: Span,
    },

    #[error("{name} must be the whole formula", name = .keyword.as_str())]
    NestedShape { keyword: Keyword, span: Span },

    #[error("unmatched `)`")]
    UnmatchedParen { span: Span },
}

impl FormulaError {
    fn unexpected(expected: &'static str, found: &str, span: Span) -> FormulaError {
        FormulaError::UnexpectedToken {
            expected,
            found: found.to_owned(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        use FormulaError::*;

        match self {
            UnknownToken { span, .. }
            | UnexpectedEnd { span }
            | UnexpectedToken { span, .. }
            | MatchType { span, .. }
            | MixedTables { span, .. }
            | NestedShape { span, .. }
            | UnmatchedParen { span } => *span,
        }
    }

    /// Render the formula with the error marked under the offending part.
    pub fn explain(&self, source: &str) -> String {
        let context = ContextBuilder::new()
            .important(self.span())
            .message(self.to_string())
            .build();

        let mut builder = Pretty::new(source).explain_builder();
        match context {
            Ok(context) => builder.error(context),
            Err(_) => return self.to_string(),
        };

        match builder.build() {
            Ok(pretty) => pretty.to_string(),
            Err(_) => self.to_string(),
        }
    }
}

/// Formula that matched a shape keyword but not the shape's structure, or that
/// does not parse at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not parse {shape}: {error}", shape = .keyword.map(|k| k.shape_name()).unwrap_or("formula"))]
pub struct Unparsable {
    /// Formula text without the leading `=`.
    pub text: String,

    /// Shape the formula was recognized as, if any.
    pub keyword: Option<Keyword>,

    pub error: FormulaError,
}

impl Unparsable {
    pub fn shape_name(&self) -> &'static str {
        self.keyword.map(|k| k.shape_name()).unwrap_or("formula")
    }

    pub fn explain(&self) -> String {
        self.error.explain(&self.text)
    }
}

/// `table!{{Field}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedRef {
    pub table: Spanned<String>,
    pub field: Spanned<String>,
}

impl QualifiedRef {
    pub fn span(&self) -> Span {
        self.table.span().combine(&self.field.span())
    }
}

/// `INDEX(value, MATCH(key, lookup_key, 0))`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMatch {
    /// Column of the looked-up table to return.
    pub value: QualifiedRef,

    /// Foreign key of the current record.
    pub key: QualifiedRef,

    /// Column of the looked-up table matched against the key.
    pub lookup_key: QualifiedRef,
}

/// `COUNTIF(range, {{criteria}})`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountIf {
    pub range: QualifiedRef,
    pub criteria: Spanned<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Min,
    Max,
}

/// `MINIFS(result, criteria_range, {{criteria}})` or `MAXIFS(...)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinMaxIfs {
    pub extremum: Extremum,
    pub result: QualifiedRef,
    pub criteria_range: QualifiedRef,
    pub criteria: Spanned<String>,
}

/// Part of an expression that is rewritten on translation. The text between pieces is
/// kept as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    /// `{{Field}}` of the current record.
    Field(Spanned<String>),

    /// `table!{{Field}}` outside of any shape function.
    CrossTable(QualifiedRef),

    /// Name of a called function, without the parenthesis.
    Call(Spanned<String>),
}

impl Piece {
    pub fn span(&self) -> Span {
        match self {
            Piece::Field(name) | Piece::Call(name) => name.span(),
            Piece::CrossTable(qualified) => qualified.span(),
        }
    }
}

/// Arithmetic expression over the current record's fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    source: String,
    pieces: Vec<Piece>,
}

impl Expression {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Rewritable pieces, in source order.
    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }
}

/// Parsed formula, tagged by its shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Formula {
    IndexMatch(IndexMatch),
    CountIf(CountIf),
    MinMaxIfs(MinMaxIfs),
    Expression(Expression),
}

impl Formula {
    /// Parse formula text, with or without the leading `=`.
    pub fn parse(text: &str) -> Result<Formula, Unparsable> {
        let source = strip_assign(text);
        trace!("Parsing formula `{source}`");

        parse::formula(source).map_err(|(keyword, error)| Unparsable {
            text: source.to_owned(),
            keyword,
            error,
        })
    }

    /// Keyword of the formula's shape, `None` for expressions.
    pub fn keyword(&self) -> Option<Keyword> {
        match self {
            Formula::IndexMatch(_) => Some(Keyword::Index),
            Formula::CountIf(_) => Some(Keyword::CountIf),
            Formula::MinMaxIfs(MinMaxIfs {
                extremum: Extremum::Min,
                ..
            }) => Some(Keyword::MinIfs),
            Formula::MinMaxIfs(_) => Some(Keyword::MaxIfs),
            Formula::Expression(_) => None,
        }
    }
}

fn strip_assign(text: &str) -> &str {
    text.strip_prefix('=').unwrap_or(text)
}

/// Names referenced as `{{Name}}` that are not qualified by a `table!` prefix, in order
/// of first appearance.
///
/// This works on tokens alone, so it also extracts references from formulas that do
/// not parse.
pub fn dependencies(text: &str) -> Vec<String> {
    let mut deps: SmallVec<[String; 8]> = SmallVec::new();
    let mut prev: Option<FormulaLex> = None;

    for token in FormulaLex::lexer(strip_assign(text)) {
        let token = token.ok();
        if let Some(FormulaLex::FieldRef(name)) = &token {
            let qualified = matches!(prev, Some(FormulaLex::Bang));
            if !qualified && !deps.contains(name) {
                deps.push(name.clone());
            }
        }
        prev = token;
    }

    deps.into_vec()
}
