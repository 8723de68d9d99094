use log::trace;
use logos::Logos;

use super::lex::{FormulaLex, Guard, LexIter};
use super::{
    CountIf, Expression, Extremum, Formula, FormulaError, IndexMatch, Keyword, MinMaxIfs, Piece,
    QualifiedRef,
};
use crate::span::Span;

/// Failed parse, with the shape keyword the formula started with.
type ShapeError = (Option<Keyword>, FormulaError);

/// Parse lexemes into a structure.
trait Parse: Sized {
    fn parse(tokens: &mut LexIter) -> Result<Self, FormulaError>;
}

/// Parse the formula body, without the leading `=`.
pub(super) fn formula(source: &str) -> Result<Formula, ShapeError> {
    let mut iter = FormulaLex::lexer(source).spanned();

    let Some((keyword, keyword_span)) = shape_start(&iter) else {
        trace!("No shape keyword at the start, parsing as expression");
        return expression(source);
    };
    trace!("Formula starts with {}", keyword.as_str());

    let shape = match keyword {
        Keyword::Index => IndexMatch::parse(&mut iter).map(Formula::IndexMatch),
        Keyword::CountIf => CountIf::parse(&mut iter).map(Formula::CountIf),
        Keyword::MinIfs | Keyword::MaxIfs => MinMaxIfs::parse(&mut iter).map(Formula::MinMaxIfs),
        // MATCH is only valid inside INDEX.
        Keyword::Match => Err(FormulaError::unexpected(
            "`INDEX`",
            keyword.as_str(),
            keyword_span,
        )),
    };

    shape
        .and_then(|f| FormulaLex::expect_end(&mut iter).map(|_| f))
        .map_err(|e| (Some(keyword), e))
}

/// Shape keyword followed by an opening parenthesis at the start of the formula.
fn shape_start(iter: &LexIter) -> Option<(Keyword, Span)> {
    let mut peek = iter.clone();

    let (Ok(FormulaLex::Ident(name)), range) = peek.next()? else {
        return None;
    };
    let keyword = Keyword::from_ident(&name)?;

    FormulaLex::OpenParen
        .probe(&mut peek)
        .then(|| (keyword, Span::from(range)))
}

impl Parse for QualifiedRef {
    fn parse(tokens: &mut LexIter) -> Result<QualifiedRef, FormulaError> {
        use FormulaLex::*;

        tokens.guard(|iter| {
            let table = FormulaLex::expect_ident(iter, "table name")?;
            Bang.expect(iter, "`!`")?;
            let field = FormulaLex::expect_field_ref(iter, "`{{Field}}` reference")?;
            Ok(QualifiedRef { table, field })
        })
    }
}

impl Parse for IndexMatch {
    fn parse(tokens: &mut LexIter) -> Result<IndexMatch, FormulaError> {
        use FormulaLex::*;

        tokens.guard(|iter| {
            FormulaLex::expect_keyword(iter, Keyword::Index)?;
            OpenParen.expect(iter, "`(`")?;
            let value = QualifiedRef::parse(iter)?;
            Comma.expect(iter, "`,`")?;

            FormulaLex::expect_keyword(iter, Keyword::Match)?;
            OpenParen.expect(iter, "`(`")?;
            let key = QualifiedRef::parse(iter)?;
            Comma.expect(iter, "`,`")?;
            let lookup_key = QualifiedRef::parse(iter)?;
            Comma.expect(iter, "`,`")?;
            exact_match_type(iter)?;
            CloseParen.expect(iter, "`)`")?;

            CloseParen.expect(iter, "`)`")?;

            Ok(IndexMatch {
                value,
                key,
                lookup_key,
            })
        })
    }
}

/// Third argument of MATCH. Only exact match, `0`, has a lookup counterpart in code.
fn exact_match_type(iter: &mut LexIter) -> Result<(), FormulaError> {
    let (token, span) = FormulaLex::next_token(iter)?.split();
    match token {
        FormulaLex::NumLit(n) if n.parse::<f64>() == Ok(0.0) => Ok(()),
        FormulaLex::NumLit(n) => Err(FormulaError::MatchType { found: n, span }),
        FormulaLex::Operator(op) if op == "-" => {
            let (token, num_span) = FormulaLex::next_token(iter)?.split();
            match token {
                FormulaLex::NumLit(n) => Err(FormulaError::MatchType {
                    found: format!("-{n}"),
                    span: span.combine(&num_span),
                }),
                _ => Err(FormulaError::unexpected("match type", iter.slice(), num_span)),
            }
        }
        _ => Err(FormulaError::unexpected("match type", iter.slice(), span)),
    }
}

impl Parse for CountIf {
    fn parse(tokens: &mut LexIter) -> Result<CountIf, FormulaError> {
        use FormulaLex::*;

        tokens.guard(|iter| {
            FormulaLex::expect_keyword(iter, Keyword::CountIf)?;
            OpenParen.expect(iter, "`(`")?;
            let range = QualifiedRef::parse(iter)?;
            Comma.expect(iter, "`,`")?;
            let criteria = FormulaLex::expect_field_ref(iter, "`{{Field}}` reference")?;
            CloseParen.expect(iter, "`)`")?;

            Ok(CountIf { range, criteria })
        })
    }
}

impl Parse for MinMaxIfs {
    fn parse(tokens: &mut LexIter) -> Result<MinMaxIfs, FormulaError> {
        use FormulaLex::*;

        tokens.guard(|iter| {
            let name = FormulaLex::expect_ident(iter, "`MINIFS` or `MAXIFS`")?;
            let (keyword, extremum) = match Keyword::from_ident(&name) {
                Some(k @ Keyword::MinIfs) => (k, Extremum::Min),
                Some(k @ Keyword::MaxIfs) => (k, Extremum::Max),
                _ => {
                    return Err(FormulaError::unexpected(
                        "`MINIFS` or `MAXIFS`",
                        &name,
                        name.span(),
                    ))
                }
            };

            OpenParen.expect(iter, "`(`")?;
            let result = QualifiedRef::parse(iter)?;
            Comma.expect(iter, "`,`")?;
            let criteria_range = QualifiedRef::parse(iter)?;
            Comma.expect(iter, "`,`")?;
            let criteria = FormulaLex::expect_field_ref(iter, "`{{Field}}` reference")?;
            CloseParen.expect(iter, "`)`")?;

            // Both ranges must walk the same rows.
            if *result.table != *criteria_range.table {
                return Err(FormulaError::MixedTables {
                    keyword,
                    result: result.table.to_string(),
                    criteria: criteria_range.table.to_string(),
                    span: result.span().combine(&criteria_range.span()),
                });
            }

            Ok(MinMaxIfs {
                extremum,
                result,
                criteria_range,
                criteria,
            })
        })
    }
}

/// Scan an arithmetic expression for the pieces to rewrite on translation.
///
/// Text that is not a known token is kept as is. Only parentheses are checked for
/// balance, and shape keywords are rejected as they cannot be a part of an expression.
fn expression(source: &str) -> Result<Formula, ShapeError> {
    let tokens: Vec<(Option<FormulaLex>, Span)> = FormulaLex::lexer(source)
        .spanned()
        .map(|(token, range)| (token.ok(), range.into()))
        .collect();

    let token_at = |idx: Option<usize>| idx.and_then(|i| tokens.get(i)).and_then(|(t, _)| t.as_ref());

    let mut pieces = Vec::new();
    let mut depth = 0usize;
    for (idx, (token, span)) in tokens.iter().enumerate() {
        let span = *span;
        let Some(token) = token else {
            continue;
        };

        match token {
            FormulaLex::FieldRef(name) => {
                let prev = token_at(idx.checked_sub(1));
                let prev2 = token_at(idx.checked_sub(2));
                match (prev2, prev) {
                    (Some(FormulaLex::Ident(table)), Some(FormulaLex::Bang)) => {
                        let table_span = tokens[idx - 2].1;
                        pieces.push(Piece::CrossTable(QualifiedRef {
                            table: table_span.with(table.clone()),
                            field: span.with(name.clone()),
                        }));
                    }
                    // Bang without a table name, left as written.
                    (_, Some(FormulaLex::Bang)) => {}
                    _ => pieces.push(Piece::Field(span.with(name.clone()))),
                }
            }
            FormulaLex::Ident(name) => {
                if let Some(FormulaLex::OpenParen) = token_at(Some(idx + 1)) {
                    if let Some(keyword) = Keyword::from_ident(name) {
                        return Err((
                            Some(keyword),
                            FormulaError::NestedShape { keyword, span },
                        ));
                    }
                    pieces.push(Piece::Call(span.with(name.clone())));
                }
            }
            FormulaLex::OpenParen => depth += 1,
            FormulaLex::CloseParen => {
                depth = depth
                    .checked_sub(1)
                    .ok_or((None, FormulaError::UnmatchedParen { span }))?;
            }
            _ => {}
        }
    }

    if depth > 0 {
        return Err((
            None,
            FormulaError::UnexpectedEnd {
                span: Span::at(source.len()),
            },
        ));
    }

    Ok(Formula::Expression(Expression {
        source: source.to_owned(),
        pieces,
    }))
}
