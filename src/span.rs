//! Byte ranges of tokens within formula text. Spans are relative to the formula
//! body, that is, after the leading `=` was stripped.

/// Position in the formula text. 32 bits should be enough for everyone.
type Pos = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    start: Pos,
    end: Pos,
}

#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("Start of the span is after the end")]
pub struct InvalidSpan;

/// Value with the span of the text it was parsed from.
///
/// Equality ignores the span, so that parsed structures can be compared against
/// hand-built ones in tests.
#[derive(Debug)]
pub struct Spanned<T> {
    value: T,
    span: Span,
}

impl<T> Spanned<T> {
    pub fn span(&self) -> Span {
        self.span
    }

    pub fn split(self) -> (T, Span) {
        (self.value, self.span)
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> std::ops::Deref for Spanned<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T> std::cmp::PartialEq for Spanned<T>
where
    T: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> std::cmp::Eq for Spanned<T> where T: Eq {}

impl<T> Clone for Spanned<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            span: self.span,
        }
    }
}

impl Span {
    pub const NONE: Self = Self { start: 0, end: 0 };

    pub fn new(start: Pos, end: Pos) -> Result<Self, InvalidSpan> {
        if start > end {
            return Err(InvalidSpan);
        }
        Ok(Self { start, end })
    }

    /// Empty span at the given position. Used to point past the last token.
    pub fn at(pos: usize) -> Self {
        Self {
            start: pos as Pos,
            end: pos as Pos,
        }
    }

    pub fn start(&self) -> usize {
        self.start as usize
    }

    pub fn end(&self) -> usize {
        self.end as usize
    }

    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check if this span fully contains another span.
    pub fn contains(&self, other: &Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Combine two spans into one, taking the smallest start and the largest end.
    pub fn combine(&self, other: &Self) -> Self {
        let start = self.start.min(other.start);
        let end = self.end.max(other.end);
        Self { start, end }
    }

    pub fn with<T>(self, value: T) -> Spanned<T> {
        Spanned { value, span: self }
    }

    /// Text this span covers in the source. Empty if the span is out of bounds.
    pub fn slice<'s>(&self, source: &'s str) -> &'s str {
        source.get(self.start()..self.end()).unwrap_or_default()
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(range: std::ops::Range<usize>) -> Self {
        Self {
            start: range.start as Pos,
            end: range.end as Pos,
        }
    }
}
