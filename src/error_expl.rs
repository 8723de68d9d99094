use log::trace;
use smallvec::SmallVec;

use crate::span::Span;

/// Renders explanations for a single line of formula text.
pub struct Pretty<'src> {
    source: &'src str,
}

impl<'src> Pretty<'src> {
    pub fn new(source: &'src str) -> Self {
        Self { source }
    }

    pub fn explain_builder(&self) -> ExplainBuilder<'src> {
        ExplainBuilder {
            source: self.source,
            error_context: None,
            explain_contexts: Default::default(),
        }
    }
}

pub struct ExplainBuilder<'src> {
    source: &'src str,
    error_context: Option<Context>,
    explain_contexts: SmallVec<[Context; 8]>,
}

impl<'src> ExplainBuilder<'src> {
    /// Add a context with the error message.
    pub fn push_context(&mut self, context: Context) -> &mut Self {
        self.explain_contexts.push(context);
        self
    }

    /// Add an error context to the error message.
    pub fn error(&mut self, context: Context) -> &mut Self {
        self.error_context = Some(context);
        self
    }

    /// Build pretty explanation from the provided contexts.
    ///
    /// The source line is printed first, then one marker line per context: `^` under
    /// the important span, `-` under the rest of the additional span, followed by the
    /// context message.
    ///
    /// ```text
    /// INDEX(a!{{B}}, MATCH(c!{{D}}, e!{{F}}
    ///                                      ^ unexpected end of formula
    /// ```
    pub fn build(self) -> Result<PrettyError, ExplainBuildError> {
        let error = self
            .error_context
            .ok_or(ExplainBuildError::MissingErrorContext)?;

        // Markers are aligned by characters, so line breaks must not shift them.
        let line: String = self
            .source
            .chars()
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect();

        let mut out = line;
        for context in std::iter::once(&error).chain(self.explain_contexts.iter()) {
            out.push('\n');
            out.push_str(&context.marker_line(self.source));
        }

        trace!("Explanation built with {} notes", self.explain_contexts.len());
        Ok(PrettyError(out))
    }
}

#[derive(Debug, Clone)]
pub struct PrettyError(String);

impl std::fmt::Display for PrettyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for PrettyError {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::convert::AsRef<str> for PrettyError {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExplainBuildError {
    #[error("Error context is missing")]
    MissingErrorContext,
}

#[derive(Debug, Clone)]
pub struct Context {
    important: Span,
    additional: Span,
    message: String,
}

impl Context {
    /// Character column of a byte offset. Offsets past the end land right after the text.
    fn column(source: &str, offset: usize) -> usize {
        let offset = offset.min(source.len());
        source
            .char_indices()
            .take_while(|(idx, _)| *idx < offset)
            .count()
    }

    fn marker_line(&self, source: &str) -> String {
        let add_start = Self::column(source, self.additional.start());
        let add_end = Self::column(source, self.additional.end());
        let imp_start = Self::column(source, self.important.start());
        // Empty spans still get a single caret.
        let imp_end = Self::column(source, self.important.end()).max(imp_start + 1);

        let width = add_end.max(imp_end);
        let mut line = String::with_capacity(width + self.message.len() + 1);
        for col in 0..width {
            let c = if (imp_start..imp_end).contains(&col) {
                '^'
            } else if (add_start..add_end).contains(&col) {
                '-'
            } else {
                ' '
            };
            line.push(c);
        }
        line.push(' ');
        line.push_str(&self.message);
        line
    }
}

#[derive(Debug, Default)]
pub struct ContextBuilder {
    important: Option<Span>,
    additional: Option<Span>,
    message: Option<String>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn important(&mut self, span: Span) -> &mut Self {
        self.important = Some(span);
        self
    }

    pub fn additional(&mut self, span: Span) -> &mut Self {
        self.additional = Some(span);
        self
    }

    pub fn message(&mut self, message: impl Into<String>) -> &mut Self {
        self.message = Some(message.into());
        self
    }

    pub fn build(&mut self) -> Result<Context, ContextBuildError> {
        trace!("Building context");

        let important = self.important.ok_or(ContextBuildError::MissingImportant)?;
        let additional = self.additional.unwrap_or(important);

        trace!("Check additional span covers important span");
        if !additional.contains(&important) {
            return Err(ContextBuildError::AdditionalNotCoveringImportant);
        }

        let message = self
            .message
            .take()
            .ok_or(ContextBuildError::MissingMessage)?;

        trace!("Context is built successfully");
        Ok(Context {
            important,
            additional,
            message,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContextBuildError {
    #[error("Missing important span")]
    MissingImportant,

    #[error("Missing message")]
    MissingMessage,

    #[error("Additional context span does not cover important context span")]
    AdditionalNotCoveringImportant,
}
