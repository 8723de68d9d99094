//! Rulebook is a small toolkit for "single source of truth" code generation.
//! A canonical rulebook document describes tables, their fields and spreadsheet-style
//! formulas for the calculated fields. Generators read the rulebook and emit equivalent
//! code for several target languages, so that every platform computes the same values
//! from the same definitions.
//!
//! # Rulebook Document
//! The document is a JSON (or YAML) mapping. Each top-level key is a table name, except
//! for reserved metadata keys: `model_name`, `Description`, and any key starting with
//! `$` or `_`.
//!
//! ```json
//! {
//!   "model_name": "Fractals",
//!   "systems": {
//!     "Description": "Fractal systems",
//!     "primary_key": ["SystemID"],
//!     "schema": [
//!       { "name": "SystemID", "datatype": "string", "type": "raw", "is_primary_key": true },
//!       { "name": "BaseScale", "datatype": "number", "type": "raw" }
//!     ],
//!     "data": [ { "SystemID": "koch", "BaseScale": 1.0 } ]
//!   }
//! }
//! ```
//!
//! Fields are either stored (`raw`, `relationship`) or calculated (`lookup`,
//! `calculated`, `aggregation`). Calculated fields carry a formula.
//!
//! # Formula Dialect
//! Formulas are a tiny subset of spreadsheet formulas:
//! - `{{Field}}` references a field of the current record;
//! - `table!{{Field}}` references a column of another (or the same) table;
//! - `POWER`, `LOG10`, `ABS` and `SQRT` are math functions;
//! - `INDEX(..., MATCH(...))`, `COUNTIF`, `MINIFS` and `MAXIFS` are recognized only
//!   as the whole formula, in the fixed shapes described in [formula].
//!
//! Each formula is parsed into a [formula::Formula] and the [translate::Translator]
//! renders it as a code fragment for the chosen [lang::Language].

/// Positions of tokens in formula text.
pub mod span;

/// Human-readable explanation of errors, pointing at the offending part of a formula.
pub mod error_expl;

/// Identifier casing conventions shared by all target languages.
pub mod naming;

/// Target languages and their static code-generation profiles.
pub mod lang;

/// Rulebook schema model: tables, fields, relationships and calculation order.
pub mod schema;

/// Loading rulebook documents from files.
pub mod load;

/// Formula lexing, parsing and dependency extraction.
pub mod formula;

/// Context of a single field translation.
pub mod ctx;

/// Translation of parsed formulas into target language code.
pub mod translate;

pub use ctx::Ctx;
pub use formula::Formula;
pub use lang::Language;
pub use schema::{Field, Rulebook, Table};
pub use translate::Translator;

#[cfg(test)]
pub fn init_log() {
    use log::*;

    static INIT: std::sync::Once = std::sync::Once::new();

    INIT.call_once(|| {
        flexi_logger::Logger::with(LevelFilter::Trace)
            .format(format)
            .start()
            .unwrap();
    });

    fn format(
        write: &mut dyn std::io::Write,
        _: &mut flexi_logger::DeferredNow,
        record: &Record,
    ) -> std::io::Result<()> {
        write.write_all(
            format!(
                "[{} {}:{}] {} - {}",
                record.level(),
                record.file().unwrap_or_default(),
                record.line().unwrap_or_default(),
                record.module_path().unwrap_or_default(),
                record.args()
            )
            .as_bytes(),
        )
    }
}

/// Reference of sample rulebooks bundled with the crate.
#[cfg(test)]
pub enum Sample {
    /// Fractal and power-law systems, their scales and per-system statistics.
    Fractals,

    /// Two calculated fields depending on each other.
    Cyclic,

    /// Relationship fields with missing or dangling targets, and a table without a key.
    Broken,
}

#[cfg(test)]
impl Into<&'static str> for Sample {
    fn into(self) -> &'static str {
        use Sample::*;
        match self {
            Fractals => include_str!("../samples/fractals.json"),
            Cyclic => include_str!("../samples/cyclic.json"),
            Broken => include_str!("../samples/broken.yaml"),
        }
    }
}
