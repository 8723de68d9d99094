use std::collections::{HashMap, HashSet};

use crate::schema::{Field, FieldType, Rulebook, Table};

/// What the translator knows about the field whose formula it renders.
#[derive(Debug, Default, Clone)]
pub struct Ctx {
    /// Table the field belongs to.
    pub current_table: String,

    /// Whether the field is of `calculated` or `aggregation` type. Used as the
    /// fallback for tables missing from [Ctx::calculated_fields_by_table].
    pub field_is_computed: bool,

    /// Names of the calculated fields of each table.
    pub calculated_fields_by_table: HashMap<String, HashSet<String>>,
}

impl Ctx {
    /// Context for translating a field of the given table.
    pub fn for_field(rulebook: &Rulebook, table: &Table, field: &Field) -> Ctx {
        let calculated_fields_by_table = rulebook
            .tables()
            .iter()
            .map(|t| {
                let names: HashSet<String> =
                    t.calculated_fields().map(|f| f.name().to_owned()).collect();
                (t.name().to_owned(), names)
            })
            .collect();

        Ctx {
            current_table: table.name().to_owned(),
            field_is_computed: matches!(
                field.field_type(),
                FieldType::Calculated | FieldType::Aggregation
            ),
            calculated_fields_by_table,
        }
    }

    /// Whether the field of the table is read through its computing accessor.
    pub fn is_computed(&self, table: &str, field: &str) -> bool {
        self.calculated_fields_by_table
            .get(table)
            .map(|fields| fields.contains(field))
            .unwrap_or(self.field_is_computed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Sample;

    #[test]
    fn for_field() {
        let rulebook = Rulebook::from_json_str(Sample::Fractals.into()).unwrap();
        let stats = rulebook.table("system_stats").unwrap();
        let ctx = Ctx::for_field(&rulebook, stats, stats.field("MinLogScale").unwrap());

        assert_eq!(ctx.current_table, "system_stats");
        assert!(ctx.field_is_computed);
        assert_eq!(ctx.calculated_fields_by_table.len(), 3);
        assert!(ctx.calculated_fields_by_table["systems"].is_empty());

        assert!(ctx.is_computed("scales", "LogScale"));
        assert!(ctx.is_computed("scales", "BaseScale"));
        assert!(!ctx.is_computed("scales", "Measure"));
        assert!(!ctx.is_computed("systems", "BaseScale"));
    }

    #[test]
    fn lookup_field_is_not_computed() {
        let rulebook = Rulebook::from_json_str(Sample::Fractals.into()).unwrap();
        let scales = rulebook.table("scales").unwrap();

        let ctx = Ctx::for_field(&rulebook, scales, scales.field("BaseScale").unwrap());
        assert!(!ctx.field_is_computed);

        // Lookups are still computed when read from another table.
        assert!(ctx.is_computed("scales", "BaseScale"));

        let ctx = Ctx::for_field(&rulebook, scales, scales.field("LogScale").unwrap());
        assert!(ctx.field_is_computed);

        let ctx = Ctx {
            calculated_fields_by_table: Default::default(),
            ..Ctx::for_field(&rulebook, scales, scales.field("ScaleFactor").unwrap())
        };
        assert!(!ctx.is_computed("other", "Measure"));
    }

    #[test]
    fn fallback_for_unknown_table() {
        let ctx = Ctx::default();
        assert!(!ctx.is_computed("anything", "X"));

        let ctx = Ctx {
            field_is_computed: true,
            ..Ctx::default()
        };
        assert!(ctx.is_computed("anything", "X"));
    }
}
