use std::collections::{HashMap, HashSet};

use log::trace;

use super::{CircularDependency, Field, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Visited,
}

/// Depth-first walk over same-table dependencies of calculated fields.
struct Walk<'t> {
    table: &'t Table,

    /// Dependencies of each calculated field on other calculated fields of the table.
    deps: HashMap<&'t str, Vec<String>>,

    marks: HashMap<String, Mark>,
    ordered: Vec<&'t Field>,
}

/// Calculated fields of the table, every one after all the calculated fields it
/// depends on. Independent fields keep their declaration order.
pub(super) fn calculation_order(table: &Table) -> Result<Vec<&Field>, CircularDependency> {
    let calculated: Vec<&Field> = table.calculated_fields().collect();
    let names: HashSet<&str> = calculated.iter().map(|f| f.name()).collect();

    let deps = calculated
        .iter()
        .map(|f| {
            let deps = f
                .dependencies()
                .into_iter()
                .filter(|d| names.contains(d.as_str()))
                .collect();
            (f.name(), deps)
        })
        .collect();

    let mut walk = Walk {
        table,
        deps,
        marks: HashMap::with_capacity(calculated.len()),
        ordered: Vec::with_capacity(calculated.len()),
    };
    for field in &calculated {
        walk.visit(field.name())?;
    }

    trace!(
        "Calculation order of `{}`: {:?}",
        table.name(),
        walk.ordered.iter().map(|f| f.name()).collect::<Vec<_>>()
    );
    Ok(walk.ordered)
}

impl<'t> Walk<'t> {
    fn visit(&mut self, name: &str) -> Result<(), CircularDependency> {
        match self.marks.get(name) {
            Some(Mark::Visited) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(CircularDependency {
                    table: self.table.name().to_owned(),
                    field: name.to_owned(),
                })
            }
            None => {}
        }

        self.marks.insert(name.to_owned(), Mark::Visiting);

        let deps = self.deps.get(name).cloned().unwrap_or_default();
        for dep in &deps {
            self.visit(dep)?;
        }

        self.marks.insert(name.to_owned(), Mark::Visited);
        if let Some(field) = self.table.field(name) {
            self.ordered.push(field);
        }
        Ok(())
    }
}
