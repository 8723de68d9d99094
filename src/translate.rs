use log::{debug, warn};
use thiserror::Error;

use crate::ctx::Ctx;
use crate::formula::{
    CountIf, Expression, Extremum, Formula, IndexMatch, MinMaxIfs, Piece, Unparsable,
};
use crate::lang::{Family, Language, LanguageProfile};

/// Result of MINIFS and MAXIFS when no row matches the criteria.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EmptyExtremum {
    Value(f64),

    /// The language's null value.
    Null,
}

impl Default for EmptyExtremum {
    fn default() -> Self {
        EmptyExtremum::Value(0.0)
    }
}

impl EmptyExtremum {
    fn as_number(&self) -> Option<f64> {
        match self {
            EmptyExtremum::Value(v) => Some(*v),
            EmptyExtremum::Null => None,
        }
    }
}

/// Something in the formula that the translation could not express faithfully.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Warning {
    #[error("{0}")]
    Unparsable(#[from] Unparsable),

    #[error("function `{name}` has no {language} counterpart and is kept as written")]
    UnknownFunction { name: String, language: Language },

    #[error("`{table}!{{{{{field}}}}}` outside of a lookup or aggregation is kept as written")]
    CrossTableReference { table: String, field: String },

    #[error("{language} has no record access convention, formula is kept as written")]
    NoConvention { language: Language },

    #[error("lookup key is read from `{found}` while translating a field of `{expected}`")]
    KeyTable { expected: String, found: String },

    #[error("value is read from `{value}` but the key is matched in `{lookup}`")]
    LookupTable { value: String, lookup: String },
}

/// Translated code with the warnings found on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub code: String,
    pub warnings: Vec<Warning>,
}

/// Translates formulas into code fragments of one target language.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Translator {
    language: Language,
    empty_extremum: EmptyExtremum,
}

impl Translator {
    pub fn new(language: Language) -> Self {
        Translator {
            language,
            empty_extremum: EmptyExtremum::default(),
        }
    }

    pub fn with_empty_extremum(mut self, empty_extremum: EmptyExtremum) -> Self {
        self.empty_extremum = empty_extremum;
        self
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Translate the formula, logging every warning. Formulas that do not parse become
    /// a comment holding the formula text.
    pub fn translate(&self, formula: &str, ctx: &Ctx) -> String {
        let Translation { code, warnings } = self.translate_detailed(formula, ctx);

        for warning in &warnings {
            match warning {
                Warning::Unparsable(e) => warn!("{warning}\n{}", e.explain()),
                _ => warn!("{warning}"),
            }
        }
        code
    }

    pub fn translate_detailed(&self, formula: &str, ctx: &Ctx) -> Translation {
        let source = formula.strip_prefix('=').unwrap_or(formula);
        let mut render = Render {
            profile: self.language.profile(),
            ctx,
            empty_extremum: self.empty_extremum,
            source,
            warnings: Vec::new(),
        };

        let code = match Formula::parse(formula) {
            Ok(Formula::IndexMatch(f)) => render.index_match(&f),
            Ok(Formula::CountIf(f)) => render.count_if(&f),
            Ok(Formula::MinMaxIfs(f)) => render.min_max_ifs(&f),
            Ok(Formula::Expression(f)) => render.expression(&f),
            Err(e) => render.placeholder(e),
        };
        debug!("Translated `{formula}` to {}: {code}", self.language);

        Translation {
            code,
            warnings: render.warnings,
        }
    }
}

/// Rendering of one formula.
struct Render<'a> {
    profile: &'static LanguageProfile,
    ctx: &'a Ctx,
    empty_extremum: EmptyExtremum,

    /// Formula text without the leading `=`.
    source: &'a str,

    warnings: Vec<Warning>,
}

impl<'a> Render<'a> {
    fn placeholder(&mut self, e: Unparsable) -> String {
        let code = self
            .profile
            .comment(&format!("Could not parse {}: {}", e.shape_name(), e.text));
        self.warnings.push(e.into());
        code
    }

    fn passthrough(&mut self) -> String {
        self.warnings.push(Warning::NoConvention {
            language: self.profile.language,
        });
        self.source.to_owned()
    }

    fn index_match(&mut self, f: &IndexMatch) -> String {
        let p = self.profile;

        let current = &self.ctx.current_table;
        if !current.is_empty() && **f.key.table != **current {
            self.warnings.push(Warning::KeyTable {
                expected: current.clone(),
                found: f.key.table.to_string(),
            });
        }

        if **f.lookup_key.table != **f.value.table {
            self.warnings.push(Warning::LookupTable {
                value: f.value.table.to_string(),
                lookup: f.lookup_key.table.to_string(),
            });
        }

        let lookup = p.lookup_var(&f.value.table);
        let key = p.member(p.receiver, &f.key.field);
        let value = p.ident(&f.value.field);

        match p.family {
            Family::Python => {
                format!("{lookup}.get({key}).{value} if {lookup}.get({key}) else None")
            }
            Family::Go => format!("{lookup}[{key}].{value}"),
            Family::EcmaScript => format!("{lookup}[{key}]?.{value}"),
            Family::Sql => self.passthrough(),
        }
    }

    fn count_if(&mut self, f: &CountIf) -> String {
        let p = self.profile;
        let row = p.row;
        let rows = p.rows_var(&f.range.table);
        let field = p.member(row, &f.range.field);
        let value = p.member(p.receiver, &f.criteria);

        match p.family {
            Family::Python => format!("sum(1 for {row} in {rows} if {field} == {value})"),
            Family::Go => format!(
                "func() int {{\n\
                 \tcount := 0\n\
                 \tfor _, {row} := range {rows} {{\n\
                 \t\tif {field} == {value} {{\n\
                 \t\t\tcount++\n\
                 \t\t}}\n\
                 \t}}\n\
                 \treturn count\n\
                 }}()"
            ),
            Family::EcmaScript => format!("{rows}.filter({row} => {field} === {value}).length"),
            Family::Sql => self.passthrough(),
        }
    }

    fn min_max_ifs(&mut self, f: &MinMaxIfs) -> String {
        let p = self.profile;
        let row = p.row;
        let rows = p.rows_var(&f.result.table);
        let cond = p.member(row, &f.criteria_range.field);
        let value = p.member(p.receiver, &f.criteria);
        let empty = p.number(self.empty_extremum.as_number());

        let result = if self.ctx.is_computed(&f.result.table, &f.result.field) {
            p.computed(row, &f.result.field)
        } else {
            p.member(row, &f.result.field)
        };

        match p.family {
            Family::Python => {
                let func = match f.extremum {
                    Extremum::Min => "min",
                    Extremum::Max => "max",
                };
                format!("{func}(({result} for {row} in {rows} if {cond} == {value}), default={empty})")
            }
            Family::Go => {
                let cmp = match f.extremum {
                    Extremum::Min => "<",
                    Extremum::Max => ">",
                };
                format!(
                    "func() float64 {{\n\
                     \tresult, found := 0.0, false\n\
                     \tfor _, {row} := range {rows} {{\n\
                     \t\tif {cond} == {value} {{\n\
                     \t\t\tval := float64({result})\n\
                     \t\t\tif !found || val {cmp} result {{\n\
                     \t\t\t\tresult, found = val, true\n\
                     \t\t\t}}\n\
                     \t\t}}\n\
                     \t}}\n\
                     \tif !found {{\n\
                     \t\treturn {empty}\n\
                     \t}}\n\
                     \treturn result\n\
                     }}()"
                )
            }
            Family::EcmaScript => {
                let func = match f.extremum {
                    Extremum::Min => "Math.min",
                    Extremum::Max => "Math.max",
                };
                format!(
                    "((values) => values.length ? {func}(...values) : {empty})\
                     ({rows}.filter({row} => {cond} === {value}).map({row} => {result}))"
                )
            }
            Family::Sql => self.passthrough(),
        }
    }

    fn expression(&mut self, f: &Expression) -> String {
        let p = self.profile;
        if p.family == Family::Sql {
            return self.passthrough();
        }

        let source = f.source();
        let mut code = String::with_capacity(source.len() * 2);
        let mut pos = 0;

        for piece in f.pieces() {
            let span = piece.span();
            code.push_str(&source[pos..span.start()]);

            match piece {
                Piece::Field(name) => code.push_str(&p.member(p.receiver, name)),
                Piece::Call(name) => match p.function(name) {
                    Some(func) => code.push_str(func),
                    None => {
                        self.warnings.push(Warning::UnknownFunction {
                            name: name.to_string(),
                            language: p.language,
                        });
                        code.push_str(name);
                    }
                },
                Piece::CrossTable(qualified) => {
                    self.warnings.push(Warning::CrossTableReference {
                        table: qualified.table.to_string(),
                        field: qualified.field.to_string(),
                    });
                    code.push_str(span.slice(source));
                }
            }

            pos = span.end();
        }

        code.push_str(&source[pos..]);
        code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Rulebook, Sample};

    const BASE_SCALE: &str =
        "=INDEX(systems!{{BaseScale}}, MATCH(scales!{{System}}, systems!{{SystemID}}, 0))";

    /// Translate a field of the fractals sample.
    fn field(language: Language, table: &str, field: &str) -> Translation {
        let rulebook = Rulebook::from_json_str(Sample::Fractals.into()).unwrap();
        let table = rulebook.table(table).unwrap();
        let field = table.field(field).unwrap();
        let ctx = Ctx::for_field(&rulebook, table, field);

        Translator::new(language).translate_detailed(field.formula().unwrap(), &ctx)
    }

    #[test]
    fn index_match() {
        crate::init_log();

        let t = field(Language::Python, "scales", "BaseScale");
        assert_eq!(
            t.code,
            "systems_dict.get(self.system).base_scale if systems_dict.get(self.system) else None"
        );
        assert!(t.warnings.is_empty());

        assert_eq!(
            field(Language::Golang, "scales", "ScaleFactor").code,
            "systemsMap[s.System].ScaleFactor"
        );
        assert_eq!(
            field(Language::TypeScript, "scales", "BaseScale").code,
            "systemsMap[this.system]?.baseScale"
        );
        assert_eq!(
            field(Language::JavaScript, "scales", "BaseScale").code,
            "systemsMap[this.system]?.baseScale"
        );
    }

    #[test]
    fn index_match_key_from_other_table() {
        let ctx = Ctx {
            current_table: "system_stats".into(),
            ..Ctx::default()
        };
        let t = Translator::new(Language::Golang).translate_detailed(BASE_SCALE, &ctx);
        assert_eq!(t.code, "systemsMap[s.System].BaseScale");
        assert_eq!(
            t.warnings,
            vec![Warning::KeyTable {
                expected: "system_stats".into(),
                found: "scales".into(),
            }]
        );

        // No current table, nothing to compare against.
        let t = Translator::new(Language::Golang).translate_detailed(BASE_SCALE, &Ctx::default());
        assert!(t.warnings.is_empty());
    }

    #[test]
    fn index_match_key_matched_in_other_table() {
        let t = Translator::new(Language::TypeScript).translate_detailed(
            "=INDEX(systems!{{X}}, MATCH(s!{{K}}, other!{{Id}}, 0))",
            &Ctx::default(),
        );
        assert_eq!(t.code, "systemsMap[this.k]?.x");
        assert_eq!(
            t.warnings,
            vec![Warning::LookupTable {
                value: "systems".into(),
                lookup: "other".into(),
            }]
        );
    }

    #[test]
    fn count_if() {
        assert_eq!(
            field(Language::Python, "system_stats", "ScaleCount").code,
            "sum(1 for row in scales if row.system == self.system)"
        );
        assert_eq!(
            field(Language::TypeScript, "system_stats", "ScaleCount").code,
            "scales.filter(row => row.system === this.system).length"
        );
        assert_eq!(
            field(Language::Golang, "system_stats", "ScaleCount").code,
            "func() int {\n\
             \tcount := 0\n\
             \tfor _, row := range scales {\n\
             \t\tif row.System == s.System {\n\
             \t\t\tcount++\n\
             \t\t}\n\
             \t}\n\
             \treturn count\n\
             }()"
        );
    }

    #[test]
    fn min_max_ifs() {
        assert_eq!(
            field(Language::Python, "system_stats", "MinLogScale").code,
            "min((row.calculate_log_scale() for row in scales if row.system == self.system), default=0)"
        );
        assert_eq!(
            field(Language::JavaScript, "system_stats", "MaxLogMeasure").code,
            "((values) => values.length ? Math.max(...values) : 0)\
             (scales.filter(row => row.system === this.system).map(row => row.calculateLogMeasure()))"
        );
        assert_eq!(
            field(Language::Golang, "system_stats", "MinLogScale").code,
            "func() float64 {\n\
             \tresult, found := 0.0, false\n\
             \tfor _, row := range scales {\n\
             \t\tif row.System == s.System {\n\
             \t\t\tval := float64(row.CalculateLogScale())\n\
             \t\t\tif !found || val < result {\n\
             \t\t\t\tresult, found = val, true\n\
             \t\t\t}\n\
             \t\t}\n\
             \t}\n\
             \tif !found {\n\
             \t\treturn 0\n\
             \t}\n\
             \treturn result\n\
             }()"
        );
    }

    #[test]
    fn min_max_ifs_stored_result() {
        let formula = "=MAXIFS(scales!{{Measure}}, scales!{{System}}, {{System}})";

        // Measure is stored in the scales table.
        let rulebook = Rulebook::from_json_str(Sample::Fractals.into()).unwrap();
        let stats = rulebook.table("system_stats").unwrap();
        let ctx = Ctx::for_field(&rulebook, stats, stats.field("MaxLogMeasure").unwrap());
        assert_eq!(
            Translator::new(Language::Python).translate(formula, &ctx),
            "max((row.measure for row in scales if row.system == self.system), default=0)"
        );

        // Unknown table, the field flag decides.
        let ctx = Ctx {
            field_is_computed: true,
            ..Ctx::default()
        };
        assert_eq!(
            Translator::new(Language::Python).translate(formula, &ctx),
            "max((row.calculate_measure() for row in scales if row.system == self.system), default=0)"
        );
    }

    #[test]
    fn min_max_ifs_integer_result_in_go() {
        let formula = "=MAXIFS(scales!{{Iteration}}, scales!{{System}}, {{System}})";
        let code = Translator::new(Language::Golang).translate(formula, &Ctx::default());
        assert!(code.contains("\t\t\tval := float64(row.Iteration)\n"), "{code}");
        assert!(code.contains("if !found || val > result {"), "{code}");
    }

    #[test]
    fn min_max_ifs_lookup_field_reads_stored_value() {
        let rulebook = Rulebook::from_json_str(Sample::Fractals.into()).unwrap();
        let scales = rulebook.table("scales").unwrap();
        let ctx = Ctx {
            calculated_fields_by_table: Default::default(),
            ..Ctx::for_field(&rulebook, scales, scales.field("BaseScale").unwrap())
        };

        assert_eq!(
            Translator::new(Language::Python)
                .translate("=MAXIFS(other!{{Measure}}, other!{{System}}, {{System}})", &ctx),
            "max((row.measure for row in other if row.system == self.system), default=0)"
        );
    }

    #[test]
    fn empty_extremum() {
        let formula = "=MINIFS(scales!{{Measure}}, scales!{{System}}, {{System}})";
        let null = Translator::new(Language::Python).with_empty_extremum(EmptyExtremum::Null);
        assert_eq!(
            null.translate(formula, &Ctx::default()),
            "min((row.measure for row in scales if row.system == self.system), default=None)"
        );

        let ts = Translator::new(Language::TypeScript)
            .with_empty_extremum(EmptyExtremum::Value(-1.5));
        assert_eq!(
            ts.translate(formula, &Ctx::default()),
            "((values) => values.length ? Math.min(...values) : -1.5)\
             (scales.filter(row => row.system === this.system).map(row => row.measure))"
        );
    }

    #[test]
    fn expression() {
        assert_eq!(
            field(Language::Python, "scales", "ScaleFactorPower").code,
            "math.pow(self.scale_factor, self.iteration)"
        );
        assert_eq!(
            field(Language::Golang, "scales", "ScaleFactorPower").code,
            "math.Pow(s.ScaleFactor, s.Iteration)"
        );
        assert_eq!(
            field(Language::TypeScript, "scales", "ScaleFactorPower").code,
            "Math.pow(this.scaleFactor, this.iteration)"
        );
        assert_eq!(
            field(Language::Python, "scales", "Scale").code,
            "self.base_scale * self.scale_factor_power"
        );
        assert_eq!(
            field(Language::JavaScript, "scales", "LogScale").code,
            "Math.log10(this.scale)"
        );
    }

    #[test]
    fn expression_functions_ignore_case() {
        let t = Translator::new(Language::Python)
            .translate_detailed("=log10({{Scale}}) + Round({{Measure}}, 2)", &Ctx::default());
        assert_eq!(t.code, "math.log10(self.scale) + Round(self.measure, 2)");
        assert_eq!(
            t.warnings,
            vec![Warning::UnknownFunction {
                name: "Round".into(),
                language: Language::Python,
            }]
        );
    }

    #[test]
    fn expression_cross_table_reference() {
        let t = Translator::new(Language::Golang)
            .translate_detailed("={{A}} + other!{{B}}", &Ctx::default());
        assert_eq!(t.code, "s.A + other!{{B}}");
        assert_eq!(
            t.warnings,
            vec![Warning::CrossTableReference {
                table: "other".into(),
                field: "B".into(),
            }]
        );
        assert_eq!(
            t.warnings[0].to_string(),
            "`other!{{B}}` outside of a lookup or aggregation is kept as written"
        );
    }

    #[test]
    fn malformed_formula() {
        let py = Translator::new(Language::Python);
        let t = py.translate_detailed("=INDEX(garbage)", &Ctx::default());
        assert_eq!(t.code, "# Could not parse INDEX/MATCH: INDEX(garbage)");
        assert!(matches!(t.warnings.as_slice(), [Warning::Unparsable(_)]));

        let go = Translator::new(Language::Golang);
        assert_eq!(
            go.translate("=COUNTIF(scales!{{System}})", &Ctx::default()),
            "/* Could not parse COUNTIF: COUNTIF(scales!{{System}}) */"
        );
        assert_eq!(
            go.translate("=1 + MAXIFS(a!{{B}}, a!{{C}}, {{D}})", &Ctx::default()),
            "/* Could not parse MINIFS/MAXIFS: 1 + MAXIFS(a!{{B}}, a!{{C}}, {{D}}) */"
        );
        assert_eq!(
            Translator::new(Language::Sql).translate("={{A}} / 2)", &Ctx::default()),
            "/* Could not parse formula: {{A}} / 2) */"
        );
    }

    #[test]
    fn sql_passthrough() {
        let sql = Translator::new(Language::Sql);
        let t = sql.translate_detailed("=POWER({{ScaleFactor}}, {{Iteration}})", &Ctx::default());
        assert_eq!(t.code, "POWER({{ScaleFactor}}, {{Iteration}})");
        assert_eq!(
            t.warnings,
            vec![Warning::NoConvention {
                language: Language::Sql
            }]
        );

        assert_eq!(
            sql.translate(BASE_SCALE, &Ctx::default()),
            BASE_SCALE.strip_prefix('=').unwrap()
        );
    }

    #[test]
    fn every_field_in_every_language() {
        let rulebook = Rulebook::from_json_str(Sample::Fractals.into()).unwrap();

        for language in Language::ALL {
            let translator = Translator::new(language);
            for table in rulebook.tables() {
                for field in table.calculation_order().unwrap() {
                    let ctx = Ctx::for_field(&rulebook, table, field);
                    let t = translator.translate_detailed(field.formula().unwrap(), &ctx);

                    assert!(!t.code.is_empty());
                    assert!(!t.code.contains("Could not parse"), "{}", t.code);
                    if language != Language::Sql {
                        assert!(t.warnings.is_empty(), "{:?}", t.warnings);
                        assert!(!t.code.contains("{{"), "{}", t.code);
                    }
                }
            }
        }
    }

    #[test]
    fn two_table_document() {
        crate::init_log();

        let rulebook = Rulebook::from_json_str(
            r#"{
                "systems": {
                    "primary_key": ["SystemID"],
                    "schema": [
                        { "name": "SystemID", "type": "raw", "is_primary_key": true },
                        { "name": "BaseScale", "datatype": "number", "type": "raw" }
                    ]
                },
                "scales": {
                    "primary_key": ["ScaleID"],
                    "schema": [
                        { "name": "ScaleID", "type": "raw", "is_primary_key": true },
                        { "name": "System", "type": "relationship", "RelatedTo": "systems" },
                        { "name": "Scale", "datatype": "number", "type": "calculated",
                          "formula": "=INDEX(systems!{{BaseScale}}, MATCH(scales!{{System}}, systems!{{SystemID}}, 0))" }
                    ]
                }
            }"#,
        )
        .unwrap();

        let scales = rulebook.table("scales").unwrap();
        let order = scales.calculation_order().unwrap();
        assert_eq!(order.iter().map(|f| f.name()).collect::<Vec<_>>(), vec!["Scale"]);

        let scale = order[0];
        let ctx = Ctx::for_field(&rulebook, scales, scale);
        let code = Translator::new(Language::Python).translate(scale.formula().unwrap(), &ctx);
        assert!(code.contains("base_scale"), "{code}");
        assert!(code.contains("self.system"), "{code}");
        assert!(code.contains("systems_dict"), "{code}");

        assert!(rulebook.validate().is_empty());
    }
}
