use thiserror::Error;

use crate::naming::{self, Case};

/// Target language of the generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    Golang,
    TypeScript,
    JavaScript,
    Sql,
}

/// Syntax family. Languages of one family share the shape templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Python,
    Go,
    EcmaScript,

    /// No record access convention. Formulas pass through as written.
    Sql,
}

/// Static code generation conventions of a language.
#[derive(Debug)]
pub struct LanguageProfile {
    pub language: Language,
    pub family: Family,

    /// Spreadsheet function name to the language's equivalent.
    pub functions: &'static [(&'static str, &'static str)],

    /// Casing of fields and tables. `None` leaves names as written.
    pub case: Option<Case>,

    /// Name of the current record inside generated methods.
    pub receiver: &'static str,

    /// Loop variable iterating over rows of another table.
    pub row: &'static str,

    /// Suffix of the variable holding a table keyed by its primary key.
    pub lookup_suffix: &'static str,

    /// Opening and closing of a block comment.
    pub comment: (&'static str, &'static str),

    pub imports: &'static [&'static str],
}

static PYTHON: LanguageProfile = LanguageProfile {
    language: Language::Python,
    family: Family::Python,
    functions: &[
        ("POWER", "math.pow"),
        ("LOG10", "math.log10"),
        ("ABS", "abs"),
        ("SQRT", "math.sqrt"),
    ],
    case: Some(Case::Snake),
    receiver: "self",
    row: "row",
    lookup_suffix: "_dict",
    comment: ("# ", ""),
    imports: &["import math", "from typing import Optional, Dict, List"],
};

static GOLANG: LanguageProfile = LanguageProfile {
    language: Language::Golang,
    family: Family::Go,
    functions: &[
        ("POWER", "math.Pow"),
        ("LOG10", "math.Log10"),
        ("ABS", "math.Abs"),
        ("SQRT", "math.Sqrt"),
    ],
    case: Some(Case::Pascal),
    receiver: "s",
    row: "row",
    lookup_suffix: "Map",
    comment: ("/* ", " */"),
    imports: &["import \"math\""],
};

const ECMA_FUNCTIONS: &[(&str, &str)] = &[
    ("POWER", "Math.pow"),
    ("LOG10", "Math.log10"),
    ("ABS", "Math.abs"),
    ("SQRT", "Math.sqrt"),
];

static TYPESCRIPT: LanguageProfile = LanguageProfile {
    language: Language::TypeScript,
    family: Family::EcmaScript,
    functions: ECMA_FUNCTIONS,
    case: Some(Case::Camel),
    receiver: "this",
    row: "row",
    lookup_suffix: "Map",
    comment: ("/* ", " */"),
    imports: &[],
};

static JAVASCRIPT: LanguageProfile = LanguageProfile {
    language: Language::JavaScript,
    family: Family::EcmaScript,
    functions: ECMA_FUNCTIONS,
    case: Some(Case::Camel),
    receiver: "this",
    row: "row",
    lookup_suffix: "Map",
    comment: ("/* ", " */"),
    imports: &[],
};

static SQL: LanguageProfile = LanguageProfile {
    language: Language::Sql,
    family: Family::Sql,
    functions: &[
        ("POWER", "POWER"),
        ("LOG10", "LOG10"),
        ("ABS", "ABS"),
        ("SQRT", "SQRT"),
    ],
    case: None,
    receiver: "",
    row: "",
    lookup_suffix: "",
    comment: ("/* ", " */"),
    imports: &[],
};

impl Language {
    pub const ALL: [Language; 5] = [
        Language::Python,
        Language::Golang,
        Language::TypeScript,
        Language::JavaScript,
        Language::Sql,
    ];

    pub fn profile(&self) -> &'static LanguageProfile {
        match self {
            Language::Python => &PYTHON,
            Language::Golang => &GOLANG,
            Language::TypeScript => &TYPESCRIPT,
            Language::JavaScript => &JAVASCRIPT,
            Language::Sql => &SQL,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Golang => "golang",
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Sql => "sql",
        }
    }

    /// Import lines the generated file needs for translated formulas.
    pub fn required_imports(&self) -> &'static [&'static str] {
        self.profile().imports
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
#[error("Unknown target language: {0}")]
pub struct UnknownLanguage(String);

impl std::str::FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "python" | "py" => Ok(Language::Python),
            "golang" | "go" => Ok(Language::Golang),
            "typescript" | "ts" => Ok(Language::TypeScript),
            "javascript" | "js" => Ok(Language::JavaScript),
            "sql" | "postgres" => Ok(Language::Sql),
            _ => Err(UnknownLanguage(s.to_owned())),
        }
    }
}

impl LanguageProfile {
    /// Target function for a spreadsheet function name, matched case-insensitively.
    pub fn function(&self, name: &str) -> Option<&'static str> {
        self.functions
            .iter()
            .find(|(excel, _)| excel.eq_ignore_ascii_case(name))
            .map(|(_, target)| *target)
    }

    /// Field or table name in this language's casing.
    pub fn ident(&self, name: &str) -> String {
        match self.case {
            Some(case) => case.apply(name),
            None => name.to_owned(),
        }
    }

    /// Access to a stored field of `record`.
    pub fn member(&self, record: &str, field: &str) -> String {
        format!("{record}.{}", self.ident(field))
    }

    /// Call of the method computing a calculated field of `record`.
    pub fn computed(&self, record: &str, field: &str) -> String {
        match self.family {
            Family::Python => format!("{record}.calculate_{}()", naming::to_snake_case(field)),
            Family::Go => format!("{record}.Calculate{}()", naming::to_pascal_case(field)),
            Family::EcmaScript => format!("{record}.calculate{}()", naming::to_pascal_case(field)),
            Family::Sql => field.to_owned(),
        }
    }

    /// Variable holding `table` keyed by its primary key.
    pub fn lookup_var(&self, table: &str) -> String {
        format!("{}{}", self.variable(table), self.lookup_suffix)
    }

    /// Collection of all rows of `table`.
    pub fn rows_var(&self, table: &str) -> String {
        self.variable(table)
    }

    /// Local variable name. Go exports by capital letter, so its locals stay camel case.
    fn variable(&self, name: &str) -> String {
        match self.family {
            Family::Python => naming::to_snake_case(name),
            Family::Go | Family::EcmaScript => naming::to_camel_case(name),
            Family::Sql => name.to_owned(),
        }
    }

    pub fn comment(&self, text: &str) -> String {
        let (open, close) = self.comment;
        if close.is_empty() {
            format!("{open}{}", text.replace('\n', " "))
        } else {
            format!("{open}{}{close}", text.replace(close.trim(), "* /"))
        }
    }

    /// Numeric literal. `None` stands for the language's null value.
    pub fn number(&self, value: Option<f64>) -> String {
        let Some(v) = value.filter(|v| !v.is_nan()) else {
            return match self.family {
                Family::Python => "None",
                Family::Go => "math.NaN()",
                Family::EcmaScript => "null",
                Family::Sql => "NULL",
            }
            .to_owned();
        };

        if v.is_infinite() {
            let neg = v < 0.0;
            return match (self.family, neg) {
                (Family::Python, false) => "float('inf')".to_owned(),
                (Family::Python, true) => "float('-inf')".to_owned(),
                (Family::Go, false) => "math.Inf(1)".to_owned(),
                (Family::Go, true) => "math.Inf(-1)".to_owned(),
                (Family::EcmaScript, false) => "Infinity".to_owned(),
                (Family::EcmaScript, true) => "-Infinity".to_owned(),
                (Family::Sql, false) => "'Infinity'".to_owned(),
                (Family::Sql, true) => "'-Infinity'".to_owned(),
            };
        }

        if v.fract() == 0.0 && v.abs() < 1e15 {
            format!("{}", v as i64)
        } else {
            format!("{v}")
        }
    }
}
