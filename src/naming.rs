use lazy_regex::{regex_is_match, regex_replace_all};

/// Identifier casing used by a target language for fields and tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Case {
    /// `base_scale`
    Snake,

    /// `BaseScale`
    Pascal,

    /// `baseScale`
    Camel,
}

impl Case {
    pub fn apply(&self, name: &str) -> String {
        match self {
            Case::Snake => to_snake_case(name),
            Case::Pascal => to_pascal_case(name),
            Case::Camel => to_camel_case(name),
        }
    }
}

/// Whether the name can be referenced from a formula as `{{name}}`.
pub fn is_identifier(name: &str) -> bool {
    regex_is_match!(r"^[A-Za-z_][A-Za-z0-9_]*$", name)
}

/// Convert `PascalCase` or `camelCase` to `snake_case`.
///
/// A run of capitals stays one word: `SystemID` becomes `system_id`.
pub fn to_snake_case(name: &str) -> String {
    let words = regex_replace_all!(r"(.)([A-Z][a-z]+)", name, |_, a: &str, b: &str| {
        format!("{a}_{b}")
    });
    regex_replace_all!(r"([a-z0-9])([A-Z])", &*words, |_, a: &str, b: &str| {
        format!("{a}_{b}")
    })
    .to_lowercase()
}

/// Convert any casing to `PascalCase`, going through the snake case form first.
pub fn to_pascal_case(name: &str) -> String {
    to_snake_case(name)
        .split('_')
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect()
}

/// Convert any casing to `camelCase`.
pub fn to_camel_case(name: &str) -> String {
    let pascal = to_pascal_case(name);
    let mut chars = pascal.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
