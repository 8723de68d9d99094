use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::schema::{ParseError, Rulebook};

impl Rulebook {
    /// Loads the rulebook file from the provided path.
    /// The format is chosen by the file extension: `.json`, `.yaml` or `.yml`.
    pub fn load(path: &Path) -> Result<Rulebook, LoadError> {
        let format =
            Format::of(path).ok_or_else(|| LoadError::NotRulebookFile(path.to_owned()))?;

        debug!("Loading {format:?} rulebook from `{}`", path.display());
        let content = std::fs::read_to_string(path)?;

        let rulebook = match format {
            Format::Json => Rulebook::from_json_str(&content)?,
            Format::Yaml => Rulebook::from_yaml_str(&content)?,
        };
        Ok(rulebook)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    fn of(path: &Path) -> Option<Format> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("json") {
            Some(Format::Json)
        } else if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") {
            Some(Format::Yaml)
        } else {
            None
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error occurred while loading the rulebook. {0}")]
    IoError(#[from] std::io::Error),

    #[error("Rulebook file could not be parsed. {0}")]
    Parse(#[from] ParseError),

    #[error("File is not recognized as a rulebook: `{0}`")]
    NotRulebookFile(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("samples").join(name)
    }

    #[test]
    fn load_json() {
        crate::init_log();

        let rulebook = Rulebook::load(&sample("fractals.json")).unwrap();
        assert_eq!(rulebook.model_name(), "FractalsAndPowerLaws");
        assert_eq!(rulebook.tables().len(), 3);
    }

    #[test]
    fn load_yaml() {
        let rulebook = Rulebook::load(&sample("broken.yaml")).unwrap();
        assert_eq!(rulebook.table_names().collect::<Vec<_>>(), vec!["orders"]);
    }

    #[test]
    fn format_by_extension() {
        assert_eq!(Format::of(Path::new("a.JSON")), Some(Format::Json));
        assert_eq!(Format::of(Path::new("dir/a.yml")), Some(Format::Yaml));
        assert_eq!(Format::of(Path::new("a.toml")), None);
        assert_eq!(Format::of(Path::new("json")), None);
    }

    #[test]
    fn load_errors() {
        assert!(matches!(
            Rulebook::load(Path::new("rulebook.toml")),
            Err(LoadError::NotRulebookFile(_))
        ));
        assert!(matches!(
            Rulebook::load(&sample("missing.json")),
            Err(LoadError::IoError(_))
        ));
    }
}
