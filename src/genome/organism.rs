use std::fmt;

use log::warn;
use serde::Deserialize;

/// Organisms with a known autosome count
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Organism {
    #[default]
    Human,
    Mouse,
}

impl Organism {
    /// Number of autosomes; sex chromosomes X and Y come on top of these
    pub fn max_chr(&self) -> u32 {
        match self {
            Organism::Human => 22,
            Organism::Mouse => 19,
        }
    }

    /// Lookup for command lines: anything that is not exactly "mouse" is
    /// treated with the human chromosome set
    pub fn from_label(label: &str) -> Organism {
        match label {
            "mouse" => Organism::Mouse,
            "human" => Organism::Human,
            other => {
                warn!(
                    "Unknown organism '{}', assuming {} autosomes. Use --max-chr for other organisms",
                    other,
                    Organism::Human.max_chr()
                );
                Organism::Human
            }
        }
    }
}

impl fmt::Display for Organism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Organism::Human => write!(f, "human"),
            Organism::Mouse => write!(f, "mouse"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_chr() {
        assert_eq!(Organism::Human.max_chr(), 22);
        assert_eq!(Organism::Mouse.max_chr(), 19);
    }

    #[test]
    fn test_from_label() {
        assert_eq!(Organism::from_label("mouse"), Organism::Mouse);
        assert_eq!(Organism::from_label("Mouse"), Organism::Human);
        assert_eq!(Organism::from_label("MOUSE"), Organism::Human);
        assert_eq!(Organism::from_label("human"), Organism::Human);
        assert_eq!(Organism::from_label("zebrafish"), Organism::Human);
    }
}
