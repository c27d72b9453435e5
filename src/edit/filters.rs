use std::fmt;

use serde::{Deserialize, Serialize};

/// Colour filter identifiers. `None` means "no filter baked in" and is never
/// offered as a selectable entry.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum FilterId {
    #[default]
    #[value(skip)]
    None = 0,
    Red = 1,
    Green = 2,
    Blue = 3,
}

impl FilterId {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            FilterId::None => "None",
            FilterId::Red => "Red",
            FilterId::Green => "Green",
            FilterId::Blue => "Blue",
        }
    }
}

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilterEntry {
    pub display_asset: &'static str,
    pub filter: FilterId,
}

const DEFAULT_ENTRIES: [FilterEntry; 3] = [
    FilterEntry {
        display_asset: "swatch_blue",
        filter: FilterId::Blue,
    },
    FilterEntry {
        display_asset: "swatch_green",
        filter: FilterId::Green,
    },
    FilterEntry {
        display_asset: "swatch_red",
        filter: FilterId::Red,
    },
];

/// Fixed, ordered list of selectable filters; order is presentation order
#[derive(Debug, Clone, Copy)]
pub struct FilterCatalog {
    entries: &'static [FilterEntry],
}

impl FilterCatalog {
    pub fn new() -> Self {
        Self {
            entries: &DEFAULT_ENTRIES,
        }
    }

    pub fn list(&self) -> &'static [FilterEntry] {
        self.entries
    }

    pub fn get(&self, position: usize) -> Option<FilterEntry> {
        self.entries.get(position).copied()
    }

    pub fn position_of(&self, filter: FilterId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.filter == filter)
    }
}

impl Default for FilterCatalog {
    fn default() -> Self {
        Self::new()
    }
}
