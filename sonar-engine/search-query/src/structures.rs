use serde::{Deserialize, Serialize};

/// What order to sort the returned data.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Sort the data in ascending order.
    Asc,

    /// Sort the data in descending order. (Default)
    Desc,
}

impl Default for SortDirection {
    fn default() -> Self {
        Self::Desc
    }
}

/// A single sort criterion; queries carry an ordered list of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub attribute: String,

    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(attribute: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            attribute: attribute.into(),
            direction,
        }
    }
}

/// The kinds of completions a suggestion query may ask for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuggestionType {
    /// Completions of the free text search term.
    SearchTerm,

    /// Data sources worth narrowing the search to.
    DataSource,

    /// Concrete objects matching the term prefix.
    Object,
}

/// Where suggestion values are calculated from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionCalculationMode {
    /// Derived from the indexed data.
    Data,

    /// Derived from the user's search history.
    History,
}
