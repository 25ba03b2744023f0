use hashbrown::HashMap;
use serde::Serialize;

use crate::condition::AttributeValue;
use crate::datasource::DataSourceRef;
use crate::filter::Filter;
use crate::structures::SuggestionCalculationMode;
use crate::suggestion::SuggestionQuery;

/// A single object returned for a search.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectHit {
    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source: Option<DataSourceRef>,

    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, AttributeValue>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl ObjectHit {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            data_source: None,
            attributes: HashMap::new(),
            score: None,
        }
    }
}

/// A single completion returned for a suggestion query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SuggestionItem {
    /// A completed search term, carrying the filter a consumer should
    /// apply to search for it.
    #[serde(rename_all = "camelCase")]
    SearchTerm {
        search_term: String,
        calculation_mode: SuggestionCalculationMode,
        label: String,
        filter: Filter,
    },

    /// A data source worth narrowing the search to.
    #[serde(rename_all = "camelCase")]
    DataSource {
        data_source: DataSourceRef,
        label: String,
    },

    /// A concrete object matching the term.
    #[serde(rename_all = "camelCase")]
    Object { hit: ObjectHit, label: String },
}

/// One entry of a result set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultItem {
    Object(ObjectHit),
    Suggestion(SuggestionItem),
}

/// The outcome of one executed query.
///
/// The engine only ever inspects `items` and `total_results`; everything
/// else a provider attaches to its entries passes through untouched.
#[derive(Debug, Clone)]
pub struct ResultSet {
    /// The retrieved entries, at most `top` of them.
    pub items: Vec<ResultItem>,

    /// The total amount of entries matching the search.
    pub total_results: usize,

    /// The query this result set answers. Only attached when a filtered
    /// data source query is mapped back onto its virtual source.
    pub query: Option<Box<SuggestionQuery>>,
}

impl ResultSet {
    pub fn new(items: Vec<ResultItem>, total_results: usize) -> Self {
        Self {
            items,
            total_results,
            query: None,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), 0)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
