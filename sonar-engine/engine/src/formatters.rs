use async_trait::async_trait;
use search_query::{ResultItem, ResultSet, SuggestionItem, SuggestionResultSetFormatter};

/// Reorders suggestion result sets for presentation.
///
/// Data source suggestions come first so narrowing the search is always
/// the closest action, search term completions follow, objects go last.
/// The provider's order within each kind is kept.
pub struct DataSourceSuggestionsFirst;

fn rank(item: &ResultItem) -> u8 {
    match item {
        ResultItem::Suggestion(SuggestionItem::DataSource { .. }) => 0,
        ResultItem::Suggestion(SuggestionItem::SearchTerm { .. }) => 1,
        ResultItem::Suggestion(SuggestionItem::Object { .. }) => 2,
        ResultItem::Object(_) => 3,
    }
}

#[async_trait]
impl SuggestionResultSetFormatter for DataSourceSuggestionsFirst {
    async fn format(&self, mut result_set: ResultSet) -> anyhow::Result<ResultSet> {
        result_set.items.sort_by_key(rank);
        Ok(result_set)
    }
}
