use async_trait::async_trait;

use crate::query::SearchQuery;
use crate::results::ResultSet;
use crate::suggestion::SuggestionQuery;

/// The collaborator that actually answers queries.
///
/// Both entry points receive a read only snapshot of the query as it was
/// when the dispatch happened, so later mutations of the live query are
/// never observable from inside an execution. Failures are opaque to the
/// engine and are surfaced unretried; any retry policy belongs to the
/// provider itself or to the caller.
#[async_trait]
pub trait ExecutionProvider: Send + Sync + 'static {
    async fn execute_search_query(&self, query: SearchQuery) -> anyhow::Result<ResultSet>;

    async fn execute_suggestion_query(
        &self,
        query: SuggestionQuery,
    ) -> anyhow::Result<ResultSet>;
}

/// A post-processing step for suggestion result sets.
///
/// Formatters registered with the session run sequentially, each one
/// receiving the previous one's output. The first failure stops the
/// chain.
#[async_trait]
pub trait SuggestionResultSetFormatter: Send + Sync + 'static {
    async fn format(&self, result_set: ResultSet) -> anyhow::Result<ResultSet>;
}
