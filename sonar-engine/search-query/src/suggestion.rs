use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use qdispatch::SharedExecution;

use crate::condition::Condition;
use crate::datasource::DataSourceRef;
use crate::error::SearchError;
use crate::filter::Filter;
use crate::provider::ExecutionProvider;
use crate::query::{ExecutionResult, QueryContext, SearchQuery};
use crate::results::{ResultItem, ResultSet, SuggestionItem};
use crate::structures::{SortSpec, SuggestionCalculationMode, SuggestionType};

/// A query returning short completions instead of full result pages.
///
/// Behaves like a search query with two additions: the requested
/// suggestion kinds and calculation modes take part in the request
/// identity, and queries against filtered data sources are mapped onto
/// their real data source before dispatch and mapped back afterwards so
/// consumers keep seeing the virtual source they asked about.
pub struct SuggestionQuery {
    pub(crate) base: SearchQuery,
    types: Vec<SuggestionType>,
    calculation_modes: Vec<SuggestionCalculationMode>,
    last_query: Option<Box<SuggestionQuery>>,
}

impl SuggestionQuery {
    pub fn new(provider: Arc<dyn ExecutionProvider>, filter: Filter) -> Self {
        Self {
            base: SearchQuery::new(provider, filter),
            types: vec![
                SuggestionType::SearchTerm,
                SuggestionType::DataSource,
                SuggestionType::Object,
            ],
            calculation_modes: vec![SuggestionCalculationMode::Data],
            last_query: None,
        }
    }

    #[inline]
    pub fn top(&self) -> usize {
        self.base.top()
    }

    #[inline]
    pub fn skip(&self) -> usize {
        self.base.skip()
    }

    #[inline]
    pub fn sort_order(&self) -> &[SortSpec] {
        self.base.sort_order()
    }

    #[inline]
    pub fn filter(&self) -> &Filter {
        self.base.filter()
    }

    #[inline]
    pub fn types(&self) -> &[SuggestionType] {
        &self.types
    }

    #[inline]
    pub fn calculation_modes(&self) -> &[SuggestionCalculationMode] {
        &self.calculation_modes
    }

    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.base.is_read_only()
    }

    pub fn set_top(&mut self, top: usize) {
        self.base.set_top(top);
    }

    pub fn set_skip(&mut self, skip: usize) {
        self.base.set_skip(skip);
    }

    pub fn set_sort_order(&mut self, sort_order: Vec<SortSpec>) {
        self.base.set_sort_order(sort_order);
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.base.set_filter(filter);
    }

    pub fn set_search_term(&mut self, search_term: impl Into<String>) {
        self.base.set_search_term(search_term);
    }

    pub fn set_data_source(&mut self, data_source: DataSourceRef) {
        self.base.set_data_source(data_source);
    }

    pub fn set_root_condition(&mut self, root_condition: Condition) {
        self.base.set_root_condition(root_condition);
    }

    pub fn set_types(&mut self, types: Vec<SuggestionType>) {
        self.types = types;
    }

    pub fn set_calculation_modes(&mut self, modes: Vec<SuggestionCalculationMode>) {
        self.calculation_modes = modes;
    }

    /// Request identity. The kind and mode sequences compare in order;
    /// the same entries in a different order are a different request.
    pub fn equals(&self, other: &SuggestionQuery) -> bool {
        self.base.equals(&other.base)
            && self.types == other.types
            && self.calculation_modes == other.calculation_modes
    }

    /// A frozen copy for comparison and dispatch, never for execution.
    pub fn read_only_clone(&self) -> SuggestionQuery {
        let mut clone = self.clone();
        clone.base.read_only = true;
        clone
    }

    /// Returns the suggestions for the current request state.
    ///
    /// Caching and superseding behave exactly like
    /// [`SearchQuery::get_result_set`].
    pub fn get_result_set(&mut self) -> SharedExecution<ExecutionResult> {
        match self.result_set_execution() {
            Ok(execution) => execution,
            Err(err) => futures::future::ready(Err(err)).boxed().shared(),
        }
    }

    fn result_set_execution(
        &mut self,
    ) -> Result<SharedExecution<ExecutionResult>, Arc<SearchError>> {
        if self.base.read_only {
            return Err(Arc::new(SearchError::QueryIsReadOnly));
        }

        if let Some(last) = &self.last_query {
            if self.equals(last) {
                if let Some(cached) = self.base.dispatcher.latest() {
                    debug!("suggestion query unchanged, reusing cached result set");
                    return Ok(cached);
                }
            }

            if !self.base.props.filter.equals(&last.base.props.filter) {
                self.base.props.skip = 0;
            }
        }

        let snapshot = self.read_only_clone();
        self.last_query = Some(Box::new(snapshot.clone()));

        debug!(
            "dispatching suggestion query top={} types={:?} data_source={:?}",
            snapshot.base.props.top,
            snapshot.types,
            snapshot.base.props.filter.data_source().id(),
        );

        let ctx = self.base.ctx.clone();
        let provider = self.base.provider.clone();
        let execution = async move {
            let original = snapshot.clone();
            let transformed = snapshot.filtered_query_transform();

            let raw = provider
                .execute_suggestion_query(transformed)
                .await
                .map_err(|e| Arc::new(SearchError::Provider(e)))?;

            let mapped = filtered_query_back_transform(&original, raw).map_err(Arc::new)?;
            let formatted = format_result_set(&original, &ctx, mapped)
                .await
                .map_err(Arc::new)?;

            Ok(Arc::new(formatted))
        };

        Ok(self.base.dispatcher.dispatch(execution))
    }

    /// Drops the cached execution, forcing the next result set request
    /// to dispatch unconditionally.
    pub fn reset_result_set(&mut self) {
        self.last_query = None;
        self.base.reset_result_set();
    }

    /// See [`SearchQuery::abort`].
    pub fn abort(&self) {
        self.base.abort();
    }

    /// The filtered data source rewrite applied before dispatch.
    fn filtered_query_transform(mut self) -> SuggestionQuery {
        self.base = self.base.generic_filtered_query_transform();
        self
    }
}

impl Clone for SuggestionQuery {
    /// Clones the request state, including independent copies of the
    /// kind and mode sequences. The clone starts without an execution
    /// history, like a cloned search query.
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            types: self.types.clone(),
            calculation_modes: self.calculation_modes.clone(),
            last_query: None,
        }
    }
}

impl fmt::Debug for SuggestionQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuggestionQuery")
            .field("top", &self.base.top())
            .field("skip", &self.base.skip())
            .field("filter", self.base.filter())
            .field("types", &self.types)
            .field("calculation_modes", &self.calculation_modes)
            .field("read_only", &self.base.read_only)
            .finish()
    }
}

/// Maps a result set produced for the rewritten query back onto the
/// virtual data source the caller actually queried.
///
/// Only applies when the original query targeted a filtered business
/// object data source. Search term suggestions get the original filter
/// with just their own term, so consumers see a filter scoped to the
/// virtual source. Object suggestions are left as returned. Any other
/// suggestion kind is unexpected here and treated as a logic bug.
fn filtered_query_back_transform(
    original: &SuggestionQuery,
    mut result_set: ResultSet,
) -> Result<ResultSet, SearchError> {
    let is_filtered_business_object = original.base.filter().data_source().is_filtered()
        && original.base.filter().data_source().is_business_object();
    if !is_filtered_business_object {
        return Ok(result_set);
    }

    result_set.query = Some(Box::new(original.clone()));

    for item in result_set.items.iter_mut() {
        match item {
            ResultItem::Suggestion(SuggestionItem::SearchTerm {
                search_term,
                filter,
                ..
            }) => {
                let mut scoped = original.base.filter().clone();
                scoped.set_search_term(search_term.clone());
                *filter = scoped;
            },
            ResultItem::Suggestion(SuggestionItem::Object { .. }) => {},
            other => {
                return Err(SearchError::Program(format!(
                    "unexpected entry in a filtered suggestion result set: {:?}",
                    other,
                )))
            },
        }
    }

    Ok(result_set)
}

/// Runs the registered suggestion formatters.
///
/// The chain only applies when object suggestions were requested and
/// the query targets a plain business object data source; every other
/// result set passes through untouched.
async fn format_result_set(
    original: &SuggestionQuery,
    ctx: &QueryContext,
    mut result_set: ResultSet,
) -> Result<ResultSet, SearchError> {
    let data_source = original.base.filter().data_source();
    let applies = original.types.contains(&SuggestionType::Object)
        && data_source.is_business_object()
        && !data_source.is_filtered();
    if !applies {
        return Ok(result_set);
    }

    for formatter in ctx.suggestion_formatters.iter() {
        result_set = formatter
            .format(result_set)
            .await
            .map_err(SearchError::Format)?;
    }

    Ok(result_set)
}
