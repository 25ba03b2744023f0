use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use qdispatch::{Dispatcher, SharedExecution};

use crate::condition::{ComplexCondition, Condition, LogicalOperator};
use crate::datasource::DataSourceRef;
use crate::error::SearchError;
use crate::filter::Filter;
use crate::provider::{ExecutionProvider, SuggestionResultSetFormatter};
use crate::results::ResultSet;
use crate::structures::SortSpec;

/// The default page size of a freshly created query.
pub const DEFAULT_TOP: usize = 10;

/// The resolved value of a query execution.
///
/// Both sides are reference counted so every awaiter of a shared
/// execution can receive its own copy.
pub type ExecutionResult = Result<Arc<ResultSet>, Arc<SearchError>>;

/// Session wide flags and hooks shared by all filters and queries.
///
/// Passed around explicitly instead of living in a global, so tests can
/// build their own.
pub struct QueryContext {
    /// Enables folder navigation for hierarchy data sources.
    pub folder_mode: bool,

    /// The registered suggestion result set formatters, run in order.
    pub suggestion_formatters: Vec<Arc<dyn SuggestionResultSetFormatter>>,
}

impl QueryContext {
    pub fn new(folder_mode: bool) -> Self {
        Self {
            folder_mode,
            suggestion_formatters: Vec::new(),
        }
    }

    pub fn with_formatters(
        folder_mode: bool,
        suggestion_formatters: Vec<Arc<dyn SuggestionResultSetFormatter>>,
    ) -> Self {
        Self {
            folder_mode,
            suggestion_formatters,
        }
    }
}

impl fmt::Debug for QueryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryContext")
            .field("folder_mode", &self.folder_mode)
            .field("suggestion_formatters", &self.suggestion_formatters.len())
            .finish()
    }
}

/// The mutable request description of a query.
#[derive(Debug, Clone)]
pub(crate) struct QueryProperties {
    pub(crate) top: usize,
    pub(crate) skip: usize,
    pub(crate) sort_order: Vec<SortSpec>,
    pub(crate) filter: Filter,
    pub(crate) icon: Option<String>,
    pub(crate) label: Option<String>,
}

impl QueryProperties {
    pub(crate) fn new(filter: Filter) -> Self {
        Self {
            top: DEFAULT_TOP,
            skip: 0,
            sort_order: Vec::new(),
            filter,
            icon: None,
            label: None,
        }
    }

    /// Request identity: what decides whether a new dispatch is needed.
    /// Icon and label are presentation only and excluded.
    pub(crate) fn matches(&self, other: &QueryProperties) -> bool {
        self.top == other.top
            && self.skip == other.skip
            && self.sort_order == other.sort_order
            && self.filter.equals(&other.filter)
    }
}

/// A search request with a managed result set lifecycle.
///
/// The query owns a cache of its most recent execution, keyed by value
/// equality with the request state at dispatch time. Asking an unchanged
/// query for its result set again returns the cached execution without
/// touching the provider. When the request did change, the previous
/// execution is superseded: its response is discarded if it arrives
/// after the newer dispatch, so callers always observe the result of the
/// last request they issued.
pub struct SearchQuery {
    pub(crate) props: QueryProperties,
    pub(crate) ctx: Arc<QueryContext>,
    pub(crate) provider: Arc<dyn ExecutionProvider>,
    pub(crate) dispatcher: Dispatcher<ExecutionResult>,
    pub(crate) last_query: Option<Box<SearchQuery>>,
    pub(crate) read_only: bool,
}

impl SearchQuery {
    /// Creates a query over the given filter.
    ///
    /// The context is taken from the filter, which the session factory
    /// has bound to its own flags already.
    pub fn new(provider: Arc<dyn ExecutionProvider>, filter: Filter) -> Self {
        let ctx = filter.ctx().clone();

        Self {
            props: QueryProperties::new(filter),
            ctx,
            provider,
            dispatcher: Dispatcher::new(),
            last_query: None,
            read_only: false,
        }
    }

    #[inline]
    pub fn top(&self) -> usize {
        self.props.top
    }

    #[inline]
    pub fn skip(&self) -> usize {
        self.props.skip
    }

    #[inline]
    pub fn sort_order(&self) -> &[SortSpec] {
        &self.props.sort_order
    }

    #[inline]
    pub fn filter(&self) -> &Filter {
        &self.props.filter
    }

    #[inline]
    pub fn icon(&self) -> Option<&str> {
        self.props.icon.as_deref()
    }

    #[inline]
    pub fn label(&self) -> Option<&str> {
        self.props.label.as_deref()
    }

    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_top(&mut self, top: usize) {
        self.props.top = top;
    }

    pub fn set_skip(&mut self, skip: usize) {
        self.props.skip = skip;
    }

    pub fn set_sort_order(&mut self, sort_order: Vec<SortSpec>) {
        self.props.sort_order = sort_order;
    }

    pub fn set_icon(&mut self, icon: impl Into<String>) {
        self.props.icon = Some(icon.into());
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.props.label = Some(label.into());
    }

    /// Replaces the filter. A filter that differs by value rewinds the
    /// pagination back to the first page.
    pub fn set_filter(&mut self, filter: Filter) {
        if !self.props.filter.equals(&filter) {
            self.props.skip = 0;
        }

        self.props.filter = filter;
    }

    /// Updates the free text term through the filter replacement path,
    /// so a changed term rewinds pagination like any filter change.
    pub fn set_search_term(&mut self, search_term: impl Into<String>) {
        let mut filter = self.props.filter.clone();
        filter.set_search_term(search_term);
        self.set_filter(filter);
    }

    /// Switches the data source through the filter replacement path.
    pub fn set_data_source(&mut self, data_source: DataSourceRef) {
        let mut filter = self.props.filter.clone();
        filter.set_data_source(data_source);
        self.set_filter(filter);
    }

    /// Replaces the condition tree through the filter replacement path.
    pub fn set_root_condition(&mut self, root_condition: Condition) {
        let mut filter = self.props.filter.clone();
        filter.set_root_condition(root_condition);
        self.set_filter(filter);
    }

    /// Value equality over the request state, the relation the result
    /// set cache is keyed by.
    pub fn equals(&self, other: &SearchQuery) -> bool {
        self.props.matches(&other.props)
    }

    /// A frozen copy of the current request state.
    ///
    /// The clone exists to be compared against and handed to the
    /// provider; executing it is a programming error.
    pub fn read_only_clone(&self) -> SearchQuery {
        let mut clone = self.clone();
        clone.read_only = true;
        clone
    }

    /// Returns the result set for the current request state.
    ///
    /// Unchanged state returns the cached execution, so awaiting twice
    /// without mutating in between performs a single provider call.
    pub fn get_result_set(&mut self) -> SharedExecution<ExecutionResult> {
        match self.result_set_execution() {
            Ok(execution) => execution,
            Err(err) => futures::future::ready(Err(err)).boxed().shared(),
        }
    }

    fn result_set_execution(
        &mut self,
    ) -> Result<SharedExecution<ExecutionResult>, Arc<SearchError>> {
        if self.read_only {
            return Err(Arc::new(SearchError::QueryIsReadOnly));
        }

        if let Some(last) = &self.last_query {
            if self.equals(last) {
                if let Some(cached) = self.dispatcher.latest() {
                    debug!("query unchanged, reusing cached result set");
                    return Ok(cached);
                }
            }

            if !self.props.filter.equals(&last.props.filter) {
                self.props.skip = 0;
            }
        }

        let snapshot = self.read_only_clone();
        self.last_query = Some(Box::new(snapshot.clone()));

        debug!(
            "dispatching search query top={} skip={} data_source={:?}",
            snapshot.props.top,
            snapshot.props.skip,
            snapshot.props.filter.data_source().id(),
        );

        let provider = self.provider.clone();
        let execution = async move {
            let query = snapshot.generic_filtered_query_transform();
            let result_set = provider
                .execute_search_query(query)
                .await
                .map_err(|e| Arc::new(SearchError::Provider(e)))?;

            Ok(Arc::new(result_set))
        };

        Ok(self.dispatcher.dispatch(execution))
    }

    /// Drops the cached execution, forcing the next result set request
    /// to dispatch unconditionally.
    pub fn reset_result_set(&mut self) {
        self.last_query = None;
        self.dispatcher.reset();
    }

    /// Requests cancellation of the in-flight execution.
    ///
    /// The provider call cannot be taken back once issued; only the
    /// delivery of superseded responses is suppressed. This is a
    /// placeholder kept for API compatibility.
    pub fn abort(&self) {}

    /// Rewrites a query against a filtered data source into one against
    /// the underlying real data source.
    ///
    /// The virtual source's filter condition is conjoined with the
    /// query's own condition tree, or stands alone when the tree is
    /// empty. Pagination is kept verbatim; the rewrite deliberately
    /// bypasses the skip-resetting setter path. Queries against plain
    /// data sources pass through unchanged.
    pub fn generic_filtered_query_transform(mut self) -> SearchQuery {
        let filtered = match self.props.filter.data_source() {
            DataSourceRef::Filtered(fds) => fds.clone(),
            DataSourceRef::Plain(_) => return self,
        };

        debug!(
            "merging filtered data source {:?} into dispatch query",
            filtered.id,
        );

        let root = self.props.filter.root_condition().clone();
        let merged = if root.is_empty() {
            filtered.filter_condition.clone()
        } else {
            Condition::Complex(ComplexCondition::with_conditions(
                LogicalOperator::And,
                vec![filtered.filter_condition.clone(), root],
            ))
        };

        self.props.filter.replace_for_dispatch(
            DataSourceRef::Plain(filtered.data_source.clone()),
            merged,
        );

        self
    }
}

impl Clone for SearchQuery {
    /// Clones the request state. The clone is an independent query: it
    /// gets its own dispatcher and starts without an execution history.
    fn clone(&self) -> Self {
        Self {
            props: self.props.clone(),
            ctx: self.ctx.clone(),
            provider: self.provider.clone(),
            dispatcher: Dispatcher::new(),
            last_query: None,
            read_only: self.read_only,
        }
    }
}

impl fmt::Debug for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchQuery")
            .field("top", &self.props.top)
            .field("skip", &self.props.skip)
            .field("sort_order", &self.props.sort_order)
            .field("filter", &self.props.filter)
            .field("read_only", &self.read_only)
            .finish()
    }
}
