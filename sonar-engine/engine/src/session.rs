use std::sync::Arc;

use anyhow::{anyhow, Result};
use arc_swap::ArcSwap;
use hashbrown::HashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use search_query::{
    Condition,
    DataSource,
    DataSourceRef,
    DataSourceType,
    ExecutionProvider,
    Filter,
    FilteredDataSource,
    QueryContext,
    SearchQuery,
    SuggestionQuery,
    SuggestionResultSetFormatter,
};

/// The id of the implicit category every session can search across.
pub static ALL_DATA_SOURCE_ID: &str = "All";

pub(crate) trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Behaviour settings for a search session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Enables folder navigation for hierarchy data sources.
    #[serde(default)]
    pub folder_mode: bool,

    /// The page size newly created queries start out with.
    #[serde(default = "SessionSettings::default_top")]
    pub default_top: usize,
}

impl SessionSettings {
    fn default_top() -> usize {
        search_query::DEFAULT_TOP
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            folder_mode: false,
            default_top: Self::default_top(),
        }
    }
}

impl Validate for SessionSettings {
    fn validate(&self) -> Result<()> {
        if self.default_top == 0 {
            return Err(anyhow!("the default page size must be at least 1"));
        }

        Ok(())
    }
}

/// The entry point of the query engine.
///
/// A session owns the provider, the session wide flags and the registry
/// of data sources, and hands out filters and queries bound to all of
/// them. Sessions are cheap to clone and share.
#[derive(Clone)]
pub struct SearchSession(Arc<SessionInner>);

struct SessionInner {
    settings: SessionSettings,
    ctx: Arc<QueryContext>,
    provider: Arc<dyn ExecutionProvider>,
    data_sources: ArcSwap<HashMap<String, DataSourceRef>>,
    registry_lock: Mutex<()>,
    all_data_source: DataSourceRef,
}

impl SearchSession {
    /// Creates a session without suggestion formatters.
    pub fn create(
        settings: SessionSettings,
        provider: Arc<dyn ExecutionProvider>,
    ) -> Result<Self> {
        Self::create_with_formatters(settings, provider, Vec::new())
    }

    /// Creates a session with a suggestion formatter chain, applied in
    /// the given order.
    pub fn create_with_formatters(
        settings: SessionSettings,
        provider: Arc<dyn ExecutionProvider>,
        formatters: Vec<Arc<dyn SuggestionResultSetFormatter>>,
    ) -> Result<Self> {
        settings.validate()?;

        let ctx = Arc::new(QueryContext::with_formatters(
            settings.folder_mode,
            formatters,
        ));

        let all_data_source = DataSourceRef::plain(DataSource::new(
            ALL_DATA_SOURCE_ID,
            "All",
            DataSourceType::Category,
        ));

        let mut registry = HashMap::new();
        registry.insert(all_data_source.id().to_string(), all_data_source.clone());

        info!(
            "search session created, folder_mode={} default_top={}",
            settings.folder_mode, settings.default_top,
        );

        Ok(Self(Arc::new(SessionInner {
            settings,
            ctx,
            provider,
            data_sources: ArcSwap::from_pointee(registry),
            registry_lock: Mutex::new(()),
            all_data_source,
        })))
    }

    #[inline]
    pub fn settings(&self) -> &SessionSettings {
        &self.0.settings
    }

    /// The implicit category spanning every registered data source.
    pub fn all_data_source(&self) -> DataSourceRef {
        self.0.all_data_source.clone()
    }

    /// Registers a new data source under its id.
    pub fn register_data_source(&self, data_source: DataSource) -> Result<DataSourceRef> {
        self.insert(DataSourceRef::plain(data_source))
    }

    /// Registers a virtual view over an already registered data source.
    ///
    /// The base has to be a plain data source; stacking views on views
    /// is not supported.
    pub fn register_filtered_data_source(
        &self,
        id: impl Into<String>,
        label: impl Into<String>,
        base: &DataSourceRef,
        filter_condition: Condition,
    ) -> Result<DataSourceRef> {
        let base = match base {
            DataSourceRef::Plain(ds) => ds.clone(),
            DataSourceRef::Filtered(_) => {
                return Err(anyhow!(
                    "a filtered data source must wrap a plain data source"
                ))
            },
        };

        self.insert(DataSourceRef::filtered(FilteredDataSource::new(
            id,
            label,
            base,
            filter_condition,
        )))
    }

    fn insert(&self, data_source: DataSourceRef) -> Result<DataSourceRef> {
        let _guard = self.0.registry_lock.lock();

        let registry = self.0.data_sources.load();
        if registry.contains_key(data_source.id()) {
            return Err(anyhow!(
                "a data source with id {:?} is already registered",
                data_source.id(),
            ));
        }

        let mut next = HashMap::clone(&registry);
        next.insert(data_source.id().to_string(), data_source.clone());
        self.0.data_sources.store(Arc::new(next));

        info!("registered data source id={:?}", data_source.id());

        Ok(data_source)
    }

    /// Looks a registered data source up by id.
    pub fn data_source(&self, id: &str) -> Option<DataSourceRef> {
        self.0.data_sources.load().get(id).cloned()
    }

    /// Every registered data source, the implicit one included.
    pub fn data_sources(&self) -> Vec<DataSourceRef> {
        self.0.data_sources.load().values().cloned().collect()
    }

    /// A fresh filter over the implicit `All` data source.
    pub fn create_filter(&self) -> Filter {
        self.create_filter_for(self.all_data_source())
    }

    /// A fresh filter over the given data source.
    pub fn create_filter_for(&self, data_source: DataSourceRef) -> Filter {
        Filter::new(self.0.ctx.clone(), data_source)
    }

    /// A search query with a fresh empty filter and the session's
    /// default page size.
    pub fn create_search_query(&self) -> SearchQuery {
        let mut query = SearchQuery::new(self.0.provider.clone(), self.create_filter());
        query.set_top(self.0.settings.default_top);
        query
    }

    /// A suggestion query with a fresh empty filter and the session's
    /// default page size.
    pub fn create_suggestion_query(&self) -> SuggestionQuery {
        let mut query = SuggestionQuery::new(self.0.provider.clone(), self.create_filter());
        query.set_top(self.0.settings.default_top);
        query
    }
}
