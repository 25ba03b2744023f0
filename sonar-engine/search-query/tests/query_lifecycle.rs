use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::channel::oneshot;
use search_query::{
    ComparisonOperator,
    Condition,
    DataSource,
    DataSourceRef,
    DataSourceType,
    ExecutionProvider,
    Filter,
    FilteredDataSource,
    LogicalOperator,
    QueryContext,
    ResultItem,
    ResultSet,
    SearchError,
    SearchQuery,
    SuggestionCalculationMode,
    SuggestionItem,
    SuggestionQuery,
    ObjectHit,
};

fn init_state() {
    let _ = std::env::set_var("RUST_LOG", "debug");
    let _ = pretty_env_logger::try_init_timed();
}

fn ctx() -> Arc<QueryContext> {
    Arc::new(QueryContext::new(false))
}

fn products() -> DataSourceRef {
    DataSourceRef::plain(DataSource::new(
        "Products",
        "Products",
        DataSourceType::BusinessObject,
    ))
}

fn cheap_products() -> (DataSourceRef, Condition) {
    let implicit = Condition::simple("Price", ComparisonOperator::Lt, 10i64);
    let filtered = DataSourceRef::filtered(FilteredDataSource::new(
        "CheapProducts",
        "Cheap products",
        Arc::new(DataSource::new(
            "Products",
            "Products",
            DataSourceType::BusinessObject,
        )),
        implicit.clone(),
    ));

    (filtered, implicit)
}

/// Counts provider calls and records the query snapshots it was given.
#[derive(Default)]
struct CountingProvider {
    calls: AtomicUsize,
    captured: Mutex<Vec<SearchQuery>>,
}

#[async_trait]
impl ExecutionProvider for CountingProvider {
    async fn execute_search_query(&self, query: SearchQuery) -> anyhow::Result<ResultSet> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.captured.lock().unwrap().push(query);

        Ok(ResultSet::new(
            vec![ResultItem::Object(ObjectHit::new(format!("call-{}", call)))],
            1,
        ))
    }

    async fn execute_suggestion_query(
        &self,
        _query: SuggestionQuery,
    ) -> anyhow::Result<ResultSet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ResultSet::empty())
    }
}

/// Resolves each search call through a gate keyed by the query's `top`,
/// so the test controls the order in which responses arrive.
struct GatedProvider {
    calls: AtomicUsize,
    gates: Mutex<Vec<(usize, oneshot::Receiver<ResultSet>)>>,
}

impl GatedProvider {
    fn new(gates: Vec<(usize, oneshot::Receiver<ResultSet>)>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            gates: Mutex::new(gates),
        }
    }
}

#[async_trait]
impl ExecutionProvider for GatedProvider {
    async fn execute_search_query(&self, query: SearchQuery) -> anyhow::Result<ResultSet> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let gate = {
            let mut gates = self.gates.lock().unwrap();
            let index = gates
                .iter()
                .position(|(top, _)| *top == query.top())
                .expect("a gate exists for this query");
            gates.remove(index).1
        };

        Ok(gate.await?)
    }

    async fn execute_suggestion_query(
        &self,
        _query: SuggestionQuery,
    ) -> anyhow::Result<ResultSet> {
        Ok(ResultSet::empty())
    }
}

fn titled(title: &str) -> ResultSet {
    ResultSet::new(vec![ResultItem::Object(ObjectHit::new(title))], 1)
}

fn first_title(result_set: &ResultSet) -> &str {
    match &result_set.items[0] {
        ResultItem::Object(hit) => &hit.title,
        other => panic!("expected an object hit, got {:?}", other),
    }
}

#[tokio::test]
async fn unchanged_query_reuses_result_set() {
    init_state();

    let provider = Arc::new(CountingProvider::default());
    let mut query = SearchQuery::new(provider.clone(), Filter::new(ctx(), products()));

    let first = query.get_result_set();
    let second = query.get_result_set();
    assert!(first.ptr_eq(&second), "both calls should share one execution");

    let first = first.await.unwrap();
    let second = second.await.unwrap();

    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    assert_eq!(first_title(&first), "call-1");
    assert_eq!(first_title(&second), "call-1");
}

#[tokio::test]
async fn mutation_triggers_redispatch() {
    init_state();

    let provider = Arc::new(CountingProvider::default());
    let mut query = SearchQuery::new(provider.clone(), Filter::new(ctx(), products()));

    query.get_result_set().await.unwrap();
    query.set_top(50);
    let second = query.get_result_set().await.unwrap();

    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    assert_eq!(first_title(&second), "call-2");
}

#[tokio::test]
async fn filter_change_rewinds_pagination_before_dispatch() {
    init_state();

    let provider = Arc::new(CountingProvider::default());
    let mut query = SearchQuery::new(provider.clone(), Filter::new(ctx(), products()));
    query.set_skip(20);

    query.get_result_set().await.unwrap();
    query.set_search_term("laptops");
    query.get_result_set().await.unwrap();

    let captured = provider.captured.lock().unwrap();
    assert_eq!(captured[0].skip(), 20);
    assert_eq!(captured[1].skip(), 0);
    assert_eq!(captured[1].filter().search_term(), "laptops");
}

#[tokio::test]
async fn reset_result_set_forces_redispatch() {
    init_state();

    let provider = Arc::new(CountingProvider::default());
    let mut query = SearchQuery::new(provider.clone(), Filter::new(ctx(), products()));

    query.get_result_set().await.unwrap();
    query.reset_result_set();
    query.get_result_set().await.unwrap();

    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn outdated_response_is_never_delivered() {
    init_state();

    let (resolve_a, gate_a) = oneshot::channel();
    let (resolve_b, gate_b) = oneshot::channel();
    let provider = Arc::new(GatedProvider::new(vec![(10, gate_a), (20, gate_b)]));

    let mut query = SearchQuery::new(provider.clone(), Filter::new(ctx(), products()));
    query.set_top(10);
    let execution_a = query.get_result_set();

    query.set_top(20);
    let execution_b = query.get_result_set();

    // The second request resolves first, the first one afterwards.
    resolve_b.send(titled("B")).unwrap();
    resolve_a.send(titled("A")).unwrap();

    let result_b = execution_b.await.unwrap();
    assert_eq!(first_title(&result_b), "B");

    // The superseded execution hands out the newer result as well.
    let result_a = execution_a.await.unwrap();
    assert_eq!(first_title(&result_a), "B");

    // Nothing changed since, the cached result is still the newer one.
    let cached = query.get_result_set().await.unwrap();
    assert_eq!(first_title(&cached), "B");
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn provider_failures_propagate_unretried() {
    init_state();

    struct FailingProvider;

    #[async_trait]
    impl ExecutionProvider for FailingProvider {
        async fn execute_search_query(
            &self,
            _query: SearchQuery,
        ) -> anyhow::Result<ResultSet> {
            Err(anyhow::anyhow!("backend unreachable"))
        }

        async fn execute_suggestion_query(
            &self,
            _query: SuggestionQuery,
        ) -> anyhow::Result<ResultSet> {
            Err(anyhow::anyhow!("backend unreachable"))
        }
    }

    let mut query =
        SearchQuery::new(Arc::new(FailingProvider), Filter::new(ctx(), products()));

    let result = query.get_result_set().await;
    assert!(matches!(
        result,
        Err(err) if matches!(*err, SearchError::Provider(_))
    ));
}

#[tokio::test]
async fn filtered_search_query_targets_the_real_source() {
    init_state();

    let (filtered, implicit) = cheap_products();
    let provider = Arc::new(CountingProvider::default());

    let mut query = SearchQuery::new(provider.clone(), Filter::new(ctx(), filtered));
    query.set_root_condition(Condition::simple("Country", ComparisonOperator::Eq, "US"));
    query.set_skip(30);

    query.get_result_set().await.unwrap();

    let captured = provider.captured.lock().unwrap();
    let dispatched = &captured[0];

    assert_eq!(dispatched.filter().data_source().id(), "Products");
    assert!(!dispatched.filter().data_source().is_filtered());
    assert_eq!(dispatched.skip(), 30, "pagination survives the rewrite");

    match dispatched.filter().root_condition() {
        Condition::Complex(merged) => {
            assert_eq!(merged.operator, LogicalOperator::And);
            assert_eq!(merged.conditions[0], implicit);
        },
        _ => panic!("merged root should be complex"),
    }

    // The live query still shows the virtual source to its owner.
    assert_eq!(query.filter().data_source().id(), "CheapProducts");
}

/// Suggests a completed term, scoped the way providers scope them: to
/// the (already rewritten) data source of the query it was given.
struct SuggestingProvider {
    captured: Mutex<Vec<SuggestionQuery>>,
}

#[async_trait]
impl ExecutionProvider for SuggestingProvider {
    async fn execute_search_query(&self, _query: SearchQuery) -> anyhow::Result<ResultSet> {
        Ok(ResultSet::empty())
    }

    async fn execute_suggestion_query(
        &self,
        query: SuggestionQuery,
    ) -> anyhow::Result<ResultSet> {
        let mut filter = query.filter().clone();
        filter.set_search_term("laptop");

        let items = vec![ResultItem::Suggestion(SuggestionItem::SearchTerm {
            search_term: "laptop".to_string(),
            calculation_mode: SuggestionCalculationMode::Data,
            label: "laptop".to_string(),
            filter,
        })];

        self.captured.lock().unwrap().push(query);

        Ok(ResultSet::new(items, 1))
    }
}

#[tokio::test]
async fn filtered_suggestion_round_trip_restores_the_virtual_source() {
    init_state();

    let (filtered, implicit) = cheap_products();
    let provider = Arc::new(SuggestingProvider {
        captured: Mutex::new(Vec::new()),
    });

    let mut query =
        SuggestionQuery::new(provider.clone(), Filter::new(ctx(), filtered.clone()));
    query.set_root_condition(Condition::simple("Country", ComparisonOperator::Eq, "US"));
    query.set_search_term("lap");
    query.set_top(7);

    let result = query.get_result_set().await.unwrap();

    // Outbound: the provider saw the real data source with the implicit
    // condition merged in.
    let captured = provider.captured.lock().unwrap();
    let dispatched = &captured[0];
    assert_eq!(dispatched.filter().data_source().id(), "Products");
    assert_eq!(dispatched.top(), 7);
    match dispatched.filter().root_condition() {
        Condition::Complex(merged) => {
            assert_eq!(merged.operator, LogicalOperator::And);
            assert_eq!(merged.conditions.len(), 2);
            assert_eq!(merged.conditions[0], implicit);
        },
        root => panic!("merged root should be complex, got {:?}", root),
    }

    // Inbound: the suggestion's filter references the virtual source
    // again, with only the term replaced.
    assert!(result.query.is_some(), "the original query is attached");
    match &result.items[0] {
        ResultItem::Suggestion(SuggestionItem::SearchTerm { filter, .. }) => {
            assert_eq!(filter.data_source(), &filtered);
            assert!(filter.data_source().is_filtered());
            assert_eq!(filter.search_term(), "laptop");
        },
        other => panic!("expected a search term suggestion, got {:?}", other),
    }
}

#[tokio::test]
async fn suggestion_round_trip_with_empty_root_sends_the_condition_alone() {
    init_state();

    let (filtered, implicit) = cheap_products();
    let provider = Arc::new(SuggestingProvider {
        captured: Mutex::new(Vec::new()),
    });

    let mut query = SuggestionQuery::new(provider.clone(), Filter::new(ctx(), filtered));
    query.set_search_term("lap");

    query.get_result_set().await.unwrap();

    let captured = provider.captured.lock().unwrap();
    assert_eq!(captured[0].filter().root_condition(), &implicit);
}
