#[macro_use]
extern crate tracing;

mod condition;
mod datasource;
mod error;
mod filter;
mod provider;
mod query;
mod results;
mod structures;
mod suggestion;

pub use condition::{
    AttributeValue,
    ComparisonOperator,
    ComplexCondition,
    Condition,
    LogicalOperator,
    SimpleCondition,
};
pub use datasource::{
    AttributeMetadata,
    DataSource,
    DataSourceRef,
    DataSourceType,
    FilteredDataSource,
    HierarchyDisplayType,
};
pub use error::{Result, SearchError};
pub use filter::{Filter, WILDCARD_TERM};
pub use provider::{ExecutionProvider, SuggestionResultSetFormatter};
pub use qdispatch::SharedExecution;
pub use query::{ExecutionResult, QueryContext, SearchQuery, DEFAULT_TOP};
pub use results::{ObjectHit, ResultItem, ResultSet, SuggestionItem};
pub use structures::{SortDirection, SortSpec, SuggestionCalculationMode, SuggestionType};
pub use suggestion::SuggestionQuery;
