use thiserror::Error;

pub type Result<T> = core::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("conditions can only be auto inserted into a complex root condition")]
    CanOnlyAutoInsertComplexCondition,

    #[error("query engine invariant violated: {0}")]
    Program(String),

    #[error("the query is a read only snapshot and cannot be executed")]
    QueryIsReadOnly,

    #[error("the provider failed to execute the query: {0}")]
    Provider(#[from] anyhow::Error),

    #[error("failed to format the result set: {0}")]
    Format(anyhow::Error),

    #[error("failed to serialize / deserialize value: {0}")]
    Serialization(#[from] serde_json::Error),
}
