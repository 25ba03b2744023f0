#[macro_use]
extern crate tracing;

mod formatters;
mod session;

pub use formatters::DataSourceSuggestionsFirst;
pub use session::{SearchSession, SessionSettings, ALL_DATA_SOURCE_ID};
