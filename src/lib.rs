//! Build-time aggregation of incident citation pages.
//!
//! One build fetches the content-store collections, joins reports onto
//! incidents, projects taxonomy classifications into display rows, resolves
//! similarity links, lays every incident out in 2D from its embedding, and
//! emits one page context per incident and locale.

pub mod api_types;
pub mod assemble;
pub mod classify;
pub mod config;
pub mod emit;
pub mod fetch;
pub mod join;
pub mod layout;
pub mod locale;
pub mod models;
pub mod orchestrator;
pub mod similarity;
pub mod viz_export;

pub use config::{BuildConfig, Source, SourceConfig};
pub use layout::{Reducer, TsneConfig, TsneReducer};
pub use orchestrator::{run_build, BuildSummary};
