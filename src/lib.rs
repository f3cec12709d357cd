//! elktail - `tail -f` for Elasticsearch and Kibana.

pub mod config;
pub mod display;
pub mod format;
pub mod search;
pub mod tail;
pub mod tunnel;
