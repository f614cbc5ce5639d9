//! kinmap-core: a personal genealogical knowledge graph — content-addressed
//! person store, provider crawler, graph algorithms, job orchestrator,
//! geocoder and cross-provider discovery.

pub mod cli;
pub mod codec;
pub mod config;
pub mod context;
pub mod crawler;
pub mod discovery;
pub mod geocoder;
pub mod graph;
pub mod identity;
pub mod jobs;
pub mod shared;
pub mod store;

pub use context::AppContext;
