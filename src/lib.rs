//! surveycat - a category-tagged semantic catalog for wildlife survey files.
//!
//! A scan walks a directory tree, reads what it can of every survey file and
//! records which vocabulary terms (species, places, survey methods, ...)
//! occur in its content or path. An index build merges that scan with any
//! per-kind metadata exports, embeds one searchable text per record and
//! writes flat artifacts that the query engine and HTTP API load read-only.
//!
//! # Quick start
//!
//! ```no_run
//! use surveycat::{CatalogConfig, DataDir, Index, ModelManager};
//! use surveycat::search::{self, Query};
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let config = CatalogConfig::resolve(None, data_dir.root()).unwrap();
//! let model = ModelManager::default();
//! let index = Index::load(&data_dir, &config.category_names(), &model).unwrap();
//!
//! let mut query = Query::new("dugong aerial survey");
//! query.category_filters.insert("places".into(), "NEOM".into());
//!
//! let outcome = search::execute_search(&query, &index, &model).unwrap();
//! for r in &outcome.results {
//!     println!("{} (score: {:.4})", r.file_path, r.score.unwrap_or_default());
//! }
//! ```

pub mod cli;
pub mod config;
pub mod data_dir;
pub mod embedding;
pub mod error;
pub mod index;
pub mod index_builder;
pub mod matcher;
pub mod model_manager;
pub mod normalize;
pub mod readers;
pub mod record;
pub mod scanner;
pub mod search;
pub mod server;
pub mod text_util;
pub mod walker;

pub use config::CatalogConfig;
pub use data_dir::DataDir;
pub use error::{Error, Result};
pub use index::Index;
pub use matcher::TermMatcher;
pub use model_manager::ModelManager;
pub use record::UnifiedRecord;
