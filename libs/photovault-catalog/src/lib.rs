//! # photovault Catalog
//!
//! SQLite implementation of the `PhotoRepository` port. The schema lives in
//! `migrations/` and is applied when the catalog is opened.

mod sqlite;

pub use sqlite::SqliteCatalog;
