//! Application projects.
//!
//! Finds `application.fam` manifests in the application directory and reads
//! the SDK symbol table built applications are checked against.
//!
//! ## Modules
//!
//! - [`fam`] - `application.fam` parsing
//! - [`discovery`] - Manifest discovery and application selection
//! - [`symbols`] - The SDK's `api_symbols.csv`

pub mod discovery;
pub mod fam;
pub mod symbols;

pub use discovery::{discover_apps, select_app};
pub use fam::AppManifest;
pub use symbols::SymbolTable;
