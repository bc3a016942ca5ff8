//! Stackforge Template Compiler
//!
//! Turns a YAML template, possibly spread over many files, into one fully
//! resolved document ready for submission.
//!
//! ## Pipeline
//!
//! 1. **Shorthand** ([`shorthand`]): `!Tag value` is rewritten to the
//!    canonical `"Fn::Tag": value` mapping form before parsing
//! 2. **Load** ([`loader`]): path conventions, comment stripping, parse
//!    errors with file/line/caret context
//! 3. **Include** ([`merge`]): documents listed under an `Include*`
//!    category are loaded recursively and folded into the parent,
//!    renaming conflicting parameters
//! 4. **Embed** ([`embed`]): payload fields (function code, user data,
//!    nested templates) are replaced with artifact locators, resolving
//!    references through [`resolve`]
//!
//! Includes are merged completely before any payload is embedded, so
//! merge conflicts are reported before anything is uploaded.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod cloud_init;
pub mod compiler;
pub mod embed;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod merge;
pub mod options;
pub mod resolve;
pub mod shorthand;

// Re-exports
pub use cloud_init::{is_cloud_config, CloudInit, Encoded};
pub use compiler::Compiler;
pub use error::{CompileError, Result};
pub use fetch::{FetchConfig, FetchError, Fetched, Fetcher, HttpFetcher};
pub use loader::{resolve_template_path, Template};
pub use options::CompileOptions;
pub use resolve::{Resolved, Resolver};
