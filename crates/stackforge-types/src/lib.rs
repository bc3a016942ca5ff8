//! Stackforge core types
//!
//! Shared vocabulary for the template compiler and the deployment engine:
//!
//! - [`Document`]: an ordered tree of named categories (`Parameters`,
//!   `Resources`, `Outputs`, ...) parsed from a YAML template
//! - [`ParameterBindings`]: flat name → value overrides supplied by a caller
//! - Stack records returned by the orchestration service
//!   ([`StackEvent`], [`StackSummary`], [`StackResource`], [`StackOutput`])

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod bindings;
pub mod document;
pub mod stack;

pub use bindings::{scalar_to_string, BindingsError, ParameterBindings};
pub use document::{categories, Document};
pub use stack::{
    is_failed_outcome, is_terminal_status, resource_types, StackEvent, StackOutput,
    StackResource, StackSummary,
};
