//! Workflow Definition Module
//!
//! Provides data structures and utilities for defining, parsing,
//! validating and templating workflow documents.
//!
//! # Structure
//!
//! - [`model`]: Core data structures (WorkflowDocument, StepSpec)
//! - [`parser`]: YAML parsing and loading
//! - [`validator`]: Structural checks run before execution
//! - [`scope`]: Layered variable scope
//! - [`resolver`]: Placeholder substitution

pub mod model;
pub mod parser;
pub mod resolver;
pub mod scope;
pub mod validator;

pub use model::{StepSpec, WorkflowDocument};
pub use parser::{load_workflow, parse_workflow};
pub use resolver::{substitute, substitute_with, PathAttr};
pub use scope::{parse_overrides, VariableScope};
pub use validator::{check_document, validate_document, ValidationIssue};
