//! Workflow Parser
//!
//! Loads workflow documents from YAML. Every failure here is a document
//! error: it surfaces before any step runs and is never partially recovered.

use std::fs;
use std::path::Path;

use log::{debug, info};
use serde_yaml::Value;

use super::model::WorkflowDocument;
use super::validator::validate_document;
use crate::error::WorkflowError;

/// Loads a workflow from a YAML file.
///
/// This function:
/// 1. Reads the file
/// 2. Parses it as YAML and checks that the root is a mapping
/// 3. Deserializes the document
/// 4. Validates the document structure
///
/// # Example
///
/// ```rust,no_run
/// use toolflow::workflow::load_workflow;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let document = load_workflow("thumbnails.yaml")?;
///     println!("Loaded {} steps", document.steps.len());
///     Ok(())
/// }
/// ```
pub fn load_workflow(path: impl AsRef<Path>) -> Result<WorkflowDocument, WorkflowError> {
    let path = path.as_ref();
    info!("Loading workflow from: {}", path.display());

    let content = fs::read_to_string(path).map_err(|source| WorkflowError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    debug!("YAML content loaded ({} bytes)", content.len());

    parse_workflow(&content)
}

/// Parses and validates a workflow from YAML text.
pub fn parse_workflow(content: &str) -> Result<WorkflowDocument, WorkflowError> {
    if content.trim().is_empty() {
        return Err(WorkflowError::NotAMapping {
            found: value_kind(&Value::Null),
        });
    }

    let root: Value = serde_yaml::from_str(content)?;

    if !root.is_mapping() {
        return Err(WorkflowError::NotAMapping {
            found: value_kind(&root),
        });
    }

    let document: WorkflowDocument = serde_yaml::from_value(root)?;

    info!(
        "Parsed workflow '{}': {} steps, {} variables",
        document.name,
        document.steps.len(),
        document.vars.len()
    );

    validate_document(&document)?;

    Ok(document)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "an empty document",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp_yaml(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_simple_workflow() {
        let yaml = r#"
name: Photos
description: Convert a photo
vars:
  input: photo.jpg
steps:
  - name: Convert
    command: image convert {input} out.png
  - command: image info out.png
"#;
        let file = write_temp_yaml(yaml);
        let doc = load_workflow(file.path()).unwrap();

        assert_eq!(doc.name, "Photos");
        assert_eq!(doc.description, "Convert a photo");
        assert_eq!(doc.steps.len(), 2);
        assert_eq!(doc.steps[1].display_name(1), "Step 2");
    }

    #[test]
    fn test_missing_file() {
        let err = load_workflow("/nonexistent/path/workflow.yaml").unwrap_err();
        assert!(matches!(err, WorkflowError::Read { .. }));
        assert!(err.is_document_error());
    }

    #[test]
    fn test_invalid_yaml() {
        let err = parse_workflow("name: [unclosed").unwrap_err();
        assert!(matches!(err, WorkflowError::Parse(_)));
    }

    #[test]
    fn test_sequence_root_rejected() {
        let err = parse_workflow("- command: a\n- command: b\n").unwrap_err();
        match err {
            WorkflowError::NotAMapping { found } => assert_eq!(found, "a sequence"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_scalar_and_empty_roots_rejected() {
        assert!(matches!(
            parse_workflow("just text").unwrap_err(),
            WorkflowError::NotAMapping { .. }
        ));
        assert!(matches!(
            parse_workflow("").unwrap_err(),
            WorkflowError::NotAMapping { .. }
        ));
    }

    #[test]
    fn test_steps_wrong_type() {
        let err = parse_workflow("steps: not-a-list").unwrap_err();
        assert!(matches!(err, WorkflowError::Parse(_)));
    }

    #[test]
    fn test_empty_steps_is_valid() {
        let doc = parse_workflow("name: Nothing\nsteps: []").unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_step_without_command_parses() {
        let doc = parse_workflow("steps:\n  - name: Broken\n").unwrap();
        assert!(doc.steps[0].command.is_none());
    }

    #[test]
    fn test_blank_informational_fields_accepted() {
        let doc = parse_workflow("description:\nsteps:\n  - command: a\n").unwrap();
        assert_eq!(doc.description, "");

        let doc = parse_workflow("name:\nparallel:\nsteps:\n  - command: a\n").unwrap();
        assert_eq!(doc.name, "Unnamed Workflow");
        assert!(!doc.parallel);
    }

    #[test]
    fn test_numeric_step_name_accepted() {
        let doc = parse_workflow("steps:\n  - name: 2024\n    command: a\n").unwrap();
        assert_eq!(doc.steps[0].display_name(0), "2024");
    }

    #[test]
    fn test_non_finite_var_keeps_text() {
        let doc = parse_workflow("vars:\n  x: .inf\nsteps: []\n").unwrap();
        assert_eq!(doc.vars["x"], ".inf");
    }

    #[test]
    fn test_register_with_parallel_rejected() {
        let yaml = "parallel: true\nsteps:\n  - command: a\n    register: out\n";
        let err = parse_workflow(yaml).unwrap_err();
        assert!(matches!(err, WorkflowError::Invalid(_)));
    }
}
