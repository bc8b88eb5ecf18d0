//! Workflow Data Model
//!
//! Core data structures representing a workflow document and its steps.
//!
//! # Example YAML Format
//!
//! ```yaml
//! name: Thumbnails
//! description: Convert and shrink a photo
//! parallel: false
//! vars:
//!   input: photo.jpg
//!   resize: "yes"
//! steps:
//!   - name: Convert
//!     command: image convert {input} {input.stem}.png
//!
//!   - name: Resize
//!     command: image resize {input.stem}.png --width 320
//!     if: "{resize}"
//!     continue_on_error: true
//! ```

use indexmap::IndexMap;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// Name used when a document does not declare one.
pub const UNNAMED_WORKFLOW: &str = "Unnamed Workflow";

/// A single declarative step.
///
/// Only `command` is required for a step to run, and even its absence is
/// reported as a step failure rather than a parse error.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct StepSpec {
    /// Display name; defaults to `Step N` (1-based) when absent
    #[serde(
        default,
        deserialize_with = "optional_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,

    /// Command line template with variable placeholders
    #[serde(
        default,
        deserialize_with = "optional_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub command: Option<String>,

    /// Condition template; the step is skipped when it resolves to a falsy word
    #[serde(
        rename = "if",
        default,
        deserialize_with = "optional_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub condition: Option<String>,

    /// Downgrades a dispatch failure into a warning
    #[serde(default)]
    pub continue_on_error: bool,

    /// Variable name bound to this step's trimmed stdout (sequential runs only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub register: Option<String>,
}

/// A parsed workflow document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkflowDocument {
    #[serde(default = "default_name", deserialize_with = "workflow_name")]
    pub name: String,

    /// Informational only
    #[serde(default, deserialize_with = "scalar_or_empty")]
    pub description: String,

    /// Variables declared by the workflow, in document order
    #[serde(default, deserialize_with = "scalar_map")]
    pub vars: IndexMap<String, String>,

    /// Run steps concurrently on a bounded worker pool
    #[serde(default, deserialize_with = "null_as_default")]
    pub parallel: bool,

    #[serde(default, deserialize_with = "null_as_default")]
    pub steps: Vec<StepSpec>,
}

fn default_name() -> String {
    UNNAMED_WORKFLOW.to_string()
}

impl Default for WorkflowDocument {
    fn default() -> Self {
        Self::new(UNNAMED_WORKFLOW)
    }
}

/// Converts a YAML scalar into the string a template sees.
///
/// Mappings and sequences are rejected; `null` becomes the empty string.
pub(crate) fn scalar_to_string(value: Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        // serde_yaml prints non-finite floats as `.inf`, `-.inf` and `.nan`
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        Value::Tagged(tagged) => scalar_to_string(tagged.value),
        Value::Sequence(_) => Err("expected a scalar, found a sequence".to_string()),
        Value::Mapping(_) => Err("expected a scalar, found a mapping".to_string()),
    }
}

/// Deserializes a mapping of scalars into an ordered string map.
pub(crate) fn scalar_map<'de, D>(deserializer: D) -> Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<IndexMap<String, Value>> = Option::deserialize(deserializer)?;
    raw.unwrap_or_default()
        .into_iter()
        .map(|(key, value)| {
            scalar_to_string(value)
                .map(|v| (key.clone(), v))
                .map_err(|e| de::Error::custom(format!("variable '{}': {}", key, e)))
        })
        .collect()
}

/// Deserializes an optional scalar, keeping `null` as absent.
fn optional_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        other => scalar_to_string(other).map(Some).map_err(de::Error::custom),
    }
}

/// Workflow name from any scalar; `null` falls back to the default name.
fn workflow_name<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_scalar(deserializer)?.unwrap_or_else(default_name))
}

fn scalar_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_scalar(deserializer)?.unwrap_or_default())
}

/// Treats an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl StepSpec {
    /// Creates a step that runs `command`.
    ///
    /// # Example
    ///
    /// ```
    /// use toolflow::workflow::StepSpec;
    ///
    /// let step = StepSpec::new("image convert {input} out.png")
    ///     .named("Convert")
    ///     .when("{do_convert}")
    ///     .continue_on_error();
    /// assert_eq!(step.display_name(0), "Convert");
    /// ```
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            ..Self::default()
        }
    }

    /// Sets the display name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the condition template.
    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Marks the step as tolerant of dispatch failures.
    pub fn continue_on_error(mut self) -> Self {
        self.continue_on_error = true;
        self
    }

    /// Binds the step's stdout to `variable` for later steps.
    pub fn register(mut self, variable: impl Into<String>) -> Self {
        self.register = Some(variable.into());
        self
    }

    /// Returns the step name, or `Step N` for the 0-based `index`.
    pub fn display_name(&self, index: usize) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!("Step {}", index + 1),
        }
    }

    /// Returns the command if present and not blank.
    pub fn command_text(&self) -> Option<&str> {
        self.command.as_deref().filter(|c| !c.trim().is_empty())
    }
}

impl WorkflowDocument {
    /// Creates an empty sequential workflow.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            vars: IndexMap::new(),
            parallel: false,
            steps: Vec::new(),
        }
    }

    /// Declares a workflow variable.
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Appends a step.
    pub fn with_step(mut self, step: StepSpec) -> Self {
        self.steps.push(step);
        self
    }

    /// Sets parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Returns true if there are no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if any step captures output into a variable.
    pub fn registers_output(&self) -> bool {
        self.steps.iter().any(|s| s.register.is_some())
    }
}
