//! Variable Resolver
//!
//! Single-pass placeholder substitution. Three syntaxes are active at once:
//!
//! - `${NAME}` / `${NAME.ATTR}`
//! - `$NAME` / `$NAME.ATTR`
//! - `{NAME}` / `{NAME.ATTR}`
//!
//! `ATTR` is one of `stem`, `suffix`, `name`, `parent`, `absolute` and projects
//! the bound value as a filesystem path. Names are looked up in the
//! [`VariableScope`] first, then in the process environment. Anything that
//! does not resolve is left in the output exactly as written.

use std::borrow::Cow;
use std::path::Path;

use log::trace;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::scope::VariableScope;

/// Matches all placeholder forms.
///
/// The unbraced form only consumes `.ATTR` for known attributes so that text
/// like `$base.txt` keeps its literal extension.
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\$\{(?P<dollar_braced>\w+)(?:\.(?P<dollar_braced_attr>\w+))?\}|\$(?P<bare>\w+)(?:\.(?P<bare_attr>stem|suffix|name|parent|absolute)\b)?|\{(?P<braced>\w+)(?:\.(?P<braced_attr>\w+))?\}",
    )
    .expect("placeholder pattern is valid")
});

/// Path projection applied by a dotted attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathAttr {
    /// Final component without its last extension
    Stem,
    /// Last extension including the dot, or empty
    Suffix,
    /// Final component
    Name,
    /// Containing directory, `.` for bare file names
    Parent,
    /// Path joined onto the current directory when relative
    Absolute,
}

impl PathAttr {
    pub fn parse(attr: &str) -> Option<Self> {
        match attr {
            "stem" => Some(Self::Stem),
            "suffix" => Some(Self::Suffix),
            "name" => Some(Self::Name),
            "parent" => Some(Self::Parent),
            "absolute" => Some(Self::Absolute),
            _ => None,
        }
    }

    /// Projects `value`, treated as a path whether or not it exists.
    pub fn apply(self, value: &str) -> String {
        let path = Path::new(value);
        match self {
            // A trailing dot is part of the stem, not an empty suffix
            Self::Stem => match path.extension() {
                Some(ext) if ext.is_empty() => path
                    .file_name()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                _ => path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            },
            Self::Suffix => path
                .extension()
                .filter(|e| !e.is_empty())
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default(),
            Self::Name => path
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Self::Parent => match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => {
                    parent.to_string_lossy().into_owned()
                }
                None if path.has_root() => value.to_string(),
                _ => ".".to_string(),
            },
            Self::Absolute => {
                if path.is_absolute() {
                    return value.to_string();
                }
                std::env::current_dir()
                    .map(|dir| dir.join(path).to_string_lossy().into_owned())
                    .unwrap_or_else(|_| value.to_string())
            }
        }
    }
}

/// Substitutes placeholders using the scope and the process environment.
///
/// # Example
///
/// ```
/// use toolflow::workflow::{substitute, VariableScope};
///
/// let scope: VariableScope = [("input", "photo.jpg")].into_iter().collect();
/// assert_eq!(substitute("convert {input} {input.stem}.png", &scope), "convert photo.jpg photo.png");
/// assert_eq!(substitute("echo {TOOLFLOW_UNSET_EXAMPLE}", &scope), "echo {TOOLFLOW_UNSET_EXAMPLE}");
/// ```
pub fn substitute(text: &str, scope: &VariableScope) -> String {
    substitute_with(text, scope, |name| std::env::var(name).ok())
}

/// Substitutes placeholders with an explicit environment lookup.
pub fn substitute_with<F>(text: &str, scope: &VariableScope, env: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| {
            let (base, attr) = placeholder_parts(caps);
            let original = &caps[0];

            let value: Cow<'_, str> = match scope.get(base) {
                Some(v) => Cow::Borrowed(v),
                None => match env(base) {
                    Some(v) => Cow::Owned(v),
                    None => {
                        trace!("Unresolved placeholder left as-is: {}", original);
                        return original.to_string();
                    }
                },
            };

            match attr {
                None => value.into_owned(),
                Some(attr) => match PathAttr::parse(attr) {
                    Some(projection) => projection.apply(&value),
                    None => original.to_string(),
                },
            }
        })
        .into_owned()
}

fn placeholder_parts<'t>(caps: &Captures<'t>) -> (&'t str, Option<&'t str>) {
    for (base, attr) in [
        ("dollar_braced", "dollar_braced_attr"),
        ("bare", "bare_attr"),
        ("braced", "braced_attr"),
    ] {
        if let Some(name) = caps.name(base) {
            return (name.as_str(), caps.name(attr).map(|m| m.as_str()));
        }
    }
    unreachable!("placeholder pattern always captures a name")
}
