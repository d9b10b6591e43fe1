//! Path template expansion for archive storage keys.
//!
//! Templates use `${job.<field>}` placeholders resolved against the
//! execution context supplied at initialization. Expansion is pure: no
//! I/O, no state beyond the inputs.

use crate::context::ExecutionContext;

/// Default storage path template.
pub const DEFAULT_PATH_TEMPLATE: &str = "project/${job.project}/${job.execid}";

/// Placeholder required in any template that does not end in `/`.
pub const EXECID_PLACEHOLDER: &str = "${job.execid}";

/// Placeholder substituted only when a file type is supplied.
pub const FILETYPE_PLACEHOLDER: &str = "${filetype}";

/// Context fields recognized as `${job.<field>}` placeholders.
const JOB_FIELDS: [&str; 5] = ["execid", "id", "project", "group", "name"];

/// Expand a path template against the execution context.
///
/// Leading slashes are stripped and runs of `/` collapse to one. Context
/// keys that are absent expand to the empty string rather than failing;
/// callers that need a non-empty result validate it themselves.
pub fn expand_path(template: &str, context: &ExecutionContext, file_type: Option<&str>) -> String {
    let mut result = template.trim_start_matches('/').to_string();

    for field in JOB_FIELDS {
        let token = format!("${{job.{field}}}");
        if result.contains(&token) {
            result = result.replace(&token, context.get(field).unwrap_or(""));
        }
    }
    if let Some(file_type) = file_type {
        result = result.replace(FILETYPE_PLACEHOLDER, file_type);
    }

    collapse_slashes(&result)
}

fn collapse_slashes(path: &str) -> String {
    let mut collapsed = String::with_capacity(path.len());
    let mut previous_was_slash = false;
    for c in path.chars() {
        if c == '/' {
            if !previous_was_slash {
                collapsed.push(c);
            }
            previous_was_slash = true;
        } else {
            collapsed.push(c);
            previous_was_slash = false;
        }
    }
    collapsed
}
