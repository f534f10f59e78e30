// ABOUTME: Template loading from JSON or YAML files.
// ABOUTME: Also exposes the resource section accessor shared by diff and deploy.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read template {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse template {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Load a template, choosing the parser by extension and falling back to YAML.
pub fn load_template(path: &Path) -> Result<Value, TemplateError> {
    let content = std::fs::read_to_string(path).map_err(|source| TemplateError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    template_from_str(&content).map_err(|message| TemplateError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/// Parse a template body. JSON is a subset of YAML, so YAML is the fallback.
pub fn template_from_str(content: &str) -> Result<Value, String> {
    match serde_json::from_str::<Value>(content) {
        Ok(value) => Ok(value),
        Err(_) => serde_yaml::from_str::<Value>(content).map_err(|e| e.to_string()),
    }
}

/// The `Resources` section of a template, if any.
pub fn resources(template: &Value) -> Option<&Map<String, Value>> {
    template.get("Resources").and_then(Value::as_object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_json_template() {
        let value = template_from_str(r#"{"Resources": {"Queue": {"Type": "AWS::SQS::Queue"}}}"#)
            .unwrap();
        assert_eq!(resources(&value).unwrap().len(), 1);
    }

    #[test]
    fn parses_yaml_template() {
        let value = template_from_str("Resources:\n  Queue:\n    Type: AWS::SQS::Queue\n").unwrap();
        assert_eq!(
            value,
            json!({"Resources": {"Queue": {"Type": "AWS::SQS::Queue"}}})
        );
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_template(Path::new("/nonexistent/template.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/template.json"));
    }

    #[test]
    fn template_without_resources() {
        assert!(resources(&json!({})).is_none());
    }
}
