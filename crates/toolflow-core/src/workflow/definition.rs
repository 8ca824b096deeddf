//! Workflow definition parsing, validation, and metadata.
//!
//! Converts YAML or JSON text into the canonical `WorkflowDefinition`,
//! collects every structural violation in one pass, and derives the
//! registration metadata (complexity and duration estimate).

use std::collections::HashSet;
use std::path::Path;

use chrono::Utc;
use toolflow_types::workflow::{WorkflowComplexity, WorkflowDefinition, WorkflowMetadata};

use super::dag;
use super::error::{DefinitionError, ValidationErrors};

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a YAML document into a `WorkflowDefinition`.
///
/// Only deserializes; call [`validate_definition`] (or register it) to
/// check structure.
pub fn parse_definition_yaml(yaml: &str) -> Result<WorkflowDefinition, DefinitionError> {
    serde_yaml_ng::from_str(yaml).map_err(|e| DefinitionError::Parse(e.to_string()))
}

/// Parse a JSON document into a `WorkflowDefinition`.
pub fn parse_definition_json(json: &str) -> Result<WorkflowDefinition, DefinitionError> {
    serde_json::from_str(json).map_err(|e| DefinitionError::Parse(e.to_string()))
}

/// Load a definition from disk. `.json` files are parsed as JSON, anything
/// else as YAML.
pub fn load_definition(path: &Path) -> Result<WorkflowDefinition, DefinitionError> {
    let content = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        parse_definition_json(&content)
    } else {
        parse_definition_yaml(&content)
    }
}

/// Serialize a definition to YAML.
pub fn serialize_definition_yaml(def: &WorkflowDefinition) -> Result<String, DefinitionError> {
    serde_yaml_ng::to_string(def).map_err(|e| DefinitionError::Parse(e.to_string()))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate structural constraints, reporting every violation.
///
/// Checks:
/// - Name is non-empty and contains only alphanumerics, `-` and `_`
/// - At least one step exists
/// - Step IDs and tool IDs are non-empty, step IDs are unique
/// - Every dependency names an existing step other than itself
/// - `concurrency_limit >= 1` and `timeout_secs > 0` when set
/// - `version` parses as semver when set
///
/// Cycles are not rejected here; they surface as a deadlock at run time.
pub fn validate_definition(def: &WorkflowDefinition) -> Result<(), ValidationErrors> {
    let mut violations = Vec::new();

    if def.name.is_empty() {
        violations.push("workflow name must not be empty".to_string());
    } else if !def
        .name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        violations.push(format!(
            "workflow name '{}' contains invalid characters (only alphanumerics, '-' and '_' allowed)",
            def.name
        ));
    }

    if !def.version.is_empty() && semver::Version::parse(&def.version).is_err() {
        violations.push(format!(
            "version '{}' is not a valid semantic version",
            def.version
        ));
    }

    if def.steps.is_empty() {
        violations.push("workflow must have at least one step".to_string());
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for (idx, step) in def.steps.iter().enumerate() {
        if step.id.is_empty() {
            violations.push(format!("step #{idx} has an empty id"));
        } else if !seen.insert(step.id.as_str()) {
            violations.push(format!("duplicate step id '{}'", step.id));
        }
        if step.tool.is_empty() {
            violations.push(format!("step '{}' has an empty tool id", step.id));
        }
    }

    let ids: HashSet<&str> = def.steps.iter().map(|s| s.id.as_str()).collect();
    for step in &def.steps {
        for dep in &step.dependencies {
            if dep == &step.id {
                violations.push(format!("step '{}' depends on itself", step.id));
            } else if !ids.contains(dep.as_str()) {
                violations.push(format!(
                    "step '{}' depends on unknown step '{}'",
                    step.id, dep
                ));
            }
        }
    }

    if def.concurrency_limit == Some(0) {
        violations.push("concurrency_limit must be at least 1".to_string());
    }
    if def.timeout_secs == Some(0) {
        violations.push("timeout_secs must be greater than 0".to_string());
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(violations))
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Derive registration metadata for a (validated) definition.
pub fn compute_metadata(def: &WorkflowDefinition) -> WorkflowMetadata {
    let step_count = def.steps.len();
    let dependency_count = def.dependency_count();
    WorkflowMetadata {
        step_count,
        dependency_count,
        complexity: WorkflowComplexity::classify(step_count, dependency_count),
        estimated_duration_ms: dag::critical_path_ms(&def.steps),
        registered_at: Utc::now(),
    }
}

/// Next patch version after `version` (pre-release and build metadata are
/// dropped).
pub fn bump_patch(version: &str) -> Result<String, semver::Error> {
    let mut v = semver::Version::parse(version)?;
    v.patch += 1;
    v.pre = semver::Prerelease::EMPTY;
    v.build = semver::BuildMetadata::EMPTY;
    Ok(v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use toolflow_types::workflow::{StepComplexity, StepSpec};

    const SAMPLE_YAML: &str = r#"
name: order-sync
version: 1.2.0
description: Pull orders and push them to the ledger
concurrency_limit: 2
steps:
  - id: fetch
    tool: shop.orders
    params:
      since: "${context.since}"
    complexity: low
  - id: push
    tool: ledger.write
    depends_on: [fetch]
    params:
      rows: "${steps.fetch.orders}"
    retry:
      max_retries: 1
output: "${steps.push.count}"
"#;

    #[test]
    fn test_parse_yaml_definition() {
        let def = parse_definition_yaml(SAMPLE_YAML).unwrap();
        assert_eq!(def.name, "order-sync");
        assert_eq!(def.version, "1.2.0");
        assert_eq!(def.concurrency_limit, Some(2));
        assert_eq!(def.steps[1].dependencies, vec!["fetch"]);
        assert_eq!(def.steps[0].complexity, Some(StepComplexity::Low));
        assert_eq!(def.steps[1].retry.as_ref().unwrap().max_retries, Some(1));
        assert_eq!(def.output, Some(json!("${steps.push.count}")));
        validate_definition(&def).unwrap();
    }

    #[test]
    fn test_parse_invalid_yaml_is_parse_error() {
        let err = parse_definition_yaml("name: [unterminated").unwrap_err();
        assert!(matches!(err, DefinitionError::Parse(_)));
    }

    #[test]
    fn test_load_definition_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let yaml_path = dir.path().join("sync.yaml");
        std::fs::write(&yaml_path, SAMPLE_YAML).unwrap();
        assert_eq!(load_definition(&yaml_path).unwrap().name, "order-sync");

        let json_path = dir.path().join("mini.json");
        std::fs::write(
            &json_path,
            r#"{"name":"mini","steps":[{"id":"a","tool":"t"}]}"#,
        )
        .unwrap();
        assert_eq!(load_definition(&json_path).unwrap().name, "mini");

        let missing = dir.path().join("absent.yaml");
        assert!(matches!(
            load_definition(&missing),
            Err(DefinitionError::Io(_))
        ));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let def = parse_definition_yaml(SAMPLE_YAML).unwrap();
        let yaml = serialize_definition_yaml(&def).unwrap();
        assert_eq!(parse_definition_yaml(&yaml).unwrap(), def);
    }

    #[test]
    fn test_validation_collects_every_violation() {
        let mut def = WorkflowDefinition::new(
            "bad name!",
            vec![
                StepSpec::new("a", "", &[]),
                StepSpec::new("a", "t", &["ghost"]),
                StepSpec::new("c", "t", &["c"]),
            ],
        );
        def.concurrency_limit = Some(0);
        def.timeout_secs = Some(0);
        def.version = "one".into();

        let err = validate_definition(&def).unwrap_err();
        let v = err.violations();
        assert_eq!(v.len(), 8, "{v:?}");
        assert!(v.iter().any(|m| m.contains("invalid characters")));
        assert!(v.iter().any(|m| m.contains("semantic version")));
        assert!(v.iter().any(|m| m.contains("empty tool id")));
        assert!(v.iter().any(|m| m.contains("duplicate step id 'a'")));
        assert!(v.iter().any(|m| m.contains("unknown step 'ghost'")));
        assert!(v.iter().any(|m| m.contains("'c' depends on itself")));
        assert!(v.iter().any(|m| m.contains("concurrency_limit")));
        assert!(v.iter().any(|m| m.contains("timeout_secs")));
    }

    #[test]
    fn test_empty_workflow_rejected() {
        let def = WorkflowDefinition::new("", vec![]);
        let err = validate_definition(&def).unwrap_err();
        assert_eq!(err.violations().len(), 2);
    }

    #[test]
    fn test_cycles_pass_validation() {
        let def = WorkflowDefinition::new(
            "loop",
            vec![StepSpec::new("a", "t", &["b"]), StepSpec::new("b", "t", &["a"])],
        );
        assert!(validate_definition(&def).is_ok());
    }

    #[test]
    fn test_metadata_uses_critical_path() {
        let mut fetch = StepSpec::new("fetch", "t", &[]);
        fetch.complexity = Some(StepComplexity::Low);
        let mut heavy = StepSpec::new("heavy", "t", &["fetch"]);
        heavy.complexity = Some(StepComplexity::High);
        let mut light = StepSpec::new("light", "t", &["fetch"]);
        light.complexity = Some(StepComplexity::Low);
        let join = StepSpec::new("join", "t", &["heavy", "light"]);

        let def = WorkflowDefinition::new("wf", vec![fetch, heavy, light, join]);
        let meta = compute_metadata(&def);
        assert_eq!(meta.step_count, 4);
        assert_eq!(meta.dependency_count, 4);
        assert_eq!(meta.complexity, WorkflowComplexity::Medium);
        // low + high + medium (default)
        assert_eq!(meta.estimated_duration_ms, 1_000 + 15_000 + 5_000);
    }

    #[test]
    fn test_bump_patch() {
        assert_eq!(bump_patch("1.0.0").unwrap(), "1.0.1");
        assert_eq!(bump_patch("2.3.9-beta.1").unwrap(), "2.3.10");
        assert!(bump_patch("latest").is_err());
    }
}
