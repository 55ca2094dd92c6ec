//! Rego policy evaluation for probe steps.
//!
//! Steps ask whether a resource document satisfies a rule. The rule lives in a
//! `.rego` file; the document is a JSON blob bound as `input`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ProbeError, ProbeResult};

/// Name the query binds the rule result to.
const BINDING: &str = "x";

/// Evaluates a Rego query against a rule file and an input document.
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    /// Returns the value bound to `x` by `query`.
    async fn evaluate(&self, rule_file: &Path, query: &str, input: &Value) -> ProbeResult<Value>;
}

/// `x = data.<package>.<function>`
pub fn rule_query(package: &str, function: &str) -> String {
    format!("{BINDING} = data.{package}.{function}")
}

/// Evaluate `data.<package>.<function>` with `json_input` as input.
///
/// Fails with [`ProbeError::PolicyEvaluationFailure`] when the input is not
/// JSON, the evaluator fails, or the rule does not produce a bool.
pub async fn evaluate_rule(
    evaluator: &dyn PolicyEvaluator,
    rule_file: &Path,
    package: &str,
    function: &str,
    json_input: &[u8],
) -> ProbeResult<bool> {
    let input: Value = serde_json::from_slice(json_input)
        .map_err(|e| ProbeError::PolicyEvaluationFailure(format!("invalid input json: {e}")))?;

    let value = evaluator
        .evaluate(rule_file, &rule_query(package, function), &input)
        .await?;

    value.as_bool().ok_or_else(|| {
        ProbeError::PolicyEvaluationFailure(format!(
            "data.{package}.{function} did not evaluate to a bool: {value}"
        ))
    })
}

/// Extract the `x` binding of the first result from `opa eval --format json`
/// output.
pub fn parse_opa_output(stdout: &[u8]) -> ProbeResult<Value> {
    let doc: Value = serde_json::from_slice(stdout)
        .map_err(|e| ProbeError::PolicyEvaluationFailure(format!("unreadable opa output: {e}")))?;

    doc.get("result")
        .and_then(|r| r.get(0))
        .and_then(|r| r.get("bindings"))
        .and_then(|b| b.get(BINDING))
        .cloned()
        .ok_or_else(|| ProbeError::PolicyEvaluationFailure("query is undefined".to_string()))
}

/// Shells out to the `opa` binary.
#[derive(Debug, Clone)]
pub struct OpaCommandEvaluator {
    binary: PathBuf,
}

impl Default for OpaCommandEvaluator {
    fn default() -> Self {
        Self::new("opa")
    }
}

impl OpaCommandEvaluator {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl PolicyEvaluator for OpaCommandEvaluator {
    async fn evaluate(&self, rule_file: &Path, query: &str, input: &Value) -> ProbeResult<Value> {
        let failure = |msg: String| ProbeError::PolicyEvaluationFailure(msg);

        debug!(rule_file = %rule_file.display(), query = %query, "evaluating rego");

        let mut child = Command::new(&self.binary)
            .arg("eval")
            .arg("--format")
            .arg("json")
            .arg("--data")
            .arg(rule_file)
            .arg("--stdin-input")
            .arg(query)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| failure(format!("failed to spawn '{}': {e}", self.binary.display())))?;

        let body = serde_json::to_vec(input).map_err(|e| failure(e.to_string()))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&body)
                .await
                .map_err(|e| failure(format!("failed to write input: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| failure(e.to_string()))?;

        if !output.status.success() {
            return Err(failure(format!(
                "opa eval exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_opa_output(&output.stdout)
    }
}
