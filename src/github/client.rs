use anyhow::{Context, Result};
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectRepoError {
    #[error("Not a git repository. Use --repo to specify.")]
    NotGitRepo,
    #[error("No GitHub remote found. Use --repo to specify.")]
    NoGitHubRemote,
    #[error("gh CLI error: {0}")]
    GhError(String),
}

/// Detect the repository name from the current directory using `gh repo view`
pub async fn detect_repo() -> std::result::Result<String, DetectRepoError> {
    let result = tokio::task::spawn_blocking(|| {
        let output = Command::new("gh")
            .args([
                "repo",
                "view",
                "--json",
                "nameWithOwner",
                "-q",
                ".nameWithOwner",
            ])
            .output();

        match output {
            Ok(output) if output.status.success() => {
                let repo = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if repo.is_empty() {
                    Err(DetectRepoError::NoGitHubRemote)
                } else {
                    Ok(repo)
                }
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                if stderr.contains("not a git repository") {
                    Err(DetectRepoError::NotGitRepo)
                } else if stderr.contains("no git remotes") || stderr.contains("could not determine")
                {
                    Err(DetectRepoError::NoGitHubRemote)
                } else {
                    Err(DetectRepoError::GhError(stderr.trim().to_string()))
                }
            }
            Err(e) => Err(DetectRepoError::GhError(format!(
                "Failed to execute gh CLI: {}",
                e
            ))),
        }
    })
    .await;

    match result {
        Ok(r) => r,
        Err(e) => Err(DetectRepoError::GhError(format!(
            "spawn_blocking task panicked: {}",
            e
        ))),
    }
}

/// Execute gh CLI command and return stdout
/// Uses spawn_blocking to avoid blocking the tokio runtime
///
/// `token` is handed to gh through `GH_TOKEN`; without it gh uses its stored login.
pub async fn gh_command(args: &[&str], token: Option<&str>) -> Result<String> {
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    let token = token.map(str::to_string);

    tokio::task::spawn_blocking(move || {
        let mut command = Command::new("gh");
        command.args(&args);
        if let Some(token) = &token {
            command.env("GH_TOKEN", token);
        }
        let output = command
            .output()
            .context("Failed to execute gh CLI - is it installed?")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("gh command failed: {}", stderr.trim());
        }

        String::from_utf8(output.stdout).context("gh output contains invalid UTF-8")
    })
    .await
    .context("spawn_blocking task panicked")?
}

/// Execute gh api command with JSON output
pub async fn gh_api(endpoint: &str, token: Option<&str>) -> Result<serde_json::Value> {
    let output = gh_command(&["api", endpoint], token).await?;
    serde_json::from_str(&output).context("Failed to parse gh api response as JSON")
}

/// Execute gh api command and return the body untouched (non-JSON media types)
pub async fn gh_api_raw(endpoint: &str, accept: &str, token: Option<&str>) -> Result<String> {
    let header = format!("Accept: {}", accept);
    gh_command(&["api", "-H", &header, endpoint], token).await
}

/// Execute gh api command with automatic pagination for array endpoints.
/// Fetches all pages and merges into a single JSON array.
/// Caller should include `per_page=100` in endpoint if desired.
pub async fn gh_api_paginate(endpoint: &str, token: Option<&str>) -> Result<serde_json::Value> {
    let output = gh_command(&["api", "--paginate", "--slurp", endpoint], token).await?;
    merge_pages(&output)
}

fn merge_pages(output: &str) -> Result<serde_json::Value> {
    let pages: Vec<serde_json::Value> =
        serde_json::from_str(output).context("Failed to parse gh api paginated response")?;
    let mut result = Vec::new();
    for page in pages {
        if let serde_json::Value::Array(items) = page {
            result.extend(items);
        }
    }
    Ok(serde_json::Value::Array(result))
}

/// Field type for gh api command
pub enum FieldValue<'a> {
    /// String field (-f)
    String(&'a str),
    /// Raw/typed field (-F) - for integers, booleans, null
    Raw(&'a str),
}

fn post_args(endpoint: &str, fields: &[(&str, FieldValue<'_>)]) -> Vec<String> {
    let mut args = vec![
        "api".to_string(),
        "--method".to_string(),
        "POST".to_string(),
        endpoint.to_string(),
    ];
    for (key, value) in fields {
        match value {
            FieldValue::String(v) => {
                args.push("-f".to_string());
                args.push(format!("{}={}", key, v));
            }
            FieldValue::Raw(v) => {
                args.push("-F".to_string());
                args.push(format!("{}={}", key, v));
            }
        }
    }
    args
}

/// Execute gh api with method and fields
pub async fn gh_api_post(
    endpoint: &str,
    fields: &[(&str, FieldValue<'_>)],
    token: Option<&str>,
) -> Result<serde_json::Value> {
    let args = post_args(endpoint, fields);
    let args_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
    let output = gh_command(&args_refs, token).await?;
    serde_json::from_str(&output).context("Failed to parse gh api response as JSON")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_args_field_flags() {
        let args = post_args(
            "repos/o/r/pulls/1/comments",
            &[
                ("body", FieldValue::String("a=b c")),
                ("position", FieldValue::Raw("4")),
            ],
        );
        assert_eq!(
            args,
            vec![
                "api",
                "--method",
                "POST",
                "repos/o/r/pulls/1/comments",
                "-f",
                "body=a=b c",
                "-F",
                "position=4",
            ]
        );
    }

    #[test]
    fn test_merge_pages_flattens_arrays() {
        let merged = merge_pages(r#"[[{"id":1},{"id":2}],[{"id":3}],{"message":"x"}]"#).unwrap();
        assert_eq!(merged.as_array().map(|a| a.len()), Some(3));
    }

    #[test]
    fn test_merge_pages_rejects_non_json() {
        assert!(merge_pages("not json").is_err());
    }
}
