//! Relation registry backed by the `relation-*` hook tools

use super::{Databag, RelationId, RelationRegistry};
use crate::error::{Error, ParseError, Result};
use async_trait::async_trait;
use command_executor::{Command, Executor};
use serde::de::DeserializeOwned;

/// Reads and writes relation data through the platform's hook tools
#[derive(Debug, Clone)]
pub struct HookToolRegistry {
    executor: Executor,
}

impl HookToolRegistry {
    /// Create a registry that shells out through `executor`
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }

    async fn query<T: DeserializeOwned + Default>(&self, command: Command) -> Result<T> {
        let tool = command.get_program().to_string_lossy().into_owned();
        let output = self
            .executor
            .run(command)
            .await
            .map_err(|e| Error::PublishFailed(e.to_string()))?;
        parse_json(&tool, &output.stdout)
    }
}

/// Decode a hook tool's `--format=json` output; `null` or nothing means empty
pub(crate) fn parse_json<T: DeserializeOwned + Default>(tool: &str, stdout: &str) -> Result<T> {
    if stdout.trim().is_empty() {
        return Ok(T::default());
    }
    let value: Option<T> = serde_json::from_str(stdout).map_err(|e| ParseError::Json {
        tool: tool.to_string(),
        reason: e.to_string(),
    })?;
    Ok(value.unwrap_or_default())
}

#[async_trait]
impl RelationRegistry for HookToolRegistry {
    async fn relation_ids(&self, endpoint: &str) -> Result<Vec<RelationId>> {
        let ids: Vec<String> = self
            .query(
                Command::builder("relation-ids")
                    .arg(endpoint)
                    .arg("--format=json")
                    .build(),
            )
            .await?;
        Ok(ids.into_iter().map(RelationId::new).collect())
    }

    async fn related_units(&self, relation: &RelationId) -> Result<Vec<String>> {
        self.query(
            Command::builder("relation-list")
                .arg("-r")
                .arg(relation.as_str())
                .arg("--format=json")
                .build(),
        )
        .await
    }

    async fn read(&self, relation: &RelationId, unit: &str) -> Result<Databag> {
        self.query(
            Command::builder("relation-get")
                .arg("-r")
                .arg(relation.as_str())
                .arg("--format=json")
                .arg("-")
                .arg(unit)
                .build(),
        )
        .await
    }

    async fn write(&self, relation: &RelationId, changes: &Databag) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let cmd = Command::builder("relation-set")
            .arg("-r")
            .arg(relation.as_str())
            .args(changes.iter().map(|(key, value)| format!("{}={}", key, value)))
            .build();
        self.executor
            .run(cmd)
            .await
            .map_err(|e| Error::PublishFailed(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;

    #[test]
    fn test_parse_json_outputs() {
        let ids: Vec<String> = parse_json("relation-ids", "[\"website:1\",\"website:2\"]\n").unwrap();
        assert_eq!(ids.len(), 2);

        let empty: Databag = parse_json("relation-get", "null\n").unwrap();
        assert!(empty.is_empty());

        let empty: Vec<String> = parse_json("relation-list", "").unwrap();
        assert!(empty.is_empty());

        assert!(matches!(
            parse_json::<Databag>("relation-get", "{not json"),
            Err(Error::Parse(ParseError::Json { .. }))
        ));
    }

    #[test]
    fn test_write_passes_key_values() {
        smol::block_on(async {
            let host = FakeHost::new();
            let registry = HookToolRegistry::new(host.executor());
            let id = RelationId::new("website:1");

            let mut changes = Databag::new();
            changes.insert("hostname".to_string(), "10.0.0.1".to_string());
            changes.insert("port".to_string(), "9090".to_string());
            changes.insert("stale".to_string(), String::new());
            registry.write(&id, &changes).await.unwrap();

            assert_eq!(
                host.calls(),
                vec!["relation-set -r website:1 hostname=10.0.0.1 port=9090 stale=".to_string()]
            );
        });
    }

    #[test]
    fn test_write_failure_is_publish_failure() {
        smol::block_on(async {
            let host = FakeHost::new().fail_on("relation-set");
            let registry = HookToolRegistry::new(host.executor());

            let mut changes = Databag::new();
            changes.insert("port".to_string(), "9090".to_string());

            assert!(matches!(
                registry.write(&RelationId::new("website:1"), &changes).await,
                Err(Error::PublishFailed(_))
            ));
        });
    }
}
