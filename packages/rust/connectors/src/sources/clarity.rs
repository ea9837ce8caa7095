//! Clarity insights connector.
//!
//! Clarity has no usable export API here; insights are curated by hand
//! into a local text file and passed through as a report section.

use std::path::PathBuf;

use tracing::debug;

use reportcast_shared::{SourceConfig, SourceResult, SourceStatus, TextSection};

/// Connector for a manually curated insights file.
#[derive(Debug)]
pub struct ClarityConnector {
    name: String,
    lag_days: u32,
    path: Option<PathBuf>,
}

impl ClarityConnector {
    pub fn new(config: &SourceConfig) -> Self {
        Self {
            name: config.name.clone(),
            lag_days: config.lag_days,
            path: config.path.as_ref().map(PathBuf::from),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lag_days(&self) -> u32 {
        self.lag_days
    }

    /// Read the insights file. A missing file is a warning, not a failure.
    pub async fn fetch(&self) -> SourceResult {
        let Some(path) = self.path.as_deref() else {
            return SourceResult::warning(&self.name, "insights file path is not configured.");
        };

        match tokio::fs::read_to_string(path).await {
            Ok(content) if content.trim().is_empty() => {
                SourceResult::warning(&self.name, "insights file is empty.")
            }
            Ok(content) => {
                debug!(?path, bytes = content.len(), "read insights file");
                SourceResult::Text(TextSection {
                    heading: self.name.clone(),
                    status: SourceStatus::Ok,
                    body: content.trim_end().to_string(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SourceResult::warning(
                &self.name,
                format!("insights file not found: {}", path.display()),
            ),
            Err(e) => SourceResult::error(
                &self.name,
                format!("failed to read {}: {e}", path.display()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector(path: Option<String>) -> ClarityConnector {
        ClarityConnector::new(&SourceConfig {
            name: "Clarity Insights".into(),
            kind: "clarity".into(),
            lag_days: 0,
            endpoint: None,
            key_env: None,
            secret_env: None,
            path,
        })
    }

    #[tokio::test]
    async fn reads_insights_file() {
        let dir = std::env::temp_dir().join("rc_clarity_test_1");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("insights.txt");
        std::fs::write(&file, "Date: 2026-08-28\n- Rage clicks down 12%\n").unwrap();

        let connector = connector(Some(file.to_string_lossy().into_owned()));
        let SourceResult::Text(section) = connector.fetch().await else {
            panic!("expected text section");
        };
        assert_eq!(section.status, SourceStatus::Ok);
        assert!(section.body.contains("Rage clicks down 12%"));
        assert!(!section.body.ends_with('\n'));
    }

    #[tokio::test]
    async fn missing_file_is_a_warning() {
        let connector = connector(Some("/nonexistent/rc_insights.txt".into()));
        let SourceResult::Text(section) = connector.fetch().await else {
            panic!("expected text section");
        };
        assert_eq!(section.status, SourceStatus::Warning);
        assert!(section.body.contains("not found"));
    }

    #[tokio::test]
    async fn missing_path_is_a_warning() {
        let connector = connector(None);
        let SourceResult::Text(section) = connector.fetch().await else {
            panic!("expected text section");
        };
        assert_eq!(section.status, SourceStatus::Warning);
    }
}
