use anyhow::Context;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use protocol::SuiteStatusFilter;

const DEFAULT_POLL_DELAY_SECS: u64 = 3;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOG_LINES: u32 = 2000;

#[derive(Debug, Deserialize)]
pub(crate) struct ConsoleConfig {
    pub(crate) runner: RunnerConfig,
    #[serde(default)]
    pub(crate) view: ViewDefaults,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RunnerConfig {
    pub(crate) addr: String,
    pub(crate) poll_delay_secs: Option<u64>,
    pub(crate) request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ViewDefaults {
    pub(crate) log_lines: Option<u32>,
    pub(crate) status_filter: Option<SuiteStatusFilter>,
}

impl ConsoleConfig {
    pub(crate) fn poll_delay(&self) -> Duration {
        Duration::from_secs(self.runner.poll_delay_secs.unwrap_or(DEFAULT_POLL_DELAY_SECS))
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.runner
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub(crate) fn log_lines(&self) -> u32 {
        self.view.log_lines.unwrap_or(DEFAULT_LOG_LINES)
    }

    pub(crate) fn status_filter(&self) -> SuiteStatusFilter {
        self.view.status_filter.unwrap_or(SuiteStatusFilter::Failed)
    }
}

pub(crate) fn load_console_config(path: &PathBuf) -> anyhow::Result<ConsoleConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: ConsoleConfig = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    if config.runner.addr.trim().is_empty() {
        anyhow::bail!("runner addr cannot be empty");
    }
    if config.runner.poll_delay_secs == Some(0) {
        anyhow::bail!("poll_delay_secs must be at least 1");
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let config: ConsoleConfig = toml::from_str(
            "[runner]\n\
             addr = \"127.0.0.1:18407\"\n",
        )
        .expect("config");
        assert_eq!(config.runner.addr, "127.0.0.1:18407");
        assert_eq!(config.poll_delay(), Duration::from_secs(3));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.log_lines(), 2000);
        assert_eq!(config.status_filter(), SuiteStatusFilter::Failed);
    }

    #[test]
    fn parses_view_overrides() {
        let config: ConsoleConfig = toml::from_str(
            "[runner]\n\
             addr = \"127.0.0.1:18407\"\n\
             poll_delay_secs = 5\n\
             request_timeout_secs = 10\n\
             \n\
             [view]\n\
             log_lines = 500\n\
             status_filter = \"all\"\n",
        )
        .expect("config");
        assert_eq!(config.poll_delay(), Duration::from_secs(5));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.log_lines(), 500);
        assert_eq!(config.status_filter(), SuiteStatusFilter::All);
    }

    #[test]
    fn rejects_zero_poll_delay() {
        let dir = std::env::temp_dir().join("jobdeck-config-test");
        std::fs::create_dir_all(&dir).expect("dir");
        let path = dir.join("zero-delay.toml");
        std::fs::write(
            &path,
            "[runner]\naddr = \"127.0.0.1:18407\"\npoll_delay_secs = 0\n",
        )
        .expect("write");
        let err = load_console_config(&path).expect_err("should reject");
        assert!(err.to_string().contains("poll_delay_secs"));
        std::fs::remove_file(&path).ok();
    }
}
