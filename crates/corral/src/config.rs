// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use clap::Parser;

/// Control-plane daemon for interactive AI coding-agent sessions.
#[derive(Debug, Clone, Parser)]
#[command(name = "corrald", version, about)]
pub struct Config {
    /// Host address to bind to.
    #[arg(long, env = "CORRAL_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// HTTP port to listen on.
    #[arg(long, env = "CORRAL_PORT", default_value = "4020")]
    pub port: u16,

    /// Screen sampling interval in milliseconds.
    #[arg(long, env = "CORRAL_SAMPLE_MS", default_value = "100")]
    pub sample_ms: u64,

    /// Dwell time in milliseconds a candidate state must hold before commit.
    #[arg(long, env = "CORRAL_DWELL_MS", default_value = "500")]
    pub dwell_ms: u64,

    /// Output history cap in bytes per session.
    #[arg(long, env = "CORRAL_HISTORY_CAP", default_value = "1048576")]
    pub history_cap: usize,

    /// Enable auto-approval of prompts the verifier judges safe.
    #[arg(long, env = "CORRAL_AUTO_APPROVE")]
    pub auto_approve: bool,

    /// Verifier judge endpoint URL (required when auto-approval is enabled).
    #[arg(long, env = "CORRAL_VERIFIER_URL")]
    pub verifier_url: Option<String>,

    /// Verifier budget in seconds; expiry is treated as needs-human.
    #[arg(long, env = "CORRAL_VERIFIER_TIMEOUT", default_value = "30")]
    pub verifier_timeout: u64,

    /// Grace window in milliseconds between SIGTERM and SIGKILL on stop.
    #[arg(long, env = "CORRAL_STOP_GRACE_MS", default_value = "3000")]
    pub stop_grace_ms: u64,

    /// Log format (json or text).
    #[arg(long, env = "CORRAL_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "CORRAL_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sample_ms == 0 {
            anyhow::bail!("--sample-ms must be positive");
        }
        if self.dwell_ms < self.sample_ms {
            anyhow::bail!("--dwell-ms must be at least --sample-ms");
        }
        if self.history_cap == 0 {
            anyhow::bail!("--history-cap must be positive");
        }
        if self.auto_approve && self.verifier_url.is_none() {
            anyhow::bail!("--auto-approve requires --verifier-url");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        Ok(())
    }

    /// Core timing/limit settings, split out so tests can build them directly.
    pub fn core(&self) -> CoreConfig {
        CoreConfig {
            sample: Duration::from_millis(self.sample_ms),
            dwell: Duration::from_millis(self.dwell_ms),
            history_cap: self.history_cap,
            stop_grace: Duration::from_millis(self.stop_grace_ms),
            auto_approve: self.auto_approve,
            verifier_timeout: Duration::from_secs(self.verifier_timeout),
        }
    }
}

/// Settings consumed by the supervisor and its per-session tasks.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub sample: Duration,
    pub dwell: Duration,
    pub history_cap: usize,
    pub stop_grace: Duration,
    pub auto_approve: bool,
    pub verifier_timeout: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            sample: Duration::from_millis(100),
            dwell: Duration::from_millis(500),
            history_cap: 1024 * 1024,
            stop_grace: Duration::from_millis(3000),
            auto_approve: false,
            verifier_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
