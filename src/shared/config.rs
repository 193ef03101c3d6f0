use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub reconciler: ReconcilerConfig,
    pub chat: ChatConfig,
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconcilerConfig {
    /// Total attempts for a transient failure, first try included.
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub write_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatConfig {
    pub max_message_length: usize,
    pub permalink_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    pub enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            reconciler: ReconcilerConfig::default(),
            chat: ChatConfig::default(),
            feed: FeedConfig { enabled: true },
        }
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            retry_backoff_ms: 250,
            write_timeout_ms: 10_000, // 10 seconds
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_length: 2000,
            permalink_base: "/clubs".to_string(),
        }
    }
}

impl ReconcilerConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意の参照関数から設定を組み立てる（テストでは環境変数を汚さずに済む）。
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(value) = lookup("FILMCLUB_MAX_ATTEMPTS").and_then(|v| parse_u64(&v)) {
            cfg.reconciler.max_attempts = value.clamp(1, u32::MAX as u64) as u32;
        }
        if let Some(value) = lookup("FILMCLUB_RETRY_BACKOFF_MS").and_then(|v| parse_u64(&v)) {
            cfg.reconciler.retry_backoff_ms = value;
        }
        if let Some(value) = lookup("FILMCLUB_WRITE_TIMEOUT_MS").and_then(|v| parse_u64(&v)) {
            cfg.reconciler.write_timeout_ms = value.max(1);
        }
        if let Some(value) = lookup("FILMCLUB_MAX_MESSAGE_LENGTH").and_then(|v| parse_u64(&v)) {
            cfg.chat.max_message_length = value.max(1) as usize;
        }
        if let Some(v) = lookup("FILMCLUB_PERMALINK_BASE") {
            let trimmed = v.trim().trim_end_matches('/');
            if !trimmed.is_empty() {
                cfg.chat.permalink_base = trimmed.to_string();
            }
        }
        if let Some(v) = lookup("FILMCLUB_ENABLE_FEED") {
            cfg.feed.enabled = parse_bool(&v, cfg.feed.enabled);
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.reconciler.max_attempts == 0 {
            return Err("Reconciler max_attempts must be greater than 0".to_string());
        }
        if self.reconciler.write_timeout_ms == 0 {
            return Err("Reconciler write_timeout_ms must be greater than 0".to_string());
        }
        if self.chat.max_message_length == 0 {
            return Err("Chat max_message_length must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}
