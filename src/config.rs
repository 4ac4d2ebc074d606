//! Configuration helpers for the flowchat SDK

use std::env;

/// Environment variable overriding the endpoint base URL.
pub const BASE_URL_ENV: &str = "FLOWCHAT_BASE_URL";

/// Environment variable overriding the model name.
pub const MODEL_ENV: &str = "FLOWCHAT_MODEL";

/// Supported vendor presets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    IFlow,
    OpenAI,
    DeepSeek,
    Local,
}

impl Vendor {
    /// Get the default base URL for this vendor
    pub fn default_url(&self) -> &'static str {
        match self {
            Vendor::IFlow => "https://apis.iflow.cn/v1",
            Vendor::OpenAI => "https://api.openai.com/v1",
            Vendor::DeepSeek => "https://api.deepseek.com/v1",
            Vendor::Local => "http://localhost:1234/v1",
        }
    }

    /// Get the model used when nothing else is configured
    pub fn default_model(&self) -> &'static str {
        match self {
            Vendor::IFlow => "qwen3-max",
            Vendor::OpenAI => "gpt-4o-mini",
            Vendor::DeepSeek => "deepseek-chat",
            Vendor::Local => "local-model",
        }
    }

    /// Model family reported in model metadata
    pub fn default_family(&self) -> &'static str {
        match self {
            Vendor::IFlow => "TBStars",
            Vendor::OpenAI => "gpt-4o",
            Vendor::DeepSeek => "deepseek",
            Vendor::Local => "local",
        }
    }

    /// Name shown in model metadata and model ids
    pub fn display_name(&self) -> &'static str {
        match self {
            Vendor::IFlow => "iFlow",
            Vendor::OpenAI => "OpenAI",
            Vendor::DeepSeek => "DeepSeek",
            Vendor::Local => "Local",
        }
    }

    /// Parse a vendor from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "iflow" | "i-flow" => Some(Vendor::IFlow),
            "openai" => Some(Vendor::OpenAI),
            "deepseek" | "deep-seek" => Some(Vendor::DeepSeek),
            "local" | "localhost" => Some(Vendor::Local),
            _ => None,
        }
    }
}

/// Get the base URL from environment variable or vendor default
///
/// Priority:
/// 1. `FLOWCHAT_BASE_URL` environment variable
/// 2. Vendor default URL (if vendor is Some)
/// 3. fallback parameter
/// 4. iFlow default
///
/// # Examples
///
/// ```rust,no_run
/// use flowchat::{get_base_url, Vendor};
///
/// let url = get_base_url(Some(Vendor::DeepSeek), None);
/// let url = get_base_url(None, Some("http://localhost:1234/v1"));
/// ```
pub fn get_base_url(vendor: Option<Vendor>, fallback: Option<&str>) -> String {
    if let Ok(url) = env::var(BASE_URL_ENV) {
        return url;
    }

    if let Some(v) = vendor {
        return v.default_url().to_string();
    }

    fallback
        .unwrap_or(Vendor::IFlow.default_url())
        .to_string()
}

/// Get the model name from environment variable or fallback
///
/// Priority:
/// 1. `FLOWCHAT_MODEL` environment variable (if `prefer_env` is true)
/// 2. fallback parameter
///
/// # Examples
///
/// ```rust,no_run
/// use flowchat::get_model;
///
/// let model = get_model(Some("qwen3-max"), true);
/// ```
pub fn get_model(fallback: Option<&str>, prefer_env: bool) -> Option<String> {
    if prefer_env {
        if let Ok(model) = env::var(MODEL_ENV) {
            return Some(model);
        }
    }

    fallback.map(|s| s.to_string())
}
