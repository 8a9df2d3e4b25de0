//! Application configuration for Curator.
//!
//! User config lives at `~/.curator/curator.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CuratorError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "curator.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".curator";

// ---------------------------------------------------------------------------
// Config structs (matching curator.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where and how archived documents are persisted.
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Page fetching and extraction.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Rewrite service settings.
    #[serde(default)]
    pub rewrite: RewriteConfig,
}

/// `[archive]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Root directory holding the index database, files and journal.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Index collection the documents are written to.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Flat-file archive directory, relative to `data_dir` unless absolute.
    #[serde(default = "default_files_dir")]
    pub files_dir: String,

    /// Extension given to archived files.
    #[serde(default = "default_file_extension")]
    pub file_extension: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            collection: default_collection(),
            files_dir: default_files_dir(),
            file_extension: default_file_extension(),
        }
    }
}

fn default_data_dir() -> String {
    "~/.curator/data".into()
}
fn default_collection() -> String {
    "sanitized_chapters".into()
}
fn default_files_dir() -> String {
    "archive".into()
}
fn default_file_extension() -> String {
    "txt".into()
}

impl ArchiveConfig {
    /// Resolved data directory (`~` expanded).
    pub fn data_path(&self) -> Result<PathBuf> {
        expand_home(&self.data_dir)
    }

    /// Path of the libSQL index database.
    pub fn index_path(&self) -> Result<PathBuf> {
        Ok(self.data_path()?.join("index.db"))
    }

    /// Root of the flat-file archive.
    pub fn files_path(&self) -> Result<PathBuf> {
        let files = expand_home(&self.files_dir)?;
        if files.is_absolute() {
            Ok(files)
        } else {
            Ok(self.data_path()?.join(files))
        }
    }

    /// Directory of write-ahead pending-archive entries.
    pub fn journal_path(&self) -> Result<PathBuf> {
        Ok(self.data_path()?.join("pending"))
    }
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// CSS selector for the document title.
    #[serde(default = "default_title_selector")]
    pub title_selector: String,

    /// CSS selector for the region holding the body paragraphs.
    #[serde(default = "default_content_selector")]
    pub content_selector: String,

    /// CSS selector for paragraphs inside the content region.
    #[serde(default = "default_paragraph_selector")]
    pub paragraph_selector: String,

    /// Request timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// Where to drop a local `{title}.txt` copy of each fetch. Disabled when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<String>,

    /// Permit loopback/private hosts (SSRF guard off).
    #[serde(default)]
    pub allow_private_hosts: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            title_selector: default_title_selector(),
            content_selector: default_content_selector(),
            paragraph_selector: default_paragraph_selector(),
            timeout_secs: default_fetch_timeout(),
            export_dir: None,
            allow_private_hosts: false,
        }
    }
}

fn default_title_selector() -> String {
    "#firstHeading".into()
}
fn default_content_selector() -> String {
    "#mw-content-text .mw-parser-output".into()
}
fn default_paragraph_selector() -> String {
    "p".into()
}
fn default_fetch_timeout() -> u64 {
    30
}

impl FetchConfig {
    /// Resolved export directory, if the local copy is enabled.
    pub fn export_path(&self) -> Result<Option<PathBuf>> {
        self.export_dir.as_deref().map(expand_home).transpose()
    }
}

/// `[rewrite]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the OpenAI-compatible chat completions API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used for rewrites.
    #[serde(default = "default_model")]
    pub model: String,

    /// Request timeout in seconds.
    #[serde(default = "default_rewrite_timeout")]
    pub timeout_secs: u64,

    /// Instruction applied when the operator gives none.
    #[serde(default = "default_instruction")]
    pub default_instruction: String,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_rewrite_timeout(),
            default_instruction: default_instruction(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "google/gemini-2.5-flash-lite".into()
}
fn default_rewrite_timeout() -> u64 {
    120
}
fn default_instruction() -> String {
    "Clean and sanitize the chapter.".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.curator/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| CuratorError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.curator/curator.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CuratorError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| CuratorError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CuratorError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CuratorError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CuratorError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the rewrite API key from the configured env var.
pub fn resolve_api_key(config: &RewriteConfig) -> Result<String> {
    let var_name = &config.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(CuratorError::config(format!(
            "rewrite API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    if path == "~" {
        return dirs::home_dir()
            .ok_or_else(|| CuratorError::config("could not determine home directory"));
    }
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| CuratorError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("sanitized_chapters"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
        assert!(!toml_str.contains("export_dir"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.fetch.title_selector, "#firstHeading");
        assert_eq!(parsed.rewrite.timeout_secs, 120);
        assert_eq!(parsed.archive.file_extension, "txt");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[archive]
data_dir = "/tmp/curator"

[fetch]
export_dir = "/tmp/exports"
allow_private_hosts = true
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.archive.collection, "sanitized_chapters");
        assert_eq!(
            config.archive.index_path().unwrap(),
            PathBuf::from("/tmp/curator/index.db")
        );
        assert_eq!(
            config.archive.files_path().unwrap(),
            PathBuf::from("/tmp/curator/archive")
        );
        assert_eq!(
            config.fetch.export_path().unwrap(),
            Some(PathBuf::from("/tmp/exports"))
        );
        assert!(config.fetch.allow_private_hosts);
        assert_eq!(
            config.rewrite.default_instruction,
            "Clean and sanitize the chapter."
        );
    }

    #[test]
    fn absolute_files_dir_is_kept() {
        let config = ArchiveConfig {
            data_dir: "/srv/curator".into(),
            files_dir: "/mnt/archive".into(),
            ..Default::default()
        };
        assert_eq!(config.files_path().unwrap(), PathBuf::from("/mnt/archive"));
        assert_eq!(
            config.journal_path().unwrap(),
            PathBuf::from("/srv/curator/pending")
        );
    }

    #[test]
    fn load_config_from_file() {
        let path = std::env::temp_dir().join(format!("curator_cfg_{}.toml", uuid::Uuid::now_v7()));
        std::fs::write(&path, "[rewrite]\nmodel = \"test/model\"\n").unwrap();
        let config = load_config_from(&path).expect("load");
        assert_eq!(config.rewrite.model, "test/model");
        let _ = std::fs::remove_file(&path);

        std::fs::write(&path, "not = [valid").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn api_key_resolution() {
        let config = RewriteConfig {
            // Unique env var name so other tests are unaffected
            api_key_env: "CURATOR_TEST_NONEXISTENT_KEY_12345".into(),
            ..Default::default()
        };
        let result = resolve_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }

    #[test]
    fn expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("/a/b").unwrap(), PathBuf::from("/a/b"));
        assert_eq!(expand_home("rel").unwrap(), PathBuf::from("rel"));
    }
}
