use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use toml::Value;
use voyage_core::config::{AppConfig, LoadOptions};

pub fn run(options: &LoadOptions) -> String {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value, env_keys) in effective_values(&config) {
        let source = field_source(
            key_path,
            env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(key_path, &value, source));
    }

    lines.join("\n")
}

type FieldRow = (&'static str, String, &'static [&'static str]);

fn effective_values(config: &AppConfig) -> Vec<FieldRow> {
    vec![
        row("database.url", config.database.url.clone(), &["VOYAGE_DATABASE_URL"]),
        row(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["VOYAGE_DATABASE_MAX_CONNECTIONS"],
        ),
        row(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["VOYAGE_DATABASE_TIMEOUT_SECS"],
        ),
        row(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["VOYAGE_SERVER_BIND_ADDRESS"],
        ),
        row("server.port", config.server.port.to_string(), &["VOYAGE_SERVER_PORT"]),
        row(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["VOYAGE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        row(
            "server.system_token",
            redact(config.server.system_token.is_some()),
            &["VOYAGE_SERVER_SYSTEM_TOKEN"],
        ),
        row(
            "workflow.sweep_interval_secs",
            config.workflow.sweep_interval_secs.to_string(),
            &["VOYAGE_WORKFLOW_SWEEP_INTERVAL_SECS"],
        ),
        row(
            "workflow.confirmation_prefix",
            config.workflow.confirmation_prefix.clone(),
            &["VOYAGE_WORKFLOW_CONFIRMATION_PREFIX"],
        ),
        row(
            "workflow.default_page_size",
            config.workflow.default_page_size.to_string(),
            &["VOYAGE_WORKFLOW_DEFAULT_PAGE_SIZE"],
        ),
        row(
            "workflow.max_page_size",
            config.workflow.max_page_size.to_string(),
            &["VOYAGE_WORKFLOW_MAX_PAGE_SIZE"],
        ),
        row(
            "logging.level",
            config.logging.level.clone(),
            &["VOYAGE_LOGGING_LEVEL", "VOYAGE_LOG_LEVEL"],
        ),
        row(
            "logging.format",
            config.logging.format.as_str().to_string(),
            &["VOYAGE_LOGGING_FORMAT", "VOYAGE_LOG_FORMAT"],
        ),
    ]
}

fn redact(is_set: bool) -> String {
    let shown = if is_set { "<redacted>" } else { "<unset>" };
    shown.to_string()
}

fn row(key_path: &'static str, value: String, env_keys: &'static [&'static str]) -> FieldRow {
    (key_path, value, env_keys)
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    [PathBuf::from("voyage.toml"), PathBuf::from("config/voyage.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use toml::Value;

    use super::{contains_path, field_source};

    #[test]
    fn file_source_requires_the_full_key_path() {
        let doc: Value = "[workflow]\nsweep_interval_secs = 60\n".parse().expect("toml");

        assert!(contains_path(&doc, "workflow.sweep_interval_secs"));
        assert!(!contains_path(&doc, "workflow.max_page_size"));
        assert_eq!(
            field_source(
                "workflow.sweep_interval_secs",
                &["VOYAGE_TEST_UNSET_SWEEP_KEY"],
                Some(&doc),
                Some(Path::new("voyage.toml")),
            ),
            "file (voyage.toml)"
        );
        assert_eq!(
            field_source(
                "workflow.max_page_size",
                &["VOYAGE_TEST_UNSET_PAGE_KEY"],
                Some(&doc),
                None,
            ),
            "default"
        );
    }
}
