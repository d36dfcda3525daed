//! Host plugin invocation protocol
//!
//! The host writes one JSON object to stdin:
//!
//! ```text
//! {"server_connection": {"Scheme": "http", "Host": "localhost", "Port": 9999,
//!                        "SessionCookie": {"Name": "session", "Value": "..."},
//!                        "PluginDir": "/plugins/ai_tagger"},
//!  "args": {"mode": "tag_images"}}
//! ```
//!
//! and expects `{"output": "ok"}` on stdout once the run completes.
//! Per-item failures never surface here, only in the log stream.

use crate::tagging::ProgressReporter;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Errors reading the invocation or writing the result.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to read plugin input: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed plugin input: {0}")]
    Json(#[from] serde_json::Error),
}

/// Session cookie issued by the host.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
}

/// Connection parameters for the media library plus the plugin's
/// working directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerConnection {
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub session_cookie: Option<SessionCookie>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub plugin_dir: Option<PathBuf>,
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    9999
}

impl ServerConnection {
    /// Connection to `url` (`scheme://host:port`) with an optional API key.
    pub fn from_url(url: &str, api_key: Option<String>) -> Self {
        let (scheme, rest) = url.split_once("://").unwrap_or(("http", url));
        let rest = rest.trim_end_matches('/');
        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => match port.parse() {
                Ok(port) => (host.to_string(), port),
                Err(_) => (rest.to_string(), default_port()),
            },
            None => (rest.to_string(), default_port()),
        };
        Self {
            scheme: scheme.to_string(),
            host,
            port,
            session_cookie: None,
            api_key,
            plugin_dir: None,
        }
    }

    /// GraphQL endpoint of the library. A wildcard bind address is
    /// replaced with `localhost`.
    pub fn graphql_url(&self) -> String {
        let host = if self.host == "0.0.0.0" {
            "localhost"
        } else {
            self.host.as_str()
        };
        format!("{}://{}:{}/graphql", self.scheme, host, self.port)
    }
}

/// Which tagging run the host requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginMode {
    TagImages,
    TagScenes,
    /// No (or an unknown) mode: connect, then report success.
    Idle,
}

#[derive(Debug, Default, Deserialize)]
struct PluginArgs {
    #[serde(default)]
    mode: Option<String>,
}

/// One invocation read from stdin.
#[derive(Debug, Deserialize)]
pub struct PluginInput {
    pub server_connection: ServerConnection,
    #[serde(default)]
    args: PluginArgs,
}

impl PluginInput {
    pub fn mode(&self) -> PluginMode {
        match self.args.mode.as_deref() {
            Some("tag_images") => PluginMode::TagImages,
            Some("tag_scenes") => PluginMode::TagScenes,
            _ => PluginMode::Idle,
        }
    }
}

/// Result written to stdout.
#[derive(Debug, Serialize)]
pub struct PluginOutput {
    pub output: &'static str,
}

impl PluginOutput {
    pub fn ok() -> Self {
        Self { output: "ok" }
    }
}

/// Read the whole invocation object.
pub fn read_input(mut reader: impl Read) -> Result<PluginInput, ProtocolError> {
    let mut raw = String::new();
    reader.read_to_string(&mut raw)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn write_output(mut writer: impl Write, output: &PluginOutput) -> Result<(), ProtocolError> {
    let encoded = serde_json::to_string(output)?;
    writeln!(writer, "{}", encoded)?;
    writer.flush()?;
    Ok(())
}

/// Reports progress to the host as `\x01p\x02<fraction>` lines on stderr.
#[derive(Debug, Default)]
pub struct HostProgress;

impl ProgressReporter for HostProgress {
    fn report(&self, progress: f64) {
        let mut stderr = std::io::stderr().lock();
        // A closed stderr means the host is gone; nothing useful to do.
        let _ = writeln!(stderr, "\x01p\x02{:.4}", progress);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_mode_and_connection() {
        let raw = r#"{
            "server_connection": {"Scheme": "https", "Host": "stash.local", "Port": 443,
                                  "SessionCookie": {"Name": "session", "Value": "v"},
                                  "PluginDir": "/plugins/ai"},
            "args": {"mode": "tag_scenes"}
        }"#;
        let input = read_input(raw.as_bytes()).unwrap();
        assert_eq!(input.mode(), PluginMode::TagScenes);
        assert_eq!(
            input.server_connection.graphql_url(),
            "https://stash.local:443/graphql"
        );
        assert_eq!(
            input.server_connection.plugin_dir,
            Some(PathBuf::from("/plugins/ai"))
        );
    }

    #[test]
    fn missing_or_unknown_mode_is_idle() {
        let input = read_input(r#"{"server_connection": {}}"#.as_bytes()).unwrap();
        assert_eq!(input.mode(), PluginMode::Idle);

        let input =
            read_input(r#"{"server_connection": {}, "args": {"mode": "other"}}"#.as_bytes())
                .unwrap();
        assert_eq!(input.mode(), PluginMode::Idle);
    }

    #[test]
    fn malformed_input_is_an_error() {
        assert!(matches!(
            read_input("not json".as_bytes()),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn output_is_single_ok_object() {
        let mut buf = Vec::new();
        write_output(&mut buf, &PluginOutput::ok()).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "{\"output\":\"ok\"}\n");
    }

    #[test]
    fn connection_from_url_splits_port() {
        let connection = ServerConnection::from_url("http://nas:9999/", Some("key".into()));
        assert_eq!(connection.graphql_url(), "http://nas:9999/graphql");
        assert_eq!(connection.api_key.as_deref(), Some("key"));

        let connection = ServerConnection::from_url("stash.local", None);
        assert_eq!(connection.graphql_url(), "http://stash.local:9999/graphql");
    }
}
