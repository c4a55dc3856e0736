//! Server configuration: TOML file + CLI overrides.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use webtty_core::client::{DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, DEFAULT_ROWS};
use webtty_core::{
    ClientConfig, Profile, Profiles, Theme, ThemeKeyIssue, WebttyError, WebttyResult,
};

/// Port used when nothing else is configured.
pub const DEFAULT_PORT: u16 = 8080;
/// Port the default is remapped to when TLS is enabled.
pub const DEFAULT_TLS_PORT: u16 = 8443;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub terminal: TerminalSection,
    /// Name of the entry in `themes` to use.
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub themes: BTreeMap<String, Map<String, Value>>,
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

/// `[server]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub tls: bool,
    #[serde(default)]
    pub cert_file: Option<String>,
    #[serde(default)]
    pub key_file: Option<String>,
    #[serde(default)]
    pub no_auth: bool,
    #[serde(default)]
    pub no_browser: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            tls: false,
            cert_file: None,
            key_file: None,
            no_auth: false,
            no_browser: false,
        }
    }
}

/// `[terminal]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TerminalSection {
    #[serde(default = "default_rows")]
    pub rows: u16,
    #[serde(default)]
    pub columns: u16,
    #[serde(default = "default_true")]
    pub cursor_blink: bool,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default = "default_font_size")]
    pub font_size: u16,
}

impl Default for TerminalSection {
    fn default() -> Self {
        Self {
            rows: default_rows(),
            columns: 0,
            cursor_blink: true,
            font_family: default_font_family(),
            font_size: default_font_size(),
        }
    }
}

fn default_bind() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_rows() -> u16 {
    DEFAULT_ROWS
}
fn default_font_family() -> String {
    DEFAULT_FONT_FAMILY.to_string()
}
fn default_font_size() -> u16 {
    DEFAULT_FONT_SIZE
}
fn default_true() -> bool {
    true
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub rows: Option<u16>,
    pub columns: Option<u16>,
    pub cursor_blink: Option<bool>,
    pub font_family: Option<String>,
    pub font_size: Option<u16>,
    pub tls: bool,
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
    pub no_auth: bool,
    pub no_browser: bool,
}

/// TLS material for the listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSettings {
    pub enabled: bool,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Resolved listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_host: String,
    pub port: u16,
    pub auth_disabled: bool,
    pub open_browser: bool,
    pub tls: TlsSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: default_bind(),
            port: DEFAULT_PORT,
            auth_disabled: false,
            open_browser: true,
            tls: TlsSettings {
                enabled: false,
                cert_path: PathBuf::new(),
                key_path: PathBuf::new(),
            },
        }
    }
}

impl ServerConfig {
    /// `host:port` the listener binds to.
    pub fn addr(&self) -> String {
        if self.bind_host.contains(':') {
            format!("[{}]:{}", self.bind_host, self.port)
        } else {
            format!("{}:{}", self.bind_host, self.port)
        }
    }

    /// Host name a browser should use to reach the listener.
    pub fn advertised_host(&self) -> &str {
        match self.bind_host.as_str() {
            "" | "0.0.0.0" | "::" => "localhost",
            host => host,
        }
    }

    pub fn scheme(&self) -> &'static str {
        if self.tls.enabled {
            "https"
        } else {
            "http"
        }
    }

    /// URL the operator opens, carrying the access token and, for anything
    /// but the default profile, the profile name.
    pub fn browse_url(&self, token: Option<&str>, profile: Option<&str>) -> String {
        let host = self.advertised_host();
        let host = if host.contains(':') {
            format!("[{host}]")
        } else {
            host.to_string()
        };
        let mut params = Vec::new();
        if let Some(token) = token {
            params.push(format!("token={token}"));
        }
        if let Some(profile) = profile {
            params.push(format!("profile={}", urlencoding::encode(profile)));
        }
        let query = if params.is_empty() {
            String::new()
        } else {
            format!("?{}", params.join("&"))
        };
        format!("{}://{}:{}/{}", self.scheme(), host, self.port, query)
    }
}

/// Everything the server needs from configuration.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub profiles: Profiles,
}

impl Settings {
    /// Load config from a TOML file, then apply CLI overrides.
    ///
    /// With no explicit path the standard locations are searched; a missing
    /// file means defaults.
    pub fn load(config_path: Option<&Path>, cli: &CliOverrides) -> WebttyResult<Self> {
        let path = match config_path {
            Some(path) => Some(expand_tilde(path)),
            None => default_config_paths().into_iter().find(|p| p.exists()),
        };

        let file = match path {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "loading config file");
                let content = std::fs::read_to_string(&path)?;
                toml::from_str::<ConfigFile>(&content)
                    .map_err(|e| WebttyError::Config(format!("config parse error: {e}")))?
            }
            Some(path) => {
                info!(path = %path.display(), "config file not found, using defaults");
                ConfigFile::default()
            }
            None => ConfigFile::default(),
        };

        Self::from_file(file, cli)
    }

    /// Merge a parsed config file with CLI overrides.
    pub fn from_file(file: ConfigFile, cli: &CliOverrides) -> WebttyResult<Self> {
        let tls_enabled = cli.tls || file.server.tls;
        let mut port = cli.port.unwrap_or(file.server.port);
        if tls_enabled && port == DEFAULT_PORT {
            port = DEFAULT_TLS_PORT;
        }

        let cert = cli.cert_file.clone().or(file.server.cert_file);
        let key = cli.key_file.clone().or(file.server.key_file);
        let tls = match (tls_enabled, cert, key) {
            (false, cert, key) => TlsSettings {
                enabled: false,
                cert_path: cert.map(|c| expand_tilde_str(&c)).unwrap_or_default(),
                key_path: key.map(|k| expand_tilde_str(&k)).unwrap_or_default(),
            },
            (true, Some(cert), Some(key)) => TlsSettings {
                enabled: true,
                cert_path: expand_tilde_str(&cert),
                key_path: expand_tilde_str(&key),
            },
            (true, _, _) => {
                return Err(WebttyError::Config(
                    "TLS requires both cert-file and key-file".into(),
                ))
            }
        };

        let server = ServerConfig {
            bind_host: cli.bind.clone().unwrap_or(file.server.bind),
            port,
            auth_disabled: cli.no_auth || file.server.no_auth,
            open_browser: !(cli.no_browser || file.server.no_browser),
            tls,
        };

        let mut theme = Theme::default();
        if let Some(name) = &file.theme {
            let table = file
                .themes
                .get(name)
                .ok_or_else(|| WebttyError::Config(format!("cannot find theme {name}")))?;
            for issue in theme.apply_map(table) {
                match issue {
                    ThemeKeyIssue::UnknownKey(key) => {
                        warn!(theme = %name, key = %key, "ignoring unknown theme key")
                    }
                    ThemeKeyIssue::NotAString(key) => {
                        warn!(theme = %name, key = %key, "ignoring non-string theme value")
                    }
                }
            }
            if theme.is_empty() {
                warn!(theme = %name, "theme sets no colors");
            }
        }

        let terminal = file.terminal;
        let client = ClientConfig {
            rows: cli.rows.unwrap_or(terminal.rows),
            columns: cli.columns.unwrap_or(terminal.columns),
            cursor_blink: cli.cursor_blink.unwrap_or(terminal.cursor_blink),
            font_family: cli.font_family.clone().unwrap_or(terminal.font_family),
            font_size: cli.font_size.unwrap_or(terminal.font_size),
            theme,
        };

        let mut profiles = Profiles::default();
        for (name, mut profile) in file.profiles {
            profile.name = name;
            profiles.insert(profile);
        }

        Ok(Self {
            server,
            client,
            profiles,
        })
    }
}

fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config").join("webtty").join("conf.toml"));
    }
    paths.push(PathBuf::from("/etc/webtty/conf.toml"));
    paths
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    expand_tilde_str(&s)
}

pub(crate) fn expand_tilde_str(s: &str) -> PathBuf {
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(s)
}
