//! webtty: serve a local shell to the browser.
//!
//! Renders a terminal page, accepts one WebSocket per tab and relays it to
//! a freshly spawned pty. Every request must carry the per-run token.

mod auth;
mod config;
mod geometry;
mod page;
mod server;
mod session;

use anyhow::Context;
use clap::Parser;
use config::{CliOverrides, ServerConfig, Settings};
use server::WebttyServer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use webtty_core::{AccessToken, Profiles};

/// webtty: a shell in your browser
#[derive(Parser, Debug)]
#[command(name = "webtty", version, about = "Serve a local shell to the browser")]
struct Cli {
    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Host or address to bind
    #[arg(short, long)]
    bind: Option<String>,

    /// Terminal rows
    #[arg(long)]
    rows: Option<u16>,

    /// Terminal columns (0 fits the window)
    #[arg(long)]
    columns: Option<u16>,

    /// Blink the cursor
    #[arg(long)]
    cursor_blink: Option<bool>,

    /// Terminal font family
    #[arg(long)]
    font_family: Option<String>,

    /// Terminal font size
    #[arg(long)]
    font_size: Option<u16>,

    /// Serve over TLS
    #[arg(long)]
    tls: bool,

    /// TLS certificate (PEM)
    #[arg(long)]
    cert_file: Option<String>,

    /// TLS private key (PEM)
    #[arg(long)]
    key_file: Option<String>,

    /// Generate a self-signed certificate and serve over TLS with it
    #[arg(long)]
    generate_cert: bool,

    /// Disable the access token
    #[arg(long)]
    no_auth: bool,

    /// Do not open a browser on startup
    #[arg(long)]
    no_browser: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    use tracing_subscriber::EnvFilter;
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting webtty");

    let mut overrides = CliOverrides {
        bind: cli.bind,
        port: cli.port,
        rows: cli.rows,
        columns: cli.columns,
        cursor_blink: cli.cursor_blink,
        font_family: cli.font_family,
        font_size: cli.font_size,
        tls: cli.tls,
        cert_file: cli.cert_file,
        key_file: cli.key_file,
        no_auth: cli.no_auth,
        no_browser: cli.no_browser,
    };

    if cli.generate_cert {
        match generate_self_signed_cert() {
            Ok((cert, key)) => {
                info!(
                    cert = %cert.display(),
                    key = %key.display(),
                    "generated self-signed certificate"
                );
                overrides.tls = true;
                overrides.cert_file = Some(cert.to_string_lossy().into_owned());
                overrides.key_file = Some(key.to_string_lossy().into_owned());
            }
            Err(e) => {
                error!(error = %e, "failed to generate self-signed certificate");
                std::process::exit(1);
            }
        }
    }

    let settings = match Settings::load(cli.config.as_deref(), &overrides) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    let tls_config = if settings.server.tls.enabled {
        match load_tls_config(&settings.server.tls.cert_path, &settings.server.tls.key_path) {
            Ok(cfg) => Some(Arc::new(cfg)),
            Err(e) => {
                error!(error = %e, "failed to load TLS config");
                std::process::exit(1);
            }
        }
    } else {
        None
    };

    let token = match AccessToken::generate(settings.server.auth_disabled) {
        Ok(token) => token,
        Err(e) => {
            error!(error = %e, "failed to generate access token");
            std::process::exit(1);
        }
    };
    if token.secret().is_none() {
        warn!("access token disabled, anyone who can reach the port gets a shell");
    }

    let urls = startup_urls(&settings.server, &token, &settings.profiles);
    for url in &urls {
        println!("{url}");
    }
    if settings.server.open_browser {
        if let Some(url) = urls.first() {
            if let Err(e) = open::that(url) {
                warn!(error = %e, "failed to open browser");
            }
        }
    }

    let webtty = Arc::new(WebttyServer::new(settings, token));

    tokio::select! {
        result = webtty.run(tls_config) => {
            if let Err(e) = result {
                error!(error = %e, "server error");
                std::process::exit(1);
            }
        }
        _ = shutdown_signal() => {
            info!("received shutdown signal");
        }
    }

    info!("webtty stopped");
}

/// The main browse URL followed by one URL per extra profile.
fn startup_urls(server: &ServerConfig, token: &AccessToken, profiles: &Profiles) -> Vec<String> {
    let mut urls = vec![server.browse_url(token.secret(), None)];
    urls.extend(
        profiles
            .extra_names()
            .map(|name| server.browse_url(token.secret(), Some(name))),
    );
    urls
}

/// Load TLS certificate and key from PEM files, returning a rustls ServerConfig.
fn load_tls_config(cert_path: &Path, key_path: &Path) -> anyhow::Result<rustls::ServerConfig> {
    let cert_pem = std::fs::read(cert_path)
        .with_context(|| format!("cannot read cert {}", cert_path.display()))?;
    let key_pem = std::fs::read(key_path)
        .with_context(|| format!("cannot read key {}", key_path.display()))?;

    let certs: Vec<rustls::pki_types::CertificateDer<'static>> =
        rustls_pemfile::certs(&mut &cert_pem[..])
            .collect::<Result<Vec<_>, _>>()
            .context("invalid certificate PEM")?;

    let key = rustls_pemfile::private_key(&mut &key_pem[..])
        .context("invalid key PEM")?
        .context("no private key found in PEM")?;

    let mut tls_config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .context("unsupported TLS protocol versions")?
    .with_no_client_auth()
    .with_single_cert(certs, key)
    .context("certificate and key do not match")?;

    tls_config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(tls_config)
}

/// Generate a self-signed certificate for development use.
fn generate_self_signed_cert() -> anyhow::Result<(PathBuf, PathBuf)> {
    let dir = dirs::home_dir()
        .context("cannot determine home directory")?
        .join(".webtty");
    std::fs::create_dir_all(&dir)?;

    let cert_path = dir.join("cert.pem");
    let key_path = dir.join("key.pem");

    let mut params = rcgen::CertificateParams::new(vec![
        "localhost".to_string(),
        "127.0.0.1".to_string(),
        "::1".to_string(),
    ])?;
    params.distinguished_name = rcgen::DistinguishedName::new();
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, "webtty dev cert");

    let key_pair = rcgen::KeyPair::generate()?;
    let cert = params.self_signed(&key_pair)?;

    std::fs::write(&cert_path, cert.pem())?;
    std::fs::write(&key_path, key_pair.serialize_pem())?;

    Ok((cert_path, key_path))
}

/// Wait for SIGTERM or SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webtty_core::Profile;

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "webtty",
            "--port",
            "9000",
            "--cursor-blink",
            "false",
            "--no-auth",
            "--font-family",
            "Fira Code",
        ])
        .unwrap();
        assert_eq!(cli.port, Some(9000));
        assert_eq!(cli.cursor_blink, Some(false));
        assert!(cli.no_auth);
        assert!(!cli.tls);
        assert_eq!(cli.font_family.as_deref(), Some("Fira Code"));
    }

    #[test]
    fn urls_list_profiles_sorted() {
        let mut profiles = Profiles::default();
        profiles.insert(Profile::named("zeta"));
        profiles.insert(Profile::named("alpha"));
        let urls = startup_urls(
            &ServerConfig::default(),
            &AccessToken::fixed("tok"),
            &profiles,
        );
        assert_eq!(
            urls,
            vec![
                "http://localhost:8080/?token=tok",
                "http://localhost:8080/?token=tok&profile=alpha",
                "http://localhost:8080/?token=tok&profile=zeta",
            ]
        );
    }

    #[test]
    fn urls_without_auth_have_no_token() {
        let urls = startup_urls(
            &ServerConfig::default(),
            &AccessToken::disabled(),
            &Profiles::default(),
        );
        assert_eq!(urls, vec!["http://localhost:8080/"]);
    }

    #[test]
    fn tls_config_from_generated_material() {
        let dir = tempfile::tempdir().unwrap();
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let cert = rcgen::CertificateParams::new(vec!["localhost".to_string()])
            .unwrap()
            .self_signed(&key_pair)
            .unwrap();
        let cert_path = dir.path().join("cert.pem");
        let key_path = dir.path().join("key.pem");
        std::fs::write(&cert_path, cert.pem()).unwrap();
        std::fs::write(&key_path, key_pair.serialize_pem()).unwrap();

        let config = load_tls_config(&cert_path, &key_path).unwrap();
        assert_eq!(config.alpn_protocols, vec![b"http/1.1".to_vec()]);

        assert!(load_tls_config(&cert_path, &cert_path).is_err());
        assert!(load_tls_config(&dir.path().join("missing.pem"), &key_path).is_err());
    }
}
