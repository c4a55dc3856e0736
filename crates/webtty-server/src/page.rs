//! Renders the single HTML page that hosts the browser terminal.

use crate::config::ServerConfig;
use serde::Serialize;
use webtty_core::ClientConfig;

const TEMPLATE: &str = include_str!("../assets/index.html");

/// Title used when the profile has none.
pub const DEFAULT_TITLE: &str = "webtty";

/// Settings handed to the page script.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageConfig<'a> {
    host: &'a str,
    port: u16,
    tls: bool,
    /// Size the terminal to the browser window instead of a fixed width.
    fit_window: bool,
    #[serde(flatten)]
    client: &'a ClientConfig,
}

/// Render the terminal page for a profile titled `title`.
pub fn render(client: &ClientConfig, server: &ServerConfig, title: &str) -> String {
    let page_config = PageConfig {
        host: server.advertised_host(),
        port: server.port,
        tls: server.tls.enabled,
        fit_window: client.fits_window(),
        client,
    };
    // Serializing plain strings and integers cannot fail.
    let json = serde_json::to_string(&page_config).unwrap_or_else(|_| "{}".to_string());

    let title = if title.is_empty() { DEFAULT_TITLE } else { title };
    fill(TEMPLATE, &escape_html(title), &escape_script_json(&json))
}

/// Replace `{{title}}` and `{{config}}` in one pass so substituted text is
/// never rescanned.
fn fill(template: &str, title: &str, config: &str) -> String {
    let mut out = String::with_capacity(template.len() + title.len() + config.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                match &after[..end] {
                    "title" => out.push_str(title),
                    "config" => out.push_str(config),
                    other => {
                        out.push_str("{{");
                        out.push_str(other);
                        out.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Keep JSON from closing the surrounding `<script>` element.
fn escape_script_json(json: &str) -> String {
    json.replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}
