//! Web server command.

use crate::cli::helpers::arrow;
use crate::config::Settings;

const DEFAULT_PORT: u16 = 3000;

/// Start the web server.
pub async fn cmd_serve(settings: Settings, bind: &str) -> anyhow::Result<()> {
    let addr = parse_bind_address(bind);

    println!("{} Starting genfriends at http://{}", arrow(), addr);
    println!("  Database: {}", settings.database_url());
    println!("  Press Ctrl+C to stop");

    crate::server::serve(settings, &addr).await
}

/// Parse a bind address that can be:
/// - Just a port: "3000" -> 127.0.0.1:3000
/// - Just a host: "0.0.0.0" -> 0.0.0.0:3000
/// - Host and port: "0.0.0.0:8080" -> 0.0.0.0:8080
fn parse_bind_address(bind: &str) -> String {
    if let Ok(port) = bind.parse::<u16>() {
        return format!("127.0.0.1:{}", port);
    }

    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if port_str.parse::<u16>().is_ok() {
            return format!("{}:{}", host, port_str);
        }
    }

    format!("{}:{}", bind, DEFAULT_PORT)
}
