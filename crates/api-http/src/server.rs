//! HTTP Server
//!
//! Serves the router on TCP and stops on the shutdown token, letting
//! in-flight requests finish.

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use cfmid_core::application::ShutdownToken;

use crate::router::build_router;
use crate::state::AppState;

const DEFAULT_HTTP_HOST: &str = "0.0.0.0";
const DEFAULT_HTTP_PORT: u16 = 5001;

/// HTTP Server Configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HTTP_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
        }
    }
}

impl HttpServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Running server
pub struct ServerHandle {
    pub local_addr: SocketAddr,
    pub task: JoinHandle<std::io::Result<()>>,
}

/// HTTP Server
pub struct HttpServer {
    config: HttpServerConfig,
    state: AppState,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Bind and start serving in the background
    ///
    /// Port 0 picks a free port; see `ServerHandle::local_addr`.
    pub async fn start(self, shutdown: ShutdownToken) -> Result<ServerHandle, String> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| format!("Failed to bind {}: {}", addr, e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| format!("Failed to read local address: {}", e))?;

        info!(addr = %local_addr, "🚀 CFM-ID wrapper listening");

        let app = build_router(self.state);
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown.wait())
                .await
        });

        Ok(ServerHandle { local_addr, task })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpServerConfig::default();
        assert_eq!(config.addr(), "0.0.0.0:5001");
    }
}
