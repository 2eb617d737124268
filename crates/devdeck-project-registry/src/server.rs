//! Control-plane server: the API routes, the static UI and CORS on one listener.

use crate::api::{create_router, AppState};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tracing::info;

pub struct ControlPlaneServer {
    router: Router,
}

impl ControlPlaneServer {
    /// Build the server; every path outside `/api` is served from `static_dir`
    /// with `index.html` as the fallback for client-side routes.
    pub fn new(state: AppState, static_dir: impl AsRef<Path>) -> Self {
        let static_dir = static_dir.as_ref();
        let ui = ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

        let router = create_router(state)
            .fallback_service(ui)
            .layer(CorsLayer::permissive());

        Self { router }
    }

    /// Bind `addr` and serve until `shutdown` resolves.
    pub async fn run<F>(self, addr: &str, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("Binding to TCP: {}", addr);
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local: SocketAddr = listener.local_addr()?;
        info!("Server listening on {}", local);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Server on {} stopped", local);
        Ok(())
    }
}
