//! Dashboard Web Server
//!
//! HTTP server for the results dashboard: aggregated summaries, PDF and
//! ZIP exports, thumbnail serving and static evidence files.

pub mod api;

use anyhow::Result;
use axum::{
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::report::FontConfig;
use crate::thumbnails::ThumbnailCache;

use api::AppState;

/// Dashboard server configuration
pub struct ServerConfig {
    pub port: u16,
    pub results_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            results_dir: PathBuf::from("results"),
        }
    }
}

/// Main dashboard server
pub struct DashboardServer {
    config: ServerConfig,
}

impl DashboardServer {
    /// Create a new dashboard server
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Start the server
    pub async fn start(&self) -> Result<()> {
        let fonts = FontConfig::detect();
        let font_desc = fonts.describe().to_string();

        let state = Arc::new(AppState {
            results_root: self.config.results_dir.clone(),
            fonts,
            thumbnails: ThumbnailCache::standard(),
        });

        let app = Router::new()
            .route("/", get(serve_index))
            .merge(api::api_router())
            .nest_service("/results", ServeDir::new(&self.config.results_dir))
            .layer(CorsLayer::permissive())
            .with_state(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));

        println!("\n🚀 Test Dashboard started!");
        println!("   Open: http://localhost:{}", self.config.port);
        println!("   Results: {}", self.config.results_dir.display());
        println!("   Report fonts: {}", font_desc);
        println!("\n   Press Ctrl+C to stop.\n");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app.into_make_service()).await?;

        Ok(())
    }
}

/// Serve the dashboard landing page
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("ui/dashboard.html"))
}
