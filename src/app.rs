use std::net::SocketAddr;

use axum::{extract::DefaultBodyLimit, Router};
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::register;
use crate::state::AppState;

/// `/`, `/success` and `/error` plus everything else in the pages directory.
fn page_routes(config: &AppConfig) -> Router<AppState> {
    let dir = &config.pages_dir;
    Router::new()
        .route_service("/", ServeFile::new(dir.join("index.html")))
        .route_service("/success", ServeFile::new(dir.join("success.html")))
        .route_service("/error", ServeFile::new(dir.join("error.html")))
        .fallback_service(ServeDir::new(dir))
}

pub fn build_app(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .merge(register::router().layer(DefaultBodyLimit::max(body_limit)))
        .merge(page_routes(&state.config))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("server is listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod page_tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{register::repo::fake::MemoryUserStore, storage::fake::RecordingIntake};

    async fn app_with_pages() -> (Router, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("registration-pages-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        for page in ["index", "success", "error"] {
            tokio::fs::write(dir.join(format!("{page}.html")), format!("<h1>{page}</h1>"))
                .await
                .unwrap();
        }
        let mut config = (*AppState::test_config()).clone();
        config.pages_dir = dir.clone();
        let state = AppState::from_parts(
            Arc::new(config),
            Arc::new(MemoryUserStore::default()),
            Arc::new(RecordingIntake::default()),
        );
        (build_app(state), dir)
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
        let res = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn serves_the_three_pages() {
        let (app, dir) = app_with_pages().await;

        assert_eq!(get(&app, "/").await, (StatusCode::OK, "<h1>index</h1>".into()));
        assert_eq!(get(&app, "/success").await, (StatusCode::OK, "<h1>success</h1>".into()));
        assert_eq!(
            get(&app, "/error?message=userexists").await,
            (StatusCode::OK, "<h1>error</h1>".into())
        );
        assert_eq!(get(&app, "/missing.css").await.0, StatusCode::NOT_FOUND);

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
