use axum::body::Body;
use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::Response;

/// Middleware для логирования HTTP запросов
///
/// Пишет в лог: длительность (ms), статус, метод, путь и Content-Length, если он известен.
/// Тело ответа не буферизуется, иначе поток событий отдавался бы только целиком.
pub async fn request_logger(req: Request<Body>, next: Next) -> Response {
    let start = std::time::Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();

    let response = next.run(req).await;

    let size = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let status = response.status().as_u16();
    let duration = start.elapsed();

    if response.status().is_success() {
        tracing::info!(
            "{:>5}ms | {:>8} | {} {:>6} {}",
            duration.as_millis(),
            size,
            status,
            method,
            uri.path()
        );
    } else {
        tracing::warn!(
            "{:>5}ms | {:>8} | {} {:>6} {}",
            duration.as_millis(),
            size,
            status,
            method,
            uri.path()
        );
    }

    response
}
