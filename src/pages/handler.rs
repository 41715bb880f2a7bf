use axum::{
    extract::{Path, Query},
    http::{header::ACCEPT_LANGUAGE, HeaderMap},
    response::{Html, IntoResponse},
};

use crate::{
    error::AppError,
    pages::{find_page, page_response, page_summaries, render_html, Lang, LangQuery},
    response::ApiResponse,
};

/// Explicit `?lang=` wins, then `Accept-Language`, then German.
fn resolve_lang(query: &LangQuery, headers: &HeaderMap) -> Lang {
    query
        .lang
        .or_else(|| {
            headers
                .get(ACCEPT_LANGUAGE)
                .and_then(|v| v.to_str().ok())
                .and_then(Lang::from_accept_language)
        })
        .unwrap_or_default()
}

/// GET /api/pages
pub async fn list_pages(Query(query): Query<LangQuery>, headers: HeaderMap) -> impl IntoResponse {
    let lang = resolve_lang(&query, &headers);
    ApiResponse::success(page_summaries(lang))
}

/// GET /api/pages/:slug
pub async fn get_page(
    Path(slug): Path<String>,
    Query(query): Query<LangQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let page = find_page(&slug).ok_or(AppError::NotFound("Page not found".to_string()))?;
    let lang = resolve_lang(&query, &headers);

    Ok(ApiResponse::success(page_response(page, lang)))
}

/// GET /legal/:slug
pub async fn legal_html(
    Path(slug): Path<String>,
    Query(query): Query<LangQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let page = find_page(&slug).ok_or(AppError::NotFound("Page not found".to_string()))?;
    let lang = resolve_lang(&query, &headers);

    Ok(Html(render_html(page, lang)))
}
