//! Document API endpoints
//!
//! Thin JSON surface over the public `Document` operations. Every endpoint
//! takes the document `location` as a query parameter plus an optional
//! configuration `scope` and `reload` flag:
//!
//! ```text
//! GET    /api/v1/documents?location=…            summary
//! GET    /api/v1/documents/toc?location=…&id=…    logical structure
//! GET    /api/v1/documents/metadata?location=…   metadata (all nodes or &id=…)
//! GET    /api/v1/documents/titledata?location=…
//! GET    /api/v1/documents/page?location=…&label=…
//! GET    /api/v1/documents/fulltext?location=…&id=…
//! GET    /api/v1/documents/depth?location=…&id=…
//! DELETE /api/v1/documents/cache
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::document::{Document, LogicalNode};
use crate::error::AppError;
use crate::fetch::is_valid_location;
use crate::metadata::{resolve_title, MetadataRecord, ScopeId};
use crate::state::AppState;

/// Common query parameters
#[derive(Debug, Deserialize)]
pub struct DocumentQuery {
    #[serde(default)]
    pub location: String,
    /// Configuration scope (0 = document default)
    #[serde(default)]
    pub scope: ScopeId,
    /// Re-fetch and re-parse the source
    #[serde(default)]
    pub reload: bool,
    /// Logical or physical node ID
    pub id: Option<String>,
    /// Page order label
    pub label: Option<String>,
    /// Include subtrees (defaults to true)
    pub recursive: Option<bool>,
}

/// Document summary
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub location: String,
    pub format: &'static str,
    pub ready: bool,
    pub record_id: Option<String>,
    pub pid: ScopeId,
    pub root_id: u64,
    /// Title of the multi-volume work, `""` for standalone documents
    pub root_title: String,
    pub num_pages: usize,
    pub toplevel_id: String,
    pub title: Vec<String>,
    pub thumbnail: String,
    pub has_fulltext: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse {
    pub label: String,
    /// Matching page, or 1 when nothing matched
    pub page: usize,
    pub matched: bool,
    pub page_id: Option<String>,
}

#[derive(Serialize)]
pub struct DepthResponse {
    pub id: String,
    pub depth: usize,
}

#[derive(Serialize)]
pub struct FlushResponse {
    pub flushed: usize,
}

/// Create the document router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_summary))
        .route("/toc", get(get_toc))
        .route("/metadata", get(get_metadata))
        .route("/titledata", get(get_titledata))
        .route("/page", get(get_page))
        .route("/fulltext", get(get_full_text))
        .route("/depth", get(get_depth))
        .route("/cache", delete(flush_cache))
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, AppError> {
    value
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or(AppError::MissingParameter(name))
}

async fn load(state: &AppState, query: &DocumentQuery) -> Result<Arc<dyn Document>, AppError> {
    if query.location.is_empty() {
        return Err(AppError::MissingParameter("location"));
    }
    if !is_valid_location(&query.location, state.config().fetch.allow_file_locations) {
        return Err(AppError::InvalidLocation(query.location.clone()));
    }

    state
        .cache()
        .get_instance(&query.location, query.scope, query.reload)
        .await
        .ok_or_else(|| AppError::DocumentUnavailable(query.location.clone()))
}

/// Run facet building on the blocking pool
///
/// The first access to a structure or metadata facet walks the whole tree.
async fn blocking<T, F>(doc: Arc<dyn Document>, work: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&dyn Document) -> T + Send + 'static,
{
    tokio::task::spawn_blocking(move || work(doc.as_ref()))
        .await
        .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))
}

/// GET /api/v1/documents
async fn get_summary(
    State(state): State<AppState>,
    Query(query): Query<DocumentQuery>,
) -> Result<Json<DocumentSummary>, AppError> {
    let doc = load(&state, &query).await?;
    let root_id = doc.root_id(state.records());
    let root_title = if root_id == 0 {
        String::new()
    } else {
        resolve_title(state.records(), root_id, true)
    };

    let (scope, reload) = (query.scope, query.reload);
    let summary = blocking(doc, move |doc| DocumentSummary {
        location: doc.location().to_string(),
        format: doc.format().as_str(),
        ready: doc.is_ready(),
        record_id: doc.record_id().map(str::to_string),
        pid: doc.pid(),
        root_id,
        root_title,
        num_pages: doc.num_pages(),
        toplevel_id: doc.toplevel_id(),
        title: doc.get_titledata(scope).title().to_vec(),
        thumbnail: doc.thumbnail(reload),
        has_fulltext: doc.has_fulltext(),
    })
    .await?;
    Ok(Json(summary))
}

/// GET /api/v1/documents/toc
async fn get_toc(
    State(state): State<AppState>,
    Query(query): Query<DocumentQuery>,
) -> Result<Json<Vec<LogicalNode>>, AppError> {
    let doc = load(&state, &query).await?;
    let id = query.id.clone().unwrap_or_default();
    let recursive = query.recursive.unwrap_or(true);

    let node_id = id.clone();
    let nodes = blocking(doc, move |doc| doc.get_logical_structure(&node_id, recursive)).await?;
    if nodes.is_empty() && !id.is_empty() {
        return Err(AppError::NotFound(format!("logical node {}", id)));
    }
    Ok(Json(nodes))
}

/// GET /api/v1/documents/metadata
///
/// Metadata of one node with `id`, else of every node with a dmdSec.
async fn get_metadata(
    State(state): State<AppState>,
    Query(query): Query<DocumentQuery>,
) -> Result<Json<BTreeMap<String, MetadataRecord>>, AppError> {
    let doc = load(&state, &query).await?;
    let id = query.id.clone().filter(|id| !id.is_empty());
    let scope = query.scope;

    let records = blocking(doc, move |doc| match id {
        Some(id) => {
            let record = doc.get_metadata(&id, scope);
            BTreeMap::from([(id, record)])
        }
        None => doc.metadata_array(scope),
    })
    .await?;
    Ok(Json(records))
}

/// GET /api/v1/documents/titledata
async fn get_titledata(
    State(state): State<AppState>,
    Query(query): Query<DocumentQuery>,
) -> Result<Json<MetadataRecord>, AppError> {
    let doc = load(&state, &query).await?;
    let scope = query.scope;
    Ok(Json(blocking(doc, move |doc| doc.get_titledata(scope)).await?))
}

/// GET /api/v1/documents/page
async fn get_page(
    State(state): State<AppState>,
    Query(query): Query<DocumentQuery>,
) -> Result<Json<PageResponse>, AppError> {
    let label = required(&query.label, "label")?;
    let doc = load(&state, &query).await?;

    let label = label.to_string();
    let response = blocking(doc, move |doc| {
        let found = doc.find_physical_page(&label);
        let page = found.unwrap_or_else(|| doc.get_physical_page(&label));
        let page_id = doc.physical_structure().page_id(page).map(str::to_string);
        PageResponse {
            label,
            page,
            matched: found.is_some(),
            page_id,
        }
    })
    .await?;
    Ok(Json(response))
}

/// GET /api/v1/documents/fulltext
///
/// MiniOCR XML of one physical node.
async fn get_full_text(
    State(state): State<AppState>,
    Query(query): Query<DocumentQuery>,
) -> Result<Response, AppError> {
    let id = required(&query.id, "id")?;
    let doc = load(&state, &query).await?;

    let text = doc.get_full_text(id).await;
    if text.is_empty() {
        return Err(AppError::NotFound(format!("full text of {}", id)));
    }
    Ok(([(header::CONTENT_TYPE, "application/xml; charset=utf-8")], text).into_response())
}

/// GET /api/v1/documents/depth
async fn get_depth(
    State(state): State<AppState>,
    Query(query): Query<DocumentQuery>,
) -> Result<Json<DepthResponse>, AppError> {
    let id = required(&query.id, "id")?;
    let doc = load(&state, &query).await?;

    let node_id = id.to_string();
    let depth = blocking(doc, move |doc| doc.get_structure_depth(&node_id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("logical node {}", id)))?;
    Ok(Json(DepthResponse {
        id: id.to_string(),
        depth,
    }))
}

/// DELETE /api/v1/documents/cache
async fn flush_cache(State(state): State<AppState>) -> Json<FlushResponse> {
    let flushed = state.cache().len().await;
    state.cache().clear().await;
    tracing::info!("Flushed {} cached documents", flushed);
    Json(FlushResponse { flushed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::document::{CacheConfig, DocumentCache};
    use crate::fetch::MemoryFetcher;
    use crate::formats::mets::fixtures::{context_with, registry, ALTO_PAGE, RICH_METS};
    use crate::metadata::DocumentRecord;

    const LOCATION: &str = "https://digital.example/mets/chronik.xml";

    fn app(fetcher: Arc<MemoryFetcher>) -> Router {
        app_with_cache(DocumentCache::new(CacheConfig::default(), context_with(fetcher)))
    }

    fn app_with_cache(cache: DocumentCache) -> Router {
        let records = registry()
            .with_document(DocumentRecord {
                uid: 1,
                title: "Chronik".to_string(),
                part_of: 0,
            })
            .with_document(DocumentRecord {
                uid: 2,
                title: String::new(),
                part_of: 1,
            });
        cache_app(cache, Arc::new(records))
    }

    fn cache_app(cache: DocumentCache, records: Arc<dyn crate::metadata::RecordStore>) -> Router {
        crate::routes::router().with_state(AppState::new(Config::default(), cache, records))
    }

    fn fetcher() -> Arc<MemoryFetcher> {
        Arc::new(
            MemoryFetcher::new()
                .with_source(LOCATION, RICH_METS)
                .with_source("https://ocr.example/1.xml", ALTO_PAGE),
        )
    }

    async fn send(app: Router, method: Method, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let (status, body) = send(app, Method::GET, uri).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn uri(path: &str, params: &str) -> String {
        format!("/api/v1/documents{}?location={}{}", path, LOCATION, params)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(app(fetcher()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["cache"]["capacity"], 100);
    }

    #[tokio::test]
    async fn test_summary() {
        let (status, body) = get_json(app(fetcher()), &uri("", "&scope=1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["format"], "METS");
        assert_eq!(body["recordId"], "PPN1234");
        assert_eq!(body["numPages"], 3);
        assert_eq!(body["toplevelId"], "LOG_0");
        assert_eq!(body["title"][0], "Die Chronik der Stadt");
        assert_eq!(body["hasFulltext"], true);
        assert_eq!(body["rootId"], 0);
        assert_eq!(body["rootTitle"], "");
    }

    #[tokio::test]
    async fn test_summary_of_volume() {
        let fetcher = fetcher();
        let cache = DocumentCache::new(CacheConfig::default(), context_with(fetcher));
        let doc = cache.get_instance(LOCATION, 1, false).await.unwrap();
        doc.set_parent_id(2);

        let app = app_with_cache(cache);
        let (status, body) = get_json(app, &uri("", "&scope=1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rootId"], 1);
        assert_eq!(body["rootTitle"], "Chronik");
    }

    #[tokio::test]
    async fn test_toc() {
        let app = app(fetcher());
        let (status, body) = get_json(app.clone(), &uri("/toc", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["id"], "LOG_0");
        assert_eq!(body[0]["points"], 1);
        assert_eq!(body[0]["children"][0]["pagination"], "II");

        let (status, body) = get_json(app.clone(), &uri("/toc", "&recursive=false")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body[0].get("children").is_none());

        let (status, body) = get_json(app, &uri("/toc", "&id=LOG_404")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_metadata() {
        let app = app(fetcher());
        let (status, body) = get_json(app.clone(), &uri("/metadata", "&id=LOG_1&scope=1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["LOG_1"]["title"][0], "Erstes Kapitel");

        let (_, body) = get_json(app.clone(), &uri("/metadata", "&scope=1")).await;
        assert_eq!(body.as_object().unwrap().len(), 2);

        let (_, body) = get_json(app, &uri("/titledata", "&scope=1")).await;
        assert_eq!(body["record_id"][0], "PPN1234");
        assert_eq!(body["mets_order"][0], "1");
    }

    #[tokio::test]
    async fn test_page_lookup() {
        let app = app(fetcher());
        let (status, body) = get_json(app.clone(), &uri("/page", "&label=II")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["page"], 2);
        assert_eq!(body["matched"], true);
        assert_eq!(body["pageId"], "PHYS_2");

        let (_, body) = get_json(app.clone(), &uri("/page", "&label=XIV")).await;
        assert_eq!(body["page"], 1);
        assert_eq!(body["matched"], false);

        let (status, body) = get_json(app, &uri("/page", "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "MISSING_PARAMETER");
    }

    #[tokio::test]
    async fn test_full_text() {
        let app = app(fetcher());
        let (status, body) = send(app.clone(), Method::GET, &uri("/fulltext", "&id=PHYS_1")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(body).unwrap().starts_with("<ocr>"));

        let (status, _) = send(app, Method::GET, &uri("/fulltext", "&id=PHYS_3")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_depth() {
        let app = app(fetcher());
        let (status, body) = get_json(app.clone(), &uri("/depth", "&id=LOG_2")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["depth"], 3);

        let (status, _) = get_json(app, &uri("/depth", "&id=PHYS_1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unavailable_and_invalid_locations() {
        let app = app(fetcher());
        let (status, body) =
            get_json(app.clone(), "/api/v1/documents?location=https://x/missing.xml").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "DOCUMENT_UNAVAILABLE");

        let (status, body) = get_json(app.clone(), "/api/v1/documents?location=mets.xml").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_LOCATION");

        let (status, _) = get_json(app, "/api/v1/documents").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_file_locations_need_opt_in() {
        let location = "file:///srv/mets/chronik.xml";
        let fetcher = Arc::new(MemoryFetcher::new().with_source(location, RICH_METS));
        let cache = DocumentCache::new(CacheConfig::default(), context_with(fetcher.clone()));
        let uri = format!("/api/v1/documents?location={}", location);

        let app = cache_app(cache.clone(), Arc::new(registry()));
        let (status, body) = get_json(app, &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_LOCATION");
        assert_eq!(fetcher.fetch_count(), 0);

        let mut config = Config::default();
        config.fetch.allow_file_locations = true;
        let app = crate::routes::router().with_state(AppState::new(
            config,
            cache,
            Arc::new(registry()),
        ));
        let (status, body) = get_json(app, &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["recordId"], "PPN1234");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_requests_share_one_document() {
        let fetcher = fetcher();
        let app = app(fetcher.clone());

        let requests: Vec<_> = (0..8)
            .map(|_| {
                let app = app.clone();
                tokio::spawn(async move { get_json(app, &uri("/metadata", "&scope=1")).await })
            })
            .collect();
        for request in requests {
            let (status, body) = request.await.unwrap();
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["LOG_0"]["title"][0], "Die Chronik der Stadt");
        }
        assert_eq!(fetcher.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_blocking_work_is_internal_error() {
        let cache = DocumentCache::new(CacheConfig::default(), context_with(fetcher()));
        let doc = cache.get_instance(LOCATION, 1, false).await.unwrap();

        let result: Result<usize, AppError> = blocking(doc, |_| panic!("facet build failed")).await;
        let error = result.unwrap_err();
        assert!(matches!(error, AppError::Internal(_)));
        assert_eq!(error.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_flush_cache() {
        let fetcher = fetcher();
        let cache = DocumentCache::new(CacheConfig::default(), context_with(fetcher.clone()));
        let app = cache_app(cache.clone(), Arc::new(registry()));

        let (status, _) = get_json(app.clone(), &uri("", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cache.len().await, 1);

        let (status, body) = send(app, Method::DELETE, "/api/v1/documents/cache").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(serde_json::from_slice::<serde_json::Value>(&body).unwrap()["flushed"], 1);
        assert!(cache.is_empty().await);
    }
}
