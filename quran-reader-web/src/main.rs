use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use quran_reader::corpus::Revelation;
use quran_reader::translation::{
    CacheStats, MockMode, MockSource, TranslationSource, TranslationStatus,
};
use quran_reader::{
    Bookmark, Corpus, DailyVerseTracker, KeyValueStore, ReaderConfig, ReadingProgress,
    ReadingProgressStore, ReadingStats, TranslationService, VerseData, VerseKey,
};

#[derive(Serialize)]
pub struct ChapterSummary {
    pub id: u32,
    pub name: String,
    pub transliteration: String,
    pub translation: String,
    pub revelation: Revelation,
    pub total_verses: u32,
}

#[derive(Serialize)]
pub struct VerseResponse {
    pub key: VerseKey,
    #[serde(flatten)]
    pub verse: VerseData,
    pub translation: TranslationStatus,
}

#[derive(Serialize)]
pub struct ChapterResponse {
    #[serde(flatten)]
    pub chapter: ChapterSummary,
    pub verses: Vec<VerseResponse>,
}

#[derive(Serialize)]
pub struct DailyResponse {
    pub number: u32,
    #[serde(flatten)]
    pub verse: VerseResponse,
}

#[derive(Serialize)]
pub struct ProgressResponse {
    pub progress: Option<ReadingProgress>,
    pub stats: ReadingStats,
}

#[derive(Deserialize)]
pub struct PositionRequest {
    pub chapter: u32,
    pub verse: u32,
}

#[derive(Deserialize)]
pub struct BookmarkRequest {
    pub chapter: u32,
    pub verse: u32,
    pub note: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub corpus: Arc<Corpus>,
    pub translations: TranslationService,
    pub progress: Arc<ReadingProgressStore>,
    pub daily: Arc<DailyVerseTracker>,
}

impl AppState {
    pub fn new(
        corpus: Corpus,
        source: Arc<dyn TranslationSource>,
        store: Arc<dyn KeyValueStore>,
        config: &ReaderConfig,
    ) -> quran_reader::ReaderResult<Self> {
        Ok(Self {
            corpus: Arc::new(corpus),
            translations: TranslationService::with_options(
                source,
                store.clone(),
                config.cache_options()?,
            ),
            progress: Arc::new(ReadingProgressStore::new(store.clone())),
            daily: Arc::new(DailyVerseTracker::new(store)),
        })
    }

    fn verse_response(&self, verse: VerseData) -> Result<VerseResponse, ApiError> {
        let key = verse
            .key()
            .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        Ok(VerseResponse {
            key,
            translation: self.translations.get_state(key).status(),
            verse,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?),
        )
        .init();

    let config_path = std::env::var("QURAN_READER_CONFIG").ok();
    let config = ReaderConfig::load(config_path.as_deref().map(std::path::Path::new))?;

    let source: Arc<dyn TranslationSource> =
        if std::env::var("QURAN_READER_MOCK").is_ok_and(|v| v == "1" || v == "true") {
            Arc::new(MockSource::with_delay(MockMode::Echo, 150))
        } else {
            Arc::new(config.translation_source()?)
        };
    let state = AppState::new(
        config.load_corpus()?,
        source,
        Arc::new(config.open_store()?),
        &config,
    )?;

    info!(
        source = state.translations.source_name(),
        chapters = state.corpus.all_chapters().len(),
        "📖 Starting quran-reader web server"
    );

    let addr = std::env::var("QURAN_READER_BIND").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Server running at http://{}", addr);

    axum::serve(listener, app(state)).await?;

    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/chapters", get(list_chapters))
        .route("/api/chapters/{id}", get(get_chapter))
        .route("/api/chapters/{id}/preload", post(preload_chapter))
        .route("/api/verses/{chapter}/{verse}", get(get_verse))
        .route("/api/translations/{key}", get(translation_state).post(load_translation))
        .route("/api/daily", get(daily_verse))
        .route("/api/cache", get(cache_stats).delete(clear_cache))
        .route("/api/progress", get(get_progress).put(update_position))
        .route("/api/progress/chapters/{id}/complete", post(complete_chapter))
        .route("/api/bookmarks", get(list_bookmarks).post(add_bookmark))
        .route("/api/bookmarks/{id}", delete(remove_bookmark))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn summary(chapter: &quran_reader::Chapter) -> ChapterSummary {
    ChapterSummary {
        id: chapter.id,
        name: chapter.name.clone(),
        transliteration: chapter.transliteration.clone(),
        translation: chapter.translation.clone(),
        revelation: chapter.revelation,
        total_verses: chapter.total_verses,
    }
}

async fn list_chapters(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<ChapterSummary>> {
    let chapters = match query.search.as_deref() {
        Some(search) => state.corpus.search_chapters(search),
        None => state.corpus.all_chapters().iter().collect(),
    };
    Json(chapters.into_iter().map(summary).collect())
}

async fn get_chapter(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<ChapterResponse>, ApiError> {
    let chapter = state
        .corpus
        .chapter_by_id(id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Unknown chapter {}", id)))?;

    let mut verses = Vec::with_capacity(chapter.verses.len());
    for (number, _) in state.corpus.chapter_verses(id) {
        if let Some(verse) = state.corpus.verse(id, number) {
            verses.push(state.verse_response(verse)?);
        }
    }

    Ok(Json(ChapterResponse {
        chapter: summary(chapter),
        verses,
    }))
}

async fn preload_chapter(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<CacheStats>, ApiError> {
    let keys = state.corpus.chapter_keys(id);
    if keys.is_empty() {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Unknown chapter {}", id),
        ));
    }
    info!(chapter = id, verses = keys.len(), "preloading chapter");
    state.translations.preload_translations(&keys).await;
    Ok(Json(state.translations.cache_stats()))
}

async fn get_verse(
    State(state): State<AppState>,
    Path((chapter, verse)): Path<(u32, u32)>,
) -> Result<Json<VerseResponse>, ApiError> {
    let data = state.corpus.verse(chapter, verse).ok_or_else(|| {
        api_error(
            StatusCode::NOT_FOUND,
            format!("Unknown verse {}:{}", chapter, verse),
        )
    })?;
    Ok(Json(state.verse_response(data)?))
}

fn parse_key(raw: &str) -> Result<VerseKey, ApiError> {
    raw.parse()
        .map_err(|e: quran_reader::ReaderError| api_error(StatusCode::BAD_REQUEST, e.to_string()))
}

async fn translation_state(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<TranslationStatus>, ApiError> {
    let key = parse_key(&key)?;
    Ok(Json(state.translations.get_state(key).status()))
}

async fn load_translation(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<TranslationStatus>, ApiError> {
    let key = parse_key(&key)?;
    state.translations.load_translation(key).await;
    Ok(Json(state.translations.get_state(key).status()))
}

async fn daily_verse(State(state): State<AppState>) -> Result<Json<DailyResponse>, ApiError> {
    let daily = state
        .daily
        .todays_verse(&state.corpus)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let key = daily
        .verse
        .key()
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    state.translations.load_translation(key).await;

    Ok(Json(DailyResponse {
        number: daily.number,
        verse: state.verse_response(daily.verse)?,
    }))
}

async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.translations.cache_stats())
}

async fn clear_cache(State(state): State<AppState>) -> StatusCode {
    state.translations.clear_cache();
    StatusCode::NO_CONTENT
}

async fn get_progress(State(state): State<AppState>) -> Json<ProgressResponse> {
    Json(ProgressResponse {
        progress: state.progress.get_progress(),
        stats: state.progress.get_reading_stats(),
    })
}

async fn update_position(
    State(state): State<AppState>,
    Json(request): Json<PositionRequest>,
) -> Result<Json<ProgressResponse>, ApiError> {
    if state.corpus.verse(request.chapter, request.verse).is_none() {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Unknown verse {}:{}", request.chapter, request.verse),
        ));
    }
    state
        .progress
        .update_reading_position(request.chapter, request.verse);
    Ok(get_progress(State(state)).await)
}

async fn complete_chapter(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<ProgressResponse>, ApiError> {
    if state.corpus.chapter_by_id(id).is_none() {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Unknown chapter {}", id),
        ));
    }
    state.progress.mark_chapter_completed(id);
    Ok(get_progress(State(state)).await)
}

async fn list_bookmarks(State(state): State<AppState>) -> Json<Vec<Bookmark>> {
    Json(state.progress.get_bookmarks())
}

async fn add_bookmark(
    State(state): State<AppState>,
    Json(request): Json<BookmarkRequest>,
) -> Result<(StatusCode, Json<Bookmark>), ApiError> {
    let verse = state
        .corpus
        .verse(request.chapter, request.verse)
        .ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                format!("Unknown verse {}:{}", request.chapter, request.verse),
            )
        })?;
    let bookmark = state.progress.add_bookmark(
        request.chapter,
        request.verse,
        &verse.chapter_name,
        &verse.text,
        request.note.as_deref(),
    );
    Ok((StatusCode::CREATED, Json(bookmark)))
}

async fn remove_bookmark(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    if state.progress.remove_bookmark(&id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use quran_reader::MemoryStore;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn test_state(mode: MockMode) -> AppState {
        AppState::new(
            Corpus::sample().unwrap(),
            Arc::new(MockSource::new(mode)),
            Arc::new(MemoryStore::new()),
            &ReaderConfig::default(),
        )
        .unwrap()
    }

    async fn call(state: &AppState, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_list_and_search_chapters() {
        let state = test_state(MockMode::Echo);

        let (status, body) = call(&state, Method::GET, "/api/chapters", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 4);

        let (_, body) = call(&state, Method::GET, "/api/chapters?search=falaq", None).await;
        assert_eq!(body[0]["id"], 113);
    }

    #[tokio::test]
    async fn test_verse_translation_lifecycle() {
        let state = test_state(MockMode::Echo);

        let (status, body) = call(&state, Method::GET, "/api/verses/112/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["key"], "112:1");
        assert_eq!(body["translation"]["loaded"], false);

        let (status, body) = call(&state, Method::POST, "/api/translations/112:1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["loaded"], true);
        assert_eq!(body["text"], "translation of 112:1");

        let (_, body) = call(&state, Method::GET, "/api/cache", None).await;
        assert_eq!(body["total_cached"], 1);

        let (status, _) = call(&state, Method::DELETE, "/api/cache", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, body) = call(&state, Method::GET, "/api/translations/112:1", None).await;
        assert_eq!(body["loaded"], false);
    }

    #[tokio::test]
    async fn test_failed_translation_reports_error() {
        let state = test_state(MockMode::Error("offline".to_string()));

        let (_, body) = call(&state, Method::POST, "/api/translations/1:1", None).await;
        assert_eq!(body["loaded"], false);
        assert_eq!(body["loading"], false);
        assert!(body["error"].as_str().unwrap().contains("offline"));
        assert!(!body["text"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let state = test_state(MockMode::Echo);

        let (status, body) = call(&state, Method::GET, "/api/translations/0:1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, _) = call(&state, Method::GET, "/api/chapters/2", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&state, Method::GET, "/api/verses/1/99", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_preload_chapter() {
        let state = test_state(MockMode::Echo);
        let (status, body) = call(&state, Method::POST, "/api/chapters/112/preload", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_cached"], 4);

        let (_, body) = call(&state, Method::GET, "/api/chapters/112", None).await;
        let verses = body["verses"].as_array().unwrap();
        assert_eq!(verses.len(), 4);
        assert!(verses.iter().all(|v| v["translation"]["loaded"] == true));
    }

    #[tokio::test]
    async fn test_progress_and_bookmarks() {
        let state = test_state(MockMode::Echo);

        let (status, body) = call(
            &state,
            Method::PUT,
            "/api/progress",
            Some(json!({"chapter": 114, "verse": 3})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["progress"]["current_chapter"], 114);
        assert_eq!(body["stats"]["total_verses_read"], 1);

        let (_, body) = call(&state, Method::POST, "/api/progress/chapters/114/complete", None).await;
        assert_eq!(body["stats"]["completed_chapters"], 1);

        let (status, bookmark) = call(
            &state,
            Method::POST,
            "/api/bookmarks",
            Some(json!({"chapter": 114, "verse": 3, "note": "refuge"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(bookmark["note"], "refuge");

        let (_, list) = call(&state, Method::GET, "/api/bookmarks", None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);

        let uri = format!("/api/bookmarks/{}", bookmark["id"].as_str().unwrap());
        let (status, _) = call(&state, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&state, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_daily_verse() {
        let state = test_state(MockMode::Echo);
        let (status, body) = call(&state, Method::GET, "/api/daily", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["number"], 1);
        assert_eq!(body["key"], "1:1");
        assert_eq!(body["translation"]["loaded"], true);
    }
}
