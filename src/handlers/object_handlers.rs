//! HTTP handlers for uploading, probing and downloading objects.
//! Storage concerns are delegated to the shared `ObjectStore`.

use crate::{
    errors::AppError,
    models::object::{FALLBACK_CONTENT_TYPE, ObjectMetadata},
    state::AppState,
};
use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Multipart, Path, Request, State, multipart::MultipartError},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use uuid::Uuid;

/// Name of the multipart part carrying the file.
const FILE_PART: &str = "file";

/// RFC 8187 `attr-char` minus the alphanumerics: everything else is escaped.
const FILENAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// A parsed upload, ready for the store.
#[derive(Debug)]
struct Upload {
    payload: Bytes,
    content_type: Option<String>,
    filename: Option<String>,
}

/// `POST /` — store the uploaded file and answer with its one-time URL.
///
/// Accepts a raw body typed by its `Content-Type` header, or a
/// `multipart/form-data` body with a `file` part. URL-encoded forms are
/// refused.
pub async fn upload_object(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, AppError> {
    let base_url = public_base_url(&state, request.headers())?;
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from);

    let upload = match content_type.as_deref().map(media_essence).as_deref() {
        Some("application/x-www-form-urlencoded") => {
            return Err(AppError::unsupported_media_type(
                "application/x-www-form-urlencoded not allowed.",
            ));
        }
        Some("multipart/form-data") => read_multipart(request, &state).await?,
        _ => {
            let payload = Bytes::from_request(request, &state)
                .await
                .map_err(|rej| AppError::new(rej.status(), rej.body_text()))?;
            Upload {
                payload,
                content_type,
                filename: None,
            }
        }
    };

    let id = state
        .store
        .put(upload.payload, upload.content_type, upload.filename)
        .await?;
    let url = format!("{}/{}", base_url, id);

    let mut response = Response::new(Body::from(format!("{}\n", url)));
    *response.status_mut() = StatusCode::CREATED;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    if let Ok(location) = HeaderValue::from_str(&url) {
        headers.insert(header::LOCATION, location);
    }
    Ok(response)
}

/// HEAD `/{id}` — same headers as GET but no body, and the object stays.
pub async fn probe_object(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;
    let meta = state.store.peek(&id).await?.ok_or_else(AppError::not_found)?;

    let mut response = Response::new(Body::empty());
    set_object_headers(response.headers_mut(), &meta);
    Ok(response)
}

/// GET `/{id}` — hand out the object and delete it.
///
/// Consumption is committed before the body is sent; a client that drops
/// the connection mid-transfer has still used up its one download.
pub async fn download_object(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;
    let object = state
        .store
        .take_once(&id)
        .await?
        .ok_or_else(AppError::not_found)?;

    let mut response = Response::new(Body::from(object.payload));
    set_object_headers(response.headers_mut(), &object.metadata);
    Ok(response)
}

async fn read_multipart(request: Request, state: &AppState) -> Result<Upload, AppError> {
    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|rej| AppError::new(rej.status(), rej.body_text()))?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_PART) {
            continue;
        }
        let filename = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(String::from);
        let content_type = field.content_type().map(String::from);
        let payload = field.bytes().await.map_err(multipart_error)?;
        return Ok(Upload {
            payload,
            content_type,
            filename,
        });
    }

    Err(AppError::bad_request("No file part."))
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::new(err.status(), err.body_text())
}

/// Anything that is not a UUID cannot name an object, so it is simply absent.
fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::not_found())
}

/// Lowercased media type without parameters.
fn media_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Base URL for links handed back to clients.
///
/// The configured URL wins; otherwise it is rebuilt from the forwarding
/// headers a reverse proxy sets, falling back to `Host`.
pub(crate) fn public_base_url(state: &AppState, headers: &HeaderMap) -> Result<String, AppError> {
    if let Some(url) = &state.base_url {
        return Ok(url.to_string());
    }

    let scheme = match first_header(headers, "x-forwarded-proto") {
        Some(proto) if proto.eq_ignore_ascii_case("https") => "https",
        _ => "http",
    };
    let host = first_header(headers, "x-forwarded-host")
        .or_else(|| first_header(headers, header::HOST.as_str()))
        .ok_or_else(|| AppError::bad_request("Missing Host header."))?;
    Ok(format!("{}://{}", scheme, host))
}

/// First comma-separated entry of a header, as proxies may chain values.
fn first_header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// `Content-Disposition` value advertising `filename`.
///
/// Printable ASCII names without quotes or backslashes use the quoted
/// `filename` parameter; anything else uses RFC 8187 `filename*`.
pub fn content_disposition(filename: &str) -> String {
    let legacy_safe = filename
        .chars()
        .all(|c| matches!(c, ' '..='~') && c != '"' && c != '\\');
    if legacy_safe {
        format!("attachment; filename=\"{}\"", filename)
    } else {
        format!(
            "attachment; filename*=UTF-8''{}",
            utf8_percent_encode(filename, FILENAME_ENCODE_SET)
        )
    }
}

fn set_object_headers(headers: &mut HeaderMap, meta: &ObjectMetadata) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&meta.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(FALLBACK_CONTENT_TYPE)),
    );

    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.size));

    if let Ok(value) = HeaderValue::from_str(
        &meta
            .created_at
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string(),
    ) {
        headers.insert(header::LAST_MODIFIED, value);
    }

    if let Some(filename) = meta.filename.as_deref() {
        if let Ok(value) = HeaderValue::from_str(&content_disposition(filename)) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory_store::MemoryStore;
    use std::sync::Arc;

    fn state(base_url: Option<&str>) -> AppState {
        AppState::new(Arc::new(MemoryStore::new(16)), base_url.map(String::from))
    }

    #[test]
    fn ascii_filenames_are_quoted() {
        assert_eq!(
            content_disposition("image.png"),
            "attachment; filename=\"image.png\""
        );
        assert_eq!(
            content_disposition("my file (1).txt"),
            "attachment; filename=\"my file (1).txt\""
        );
    }

    #[test]
    fn other_filenames_use_extended_parameter() {
        assert_eq!(
            content_disposition("图片.png"),
            "attachment; filename*=UTF-8''%E5%9B%BE%E7%89%87.png"
        );
        assert_eq!(
            content_disposition("say \"hi\".txt"),
            "attachment; filename*=UTF-8''say%20%22hi%22.txt"
        );
        assert_eq!(
            content_disposition("tab\there"),
            "attachment; filename*=UTF-8''tab%09here"
        );
    }

    #[test]
    fn media_essence_strips_parameters() {
        assert_eq!(
            media_essence("Multipart/Form-Data; boundary=xyz"),
            "multipart/form-data"
        );
        assert_eq!(media_essence("image/png"), "image/png");
    }

    #[test]
    fn base_url_prefers_configuration() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("ignored.test"));
        let url = public_base_url(&state(Some("https://files.test")), &headers).unwrap();
        assert_eq!(url, "https://files.test");
    }

    #[test]
    fn base_url_follows_forwarding_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("127.0.0.1:14641"));
        assert_eq!(
            public_base_url(&state(None), &headers).unwrap(),
            "http://127.0.0.1:14641"
        );

        headers.insert("x-forwarded-proto", HeaderValue::from_static("https, http"));
        headers.insert("x-forwarded-host", HeaderValue::from_static("yodo.example"));
        assert_eq!(
            public_base_url(&state(None), &headers).unwrap(),
            "https://yodo.example"
        );
    }

    #[test]
    fn base_url_needs_a_host() {
        let err = public_base_url(&state(None), &HeaderMap::new()).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn non_uuid_ids_are_not_found() {
        assert_eq!(parse_id("favicon.ico").unwrap_err().status, StatusCode::NOT_FOUND);
        assert!(parse_id("2c8000bc-7c10-4700-9cc3-eb0dce0a9d1a").is_ok());
    }
}
