use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Json,
};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::{error::AppError, images::UploadItem};

/// Name of the multipart field carrying the JSON document.
const DATA_FIELD: &str = "data";

/// Body that is either plain JSON or `multipart/form-data` with the JSON in a
/// `data` field next to file fields. A multipart body without `data` yields
/// `T::default()`.
pub struct JsonOrMultipart<T> {
    pub data: T,
    files: Vec<(String, UploadItem)>,
}

impl<T> JsonOrMultipart<T> {
    /// Removes the named file from the body, if the client sent one.
    pub fn take_file(&mut self, name: &str) -> Option<UploadItem> {
        let idx = self.files.iter().position(|(n, _)| n == name)?;
        Some(self.files.swap_remove(idx).1)
    }
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |ct| ct.starts_with("multipart/form-data"))
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> AppError {
    warn!(error = %e, "bad multipart body");
    AppError::validation(e.body_text())
}

#[async_trait]
impl<S, T> FromRequest<S> for JsonOrMultipart<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default + Send,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_multipart(&req) {
            let Json(data) = Json::<T>::from_request(req, state).await?;
            return Ok(Self {
                data,
                files: Vec::new(),
            });
        }

        let mut mp = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::validation(e.body_text()))?;
        let mut data = None;
        let mut files = Vec::new();
        while let Some(field) = mp.next_field().await.map_err(bad_multipart)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == DATA_FIELD {
                let text = field.text().await.map_err(bad_multipart)?;
                let parsed = serde_json::from_str(&text)
                    .map_err(|e| AppError::validation(format!("Invalid data field: {e}")))?;
                data = Some(parsed);
            } else if field.file_name().is_some() {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let body = field.bytes().await.map_err(bad_multipart)?;
                files.push((name, UploadItem { body, content_type }));
            }
        }

        Ok(Self {
            data: data.unwrap_or_default(),
            files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Patch {
        title: Option<String>,
    }

    const BOUNDARY: &str = "XyZ";

    fn multipart(parts: &[(&str, Option<(&str, &str)>, &str)]) -> Request {
        let mut body = String::new();
        for (name, file, content) in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match file {
                Some((filename, ct)) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {ct}\r\n\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                )),
            }
            body.push_str(content);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        Request::builder()
            .method("PUT")
            .uri("/")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn plain_json_has_no_files() {
        let req = Request::builder()
            .method("PUT")
            .uri("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"title":"Tart"}"#))
            .unwrap();
        let mut got = JsonOrMultipart::<Patch>::from_request(req, &()).await.unwrap();
        assert_eq!(got.data.title.as_deref(), Some("Tart"));
        assert!(got.take_file("image").is_none());
    }

    #[tokio::test]
    async fn multipart_splits_data_and_files() {
        let req = multipart(&[
            ("data", None, r#"{"title":"Tart"}"#),
            ("image", Some(("tart.png", "image/png")), "png-bytes"),
        ]);
        let mut got = JsonOrMultipart::<Patch>::from_request(req, &()).await.unwrap();
        assert_eq!(got.data.title.as_deref(), Some("Tart"));
        let file = got.take_file("image").unwrap();
        assert_eq!(file.content_type, "image/png");
        assert_eq!(&file.body[..], b"png-bytes");
        assert!(got.take_file("image").is_none());
    }

    #[tokio::test]
    async fn multipart_without_data_defaults() {
        let req = multipart(&[("avatar", Some(("me.jpg", "image/jpeg")), "jpg")]);
        let mut got = JsonOrMultipart::<Patch>::from_request(req, &()).await.unwrap();
        assert_eq!(got.data, Patch::default());
        assert!(got.take_file("avatar").is_some());
    }

    #[tokio::test]
    async fn malformed_data_is_a_validation_error() {
        let req = multipart(&[("data", None, "{not json")]);
        let err = JsonOrMultipart::<Patch>::from_request(req, &())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
