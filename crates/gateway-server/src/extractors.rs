//! Custom Axum extractors for the gateway.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Multipart, Request},
    http::request::Parts,
};
use gateway_core::{AudioFile, AudioRequest, DEFAULT_AUDIO_MODEL};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ApiError;

/// Request ID taken from the caller's headers, or freshly generated
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get("x-request-id")
            .or_else(|| parts.headers.get("x-correlation-id"))
            .or_else(|| parts.headers.get("request-id"))
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

        Ok(Self(id))
    }
}

/// JSON body that rejects with an OpenAI-shaped 400
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = axum::body::Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read request body: {e}")))?;

        let value: T = serde_json::from_slice(&bytes).map_err(|e| {
            debug!(error = %e, "JSON parse error");
            ApiError::bad_request(format!("Invalid JSON: {e}"))
        })?;

        Ok(Self(value))
    }
}

/// Multipart audio upload (`file` plus optional text fields)
#[derive(Debug, Clone)]
pub struct AudioForm(pub AudioRequest);

#[async_trait]
impl<S> FromRequest<S> for AudioForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?;

        let mut file = None;
        let mut model = None;
        let mut language = None;
        let mut prompt = None;
        let mut response_format = None;
        let mut temperature = None;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let filename = field.file_name().unwrap_or("audio").to_string();
                let content_type = field.content_type().map(String::from);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?;
                file = Some(AudioFile {
                    filename,
                    content_type,
                    data,
                });
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(format!("Invalid field {name}: {e}")))?;
            match name.as_str() {
                "model" => model = Some(value),
                "language" => language = Some(value),
                "prompt" => prompt = Some(value),
                "response_format" => response_format = Some(value),
                "temperature" => {
                    let parsed = value.trim().parse::<f32>().map_err(|_| {
                        ApiError::bad_request(format!("Invalid temperature: {value}"))
                    })?;
                    temperature = Some(parsed);
                }
                other => debug!(field = other, "Ignoring multipart field"),
            }
        }

        let file = file.ok_or_else(|| ApiError::bad_request("Missing file field"))?;
        let mut request = AudioRequest::new(file);
        request.model = model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_AUDIO_MODEL.to_string());
        request.language = language.filter(|l| !l.is_empty());
        request.prompt = prompt.filter(|p| !p.is_empty());
        request.response_format = response_format.filter(|f| !f.is_empty());
        request.temperature = temperature;

        Ok(Self(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Payload {
        model: String,
    }

    #[tokio::test]
    async fn test_request_id_from_header() {
        let request = Request::builder()
            .header("x-correlation-id", "corr-1")
            .body(Body::empty())
            .expect("request");
        let (mut parts, _) = request.into_parts();

        let RequestId(id) = RequestId::from_request_parts(&mut parts, &())
            .await
            .expect("infallible");
        assert_eq!(id, "corr-1");
    }

    #[tokio::test]
    async fn test_request_id_generated() {
        let request = Request::builder().body(Body::empty()).expect("request");
        let (mut parts, _) = request.into_parts();

        let RequestId(id) = RequestId::from_request_parts(&mut parts, &())
            .await
            .expect("infallible");
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }

    #[tokio::test]
    async fn test_json_body() {
        let request = Request::builder()
            .body(Body::from(r#"{"model":"gpt-4o"}"#))
            .expect("request");
        let JsonBody(payload) = JsonBody::<Payload>::from_request(request, &())
            .await
            .expect("parses");
        assert_eq!(payload.model, "gpt-4o");
    }

    #[tokio::test]
    async fn test_json_body_rejects_garbage() {
        let request = Request::builder()
            .body(Body::from("{not json"))
            .expect("request");
        let err = JsonBody::<Payload>::from_request(request, &())
            .await
            .expect_err("invalid");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.starts_with("Invalid JSON"));
    }

    fn multipart(parts: &[(&str, Option<&str>, &str)]) -> Request {
        let mut body = String::new();
        for (name, filename, value) in parts {
            body.push_str("--XBOUNDARY\r\n");
            match filename {
                Some(filename) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: audio/wav\r\n\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                )),
            }
            body.push_str(value);
            body.push_str("\r\n");
        }
        body.push_str("--XBOUNDARY--\r\n");

        Request::builder()
            .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
            .body(Body::from(body))
            .expect("request")
    }

    #[tokio::test]
    async fn test_audio_form_fields() {
        let request = multipart(&[
            ("model", None, "whisper-large"),
            ("language", None, "de"),
            ("temperature", None, "0.2"),
            ("file", Some("clip.wav"), "RIFFDATA"),
        ]);
        let AudioForm(audio) = AudioForm::from_request(request, &())
            .await
            .expect("parses");

        assert_eq!(audio.model, "whisper-large");
        assert_eq!(audio.language.as_deref(), Some("de"));
        assert_eq!(audio.temperature, Some(0.2));
        assert_eq!(audio.file.filename, "clip.wav");
        assert_eq!(audio.file.content_type.as_deref(), Some("audio/wav"));
        assert_eq!(&audio.file.data[..], b"RIFFDATA");
    }

    #[tokio::test]
    async fn test_audio_form_defaults_model() {
        let request = multipart(&[("model", None, ""), ("file", Some("a.mp3"), "ID3")]);
        let AudioForm(audio) = AudioForm::from_request(request, &())
            .await
            .expect("parses");
        assert_eq!(audio.model, DEFAULT_AUDIO_MODEL);
    }

    #[tokio::test]
    async fn test_audio_form_requires_file() {
        let request = multipart(&[("model", None, "whisper-1")]);
        let err = AudioForm::from_request(request, &())
            .await
            .expect_err("no file");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Missing file field");
    }

    #[tokio::test]
    async fn test_audio_form_rejects_bad_temperature() {
        let request = multipart(&[("temperature", None, "warm"), ("file", Some("a.wav"), "x")]);
        let err = AudioForm::from_request(request, &())
            .await
            .expect_err("bad temperature");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
