//! Form bodies accepted either url-encoded or as `multipart/form-data`.

use std::collections::HashMap;
use std::str::FromStr;

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header;
use axum::Form;

use super::error::ApiError;

/// A file part of a multipart body.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Text fields and file parts of a submitted form.
#[derive(Debug, Default)]
pub struct FormFields {
    text: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl FormFields {
    /// A non-empty text field.
    pub fn optional(&self, key: &str) -> Option<&str> {
        self.text
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// A text field that must be present; it may still be empty.
    pub fn required(&self, key: &str) -> Result<&str, ApiError> {
        self.text
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ApiError::unprocessable(format!("Field required: {key}")))
    }

    /// Parse a field, using `default` when it is absent or empty.
    pub fn parse_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, ApiError> {
        match self.optional(key) {
            Some(raw) => raw.trim().parse().map_err(|_| {
                ApiError::unprocessable(format!("Invalid value for {key}: '{raw}'"))
            }),
            None => Ok(default),
        }
    }

    pub fn file(&self, key: &str) -> Option<&UploadedFile> {
        self.files.get(key)
    }

    pub fn take_file(&mut self, key: &str) -> Option<UploadedFile> {
        self.files.remove(key)
    }
}

impl<S> FromRequest<S> for FormFields
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("multipart/form-data"));

        if !is_multipart {
            let Form(text) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| ApiError::unprocessable(e.body_text()))?;
            return Ok(Self {
                text,
                files: HashMap::new(),
            });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::unprocessable(e.body_text()))?;
        let mut fields = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("invalid multipart: {e}")))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if field.file_name().is_some() {
                let filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("{name} read error: {e}")))?;
                fields.files.insert(
                    name,
                    UploadedFile {
                        filename,
                        content_type,
                        bytes,
                    },
                );
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("{name} read error: {e}")))?;
                fields.text.insert(name, value);
            }
        }
        Ok(fields)
    }
}
