use axum::{
    extract::{ FromRequest, Multipart, Request },
    http::header::CONTENT_TYPE,
    Form,
};
use std::collections::HashMap;

use super::error::ApiError;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Form body accepted either url-encoded or as multipart (with files).
#[derive(Debug, Default)]
pub struct FormFields {
    values: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl FormFields {
    #[cfg(test)]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
        where I: IntoIterator<Item = (K, V)>, K: Into<String>, V: Into<String>
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            files: HashMap::new(),
        }
    }

    /// Value of a field, `None` when absent or blank.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn required(&self, name: &str) -> Result<&str, ApiError> {
        self.text(name).ok_or_else(|| ApiError::MissingField(name.to_string()))
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name).filter(|f| !f.data.is_empty())
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut fields = Self::default();
        while
            let Some(field) = multipart
                .next_field().await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(str::to_string);
            if field.file_name().is_some() {
                let data = field.bytes().await.map_err(|e| ApiError::BadRequest(e.body_text()))?;
                fields.files.insert(name, UploadedFile { content_type, data: data.to_vec() });
            } else {
                let value = field.text().await.map_err(|e| ApiError::BadRequest(e.body_text()))?;
                fields.values.insert(name, value);
            }
        }
        Ok(fields)
    }
}

impl<S> FromRequest<S> for FormFields where S: Send + Sync {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("multipart/form-data"))
            .unwrap_or(false);

        if is_multipart {
            let multipart = Multipart::from_request(req, state).await.map_err(|e|
                ApiError::BadRequest(e.body_text())
            )?;
            return Self::from_multipart(multipart).await;
        }

        let Form(values) = Form::<HashMap<String, String>>
            ::from_request(req, state).await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        Ok(Self { values, files: HashMap::new() })
    }
}
