// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Validating extractors.
//!
//! [`ValidJson`], [`ValidQuery`] and [`ValidPath`] deserialize a request
//! section and run its `garde` rules. On failure the request is answered
//! with 400 and one [`FieldError`] per invalid field, and the handler never
//! runs.

use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use garde::{Report, Validate};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::ApiError;

/// One invalid field, named by its JSON path (`webhookUrl`, `recipients[2]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// The part of a request being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Body,
    Query,
    Params,
}

impl Section {
    pub fn as_str(self) -> &'static str {
        match self {
            Section::Body => "body",
            Section::Query => "query",
            Section::Params => "params",
        }
    }
}

fn camel_case(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut upper = false;
    for c in segment.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Rewrite a garde path (`webhook_url`, `recipients[2]`) with JSON names.
pub fn json_path(path: &str) -> String {
    path.split('.')
        .map(|part| match part.split_once('[') {
            Some((name, index)) => format!("{}[{index}", camel_case(name)),
            None => camel_case(part),
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Flatten a garde report into field errors for `section`.
pub fn field_errors(section: Section, report: &Report) -> Vec<FieldError> {
    report
        .iter()
        .map(|(path, error)| {
            let path = path.to_string();
            let field = if path.is_empty() {
                section.as_str().to_string()
            } else {
                json_path(&path)
            };
            FieldError::new(field, error.message().to_string())
        })
        .collect()
}

fn reject(section: Section, details: Vec<FieldError>) -> ApiError {
    warn!(
        section = section.as_str(),
        fields = ?details.iter().map(|d| d.field.as_str()).collect::<Vec<_>>(),
        "request failed validation"
    );
    zapflow_prometheus::record_validation_rejection(section.as_str());
    ApiError::Validation(details)
}

fn check<T>(section: Section, value: T) -> Result<T, ApiError>
where
    T: Validate,
    T::Context: Default,
{
    match value.validate() {
        Ok(()) => Ok(value),
        Err(report) => Err(reject(section, field_errors(section, &report))),
    }
}

/// JSON body that passed validation.
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
    T::Context: Default,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| {
                reject(
                    Section::Body,
                    vec![FieldError::new("body", rejection.body_text())],
                )
            })?;
        check(Section::Body, value).map(Self)
    }
}

/// Query string that passed validation, with defaults filled in.
#[derive(Debug, Clone)]
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
    T::Context: Default,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                reject(
                    Section::Query,
                    vec![FieldError::new("query", rejection.body_text())],
                )
            })?;
        check(Section::Query, value).map(Self)
    }
}

/// Path parameters that passed validation.
#[derive(Debug, Clone)]
pub struct ValidPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate + Send,
    T::Context: Default,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                reject(
                    Section::Params,
                    vec![FieldError::new("params", rejection.body_text())],
                )
            })?;
        check(Section::Params, value).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    struct Sample {
        #[garde(length(min = 1))]
        display_name: String,
        #[garde(length(min = 1), inner(length(min = 2)))]
        tags: Vec<String>,
    }

    #[test]
    fn paths_use_json_names() {
        assert_eq!(json_path("webhook_url"), "webhookUrl");
        assert_eq!(json_path("recipients[2]"), "recipients[2]");
        assert_eq!(json_path("media_url"), "mediaUrl");
        assert_eq!(json_path("name"), "name");
    }

    #[test]
    fn every_invalid_field_is_reported() {
        let sample = Sample {
            display_name: String::new(),
            tags: vec!["ok".into(), "x".into()],
        };
        let report = sample.validate().unwrap_err();
        let errors = field_errors(Section::Body, &report);
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"displayName"));
        assert!(fields.contains(&"tags[1]"));
        assert!(errors.iter().all(|e| !e.message.is_empty()));
    }
}
