// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request schemas for the REST API.
//!
//! Body schemas default every field during deserialization so a missing
//! field is reported by validation together with the other invalid fields.

use garde::Validate;
use serde::Deserialize;
use uuid::Uuid;
use zapflow_core::{InstanceStatus, MessageDirection, WebhookEvent};
use zapflow_whatsapp::phone;

pub const MAX_MESSAGE_CHARS: usize = 4096;
pub const MAX_BULK_RECIPIENTS: usize = 100;
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_BULK_DELAY_MS: u64 = 1000;

// --- Custom rules ---

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn http_url(value: &str, _ctx: &()) -> garde::Result {
    if is_http_url(value) {
        Ok(())
    } else {
        Err(garde::Error::new("deve ser uma URL http ou https"))
    }
}

fn optional_http_url(value: &Option<String>, ctx: &()) -> garde::Result {
    match value {
        Some(url) => http_url(url, ctx),
        None => Ok(()),
    }
}

fn not_blank(value: &str, _ctx: &()) -> garde::Result {
    if value.trim().is_empty() {
        Err(garde::Error::new("não pode estar em branco"))
    } else {
        Ok(())
    }
}

fn phone_number(value: &str, _ctx: &()) -> garde::Result {
    phone::normalize(value)
        .map(|_| ())
        .map_err(|e| garde::Error::new(format!("número de telefone inválido: {e}")))
}

fn required_id(value: &Uuid, _ctx: &()) -> garde::Result {
    if value.is_nil() {
        Err(garde::Error::new("campo obrigatório"))
    } else {
        Ok(())
    }
}

fn uuid_text(value: &str, _ctx: &()) -> garde::Result {
    Uuid::parse_str(value)
        .map(|_| ())
        .map_err(|_| garde::Error::new("deve ser um UUID válido"))
}

/// Message text is required unless media is attached.
fn message_text(media_url: &Option<String>) -> impl FnOnce(&String, &()) -> garde::Result + '_ {
    move |value, _ctx| {
        let chars = value.chars().count();
        if chars > MAX_MESSAGE_CHARS {
            return Err(garde::Error::new(format!(
                "deve ter no máximo {MAX_MESSAGE_CHARS} caracteres"
            )));
        }
        if media_url.is_none() && value.trim().is_empty() {
            return Err(garde::Error::new("campo obrigatório quando não há mídia"));
        }
        Ok(())
    }
}

// --- Instances ---

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateInstanceRequest {
    #[garde(length(chars, max = 100), custom(not_blank))]
    pub name: String,
    #[garde(custom(optional_http_url))]
    pub webhook_url: Option<String>,
}

/// `{id}` path parameter of instance and message routes.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IdPath {
    #[garde(custom(uuid_text))]
    pub id: String,
}

impl IdPath {
    /// The validated id. Unparseable ids (unreachable after validation)
    /// become the nil id, which matches nothing.
    pub fn uuid(&self) -> Uuid {
        Uuid::parse_str(&self.id).unwrap_or_default()
    }
}

pub type InstanceIdPath = IdPath;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct ListInstancesQuery {
    #[garde(range(min = 1))]
    pub page: u32,
    #[garde(range(min = 1, max = MAX_PAGE_SIZE))]
    pub limit: u32,
    #[garde(skip)]
    pub status: Option<InstanceStatus>,
}

impl Default for ListInstancesQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            status: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct WebhookConfigRequest {
    #[garde(custom(http_url))]
    pub url: String,
    #[garde(length(min = 1))]
    pub events: Vec<WebhookEvent>,
    #[garde(skip)]
    pub enabled: Option<bool>,
    #[garde(length(chars, min = 8, max = 128))]
    pub secret: Option<String>,
}

// --- Messages ---

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[garde(custom(required_id))]
    pub instance_id: Uuid,
    #[garde(custom(phone_number))]
    pub to: String,
    #[garde(custom(message_text(&self.media_url)))]
    pub message: String,
    #[garde(custom(optional_http_url))]
    pub media_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct BulkSendRequest {
    #[garde(custom(required_id))]
    pub instance_id: Uuid,
    #[garde(length(min = 1, max = MAX_BULK_RECIPIENTS), inner(custom(phone_number)))]
    pub recipients: Vec<String>,
    #[garde(length(chars, max = MAX_MESSAGE_CHARS), custom(not_blank))]
    pub message: String,
    #[garde(range(max = 60_000))]
    pub delay_ms: u64,
}

impl Default for BulkSendRequest {
    fn default() -> Self {
        Self {
            instance_id: Uuid::nil(),
            recipients: Vec::new(),
            message: String::new(),
            delay_ms: DEFAULT_BULK_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct ListMessagesQuery {
    #[garde(skip)]
    pub instance_id: Option<Uuid>,
    #[garde(skip)]
    pub direction: Option<MessageDirection>,
    #[garde(range(min = 1))]
    pub page: u32,
    #[garde(range(min = 1, max = MAX_PAGE_SIZE))]
    pub limit: u32,
}

impl Default for ListMessagesQuery {
    fn default() -> Self {
        Self {
            instance_id: None,
            direction: None,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

// --- Accounts ---

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RegisterRequest {
    #[garde(email)]
    pub email: String,
    #[garde(length(chars, min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginRequest {
    #[garde(length(min = 1))]
    pub email: String,
    #[garde(length(min = 1))]
    pub password: String,
}

/// Row offset of a 1-based page.
pub fn page_offset(page: u32, limit: u32) -> u32 {
    page.saturating_sub(1).saturating_mul(limit)
}
