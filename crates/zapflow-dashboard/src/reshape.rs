// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend instance records reshaped for the dashboard UI.

use serde::Serialize;
use serde_json::Value;

/// Instance as rendered by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiInstance {
    pub id: String,
    pub name: String,
    pub status: &'static str,
    pub status_label: &'static str,
    pub phone: Option<String>,
    pub phone_formatted: Option<String>,
    pub created_at: Option<String>,
    pub last_activity_at: Option<String>,
}

/// Collapse backend statuses into the states the UI distinguishes.
pub fn ui_status(status: &str) -> &'static str {
    match status.to_ascii_lowercase().as_str() {
        "connected" | "ready" => "online",
        "connecting" => "connecting",
        "authenticating" | "qr" => "qr_pending",
        "disconnected" => "offline",
        _ => "unknown",
    }
}

pub fn status_label(ui_status: &str) -> &'static str {
    match ui_status {
        "online" => "Conectado",
        "connecting" => "Conectando",
        "qr_pending" => "Aguardando leitura do QR Code",
        "offline" => "Desconectado",
        _ => "Desconhecido",
    }
}

/// `+55 (11) 99999-8888` for Brazilian numbers, `+<digits>` otherwise.
pub fn format_phone(raw: &str) -> Option<String> {
    let local = raw.split('@').next().unwrap_or(raw);
    let digits: String = local.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    if digits.starts_with("55") && (digits.len() == 12 || digits.len() == 13) {
        let area = &digits[2..4];
        let number = &digits[4..];
        let split = number.len() - 4;
        return Some(format!(
            "+55 ({area}) {}-{}",
            &number[..split],
            &number[split..]
        ));
    }
    Some(format!("+{digits}"))
}

fn text(record: &Value, key: &str) -> Option<String> {
    record.get(key).and_then(Value::as_str).map(str::to_string)
}

impl UiInstance {
    /// Build from a backend instance object. Returns `None` without an id.
    pub fn from_backend(record: &Value) -> Option<Self> {
        let id = text(record, "id")?;
        let status = ui_status(record.get("status").and_then(Value::as_str).unwrap_or(""));
        let phone = text(record, "phone");
        Some(Self {
            id,
            name: text(record, "name").unwrap_or_default(),
            status,
            status_label: status_label(status),
            phone_formatted: phone.as_deref().and_then(format_phone),
            phone,
            created_at: text(record, "createdAt"),
            last_activity_at: text(record, "lastActivityAt"),
        })
    }
}

/// Reshape every instance in a backend list body.
pub fn reshape_list(body: &Value) -> (Vec<UiInstance>, u64) {
    let instances: Vec<UiInstance> = body
        .get("instances")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(UiInstance::from_backend).collect())
        .unwrap_or_default();
    let total = body
        .get("total")
        .and_then(Value::as_u64)
        .unwrap_or(instances.len() as u64);
    (instances, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn statuses_collapse_for_the_ui() {
        assert_eq!(ui_status("connected"), "online");
        assert_eq!(ui_status("ready"), "online");
        assert_eq!(ui_status("connecting"), "connecting");
        assert_eq!(ui_status("authenticating"), "qr_pending");
        assert_eq!(ui_status("disconnected"), "offline");
        assert_eq!(ui_status("banana"), "unknown");
        assert_eq!(status_label("online"), "Conectado");
        assert_eq!(status_label("unknown"), "Desconhecido");
    }

    #[test]
    fn brazilian_numbers_are_formatted() {
        assert_eq!(
            format_phone("5511999998888@c.us").as_deref(),
            Some("+55 (11) 99999-8888")
        );
        assert_eq!(
            format_phone("551133334444").as_deref(),
            Some("+55 (11) 3333-4444")
        );
        assert_eq!(format_phone("14155550100").as_deref(), Some("+14155550100"));
        assert_eq!(format_phone("@c.us"), None);
    }

    #[test]
    fn backend_records_are_reshaped() {
        let record = json!({
            "id": "9b2f",
            "name": "Loja",
            "status": "connected",
            "phone": "5511999998888",
            "createdAt": "2026-01-01T00:00:00.000Z",
            "lastActivityAt": "2026-01-02T00:00:00.000Z",
            "sessionPath": "/data/sessions/9b2f"
        });
        let ui = UiInstance::from_backend(&record).unwrap();
        assert_eq!(ui.status, "online");
        assert_eq!(ui.phone_formatted.as_deref(), Some("+55 (11) 99999-8888"));
        let rendered = serde_json::to_value(&ui).unwrap();
        assert!(rendered.get("sessionPath").is_none());
        assert_eq!(rendered["statusLabel"], "Conectado");

        assert!(UiInstance::from_backend(&json!({ "name": "sem id" })).is_none());
    }

    #[test]
    fn list_total_falls_back_to_length() {
        let (items, total) = reshape_list(&json!({ "instances": [{ "id": "a" }, { "id": "b" }] }));
        assert_eq!(items.len(), 2);
        assert_eq!(total, 2);
    }
}
