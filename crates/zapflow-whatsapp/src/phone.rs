// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Phone number normalization and WhatsApp chat ids.

use thiserror::Error;

/// Suffix of individual (non-group) chat ids.
pub const CHAT_SUFFIX: &str = "@c.us";

pub const MIN_DIGITS: usize = 10;
pub const MAX_DIGITS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhoneError {
    #[error("phone number has {0} digits, expected {MIN_DIGITS} to {MAX_DIGITS}")]
    Length(usize),
    #[error("phone number contains invalid character `{0}`")]
    InvalidChar(char),
}

/// Strip formatting (`+`, spaces, dashes, dots, parentheses) and check length.
///
/// Any other character is rejected rather than silently dropped.
pub fn normalize(raw: &str) -> Result<String, PhoneError> {
    let raw = raw.strip_suffix(CHAT_SUFFIX).unwrap_or(raw);
    let mut digits = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        match c {
            '0'..='9' => digits.push(c),
            '+' | ' ' | '-' | '.' | '(' | ')' => {}
            other => return Err(PhoneError::InvalidChar(other)),
        }
    }
    if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits.len()) {
        return Err(PhoneError::Length(digits.len()));
    }
    Ok(digits)
}

/// Chat id for a phone number (`5511999998888@c.us`).
pub fn to_chat_id(raw: &str) -> Result<String, PhoneError> {
    normalize(raw).map(|digits| format!("{digits}{CHAT_SUFFIX}"))
}

/// Digits part of a chat id; other ids are returned unchanged.
pub fn from_chat_id(chat_id: &str) -> &str {
    chat_id.split('@').next().unwrap_or(chat_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_common_formatting() {
        assert_eq!(normalize("+55 (11) 99999-8888").unwrap(), "5511999998888");
        assert_eq!(normalize("1.555.123.4567").unwrap(), "15551234567");
    }

    #[test]
    fn enforces_digit_count() {
        assert_eq!(normalize("12345"), Err(PhoneError::Length(5)));
        assert_eq!(
            normalize("1234567890123456"),
            Err(PhoneError::Length(16))
        );
        assert!(normalize("1234567890").is_ok());
    }

    #[test]
    fn rejects_letters() {
        assert_eq!(normalize("55119999x8888"), Err(PhoneError::InvalidChar('x')));
    }

    #[test]
    fn chat_id_round_trip() {
        let chat = to_chat_id("+55 11 99999 8888").unwrap();
        assert_eq!(chat, "5511999998888@c.us");
        assert_eq!(from_chat_id(&chat), "5511999998888");
        assert_eq!(to_chat_id(&chat).unwrap(), chat);
    }
}
