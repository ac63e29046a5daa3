// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Reading engine failures: is it worth retrying without the crawler, and
//! what should the user be told.

/// Statuses typical of rate limiting, bot walls and overloaded gateways.
const BLOCKED_STATUSES: [u16; 4] = [403, 429, 502, 504];

/// Matched against the lowercased failure text. Portuguese stems cover the
/// engine's own messages ("manutencao", "bloqueado").
const BLOCKED_MARKERS: [&str; 7] = [
    "anti-bot",
    "antibot",
    "captcha",
    "manut",
    "maintenance",
    "bloque",
    "blocked",
];

const UNREACHABLE_MARKERS: [&str; 4] = [
    "falha ao buscar url",
    "name resolution",
    "getaddrinfo",
    "failed to resolve",
];

const TIMEOUT_MARKERS: [&str; 2] = ["timeout", "timed out"];

/// Whether a failed crawler call looks like the site is blocking us or is
/// under maintenance.
pub fn looks_blocked(status: u16, message: &str) -> bool {
    if BLOCKED_STATUSES.contains(&status) {
        return true;
    }
    let text = message.to_lowercase();
    BLOCKED_MARKERS.iter().any(|marker| text.contains(marker))
}

/// Rewrite a raw engine error for display.
pub fn friendly_message(original: &str, url: &str) -> String {
    if original.is_empty() {
        return "Nao foi possivel processar a URL informada".to_string();
    }

    let text = original.to_lowercase();
    if UNREACHABLE_MARKERS.iter().any(|m| text.contains(m)) {
        return format!(
            "Nao foi possivel acessar {url}. Confirme se o endereco existe e tente novamente."
        );
    }
    if TIMEOUT_MARKERS.iter().any(|m| text.contains(m)) {
        return format!("A conexao com {url} demorou demais. Tente novamente em instantes.");
    }

    original.to_string()
}
