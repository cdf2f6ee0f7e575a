// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! Services module - authentication and session domain logic.

pub mod crypto;
pub mod events;
pub mod oauth;
pub mod password;
pub mod sessions;
pub mod tokens;
pub mod totp;

pub use crypto::TokenEncryptor;
pub use events::EventPublisher;
pub use oauth::{OAuthManager, OAuthProfile, OAuthStateStore};
pub use sessions::SessionRegistry;
pub use tokens::{Claims, TokenCodec, TokenKind};
pub use totp::PendingEnrollments;
