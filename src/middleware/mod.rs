// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! Request-admission middleware: authentication, rate limiting, CSRF,
//! and security headers.

pub mod auth;
pub mod csrf;
pub mod rate_limit;
pub mod security;

pub use auth::{populate_auth, require_auth, CurrentUser};
pub use csrf::{csrf_protection, CsrfProtection};
pub use rate_limit::{SlidingWindowLimiter, Sweeper};
