// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sharing Server - One-Time Share Links
//!
//! Issues links that reveal a vault secret or a stored document exactly
//! once. The content is fetched when the share is created, sealed with
//! AES-256-GCM and released only to the first viewer that passes the link's
//! access policies.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `crypto` - Share tokens and payload sealing (ring)
//! - `policy` - IP, network and time-of-day access rules
//! - `providers` - Upstream secret vault and document store clients
//! - `service` - Share lifecycle and email template management
//! - `storage` - Share store (redb or in-memory) with atomic consume
//! - `notify` - Recipient notification rendering and delivery

pub mod api;
pub mod config;
pub mod crypto;
pub mod error;
pub mod models;
pub mod notify;
pub mod policy;
pub mod providers;
pub mod service;
pub mod state;
pub mod storage;
