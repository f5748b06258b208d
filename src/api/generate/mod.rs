// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Generation endpoints: submission and history listing

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{generate_handler, history_handler};
pub use request::{GenerateRequest, HistoryQuery, ALLOWED_DIMENSIONS};
pub use response::{GenerateResponse, HistoryResponse};
