// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image processing API endpoint module
//!
//! Provides POST /process_image: the full intake -> mapping -> generation
//! -> publish pipeline for one captured frame.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::process_image_handler;
pub use request::ProcessImageRequest;
pub use response::ProcessImageResponse;
