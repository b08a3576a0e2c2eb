// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod errors;
pub mod http_server;
pub mod parameters;
pub mod process_image;

pub use errors::{ApiError, ErrorResponse};
pub use http_server::{build_router, serve, start_server, AppState, HealthResponse};
pub use parameters::{parameters_handler, ParametersRequest, ParametersResponse};
pub use process_image::{process_image_handler, ProcessImageRequest, ProcessImageResponse};
