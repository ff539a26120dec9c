//! aqua-server: HTTP surface and process bootstrap for AquaAnalyzer

pub mod http;
pub mod sse;
pub mod startup;

pub use http::{build_app, create_router, ApiState};
