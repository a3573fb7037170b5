//! Feature modules implementing the bizsync API

pub mod companies;

use std::path::PathBuf;

use axum::Router;

use crate::import::Reconciler;

/// Shared state for feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// Strict single-record reconciliation and lookups
    pub reconciler: Reconciler,
    /// Drop directory for queued uploads
    pub uploaded_dir: PathBuf,
}

/// Router with every feature mounted under its path prefix
pub fn router(state: FeatureState) -> Router<()> {
    Router::new().nest("/companies", companies::companies_routes().with_state(state))
}
