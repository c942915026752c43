//! Shared state for the API layer.

use std::sync::Arc;

use crate::config::Settings;
use crate::progress::{ProgressHub, PushChannelConfig};
use crate::report::ReportStore;

/// Shared context for all API routes.
#[derive(Clone)]
pub struct ApiContext {
    pub settings: Arc<Settings>,
    pub progress: Arc<ProgressHub>,
    pub reports: ReportStore,
    pub push_config: PushChannelConfig,
    pub http: reqwest::Client,
}

impl ApiContext {
    pub fn new(settings: Settings) -> Self {
        let reports = ReportStore::new(settings.reports_dir.clone());
        Self {
            settings: Arc::new(settings),
            progress: Arc::new(ProgressHub::new()),
            reports,
            push_config: PushChannelConfig::default(),
            http: reqwest::Client::new(),
        }
    }

    /// Override the push timing, mainly for tests.
    pub fn with_push_config(mut self, push_config: PushChannelConfig) -> Self {
        self.push_config = push_config;
        self
    }
}
