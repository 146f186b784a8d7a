// src/state.rs
// Shared application state: every collaborator is constructed once at
// startup and handed to the router behind an Arc.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::alert::{
    AlertDispatcher, AlertProvider, LogProvider, Severity, WebhookProvider,
};
use crate::config::VigilConfig;
use crate::cron::CronOrchestrator;
use crate::health::codebase::CodebaseScanner;
use crate::health::environment::EnvironmentCheck;
use crate::health::gemini::{GeminiProbe, LiveProbe};
use crate::health::HealthCheckEngine;
use crate::repair::RepairEngine;
use crate::store::archive::ArchiveManager;
use crate::store::event_log::EventLog;
use crate::trend::TrendAnalyzer;

pub struct AppState {
    pub admin_access_key: String,
    pub log: EventLog,
    pub engine: Arc<HealthCheckEngine>,
    pub repair: RepairEngine,
    pub dispatcher: Arc<AlertDispatcher>,
    pub trend: TrendAnalyzer,
    pub cron: CronOrchestrator,
}

impl AppState {
    /// Wire the full object graph from configuration plus injected live
    /// collaborators. Tests substitute a stub probe and a recording
    /// provider here.
    pub fn new(
        config: &VigilConfig,
        probe: Arc<dyn LiveProbe>,
        provider: Arc<dyn AlertProvider>,
    ) -> Self {
        let data_dir = Path::new(&config.data_dir);
        let scan_dir = PathBuf::from(&config.scan_dir);
        let env_file = PathBuf::from(&config.env_file);

        let log = EventLog::new(data_dir, config.max_active);
        let archive = ArchiveManager::new(data_dir);

        let engine = Arc::new(HealthCheckEngine::new(
            CodebaseScanner::new(scan_dir.clone()),
            EnvironmentCheck::new(env_file.clone()),
            probe,
        ));
        let repair = RepairEngine::new(scan_dir, env_file);

        let min_level = config
            .alerts_min_level
            .parse::<Severity>()
            .unwrap_or(Severity::Warn);
        let dispatcher = Arc::new(AlertDispatcher::new(
            provider,
            min_level,
            config.alerts_recipient.clone(),
            data_dir,
        ));

        let trend = TrendAnalyzer::new(log.clone(), archive.clone());
        let cron = CronOrchestrator::new(
            engine.clone(),
            log.clone(),
            archive,
            dispatcher.clone(),
            trend.clone(),
            config.daily_hour,
            config.weekly_weekday(),
            config.retention_days,
        );

        Self {
            admin_access_key: config.admin_access_key.clone(),
            log,
            engine,
            repair,
            dispatcher,
            trend,
            cron,
        }
    }

    /// Production wiring: live Gemini probe, and a webhook provider when
    /// one is configured, otherwise alerts go to the service log.
    pub fn from_config(config: &VigilConfig) -> Self {
        let probe: Arc<dyn LiveProbe> = Arc::new(GeminiProbe::new(
            config.gemini_model.clone(),
            config.gemini_timeout_secs,
            PathBuf::from(&config.env_file),
        ));

        let provider: Arc<dyn AlertProvider> =
            if config.alerts_provider == "webhook" && !config.alerts_webhook_url.is_empty() {
                Arc::new(WebhookProvider::new(config.alerts_webhook_url.clone()))
            } else {
                Arc::new(LogProvider)
            };

        Self::new(config, probe, provider)
    }
}
