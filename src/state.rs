//! Application State
//!
//! Wires configuration, the oracle provider and the workspace store into one
//! engine instance.

use std::sync::Arc;

use prompt_forge_core::WorkspaceRepository;
use prompt_forge_llm::{create_provider, LlmProvider};
use tokio::sync::RwLock;

use crate::models::settings::AppConfig;
use crate::services::context::ContextOptimizer;
use crate::services::history::HistoryStore;
use crate::services::oracle::{OracleGateway, RetryPolicy};
use crate::services::orchestrator::{OrchestratorSettings, RunOrchestrator};
use crate::services::telemetry::TelemetryHub;
use crate::storage::{ConfigService, JsonWorkspaceStore};
use crate::utils::error::{AppError, AppResult};

/// One loaded workspace and the services operating on it.
pub struct AppState {
    config: AppConfig,
    history: Arc<HistoryStore>,
    orchestrator: Arc<RunOrchestrator>,
    repository: Arc<dyn WorkspaceRepository>,
    active_project: RwLock<Option<String>>,
}

impl AppState {
    /// Load the workspace from `repository` and build the engine around it.
    pub async fn open(
        config: AppConfig,
        provider: Arc<dyn LlmProvider>,
        repository: Arc<dyn WorkspaceRepository>,
    ) -> AppResult<Self> {
        config.validate().map_err(AppError::config)?;

        let workspace = repository.load().await?;
        let active = workspace.active_project_id.clone();
        tracing::info!(
            "[AppState] Loaded {} project(s) using provider {} ({})",
            workspace.projects.len(),
            provider.name(),
            provider.model()
        );

        let history = Arc::new(HistoryStore::from_workspace(workspace, config.history_cap));
        let gateway = Arc::new(OracleGateway::new(
            provider,
            ContextOptimizer::new(config.context.clone())?,
            RetryPolicy::from_config(&config),
        ));
        let orchestrator = Arc::new(RunOrchestrator::new(
            history.clone(),
            gateway,
            Arc::new(TelemetryHub::new()),
            OrchestratorSettings::from_config(&config),
        ));

        Ok(Self {
            config,
            history,
            orchestrator,
            repository,
            active_project: RwLock::new(active),
        })
    }

    /// Build from the config file and the default workspace location.
    pub async fn from_config_service(config_service: &ConfigService) -> AppResult<Self> {
        let config = config_service.get_config().clone();
        let provider = create_provider(config.provider_config().map_err(AppError::config)?)?;
        let repository: Arc<dyn WorkspaceRepository> = Arc::new(JsonWorkspaceStore::new()?);
        Self::open(config, provider, repository).await
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    pub fn orchestrator(&self) -> &Arc<RunOrchestrator> {
        &self.orchestrator
    }

    pub async fn active_project(&self) -> Option<String> {
        self.active_project.read().await.clone()
    }

    pub async fn set_active_project(&self, project_id: &str) -> AppResult<()> {
        if !self.history.contains(project_id).await {
            return Err(AppError::not_found(format!("Project {}", project_id)));
        }
        *self.active_project.write().await = Some(project_id.to_string());
        Ok(())
    }

    /// Create a project and make it active.
    pub async fn create_project(&self, name: &str) -> String {
        let summary = self.history.create_project(name).await;
        *self.active_project.write().await = Some(summary.id.clone());
        summary.id
    }

    /// Delete a project through the orchestrator so its run is torn down too.
    pub async fn delete_project(&self, project_id: &str) -> AppResult<()> {
        self.orchestrator.remove_project(project_id).await?;
        let mut active = self.active_project.write().await;
        if active.as_deref() == Some(project_id) {
            *active = None;
        }
        Ok(())
    }

    /// Persist every project in one atomic save.
    pub async fn save(&self) -> AppResult<()> {
        let workspace = self.history.export(self.active_project().await).await;
        self.repository.save(&workspace).await?;
        tracing::debug!("[AppState] Saved {} project(s)", workspace.projects.len());
        Ok(())
    }
}
