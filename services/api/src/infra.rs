use join_github::admission::{AdmissionEngine, GithubClient, SlackNotifier};
use join_github::config::AppConfig;
use join_github::error::AppError;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type ApiEngine = AdmissionEngine<GithubClient, SlackNotifier>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn github_client(config: &AppConfig) -> Result<GithubClient, AppError> {
    let token = config.github.token()?;
    Ok(GithubClient::new(config.github.api_url.as_str(), token)?)
}

pub(crate) fn slack_notifier(config: &AppConfig) -> Result<SlackNotifier, AppError> {
    let token = config.slack.token()?;
    Ok(SlackNotifier::new(
        config.slack.api_url.as_str(),
        token,
        config.slack.channel.as_str(),
    )?)
}

/// Wires the production GitHub and Slack clients into an engine.
///
/// Both clients are blocking and must be built outside the async runtime.
pub(crate) fn build_engine(config: &AppConfig) -> Result<Arc<ApiEngine>, AppError> {
    let gateway = github_client(config)?;
    let notifier = slack_notifier(config)?;

    Ok(Arc::new(AdmissionEngine::new(
        Arc::new(config.policy.clone()),
        Arc::new(gateway),
        Arc::new(notifier),
        config.admission.clone(),
    )))
}
