mod dispatcher;
mod library;
mod problem;
mod router;
mod telemetry;
mod templates;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use obliga_mailer::{Mailer, MailerConfig, SmtpMailer};
use obliga_storage::Database;
use obliga_util::{load_env_file, AppConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let storage = Database::connect(&config.database_url).await?;
    storage.run_migrations().await?;

    let mailer: Option<Arc<dyn Mailer>> = match MailerConfig::from_env() {
        Ok(mail_config) => Some(Arc::new(SmtpMailer::new(&mail_config)?)),
        Err(err) if config.environment.is_development() => {
            warn!(stage = "app", error = %err, "SMTP not configured, dispatcher disabled");
            None
        }
        Err(err) => return Err(err.into()),
    };

    if let Some(mailer) = mailer {
        dispatcher::Dispatcher::new(storage.clone(), mailer, config.dispatch_interval).spawn();
    }

    let state = router::AppState::new(metrics, storage);

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
