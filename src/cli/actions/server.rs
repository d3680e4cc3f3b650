use crate::api::{self, AppConfig};
use crate::cli::actions::Action;
use anyhow::{Context, Result};
use url::Url;

/// Handle the server action
/// # Errors
/// Return an error if the backend URL is invalid or the server fails to start
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            backend_url,
            public_url,
        } => {
            let backend_url = Url::parse(&backend_url)
                .with_context(|| format!("Invalid backend URL: {backend_url}"))?;

            let config = AppConfig::new(public_url);

            api::new(port, &backend_url, config).await?;
        }
    }

    Ok(())
}
