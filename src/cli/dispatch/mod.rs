use crate::cli::actions::Action;
use anyhow::Result;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        backend_url: matches
            .get_one("backend-url")
            .map(|s: &String| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --backend-url"))?,
        public_url: matches
            .get_one("public-url")
            .map(|s: &String| s.to_string())
            .unwrap_or_else(|| "http://localhost:8080".to_string()),
    })
}
