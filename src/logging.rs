use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

//engine log levels are upper case (eg INFO), env filters want lower case
fn filter_directive(level: &str) -> String {
    level.trim().to_lowercase()
}

//initializes logging to stderr at the given level, RUST_LOG takes precedence
pub fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_levels_become_filter_directives() {
        assert_eq!(filter_directive("INFO"), "info");
        assert_eq!(filter_directive(" Debug "), "debug");
    }
}
