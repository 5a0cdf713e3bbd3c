use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::ConfigError;

#[derive(Clone, Debug)]
pub struct LogOptions {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LogOptions {
    fn default() -> Self {
        LogOptions {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Builds the subscriber explicitly from CLI inputs, once, in `main`: a
/// leveled console sink plus an optional plain-text file sink. Step findings
/// are additionally carried in the report, so nothing depends on capturing
/// this output.
pub fn init(options: &LogOptions) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_new(&options.level)
        .map_err(|err| ConfigError::Logger(format!("bad level `{}`: {}", options.level, err)))?;

    let console = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter).with(console);

    match &options.file {
        Some(path) => {
            let file = std::fs::File::create(path).map_err(|err| {
                ConfigError::Logger(format!("cannot open log file `{}`: {}", path.display(), err))
            })?;
            registry
                .with(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
                .init();
        }
        None => registry.init(),
    }

    Ok(())
}
