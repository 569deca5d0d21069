use crate::utils::truncate_str;
use crate::Preview;
use std::fmt::Display;
use std::path::PathBuf;
use tracing::{debug, error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt as subscriber_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

#[derive(Debug)]
pub struct LogConfig {
    pub log_dir: PathBuf,
    pub log_level: String,
    pub console_output: bool,
    pub file_output: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".into(),
            log_level: "info".into(),
            console_output: true,
            file_output: false,
        }
    }
}

/// Installs the global tracing subscriber: an env-filtered pretty console
/// layer and, optionally, a daily-rolling file layer.
pub fn setup_logging(config: LogConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let mut layers = Vec::new();

    if config.console_output {
        let console_layer = subscriber_fmt::layer()
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .pretty();
        layers.push(console_layer.boxed());
    }

    if config.file_output {
        std::fs::create_dir_all(&config.log_dir).expect("Failed to create log directory");

        let file_appender =
            RollingFileAppender::new(Rotation::DAILY, &config.log_dir, "wishlist-preview.log");

        let file_layer = subscriber_fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_writer(file_appender);

        layers.push(file_layer.boxed());
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .expect("Failed to set global default subscriber");

    debug!("Logging system initialized with config: {:?}", config);
}

/// Logs a generated preview as a readable card.
pub fn log_preview_card(preview: &Preview) {
    const WIDTH: usize = 72;
    let rule = "═".repeat(WIDTH);

    info!(
        "\n╔{rule}╗\n\
         Title:  {}\n\
         Image:  {}\n\
         Price:  {} {}\n\
         Site:   {}\n\
         Source: {}\n\
         ╚{rule}╝",
        truncate_str(&preview.title, WIDTH),
        truncate_str(preview.image.as_deref().unwrap_or("-"), WIDTH),
        preview.price.as_deref().unwrap_or("-"),
        preview.currency.as_deref().unwrap_or(""),
        truncate_str(&preview.site_name, WIDTH),
        truncate_str(preview.source_url.as_deref().unwrap_or("-"), WIDTH),
    );
}

/// Logs a preview failure for a given input as a readable card.
pub fn log_error_card<E: Display + std::error::Error>(input: &str, error: &E) {
    const WIDTH: usize = 72;
    let rule = "═".repeat(WIDTH);

    let mut details = error.to_string();
    if let Some(source) = error.source() {
        details = format!("{details} (caused by: {source})");
    }

    error!(
        "\n╔{rule}╗\n\
         Input: {}\n\
         Error: {}\n\
         ╚{rule}╝",
        truncate_str(input, WIDTH),
        truncate_str(&details, WIDTH),
    );
}
