use std::fs::File;

use colored::Colorize;
use common::env_config::Config;
use middleware::logger::MonitorMiddleware;

pub mod middleware {
    pub mod logger;
}

pub fn setup(config: &Config) -> Result<(), fern::InitError> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            let color = match record.level() {
                log::Level::Info => "green",
                log::Level::Warn => "yellow",
                log::Level::Error => "red",
                log::Level::Debug => "magenta",
                log::Level::Trace => "bright black",
            };
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%H:%M:%S]"),
                record.target(),
                record.level().to_string().color(color),
                message
            ))
        })
        .level(config.log_level)
        .level_for("hyper", log::LevelFilter::Off)
        .level_for("hyper_util", log::LevelFilter::Off)
        .level_for("reqwest", log::LevelFilter::Warn)
        .chain(std::io::stdout());

    if let Some(path) = &config.log_file {
        File::create(path).map_err(fern::InitError::Io)?;
        dispatch = dispatch.chain(fern::log_file(path)?);
    }

    dispatch.apply()?;
    Ok(())
}

pub fn middleware() -> MonitorMiddleware {
    MonitorMiddleware::new()
}
