pub mod app;
pub mod calendar;
pub mod command_processor;
pub mod config;
pub mod routine;
pub mod state;

use anyhow::Result;
use env_logger::Env;
use log::info;

pub fn run(config: Config, command_line: Option<String>) -> Result<()> {
    let app = app::Application::new(config)?;
    match command_line {
        Some(line) => app.run_once(&line),
        None => {
            info!("Initializing saison application");
            app.run()
        }
    }
}

/// Set up env_logger; `RUST_LOG` overrides the configured level.
pub fn init_logger(default_level: &str) {
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .format(|buf, record| {
            use chrono::Local;
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
}

// Re-export commonly used types
pub use calendar::{parse, IcsError, ParsedEvent, RecurrenceInfo};
pub use config::Config;
pub use routine::{current_cycle, next_active_date, CycleConfig, CycleError, CycleWindow};
