use crate::command_processor::{CommandArgs, CommandProcessor, Session};
use crate::config::Config;
use crate::state::StateManager;
use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

pub struct Application {
    command_processor: CommandProcessor,
    session: Session,
}

impl Application {
    pub fn new(config: Config) -> Result<Self> {
        let state = StateManager::new()?;
        Ok(Self { command_processor: CommandProcessor::new(), session: Session { config, state } })
    }

    /// Run a single command line, as given on the process command line.
    pub fn run_once(&self, line: &str) -> Result<()> {
        let args = CommandArgs::parse(line)?;
        self.command_processor.execute(args, &self.session)
    }

    pub fn run(&self) -> Result<()> {
        log::info!("Starting saison terminal");
        let mut rl = DefaultEditor::new()?;

        println!("Welcome to saison! Type 'help' for commands.");

        loop {
            match rl.readline("saison> ") {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(line.as_str());
                    if is_exit(&line) {
                        break;
                    }
                    if let Err(err) = self.run_once(&line) {
                        log::error!("Failed to process command: {:?}", err);
                        println!("Error: {:#}", err);
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    println!("Error: {:?}", err);
                    break;
                }
            }
        }

        log::info!("Exiting saison terminal");
        Ok(())
    }
}

fn is_exit(line: &str) -> bool {
    let line = line.trim();
    line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")
}
