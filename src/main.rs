use anyhow::Result;
use saison::Config;

fn main() -> Result<()> {
    let config = Config::load()?;
    saison::init_logger(&config.logging.level);

    // Arguments run a single command, otherwise start the interactive terminal
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command_line = if args.is_empty() {
        None
    } else {
        Some(args.iter().map(|a| quote_arg(a)).collect::<Vec<_>>().join(" "))
    };

    saison::run(config, command_line)
}

fn quote_arg(arg: &str) -> String {
    if arg.contains(char::is_whitespace) {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}
