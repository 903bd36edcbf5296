use clap::{Parser, Subcommand};
use ebb_lang::console;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "ebb",
    version,
    about = "Interactive console for the Ebb language"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the interactive console (the default)
    Repl,
    /// Feed a script through the console session, line by line
    Exec {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let code = match cli.command {
        None | Some(Commands::Repl) => console::run_repl(),
        Some(Commands::Exec { file }) => console::run_script(&file),
    };
    ExitCode::from(code as u8)
}
