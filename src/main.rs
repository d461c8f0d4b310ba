mod ast;
mod builtins;
mod config;
mod env;
mod error;
mod eval;
mod flow;
mod help;
mod highlighter;
mod interpreter;
mod lexer;
mod modules;
mod parser;
mod span;
mod typecheck;
mod value;

use clap::Parser;
use config::{InterpreterConfig, VERSION, WELCOME_MESSAGE};
use highlighter::SonaHelper;
use interpreter::Interpreter;
use rustyline::error::ReadlineError;
use rustyline::{Config, Editor};
use std::path::PathBuf;

/// Sona: a dynamically-typed scripting language.
#[derive(Parser, Debug)]
#[command(name = "sona")]
#[command(version = VERSION)]
#[command(about = "A dynamically-typed scripting language")]
#[command(long_about = "An interpreter with a lexer, parser, tree-walking evaluator, module loader, and optional static type checker")]
struct CliArgs {
    /// Script file to execute (optional - if not provided, starts REPL)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Type-check mode: off, warn, or enforce (overrides sona.toml)
    #[arg(long = "type-check")]
    type_check: Option<String>,

    /// Enable debug logging
    #[arg(long = "debug")]
    debug: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let cwd = std::env::current_dir()?;
    let mut config = InterpreterConfig::load(&cwd);
    if let Some(mode) = &args.type_check {
        if let Some(parsed) = typecheck::Mode::from_str(mode) {
            config.type_check_mode = parsed;
        } else {
            eprintln!("Warning: unrecognized --type-check mode '{}'", mode);
        }
    }
    if args.debug {
        config.debug = true;
    }

    let mut interp = Interpreter::new(config);

    if let Some(script_path) = args.script {
        run_script(&mut interp, &script_path)?;
        return Ok(());
    }

    run_repl(&mut interp)
}

/// Executes a script file and exits, propagating any interpreter error as
/// the process's exit status.
fn run_script(interp: &mut Interpreter, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read script file {}: {}", path.display(), e))?;
    match interp.run_file(&path.display().to_string(), &source) {
        Ok(_) => Ok(()),
        Err(envelope) => {
            for frame in envelope.stack.iter().rev() {
                eprintln!("  in {} at {}:{}", frame.function, frame.file, frame.line);
            }
            Err(format!(
                "{} at {}:{}:{}: {}",
                envelope.kind, envelope.file, envelope.line, envelope.column, envelope.message
            )
            .into())
        }
    }
}

/// Interactive read-eval-print loop, persisting bindings across lines via
/// `Interpreter::eval_repl`.
fn run_repl(interp: &mut Interpreter) -> Result<(), Box<dyn std::error::Error>> {
    let rl_config = Config::builder().auto_add_history(true).build();
    let mut rl = Editor::with_config(rl_config)
        .map_err(|e| format!("Failed to initialize REPL: {}", e))?;
    rl.set_helper(Some(SonaHelper::new()));

    let history_file = ".sona_history";
    let _ = rl.load_history(history_file);

    println!("{} v{}", WELCOME_MESSAGE, VERSION);
    println!("Type .exit or press Ctrl-D to quit.");

    loop {
        let readline = rl.readline("sona> ");
        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match trimmed {
                    ".exit" | ".quit" => {
                        println!("Goodbye!");
                        break;
                    }
                    ".clear" => {
                        print!("\x1B[2J\x1B[H");
                        continue;
                    }
                    _ => {}
                }

                match interp.eval_repl(&line) {
                    Ok(value) => println!("=> {}", value),
                    Err(envelope) => {
                        eprintln!("{} at {}:{}: {}", envelope.kind, envelope.line, envelope.column, envelope.message)
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {}", err);
                break;
            }
        }
    }

    let _ = rl.save_history(history_file);
    Ok(())
}
