use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use rox::ast_printer::AstPrinter;
use rox::error::LoxError;
use rox::parser::Parser;
use rox::scanner::{self, Scanner};
use rox::session::{ConsoleReporter, RunStatus, Session};

const EXIT_USAGE: i32 = 64;
const EXIT_STATIC: i32 = 65;
const EXIT_RUNTIME: i32 = 70;
const EXIT_IO: i32 = 74;

#[derive(ClapParser, Debug)]
#[command(
    version,
    about = "Lox language interpreter",
    long_about = None,
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Script to run; starts an interactive prompt when omitted
    script: Option<PathBuf>,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print tokens as JSON objects, one per line
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints its AST
    Parse { filename: PathBuf },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: PathBuf },

    /// Runs input from a file as a Lox program, or starts a prompt without one
    Run { filename: Option<PathBuf> },
}

/// Reads a source file and validates it as UTF‑8.
fn read_file(filename: &Path) -> Result<String> {
    info!("Reading file: {:?}", filename);

    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf: Vec<u8> = Vec::new();

    let bytes: usize = reader
        .read_to_end(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    let text: String = String::from_utf8(buf)
        .map_err(|e| LoxError::from(e.utf8_error()))
        .context(format!("File {:?} is not valid UTF-8", filename))?;

    Ok(text)
}

/// Like [`read_file`], but an unreadable input ends the process.
fn read_or_exit(filename: &Path) -> String {
    match read_file(filename) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("{:#}", e);
            process::exit(EXIT_IO);
        }
    }
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            // Strip 'rox::' from module path
            let module = record
                .module_path()
                .map(|path| path.strip_prefix("rox::").unwrap_or(path))
                .unwrap_or("<unnamed>");

            writeln!(
                buf,
                "[{} {}:{}] - {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn tokenize(filename: &Path, json: bool) -> Result<()> {
    info!("Running Tokenize subcommand");

    let source = read_or_exit(filename);
    let mut tokenized = true;

    for token in Scanner::new(&source) {
        match token {
            Ok(token) if json => println!("{}", serde_json::to_string(&token)?),

            Ok(token) => println!("{}", token),

            Err(e) => {
                tokenized = false;
                eprintln!("{}", e);
            }
        }
    }

    if !tokenized {
        debug!("Tokenization failed, exiting with code {}", EXIT_STATIC);
        process::exit(EXIT_STATIC);
    }

    Ok(())
}

/// Scan and parse `filename` as one expression, exiting on static errors.
fn parse_single_expression(filename: &Path) -> rox::ast::Expr {
    let source = read_or_exit(filename);
    let (tokens, lex_errors) = scanner::scan_all(&source);
    let parsed = Parser::new(&tokens).parse_expression();

    for e in &lex_errors {
        eprintln!("{}", e);
    }

    match parsed {
        Ok(expr) if lex_errors.is_empty() => expr,

        Ok(_) => process::exit(EXIT_STATIC),

        Err(errors) => {
            for e in &errors {
                eprintln!("{}", e);
            }
            process::exit(EXIT_STATIC);
        }
    }
}

fn run_file(filename: &Path) -> Result<()> {
    info!("Running file {:?}", filename);

    let source = read_or_exit(filename);
    let mut session = Session::new();

    match session.run(&source, &mut ConsoleReporter) {
        RunStatus::Completed => Ok(()),
        RunStatus::StaticError => process::exit(EXIT_STATIC),
        RunStatus::RuntimeError => process::exit(EXIT_RUNTIME),
    }
}

/// One line per run; globals persist across lines, errors do not end the loop.
fn run_prompt() -> Result<()> {
    info!("Starting interactive prompt");

    let mut session = Session::new();
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut line = String::new();

    loop {
        print!("> ");
        io::stdout().flush().context("Failed to flush prompt")?;

        line.clear();
        let read: usize = input
            .read_line(&mut line)
            .context("Failed to read from stdin")?;

        if read == 0 {
            println!();
            break;
        }

        let status = session.run(&line, &mut ConsoleReporter);
        debug!("Prompt line finished with {:?}", status);
    }

    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::try_parse().unwrap_or_else(|e| {
        let code = if e.use_stderr() { EXIT_USAGE } else { 0 };
        let _ = e.print();
        process::exit(code);
    });

    if args.log {
        init_logger()?;
    } else {
        // Minimal logger so the `log` macros have a sink.
        Builder::new().filter_level(log::LevelFilter::Off).init();
    }

    info!("CLI arguments: {:?}", args);

    match args.command {
        Some(Commands::Tokenize { filename, json }) => tokenize(&filename, json)?,

        Some(Commands::Parse { filename }) => {
            info!("Running Parse subcommand");

            let expr = parse_single_expression(&filename);
            println!("{}", AstPrinter::print(&expr));
        }

        Some(Commands::Evaluate { filename }) => {
            info!("Running Evaluate subcommand");

            let expr = parse_single_expression(&filename);
            let mut session = Session::new();

            match session.interpreter().evaluate_expression(&expr) {
                Ok(value) => println!("{}", value),
                Err(e) => {
                    eprintln!("{}", e);
                    process::exit(EXIT_RUNTIME);
                }
            }
        }

        Some(Commands::Run { filename: Some(filename) }) => run_file(&filename)?,

        Some(Commands::Run { filename: None }) => run_prompt()?,

        None => match args.script {
            Some(script) => run_file(&script)?,
            None => run_prompt()?,
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rox::token::TokenType;

    #[test]
    fn json_token_shape() {
        let token = Scanner::new("var").next().unwrap().unwrap();
        let json = serde_json::to_value(&token).unwrap();

        assert_eq!(json["lexeme"], "var");
        assert_eq!(json["line"], 1);
        assert_eq!(token.token_type, TokenType::VAR);
    }

    #[test]
    fn cli_accepts_script_or_subcommand() {
        let cli = Cli::try_parse_from(["rox", "prog.lox"]).unwrap();
        assert_eq!(cli.script, Some(PathBuf::from("prog.lox")));
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["rox", "tokenize", "a.lox", "--json"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Tokenize { json: true, .. })));

        let cli = Cli::try_parse_from(["rox", "--log"]).unwrap();
        assert!(cli.log && cli.script.is_none());
    }

    #[test]
    fn read_file_loads_whole_source() {
        let dir = std::env::temp_dir();
        let good = dir.join(format!("rox-read-{}.lox", process::id()));
        let bad = dir.join(format!("rox-read-{}-bad.lox", process::id()));

        std::fs::write(&good, "print \"héllo\";\n").unwrap();
        std::fs::write(&bad, [b'p', 0xFF, b'\n']).unwrap();

        assert_eq!(read_file(&good).unwrap(), "print \"héllo\";\n");

        let err = read_file(&bad).unwrap_err();
        assert!(format!("{:#}", err).contains("not valid UTF-8"));

        let missing = dir.join("rox-definitely-missing.lox");
        assert!(read_file(&missing).is_err());

        std::fs::remove_file(good).unwrap();
        std::fs::remove_file(bad).unwrap();
    }
}
