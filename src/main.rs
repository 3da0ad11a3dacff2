use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use davi::{
    diagnostic, docs,
    interpreter::{Builtins, Config, ExecutionError, Interpreter, STACK_SIZE},
    parser::ParseError,
};
use log::{debug, error};

/// Run a DaVinci script.
#[derive(Debug, Parser)]
#[command(name = "davi", version)]
struct Cli {
    /// Print the builtin function reference and exit
    #[arg(long, value_enum, num_args = 0..=1, default_missing_value = "markdown")]
    generate_docs: Option<docs::Format>,

    /// Script to run
    #[arg(required_unless_present = "generate_docs")]
    file: Option<PathBuf>,

    /// Arguments passed to the script, available through args()
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error("Error reading file. Please check the file path and try again. ({0})")]
    Read(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    if let Some(format) = cli.generate_docs {
        return match docs::render(&Builtins::standard(), format) {
            Ok(out) => {
                print!("{}", out);
                ExitCode::SUCCESS
            }
            Err(err) => {
                println!("Can't render docs: {}", err);
                ExitCode::FAILURE
            }
        };
    }
    let Some(file) = cli.file else {
        return ExitCode::FAILURE;
    };

    let script = file.clone();
    let runner = std::thread::Builder::new()
        .name("davi".to_string())
        .stack_size(STACK_SIZE)
        .spawn(move || {
            let mut source = Vec::new();
            let result = run(&script, cli.args, &mut source);
            (result, source)
        });
    let (result, source) = match runner.map(|handle| handle.join()) {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(_)) => return ExitCode::FAILURE,
        Err(err) => {
            println!("Can't start interpreter thread: {}", err);
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(RunError::Execution(ExecutionError::Exit(code))) => {
            debug!("script exited with {}", code);
            ExitCode::from(exit_status(code))
        }
        Err(err) => {
            error!("{}: {}", file.display(), err);
            if let RunError::Parse(err) = &err {
                debug!("while parsing {}", err.context().unwrap_or("tokens"));
            }
            let position = match &err {
                RunError::Parse(err) => Some(err.position()),
                RunError::Execution(err) => err.position(),
                RunError::Read(_) => None,
            };
            match position {
                Some(position) => print!("{}", diagnostic::render(&source, position, &err.to_string())),
                None => println!("{}", err),
            }
            ExitCode::FAILURE
        }
    }
}

/// Process status for `exit(code)`. Codes outside 0..=255 can't be
/// represented and become 255 rather than wrapping.
fn exit_status(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(u8::MAX)
}

/// Reads, parses and runs `file`. The stripped source is left in `source` for
/// error reporting.
fn run(file: &Path, args: Vec<String>, source: &mut Vec<u8>) -> Result<(), RunError> {
    *source = diagnostic::strip_wrapper(&std::fs::read(file)?);
    let program = davi::parser::parse_program(source)?;
    let stats = Interpreter::new(Config::default().with_args(args)).interpret(&program)?;
    debug!("{:?}", stats);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_exit_status() {
        assert_eq!(exit_status(0), 0);
        assert_eq!(exit_status(3), 3);
        assert_eq!(exit_status(255), 255);
        assert_eq!(exit_status(256), 255);
        assert_eq!(exit_status(-1), 255);
    }

    #[test]
    fn test_cli() {
        let cli = Cli::try_parse_from(["davi", "--generate-docs"]).unwrap();
        assert_eq!(cli.generate_docs, Some(docs::Format::Markdown));
        let cli = Cli::try_parse_from(["davi", "--generate-docs", "json"]).unwrap();
        assert_eq!(cli.generate_docs, Some(docs::Format::Json));

        let cli = Cli::try_parse_from(["davi", "app.davi", "-v", "x"]).unwrap();
        assert_eq!(cli.file, Some(PathBuf::from("app.davi")));
        assert_eq!(cli.args, ["-v", "x"]);
        assert!(Cli::try_parse_from(["davi"]).is_err());
    }
}
