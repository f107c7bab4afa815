//! TreeClean command-line entry point.

use clap::Parser;
use treeclean::{
    cli::Cli,
    diff::DiffError,
    engine::EngineError,
    error::{ExitCode, StructuredError},
};

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    let interrupted = err
        .downcast_ref::<EngineError>()
        .is_some_and(|e| matches!(e, EngineError::Interrupted))
        || err
            .downcast_ref::<DiffError>()
            .is_some_and(|e| matches!(e, DiffError::Interrupted));
    if interrupted {
        ExitCode::Interrupted
    } else {
        ExitCode::GeneralError
    }
}

fn main() {
    let cli = Cli::parse();
    let json_errors = cli.json_errors;

    match treeclean::run_app(cli) {
        Ok(code) => std::process::exit(code.as_i32()),
        Err(err) => {
            let exit_code = exit_code_for(&err);
            if json_errors {
                let structured = StructuredError::new(&err, exit_code);
                match serde_json::to_string_pretty(&structured) {
                    Ok(json) => eprintln!("{json}"),
                    Err(_) => eprintln!("[{}] Error: {:#}", exit_code.code_prefix(), err),
                }
            } else {
                eprintln!("[{}] Error: {:#}", exit_code.code_prefix(), err);
            }
            std::process::exit(exit_code.as_i32());
        }
    }
}
