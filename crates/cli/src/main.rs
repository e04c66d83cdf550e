//! edgeml CLI entry point.

// The submitted job id is the command's output
#![allow(clippy::print_stdout, clippy::print_stderr)]

use edgeml::cli::{self, EXIT_OK, exit_code_for, render_error};
use edgeml::run;
use edgeml::tracing::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() {
    let cli = cli::parse();

    if let Err(e) = init_tracing(TracingConfig {
        format: cli.format,
        level: cli.level.into(),
        filter: None,
    }) {
        eprintln!("{e:?}");
    }

    let code = match run::execute(&cli).await {
        Ok(summary) => {
            if let Some(job) = summary.job {
                println!("{}", job.name);
            }
            EXIT_OK
        }
        Err(err) => {
            render_error(&err);
            exit_code_for(&err)
        }
    };

    std::process::exit(code);
}
