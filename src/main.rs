use clap::Parser;

use workstack::cli::Cli;
use workstack::git::GitError;

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    if let Err(e) = workstack::cli::run(cli) {
        // Signal-terminated children keep their conventional exit code
        // (130 for SIGINT); everything else is a plain failure.
        let code = match e.downcast_ref::<GitError>() {
            Some(GitError::ChildProcessExited { code: 130, .. }) => 130,
            _ => 1,
        };
        eprintln!("{}", format_error_chain(&e));
        std::process::exit(code);
    }
}

/// Errors carrying styled Display output (GitError) print as-is; everything
/// else gets the standard error prefix with its context chain.
fn format_error_chain(e: &anyhow::Error) -> String {
    if e.downcast_ref::<GitError>().is_some() {
        return format!("{e}");
    }
    let mut message = workstack::styling::error_message(format!("{e}"));
    for cause in e.chain().skip(1) {
        message.push_str(&format!("\n  caused by: {cause}"));
    }
    message
}
