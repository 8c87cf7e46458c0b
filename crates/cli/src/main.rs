use std::process::ExitCode;

fn main() -> ExitCode {
    approvals_cli::run()
}
