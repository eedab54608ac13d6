use std::process::ExitCode;

fn main() -> ExitCode {
    seasoncast_cli::run()
}
