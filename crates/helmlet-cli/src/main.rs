use std::process::ExitCode;

fn main() -> ExitCode {
    helmlet_cli::run()
}
