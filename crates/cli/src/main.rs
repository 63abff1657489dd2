use std::process::ExitCode;

fn main() -> ExitCode {
    skyrchitect_cli::run()
}
