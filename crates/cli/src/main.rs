use std::process::ExitCode;

fn main() -> ExitCode {
    construkt_cli::run()
}
