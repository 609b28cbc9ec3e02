use std::process::ExitCode;

fn main() -> ExitCode {
    ipcbench_cli::run()
}
