use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    crosscheck_cli::run_with_args(std::env::args_os()).await.into()
}
