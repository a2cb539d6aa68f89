use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match conclave::boot::boot().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}
