use std::process::ExitCode;

fn main() -> ExitCode {
    match azc::cli::main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("❌ {err}");
            ExitCode::FAILURE
        }
    }
}
