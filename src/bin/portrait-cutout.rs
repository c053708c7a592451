//! Portrait Cutout CLI Tool
//!
//! Command-line sidecar for portrait matte refinement and background
//! replacement using the portrait-cutout library.

#[cfg(feature = "cli")]
fn main() -> std::process::ExitCode {
    match portrait_cutout::cli::main() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::ExitCode::FAILURE
        },
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
