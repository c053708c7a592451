//! Support services: image I/O and progress reporting

pub mod io;
pub mod progress;

pub use io::{ImageIOService, LoadedImage};
pub use progress::{
    ConsoleProgressReporter, JsonLinesReporter, NoOpProgressReporter, ProcessingStage,
    ProgressReporter,
};
