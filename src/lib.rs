pub mod auto_adopt;
pub mod candidates;
pub mod config;
pub mod correction;
pub mod detection;
pub mod editor;
pub mod errors;
pub mod models;
pub mod ocr;
pub mod patterns;
pub mod pipeline;
pub mod queue;
pub mod roi;
pub mod sampling;
pub mod storage;

pub use config::Config;
pub use errors::CorrectionError;
pub use pipeline::CorrectionPipeline;

/// Install a fmt subscriber filtered by `RUST_LOG`. Safe to call more
/// than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
