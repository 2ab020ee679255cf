pub mod assets;
pub mod reports;
pub mod seeds;
pub mod tester;

pub use assets::{FileContent, TesterAssets};
pub use seeds::resolve_seed_inputs;
pub use tester::*;
