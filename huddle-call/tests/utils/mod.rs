pub mod mesh_harness;
pub mod state_helpers;

pub use mesh_harness::*;
pub use state_helpers::*;
