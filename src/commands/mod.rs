pub mod common;
pub mod detect;
pub mod hotspot;
pub mod sieve;

pub use detect::{run_detect, DetectArgs};
pub use hotspot::{run_hotspot, HotspotArgs};
pub use sieve::{run_sieve, SieveArgs};
