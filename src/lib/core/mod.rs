pub mod concurrency;
pub mod errors;
pub mod fs;
pub mod io;

pub mod prelude {
    pub use super::concurrency::determine_allowed_cpus;
    pub use super::errors::{is_broken_pipe, CalderaError, Result};
    pub use super::fs::{is_bgzipped, make_parent_dirs};
    pub use super::io::{get_reader, get_writer};
}
