use anyhow::{Error, Result};
use log::{error, warn};

/// Validate and normalize a requested CPU count.
pub fn determine_allowed_cpus(desired: usize) -> Result<usize> {
    if desired == 0 {
        error!("Must select > 0 threads");
        Err(Error::msg("Too few threads selected. Min 1"))
    } else if desired > num_cpus::get() {
        warn!(
            "Specified more threads than are available, using {}",
            desired
        );
        Ok(desired)
    } else {
        Ok(desired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_threads_rejected() {
        assert!(determine_allowed_cpus(0).is_err());
    }

    #[test]
    fn sane_thread_counts_pass_through() {
        assert_eq!(determine_allowed_cpus(1).unwrap(), 1);
        assert_eq!(determine_allowed_cpus(2).unwrap(), 2);
    }
}
