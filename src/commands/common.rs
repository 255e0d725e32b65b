use anyhow::{Context, Result};
use caldera_lib::hic::InMemoryDataset;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Parse a comma-separated resolution list, ascending.
pub fn parse_resolutions(input: &str) -> Result<Vec<u32>> {
    let mut values = Vec::new();
    for part in input.split(',') {
        let value: u32 = part
            .trim()
            .parse()
            .with_context(|| format!("Bad resolution '{}'", part))?;
        values.push(value);
    }
    values.sort_unstable();
    Ok(values)
}

/// Load the shared in-memory dataset from a contact dump.
pub fn open_dataset(
    contacts: &Path,
    base_resolution: u32,
    chrom_sizes: Option<&PathBuf>,
) -> Result<Arc<InMemoryDataset>> {
    let ds = InMemoryDataset::from_contacts_path(
        contacts,
        base_resolution,
        chrom_sizes.map(|p| p.as_path()),
    )
    .with_context(|| format!("Failed to load contacts from {}", contacts.display()))?;
    Ok(Arc::new(ds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolutions_parse_sorted() {
        assert_eq!(parse_resolutions("5000,1000, 2000").unwrap(), vec![1000, 2000, 5000]);
        assert!(parse_resolutions("1000,abc").is_err());
    }
}
