pub mod artifacts;
pub mod boards;
pub mod config;
pub mod diff;
pub mod job;
pub mod manifest;
pub mod result;
pub mod sample;
pub mod summary;
pub mod verbose;
pub mod west;

use std::{io::ErrorKind, path::Path};

/// Makes `s` safe for use in file names: anything other than ASCII
/// alphanumerics and `_` becomes `_`, then everything is lowercased.
pub fn sanitize_lower(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

pub fn maybe_create_dir(path: impl AsRef<Path>) -> std::io::Result<()> {
    match std::fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize() {
        assert_eq!(sanitize_lower("nrf5340dk/nrf5340/cpuapp/NS"), "nrf5340dk_nrf5340_cpuapp_ns");
        assert_eq!(sanitize_lower("actinius_icarus@2.0.0"), "actinius_icarus_2_0_0");
        assert_eq!(sanitize_lower("Ünï"), "_n_");
    }
}
