//! Write-time version checks.
//!
//! A version is an opaque string. Reads accept any version and simply find
//! nothing for one that was never written; writes reject the empty version
//! and apply the configured [`VersionPolicy`].

use crate::{
    config::VersionPolicy,
    error::{KeySetError, KeySetResult},
};

pub(crate) fn validate_for_write(version: &str, policy: VersionPolicy) -> KeySetResult<()> {
    if version.is_empty() {
        return Err(KeySetError::invalid_argument("version", "must not be empty"));
    }
    if let VersionPolicy::FixedWidth(width) = policy
        && version.len() != width
    {
        return Err(KeySetError::invalid_argument(
            "version",
            format!("expected exactly {width} bytes, got {}", version.len()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_empty_is_rejected() {
        assert!(validate_for_write("", VersionPolicy::Opaque).is_err());
        assert!(validate_for_write("1", VersionPolicy::Opaque).is_ok());
        assert!(validate_for_write("2023/01/01", VersionPolicy::Opaque).is_ok());
    }

    #[test]
    fn test_fixed_width() {
        let policy = VersionPolicy::FixedWidth(10);
        assert!(validate_for_write("2023-01-01", policy).is_ok());
        assert!(validate_for_write("2023-1-1", policy).is_err());
        assert!(validate_for_write("2023-1-1", VersionPolicy::Opaque).is_ok());
    }

    proptest! {
        /// Opaque versions are accepted whatever characters they contain.
        #[test]
        fn opaque_accepts_any_non_empty_version(version in "\\PC{1,16}") {
            prop_assert!(validate_for_write(&version, VersionPolicy::Opaque).is_ok());
        }
    }
}
