//! Key layout for the key-set table and its validity index.
//!
//! Every key starts with the tenant id, so one tenant's data never shares a
//! prefix with another's:
//!
//! ```text
//! {tenant}/{service}_authorization_v1_data/schema
//! {tenant}/{service}_authorization_v1_data/rows/{version}
//! {tenant}/{service}_authorization_v1_valid_index/schema
//! {tenant}/{service}_authorization_v1_valid_index/entries/{version}
//! ```
//!
//! An index entry exists exactly when the row for that version is valid.
//! Versions are opaque, so each one is percent-escaped into a single segment:
//! `%` becomes `%25` and `/` becomes `%2F`. Everything else is kept as is.

use keyset_storage::TenantId;

/// Names and key builders for one service's key-set table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySetLayout {
    table_name: String,
    index_name: String,
}

impl KeySetLayout {
    /// Derives the table and index names for `service_name`.
    #[must_use]
    pub fn new(service_name: &str) -> Self {
        Self {
            table_name: format!("{service_name}_authorization_v1_data"),
            index_name: format!("{service_name}_authorization_v1_valid_index"),
        }
    }

    /// Returns the key-set table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Returns the validity index name.
    #[must_use]
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub(crate) fn table_schema_key(&self, tenant: &TenantId) -> Vec<u8> {
        format!("{tenant}/{}/schema", self.table_name).into_bytes()
    }

    pub(crate) fn index_schema_key(&self, tenant: &TenantId) -> Vec<u8> {
        format!("{tenant}/{}/schema", self.index_name).into_bytes()
    }

    pub(crate) fn row_key(&self, tenant: &TenantId, version: &str) -> Vec<u8> {
        format!("{tenant}/{}/rows/{}", self.table_name, escape_segment(version)).into_bytes()
    }

    pub(crate) fn index_entry_key(&self, tenant: &TenantId, version: &str) -> Vec<u8> {
        let mut key = self.index_prefix(tenant);
        key.extend_from_slice(escape_segment(version).as_bytes());
        key
    }

    /// Prefix shared by every index entry of `tenant`.
    pub(crate) fn index_prefix(&self, tenant: &TenantId) -> Vec<u8> {
        format!("{tenant}/{}/entries/", self.index_name).into_bytes()
    }
}

fn escape_segment(version: &str) -> String {
    let mut escaped = String::with_capacity(version.len());
    for c in version.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '/' => escaped.push_str("%2F"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Reverses the escaping applied to a version segment.
///
/// Returns `None` for a segment this layout could not have produced.
pub(crate) fn unescape_segment(segment: &str) -> Option<String> {
    let mut version = String::with_capacity(segment.len());
    let mut rest = segment;
    while let Some(at) = rest.find('%') {
        version.push_str(&rest[..at]);
        let escape = rest.get(at..at + 3)?;
        match escape {
            "%25" => version.push('%'),
            "%2F" => version.push('/'),
            _ => return None,
        }
        rest = &rest[at + 3..];
    }
    version.push_str(rest);
    Some(version)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn tenant(id: &str) -> TenantId {
        TenantId::parse(id).unwrap()
    }

    #[test]
    fn test_names_follow_service() {
        let layout = KeySetLayout::new("billing");
        assert_eq!(layout.table_name(), "billing_authorization_v1_data");
        assert_eq!(layout.index_name(), "billing_authorization_v1_valid_index");
    }

    #[test]
    fn test_keys() {
        let layout = KeySetLayout::new("svc");
        let acme = tenant("acme");

        assert_eq!(layout.row_key(&acme, "v1"), b"acme/svc_authorization_v1_data/rows/v1");
        assert_eq!(
            layout.index_entry_key(&acme, "v1"),
            b"acme/svc_authorization_v1_valid_index/entries/v1"
        );
        assert_eq!(layout.table_schema_key(&acme), b"acme/svc_authorization_v1_data/schema");
        assert_eq!(
            layout.index_schema_key(&acme),
            b"acme/svc_authorization_v1_valid_index/schema"
        );
    }

    #[test]
    fn test_index_entries_sit_under_index_prefix() {
        let layout = KeySetLayout::new("svc");
        let acme = tenant("acme");

        let entry = layout.index_entry_key(&acme, "2023-01-01");
        assert!(entry.starts_with(&layout.index_prefix(&acme)));
        assert!(!layout.row_key(&acme, "2023-01-01").starts_with(&layout.index_prefix(&acme)));
    }

    #[test]
    fn test_tenant_prefixes_do_not_overlap() {
        let layout = KeySetLayout::new("svc");

        // "acme" is a string prefix of "acme2", but the separator keeps them apart.
        let other = layout.index_entry_key(&tenant("acme2"), "v1");
        assert!(!other.starts_with(&layout.index_prefix(&tenant("acme"))));
    }

    #[test]
    fn test_reserved_characters_stay_in_one_segment() {
        let layout = KeySetLayout::new("svc");
        let acme = tenant("acme");

        assert_eq!(
            layout.row_key(&acme, "2023/01/01"),
            b"acme/svc_authorization_v1_data/rows/2023%2F01%2F01"
        );
        assert_eq!(
            layout.index_entry_key(&acme, "50%/x"),
            b"acme/svc_authorization_v1_valid_index/entries/50%25%2Fx"
        );
        // Distinct versions never share a key, even when one looks escaped.
        assert_ne!(layout.row_key(&acme, "a%2Fb"), layout.row_key(&acme, "a/b"));
    }

    #[test]
    fn test_unescape_rejects_foreign_segments() {
        assert_eq!(unescape_segment("2023%2F01").as_deref(), Some("2023/01"));
        assert_eq!(unescape_segment("100%25").as_deref(), Some("100%"));
        assert_eq!(unescape_segment("bad%2"), None);
        assert_eq!(unescape_segment("bad%41"), None);
    }

    proptest! {
        #[test]
        fn escaped_versions_decode_to_themselves(version in "\\PC{0,24}") {
            let escaped = escape_segment(&version);
            prop_assert!(!escaped.contains('/'));
            prop_assert_eq!(unescape_segment(&escaped), Some(version));
        }

        /// Without reserved characters index keys sort exactly like their
        /// versions.
        #[test]
        fn index_keys_preserve_version_order(a in "[0-9A-Za-z:.-]{1,20}", b in "[0-9A-Za-z:.-]{1,20}") {
            let layout = KeySetLayout::new("svc");
            let acme = tenant("acme");
            prop_assert_eq!(
                layout.index_entry_key(&acme, &a).cmp(&layout.index_entry_key(&acme, &b)),
                a.cmp(&b)
            );
        }
    }
}
