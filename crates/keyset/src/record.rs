//! Stored form of one key-set row.
//!
//! Rows are JSON objects whose column names match the key-set table
//! definition. Big integers are written as decimal strings so the values stay
//! exact in any JSON reader. A column that is absent or `null` decodes to
//! `None`; whether that is acceptable depends on the reader.

use std::fmt;

use chrono::{DateTime, Utc};
use keyset_storage::{StorageError, StorageResult};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::{
    error::{KeySetError, KeySetResult},
    signature::{KeyPairHolder, Signature, SignatureSet},
};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct KeySetRecord {
    #[serde(rename = "timestamp")]
    pub(crate) version: String,
    pub(crate) valid: bool,
    #[serde(default, with = "decimal")]
    pub(crate) identity_manager_public_key_mod: Option<BigUint>,
    #[serde(default, with = "decimal")]
    pub(crate) identity_manager_public_key_exp: Option<BigUint>,
    #[serde(default, with = "decimal")]
    pub(crate) application_private_key_mod: Option<BigUint>,
    #[serde(default, with = "decimal")]
    pub(crate) application_private_key_exp: Option<BigUint>,
    #[serde(default, with = "decimal")]
    pub(crate) application_public_key_mod: Option<BigUint>,
    #[serde(default, with = "decimal")]
    pub(crate) application_public_key_exp: Option<BigUint>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl KeySetRecord {
    /// Builds a valid row holding a newly generated key pair.
    pub(crate) fn new(
        version: &str,
        identity_manager_signature: &Signature,
        key_pair: &KeyPairHolder,
    ) -> Self {
        let application = key_pair.public_signature();
        Self {
            version: version.to_owned(),
            valid: true,
            identity_manager_public_key_mod: Some(identity_manager_signature.modulus().clone()),
            identity_manager_public_key_exp: Some(identity_manager_signature.exponent().clone()),
            application_private_key_mod: Some(key_pair.private_modulus().clone()),
            application_private_key_exp: Some(key_pair.private_exponent().clone()),
            application_public_key_mod: Some(application.modulus().clone()),
            application_public_key_exp: Some(application.exponent().clone()),
            updated_at: Utc::now(),
        }
    }

    /// Same row with `valid = false`. Key material is kept.
    pub(crate) fn retired(mut self) -> Self {
        self.valid = false;
        self.updated_at = Utc::now();
        self
    }

    pub(crate) fn encode(&self) -> StorageResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            StorageError::serialization_with_source("failed to encode key-set record", e)
        })
    }

    pub(crate) fn decode(bytes: &[u8]) -> StorageResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            StorageError::serialization_with_source("failed to decode key-set record", e)
        })
    }

    pub(crate) fn application_signature(&self) -> KeySetResult<Signature> {
        self.signature(
            "application public key",
            &self.application_public_key_mod,
            &self.application_public_key_exp,
        )
    }

    pub(crate) fn identity_manager_signature(&self) -> KeySetResult<Signature> {
        self.signature(
            "identity manager public key",
            &self.identity_manager_public_key_mod,
            &self.identity_manager_public_key_exp,
        )
    }

    pub(crate) fn signature_set(&self) -> KeySetResult<SignatureSet> {
        Ok(SignatureSet {
            version: self.version.clone(),
            application_signature: self.application_signature()?,
            identity_manager_signature: self.identity_manager_signature()?,
        })
    }

    fn signature(
        &self,
        what: &str,
        modulus: &Option<BigUint>,
        exponent: &Option<BigUint>,
    ) -> KeySetResult<Signature> {
        match (modulus, exponent) {
            (Some(m), Some(e)) => Ok(Signature::new(m.clone(), e.clone())),
            (None, _) => {
                Err(KeySetError::inconsistent(&self.version, format!("{what} modulus is missing")))
            },
            (_, None) => {
                Err(KeySetError::inconsistent(&self.version, format!("{what} exponent is missing")))
            },
        }
    }
}

impl fmt::Debug for KeySetRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySetRecord")
            .field("version", &self.version)
            .field("valid", &self.valid)
            .field("updated_at", &self.updated_at)
            .finish_non_exhaustive()
    }
}

/// Serde adapter for `Option<BigUint>` as a decimal string or `null`.
mod decimal {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub(super) fn serialize<S: Serializer>(
        value: &Option<BigUint>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(n) => serializer.serialize_str(&n.to_str_radix(10)),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<BigUint>, D::Error> {
        let Some(text) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        BigUint::parse_bytes(text.as_bytes(), 10)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid decimal integer: {text:?}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample() -> KeySetRecord {
        let idm = Signature::new(BigUint::from(3233u32), BigUint::from(17u32));
        let pair = KeyPairHolder::new(
            BigUint::from(3127u32),
            BigUint::from(2011u32),
            BigUint::from(3127u32),
            BigUint::from(3u32),
        );
        KeySetRecord::new("2023-01-01", &idm, &pair)
    }

    #[test]
    fn test_encodes_big_integers_as_decimal_strings() {
        let json: serde_json::Value =
            serde_json::from_slice(&sample().encode().unwrap()).unwrap();

        assert_eq!(json["timestamp"], "2023-01-01");
        assert_eq!(json["valid"], true);
        assert_eq!(json["identity_manager_public_key_mod"], "3233");
        assert_eq!(json["application_private_key_exp"], "2011");
        assert_eq!(json["application_public_key_exp"], "3");
    }

    #[test]
    fn test_large_values_survive_encoding_exactly() {
        let mut record = sample();
        let large = BigUint::parse_bytes(b"123456789012345678901234567890123456789", 10).unwrap();
        record.application_public_key_mod = Some(large.clone());

        let decoded = KeySetRecord::decode(&record.encode().unwrap()).unwrap();
        assert_eq!(decoded.application_public_key_mod, Some(large));
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_missing_and_null_columns_decode_to_none() {
        let decoded = KeySetRecord::decode(
            br#"{
                "timestamp": "v1",
                "valid": true,
                "identity_manager_public_key_mod": null,
                "updated_at": "2023-01-01T00:00:00Z"
            }"#,
        )
        .unwrap();

        assert!(decoded.identity_manager_public_key_mod.is_none());
        assert!(decoded.application_public_key_exp.is_none());
    }

    #[test]
    fn test_missing_key_material_is_inconsistent() {
        let mut record = sample();
        record.application_public_key_exp = None;

        let err = record.application_signature().unwrap_err();
        assert!(matches!(err, KeySetError::Inconsistent { ref version, .. } if version == "2023-01-01"));
        assert!(record.identity_manager_signature().is_ok());
        assert!(record.signature_set().is_err());
    }

    #[test]
    fn test_malformed_integer_is_a_serialization_error() {
        let result = KeySetRecord::decode(
            br#"{ "timestamp": "v1", "valid": true,
                  "application_public_key_mod": "12x",
                  "updated_at": "2023-01-01T00:00:00Z" }"#,
        );
        assert!(matches!(result, Err(StorageError::Serialization { .. })));
    }

    #[test]
    fn test_retired_keeps_key_material() {
        let record = sample();
        let retired = record.clone().retired();

        assert!(!retired.valid);
        assert_eq!(retired.application_private_key_exp, record.application_private_key_exp);
        assert_eq!(retired.application_signature().unwrap(), record.application_signature().unwrap());
    }

    #[test]
    fn test_debug_omits_key_material() {
        let debug = format!("{:?}", sample());
        assert!(debug.contains("2023-01-01"));
        assert!(!debug.contains("private"), "key material leaked: {debug}");
    }
}
