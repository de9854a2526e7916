use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Integrity-checked cache entries for statement analyses.
///
/// Each cached analysis is stored as JSON next to its SHA-256 checksum.
/// Reads recompute the checksum; a mismatch or undecodable entry is treated
/// as a miss so the statement is processed again instead of serving a
/// corrupted analysis.

/// Hex SHA-256 of an uploaded document, used as its cache identity.
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Wrapper for cached data with integrity validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedCacheEntry {
    /// The cached value as a JSON string
    pub data: String,
    /// SHA-256 checksum of the data (hex encoded)
    pub checksum: String,
}

impl ValidatedCacheEntry {
    pub fn new(data: String) -> Self {
        let checksum = Self::compute_checksum(&data);
        Self { data, checksum }
    }

    fn compute_checksum(data: &str) -> String {
        fingerprint(data.as_bytes())
    }

    /// Returns true if the checksum matches, false if tampered
    pub fn is_valid(&self) -> bool {
        Self::compute_checksum(&self.data) == self.checksum
    }

    pub fn serialize(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Deserializes and validates a cache entry
    ///
    /// Returns Some(data) if valid, None if corrupted or invalid JSON
    pub fn deserialize_and_validate(serialized: &str) -> Option<String> {
        let entry: ValidatedCacheEntry = serde_json::from_str(serialized).ok()?;

        if entry.is_valid() {
            Some(entry.data)
        } else {
            tracing::warn!(
                "Cache validation failed: checksum mismatch. Expected: {}, Data length: {}",
                entry.checksum,
                entry.data.len()
            );
            None
        }
    }

    /// Serializes a value and wraps it with its checksum, ready to insert.
    pub fn seal<T: Serialize>(value: &T) -> Option<String> {
        let data = serde_json::to_string(value).ok()?;
        Some(Self::new(data).serialize())
    }

    /// Validates an entry and decodes the value inside it.
    pub fn unseal<T: DeserializeOwned>(serialized: &str) -> Option<T> {
        let data = Self::deserialize_and_validate(serialized)?;
        serde_json::from_str(&data).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::{analyze, StatementAnalysis, StatementRecord};

    #[test]
    fn test_cache_entry_validation() {
        let data = r#"{"bank_name": "HDFC", "bounced_transactions": 0}"#.to_string();
        let entry = ValidatedCacheEntry::new(data.clone());

        assert!(entry.is_valid());
        assert_eq!(entry.data, data);
    }

    #[test]
    fn test_tampered_cache_returns_none() {
        let entry = ValidatedCacheEntry::new(r#"{"minimum_balance": 25000}"#.to_string());
        let tampered = entry.serialize().replace("25000", "95000");

        assert_eq!(ValidatedCacheEntry::deserialize_and_validate(&tampered), None);
    }

    #[test]
    fn test_analysis_survives_seal_and_unseal() {
        let analysis = analyze(StatementRecord {
            bank_name: "ICICI".to_string(),
            salary_credits: vec![42_000.0, 42_500.0],
            minimum_balance: 12_000.0,
            ..StatementRecord::default()
        });

        let sealed = ValidatedCacheEntry::seal(&analysis).unwrap();
        let restored: StatementAnalysis = ValidatedCacheEntry::unseal(&sealed).unwrap();

        assert_eq!(restored.record.bank_name, "ICICI");
        assert_eq!(restored.record.salary_credits, analysis.record.salary_credits);
        assert_eq!(restored.red_flag_analysis, analysis.red_flag_analysis);
        assert_eq!(restored.processing_timestamp, analysis.processing_timestamp);
    }

    #[test]
    fn test_fingerprint_is_stable_and_content_sensitive() {
        assert_eq!(fingerprint(b"statement"), fingerprint(b"statement"));
        assert_ne!(fingerprint(b"statement"), fingerprint(b"statement2"));
        assert_eq!(fingerprint(b"").len(), 64);
    }
}
