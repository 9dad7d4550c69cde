//! Byte-count conversions used to render quotas and size file candidates.
//!
//! Quota values are stored in the unit of their definition (`"GB"` for the
//! workspace quota). These helpers move between such amounts and raw bytes.

use std::str::FromStr;

const KIB: f64 = 1024.0;

/// Storage units understood by [`format_storage`], smallest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StorageUnit {
    Byte,
    Kilobyte,
    Megabyte,
    Gigabyte,
    Terabyte,
    Petabyte,
}

impl StorageUnit {
    const ALL: [StorageUnit; 6] = [
        StorageUnit::Byte,
        StorageUnit::Kilobyte,
        StorageUnit::Megabyte,
        StorageUnit::Gigabyte,
        StorageUnit::Terabyte,
        StorageUnit::Petabyte,
    ];

    fn exponent(self) -> i32 {
        match self {
            StorageUnit::Byte => 0,
            StorageUnit::Kilobyte => 1,
            StorageUnit::Megabyte => 2,
            StorageUnit::Gigabyte => 3,
            StorageUnit::Terabyte => 4,
            StorageUnit::Petabyte => 5,
        }
    }

    /// Number of bytes in one of this unit.
    pub fn bytes(self) -> f64 {
        KIB.powi(self.exponent())
    }

    pub fn label(self) -> &'static str {
        match self {
            StorageUnit::Byte => "byte",
            StorageUnit::Kilobyte => "KB",
            StorageUnit::Megabyte => "MB",
            StorageUnit::Gigabyte => "GB",
            StorageUnit::Terabyte => "TB",
            StorageUnit::Petabyte => "PB",
        }
    }
}

impl FromStr for StorageUnit {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "byte" | "bytes" => Ok(StorageUnit::Byte),
            "kb" => Ok(StorageUnit::Kilobyte),
            "mb" => Ok(StorageUnit::Megabyte),
            "gb" => Ok(StorageUnit::Gigabyte),
            "tb" => Ok(StorageUnit::Terabyte),
            "pb" => Ok(StorageUnit::Petabyte),
            _ => Err(()),
        }
    }
}

/// Render `amount` (expressed in `unit_hint`) at the largest unit whose
/// magnitude is at least one, rounded down.
///
/// Returns `None` when the unit hint is not a storage unit.
pub fn format_storage(unit_hint: &str, amount: f64) -> Option<String> {
    let unit: StorageUnit = unit_hint.parse().ok()?;
    let bytes = amount * unit.bytes();

    let target = StorageUnit::ALL
        .iter()
        .rev()
        .copied()
        .find(|candidate| bytes / candidate.bytes() >= 1.0)
        .unwrap_or(StorageUnit::Byte);

    let whole = (bytes / target.bytes()).floor() as u64;

    Some(match target {
        StorageUnit::Byte if whole == 1 => "1 byte".to_string(),
        StorageUnit::Byte => format!("{} bytes", whole),
        other => format!("{} {}", whole, other.label()),
    })
}

/// Convert an amount in `kb`, `mb` or `gb` to bytes, rounded down.
///
/// Larger units (`tb`, `pb`) and raw bytes are not accepted and return
/// `None`; callers rely on that to detect amounts they cannot size.
pub fn to_bytes(unit_hint: &str, amount: f64) -> Option<u64> {
    let factor = match unit_hint.trim().to_ascii_lowercase().as_str() {
        "gb" => KIB * KIB * KIB,
        "mb" => KIB * KIB,
        "kb" => KIB,
        _ => return None,
    };
    Some((amount * factor).floor() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_bytes_supported_units() {
        assert_eq!(to_bytes("gb", 1.0), Some(1_073_741_824));
        assert_eq!(to_bytes("mb", 1.0), Some(1_048_576));
        assert_eq!(to_bytes("kb", 1.0), Some(1024));
        assert_eq!(to_bytes(" GB", 2.0), Some(2_147_483_648));
    }

    #[test]
    fn test_to_bytes_rejects_other_units() {
        assert_eq!(to_bytes("tb", 1.0), None);
        assert_eq!(to_bytes("pb", 1.0), None);
        assert_eq!(to_bytes("bytes", 1.0), None);
        assert_eq!(to_bytes("files", 1.0), None);
    }

    #[test]
    fn test_format_storage_promotes_to_largest_unit() {
        assert_eq!(format_storage(" bytes", 1024.0 * 1024.0).as_deref(), Some("1 MB"));
        assert_eq!(format_storage(" kb", 1024.0 * 1024.0).as_deref(), Some("1 GB"));
        assert_eq!(format_storage("GB", 1536.0).as_deref(), Some("1 TB"));
        assert_eq!(format_storage("mb", 1500.0).as_deref(), Some("1 GB"));
    }

    #[test]
    fn test_format_storage_byte_tier_pluralization() {
        assert_eq!(format_storage("byte", 1.0).as_deref(), Some("1 byte"));
        assert_eq!(format_storage("bytes", 2.0).as_deref(), Some("2 bytes"));
        assert_eq!(format_storage("bytes", 1023.0).as_deref(), Some("1023 bytes"));
        assert_eq!(format_storage("bytes", 0.0).as_deref(), Some("0 bytes"));
    }

    #[test]
    fn test_format_storage_fractional_amounts_round_down() {
        assert_eq!(format_storage("GB", 0.6).as_deref(), Some("614 MB"));
        assert_eq!(format_storage("GB", 1.99).as_deref(), Some("1 GB"));
    }

    #[test]
    fn test_format_storage_unknown_unit() {
        assert_eq!(format_storage("parsecs", 3.0), None);
        assert_eq!(format_storage("", 3.0), None);
    }
}
