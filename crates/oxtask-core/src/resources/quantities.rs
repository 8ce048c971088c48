use crate::error::{CoreError, Result};

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;
pub const GIB: u64 = 1024 * MIB;

/// Largest `user_data` payload the API accepts once decoded
pub const MAX_USER_DATA_BYTES: usize = 32 * KIB as usize;

/// Convert a user-facing GiB quantity into the byte count the API expects.
///
/// Zero and values that overflow a u64 are rejected.
pub fn gib_to_bytes(parameter: &str, gib: u64) -> Result<u64> {
    if gib == 0 {
        return Err(CoreError::validation_failed(
            parameter,
            "must be a positive integer",
            format!("Set '{}' to the desired size in GiB, e.g. 10", parameter),
        ));
    }

    gib.checked_mul(GIB).ok_or_else(|| {
        CoreError::validation_failed(
            parameter,
            format!("{} GiB does not fit in a 64-bit byte count", gib),
            "Use a smaller value",
        )
    })
}

/// Render a byte count with the largest clean binary unit (e.g. "10 GiB")
pub fn format_bytes(bytes: u64) -> String {
    if bytes > 0 && bytes % GIB == 0 {
        format!("{} GiB", bytes / GIB)
    } else if bytes > 0 && bytes % MIB == 0 {
        format!("{} MiB", bytes / MIB)
    } else if bytes > 0 && bytes % KIB == 0 {
        format!("{} KiB", bytes / KIB)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gib_to_bytes() {
        assert_eq!(gib_to_bytes("size", 1).unwrap(), 1024 * 1024 * 1024);
        assert_eq!(gib_to_bytes("size", 10).unwrap(), 10_737_418_240);
    }

    #[test]
    fn test_gib_to_bytes_rejects_zero() {
        let err = gib_to_bytes("memory", 0).unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed { .. }));
        assert!(err.to_string().contains("memory"));
    }

    #[test]
    fn test_gib_to_bytes_rejects_overflow() {
        assert!(gib_to_bytes("size", u64::MAX / 2).is_err());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(10 * GIB), "10 GiB");
        assert_eq!(format_bytes(512 * MIB), "512 MiB");
        assert_eq!(format_bytes(1500 * MIB), "1500 MiB");
        assert_eq!(format_bytes(256 * KIB), "256 KiB");
        assert_eq!(format_bytes(1023), "1023 B");
    }
}
