//! Board identity record
//!
//! Four 32-bit words written once at manufacturing time and read at every
//! boot. On flash it is 16 bytes, little-endian, in field order.

/// Encoded size of an [`Identity`]
pub const IDENTITY_LEN: usize = 16;

/// Board identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Identity {
    pub vendor_id: u32,
    pub product_id: u32,
    pub revision: u32,
    pub serial: u32,
}

impl Identity {
    pub fn to_bytes(&self) -> [u8; IDENTITY_LEN] {
        let mut out = [0u8; IDENTITY_LEN];
        let words = [self.vendor_id, self.product_id, self.revision, self.serial];
        for (chunk, word) in out.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    /// Decode a record; `None` unless `bytes` is exactly [`IDENTITY_LEN`] long
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != IDENTITY_LEN {
            return None;
        }
        let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Some(Self {
            vendor_id: word(0),
            product_id: word(4),
            revision: word(8),
            serial: word(12),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_little_endian_in_field_order() {
        let id = Identity {
            vendor_id: 0x0403_0201,
            product_id: 0x0807_0605,
            revision: 0x0C0B_0A09,
            serial: 0x100F_0E0D,
        };
        let bytes = id.to_bytes();
        assert_eq!(bytes, [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]);
        assert_eq!(Identity::from_bytes(&bytes), Some(id));
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert_eq!(Identity::from_bytes(&[0u8; 15]), None);
        assert_eq!(Identity::from_bytes(&[0u8; 17]), None);
    }
}
