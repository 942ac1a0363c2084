//! Extra field parsing and construction.
//!
//! An extra field block is a sequence of `(id: u16, len: u16, data)` records.
//! Only the records this crate acts on are interpreted; everything else is
//! carried through untouched when an entry is copied.

/// ZIP64 extended information.
pub const ZIP64: u16 = 0x0001;

/// Extended timestamp (`UT`).
pub const EXTENDED_TIMESTAMP: u16 = 0x5455;

/// WinZip AES encryption parameters.
pub const WINZIP_AES: u16 = 0x9901;

/// Iterator over `(id, data)` records of an extra field block.
///
/// Stops at the first truncated record.
pub struct ExtraFields<'a> {
    data: &'a [u8],
}

impl<'a> Iterator for ExtraFields<'a> {
    type Item = (u16, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < 4 {
            return None;
        }
        let id = u16::from_le_bytes([self.data[0], self.data[1]]);
        let len = u16::from_le_bytes([self.data[2], self.data[3]]) as usize;
        if self.data.len() < 4 + len {
            self.data = &[];
            return None;
        }
        let body = &self.data[4..4 + len];
        self.data = &self.data[4 + len..];
        Some((id, body))
    }
}

/// Iterates the records of an extra field block.
pub fn fields(data: &[u8]) -> ExtraFields<'_> {
    ExtraFields { data }
}

/// Returns the body of the first record with the given id.
pub fn find(data: &[u8], id: u16) -> Option<&[u8]> {
    fields(data).find(|(field_id, _)| *field_id == id).map(|(_, body)| body)
}

/// Returns the block with every record whose id is in `ids` removed.
pub fn strip(data: &[u8], ids: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for (id, body) in fields(data) {
        if !ids.contains(&id) {
            push(&mut out, id, body);
        }
    }
    out
}

/// Appends one record to a block.
pub fn push(out: &mut Vec<u8>, id: u16, body: &[u8]) {
    out.extend_from_slice(&id.to_le_bytes());
    out.extend_from_slice(&(body.len() as u16).to_le_bytes());
    out.extend_from_slice(body);
}

/// WinZip AES extra field contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AesExtra {
    /// 1 for AE-1 (CRC stored), 2 for AE-2 (CRC zeroed).
    pub vendor_version: u16,
    /// 1, 2 or 3 for AES-128, AES-192, AES-256.
    pub strength: u8,
    /// The real compression method of the entry.
    pub method: u16,
}

impl AesExtra {
    /// Length of the record body.
    pub const LEN: usize = 7;

    /// Parses the record body.
    pub fn parse(body: &[u8]) -> Option<Self> {
        if body.len() < Self::LEN || &body[2..4] != b"AE" {
            return None;
        }
        Some(Self {
            vendor_version: u16::from_le_bytes([body[0], body[1]]),
            strength: body[4],
            method: u16::from_le_bytes([body[5], body[6]]),
        })
    }

    /// Finds and parses the record in an extra field block.
    pub fn find_in(extra: &[u8]) -> Option<Self> {
        find(extra, WINZIP_AES).and_then(Self::parse)
    }

    /// Serializes the record body.
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let v = self.vendor_version.to_le_bytes();
        let m = self.method.to_le_bytes();
        [v[0], v[1], b'A', b'E', self.strength, m[0], m[1]]
    }
}

/// Reads the modification time from an extended timestamp record.
pub fn find_mtime(extra: &[u8]) -> Option<u32> {
    let body = find(extra, EXTENDED_TIMESTAMP)?;
    // flags byte, then mtime if bit 0 is set
    if body.len() >= 5 && body[0] & 0x01 != 0 {
        Some(u32::from_le_bytes([body[1], body[2], body[3], body[4]]))
    } else {
        None
    }
}

/// Builds an extended timestamp record body holding only the mtime.
pub fn mtime_body(mtime: u32) -> [u8; 5] {
    let t = mtime.to_le_bytes();
    [0x01, t[0], t[1], t[2], t[3]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_and_strip() {
        let mut block = Vec::new();
        push(&mut block, 0xCAFE, &[1, 2, 3]);
        push(&mut block, EXTENDED_TIMESTAMP, &mtime_body(1_700_000_000));
        push(&mut block, 0xBEEF, &[]);

        assert_eq!(find(&block, 0xCAFE), Some(&[1u8, 2, 3][..]));
        assert_eq!(find_mtime(&block), Some(1_700_000_000));

        let stripped = strip(&block, &[EXTENDED_TIMESTAMP]);
        assert_eq!(find_mtime(&stripped), None);
        assert_eq!(fields(&stripped).count(), 2);
    }

    #[test]
    fn test_truncated_record_ignored() {
        // declares 8 bytes, carries 2
        let block = [0xFE, 0xCA, 0x08, 0x00, 0x01, 0x02];
        assert_eq!(fields(&block).count(), 0);
        assert!(find(&block, 0xCAFE).is_none());
    }

    #[test]
    fn test_aes_extra() {
        let aes = AesExtra {
            vendor_version: 2,
            strength: 3,
            method: 8,
        };
        let mut block = Vec::new();
        push(&mut block, WINZIP_AES, &aes.to_bytes());
        assert_eq!(AesExtra::find_in(&block), Some(aes));

        assert!(AesExtra::parse(&[2, 0, b'X', b'X', 3, 8, 0]).is_none());
    }

    #[test]
    fn test_timestamp_without_mtime_flag() {
        let mut block = Vec::new();
        push(&mut block, EXTENDED_TIMESTAMP, &[0x02, 1, 2, 3, 4]);
        assert_eq!(find_mtime(&block), None);
    }
}
