use std::fmt::Display;

use super::*;

/// Encode `name` the way it is stored in a directory slot.
/// Names longer than [`NAME_LENGTH`] bytes are silently truncated.
pub fn encode_name(name: &str) -> Result<[u8; NAME_LENGTH], Error> {
    let raw = name.as_bytes();
    if raw.is_empty() || raw.contains(&0) {
        return Err(Error::InvalidName);
    }
    let mut encoded = [0u8; NAME_LENGTH];
    let length = usize::min(raw.len(), NAME_LENGTH);
    encoded[..length].copy_from_slice(&raw[..length]);
    Ok(encoded)
}

impl DirectoryEntry {
    pub fn new(inode: u32, name: &str) -> Result<Self, Error> {
        let inode = u16::try_from(inode).map_err(|_| Error::NotFound)?;
        Ok(Self {
            inode,
            name: encode_name(name)?,
        })
    }

    pub fn inode(&self) -> u32 {
        self.inode as u32
    }

    pub fn is_free(&self) -> bool {
        self.inode() == NULL_INODE
    }

    /// Stored name up to the first padding byte
    pub fn name(&self) -> String {
        let raw = self.name;
        let length = raw.iter().position(|&b| b == 0).unwrap_or(NAME_LENGTH);
        String::from_utf8_lossy(&raw[..length]).into_owned()
    }

    /// Exact byte comparison against an encoded name
    pub fn matches(&self, encoded: &[u8; NAME_LENGTH]) -> bool {
        !self.is_free() && self.name == *encoded
    }

    /// Entry is `.` or `..`
    pub fn is_dot(&self) -> bool {
        let raw = self.name;
        raw[..2] == *b".\0" || raw[..3] == *b"..\0"
    }
}

impl Display for DirectoryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:>5}  {}", self.inode(), self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_names_truncate() {
        let entry = DirectoryEntry::new(4, "a_very_long_filename.txt").unwrap();
        assert_eq!(entry.name(), "a_very_long_fi");
        let encoded = encode_name("a_very_long_filename.c").unwrap();
        assert!(entry.matches(&encoded));
    }

    #[test]
    fn dots() {
        assert!(DirectoryEntry::new(1, ".").unwrap().is_dot());
        assert!(DirectoryEntry::new(1, "..").unwrap().is_dot());
        assert!(!DirectoryEntry::new(1, "...").unwrap().is_dot());
        assert!(!DirectoryEntry::new(1, ".profile").unwrap().is_dot());
    }

    #[test]
    fn rejects_unstorable() {
        assert!(matches!(encode_name(""), Err(Error::InvalidName)));
        assert!(matches!(encode_name("a\0b"), Err(Error::InvalidName)));
        assert!(matches!(
            DirectoryEntry::new(70_000, "x"),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn free_slot_never_matches() {
        let entry = DirectoryEntry::zeroed();
        assert!(entry.is_free());
        assert!(!entry.matches(&[0; NAME_LENGTH]));
    }
}
