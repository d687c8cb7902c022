//! Command-prefix index: maps an observed process command name to a
//! registered stream, in O(log n), using only the first `PREFIX_LEN`
//! octets of the name as the sort/search key.

/// One machine word minus one octet, so the prefix plus a one-octet
/// saturation flag packs into a single word-sized comparison key.
pub const PREFIX_LEN: usize = std::mem::size_of::<usize>() - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Prefix([u8; PREFIX_LEN]);

impl Prefix {
    fn of(cmd: &str) -> Self {
        let bytes = cmd.as_bytes();
        let mut buf = [0u8; PREFIX_LEN];
        let n = bytes.len().min(PREFIX_LEN);
        buf[..n].copy_from_slice(&bytes[..n]);
        Prefix(buf)
    }

    /// A prefix is "saturated" when the source name was at least
    /// `PREFIX_LEN` octets long, so the prefix carries no embedded NUL
    /// terminator and cannot be trusted as a full match on its own.
    fn saturated(&self) -> bool {
        !self.0.contains(&0)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    prefix: Prefix,
    full: String,
    stream_idx: usize,
}

/// Registered (command name -> stream index) mappings, sorted by
/// truncated prefix for binary search.
#[derive(Debug, Default)]
pub struct CommandPrefixIndex {
    entries: Vec<Entry>,
}

#[derive(Debug, thiserror::Error)]
#[error("command {0:?} collides with an already-registered command's prefix")]
pub struct DuplicateCommand(pub String);

impl CommandPrefixIndex {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Registers `cmd` as mapping to `stream_idx`. Rejects a command
    /// whose first `PREFIX_LEN` octets collide with an already
    /// registered command, mirroring `init_proc`'s bsearch-reject: two
    /// configured commands that are indistinguishable within the
    /// prefix window cannot both be monitored.
    pub fn insert(&mut self, cmd: &str, stream_idx: usize) -> Result<(), DuplicateCommand> {
        let prefix = Prefix::of(cmd);
        match self.entries.binary_search_by_key(&prefix, |e| e.prefix) {
            Ok(_) => Err(DuplicateCommand(cmd.to_string())),
            Err(pos) => {
                self.entries.insert(pos, Entry { prefix, full: cmd.to_string(), stream_idx });
                Ok(())
            }
        }
    }

    /// Looks up the stream registered for an observed command name.
    pub fn lookup(&self, observed: &str) -> Option<usize> {
        let prefix = Prefix::of(observed);
        let pos = self.entries.binary_search_by_key(&prefix, |e| e.prefix).ok()?;
        let entry = &self.entries[pos];
        if entry.prefix.saturated() {
            if entry.full == observed {
                Some(entry.stream_idx)
            } else {
                None
            }
        } else {
            Some(entry.stream_idx)
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_short_name_matches() {
        let mut idx = CommandPrefixIndex::new();
        idx.insert("sshd", 0).unwrap();
        assert_eq!(idx.lookup("sshd"), Some(0));
        assert_eq!(idx.lookup("sshd2"), None);
    }

    #[test]
    fn rejects_prefix_collision_at_insert() {
        let mut idx = CommandPrefixIndex::new();
        let long_a = "a".repeat(PREFIX_LEN) + "-one";
        let long_b = "a".repeat(PREFIX_LEN) + "-two";
        idx.insert(&long_a, 0).unwrap();
        assert!(idx.insert(&long_b, 1).is_err());
    }

    #[test]
    fn saturated_prefix_requires_exact_full_match() {
        let mut idx = CommandPrefixIndex::new();
        let long = "b".repeat(PREFIX_LEN) + "-exact";
        idx.insert(&long, 7).unwrap();
        assert_eq!(idx.lookup(&long), Some(7));
        let different_tail = "b".repeat(PREFIX_LEN) + "-other";
        assert_eq!(idx.lookup(&different_tail), None);
    }

    #[test]
    fn unregistered_command_is_absent() {
        let mut idx = CommandPrefixIndex::new();
        idx.insert("nginx", 0).unwrap();
        assert_eq!(idx.lookup("apache"), None);
    }
}
