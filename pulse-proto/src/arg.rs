use crate::error::{Result, WireError};
use std::fmt;

/// Maximum length in octets of a stream's instance identifier ("arg"),
/// as carried on the wire. NUL-padded, not NUL-terminated when full.
pub const ARG_LEN: usize = 16;

/// A bounded, NUL-padded instance identifier such as an interface name
/// or a process command name ("eth0", "sshd").
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Arg([u8; ARG_LEN]);

impl Arg {
    pub fn new(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        if bytes.len() > ARG_LEN {
            return Err(WireError::ArgTooLong { max: ARG_LEN });
        }
        let mut buf = [0u8; ARG_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Arg(buf))
    }

    pub fn from_bytes(buf: [u8; ARG_LEN]) -> Self {
        Arg(buf)
    }

    pub fn as_bytes(&self) -> &[u8; ARG_LEN] {
        &self.0
    }

    /// Length of the identifier ignoring any trailing NUL padding.
    fn trimmed_len(&self) -> usize {
        self.0.iter().position(|&b| b == 0).unwrap_or(ARG_LEN)
    }

    pub fn as_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.0[..self.trimmed_len()]).map_err(|_| WireError::ArgNotUtf8)
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Ok(s) => write!(f, "Arg({s:?})"),
            Err(_) => write!(f, "Arg({:?})", self.0),
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Ok(s) => f.write_str(s),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_short_name() {
        let a = Arg::new("eth0").unwrap();
        assert_eq!(a.as_str().unwrap(), "eth0");
    }

    #[test]
    fn rejects_too_long() {
        assert!(Arg::new("this-name-is-definitely-too-long").is_err());
    }

    #[test]
    fn accepts_exactly_arg_len() {
        let s = "a".repeat(ARG_LEN);
        let a = Arg::new(&s).unwrap();
        assert_eq!(a.as_str().unwrap(), s);
    }

    #[test]
    fn padding_is_zero() {
        let a = Arg::new("x").unwrap();
        assert_eq!(a.as_bytes()[1], 0);
    }
}
