//! Resource keys.
//!
//! Every entry in a DBPF archive is addressed by a TGI triple (type, group,
//! instance). Masks are partial keys used for lookups; a missing component
//! matches anything.

use std::fmt;

/// A (type, group, instance) resource key.
///
/// Ordering is lexicographic over the three components in that order.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tgi {
    pub type_id: u32,
    pub group: u32,
    pub instance: u32,
}

impl Tgi {
    pub const fn new(type_id: u32, group: u32, instance: u32) -> Self {
        Self {
            type_id,
            group,
            instance,
        }
    }
}

impl fmt::Display for Tgi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TGI({:#010x}, {:#010x}, {:#010x})",
            self.type_id, self.group, self.instance
        )
    }
}

/// A partial key. A mask matches a key iff every present component equals
/// its counterpart.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TgiMask {
    pub type_id: Option<u32>,
    pub group: Option<u32>,
    pub instance: Option<u32>,
}

impl TgiMask {
    pub const fn new(type_id: Option<u32>, group: Option<u32>, instance: Option<u32>) -> Self {
        Self {
            type_id,
            group,
            instance,
        }
    }

    /// Mask with every component present, matching exactly one key.
    pub const fn exact(tgi: Tgi) -> Self {
        Self {
            type_id: Some(tgi.type_id),
            group: Some(tgi.group),
            instance: Some(tgi.instance),
        }
    }

    pub fn matches(&self, tgi: &Tgi) -> bool {
        self.type_id.is_none_or(|t| t == tgi.type_id)
            && self.group.is_none_or(|g| g == tgi.group)
            && self.instance.is_none_or(|i| i == tgi.instance)
    }
}

impl From<Tgi> for TgiMask {
    fn from(tgi: Tgi) -> Self {
        Self::exact(tgi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_matching() {
        let tgi = Tgi::new(0x7AB50E44, 0x0986135E, 0x11);
        assert!(TgiMask::default().matches(&tgi));
        assert!(TgiMask::new(Some(0x7AB50E44), None, None).matches(&tgi));
        assert!(TgiMask::exact(tgi).matches(&tgi));
        assert!(!TgiMask::new(Some(0x7AB50E44), Some(0), None).matches(&tgi));
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let a = Tgi::new(1, 9, 9);
        let b = Tgi::new(2, 0, 0);
        let c = Tgi::new(2, 0, 1);
        assert!(a < b && b < c);
    }

    #[test]
    fn test_display() {
        let tgi = Tgi::new(0x0A5BCF4B, 0xAA5BCF57, 0x10000000);
        assert_eq!(
            tgi.to_string(),
            "TGI(0x0a5bcf4b, 0xaa5bcf57, 0x10000000)"
        );
    }
}
