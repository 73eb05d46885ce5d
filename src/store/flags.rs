//! Behaviour flags for store and list operations

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Composable bitset controlling creation, copying and duplicate policies
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StoreFlags(u32);

impl StoreFlags {
    pub const NOFLAG: Self = Self(0);
    /// Create the entry; fail if it already exists
    pub const CREATE: Self = Self(0x0001);
    /// Create the entry, resetting it if it already exists
    pub const CREATE_INIT: Self = Self(0x0002);
    /// Store a copy of the supplied data
    pub const COPY_SET: Self = Self(0x0004);
    /// Return a copy of the stored data
    pub const COPY_GET: Self = Self(0x0008);
    /// Duplicate: keep an existing destination
    pub const EXISTING: Self = Self(0x0010);
    /// Duplicate: replace an existing destination
    pub const OVERWRITE: Self = Self(0x0020);
    /// Ignore the constructor and store an empty value
    pub const EMPTY_OBJ: Self = Self(0x0040);
    /// Re-apply the list filter after changing a list
    pub const APPLY_FILTER: Self = Self(0x0080);
    /// Store a response as a list regardless of its shape
    pub const STORE_LIST: Self = Self(0x0100);
    /// Store a response as a single object regardless of its shape
    pub const STORE_OBJ: Self = Self(0x0200);

    pub const CREATE_ANY: Self = Self(Self::CREATE.0 | Self::CREATE_INIT.0);
    pub const COPY: Self = Self(Self::COPY_SET.0 | Self::COPY_GET.0);

    const NAMES: [(Self, &'static str); 11] = [
        (Self::CREATE, "CREATE"),
        (Self::CREATE_INIT, "CREATE_INIT"),
        (Self::COPY_SET, "COPY_SET"),
        (Self::COPY_GET, "COPY_GET"),
        (Self::EXISTING, "EXISTING"),
        (Self::OVERWRITE, "OVERWRITE"),
        (Self::EMPTY_OBJ, "EMPTY_OBJ"),
        (Self::APPLY_FILTER, "APPLY_FILTER"),
        (Self::STORE_LIST, "STORE_LIST"),
        (Self::STORE_OBJ, "STORE_OBJ"),
        (Self::NOFLAG, "NOFLAG"),
    ];

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    pub const fn do_create(self) -> bool {
        self.intersects(Self::CREATE)
    }

    pub const fn do_create_init(self) -> bool {
        self.intersects(Self::CREATE_INIT)
    }

    pub const fn do_create_any(self) -> bool {
        self.intersects(Self::CREATE_ANY)
    }

    pub const fn do_copy_set(self) -> bool {
        self.intersects(Self::COPY_SET)
    }

    pub const fn do_copy_get(self) -> bool {
        self.intersects(Self::COPY_GET)
    }

    pub const fn do_existing(self) -> bool {
        self.intersects(Self::EXISTING)
    }

    pub const fn do_overwrite(self) -> bool {
        self.intersects(Self::OVERWRITE)
    }

    pub const fn do_empty_obj(self) -> bool {
        self.intersects(Self::EMPTY_OBJ)
    }

    pub const fn do_apply_filter(self) -> bool {
        self.intersects(Self::APPLY_FILTER)
    }

    pub const fn do_store_list(self) -> bool {
        self.intersects(Self::STORE_LIST)
    }

    pub const fn do_store_obj(self) -> bool {
        self.intersects(Self::STORE_OBJ)
    }
}

impl BitOr for StoreFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for StoreFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for StoreFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for StoreFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "StoreFlags(NOFLAG)");
        }
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| !flag.is_empty() && self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "StoreFlags({})", names.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        let flags = StoreFlags::CREATE | StoreFlags::COPY_GET;
        assert!(flags.do_create());
        assert!(flags.do_create_any());
        assert!(!flags.do_create_init());
        assert!(flags.do_copy_get());
        assert!(!flags.do_copy_set());
        assert!(!StoreFlags::NOFLAG.do_create_any());
        assert!(StoreFlags::CREATE_INIT.do_create_any());
    }

    #[test]
    fn test_composites() {
        assert!(StoreFlags::COPY.do_copy_get());
        assert!(StoreFlags::COPY.do_copy_set());
        assert_eq!(StoreFlags::COPY.without(StoreFlags::COPY_SET), StoreFlags::COPY_GET);

        let mut flags = StoreFlags::NOFLAG;
        flags |= StoreFlags::APPLY_FILTER;
        assert!(flags.do_apply_filter());
        assert_eq!(flags & StoreFlags::APPLY_FILTER, StoreFlags::APPLY_FILTER);
    }

    #[test]
    fn test_debug_names() {
        assert_eq!(format!("{:?}", StoreFlags::NOFLAG), "StoreFlags(NOFLAG)");
        assert_eq!(
            format!("{:?}", StoreFlags::CREATE | StoreFlags::OVERWRITE),
            "StoreFlags(CREATE | OVERWRITE)"
        );
    }
}
