use std::ops::{BitAnd, BitOr, BitOrAssign, Sub};

use super::Visibility;

/// Lookup flags controlling which members a descriptor may bind to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(u32);

impl Flags {
    pub const NONE: Self = Self(0);
    pub const INSTANCE: Self = Self(1);
    pub const STATIC: Self = Self(1 << 1);
    pub const PUBLIC: Self = Self(1 << 2);
    pub const NON_PUBLIC: Self = Self(1 << 3);
    /// Only members declared on the target type itself, not inherited ones.
    pub const DECLARED_ONLY: Self = Self(1 << 4);
    pub const IGNORE_CASE: Self = Self(1 << 5);

    pub const ANY_VISIBILITY: Self = Self(Self::PUBLIC.0 | Self::NON_PUBLIC.0);
    pub const INSTANCE_ANY_VISIBILITY: Self = Self(Self::INSTANCE.0 | Self::ANY_VISIBILITY.0);
    pub const STATIC_ANY_VISIBILITY: Self = Self(Self::STATIC.0 | Self::ANY_VISIBILITY.0);
    pub const ALL_MEMBERS: Self = Self(Self::INSTANCE.0 | Self::STATIC_ANY_VISIBILITY.0);

    const NAMES: [(Self, &'static str); 6] = [
        (Self::INSTANCE, "INSTANCE"),
        (Self::STATIC, "STATIC"),
        (Self::PUBLIC, "PUBLIC"),
        (Self::NON_PUBLIC, "NON_PUBLIC"),
        (Self::DECLARED_ONLY, "DECLARED_ONLY"),
        (Self::IGNORE_CASE, "IGNORE_CASE"),
    ];

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & 0b11_1111)
    }

    /// True when every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Flags selecting exactly one member of the given shape; used when a
    /// descriptor is built from an already resolved member.
    pub fn canonical(is_static: bool, visibility: Visibility) -> Self {
        let scope = if is_static { Self::STATIC } else { Self::INSTANCE };
        let access = match visibility {
            Visibility::Public => Self::PUBLIC,
            Visibility::Private => Self::NON_PUBLIC,
        };
        scope | access | Self::DECLARED_ONLY
    }

    /// Static lookups are requested with `STATIC` and without `INSTANCE`.
    pub const fn is_static_lookup(self) -> bool {
        self.contains(Self::STATIC) && !self.contains(Self::INSTANCE)
    }

    pub fn admits_visibility(self, visibility: Visibility) -> bool {
        if !self.intersects(Self::ANY_VISIBILITY) {
            return true;
        }
        match visibility {
            Visibility::Public => self.contains(Self::PUBLIC),
            Visibility::Private => self.contains(Self::NON_PUBLIC),
        }
    }

    pub fn matches_name(self, wanted: &str, candidate: &str) -> bool {
        if self.contains(Self::IGNORE_CASE) {
            wanted.eq_ignore_ascii_case(candidate)
        } else {
            wanted == candidate
        }
    }
}

impl BitOr for Flags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Flags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Sub for Flags {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 & !rhs.0)
    }
}

impl std::fmt::Debug for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 == 0 {
            return f.write_str("Flags(NONE)");
        }
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "Flags({})", names.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_compose() {
        assert!(Flags::ALL_MEMBERS.contains(Flags::STATIC));
        assert!(Flags::ALL_MEMBERS.contains(Flags::INSTANCE_ANY_VISIBILITY));
        assert!(!Flags::INSTANCE_ANY_VISIBILITY.is_static_lookup());
        assert!(Flags::STATIC_ANY_VISIBILITY.is_static_lookup());
        assert!(!Flags::ALL_MEMBERS.is_static_lookup());
        assert_eq!(Flags::ALL_MEMBERS - Flags::STATIC, Flags::INSTANCE_ANY_VISIBILITY);
    }

    #[test]
    fn visibility_defaults_to_both() {
        assert!(Flags::INSTANCE.admits_visibility(Visibility::Private));
        assert!(Flags::INSTANCE.admits_visibility(Visibility::Public));
        let public_only = Flags::INSTANCE | Flags::PUBLIC;
        assert!(!public_only.admits_visibility(Visibility::Private));
    }

    #[test]
    fn ignore_case_matching() {
        assert!(!Flags::NONE.matches_name("Count", "count"));
        assert!(Flags::IGNORE_CASE.matches_name("Count", "count"));
    }

    #[test]
    fn debug_lists_names() {
        let flags = Flags::STATIC | Flags::PUBLIC;
        assert_eq!(format!("{flags:?}"), "Flags(STATIC | PUBLIC)");
    }
}
