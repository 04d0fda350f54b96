use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! numeric_id {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            pub fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            pub fn raw(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(CallbackId);
numeric_id!(SubscriptionHandle);

/// Which of the two id spaces an expedient lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IdSpace {
    /// Assigned by the live store.
    Dynamic,
    /// Imported from legacy data.
    Ancient,
}

impl IdSpace {
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Dynamic => 0,
            Self::Ancient => 1,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Dynamic),
            1 => Some(Self::Ancient),
            _ => None,
        }
    }
}

/// Identity of an expedient. The two spaces are never unified: `Dynamic(3)`
/// and `Ancient(3)` are different expedients.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExpedientId {
    Dynamic(u64),
    Ancient(u64),
}

impl ExpedientId {
    pub fn new(space: IdSpace, number: u64) -> Self {
        match space {
            IdSpace::Dynamic => Self::Dynamic(number),
            IdSpace::Ancient => Self::Ancient(number),
        }
    }

    pub fn space(&self) -> IdSpace {
        match self {
            Self::Dynamic(_) => IdSpace::Dynamic,
            Self::Ancient(_) => IdSpace::Ancient,
        }
    }

    pub fn number(&self) -> u64 {
        match self {
            Self::Dynamic(n) | Self::Ancient(n) => *n,
        }
    }
}

impl fmt::Debug for ExpedientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dynamic(n) => write!(f, "ExpedientId(D{n})"),
            Self::Ancient(n) => write!(f, "ExpedientId(A{n})"),
        }
    }
}

impl fmt::Display for ExpedientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dynamic(n) => write!(f, "D{n}"),
            Self::Ancient(n) => write!(f, "A{n}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spaces_never_collide() {
        let dynamic = ExpedientId::new(IdSpace::Dynamic, 7);
        let ancient = ExpedientId::new(IdSpace::Ancient, 7);
        assert_ne!(dynamic, ancient);
        assert_eq!(dynamic.number(), ancient.number());
        assert_eq!(dynamic.space(), IdSpace::Dynamic);
        assert_eq!(ancient.space(), IdSpace::Ancient);
    }

    #[test]
    fn space_codes_roundtrip() {
        for space in [IdSpace::Dynamic, IdSpace::Ancient] {
            assert_eq!(IdSpace::from_i64(space.as_i64()), Some(space));
        }
        assert_eq!(IdSpace::from_i64(9), None);
    }

    #[test]
    fn display_is_prefixed() {
        assert_eq!(ExpedientId::Dynamic(12).to_string(), "D12");
        assert_eq!(ExpedientId::Ancient(3).to_string(), "A3");
        assert_eq!(format!("{:?}", CallbackId::from_raw(4)), "CallbackId(4)");
    }
}
