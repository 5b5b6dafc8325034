use std::fmt;

/// The six lock types used across the resource hierarchy: the four base
/// modes (`NL`, `S`, `X`) plus the two intent modes (`IS`, `IX`, `SIX`) that
/// let a transaction signal what it intends to do further down the tree
/// without taking a full lock on every descendant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum LockType {
    /// No lock. Every resource starts here.
    NL,
    /// Intention shared: signals that a shared lock will be requested on
    /// some descendant.
    IS,
    /// Intention exclusive: signals that an exclusive (or stronger) lock
    /// will be requested on some descendant.
    IX,
    /// Shared: read access to this resource and everything below it.
    S,
    /// Shared + intention exclusive: read access to this resource, plus
    /// the right to take exclusive locks on individual descendants.
    SIX,
    /// Exclusive: write access to this resource and everything below it.
    X,
}

impl fmt::Display for LockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LockType::NL => "NL",
            LockType::IS => "IS",
            LockType::IX => "IX",
            LockType::S => "S",
            LockType::SIX => "SIX",
            LockType::X => "X",
        };
        f.write_str(s)
    }
}

impl LockType {
    /// Whether `self` and `other` can be held simultaneously by two
    /// different transactions on the same resource.
    pub fn compatible(self, other: LockType) -> bool {
        use LockType::*;
        match (self, other) {
            (NL, _) | (_, NL) => true,
            (IS, IS) | (IS, IX) | (IS, S) | (IS, SIX) => true,
            (IX, IS) | (IX, IX) => true,
            (S, IS) | (S, S) => true,
            (SIX, IS) => true,
            _ => false,
        }
    }

    /// Whether a lock of type `substitute` can be used anywhere a lock of
    /// type `required` is needed, i.e. `substitute` is at least as strong.
    pub fn substitutable(substitute: LockType, required: LockType) -> bool {
        use LockType::*;
        if substitute == required {
            return true;
        }
        match substitute {
            NL => required == NL,
            IS => required == NL || required == IS,
            IX => matches!(required, NL | IS | IX),
            S => matches!(required, NL | IS | S),
            SIX => required != X,
            X => true,
        }
    }

    /// Whether `parent` is a valid lock type to hold on the parent of a
    /// resource that `self` is held (or about to be held) on.
    pub fn can_be_parent_lock(parent: LockType, child: LockType) -> bool {
        use LockType::*;
        match parent {
            NL => matches!(child, NL),
            IS | S => matches!(child, NL | IS | S),
            IX | SIX | X => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LockType::*;

    #[test]
    fn nl_compatible_with_everything() {
        for t in [NL, IS, IX, S, SIX, X] {
            assert!(NL.compatible(t));
            assert!(t.compatible(NL));
        }
    }

    #[test]
    fn exclusive_excludes_all_but_nl() {
        for t in [IS, IX, S, SIX, X] {
            assert!(!X.compatible(t));
        }
    }

    #[test]
    fn is_compatible_with_everything_but_x() {
        for t in [IS, IX, S, SIX] {
            assert!(IS.compatible(t));
        }
        assert!(!IS.compatible(X));
    }

    #[test]
    fn substitutable_matches_cs186_table() {
        assert!(super::LockType::substitutable(X, S));
        assert!(super::LockType::substitutable(SIX, IX));
        assert!(!super::LockType::substitutable(S, X));
        assert!(!super::LockType::substitutable(IS, S));
        assert!(super::LockType::substitutable(S, S));
    }

    #[test]
    fn parent_child_validity() {
        assert!(super::LockType::can_be_parent_lock(IX, X));
        assert!(super::LockType::can_be_parent_lock(SIX, X));
        assert!(!super::LockType::can_be_parent_lock(S, X));
        assert!(!super::LockType::can_be_parent_lock(IS, X));
        assert!(super::LockType::can_be_parent_lock(IS, S));
    }
}
