//! Closed mapping tables between native codes and named values

/// A lossy, total mapping between a native code space and a named vocabulary
///
/// `pairs` is pure data. Looking up a native code takes the first pair with
/// that code; looking up a named value takes the first pair with that name,
/// so the canonical native code for a name must come first. Inputs without a
/// pair map to the table's defaults.
#[derive(Debug)]
pub struct CodeTable<N: 'static, V: 'static> {
    pairs: &'static [(N, V)],
    native_default: N,
    named_default: V,
}

impl<N, V> CodeTable<N, V> {
    pub const fn new(pairs: &'static [(N, V)], native_default: N, named_default: V) -> Self {
        Self {
            pairs,
            native_default,
            named_default,
        }
    }

    pub fn pairs(&self) -> &'static [(N, V)] {
        self.pairs
    }
}

impl<N: Copy + PartialEq, V: Copy + PartialEq> CodeTable<N, V> {
    /// Named value for a native code, `None` if the code is unmapped
    pub fn lookup<Q>(&self, native: Q) -> Option<V>
    where
        N: PartialEq<Q>,
    {
        self.pairs.iter().find(|(n, _)| *n == native).map(|(_, v)| *v)
    }

    /// Named value for a native code, falling back to the default
    pub fn to_named<Q>(&self, native: Q) -> V
    where
        N: PartialEq<Q>,
    {
        self.lookup(native).unwrap_or(self.named_default)
    }

    /// Canonical native code for a named value
    pub fn to_native(&self, named: V) -> N {
        self.pairs
            .iter()
            .find(|(_, v)| *v == named)
            .map(|(n, _)| *n)
            .unwrap_or(self.native_default)
    }

    pub fn named_default(&self) -> V {
        self.named_default
    }

    pub fn native_default(&self) -> N {
        self.native_default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Line {
        Thin,
        Dotted,
    }

    const LINES: CodeTable<i32, Line> =
        CodeTable::new(&[(1, Line::Thin), (-4118, Line::Dotted), (2, Line::Thin)], 1, Line::Thin);

    #[test]
    fn test_lookup_and_default() {
        assert_eq!(LINES.lookup(-4118), Some(Line::Dotted));
        assert_eq!(LINES.lookup(99), None);
        assert_eq!(LINES.to_named(2), Line::Thin);
        assert_eq!(LINES.to_named(99), Line::Thin);
    }

    #[test]
    fn test_canonical_native_is_first_pair() {
        assert_eq!(LINES.to_native(Line::Thin), 1);
        assert_eq!(LINES.to_native(Line::Dotted), -4118);
    }
}
