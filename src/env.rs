//! Lexical environment chains.
//!
//! The code generator builds two chains of these frames while it recurses:
//! one mapping variable names to stack displacements, one mapping label
//! names to code offsets. Frames are immutable, live on the generator's
//! call stack, and are discarded when the generator unwinds. Lookup is a
//! linear walk from the innermost frame outward, so inner bindings shadow
//! outer ones by construction.

/// One binding frame in a chain.
#[derive(Debug, Clone, Copy)]
pub struct Env<'a> {
    name: &'a str,
    value: i64,
    parent: Option<&'a Env<'a>>,
}

impl<'a> Env<'a> {
    pub fn bind(name: &'a str, value: i64, parent: Option<&'a Env<'a>>) -> Env<'a> {
        Env {
            name,
            value,
            parent,
        }
    }

    /// Find the innermost binding for `name`.
    pub fn find(&self, name: &str) -> Option<i64> {
        let mut frame = Some(self);
        while let Some(env) = frame {
            if env.name == name {
                return Some(env.value);
            }
            frame = env.parent;
        }
        None
    }
}

/// Lookup through an optional chain head.
pub fn lookup(env: Option<&Env<'_>>, name: &str) -> Option<i64> {
    env.and_then(|frame| frame.find(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_bindings_through_the_chain() {
        let alpha = Env::bind("alpha", 1, None);
        let beta = Env::bind("beta", 2, Some(&alpha));

        assert_eq!(Some(1), beta.find("alpha"));
        assert_eq!(Some(2), beta.find("beta"));
        assert_eq!(None, beta.find("gamma"));
    }

    #[test]
    fn inner_bindings_shadow_outer_ones() {
        let outer = Env::bind("x", -8, None);
        let inner = Env::bind("x", -16, Some(&outer));

        assert_eq!(Some(-16), inner.find("x"));
        assert_eq!(Some(-8), outer.find("x"));
    }

    #[test]
    fn lookup_handles_the_empty_chain() {
        assert_eq!(None, lookup(None, "x"));
        let frame = Env::bind("x", -8, None);
        assert_eq!(Some(-8), lookup(Some(&frame), "x"));
    }
}
