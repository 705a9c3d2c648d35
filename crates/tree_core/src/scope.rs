//! Persistent per-path state for tree walks
//!
//! Each pending node carries its own `Scope`; pushing onto a scope shares the
//! parent's entries instead of copying them, so siblings never observe each
//! other's additions.

use std::rc::Rc;

struct Link<T> {
    value: T,
    next: Option<Rc<Link<T>>>,
}

pub(crate) struct Scope<T> {
    head: Option<Rc<Link<T>>>,
}

impl<T> Scope<T> {
    pub fn new() -> Self {
        Self { head: None }
    }

    /// A new scope with `value` in front of this one's entries
    pub fn push(&self, value: T) -> Self {
        Self {
            head: Some(Rc::new(Link {
                value,
                next: self.head.clone(),
            })),
        }
    }

    /// Entries from the most recent to the oldest
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let mut cursor = self.head.as_deref();
        std::iter::from_fn(move || {
            let link = cursor?;
            cursor = link.next.as_deref();
            Some(&link.value)
        })
    }
}

impl<T> Clone for Scope<T> {
    fn clone(&self) -> Self {
        Self {
            head: self.head.clone(),
        }
    }
}

impl<T> Drop for Scope<T> {
    // Unlink iteratively so long chains do not recurse on drop.
    fn drop(&mut self) {
        let mut next = self.head.take();
        while let Some(link) = next {
            match Rc::try_unwrap(link) {
                Ok(mut link) => next = link.next.take(),
                Err(_) => break,
            }
        }
    }
}
