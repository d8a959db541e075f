//! Joined iteration over several sparse stores.
//!
//! A [`Zipper`] walks up to five stores in lockstep and yields the tuple of
//! component references at every index where *all* stores are populated.
//! The [`IndexedZipper`] variant also yields the index itself, which is how
//! systems recover the [`Entity`](crate::entity::Entity).
//!
//! Iteration is single-pass, forward-only, and ascending by index. No
//! component is copied; the item type is a tuple of references borrowed from
//! the stores. A store shorter than the others is treated as absent beyond
//! its end, so the join naturally ends at the shortest store.
//!
//! Mutating store *membership* (insert/erase) during iteration is impossible
//! under the borrow model; systems that spawn or kill collect into a pending
//! list and apply it after the loop.
//!
//! ```
//! use starward_ecs::prelude::*;
//!
//! let mut reg = Registry::new();
//! reg.register::<f32>();
//! reg.register::<u32>();
//! let a = reg.spawn();
//! let _lonely = reg.spawn();
//! reg.add(a, 1.5f32).unwrap();
//! reg.add(a, 7u32).unwrap();
//!
//! let floats = reg.components::<f32>().unwrap();
//! let ints = reg.components::<u32>().unwrap();
//! let joined: Vec<_> = IndexedZipper::new((floats.view(), ints.view())).collect();
//! assert_eq!(joined.len(), 1);
//! let (index, (f, i)) = joined[0];
//! assert_eq!((index, *f, *i), (a.index(), 1.5, 7));
//! ```

use crate::sparse::SlotView;

// ---------------------------------------------------------------------------
// Zipper
// ---------------------------------------------------------------------------

/// Joined iterator yielding component tuples.
pub struct Zipper<V> {
    views: V,
}

impl<V> Zipper<V> {
    /// Zip a tuple of slot views obtained from
    /// [`SparseSlots::view`](crate::sparse::SparseSlots::view) /
    /// [`view_mut`](crate::sparse::SparseSlots::view_mut).
    pub fn new(views: V) -> Self {
        Self { views }
    }
}

/// Joined iterator yielding `(index, component tuple)`.
pub struct IndexedZipper<V> {
    views: V,
    index: usize,
}

impl<V> IndexedZipper<V> {
    pub fn new(views: V) -> Self {
        Self { views, index: 0 }
    }
}

macro_rules! impl_zip {
    ($(($V:ident, $field:tt)),+) => {
        #[allow(non_snake_case)]
        impl<$($V: SlotView),+> Iterator for Zipper<($($V,)+)> {
            type Item = ($($V::Item,)+);

            fn next(&mut self) -> Option<Self::Item> {
                loop {
                    $(let $V = self.views.$field.next_slot()?;)+
                    if let ($(Some($V),)+) = ($($V,)+) {
                        return Some(($($V,)+));
                    }
                }
            }
        }

        #[allow(non_snake_case)]
        impl<$($V: SlotView),+> Iterator for IndexedZipper<($($V,)+)> {
            type Item = (usize, ($($V::Item,)+));

            fn next(&mut self) -> Option<Self::Item> {
                loop {
                    $(let $V = self.views.$field.next_slot()?;)+
                    let index = self.index;
                    self.index += 1;
                    if let ($(Some($V),)+) = ($($V,)+) {
                        return Some((index, ($($V,)+)));
                    }
                }
            }
        }
    };
}

impl_zip!((A, 0));
impl_zip!((A, 0), (B, 1));
impl_zip!((A, 0), (B, 1), (C, 2));
impl_zip!((A, 0), (B, 1), (C, 2), (D, 3));
impl_zip!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4));

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
