//! # Synchronized views
//!
//! A [`SyncedView`] keeps a parsed form of some serialized value (an attribute string, a
//! stylesheet text) next to the place that value lives. Reads re-parse only when the backing
//! value changed behind the view's back; writes go through a [`ViewMut`] guard that serializes
//! and writes back once, when the guard is dropped, and only if the parsed form was touched.
//!
//! Several links can share one view, so every edit made through any of them ends up in the
//! owning document with a single write per edit.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::ops::{Deref, DerefMut};

/// Where the serialized value lives.
pub trait Backing {
    type Value: Clone + PartialEq;

    fn read(&self) -> Self::Value;
    fn write(&self, value: &Self::Value);
}

/// Converts between the serialized value and its parsed form.
///
/// `parse` must never fail: an unparsable value has a parsed form without links.
pub trait Codec {
    type Raw;
    type Parsed;

    fn parse(&self, raw: &Self::Raw) -> Self::Parsed;
    fn serialize(&self, parsed: &Self::Parsed) -> Self::Raw;
}

struct ViewState<R, P> {
    raw: R,
    parsed: P,
}

pub struct SyncedView<B, C>
where
    B: Backing,
    C: Codec<Raw = B::Value>,
{
    backing: B,
    codec: C,
    state: RefCell<ViewState<B::Value, C::Parsed>>,
    parse_count: Cell<usize>,
}

impl<B, C> SyncedView<B, C>
where
    B: Backing,
    C: Codec<Raw = B::Value>,
{
    pub fn new(backing: B, codec: C) -> Self {
        let raw = backing.read();
        let parsed = codec.parse(&raw);

        Self {
            backing,
            codec,
            state: RefCell::new(ViewState { raw, parsed }),
            parse_count: Cell::new(1),
        }
    }

    pub fn backing(&self) -> &B {
        &self.backing
    }

    /// The parsed form, re-parsed first if the backing value changed.
    pub fn get(&self) -> Ref<'_, C::Parsed> {
        self.refresh();
        Ref::map(self.state.borrow(), |state| &state.parsed)
    }

    /// Mutable access; changes are written back when the guard drops.
    pub fn get_mut(&self) -> ViewMut<'_, B, C> {
        self.refresh();
        ViewMut {
            backing: &self.backing,
            codec: &self.codec,
            state: self.state.borrow_mut(),
            dirty: false,
        }
    }

    /// Replaces the parsed form wholesale.
    pub fn set(&self, parsed: C::Parsed) {
        let mut guard = self.get_mut();
        *guard = parsed;
    }

    /// How many times the backing value has been parsed, including the initial parse.
    pub fn parse_count(&self) -> usize {
        self.parse_count.get()
    }

    fn refresh(&self) {
        let current = self.backing.read();
        if self.state.borrow().raw == current {
            return;
        }

        let parsed = self.codec.parse(&current);
        *self.state.borrow_mut() = ViewState {
            raw: current,
            parsed,
        };
        self.parse_count.set(self.parse_count.get() + 1);
    }
}

/// Write guard returned by [`SyncedView::get_mut`].
pub struct ViewMut<'a, B, C>
where
    B: Backing,
    C: Codec<Raw = B::Value>,
{
    backing: &'a B,
    codec: &'a C,
    state: RefMut<'a, ViewState<B::Value, C::Parsed>>,
    dirty: bool,
}

impl<B, C> Deref for ViewMut<'_, B, C>
where
    B: Backing,
    C: Codec<Raw = B::Value>,
{
    type Target = C::Parsed;

    fn deref(&self) -> &Self::Target {
        &self.state.parsed
    }
}

impl<B, C> DerefMut for ViewMut<'_, B, C>
where
    B: Backing,
    C: Codec<Raw = B::Value>,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.dirty = true;
        &mut self.state.parsed
    }
}

impl<B, C> Drop for ViewMut<'_, B, C>
where
    B: Backing,
    C: Codec<Raw = B::Value>,
{
    fn drop(&mut self) {
        if !self.dirty {
            return;
        }

        let raw = self.codec.serialize(&self.state.parsed);
        if raw != self.state.raw {
            self.backing.write(&raw);
            self.state.raw = raw;
        }
    }
}
