// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use crate::data::item::{Item, ItemRef, ItemState};
use crate::errors::StageFailure;

/// Ordered sequence of items. Position is meaningful: item `i` of a box vector
/// corresponds to item `i` of the sibling score vector.
///
/// A vector may also carry a slot-level error, set when the producing stage
/// failed or was skipped for this frame.
#[derive(Debug, Clone, Default)]
pub struct ItemVector {
    items: Vec<ItemRef>,
    error: Option<StageFailure>,
}

impl ItemVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<Item>) -> Self {
        Self {
            items: items.into_iter().map(Arc::new).collect(),
            error: None,
        }
    }

    pub fn from_refs(items: Vec<ItemRef>) -> Self {
        Self { items, error: None }
    }

    /// `len` INVALID items of `type_tag`, all carrying `error` when given.
    ///
    /// Used in place of real output when a stage fails, times out or is
    /// disabled, so that sibling vectors keep their length.
    pub fn placeholder(type_tag: &str, len: usize, error: Option<StageFailure>) -> Self {
        let items = (0..len)
            .map(|_| {
                let item = Item::invalid(type_tag);
                let item = match &error {
                    Some(e) => item.with_error(e.clone()),
                    None => item,
                };
                Arc::new(item)
            })
            .collect();
        Self { items, error }
    }

    pub fn with_error(mut self, error: StageFailure) -> Self {
        self.error = Some(error);
        self
    }

    pub fn push(&mut self, item: Item) {
        self.items.push(Arc::new(item));
    }

    pub fn push_ref(&mut self, item: ItemRef) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ItemRef> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemRef> {
        self.items.iter()
    }

    pub fn items(&self) -> &[ItemRef] {
        &self.items
    }

    pub fn error(&self) -> Option<&StageFailure> {
        self.error.as_ref()
    }

    /// Whether this vector's slot failed for the frame.
    pub fn is_failed(&self) -> bool {
        self.error.as_ref().map_or(false, |e| e.kind.is_failure())
    }

    pub fn count(&self, state: ItemState) -> usize {
        self.items.iter().filter(|i| i.state() == state).count()
    }

    pub fn is_aligned_with(&self, other: &ItemVector) -> bool {
        self.len() == other.len()
    }

    /// Fan out one output item per input position.
    ///
    /// `f` runs for VALID items only. INVALID and FILTERED positions yield a
    /// payload-less item of `type_tag` with the same state, so the result is
    /// always index-aligned with `self`.
    pub fn map_valid<F>(&self, type_tag: &str, mut f: F) -> ItemVector
    where
        F: FnMut(usize, &Item) -> Item,
    {
        let items = self
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| match item.state() {
                ItemState::Valid => Arc::new(f(i, item)),
                other => Arc::new(Item::invalid(type_tag).with_state(other)),
            })
            .collect();
        ItemVector { items, error: None }
    }
}

impl FromIterator<Item> for ItemVector {
    fn from_iter<I: IntoIterator<Item = Item>>(iter: I) -> Self {
        Self::from_items(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxes() -> ItemVector {
        ItemVector::from_items(vec![
            Item::valid("box", 10u32),
            Item::invalid("box"),
            Item::valid("box", 30u32).with_state(ItemState::Filtered),
        ])
    }

    #[test]
    fn test_map_valid_preserves_positions() {
        let scores = boxes().map_valid("score", |_, item| {
            let side = *item.payload::<u32>().unwrap();
            Item::valid("score", side as f32 / 100.0)
        });

        assert_eq!(scores.len(), 3);
        assert!(scores.is_aligned_with(&boxes()));
        assert_eq!(scores.get(0).unwrap().payload::<f32>(), Some(&0.1));
        assert_eq!(scores.get(1).unwrap().state(), ItemState::Invalid);
        assert_eq!(scores.get(2).unwrap().state(), ItemState::Filtered);
        assert_eq!(scores.get(2).unwrap().type_tag(), "score");
    }

    #[test]
    fn test_placeholder_carries_error() {
        let v = ItemVector::placeholder("box", 2, Some(StageFailure::internal("gpu lost")));
        assert_eq!(v.len(), 2);
        assert_eq!(v.count(ItemState::Invalid), 2);
        assert!(v.is_failed());
        assert!(v.iter().all(|i| i.error().is_some()));
    }

    #[test]
    fn test_no_result_is_not_failure() {
        let v = ItemVector::new().with_error(StageFailure::no_result("nothing detected"));
        assert!(!v.is_failed());
        assert!(v.is_empty());
    }
}
