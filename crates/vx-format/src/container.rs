//! Ordered sequence of items with name-first and index lookups.

use std::fmt;

use crate::error::FormatError;
use crate::tag::{DataItem, Value};

/// An ordered list of items.
///
/// Named and indexed lookups return the first match. `set_named` and
/// `set_indexed` replace that first match in place and append otherwise, so
/// the position of an existing entry never changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Container {
    items: Vec<DataItem>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, item: DataItem) {
        self.items.push(item);
    }

    /// Append an unnamed, unindexed value.
    pub fn push_value(&mut self, value: impl Into<Value>) {
        self.items.push(DataItem::new(value));
    }

    pub fn get(&self, position: usize) -> Option<&DataItem> {
        self.items.get(position)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DataItem> {
        self.items.iter()
    }

    /// Fails with `NameTooLong` and leaves the container untouched when the
    /// name does not fit the one-byte length prefix.
    pub fn set_named(&mut self, name: &str, value: impl Into<Value>) -> Result<(), FormatError> {
        let item = DataItem::named(name, value)?;
        match self.items.iter_mut().find(|i| i.name() == Some(name)) {
            Some(slot) => *slot = item,
            None => self.items.push(item),
        }
        Ok(())
    }

    pub fn get_named(&self, name: &str) -> Option<&DataItem> {
        self.items.iter().find(|i| i.name() == Some(name))
    }

    pub fn get_named_mut(&mut self, name: &str) -> Option<&mut DataItem> {
        self.items.iter_mut().find(|i| i.name() == Some(name))
    }

    /// Shorthand for the value of the first item called `name`.
    pub fn named_value(&self, name: &str) -> Option<&Value> {
        self.get_named(name).map(|i| &i.value)
    }

    pub fn set_indexed(&mut self, index: u64, value: impl Into<Value>) {
        let item = DataItem::indexed(index, value);
        match self.items.iter_mut().find(|i| i.index() == Some(index)) {
            Some(slot) => *slot = item,
            None => self.items.push(item),
        }
    }

    pub fn get_indexed(&self, index: u64) -> Option<&DataItem> {
        self.items.iter().find(|i| i.index() == Some(index))
    }

    pub fn get_indexed_mut(&mut self, index: u64) -> Option<&mut DataItem> {
        self.items.iter_mut().find(|i| i.index() == Some(index))
    }

    fn fmt_level(&self, f: &mut fmt::Formatter<'_>, level: usize) -> fmt::Result {
        writeln!(f, "{:indent$}container, {} items", "", self.items.len(), indent = level)?;
        for item in &self.items {
            write!(f, "{:indent$}{}", "", item.value, indent = level)?;
            if let Some(name) = item.name() {
                write!(f, " name={name}")?;
            }
            if let Some(index) = item.index() {
                write!(f, " index={index}")?;
            }
            writeln!(f)?;
            if let Value::Container(inner) = &item.value {
                inner.fmt_level(f, level + 1)?;
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Container {
    type Item = &'a DataItem;
    type IntoIter = std::slice::Iter<'a, DataItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl FromIterator<DataItem> for Container {
    fn from_iter<T: IntoIterator<Item = DataItem>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// Indented tree dump, one line per item.
impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_level(f, 0)
    }
}
