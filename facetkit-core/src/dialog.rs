//! Dialogs and confirmation prompts
//!
//! Dialog presentation belongs to the view; the engine only needs to know
//! whether the user confirmed.

use indexmap::IndexMap;
use std::fmt;

/// Outcome of presenting a dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogResult {
    Confirmed,
    Cancelled,
}

/// A named dialog owned by a facet
pub trait Dialog: Send {
    fn name(&self) -> &str;

    /// Present the dialog with a message and report the user's choice
    fn open(&mut self, message: &str) -> DialogResult;
}

/// Blocking confirmation used when an action has no dialog of its own
pub trait Confirm {
    fn confirm(&mut self, message: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, message: &str) -> bool {
        self(message)
    }
}

/// Confirmation that always answers the same way
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl Confirm for AutoConfirm {
    fn confirm(&mut self, _message: &str) -> bool {
        self.0
    }
}

/// Facet dialogs keyed by name; registering a name again replaces the old one
#[derive(Default)]
pub struct DialogRegistry {
    dialogs: IndexMap<String, Box<dyn Dialog>>,
}

impl DialogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, dialog: Box<dyn Dialog>) {
        self.dialogs.insert(dialog.name().to_string(), dialog);
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn Dialog + 'static)> {
        self.dialogs.get_mut(name).map(|d| d.as_mut())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.dialogs.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.dialogs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.dialogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dialogs.is_empty()
    }
}

impl fmt::Debug for DialogRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.dialogs.keys()).finish()
    }
}
