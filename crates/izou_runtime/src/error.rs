//! Add-on loading errors.

/// Errors raised by [`Izou::add_addon`](crate::Izou::add_addon).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddOnError {
    /// An add-on with the same ID was loaded before.
    #[error("add-on '{0}' is already loaded")]
    AlreadyLoaded(String),

    /// The add-on's ID is empty.
    #[error("add-on has an empty ID")]
    EmptyId,

    /// Another component holds the add-on's ID.
    #[error("add-on ID '{0}' is held by another component")]
    IdTaken(String),
}
