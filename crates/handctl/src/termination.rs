//! Defines the [`Termination`] trait.

use std::{convert::Infallible, fmt::Debug, process};

/// Extends [`std::process::Termination`] with a way to inspect the exit status.
///
/// The GUI event loop never returns on some platforms, so the process is exited from the
/// application thread instead, with a status derived from the value returned by `main`.
pub trait Termination: process::Termination {
    fn is_success(&self) -> bool;
}

impl Termination for Infallible {
    fn is_success(&self) -> bool {
        match *self {}
    }
}

impl Termination for () {
    fn is_success(&self) -> bool {
        true
    }
}

impl<T: Termination, E: Debug> Termination for Result<T, E> {
    fn is_success(&self) -> bool {
        match self {
            Ok(term) => term.is_success(),
            Err(_) => false,
        }
    }
}
