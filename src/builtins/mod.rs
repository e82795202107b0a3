//! Built-in function table for Nyx programs.
//!
//! Grouped the way the reference native module does: arithmetic helpers,
//! collection/object reflection, type predicates and conversions, console
//! and file I/O, the class-construction reflection API, and the version
//! pair. Each category module exposes a `register(&Environment)` that
//! binds its functions as global names; `register_all` calls every one.

use crate::env::Environment;
use std::rc::Rc;

pub mod arithmetic;
pub mod classes;
pub mod collections;
pub mod io;
pub mod types;
pub mod version;

pub fn register_all(env: &Rc<Environment>) {
    arithmetic::register(env);
    collections::register(env);
    types::register(env);
    io::register(env);
    classes::register(env);
    version::register(env);
}
