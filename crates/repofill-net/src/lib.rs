//! # Repofill Net
//!
//! The boundary between the repofill engine and the name-addressed content
//! network it drives.
//!
//! ## Overview
//!
//! The engine never talks to a network directly. It opens a [`Session`]
//! through a [`ContentNetwork`] and uses four primitives:
//!
//! - **Enumeration**: [`Session::register_interest`] asks every answering
//!   source for the immediate children of a prefix; answers arrive through a
//!   [`ChildrenListener`] callback, possibly from another thread and possibly
//!   several times. [`Session::cancel_interest`] ends the registration.
//! - **Reading**: [`Session::open_read`] resolves a name to a [`ByteStream`].
//! - **Writing**: [`Session::open_write`] opens a [`ByteSink`] in the local
//!   repository.
//! - **Teardown**: [`Session::close`].
//!
//! ## Backends
//!
//! - [`MemoryNetwork`] - Scripted in-memory network for tests
//! - [`DirNetwork`] - A directory tree serving as the network, a second
//!   directory serving as the local repository
//!
//! ## Directory Layout
//!
//! ```text
//! network/
//!   videos/
//!     intro/
//!       =FD01        <- version 1 of /videos/intro
//!       =FD02        <- version 2 of /videos/intro
//! ```

pub mod dir;
pub mod error;
pub mod memory;
pub mod network;

pub use dir::DirNetwork;
pub use error::{NetError, Result};
pub use memory::{MemoryNetwork, MemorySession, SourceId};
pub use network::{
    Addressing, ByteSink, ByteStream, ChildrenListener, ContentNetwork, EnumerationScope,
    Interest, Session,
};
