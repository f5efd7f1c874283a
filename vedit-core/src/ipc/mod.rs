//! Plain data types handed to front-ends.
//!
//! Everything here is serde-serialisable and free of UI types, so any
//! presentation layer can subscribe to or poll results.

pub mod events;
