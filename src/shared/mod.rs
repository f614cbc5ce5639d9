//! Small cross-cutting helpers shared by the store, codec and graph modules.

pub mod ulid;
