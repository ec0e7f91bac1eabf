//! Scene nodes and the connection graph that assembles them.
//!
//! A node config points at a COLLADA source whose `type:key` nodes become
//! objects and plug/receiver endpoints. The [`SceneNodeGraph`] links a plug
//! into a receiver by moving the plug's node onto it.
//!
//! # Invariants
//! - An endpoint takes part in at most one connection.
//! - The first node added is central and is never removed.
//! - After a disconnect only nodes reachable from the central node remain.

mod bootstrap;
mod connection;
mod graph;
mod loader;
mod node;
mod source;
#[cfg(test)]
mod test_support;

pub use bootstrap::Workspace;
pub use connection::{ConnectionKind, ConnectionProperties, SceneNodeConnection};
pub use graph::{
    Connection, EndpointId, Found, GraphEvent, NodeLookup, ReachabilityPolicy, SceneNodeGraph,
};
pub use loader::{NodeDatabase, NodeLoader};
pub use node::{PreConnect, SceneNode};
pub use source::{ObjectSpecification, ObjectType, Primitive, SceneError, SceneSource};

pub fn crate_info() -> &'static str {
    "scenecraft-scene v0.1.0"
}
