//! Audio engine wiring - owns the node topology
//!
//! The engine here records which nodes are attached and how they connect;
//! actual block rendering happens inside the host-managed units and is out of
//! scope. Methods take `&self` so nodes owned by different threads can wire
//! into the same shared topology.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use hashbrown::HashMap;
use petgraph::graph::{Graph, NodeIndex};
use tracing::debug;

use crate::error::Error;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a node attached to an [`Engine`]
///
/// Ids are process-unique, so a node from one engine can never be mistaken
/// for a node of another.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(u64);

struct EngineInner {
    graph: Graph<String, ()>,
    indices: HashMap<NodeId, NodeIndex>,
}

/// The shared audio engine
pub struct Engine {
    inner: Mutex<EngineInner>,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(EngineInner {
                graph: Graph::with_capacity(64, 64),
                indices: HashMap::new(),
            }),
        }
    }

    /// Attach a node, returning its id
    pub fn attach(&self, label: impl Into<String>) -> NodeId {
        let mut inner = self.inner.lock().unwrap();
        let id = NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed));

        let label = label.into();
        debug!(?id, %label, "node attached");
        let idx = inner.graph.add_node(label);
        inner.indices.insert(id, idx);
        id
    }

    /// Connect output of `from` to input of `to`
    pub fn connect(&self, from: NodeId, to: NodeId) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        let from_idx = *inner.indices.get(&from).ok_or(Error::UnknownNode(from))?;
        let to_idx = *inner.indices.get(&to).ok_or(Error::UnknownNode(to))?;

        inner.graph.add_edge(from_idx, to_idx, ());
        debug!(?from, ?to, "nodes connected");
        Ok(())
    }

    /// Whether `id` is attached to this engine
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.inner.lock().unwrap().indices.contains_key(&id)
    }

    /// Whether an edge `from -> to` exists
    pub fn is_connected(&self, from: NodeId, to: NodeId) -> bool {
        let inner = self.inner.lock().unwrap();
        match (inner.indices.get(&from), inner.indices.get(&to)) {
            (Some(&f), Some(&t)) => inner.graph.find_edge(f, t).is_some(),
            _ => false,
        }
    }

    /// Number of attached nodes
    pub fn node_count(&self) -> usize {
        self.inner.lock().unwrap().graph.node_count()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
