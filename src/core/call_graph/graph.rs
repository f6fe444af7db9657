// src/core/call_graph/graph.rs
use std::collections::HashMap;
use std::fmt;
use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, ResolutionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

/// Declaring type, name and descriptor of a JVM method
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodSignature {
    /// Internal class name, e.g. `Lcom/acme/App`
    pub declaring_class: String,
    pub name: String,
    /// JVM descriptor, e.g. `([Ljava/lang/String;)V`
    pub descriptor: String,
}

impl MethodSignature {
    pub fn new(declaring_class: &str, name: &str, descriptor: &str) -> Self {
        Self {
            declaring_class: declaring_class.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }

    /// Declaring class in dotted source form: `Lcom/acme/App` -> `com.acme.App`
    pub fn class_display_name(&self) -> String {
        let trimmed = self
            .declaring_class
            .strip_prefix('L')
            .unwrap_or(&self.declaring_class);
        let trimmed = trimmed.strip_suffix(';').unwrap_or(trimmed);
        trimmed.replace('/', ".")
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.class_display_name(), self.name, self.descriptor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstructionKind {
    Invoke,
    New,
    Other,
}

/// One instruction of a method body as the engine reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub kind: InstructionKind,
    /// Structural site identifier, present for invoke/new instructions
    #[serde(default)]
    pub site: Option<String>,
    /// Bytecode offset, absent when the engine could not map the instruction
    #[serde(default)]
    pub offset: Option<u32>,
}

impl Instruction {
    pub fn is_call_site(&self) -> bool {
        matches!(self.kind, InstructionKind::Invoke | InstructionKind::New)
    }
}

/// `(start_pc, line)` entry of a method's line number table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEntry {
    pub start_pc: u32,
    pub line: u32,
}

/// An analyzed method with the debug data needed for source mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Method {
    pub id: MethodId,
    pub signature: MethodSignature,
    /// Injected by the analysis engine rather than present in source
    #[serde(default)]
    pub synthetic: bool,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    #[serde(default)]
    pub line_table: Vec<LineEntry>,
}

impl Method {
    /// Source line for a bytecode offset via the line number table.
    ///
    /// Picks the entry with the greatest `start_pc <= pc`, independent of the
    /// order the table is stored in.
    pub fn line_number(&self, pc: u32) -> Option<u32> {
        self.line_table
            .iter()
            .filter(|entry| entry.start_pc <= pc)
            .max_by_key(|entry| entry.start_pc)
            .map(|entry| entry.line)
    }

    /// Bytecode offset of the instruction at `index`
    pub fn bytecode_offset(&self, index: usize) -> std::result::Result<u32, ResolutionError> {
        self.instructions
            .get(index)
            .and_then(|instruction| instruction.offset)
            .ok_or_else(|| ResolutionError::MissingOffset {
                method: self.signature.to_string(),
                index,
            })
    }
}

/// One `(method, site)` pair of a call-string or allocation-string context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub method: MethodId,
    pub pc: u32,
    /// Raw site text used when the line cannot be resolved
    pub site: String,
}

/// Context attached to a graph node, tagged by sensitivity policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Context {
    /// Context-insensitive node
    Everywhere,
    CallString { entries: Vec<ContextEntry> },
    AllocationString { entries: Vec<ContextEntry> },
    /// Any context kind the resolver has no procedure for
    Unsupported(String),
}

impl Context {
    pub fn kind_name(&self) -> &str {
        match self {
            Context::Everywhere => "everywhere",
            Context::CallString { .. } => "call-string",
            Context::AllocationString { .. } => "allocation-string",
            Context::Unsupported(kind) => kind,
        }
    }
}

/// A call or allocation site inside a node's method, with its resolved targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub site: String,
    pub pc: u32,
    /// One entry per possible callee node, in engine order
    #[serde(default)]
    pub targets: Vec<NodeId>,
}

/// One analyzed method under one context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub id: NodeId,
    pub method: MethodId,
    pub context: Context,
    pub call_sites: Vec<CallSite>,
}

/// Call graph as returned by the engine.
///
/// Nodes keep the engine's enumeration order; lookups go through id indexes.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    methods: HashMap<MethodId, Method>,
    nodes: Vec<GraphNode>,
    node_index: HashMap<NodeId, usize>,
    /// Ids added more than once, reported by `validate`
    duplicate_methods: Vec<MethodId>,
    duplicate_nodes: Vec<NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a method. A repeated id keeps the first method and makes the
    /// graph invalid.
    pub fn add_method(&mut self, method: Method) {
        if self.methods.contains_key(&method.id) {
            self.duplicate_methods.push(method.id);
            return;
        }
        self.methods.insert(method.id, method);
    }

    /// Add a node. A repeated id keeps the first node in the index and makes
    /// the graph invalid.
    pub fn add_node(&mut self, node: GraphNode) {
        if self.node_index.contains_key(&node.id) {
            self.duplicate_nodes.push(node.id);
        } else {
            self.node_index.insert(node.id, self.nodes.len());
        }
        self.nodes.push(node);
    }

    pub fn method(&self, id: MethodId) -> Option<&Method> {
        self.methods.get(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.node_index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node_index.contains_key(&id)
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of `(caller, site, target)` triples
    pub fn edge_count(&self) -> usize {
        self.nodes
            .iter()
            .flat_map(|node| node.call_sites.iter())
            .map(|site| site.targets.len())
            .sum()
    }

    /// Drop targets that point at nodes outside the graph
    pub fn prune_dangling_targets(&mut self) -> usize {
        let known: std::collections::HashSet<NodeId> = self.node_index.keys().copied().collect();
        let mut removed = 0;
        for node in &mut self.nodes {
            for site in &mut node.call_sites {
                let before = site.targets.len();
                site.targets.retain(|target| known.contains(target));
                removed += before - site.targets.len();
            }
        }
        removed
    }

    /// Check that ids are unique, every node's method exists and no edge dangles
    pub fn validate(&self) -> Result<()> {
        if let Some(id) = self.duplicate_methods.first() {
            return Err(ExtractError::GraphConstruction(format!(
                "method id {} appears more than once",
                id.0
            )));
        }
        if let Some(id) = self.duplicate_nodes.first() {
            return Err(ExtractError::GraphConstruction(format!(
                "node id {} appears more than once",
                id.0
            )));
        }
        for node in &self.nodes {
            if !self.methods.contains_key(&node.method) {
                return Err(ExtractError::GraphConstruction(format!(
                    "node {} refers to missing method {}",
                    node.id.0, node.method.0
                )));
            }
            for site in &node.call_sites {
                if let Some(target) = site.targets.iter().find(|t| !self.contains_node(**t)) {
                    return Err(ExtractError::GraphConstruction(format!(
                        "call site '{}' in node {} targets missing node {}",
                        site.site, node.id.0, target.0
                    )));
                }
            }
        }
        Ok(())
    }
}
