//! The mutable document artifact and its structural model.
//!
//! A [`Document`] owns everything the pipeline knows about one in-memory
//! document instance: catalog-level metadata, a flat arena of structural
//! nodes (headings, figures, links), and the original bytes the backend
//! parsed it from. The orchestrator exclusively owns the mutation lifecycle:
//! open → mutate via plan steps → persist. No component holds a document
//! across pipeline invocations; each run takes a fresh handle.
//!
//! ## Epoch vs revision
//!
//! Two counters track change. `revision` bumps on every mutation and exists
//! for diagnostics. `epoch` bumps only on identity-shifting mutations
//! (structure retagging can renumber or re-parent nodes), and is what
//! [`crate::index::StructureIndex`] checks to refuse writes against a state
//! it no longer describes. Attribute-level writes (alt-text, link text,
//! metadata) leave the epoch alone, so one index can serve an entire
//! alt-text fan-out.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a structural node within one document instance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// One structural element. The parent link is set at construction and never
/// reassigned, so the node graph cannot form cycles.
#[derive(Debug, Clone)]
pub struct StructureNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    /// 0-indexed page the element appears on.
    pub page: u32,
    pub kind: NodeKind,
}

/// Kind-specific payload of a structural node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Heading(HeadingNode),
    Figure(FigureNode),
    Link(LinkNode),
}

/// A heading or heading candidate.
#[derive(Debug, Clone)]
pub struct HeadingNode {
    /// 1–3; assigned by the font-size heuristic at load, refined when tagged.
    pub level: u8,
    pub text: String,
    pub font_size: f32,
    pub bold: bool,
    /// Whether a heading structure element exists in the tag tree.
    pub tagged: bool,
}

/// A raster figure extracted from the page resources.
#[derive(Debug, Clone)]
pub struct FigureNode {
    pub width: u32,
    pub height: u32,
    /// Normalised PNG bytes for the inference call.
    pub image_png: Vec<u8>,
    /// Nearby caption text, when the backend found any.
    pub caption: Option<String>,
    /// Accessible description, when present or generated.
    pub alt_text: Option<String>,
    /// Set when description generation exhausted its retries.
    pub description_failed: bool,
    /// Whether a Figure structure element exists in the tag tree.
    pub tagged: bool,
}

/// A link annotation.
#[derive(Debug, Clone)]
pub struct LinkNode {
    pub uri: Option<String>,
    /// Accessible link text (annotation contents).
    pub link_text: Option<String>,
    pub tagged: bool,
}

/// Document-level metadata relevant to the compliance model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocMetadata {
    pub title: Option<String>,
    pub language: Option<String>,
    /// MarkInfo/Marked: the document declares itself tagged.
    pub marked: bool,
    /// A structure tree root exists.
    pub has_struct_root: bool,
    /// Viewer preference to display the document title instead of the
    /// filename.
    pub display_doc_title: bool,
    pub page_count: u32,
}

/// The mutable document artifact.
pub struct Document {
    metadata: DocMetadata,
    nodes: Vec<StructureNode>,
    source_bytes: Vec<u8>,
    revision: u64,
    epoch: u64,
}

impl Document {
    /// Assemble a document from an already-built model.
    ///
    /// Used by the backend after parsing, and directly by tests that want a
    /// synthetic document without PDF bytes.
    pub fn from_model(
        metadata: DocMetadata,
        nodes: Vec<StructureNode>,
        source_bytes: Vec<u8>,
    ) -> Self {
        Self {
            metadata,
            nodes,
            source_bytes,
            revision: 0,
            epoch: 0,
        }
    }

    pub fn metadata(&self) -> &DocMetadata {
        &self.metadata
    }

    pub fn nodes(&self) -> &[StructureNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&StructureNode> {
        self.nodes.get(id.0 as usize)
    }

    pub fn source_bytes(&self) -> &[u8] {
        &self.source_bytes
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    // ── Crate-private mutation surface ───────────────────────────────────
    //
    // All mutations flow through the scoped writer in `crate::index`; tools
    // never touch these directly.

    pub(crate) fn metadata_mut(&mut self) -> &mut DocMetadata {
        self.revision += 1;
        &mut self.metadata
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut StructureNode> {
        self.revision += 1;
        self.nodes.get_mut(id.0 as usize)
    }

    /// Record an identity-shifting mutation (structure retagging).
    /// Outstanding indices become stale.
    pub(crate) fn shift_identities(&mut self) {
        self.revision += 1;
        self.epoch += 1;
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("metadata", &self.metadata)
            .field("nodes", &self.nodes.len())
            .field("source_bytes", &self.source_bytes.len())
            .field("revision", &self.revision)
            .field("epoch", &self.epoch)
            .finish()
    }
}
