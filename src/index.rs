//! Addressable view over a document's structural tree.
//!
//! A [`StructureIndex`] is a snapshot: it reflects exactly the document state
//! at the time it was built, identified by the document epoch. Queries are
//! cheap copies; writes go through an [`IndexWriter`] that refuses to operate
//! against a stale snapshot and confines mutations to the step's declared
//! target scope.
//!
//! ## Why refuse stale writes instead of re-resolving?
//!
//! After an identity-shifting mutation (structure retagging) a node id may
//! describe a node that moved or no longer exists. Applying a plan step
//! through an old index would silently mutate the wrong element. Forcing an
//! explicit rebuild turns that silent corruption into
//! [`RemediateError::StaleIndex`], which is always a defect in the caller.

use crate::document::{DocMetadata, Document, NodeId, NodeKind};
use crate::error::RemediateError;
use crate::plan::{StepTarget, ToolKind};

/// Snapshot of a heading (or heading candidate) in document order.
#[derive(Debug, Clone)]
pub struct HeadingView {
    pub id: NodeId,
    pub level: u8,
    pub text: String,
    pub page: u32,
    pub font_size: f32,
    pub bold: bool,
    pub tagged: bool,
}

/// Snapshot of a figure.
#[derive(Debug, Clone)]
pub struct FigureView {
    pub id: NodeId,
    pub page: u32,
    pub width: u32,
    pub height: u32,
    pub has_alt: bool,
    pub description_failed: bool,
    pub tagged: bool,
}

/// Snapshot of a link annotation.
#[derive(Debug, Clone)]
pub struct LinkView {
    pub id: NodeId,
    pub page: u32,
    pub uri: Option<String>,
    pub has_text: bool,
    pub tagged: bool,
}

/// Navigable snapshot of the document's structural elements.
pub struct StructureIndex {
    epoch: u64,
    metadata: DocMetadata,
    headings: Vec<HeadingView>,
    figures: Vec<FigureView>,
    links: Vec<LinkView>,
}

impl StructureIndex {
    /// Build an index over the document's current state.
    pub fn build(doc: &Document) -> Self {
        let mut headings = Vec::new();
        let mut figures = Vec::new();
        let mut links = Vec::new();

        for node in doc.nodes() {
            match &node.kind {
                NodeKind::Heading(h) => headings.push(HeadingView {
                    id: node.id,
                    level: h.level,
                    text: h.text.clone(),
                    page: node.page,
                    font_size: h.font_size,
                    bold: h.bold,
                    tagged: h.tagged,
                }),
                NodeKind::Figure(fig) => figures.push(FigureView {
                    id: node.id,
                    page: node.page,
                    width: fig.width,
                    height: fig.height,
                    has_alt: fig.alt_text.is_some(),
                    description_failed: fig.description_failed,
                    tagged: fig.tagged,
                }),
                NodeKind::Link(l) => links.push(LinkView {
                    id: node.id,
                    page: node.page,
                    uri: l.uri.clone(),
                    has_text: l.link_text.as_deref().is_some_and(|t| !t.is_empty()),
                    tagged: l.tagged,
                }),
            }
        }

        Self {
            epoch: doc.epoch(),
            metadata: doc.metadata().clone(),
            headings,
            figures,
            links,
        }
    }

    /// The document epoch this index was built against.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn metadata(&self) -> &DocMetadata {
        &self.metadata
    }

    /// Headings in document order, nesting level included.
    pub fn headings(&self) -> &[HeadingView] {
        &self.headings
    }

    /// Heading candidates not yet promoted to tagged heading elements.
    pub fn untagged_headings(&self) -> impl Iterator<Item = &HeadingView> {
        self.headings.iter().filter(|h| !h.tagged)
    }

    pub fn figures(&self) -> &[FigureView] {
        &self.figures
    }

    /// Figures without an accessible description, excluding those already
    /// marked as permanently failed.
    pub fn figures_missing_alt(&self) -> impl Iterator<Item = &FigureView> {
        self.figures
            .iter()
            .filter(|f| !f.has_alt && !f.description_failed)
    }

    pub fn links(&self) -> &[LinkView] {
        &self.links
    }

    /// Links without accessible link text.
    pub fn links_missing_text(&self) -> impl Iterator<Item = &LinkView> {
        self.links.iter().filter(|l| !l.has_text)
    }

    /// Open a scoped writer against `doc`.
    ///
    /// Fails with [`RemediateError::StaleIndex`] when the document has
    /// shifted identities since this index was built.
    pub fn writer<'a>(
        &self,
        doc: &'a mut Document,
        tool: ToolKind,
        scope: StepTarget,
    ) -> Result<IndexWriter<'a>, RemediateError> {
        if self.epoch != doc.epoch() {
            return Err(RemediateError::StaleIndex {
                index_epoch: self.epoch,
                document_epoch: doc.epoch(),
            });
        }
        Ok(IndexWriter { doc, tool, scope })
    }
}

/// Scoped write handle over a document.
///
/// Constructed only through [`StructureIndex::writer`], which is what makes
/// scope confinement structural: a tool receives a writer carrying its
/// step's declared target and physically cannot reach other nodes.
#[derive(Debug)]
pub struct IndexWriter<'a> {
    doc: &'a mut Document,
    tool: ToolKind,
    scope: StepTarget,
}

impl IndexWriter<'_> {
    fn check_node(&self, id: NodeId) -> Result<(), RemediateError> {
        match &self.scope {
            StepTarget::DocumentScope => Ok(()),
            StepTarget::Nodes(ids) if ids.contains(&id) => Ok(()),
            StepTarget::Nodes(_) => Err(RemediateError::ScopeViolation { tool: self.tool }),
        }
    }

    fn check_document_scope(&self) -> Result<(), RemediateError> {
        match &self.scope {
            StepTarget::DocumentScope => Ok(()),
            StepTarget::Nodes(_) => Err(RemediateError::ScopeViolation { tool: self.tool }),
        }
    }

    // ── Document-scope writes ────────────────────────────────────────────

    pub fn set_title(&mut self, title: impl Into<String>) -> Result<(), RemediateError> {
        self.check_document_scope()?;
        self.doc.metadata_mut().title = Some(title.into());
        Ok(())
    }

    pub fn set_language(&mut self, lang: impl Into<String>) -> Result<(), RemediateError> {
        self.check_document_scope()?;
        self.doc.metadata_mut().language = Some(lang.into());
        Ok(())
    }

    pub fn set_display_doc_title(&mut self, value: bool) -> Result<(), RemediateError> {
        self.check_document_scope()?;
        self.doc.metadata_mut().display_doc_title = value;
        Ok(())
    }

    /// Mark the document as tagged and materialise the structure-tree root.
    ///
    /// Consumes the writer: this is an identity-shifting mutation, so the
    /// index the writer came from is stale afterwards and the orchestrator
    /// must rebuild before the next step.
    pub fn materialize_structure_root(self) -> Result<(), RemediateError> {
        self.check_document_scope()?;
        {
            let meta = self.doc.metadata_mut();
            meta.marked = true;
            meta.has_struct_root = true;
        }
        self.doc.shift_identities();
        Ok(())
    }

    // ── Node-scope writes; each returns the affected node id ─────────────

    pub fn set_alt_text(
        &mut self,
        id: NodeId,
        alt: impl Into<String>,
    ) -> Result<NodeId, RemediateError> {
        self.check_node(id)?;
        let node = self.require_node(id)?;
        match &mut node.kind {
            NodeKind::Figure(fig) => {
                fig.alt_text = Some(alt.into());
                fig.description_failed = false;
                fig.tagged = true;
                Ok(id)
            }
            _ => Err(RemediateError::Internal(format!(
                "set_alt_text on non-figure node {id}"
            ))),
        }
    }

    pub fn mark_description_failed(&mut self, id: NodeId) -> Result<NodeId, RemediateError> {
        self.check_node(id)?;
        let node = self.require_node(id)?;
        match &mut node.kind {
            NodeKind::Figure(fig) => {
                fig.description_failed = true;
                Ok(id)
            }
            _ => Err(RemediateError::Internal(format!(
                "mark_description_failed on non-figure node {id}"
            ))),
        }
    }

    pub fn set_link_text(
        &mut self,
        id: NodeId,
        text: impl Into<String>,
    ) -> Result<NodeId, RemediateError> {
        self.check_node(id)?;
        let node = self.require_node(id)?;
        match &mut node.kind {
            NodeKind::Link(link) => {
                link.link_text = Some(text.into());
                link.tagged = true;
                Ok(id)
            }
            _ => Err(RemediateError::Internal(format!(
                "set_link_text on non-link node {id}"
            ))),
        }
    }

    pub fn tag_heading(&mut self, id: NodeId, level: u8) -> Result<NodeId, RemediateError> {
        self.check_node(id)?;
        let node = self.require_node(id)?;
        match &mut node.kind {
            NodeKind::Heading(h) => {
                h.level = level.clamp(1, 3);
                h.tagged = true;
                Ok(id)
            }
            _ => Err(RemediateError::Internal(format!(
                "tag_heading on non-heading node {id}"
            ))),
        }
    }

    fn require_node(
        &mut self,
        id: NodeId,
    ) -> Result<&mut crate::document::StructureNode, RemediateError> {
        self.doc
            .node_mut(id)
            .ok_or_else(|| RemediateError::Internal(format!("node {id} not in document")))
    }
}
