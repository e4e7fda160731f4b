//! Remediation planning: goals + current structure → an ordered plan.
//!
//! The dependency graph between tool kinds is a fixed table, not caller
//! input: document metadata and structure tagging precede heading tagging,
//! and heading tagging precedes link-text repair and alt-text injection
//! (both attach descriptions to a tagged tree). Plans come out in
//! topological order by construction — planning fails rather than producing
//! a cyclic plan, and a step's dependencies are guaranteed to appear
//! earlier in the same plan.
//!
//! Applicability is decided against the [`StructureIndex`]: a step is only
//! planned when the index shows work for it, which is what makes re-running
//! full remediation on an already-remediated document produce an empty plan
//! instead of spurious re-tagging.

use crate::document::NodeId;
use crate::error::RemediateError;
use crate::index::StructureIndex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

/// The closed set of remediation tool kinds.
///
/// Dispatch is by exhaustive `match` everywhere — adding a kind without
/// wiring its executor or dependencies is a compile error, not a runtime
/// lookup miss.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    /// Title, language, viewer preferences.
    MetadataWriter,
    /// MarkInfo/Marked + structure-tree root.
    StructureTagger,
    /// Promote heading candidates to tagged heading elements.
    HeadingTagger,
    /// Accessible link text for link annotations.
    LinkTextFixer,
    /// Generated descriptions for figures.
    AltTextInjector,
}

impl ToolKind {
    pub const ALL: [ToolKind; 5] = [
        ToolKind::MetadataWriter,
        ToolKind::StructureTagger,
        ToolKind::HeadingTagger,
        ToolKind::LinkTextFixer,
        ToolKind::AltTextInjector,
    ];

    /// Tool kinds that must run before this one, when they are applicable.
    pub fn dependencies(self) -> &'static [ToolKind] {
        match self {
            ToolKind::MetadataWriter => &[],
            ToolKind::StructureTagger => &[ToolKind::MetadataWriter],
            ToolKind::HeadingTagger => &[ToolKind::StructureTagger],
            ToolKind::LinkTextFixer => &[ToolKind::HeadingTagger],
            ToolKind::AltTextInjector => &[ToolKind::HeadingTagger],
        }
    }
}

impl fmt::Display for ToolKind {
    // Kept in sync with the serde kebab-case rename.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ToolKind::MetadataWriter => "metadata-writer",
            ToolKind::StructureTagger => "structure-tagger",
            ToolKind::HeadingTagger => "heading-tagger",
            ToolKind::LinkTextFixer => "link-text-fixer",
            ToolKind::AltTextInjector => "alt-text-injector",
        };
        f.write_str(s)
    }
}

/// What a remediation run is asked to achieve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemediationGoal {
    /// Everything: structure, metadata, headings, links, alt-text.
    Full,
    /// Tagging and metadata only; no inference calls.
    StructureOnly,
    /// Figure descriptions (plus whatever tagging they require).
    AltTextOnly,
}

impl RemediationGoal {
    /// The tools this goal directly asks for (dependencies are added by the
    /// planner).
    fn requested_tools(self) -> &'static [ToolKind] {
        match self {
            RemediationGoal::Full => &ToolKind::ALL,
            RemediationGoal::StructureOnly => &[
                ToolKind::MetadataWriter,
                ToolKind::StructureTagger,
                ToolKind::HeadingTagger,
            ],
            RemediationGoal::AltTextOnly => &[ToolKind::AltTextInjector],
        }
    }
}

impl fmt::Display for RemediationGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RemediationGoal::Full => "full",
            RemediationGoal::StructureOnly => "structure-only",
            RemediationGoal::AltTextOnly => "alt-text-only",
        };
        f.write_str(s)
    }
}

/// Target scope of one step. Tools only ever receive a write handle bound to
/// this scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepTarget {
    /// The document catalog and tag tree as a whole.
    DocumentScope,
    /// A fixed set of structural nodes.
    Nodes(Vec<NodeId>),
}

/// One planned remediation operation. Pure specification: executing it is
/// the only way it takes effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationStep {
    pub tool: ToolKind,
    pub target: StepTarget,
    /// Tools this step waits on; always a subset of the tools planned
    /// earlier in the same plan.
    pub depends_on: BTreeSet<ToolKind>,
}

/// An ordered, dependency-respecting sequence of steps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemediationPlan {
    steps: Vec<RemediationStep>,
}

impl RemediationPlan {
    pub fn steps(&self) -> &[RemediationStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }
}

/// Compute a plan for `goals` against the current index, with every tool
/// kind available.
pub fn plan(
    goals: &[RemediationGoal],
    index: &StructureIndex,
) -> Result<RemediationPlan, RemediateError> {
    plan_with_tools(goals, index, &ToolKind::ALL.into_iter().collect())
}

/// Compute a plan restricted to `available` tools.
///
/// Shells restrict the tool set when a capability is absent (no inference
/// provider configured → no alt-text injector). A goal whose tools are all
/// unavailable is [`RemediateError::UnsatisfiableGoal`]; so is a goal whose
/// dependency chain leaves the available set.
pub fn plan_with_tools(
    goals: &[RemediationGoal],
    index: &StructureIndex,
    available: &BTreeSet<ToolKind>,
) -> Result<RemediationPlan, RemediateError> {
    let mut requested: BTreeSet<ToolKind> = BTreeSet::new();
    for goal in goals {
        let capable: Vec<ToolKind> = goal
            .requested_tools()
            .iter()
            .copied()
            .filter(|t| available.contains(t))
            .collect();
        if capable.is_empty() {
            return Err(RemediateError::UnsatisfiableGoal {
                goal: goal.to_string(),
            });
        }
        requested.extend(capable);
    }

    // Transitive dependency closure, filtered by applicability below.
    let mut closed = requested.clone();
    let mut frontier: Vec<ToolKind> = requested.iter().copied().collect();
    while let Some(tool) = frontier.pop() {
        for dep in tool.dependencies() {
            if !available.contains(dep) {
                return Err(RemediateError::UnsatisfiableGoal {
                    goal: format!("{tool} requires unavailable tool {dep}"),
                });
            }
            if closed.insert(*dep) {
                frontier.push(*dep);
            }
        }
    }

    // Keep only tools with actual work; their targets come from the index.
    let included: BTreeMap<ToolKind, StepTarget> = closed
        .into_iter()
        .filter_map(|tool| applicable_target(tool, index).map(|target| (tool, target)))
        .collect();

    let order = toposort(
        &included.keys().copied().collect::<BTreeSet<_>>(),
        ToolKind::dependencies,
    )?;

    let steps = order
        .into_iter()
        .map(|tool| RemediationStep {
            tool,
            target: included[&tool].clone(),
            depends_on: tool
                .dependencies()
                .iter()
                .copied()
                .filter(|d| included.contains_key(d))
                .collect(),
        })
        .collect();

    Ok(RemediationPlan { steps })
}

/// Decide whether a tool has work to do, and against which target.
fn applicable_target(tool: ToolKind, index: &StructureIndex) -> Option<StepTarget> {
    let meta = index.metadata();
    match tool {
        ToolKind::MetadataWriter => {
            let needed =
                meta.title.is_none() || meta.language.is_none() || !meta.display_doc_title;
            needed.then_some(StepTarget::DocumentScope)
        }
        ToolKind::StructureTagger => {
            let needed = !meta.marked || !meta.has_struct_root;
            needed.then_some(StepTarget::DocumentScope)
        }
        ToolKind::HeadingTagger => {
            let ids: Vec<NodeId> = index.untagged_headings().map(|h| h.id).collect();
            (!ids.is_empty()).then_some(StepTarget::Nodes(ids))
        }
        ToolKind::LinkTextFixer => {
            let ids: Vec<NodeId> = index.links_missing_text().map(|l| l.id).collect();
            (!ids.is_empty()).then_some(StepTarget::Nodes(ids))
        }
        ToolKind::AltTextInjector => {
            let ids: Vec<NodeId> = index.figures_missing_alt().map(|f| f.id).collect();
            (!ids.is_empty()).then_some(StepTarget::Nodes(ids))
        }
    }
}

/// Kahn's algorithm over the included tool set.
///
/// The dependency lookup is a parameter so tests can exercise the cycle
/// report without corrupting the real table.
fn toposort(
    tools: &BTreeSet<ToolKind>,
    deps_of: impl Fn(ToolKind) -> &'static [ToolKind],
) -> Result<Vec<ToolKind>, RemediateError> {
    let mut in_degree: BTreeMap<ToolKind, usize> = BTreeMap::new();
    for &tool in tools {
        let degree = deps_of(tool).iter().filter(|d| tools.contains(d)).count();
        in_degree.insert(tool, degree);
    }

    let mut ready: VecDeque<ToolKind> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(t, _)| *t)
        .collect();
    let mut order = Vec::with_capacity(tools.len());

    while let Some(tool) = ready.pop_front() {
        order.push(tool);
        for &other in tools {
            if deps_of(other).contains(&tool) {
                let degree = in_degree.get_mut(&other).expect("tool in map");
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(other);
                }
            }
        }
    }

    if order.len() != tools.len() {
        let stuck = in_degree
            .iter()
            .find(|(t, _)| !order.contains(t))
            .map(|(t, _)| *t)
            .unwrap_or(ToolKind::MetadataWriter);
        return Err(RemediateError::CyclicDependency { tool: stuck });
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{
        DocMetadata, Document, FigureNode, HeadingNode, LinkNode, NodeKind, StructureNode,
    };

    fn untagged_doc() -> Document {
        let nodes = vec![
            StructureNode {
                id: NodeId(0),
                parent: None,
                page: 0,
                kind: NodeKind::Heading(HeadingNode {
                    level: 1,
                    text: "Results".into(),
                    font_size: 20.0,
                    bold: true,
                    tagged: false,
                }),
            },
            StructureNode {
                id: NodeId(1),
                parent: None,
                page: 0,
                kind: NodeKind::Figure(FigureNode {
                    width: 640,
                    height: 480,
                    image_png: vec![0u8; 16],
                    caption: None,
                    alt_text: None,
                    description_failed: false,
                    tagged: false,
                }),
            },
            StructureNode {
                id: NodeId(2),
                parent: None,
                page: 0,
                kind: NodeKind::Link(LinkNode {
                    uri: Some("mailto:ed@example.org".into()),
                    link_text: None,
                    tagged: false,
                }),
            },
        ];
        Document::from_model(DocMetadata::default(), nodes, vec![])
    }

    fn remediated_doc() -> Document {
        let mut doc = untagged_doc();
        {
            let meta = doc.metadata_mut();
            meta.title = Some("Paper".into());
            meta.language = Some("en-US".into());
            meta.marked = true;
            meta.has_struct_root = true;
            meta.display_doc_title = true;
        }
        for id in 0..3 {
            if let Some(node) = doc.node_mut(NodeId(id)) {
                match &mut node.kind {
                    NodeKind::Heading(h) => h.tagged = true,
                    NodeKind::Figure(f) => {
                        f.tagged = true;
                        f.alt_text = Some("desc".into());
                    }
                    NodeKind::Link(l) => {
                        l.tagged = true;
                        l.link_text = Some("Email link".into());
                    }
                }
            }
        }
        doc
    }

    fn positions(plan: &RemediationPlan) -> BTreeMap<ToolKind, usize> {
        plan.steps()
            .iter()
            .enumerate()
            .map(|(i, s)| (s.tool, i))
            .collect()
    }

    #[test]
    fn full_plan_respects_topological_order() {
        let doc = untagged_doc();
        let index = StructureIndex::build(&doc);
        let plan = plan(&[RemediationGoal::Full], &index).unwrap();

        let pos = positions(&plan);
        assert!(pos[&ToolKind::MetadataWriter] < pos[&ToolKind::StructureTagger]);
        assert!(pos[&ToolKind::StructureTagger] < pos[&ToolKind::HeadingTagger]);
        assert!(pos[&ToolKind::HeadingTagger] < pos[&ToolKind::LinkTextFixer]);
        assert!(pos[&ToolKind::HeadingTagger] < pos[&ToolKind::AltTextInjector]);
        assert_eq!(plan.len(), 5);
    }

    #[test]
    fn every_goal_combination_is_dependency_closed() {
        use RemediationGoal::*;
        let doc = untagged_doc();
        let index = StructureIndex::build(&doc);

        for goals in [
            vec![Full],
            vec![StructureOnly],
            vec![AltTextOnly],
            vec![StructureOnly, AltTextOnly],
            vec![Full, AltTextOnly],
        ] {
            let plan = plan(&goals, &index).unwrap();
            let pos = positions(&plan);
            for step in plan.steps() {
                for dep in &step.depends_on {
                    assert!(
                        pos[dep] < pos[&step.tool],
                        "{dep} not before {} for goals {goals:?}",
                        step.tool
                    );
                }
            }
        }
    }

    #[test]
    fn alt_text_only_pulls_in_the_tagging_chain() {
        let doc = untagged_doc();
        let index = StructureIndex::build(&doc);
        let plan = plan(&[RemediationGoal::AltTextOnly], &index).unwrap();

        let tools: Vec<ToolKind> = plan.steps().iter().map(|s| s.tool).collect();
        assert!(tools.contains(&ToolKind::StructureTagger));
        assert!(tools.contains(&ToolKind::AltTextInjector));
        // Links have nothing to do with this goal.
        assert!(!tools.contains(&ToolKind::LinkTextFixer));
    }

    #[test]
    fn remediated_document_yields_empty_plan() {
        let doc = remediated_doc();
        let index = StructureIndex::build(&doc);
        let plan = plan(&[RemediationGoal::Full], &index).unwrap();
        assert!(plan.is_empty(), "got {} steps", plan.len());
    }

    #[test]
    fn dependencies_absent_from_plan_are_dropped_from_steps() {
        // Already-tagged document, but one figure lacks alt-text: the
        // alt-text step must not depend on steps that were not planned.
        let mut doc = remediated_doc();
        if let Some(node) = doc.node_mut(NodeId(1)) {
            if let NodeKind::Figure(f) = &mut node.kind {
                f.alt_text = None;
            }
        }
        let index = StructureIndex::build(&doc);
        let plan = plan(&[RemediationGoal::Full], &index).unwrap();

        assert_eq!(plan.len(), 1);
        let step = &plan.steps()[0];
        assert_eq!(step.tool, ToolKind::AltTextInjector);
        assert!(step.depends_on.is_empty());
        assert_eq!(step.target, StepTarget::Nodes(vec![NodeId(1)]));
    }

    #[test]
    fn unavailable_tool_makes_goal_unsatisfiable() {
        let doc = untagged_doc();
        let index = StructureIndex::build(&doc);
        let available: BTreeSet<ToolKind> = [ToolKind::MetadataWriter].into_iter().collect();

        let err =
            plan_with_tools(&[RemediationGoal::AltTextOnly], &index, &available).unwrap_err();
        assert!(matches!(err, RemediateError::UnsatisfiableGoal { .. }));
    }

    #[test]
    fn static_dependency_table_is_acyclic() {
        let all: BTreeSet<ToolKind> = ToolKind::ALL.into_iter().collect();
        assert!(toposort(&all, ToolKind::dependencies).is_ok());
    }

    #[test]
    fn cyclic_table_is_reported_not_looped() {
        // Inject a deliberately broken table: two tools depending on each
        // other.
        fn broken(tool: ToolKind) -> &'static [ToolKind] {
            match tool {
                ToolKind::MetadataWriter => &[ToolKind::StructureTagger],
                ToolKind::StructureTagger => &[ToolKind::MetadataWriter],
                other => other.dependencies(),
            }
        }
        let tools: BTreeSet<ToolKind> =
            [ToolKind::MetadataWriter, ToolKind::StructureTagger]
                .into_iter()
                .collect();
        let err = toposort(&tools, broken).unwrap_err();
        assert!(matches!(err, RemediateError::CyclicDependency { .. }));
    }
}
