//! PDF object-model seam: structural model in, mutations out.
//!
//! Everything that touches `lopdf` lives here. [`load_document`] builds the
//! typed structural model the rest of the pipeline works on — catalog
//! metadata, heading candidates from a font-size scan of the content
//! streams, figures from the page image XObjects, links from the page
//! annotations, existing tag-tree state. [`persist_document`] replays the
//! model's state onto a fresh parse of the original bytes: catalog entries,
//! structure elements with their `/Alt` descriptions, link annotation
//! contents.
//!
//! The model, not the PDF, is the unit the tools mutate; this keeps every
//! tool a pure in-memory transformation and confines the object-model
//! grubbing to two functions.

use crate::document::{
    DocMetadata, Document, FigureNode, HeadingNode, LinkNode, NodeId, NodeKind, StructureNode,
};
use crate::error::RemediateError;
use lopdf::content::Content;
use lopdf::{Dictionary, Object, ObjectId, Stream, StringFormat};
use std::collections::HashSet;
use std::io::Cursor;
use tracing::{debug, warn};

/// Maximum recursion depth when walking the structure tree. Malformed
/// documents can contain reference loops.
const MAX_TREE_DEPTH: usize = 50;

// ── Loading ──────────────────────────────────────────────────────────────

/// Parse document bytes into the structural model.
///
/// Images smaller than `min_figure_px` on either axis are skipped: icons and
/// bullets need no description.
pub fn load_document(bytes: &[u8], min_figure_px: u32) -> Result<Document, RemediateError> {
    let pdf = lopdf::Document::load_mem(bytes).map_err(|e| RemediateError::CorruptDocument {
        detail: e.to_string(),
    })?;

    let pages = pdf.get_pages();
    let metadata = read_metadata(&pdf, pages.len() as u32);
    let tree = scan_struct_tree(&pdf);

    let mut lines: Vec<TextLine> = Vec::new();
    for (&page_no, &page_id) in &pages {
        lines.extend(extract_text_lines(&pdf, page_no - 1, page_id));
    }

    let mut nodes: Vec<StructureNode> = Vec::new();

    // Heading candidates (font-size heuristic), merged with headings already
    // present in the tag tree.
    for candidate in heading_candidates(&lines) {
        let tagged = tree
            .headings
            .iter()
            .any(|(_, text)| *text == candidate.text);
        nodes.push(StructureNode {
            id: NodeId(nodes.len() as u32),
            parent: None,
            page: candidate.page,
            kind: NodeKind::Heading(HeadingNode {
                level: candidate.level,
                text: candidate.text,
                font_size: candidate.font_size,
                bold: candidate.bold,
                tagged,
            }),
        });
    }

    // Figures, with any existing tag-tree Alt entries zipped on in document
    // order. Structure elements do not reference XObjects directly, so order
    // is the only association available without content-level analysis.
    let mut figure_idx = 0usize;
    for (&page_no, &page_id) in &pages {
        let captions = caption_lines(&lines, page_no - 1);
        for (i, (width, height, image_png)) in
            collect_figures(&pdf, page_id, min_figure_px).into_iter().enumerate()
        {
            let alt_text = tree.figure_alts.get(figure_idx).cloned().flatten();
            figure_idx += 1;
            nodes.push(StructureNode {
                id: NodeId(nodes.len() as u32),
                parent: None,
                page: page_no - 1,
                kind: NodeKind::Figure(FigureNode {
                    width,
                    height,
                    image_png,
                    caption: captions.get(i).cloned(),
                    tagged: alt_text.is_some(),
                    alt_text,
                    description_failed: false,
                }),
            });
        }
    }

    // Link annotations.
    for (&page_no, &page_id) in &pages {
        for (uri, link_text) in collect_links(&pdf, page_id) {
            nodes.push(StructureNode {
                id: NodeId(nodes.len() as u32),
                parent: None,
                page: page_no - 1,
                kind: NodeKind::Link(LinkNode {
                    uri,
                    tagged: link_text.is_some(),
                    link_text,
                }),
            });
        }
    }

    debug!(
        "Loaded document: {} page(s), {} node(s), marked={}",
        metadata.page_count,
        nodes.len(),
        metadata.marked
    );

    Ok(Document::from_model(metadata, nodes, bytes.to_vec()))
}

fn read_metadata(pdf: &lopdf::Document, page_count: u32) -> DocMetadata {
    let mut meta = DocMetadata {
        page_count,
        ..DocMetadata::default()
    };

    let Ok(catalog) = pdf.catalog() else {
        return meta;
    };

    if let Some(mark_info) = catalog.get(b"MarkInfo").ok().and_then(|o| resolve_dict(pdf, o)) {
        meta.marked = matches!(mark_info.get(b"Marked"), Ok(Object::Boolean(true)));
    }
    meta.has_struct_root = catalog.has(b"StructTreeRoot");
    if let Ok(lang) = catalog.get(b"Lang") {
        meta.language = decode_pdf_string(resolve(pdf, lang)).filter(|s| !s.is_empty());
    }
    if let Some(prefs) = catalog
        .get(b"ViewerPreferences")
        .ok()
        .and_then(|o| resolve_dict(pdf, o))
    {
        meta.display_doc_title =
            matches!(prefs.get(b"DisplayDocTitle"), Ok(Object::Boolean(true)));
    }

    if let Some(info) = pdf
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|o| resolve_dict(pdf, o))
    {
        if let Ok(title) = info.get(b"Title") {
            meta.title = decode_pdf_string(resolve(pdf, title)).filter(|s| !s.is_empty());
        }
    }

    meta
}

// ── Structure-tree scan ──────────────────────────────────────────────────

#[derive(Default)]
struct TreeScan {
    /// `/Alt` of each Figure element, in tree order.
    figure_alts: Vec<Option<String>>,
    /// (level, text) of each H1–H3 element, in tree order.
    headings: Vec<(u8, String)>,
}

fn scan_struct_tree(pdf: &lopdf::Document) -> TreeScan {
    let mut scan = TreeScan::default();
    if let Ok(catalog) = pdf.catalog() {
        if let Ok(root) = catalog.get(b"StructTreeRoot") {
            walk_struct_tree(pdf, resolve(pdf, root), 0, &mut scan);
        }
    }
    scan
}

fn walk_struct_tree(pdf: &lopdf::Document, obj: &Object, depth: usize, scan: &mut TreeScan) {
    if depth > MAX_TREE_DEPTH {
        return;
    }
    let Some(dict) = resolve_dict(pdf, obj) else {
        return;
    };

    if let Ok(Object::Name(s)) = dict.get(b"S") {
        let alt = dict
            .get(b"Alt")
            .ok()
            .and_then(|o| decode_pdf_string(resolve(pdf, o)));
        match s.as_slice() {
            b"Figure" => scan.figure_alts.push(alt),
            b"H1" => scan.headings.push((1, alt.unwrap_or_default())),
            b"H2" => scan.headings.push((2, alt.unwrap_or_default())),
            b"H3" => scan.headings.push((3, alt.unwrap_or_default())),
            _ => {}
        }
    }

    if let Ok(kids) = dict.get(b"K") {
        match resolve(pdf, kids) {
            Object::Array(items) => {
                for item in items {
                    walk_struct_tree(pdf, item, depth + 1, scan);
                }
            }
            single => walk_struct_tree(pdf, single, depth + 1, scan),
        }
    }
}

// ── Text extraction ──────────────────────────────────────────────────────

struct TextLine {
    page: u32,
    text: String,
    font_size: f32,
    bold: bool,
}

struct HeadingCandidate {
    page: u32,
    text: String,
    font_size: f32,
    bold: bool,
    level: u8,
}

/// Pull text runs out of a page's content stream, one line per BT/ET block.
///
/// This is deliberately coarse: the heading heuristic only needs text, the
/// effective font size, and whether the active font is a bold face.
fn extract_text_lines(pdf: &lopdf::Document, page: u32, page_id: ObjectId) -> Vec<TextLine> {
    let Ok(data) = pdf.get_page_content(page_id) else {
        return Vec::new();
    };
    let Ok(content) = Content::decode(&data) else {
        warn!("Page {}: content stream failed to decode", page + 1);
        return Vec::new();
    };
    let bold_fonts = bold_font_names(pdf, page_id);

    let mut out = Vec::new();
    let mut buf = String::new();
    let mut size = 0f32;
    let mut bold = false;

    for op in &content.operations {
        match op.operator.as_str() {
            "BT" => {
                buf.clear();
                size = 0.0;
                bold = false;
            }
            "Tf" => {
                if let Some(Object::Name(name)) = op.operands.first() {
                    bold = bold_fonts.contains(name.as_slice());
                }
                if let Some(sz) = op.operands.get(1).and_then(as_f32) {
                    size = size.max(sz);
                }
            }
            "Tj" | "'" | "\"" => {
                // The string is the last operand for all three operators.
                if let Some(text) = op.operands.iter().rev().find_map(decode_pdf_string) {
                    buf.push_str(&text);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    for item in items {
                        if let Some(text) = decode_pdf_string(item) {
                            buf.push_str(&text);
                        }
                    }
                }
            }
            "ET" => {
                let text = buf.trim();
                if !text.is_empty() {
                    out.push(TextLine {
                        page,
                        text: text.to_string(),
                        font_size: size,
                        bold,
                    });
                }
                buf.clear();
            }
            _ => {}
        }
    }

    out
}

/// Names of page fonts whose BaseFont marks a bold face.
fn bold_font_names(pdf: &lopdf::Document, page_id: ObjectId) -> HashSet<Vec<u8>> {
    let mut bold = HashSet::new();
    let Ok(page) = pdf.get_dictionary(page_id) else {
        return bold;
    };
    let Some(resources) = page.get(b"Resources").ok().and_then(|o| resolve_dict(pdf, o))
    else {
        return bold;
    };
    let Some(fonts) = resources.get(b"Font").ok().and_then(|o| resolve_dict(pdf, o)) else {
        return bold;
    };
    for (name, font) in fonts.iter() {
        if let Some(font_dict) = resolve_dict(pdf, font) {
            if let Ok(Object::Name(base)) = font_dict.get(b"BaseFont") {
                if String::from_utf8_lossy(base).contains("Bold") {
                    bold.insert(name.to_vec());
                }
            }
        }
    }
    bold
}

/// Classify heading candidates by font size relative to the document median.
///
/// Thresholds: ≥1.5× median → H1, ≥1.25× → H2, ≥1.1× → H3, with bold text
/// at body size also promoted to H3. Long lines, bare numbers and
/// bracket-led footnote text are excluded.
fn heading_candidates(lines: &[TextLine]) -> Vec<HeadingCandidate> {
    let mut sizes: Vec<f32> = lines
        .iter()
        .filter(|l| l.text.len() > 2 && l.font_size > 0.0)
        .map(|l| l.font_size)
        .collect();
    if sizes.is_empty() {
        return Vec::new();
    }
    sizes.sort_by(|a, b| a.total_cmp(b));
    let median = sizes[sizes.len() / 2];

    let mut out = Vec::new();
    for line in lines {
        if line.text.len() > 200
            || line.text.chars().all(|c| c.is_ascii_digit())
            || line.text.starts_with('[')
        {
            continue;
        }
        let size = line.font_size;
        let level = if size >= median * 1.5 {
            1
        } else if size >= median * 1.25 || (size >= median * 1.1 && line.bold) {
            2
        } else if size >= median * 1.1 {
            3
        } else if line.bold && size >= median {
            3
        } else {
            continue;
        };
        out.push(HeadingCandidate {
            page: line.page,
            text: line.text.clone(),
            font_size: size,
            bold: line.bold,
            level,
        });
    }
    out
}

/// Caption-looking lines on a page ("Figure …", "Fig. …", "Table …"), used
/// as prompt context for the figures on that page.
fn caption_lines(lines: &[TextLine], page: u32) -> Vec<String> {
    lines
        .iter()
        .filter(|l| l.page == page)
        .filter(|l| {
            l.text.starts_with("Figure")
                || l.text.starts_with("Fig.")
                || l.text.starts_with("Table")
        })
        .map(|l| l.text.clone())
        .collect()
}

// ── Figures and links ────────────────────────────────────────────────────

/// Image XObjects on a page as `(width, height, png_bytes)`.
fn collect_figures(
    pdf: &lopdf::Document,
    page_id: ObjectId,
    min_figure_px: u32,
) -> Vec<(u32, u32, Vec<u8>)> {
    let mut out = Vec::new();
    let Ok(page) = pdf.get_dictionary(page_id) else {
        return out;
    };
    let Some(resources) = page.get(b"Resources").ok().and_then(|o| resolve_dict(pdf, o))
    else {
        return out;
    };
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|o| resolve_dict(pdf, o))
    else {
        return out;
    };

    for (name, entry) in xobjects.iter() {
        let Object::Reference(id) = entry else {
            continue;
        };
        let Ok(Object::Stream(stream)) = pdf.get_object(*id) else {
            continue;
        };
        if !matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(s)) if s.as_slice() == b"Image")
        {
            continue;
        }
        let width = stream
            .dict
            .get(b"Width")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(0) as u32;
        let height = stream
            .dict
            .get(b"Height")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(0) as u32;
        if width < min_figure_px || height < min_figure_px {
            debug!(
                "Skipping small image {} ({}x{})",
                String::from_utf8_lossy(name),
                width,
                height
            );
            continue;
        }
        out.push((width, height, normalise_image(stream)));
    }
    out
}

/// Normalise stream data for the inference request.
///
/// DCTDecode streams are JPEG and re-encode to PNG directly. Anything else
/// (raw or Flate-decoded raster data) passes through unchanged — the
/// inference boundary accepts it or the call fails and is retried/marked,
/// never crashing the pipeline.
fn normalise_image(stream: &Stream) -> Vec<u8> {
    if let Ok(img) = image::load_from_memory(&stream.content) {
        let mut buf = Vec::new();
        if img
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .is_ok()
        {
            return buf;
        }
    }
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

/// Link annotations on a page as `(uri, contents)`.
fn collect_links(pdf: &lopdf::Document, page_id: ObjectId) -> Vec<(Option<String>, Option<String>)> {
    link_annotations(pdf, page_id)
        .into_iter()
        .map(|(_, uri, contents)| (uri, contents))
        .collect()
}

/// Link annotations with their object ids, for the persist pass.
/// Inline (non-reference) annotation dictionaries are skipped.
fn link_annotations(
    pdf: &lopdf::Document,
    page_id: ObjectId,
) -> Vec<(ObjectId, Option<String>, Option<String>)> {
    let mut out = Vec::new();
    let Ok(page) = pdf.get_dictionary(page_id) else {
        return out;
    };
    let Some(annots) = page.get(b"Annots").ok().map(|o| resolve(pdf, o)) else {
        return out;
    };
    let Object::Array(items) = annots else {
        return out;
    };

    for item in items {
        let Object::Reference(id) = item else {
            debug!("Skipping inline annotation dictionary");
            continue;
        };
        let Ok(annot) = pdf.get_dictionary(*id) else {
            continue;
        };
        if !matches!(annot.get(b"Subtype"), Ok(Object::Name(s)) if s.as_slice() == b"Link") {
            continue;
        }
        let uri = annot
            .get(b"A")
            .ok()
            .and_then(|o| resolve_dict(pdf, o))
            .and_then(|action| action.get(b"URI").ok())
            .and_then(|o| decode_pdf_string(resolve(pdf, o)));
        let contents = annot
            .get(b"Contents")
            .ok()
            .and_then(|o| decode_pdf_string(resolve(pdf, o)))
            .filter(|s| !s.is_empty());
        out.push((*id, uri, contents));
    }
    out
}

// ── Persisting ───────────────────────────────────────────────────────────

/// Write the model's state back onto the original bytes.
///
/// Synthetic documents (no source bytes) have nothing to serialise and
/// round-trip as empty; real documents get catalog entries, structure
/// elements and annotation contents replayed onto a fresh parse.
pub fn persist_document(doc: &Document) -> Result<Vec<u8>, RemediateError> {
    if doc.source_bytes().is_empty() {
        return Ok(Vec::new());
    }

    let mut pdf = lopdf::Document::load_mem(doc.source_bytes()).map_err(|e| {
        RemediateError::CorruptDocument {
            detail: e.to_string(),
        }
    })?;
    let meta = doc.metadata();

    let catalog_id = pdf
        .trailer
        .get(b"Root")
        .and_then(|o| o.as_reference())
        .map_err(|e| RemediateError::PersistFailed {
            detail: format!("catalog reference: {e}"),
        })?;

    // Collect link-annotation updates before taking any mutable borrows:
    // model link nodes map onto annotations in the same page/annotation
    // order the loader used.
    let link_updates = plan_link_updates(&pdf, doc);

    // New structure elements for tagged headings and described figures.
    let elements = build_struct_elements(doc);

    // ── Catalog entries ──────────────────────────────────────────────────
    let existing_root = pdf
        .get_dictionary(catalog_id)
        .ok()
        .and_then(|c| c.get(b"StructTreeRoot").ok())
        .and_then(|o| o.as_reference().ok());

    let new_root = if meta.has_struct_root && existing_root.is_none() {
        Some(create_struct_root(&mut pdf, &elements))
    } else {
        if let Some(root_id) = existing_root {
            append_to_struct_root(&mut pdf, root_id, &elements);
        }
        None
    };

    let viewer_prefs = updated_viewer_prefs(&pdf, catalog_id, meta.display_doc_title);

    {
        let catalog = pdf
            .get_object_mut(catalog_id)
            .and_then(|o| o.as_dict_mut())
            .map_err(|e| RemediateError::PersistFailed {
                detail: format!("catalog: {e}"),
            })?;

        if meta.marked {
            catalog.set(
                "MarkInfo",
                Object::Dictionary(Dictionary::from_iter(vec![
                    ("Marked", Object::Boolean(true)),
                    ("Suspects", Object::Boolean(false)),
                ])),
            );
        }
        if let Some(ref lang) = meta.language {
            catalog.set("Lang", pdf_string(lang));
        }
        if let Some(prefs) = viewer_prefs {
            catalog.set("ViewerPreferences", Object::Dictionary(prefs));
        }
        if let Some(root_id) = new_root {
            catalog.set("StructTreeRoot", Object::Reference(root_id));
        }
    }

    // ── Link annotation contents ─────────────────────────────────────────
    for (annot_id, text) in link_updates {
        if let Ok(annot) = pdf.get_object_mut(annot_id).and_then(|o| o.as_dict_mut()) {
            annot.set("Contents", pdf_string(&text));
        }
    }

    // ── Document information (title) ─────────────────────────────────────
    if let Some(ref title) = meta.title {
        set_info_title(&mut pdf, title);
    }

    let mut buffer = Vec::new();
    pdf.save_to(&mut buffer)
        .map_err(|e| RemediateError::PersistFailed {
            detail: e.to_string(),
        })?;
    Ok(buffer)
}

/// Map model link nodes onto annotation object ids, page by page in load
/// order, and keep the ones whose text changed.
fn plan_link_updates(pdf: &lopdf::Document, doc: &Document) -> Vec<(ObjectId, String)> {
    let model_links: Vec<&StructureNode> = doc
        .nodes()
        .iter()
        .filter(|n| matches!(n.kind, NodeKind::Link(_)))
        .collect();

    let mut updates = Vec::new();
    let mut link_idx = 0usize;
    for (_, &page_id) in &pdf.get_pages() {
        for (annot_id, _, contents) in link_annotations(pdf, page_id) {
            let Some(node) = model_links.get(link_idx) else {
                return updates;
            };
            link_idx += 1;
            if let NodeKind::Link(link) = &node.kind {
                if let Some(ref text) = link.link_text {
                    if contents.as_deref() != Some(text.as_str()) {
                        updates.push((annot_id, text.clone()));
                    }
                }
            }
        }
    }
    updates
}

/// Structure elements to materialise: (tag name, alt text).
fn build_struct_elements(doc: &Document) -> Vec<(Vec<u8>, String)> {
    let mut elements = Vec::new();
    for node in doc.nodes() {
        match &node.kind {
            NodeKind::Heading(h) if h.tagged => {
                let tag = match h.level {
                    1 => b"H1".to_vec(),
                    2 => b"H2".to_vec(),
                    _ => b"H3".to_vec(),
                };
                elements.push((tag, h.text.clone()));
            }
            NodeKind::Figure(fig) => {
                if let Some(ref alt) = fig.alt_text {
                    elements.push((b"Figure".to_vec(), alt.clone()));
                }
            }
            _ => {}
        }
    }
    elements
}

/// Create a structure root with a Document element holding `elements`.
fn create_struct_root(pdf: &mut lopdf::Document, elements: &[(Vec<u8>, String)]) -> ObjectId {
    let parent_tree = pdf.add_object(Dictionary::from_iter(vec![(
        "Nums",
        Object::Array(Vec::new()),
    )]));
    let root_id = pdf.new_object_id();

    // Reserve the Document element id so children can point their /P at it.
    let doc_elem_id = pdf.new_object_id();
    let kids = add_struct_elements(pdf, doc_elem_id, elements);

    pdf.objects.insert(
        doc_elem_id,
        Object::Dictionary(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"StructElem".to_vec())),
            ("S", Object::Name(b"Document".to_vec())),
            ("P", Object::Reference(root_id)),
            ("K", Object::Array(kids)),
        ])),
    );
    pdf.objects.insert(
        root_id,
        Object::Dictionary(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"StructTreeRoot".to_vec())),
            ("K", Object::Array(vec![Object::Reference(doc_elem_id)])),
            ("ParentTree", Object::Reference(parent_tree)),
        ])),
    );
    root_id
}

/// Append a Document element with `elements` to an existing structure root.
fn append_to_struct_root(
    pdf: &mut lopdf::Document,
    root_id: ObjectId,
    elements: &[(Vec<u8>, String)],
) {
    if elements.is_empty() {
        return;
    }
    let doc_elem_id = pdf.new_object_id();
    let kids = add_struct_elements(pdf, doc_elem_id, elements);
    pdf.objects.insert(
        doc_elem_id,
        Object::Dictionary(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"StructElem".to_vec())),
            ("S", Object::Name(b"Document".to_vec())),
            ("P", Object::Reference(root_id)),
            ("K", Object::Array(kids)),
        ])),
    );

    if let Ok(root) = pdf.get_object_mut(root_id).and_then(|o| o.as_dict_mut()) {
        let new_kid = Object::Reference(doc_elem_id);
        match root.get_mut(b"K") {
            Ok(Object::Array(kids)) => kids.push(new_kid),
            Ok(existing) => {
                let old = existing.clone();
                *existing = Object::Array(vec![old, new_kid]);
            }
            Err(_) => root.set("K", Object::Array(vec![new_kid])),
        }
    }
}

/// Add one StructElem per entry, returning the reference array.
fn add_struct_elements(
    pdf: &mut lopdf::Document,
    parent: ObjectId,
    elements: &[(Vec<u8>, String)],
) -> Vec<Object> {
    elements
        .iter()
        .map(|(tag, alt)| {
            let id = pdf.add_object(Dictionary::from_iter(vec![
                ("Type", Object::Name(b"StructElem".to_vec())),
                ("S", Object::Name(tag.clone())),
                ("P", Object::Reference(parent)),
                ("Alt", pdf_string(alt)),
            ]));
            Object::Reference(id)
        })
        .collect()
}

/// Existing viewer preferences with DisplayDocTitle applied, when a write is
/// needed.
fn updated_viewer_prefs(
    pdf: &lopdf::Document,
    catalog_id: ObjectId,
    display_doc_title: bool,
) -> Option<Dictionary> {
    if !display_doc_title {
        return None;
    }
    let mut prefs = pdf
        .get_dictionary(catalog_id)
        .ok()
        .and_then(|c| c.get(b"ViewerPreferences").ok())
        .and_then(|o| resolve_dict(pdf, o))
        .cloned()
        .unwrap_or_else(Dictionary::new);
    prefs.set("DisplayDocTitle", Object::Boolean(true));
    Some(prefs)
}

/// Set the document-information Title, creating the Info dictionary when the
/// document has none.
fn set_info_title(pdf: &mut lopdf::Document, title: &str) {
    let info_id = pdf.trailer.get(b"Info").and_then(|o| o.as_reference()).ok();
    match info_id {
        Some(id) => {
            if let Ok(info) = pdf.get_object_mut(id).and_then(|o| o.as_dict_mut()) {
                info.set("Title", pdf_string(title));
            }
        }
        None => {
            let id = pdf.add_object(Dictionary::from_iter(vec![(
                "Title",
                pdf_string(title),
            )]));
            pdf.trailer.set("Info", Object::Reference(id));
        }
    }
}

// ── Object helpers ───────────────────────────────────────────────────────

fn resolve<'a>(pdf: &'a lopdf::Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => pdf.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

fn resolve_dict<'a>(pdf: &'a lopdf::Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(pdf, obj) {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

fn as_f32(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Decode a PDF text string: UTF-16BE with BOM, else byte text.
fn decode_pdf_string(obj: &Object) -> Option<String> {
    let Object::String(bytes, _) = obj else {
        return None;
    };
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        Some(String::from_utf16_lossy(&utf16))
    } else {
        Some(String::from_utf8_lossy(bytes).to_string())
    }
}

fn pdf_string(s: &str) -> Object {
    Object::String(s.as_bytes().to_vec(), StringFormat::Literal)
}
