//! METS section readers
//!
//! Pure functions over a parsed `mets:mets` element. Each returns owned
//! data so the parsed tree can be dropped once a facet is built.

use std::collections::{BTreeMap, HashMap};

use roxmltree::{Node, NodeId};

use crate::config::FileGroups;
use crate::document::{FileInfo, PhysicalNode, PhysicalStructure, StructLinks};
use crate::formats::{FormatRegistry, METS_NS, XLINK_NS};

/// Files of the fileSec plus the USE concordance of configured groups
#[derive(Debug, Default)]
pub struct FileSection {
    /// Every file by ID, whatever its group
    pub files: HashMap<String, FileInfo>,
    /// File ID → USE, restricted to configured categories
    pub uses: HashMap<String, String>,
    pub has_fulltext: bool,
}

/// Descriptive section with a registered encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmdSection {
    pub encoding: String,
    /// Payload root element, valid for any parse of the same source
    pub payload: NodeId,
}

/// First `mets:mets` element of a document (may be wrapped, e.g. OAI-PMH)
pub fn find_mets<'a, 'input>(doc: &'a roxmltree::Document<'input>) -> Option<Node<'a, 'input>> {
    doc.descendants()
        .find(|node| node.has_tag_name((METS_NS, "mets")))
}

/// METS element children with the given local name
pub fn mets_children<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |child| child.has_tag_name((METS_NS, name)))
}

/// Attribute value or `""`
pub fn attribute(node: Node, name: &str) -> String {
    node.attribute(name).unwrap_or_default().to_string()
}

pub fn xlink_attribute(node: Node, name: &str) -> Option<String> {
    node.attribute((XLINK_NS, name)).map(str::to_string)
}

fn struct_maps<'a, 'input>(
    mets: Node<'a, 'input>,
    kind: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    mets_children(mets, "structMap").filter(move |map| map.attribute("TYPE") == Some(kind))
}

/// Top-level divs of the logical structMap(s)
pub fn top_logical_divs<'a, 'input>(mets: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    struct_maps(mets, "LOGICAL").flat_map(|map| mets_children(map, "div"))
}

/// Every logical div in document order
pub fn logical_divs<'a, 'input>(mets: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    struct_maps(mets, "LOGICAL").flat_map(|map| {
        map.descendants()
            .filter(|node| node.has_tag_name((METS_NS, "div")))
    })
}

pub fn find_logical_div<'a, 'input>(mets: Node<'a, 'input>, id: &str) -> Option<Node<'a, 'input>> {
    if id.is_empty() {
        return None;
    }
    logical_divs(mets).find(|div| div.attribute("ID") == Some(id))
}

/// USE category → file ID for the `fptr` children of a div
pub fn node_files(div: Node, uses: &HashMap<String, String>) -> BTreeMap<String, String> {
    let mut files = BTreeMap::new();
    for fptr in mets_children(div, "fptr") {
        let Some(file_id) = fptr.attribute("FILEID") else {
            continue;
        };
        if let Some(file_use) = uses.get(file_id) {
            files.insert(file_use.clone(), file_id.to_string());
        }
    }
    files
}

pub fn read_file_section(mets: Node, groups: &FileGroups) -> FileSection {
    let configured = groups.all();
    let mut section = FileSection::default();

    for file_grp in mets_children(mets, "fileSec").flat_map(|sec| mets_children(sec, "fileGrp")) {
        let file_use = attribute(file_grp, "USE");
        for file in mets_children(file_grp, "file") {
            let id = attribute(file, "ID");
            if id.is_empty() {
                continue;
            }
            let location = mets_children(file, "FLocat")
                .find(|flocat| flocat.attribute("LOCTYPE") == Some("URL"))
                .and_then(|flocat| xlink_attribute(flocat, "href"))
                .unwrap_or_default();

            if configured.contains(&file_use) {
                section.uses.insert(id.clone(), file_use.clone());
            }
            section.files.insert(
                id.clone(),
                FileInfo {
                    id,
                    use_group: file_use.clone(),
                    mime_type: attribute(file, "MIMETYPE"),
                    location,
                    admid: attribute(file, "ADMID"),
                },
            );
        }
    }

    section.has_fulltext = groups
        .fulltext
        .iter()
        .any(|group| section.uses.values().any(|file_use| file_use == group));
    section
}

/// Encoding name of a `mdWrap`, honouring `MDTYPE="OTHER"`
fn md_type<'a>(md_wrap: Node<'a, '_>) -> Option<&'a str> {
    match md_wrap.attribute("MDTYPE")? {
        "OTHER" => md_wrap.attribute("OTHERMDTYPE"),
        md_type => Some(md_type),
    }
}

/// dmdSecs whose encoding is registered and whose payload root matches it
pub fn read_dmd_sections(mets: Node, formats: &FormatRegistry) -> HashMap<String, DmdSection> {
    let mut sections = HashMap::new();

    for dmd_sec in mets_children(mets, "dmdSec") {
        let id = attribute(dmd_sec, "ID");
        if id.is_empty() {
            continue;
        }
        for md_wrap in mets_children(dmd_sec, "mdWrap") {
            let Some(encoding) = md_type(md_wrap) else {
                continue;
            };
            let Some(format) = formats.resolve_format(encoding) else {
                continue;
            };
            let payload = mets_children(md_wrap, "xmlData")
                .flat_map(|data| data.children())
                .find(|child| {
                    child.has_tag_name((format.namespace.as_str(), format.root_element.as_str()))
                });
            if let Some(payload) = payload {
                sections.insert(
                    id.clone(),
                    DmdSection {
                        encoding: encoding.to_string(),
                        payload: payload.id(),
                    },
                );
                break;
            }
        }
    }

    sections
}

fn physical_node(div: Node, uses: &HashMap<String, String>) -> PhysicalNode {
    PhysicalNode {
        id: attribute(div, "ID"),
        dmd_id: attribute(div, "DMDID"),
        order: attribute(div, "ORDER"),
        label: attribute(div, "LABEL"),
        orderlabel: attribute(div, "ORDERLABEL"),
        node_type: attribute(div, "TYPE"),
        content_ids: attribute(div, "CONTENTIDS"),
        files: node_files(div, uses),
    }
}

/// Physical sequence and its pages, ordered by `@ORDER`
///
/// Unparseable orders sort as 0; equal orders keep source order.
pub fn read_physical_structure(mets: Node, uses: &HashMap<String, String>) -> PhysicalStructure {
    let sequence = struct_maps(mets, "PHYSICAL")
        .flat_map(|map| mets_children(map, "div"))
        .find(|div| div.attribute("TYPE") == Some("physSequence"));
    let Some(sequence) = sequence else {
        return PhysicalStructure::default();
    };

    let mut pages: Vec<(i64, PhysicalNode)> = mets_children(sequence, "div")
        .map(|div| {
            let order = div
                .attribute("ORDER")
                .and_then(|order| order.trim().parse().ok())
                .unwrap_or(0);
            (order, physical_node(div, uses))
        })
        .collect();
    if pages.is_empty() {
        return PhysicalStructure::default();
    }
    pages.sort_by_key(|(order, _)| *order);

    let sequence = physical_node(sequence, uses);
    let mut structure = PhysicalStructure {
        order: vec![sequence.id.clone()],
        info: HashMap::new(),
    };
    structure.info.insert(sequence.id.clone(), sequence);
    for (_, page) in pages {
        structure.order.push(page.id.clone());
        structure.info.insert(page.id.clone(), page);
    }
    structure
}

pub fn read_struct_links(mets: Node) -> StructLinks {
    let mut links = StructLinks::default();
    for sm_link in mets_children(mets, "structLink").flat_map(|link| mets_children(link, "smLink")) {
        let from = xlink_attribute(sm_link, "from").unwrap_or_default();
        let to = xlink_attribute(sm_link, "to").unwrap_or_default();
        if !from.is_empty() && !to.is_empty() {
            links.add(&from, &to);
        }
    }
    links
}

/// Logical div with descriptive metadata and no `mptr`, preferring one that
/// links to physical nodes
pub fn select_toplevel(mets: Node, links: &StructLinks) -> String {
    let candidates: Vec<String> = logical_divs(mets)
        .filter(|div| div.attribute("DMDID").is_some_and(|dmd| !dmd.trim().is_empty()))
        .filter(|div| mets_children(*div, "mptr").next().is_none())
        .map(|div| attribute(div, "ID"))
        .filter(|id| !id.is_empty())
        .collect();

    candidates
        .iter()
        .find(|id| links.has_physical(id))
        .or_else(|| candidates.first())
        .cloned()
        .unwrap_or_default()
}
