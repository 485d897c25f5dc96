//! MODS metadata extractor

use roxmltree::Node;

use super::{child_named, children_named, text_content, MetadataExtractor, MetadataRecord};

/// Extracts canonical fields from a `mods:mods` element
///
/// Only fields that need more than a path query live here (names with
/// roles, titles with non-sorting prefixes, key dates). Everything else is
/// left to the configured field definitions, which run afterwards and take
/// precedence.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModsExtractor;

impl MetadataExtractor for ModsExtractor {
    fn extract_metadata(&self, node: Node<'_, '_>, record: &mut MetadataRecord) {
        extract_names(node, record);
        extract_title(node, record);
        extract_place_and_year(node, record);
        extract_identifiers(node, record);
        extract_volume(node, record);
    }
}

/// MARC relator codes of a `mods:name`
fn role_codes(name: Node) -> Vec<String> {
    children_named(name, "role")
        .flat_map(|role| children_named(role, "roleTerm"))
        .map(text_content)
        .collect()
}

/// Display form, else "family, given", else all name parts
fn display_name(name: Node) -> String {
    if let Some(display) = child_named(name, "displayForm") {
        let display = text_content(display);
        if !display.is_empty() {
            return display;
        }
    }

    let part = |kind: &str| {
        children_named(name, "namePart")
            .find(|part| part.attribute("type") == Some(kind))
            .map(text_content)
            .unwrap_or_default()
    };
    let family = part("family");
    let given = part("given");
    match (family.is_empty(), given.is_empty()) {
        (false, false) => return format!("{}, {}", family, given),
        (false, true) => return family,
        (true, false) => return given,
        (true, true) => {}
    }

    children_named(name, "namePart")
        .map(text_content)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn extract_names(node: Node, record: &mut MetadataRecord) {
    for name in children_named(node, "name") {
        let roles = role_codes(name);
        let field = if roles.iter().any(|role| role == "aut" || role == "cre") {
            "author"
        } else if roles.iter().any(|role| role == "hol") {
            "holder"
        } else {
            continue;
        };

        let value = display_name(name);
        if !value.is_empty() && !record.contains_value(field, &value) {
            record.push(field, value);
        }
    }
}

fn extract_title(node: Node, record: &mut MetadataRecord) {
    if !record.is_blank("title") {
        return;
    }

    let title_info = children_named(node, "titleInfo")
        .find(|info| info.attribute("type").is_none())
        .or_else(|| child_named(node, "titleInfo"));
    let Some(title_info) = title_info else {
        return;
    };

    let title = child_named(title_info, "title")
        .map(text_content)
        .unwrap_or_default();
    if title.is_empty() {
        return;
    }
    let non_sort = child_named(title_info, "nonSort")
        .map(text_content)
        .unwrap_or_default();

    let full = if non_sort.is_empty() {
        title.clone()
    } else {
        format!("{} {}", non_sort, title)
    };
    record.set("title", vec![full]);
    record.set("title_sorting", vec![title]);
}

fn extract_place_and_year(node: Node, record: &mut MetadataRecord) {
    for origin in children_named(node, "originInfo") {
        for place in children_named(origin, "place").flat_map(|place| children_named(place, "placeTerm")) {
            let place = text_content(place);
            if !place.is_empty() && !record.contains_value("place", &place) {
                record.push("place", place);
            }
        }

        if record.is_blank("year") {
            let dates: Vec<Node> = origin
                .children()
                .filter(|child| {
                    child.is_element()
                        && matches!(child.tag_name().name(), "dateIssued" | "dateCreated")
                })
                .collect();
            let year = dates
                .iter()
                .find(|date| date.attribute("keyDate") == Some("yes"))
                .or_else(|| dates.first())
                .map(|date| text_content(*date))
                .filter(|year| !year.is_empty());
            if let Some(year) = year {
                record.set("year", vec![year]);
            }
        }
    }
}

fn extract_identifiers(node: Node, record: &mut MetadataRecord) {
    for identifier in children_named(node, "identifier") {
        let value = text_content(identifier);
        if value.is_empty() {
            continue;
        }
        let field = match identifier.attribute("type") {
            Some("urn") => "urn",
            Some("purl") => "purl",
            _ => continue,
        };
        if !record.contains_value(field, &value) {
            record.push(field, value);
        }
    }

    for record_info in children_named(node, "recordInfo") {
        for identifier in children_named(record_info, "recordIdentifier") {
            let value = text_content(identifier);
            if !value.is_empty() && !record.contains_value("record_id", &value) {
                record.push("record_id", value);
            }
        }
    }
}

fn extract_volume(node: Node, record: &mut MetadataRecord) {
    if !record.is_blank("volume") {
        return;
    }
    let number = children_named(node, "part")
        .flat_map(|part| children_named(part, "detail"))
        .filter_map(|detail| child_named(detail, "number"))
        .map(text_content)
        .find(|number| !number.is_empty());
    if let Some(number) = number {
        record.set("volume", vec![number.clone()]);
        record.set("volume_sorting", vec![number]);
    }
}
