//! ALTO full-text extractor
//!
//! Handles ALTO v2 through v4. Elements are matched by local name since the
//! namespace URI changes between versions.

use std::io::Cursor;

use quick_xml::{
    events::{BytesEnd, BytesStart, BytesText, Event},
    Writer,
};
use roxmltree::Node;

use super::FullTextExtractor;
use crate::document::DocumentResult;

#[derive(Debug, Clone, Copy, Default)]
pub struct AltoExtractor;

fn elements<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.descendants()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

/// `x y w h` box of an ALTO element
fn coordinates(node: Node) -> String {
    ["HPOS", "VPOS", "WIDTH", "HEIGHT"]
        .iter()
        .map(|attribute| node.attribute(*attribute).unwrap_or("0"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn words<'a, 'input>(line: Node<'a, 'input>) -> impl Iterator<Item = (Node<'a, 'input>, &'a str)> {
    line.children()
        .filter(|n| n.is_element() && n.tag_name().name() == "String")
        .filter_map(|word| word.attribute("CONTENT").map(|content| (word, content)))
        .filter(|(_, content)| !content.is_empty())
}

impl FullTextExtractor for AltoExtractor {
    fn text_as_mini_ocr(&self, root: Node<'_, '_>) -> DocumentResult<String> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer.write_event(Event::Start(BytesStart::new("ocr")))?;

        for block in elements(root, "TextBlock") {
            writer.write_event(Event::Start(BytesStart::new("b")))?;
            for line in block
                .children()
                .filter(|n| n.is_element() && n.tag_name().name() == "TextLine")
            {
                writer.write_event(Event::Start(BytesStart::new("l")))?;
                for (index, (word, content)) in words(line).enumerate() {
                    if index > 0 {
                        writer.write_event(Event::Text(BytesText::new(" ")))?;
                    }
                    let mut element = BytesStart::new("w");
                    element.push_attribute(("x", coordinates(word).as_str()));
                    writer.write_event(Event::Start(element))?;
                    writer.write_event(Event::Text(BytesText::new(content)))?;
                    writer.write_event(Event::End(BytesEnd::new("w")))?;
                }
                writer.write_event(Event::End(BytesEnd::new("l")))?;
            }
            writer.write_event(Event::End(BytesEnd::new("b")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("ocr")))?;
        Ok(String::from_utf8(writer.into_inner().into_inner())?)
    }

    fn raw_text(&self, root: Node<'_, '_>) -> String {
        elements(root, "TextLine")
            .flat_map(words)
            .map(|(_, content)| content)
            .collect::<Vec<_>>()
            .join(" ")
    }
}
