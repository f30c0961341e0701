//! Per-block markup analysis: cleaned HTML, interactivity, content model,
//! and the styling text fed to token extraction

use scraper::{ElementRef, Node};
use std::collections::HashSet;

use super::types::{ContentKind, ContentNode, InteractivityFlags};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// `data-*` attributes that carry meaning for block authoring
const SEMANTIC_DATA_ATTRS: &[&str] = &["data-block-name", "data-align", "data-valign"];

const ARIA_INTERACTION_ATTRS: &[&str] = &[
    "aria-expanded",
    "aria-controls",
    "aria-haspopup",
    "aria-pressed",
    "aria-selected",
    "aria-modal",
];

const INTERACTIVE_ROLES: &[&str] = &[
    "button", "tab", "tablist", "tabpanel", "dialog", "menu", "menuitem", "slider", "switch",
];

/// Attributes holding presentational colours
const COLOR_ATTRS: &[&str] = &["color", "bgcolor", "fill", "stroke"];

/// Re-serialize `root` without inline styles, non-semantic `data-*`
/// attributes, `<style>` elements or comments, collapsing whitespace.
///
/// Attributes are written in name order so the output is stable.
pub fn clean_html(root: ElementRef) -> String {
    let mut out = String::new();
    write_element(root, &mut out);
    out
}

fn write_element(el: ElementRef, out: &mut String) {
    let name = el.value().name();
    if name == "style" {
        return;
    }

    out.push('<');
    out.push_str(name);
    let mut attrs: Vec<(&str, &str)> = el.value().attrs().collect();
    attrs.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in attrs {
        if key == "style" || (key.starts_with("data-") && !SEMANTIC_DATA_ATTRS.contains(&key)) {
            continue;
        }
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(value, true));
        out.push('"');
    }
    out.push('>');

    if VOID_ELEMENTS.contains(&name) {
        return;
    }

    let raw_text = name == "script";
    for child in el.children() {
        match child.value() {
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    write_element(child_el, out);
                }
            }
            Node::Text(text) => {
                let collapsed = collapse_whitespace(text);
                if collapsed.trim().is_empty() {
                    continue;
                }
                if raw_text {
                    out.push_str(collapsed.trim());
                } else {
                    out.push_str(&escape(&collapsed, false));
                }
            }
            _ => {}
        }
    }

    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Detect inline scripts, event-handler attributes and ARIA interaction
pub fn interactivity(root: ElementRef) -> InteractivityFlags {
    let mut flags = InteractivityFlags::default();
    for node in root.descendants() {
        let Some(el) = node.value().as_element() else {
            continue;
        };
        if el.name() == "script" {
            flags.inline_scripts = true;
        }
        for (key, value) in el.attrs() {
            if key.len() > 2 && key.starts_with("on") {
                flags.event_handlers = true;
            } else if ARIA_INTERACTION_ATTRS.contains(&key)
                || (key == "role" && INTERACTIVE_ROLES.contains(&value))
            {
                flags.aria_interaction = true;
            }
        }
    }
    flags
}

/// First occurrence of every distinct tag+class pair below `root`
pub fn content_model(root: ElementRef) -> Vec<ContentNode> {
    let mut seen = HashSet::new();
    let mut nodes = Vec::new();
    collect_nodes(root, 1, &mut seen, &mut nodes);
    nodes
}

fn collect_nodes(
    el: ElementRef,
    depth: usize,
    seen: &mut HashSet<(String, Option<String>)>,
    nodes: &mut Vec<ContentNode>,
) {
    for child in el.children().filter_map(ElementRef::wrap) {
        let tag = child.value().name().to_string();
        if tag == "script" || tag == "style" {
            continue;
        }
        let class = child
            .value()
            .attr("class")
            .map(|c| c.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|c| !c.is_empty());

        if seen.insert((tag.clone(), class.clone())) {
            nodes.push(ContentNode {
                kind: ContentKind::for_tag(&tag),
                tag,
                class,
                depth,
            });
        }
        collect_nodes(child, depth + 1, seen, nodes);
    }
}

/// Inline `style` attributes, `<style>` contents and colour attributes of
/// `root` and its descendants, as one stylesheet-like string
pub fn style_text(root: ElementRef) -> String {
    let mut styles = String::new();
    for node in root.descendants() {
        let Some(el) = node.value().as_element() else {
            continue;
        };
        if let Some(style) = el.attr("style") {
            styles.push_str(style);
            styles.push_str(";\n");
        }
        for attr in COLOR_ATTRS {
            if let Some(value) = el.attr(attr) {
                styles.push_str("color: ");
                styles.push_str(value);
                styles.push_str(";\n");
            }
        }
        if el.name() == "style" {
            if let Some(style_el) = ElementRef::wrap(node) {
                styles.extend(style_el.text());
                styles.push('\n');
            }
        }
    }
    styles
}
