//! layout::template
//!
//! Scans a layout template for fragment placeholders.
//!
//! The template is HTML with exactly one `<tessera-layout>` container. Every
//! `<tessera-fragment name="…" [route="…"] [default]>` inside it becomes a
//! slot with a fresh [`SlotId`], recorded in document order together with
//! its parent anchor and insertion index.

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use super::slot::{Anchor, SlotTemplate, FRAGMENT_TAG, LAYOUT_TAG};
use crate::core::types::SlotId;

/// Template configuration errors. Fatal at engine start.
#[derive(Debug, Clone, Error)]
pub enum TemplateError {
    #[error("layout template has no <tessera-layout> container")]
    MissingLayout,

    #[error("layout template has {count} <tessera-layout> containers; exactly one is allowed")]
    MultipleLayouts { count: usize },

    #[error("<tessera-fragment> #{position} has no name attribute")]
    MissingName { position: usize },

    #[error("<tessera-fragment> #{position} has an empty name")]
    EmptyName { position: usize },

    #[error("invalid selector: {0}")]
    Selector(String),
}

/// The scanned template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutTemplate {
    slots: Vec<SlotTemplate>,
}

impl LayoutTemplate {
    /// Parse `html` and collect its placeholders.
    pub fn parse(html: &str) -> Result<Self, TemplateError> {
        let document = Html::parse_document(html);
        let layout_selector = selector(LAYOUT_TAG)?;
        let fragment_selector = selector(FRAGMENT_TAG)?;

        let layouts: Vec<ElementRef> = document.select(&layout_selector).collect();
        let layout = match layouts.as_slice() {
            [] => return Err(TemplateError::MissingLayout),
            [layout] => *layout,
            many => return Err(TemplateError::MultipleLayouts { count: many.len() }),
        };

        let mut slots = Vec::new();
        for (order, element) in layout.select(&fragment_selector).enumerate() {
            let position = order + 1;
            let name = element
                .value()
                .attr("name")
                .ok_or(TemplateError::MissingName { position })?
                .trim();
            if name.is_empty() {
                return Err(TemplateError::EmptyName { position });
            }

            let route = element
                .value()
                .attr("route")
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string);

            slots.push(SlotTemplate {
                id: SlotId::generate(),
                name: name.to_string(),
                route,
                is_default: element.value().attr("default").is_some(),
                anchor: Anchor {
                    parent: parent_path(element),
                    index: element_index(element),
                },
                order,
            });
        }

        Ok(Self { slots })
    }

    pub fn slots(&self) -> &[SlotTemplate] {
        &self.slots
    }

    pub fn into_slots(self) -> Vec<SlotTemplate> {
        self.slots
    }

    /// Declared fragment names, in document order, without duplicates.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for slot in &self.slots {
            if !names.contains(&slot.name) {
                names.push(slot.name.clone());
            }
        }
        names
    }
}

fn selector(tag: &str) -> Result<Selector, TemplateError> {
    Selector::parse(tag).map_err(|e| TemplateError::Selector(e.to_string()))
}

fn element_index(element: ElementRef<'_>) -> usize {
    element
        .prev_siblings()
        .filter(|node| node.value().is_element())
        .count()
}

fn parent_path(element: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    let mut node = element.parent();
    while let Some(current) = node {
        let Some(parent) = ElementRef::wrap(current) else {
            break;
        };
        let name = parent.value().name();
        if name == LAYOUT_TAG {
            parts.push(name.to_string());
            break;
        }
        parts.push(format!("{}[{}]", name, element_index(parent)));
        node = current.parent();
    }
    parts.reverse();
    parts.join(" > ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOP: &str = r#"
        <html><body>
          <tessera-layout>
            <header><tessera-fragment name="@shop/nav"></tessera-fragment></header>
            <main>
              <tessera-fragment name="@shop/dashboard" route="/dashboard"></tessera-fragment>
              <tessera-fragment name="@shop/settings" route="/dashboard/settings"></tessera-fragment>
              <tessera-fragment name="@shop/not-found" default></tessera-fragment>
            </main>
          </tessera-layout>
        </body></html>
    "#;

    #[test]
    fn collects_slots_in_document_order() {
        let template = LayoutTemplate::parse(SHOP).unwrap();
        let names = template.names();
        assert_eq!(
            names,
            vec![
                "@shop/nav",
                "@shop/dashboard",
                "@shop/settings",
                "@shop/not-found"
            ]
        );

        let slots = template.slots();
        assert_eq!(slots[0].route, None);
        assert_eq!(slots[1].route.as_deref(), Some("/dashboard"));
        assert!(slots[3].is_default);
        assert_eq!(slots[2].order, 2);
    }

    #[test]
    fn records_anchors() {
        let template = LayoutTemplate::parse(SHOP).unwrap();
        let slots = template.slots();

        assert_eq!(slots[0].anchor.parent, "tessera-layout > header[0]");
        assert_eq!(slots[0].anchor.index, 0);
        assert_eq!(slots[1].anchor.parent, "tessera-layout > main[1]");
        assert_eq!(slots[2].anchor.index, 1);
        assert_eq!(slots[3].anchor.index, 2);
    }

    #[test]
    fn slot_ids_are_unique() {
        let template = LayoutTemplate::parse(SHOP).unwrap();
        let mut ids: Vec<_> = template.slots().iter().map(|s| s.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn missing_layout_is_rejected() {
        let err = LayoutTemplate::parse("<div><tessera-fragment name=\"a\"></tessera-fragment></div>")
            .unwrap_err();
        assert!(matches!(err, TemplateError::MissingLayout));
    }

    #[test]
    fn multiple_layouts_are_rejected() {
        let err = LayoutTemplate::parse("<tessera-layout></tessera-layout><tessera-layout></tessera-layout>")
            .unwrap_err();
        assert!(matches!(err, TemplateError::MultipleLayouts { count: 2 }));
    }

    #[test]
    fn nameless_placeholder_names_its_position() {
        let err = LayoutTemplate::parse(
            r#"<tessera-layout>
                 <tessera-fragment name="a"></tessera-fragment>
                 <tessera-fragment route="/b"></tessera-fragment>
               </tessera-layout>"#,
        )
        .unwrap_err();
        assert!(matches!(err, TemplateError::MissingName { position: 2 }));
        assert!(err.to_string().contains("#2"));
    }

    #[test]
    fn empty_layout_has_no_slots() {
        let template = LayoutTemplate::parse("<tessera-layout></tessera-layout>").unwrap();
        assert!(template.slots().is_empty());
    }
}
