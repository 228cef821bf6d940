//! Inventory extraction from character export pages.
//!
//! Character pages put the three buckets side by side:
//! ```text
//! | Active Inventory | Inactive Inventory | Hirelings |
//! | <img> <img>      | <img>              | <img>     |
//! ```
//! Each image in a bucket's column becomes one [`AssetItem`].

use crate::config::ParserConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::error::Result;
use crate::lines::{element_text, row_cells, rows_after};
use crate::models::AssetItem;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::path::Path;

lazy_static! {
    static ref ROW: Selector = Selector::parse("tr").unwrap();
    static ref IMG: Selector = Selector::parse("img").unwrap();
}

/// One of the three inventory columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InventoryBucket {
    Active,
    Inactive,
    Hirelings,
}

impl InventoryBucket {
    /// Match a column header such as `Active Inventory:`.
    pub fn from_header(text: &str) -> Option<Self> {
        let header = text.trim().trim_end_matches(':').trim().to_lowercase();
        match header.as_str() {
            "active inventory" | "active items" => Some(Self::Active),
            "inactive inventory" | "inactive items" => Some(Self::Inactive),
            "hirelings" | "hireling" => Some(Self::Hirelings),
            _ => None,
        }
    }
}

/// The three inventory buckets of a character page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventorySection {
    pub active: Vec<AssetItem>,
    pub inactive: Vec<AssetItem>,
    pub hirelings: Vec<AssetItem>,
}

impl InventorySection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.inactive.is_empty() && self.hirelings.is_empty()
    }

    pub fn bucket_mut(&mut self, bucket: InventoryBucket) -> &mut Vec<AssetItem> {
        match bucket {
            InventoryBucket::Active => &mut self.active,
            InventoryBucket::Inactive => &mut self.inactive,
            InventoryBucket::Hirelings => &mut self.hirelings,
        }
    }

    /// Extract inventory from a parsed page.
    ///
    /// Without a header row naming the buckets, every image whose reference
    /// looks like an inventory icon is taken as active inventory.
    pub fn parse(document: &Html, config: &ParserConfig, sink: &dyn DiagnosticSink) -> Result<Self> {
        if let Some(section) = Self::from_columns(document) {
            return Ok(section);
        }

        sink.record(Diagnostic::new(
            DiagnosticKind::MissingExpectedSection,
            "No inventory table; scanning for item icons",
        ));
        let icon = config.inventory_icon_regex()?;
        Ok(Self::from_icon_scan(document, &icon))
    }

    /// Header-located columns. `None` when no row names any bucket.
    fn from_columns(document: &Html) -> Option<Self> {
        let header = document.select(&ROW).find_map(|row| {
            let columns: HashMap<usize, InventoryBucket> = row_cells(row)
                .into_iter()
                .enumerate()
                .filter_map(|(idx, cell)| {
                    InventoryBucket::from_header(&element_text(cell)).map(|b| (idx, b))
                })
                .collect();
            (!columns.is_empty()).then_some((row, columns))
        })?;
        let (header_row, columns) = header;

        let mut section = Self::new();
        for row in rows_after(header_row) {
            // a later header row starts a different table section
            let cells = row_cells(row);
            if cells
                .iter()
                .any(|cell| InventoryBucket::from_header(&element_text(*cell)).is_some())
            {
                break;
            }
            for (idx, cell) in cells.into_iter().enumerate() {
                if let Some(bucket) = columns.get(&idx) {
                    section.bucket_mut(*bucket).extend(images_in(cell));
                }
            }
        }
        tracing::debug!(
            active = section.active.len(),
            inactive = section.inactive.len(),
            hirelings = section.hirelings.len(),
            "Parsed inventory columns"
        );
        Some(section)
    }

    fn from_icon_scan(document: &Html, icon: &Regex) -> Self {
        let active = document
            .select(&IMG)
            .filter_map(asset_from_image)
            .filter(|item| icon.is_match(&item.asset))
            .collect();
        Self {
            active,
            ..Self::default()
        }
    }
}

/// Every image under `element` that has a reference.
pub fn images_in(element: ElementRef<'_>) -> Vec<AssetItem> {
    element.select(&IMG).filter_map(asset_from_image).collect()
}

/// Name an image by its alt text, then title, then file stem.
pub fn asset_from_image(image: ElementRef<'_>) -> Option<AssetItem> {
    let attrs = image.value();
    let asset = attrs.attr("src")?.trim();
    if asset.is_empty() {
        return None;
    }
    let name = [attrs.attr("alt"), attrs.attr("title")]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            Path::new(asset)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
    Some(AssetItem {
        name,
        asset: asset.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;

    fn parse(html: &str) -> (InventorySection, CollectingSink) {
        let document = Html::parse_document(html);
        let sink = CollectingSink::new();
        let section = InventorySection::parse(&document, &ParserConfig::default(), &sink).unwrap();
        (section, sink)
    }

    #[test]
    fn test_bucket_headers() {
        assert_eq!(
            InventoryBucket::from_header("Active Inventory:"),
            Some(InventoryBucket::Active)
        );
        assert_eq!(
            InventoryBucket::from_header(" inactive inventory "),
            Some(InventoryBucket::Inactive)
        );
        assert_eq!(
            InventoryBucket::from_header("Hirelings"),
            Some(InventoryBucket::Hirelings)
        );
        assert_eq!(InventoryBucket::from_header("Fame"), None);
    }

    #[test]
    fn test_columns_by_header() {
        let html = r#"<table>
            <tr><th>Active Inventory</th><th>Inactive Inventory</th><th>Hirelings</th></tr>
            <tr>
              <td><img src="items/sword.gif" alt="Short Sword"><img src="items/shield.gif" title="Shield"></td>
              <td><img src="items/boots.png"></td>
              <td><img src="natives/lancer.gif" alt="Lancer"></td>
            </tr>
        </table>"#;
        let (section, sink) = parse(html);

        assert_eq!(section.active.len(), 2);
        assert_eq!(section.active[0].name, "Short Sword");
        assert_eq!(section.active[0].asset, "items/sword.gif");
        assert_eq!(section.active[1].name, "Shield");
        assert_eq!(section.inactive[0].name, "boots");
        assert_eq!(section.hirelings[0].name, "Lancer");
        assert_eq!(sink.count(DiagnosticKind::MissingExpectedSection), 0);
    }

    #[test]
    fn test_icon_scan_fallback() {
        let html = r#"<body>
            <img src="portraits/amazon.png" alt="Amazon">
            <img src="items/axe.gif" alt="Axe">
            <img src="misc/crown.gif">
        </body>"#;
        let (section, sink) = parse(html);

        assert_eq!(section.active.len(), 1);
        assert_eq!(section.active[0].name, "Axe");
        assert!(section.inactive.is_empty());
        assert_eq!(sink.count(DiagnosticKind::MissingExpectedSection), 1);
    }

    #[test]
    fn test_empty_page_degrades_to_empty_section() {
        let (section, _) = parse("<html><body>nothing here</body></html>");
        assert!(section.is_empty());
    }
}
