//! Document model: pages of typed content blocks.
//!
//! Documents are produced by an upstream layout stage and arrive fully
//! structured. Blockwise never creates, removes, or reorders blocks; it only
//! writes [`Block::summary`] and bumps [`BlockMetadata::llm_error_count`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BlockwiseError, Result};

// ---------------------------------------------------------------------------
// BlockKind
// ---------------------------------------------------------------------------

/// Content kind discriminant of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    SectionHeader,
    Text,
    TableGroup,
    Table,
    ListGroup,
    ListItem,
    Code,
    Equation,
    Form,
    ComplexRegion,
    FigureGroup,
    Figure,
    PictureGroup,
    Picture,
    Caption,
    Footnote,
    PageHeader,
    PageFooter,
}

impl BlockKind {
    /// Every kind, in declaration order.
    pub const ALL: [BlockKind; 18] = [
        Self::SectionHeader,
        Self::Text,
        Self::TableGroup,
        Self::Table,
        Self::ListGroup,
        Self::ListItem,
        Self::Code,
        Self::Equation,
        Self::Form,
        Self::ComplexRegion,
        Self::FigureGroup,
        Self::Figure,
        Self::PictureGroup,
        Self::Picture,
        Self::Caption,
        Self::Footnote,
        Self::PageHeader,
        Self::PageFooter,
    ];

    /// Stable snake_case name, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SectionHeader => "section_header",
            Self::Text => "text",
            Self::TableGroup => "table_group",
            Self::Table => "table",
            Self::ListGroup => "list_group",
            Self::ListItem => "list_item",
            Self::Code => "code",
            Self::Equation => "equation",
            Self::Form => "form",
            Self::ComplexRegion => "complex_region",
            Self::FigureGroup => "figure_group",
            Self::Figure => "figure",
            Self::PictureGroup => "picture_group",
            Self::Picture => "picture",
            Self::Caption => "caption",
            Self::Footnote => "footnote",
            Self::PageHeader => "page_header",
            Self::PageFooter => "page_footer",
        }
    }

    /// Image-like kinds carry [`BlockContent::Image`] and may hold a description.
    pub fn is_image_like(&self) -> bool {
        matches!(
            self,
            Self::FigureGroup | Self::Figure | Self::PictureGroup | Self::Picture
        )
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BlockKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == needle)
            .ok_or_else(|| format!("unknown block kind: '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// Kind-specific payload of a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockContent {
    /// Textual blocks: headers, paragraphs, tables, code, ...
    Text {
        #[serde(default)]
        text: String,
    },
    /// Image-like blocks. `text` holds any OCR'd or caption text; the
    /// description is produced by an upstream image-description stage.
    Image {
        #[serde(default)]
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

/// Bookkeeping written by enrichment stages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMetadata {
    /// Number of rejected or missing generation responses, across runs.
    #[serde(default)]
    pub llm_error_count: u32,
}

/// A typed node of document content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    pub content: BlockContent,
    #[serde(default)]
    pub ignore_for_output: bool,
    #[serde(default)]
    pub removed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub metadata: BlockMetadata,
}

impl Block {
    /// A textual block.
    pub fn text(kind: BlockKind, text: impl Into<String>) -> Self {
        Self::with_content(kind, BlockContent::Text { text: text.into() })
    }

    /// An image-like block with an optional description.
    pub fn image(kind: BlockKind, text: impl Into<String>, description: Option<String>) -> Self {
        Self::with_content(
            kind,
            BlockContent::Image {
                text: text.into(),
                description,
            },
        )
    }

    fn with_content(kind: BlockKind, content: BlockContent) -> Self {
        Self {
            kind,
            content,
            ignore_for_output: false,
            removed: false,
            summary: None,
            metadata: BlockMetadata::default(),
        }
    }

    /// Raw textual content, possibly empty. Not trimmed.
    pub fn raw_text(&self) -> &str {
        match &self.content {
            BlockContent::Text { text } | BlockContent::Image { text, .. } => text,
        }
    }

    /// Non-empty image description, if this is an image block that has one.
    pub fn description(&self) -> Option<&str> {
        match &self.content {
            BlockContent::Image {
                description: Some(d),
                ..
            } if !d.is_empty() => Some(d),
            _ => None,
        }
    }

    /// Whether an upstream stage has dropped this block from output.
    pub fn is_excluded(&self) -> bool {
        self.ignore_for_output || self.removed
    }

    /// Record one failed generation attempt.
    pub fn record_error(&mut self) {
        self.metadata.llm_error_count = self.metadata.llm_error_count.saturating_add(1);
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// Positional, non-owning reference to a block inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId {
    /// Index into [`Document::pages`].
    pub page: usize,
    /// Index into [`Page::blocks`].
    pub block: usize,
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/page/{}/block/{}", self.page, self.block)
    }
}

/// One page of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Page number as assigned by the layout stage.
    pub page_id: u32,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

/// A structured document: ordered pages of ordered blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub pages: Vec<Page>,
}

impl Document {
    /// Parse and validate a document from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: Self = serde_json::from_str(json)
            .map_err(|e| BlockwiseError::parse(format!("invalid document JSON: {e}")))?;
        doc.validate()?;
        Ok(doc)
    }

    /// Read, parse, and validate a document file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BlockwiseError::io(path, e))?;
        let doc: Self = serde_json::from_str(&content).map_err(|e| {
            BlockwiseError::parse(format!("invalid document JSON in {}: {e}", path.display()))
        })?;
        doc.validate()?;
        Ok(doc)
    }

    /// Check that every block's content variant matches its kind.
    pub fn validate(&self) -> Result<()> {
        for (id, _, block) in self.blocks() {
            let is_image = matches!(block.content, BlockContent::Image { .. });
            if block.kind.is_image_like() != is_image {
                let found = if is_image { "image" } else { "text" };
                return Err(BlockwiseError::validation(format!(
                    "block {id}: kind `{}` cannot carry {found} content",
                    block.kind
                )));
            }
        }
        Ok(())
    }

    /// All blocks in traversal order: page order, then block order.
    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, u32, &Block)> + '_ {
        self.pages.iter().enumerate().flat_map(|(page_idx, page)| {
            page.blocks.iter().enumerate().map(move |(block_idx, block)| {
                let id = BlockId {
                    page: page_idx,
                    block: block_idx,
                };
                (id, page.page_id, block)
            })
        })
    }

    /// Total number of blocks across all pages.
    pub fn block_count(&self) -> usize {
        self.pages.iter().map(|p| p.blocks.len()).sum()
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.pages.get(id.page)?.blocks.get(id.block)
    }

    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.pages.get_mut(id.page)?.blocks.get_mut(id.block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_roundtrips_through_str() {
        for kind in BlockKind::ALL {
            assert_eq!(kind.as_str().parse::<BlockKind>().unwrap(), kind);
        }
        assert_eq!("Table-Group".parse::<BlockKind>().unwrap(), BlockKind::TableGroup);
        assert!("sidebar".parse::<BlockKind>().is_err());
    }

    #[test]
    fn kind_serde_matches_as_str() {
        let json = serde_json::to_string(&BlockKind::ComplexRegion).unwrap();
        assert_eq!(json, r#""complex_region""#);
    }

    #[test]
    fn description_only_on_image_blocks() {
        let text = Block::text(BlockKind::Text, "hello");
        assert_eq!(text.description(), None);

        let fig = Block::image(BlockKind::Figure, "", Some("a chart".into()));
        assert_eq!(fig.description(), Some("a chart"));

        let empty = Block::image(BlockKind::Picture, "", Some(String::new()));
        assert_eq!(empty.description(), None);
    }

    #[test]
    fn record_error_is_additive() {
        let mut block = Block::text(BlockKind::Text, "x");
        block.metadata.llm_error_count = 2;
        block.record_error();
        assert_eq!(block.metadata.llm_error_count, 3);
    }

    #[test]
    fn parse_document_json() {
        let json = r#"{
            "title": "Report",
            "pages": [
                {"page_id": 0, "blocks": [
                    {"kind": "text", "content": {"type": "text", "text": "Hello"}},
                    {"kind": "figure", "content": {"type": "image", "description": "A bar chart"},
                     "removed": true}
                ]},
                {"page_id": 1, "blocks": [
                    {"kind": "code", "content": {"type": "text", "text": "fn main() {}"},
                     "metadata": {"llm_error_count": 4}}
                ]}
            ]
        }"#;
        let doc = Document::from_json(json).expect("parse");
        assert_eq!(doc.block_count(), 3);

        let fig = doc.block(BlockId { page: 0, block: 1 }).unwrap();
        assert!(fig.removed);
        assert_eq!(fig.raw_text(), "");
        assert_eq!(fig.description(), Some("A bar chart"));

        let code = doc.block(BlockId { page: 1, block: 0 }).unwrap();
        assert_eq!(code.metadata.llm_error_count, 4);
        assert!(code.summary.is_none());
    }

    #[test]
    fn validate_rejects_mismatched_content() {
        let json = r#"{"pages": [{"page_id": 3, "blocks": [
            {"kind": "text", "content": {"type": "image", "description": "nope"}}
        ]}]}"#;
        let err = Document::from_json(json).unwrap_err();
        assert!(err.to_string().contains("kind `text` cannot carry image content"));
    }

    #[test]
    fn blocks_iterate_in_traversal_order() {
        let doc = Document {
            title: None,
            pages: vec![
                Page {
                    page_id: 7,
                    blocks: vec![
                        Block::text(BlockKind::Text, "a"),
                        Block::text(BlockKind::Text, "b"),
                    ],
                },
                Page {
                    page_id: 8,
                    blocks: vec![Block::text(BlockKind::Text, "c")],
                },
            ],
        };
        let order: Vec<(BlockId, u32, &str)> = doc
            .blocks()
            .map(|(id, page_id, b)| (id, page_id, b.raw_text()))
            .collect();
        assert_eq!(
            order,
            vec![
                (BlockId { page: 0, block: 0 }, 7, "a"),
                (BlockId { page: 0, block: 1 }, 7, "b"),
                (BlockId { page: 1, block: 0 }, 8, "c"),
            ]
        );
    }

    #[test]
    fn block_mut_out_of_range_is_none() {
        let mut doc = Document::default();
        assert!(doc.block_mut(BlockId { page: 0, block: 0 }).is_none());
    }
}
