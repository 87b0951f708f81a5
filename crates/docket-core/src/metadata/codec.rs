//! Metadata block codec.
//!
//! Blocks are delimited by a pair of sentinel HTML comments and wrap a
//! collapsible `<details>` section holding a fenced YAML body:
//!
//! ````text
//! <!-- docket:metadata-block:plan-header -->
//! <details>
//! <summary><code>plan-header</code></summary>
//!
//! ```yaml
//! created_by: alice
//! ```
//!
//! </details>
//! <!-- /docket:metadata-block:plan-header -->
//! ````
//!
//! Lookups fail soft: a missing or undecodable block yields `None`, because
//! most documents legitimately lack any given block. Rendering is
//! byte-deterministic so identical data always produces identical text, and
//! refuses data whose rendered text would not parse back to the same block.
//! Both LF and CRLF line endings are read.
//!
//! Content blocks use the same sentinels around an open `<details>` section
//! whose payload is raw markdown instead of YAML.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use super::{BlockData, MetadataBlock};

/// Marker namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "docket";

/// The region between the sentinels of a YAML block.
static YAML_BODY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?smR)\A\s*<details(?:\s+open)?\s*>\s*<summary>.*?</summary>\s*^```(?:yaml)?[ \t]*\r?\n(?P<yaml>.*?)^```[ \t]*$\s*</details>\s*\z",
    )
    .expect("yaml body pattern is valid")
});

/// The region between the sentinels of a content block.
static CONTENT_BODY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)\A\s*<details(?:\s+open)?\s*>\s*<summary>.*?</summary>\r?\n\r?\n(?P<content>.*?)\r?\n\r?\n</details>\s*\z",
    )
    .expect("content body pattern is valid")
});

/// Returned when a block that must exist is absent from a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("metadata block {key:?} not found in document")]
pub struct BlockNotFound {
    pub key: String,
}

/// Returned when a block cannot be rendered into text that reads back as
/// the same block.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("metadata block {key:?} does not encode: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// A value would put sentinel text into the document.
    #[error("metadata block {key:?} carries metadata-block sentinel text in its data")]
    SentinelInData { key: String },

    #[error("metadata block {key:?} does not read back unchanged after rendering")]
    NotRoundTrip { key: String },
}

/// Reads and writes metadata blocks for one marker namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockCodec {
    namespace: String,
}

impl Default for BlockCodec {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl BlockCodec {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Opening sentinel for `key`.
    pub fn start_marker(&self, key: &str) -> String {
        format!("<!-- {}:metadata-block:{key} -->", self.namespace)
    }

    /// Closing sentinel for `key`.
    pub fn end_marker(&self, key: &str) -> String {
        format!("<!-- /{}:metadata-block:{key} -->", self.namespace)
    }

    /// Byte range of the block for `key`, sentinels included.
    ///
    /// Uses the first opening sentinel and the first closing sentinel after
    /// it. Returns `None` when either is missing.
    pub fn block_span(&self, document: &str, key: &str) -> Option<Range<usize>> {
        let start_marker = self.start_marker(key);
        let end_marker = self.end_marker(key);

        let start = document.find(&start_marker)?;
        let inner_start = start + start_marker.len();
        let end = inner_start + document[inner_start..].find(&end_marker)?;
        Some(start..end + end_marker.len())
    }

    /// True when both sentinels for `key` are present, whether or not the
    /// region between them decodes.
    pub fn has_block_markers(&self, document: &str, key: &str) -> bool {
        self.block_span(document, key).is_some()
    }

    fn block_inner<'d>(&self, document: &'d str, key: &str) -> Option<&'d str> {
        let span = self.block_span(document, key)?;
        let inner_start = span.start + self.start_marker(key).len();
        let inner_end = span.end - self.end_marker(key).len();
        Some(&document[inner_start..inner_end])
    }

    /// Locate and decode the block for `key`.
    pub fn find_metadata_block(&self, document: &str, key: &str) -> Option<MetadataBlock> {
        let inner = self.block_inner(document, key)?;

        let Some(captures) = YAML_BODY.captures(inner) else {
            debug!(key, "metadata block markers present but no fenced yaml body");
            return None;
        };

        let yaml = captures["yaml"].replace("\r\n", "\n");
        match serde_yaml::from_str::<BlockData>(&yaml) {
            Ok(data) => Some(MetadataBlock::new(key, data)),
            Err(err) => {
                debug!(key, error = %err, "metadata block body is not a yaml mapping");
                None
            }
        }
    }

    /// Every decodable block in the document, in document order.
    ///
    /// Keys that appear more than once are decoded from their first
    /// occurrence only.
    pub fn parse_metadata_blocks(&self, document: &str) -> Vec<MetadataBlock> {
        let prefix = format!("<!-- {}:metadata-block:", self.namespace);
        let mut seen = HashSet::new();
        let mut blocks = Vec::new();
        let mut offset = 0;

        while let Some(pos) = document[offset..].find(&prefix) {
            let key_start = offset + pos + prefix.len();
            let Some(key_len) = document[key_start..].find(" -->") else {
                break;
            };
            let key = &document[key_start..key_start + key_len];
            offset = key_start + key_len;

            if !is_block_key(key) || !seen.insert(key) {
                continue;
            }
            if let Some(block) = self.find_metadata_block(document, key) {
                blocks.push(block);
            }
        }

        blocks
    }

    /// Render a block. The output is exactly the block span, with no
    /// trailing newline.
    ///
    /// Fails when the YAML payload contains sentinel text of this namespace,
    /// or when the rendered text does not decode back to `block`.
    pub fn render_metadata_block(&self, block: &MetadataBlock) -> Result<String, RenderError> {
        let key = &block.key;
        let yaml = serde_yaml::to_string(&block.data).map_err(|source| RenderError::Encode {
            key: key.clone(),
            source,
        })?;

        let open_prefix = format!("<!-- {}:metadata-block:", self.namespace);
        let close_prefix = format!("<!-- /{}:metadata-block:", self.namespace);
        if yaml.contains(&open_prefix) || yaml.contains(&close_prefix) {
            return Err(RenderError::SentinelInData { key: key.clone() });
        }

        let rendered = format!(
            "{start}\n<details>\n<summary><code>{key}</code></summary>\n\n```yaml\n{yaml}```\n\n</details>\n{end}",
            start = self.start_marker(key),
            end = self.end_marker(key),
        );
        if self.find_metadata_block(&rendered, key).as_ref() != Some(block) {
            return Err(RenderError::NotRoundTrip { key: key.clone() });
        }
        Ok(rendered)
    }

    /// Replace the span of the block for `key` with `new_block_text`.
    ///
    /// Every byte outside the span is preserved. An absent block is a caller
    /// error; nothing is appended.
    pub fn replace_metadata_block_in_body(
        &self,
        document: &str,
        key: &str,
        new_block_text: &str,
    ) -> Result<String, BlockNotFound> {
        let span = self.block_span(document, key).ok_or_else(|| BlockNotFound {
            key: key.to_owned(),
        })?;

        let mut out = String::with_capacity(document.len() - span.len() + new_block_text.len());
        out.push_str(&document[..span.start]);
        out.push_str(new_block_text);
        out.push_str(&document[span.end..]);
        Ok(out)
    }

    /// Render a content block: raw markdown inside an open disclosure.
    pub fn render_content_block(&self, key: &str, title: &str, content: &str) -> String {
        format!(
            "{start}\n<details open>\n<summary><strong>{title}</strong></summary>\n\n{content}\n\n</details>\n{end}",
            start = self.start_marker(key),
            end = self.end_marker(key),
        )
    }

    /// Extract the markdown payload of the content block for `key`.
    pub fn find_content_block(&self, document: &str, key: &str) -> Option<String> {
        let inner = self.block_inner(document, key)?;
        match CONTENT_BODY.captures(inner) {
            Some(captures) => Some(captures["content"].to_owned()),
            None => {
                debug!(key, "content block markers present but no disclosure body");
                None
            }
        }
    }
}

fn is_block_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// [`BlockCodec::find_metadata_block`] with the default namespace.
pub fn find_metadata_block(document: &str, key: &str) -> Option<MetadataBlock> {
    BlockCodec::default().find_metadata_block(document, key)
}

/// [`BlockCodec::render_metadata_block`] with the default namespace.
pub fn render_metadata_block(block: &MetadataBlock) -> Result<String, RenderError> {
    BlockCodec::default().render_metadata_block(block)
}

/// [`BlockCodec::replace_metadata_block_in_body`] with the default namespace.
pub fn replace_metadata_block_in_body(
    document: &str,
    key: &str,
    new_block_text: &str,
) -> Result<String, BlockNotFound> {
    BlockCodec::default().replace_metadata_block_in_body(document, key, new_block_text)
}
