use std::str::FromStr;

use serde::{Deserialize, Serialize};
use stackscope_protocol::SharedStr;

/// Stable index of a [`Frame`] inside a profile's frame arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameId(pub(crate) u32);

impl FrameId {
    /// The synthetic root frame every call tree hangs off.
    pub const ROOT: FrameId = FrameId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Non-script activity a browser self-profiler attributes samples to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleMarker {
    Gc,
    Layout,
    Paint,
    Style,
    Script,
    Other,
}

impl SampleMarker {
    pub const ALL: [SampleMarker; 6] = [
        Self::Gc,
        Self::Layout,
        Self::Paint,
        Self::Style,
        Self::Script,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gc => "gc",
            Self::Layout => "layout",
            Self::Paint => "paint",
            Self::Style => "style",
            Self::Script => "script",
            Self::Other => "other",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Gc => "Garbage Collection",
            Self::Layout => "Layout",
            Self::Paint => "Paint",
            Self::Style => "Style",
            Self::Script => "Script",
            Self::Other => "Other",
        }
    }
}

impl std::fmt::Display for SampleMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a frame is addressed by the trace that declared it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameKey {
    Root,
    /// Position in the trace's frame table.
    Index(u64),
    /// Synthetic marker frame that no frame table declares.
    Marker(SampleMarker),
}

impl std::fmt::Display for FrameKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Root => f.write_str("root"),
            Self::Index(index) => write!(f, "{index}"),
            Self::Marker(marker) => write!(f, "marker:{marker}"),
        }
    }
}

/// Runtime that produced the frames; decides how raw names are normalised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FramePlatform {
    #[serde(alias = "browser")]
    JavaScript,
    Node,
    Native,
    #[default]
    #[serde(other)]
    Other,
}

impl FramePlatform {
    pub fn is_javascript(&self) -> bool {
        matches!(self, Self::JavaScript | Self::Node)
    }
}

impl FromStr for FramePlatform {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "javascript" | "browser" => Self::JavaScript,
            "node" => Self::Node,
            "native" | "cocoa" | "c" | "rust" => Self::Native,
            _ => Self::Other,
        })
    }
}

/// One raw entry of a trace's frame table, before normalisation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default, alias = "col")]
    pub column: Option<u32>,
    /// Library or image the frame was loaded from.
    #[serde(default, alias = "image")]
    pub package: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub instruction_addr: Option<String>,
    #[serde(default)]
    pub is_application: Option<bool>,
    /// Per-frame platform override (mixed native/JS stacks).
    #[serde(default)]
    pub platform: Option<FramePlatform>,
}

pub const NATIVE_CODE_SUFFIX: &str = " [native code]";
pub const GARBAGE_COLLECTOR: &str = "(garbage collector)";

/// A logical function shared by every call-tree node that executes it.
///
/// Identity fields are fixed at ingestion. Weights only ever change through
/// the profile builder that owns the arena.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub key: FrameKey,
    pub name: SharedStr,
    pub file: Option<SharedStr>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub package: Option<SharedStr>,
    pub module: Option<SharedStr>,
    pub is_application: bool,
    pub platform: FramePlatform,
    self_weight: f64,
    total_weight: f64,
    recursive: Option<FrameId>,
}

impl Frame {
    pub fn root() -> Self {
        Self::bare(FrameKey::Root, "root".into(), FramePlatform::Other, false)
    }

    pub fn marker(marker: SampleMarker) -> Self {
        Self::bare(
            FrameKey::Marker(marker),
            marker.display_name().into(),
            FramePlatform::JavaScript,
            false,
        )
    }

    fn bare(key: FrameKey, name: SharedStr, platform: FramePlatform, is_application: bool) -> Self {
        Self {
            key,
            name,
            file: None,
            line: None,
            column: None,
            package: None,
            module: None,
            is_application,
            platform,
            self_weight: 0.0,
            total_weight: 0.0,
            recursive: None,
        }
    }

    /// Build a frame from a raw descriptor, normalising it for `platform`.
    pub fn from_descriptor(key: FrameKey, desc: &FrameDescriptor, platform: FramePlatform) -> Self {
        let platform = desc.platform.unwrap_or(platform);
        let raw_name = desc.name.as_deref().map(str::trim).unwrap_or_default();
        let mut is_application = desc.is_application.unwrap_or(true);

        let name: SharedStr = if platform.is_javascript() {
            let mut name = if raw_name.is_empty() || raw_name.starts_with("unknown ") {
                SharedStr::from("<anonymous>")
            } else {
                SharedStr::from(raw_name)
            };
            if raw_name == GARBAGE_COLLECTOR || raw_name == "(root)" {
                is_application = false;
            }
            if desc.line.is_none() && desc.column.is_none() {
                name = name.with_suffix(NATIVE_CODE_SUFFIX);
                is_application = false;
            }
            if desc
                .file
                .as_deref()
                .is_some_and(|file| file.starts_with("node:internal") || file.contains("node_modules"))
            {
                is_application = false;
            }
            name
        } else if raw_name.is_empty() {
            SharedStr::from("anonymous")
        } else {
            SharedStr::from(raw_name)
        };

        Self {
            key,
            name,
            file: desc.file.as_deref().map(SharedStr::from),
            line: desc.line,
            column: desc.column,
            package: desc.package.as_deref().map(SharedStr::from),
            module: desc.module.as_deref().map(SharedStr::from),
            is_application,
            platform,
            self_weight: 0.0,
            total_weight: 0.0,
            recursive: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.key == FrameKey::Root
    }

    /// Node's GC pseudo-frame, with or without the native-code suffix.
    pub fn is_garbage_collector(&self) -> bool {
        let name = self.name.strip_suffix(NATIVE_CODE_SUFFIX).unwrap_or(&self.name);
        name == GARBAGE_COLLECTOR
    }

    pub fn self_weight(&self) -> f64 {
        self.self_weight
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// The frame this one was last seen recursing through, if any.
    pub fn recursive(&self) -> Option<FrameId> {
        self.recursive
    }

    pub(crate) fn add_self_weight(&mut self, weight: f64) {
        self.self_weight += weight;
    }

    pub(crate) fn add_total_weight(&mut self, weight: f64) {
        self.total_weight += weight;
    }

    pub(crate) fn mark_recursive(&mut self, through: FrameId) {
        self.recursive.get_or_insert(through);
    }

    /// A copy with identity kept and every accumulated weight cleared.
    pub(crate) fn reset(&self) -> Frame {
        Frame {
            self_weight: 0.0,
            total_weight: 0.0,
            recursive: None,
            ..self.clone()
        }
    }
}
