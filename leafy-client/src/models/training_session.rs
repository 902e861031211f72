//! Training session state
//!
//! The session is a plain value; every mutation goes through the workflow
//! controller's transition methods.

use leafy_common::events::Phase;
use std::fmt;

/// Requested image count, always within [`ImageCount::MIN`, `ImageCount::MAX`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageCount(u32);

impl ImageCount {
    pub const MIN: u32 = 10;
    pub const MAX: u32 = 100;
    pub const DEFAULT: u32 = 50;

    /// Clamp any value into range
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(Self::MIN as i64, Self::MAX as i64) as u32)
    }

    /// Parse user input; `None` when the input is not an integer
    pub fn parse(input: &str) -> Option<Self> {
        input.trim().parse::<i64>().ok().map(Self::clamped)
    }

    /// Parse user input, keeping `previous` when parsing fails
    pub fn parse_or(input: &str, previous: ImageCount) -> Self {
        Self::parse(input).unwrap_or(previous)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl Default for ImageCount {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl fmt::Display for ImageCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A previously trained species label
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelEntry {
    pub name: String,
}

impl LabelEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// One user-selected image waiting to be uploaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl StagedFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

/// Files held between selection and upload submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedUpload {
    pub files: Vec<StagedFile>,
}

impl StagedUpload {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }
}

/// The single in-flight training attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingSession {
    /// Species being trained, stored trimmed
    pub label: String,
    pub phase: Phase,
    /// Detail from the last status read (failure reason when `Errored`)
    pub status_message: String,
    /// Server-relative image references; non-empty only while `Previewing`
    pub preview_images: Vec<String>,
    pub requested_image_count: ImageCount,
}

impl TrainingSession {
    /// Fresh `Idle` session
    pub fn new(requested_image_count: ImageCount) -> Self {
        Self {
            label: String::new(),
            phase: Phase::Idle,
            status_message: String::new(),
            preview_images: Vec::new(),
            requested_image_count,
        }
    }

    /// Trimmed label, or `None` when it is blank
    pub fn validated_label(&self) -> Option<&str> {
        let label = self.label.trim();
        (!label.is_empty()).then_some(label)
    }

    /// Check the preview/phase invariant
    pub fn is_consistent(&self) -> bool {
        self.preview_images.is_empty() || self.phase == Phase::Previewing
    }
}

impl Default for TrainingSession {
    fn default() -> Self {
        Self::new(ImageCount::default())
    }
}
