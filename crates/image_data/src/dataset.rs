use anyhow::Result;

/// A `DataSource` streams raw records (e.g. manifest lines) from storage.
///
/// Implementations must be `Send + Sync` so a source can be handed to the
/// prefetch thread together with the rest of the layer state.
pub trait DataSource<T>: Send + Sync {
    fn stream(&self) -> Result<Box<dyn Iterator<Item = Result<T>> + Send>>;
}

/// Number of label groups carried by every entry.
pub const NUM_LABEL_GROUPS: usize = 2;

/// The two label groups of an [`Entry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelGroup {
    /// Positive labels, written with the "use" sentinel.
    Use = 0,
    /// Labels the loss should ignore, written with the "ignore" sentinel.
    Ignore = 1,
}

impl LabelGroup {
    pub const ALL: [LabelGroup; NUM_LABEL_GROUPS] = [LabelGroup::Use, LabelGroup::Ignore];
}

/// One parsed manifest line: an image filename and its two label groups.
///
/// # Example
/// The line `a.jpg 3,7;2` (with `,` / `;` separators) becomes
/// `Entry { filename: "a.jpg", labels: [vec![3, 7], vec![2]] }`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Entry {
    pub filename: String,
    pub labels: [Vec<usize>; NUM_LABEL_GROUPS],
}

impl Entry {
    pub fn new(filename: impl Into<String>, use_labels: Vec<usize>, ignore_labels: Vec<usize>) -> Self {
        Self {
            filename: filename.into(),
            labels: [use_labels, ignore_labels],
        }
    }

    pub fn group(&self, group: LabelGroup) -> &[usize] {
        &self.labels[group as usize]
    }

    /// Number of labels across both groups.
    pub fn total_labels(&self) -> usize {
        self.labels.iter().map(Vec::len).sum()
    }
}

/// How labels are laid out in the label tensor. Fixed for the lifetime of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelMode {
    /// One scalar label per image, label tensor `[B, 1]`.
    Single,
    /// Dense `[B, width]` rows where `width = max_label_id + 1`.
    Multi { width: usize },
}

impl LabelMode {
    /// Number of label columns per image.
    pub fn width(&self) -> usize {
        match self {
            LabelMode::Single => 1,
            LabelMode::Multi { width } => *width,
        }
    }

    pub fn is_multi_label(&self) -> bool {
        matches!(self, LabelMode::Multi { .. })
    }
}
