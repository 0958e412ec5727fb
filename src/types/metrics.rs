use serde::{Deserialize, Serialize};

/// Why a remote update was left out of the merge.
///
/// Discriminants are stable histogram buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RemoteUpdateError {
    /// Malformed payload: bad UUID, bad URL, folder with URL, or URL node without one.
    InvalidSpecifics = 1,
    InvalidUniquePosition = 2,
    /// Parent never became reachable from a permanent folder.
    MissingParentEntity = 4,
    /// Originator client item id names a different UUID than the payload.
    UnexpectedUuid = 9,
    ParentNotFolder = 10,
    /// Server id already claimed by an earlier record with a different UUID.
    UuidChangedForServerId = 11,
    /// Server tag that does not name a known permanent folder.
    UnsupportedPermanentFolder = 13,
}

impl RemoteUpdateError {
    pub const ALL: [RemoteUpdateError; 7] = [
        RemoteUpdateError::InvalidSpecifics,
        RemoteUpdateError::InvalidUniquePosition,
        RemoteUpdateError::MissingParentEntity,
        RemoteUpdateError::UnexpectedUuid,
        RemoteUpdateError::ParentNotFolder,
        RemoteUpdateError::UuidChangedForServerId,
        RemoteUpdateError::UnsupportedPermanentFolder,
    ];

    pub fn bucket(self) -> i32 {
        self as i32
    }
}

/// Relationship between two remote records that carry the same UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UuidDuplicateKind {
    MatchingUrls = 0,
    MatchingFolders = 1,
    DifferentUrls = 2,
    DifferentFolders = 3,
    DifferentTypes = 4,
}

impl UuidDuplicateKind {
    pub fn bucket(self) -> i32 {
        self as i32
    }
}

/// Size class of a merge, used to split the merge time histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MergeSizeBucket {
    Small,
    Over10k,
    Over50k,
    Over100k,
}

impl MergeSizeBucket {
    /// Every bucket a merge of `update_count` records reports under, smallest first.
    /// All merges report under [`MergeSizeBucket::Small`].
    pub fn for_update_count(update_count: usize) -> Vec<MergeSizeBucket> {
        let mut buckets = vec![MergeSizeBucket::Small];
        if update_count > 10_000 {
            buckets.push(MergeSizeBucket::Over10k);
        }
        if update_count > 50_000 {
            buckets.push(MergeSizeBucket::Over50k);
        }
        if update_count > 100_000 {
            buckets.push(MergeSizeBucket::Over100k);
        }
        buckets
    }

    pub fn histogram_suffix(self) -> &'static str {
        match self {
            MergeSizeBucket::Small => "",
            MergeSizeBucket::Over10k => ".10kUpdates",
            MergeSizeBucket::Over50k => ".50kUpdates",
            MergeSizeBucket::Over100k => ".100kUpdates",
        }
    }
}
