//! Domain model for discovered content and its analysis.

pub mod analysis;
pub mod candidate;

pub use analysis::{
    AnalysisDocument, AnalysisKind, RegularAnalysis, TargetLanguage, TrendingAnalysis,
};
pub use candidate::{
    Candidate, CandidateDraft, CandidateMedia, CreatorInfo, EngagementStats, MusicInfo, Platform,
    PrimaryMedia, ProcessingStatus,
};
