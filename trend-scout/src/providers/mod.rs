//! External collaborators.
//!
//! Each one is a trait so the pipeline can be driven by in-memory fakes; the
//! reqwest implementations share one client built by [`http::build_client`].

pub mod download;
pub mod gemini;
pub mod http;
pub mod resolver;
pub mod storage;
pub mod translate;
pub mod trending;

pub use download::{DownloadedMedia, HttpDownloader, MediaDownloader};
pub use gemini::{FileState, GeminiClient, InferenceProvider, RemoteFile};
pub use resolver::{MediaManifest, MediaResolver, TikwmResolver};
pub use storage::{MediaPurpose, ObjectStorage, SupabaseStorage};
pub use translate::{GoogleTranslator, TextTranslator};
pub use trending::{RapidApiTrendingSource, TrendingSource};
