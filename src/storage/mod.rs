pub mod documents;
pub mod github;
pub mod local;
pub mod store;
pub mod traits;

pub use documents::{date_key, AddOutcome, Document, FeedList, NewsArchive, VisitorStats};
pub use github::GithubStore;
pub use local::LocalFiles;
pub use store::{DocumentStore, LoadOutcome, LoadSource, Loaded};
pub use traits::{Commit, MemoryRemote, RemoteFile, RemoteStore, Revision};
