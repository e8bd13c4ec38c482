#![forbid(unsafe_code)]

pub mod http;
pub mod store;

pub use http::{HttpProgressStore, HttpStoreConfig};
pub use store::{
    InMemoryProgressStore, ProgressReadStore, ProgressWriteStore, Remote, RemoteError,
    WritePayload,
};
