pub mod error;
pub mod settings;
pub mod query;
pub mod codec {
    pub mod document;
    pub mod text;
}
pub mod models {
    pub mod block;
}
pub mod db {
    pub mod repository;
    pub mod tags;
}
pub mod storage {
    pub mod client;
    #[cfg(feature = "remote")]
    pub mod github;
    pub mod memory;
}
pub mod assets {
    pub mod store;
}
