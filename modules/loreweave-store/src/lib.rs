pub mod error;
pub mod files;
pub mod store;

pub use error::{Result, StoreError};
pub use files::FileStore;
pub use store::{
    NewArticle, NewArticleSource, NewAsset, NewAssetSource, NewAuditEntry, NewEntity, Store,
};
