pub mod cache;
pub mod client;
pub mod store;

pub use cache::{SideCache, TalkPageCache};
pub use client::WikiClient;
pub use store::{GraphStore, WikibaseStore};
