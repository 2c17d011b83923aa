//! Core types for the timeline engine.

pub mod user;
pub mod post;
pub mod edge;

pub use user::UserId;
pub use post::{NewPost, Post, PostId, PostRecordError};
pub use edge::FollowEdge;
