// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent ARN confusion at compile time.

mod id;
mod image;

pub use id::{Arn, ClusterArn, TaskArn, TaskDefinitionArn};
pub use image::{Image, ParseImageError};
