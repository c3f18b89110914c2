//! Routing module
//!
//! Provides path-template matching with named segment captures.

mod matcher;

pub use matcher::{match_route, PathParams, PathPattern};
