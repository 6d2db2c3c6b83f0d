pub mod constants;
pub mod url_utils;
pub mod user_agent;

pub use constants::*;
pub use url_utils::{canonicalize_url, is_valid_url, same_page_anchors};
pub use user_agent::rewrite_user_agent;
