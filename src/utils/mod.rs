pub mod url_utils;

pub use url_utils::is_valid_url;
