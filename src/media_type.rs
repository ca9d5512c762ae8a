//! MIME identifiers and header value parsing.

/// Reserved slot for the query-string codec.
pub const QUERY: &str = "__MIME__/QUERY";
/// Reserved slot for the path-parameter codec.
pub const URI: &str = "__MIME__/URI";
/// Reserved fallback slot, used when nothing else matches.
pub const WILDCARD: &str = "*";

pub const JSON: &str = "application/json";
pub const HTML: &str = "text/html";
pub const XML: &str = "application/xml";
pub const XML2: &str = "text/xml";
pub const PLAIN: &str = "text/plain";
pub const POST_FORM: &str = "application/x-www-form-urlencoded";
pub const MULTIPART_POST_FORM: &str = "multipart/form-data";
pub const PROTOBUF: &str = "application/x-protobuf";
pub const MSGPACK: &str = "application/x-msgpack";
pub const MSGPACK2: &str = "application/msgpack";
pub const YAML: &str = "application/x-yaml";
pub const TOML: &str = "application/toml";

pub fn is_reserved(mime: &str) -> bool {
    matches!(mime, QUERY | URI | WILDCARD)
}

/// `type/subtype` of a `Content-Type` value, lower-cased, parameters dropped.
pub fn parse_media_type(value: &str) -> Option<String> {
    let parsed: mime::Mime = value.trim().parse().ok()?;
    Some(parsed.essence_str().to_ascii_lowercase())
}

/// The comma-separated entries of an `Accept` value, trimmed, parameters kept.
pub fn accept_entries(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim)
}
