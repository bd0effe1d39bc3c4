//! Representative product image for scan rows.

use serde_json::{Map, Value};

use crate::models::Product;

const SINGLE_FIELDS: &[&str] = &[
    "image",
    "image_url",
    "product_image",
    "main_image",
    "thumbnail",
    "photo",
];
const LIST_FIELDS: &[&str] = &["images", "product_images", "gallery", "photos"];
const NESTED_LISTS: &[(&str, &str)] = &[("media", "images"), ("assets", "images")];
/// Keys tried, in order, on object entries of an image list.
const ENTRY_KEYS: &[&str] = &["url", "href", "src", "file", "image"];
const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".webp", ".gif", ".bmp", ".svg"];

/// First absolute http(s) image URL among the product's image fields.
/// Relative storage paths are skipped.
pub fn thumbnail_url(product: &Product) -> Option<String> {
    candidates(&product.extra)
        .into_iter()
        .find(|url| is_http_image(url))
        .map(str::to_string)
}

fn candidates(extra: &Map<String, Value>) -> Vec<&str> {
    let mut out = Vec::new();
    for key in SINGLE_FIELDS {
        push(&mut out, extra.get(*key));
    }
    for key in LIST_FIELDS {
        push_list(&mut out, extra.get(*key));
    }
    for (outer, inner) in NESTED_LISTS {
        push_list(&mut out, extra.get(*outer).and_then(|v| v.get(*inner)));
    }
    push_list(&mut out, extra.get("attachments"));
    out
}

fn push<'a>(out: &mut Vec<&'a str>, value: Option<&'a Value>) {
    if let Some(s) = value.and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty()) {
        out.push(s);
    }
}

fn push_list<'a>(out: &mut Vec<&'a str>, value: Option<&'a Value>) {
    let Some(items) = value.and_then(Value::as_array) else {
        return;
    };
    for item in items {
        match item {
            Value::Object(entry) => {
                for key in ENTRY_KEYS {
                    push(out, entry.get(*key));
                }
            }
            other => push(out, Some(other)),
        }
    }
}

fn is_http_image(url: &str) -> bool {
    let lowered = url.to_ascii_lowercase();
    (lowered.starts_with("http://") || lowered.starts_with("https://"))
        && IMAGE_EXTENSIONS.iter().any(|ext| lowered.ends_with(ext))
}
