//! Market image lookup.
//!
//! Images are not nested under a stable marker, so the search is a
//! best-effort walk outward from the question element, bounded to
//! `IMAGE_SEARCH_DEPTH` ancestor levels. It can pick a neighbouring card's
//! image when the current one has none.

use scraper::ElementRef;
use url::Url;

use crate::config::IMAGE_SEARCH_DEPTH;
use crate::extract::markers::{closest, descendants, parent_element, Markers};

/// Path of the image-optimization proxy that wraps the real URL in `?url=`.
const IMAGE_PROXY_PATH: &str = "/_next/image";

/// Turns an `<img src>` into an absolute URL for the original image.
///
/// Proxy URLs are unwrapped to their `url` parameter, root-relative paths are
/// joined to `base`, anything else (absolute, `data:`) is returned as-is.
pub fn resolve_image_url(src: &str, base: &Url) -> String {
    if src.is_empty() {
        return String::new();
    }

    if src.starts_with(IMAGE_PROXY_PATH) {
        let Ok(proxy) = base.join(src) else {
            return src.to_string();
        };
        return proxy
            .query_pairs()
            .find(|(key, _)| key == "url")
            .map(|(_, value)| value.into_owned())
            .filter(|original| !original.is_empty())
            .unwrap_or_else(|| proxy.to_string());
    }

    if src.starts_with('/') {
        return base
            .join(src)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| src.to_string());
    }

    src.to_string()
}

/// `src` of the nearest image around `start`, resolved against `base`.
pub fn nearest_image_url(start: ElementRef<'_>, markers: &Markers, base: &Url) -> String {
    find_nearest_image(start, markers)
        .and_then(|img| img.value().attr("src"))
        .map(|src| resolve_image_url(src, base))
        .unwrap_or_default()
}

/// Finds the `<img>` closest to `start`.
///
/// 1. any image inside `start`'s closest card boundary (or its parent);
/// 2. then, for up to `IMAGE_SEARCH_DEPTH` levels: preceding siblings of the
///    current node (nearest first, each subtree depth-first), then the whole
///    parent subtree, before moving one level up.
pub fn find_nearest_image<'a>(start: ElementRef<'a>, markers: &Markers) -> Option<ElementRef<'a>> {
    let container = closest(start, |e| markers.is_card_boundary(e)).or_else(|| parent_element(start))?;
    if let Some(img) = first_image_in(container, markers) {
        return Some(img);
    }

    let mut current = container;
    for _ in 0..IMAGE_SEARCH_DEPTH {
        for sibling in current.prev_siblings().filter_map(ElementRef::wrap) {
            if markers.is_image(&sibling) {
                return Some(sibling);
            }
            if let Some(img) = first_image_in(sibling, markers) {
                return Some(img);
            }
        }

        current = parent_element(current)?;
        if let Some(img) = first_image_in(current, markers) {
            return Some(img);
        }
    }
    None
}

fn first_image_in<'a>(scope: ElementRef<'a>, markers: &Markers) -> Option<ElementRef<'a>> {
    descendants(scope).find(|el| markers.is_image(el))
}
