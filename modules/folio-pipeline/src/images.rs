// Markdown image references. The fetch stage uses this to decide whether a
// media task is worth enqueueing; the media stage receives the same list.

use std::sync::LazyLock;

use regex::Regex;

static IMAGE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[.*?\]\((https?://[^\s)]+)\)").expect("valid image regex")
});

/// Externally-hosted image URLs referenced in markdown image syntax,
/// in document order. Relative and non-http references are ignored.
pub fn extract_image_urls(markdown: &str) -> Vec<String> {
    IMAGE_URL
        .captures_iter(markdown)
        .map(|c| c[1].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_urls_in_document_order() {
        let md = "# Title\n\n![a](https://cdn.example.com/a.jpg)\n\ntext\n\n![b](https://cdn.example.com/b.png)";
        assert_eq!(
            extract_image_urls(md),
            vec![
                "https://cdn.example.com/a.jpg".to_string(),
                "https://cdn.example.com/b.png".to_string(),
            ]
        );
    }

    #[test]
    fn ignores_relative_and_plain_links() {
        let md = "![local](/images/a.jpg) [link](https://example.com/page)";
        assert!(extract_image_urls(md).is_empty());
    }

    #[test]
    fn empty_alt_text_is_fine() {
        let md = "![](http://cdn.example.com/bare.gif)";
        assert_eq!(extract_image_urls(md), vec!["http://cdn.example.com/bare.gif"]);
    }

    #[test]
    fn no_images_yields_empty() {
        assert!(extract_image_urls("plain paragraph").is_empty());
    }
}
