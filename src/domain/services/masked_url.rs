//! Masked URL generator
//!
//! Builds the display URL stored alongside a link: either a custom string
//! supplied by the creator or a path assembled from a template.

use rand::seq::SliceRandom;
use rand::Rng;

/// Display style for generated masked URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MaskTemplate {
    #[default]
    News,
    Shop,
    Social,
    Video,
    Docs,
}

impl MaskTemplate {
    /// Parse a template identifier. Unknown identifiers fall back to the
    /// default template.
    pub fn from_id(id: &str) -> Self {
        match id.trim().to_lowercase().as_str() {
            "news" => Self::News,
            "shop" => Self::Shop,
            "social" => Self::Social,
            "video" => Self::Video,
            "docs" => Self::Docs,
            _ => Self::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::News => "news",
            Self::Shop => "shop",
            Self::Social => "social",
            Self::Video => "video",
            Self::Docs => "docs",
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            Self::News => "article",
            Self::Shop => "product",
            Self::Social => "post",
            Self::Video => "watch",
            Self::Docs => "shared",
        }
    }

    fn words(&self) -> &'static [&'static str] {
        match self {
            Self::News => &["daily", "report", "update", "local", "weekly", "story", "brief"],
            Self::Shop => &["deal", "summer", "classic", "premium", "bundle", "outlet", "new"],
            Self::Social => &["photo", "moment", "friends", "trip", "party", "memories"],
            Self::Video => &["clip", "highlight", "live", "episode", "trailer", "session"],
            Self::Docs => &["invoice", "notes", "draft", "summary", "agenda", "sheet"],
        }
    }
}

/// Prepend `https://` when `url` does not start with a `scheme://` prefix.
pub fn ensure_scheme(url: &str) -> String {
    let url = url.trim();
    if has_scheme(url) {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

/// True when `url` starts with `scheme://`, where the scheme is a letter
/// followed by letters, digits, `+`, `-` or `.`.
fn has_scheme(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Build the masked URL for a new link.
///
/// A non-empty `custom` mask wins and is only normalized to carry a scheme.
/// Otherwise the result is `{base}/{prefix}/{word}-{word}-{number}` for the
/// requested template.
pub fn build_masked_url<R: Rng>(
    base: &str,
    template: MaskTemplate,
    custom: Option<&str>,
    rng: &mut R,
) -> String {
    if let Some(custom) = custom.map(str::trim).filter(|c| !c.is_empty()) {
        return ensure_scheme(custom);
    }

    let words = template.words();
    let first = words.choose(rng).copied().unwrap_or("page");
    let second = words.choose(rng).copied().unwrap_or("view");
    let number: u32 = rng.gen_range(100..10000);

    format!(
        "{}/{}/{}-{}-{}",
        base.trim_end_matches('/'),
        template.prefix(),
        first,
        second,
        number
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_template_from_id() {
        assert_eq!(MaskTemplate::from_id("shop"), MaskTemplate::Shop);
        assert_eq!(MaskTemplate::from_id(" Video "), MaskTemplate::Video);
        assert_eq!(MaskTemplate::from_id("nope"), MaskTemplate::News);
        assert_eq!(MaskTemplate::from_id(""), MaskTemplate::default());
    }

    #[test]
    fn test_template_round_trips_through_id() {
        for t in [
            MaskTemplate::News,
            MaskTemplate::Shop,
            MaskTemplate::Social,
            MaskTemplate::Video,
            MaskTemplate::Docs,
        ] {
            assert_eq!(MaskTemplate::from_id(t.as_str()), t);
        }
    }

    #[test]
    fn test_custom_mask_gets_scheme() {
        let mut rng = StdRng::seed_from_u64(1);
        let url = build_masked_url("http://x", MaskTemplate::News, Some("promo.example/summer"), &mut rng);
        assert_eq!(url, "https://promo.example/summer");
    }

    #[test]
    fn test_custom_mask_keeps_existing_scheme() {
        let mut rng = StdRng::seed_from_u64(1);
        let url = build_masked_url("http://x", MaskTemplate::News, Some("http://a.b/c"), &mut rng);
        assert_eq!(url, "http://a.b/c");
    }

    #[test]
    fn test_blank_custom_mask_is_ignored() {
        let mut rng = StdRng::seed_from_u64(1);
        let url = build_masked_url("http://host", MaskTemplate::Shop, Some("   "), &mut rng);
        assert!(url.starts_with("http://host/product/"));
    }

    #[test]
    fn test_generated_shape() {
        let mut rng = StdRng::seed_from_u64(42);
        let url = build_masked_url("https://host/", MaskTemplate::Video, None, &mut rng);

        let path = url.strip_prefix("https://host/watch/").unwrap();
        let parts: Vec<&str> = path.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert!(MaskTemplate::Video.words().contains(&parts[0]));
        assert!(MaskTemplate::Video.words().contains(&parts[1]));
        let n: u32 = parts[2].parse().unwrap();
        assert!((100..10000).contains(&n));
    }

    #[test]
    fn test_same_seed_same_url() {
        let a = build_masked_url("h", MaskTemplate::Docs, None, &mut StdRng::seed_from_u64(7));
        let b = build_masked_url("h", MaskTemplate::Docs, None, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_ensure_scheme() {
        assert_eq!(ensure_scheme("example.com"), "https://example.com");
        assert_eq!(ensure_scheme(" https://example.com "), "https://example.com");
        assert_eq!(ensure_scheme("svn+ssh://host/repo"), "svn+ssh://host/repo");
    }

    #[test]
    fn test_ensure_scheme_ignores_nested_urls() {
        assert_eq!(
            ensure_scheme("example.com/go?next=https://other.example"),
            "https://example.com/go?next=https://other.example"
        );
        assert_eq!(ensure_scheme("://example.com"), "https://://example.com");
        assert_eq!(ensure_scheme("1http://example.com"), "https://1http://example.com");
    }
}
