use scraper::{ElementRef, Html, Selector};

/// Title, body and summary pulled out of a scraped page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    pub title: String,
    /// Inner HTML of the main content container.
    pub content: String,
    pub excerpt: String,
}

/// Extract the main content of an HTML document.
///
/// Title comes from the first `h1`, then `<title>`, then `"Untitled"`. The body
/// is the inner HTML of the first `article`, then `.entry-content`, then
/// `<body>`. The excerpt is the `description` meta tag, or empty. Empty matches
/// fall through to the next candidate.
pub fn extract_page(html: &str) -> PageContent {
    let document = Html::parse_document(html);

    let title = first_text(&document, "h1")
        .or_else(|| first_text(&document, "title"))
        .unwrap_or_else(|| "Untitled".to_string());

    let content = ["article", ".entry-content", "body"]
        .iter()
        .find_map(|css| first_inner_html(&document, css))
        .unwrap_or_default();

    let excerpt = select_first(&document, r#"meta[name="description"]"#)
        .and_then(|meta| meta.value().attr("content"))
        .map(|c| c.trim().to_string())
        .unwrap_or_default();

    PageContent {
        title,
        content,
        excerpt,
    }
}

fn select_first<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    document.select(&selector).next()
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let text = select_first(document, css)?.text().collect::<String>();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn first_inner_html(document: &Html, css: &str) -> Option<String> {
    let html = select_first(document, css)?.inner_html();
    let html = html.trim();
    (!html.is_empty()).then(|| html.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_article_page() {
        let page = extract_page(
            r#"<html><head><title>Site</title><meta name="description" content="About it"></head>
            <body><header>nav</header><article><h1>Headline</h1><p>Body</p></article></body></html>"#,
        );
        assert_eq!(page.title, "Headline");
        assert_eq!(page.content, "<h1>Headline</h1><p>Body</p>");
        assert_eq!(page.excerpt, "About it");
    }

    #[test]
    fn test_entry_content_fallback() {
        let page = extract_page(
            r#"<html><body><div class="entry-content"><p>Post body</p></div><footer>f</footer></body></html>"#,
        );
        assert_eq!(page.content, "<p>Post body</p>");
    }

    #[test]
    fn test_body_fallback() {
        let page = extract_page("<html><body><p>Just a body</p></body></html>");
        assert_eq!(page.content, "<p>Just a body</p>");
    }

    #[test]
    fn test_empty_article_falls_through() {
        let page = extract_page(
            r#"<html><body><article>   </article><div class="entry-content">Real</div></body></html>"#,
        );
        assert_eq!(page.content, "Real");
    }

    #[test]
    fn test_title_fallbacks() {
        let page =
            extract_page("<html><head><title> Doc Title </title></head><body></body></html>");
        assert_eq!(page.title, "Doc Title");

        let page =
            extract_page("<html><head><title>Doc</title></head><body><h1>  </h1></body></html>");
        assert_eq!(page.title, "Doc");

        let page = extract_page("<html><body><p>nothing</p></body></html>");
        assert_eq!(page.title, "Untitled");
    }

    #[test]
    fn test_missing_description_is_empty() {
        let page = extract_page("<html><body><h1>T</h1></body></html>");
        assert_eq!(page.excerpt, "");
    }
}
