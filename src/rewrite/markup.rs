use pulldown_cmark::{html, Options, Parser};

/// Render model output (Markdown, possibly with inline HTML) to HTML.
///
/// Raw HTML passes through untouched, so output that is already HTML
/// survives mostly as-is.
pub fn to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);

    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out.trim_end().to_string()
}

/// Whether a model reply is already HTML rather than Markdown.
///
/// Indented HTML would turn into code blocks if it went through [`to_html`].
pub fn looks_like_html(text: &str) -> bool {
    let text = text.trim_start();
    text.starts_with('<')
        && text[1..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '!' || c == '/')
}
