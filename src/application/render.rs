//! Markdown rendering for article bodies and the editor preview.

use std::collections::HashSet;

use ammonia::Builder as AmmoniaBuilder;
use comrak::{Options, markdown_to_html};
use once_cell::sync::Lazy;

static OPTIONS: Lazy<Options<'static>> = Lazy::new(markdown_options);
static SANITIZER: Lazy<AmmoniaBuilder<'static>> = Lazy::new(build_sanitizer);

/// Render article markdown to sanitised HTML.
pub fn render_markdown(markdown: &str) -> String {
    let html = markdown_to_html(markdown, &OPTIONS);
    SANITIZER.clean(&html).to_string()
}

fn markdown_options() -> Options<'static> {
    let mut options = Options::default();

    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.table = true;
    ext.autolink = true;
    ext.footnotes = true;
    ext.spoiler = true;
    ext.superscript = true;

    options.parse.smart = true;

    let render = &mut options.render;
    render.hardbreaks = true;
    render.github_pre_lang = true;
    // raw HTML in posts is kept and left to the sanitizer
    render.r#unsafe = true;

    options
}

fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();

    let tags: HashSet<&'static str> = HashSet::from([
        "a",
        "abbr",
        "blockquote",
        "br",
        "code",
        "del",
        "div",
        "em",
        "figcaption",
        "figure",
        "h1",
        "h2",
        "h3",
        "h4",
        "h5",
        "h6",
        "hr",
        "i",
        "img",
        "kbd",
        "li",
        "ol",
        "p",
        "pre",
        "s",
        "section",
        "span",
        "strong",
        "sub",
        "sup",
        "table",
        "tbody",
        "td",
        "th",
        "thead",
        "tr",
        "ul",
    ]);
    builder.tags(tags);

    let generic: HashSet<&'static str> = HashSet::from([
        "class",
        "id",
        "title",
        "lang",
        "data-footnote-ref",
        "data-footnotes",
        "data-footnote-backref",
    ]);
    builder.generic_attributes(generic);

    builder.add_tag_attributes("img", &["alt", "width", "height", "loading"]);
    builder.add_tag_attributes("pre", &["lang"]);
    builder.add_tag_attributes("th", &["align"]);
    builder.add_tag_attributes("td", &["align"]);
    builder.add_url_schemes(["http", "https", "mailto"].iter().copied());

    builder
}
