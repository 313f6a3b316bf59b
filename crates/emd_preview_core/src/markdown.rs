//! Markdown to HTML conversion of the rendered template output.

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd};

/// Pure markdown-in, HTML-out conversion.
pub trait MarkdownConverter: Send + Sync + 'static {
    fn to_html(&self, markdown: &str) -> String;
}

/// GitHub Flavored Markdown converter with anchor ids on headings.
#[derive(Debug, Clone, Copy, Default)]
pub struct GfmConverter;

impl GfmConverter {
    fn options() -> Options {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        options
    }
}

impl MarkdownConverter for GfmConverter {
    fn to_html(&self, markdown: &str) -> String {
        let events: Vec<Event> = Parser::new_ext(markdown, Self::options()).collect();
        let mut processed_events = Vec::with_capacity(events.len());

        for (i, event) in events.iter().enumerate() {
            match event {
                Event::Start(Tag::Heading {
                    level,
                    id: None,
                    classes,
                    attrs,
                }) => {
                    let heading_text: String = events[i + 1..]
                        .iter()
                        .take_while(|e| !matches!(e, Event::End(TagEnd::Heading(_))))
                        .filter_map(|e| match e {
                            Event::Text(text) | Event::Code(text) => Some(text.as_ref()),
                            _ => None,
                        })
                        .collect();

                    let slug = slugify(&heading_text);
                    processed_events.push(Event::Start(Tag::Heading {
                        level: *level,
                        id: (!slug.is_empty()).then(|| CowStr::from(slug)),
                        classes: classes.clone(),
                        attrs: attrs.clone(),
                    }));
                }
                event => processed_events.push(event.clone()),
            }
        }

        let mut html_output = String::with_capacity(markdown.len() * 3 / 2);
        pulldown_cmark::html::push_html(&mut html_output, processed_events.into_iter());
        html_output
    }
}

/// Turns a heading into a GitHub-style anchor id.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() || c == '_' {
                Some(c)
            } else if c == ' ' || c == '-' {
                Some('-')
            } else {
                None
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
