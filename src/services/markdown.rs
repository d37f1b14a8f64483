//! Markdown rendering service
//!
//! Posts and lessons are authored in Markdown and stored together with
//! their rendered HTML. Raw HTML in the source is escaped rather than
//! passed through.
//!
//! ```
//! use cohort::services::markdown::MarkdownRenderer;
//!
//! let html = MarkdownRenderer::new().render("# Welcome\n\nThis is **bold**.");
//! assert!(html.contains("<h1>"));
//! assert!(html.contains("<strong>"));
//! ```

use pulldown_cmark::{html, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

/// Markdown to HTML renderer
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    options: Options,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_SMART_PUNCTUATION);
        Self { options }
    }

    /// Render Markdown to HTML
    pub fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, self.options);
        let events = self.process_events(parser);

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());
        html_output
    }

    /// Plain-text summary of the first `max_chars` characters, used when a
    /// post has no explicit excerpt
    pub fn excerpt(&self, markdown: &str, max_chars: usize) -> String {
        let mut text = String::new();
        for event in Parser::new_ext(markdown, self.options) {
            match event {
                Event::Text(t) | Event::Code(t) => text.push_str(&t),
                Event::SoftBreak
                | Event::HardBreak
                | Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item) => text.push(' '),
                _ => {}
            }
        }

        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.chars().count() <= max_chars {
            return collapsed;
        }
        let cut: String = collapsed.chars().take(max_chars).collect();
        format!("{}…", cut.trim_end())
    }

    /// Escape raw HTML and render code blocks with a language class
    fn process_events<'a>(&self, parser: Parser<'a>) -> Vec<Event<'a>> {
        let mut events = Vec::new();
        let mut code_lang: Option<String> = None;
        let mut in_code_block = false;
        let mut code_content = String::new();

        for event in parser {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    in_code_block = true;
                    code_content.clear();
                    code_lang = match kind {
                        CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.to_string()),
                        _ => None,
                    };
                }
                Event::End(TagEnd::CodeBlock) => {
                    in_code_block = false;
                    let block = match code_lang.take() {
                        Some(lang) => format!(
                            "<pre><code class=\"language-{}\">{}</code></pre>\n",
                            html_escape(&lang),
                            html_escape(&code_content)
                        ),
                        None => format!("<pre><code>{}</code></pre>\n", html_escape(&code_content)),
                    };
                    events.push(Event::Html(block.into()));
                }
                Event::Text(text) if in_code_block => code_content.push_str(&text),
                Event::Html(raw) | Event::InlineHtml(raw) => events.push(Event::Text(raw)),
                _ => events.push(event),
            }
        }

        events
    }
}

/// Escapes HTML special characters in a string.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basic_markup() {
        let html = MarkdownRenderer::new().render("## Title\n\n*a* **b** ~~c~~\n\n- one\n- two");
        assert!(html.contains("<h2>Title</h2>"));
        assert!(html.contains("<em>a</em>"));
        assert!(html.contains("<strong>b</strong>"));
        assert!(html.contains("<del>c</del>"));
        assert!(html.contains("<li>one</li>"));
    }

    #[test]
    fn test_default_matches_new() {
        let html = MarkdownRenderer::default().render("~~gone~~\n\n| a |\n|---|\n| 1 |");
        assert_eq!(html, MarkdownRenderer::new().render("~~gone~~\n\n| a |\n|---|\n| 1 |"));
        assert!(html.contains("<del>"));
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_render_table() {
        let html = MarkdownRenderer::new().render("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>1</td>"));
    }

    #[test]
    fn test_code_block_with_language() {
        let html = MarkdownRenderer::new().render("```rust\nlet x = 1 < 2;\n```");
        assert!(html.contains("class=\"language-rust\""));
        assert!(html.contains("1 &lt; 2"));
    }

    #[test]
    fn test_code_block_without_language() {
        let html = MarkdownRenderer::new().render("```\nplain\n```");
        assert!(html.contains("<pre><code>plain\n</code></pre>"));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let html = MarkdownRenderer::new().render("<script>alert(1)</script>\n\nhi <b>there</b>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn test_render_empty_input() {
        assert_eq!(MarkdownRenderer::new().render(""), "");
    }

    #[test]
    fn test_excerpt() {
        let renderer = MarkdownRenderer::new();
        assert_eq!(renderer.excerpt("# Hi\n\nSome **bold** text.", 100), "Hi Some bold text.");
        assert_eq!(renderer.excerpt("one two three", 7), "one two…");
        assert_eq!(renderer.excerpt("", 10), "");
    }
}
