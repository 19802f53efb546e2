//! Save a chat as a standalone HTML page.
use std::path::Path;

use anyhow::Result;
use handlebars::Handlebars;
use serde::Serialize;

use super::markdown;
use super::store::Chat;

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>{{name}}</title>
<style>
body { background-color: #343541; color: #d1d5db; font-family: Arial, sans-serif; }
.container { width: 80%; max-width: 800px; margin: 20px auto; }
.message { margin-bottom: 15px; white-space: pre-wrap; }
.message.user { text-align: right; }
.code-block pre, code { background: #2b2b2b; color: #f8f8f2; border-radius: 5px; }
.code-block pre { padding: 10px; overflow: auto; }
.code-label { font-size: 0.75rem; }
.copy-btn { display: none; }
details pre { background: #222; color: #eee; white-space: pre-wrap; }
</style>
</head>
<body>
<div class="container">
<h1>{{name}}</h1>
{{#each messages}}
<div class="message user">{{question}}</div>
<div class="message assistant">
<div class="meta">{{model}} &middot; {{asked_at}}</div>
<div class="formatted-content">{{{html}}}</div>
<details><summary>Show raw output</summary><pre>{{raw}}</pre></details>
</div>
{{/each}}
</div>
</body>
</html>
"#;

#[derive(Serialize)]
struct ExportMessage<'a> {
    question: &'a str,
    model: &'a str,
    asked_at: String,
    html: String,
    raw: &'a str,
}

#[derive(Serialize)]
struct ExportChat<'a> {
    name: &'a str,
    messages: Vec<ExportMessage<'a>>,
}

/// Render `chat` to HTML. Answers go through the Markdown renderer;
/// everything else is escaped by the template.
pub fn export_html(chat: &Chat) -> Result<String> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    registry.register_template_string("chat", TEMPLATE)?;

    let data = ExportChat {
        name: &chat.name,
        messages: chat
            .messages
            .iter()
            .map(|e| ExportMessage {
                question: &e.question,
                model: &e.model,
                asked_at: e.asked_at.format("%Y-%m-%d %H:%M").to_string(),
                html: markdown::render(&e.answer),
                raw: &e.answer,
            })
            .collect(),
    };

    Ok(registry.render("chat", &data)?)
}

pub fn write_export(chat: &Chat, path: &Path) -> Result<()> {
    std::fs::write(path, export_html(chat)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ConversationStore;

    #[test]
    fn test_export_html() {
        let mut store = ConversationStore::new();
        store.create_chat();
        store.append_exchange("<b>hi</b>", "m1").unwrap();
        store.append_to_answer("**Hello** <script>").unwrap();
        store.finish_exchange().unwrap();

        let html = export_html(store.active().unwrap()).unwrap();
        assert!(html.contains("<title>Chat 1</title>"));
        assert!(html.contains("&lt;b&gt;hi&lt;/b&gt;"));
        assert!(html.contains("<strong>Hello</strong> &lt;script&gt;"));
        assert!(html.contains("<pre>**Hello** &lt;script&gt;</pre>"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_write_export() {
        let mut store = ConversationStore::new();
        store.create_chat();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.html");

        write_export(store.active().unwrap(), &path).unwrap();
        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
    }
}
