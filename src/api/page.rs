//! Server-rendered page: one URL input, one button, and the result region.

use crate::pipeline::Outcome;

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>AI News Brief</title>
<link rel="icon" href="data:image/svg+xml,<svg xmlns=%22http://www.w3.org/2000/svg%22 viewBox=%220 0 100 100%22><text y=%22.9em%22 font-size=%2290%22>📰</text></svg>">
<style>
body { font-family: system-ui, sans-serif; max-width: 46rem; margin: 3rem auto; padding: 0 1rem; color: #262730; }
label { display: block; margin: 1.5rem 0 0.4rem; font-size: 0.9rem; }
input[type=url], input[type=text] { width: 100%; box-sizing: border-box; padding: 0.6rem; border: 1px solid #ccc; border-radius: 0.4rem; }
button { margin-top: 1rem; padding: 0.5rem 1rem; border: 1px solid #ccc; border-radius: 0.4rem; background: #fff; cursor: pointer; }
button:disabled { opacity: 0.6; cursor: wait; }
.busy { display: none; margin-top: 1rem; color: #555; }
form.submitting .busy { display: block; }
.alert { margin-top: 1rem; padding: 1rem; border-radius: 0.4rem; }
.alert.success { background: #e8f9ee; color: #177233; }
.alert.info { background: #e6f1fc; color: #0c4a8a; }
.alert.warning { background: #fffbe6; color: #926c05; }
.alert.error { background: #ffecec; color: #a51d2d; }
</style>
</head>
<body>
<h1>📰 AI News Summarizer</h1>
<p>Enter a news article link to get a concise summary.</p>
"#;

const PAGE_TAIL: &str = r#"<script>
document.querySelector("form").addEventListener("submit", function (event) {
  event.target.classList.add("submitting");
  event.target.querySelector("button").disabled = true;
});
</script>
</body>
</html>
"#;

/// Renders the page, keeping `url` in the input. `outcome` is `None`
/// before the first submission.
pub fn render(url: &str, outcome: Option<&Outcome>) -> String {
    let mut html = String::with_capacity(PAGE_HEAD.len() + PAGE_TAIL.len() + 1024);
    html.push_str(PAGE_HEAD);
    html.push_str(&form(url));
    if let Some(outcome) = outcome {
        html.push_str(&result(outcome));
    }
    html.push_str(PAGE_TAIL);
    html
}

fn form(url: &str) -> String {
    format!(
        r#"<form method="post" action="/">
<label for="url">🔗 Paste News URL here:</label>
<input id="url" name="url" type="text" placeholder="https://www.bbc.com/news/..." value="{}">
<button type="submit">Summarize Now</button>
<div class="busy">AI is reading and condensing...</div>
</form>
"#,
        escape_html(url)
    )
}

fn result(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Summarized(brief) => format!(
            "<h3>📄 {}</h3>\n{}<hr>\n{}",
            escape_html(&brief.title),
            alert("success", &brief.summary),
            alert("info", &brief.elapsed_label()),
        ),
        Outcome::MissingUrl => alert("warning", crate::pipeline::MISSING_URL_MESSAGE),
        Outcome::TooShort => alert("error", crate::pipeline::TOO_SHORT_MESSAGE),
        Outcome::Failed(err) => alert("error", err.user_message()),
    }
}

fn alert(kind: &str, text: &str) -> String {
    format!("<div class=\"alert {}\" role=\"alert\">{}</div>\n", kind, escape_html(text))
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
