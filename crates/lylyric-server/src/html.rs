//! Server-rendered HTML: shared layout, navigation and small fragments.
//!
//! Every piece of user or backend text goes through [`escape_html`] before
//! it is placed in a page.

use lylyric_core::{Error, SongRecord};

/// Top-level pages, in nav order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Search,
    Similar,
    Studio,
    Explore,
}

impl Page {
    const ALL: [Page; 4] = [Page::Search, Page::Similar, Page::Studio, Page::Explore];

    fn href(self) -> &'static str {
        match self {
            Page::Search => "/",
            Page::Similar => "/similar",
            Page::Studio => "/studio",
            Page::Explore => "/explore",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Page::Search => "Search",
            Page::Similar => "Similar Songs",
            Page::Studio => "Lyric Studio",
            Page::Explore => "Explore",
        }
    }
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Wrap `body` in the full document with the nav bar.
pub fn layout(active: Page, body: &str) -> String {
    let nav: String = Page::ALL
        .iter()
        .map(|p| {
            let class = if *p == active { " class=\"active\"" } else { "" };
            format!(r#"<a href="{}"{}>{}</a>"#, p.href(), class, p.title())
        })
        .collect::<Vec<_>>()
        .join("\n            ");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} · Ly-Lyric</title>
    <style>
        * {{ box-sizing: border-box; }}
        body {{
            margin: 0;
            font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
            background-color: #1a1a1a;
            color: #e0e0e0;
            line-height: 1.6;
        }}
        header {{
            background-color: #2a2a2a;
            border-bottom: 1px solid #3a3a3a;
            padding: 16px 24px;
            display: flex;
            align-items: center;
            gap: 32px;
        }}
        header h1 {{ margin: 0; font-size: 24px; color: #4a9eff; }}
        nav a {{ color: #aaa; margin-right: 18px; text-decoration: none; }}
        nav a.active {{ color: #fff; border-bottom: 2px solid #4a9eff; }}
        main {{ max-width: 920px; margin: 0 auto; padding: 24px; }}
        section {{
            background-color: #242424;
            border: 1px solid #3a3a3a;
            border-radius: 6px;
            padding: 16px 20px;
            margin-bottom: 20px;
        }}
        h2 {{ margin-top: 0; font-size: 19px; }}
        input[type=text], textarea {{
            width: 100%;
            padding: 8px;
            background: #111;
            color: #e0e0e0;
            border: 1px solid #444;
            border-radius: 4px;
            font: inherit;
        }}
        button {{
            margin-top: 8px;
            padding: 7px 16px;
            background: #4a9eff;
            color: #fff;
            border: 0;
            border-radius: 4px;
            cursor: pointer;
        }}
        pre {{ white-space: pre-wrap; font-family: inherit; margin: 0; }}
        .meta {{ color: #888; font-size: 14px; }}
        .panel-error {{ border-color: #b33; background: #3a1f1f; }}
        .panel-notice {{ border-color: #a80; background: #332b14; }}
        ul.songs {{ padding-left: 18px; }}
    </style>
</head>
<body>
    <header>
        <h1>Ly-Lyric</h1>
        <nav>
            {nav}
        </nav>
    </header>
    <main>
{body}
    </main>
</body>
</html>
"#,
        title = active.title(),
        nav = nav,
        body = body,
    )
}

pub fn error_panel(message: &str) -> String {
    format!(
        r#"<section class="panel-error" role="alert"><strong>Something went wrong.</strong> {}</section>"#,
        escape_html(message)
    )
}

pub fn notice_panel(message: &str) -> String {
    format!(
        r#"<section class="panel-notice">{}</section>"#,
        escape_html(message)
    )
}

/// Shown by actions that need a matched song when the session has none.
pub fn search_first_panel() -> String {
    r#"<section class="panel-notice">Search for a song first: <a href="/">find lyrics</a>, then come back here.</section>"#
        .to_string()
}

/// Message for a failed action. Input problems are shown as-is; backend
/// failures say which service failed.
pub fn failure_message(err: &Error) -> String {
    match err {
        Error::InvalidInput(msg) | Error::NotFound(msg) => msg.clone(),
        Error::Config(msg) => format!("This feature is not configured: {}", msg),
        Error::Warehouse(_) | Error::Database(_) => {
            format!("The lyrics database could not be queried. {}", err)
        }
        Error::Search(_) => format!("The similarity search failed. {}", err),
        Error::Completion(_) => format!("Text generation failed. {}", err),
        _ => err.to_string(),
    }
}

/// Full card for the matched song.
pub fn song_card(song: &SongRecord) -> String {
    format!(
        r#"<section class="song">
    <h2>{title}</h2>
    <div class="meta">{artist} · {album}</div>
    <pre class="lyrics">{lyrics}</pre>
</section>"#,
        title = escape_html(&song.song_title),
        artist = escape_html(&song.artist),
        album = escape_html(&song.album),
        lyrics = escape_html(&song.lyrics),
    )
}

/// Compact list of songs with a lyrics excerpt each.
pub fn song_list(songs: &[SongRecord]) -> String {
    if songs.is_empty() {
        return r#"<p class="meta">No songs found.</p>"#.to_string();
    }
    let items: String = songs
        .iter()
        .map(|s| {
            format!(
                "<li><strong>{}</strong> <span class=\"meta\">{} · {}</span><br><span class=\"meta\">{}</span></li>\n",
                escape_html(&s.song_title),
                escape_html(&s.artist),
                escape_html(&s.album),
                escape_html(&s.excerpt(160)),
            )
        })
        .collect();
    format!("<ul class=\"songs\">\n{}</ul>", items)
}

/// Generated text under a heading.
pub fn output_panel(heading: &str, text: &str) -> String {
    format!(
        "<section class=\"output\"><h2>{}</h2><pre>{}</pre></section>",
        escape_html(heading),
        escape_html(text)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x & 'y'")</script>"#),
            "&lt;script&gt;alert(&quot;x &amp; &#39;y&#39;&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_layout_marks_active_page() {
        let page = layout(Page::Studio, "<p>hi</p>");
        assert!(page.contains(r#"<a href="/studio" class="active">Lyric Studio</a>"#));
        assert!(page.contains(r#"<a href="/">Search</a>"#));
        assert!(page.contains("<p>hi</p>"));
    }

    #[test]
    fn test_song_card_escapes_fields() {
        let song = SongRecord::new("AC/DC", "<b>Live</b>", "T.N.T.", "Oi! Oi! & more");
        let card = song_card(&song);
        assert!(card.contains("&lt;b&gt;Live&lt;/b&gt;"));
        assert!(card.contains("Oi! Oi! &amp; more"));
    }

    #[test]
    fn test_failure_message() {
        let msg = failure_message(&Error::InvalidInput("Please enter some text first.".into()));
        assert_eq!(msg, "Please enter some text first.");

        let msg = failure_message(&Error::Completion("429 Too Many Requests".into()));
        assert!(msg.starts_with("Text generation failed."));
        assert!(msg.contains("429"));
    }

    #[test]
    fn test_empty_song_list() {
        assert!(song_list(&[]).contains("No songs found."));
    }
}
