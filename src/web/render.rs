//! HTML for the dashboard pages. Plain string building; every piece of
//! user- or feed-provided text goes through [`escape`] unless it is a
//! report, which is rendered from Markdown with raw HTML disabled.

use std::fmt::Write as _;
use chrono::NaiveDate;
use pulldown_cmark::{html, Event, Options, Parser, Tag};

use crate::storage::{FeedList, NewsArchive, VisitorStats};
use crate::web::session::Flash;

const STYLE: &str = r#"
body { margin: 0; font-family: system-ui, sans-serif; color: #1f2328; display: flex; min-height: 100vh; }
nav { width: 240px; background: #f6f8fa; padding: 1.5rem 1rem; border-right: 1px solid #d0d7de; }
nav a { display: block; padding: .4rem .6rem; border-radius: 6px; color: inherit; text-decoration: none; }
nav a.active { background: #ddf4ff; font-weight: 600; }
nav .caption { margin-top: 2rem; font-size: .8rem; color: #656d76; }
main { flex: 1; padding: 1.5rem 2.5rem; max-width: 960px; }
.flash { padding: .6rem 1rem; border-radius: 6px; margin-bottom: .8rem; }
.flash.success { background: #dafbe1; } .flash.info { background: #ddf4ff; }
.flash.warning { background: #fff8c5; } .flash.error { background: #ffebe9; }
.tabs a { margin-right: 1rem; } .tabs a.active { font-weight: 600; }
table { border-collapse: collapse; } td, th { padding: .3rem .8rem; border-bottom: 1px solid #d0d7de; text-align: left; }
.metric { font-size: 2rem; font-weight: 600; }
ol.log li { font-family: ui-monospace, monospace; }
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Newsroom,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminTab {
    Analysis,
    Feeds,
    Stats,
}

impl AdminTab {
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("feeds") => AdminTab::Feeds,
            Some("stats") => AdminTab::Stats,
            _ => AdminTab::Analysis,
        }
    }

    fn slug(self) -> &'static str {
        match self {
            AdminTab::Analysis => "analysis",
            AdminTab::Feeds => "feeds",
            AdminTab::Stats => "stats",
        }
    }

    fn label(self) -> &'static str {
        match self {
            AdminTab::Analysis => "Run Analysis",
            AdminTab::Feeds => "Manage Feeds",
            AdminTab::Stats => "Statistics",
        }
    }
}

/// What every page shows besides its body.
#[derive(Debug, Clone)]
pub struct Chrome<'a> {
    pub view: View,
    pub model_name: &'a str,
    pub authenticated: bool,
    pub flashes: Vec<Flash>,
    pub notices: Vec<String>,
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Render a report. Raw HTML in the Markdown is shown as text.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) => Event::Text(raw),
        Event::Start(Tag::Link(kind, dest, title)) if !is_safe_destination(&dest) => {
            Event::Start(Tag::Link(kind, "#".into(), title))
        }
        Event::Start(Tag::Image(kind, dest, title)) if !is_safe_destination(&dest) => {
            Event::Start(Tag::Image(kind, "#".into(), title))
        }
        other => other,
    });

    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

/// Relative links and fragments pass, as do http, https and mailto.
/// Browsers ignore embedded tabs and newlines in a scheme, so those are
/// dropped before it is compared.
fn is_safe_destination(dest: &str) -> bool {
    let cleaned: String = dest.chars().filter(|c| !c.is_ascii_whitespace() && !c.is_control()).collect();
    match cleaned.find(|c| matches!(c, ':' | '/' | '?' | '#')) {
        Some(i) if cleaned[i..].starts_with(':') => {
            let scheme = cleaned[..i].to_ascii_lowercase();
            matches!(scheme.as_str(), "http" | "https" | "mailto")
        }
        _ => true,
    }
}

pub fn layout(title: &str, chrome: Chrome<'_>, body: &str) -> String {
    let nav_class = |view: View| if chrome.view == view { "active" } else { "" };

    let mut banners = String::new();
    for notice in &chrome.notices {
        let _ = write!(banners, r#"<div class="flash warning">{}</div>"#, escape(notice));
    }
    for flash in &chrome.flashes {
        let _ = write!(
            banners,
            r#"<div class="flash {}">{}</div>"#,
            flash.level.css_class(),
            escape(&flash.text)
        );
    }

    let session_link = if chrome.authenticated {
        r#"<form method="post" action="/admin/logout"><button type="submit">Log out</button></form>"#
    } else {
        ""
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>{title} · AI IT Newsroom</title><style>{style}</style></head>
<body>
<nav>
<h2>AI IT Newsroom</h2>
<a class="{newsroom}" href="/">Newsroom</a>
<a class="{admin}" href="/admin">Admin Dashboard</a>
{session_link}
<p class="caption">Powered by {model}</p>
</nav>
<main>
{banners}
{body}
</main>
</body>
</html>"#,
        title = escape(title),
        style = STYLE,
        newsroom = nav_class(View::Newsroom),
        admin = nav_class(View::Admin),
        session_link = session_link,
        model = escape(chrome.model_name),
        banners = banners,
        body = body,
    )
}

pub fn newsroom_body(archive: &NewsArchive, selected: Option<&str>) -> String {
    let mut body = String::from("<h1>Daily IT News Report</h1>");

    if archive.is_empty() {
        body.push_str(
            r#"<div class="flash info">No news report has been generated yet. Run an analysis from the admin dashboard.</div>"#,
        );
        return body;
    }

    let dates = archive.dates_desc();
    let current = selected
        .filter(|d| archive.get(d).is_some())
        .or_else(|| dates.first().copied());

    body.push_str(r#"<form method="get" action="/newsroom"><label>Date <select name="date" onchange="this.form.submit()">"#);
    for date in &dates {
        let chosen = if Some(*date) == current { " selected" } else { "" };
        let _ = write!(body, r#"<option value="{0}"{1}>{0}</option>"#, escape(date), chosen);
    }
    body.push_str(r#"</select></label> <noscript><button type="submit">Show</button></noscript></form><hr>"#);

    match current.and_then(|d| archive.get(d)) {
        Some(report) => body.push_str(&markdown_to_html(report)),
        None => body.push_str(r#"<div class="flash warning">No report available for selection.</div>"#),
    }
    body
}

pub fn login_body() -> String {
    r#"<h1>Admin Dashboard</h1>
<p>Please verify your password.</p>
<form method="post" action="/admin/login">
<label>Admin Password <input type="password" name="password" autofocus></label>
<button type="submit">Log in</button>
</form>"#
        .to_string()
}

pub fn admin_body(tab: AdminTab, content: &str) -> String {
    let mut body = String::from(r#"<h1>Admin Dashboard</h1><p class="tabs">"#);
    for t in [AdminTab::Analysis, AdminTab::Feeds, AdminTab::Stats] {
        let class = if t == tab { "active" } else { "" };
        let _ = write!(body, r#"<a class="{}" href="/admin?tab={}">{}</a>"#, class, t.slug(), t.label());
    }
    body.push_str("</p><hr>");
    body.push_str(content);
    body
}

pub fn analysis_tab(window_days: u32, last_run: Option<&[String]>) -> String {
    let mut out = format!(
        r#"<h2>Generate New Report</h2>
<p>Collects the latest RSS feeds from the last {} days and summarizes them with AI.</p>
<form method="post" action="/admin/analysis"><button type="submit">Start Analysis</button></form>"#,
        window_days
    );

    if let Some(steps) = last_run {
        out.push_str(r#"<h3>Last run</h3><ol class="log">"#);
        for step in steps {
            let _ = write!(out, "<li>{}</li>", escape(step));
        }
        out.push_str("</ol>");
    }
    out
}

pub fn feeds_tab(feeds: &FeedList) -> String {
    let mut out = String::from("<h2>RSS Feed List</h2>");

    if feeds.is_empty() {
        out.push_str(r#"<div class="flash info">No feeds added.</div>"#);
    } else {
        out.push_str("<table>");
        for (i, url) in feeds.urls().iter().enumerate() {
            let _ = write!(
                out,
                r#"<tr><td>{url}</td><td><form method="post" action="/admin/feeds/remove"><input type="hidden" name="index" value="{i}"><input type="hidden" name="url" value="{url}"><button type="submit">Remove</button></form></td></tr>"#,
                url = escape(url),
                i = i
            );
        }
        out.push_str("</table>");
    }

    out.push_str(
        r#"<hr><form method="post" action="/admin/feeds/add">
<label>Add New RSS URL <input type="url" name="url" size="60"></label>
<button type="submit">Add Feed</button>
</form>"#,
    );
    out
}

pub fn stats_tab(stats: &VisitorStats) -> String {
    let mut out = format!(
        r#"<h2>Visitor Statistics</h2><p>Total Views</p><p class="metric">{}</p>"#,
        stats.total_views
    );

    let series = stats.daily_series();
    if series.is_empty() {
        out.push_str(r#"<div class="flash info">Not enough data for chart.</div>"#);
        return out;
    }

    out.push_str(&visitor_chart(&series));
    out.push_str("<table><tr><th>Date</th><th>Visitors</th></tr>");
    for (date, count) in &series {
        let _ = write!(out, "<tr><td>{}</td><td>{}</td></tr>", date, count);
    }
    out.push_str("</table>");
    out
}

/// Line chart of daily visitors as inline SVG. `series` is expected in
/// ascending date order.
pub fn visitor_chart(series: &[(NaiveDate, u64)]) -> String {
    const WIDTH: f64 = 640.0;
    const HEIGHT: f64 = 240.0;
    const PAD: f64 = 30.0;

    let max = series.iter().map(|(_, v)| *v).max().unwrap_or(0).max(1) as f64;
    let step = if series.len() > 1 {
        (WIDTH - 2.0 * PAD) / (series.len() - 1) as f64
    } else {
        0.0
    };

    let points: Vec<(f64, f64)> = series
        .iter()
        .enumerate()
        .map(|(i, (_, v))| {
            let x = PAD + step * i as f64;
            let y = HEIGHT - PAD - (*v as f64 / max) * (HEIGHT - 2.0 * PAD);
            (x, y)
        })
        .collect();

    let polyline = points
        .iter()
        .map(|(x, y)| format!("{:.1},{:.1}", x, y))
        .collect::<Vec<_>>()
        .join(" ");

    let mut svg = format!(
        r##"<svg class="chart" xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">
<line x1="{p}" y1="{b}" x2="{r}" y2="{b}" stroke="#d0d7de"/>
<text x="4" y="{p}" font-size="11">{max}</text>
<polyline fill="none" stroke="#0969da" stroke-width="2" points="{points}"/>"##,
        w = WIDTH,
        h = HEIGHT,
        p = PAD,
        b = HEIGHT - PAD,
        r = WIDTH - PAD,
        max = max as u64,
        points = polyline,
    );

    for ((x, y), (date, count)) in points.iter().zip(series) {
        let _ = write!(
            svg,
            r##"<circle cx="{:.1}" cy="{:.1}" r="3" fill="#0969da"><title>{}: {}</title></circle>"##,
            x, y, date, count
        );
    }
    if let (Some((first, _)), Some((last, _))) = (series.first(), series.last()) {
        let _ = write!(
            svg,
            r#"<text x="{p}" y="{h}" font-size="11">{first}</text><text x="{r}" y="{h}" font-size="11" text-anchor="end">{last}</text>"#,
            p = PAD,
            r = WIDTH - PAD,
            h = HEIGHT - 8.0,
            first = first,
            last = last,
        );
    }
    svg.push_str("</svg>");
    svg
}
