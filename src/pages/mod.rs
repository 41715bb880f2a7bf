use serde::{Deserialize, Serialize};

pub mod content;
pub mod handler;

use content::{LocalizedPage, PageContent, Section, PAGES};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    De,
    En,
}

impl Lang {
    pub fn code(self) -> &'static str {
        match self {
            Lang::De => "de",
            Lang::En => "en",
        }
    }

    /// Pick the best supported language from an `Accept-Language` header.
    pub fn from_accept_language(header: &str) -> Option<Lang> {
        let mut best: Option<(Lang, f32)> = None;

        for entry in header.split(',') {
            let mut parts = entry.trim().split(';');
            let tag = parts.next().unwrap_or("").trim().to_ascii_lowercase();
            let quality = parts
                .find_map(|p| p.trim().strip_prefix("q="))
                .and_then(|q| q.parse::<f32>().ok())
                .unwrap_or(1.0);

            let lang = match tag.split('-').next() {
                Some("de") => Lang::De,
                Some("en") => Lang::En,
                _ => continue,
            };

            if quality > 0.0 && best.map_or(true, |(_, q)| quality > q) {
                best = Some((lang, quality));
            }
        }

        best.map(|(lang, _)| lang)
    }
}

pub fn find_page(slug: &str) -> Option<&'static PageContent> {
    PAGES.iter().find(|p| p.slug == slug)
}

impl PageContent {
    pub fn localized(&self, lang: Lang) -> &LocalizedPage {
        match lang {
            Lang::De => &self.de,
            Lang::En => &self.en,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub slug: &'static str,
    pub lang: Lang,
    pub title: &'static str,
    pub sections: &'static [Section],
}

#[derive(Debug, Serialize)]
pub struct PageSummary {
    pub slug: &'static str,
    pub title: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct LangQuery {
    pub lang: Option<Lang>,
}

pub fn page_response(page: &'static PageContent, lang: Lang) -> PageResponse {
    let localized = page.localized(lang);
    PageResponse {
        slug: page.slug,
        lang,
        title: localized.title,
        sections: localized.sections,
    }
}

pub fn page_summaries(lang: Lang) -> Vec<PageSummary> {
    PAGES
        .iter()
        .map(|p| PageSummary {
            slug: p.slug,
            title: p.localized(lang).title,
        })
        .collect()
}

/// Render a page as a standalone HTML document.
pub fn render_html(page: &PageContent, lang: Lang) -> String {
    let localized = page.localized(lang);
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n");
    html.push_str(&format!("<html lang=\"{}\">\n<head>\n", lang.code()));
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str(&format!(
        "<title>{} - ThreadUp</title>\n</head>\n<body>\n<main>\n",
        escape_html(localized.title)
    ));
    html.push_str(&format!("<h1>{}</h1>\n", escape_html(localized.title)));

    for section in localized.sections {
        html.push_str("<section>\n");
        html.push_str(&format!("<h2>{}</h2>\n", escape_html(section.heading)));
        for paragraph in section.paragraphs {
            html.push_str(&format!("<p>{}</p>\n", escape_html(paragraph)));
        }
        html.push_str("</section>\n");
    }

    html.push_str("</main>\n</body>\n</html>\n");
    html
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
