//! HTML extraction heuristics for question pages.
//!
//! Everything that depends on the target site's markup lives here so the
//! scraper loop only sees `Result<ScrapedPage, ExtractError>`.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};

const NOT_FOUND_TITLE: &str = "Page not found - Stack Overflow";
const TITLE_SUFFIX: &str = " - Stack Overflow";

static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("valid title selector"));
static POST_BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.s-prose.js-post-body").expect("valid post body selector"));
static ACCEPTED_ANSWER_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".accepted-answer .js-post-body").expect("valid accepted answer selector")
});
static ANSWER_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".answer .js-post-body").expect("valid answer selector"));

/// Title and first answer of a question page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedPage {
    pub title: String,
    pub answer_text: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no title found")]
    MissingTitle,

    #[error("page not found")]
    PageNotFound,

    #[error("not enough content (question/answer), found {found} post bodies")]
    NotEnoughContent { found: usize },
}

pub trait PageExtractor: Send + Sync {
    fn extract(&self, html: &str) -> Result<ScrapedPage, ExtractError>;
}

/// Reads Stack Overflow question pages.
///
/// The first post body is the question, the second is taken as the first answer.
/// That is a markup heuristic: it may pick up an edited question or a comment
/// block if the layout changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StackOverflowExtractor;

impl PageExtractor for StackOverflowExtractor {
    fn extract(&self, html: &str) -> Result<ScrapedPage, ExtractError> {
        let document = Html::parse_document(html);

        let title = document
            .select(&TITLE_SELECTOR)
            .next()
            .map(|el| el.text().collect::<String>())
            .ok_or(ExtractError::MissingTitle)?;

        if title.contains(NOT_FOUND_TITLE) {
            return Err(ExtractError::PageNotFound);
        }

        let bodies: Vec<_> = document.select(&POST_BODY_SELECTOR).collect();
        if bodies.len() < 2 {
            return Err(ExtractError::NotEnoughContent {
                found: bodies.len(),
            });
        }

        let answer_text = bodies[1].text().collect::<Vec<_>>().join("\n").trim().to_string();

        Ok(ScrapedPage {
            title: clean_title(&title),
            answer_text,
        })
    }
}

fn clean_title(title: &str) -> String {
    title.replace(TITLE_SUFFIX, "").trim().to_string()
}

/// HTML body of the accepted answer, or of the first answer when none is accepted.
pub fn extract_answer_body(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    document
        .select(&ACCEPTED_ANSWER_SELECTOR)
        .next()
        .or_else(|| document.select(&ANSWER_SELECTOR).next())
        .map(|el| el.inner_html().trim().to_string())
}
