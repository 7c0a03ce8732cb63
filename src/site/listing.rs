// src/site/listing.rs
use once_cell::sync::Lazy;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

// --- CSS Selectors (Lazy Static) ---
static CARD_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".af20-news").expect("Failed to compile CARD_SELECTOR")
});

static TITLE_LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("h2 a").expect("Failed to compile TITLE_LINK_SELECTOR")
});

static COMPANY_LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("cite a").expect("Failed to compile COMPANY_LINK_SELECTOR")
});

// The class sits on the anchor in some theme versions and on its <li> in others.
static NEXT_LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a.wpv-archive-pagination-links-next-link[href], .wpv-archive-pagination-links-next-link a[href]")
        .expect("Failed to compile NEXT_LINK_SELECTOR")
});

/// One document card on a listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingCard {
    pub title: String,
    pub document_url: String,
    pub company_url: Option<String>,
    pub page_number: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub cards: Vec<ListingCard>,
    pub next_url: Option<String>,
}

/// Parses a listing page: its document cards plus the link to the next page.
/// Relative links are resolved against `page_url`.
pub fn parse_listing(html: &str, page_url: &Url, page_number: u32) -> ListingPage {
    let document = Html::parse_document(html);

    let mut cards = Vec::new();
    for (idx, card) in document.select(&CARD_SELECTOR).enumerate() {
        match parse_card(card, page_url, page_number) {
            Some(parsed) => cards.push(parsed),
            None => {
                tracing::warn!("Skipped card {} on page {}: no title link", idx + 1, page_number)
            }
        }
    }

    let next_url = document
        .select(&NEXT_LINK_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| absolutize(page_url, href));

    tracing::debug!("Page {}: {} cards, next = {:?}", page_number, cards.len(), next_url);
    ListingPage { cards, next_url }
}

fn parse_card(card: ElementRef, page_url: &Url, page_number: u32) -> Option<ListingCard> {
    let title_link = card.select(&TITLE_LINK_SELECTOR).next()?;
    let title = collapse_whitespace(&title_link.text().collect::<String>());
    let document_url = title_link
        .value()
        .attr("href")
        .and_then(|href| absolutize(page_url, href))?;
    if title.is_empty() {
        return None;
    }

    let company_url = card
        .select(&COMPANY_LINK_SELECTOR)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| absolutize(page_url, href));

    Some(ListingCard { title, document_url, company_url, page_number })
}

fn absolutize(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    base.join(href).ok().map(String::from)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <div class="wpv-loop">
          <div class="af20-news">
            <h2><a href="/document/acme-annual-report-2024/">ACME  Annual
                Report 2024</a></h2>
            <cite><a href="https://africanfinancials.com/company/ke-acme/">ACME Ltd</a></cite>
          </div>
          <div class="af20-news">
            <h2><a href="https://africanfinancials.com/document/beta-q3/">Beta Q3 Results</a></h2>
          </div>
          <div class="af20-news"><p>Sponsored</p></div>
        </div>
        <ul class="pagination">
          <li class="wpv-archive-pagination-links-next"><a class="wpv-archive-pagination-links-next-link page-link" href="?wpv_view_count=1&wpv_paged=3">Next</a></li>
        </ul>"#;

    fn page_url() -> Url {
        Url::parse("https://africanfinancials.com/kenya-listed-company-documents/?wpv_paged=2").unwrap()
    }

    #[test]
    fn parses_cards_with_absolute_links() {
        let page = parse_listing(LISTING, &page_url(), 2);

        assert_eq!(page.cards.len(), 2);
        assert_eq!(
            page.cards[0],
            ListingCard {
                title: "ACME Annual Report 2024".to_string(),
                document_url: "https://africanfinancials.com/document/acme-annual-report-2024/".to_string(),
                company_url: Some("https://africanfinancials.com/company/ke-acme/".to_string()),
                page_number: 2,
            }
        );
        assert_eq!(page.cards[1].company_url, None);
    }

    #[test]
    fn finds_the_next_page_link() {
        let page = parse_listing(LISTING, &page_url(), 2);
        assert_eq!(
            page.next_url.as_deref(),
            Some("https://africanfinancials.com/kenya-listed-company-documents/?wpv_view_count=1&wpv_paged=3")
        );
    }

    #[test]
    fn last_page_has_no_next_link() {
        let html = r#"<div class="af20-news"><h2><a href="/d/1">Only</a></h2></div>"#;
        let page = parse_listing(html, &page_url(), 7);
        assert_eq!(page.cards.len(), 1);
        assert!(page.next_url.is_none());
    }
}
