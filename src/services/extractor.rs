// src/services/extractor.rs

//! Catalog page extraction.
//!
//! Turns a listing page into [`Media`] values. Each `div.card` is one item:
//! cards with an author line are books, everything else is an e-magazine.

use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{Availability, BookDetails, Media, MediaFormat};
use crate::utils::{parse_date, parse_selector};

/// Text on a magazine card when the issue can be lent right away.
pub const MAGAZINE_AVAILABLE_MARKER: &str = "Verfügbar";

/// Label preceding the date on a magazine card that is lent out.
pub const MAGAZINE_AVAILABLE_FROM_LABEL: &str = "Voraussichtlich verfügbar ab:";

struct CardSelectors {
    card: Selector,
    author: Selector,
    title: Selector,
    link: Selector,
    description: Selector,
    insert_date: Selector,
    audio_icon: Selector,
    book_availability: Selector,
    magazine_availability: Selector,
}

impl CardSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            card: parse_selector("div.card")?,
            author: parse_selector(r#"p[test-id="cardAuthor"]"#)?,
            title: parse_selector(r#"h3[test-id="cardTitle"]"#)?,
            link: parse_selector(r#"a[test-id="mediaInfoLink"]"#)?,
            description: parse_selector(r#"p[test-id="cardAbstract"]"#)?,
            insert_date: parse_selector(r#"small[test-id="cardInsertDate"] span"#)?,
            audio_icon: parse_selector(r#"svg[test-id="ic_eaudio"]"#)?,
            book_availability: parse_selector(r#"span[test-id="cardAvailability"]"#)?,
            magazine_availability: parse_selector(r#"[test-id="cardAvailability"]"#)?,
        })
    }
}

/// Extracts media entities from catalog listing pages.
pub struct CatalogExtractor {
    selectors: CardSelectors,
}

impl CatalogExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            selectors: CardSelectors::new()?,
        })
    }

    /// Extract every card of a listing page.
    ///
    /// Fails on the first card whose markup or dates cannot be parsed.
    pub fn extract(&self, html: &str, library: &str) -> Result<Vec<Media>> {
        let document = Html::parse_document(html);
        self.cards(&document, library).collect()
    }

    /// Lazily parse the cards of an already parsed document.
    pub fn cards<'a>(
        &'a self,
        document: &'a Html,
        library: &'a str,
    ) -> impl Iterator<Item = Result<Media>> + 'a {
        document
            .select(&self.selectors.card)
            .map(move |card| self.parse_card(card, library))
    }

    fn parse_card(&self, card: ElementRef<'_>, library: &str) -> Result<Media> {
        match card.select(&self.selectors.author).next() {
            Some(author) => self.parse_book(card, author, library),
            None => self.parse_magazine(card, library),
        }
    }

    fn parse_book(
        &self,
        card: ElementRef<'_>,
        author: ElementRef<'_>,
        library: &str,
    ) -> Result<Media> {
        let sel = &self.selectors;
        let author = element_text(author).replace('\u{a0}', " ");
        let title = self.required_text(card, &sel.title, "book title")?;
        let link = self.link(card)?;

        let description = card
            .select(&sel.description)
            .next()
            .map(|el| element_text(el).replace('\u{a0}', " "))
            .filter(|text| !text.is_empty());

        let insert_date_text = self.required_text(card, &sel.insert_date, "book insert date")?;
        let insert_date = parse_date(&insert_date_text, "book insert date")?;

        let format = if card.select(&sel.audio_icon).next().is_some() {
            MediaFormat::Audio
        } else {
            MediaFormat::Ebook
        };

        // A book card only shows an availability span while the item is lent out.
        let availability = match card.select(&sel.book_availability).next() {
            Some(el) => {
                Availability::from_date(parse_date(&element_text(el), "book availability")?)
            }
            None => Availability::now(),
        };

        log::debug!("Parsed book '{}' ({})", title, link);
        Media::book(
            link,
            title,
            format,
            library,
            availability,
            BookDetails::new(author, description, insert_date),
        )
    }

    fn parse_magazine(&self, card: ElementRef<'_>, library: &str) -> Result<Media> {
        let sel = &self.selectors;
        let title = self.required_text(card, &sel.title, "magazine title")?;
        let link = self.link(card)?;
        let availability_text =
            self.required_text(card, &sel.magazine_availability, "magazine availability")?;

        let availability = magazine_availability(&availability_text)?;

        log::debug!("Parsed magazine '{}' ({})", title, link);
        Media::magazine(link, title, library, availability)
    }

    fn link(&self, card: ElementRef<'_>) -> Result<String> {
        card.select(&self.selectors.link)
            .next()
            .and_then(|el| el.value().attr("href"))
            .map(str::to_string)
            .ok_or_else(|| AppError::parse("card link", "no mediaInfoLink href"))
    }

    fn required_text(
        &self,
        card: ElementRef<'_>,
        selector: &Selector,
        context: &str,
    ) -> Result<String> {
        card.select(selector)
            .next()
            .map(element_text)
            .ok_or_else(|| AppError::parse(context, "element missing from card"))
    }
}

/// Interpret the availability line of a magazine card.
///
/// Anything that is neither the "available" marker nor a labelled
/// `dd.mm.yyyy` date is a parse error.
pub fn magazine_availability(text: &str) -> Result<Availability> {
    if text.contains(MAGAZINE_AVAILABLE_MARKER) {
        return Ok(Availability::now());
    }
    let date_text = text
        .rsplit(MAGAZINE_AVAILABLE_FROM_LABEL)
        .next()
        .unwrap_or(text);
    let date = parse_date(date_text, "magazine availability")?;
    Ok(Availability::from_date(date))
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{Local, NaiveDate};

    use super::*;
    use crate::models::MediaKind;

    const FIXTURE: &str = include_str!("../../tests/fixtures/catalog.html");

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn find(media: &[Media], id: u64) -> &Media {
        media.iter().find(|m| m.id() == id).unwrap()
    }

    #[test]
    fn test_fixture_yields_every_card() {
        let extractor = CatalogExtractor::new().unwrap();
        let media = extractor.extract(FIXTURE, "berlin").unwrap();
        assert_eq!(media.len(), 4);
        assert!(media.iter().all(|m| m.library == "berlin"));
    }

    #[test]
    fn test_available_audiobook() {
        let extractor = CatalogExtractor::new().unwrap();
        let media = extractor.extract(FIXTURE, "berlin").unwrap();
        let book = find(&media, 1001);
        assert_eq!(book.format, MediaFormat::Audio);
        assert!(book.available);
        assert_eq!(book.availability_date, Local::now().date_naive());
        assert_eq!(book.title, "The Dragon's Call");

        let details = book.as_book().unwrap();
        assert_eq!(details.author(), "Jane Doe");
        assert_eq!(details.insert_date, date(2024, 3, 1));
        assert_eq!(details.description.as_deref(), Some("A story about dragons."));
    }

    #[test]
    fn test_lent_out_ebook_without_abstract() {
        let extractor = CatalogExtractor::new().unwrap();
        let media = extractor.extract(FIXTURE, "berlin").unwrap();
        let book = find(&media, 1002);
        assert_eq!(book.format, MediaFormat::Ebook);
        assert!(!book.available);
        assert_eq!(book.availability_date, date(2024, 4, 15));

        let details = book.as_book().unwrap();
        assert!(details.description.is_none());
        assert_eq!(details.author(), "Max Mustermann");
    }

    #[test]
    fn test_magazines() {
        let extractor = CatalogExtractor::new().unwrap();
        let media = extractor.extract(FIXTURE, "berlin").unwrap();

        let available = find(&media, 2001);
        assert!(matches!(available.kind, MediaKind::Magazine));
        assert_eq!(available.format, MediaFormat::Emagazine);
        assert!(available.available);

        let lent = find(&media, 2002);
        assert!(!lent.available);
        assert_eq!(lent.availability_date, date(2024, 5, 2));
    }

    #[test]
    fn test_magazine_with_unexpected_text_fails() {
        let html = r#"
            <div class="card">
              <h3 test-id="cardTitle">Weird Weekly</h3>
              <a test-id="mediaInfoLink" href="mediaInfo,0-0-3001-400-0.html">info</a>
              <div test-id="cardAvailability">Bald wieder da</div>
            </div>"#;
        let extractor = CatalogExtractor::new().unwrap();
        let err = extractor.extract(html, "berlin").unwrap_err();
        assert!(matches!(err, AppError::Parse { .. }));
    }

    #[test]
    fn test_magazine_availability_text() {
        assert!(magazine_availability("Verfügbar").unwrap().available);
        let lent = magazine_availability("Voraussichtlich verfügbar ab:\u{a0}02.05.2024").unwrap();
        assert!(!lent.available);
        assert_eq!(lent.date, date(2024, 5, 2));
        assert!(magazine_availability("").is_err());
    }

    #[test]
    fn test_empty_page() {
        let extractor = CatalogExtractor::new().unwrap();
        let media = extractor.extract("<html><body></body></html>", "berlin").unwrap();
        assert!(media.is_empty());
    }

    #[test]
    fn test_cards_are_lazy() {
        let extractor = CatalogExtractor::new().unwrap();
        let document = Html::parse_document(FIXTURE);
        let mut cards = extractor.cards(&document, "berlin");
        assert!(cards.next().unwrap().is_ok());
    }
}
