//! Field extraction from fetched documents
//!
//! This module holds the selector table for the AutoRia markup and the pure
//! derivation functions that turn a parsed document into typed field values.
//! Every function is synchronous: documents are parsed and fully drained
//! before the caller reaches its next suspension point.
//!
//! Required fields missing from a detail page fail that page's extraction;
//! VIN and plate number are legitimately optional and come back as `None`.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use thiserror::Error;

/// URL segment marking new-car listings, which never carry the used-car fields
pub const EXCLUDED_SEGMENT: &str = "/newauto/";

// Selector table. All selectors are compile-time constants, so the parse
// cannot fail at runtime.
static PAGINATION_CONTAINER: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div#pagination").unwrap());
static PAGINATION_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("span.dhide").unwrap());
static LISTING_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a.m-link-ticket").unwrap());
static UNAVAILABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("div.notice_head").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("h1.head").unwrap());
static PRICE_CONTAINER: Lazy<Selector> = Lazy::new(|| Selector::parse("div.price_value").unwrap());
static PRICE: Lazy<Selector> = Lazy::new(|| Selector::parse("strong").unwrap());
static ODOMETER: Lazy<Selector> = Lazy::new(|| Selector::parse("div.base-information").unwrap());
static SELLER_NAME: Lazy<Selector> = Lazy::new(|| Selector::parse(".seller_info_name").unwrap());
static PLATE_NUMBER: Lazy<Selector> = Lazy::new(|| Selector::parse("span.state-num").unwrap());
static VIN_CHECKED: Lazy<Selector> = Lazy::new(|| Selector::parse("span.label-vin").unwrap());
static VIN_UNCHECKED: Lazy<Selector> = Lazy::new(|| Selector::parse("span.vin-code").unwrap());
static PRIMARY_IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"source[type="image/webp"]"#).unwrap());
static IMAGES_COUNT_CONTAINER: Lazy<Selector> = Lazy::new(|| Selector::parse("span.count").unwrap());
static IMAGES_COUNT: Lazy<Selector> = Lazy::new(|| Selector::parse("span.mhide").unwrap());
static PHONE_ACTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.popup-successful-call").unwrap());
static PHONE_AUTO: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

/// The owner id only appears in the raw markup, not on a queryable element
static OWNER_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r#"data-owner-id="(\d+)""#).unwrap());

/// Errors produced while deriving fields from a document
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("missing node: {0}")]
    MissingNode(&'static str),

    #[error("missing attribute `{attr}` on {field}")]
    MissingAttr {
        field: &'static str,
        attr: &'static str,
    },

    #[error("malformed {field} text: \"{text}\"")]
    Malformed { field: &'static str, text: String },
}

/// The three document-derived ids the phone lookup payload needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneQuery {
    pub auto_id: i64,
    pub phone_id: String,
    pub user_id: String,
}

/// Every field pulled from one detail page, before the phone lookup
#[derive(Debug, Clone)]
pub struct DetailFields {
    pub title: String,
    pub price_usd: i64,
    pub odometer_km: i64,
    pub seller_name: String,
    pub plate_number: Option<String>,
    pub vin: Option<String>,
    pub image_url: String,
    pub images_count: i64,
    pub phone_query: Option<PhoneQuery>,
}

/// Reads the total page count from the pagination widget
///
/// The widget text follows `"<current> / <total>"`, e.g. `"1 / 18 100"`:
/// take the substring after the last `/`, strip whitespace, parse as integer.
/// Any failure here is fatal to the listing stage; there is no sensible
/// fallback for an unknown page count.
pub fn pagination_total(document: &Html) -> Result<usize, ExtractError> {
    let container = document
        .select(&PAGINATION_CONTAINER)
        .next()
        .ok_or(ExtractError::MissingNode("pagination container"))?;
    let link = container
        .select(&PAGINATION_LINK)
        .next()
        .ok_or(ExtractError::MissingNode("pagination link"))?;

    parse_pagination_text(&text_of(link))
}

fn parse_pagination_text(text: &str) -> Result<usize, ExtractError> {
    let total: String = text
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    total.parse().map_err(|_| ExtractError::Malformed {
        field: "pagination",
        text: text.trim().to_string(),
    })
}

/// Collects the detail links of one listing page
///
/// Links carrying the new-car segment are dropped here, on write, so they
/// never reach the link pool regardless of source page.
pub fn listing_links(document: &Html) -> Vec<String> {
    document
        .select(&LISTING_LINK)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter(|href| !href.contains(EXCLUDED_SEGMENT))
        .map(str::to_string)
        .collect()
}

/// Checks the "not yet published" marker
///
/// Some detail pages are reachable but carry no data yet; they show a notice
/// instead and must be skipped without counting as a fetch failure.
pub fn is_unavailable(document: &Html) -> bool {
    document.select(&UNAVAILABLE).next().is_some()
}

/// Derives every detail-page field
///
/// `raw` is the unparsed markup of the same document; the owner id for the
/// phone lookup is only present there.
pub fn detail_fields(document: &Html, raw: &str) -> Result<DetailFields, ExtractError> {
    // the page repeats the heading; the last match is the car title
    let title = document
        .select(&TITLE)
        .last()
        .ok_or(ExtractError::MissingNode("title"))?;

    let price = document
        .select(&PRICE_CONTAINER)
        .next()
        .ok_or(ExtractError::MissingNode("price container"))?
        .select(&PRICE)
        .next()
        .ok_or(ExtractError::MissingNode("price"))?;

    let odometer = document
        .select(&ODOMETER)
        .next()
        .ok_or(ExtractError::MissingNode("odometer"))?;

    let seller = document
        .select(&SELLER_NAME)
        .next()
        .ok_or(ExtractError::MissingNode("seller name"))?;

    Ok(DetailFields {
        title: text_of(title),
        price_usd: parse_price(&text_of(price))?,
        odometer_km: parse_odometer(&text_of(odometer)),
        seller_name: text_of(seller),
        plate_number: document.select(&PLATE_NUMBER).next().map(direct_text),
        vin: vin(document),
        image_url: primary_image(document)?,
        images_count: images_count(document)?,
        phone_query: phone_query(document, raw),
    })
}

/// Price text ends with a currency token: `"12 345 $"`. Drop the token,
/// concatenate the remaining digit groups, parse as integer.
fn parse_price(text: &str) -> Result<i64, ExtractError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let digits = match tokens.split_last() {
        Some((_currency, groups)) if !groups.is_empty() => groups.concat(),
        _ => String::new(),
    };

    digits.parse().map_err(|_| ExtractError::Malformed {
        field: "price",
        text: text.trim().to_string(),
    })
}

/// Odometer text reports thousands of km: `"15 тис. км"` means 15000. Text
/// without a leading digit run means the odometer is unknown, reported as 0.
fn parse_odometer(text: &str) -> i64 {
    let digits: String = text
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();

    digits.parse().map(|thousands: i64| thousands * 1000).unwrap_or(0)
}

/// Prefers the checked VIN badge, falls back to the unchecked one
fn vin(document: &Html) -> Option<String> {
    document
        .select(&VIN_CHECKED)
        .next()
        .or_else(|| document.select(&VIN_UNCHECKED).next())
        .map(text_of)
}

/// The full-size gallery `<source>` is the second webp match on the page; a
/// lone match is used as-is
fn primary_image(document: &Html) -> Result<String, ExtractError> {
    let sources: Vec<ElementRef> = document.select(&PRIMARY_IMAGE).collect();
    let element = sources
        .get(1)
        .or_else(|| sources.first())
        .ok_or(ExtractError::MissingNode("primary image"))?;

    element
        .value()
        .attr("srcset")
        .map(str::to_string)
        .ok_or(ExtractError::MissingAttr {
            field: "primary image",
            attr: "srcset",
        })
}

/// The gallery counter reads like `"з 44"`; the last whitespace-delimited
/// token is the count
fn images_count(document: &Html) -> Result<i64, ExtractError> {
    let counter = document
        .select(&IMAGES_COUNT_CONTAINER)
        .next()
        .ok_or(ExtractError::MissingNode("image counter"))?
        .select(&IMAGES_COUNT)
        .next()
        .ok_or(ExtractError::MissingNode("image count"))?;

    let text = text_of(counter);
    match text.split_whitespace().last().and_then(|token| token.parse().ok()) {
        Some(count) => Ok(count),
        None => Err(ExtractError::Malformed {
            field: "image count",
            text,
        }),
    }
}

/// Pulls the three ids the phone lookup payload needs
///
/// Any missing piece (or a non-numeric auto id) disables the lookup for this
/// car; the record itself is still assembled without a phone number.
fn phone_query(document: &Html, raw: &str) -> Option<PhoneQuery> {
    let auto_id = document
        .select(&PHONE_AUTO)
        .next()?
        .value()
        .attr("data-auto-id")?
        .trim()
        .parse()
        .ok()?;

    let phone_id = document
        .select(&PHONE_ACTION)
        .next()?
        .value()
        .attr("data-value-id")?
        .to_string();

    let user_id = OWNER_ID.captures(raw)?.get(1)?.as_str().to_string();

    Some(PhoneQuery {
        auto_id,
        phone_id,
        user_id,
    })
}

/// Extracts the phone number from the lookup response
///
/// Digits live at `additionalParams.phoneStr`, formatted like
/// `"(067) 123 4567"`; formatting is stripped and the national prefix
/// prepended. A missing key yields absence, not an error.
pub fn phone_from_response(response: &Value) -> Option<String> {
    let raw = response.get("additionalParams")?.get("phoneStr")?.as_str()?;
    let digits: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '(' | ')'))
        .collect();

    Some(format!("38{}", digits))
}

/// Whole-subtree text, trimmed
fn text_of(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Concatenates only the element's direct text fragments, ignoring text
/// inside nested tags, then trims
fn direct_text(element: ElementRef) -> String {
    element
        .children()
        .filter_map(|child| child.value().as_text().map(|text| &**text))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detail_html() -> String {
        r#"<html>
        <body data-auto-id="38330999">
            <div id="gallery">
                <source type="image/webp" srcset="https://cdn.example/thumb.webp">
                <source type="image/webp" srcset="https://cdn.example/full.webp">
                <span class="count"><span class="mhide">з 44</span></span>
            </div>
            <h1 class="head">Used cars</h1>
            <h1 class="head">BMW X5 2014</h1>
            <div class="price_value"><strong>12 345 $</strong><span>463 000 грн</span></div>
            <div class="base-information"><span>125 тис. км</span></div>
            <div class="seller_info_name">Іван Петренко</div>
            <span class="state-num">AA 1234 BB <span class="help">state number</span></span>
            <span class="label-vin">WBAFG810X0L000000</span>
            <a class="popup-successful-call" data-value-id="682365827">show phone</a>
            <script>var owner = {"data-owner-id":"x"};</script>
            <div data-owner-id="4745906"></div>
        </body>
        </html>"#
            .to_string()
    }

    #[test]
    fn test_pagination_total() {
        let html = r#"<div id="pagination"><span class="dhide">1 / 18 100</span></div>"#;
        let document = Html::parse_document(html);
        assert_eq!(pagination_total(&document).unwrap(), 18100);
    }

    #[test]
    fn test_pagination_total_small() {
        let html = r#"<div id="pagination"><span class="dhide">1 / 3</span></div>"#;
        let document = Html::parse_document(html);
        assert_eq!(pagination_total(&document).unwrap(), 3);
    }

    #[test]
    fn test_pagination_widget_missing_is_error() {
        let document = Html::parse_document("<html><body></body></html>");
        assert!(matches!(
            pagination_total(&document),
            Err(ExtractError::MissingNode(_))
        ));
    }

    #[test]
    fn test_pagination_garbage_is_error() {
        let html = r#"<div id="pagination"><span class="dhide">next page</span></div>"#;
        let document = Html::parse_document(html);
        assert!(matches!(
            pagination_total(&document),
            Err(ExtractError::Malformed { .. })
        ));
    }

    #[test]
    fn test_listing_links_drop_excluded_segment() {
        let html = r#"
            <a class="m-link-ticket" href="https://auto.ria.com/uk/auto_bmw_1.html">one</a>
            <a class="m-link-ticket" href="https://auto.ria.com/newauto/auto_bmw_2.html">two</a>
            <a class="m-link-ticket" href="https://auto.ria.com/uk/auto_bmw_3.html">three</a>
            <a class="other" href="https://auto.ria.com/uk/auto_bmw_4.html">four</a>
        "#;
        let document = Html::parse_document(html);
        assert_eq!(
            listing_links(&document),
            vec![
                "https://auto.ria.com/uk/auto_bmw_1.html".to_string(),
                "https://auto.ria.com/uk/auto_bmw_3.html".to_string(),
            ]
        );
    }

    #[test]
    fn test_price_drops_currency_and_separators() {
        assert_eq!(parse_price("12 345 $").unwrap(), 12345);
        assert_eq!(parse_price("1 000 000 $").unwrap(), 1000000);
        assert_eq!(parse_price("750 $").unwrap(), 750);
    }

    #[test]
    fn test_price_without_digits_is_error() {
        assert!(matches!(
            parse_price("договірна"),
            Err(ExtractError::Malformed { .. })
        ));
    }

    #[test]
    fn test_odometer_thousands() {
        assert_eq!(parse_odometer("15 тис. км"), 15000);
        assert_eq!(parse_odometer("125 тис. км"), 125000);
    }

    #[test]
    fn test_odometer_without_digits_is_zero() {
        assert_eq!(parse_odometer("без пробігу"), 0);
        assert_eq!(parse_odometer(""), 0);
    }

    #[test]
    fn test_vin_prefers_checked() {
        let html = r#"
            <span class="label-vin">CHECKEDVIN123</span>
            <span class="vin-code">UNCHECKEDVIN456</span>
        "#;
        let document = Html::parse_document(html);
        assert_eq!(vin(&document), Some("CHECKEDVIN123".to_string()));
    }

    #[test]
    fn test_vin_falls_back_to_unchecked() {
        let html = r#"<span class="vin-code">UNCHECKEDVIN456</span>"#;
        let document = Html::parse_document(html);
        assert_eq!(vin(&document), Some("UNCHECKEDVIN456".to_string()));
    }

    #[test]
    fn test_vin_absent() {
        let document = Html::parse_document("<html><body></body></html>");
        assert_eq!(vin(&document), None);
    }

    #[test]
    fn test_plate_ignores_nested_tag_text() {
        let html =
            r#"<span class="state-num">AA 1234 BB <span class="help">state number</span></span>"#;
        let document = Html::parse_document(html);
        let plate = document.select(&PLATE_NUMBER).next().map(direct_text);
        assert_eq!(plate, Some("AA 1234 BB".to_string()));
    }

    #[test]
    fn test_unavailable_marker() {
        let marked = Html::parse_document(r#"<div class="notice_head">not published yet</div>"#);
        assert!(is_unavailable(&marked));

        let clean = Html::parse_document("<html><body></body></html>");
        assert!(!is_unavailable(&clean));
    }

    #[test]
    fn test_phone_from_response() {
        let response = json!({"additionalParams": {"phoneStr": "(067) 123 4567"}});
        assert_eq!(
            phone_from_response(&response),
            Some("380671234567".to_string())
        );
    }

    #[test]
    fn test_phone_from_response_missing_key() {
        assert_eq!(phone_from_response(&json!({"status": "ok"})), None);
        assert_eq!(phone_from_response(&json!({"additionalParams": {}})), None);
    }

    #[test]
    fn test_detail_fields_complete_page() {
        let raw = detail_html();
        let document = Html::parse_document(&raw);
        let fields = detail_fields(&document, &raw).unwrap();

        assert_eq!(fields.title, "BMW X5 2014");
        assert_eq!(fields.price_usd, 12345);
        assert_eq!(fields.odometer_km, 125000);
        assert_eq!(fields.seller_name, "Іван Петренко");
        assert_eq!(fields.plate_number, Some("AA 1234 BB".to_string()));
        assert_eq!(fields.vin, Some("WBAFG810X0L000000".to_string()));
        assert_eq!(fields.image_url, "https://cdn.example/full.webp");
        assert_eq!(fields.images_count, 44);
        assert_eq!(
            fields.phone_query,
            Some(PhoneQuery {
                auto_id: 38330999,
                phone_id: "682365827".to_string(),
                user_id: "4745906".to_string(),
            })
        );
    }

    #[test]
    fn test_detail_fields_missing_required_node() {
        let html = r#"<html><body><h1 class="head">BMW</h1></body></html>"#;
        let document = Html::parse_document(html);
        assert!(matches!(
            detail_fields(&document, html),
            Err(ExtractError::MissingNode(_))
        ));
    }

    #[test]
    fn test_phone_query_missing_piece_is_none() {
        // no popup-successful-call anchor
        let html = r#"<html><body data-auto-id="1"><div data-owner-id="2"></div></body></html>"#;
        let document = Html::parse_document(html);
        assert_eq!(phone_query(&document, html), None);
    }

    #[test]
    fn test_phone_query_non_numeric_auto_id_is_none() {
        let html = r#"<html><body data-auto-id="abc">
            <a class="popup-successful-call" data-value-id="5"></a>
            <div data-owner-id="2"></div>
        </body></html>"#;
        let document = Html::parse_document(html);
        assert_eq!(phone_query(&document, html), None);
    }
}
