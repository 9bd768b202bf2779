use cpick_core::{tag_from_url, FetchError, MovieDetail};
use regex::{Captures, Regex};
use std::sync::OnceLock;

const DIRECTORY_ROW_CLASS: &str = "criterion-channel__tr";
const ITEM_ID_CLASS: &str = "js-collection-item";
const TITLE_CLASS: &str = "collection-title";
const DURATION_CLASS: &str = "duration-container";

/// An opening tag located in a page.
struct OpenTag<'a> {
    name: &'a str,
    source: &'a str,
    start: usize,
    end: usize,
}

impl OpenTag<'_> {
    fn attr(&self, name: &str) -> Option<String> {
        attr_value(self.source, name)
    }

    fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|value| value.split_whitespace().any(|token| token == class))
            .unwrap_or(false)
    }
}

fn open_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<([a-zA-Z][a-zA-Z0-9]*)\b[^>]*>").expect("valid regex"))
}

fn open_tags(html: &str) -> impl Iterator<Item = OpenTag<'_>> {
    open_tag_regex().captures_iter(html).filter_map(|caps| {
        let whole = caps.get(0)?;
        let name = caps.get(1)?;
        Some(OpenTag {
            name: name.as_str(),
            source: whole.as_str(),
            start: whole.start(),
            end: whole.end(),
        })
    })
}

fn any_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9]*)\b[^>]*>").expect("valid regex"))
}

/// Offset where the element opened by `tag` closes, counting nested elements of the
/// same name. An unclosed element runs to the end of `html`.
fn element_end(html: &str, tag: &OpenTag<'_>) -> usize {
    let mut depth = 0usize;
    for caps in any_tag_regex().captures_iter(&html[tag.end..]) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        if !name.as_str().eq_ignore_ascii_case(tag.name) {
            continue;
        }
        let closing = caps.get(1).map(|slash| !slash.as_str().is_empty()).unwrap_or(false);
        if closing {
            if depth == 0 {
                return tag.end + whole.start();
            }
            depth -= 1;
        } else if !whole.as_str().ends_with("/>") {
            depth += 1;
        }
    }
    html.len()
}

fn attr_value(tag_source: &str, name: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
            .expect("valid regex")
    });
    re.captures_iter(tag_source).find_map(|caps| {
        if !caps[1].eq_ignore_ascii_case(name) {
            return None;
        }
        caps.get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|value| decode_entities(value.as_str()))
    })
}

/// Text content of an element including its descendants, tags stripped.
fn element_text(html: &str, tag: &OpenTag<'_>) -> String {
    let inner = &html[tag.end..element_end(html, tag)];

    static STRIP: OnceLock<Regex> = OnceLock::new();
    let strip = STRIP.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid regex"));
    let text = decode_entities(&strip.replace_all(inner, " "));
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]+);").expect("valid regex")
    });
    re.replace_all(input, |caps: &Captures<'_>| {
        let entity = &caps[1];
        let decoded = if let Some(hex) = entity
            .strip_prefix("#x")
            .or_else(|| entity.strip_prefix("#X"))
        {
            u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
        } else if let Some(dec) = entity.strip_prefix('#') {
            dec.parse::<u32>().ok().and_then(char::from_u32)
        } else {
            match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ => None,
            }
        };
        decoded
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

/// Tags linked from the directory listing rows, in page order without duplicates.
pub fn extract_directory_tags(html: &str, film_base_url: &str) -> Result<Vec<String>, FetchError> {
    let rows: Vec<OpenTag<'_>> = open_tags(html)
        .filter(|tag| tag.has_class(DIRECTORY_ROW_CLASS))
        .collect();
    if rows.is_empty() {
        return Err(FetchError::Parse(format!(
            "directory page has no `{DIRECTORY_ROW_CLASS}` rows"
        )));
    }

    let mut tags = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        // Rows without a close tag still stop at the next row.
        let row_end = rows
            .get(idx + 1)
            .map(|next| next.start)
            .unwrap_or(html.len())
            .min(element_end(html, row));
        let segment = &html[row.end..row_end.max(row.end)];
        let href = open_tags(segment)
            .find(|tag| tag.name.eq_ignore_ascii_case("a"))
            .and_then(|anchor| anchor.attr("href"));
        match href.and_then(|href| tag_from_url(film_base_url, &href)) {
            Some(tag) if !tags.contains(&tag) => tags.push(tag),
            Some(_) => {}
            None => tracing::debug!(row = idx, "directory row without a film link"),
        }
    }

    if tags.is_empty() {
        return Err(FetchError::Parse(
            "directory rows carry no film links".to_string(),
        ));
    }
    Ok(tags)
}

/// Metadata from a film detail page.
pub fn extract_movie_detail(html: &str, film_base_url: &str) -> Result<MovieDetail, FetchError> {
    let movie_id = open_tags(html)
        .find(|tag| tag.has_class(ITEM_ID_CLASS))
        .and_then(|tag| tag.attr("data-item-id"))
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| missing(&format!("`{ITEM_ID_CLASS}` data-item-id")))?;
    let title = class_text(html, TITLE_CLASS)?;
    let duration = class_text(html, DURATION_CLASS)?;
    let canonical_tag = open_tags(html)
        .find(|tag| {
            tag.name.eq_ignore_ascii_case("link")
                && tag
                    .attr("rel")
                    .map(|rel| rel.eq_ignore_ascii_case("canonical"))
                    .unwrap_or(false)
        })
        .and_then(|tag| tag.attr("href"))
        .and_then(|href| tag_from_url(film_base_url, &href));

    Ok(MovieDetail {
        movie_id: movie_id.trim().to_string(),
        title,
        duration,
        canonical_tag,
    })
}

fn class_text(html: &str, class: &str) -> Result<String, FetchError> {
    let tag = open_tags(html)
        .find(|tag| tag.has_class(class))
        .ok_or_else(|| missing(&format!("`{class}` element")))?;
    let text = element_text(html, &tag);
    if text.is_empty() {
        return Err(missing(&format!("text in `{class}`")));
    }
    Ok(text)
}

fn missing(what: &str) -> FetchError {
    FetchError::Parse(format!("detail page is missing {what}"))
}
