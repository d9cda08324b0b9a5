use chrono::{Local, NaiveDate};

/// Everything a document name is derived from. For the machine-readable
/// structured name the fields carry short codes; for the display name they
/// carry the full entity/category/type names.
#[derive(Debug, Default, Clone, Copy)]
pub struct NameSource<'a> {
    pub entity: Option<&'a str>,
    pub category: Option<&'a str>,
    pub doc_type: Option<&'a str>,
    pub date: Option<NaiveDate>,
    pub title: &'a str,
}

/// Structured identifier in the fixed order entity, category, type, date
/// (`YYYYMMDD`), joined with `_`. Absent codes are omitted outright. The date
/// defaults to today when the document carries none. A document with no codes
/// at all falls back to its title verbatim.
pub fn structured_name(source: &NameSource<'_>, suffix: Option<&str>) -> String {
    let mut parts: Vec<String> = Vec::new();

    for code in [source.entity, source.category, source.doc_type]
        .into_iter()
        .flatten()
    {
        parts.push(code.to_string());
    }

    if parts.is_empty() {
        return source.title.to_string();
    }

    let date = source.date.unwrap_or_else(|| Local::now().date_naive());
    parts.push(date.format("%Y%m%d").to_string());

    if let Some(raw) = suffix {
        let clean = sanitize_suffix(raw);
        if !clean.is_empty() {
            parts.push(clean);
        }
    }

    parts.join("_")
}

/// Human-readable variant: full names joined with ` - `, date as
/// `DD/MM/YYYY`. Same title fallback as the structured form.
pub fn display_name(source: &NameSource<'_>) -> String {
    let mut parts: Vec<String> = Vec::new();

    for name in [source.entity, source.category, source.doc_type]
        .into_iter()
        .flatten()
    {
        parts.push(name.to_string());
    }

    if parts.is_empty() {
        return source.title.to_string();
    }

    if let Some(date) = source.date {
        parts.push(date.format("%d/%m/%Y").to_string());
    }

    parts.join(" - ")
}

/// Canonical PDF filename: the structured name plus the `.pdf` extension.
pub fn pdf_filename(source: &NameSource<'_>, suffix: Option<&str>) -> String {
    format!("{}.pdf", structured_name(source, suffix))
}

/// Suffixes come from free text; only alphanumerics, `_` and `-` survive.
pub fn sanitize_suffix(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Best-effort `YYYYMMDD` token from a raw date string. Unparseable input
/// degrades to the input with dashes stripped rather than an error.
pub fn compact_date_token(raw: &str) -> String {
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => date.format("%Y%m%d").to_string(),
        Err(_) => raw.replace('-', ""),
    }
}
