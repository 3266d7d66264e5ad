use config::shared::TableNamesConfig;
use serde_json::{Map, Value, json};
use url::Url;

use crate::error::IngestResult;
use crate::stages::writer::FragmentMapper;
use crate::types::{DeferredLookup, FragmentRow, Record, WriteFragment};

const DETAILS_PAGE_KEY: &str = "details_page";
const LANGUAGE_KEY: &str = "marc_code";
const DESCRIPTION_KEY: &str = "description";
const DATE_KEY: &str = "info_date";
const AUTHOR_KEY: &str = "info_author";
const SOURCE_KEY: &str = "info_source";
const SECTIONS_KEY: &str = "info_section";
const LINKS_KEY: &str = "link_data";

/// Language under which localized names and descriptions are stored.
const DEFAULT_LOCALE: &str = "zh";

/// Maps information records onto the list, tagging, attachment and section tables.
///
/// Every record yields one list row and one tagging row, one attachment row per entry of
/// `affiliated_data.link_data` and one section row per entry of `data.info_section`. The
/// `source_id` of the list row is resolved by the writer from the source table using the host
/// of `metadata.details_page`.
#[derive(Debug, Clone, Default)]
pub struct InformationMapper {
    tables: TableNamesConfig,
}

impl InformationMapper {
    pub fn new(tables: TableNamesConfig) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &TableNamesConfig {
        &self.tables
    }

    fn list_row(&self, record: &Record) -> FragmentRow {
        let details_page = record.metadata.get(DETAILS_PAGE_KEY).cloned();

        let row = FragmentRow::new()
            .value("information_id", record.uid())
            .value("information_name", localized(Value::from(record.name.as_str())))
            .value(
                "information_description",
                localized(field_or_null(&record.data, DESCRIPTION_KEY)),
            )
            .value("original_link", details_page.unwrap_or(Value::Null))
            .value("original_language", field_or_null(&record.metadata, LANGUAGE_KEY))
            .value("publish_date", field_or_null(&record.data, DATE_KEY))
            .value(
                "metadata",
                json!({
                    AUTHOR_KEY: field_or_null(&record.data, AUTHOR_KEY),
                    SOURCE_KEY: field_or_null(&record.data, SOURCE_KEY),
                }),
            );

        match record.metadata_str(DETAILS_PAGE_KEY).and_then(source_domain) {
            Some(domain) => row.lookup(
                "source_id",
                DeferredLookup {
                    table: self.tables.source.clone(),
                    match_column: "domain".to_string(),
                    value: domain,
                    select_column: "source_id".to_string(),
                },
            ),
            None => row.value("source_id", Value::Null),
        }
    }

    fn tagging_row(&self, record: &Record) -> FragmentRow {
        FragmentRow::new()
            .value("information_id", record.uid())
            .value("tag_code", record.tag_code.clone())
            .value("tag_value", record.tag_values.clone())
    }

    fn attachment_rows(&self, record: &Record) -> Vec<FragmentRow> {
        array_entries(&record.affiliated_data, LINKS_KEY)
            .enumerate()
            .map(|(index, link)| {
                FragmentRow::new()
                    .value("information_id", record.uid())
                    .value("attachment_name", link_field(link, "accessory_name"))
                    .value("attachment_address", link_field(link, "accessory_url"))
                    .value("display_order", index as i64 + 1)
            })
            .collect()
    }

    fn section_rows(&self, record: &Record) -> Vec<FragmentRow> {
        array_entries(&record.data, SECTIONS_KEY)
            .enumerate()
            .map(|(index, section)| {
                FragmentRow::new()
                    .value("information_id", record.uid())
                    .value("section_content", section.clone())
                    .value("section_order", index as i64 + 1)
            })
            .collect()
    }
}

impl FragmentMapper for InformationMapper {
    fn map(&self, record: &Record) -> IngestResult<WriteFragment> {
        let mut fragment = WriteFragment::new();

        fragment.push_row(&self.tables.list, self.list_row(record));
        fragment.push_row(&self.tables.tagging, self.tagging_row(record));

        fragment.touch_table(&self.tables.attachment);
        for row in self.attachment_rows(record) {
            fragment.push_row(&self.tables.attachment, row);
        }

        fragment.touch_table(&self.tables.section);
        for row in self.section_rows(record) {
            fragment.push_row(&self.tables.section, row);
        }

        Ok(fragment)
    }
}

/// Returns the host of `page`, or `None` when it is not an absolute URL with a host.
pub fn source_domain(page: &str) -> Option<String> {
    Url::parse(page)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
}

fn localized(value: Value) -> Value {
    json!({ DEFAULT_LOCALE: value })
}

fn field_or_null(payload: &Map<String, Value>, key: &str) -> Value {
    payload.get(key).cloned().unwrap_or(Value::Null)
}

fn array_entries<'a>(
    payload: &'a Map<String, Value>,
    key: &str,
) -> impl Iterator<Item = &'a Value> + 'a {
    payload
        .get(key)
        .and_then(Value::as_array)
        .map(|entries| entries.iter())
        .into_iter()
        .flatten()
}

/// A link attribute, or an empty string when it is missing or null.
fn link_field(link: &Value, key: &str) -> Value {
    match link.get(key) {
        Some(Value::Null) | None => Value::from(""),
        Some(value) => value.clone(),
    }
}
