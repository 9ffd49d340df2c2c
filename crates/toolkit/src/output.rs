//! Tag list rendering.

use clap::ValueEnum;
use common::api::VersionTag;
use derive_more::{Display, Error, From};
use itertools::Itertools;
use serde_json::{Map, Value};
use unicode_width::UnicodeWidthStr;

/// Fields displayed when none are requested explicitly.
pub(crate) const DEFAULT_FIELDS: [&str; 9] = [
    "id",
    "version",
    "sdk_version",
    "requires_platform_version",
    "tested_up_to_version",
    "downloaded",
    "release_mode",
    "created",
    "updated",
];

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub(crate) enum Format {
    /// ASCII table.
    #[default]
    Table,

    /// Comma-separated values with a header row.
    Csv,

    /// Space-separated version strings.
    Ids,

    /// JSON array of objects.
    Json,

    /// YAML sequence of mappings.
    Yaml,
}

/// Output rendering errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum OutputError {
    /// JSON serialization error.
    Json(serde_json::Error),

    /// YAML serialization error.
    Yaml(serde_yaml_ng::Error),

    /// Requested field is not a tag field.
    #[display(fmt = "invalid field: {}", _0)]
    #[from(ignore)]
    UnknownField(#[error(not(source))] String),
}

/// Render tags in the requested format.
///
/// Tags are keyed by their version: a later tag with an already seen version
/// replaces the earlier row in place. `fields` come from [`parse_fields`].
pub(crate) fn render_tags(
    tags: &[VersionTag],
    format: Format,
    fields: &[String],
) -> Result<String, OutputError> {
    let rows = keyed_rows(tags)?;

    if format == Format::Ids {
        return Ok(rows.iter().map(|(version, _)| version).join(" "));
    }

    let rows: Vec<Map<String, Value>> = rows
        .into_iter()
        .map(|(_, row)| {
            fields
                .iter()
                .map(|field| (field.clone(), row.get(field).cloned().unwrap_or(Value::Null)))
                .collect()
        })
        .collect();

    Ok(match format {
        Format::Table => render_table(fields, &rows),
        Format::Csv => render_csv(fields, &rows),
        Format::Json => serde_json::to_string(&rows)?,
        Format::Yaml => serde_yaml_ng::to_string(&rows)?,
        Format::Ids => unreachable!("handled above"),
    })
}

/// Parse a comma-separated field list, [`DEFAULT_FIELDS`] are used when it is absent.
///
/// Repeated fields are kept once, at their first position.
pub(crate) fn parse_fields(fields: Option<&str>) -> Result<Vec<String>, OutputError> {
    let Some(fields) = fields else {
        return Ok(DEFAULT_FIELDS.iter().map(|field| field.to_string()).collect());
    };

    fields
        .split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .unique()
        .map(|field| {
            if DEFAULT_FIELDS.contains(&field) {
                Ok(field.to_owned())
            } else {
                Err(OutputError::UnknownField(field.to_owned()))
            }
        })
        .collect()
}

/// Tag objects keyed by version, in first-seen order.
fn keyed_rows(tags: &[VersionTag]) -> Result<Vec<(String, Map<String, Value>)>, OutputError> {
    let mut rows: Vec<(String, Map<String, Value>)> = Vec::with_capacity(tags.len());

    for tag in tags {
        let Value::Object(row) = serde_json::to_value(tag)? else {
            continue;
        };

        match rows.iter_mut().find(|(version, _)| *version == tag.version) {
            Some(existing) => existing.1 = row,
            None => rows.push((tag.version.clone(), row)),
        }
    }

    Ok(rows)
}

/// Plain text representation of a cell.
fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(value) => value.clone(),
        other => other.to_string(),
    }
}

/// Plain text representation of a row field, empty when the row lacks it.
fn row_cell(row: &Map<String, Value>, field: &str) -> String {
    row.get(field).map(cell).unwrap_or_default()
}

fn render_table(fields: &[String], rows: &[Map<String, Value>]) -> String {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| fields.iter().map(|field| row_cell(row, field)).collect())
        .collect();

    let widths: Vec<usize> = fields
        .iter()
        .enumerate()
        .map(|(index, field)| {
            cells
                .iter()
                .map(|row| row[index].width())
                .chain([field.width()])
                .max()
                .unwrap_or_default()
        })
        .collect();

    let separator = format!(
        "+{}+",
        widths.iter().map(|width| "-".repeat(width + 2)).join("+")
    );

    let line = |values: &[String]| {
        format!(
            "| {} |",
            values
                .iter()
                .zip(&widths)
                .map(|(value, width)| format!("{value}{}", " ".repeat(width - value.width())))
                .join(" | ")
        )
    };

    let mut output = vec![separator.clone(), line(fields), separator.clone()];
    output.extend(cells.iter().map(|row| line(row)));
    output.push(separator);

    output.join("\n")
}

fn render_csv(fields: &[String], rows: &[Map<String, Value>]) -> String {
    let escape = |value: String| {
        if value.contains([',', '"', '\n', '\r']) {
            format!("\"{}\"", value.replace('"', "\"\""))
        } else {
            value
        }
    };

    let header = fields.iter().cloned().map(escape).join(",");
    let body = rows
        .iter()
        .map(|row| {
            fields
                .iter()
                .map(|field| escape(row_cell(row, field)))
                .join(",")
        });

    std::iter::once(header).chain(body).join("\n")
}

#[cfg(test)]
mod tests {
    use common::api::VersionTag;
    use serde_json::json;

    use super::{parse_fields, render_tags, Format, OutputError};

    fn render(tags: &[VersionTag], format: Format, fields: Option<&str>) -> String {
        render_tags(tags, format, &parse_fields(fields).unwrap()).unwrap()
    }

    fn tags() -> Vec<VersionTag> {
        serde_json::from_value(json!([
            {
                "id": "12",
                "version": "1.1.0",
                "downloaded": 17,
                "release_mode": "released",
                "created": "2024-01-01 10:00:00"
            },
            {
                "id": "13",
                "version": "1.2.0",
                "downloaded": 0,
                "release_mode": "pending",
                "created": "2024-02-01 10:00:00"
            },
            {
                "id": "14",
                "version": "1.1.0",
                "downloaded": 2,
                "release_mode": "beta",
                "created": "2024-03-01 10:00:00"
            }
        ]))
        .unwrap()
    }

    #[test]
    fn ids_are_versions() {
        assert_eq!(render(&tags(), Format::Ids, None), "1.1.0 1.2.0");
    }

    #[test]
    fn json_with_selected_fields() {
        let output = render(&tags(), Format::Json, Some("id,version"));

        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&output).unwrap(),
            json!([
                { "id": "14", "version": "1.1.0" },
                { "id": "13", "version": "1.2.0" }
            ])
        );
    }

    #[test]
    fn table() {
        let output = render(&tags(), Format::Table, Some("id, version,release_mode"));

        assert_eq!(
            output,
            "+----+---------+--------------+\n\
             | id | version | release_mode |\n\
             +----+---------+--------------+\n\
             | 14 | 1.1.0   | beta         |\n\
             | 13 | 1.2.0   | pending      |\n\
             +----+---------+--------------+"
        );
    }

    #[test]
    fn csv_escapes_values() {
        let tags: Vec<VersionTag> = serde_json::from_value(json!([
            { "id": 1, "version": "1.0.0", "created": "2024, January" }
        ]))
        .unwrap();

        assert_eq!(
            render(&tags, Format::Csv, Some("id,version,created,updated")),
            "id,version,created,updated\n1,1.0.0,\"2024, January\","
        );
    }

    #[test]
    fn yaml() {
        let output = render(&tags(), Format::Yaml, Some("version,downloaded"));

        let parsed: serde_json::Value = serde_yaml_ng::from_str(&output).unwrap();

        assert_eq!(
            parsed,
            json!([
                { "version": "1.1.0", "downloaded": 2 },
                { "version": "1.2.0", "downloaded": 0 }
            ])
        );
    }

    #[test]
    fn unknown_field() {
        assert!(matches!(
            parse_fields(Some("id,secret_key")),
            Err(OutputError::UnknownField(field)) if field == "secret_key"
        ));
    }

    #[test]
    fn repeated_fields_are_displayed_once() {
        assert_eq!(
            parse_fields(Some("id, version,id,,version")).unwrap(),
            ["id", "version"]
        );

        assert_eq!(
            render(&tags(), Format::Table, Some("id,id")),
            "+----+\n\
             | id |\n\
             +----+\n\
             | 14 |\n\
             | 13 |\n\
             +----+"
        );
        assert_eq!(
            render(&tags(), Format::Csv, Some("id,version,id")),
            "id,version\n14,1.1.0\n13,1.2.0"
        );
    }

    #[test]
    fn unknown_release_mode_is_displayed_verbatim() {
        let tags: Vec<VersionTag> = serde_json::from_value(json!([
            { "id": 1, "version": "1.0.0", "release_mode": "staging" }
        ]))
        .unwrap();

        assert_eq!(
            render(&tags, Format::Csv, Some("version,release_mode")),
            "version,release_mode\n1.0.0,staging"
        );
    }
}
