use super::{require, FieldBehavior, FieldInfo};
use crate::filter::{FieldFilter, FilterMode, FilterRequest, Predicate};
use crate::grouping::{GroupLevel, GroupingError};
use crate::modes::{ExportMode, ExportValue, ImportMode};
use crate::raw;
use crate::settings::{ConfigError, FieldConfig, SettingKind, SettingSpec, Settings};
use crate::status::{FieldError, FieldResult};
use crate::store::FieldContext;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Timelike, Utc};
use quire_types::{ColumnSpec, EntryId, FieldData, KeySpec, StorageSchema, DATE_FORMAT};
use serde_json::Value;

/// A point in time, stored as RFC 3339 text plus a sortable UTC column.
#[derive(Debug, Clone)]
pub struct DateField {
    /// Default omitted input to "now".
    pub pre_populate: bool,
    /// Keep the time of day; when false dates are truncated to midnight.
    pub time: bool,
}

impl Default for DateField {
    fn default() -> Self {
        Self {
            pre_populate: false,
            time: true,
        }
    }
}

/// Parses the date spellings accepted as input: `now`, `today`, unix
/// seconds, RFC 3339, `YYYY-MM-DD[ HH:MM[:SS]]`. Naive times are UTC.
pub fn parse_date(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let text = text.trim();
    match text.to_ascii_lowercase().as_str() {
        "now" => return now.with_nanosecond(0),
        "today" => return midnight(now.date_naive()),
        _ => {}
    }
    if let Ok(seconds) = text.parse::<i64>() {
        return Utc.timestamp_opt(seconds, 0).single();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in [DATE_FORMAT, "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok().and_then(midnight)
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|n| n.and_utc())
}

fn is_date_only(text: &str) -> bool {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").is_ok()
}

fn stored(dt: DateTime<Utc>) -> String {
    dt.format(DATE_FORMAT).to_string()
}

impl DateField {
    /// The instant a raw value names. Years outside 0000-9999 do not fit the
    /// stored column and are refused.
    fn instant(&self, raw: &Value, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let dt = match raw {
            Value::Number(n) => n.as_i64().and_then(|s| Utc.timestamp_opt(s, 0).single()),
            other => raw::to_text(other).and_then(|t| parse_date(&t, now)),
        }?;
        if !(0..=9999).contains(&dt.year()) {
            return None;
        }
        if self.time {
            Some(dt)
        } else {
            midnight(dt.date_naive())
        }
    }

    /// Predicate for one filter value: a range, an open bound or a day.
    fn range_predicate(value: &str, now: DateTime<Utc>) -> Predicate {
        let bound = |text: &str, end_of_day: bool| {
            parse_date(text, now).map(|dt| {
                if end_of_day && is_date_only(text) {
                    format!("{} 23:59:59", dt.format("%Y-%m-%d"))
                } else {
                    stored(dt)
                }
            })
        };
        let lower = value.to_ascii_lowercase();
        let parsed = if let Some((from, to)) = value.split_once(" to ") {
            bound(from, false).zip(bound(to, true)).map(|(from, to)| {
                Predicate::new("t.\"date\" >= ? AND t.\"date\" <= ?", vec![from.into(), to.into()])
            })
        } else if let Some(rest) = lower.strip_prefix("earlier than ").or_else(|| lower.strip_prefix("before ")) {
            bound(rest, false).map(|b| Predicate::new("t.\"date\" < ?", vec![b.into()]))
        } else if let Some(rest) = lower.strip_prefix("later than ").or_else(|| lower.strip_prefix("after ")) {
            bound(rest, true).map(|b| Predicate::new("t.\"date\" > ?", vec![b.into()]))
        } else if is_date_only(value) {
            bound(value, false).zip(bound(value, true)).map(|(from, to)| {
                Predicate::new("t.\"date\" >= ? AND t.\"date\" <= ?", vec![from.into(), to.into()])
            })
        } else {
            bound(value, false).map(|b| Predicate::new("t.\"date\" = ?", vec![b.into()]))
        };
        parsed.unwrap_or_else(Predicate::never)
    }
}

impl FieldConfig for DateField {
    const HANDLE: &'static str = "date";
    const NAME: &'static str = "Date";
    const SETTINGS: &'static [SettingSpec] = &[
        SettingSpec::new("pre_populate", SettingKind::Bool, "no"),
        SettingSpec::new("time", SettingKind::Bool, "yes"),
    ];

    fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            pre_populate: settings.bool("pre_populate"),
            time: settings.bool("time"),
        })
    }

    fn to_settings(&self) -> Settings {
        let mut settings = Self::default_settings();
        settings.set("pre_populate", self.pre_populate);
        settings.set("time", self.time);
        settings
    }
}

impl FieldBehavior for DateField {
    fn handle(&self) -> &'static str {
        Self::HANDLE
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn can_filter(&self) -> bool {
        true
    }

    fn can_pre_populate(&self) -> bool {
        true
    }

    fn is_sortable(&self) -> bool {
        true
    }

    fn allow_datasource_output_grouping(&self) -> bool {
        true
    }

    fn allow_datasource_param_output(&self) -> bool {
        true
    }

    fn storage_schema(&self) -> StorageSchema {
        StorageSchema::new()
            .column(ColumnSpec::varchar("value", 80))
            .column(ColumnSpec::varchar("date", 19))
            .key(KeySpec::unique("entry_id"))
            .key(KeySpec::index("date"))
    }

    fn check_post_field_data(&self, info: &FieldInfo, raw: &Value, ctx: &FieldContext<'_>) -> FieldResult<()> {
        let empty = raw::is_empty(raw);
        require(info, empty)?;
        if !empty && self.instant(raw, ctx.now).is_none() {
            return Err(FieldError::invalid_with(format!(
                "The date specified in '{}' is invalid.",
                info.label
            )));
        }
        Ok(())
    }

    fn normalize(&self, info: &FieldInfo, raw: &Value, ctx: &FieldContext<'_>) -> FieldResult<FieldData> {
        if raw::is_empty(raw) {
            return Ok(FieldData::new());
        }
        let dt = self
            .instant(raw, ctx.now)
            .ok_or_else(|| FieldError::invalid(&info.label))?;
        Ok(FieldData::new()
            .with("value", dt.to_rfc3339_opts(SecondsFormat::Secs, false))
            .with("date", stored(dt)))
    }

    fn default_raw_input(&self, _ctx: &FieldContext<'_>) -> Value {
        if self.pre_populate {
            Value::String("now".into())
        } else {
            Value::Null
        }
    }

    fn export_modes(&self) -> &'static [ExportMode] {
        &[
            ExportMode::Value,
            ExportMode::Formatted,
            ExportMode::Timestamp,
            ExportMode::Postdata,
        ]
    }

    fn export_value(&self, data: &FieldData, mode: ExportMode, _entry_id: Option<EntryId>) -> Option<ExportValue> {
        let value = data.text("value")?;
        match mode {
            ExportMode::Timestamp => DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| ExportValue::Int(dt.timestamp())),
            _ => Some(ExportValue::Text(value.to_string())),
        }
    }

    fn import_modes(&self) -> &'static [ImportMode] {
        &[ImportMode::Value, ImportMode::Postdata, ImportMode::Timestamp]
    }

    fn group_path(&self, data: Option<&FieldData>) -> Result<Vec<GroupLevel>, GroupingError> {
        let Some(dt) = data
            .and_then(|d| d.text("date"))
            .and_then(|s| NaiveDateTime::parse_from_str(s, DATE_FORMAT).ok())
        else {
            return Ok(vec![GroupLevel::new("none")]);
        };
        let value = data.and_then(|d| d.text("value")).unwrap_or_default();
        Ok(vec![
            GroupLevel::new(dt.year().to_string()).attribute("value", dt.year().to_string()),
            GroupLevel::new(format!("{:02}", dt.month())).attribute("value", format!("{:02}", dt.month())),
            GroupLevel::new(format!("{:02}", dt.day()))
                .attribute("value", format!("{:02}", dt.day()))
                .attribute("date", value),
        ])
    }

    fn build_filter(&self, request: &FilterRequest, and_mode: bool) -> Option<FieldFilter> {
        if request.values.is_empty() {
            return None;
        }
        let now = Utc::now();
        let predicates = request
            .values
            .iter()
            .map(|v| match request.mode {
                FilterMode::Regexp => Predicate::any_column(&["value"], "REGEXP", v),
                FilterMode::Equals => Self::range_predicate(v, now),
            })
            .collect();
        Some(FieldFilter {
            negated: request.negated,
            and_mode,
            predicates,
        })
    }

    fn sort_column(&self) -> Option<&'static str> {
        Some("date")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_types::FieldValue;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap()
    }

    #[test]
    fn parses_accepted_spellings() {
        assert_eq!(parse_date("now", now()), Some(now()));
        assert_eq!(
            parse_date("today", now()),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_date("2024-02-29", now()),
            Some(Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_date("2024-02-29T10:00:00+02:00", now()),
            Some(Utc.with_ymd_and_hms(2024, 2, 29, 8, 0, 0).unwrap())
        );
        assert_eq!(parse_date("0", now()), Some(Utc.timestamp_opt(0, 0).unwrap()));
        assert!(parse_date("yesterday-ish", now()).is_none());
    }

    #[test]
    fn range_filters() {
        let p = DateField::range_predicate("2024-01-01 to 2024-01-31", now());
        assert_eq!(p.sql, "t.\"date\" >= ? AND t.\"date\" <= ?");
        assert_eq!(
            p.params,
            vec![FieldValue::from("2024-01-01 00:00:00"), FieldValue::from("2024-01-31 23:59:59")]
        );
        let p = DateField::range_predicate("earlier than 2024-01-01", now());
        assert_eq!(p.sql, "t.\"date\" < ?");
        let p = DateField::range_predicate("later than 2024-01-01", now());
        assert_eq!(p.params, vec![FieldValue::from("2024-01-01 23:59:59")]);
        assert_eq!(DateField::range_predicate("gibberish", now()), Predicate::never());
    }
}
