//! Multi-table persistence of entries.
//!
//! The core row lives in `tbl_entries`; each field's slice of the data map
//! lives in that field's own `tbl_entries_data_<field-id>` table. Adding and
//! editing run as one atomic unit each. Bulk deletion runs in chunks of
//! `entries.delete_chunk_size`, each chunk its own atomic unit.

use crate::config::EngineConfig;
use crate::entry::{Entry, EntryState};
use crate::error::{StorageError, StorageResult};
use crate::field_manager::load_field;
use crate::field_store::SqlFieldStore;
use crate::schema::ENTRIES;
use crate::section_manager::load_section;
use crate::ContentStore;
use quire_db::{
    delete_rows, id_placeholders, insert_row, quote_ident, select_rows, table_columns, table_exists, DbError,
};
use quire_model::{
    remove_file_now, Field, FieldDataStore, FieldFilter, FieldRegistry, Section, SortKey, SortOrder,
    SortPreferences, StoreError, StoreResult,
};
use quire_types::{AuthorId, DatePair, EntryId, FieldData, FieldId, FieldRow, FieldValue, SectionId};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

const ENTRY_COLUMNS: &str = "e.id, e.section_id, e.author_id, e.modification_author_id, e.creation_date, \
     e.creation_date_gmt, e.modification_date, e.modification_date_gmt";

/// Which entries to fetch, and in what order.
#[derive(Debug, Clone, Default)]
pub struct EntryQuery {
    section_id: Option<SectionId>,
    entry_ids: Option<Vec<EntryId>>,
    filters: Vec<EntryFilter>,
    sort: Option<(SortKey, SortOrder)>,
    limit: Option<usize>,
    offset: usize,
    skip_data: bool,
}

#[derive(Debug, Clone)]
struct EntryFilter {
    field_id: FieldId,
    values: Vec<String>,
    and_mode: bool,
}

impl EntryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries of one section. Without an explicit sort, the section's
    /// sorting field and order apply.
    pub fn section(section_id: SectionId) -> Self {
        Self {
            section_id: Some(section_id),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn ids(mut self, ids: impl IntoIterator<Item = EntryId>) -> Self {
        self.entry_ids = Some(ids.into_iter().collect());
        self
    }

    /// Keeps entries matching any of the values.
    #[must_use]
    pub fn filter<S: Into<String>>(mut self, field_id: FieldId, values: impl IntoIterator<Item = S>) -> Self {
        self.filters.push(EntryFilter {
            field_id,
            values: values.into_iter().map(Into::into).collect(),
            and_mode: false,
        });
        self
    }

    /// Keeps entries matching every one of the values.
    #[must_use]
    pub fn filter_all<S: Into<String>>(mut self, field_id: FieldId, values: impl IntoIterator<Item = S>) -> Self {
        self.filters.push(EntryFilter {
            field_id,
            values: values.into_iter().map(Into::into).collect(),
            and_mode: true,
        });
        self
    }

    #[must_use]
    pub fn sort(mut self, key: SortKey, order: SortOrder) -> Self {
        self.sort = Some((key, order));
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Loads core rows only.
    #[must_use]
    pub fn without_data(mut self) -> Self {
        self.skip_data = true;
        self
    }
}

/// One page of entries.
#[derive(Debug, Clone)]
pub struct EntryPage {
    pub entries: Vec<Entry>,
    pub total_entries: usize,
    pub total_pages: usize,
    /// One-based.
    pub page: usize,
    pub per_page: usize,
}

/// Reads and writes entries across the core table and field tables.
///
/// Also serves as a [`FieldDataStore`] for field operations that run outside
/// an entry operation, such as option lookups and association counts.
#[derive(Clone, Copy)]
pub struct EntryManager<'s> {
    store: &'s ContentStore,
}

impl<'s> EntryManager<'s> {
    pub(crate) fn new(store: &'s ContentStore) -> Self {
        Self { store }
    }

    pub(crate) fn store(&self) -> &'s ContentStore {
        self.store
    }

    pub fn config(&self) -> &'s EngineConfig {
        self.store.config()
    }

    /// Inserts the core row and every field's data as one unit.
    pub fn add(&self, entry: &mut Entry) -> StorageResult<EntryId> {
        let default_author = self.config().entries.default_author();
        let id = self.store.database().atomic(|conn| {
            let id = insert_core_row(conn, entry, default_author)?;
            for (field_id, data) in &entry.data {
                save_field_data(conn, id, *field_id, data)?;
            }
            Ok::<_, StorageError>(id)
        })?;
        entry.id = Some(id);
        entry.state = EntryState::Committed;
        info!(entry_id = %id, section_id = %entry.section_id, "Added entry");
        Ok(id)
    }

    /// Updates the modification metadata and replaces every field's data as
    /// one unit.
    pub fn edit(&self, entry: &Entry) -> StorageResult<()> {
        let id = entry.id.ok_or_else(|| StorageError::not_found("entry without id"))?;
        let author = entry
            .modification_author_id
            .or(entry.author_id)
            .unwrap_or_else(|| self.config().entries.default_author());
        let modified = entry.modification_date.unwrap_or_else(DatePair::now);
        self.store.database().atomic(|conn| {
            let updated = conn.execute(
                &format!(
                    "UPDATE {ENTRIES} SET modification_author_id = ?1, modification_date = ?2,
                     modification_date_gmt = ?3 WHERE id = ?4"
                ),
                params![author.get(), modified.local_string(), modified.gmt_string(), id.get()],
            )?;
            if updated == 0 {
                return Err(StorageError::not_found(format!("entry {id}")));
            }
            for (field_id, data) in &entry.data {
                save_field_data(conn, id, *field_id, data)?;
            }
            Ok(())
        })?;
        debug!(entry_id = %id, "Edited entry");
        Ok(())
    }

    /// Replaces one field's stored data for an entry.
    pub fn save_field_data(&self, entry_id: EntryId, field_id: FieldId, data: &FieldData) -> StorageResult<()> {
        self.store
            .database()
            .atomic(|conn| save_field_data(conn, entry_id, field_id, data))
    }

    /// Section an entry belongs to.
    pub fn fetch_entry_section_id(&self, entry_id: EntryId) -> StorageResult<Option<SectionId>> {
        self.store
            .database()
            .with_conn(|conn| entry_section_id(conn, entry_id))
    }

    /// Deletes entries in chunks, running every field's cleanup.
    ///
    /// With a section, its fields decide the path: when none needs entry
    /// data for cleanup, chunks are removed by id alone; otherwise each
    /// chunk is loaded first. Without a section, every id is looked up
    /// individually and grouped by the section it belongs to; unknown ids
    /// are skipped.
    ///
    /// Chunks commit independently, and files owned by a chunk's data are
    /// removed only once it has committed. A failure after some chunks
    /// committed is reported as [`StorageError::PartialDeletion`].
    pub fn delete(&self, entry_ids: &[EntryId], section_id: Option<SectionId>) -> StorageResult<usize> {
        if entry_ids.is_empty() {
            return Ok(0);
        }
        let groups = match section_id {
            Some(section_id) => vec![(section_id, entry_ids.to_vec())],
            None => self.group_by_section(entry_ids)?,
        };
        let chunk_size = self.config().entries.delete_chunk_size.max(1);
        let registry = self.store.registry();

        let mut deleted = 0;
        for (section_id, ids) in groups {
            let section = self
                .store
                .database()
                .with_conn(|conn| load_section(conn, registry, section_id))?;
            let with_data = section.as_ref().is_some_and(Section::requires_data_for_cleanup);
            for chunk in ids.chunks(chunk_size) {
                let removals = RefCell::new(Vec::new());
                let result = self.store.database().atomic(|conn| match &section {
                    Some(section) if with_data => delete_chunk_with_data(conn, section, chunk, &removals),
                    _ => delete_chunk(conn, section.as_ref(), chunk),
                });
                match result {
                    Ok(count) => {
                        for path in removals.into_inner() {
                            remove_file_now(&path);
                        }
                        deleted += count;
                        debug!(section_id = %section_id, chunk = chunk.len(), deleted, "Deleted entry chunk");
                    }
                    Err(err) if deleted > 0 => {
                        warn!(deleted, error = %err, "Entry deletion stopped part way");
                        return Err(StorageError::PartialDeletion {
                            deleted,
                            source: Box::new(err),
                        });
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        info!(deleted, "Deleted entries");
        Ok(deleted)
    }

    fn group_by_section(&self, entry_ids: &[EntryId]) -> StorageResult<Vec<(SectionId, Vec<EntryId>)>> {
        self.store.database().with_conn(|conn| {
            let mut groups: Vec<(SectionId, Vec<EntryId>)> = Vec::new();
            for &id in entry_ids {
                let Some(section_id) = entry_section_id(conn, id)? else {
                    debug!(entry_id = %id, "Skipping unknown entry");
                    continue;
                };
                match groups.iter_mut().find(|(s, _)| *s == section_id) {
                    Some((_, ids)) => ids.push(id),
                    None => groups.push((section_id, vec![id])),
                }
            }
            Ok(groups)
        })
    }

    /// Entries matching a query, with their data unless asked otherwise.
    pub fn fetch(&self, query: &EntryQuery) -> StorageResult<Vec<Entry>> {
        let registry = self.store.registry();
        let prefs: &dyn SortPreferences = &self.config().sorting;
        self.store.database().with_conn(|conn| {
            let section = query_section(conn, registry, query)?;
            let (clause, mut values) = where_clause(conn, registry, query, section.as_ref())?;
            let order = order_clause(conn, registry, query, section.as_ref(), prefs)?;
            let mut sql = format!("SELECT {ENTRY_COLUMNS} FROM {ENTRIES} e WHERE {clause} ORDER BY {order}");
            if let Some(limit) = query.limit {
                sql.push_str(" LIMIT ? OFFSET ?");
                values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
                values.push(Value::Integer(i64::try_from(query.offset).unwrap_or(i64::MAX)));
            } else if query.offset > 0 {
                sql.push_str(" LIMIT -1 OFFSET ?");
                values.push(Value::Integer(i64::try_from(query.offset).unwrap_or(i64::MAX)));
            }

            let mut stmt = conn.prepare(&sql)?;
            let mut entries = stmt
                .query_map(params_from_iter(values), read_entry_row)?
                .collect::<Result<Vec<_>, _>>()?;
            if !query.skip_data {
                match section {
                    Some(section) => hydrate(conn, &section, &mut entries)?,
                    None => {
                        let mut section_ids: Vec<SectionId> = entries.iter().map(|e| e.section_id).collect();
                        section_ids.sort_unstable();
                        section_ids.dedup();
                        for id in section_ids {
                            if let Some(section) = load_section(conn, registry, id)? {
                                hydrate(conn, &section, &mut entries)?;
                            }
                        }
                    }
                }
            }
            Ok(entries)
        })
    }

    /// One entry with its data.
    pub fn fetch_entry(&self, entry_id: EntryId) -> StorageResult<Option<Entry>> {
        Ok(self.fetch(&EntryQuery::new().ids([entry_id]))?.into_iter().next())
    }

    /// Number of entries a query matches, ignoring limit and offset.
    pub fn fetch_count(&self, query: &EntryQuery) -> StorageResult<usize> {
        let registry = self.store.registry();
        self.store.database().with_conn(|conn| {
            let section = query_section(conn, registry, query)?;
            let (clause, values) = where_clause(conn, registry, query, section.as_ref())?;
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {ENTRIES} e WHERE {clause}"),
                params_from_iter(values),
                |row| row.get(0),
            )?;
            Ok(usize::try_from(count).unwrap_or_default())
        })
    }

    /// A one-based page of a query's results.
    pub fn fetch_by_page(&self, query: &EntryQuery, page: usize, per_page: usize) -> StorageResult<EntryPage> {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let total_entries = self.fetch_count(query)?;
        let paged = query.clone().limit(per_page).offset((page - 1) * per_page);
        Ok(EntryPage {
            entries: self.fetch(&paged)?,
            total_entries,
            total_pages: total_entries.div_ceil(per_page),
            page,
            per_page,
        })
    }

    fn with_field_store<T>(&self, f: impl FnOnce(&SqlFieldStore<'_>) -> StoreResult<T>) -> StoreResult<T> {
        self.store
            .database()
            .with_conn(|conn| Ok::<_, DbError>(f(&SqlFieldStore::new(conn))))
            .map_err(|e| StoreError::Backend(e.to_string()))?
    }
}

impl FieldDataStore for EntryManager<'_> {
    fn delete_entry_data(&self, field_id: FieldId, entry_ids: &[EntryId]) -> StoreResult<usize> {
        self.with_field_store(|store| store.delete_entry_data(field_id, entry_ids))
    }

    fn count_entries_matching(
        &self,
        field_id: FieldId,
        column: &str,
        values: &[FieldValue],
        exclude: Option<EntryId>,
    ) -> StoreResult<usize> {
        self.with_field_store(|store| store.count_entries_matching(field_id, column, values, exclude))
    }

    fn distinct_values(&self, field_id: FieldId, column: &str) -> StoreResult<Vec<String>> {
        self.with_field_store(|store| store.distinct_values(field_id, column))
    }
}

/// Inserts a core row, stamping the entry's missing authors and dates first.
pub(crate) fn insert_core_row(
    conn: &Connection,
    entry: &mut Entry,
    default_author: AuthorId,
) -> StorageResult<EntryId> {
    let author = *entry.author_id.get_or_insert(default_author);
    let modification_author = *entry.modification_author_id.get_or_insert(author);
    let created = *entry.creation_date.get_or_insert_with(DatePair::now);
    let modified = *entry.modification_date.get_or_insert(created);
    conn.execute(
        &format!(
            "INSERT INTO {ENTRIES} (section_id, author_id, modification_author_id, creation_date,
             creation_date_gmt, modification_date, modification_date_gmt)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        ),
        params![
            entry.section_id.get(),
            author.get(),
            modification_author.get(),
            created.local_string(),
            created.gmt_string(),
            modified.local_string(),
            modified.gmt_string(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    if id <= 0 {
        return Err(StorageError::not_found("generated entry id"));
    }
    Ok(EntryId::new(id))
}

pub(crate) fn delete_core_rows(conn: &Connection, entry_ids: &[EntryId]) -> StorageResult<usize> {
    if entry_ids.is_empty() {
        return Ok(0);
    }
    Ok(conn.execute(
        &format!("DELETE FROM {ENTRIES} WHERE id IN ({})", id_placeholders(entry_ids.len())),
        params_from_iter(entry_ids.iter().map(|id| id.get())),
    )?)
}

fn entry_section_id(conn: &Connection, entry_id: EntryId) -> StorageResult<Option<SectionId>> {
    Ok(conn
        .query_row(
            &format!("SELECT section_id FROM {ENTRIES} WHERE id = ?1"),
            params![entry_id.get()],
            |row| row.get(0).map(SectionId::new),
        )
        .optional()?)
}

/// Deletes then re-inserts the rows of one field for one entry. A field
/// without a data table is skipped; columns the table lacks are dropped.
fn save_field_data(conn: &Connection, entry_id: EntryId, field_id: FieldId, data: &FieldData) -> StorageResult<()> {
    let table = field_id.data_table();
    if !table_exists(conn, &table)? {
        debug!(entry_id = %entry_id, field_id = %field_id, "Skipping field without data table");
        return Ok(());
    }
    delete_rows(conn, &table, &[entry_id])?;
    let rows = data.rows();
    if rows.is_empty() {
        return Ok(());
    }
    let columns = table_columns(conn, &table)?;
    for mut row in rows {
        row.retain(|column, _| {
            let known = columns.iter().any(|c| c == column);
            if !known {
                debug!(field_id = %field_id, column = %column, "Dropping column missing from data table");
            }
            known
        });
        insert_row(conn, &table, entry_id, &row)?;
    }
    Ok(())
}

/// Removes a chunk by id, letting each field clean up without loading data.
fn delete_chunk(conn: &Connection, section: Option<&Section>, chunk: &[EntryId]) -> StorageResult<usize> {
    let store = SqlFieldStore::new(conn);
    for field in section.map(Section::fields).unwrap_or_default() {
        field.entry_data_cleanup(&store, chunk, None)?;
    }
    delete_core_rows(conn, chunk)
}

/// Loads a chunk with its data and hands each entry's data to every field's
/// cleanup. File removals are collected into `removals`, not performed.
fn delete_chunk_with_data(
    conn: &Connection,
    section: &Section,
    chunk: &[EntryId],
    removals: &RefCell<Vec<PathBuf>>,
) -> StorageResult<usize> {
    let store = SqlFieldStore::new(conn).holding_removals(removals);
    let mut entries = load_core_rows(conn, chunk)?;
    hydrate(conn, section, &mut entries)?;
    for entry in &entries {
        let Some(id) = entry.id else { continue };
        for field in section.fields() {
            let data = field.id().and_then(|field_id| entry.get_data(field_id));
            field.entry_data_cleanup(&store, &[id], data)?;
        }
    }
    delete_core_rows(conn, chunk)
}

fn load_core_rows(conn: &Connection, entry_ids: &[EntryId]) -> StorageResult<Vec<Entry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM {ENTRIES} e WHERE e.id IN ({}) ORDER BY e.id",
        id_placeholders(entry_ids.len())
    ))?;
    let entries = stmt
        .query_map(params_from_iter(entry_ids.iter().map(|id| id.get())), read_entry_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

fn read_entry_row(row: &Row<'_>) -> rusqlite::Result<Entry> {
    let date = |local: usize, gmt: usize| -> rusqlite::Result<Option<DatePair>> {
        let local: String = row.get(local)?;
        let gmt: String = row.get(gmt)?;
        Ok(DatePair::parse(&local, &gmt).ok())
    };
    let mut entry = Entry::new(SectionId::new(row.get(1)?));
    entry.id = Some(EntryId::new(row.get(0)?));
    entry.author_id = Some(AuthorId::new(row.get(2)?));
    entry.modification_author_id = Some(AuthorId::new(row.get(3)?));
    entry.creation_date = date(4, 5)?;
    entry.modification_date = date(6, 7)?;
    entry.state = EntryState::Committed;
    Ok(entry)
}

/// Loads the data of `section`'s fields into those of `entries` that belong
/// to it. Every field gets an entry in the data map, empty when nothing is
/// stored.
fn hydrate(conn: &Connection, section: &Section, entries: &mut [Entry]) -> StorageResult<()> {
    let Some(section_id) = section.id else {
        return Ok(());
    };
    let ids: Vec<EntryId> = entries
        .iter()
        .filter(|e| e.section_id == section_id)
        .filter_map(|e| e.id)
        .collect();
    if ids.is_empty() {
        return Ok(());
    }
    for field in section.fields() {
        let Some(field_id) = field.id() else { continue };
        let mut by_entry: HashMap<EntryId, Vec<FieldRow>> = HashMap::new();
        let table = field_id.data_table();
        if table_exists(conn, &table)? {
            for (entry_id, row) in select_rows(conn, &table, &ids)? {
                by_entry.entry(entry_id).or_default().push(row);
            }
        }
        let multi_row = field.behavior().stores_multiple_rows();
        for entry in entries.iter_mut().filter(|e| e.section_id == section_id) {
            let rows = entry.id.and_then(|id| by_entry.remove(&id)).unwrap_or_default();
            entry.data.insert(field_id, FieldData::from_rows(rows, multi_row));
        }
    }
    Ok(())
}

fn query_section(conn: &Connection, registry: &FieldRegistry, query: &EntryQuery) -> StorageResult<Option<Section>> {
    match query.section_id {
        Some(id) => load_section(conn, registry, id)?
            .map(Some)
            .ok_or_else(|| StorageError::not_found(format!("section {id}"))),
        None => Ok(None),
    }
}

/// Resolves a field through the query's section when there is one.
fn query_field(
    conn: &Connection,
    registry: &FieldRegistry,
    section: Option<&Section>,
    field_id: FieldId,
) -> StorageResult<Field> {
    if let Some(field) = section.and_then(|s| s.field(field_id)) {
        return Ok(field.clone());
    }
    load_field(conn, registry, field_id)?.ok_or_else(|| StorageError::not_found(format!("field {field_id}")))
}

fn where_clause(
    conn: &Connection,
    registry: &FieldRegistry,
    query: &EntryQuery,
    section: Option<&Section>,
) -> StorageResult<(String, Vec<Value>)> {
    let mut conditions = Vec::new();
    let mut values = Vec::new();
    if let Some(id) = query.section_id {
        conditions.push("e.section_id = ?".to_string());
        values.push(Value::Integer(id.get()));
    }
    if let Some(ids) = &query.entry_ids {
        if ids.is_empty() {
            conditions.push("0".to_string());
        } else {
            conditions.push(format!("e.id IN ({})", id_placeholders(ids.len())));
            values.extend(ids.iter().map(|id| Value::Integer(id.get())));
        }
    }
    for filter in &query.filters {
        let field = query_field(conn, registry, section, filter.field_id)?;
        if !field.behavior().can_filter() {
            debug!(field_id = %filter.field_id, "Ignoring filter on unfilterable field");
            continue;
        }
        let Some(compiled) = field.build_filter(&filter.values, filter.and_mode) else {
            continue;
        };
        let table = filter.field_id.data_table();
        if !table_exists(conn, &table)? {
            conditions.push(if compiled.negated { "1" } else { "0" }.to_string());
            continue;
        }
        conditions.push(filter_sql(&quote_ident(&table)?, &compiled, &mut values));
    }
    if conditions.is_empty() {
        conditions.push("1".to_string());
    }
    Ok((conditions.join(" AND "), values))
}

/// `EXISTS` subqueries over the field table, aliased `t`. In and-mode each
/// predicate needs its own matching row.
fn filter_sql(table: &str, filter: &FieldFilter, values: &mut Vec<Value>) -> String {
    let exists = |predicates: &[String]| {
        format!(
            "EXISTS (SELECT 1 FROM {table} t WHERE t.entry_id = e.id AND ({}))",
            predicates.join(" OR ")
        )
    };
    let predicates: Vec<String> = filter.predicates.iter().map(|p| format!("({})", p.sql)).collect();
    for predicate in &filter.predicates {
        values.extend(predicate.params.iter().map(quire_db::to_sql_value));
    }
    let clause = if filter.and_mode {
        predicates
            .iter()
            .map(|p| exists(std::slice::from_ref(p)))
            .collect::<Vec<_>>()
            .join(" AND ")
    } else {
        exists(&predicates)
    };
    if filter.negated {
        format!("NOT ({clause})")
    } else {
        format!("({clause})")
    }
}

fn order_clause(
    conn: &Connection,
    registry: &FieldRegistry,
    query: &EntryQuery,
    section: Option<&Section>,
    prefs: &dyn SortPreferences,
) -> StorageResult<String> {
    let (key, order) = query
        .sort
        .or_else(|| section.map(|s| (s.get_sorting_field(prefs), s.get_sorting_order(prefs))))
        .unwrap_or((SortKey::SystemId, SortOrder::Asc));
    let direction = match order {
        SortOrder::Random => return Ok("RANDOM()".to_string()),
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    let clause = match key {
        SortKey::SystemId => format!("e.id {direction}"),
        SortKey::SystemCreationDate => format!("e.creation_date_gmt {direction}, e.id {direction}"),
        SortKey::SystemModificationDate => format!("e.modification_date_gmt {direction}, e.id {direction}"),
        SortKey::Field(field_id) => {
            let field = query_field(conn, registry, section, field_id)?;
            let table = field_id.data_table();
            let has_table = table_exists(conn, &table)?;
            match field.sort_column() {
                Some(column) if has_table => format!(
                    "(SELECT s.{} FROM {} s WHERE s.entry_id = e.id ORDER BY s.id LIMIT 1) {direction}, e.id {direction}",
                    quote_ident(column)?,
                    quote_ident(&table)?
                ),
                _ => {
                    debug!(field_id = %field_id, "Field cannot sort, ordering by id");
                    format!("e.id {direction}")
                }
            }
        }
    };
    Ok(clause)
}
