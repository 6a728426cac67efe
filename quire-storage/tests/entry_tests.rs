mod common;

use common::{articles, create, field_id, post, section_id, store};
use pretty_assertions::assert_eq;
use quire_model::{DateField, Field, FieldStatus, InputField, Section, SelectField, UploadField};
use quire_storage::{Entry, EntryQuery, EntryState};
use quire_types::{AuthorId, EntryId, FieldData};
use serde_json::json;

#[test]
fn posted_data_is_normalized_and_committed() {
    let store = store();
    let section = articles(&store);
    let entries = store.entries();

    let mut entry = Entry::new(section_id(&section));
    let errors = entry
        .set_data_from_post(&entries, &section, &post(json!({ "title": "Hello" })), false)
        .unwrap();
    assert!(errors.is_empty());
    assert_eq!(entry.state(), EntryState::Validated);
    assert!(entry.id().is_some());

    let title = field_id(&section, "title");
    let published = field_id(&section, "published");
    assert_eq!(
        entry.get_data(title),
        Some(&FieldData::new().with("value", "Hello").with("handle", "hello"))
    );
    assert_eq!(entry.get_data(published), Some(&FieldData::new().with("value", "no")));

    let id = entry.commit(&entries, &section).unwrap();
    assert_eq!(entry.state(), EntryState::Committed);

    let stored = entries.fetch_entry(id).unwrap().unwrap();
    assert_eq!(stored.data(), entry.data());
    assert_eq!(stored.author_id(), Some(AuthorId::new(1)));
    assert_eq!(entries.fetch_entry_section_id(id).unwrap(), section.id);
}

#[test]
fn rejected_new_entry_leaves_no_row() {
    let store = store();
    let section = articles(&store);
    let entries = store.entries();

    let mut entry = Entry::new(section_id(&section));
    let errors = entry
        .set_data_from_post(&entries, &section, &post(json!({})), false)
        .unwrap();

    let title = field_id(&section, "title");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[&title].status, FieldStatus::MissingRequired);
    assert_eq!(entry.state(), EntryState::Rejected);
    assert_eq!(entry.id(), None);
    assert_eq!(entries.fetch_count(&EntryQuery::section(section_id(&section))).unwrap(), 0);
}

#[test]
fn check_post_data_writes_nothing() {
    let store = store();
    let section = articles(&store);
    let entries = store.entries();

    let entry = Entry::new(section_id(&section));
    let errors = entry
        .check_post_data(&entries, &section, &post(json!({ "published": "maybe" })), false)
        .unwrap();
    assert_eq!(errors.len(), 2);

    let errors = entry
        .check_post_data(&entries, &section, &post(json!({ "published": "yes" })), true)
        .unwrap();
    assert!(errors.is_empty());
    assert_eq!(entries.fetch_count(&EntryQuery::new()).unwrap(), 0);
}

#[test]
fn reposting_the_same_data_is_idempotent() {
    let store = store();
    let section = articles(&store);
    let entries = store.entries();
    let created = create(&store, &section, json!({ "title": "Hello", "published": "yes" }));
    let id = created.id().unwrap();

    let mut entry = entries.fetch_entry(id).unwrap().unwrap();
    entry.set_modification_author_id(AuthorId::new(7));
    let errors = entry
        .set_data_from_post(&entries, &section, &post(json!({ "title": "Hello", "published": "yes" })), false)
        .unwrap();
    assert!(errors.is_empty());
    entry.commit(&entries, &section).unwrap();

    let stored = entries.fetch_entry(id).unwrap().unwrap();
    assert_eq!(stored.data(), created.data());
    assert_eq!(stored.modification_author_id(), Some(AuthorId::new(7)));
    assert_eq!(stored.creation_date(), created.creation_date());
    assert_eq!(entries.fetch_count(&EntryQuery::new()).unwrap(), 1);
}

#[test]
fn partial_post_keeps_other_fields() {
    let store = store();
    let section = articles(&store);
    let entries = store.entries();
    let created = create(&store, &section, json!({ "title": "Hello", "published": "yes" }));

    let mut entry = entries.fetch_entry(created.id().unwrap()).unwrap().unwrap();
    let errors = entry
        .set_data_from_post(&entries, &section, &post(json!({ "title": "Changed" })), true)
        .unwrap();
    assert!(errors.is_empty());
    entry.commit(&entries, &section).unwrap();

    let stored = entries.fetch_entry(created.id().unwrap()).unwrap().unwrap();
    let published = field_id(&section, "published");
    let title = field_id(&section, "title");
    assert_eq!(stored.get_data(published), Some(&FieldData::new().with("value", "yes")));
    assert_eq!(stored.get_data(title).and_then(|d| d.text("value")), Some("Changed"));
}

#[test]
fn default_data_fills_missing_fields() {
    let store = store();
    let section = articles(&store);
    let entries = store.entries();

    let mut entry = Entry::new(section_id(&section));
    entry.find_default_data(&entries, &section).unwrap();

    let published = field_id(&section, "published");
    assert_eq!(entry.get_data(published), Some(&FieldData::new().with("value", "no")));
    assert_eq!(entry.author_id(), Some(AuthorId::new(1)));
    assert!(entry.creation_date().is_some());
    assert!(entry.modification_date().is_some());
}

#[test]
fn entry_without_field_table_skips_that_field() {
    let store = store();
    let section = articles(&store);
    let entries = store.entries();
    let title = field_id(&section, "title");

    store
        .database()
        .with_conn(|conn| {
            conn.execute_batch(&format!("DROP TABLE {}", title.data_table()))?;
            Ok::<_, quire_db::DbError>(())
        })
        .unwrap();

    let entry = create(&store, &section, json!({ "title": "Hello", "published": "yes" }));
    let stored = entries.fetch_entry(entry.id().unwrap()).unwrap().unwrap();
    assert_eq!(stored.get_data(title), Some(&FieldData::new()));
    assert_eq!(
        stored.get_data(field_id(&section, "published")),
        Some(&FieldData::new().with("value", "yes"))
    );
}

#[test]
fn associated_entry_counts_follow_selected_values() {
    let store = store();
    let mut categories = Section::new("Categories").with_field(Field::new("Name", InputField::new()));
    store.sections().add(&mut categories).unwrap();
    let name = field_id(&categories, "name");

    let mut posts = Section::new("Posts")
        .with_field(Field::new("Title", InputField::new()))
        .with_field(Field::new("Category", SelectField::from_field(name)));
    store.sections().add(&mut posts).unwrap();
    let category = field_id(&posts, "category");

    let associations = store
        .sections()
        .fetch_child_associations(section_id(&categories), false)
        .unwrap();
    assert_eq!(associations.len(), 1);
    assert_eq!(associations[0].child_section_field_id, category);
    assert_eq!(associations[0].parent_section_field_id, Some(name));

    let news = create(&store, &categories, json!({ "name": "News" }));
    create(&store, &categories, json!({ "name": "Sport" }));
    create(&store, &posts, json!({ "title": "One", "category": "News" }));
    create(&store, &posts, json!({ "title": "Two", "category": "News" }));
    create(&store, &posts, json!({ "title": "Three", "category": "Sport" }));

    let counts = news
        .fetch_all_associated_entry_counts(&store.entries(), None)
        .unwrap();
    assert_eq!(counts[&section_id(&posts)][&category], 2);

    assert_eq!(store.sections().remove_association(category).unwrap(), 1);
    let counts = news
        .fetch_all_associated_entry_counts(&store.entries(), None)
        .unwrap();
    assert!(counts.is_empty());
}

#[test]
fn upload_data_survives_a_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("cover.png"), b"png").unwrap();
    let store = store();
    let mut section = Section::new("Media").with_field(Field::new("Image", UploadField::new(dir.path())));
    store.sections().add(&mut section).unwrap();

    let entry = create(&store, &section, json!({ "image": "cover.png" }));
    let stored = store.entries().fetch_entry(entry.id().unwrap()).unwrap().unwrap();
    let data = stored.get_data(field_id(&section, "image")).unwrap();
    assert_eq!(data.text("file"), Some("cover.png"));
    assert_eq!(data.text("mimetype"), Some("image/png"));

    // the same file cannot back a second entry
    let mut second = Entry::new(section_id(&section));
    let errors = second
        .set_data_from_post(&store.entries(), &section, &post(json!({ "image": "cover.png" })), false)
        .unwrap();
    assert_eq!(errors.values().next().map(|e| e.status), Some(FieldStatus::Duplicate));
}

#[test]
fn unknown_entry_has_no_section() {
    let store = store();
    assert_eq!(store.entries().fetch_entry_section_id(EntryId::new(42)).unwrap(), None);
    assert!(store.entries().fetch_entry(EntryId::new(42)).unwrap().is_none());
}

#[test]
fn editing_twice_leaves_the_same_rows() {
    let store = store();
    let section = articles(&store);
    let entries = store.entries();
    let entry = create(&store, &section, json!({ "title": "Hello", "published": "yes" }));
    let title = field_id(&section, "title");

    let rows = || {
        store
            .database()
            .with_conn(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT entry_id, handle, value FROM {} ORDER BY id",
                    title.data_table()
                ))?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok::<_, quire_db::DbError>(rows)
            })
            .unwrap()
    };

    entries.edit(&entry).unwrap();
    let once = rows();
    entries.edit(&entry).unwrap();
    assert_eq!(rows(), once);
    assert_eq!(once.len(), 1);
    assert_eq!(once[0].1, "hello");
}

#[test]
fn failed_commit_of_new_entry_removes_shell_row() {
    let store = store();
    let section = articles(&store);
    let entries = store.entries();
    let title = field_id(&section, "title");

    let mut entry = Entry::new(section_id(&section));
    let errors = entry
        .set_data_from_post(&entries, &section, &post(json!({ "title": "Hello" })), false)
        .unwrap();
    assert!(errors.is_empty());
    assert_eq!(entries.fetch_count(&EntryQuery::new()).unwrap(), 1);

    store
        .database()
        .with_conn(|conn| {
            conn.execute_batch(&format!(
                "CREATE TRIGGER refuse_title BEFORE INSERT ON {} BEGIN SELECT RAISE(ABORT, 'refused'); END;",
                title.data_table()
            ))?;
            Ok::<_, quire_db::DbError>(())
        })
        .unwrap();

    assert!(entry.commit(&entries, &section).is_err());
    assert_eq!(entry.state(), EntryState::Rejected);
    assert_eq!(entry.id(), None);
    assert_eq!(entries.fetch_count(&EntryQuery::new()).unwrap(), 0);
}

#[test]
fn failed_commit_of_stored_entry_keeps_it() {
    let store = store();
    let section = articles(&store);
    let entries = store.entries();
    let title = field_id(&section, "title");
    let created = create(&store, &section, json!({ "title": "Hello" }));
    let id = created.id().unwrap();

    store
        .database()
        .with_conn(|conn| {
            conn.execute_batch(&format!(
                "CREATE TRIGGER refuse_title BEFORE INSERT ON {} BEGIN SELECT RAISE(ABORT, 'refused'); END;",
                title.data_table()
            ))?;
            Ok::<_, quire_db::DbError>(())
        })
        .unwrap();

    let mut entry = entries.fetch_entry(id).unwrap().unwrap();
    entry
        .set_data_from_post(&entries, &section, &post(json!({ "title": "Changed" })), true)
        .unwrap();
    assert!(entry.commit(&entries, &section).is_err());
    assert_eq!(entry.id(), Some(id));
    let stored = entries.fetch_entry(id).unwrap().unwrap();
    assert_eq!(stored.get_data(title).and_then(|d| d.text("value")), Some("Hello"));
}

#[test]
fn out_of_range_date_is_rejected_before_storage() {
    let store = store();
    let mut section = Section::new("Events").with_field(Field::new("When", DateField::default()));
    store.sections().add(&mut section).unwrap();
    let entries = store.entries();

    let mut entry = Entry::new(section_id(&section));
    let errors = entry
        .set_data_from_post(&entries, &section, &post(json!({ "when": "253402300800" })), false)
        .unwrap();
    assert_eq!(errors.values().next().map(|e| e.status), Some(FieldStatus::InvalidData));
    assert_eq!(entry.state(), EntryState::Rejected);
    assert_eq!(entries.fetch_count(&EntryQuery::new()).unwrap(), 0);
}
